use crate::ast::{InputValue, ParsedNode};
use crate::blocks::Mutation;
use crate::catalog::{self, LineMatch};
use crate::diagnostics::DiagnosticContext;
use crate::expr::{key_option_menu, menu_shadow};
use crate::lexer::{first_token, is_menu_token, strip_wrappers, ScriptLine};
use crate::procedures::ProcedureTable;
use crate::scope::Scope;
use std::collections::HashMap;

const SOUND_EFFECT_NAMES: &[&str] = &["PITCH", "PAN"];
const PREVIEW_CHARS: usize = 50;

/// Turns the scripts of one target into parse trees. Names are resolved
/// through the target's [`Scope`] as they are met.
pub struct Parser<'a> {
    pub(crate) scope: Scope<'a>,
    pub(crate) procedures: ProcedureTable,
    pub(crate) diag: Option<&'a mut DiagnosticContext>,
    /// Parameter name to argument id while inside a `define` body.
    pub(crate) proc_args: Option<HashMap<String, String>>,
}

impl<'a> Parser<'a> {
    pub fn new(scope: Scope<'a>, diag: Option<&'a mut DiagnosticContext>) -> Self {
        let mut scope = scope;
        let mut procedures = ProcedureTable::new();
        procedures.register_addon_logging(&mut *scope.ids);
        procedures.rebuild_index();
        Self {
            scope,
            procedures,
            diag,
            proc_args: None,
        }
    }

    /// Register every `define` line up front so calls may appear above their definition.
    pub fn declare_procedures(&mut self, scripts: &[Vec<ScriptLine>]) {
        for line in scripts.iter().flatten() {
            if line.text.starts_with("define ") {
                self.procedures.declare(&line.text, &mut *self.scope.ids);
            }
        }
        self.procedures.rebuild_index();
    }

    pub fn procedures(&self) -> &ProcedureTable {
        &self.procedures
    }

    pub fn parse_script(&mut self, lines: &[ScriptLine]) -> Vec<ParsedNode> {
        let mut nodes = Vec::new();
        let mut idx = 0;
        // A stray top-level `else` stops one pass; keep going after it.
        while idx < lines.len() {
            let (mut parsed, next, _) = self.parse_block_list(lines, idx, 0);
            nodes.append(&mut parsed);
            idx = next;
        }
        nodes
    }

    /// Parse sibling lines at `indent`. Returns the nodes, the index of the
    /// first unconsumed line and whether an `else` ended the list.
    pub fn parse_block_list(&mut self, lines: &[ScriptLine], start: usize, indent: usize) -> (Vec<ParsedNode>, usize, bool) {
        let outer_args = self.proc_args.clone();
        let mut nodes = Vec::new();
        let mut idx = start;
        let mut hit_else = false;

        while let Some(line) = lines.get(idx) {
            if line.indent < indent {
                if line.text == "else" && line.indent + 1 == indent {
                    hit_else = true;
                    idx += 1;
                }
                break;
            }
            if line.text == "else" {
                hit_else = true;
                idx += 1;
                break;
            }
            if line.text == "end" {
                idx += 1;
                continue;
            }

            self.set_location(Some(line.line));
            let parsed = self.parse_line_to_node(&line.text);
            idx += 1;

            let Some(mut node) = parsed else {
                continue;
            };
            if indent > 0 && catalog::is_reporter_shape(&node.opcode) {
                continue;
            }
            if let Some(signature) = &node.procedure {
                self.proc_args = Some(
                    signature
                        .arg_names
                        .iter()
                        .cloned()
                        .zip(signature.arg_ids.iter().cloned())
                        .collect(),
                );
            }

            if catalog::is_control_block(&node.opcode) {
                let (children, next, saw_else) = self.parse_block_list(lines, idx, indent + 1);
                node.children = children;
                idx = next;
                if saw_else {
                    if node.opcode == "control_if" {
                        node.opcode = "control_if_else".to_string();
                    }
                    if node.opcode == "control_if_else" {
                        let (children2, next, _) = self.parse_block_list(lines, idx, indent + 1);
                        node.children2 = children2;
                        idx = next;
                    }
                }
            }
            nodes.push(node);
        }

        self.proc_args = outer_args;
        (nodes, idx, hit_else)
    }

    /// Definition, indexed procedure call, inline reporter, catalog line,
    /// fallback procedure call. The first that matches wins.
    pub fn parse_line_to_node(&mut self, line: &str) -> Option<ParsedNode> {
        if line.starts_with("define ") {
            let signature = self.procedures.declare(line, &mut *self.scope.ids)?;
            let mut node = ParsedNode::new("procedures_definition");
            node.procedure = Some(signature);
            return Some(node);
        }

        if let Some(node) = self.parse_procedure_call(line, false) {
            return Some(node);
        }
        if let Some(node) = self.parse_inline_expression(line) {
            return Some(node);
        }
        if let Some(matched) = catalog::match_line(line, false) {
            let matched = disambiguate_effect(matched);
            if catalog::is_menu_shadow(&matched.opcode) {
                return None;
            }
            return Some(self.build_matched_node(matched));
        }
        if let Some(node) = self.parse_procedure_call(line, true) {
            return Some(node);
        }

        if let Some(diag) = self.diag.as_deref_mut() {
            if !line.trim().is_empty() {
                let token = match first_token(line) {
                    "" => line,
                    token => token,
                };
                let preview = if line.chars().count() > PREVIEW_CHARS {
                    format!("{}...", line.chars().take(PREVIEW_CHARS).collect::<String>())
                } else {
                    line.to_string()
                };
                diag.error(format!("Unknown block '{}'", token), Some(preview));
            }
        }
        None
    }

    fn parse_procedure_call(&mut self, line: &str, fallback: bool) -> Option<ParsedNode> {
        let (signature, args) = {
            let defs = if fallback {
                self.procedures.fallback()
            } else {
                self.procedures.candidates(line)
            };
            defs.into_iter()
                .find_map(|def| def.match_call(line).map(|args| (def.signature(), args)))?
        };

        let mut node = ParsedNode::new("procedures_call");
        node.mutation = Some(Mutation::procedure(
            &signature.proccode,
            &signature.arg_ids,
            &signature.arg_names,
            signature.warp,
        ));
        for (arg_id, value) in signature.arg_ids.iter().zip(&args) {
            let input = self.build_input_value(value, arg_id);
            node.set_input(arg_id, input);
        }
        Some(node)
    }

    /// Split captured groups into fields and inputs for a catalog match.
    pub(crate) fn build_matched_node(&mut self, matched: LineMatch) -> ParsedNode {
        let LineMatch { opcode, groups } = matched;
        let mut node = ParsedNode::new(opcode.as_str());
        for (name, value) in &groups {
            match (opcode.as_str(), name.as_str()) {
                ("sensing_keypressed", "KEY_OPTION") => {
                    node.set_input(name, InputValue::Menu(Box::new(key_option_menu(value))));
                }
                ("event_whenkeypressed" | "sensing_keyoptions", "KEY_OPTION") => {
                    let field = self.scope.resolve_field_value(name, value, None);
                    node.set_field(name, field);
                }
                ("motion_goto", "TO") if is_menu_token(value) => {
                    let menu = menu_shadow("motion_goto_menu", "TO", value);
                    node.set_input(name, InputValue::Menu(Box::new(menu)));
                }
                ("motion_glideto", "TO") if is_menu_token(value) => {
                    let menu = menu_shadow("motion_glideto_menu", "TO", value);
                    node.set_input(name, InputValue::Menu(Box::new(menu)));
                }
                ("motion_pointtowards", "TOWARDS") if is_menu_token(value) => {
                    let menu = menu_shadow("motion_pointtowards_menu", "TOWARDS", value);
                    node.set_input(name, InputValue::Menu(Box::new(menu)));
                }
                _ if catalog::is_field(&opcode, name) => {
                    let field = self.scope.resolve_field_value(name, value, self.diag.as_deref_mut());
                    node.set_field(name, field);
                }
                _ => {
                    let input = self.build_input_value(value, name);
                    node.set_input(name, input);
                }
            }
        }
        node
    }

    fn set_location(&mut self, line: Option<usize>) {
        if let Some(diag) = self.diag.as_deref_mut() {
            diag.set_location(line);
        }
    }
}

/// Looks and sound effect blocks share one shape. Sound-only effect names select the sound twin.
fn disambiguate_effect(mut matched: LineMatch) -> LineMatch {
    let sound_opcode = match matched.opcode.as_str() {
        "looks_changeeffectby" => "sound_changeeffectby",
        "looks_seteffectto" => "sound_seteffectto",
        _ => return matched,
    };
    let effect = matched
        .group("EFFECT")
        .map(|value| strip_wrappers(value, true).to_uppercase())
        .unwrap_or_default();
    if !SOUND_EFFECT_NAMES.contains(&effect.as_str()) {
        return matched;
    }
    if sound_opcode == "sound_changeeffectby" {
        for (name, _) in matched.groups.iter_mut() {
            if name == "CHANGE" {
                *name = "VALUE".to_string();
            }
        }
    }
    matched.opcode = sound_opcode.to_string();
    matched
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Field, Input, Primitive, Scalar, Slot};
    use crate::diagnostics::{Diagnostic, Level};
    use crate::lexer::split_scripts;
    use crate::scope::{IdGen, NameTable, TargetNames};

    struct Parsed {
        scripts: Vec<Vec<ParsedNode>>,
        locals: TargetNames,
        diagnostics: Vec<Diagnostic>,
    }

    fn parse_with(src: &str, globals: &TargetNames) -> Parsed {
        let mut ids = IdGen::new();
        let mut broadcasts = NameTable::new();
        let mut locals = TargetNames::default();
        let mut diag = DiagnosticContext::new("Sprite1");
        let lines = split_scripts(src);
        let scripts = {
            let scope = Scope::new(&mut ids, &mut broadcasts, &mut locals, globals);
            let mut parser = Parser::new(scope, Some(&mut diag));
            parser.declare_procedures(&lines);
            lines.iter().map(|script| parser.parse_script(script)).collect()
        };
        Parsed {
            scripts,
            locals,
            diagnostics: diag.into_diagnostics(),
        }
    }

    fn parse(src: &str) -> Parsed {
        parse_with(src, &TargetNames::default())
    }

    fn literal(node: &ParsedNode, name: &str) -> Primitive {
        match node.input(name) {
            Some(InputValue::Literal(Input::Shadow(Slot::Primitive(prim)))) => prim.clone(),
            other => panic!("{} is not a literal: {:?}", name, other),
        }
    }

    fn nested<'n>(node: &'n ParsedNode, name: &str) -> &'n ParsedNode {
        match node.input(name) {
            Some(InputValue::Node(inner) | InputValue::Menu(inner)) => inner,
            other => panic!("{} is not a nested node: {:?}", name, other),
        }
    }

    #[test]
    fn command_with_integer_literal() {
        let parsed = parse("move (10) steps");
        let node = &parsed.scripts[0][0];
        assert_eq!(node.opcode, "motion_movesteps");
        assert_eq!(literal(node, "STEPS"), Primitive::number(Scalar::Int(10)));
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn if_else_bodies_follow_indentation() {
        let mut globals = TargetNames::default();
        globals.variables.insert("x", "var_x");
        let src = "if <(x) > [5]> then\n    say [hi]\nelse\n    say [no]\n    say [again]\nend\nmove (1) steps";
        let parsed = parse_with(src, &globals);
        let script = &parsed.scripts[0];
        assert_eq!(script.len(), 2);
        let branch = &script[0];
        assert_eq!(branch.opcode, "control_if_else");
        assert_eq!(branch.children.len(), 1);
        assert_eq!(branch.children2.len(), 2);
        assert_eq!(literal(&branch.children[0], "MESSAGE"), Primitive::Text("hi".into()));

        let cond = nested(branch, "CONDITION");
        assert_eq!(cond.opcode, "operator_gt");
        let left = nested(cond, "OPERAND1");
        assert_eq!(left.opcode, "data_variable");
        assert_eq!(left.field("VARIABLE"), Some(&Field::new("x", Some("var_x".into()))));
        assert_eq!(literal(cond, "OPERAND2"), Primitive::number(Scalar::Int(5)));
        assert_eq!(script[1].opcode, "motion_movesteps");
        assert!(parsed.diagnostics.is_empty());
    }

    #[test]
    fn procedures_resolve_before_definition() {
        let parsed = parse("jump (50)\n\ndefine jump (height)\nchange y by (height)\nend");
        let call = &parsed.scripts[0][0];
        assert_eq!(call.opcode, "procedures_call");
        let mutation = call.mutation.as_ref().unwrap();
        assert_eq!(mutation.proccode.as_deref(), Some("jump %s"));
        let arg_id = &mutation.argument_ids[0];
        assert_eq!(literal(call, arg_id), Primitive::number(Scalar::Int(50)));

        let body = &parsed.scripts[1];
        assert_eq!(body[0].opcode, "procedures_definition");
        let signature = body[0].procedure.as_ref().unwrap();
        assert_eq!(&signature.arg_ids[0], arg_id);
        let reporter = nested(&body[1], "DY");
        assert_eq!(reporter.opcode, "argument_reporter_string_number");
        assert_eq!(reporter.field("VALUE"), Some(&Field::new("height", None)));
        assert!(parsed.locals.variables.is_empty());
    }

    #[test]
    fn undefined_variable_is_created_with_warning() {
        let parsed = parse("set [x v] to (undefinedVar)");
        let node = &parsed.scripts[0][0];
        assert_eq!(node.opcode, "data_setvariableto");
        let value = nested(node, "VALUE");
        assert_eq!(value.opcode, "data_variable");
        let id = parsed.locals.variables.get("undefinedVar").unwrap();
        assert_eq!(value.field("VARIABLE").unwrap().id.as_deref(), Some(id));
        assert!(parsed.diagnostics.iter().any(|d| d.level == Level::Warning
            && d.message == "Undefined variable 'undefinedVar' (auto-created)"
            && d.line == Some(1)));
    }

    #[test]
    fn unknown_line_reports_preview() {
        let long = format!("fly {}", "a".repeat(60));
        let parsed = parse(&format!("move (1) steps\n{}", long));
        assert_eq!(parsed.scripts[0].len(), 1);
        let error = &parsed.diagnostics[0];
        assert_eq!(error.level, Level::Error);
        assert_eq!(error.message, "Unknown block 'fly'");
        assert_eq!(error.line, Some(2));
        let preview = error.line_text.as_deref().unwrap();
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 53);
    }

    #[test]
    fn menus_use_sentinel_values() {
        let parsed = parse("go to [mouse-pointer v]\ncreate clone of [myself v]\npoint towards [random direction v]");
        let script = &parsed.scripts[0];
        let goto = nested(&script[0], "TO");
        assert_eq!(goto.opcode, "motion_goto_menu");
        assert_eq!(goto.field("TO"), Some(&Field::new("_mouse_", None)));
        let clone = nested(&script[1], "CLONE_OPTION");
        assert_eq!(clone.field("CLONE_OPTION"), Some(&Field::new("_myself_", None)));
        let towards = nested(&script[2], "TOWARDS");
        assert_eq!(towards.field("TOWARDS"), Some(&Field::new("_random_", None)));
    }

    #[test]
    fn sound_effects_are_told_apart_from_looks() {
        let parsed = parse("change [pitch v] effect by (10)\nchange [ghost v] effect by (10)");
        let script = &parsed.scripts[0];
        assert_eq!(script[0].opcode, "sound_changeeffectby");
        assert!(script[0].input("VALUE").is_some());
        assert_eq!(script[1].opcode, "looks_changeeffectby");
        assert!(script[1].input("CHANGE").is_some());
    }

    #[test]
    fn nested_loose_reporters_are_dropped() {
        let parsed = parse("(x position)\n\nforever\n    (x position)\n    move (1) steps");
        assert_eq!(parsed.scripts[0][0].opcode, "motion_xposition");
        let forever = &parsed.scripts[1][0];
        assert_eq!(forever.opcode, "control_forever");
        assert_eq!(forever.children.len(), 1);
        assert_eq!(forever.children[0].opcode, "motion_movesteps");
    }

    #[test]
    fn key_options_and_broadcasts() {
        let parsed = parse("when [space v] key pressed\nwait until <key [a v] pressed?>\nbroadcast [go v]");
        let script = &parsed.scripts[0];
        assert_eq!(script[0].field("KEY_OPTION"), Some(&Field::new("space", None)));
        let pressed = nested(&script[1], "CONDITION");
        let menu = nested(pressed, "KEY_OPTION");
        assert_eq!(menu.opcode, "sensing_keyoptions");
        match literal(&script[2], "BROADCAST_INPUT") {
            Primitive::Broadcast { name, id } => {
                assert_eq!(name, "go");
                assert!(id.starts_with("broadcast_"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn debugger_log_calls_need_no_definition() {
        let parsed = parse("\u{200b}\u{200b}log\u{200b}\u{200b} [hello]");
        let call = &parsed.scripts[0][0];
        assert_eq!(call.opcode, "procedures_call");
        assert!(parsed.diagnostics.is_empty());
    }
}
