use crate::ast::{InputValue, ParsedNode};
use crate::blocks::{Field, Input, Primitive, Slot};
use crate::catalog::{self, default_empty_input, reporter_shadow, LineMatch, DEFAULT_COLOR};
use crate::lexer::{
    coerce_number, is_hex_color, is_menu_token, split_top_level, split_top_level_whitespace, strip_wrappers,
    strip_wrapping_parens,
};
use crate::parser::Parser;

const BINARY_OPERATORS: &[(&str, &str, &str, &str)] = &[
    (" + ", "operator_add", "NUM1", "NUM2"),
    (" - ", "operator_subtract", "NUM1", "NUM2"),
    (" * ", "operator_multiply", "NUM1", "NUM2"),
    (" / ", "operator_divide", "NUM1", "NUM2"),
];

const LOGIC_OPERATORS: &[(&str, &str)] = &[(" and ", "operator_and"), (" or ", "operator_or")];

fn literal(input: Input) -> InputValue {
    InputValue::Literal(input)
}

fn shadow(prim: Primitive) -> InputValue {
    literal(Input::Shadow(Slot::Primitive(prim)))
}

fn wrapped(node: ParsedNode) -> InputValue {
    if catalog::is_menu_shadow(&node.opcode) {
        InputValue::Menu(Box::new(node))
    } else {
        InputValue::Node(Box::new(node))
    }
}

fn is_wrapped(text: &str, open: char, close: char) -> bool {
    text.len() >= 2 && text.starts_with(open) && text.ends_with(close)
}

fn strip_menu_suffix(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed.strip_suffix(" v").map(str::trim).unwrap_or(trimmed)
}

/// `[a-zA-Z_][a-zA-Z0-9_ ]*`
fn looks_like_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ')
}

/// `[op] of (expr)`: the operator and the expression inside the parentheses.
fn split_math_of(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('[')?;
    let close = rest.find(']')?;
    let op = &rest[..close];
    let num = rest[close + 1..].strip_prefix(" of (")?.strip_suffix(')')?;
    (!op.is_empty() && !num.is_empty()).then_some((op, num))
}

/// Built-in menu choices are stored as sentinel tokens rather than display text.
fn normalize_menu_value(opcode: &str, field: &str, value: &str) -> String {
    let normalized = value.trim();
    let lowered = normalized.to_lowercase().replace(['-', '_'], " ");
    let sentinel = match (opcode, field, lowered.trim()) {
        ("sensing_touchingobjectmenu", "TOUCHINGOBJECTMENU", "mouse pointer" | "mouse") => Some("_mouse_"),
        ("sensing_touchingobjectmenu", "TOUCHINGOBJECTMENU", "edge") => Some("_edge_"),
        ("sensing_distancetomenu", "DISTANCETOMENU", "mouse pointer" | "mouse") => Some("_mouse_"),
        ("sensing_distancetomenu", "DISTANCETOMENU", "myself") => Some("_myself_"),
        ("motion_goto_menu" | "motion_glideto_menu", "TO", "random position" | "random") => Some("_random_"),
        ("motion_goto_menu" | "motion_glideto_menu", "TO", "mouse pointer" | "mouse") => Some("_mouse_"),
        ("motion_pointtowards_menu", "TOWARDS", "mouse pointer" | "mouse") => Some("_mouse_"),
        ("motion_pointtowards_menu", "TOWARDS", "random direction" | "random") => Some("_random_"),
        ("sensing_of_object_menu", "OBJECT", "stage") => Some("_stage_"),
        ("control_create_clone_of_menu", "CLONE_OPTION", "myself") => Some("_myself_"),
        _ => None,
    };
    sentinel.map(str::to_string).unwrap_or_else(|| normalized.to_string())
}

pub(crate) fn menu_shadow(opcode: &str, field: &str, raw: &str) -> ParsedNode {
    let unwrapped = strip_wrappers(raw, true);
    let value = normalize_menu_value(opcode, field, strip_menu_suffix(&unwrapped));
    ParsedNode::new(opcode).with_field(field, Field::new(value, None))
}

pub(crate) fn key_option_menu(raw: &str) -> ParsedNode {
    ParsedNode::new("sensing_keyoptions").with_field("KEY_OPTION", Field::new(strip_wrappers(raw, true), None))
}

impl Parser<'_> {
    /// Resolve the captured text of one input slot.
    pub(crate) fn build_input_value(&mut self, value: &str, input_name: &str) -> InputValue {
        let raw = value.trim_matches(|c| c == '\n' || c == '\r');
        let raw_stripped = raw.trim();
        let wrapped_inner = [('[', ']'), ('(', ')'), ('{', '}')]
            .iter()
            .any(|(open, close)| is_wrapped(raw_stripped, *open, *close))
            .then(|| &raw_stripped[1..raw_stripped.len() - 1]);
        let inner = strip_wrappers(raw, false);
        let inner_stripped = inner.trim();
        let hex_candidate = strip_wrapping_parens(inner_stripped);
        let is_color = matches!(input_name, "COLOR" | "COLOR2");

        if matches!(raw_stripped, "<>" | "[]" | "()" | "{}")
            || (inner_stripped.is_empty() && wrapped_inner.map_or(true, str::is_empty))
        {
            return literal(default_empty_input(input_name));
        }

        if input_name.contains("BROADCAST") {
            let name = strip_menu_suffix(&inner).to_string();
            let id = self.scope.resolve_broadcast_id(&name);
            return shadow(Primitive::Broadcast { name, id });
        }
        if input_name == "COLOR_PARAM" {
            return wrapped(menu_shadow("pen_menu_colorParam", "colorParam", raw));
        }
        if is_color && is_hex_color(hex_candidate) {
            return shadow(Primitive::Color(hex_candidate.to_string()));
        }
        let menu = match input_name {
            "DISTANCETOMENU" => Some("sensing_distancetomenu"),
            "CLONE_OPTION" => Some("control_create_clone_of_menu"),
            "TOUCHINGOBJECTMENU" => Some("sensing_touchingobjectmenu"),
            "OBJECT" => Some("sensing_of_object_menu"),
            "COSTUME" if is_menu_token(raw) => Some("looks_costume"),
            "BACKDROP" if is_menu_token(raw) => Some("looks_backdrops"),
            "SOUND_MENU" if is_menu_token(raw) => Some("sound_sounds_menu"),
            _ => None,
        };
        if let Some(opcode) = menu {
            return wrapped(menu_shadow(opcode, input_name, raw));
        }

        if let Some(num) = coerce_number(inner_stripped) {
            return shadow(Primitive::number(num));
        }

        if is_wrapped(raw_stripped, '{', '}') {
            let mut arg = raw_stripped[1..raw_stripped.len() - 1].trim();
            let mut opcode = "argument_reporter_string_number";
            if is_wrapped(arg, '<', '>') {
                arg = arg[1..arg.len() - 1].trim();
                opcode = "argument_reporter_boolean";
            }
            return InputValue::Node(Box::new(
                ParsedNode::new(opcode).with_field("VALUE", Field::new(arg, None)),
            ));
        }

        if let Some(node) = self.parse_inline_expression(raw) {
            return wrapped(node);
        }
        if let Some(node) = self.parse_inline_expression(&inner) {
            return wrapped(node);
        }

        // Square brackets always mean literal text.
        if !is_wrapped(raw_stripped, '[', ']') {
            if self.scope.is_variable(&inner) {
                let id = self.scope.resolve_variable_id(&inner, None);
                return literal(Input::Obscured {
                    value: Slot::Primitive(Primitive::Variable { name: inner, id }),
                    shadow: Slot::Primitive(reporter_shadow(input_name)),
                });
            }
            if self.scope.is_list(&inner) {
                let id = self.scope.resolve_list_id(&inner, None);
                return literal(Input::Obscured {
                    value: Slot::Primitive(Primitive::List { name: inner, id }),
                    shadow: Slot::Primitive(reporter_shadow(input_name)),
                });
            }
        }

        if is_wrapped(raw_stripped, '(', ')')
            && !inner_stripped.chars().all(|c| c.is_ascii_digit())
            && looks_like_identifier(inner_stripped)
        {
            if let Some(diag) = self.diag.as_deref_mut() {
                diag.warning(format!("Unknown reporter or undefined variable '{}'", inner_stripped));
            }
        }

        if is_color {
            return shadow(Primitive::Color(DEFAULT_COLOR.to_string()));
        }
        let text = wrapped_inner.map(str::to_string).unwrap_or(inner);
        shadow(Primitive::Text(text))
    }

    /// Reporter or boolean written inline. Only bracket-opened text is considered.
    pub(crate) fn parse_inline_expression(&mut self, value: &str) -> Option<ParsedNode> {
        let text = value.trim();
        if !text.starts_with(['(', '<', '[', '{']) {
            return None;
        }
        if is_hex_color(strip_wrapping_parens(text)) {
            return None;
        }

        // Comparison operators would otherwise read as arithmetic inside `<...>`.
        if !text.starts_with('<') {
            if let Some(node) = self.parse_balanced_math(text) {
                return Some(node);
            }
        }
        if let Some(node) = self.parse_boolean(text) {
            return Some(node);
        }
        if let Some(node) = self.parse_join(text) {
            return Some(node);
        }

        let math_of = [text, strip_wrapping_parens(text)]
            .into_iter()
            .find_map(split_math_of)
            .filter(|(op, _)| catalog::is_math_operator(strip_menu_suffix(op)));
        let mut matched = match math_of {
            Some((op, num)) => mathop_match(strip_menu_suffix(op), num.trim()),
            None => catalog::match_line(text, false)?,
        };

        if matched.opcode == "sensing_of" {
            let prop = strip_menu_suffix(matched.group("PROPERTY").unwrap_or_default()).to_string();
            if catalog::is_math_operator(&prop) {
                let object = matched.group("OBJECT").unwrap_or_default().to_string();
                matched = mathop_match(&prop, &object);
            }
        }

        let opcode = matched.opcode.as_str();
        if catalog::is_control_block(opcode)
            || opcode.starts_with("event_")
            || opcode == "procedures_definition"
            || catalog::literal_length(opcode) == 0
            || opcode.ends_with("_menu")
            || opcode.starts_with("pen_menu")
        {
            return None;
        }

        if opcode == "data_variable" {
            let name = strip_wrappers(matched.group("VARIABLE").unwrap_or_default(), true);
            if !self.scope.is_variable(&name) {
                let is_arg = self.proc_args.as_ref().is_some_and(|args| args.contains_key(&name));
                if is_arg {
                    return Some(
                        ParsedNode::new("argument_reporter_string_number").with_field("VALUE", Field::new(name, None)),
                    );
                }
                if self.scope.is_list(&name) {
                    matched = LineMatch {
                        opcode: "data_listcontents".to_string(),
                        groups: vec![("LIST".to_string(), name)],
                    };
                }
            }
        }

        Some(self.build_matched_node(matched))
    }

    fn parse_balanced_math(&mut self, text: &str) -> Option<ParsedNode> {
        let inner = strip_wrapping_parens(text);
        for &(token, opcode, left_name, right_name) in BINARY_OPERATORS {
            let Some((left, right)) = split_top_level(inner, token, &[('[', ']')]) else {
                continue;
            };
            return Some(self.binary_node(opcode, (left_name, left.as_str()), (right_name, right.as_str())));
        }
        None
    }

    fn parse_boolean(&mut self, raw: &str) -> Option<ParsedNode> {
        if !raw.contains('<') && !raw.starts_with("not ") {
            return None;
        }
        let text = if is_wrapped(raw, '<', '>') {
            raw[1..raw.len() - 1].trim()
        } else {
            raw
        };

        if let Some(operand) = text.strip_prefix("not ") {
            let mut node = ParsedNode::new("operator_not");
            let value = self.build_input_value(operand.trim(), "OPERAND");
            node.set_input("OPERAND", value);
            return Some(node);
        }

        for &(token, opcode) in LOGIC_OPERATORS {
            // `<>` nests here so comparisons stay whole.
            if let Some((left, right)) = split_top_level(text, token, &[('[', ']'), ('<', '>')]) {
                return Some(self.binary_node(opcode, ("OPERAND1", left.as_str()), ("OPERAND2", right.as_str())));
            }
        }
        None
    }

    fn parse_join(&mut self, text: &str) -> Option<ParsedNode> {
        if !(text.starts_with("(join ") && text.ends_with(')')) {
            return None;
        }
        let body = text[1..text.len() - 1].trim();
        let remainder = body["join".len()..].trim();
        let parts = split_top_level_whitespace(remainder, 2);
        match parts.as_slice() {
            [first, second] => Some(self.binary_node("operator_join", ("STRING1", first.as_str()), ("STRING2", second.as_str()))),
            _ => None,
        }
    }

    fn binary_node(&mut self, opcode: &str, left: (&str, &str), right: (&str, &str)) -> ParsedNode {
        let mut node = ParsedNode::new(opcode);
        for (name, text) in [left, right] {
            let value = self.build_input_value(text, name);
            node.set_input(name, value);
        }
        node
    }
}

fn mathop_match(op: &str, num: &str) -> LineMatch {
    LineMatch {
        opcode: "operator_mathop".to_string(),
        groups: vec![
            ("OPERATOR".to_string(), op.to_string()),
            ("NUM".to_string(), num.to_string()),
        ],
    }
}
