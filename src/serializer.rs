use crate::blocks::{Block, BlockId, BlockMap, Input, Primitive, Scalar, Slot};
use crate::catalog;
use crate::lexer::INDENT_WIDTH;
use std::collections::{HashMap, HashSet};

/// Render one block (and, for C-blocks, its branch bodies) as text lines.
pub fn generate_block_code(blocks: &BlockMap, id: &BlockId, indent: usize) -> String {
    block_code(blocks, id, indent, &mut HashSet::new())
}

/// Render every top-level stack of a target, ordered by canvas position.
pub fn generate_target_code(blocks: &BlockMap) -> String {
    let mut heads = blocks.top_level_ids();
    if heads.is_empty() {
        return String::new();
    }
    heads.sort_by_key(|id| {
        let (x, y) = blocks.get(id).and_then(|b| b.position).unwrap_or((0, 0));
        (y, x)
    });

    let mut visited = HashSet::new();
    let mut out = String::new();
    for head in &heads {
        out.push_str(&chain_code(blocks, Some(head), 0, &mut visited));
        out.push('\n');
    }
    let mut text = out.trim_end().to_string();
    text.push('\n');
    text
}

fn chain_code(blocks: &BlockMap, start: Option<&BlockId>, indent: usize, visited: &mut HashSet<BlockId>) -> String {
    let mut out = String::new();
    let mut current = start.cloned();
    while let Some(id) = current {
        if visited.contains(&id) {
            tracing::warn!("cyclic block chain at '{}'", id);
            break;
        }
        out.push_str(&block_code(blocks, &id, indent, visited));
        current = blocks.get(&id).and_then(|b| b.next.clone());
    }
    out
}

fn block_code(blocks: &BlockMap, id: &BlockId, indent: usize, visited: &mut HashSet<BlockId>) -> String {
    let Some(block) = blocks.get(id) else {
        return String::new();
    };
    if !visited.insert(id.clone()) {
        return String::new();
    }
    let pad = " ".repeat(indent * INDENT_WIDTH);

    match block.opcode.as_str() {
        "procedures_definition" => return format!("{}{}\n", pad, definition_line(blocks, block)),
        "procedures_call" => return format!("{}{}\n", pad, call_line(blocks, block, visited)),
        _ => {}
    }

    let mut out = format!("{}{}\n", pad, fill_template(blocks, block, visited));
    if catalog::is_control_block(&block.opcode) {
        out.push_str(&chain_code(blocks, block.input_block("SUBSTACK"), indent + 1, visited));
        if block.opcode == "control_if_else" {
            out.push_str(&format!("{}else\n", pad));
            out.push_str(&chain_code(blocks, block.input_block("SUBSTACK2"), indent + 1, visited));
        }
        out.push_str(&format!("{}end\n", pad));
    }
    out
}

fn fill_template(blocks: &BlockMap, block: &Block, visited: &mut HashSet<BlockId>) -> String {
    let Some(tpl) = catalog::template(&block.opcode) else {
        tracing::debug!("no template for opcode '{}'", block.opcode);
        return format!("UNKNOWN_BLOCK_{}", block.opcode);
    };

    let mut args: HashMap<String, String> = HashMap::new();
    for (name, input) in &block.inputs {
        // Branch bodies and prototypes are rendered by the caller.
        if matches!(name.as_str(), "SUBSTACK" | "SUBSTACK2" | "custom_block") {
            continue;
        }
        let text = if is_blank(input.value()) && is_boolean_slot(&block.opcode, name) {
            "<>".to_string()
        } else {
            input_text(blocks, input, visited)
        };
        args.insert(name.clone(), text);
    }
    for (name, field) in &block.fields {
        args.insert(name.clone(), field.value.clone());
    }
    for name in tpl.placeholders() {
        args.entry(name.to_string()).or_insert_with(|| missing_placeholder(name));
    }

    tpl.fill(&args).unwrap_or_else(|err| {
        tracing::warn!("could not render '{}': {}", block.opcode, err);
        tpl.source.to_string()
    })
}

/// Condition-like slots left empty still need their angle brackets.
fn missing_placeholder(name: &str) -> String {
    if name.contains("OPERAND") || name.contains("CONDITION") {
        "<>".to_string()
    } else {
        String::new()
    }
}

fn is_blank(slot: &Slot) -> bool {
    match slot {
        Slot::Empty => true,
        Slot::Primitive(Primitive::Text(v)) => v.is_empty(),
        Slot::Primitive(Primitive::Number {
            value: Scalar::Text(v),
            ..
        }) => v.is_empty(),
        _ => false,
    }
}

fn is_boolean_slot(opcode: &str, name: &str) -> bool {
    name.starts_with("CONDITION")
        || (name.starts_with("OPERAND") && matches!(opcode, "operator_and" | "operator_or" | "operator_not"))
}

fn input_text(blocks: &BlockMap, input: &Input, visited: &mut HashSet<BlockId>) -> String {
    match input.value() {
        Slot::Block(id) => block_code(blocks, id, 0, visited).trim().to_string(),
        Slot::Primitive(prim) => primitive_text(prim),
        Slot::Empty => String::new(),
    }
}

fn primitive_text(prim: &Primitive) -> String {
    match prim {
        Primitive::Number { value, .. } => format!("[{}]", value),
        Primitive::Color(value) => format!("({})", value),
        Primitive::Text(value) => format!("[{}]", value),
        Primitive::Broadcast { name, .. } => name.clone(),
        Primitive::Variable { name, .. } | Primitive::List { name, .. } => format!("({})", name),
    }
}

/// Proccode pieces with every `%s`/`%b` slot as a split point.
fn proccode_parts(proccode: &str) -> Vec<String> {
    proccode.replace("%b", "%s").split("%s").map(str::to_string).collect()
}

fn definition_line(blocks: &BlockMap, block: &Block) -> String {
    let Some(mutation) = block
        .input_block("custom_block")
        .and_then(|proto| blocks.get(proto))
        .and_then(|proto| proto.mutation.as_ref())
    else {
        return "define unknown".to_string();
    };

    let mut line = String::from("define ");
    let proccode = mutation.proccode.as_deref().unwrap_or("");
    for (idx, part) in proccode_parts(proccode).iter().enumerate() {
        line.push_str(part);
        if let Some(name) = mutation.argument_names.get(idx) {
            line.push_str(&format!("({})", name));
        }
    }
    if mutation.warp {
        line.push_str(" #norefresh");
    }
    line
}

fn call_line(blocks: &BlockMap, block: &Block, visited: &mut HashSet<BlockId>) -> String {
    let Some(mutation) = block.mutation.as_ref() else {
        return String::new();
    };
    let proccode = mutation.proccode.as_deref().unwrap_or("");
    let mut line = String::new();
    for (idx, part) in proccode_parts(proccode).iter().enumerate() {
        line.push_str(part);
        if let Some(arg_id) = mutation.argument_ids.get(idx) {
            match block.inputs.get(arg_id) {
                Some(input) => line.push_str(&input_text(blocks, input, visited)),
                None => line.push_str("[]"),
            }
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Field, Mutation};
    use crate::catalog::default_empty_input;

    fn put(map: &mut BlockMap, id: &str, block: Block) {
        map.insert(BlockId::from(id), block);
    }

    fn head(opcode: &str, x: i64, y: i64) -> Block {
        let mut block = Block::new(opcode, None);
        block.top_level = true;
        block.position = Some((x, y));
        block
    }

    fn number(n: i64) -> Input {
        Input::Shadow(Slot::Primitive(Primitive::number(Scalar::Int(n))))
    }

    #[test]
    fn primitives_use_bracket_conventions() {
        let mut map = BlockMap::new();
        let mut say = head("looks_sayforsecs", 0, 0);
        say.inputs.insert(
            "MESSAGE".into(),
            Input::Obscured {
                value: Slot::Primitive(Primitive::Variable {
                    name: "score".into(),
                    id: "var_1".into(),
                }),
                shadow: Slot::Primitive(Primitive::Text(String::new())),
            },
        );
        say.inputs.insert("SECS".into(), number(2));
        put(&mut map, "a", say);
        assert_eq!(
            generate_block_code(&map, &BlockId::from("a"), 0),
            "say (score) for [2] seconds\n"
        );
    }

    #[test]
    fn if_else_writes_markers() {
        let mut map = BlockMap::new();
        let mut branch = head("control_if_else", 0, 0);
        branch
            .inputs
            .insert("SUBSTACK".into(), Input::NoShadow(Slot::Block("b".into())));
        branch
            .inputs
            .insert("SUBSTACK2".into(), Input::NoShadow(Slot::Block("c".into())));
        put(&mut map, "a", branch);
        put(&mut map, "b", Block::new("looks_show", Some("a".into())));
        put(&mut map, "c", Block::new("looks_hide", Some("a".into())));
        assert_eq!(
            generate_target_code(&map),
            "if <> then\n    show\nelse\n    hide\nend\n"
        );
    }

    #[test]
    fn branch_bodies_follow_their_header() {
        let mut map = BlockMap::new();
        let mut repeat = head("control_repeat", 0, 0);
        repeat.inputs.insert("TIMES".into(), number(3));
        repeat
            .inputs
            .insert("SUBSTACK".into(), Input::NoShadow(Slot::Block("body".into())));
        repeat.next = Some("after".into());
        put(&mut map, "r", repeat);
        let mut body = Block::new("looks_hide", Some("r".into()));
        body.next = Some("more".into());
        put(&mut map, "body", body);
        put(&mut map, "more", Block::new("looks_show", Some("body".into())));
        put(&mut map, "after", Block::new("looks_show", Some("r".into())));
        assert_eq!(
            generate_target_code(&map),
            "repeat [3]\n    hide\n    show\nend\nshow\n"
        );
    }

    #[test]
    fn empty_boolean_slots_keep_angle_brackets() {
        let blank = || Input::Shadow(Slot::Primitive(Primitive::Text(String::new())));
        let mut map = BlockMap::new();
        let mut branch = head("control_if", 0, 0);
        branch.inputs.insert("CONDITION".into(), blank());
        put(&mut map, "a", branch);
        let mut equals = head("operator_equals", 0, 100);
        equals.inputs.insert("OPERAND1".into(), blank());
        equals.inputs.insert("OPERAND2".into(), number(1));
        put(&mut map, "b", equals);
        let mut not = head("operator_not", 0, 200);
        not.inputs.insert("OPERAND".into(), default_empty_input("OPERAND"));
        put(&mut map, "c", not);
        assert_eq!(
            generate_target_code(&map),
            "if <> then\nend\n\n<[] = [1]>\n\n<not <>>\n"
        );
    }

    #[test]
    fn procedures_rebuild_their_signatures() {
        let mut map = BlockMap::new();
        let mut define = head("procedures_definition", 0, 0);
        define
            .inputs
            .insert("custom_block".into(), Input::Shadow(Slot::Block("p".into())));
        define.next = Some("call".into());
        put(&mut map, "d", define);

        let ids = vec!["arg_a".to_string(), "arg_b".to_string()];
        let names = vec!["x".to_string(), "ok".to_string()];
        let mut proto = Block::new("procedures_prototype", Some("d".into()));
        proto.shadow = true;
        proto.mutation = Some(Mutation::procedure("move %s if %b", &ids, &names, true));
        put(&mut map, "p", proto);

        let mut call = Block::new("procedures_call", Some("d".into()));
        call.mutation = Some(Mutation::procedure("move %s if %b", &ids, &names, false));
        call.inputs.insert("arg_a".into(), number(5));
        put(&mut map, "call", call);

        assert_eq!(
            generate_target_code(&map),
            "define move (x) if (ok) #norefresh\nmove [5] if []\n"
        );

        let mut orphan = BlockMap::new();
        put(&mut orphan, "d", head("procedures_definition", 0, 0));
        assert_eq!(generate_target_code(&orphan), "define unknown\n");
    }

    #[test]
    fn scripts_sorted_by_position_and_separated() {
        let mut map = BlockMap::new();
        put(&mut map, "low", head("event_whenflagclicked", 0, 300));
        let mut high = head("looks_hide", 50, 10);
        high.next = Some("tail".into());
        put(&mut map, "high", high);
        put(&mut map, "tail", Block::new("looks_show", Some("high".into())));
        assert_eq!(
            generate_target_code(&map),
            "hide\nshow\n\nwhen green flag clicked\n"
        );
        assert_eq!(generate_target_code(&BlockMap::new()), "");
    }

    #[test]
    fn lenient_on_missing_and_unknown() {
        let mut map = BlockMap::new();
        put(&mut map, "a", head("operator_and", 0, 0));
        put(&mut map, "b", head("made_up_opcode", 0, 100));
        let mut var = head("data_variable", 0, 200);
        var.fields.insert("VARIABLE".into(), Field::new("n", Some("var_2".into())));
        put(&mut map, "c", var);
        assert_eq!(
            generate_target_code(&map),
            "<<> and <>>\n\nUNKNOWN_BLOCK_made_up_opcode\n\n(n)\n"
        );
    }

    #[test]
    fn cycles_terminate() {
        let mut map = BlockMap::new();
        let mut a = head("looks_show", 0, 0);
        a.next = Some("b".into());
        put(&mut map, "a", a);
        let mut b = Block::new("looks_hide", Some("a".into()));
        b.next = Some("a".into());
        put(&mut map, "b", b);
        assert_eq!(generate_target_code(&map), "show\nhide\n");
    }
}
