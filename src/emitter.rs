use crate::ast::{InputValue, ParsedNode, ProcedureSignature};
use crate::blocks::{Block, BlockId, BlockMap, Field, Input, Mutation, Primitive, Slot};
use crate::catalog::{self, reporter_shadow};
use crate::scope::IdGen;

/// Writes parse trees into a target's block arena.
pub struct Emitter<'a> {
    ids: &'a mut IdGen,
    blocks: &'a mut BlockMap,
}

impl<'a> Emitter<'a> {
    pub fn new(ids: &'a mut IdGen, blocks: &'a mut BlockMap) -> Self {
        Self { ids, blocks }
    }

    /// Emit one script as a top-level stack whose head sits at `(x, y)`.
    pub fn emit_script(&mut self, nodes: &[ParsedNode], x: i64, y: i64) -> Option<BlockId> {
        self.emit_stack(nodes, None, true, (x, y)).map(|(first, _)| first)
    }

    /// Returns the first and last block ids of the emitted chain.
    pub fn emit_stack(
        &mut self,
        nodes: &[ParsedNode],
        parent: Option<&BlockId>,
        top_level: bool,
        pos: (i64, i64),
    ) -> Option<(BlockId, BlockId)> {
        let mut first: Option<BlockId> = None;
        let mut prev: Option<BlockId> = None;
        for node in nodes {
            let is_head = top_level && prev.is_none() && parent.is_none();
            let block_parent = prev.clone().or_else(|| parent.cloned());
            let id = self.emit_node(node, block_parent, is_head, pos);
            if let Some(prev_block) = prev.as_ref().and_then(|p| self.blocks.get_mut(p)) {
                prev_block.next = Some(id.clone());
            }
            if first.is_none() {
                first = Some(id.clone());
            }
            prev = Some(id);
        }
        Some((first?, prev?))
    }

    fn emit_node(&mut self, node: &ParsedNode, parent: Option<BlockId>, is_head: bool, pos: (i64, i64)) -> BlockId {
        let id = BlockId::new(self.ids.next_id("block"));
        let mut block = Block::new(node.opcode.as_str(), parent);
        block.fields = node.fields.iter().cloned().collect();
        block.mutation = node.mutation.clone();

        for (name, value) in &node.inputs {
            let input = self.emit_input(&id, name, value, pos);
            block.inputs.insert(name.clone(), input);
        }
        if let Some(signature) = &node.procedure {
            let proto = self.emit_prototype(&id, signature);
            block.inputs.insert("custom_block".to_string(), Input::Shadow(Slot::Block(proto)));
        }
        if is_head {
            block.top_level = true;
            block.position = Some(pos);
        }

        if catalog::is_control_block(&node.opcode) {
            if let Some(first) = self.emit_branch(&node.children, &id, pos) {
                block.inputs.insert("SUBSTACK".to_string(), Input::NoShadow(Slot::Block(first)));
            }
            if node.opcode == "control_if_else" {
                if let Some(first) = self.emit_branch(&node.children2, &id, pos) {
                    block.inputs.insert("SUBSTACK2".to_string(), Input::NoShadow(Slot::Block(first)));
                }
            }
        }

        self.blocks.insert(id.clone(), block);
        id
    }

    /// A branch body is closed: its last block never continues.
    fn emit_branch(&mut self, nodes: &[ParsedNode], owner: &BlockId, pos: (i64, i64)) -> Option<BlockId> {
        let (first, last) = self.emit_stack(nodes, Some(owner), false, pos)?;
        if let Some(tail) = self.blocks.get_mut(&last) {
            tail.next = None;
        }
        Some(first)
    }

    fn emit_input(&mut self, owner: &BlockId, name: &str, value: &InputValue, pos: (i64, i64)) -> Input {
        let node = match value {
            InputValue::Literal(input) => return input.clone(),
            InputValue::Menu(node) | InputValue::Node(node) => node,
        };

        if matches!(value, InputValue::Menu(_)) || catalog::is_menu_shadow(&node.opcode) {
            let menu_id = self.emit_node(node, Some(owner.clone()), false, pos);
            if let Some(menu) = self.blocks.get_mut(&menu_id) {
                menu.shadow = true;
            }
            return Input::Shadow(Slot::Block(menu_id));
        }

        if let Some(prim) = inline_reporter(node) {
            return Input::Obscured {
                value: Slot::Primitive(prim),
                shadow: Slot::Primitive(reporter_shadow(name)),
            };
        }

        let reporter = self.emit_node(node, Some(owner.clone()), false, pos);
        if catalog::is_boolean_reporter(&node.opcode) {
            return Input::NoShadow(Slot::Block(reporter));
        }
        let shadow = match catalog::menu_shadow_for_input(name) {
            Some((opcode, field)) => Slot::Block(self.emit_menu_default(owner, opcode, field)),
            None => Slot::Primitive(reporter_shadow(name)),
        };
        Input::Obscured {
            value: Slot::Block(reporter),
            shadow,
        }
    }

    /// Empty dropdown kept behind a reporter that covers a menu slot.
    fn emit_menu_default(&mut self, owner: &BlockId, opcode: &str, field: &str) -> BlockId {
        let id = BlockId::new(self.ids.next_id("shadow"));
        let mut block = Block::new(opcode, Some(owner.clone()));
        block.fields.insert(field.to_string(), Field::new("", None));
        block.shadow = true;
        self.blocks.insert(id.clone(), block);
        id
    }

    fn emit_prototype(&mut self, definition: &BlockId, signature: &ProcedureSignature) -> BlockId {
        let mut proto_id = BlockId::new(signature.prototype_id.as_str());
        if self.blocks.contains(&proto_id) {
            // Same signature defined twice in one file.
            proto_id = BlockId::new(self.ids.next_id("proc_proto"));
        }

        let mut proto = Block::new("procedures_prototype", Some(definition.clone()));
        proto.shadow = true;
        proto.mutation = Some(Mutation::procedure(
            &signature.proccode,
            &signature.arg_ids,
            &signature.arg_names,
            signature.warp,
        ));
        for (arg_name, arg_id) in signature.arg_names.iter().zip(&signature.arg_ids) {
            let reporter_id = BlockId::new(self.ids.next_id("arg"));
            let mut reporter = Block::new("argument_reporter_string_number", Some(proto_id.clone()));
            reporter.fields.insert("VALUE".to_string(), Field::new(arg_name.as_str(), None));
            reporter.shadow = true;
            self.blocks.insert(reporter_id.clone(), reporter);
            proto.inputs.insert(arg_id.clone(), Input::Shadow(Slot::Block(reporter_id)));
        }
        self.blocks.insert(proto_id.clone(), proto);
        proto_id
    }
}

/// A plain variable or list reporter is stored inline instead of as its own block.
fn inline_reporter(node: &ParsedNode) -> Option<Primitive> {
    if !node.children.is_empty() || !node.children2.is_empty() {
        return None;
    }
    let (field, build): (&str, fn(String, String) -> Primitive) = match node.opcode.as_str() {
        "data_variable" => ("VARIABLE", |name, id| Primitive::Variable { name, id }),
        "data_listcontents" => ("LIST", |name, id| Primitive::List { name, id }),
        _ => return None,
    };
    let (name, id) = node
        .field(field)
        .map(|f| (f.value.clone(), f.id.clone().unwrap_or_default()))
        .unwrap_or_default();
    Some(build(name, id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::Scalar;

    fn number(n: i64) -> InputValue {
        InputValue::Literal(Input::Shadow(Slot::Primitive(Primitive::number(Scalar::Int(n)))))
    }

    fn emit(nodes: &[ParsedNode]) -> (BlockMap, BlockId) {
        let mut ids = IdGen::new();
        let mut blocks = BlockMap::new();
        let head = Emitter::new(&mut ids, &mut blocks).emit_script(nodes, 0, 120).unwrap();
        (blocks, head)
    }

    #[test]
    fn stacks_are_linked_and_positioned() {
        let mut first = ParsedNode::new("motion_movesteps");
        first.set_input("STEPS", number(10));
        let second = ParsedNode::new("looks_show");
        let (blocks, head) = emit(&[first, second]);

        let head_block = blocks.get(&head).unwrap();
        assert!(head_block.top_level);
        assert_eq!(head_block.position, Some((0, 120)));
        assert_eq!(head_block.parent, None);
        let next = head_block.next.clone().unwrap();
        let next_block = blocks.get(&next).unwrap();
        assert_eq!(next_block.parent.as_ref(), Some(&head));
        assert!(!next_block.top_level);
        assert_eq!(next_block.position, None);
        assert_eq!(
            head_block.inputs.get("STEPS").unwrap().to_json(),
            serde_json::json!([1, [4, 10]])
        );
    }

    #[test]
    fn plain_variables_stay_inline() {
        let reporter = ParsedNode::new("data_variable").with_field("VARIABLE", Field::new("x", Some("var_1".into())));
        let mut say = ParsedNode::new("looks_say");
        say.set_input("MESSAGE", InputValue::Node(Box::new(reporter)));
        let (blocks, head) = emit(&[say]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(
            blocks.get(&head).unwrap().inputs["MESSAGE"].to_json(),
            serde_json::json!([3, [12, "x", "var_1"], [10, ""]])
        );
    }

    #[test]
    fn reporters_get_shadows() {
        let mut switch = ParsedNode::new("looks_switchcostumeto");
        switch.set_input(
            "COSTUME",
            InputValue::Node(Box::new(ParsedNode::new("sensing_answer"))),
        );
        let mut wait = ParsedNode::new("control_wait_until");
        wait.set_input(
            "CONDITION",
            InputValue::Node(Box::new(ParsedNode::new("sensing_mousedown"))),
        );
        let (blocks, head) = emit(&[switch, wait]);

        let switch_block = blocks.get(&head).unwrap();
        let Input::Obscured { value, shadow } = &switch_block.inputs["COSTUME"] else {
            panic!("costume slot should be obscured");
        };
        let shadow_block = blocks.get(shadow.block_id().unwrap()).unwrap();
        assert_eq!(shadow_block.opcode, "looks_costume");
        assert!(shadow_block.shadow);
        assert_eq!(blocks.get(value.block_id().unwrap()).unwrap().opcode, "sensing_answer");

        let wait_block = blocks.get(switch_block.next.as_ref().unwrap()).unwrap();
        assert!(matches!(wait_block.inputs["CONDITION"], Input::NoShadow(Slot::Block(_))));
    }

    #[test]
    fn menus_are_shadow_blocks() {
        let mut goto = ParsedNode::new("motion_goto");
        let menu = ParsedNode::new("motion_goto_menu").with_field("TO", Field::new("_random_", None));
        goto.set_input("TO", InputValue::Menu(Box::new(menu)));
        let (blocks, head) = emit(&[goto]);
        let Input::Shadow(Slot::Block(menu_id)) = &blocks.get(&head).unwrap().inputs["TO"] else {
            panic!("menu should be a shadow input");
        };
        let menu = blocks.get(menu_id).unwrap();
        assert!(menu.shadow);
        assert_eq!(menu.parent.as_ref(), Some(&head));
    }

    #[test]
    fn definitions_carry_prototypes() {
        let mut define = ParsedNode::new("procedures_definition");
        define.procedure = Some(ProcedureSignature {
            proccode: "jump %s".into(),
            arg_names: vec!["height".into()],
            arg_ids: vec!["arg_1".into()],
            warp: true,
            prototype_id: "proc_proto_2".into(),
        });
        let (blocks, head) = emit(&[define.clone()]);
        let definition = blocks.get(&head).unwrap();
        let proto_id = definition.input_block("custom_block").unwrap();
        assert_eq!(proto_id.as_str(), "proc_proto_2");
        let proto = blocks.get(proto_id).unwrap();
        assert!(proto.shadow);
        assert_eq!(proto.parent.as_ref(), Some(&head));
        assert!(proto.mutation.as_ref().unwrap().warp);
        let arg = blocks.get(proto.input_block("arg_1").unwrap()).unwrap();
        assert_eq!(arg.fields["VALUE"], Field::new("height", None));

        // A second definition with the same signature gets its own prototype.
        let mut ids = IdGen::new();
        let mut map = BlockMap::new();
        let mut emitter = Emitter::new(&mut ids, &mut map);
        let a = emitter.emit_script(&[define.clone()], 0, 0).unwrap();
        let b = emitter.emit_script(&[define], 0, 120).unwrap();
        assert_ne!(map.get(&a).unwrap().input_block("custom_block"), map.get(&b).unwrap().input_block("custom_block"));
    }

    #[test]
    fn branches_fill_substacks() {
        let mut branch = ParsedNode::new("control_if_else");
        branch.children = vec![ParsedNode::new("looks_show"), ParsedNode::new("looks_hide")];
        branch.children2 = vec![ParsedNode::new("looks_hide")];
        let (blocks, head) = emit(&[branch]);
        let block = blocks.get(&head).unwrap();
        let first = blocks.get(block.input_block("SUBSTACK").unwrap()).unwrap();
        assert_eq!(first.opcode, "looks_show");
        let second = blocks.get(first.next.as_ref().unwrap()).unwrap();
        assert_eq!(second.next, None);
        let other = blocks.get(block.input_block("SUBSTACK2").unwrap()).unwrap();
        assert_eq!(other.parent.as_ref(), Some(&head));
        assert_eq!(block.next, None);
    }
}
