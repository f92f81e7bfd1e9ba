use crate::blocks::{Field, Input, Mutation};

/// One input slot of a parsed line, resolved before emission.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Literal(Input),
    /// A reporter or boolean written inline.
    Node(Box<ParsedNode>),
    /// A dropdown that becomes a shadow block.
    Menu(Box<ParsedNode>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureSignature {
    pub proccode: String,
    pub arg_names: Vec<String>,
    pub arg_ids: Vec<String>,
    pub warp: bool,
    pub prototype_id: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedNode {
    pub opcode: String,
    pub inputs: Vec<(String, InputValue)>,
    pub fields: Vec<(String, Field)>,
    pub mutation: Option<Mutation>,
    pub children: Vec<ParsedNode>,
    pub children2: Vec<ParsedNode>,
    pub procedure: Option<ProcedureSignature>,
}

impl ParsedNode {
    pub fn new(opcode: impl Into<String>) -> Self {
        Self {
            opcode: opcode.into(),
            ..Self::default()
        }
    }

    pub fn set_input(&mut self, name: impl Into<String>, value: InputValue) {
        let name = name.into();
        match self.inputs.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = value,
            None => self.inputs.push((name, value)),
        }
    }

    pub fn set_field(&mut self, name: impl Into<String>, field: Field) {
        let name = name.into();
        match self.fields.iter_mut().find(|(key, _)| *key == name) {
            Some(slot) => slot.1 = field,
            None => self.fields.push((name, field)),
        }
    }

    pub fn input(&self, name: &str) -> Option<&InputValue> {
        self.inputs.iter().find(|(key, _)| key == name).map(|(_, v)| v)
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|(key, _)| key == name).map(|(_, f)| f)
    }

    pub fn with_field(mut self, name: impl Into<String>, field: Field) -> Self {
        self.set_field(name, field);
        self
    }
}
