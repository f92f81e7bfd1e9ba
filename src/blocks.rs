use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(String);

impl BlockId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BlockId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for BlockId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A primitive value as stored in project JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn to_json(&self) -> Value {
        match self {
            Scalar::Int(v) => json!(v),
            Scalar::Float(v) => json!(v),
            Scalar::Text(v) => json!(v),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) => Scalar::Int(i),
                None => Scalar::Float(n.as_f64().unwrap_or(0.0)),
            },
            Value::String(s) => Scalar::Text(s.clone()),
            Value::Null => Scalar::Text(String::new()),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{}", v),
            // Debug keeps the trailing ".0" on whole floats.
            Scalar::Float(v) => write!(f, "{:?}", v),
            Scalar::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    /// Kinds 4 to 8: number, positive number, whole number, integer, angle.
    Number { kind: u8, value: Scalar },
    Color(String),
    Text(String),
    Broadcast { name: String, id: String },
    Variable { name: String, id: String },
    List { name: String, id: String },
}

impl Primitive {
    pub fn number(value: Scalar) -> Self {
        Primitive::Number { kind: 4, value }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Primitive::Number { kind, value } => json!([kind, value.to_json()]),
            Primitive::Color(v) => json!([9, v]),
            Primitive::Text(v) => json!([10, v]),
            Primitive::Broadcast { name, id } => json!([11, name, id]),
            Primitive::Variable { name, id } => json!([12, name, id]),
            Primitive::List { name, id } => json!([13, name, id]),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        let kind = arr.first()?.as_u64()?;
        let text_at = |idx: usize| -> String {
            match arr.get(idx) {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Null) | None => String::new(),
                Some(other) => Scalar::from_json(other).to_string(),
            }
        };
        let prim = match kind {
            4..=8 => Primitive::Number {
                kind: kind as u8,
                value: arr.get(1).map(Scalar::from_json).unwrap_or(Scalar::Text(String::new())),
            },
            9 => Primitive::Color(text_at(1)),
            10 => Primitive::Text(text_at(1)),
            11 => Primitive::Broadcast {
                name: text_at(1),
                id: text_at(2),
            },
            12 => Primitive::Variable {
                name: text_at(1),
                id: text_at(2),
            },
            13 => Primitive::List {
                name: text_at(1),
                id: text_at(2),
            },
            _ => return None,
        };
        Some(prim)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    Block(BlockId),
    Primitive(Primitive),
    Empty,
}

impl Slot {
    fn to_json(&self) -> Value {
        match self {
            Slot::Block(id) => json!(id.as_str()),
            Slot::Primitive(p) => p.to_json(),
            Slot::Empty => Value::Null,
        }
    }

    fn from_json(value: Option<&Value>) -> Self {
        match value {
            Some(Value::String(id)) => Slot::Block(BlockId::new(id.clone())),
            Some(other) => Primitive::from_json(other)
                .map(Slot::Primitive)
                .unwrap_or(Slot::Empty),
            None => Slot::Empty,
        }
    }

    pub fn block_id(&self) -> Option<&BlockId> {
        match self {
            Slot::Block(id) => Some(id),
            _ => None,
        }
    }
}

/// `[1, shadow]`, `[2, block]` or `[3, block, shadow]`.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Shadow(Slot),
    NoShadow(Slot),
    Obscured { value: Slot, shadow: Slot },
}

impl Input {
    /// The slot that is actually visible in the editor.
    pub fn value(&self) -> &Slot {
        match self {
            Input::Shadow(slot) | Input::NoShadow(slot) => slot,
            Input::Obscured { value, .. } => value,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            Input::Shadow(slot) => json!([1, slot.to_json()]),
            Input::NoShadow(slot) => json!([2, slot.to_json()]),
            Input::Obscured { value, shadow } => json!([3, value.to_json(), shadow.to_json()]),
        }
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        let kind = arr.first()?.as_u64()?;
        let input = match kind {
            1 => Input::Shadow(Slot::from_json(arr.get(1))),
            2 => Input::NoShadow(Slot::from_json(arr.get(1))),
            3 => Input::Obscured {
                value: Slot::from_json(arr.get(1)),
                shadow: Slot::from_json(arr.get(2)),
            },
            _ => return None,
        };
        Some(input)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub value: String,
    pub id: Option<String>,
}

impl Field {
    pub fn new(value: impl Into<String>, id: Option<String>) -> Self {
        Self {
            value: value.into(),
            id,
        }
    }

    fn to_json(&self) -> Value {
        json!([self.value, self.id])
    }

    fn from_json(value: &Value) -> Option<Self> {
        let arr = value.as_array()?;
        let value = match arr.first() {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => Scalar::from_json(other).to_string(),
        };
        let id = arr.get(1).and_then(Value::as_str).map(str::to_string);
        Some(Self { value, id })
    }
}

/// Procedure metadata. Argument arrays travel as JSON-encoded strings.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mutation {
    pub proccode: Option<String>,
    pub argument_ids: Vec<String>,
    pub argument_names: Vec<String>,
    pub argument_defaults: Vec<Value>,
    pub warp: bool,
    pub extra: Map<String, Value>,
}

impl Mutation {
    pub fn procedure(proccode: &str, arg_ids: &[String], arg_names: &[String], warp: bool) -> Self {
        Self {
            proccode: Some(proccode.to_string()),
            argument_ids: arg_ids.to_vec(),
            argument_names: arg_names.to_vec(),
            argument_defaults: arg_names.iter().map(|_| json!("")).collect(),
            warp,
            extra: Map::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        let mut obj = self.extra.clone();
        obj.insert("tagName".to_string(), json!("mutation"));
        obj.entry("children").or_insert_with(|| json!([]));
        if let Some(proccode) = &self.proccode {
            obj.insert("proccode".to_string(), json!(proccode));
            obj.insert("argumentids".to_string(), json!(encode_list(&self.argument_ids)));
            obj.insert(
                "argumentnames".to_string(),
                json!(encode_list(&self.argument_names)),
            );
            obj.insert(
                "argumentdefaults".to_string(),
                json!(Value::Array(self.argument_defaults.clone()).to_string()),
            );
            obj.insert(
                "warp".to_string(),
                json!(if self.warp { "true" } else { "false" }),
            );
        }
        Value::Object(obj)
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let mut extra = obj.clone();
        let proccode = extra
            .remove("proccode")
            .and_then(|v| v.as_str().map(str::to_string));
        let argument_ids = decode_list(extra.remove("argumentids"));
        let argument_names = decode_list(extra.remove("argumentnames"));
        let argument_defaults = extra
            .remove("argumentdefaults")
            .and_then(|v| v.as_str().and_then(|s| serde_json::from_str::<Vec<Value>>(s).ok()))
            .unwrap_or_default();
        let warp = match extra.remove("warp") {
            Some(Value::Bool(b)) => b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        Some(Self {
            proccode,
            argument_ids,
            argument_names,
            argument_defaults,
            warp,
            extra,
        })
    }
}

fn encode_list(items: &[String]) -> String {
    Value::Array(items.iter().map(|s| json!(s)).collect()).to_string()
}

fn decode_list(raw: Option<Value>) -> Vec<String> {
    let parsed = match raw {
        Some(Value::String(s)) => serde_json::from_str::<Vec<Value>>(&s).unwrap_or_default(),
        Some(Value::Array(items)) => items,
        _ => Vec::new(),
    };
    parsed
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub opcode: String,
    pub next: Option<BlockId>,
    pub parent: Option<BlockId>,
    pub inputs: BTreeMap<String, Input>,
    pub fields: BTreeMap<String, Field>,
    pub shadow: bool,
    pub top_level: bool,
    pub position: Option<(i64, i64)>,
    pub mutation: Option<Mutation>,
}

impl Block {
    pub fn new(opcode: impl Into<String>, parent: Option<BlockId>) -> Self {
        Self {
            opcode: opcode.into(),
            next: None,
            parent,
            inputs: BTreeMap::new(),
            fields: BTreeMap::new(),
            shadow: false,
            top_level: false,
            position: None,
            mutation: None,
        }
    }

    pub fn input_block(&self, name: &str) -> Option<&BlockId> {
        self.inputs.get(name).and_then(|input| input.value().block_id())
    }

    pub fn to_json(&self) -> Value {
        let inputs = self
            .inputs
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>();
        let fields = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_json()))
            .collect::<Map<_, _>>();
        let mut obj = Map::new();
        obj.insert("opcode".to_string(), json!(self.opcode));
        obj.insert(
            "next".to_string(),
            json!(self.next.as_ref().map(BlockId::as_str)),
        );
        obj.insert(
            "parent".to_string(),
            json!(self.parent.as_ref().map(BlockId::as_str)),
        );
        obj.insert("inputs".to_string(), Value::Object(inputs));
        obj.insert("fields".to_string(), Value::Object(fields));
        obj.insert("shadow".to_string(), json!(self.shadow));
        obj.insert("topLevel".to_string(), json!(self.top_level));
        if let Some((x, y)) = self.position {
            obj.insert("x".to_string(), json!(x));
            obj.insert("y".to_string(), json!(y));
        }
        if let Some(mutation) = &self.mutation {
            obj.insert("mutation".to_string(), mutation.to_json());
        }
        Value::Object(obj)
    }

    pub fn from_json(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let id_at = |key: &str| obj.get(key).and_then(Value::as_str).map(BlockId::from);
        let mut block = Block::new(obj.get("opcode").and_then(Value::as_str)?, id_at("parent"));
        block.next = id_at("next");
        if let Some(inputs) = obj.get("inputs").and_then(Value::as_object) {
            for (name, raw) in inputs {
                if let Some(input) = Input::from_json(raw) {
                    block.inputs.insert(name.clone(), input);
                }
            }
        }
        if let Some(fields) = obj.get("fields").and_then(Value::as_object) {
            for (name, raw) in fields {
                if let Some(field) = Field::from_json(raw) {
                    block.fields.insert(name.clone(), field);
                }
            }
        }
        block.shadow = obj.get("shadow").and_then(Value::as_bool).unwrap_or(false);
        block.top_level = obj.get("topLevel").and_then(Value::as_bool).unwrap_or(false);
        block.position = read_position(obj.get("x"), obj.get("y"));
        block.mutation = obj.get("mutation").and_then(Mutation::from_json);
        Some(block)
    }
}

fn read_position(x: Option<&Value>, y: Option<&Value>) -> Option<(i64, i64)> {
    let x = x.and_then(Value::as_f64)?;
    let y = y.and_then(Value::as_f64)?;
    Some((x.round() as i64, y.round() as i64))
}

/// Id-keyed block arena for one target. Remembers insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockMap {
    order: Vec<BlockId>,
    blocks: HashMap<BlockId, Block>,
}

impl BlockMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: BlockId, block: Block) {
        if !self.blocks.contains_key(&id) {
            self.order.push(id.clone());
        }
        self.blocks.insert(id, block);
    }

    pub fn get(&self, id: &BlockId) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn get_mut(&mut self, id: &BlockId) -> Option<&mut Block> {
        self.blocks.get_mut(id)
    }

    pub fn contains(&self, id: &BlockId) -> bool {
        self.blocks.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BlockId, &Block)> {
        self.order
            .iter()
            .filter_map(|id| self.blocks.get(id).map(|block| (id, block)))
    }

    pub fn top_level_ids(&self) -> Vec<BlockId> {
        self.iter()
            .filter(|(_, block)| block.top_level)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn to_json(&self) -> Value {
        Value::Object(
            self.iter()
                .map(|(id, block)| (id.to_string(), block.to_json()))
                .collect(),
        )
    }

    /// Lenient reader: malformed entries are skipped, and loose variable or
    /// list reporters stored as `[12|13, name, id, x, y]` become real blocks.
    pub fn from_json(value: &Value) -> Self {
        let mut map = BlockMap::new();
        let Some(obj) = value.as_object() else {
            return map;
        };
        for (id, raw) in obj {
            if let Some(block) = Block::from_json(raw) {
                map.insert(BlockId::new(id.clone()), block);
                continue;
            }
            if let Some(block) = loose_reporter_from_array(raw) {
                map.insert(BlockId::new(id.clone()), block);
                continue;
            }
            tracing::debug!("skipping malformed block entry '{}'", id);
        }
        map
    }
}

fn loose_reporter_from_array(raw: &Value) -> Option<Block> {
    let arr = raw.as_array()?;
    let kind = arr.first()?.as_u64()?;
    let (opcode, field_name) = match kind {
        12 => ("data_variable", "VARIABLE"),
        13 => ("data_listcontents", "LIST"),
        _ => return None,
    };
    let name = arr.get(1).and_then(Value::as_str).unwrap_or_default();
    let id = arr.get(2).and_then(Value::as_str).map(str::to_string);
    let mut block = Block::new(opcode, None);
    block.fields.insert(field_name.to_string(), Field::new(name, id));
    block.top_level = true;
    block.position = read_position(arr.get(3), arr.get(4)).or(Some((0, 0)));
    Some(block)
}
