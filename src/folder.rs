//! Typed views of the JSON files kept next to each target's `code.scratchblocks`.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

pub const CODE_FILE: &str = "code.scratchblocks";
pub const VARIABLES_FILE: &str = "variables.json";
pub const EVENTS_FILE: &str = "events.json";
pub const MISC_FILE: &str = "miscdata.json";
pub const STAGE_DIR: &str = "Stage";
pub const SPRITES_DIR: &str = "Sprites";
pub const COSTUMES_DIR: &str = "Assets";
pub const SOUNDS_DIR: &str = "Sounds";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VariablesFile {
    #[serde(default)]
    pub variables: Vec<VariableEntry>,
    #[serde(default)]
    pub lists: Vec<ListEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableEntry {
    #[serde(default = "default_variable_name")]
    pub name: String,
    #[serde(default = "zero")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "is_false")]
    pub cloud: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<VariableMonitor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableMonitor {
    #[serde(default)]
    pub visible: bool,
    #[serde(default = "default_mode")]
    pub mode: String,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub slider_min: f64,
    #[serde(default = "hundred")]
    pub slider_max: f64,
    #[serde(default = "yes")]
    pub is_discrete: bool,
}

impl Default for VariableMonitor {
    fn default() -> Self {
        Self {
            visible: false,
            mode: default_mode(),
            x: 0.0,
            y: 0.0,
            slider_min: 0.0,
            slider_max: 100.0,
            is_discrete: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListEntry {
    #[serde(default = "default_list_name")]
    pub name: String,
    #[serde(default = "empty_list")]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitor: Option<ListMonitor>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListMonitor {
    #[serde(default)]
    pub visible: bool,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventsFile {
    #[serde(default)]
    pub broadcasts: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// Sprite state that is not code, costumes or sounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiscData {
    #[serde(default)]
    pub position: Position,
    #[serde(default = "hundred")]
    pub size: f64,
    #[serde(default = "ninety")]
    pub direction: f64,
    #[serde(default = "yes")]
    pub visible: bool,
    #[serde(default = "default_rotation_style")]
    pub rotation_style: String,
    #[serde(default)]
    pub current_costume: usize,
    #[serde(default)]
    pub draggable: bool,
    #[serde(default = "hundred")]
    pub volume: f64,
    /// Absent means "use the sprite's position in the folder listing".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layer: Option<i64>,
    /// Original sprite name when the folder name had to be sanitised.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Default for MiscData {
    fn default() -> Self {
        Self {
            position: Position::default(),
            size: 100.0,
            direction: 90.0,
            visible: true,
            rotation_style: default_rotation_style(),
            current_costume: 0,
            draggable: false,
            volume: 100.0,
            layer: None,
            name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostumeMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_center_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation_center_y: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bitmap_resolution: Option<f64>,
}

/// File name in the asset folder to original display name.
pub type NameMap = BTreeMap<String, String>;
pub type CostumeMetaMap = BTreeMap<String, CostumeMeta>;

impl VariableEntry {
    /// sb3 `variables` payload: `[name, value]` plus a trailing `true` for cloud variables.
    pub fn to_sb3(&self) -> Value {
        if self.cloud {
            json!([self.name, self.value, true])
        } else {
            json!([self.name, self.value])
        }
    }
}

/// Missing files yield `T::default()`; malformed ones are errors.
pub fn read_json_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Ok(T::default());
    }
    let raw = fs::read_to_string(path).with_context(|| format!("Failed to read '{}'.", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in '{}'.", path.display()))
}

/// Like [`read_json_or_default`] but a malformed file is logged and ignored.
pub fn read_json_lenient<T: DeserializeOwned + Default>(path: &Path) -> T {
    read_json_or_default(path).unwrap_or_else(|err| {
        tracing::warn!("{:#}", err);
        T::default()
    })
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes).with_context(|| format!("Failed to write '{}'.", path.display()))
}

fn default_variable_name() -> String {
    "variable".to_string()
}

fn default_list_name() -> String {
    "list".to_string()
}

fn default_mode() -> String {
    "default".to_string()
}

fn default_rotation_style() -> String {
    "all around".to_string()
}

fn zero() -> Value {
    json!(0)
}

fn empty_list() -> Value {
    json!([])
}

fn hundred() -> f64 {
    100.0
}

fn ninety() -> f64 {
    90.0
}

fn yes() -> bool {
    true
}

fn is_false(value: &bool) -> bool {
    !*value
}
