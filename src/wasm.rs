use wasm_bindgen::prelude::*;

/// scratchblocks text to the JSON block map of one target.
#[wasm_bindgen]
pub fn text_to_blocks_json(source: &str) -> Result<String, JsValue> {
    let (blocks, _) = crate::convert_text(source, true);
    serde_json::to_string(&blocks.to_json()).map_err(|e| JsValue::from_str(&e.to_string()))
}

#[wasm_bindgen]
pub fn blocks_json_to_text(json: &str) -> Result<String, JsValue> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(crate::blocks_to_text(&crate::blocks::BlockMap::from_json(&value)))
}
