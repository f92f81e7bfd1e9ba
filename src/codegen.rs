use crate::assets::{
    cleaned_asset_name, extension, md5_name, probe_image_size, COSTUME_META, COSTUME_NAME_MAP,
    DEFAULT_COSTUME_SVG, SOUND_NAME_MAP,
};
use crate::blocks::BlockMap;
use crate::catalog::extension_for_opcode;
use crate::diagnostics::{DiagnosticCollector, DiagnosticContext};
use crate::error::ProjectError;
use crate::folder::{
    read_json_lenient, CostumeMetaMap, EventsFile, MiscData, NameMap, VariablesFile, CODE_FILE,
    COSTUMES_DIR, EVENTS_FILE, MISC_FILE, SOUNDS_DIR, SPRITES_DIR, STAGE_DIR, VARIABLES_FILE,
};
use crate::scope::{IdGen, NameTable, Scope, TargetNames};
use crate::{text_to_blocks, ConversionReport, ConvertOptions};
use anyhow::{Context, Result};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

type CodegenProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

pub fn pack_folder(input_dir: &Path, output_path: &Path, options: ConvertOptions) -> Result<ConversionReport> {
    pack_folder_with_progress(
        input_dir,
        output_path,
        options,
        Option::<&mut fn(usize, usize, &str)>::None,
    )
}

pub fn pack_folder_with_progress<F>(
    input_dir: &Path,
    output_path: &Path,
    options: ConvertOptions,
    progress: Option<&mut F>,
) -> Result<ConversionReport>
where
    F: FnMut(usize, usize, &str),
{
    let (bytes, report) = build_sb3_bytes_with_progress(input_dir, options, progress)?;
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(output_path, bytes)
        .with_context(|| format!("Failed to write '{}'.", output_path.display()))?;
    Ok(report)
}

pub fn build_sb3_bytes(input_dir: &Path, options: ConvertOptions) -> Result<(Vec<u8>, ConversionReport)> {
    build_sb3_bytes_with_progress(
        input_dir,
        options,
        Option::<&mut fn(usize, usize, &str)>::None,
    )
}

/// Parse every target of a project folder and zip the resulting `project.json`
/// together with its content-addressed assets.
pub fn build_sb3_bytes_with_progress<F>(
    input_dir: &Path,
    options: ConvertOptions,
    progress: Option<&mut F>,
) -> Result<(Vec<u8>, ConversionReport)>
where
    F: FnMut(usize, usize, &str),
{
    if !input_dir.exists() {
        return Err(ProjectError::InputNotFound {
            path: input_dir.to_path_buf(),
        }
        .into());
    }
    if !input_dir.is_dir() {
        return Err(ProjectError::NotADirectory {
            path: input_dir.to_path_buf(),
        }
        .into());
    }

    let mut progress = progress.map(|cb| cb as &mut CodegenProgressCallback<'_>);
    let mut builder = ProjectBuilder::new(input_dir, options);
    let project_json = builder.build_with_progress(&mut progress)?;

    let mut buffer = Cursor::new(Vec::<u8>::new());
    let mut zip = zip::ZipWriter::new(&mut buffer);
    let opts = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    report_progress(&mut progress, 1, 1, "Writing project.json");
    zip.start_file("project.json", opts)?;
    let project_bytes = serde_json::to_vec_pretty(&project_json)?;
    zip.write_all(&project_bytes)?;

    // BTreeMap keys are md5ext names: already unique and sorted.
    let assets = std::mem::take(&mut builder.assets);
    let asset_total = assets.len().max(1);
    if assets.is_empty() {
        report_progress(&mut progress, 1, 1, "Packaging assets");
    }
    for (index, (name, bytes)) in assets.into_iter().enumerate() {
        zip.start_file(name, opts)?;
        zip.write_all(&bytes)?;
        report_progress(&mut progress, index + 1, asset_total, "Packaging assets");
    }
    zip.finish()?;

    let report = ConversionReport {
        diagnostics: builder.diagnostics.into_vec(),
    };
    Ok((buffer.into_inner(), report))
}

fn report_progress(
    progress: &mut Option<&mut CodegenProgressCallback<'_>>,
    step: usize,
    total: usize,
    label: &str,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(step, total, label);
    }
}

/// Declared names of one target plus the file entries they came from.
struct TargetVariables {
    file: VariablesFile,
    names: TargetNames,
}

struct ProjectBuilder<'a> {
    root: &'a Path,
    options: ConvertOptions,
    ids: IdGen,
    broadcasts: NameTable,
    assets: BTreeMap<String, Vec<u8>>,
    extensions: BTreeSet<String>,
    monitors: Vec<Value>,
    diagnostics: DiagnosticCollector,
}

impl<'a> ProjectBuilder<'a> {
    fn new(root: &'a Path, options: ConvertOptions) -> Self {
        Self {
            root,
            options,
            ids: IdGen::new(),
            broadcasts: NameTable::new(),
            assets: BTreeMap::new(),
            extensions: BTreeSet::new(),
            monitors: Vec::new(),
            diagnostics: DiagnosticCollector::new(),
        }
    }

    fn build_with_progress(
        &mut self,
        progress: &mut Option<&mut CodegenProgressCallback<'_>>,
    ) -> Result<Value> {
        let events: EventsFile = read_json_lenient(&self.root.join(EVENTS_FILE));
        for name in &events.broadcasts {
            self.broadcasts.get_or_insert(name, &mut self.ids, "broadcast");
        }

        let sprite_dirs = list_sprite_dirs(&self.root.join(SPRITES_DIR))?;
        let total = sprite_dirs.len() + 1;

        let stage_dir = self.root.join(STAGE_DIR);
        let stage_file = read_json_lenient(&self.root.join(VARIABLES_FILE));
        let mut stage_vars = self.declare_variables(stage_file, None);
        let stage_blocks =
            self.parse_target_code(&stage_dir, "Stage", &mut stage_vars.names, &TargetNames::default())?;
        report_progress(progress, 1, total, "Parsing targets");

        let mut sprites = Vec::with_capacity(sprite_dirs.len());
        for (idx, dir) in sprite_dirs.iter().enumerate() {
            sprites.push(self.build_sprite(dir, idx + 1, &stage_vars.names)?);
            report_progress(progress, idx + 2, total, "Parsing targets");
        }

        // Broadcasts first seen in sprite scripts must be declared too.
        let stage = self.build_stage(&stage_dir, stage_vars, stage_blocks)?;
        let mut targets = vec![stage];
        targets.extend(sprites);

        let extensions: Vec<&String> = self.extensions.iter().collect();
        Ok(json!({
            "targets": targets,
            "monitors": std::mem::take(&mut self.monitors),
            "extensions": extensions,
            "meta": {
                "semver": "3.0.0",
                "vm": "0.2.0",
                "agent": "",
                "platform": {"name": "TurboWarp", "url": "https://turbowarp.org/"}
            }
        }))
    }

    /// Allocate ids for the declared names of one target and rebuild their monitors.
    fn declare_variables(&mut self, file: VariablesFile, sprite_name: Option<&str>) -> TargetVariables {
        let mut names = TargetNames::default();
        for entry in &file.variables {
            let id = names.variables.get_or_insert(&entry.name, &mut self.ids, "var");
            if let Some(monitor) = &entry.monitor {
                self.monitors.push(json!({
                    "id": id,
                    "mode": monitor.mode,
                    "opcode": "data_variable",
                    "params": {"VARIABLE": entry.name},
                    "spriteName": sprite_name,
                    "value": entry.value,
                    "width": 0,
                    "height": 0,
                    "x": monitor.x,
                    "y": monitor.y,
                    "visible": monitor.visible,
                    "sliderMin": monitor.slider_min,
                    "sliderMax": monitor.slider_max,
                    "isDiscrete": monitor.is_discrete
                }));
            }
        }
        for entry in &file.lists {
            let id = names.lists.get_or_insert(&entry.name, &mut self.ids, "list");
            if let Some(monitor) = &entry.monitor {
                self.monitors.push(json!({
                    "id": id,
                    "mode": "list",
                    "opcode": "data_listcontents",
                    "params": {"LIST": entry.name},
                    "spriteName": sprite_name,
                    "value": entry.value,
                    "width": monitor.width,
                    "height": monitor.height,
                    "x": monitor.x,
                    "y": monitor.y,
                    "visible": monitor.visible
                }));
            }
        }
        TargetVariables { file, names }
    }

    fn parse_target_code(
        &mut self,
        dir: &Path,
        target_name: &str,
        locals: &mut TargetNames,
        globals: &TargetNames,
    ) -> Result<BlockMap> {
        let code_path = dir.join(CODE_FILE);
        let source = if code_path.is_file() {
            fs::read_to_string(&code_path)
                .with_context(|| format!("Failed to read '{}'.", code_path.display()))?
        } else {
            String::new()
        };

        let mut diag = DiagnosticContext::new(target_name);
        let blocks = {
            let scope = Scope::new(&mut self.ids, &mut self.broadcasts, locals, globals);
            text_to_blocks(&source, scope, Some(&mut diag), self.options.layout)
        };
        self.diagnostics.extend(diag);
        for (_, block) in blocks.iter() {
            if let Some(ext) = extension_for_opcode(&block.opcode) {
                self.extensions.insert(ext.to_string());
            }
        }
        Ok(blocks)
    }

    fn build_sprite(&mut self, dir: &Path, index: usize, globals: &TargetNames) -> Result<Value> {
        let misc: MiscData = read_json_lenient(&dir.join(MISC_FILE));
        let dir_name = dir.file_name().and_then(|n| n.to_str()).unwrap_or("Sprite");
        let name = misc.name.clone().unwrap_or_else(|| dir_name.to_string());

        let file = read_json_lenient(&dir.join(VARIABLES_FILE));
        let mut vars = self.declare_variables(file, Some(name.as_str()));
        let blocks = self.parse_target_code(dir, &name, &mut vars.names, globals)?;
        let costumes = self.prepare_costumes(&dir.join(COSTUMES_DIR), false)?;
        let sounds = self.prepare_sounds(&dir.join(SOUNDS_DIR))?;
        let current_costume = if misc.current_costume < costumes.len() {
            misc.current_costume
        } else {
            0
        };

        Ok(json!({
            "isStage": false,
            "name": name,
            "variables": variables_json(&vars),
            "lists": lists_json(&vars),
            "broadcasts": {},
            "blocks": blocks.to_json(),
            "comments": {},
            "currentCostume": current_costume,
            "costumes": costumes,
            "sounds": sounds,
            "volume": misc.volume,
            "layerOrder": misc.layer.unwrap_or(index as i64),
            "visible": misc.visible,
            "x": misc.position.x,
            "y": misc.position.y,
            "size": misc.size,
            "direction": misc.direction,
            "draggable": misc.draggable,
            "rotationStyle": misc.rotation_style
        }))
    }

    fn build_stage(&mut self, dir: &Path, vars: TargetVariables, blocks: BlockMap) -> Result<Value> {
        let costumes = self.prepare_costumes(&dir.join(COSTUMES_DIR), true)?;
        let sounds = self.prepare_sounds(&dir.join(SOUNDS_DIR))?;
        let broadcasts: Map<String, Value> = self
            .broadcasts
            .iter()
            .map(|(name, id)| (id.to_string(), Value::String(name.to_string())))
            .collect();

        Ok(json!({
            "isStage": true,
            "name": "Stage",
            "variables": variables_json(&vars),
            "lists": lists_json(&vars),
            "broadcasts": broadcasts,
            "blocks": blocks.to_json(),
            "comments": {},
            "currentCostume": 0,
            "costumes": costumes,
            "sounds": sounds,
            "volume": 100,
            "layerOrder": 0,
            "tempo": 60,
            "videoTransparency": 50,
            "videoState": "on",
            "textToSpeechLanguage": null
        }))
    }

    fn prepare_costumes(&mut self, dir: &Path, is_stage: bool) -> Result<Vec<Value>> {
        let names: NameMap = read_json_lenient(&dir.join(COSTUME_NAME_MAP));
        let meta: CostumeMetaMap = read_json_lenient(&dir.join(COSTUME_META));
        let mut out = Vec::new();
        for (file_name, path) in list_asset_files(dir, &[COSTUME_NAME_MAP, COSTUME_META])? {
            let data = fs::read(&path).with_context(|| format!("Failed to read '{}'.", path.display()))?;
            let ext = extension(&file_name);
            let entry_meta = meta.get(&file_name).cloned().unwrap_or_default();
            let half_size = probe_image_size(&data, &ext).map(|(w, h)| (w / 2.0, h / 2.0));
            let center_x = entry_meta
                .rotation_center_x
                .or(half_size.map(|(x, _)| x))
                .unwrap_or(0.0);
            let center_y = entry_meta
                .rotation_center_y
                .or(half_size.map(|(_, y)| y))
                .unwrap_or(0.0);
            let resolution = entry_meta
                .bitmap_resolution
                .unwrap_or(if ext == "svg" { 1.0 } else { 2.0 });
            let name = names
                .get(&file_name)
                .cloned()
                .unwrap_or_else(|| cleaned_asset_name(&file_name));
            let (asset_id, md5ext) = md5_name(&data, &ext);
            self.assets.insert(md5ext.clone(), data);
            out.push(json!({
                "name": name,
                "assetId": asset_id,
                "md5ext": md5ext,
                "dataFormat": ext,
                "bitmapResolution": resolution,
                "rotationCenterX": center_x,
                "rotationCenterY": center_y
            }));
        }

        if out.is_empty() {
            let data = DEFAULT_COSTUME_SVG.as_bytes().to_vec();
            let (asset_id, md5ext) = md5_name(&data, "svg");
            self.assets.insert(md5ext.clone(), data);
            out.push(json!({
                "name": if is_stage { "backdrop1" } else { "costume1" },
                "assetId": asset_id,
                "md5ext": md5ext,
                "dataFormat": "svg",
                "bitmapResolution": 1,
                "rotationCenterX": 0.5,
                "rotationCenterY": 0.5
            }));
        }
        Ok(out)
    }

    fn prepare_sounds(&mut self, dir: &Path) -> Result<Vec<Value>> {
        let names: NameMap = read_json_lenient(&dir.join(SOUND_NAME_MAP));
        let mut out = Vec::new();
        for (file_name, path) in list_asset_files(dir, &[SOUND_NAME_MAP])? {
            let data = fs::read(&path).with_context(|| format!("Failed to read '{}'.", path.display()))?;
            let ext = extension(&file_name);
            let name = names
                .get(&file_name)
                .cloned()
                .unwrap_or_else(|| cleaned_asset_name(&file_name));
            let (asset_id, md5ext) = md5_name(&data, &ext);
            self.assets.insert(md5ext.clone(), data);
            out.push(json!({
                "name": name,
                "assetId": asset_id,
                "dataFormat": ext,
                "format": "",
                "rate": 0,
                "sampleCount": 0,
                "md5ext": md5ext
            }));
        }
        Ok(out)
    }
}

/// `{id: [name, value, cloud?]}` for every declared or auto-created variable.
fn variables_json(vars: &TargetVariables) -> Map<String, Value> {
    vars.names
        .variables
        .iter()
        .map(|(name, id)| {
            let payload = vars
                .file
                .variables
                .iter()
                .find(|entry| entry.name == name)
                .map(|entry| entry.to_sb3())
                .unwrap_or_else(|| json!([name, 0]));
            (id.to_string(), payload)
        })
        .collect()
}

fn lists_json(vars: &TargetVariables) -> Map<String, Value> {
    vars.names
        .lists
        .iter()
        .map(|(name, id)| {
            let value = vars
                .file
                .lists
                .iter()
                .find(|entry| entry.name == name)
                .map(|entry| entry.value.clone())
                .unwrap_or_else(|| json!([]));
            (id.to_string(), json!([name, value]))
        })
        .collect()
}

fn list_sprite_dirs(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut dirs = fs::read_dir(dir)
        .with_context(|| format!("Failed to list '{}'.", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_dir())
        .collect::<Vec<_>>();
    dirs.sort();
    Ok(dirs)
}

/// Regular files of an asset folder in name order, minus the bookkeeping files.
fn list_asset_files(dir: &Path, skip: &[&str]) -> Result<Vec<(String, PathBuf)>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list '{}'.", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()).map(str::to_string) else {
            tracing::warn!("skipping asset with non UTF-8 name: '{}'", path.display());
            continue;
        };
        if file_name.starts_with('.') || skip.contains(&file_name.as_str()) {
            continue;
        }
        files.push((file_name, path));
    }
    files.sort();
    Ok(files)
}
