use crate::assets::{safe_name, COSTUME_META, COSTUME_NAME_MAP, SOUND_NAME_MAP};
use crate::blocks::BlockMap;
use crate::error::{self, ProjectError};
use crate::folder::{
    write_json, CostumeMeta, CostumeMetaMap, EventsFile, ListEntry, ListMonitor, MiscData, NameMap,
    Position, VariableEntry, VariableMonitor, VariablesFile, CODE_FILE, COSTUMES_DIR, EVENTS_FILE,
    MISC_FILE, SOUNDS_DIR, SPRITES_DIR, STAGE_DIR, VARIABLES_FILE,
};
use crate::serializer::generate_target_code;
use crate::ConvertOptions;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek};
use std::path::Path;
use zip::ZipArchive;

type ExtractProgressCallback<'a> = dyn FnMut(usize, usize, &str) + 'a;

pub fn extract_sb3(input: &Path, output_dir: &Path, options: ConvertOptions) -> Result<()> {
    extract_sb3_with_progress(
        input,
        output_dir,
        options,
        Option::<&mut fn(usize, usize, &str)>::None,
    )
}

/// Unpack an `.sb3` into the editable folder layout: `Stage/`, `Sprites/<name>/`,
/// plus the project-wide `variables.json` and `events.json`.
pub fn extract_sb3_with_progress<F>(
    input: &Path,
    output_dir: &Path,
    options: ConvertOptions,
    progress: Option<&mut F>,
) -> Result<()>
where
    F: FnMut(usize, usize, &str),
{
    let mut progress = progress.map(|cb| cb as &mut ExtractProgressCallback<'_>);

    report_progress(&mut progress, 1, 3, "Reading archive");
    let mut archive = open_archive(input)?;
    let project = read_project_json(&mut archive, input)?;
    let targets = targets_of(&project, input)?;
    let monitors = project
        .get("monitors")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    report_progress(&mut progress, 2, 3, "Preparing output folder");
    if options.clean && output_dir.exists() {
        fs::remove_dir_all(output_dir)
            .with_context(|| format!("Failed to clean output folder '{}'.", output_dir.display()))?;
    }
    fs::create_dir_all(output_dir.join(SPRITES_DIR))?;
    fs::create_dir_all(output_dir.join(STAGE_DIR))?;

    report_progress(&mut progress, 3, 3, "Writing variables and events");
    let stage_vars = targets
        .iter()
        .find(|t| is_stage(t))
        .map(|stage| variables_file(stage, monitors))
        .unwrap_or_default();
    write_json(&output_dir.join(VARIABLES_FILE), &stage_vars)?;
    write_json(
        &output_dir.join(EVENTS_FILE),
        &EventsFile {
            broadcasts: collect_broadcasts(targets),
        },
    )?;

    let mut used_dirs = HashSet::new();
    for (idx, target) in targets.iter().enumerate() {
        report_progress(&mut progress, idx + 1, targets.len(), "Writing targets");
        write_target(target, &mut archive, output_dir, monitors, &mut used_dirs)?;
    }
    tracing::info!("extracted {} targets into '{}'", targets.len(), output_dir.display());
    Ok(())
}

fn report_progress(
    progress: &mut Option<&mut ExtractProgressCallback<'_>>,
    step: usize,
    total: usize,
    label: &str,
) {
    if let Some(cb) = progress.as_deref_mut() {
        cb(step, total, label);
    }
}

pub fn open_archive(path: &Path) -> error::Result<ZipArchive<File>> {
    let file = File::open(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => ProjectError::InputNotFound {
            path: path.to_path_buf(),
        },
        _ => ProjectError::Io(err),
    })?;
    ZipArchive::new(file).map_err(|source| ProjectError::InvalidArchive {
        path: path.to_path_buf(),
        source,
    })
}

pub fn read_project_json<R: Read + Seek>(archive: &mut ZipArchive<R>, path: &Path) -> error::Result<Value> {
    let mut raw = String::new();
    {
        let mut entry = archive
            .by_name("project.json")
            .map_err(|_| ProjectError::MissingProjectJson {
                path: path.to_path_buf(),
            })?;
        entry.read_to_string(&mut raw)?;
    }
    serde_json::from_str(&raw).map_err(|err| ProjectError::InvalidProjectJson {
        path: path.to_path_buf(),
        message: err.to_string(),
    })
}

fn targets_of<'v>(project: &'v Value, path: &Path) -> error::Result<&'v [Value]> {
    project
        .get("targets")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| ProjectError::InvalidProjectJson {
            path: path.to_path_buf(),
            message: "missing 'targets' array".to_string(),
        })
}

fn is_stage(target: &Value) -> bool {
    target.get("isStage").and_then(Value::as_bool).unwrap_or(false)
}

fn str_at<'v>(value: &'v Value, key: &str) -> Option<&'v str> {
    value.get(key).and_then(Value::as_str)
}

fn f64_at(value: &Value, key: &str, default: f64) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(default)
}

fn bool_at(value: &Value, key: &str, default: bool) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(default)
}

fn display_name(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Broadcast names in first-seen order across all targets.
pub fn collect_broadcasts(targets: &[Value]) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for target in targets {
        let Some(broadcasts) = target.get("broadcasts").and_then(Value::as_object) else {
            continue;
        };
        for name in broadcasts.values().map(display_name) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
    }
    names
}

/// Variables and lists of one target, with the monitor state that belongs to it.
pub fn variables_file(target: &Value, monitors: &[Value]) -> VariablesFile {
    let sprite_name = if is_stage(target) { None } else { str_at(target, "name") };
    let own_monitors: Vec<&Value> = monitors
        .iter()
        .filter(|m| str_at(m, "spriteName") == sprite_name)
        .collect();
    let monitor_for = |id: &str, opcode: &str| {
        own_monitors
            .iter()
            .copied()
            .find(|m| str_at(m, "id") == Some(id) && str_at(m, "opcode") == Some(opcode))
    };

    let mut out = VariablesFile::default();
    if let Some(variables) = target.get("variables").and_then(Value::as_object) {
        for (id, payload) in variables {
            let Some([name, value, rest @ ..]) = payload.as_array().map(Vec::as_slice) else {
                continue;
            };
            out.variables.push(VariableEntry {
                name: display_name(name),
                value: value.clone(),
                cloud: rest.first() == Some(&Value::Bool(true)),
                monitor: monitor_for(id, "data_variable").map(|m| VariableMonitor {
                    visible: bool_at(m, "visible", false),
                    mode: str_at(m, "mode").unwrap_or("default").to_string(),
                    x: f64_at(m, "x", 0.0),
                    y: f64_at(m, "y", 0.0),
                    slider_min: f64_at(m, "sliderMin", 0.0),
                    slider_max: f64_at(m, "sliderMax", 100.0),
                    is_discrete: bool_at(m, "isDiscrete", true),
                }),
            });
        }
    }
    if let Some(lists) = target.get("lists").and_then(Value::as_object) {
        for (id, payload) in lists {
            let Some([name, value, ..]) = payload.as_array().map(Vec::as_slice) else {
                continue;
            };
            out.lists.push(ListEntry {
                name: display_name(name),
                value: value.clone(),
                monitor: monitor_for(id, "data_listcontents").map(|m| ListMonitor {
                    visible: bool_at(m, "visible", false),
                    x: f64_at(m, "x", 0.0),
                    y: f64_at(m, "y", 0.0),
                    width: f64_at(m, "width", 0.0),
                    height: f64_at(m, "height", 0.0),
                }),
            });
        }
    }
    out
}

pub fn misc_data(target: &Value) -> MiscData {
    MiscData {
        position: Position {
            x: f64_at(target, "x", 0.0),
            y: f64_at(target, "y", 0.0),
        },
        size: f64_at(target, "size", 100.0),
        direction: f64_at(target, "direction", 90.0),
        visible: bool_at(target, "visible", true),
        rotation_style: str_at(target, "rotationStyle").unwrap_or("all around").to_string(),
        current_costume: target.get("currentCostume").and_then(Value::as_u64).unwrap_or(0) as usize,
        draggable: bool_at(target, "draggable", false),
        volume: f64_at(target, "volume", 100.0),
        layer: Some(target.get("layerOrder").and_then(Value::as_i64).unwrap_or(0)),
        name: None,
    }
}

fn unique_dir_name(name: &str, used: &mut HashSet<String>) -> String {
    let base = safe_name(name, "Sprite");
    let mut candidate = base.clone();
    let mut index = 2usize;
    while !used.insert(candidate.to_lowercase()) {
        candidate = format!("{}_{}", base, index);
        index += 1;
    }
    candidate
}

fn write_target<R: Read + Seek>(
    target: &Value,
    archive: &mut ZipArchive<R>,
    output_dir: &Path,
    monitors: &[Value],
    used_dirs: &mut HashSet<String>,
) -> Result<()> {
    let name = str_at(target, "name").unwrap_or("Sprite");
    let target_dir = if is_stage(target) {
        output_dir.join(STAGE_DIR)
    } else {
        output_dir.join(SPRITES_DIR).join(unique_dir_name(name, used_dirs))
    };
    fs::create_dir_all(&target_dir)
        .with_context(|| format!("Failed to create '{}'.", target_dir.display()))?;

    let blocks = BlockMap::from_json(target.get("blocks").unwrap_or(&Value::Null));
    let code_path = target_dir.join(CODE_FILE);
    fs::write(&code_path, generate_target_code(&blocks))
        .with_context(|| format!("Failed to write '{}'.", code_path.display()))?;

    if !is_stage(target) {
        write_json(&target_dir.join(VARIABLES_FILE), &variables_file(target, monitors))?;
        let mut misc = misc_data(target);
        let dir_name = target_dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
        if dir_name != name {
            misc.name = Some(name.to_string());
        }
        write_json(&target_dir.join(MISC_FILE), &misc)?;
    }

    copy_costumes(target, archive, &target_dir.join(COSTUMES_DIR))?;
    copy_sounds(target, archive, &target_dir.join(SOUNDS_DIR))?;
    Ok(())
}

fn md5ext_of(asset: &Value) -> Option<String> {
    if let Some(md5ext) = str_at(asset, "md5ext") {
        return Some(md5ext.to_string());
    }
    let asset_id = str_at(asset, "assetId")?;
    let format = str_at(asset, "dataFormat").unwrap_or_default();
    Some(format!("{}.{}", asset_id, format))
}

fn read_entry<R: Read + Seek>(archive: &mut ZipArchive<R>, name: &str) -> Option<Vec<u8>> {
    let mut entry = archive.by_name(name).ok()?;
    let mut bytes = Vec::new();
    match entry.read_to_end(&mut bytes) {
        Ok(_) => Some(bytes),
        Err(err) => {
            tracing::warn!("could not read '{}' from archive: {}", name, err);
            None
        }
    }
}

fn copy_costumes<R: Read + Seek>(target: &Value, archive: &mut ZipArchive<R>, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut names = NameMap::new();
    let mut meta = CostumeMetaMap::new();
    let costumes = target.get("costumes").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    for (idx, costume) in costumes.iter().enumerate() {
        let Some(md5ext) = md5ext_of(costume) else {
            continue;
        };
        let Some(bytes) = read_entry(archive, &md5ext) else {
            tracing::warn!("costume asset {} not found in archive", md5ext);
            continue;
        };
        let file_name = format!("{:03}__{}", idx, md5ext);
        fs::write(dir.join(&file_name), bytes)?;
        if let Some(name) = str_at(costume, "name").filter(|n| !n.is_empty()) {
            names.insert(file_name.clone(), name.to_string());
        }
        meta.insert(
            file_name,
            CostumeMeta {
                rotation_center_x: Some(f64_at(costume, "rotationCenterX", 0.0)),
                rotation_center_y: Some(f64_at(costume, "rotationCenterY", 0.0)),
                bitmap_resolution: costume.get("bitmapResolution").and_then(Value::as_f64),
            },
        );
    }
    if !names.is_empty() {
        write_json(&dir.join(COSTUME_NAME_MAP), &names)?;
    }
    if !meta.is_empty() {
        write_json(&dir.join(COSTUME_META), &meta)?;
    }
    Ok(())
}

fn copy_sounds<R: Read + Seek>(target: &Value, archive: &mut ZipArchive<R>, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut names = NameMap::new();
    let sounds = target.get("sounds").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    for (idx, sound) in sounds.iter().enumerate() {
        let Some(md5ext) = md5ext_of(sound) else {
            continue;
        };
        let Some(bytes) = read_entry(archive, &md5ext) else {
            tracing::warn!("sound asset {} not found in archive", md5ext);
            continue;
        };
        let file_name = format!("sound_{:03}__{}", idx, md5ext);
        fs::write(dir.join(&file_name), bytes)?;
        if let Some(name) = str_at(sound, "name").filter(|n| !n.is_empty()) {
            names.insert(file_name, name.to_string());
        }
    }
    if !names.is_empty() {
        write_json(&dir.join(SOUND_NAME_MAP), &names)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn write_archive(path: &Path, entries: &[(&str, Vec<u8>)]) {
        let file = File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        for (name, bytes) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(bytes).unwrap();
        }
        zip.finish().unwrap();
    }

    fn sample_project() -> Value {
        json!({
            "targets": [
                {
                    "isStage": true,
                    "name": "Stage",
                    "variables": {"v1": ["score", 0]},
                    "lists": {},
                    "broadcasts": {"b1": "go"},
                    "blocks": {},
                    "costumes": [],
                    "sounds": []
                },
                {
                    "isStage": false,
                    "name": "Cat/Dog",
                    "variables": {"v2": ["speed", 5, true]},
                    "lists": {"l1": ["items", ["a"]]},
                    "broadcasts": {"b2": "go", "b3": "stop"},
                    "blocks": {
                        "a": {"opcode": "event_whenflagclicked", "next": "b", "parent": null,
                              "inputs": {}, "fields": {}, "shadow": false, "topLevel": true, "x": 0, "y": 0},
                        "b": {"opcode": "looks_hide", "next": null, "parent": "a",
                              "inputs": {}, "fields": {}, "shadow": false, "topLevel": false}
                    },
                    "costumes": [
                        {"name": "cat 1", "assetId": "abc", "md5ext": "abc.svg", "dataFormat": "svg",
                         "rotationCenterX": 5, "rotationCenterY": 6, "bitmapResolution": 1},
                        {"name": "gone", "assetId": "def", "md5ext": "def.png", "dataFormat": "png"}
                    ],
                    "sounds": [{"name": "meow", "assetId": "snd", "md5ext": "snd.wav", "dataFormat": "wav"}],
                    "x": 10, "y": -20, "size": 50, "direction": 45, "visible": false,
                    "rotationStyle": "left-right", "currentCostume": 0, "draggable": true,
                    "volume": 80, "layerOrder": 2
                }
            ],
            "monitors": [
                {"id": "v2", "opcode": "data_variable", "spriteName": "Cat/Dog", "mode": "large",
                 "visible": true, "x": 3, "y": 4, "sliderMin": 0, "sliderMax": 10, "isDiscrete": false},
                {"id": "v1", "opcode": "data_variable", "spriteName": null, "visible": true}
            ]
        })
    }

    #[test]
    fn extracts_folder_layout() {
        let dir = tempfile::tempdir().unwrap();
        let sb3 = dir.path().join("game.sb3");
        write_archive(
            &sb3,
            &[
                ("project.json", serde_json::to_vec(&sample_project()).unwrap()),
                ("abc.svg", b"<svg/>".to_vec()),
                ("snd.wav", b"RIFF".to_vec()),
            ],
        );
        let out = dir.path().join("Project");
        extract_sb3(&sb3, &out, ConvertOptions::default()).unwrap();

        let events: EventsFile = crate::folder::read_json_or_default(&out.join(EVENTS_FILE)).unwrap();
        assert_eq!(events.broadcasts, vec!["go".to_string(), "stop".to_string()]);

        let stage_vars: VariablesFile = crate::folder::read_json_or_default(&out.join(VARIABLES_FILE)).unwrap();
        assert_eq!(stage_vars.variables[0].name, "score");
        assert!(stage_vars.variables[0].monitor.as_ref().unwrap().visible);

        let sprite = out.join(SPRITES_DIR).join("Cat_Dog");
        assert_eq!(
            fs::read_to_string(sprite.join(CODE_FILE)).unwrap(),
            "when green flag clicked\nhide\n"
        );
        let vars: VariablesFile = crate::folder::read_json_or_default(&sprite.join(VARIABLES_FILE)).unwrap();
        assert!(vars.variables[0].cloud);
        let monitor = vars.variables[0].monitor.as_ref().unwrap();
        assert_eq!(monitor.mode, "large");
        assert!(!monitor.is_discrete);
        assert_eq!(vars.lists[0].value, json!(["a"]));

        let misc: MiscData = crate::folder::read_json_or_default(&sprite.join(MISC_FILE)).unwrap();
        assert_eq!(misc.name.as_deref(), Some("Cat/Dog"));
        assert_eq!(misc.layer, Some(2));
        assert_eq!(misc.rotation_style, "left-right");

        assert_eq!(fs::read(sprite.join(COSTUMES_DIR).join("000__abc.svg")).unwrap(), b"<svg/>");
        assert!(!sprite.join(COSTUMES_DIR).join("001__def.png").exists());
        let costume_names: NameMap =
            crate::folder::read_json_or_default(&sprite.join(COSTUMES_DIR).join(COSTUME_NAME_MAP)).unwrap();
        assert_eq!(costume_names["000__abc.svg"], "cat 1");
        let meta: CostumeMetaMap =
            crate::folder::read_json_or_default(&sprite.join(COSTUMES_DIR).join(COSTUME_META)).unwrap();
        assert_eq!(meta["000__abc.svg"].rotation_center_x, Some(5.0));
        assert!(sprite.join(SOUNDS_DIR).join("sound_000__snd.wav").exists());
        assert!(out.join(STAGE_DIR).join(CODE_FILE).exists());
    }

    #[test]
    fn archive_problems_are_typed() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.sb3");
        assert!(matches!(open_archive(&missing), Err(ProjectError::InputNotFound { .. })));

        let not_zip = dir.path().join("plain.sb3");
        fs::write(&not_zip, b"hello").unwrap();
        assert!(matches!(open_archive(&not_zip), Err(ProjectError::InvalidArchive { .. })));

        let empty = dir.path().join("empty.sb3");
        write_archive(&empty, &[("other.txt", b"x".to_vec())]);
        let mut archive = open_archive(&empty).unwrap();
        assert!(matches!(
            read_project_json(&mut archive, &empty),
            Err(ProjectError::MissingProjectJson { .. })
        ));

        let no_targets = dir.path().join("no_targets.sb3");
        write_archive(&no_targets, &[("project.json", b"{}".to_vec())]);
        let err = extract_sb3(&no_targets, &dir.path().join("out"), ConvertOptions::default()).unwrap_err();
        assert!(err.to_string().contains("targets"));
    }

    #[test]
    fn sprite_folders_are_unique() {
        let mut used = HashSet::new();
        assert_eq!(unique_dir_name("Cat", &mut used), "Cat");
        assert_eq!(unique_dir_name("cat", &mut used), "cat_2");
        assert_eq!(unique_dir_name("", &mut used), "Sprite");
    }
}
