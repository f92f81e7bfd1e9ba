use crate::ast::ProcedureSignature;
use crate::lexer::{first_token, split_top_level_whitespace, strip_inline_literals};
use crate::scope::IdGen;
use regex::Regex;
use std::collections::HashMap;

const DEFINE_PREFIX: &str = "define ";
const NO_REFRESH_SUFFIX: &str = " #norefresh";
const ADDON_LOG_NAMES: &[&str] = &["log", "warn", "error"];
const FALLBACK_KEY: &str = "__fallback__";

#[derive(Debug, Clone, PartialEq, Eq)]
enum ProcPart {
    Literal(String),
    Arg,
}

fn split_proccode(proccode: &str) -> Vec<ProcPart> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = proccode;
    while !rest.is_empty() {
        if rest.starts_with("%s") || rest.starts_with("%b") {
            if !literal.is_empty() {
                parts.push(ProcPart::Literal(std::mem::take(&mut literal)));
            }
            parts.push(ProcPart::Arg);
            rest = &rest[2..];
            continue;
        }
        let ch = rest.chars().next().unwrap_or_default();
        literal.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    if !literal.is_empty() {
        parts.push(ProcPart::Literal(literal));
    }
    parts
}

/// Lazy captures separated by the literal text of the signature.
fn build_call_pattern(parts: &[ProcPart]) -> Option<Regex> {
    let mut source = String::from("(?s)^");
    for part in parts {
        match part {
            ProcPart::Arg => source.push_str("(.+?)"),
            ProcPart::Literal(text) => source.push_str(&regex::escape(text)),
        }
    }
    source.push('$');
    match Regex::new(&source) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!("cannot build call pattern '{}': {}", source, err);
            None
        }
    }
}

/// Arguments separated only by word-like literals (or nothing) may be split on whitespace.
fn is_space_separated(parts: &[ProcPart]) -> bool {
    let arg_positions = parts
        .iter()
        .enumerate()
        .filter(|(_, p)| **p == ProcPart::Arg)
        .map(|(idx, _)| idx)
        .collect::<Vec<_>>();
    if arg_positions.len() < 2 {
        return false;
    }
    arg_positions.windows(2).all(|pair| {
        let segment = parts[pair[0] + 1..pair[1]]
            .iter()
            .filter_map(|p| match p {
                ProcPart::Literal(text) => Some(text.as_str()),
                ProcPart::Arg => None,
            })
            .collect::<String>();
        let cleaned = segment.replace(['_', ':', '-'], " ");
        cleaned
            .split_whitespace()
            .all(|token| token.chars().all(char::is_alphanumeric))
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefineLine {
    pub proccode: String,
    pub arg_names: Vec<String>,
    pub warp: bool,
}

/// Parse `define name (a) text {b} #norefresh`. Each `(...)` or `{...}` is a parameter.
pub fn parse_define_line(line: &str) -> Option<DefineLine> {
    let content = line.strip_prefix(DEFINE_PREFIX)?;
    let (content, warp) = match content.strip_suffix(NO_REFRESH_SUFFIX) {
        Some(stripped) => (stripped, true),
        None => (content, false),
    };
    let mut proccode = String::new();
    let mut arg_names = Vec::new();
    let mut rest = content;
    while let Some(ch) = rest.chars().next() {
        let close = match ch {
            '(' => Some(')'),
            '{' => Some('}'),
            _ => None,
        };
        if let Some(end) = close.and_then(|c| rest[1..].find(c)) {
            arg_names.push(rest[1..1 + end].to_string());
            proccode.push_str("%s");
            rest = &rest[end + 2..];
            continue;
        }
        proccode.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    Some(DefineLine {
        proccode: proccode.trim().to_string(),
        arg_names,
        warp,
    })
}

#[derive(Debug, Clone)]
pub struct ProcedureDefinition {
    pub proccode: String,
    pub arg_names: Vec<String>,
    pub arg_ids: Vec<String>,
    pub warp: bool,
    pub prototype_id: String,
    pub call_pattern: Option<Regex>,
    /// Text before the first parameter, used as the primary index key.
    pub lead: String,
    pub first_token: String,
    pub space_separated: bool,
    pub inline_literals: Vec<String>,
}

impl ProcedureDefinition {
    fn new(proccode: &str, arg_names: Vec<String>, arg_ids: Vec<String>, warp: bool, ids: &mut IdGen) -> Self {
        let parts = split_proccode(proccode);
        let inline_literals = parts
            .iter()
            .filter_map(|p| match p {
                ProcPart::Literal(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
                _ => None,
            })
            .collect();
        Self {
            proccode: proccode.to_string(),
            arg_names,
            arg_ids,
            warp,
            prototype_id: ids.next_id("proc_proto"),
            call_pattern: build_call_pattern(&parts),
            lead: proccode.split('%').next().unwrap_or("").trim().to_string(),
            first_token: first_token(proccode).to_string(),
            space_separated: is_space_separated(&parts),
            inline_literals,
        }
    }

    pub fn signature(&self) -> ProcedureSignature {
        ProcedureSignature {
            proccode: self.proccode.clone(),
            arg_names: self.arg_names.clone(),
            arg_ids: self.arg_ids.clone(),
            warp: self.warp,
            prototype_id: self.prototype_id.clone(),
        }
    }

    /// Raw argument texts when `line` is a call to this procedure.
    pub fn match_call(&self, line: &str) -> Option<Vec<String>> {
        if self.space_separated {
            if let Some(args) = self.match_space_separated(line).filter(|a| !a.is_empty()) {
                return Some(args);
            }
        }
        let caps = self.call_pattern.as_ref()?.captures(line)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
                .collect(),
        )
    }

    fn match_space_separated(&self, line: &str) -> Option<Vec<String>> {
        let remainder = if self.lead.is_empty() {
            line.trim()
        } else {
            line.strip_prefix(self.lead.as_str())?.trim()
        };
        // The lead was already consumed above.
        let skip = usize::from(!self.lead.is_empty() && self.inline_literals.first() == Some(&self.lead));
        let remainder = strip_inline_literals(remainder, &self.inline_literals[skip..]);
        let parts = split_top_level_whitespace(&remainder, self.arg_ids.len());
        (parts.len() == self.arg_ids.len()).then_some(parts)
    }
}

/// Every custom block known to one file, with a lookup index over
/// the lead text and first token of each signature.
#[derive(Debug, Default)]
pub struct ProcedureTable {
    defs: Vec<ProcedureDefinition>,
    by_proccode: HashMap<String, usize>,
    index: HashMap<String, Vec<usize>>,
}

impl ProcedureTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Debugger addon logging blocks, callable without a local `define`.
    pub fn register_addon_logging(&mut self, ids: &mut IdGen) {
        for name in ADDON_LOG_NAMES {
            let proccode = format!("\u{200b}\u{200b}{}\u{200b}\u{200b} %s", name);
            let arg_ids = vec![ids.next_id("arg")];
            let def = ProcedureDefinition::new(&proccode, vec!["message".to_string()], arg_ids, false, ids);
            self.by_proccode.insert(proccode, self.defs.len());
            self.defs.push(def);
        }
    }

    /// Register or merge a `define` line. Re-declaring keeps the ids and ORs the warp flag.
    pub fn declare(&mut self, line: &str, ids: &mut IdGen) -> Option<ProcedureSignature> {
        let parsed = parse_define_line(line)?;
        if let Some(idx) = self.by_proccode.get(&parsed.proccode) {
            let def = &mut self.defs[*idx];
            def.warp |= parsed.warp;
            return Some(def.signature());
        }
        let arg_ids = parsed.arg_names.iter().map(|_| ids.next_id("arg")).collect();
        let def = ProcedureDefinition::new(&parsed.proccode, parsed.arg_names, arg_ids, parsed.warp, ids);
        let signature = def.signature();
        self.by_proccode.insert(parsed.proccode, self.defs.len());
        self.defs.push(def);
        Some(signature)
    }

    pub fn get(&self, proccode: &str) -> Option<&ProcedureDefinition> {
        self.by_proccode.get(proccode).map(|idx| &self.defs[*idx])
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Signatures that start with a parameter match almost anything, so they
    /// only go in the fallback bucket.
    pub fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, def) in self.defs.iter().enumerate() {
            if def.lead.is_empty() && def.first_token.is_empty() {
                self.index.entry(FALLBACK_KEY.to_string()).or_default().push(idx);
                continue;
            }
            for key in [format!("lead:{}", def.lead), format!("token:{}", def.first_token)] {
                self.index.entry(key).or_default().push(idx);
            }
        }
    }

    /// Indexed candidates for a line, deduplicated, in declaration order per key.
    pub fn candidates(&self, line: &str) -> Vec<&ProcedureDefinition> {
        let split_at = line.find(['(', '{']).unwrap_or(line.len());
        let line_lead = line[..split_at].trim();
        let keys = [format!("lead:{}", line_lead), format!("token:{}", first_token(line))];
        let mut seen = Vec::new();
        for key in &keys {
            for idx in self.index.get(key).into_iter().flatten() {
                if !seen.contains(idx) {
                    seen.push(*idx);
                }
            }
        }
        seen.into_iter().map(|idx| &self.defs[idx]).collect()
    }

    pub fn fallback(&self) -> Vec<&ProcedureDefinition> {
        self.index
            .get(FALLBACK_KEY)
            .into_iter()
            .flatten()
            .map(|idx| &self.defs[*idx])
            .collect()
    }
}
