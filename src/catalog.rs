use crate::blocks::{Input, Primitive, Scalar, Slot};
use crate::error::TemplateError;
use regex::Regex;
use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Display templates keyed by opcode. Order matters: patterns with equal
/// specificity are tried in table order.
pub const OPCODE_TEMPLATES: &[(&str, &str)] = &[
    // Events
    ("event_whenflagclicked", "when green flag clicked"),
    ("event_whenkeypressed", "when [{KEY_OPTION} v] key pressed"),
    ("event_whenthisspriteclicked", "when this sprite clicked"),
    ("event_whenbackdropswitchesto", "when backdrop switches to [{BACKDROP} v]"),
    ("event_whengreaterthan", "when [{WHENGREATERTHANMENU} v] > {VALUE}"),
    ("event_whenbroadcastreceived", "when I receive [{BROADCAST_OPTION} v]"),
    ("event_broadcast", "broadcast {BROADCAST_INPUT}"),
    ("event_broadcastandwait", "broadcast {BROADCAST_INPUT} and wait"),
    // Motion
    ("motion_movesteps", "move {STEPS} steps"),
    ("motion_turnright", "turn right {DEGREES} degrees"),
    ("motion_turnleft", "turn left {DEGREES} degrees"),
    ("motion_goto", "go to {TO}"),
    ("motion_goto_menu", "[{TO} v]"),
    ("motion_gotoxy", "go to x: {X} y: {Y}"),
    ("motion_glideto", "glide {SECS} secs to {TO}"),
    ("motion_glideto_menu", "[{TO} v]"),
    ("motion_glidesecstoxy", "glide {SECS} secs to x: {X} y: {Y}"),
    ("motion_pointindirection", "point in direction {DIRECTION}"),
    ("motion_pointtowards", "point towards {TOWARDS}"),
    ("motion_pointtowards_menu", "[{TOWARDS} v]"),
    ("motion_changexby", "change x by {DX}"),
    ("motion_setx", "set x to {X}"),
    ("motion_changeyby", "change y by {DY}"),
    ("motion_sety", "set y to {Y}"),
    ("motion_ifonedgebounce", "if on edge, bounce"),
    ("motion_setrotationstyle", "set rotation style [{STYLE} v]"),
    // Looks
    ("looks_sayforsecs", "say {MESSAGE} for {SECS} seconds"),
    ("looks_say", "say {MESSAGE}"),
    ("looks_thinkforsecs", "think {MESSAGE} for {SECS} seconds"),
    ("looks_think", "think {MESSAGE}"),
    ("looks_switchcostumeto", "switch costume to {COSTUME}"),
    ("looks_nextcostume", "next costume"),
    ("looks_switchbackdropto", "switch backdrop to {BACKDROP}"),
    ("looks_backdrops", "[{BACKDROP} v]"),
    ("looks_costumenumbername", "(costume [{NUMBER_NAME} v])"),
    ("looks_backdropnumbername", "(backdrop [{NUMBER_NAME} v])"),
    ("looks_costume", "[{COSTUME} v]"),
    ("looks_nextbackdrop", "next backdrop"),
    ("looks_changesizeby", "change size by {CHANGE}"),
    ("looks_setsizeto", "set size to {SIZE} %"),
    ("looks_changeeffectby", "change [{EFFECT} v] effect by {CHANGE}"),
    ("looks_seteffectto", "set [{EFFECT} v] effect to {VALUE}"),
    ("looks_cleargraphiceffects", "clear graphic effects"),
    ("looks_show", "show"),
    ("looks_hide", "hide"),
    ("looks_gotofrontback", "go to [{FRONT_BACK} v] layer"),
    ("looks_goforwardbackwardlayers", "go [{FORWARD_BACKWARD} v] {NUM} layers"),
    ("looks_size", "(size)"),
    // Sound
    ("sound_playuntildone", "play sound {SOUND_MENU} until done"),
    ("sound_play", "start sound {SOUND_MENU}"),
    ("sound_stopallsounds", "stop all sounds"),
    ("sound_changeeffectby", "change [{EFFECT} v] effect by {VALUE}"),
    ("sound_seteffectto", "set [{EFFECT} v] effect to {VALUE}"),
    ("sound_changevolumeby", "change volume by {VOLUME}"),
    ("sound_setvolumeto", "set volume to {VOLUME} %"),
    ("sound_cleareffects", "clear sound effects"),
    ("sound_volume", "(volume)"),
    // Pen
    ("pen_clear", "erase all"),
    ("pen_stamp", "stamp"),
    ("pen_penup", "pen up"),
    ("pen_pendown", "pen down"),
    ("pen_setpenparamto", "set pen ({COLOR_PARAM} v) to {VALUE}"),
    ("pen_changepenparamby", "change pen ({COLOR_PARAM} v) by {VALUE}"),
    ("pen_changePenColorParamBy", "change pen ({COLOR_PARAM} v) by {VALUE}"),
    ("pen_setpencolortocolor", "set pen color to {COLOR}"),
    ("pen_changepensizeby", "change pen size by {SIZE}"),
    ("pen_changePenSizeBy", "change pen size by {SIZE}"),
    ("pen_setpensizeto", "set pen size to {SIZE}"),
    ("pen_setPenColorToColor", "set pen color to {COLOR}"),
    ("pen_setPenSizeTo", "set pen size to {SIZE}"),
    ("pen_penUp", "pen up"),
    ("pen_penDown", "pen down"),
    ("pen_setPenColorParamTo", "set pen ({COLOR_PARAM} v) to {VALUE}"),
    ("pen_menu_colorParam", "{colorParam}"),
    ("sound_sounds_menu", "[{SOUND_MENU} v]"),
    // Motion reporters
    ("motion_xposition", "(x position)"),
    ("motion_yposition", "(y position)"),
    ("motion_direction", "(direction)"),
    // Control
    ("control_wait", "wait {DURATION} seconds"),
    ("control_repeat", "repeat {TIMES}"),
    ("control_forever", "forever"),
    ("control_if", "if {CONDITION} then"),
    ("control_if_else", "if {CONDITION} then"),
    ("control_wait_until", "wait until {CONDITION}"),
    ("control_repeat_until", "repeat until {CONDITION}"),
    ("control_while", "while {CONDITION}"),
    ("control_stop", "stop [{STOP_OPTION} v]"),
    ("control_start_as_clone", "when I start as a clone"),
    ("control_create_clone_of", "create clone of {CLONE_OPTION}"),
    ("control_create_clone_of_menu", "[{CLONE_OPTION} v]"),
    ("control_delete_this_clone", "delete this clone"),
    // Sensing
    ("sensing_touchingobject", "<touching {TOUCHINGOBJECTMENU} ?>"),
    ("sensing_touchingobjectmenu", "[{TOUCHINGOBJECTMENU} v]"),
    ("sensing_touchingcolor", "<touching color {COLOR} ?>"),
    ("sensing_coloristouchingcolor", "<color {COLOR} is touching {COLOR2} ?>"),
    ("sensing_distanceto", "(distance to {DISTANCETOMENU})"),
    ("sensing_distancetomenu", "[{DISTANCETOMENU} v]"),
    ("sensing_askandwait", "ask {QUESTION} and wait"),
    ("sensing_answer", "(answer)"),
    ("sensing_keypressed", "<key [{KEY_OPTION} v] pressed?>"),
    ("sensing_keyoptions", "{KEY_OPTION}"),
    ("sensing_mousedown", "<mouse down?>"),
    ("sensing_mousex", "(mouse x)"),
    ("sensing_mousey", "(mouse y)"),
    ("sensing_setdragmode", "set drag mode [{DRAG_MODE} v]"),
    ("sensing_loudness", "(loudness)"),
    ("sensing_timer", "(timer)"),
    ("sensing_resettimer", "reset timer"),
    ("sensing_of", "([{PROPERTY} v] of {OBJECT})"),
    ("sensing_of_object_menu", "[{OBJECT} v]"),
    ("sensing_current", "(current [{CURRENTMENU} v])"),
    ("sensing_dayssince2000", "(days since 2000)"),
    ("sensing_username", "(username)"),
    // Operators
    ("operator_add", "({NUM1} + {NUM2})"),
    ("operator_subtract", "({NUM1} - {NUM2})"),
    ("operator_multiply", "({NUM1} * {NUM2})"),
    ("operator_divide", "({NUM1} / {NUM2})"),
    ("operator_random", "(pick random {FROM} to {TO})"),
    ("operator_gt", "<{OPERAND1} > {OPERAND2}>"),
    ("operator_lt", "<{OPERAND1} < {OPERAND2}>"),
    ("operator_equals", "<{OPERAND1} = {OPERAND2}>"),
    ("operator_and", "<{OPERAND1} and {OPERAND2}>"),
    ("operator_or", "<{OPERAND1} or {OPERAND2}>"),
    ("operator_not", "<not {OPERAND}>"),
    ("operator_join", "(join {STRING1} {STRING2})"),
    ("operator_letter_of", "(letter {LETTER} of {STRING})"),
    ("operator_length", "(length of {STRING})"),
    ("operator_contains", "<{STRING1} contains {STRING2} ?>"),
    ("operator_mod", "({NUM1} mod {NUM2})"),
    ("operator_round", "(round {NUM})"),
    ("operator_mathop", "([{OPERATOR} v] of {NUM})"),
    // Data
    ("data_variable", "({VARIABLE})"),
    ("data_setvariableto", "set [{VARIABLE} v] to {VALUE}"),
    ("data_changevariableby", "change [{VARIABLE} v] by {VALUE}"),
    ("data_showvariable", "show variable [{VARIABLE} v]"),
    ("data_hidevariable", "hide variable [{VARIABLE} v]"),
    ("data_listcontents", "({LIST})"),
    ("data_addtolist", "add {ITEM} to [{LIST} v]"),
    ("data_deleteoflist", "delete {INDEX} of [{LIST} v]"),
    ("data_deletealloflist", "delete all of [{LIST} v]"),
    ("data_insertatlist", "insert {ITEM} at {INDEX} of [{LIST} v]"),
    ("data_replaceitemoflist", "replace item {INDEX} of [{LIST} v] with {ITEM}"),
    ("data_itemoflist", "(item {INDEX} of [{LIST} v])"),
    ("data_itemnumoflist", "(item # of {ITEM} in [{LIST} v])"),
    ("data_lengthoflist", "(length of [{LIST} v])"),
    ("data_listcontainsitem", "<[{LIST} v] contains {ITEM} ?>"),
    ("data_showlist", "show list [{LIST} v]"),
    ("data_hidelist", "hide list [{LIST} v]"),
    // Custom block arguments
    ("argument_reporter_string_number", "{{{VALUE}}}"),
    ("argument_reporter_boolean", "{{<{VALUE}>}}"),
];

/// Legacy lowercase pen spellings rewritten to their Scratch 3 names after a match.
const OPCODE_NORMALIZATION: &[(&str, &str)] = &[
    ("pen_setpensizeto", "pen_setPenSizeTo"),
    ("pen_setpencolortocolor", "pen_setPenColorToColor"),
    ("pen_penup", "pen_penUp"),
    ("pen_pendown", "pen_penDown"),
    ("pen_setpenparamto", "pen_setPenColorParamTo"),
    ("pen_changepenparamby", "pen_changePenColorParamBy"),
    ("pen_changepensizeby", "pen_changePenSizeBy"),
];

const OPCODE_FIELDS: &[(&str, &[&str])] = &[
    ("event_whenkeypressed", &["KEY_OPTION"]),
    ("sensing_keyoptions", &["KEY_OPTION"]),
    ("event_whenbackdropswitchesto", &["BACKDROP"]),
    ("event_whengreaterthan", &["WHENGREATERTHANMENU"]),
    ("event_whenbroadcastreceived", &["BROADCAST_OPTION"]),
    ("control_stop", &["STOP_OPTION"]),
    ("looks_backdropnumbername", &["NUMBER_NAME"]),
    ("looks_costumenumbername", &["NUMBER_NAME"]),
    ("looks_costume", &["COSTUME"]),
    ("looks_backdrops", &["BACKDROP"]),
    ("looks_seteffectto", &["EFFECT"]),
    ("looks_changeeffectby", &["EFFECT"]),
    ("looks_gotofrontback", &["FRONT_BACK"]),
    ("looks_goforwardbackwardlayers", &["FORWARD_BACKWARD"]),
    ("motion_setrotationstyle", &["STYLE"]),
    ("motion_goto_menu", &["TO"]),
    ("motion_glideto_menu", &["TO"]),
    ("motion_pointtowards_menu", &["TOWARDS"]),
    ("sound_changeeffectby", &["EFFECT"]),
    ("sound_seteffectto", &["EFFECT"]),
    ("sensing_setdragmode", &["DRAG_MODE"]),
    ("sensing_distancetomenu", &["DISTANCETOMENU"]),
    ("sensing_of_object_menu", &["OBJECT"]),
    ("sensing_of", &["PROPERTY"]),
    ("sensing_current", &["CURRENTMENU"]),
    ("data_setvariableto", &["VARIABLE"]),
    ("data_changevariableby", &["VARIABLE"]),
    ("data_showvariable", &["VARIABLE"]),
    ("data_hidevariable", &["VARIABLE"]),
    ("data_addtolist", &["LIST"]),
    ("data_deleteoflist", &["LIST"]),
    ("data_deletealloflist", &["LIST"]),
    ("data_insertatlist", &["LIST"]),
    ("data_replaceitemoflist", &["LIST"]),
    ("data_itemoflist", &["LIST"]),
    ("data_itemnumoflist", &["LIST"]),
    ("data_lengthoflist", &["LIST"]),
    ("data_listcontainsitem", &["LIST"]),
    ("data_showlist", &["LIST"]),
    ("data_hidelist", &["LIST"]),
    ("data_variable", &["VARIABLE"]),
    ("data_listcontents", &["LIST"]),
    ("operator_mathop", &["OPERATOR"]),
    ("argument_reporter_string_number", &["VALUE"]),
    ("argument_reporter_boolean", &["VALUE"]),
];

const CONTROL_BLOCKS: &[&str] = &[
    "control_forever",
    "control_repeat",
    "control_repeat_until",
    "control_if",
    "control_if_else",
];

const MATH_OPERATORS: &[&str] = &[
    "abs", "floor", "ceiling", "sqrt", "sin", "cos", "tan", "asin", "acos", "atan", "ln", "log",
    "e ^", "10 ^",
];

const MENU_SHADOW_OPCODES: &[&str] = &[
    "looks_costume",
    "looks_backdrops",
    "sound_sounds_menu",
    "pen_menu_colorParam",
    "sensing_keyoptions",
    "sensing_distancetomenu",
    "sensing_of_object_menu",
    "motion_goto_menu",
    "motion_glideto_menu",
    "motion_pointtowards_menu",
    "control_create_clone_of_menu",
    "sensing_touchingobjectmenu",
];

/// Opcode-specific shadows placed behind a reporter dropped into these slots.
const MENU_SHADOW_FOR_INPUT: &[(&str, &str, &str)] = &[
    ("COSTUME", "looks_costume", "COSTUME"),
    ("BACKDROP", "looks_backdrops", "BACKDROP"),
    ("SOUND_MENU", "sound_sounds_menu", "SOUND_MENU"),
    ("OBJECT", "sensing_of_object_menu", "OBJECT"),
];

/// Input names whose empty default is a number rather than text. Matched as substrings.
const NUMERIC_INPUT_TOKENS: &[&str] = &[
    "NUM", "OPERAND", "VALUE", "X", "Y", "DX", "DY", "INDEX", "LETTER", "FROM", "TO", "TIMES",
    "DURATION", "SECS", "ANGLE", "DEGREES", "STEP", "SIZE", "CHANGE",
];

const EXTENSION_PREFIXES: &[&str] = &[
    "pen",
    "music",
    "text2speech",
    "translate",
    "videoSensing",
    "ev3",
    "microbit",
    "wedo2",
    "makeymakey",
    "boost",
    "gdxfor",
];

pub const DEFAULT_COLOR: &str = "#000000";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Placeholder(String),
}

#[derive(Debug, Clone)]
pub struct BlockTemplate {
    pub opcode: &'static str,
    pub source: &'static str,
    pub segments: Vec<Segment>,
}

impl BlockTemplate {
    pub fn parse(opcode: &'static str, source: &'static str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = source.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '{' if chars.peek() == Some(&'{') => {
                    chars.next();
                    literal.push('{');
                }
                '}' if chars.peek() == Some(&'}') => {
                    chars.next();
                    literal.push('}');
                }
                '{' => {
                    let mut name = String::new();
                    for inner in chars.by_ref() {
                        if inner == '}' {
                            break;
                        }
                        name.push(inner);
                    }
                    if !literal.is_empty() {
                        segments.push(Segment::Literal(std::mem::take(&mut literal)));
                    }
                    segments.push(Segment::Placeholder(name));
                }
                _ => literal.push(ch),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self {
            opcode,
            source,
            segments,
        }
    }

    pub fn placeholders(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Placeholder(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn literal_len(&self) -> usize {
        self.segments
            .iter()
            .map(|seg| match seg {
                Segment::Literal(text) => text.chars().count(),
                Segment::Placeholder(_) => 0,
            })
            .sum()
    }

    /// Template text with every placeholder removed.
    pub fn label(&self) -> String {
        self.segments
            .iter()
            .filter_map(|seg| match seg {
                Segment::Literal(text) => Some(text.as_str()),
                Segment::Placeholder(_) => None,
            })
            .collect()
    }

    pub fn fill(&self, values: &HashMap<String, String>) -> Result<String, TemplateError> {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Placeholder(name) => {
                    let value = values
                        .get(name)
                        .ok_or_else(|| TemplateError::MissingPlaceholder(name.clone()))?;
                    out.push_str(value);
                }
            }
        }
        Ok(out)
    }

    fn to_pattern(&self) -> Result<MatchPattern, regex::Error> {
        let mut source = String::from("^");
        let mut placeholders = Vec::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => source.push_str(&regex::escape(text)),
                Segment::Placeholder(name) => {
                    // Greedy so inner literals such as " of [" stay inside the capture.
                    source.push_str(&format!("(?P<{}>.+)", name));
                    placeholders.push(name.clone());
                }
            }
        }
        source.push('$');
        Ok(MatchPattern {
            opcode: self.opcode,
            regex: Regex::new(&source)?,
            placeholders,
            literal_len: self.literal_len(),
        })
    }
}

#[derive(Debug)]
pub struct MatchPattern {
    pub opcode: &'static str,
    pub regex: Regex,
    pub placeholders: Vec<String>,
    pub literal_len: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    pub opcode: String,
    pub groups: Vec<(String, String)>,
}

impl LineMatch {
    pub fn group(&self, name: &str) -> Option<&str> {
        self.groups
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

pub struct Catalog {
    templates: Vec<BlockTemplate>,
    by_opcode: HashMap<&'static str, usize>,
    patterns: Vec<MatchPattern>,
}

impl Catalog {
    fn build() -> Self {
        let templates = OPCODE_TEMPLATES
            .iter()
            .map(|(opcode, source)| BlockTemplate::parse(opcode, source))
            .collect::<Vec<_>>();
        let by_opcode = templates
            .iter()
            .enumerate()
            .map(|(idx, tpl)| (tpl.opcode, idx))
            .collect::<HashMap<_, _>>();
        let mut patterns = Vec::with_capacity(templates.len());
        for tpl in &templates {
            match tpl.to_pattern() {
                Ok(pattern) => patterns.push(pattern),
                Err(err) => tracing::warn!("skipping template for '{}': {}", tpl.opcode, err),
            }
        }
        // Stable: equal scores keep table order.
        patterns.sort_by_key(|p| (Reverse(p.literal_len), p.placeholders.len()));
        Self {
            templates,
            by_opcode,
            patterns,
        }
    }

    pub fn template(&self, opcode: &str) -> Option<&BlockTemplate> {
        self.by_opcode.get(opcode).map(|idx| &self.templates[*idx])
    }

    pub fn patterns(&self) -> &[MatchPattern] {
        &self.patterns
    }

    /// First full-line match in priority order. With `allow_menu_only` unset,
    /// templates without any literal text are skipped.
    pub fn match_line(&self, text: &str, allow_menu_only: bool) -> Option<LineMatch> {
        for pattern in &self.patterns {
            if !allow_menu_only && pattern.literal_len == 0 {
                continue;
            }
            let Some(caps) = pattern.regex.captures(text) else {
                continue;
            };
            let groups = pattern
                .placeholders
                .iter()
                .map(|name| {
                    let value = caps.name(name).map(|m| m.as_str()).unwrap_or_default();
                    (name.clone(), value.to_string())
                })
                .collect();
            return Some(LineMatch {
                opcode: normalize_opcode(pattern.opcode).to_string(),
                groups,
            });
        }
        None
    }
}

static CATALOG: OnceLock<Catalog> = OnceLock::new();

pub fn catalog() -> &'static Catalog {
    CATALOG.get_or_init(Catalog::build)
}

pub fn template(opcode: &str) -> Option<&'static BlockTemplate> {
    catalog().template(opcode)
}

pub fn match_line(text: &str, allow_menu_only: bool) -> Option<LineMatch> {
    catalog().match_line(text, allow_menu_only)
}

pub fn normalize_opcode(opcode: &str) -> &str {
    OPCODE_NORMALIZATION
        .iter()
        .find(|(from, _)| *from == opcode)
        .map(|(_, to)| *to)
        .unwrap_or(opcode)
}

pub fn field_names(opcode: &str) -> &'static [&'static str] {
    OPCODE_FIELDS
        .iter()
        .find(|(op, _)| *op == opcode)
        .map(|(_, names)| *names)
        .unwrap_or(&[])
}

pub fn is_field(opcode: &str, name: &str) -> bool {
    field_names(opcode).contains(&name)
}

pub fn is_control_block(opcode: &str) -> bool {
    CONTROL_BLOCKS.contains(&opcode)
}

pub fn is_math_operator(token: &str) -> bool {
    MATH_OPERATORS.contains(&token)
}

pub fn is_menu_shadow(opcode: &str) -> bool {
    MENU_SHADOW_OPCODES.contains(&opcode)
        || opcode.ends_with("menu")
        || opcode.starts_with("pen_menu")
}

fn template_source(opcode: &str) -> &'static str {
    template(opcode).map(|tpl| tpl.source).unwrap_or("")
}

/// Round, boolean or bracketed templates. Unknown opcodes are not reporters.
pub fn is_reporter_shape(opcode: &str) -> bool {
    matches!(
        template_source(opcode).trim_start().chars().next(),
        Some('(' | '<' | '[' | '{')
    )
}

pub fn is_boolean_reporter(opcode: &str) -> bool {
    template_source(opcode).trim_start().starts_with('<') || opcode == "argument_reporter_boolean"
}

pub fn literal_length(opcode: &str) -> usize {
    template(opcode).map(BlockTemplate::literal_len).unwrap_or(0)
}

pub fn menu_shadow_for_input(input_name: &str) -> Option<(&'static str, &'static str)> {
    MENU_SHADOW_FOR_INPUT
        .iter()
        .find(|(name, _, _)| *name == input_name)
        .map(|(_, opcode, field)| (*opcode, *field))
}

/// Type-appropriate primitive for an input left empty in the text.
pub fn default_empty_primitive(input_name: &str) -> Primitive {
    let upper = input_name.to_uppercase();
    if upper.contains("COLOR") {
        return Primitive::Color(DEFAULT_COLOR.to_string());
    }
    if NUMERIC_INPUT_TOKENS.iter().any(|token| upper.contains(token)) {
        return Primitive::Number {
            kind: 4,
            value: Scalar::Text(String::new()),
        };
    }
    Primitive::Text(String::new())
}

/// Shadow kept under a reporter dropped into a slot: a colour for colour
/// inputs, empty text everywhere else.
pub fn reporter_shadow(input_name: &str) -> Primitive {
    if input_name.to_uppercase().contains("COLOR") {
        Primitive::Color(DEFAULT_COLOR.to_string())
    } else {
        Primitive::Text(String::new())
    }
}

pub fn default_empty_input(input_name: &str) -> Input {
    Input::Shadow(Slot::Primitive(default_empty_primitive(input_name)))
}

/// Extension id for opcodes outside the core block set.
pub fn extension_for_opcode(opcode: &str) -> Option<&'static str> {
    let (prefix, _) = opcode.split_once('_')?;
    EXTENSION_PREFIXES.iter().copied().find(|ext| *ext == prefix)
}
