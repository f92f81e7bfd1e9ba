use crate::blocks::Scalar;

pub const INDENT_WIDTH: usize = 4;

const OPEN_BRACKETS: &str = "([{<";
const CLOSE_BRACKETS: &str = ")]}>";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub indent: usize,
    pub text: String,
    /// 1-based line number in the source file.
    pub line: usize,
}

/// Group source text into blank-line separated scripts.
pub fn split_scripts(content: &str) -> Vec<Vec<ScriptLine>> {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    let mut scripts = Vec::new();
    let mut current = Vec::new();
    for (idx, raw) in content.lines().enumerate() {
        if raw.trim().is_empty() {
            if !current.is_empty() {
                scripts.push(std::mem::take(&mut current));
            }
            continue;
        }
        let spaces = raw.len() - raw.trim_start_matches(' ').len();
        current.push(ScriptLine {
            indent: spaces / INDENT_WIDTH,
            text: raw.trim().to_string(),
            line: idx + 1,
        });
    }
    if !current.is_empty() {
        scripts.push(current);
    }
    scripts
}

/// Remove one surrounding `[]`, `()` or `{}` pair. Unwrapped text keeps its
/// inner spacing (only line breaks are trimmed).
pub fn strip_wrappers(val: &str, strip_inner: bool) -> String {
    let without_newlines = val.trim_matches(|c| c == '\n' || c == '\r');
    let trimmed = without_newlines.trim();
    for (open, close) in [('[', ']'), ('(', ')'), ('{', '}')] {
        if trimmed.len() >= 2 && trimmed.starts_with(open) && trimmed.ends_with(close) {
            let inner = &trimmed[1..trimmed.len() - 1];
            return if strip_inner {
                inner.trim().to_string()
            } else {
                inner.to_string()
            };
        }
    }
    without_newlines.to_string()
}

/// Parse a numeric literal. Text without a decimal point or exponent that
/// holds a whole value becomes an integer.
pub fn coerce_number(val: &str) -> Option<Scalar> {
    let trimmed = val.trim();
    if trimmed.is_empty() {
        return None;
    }
    let has_marker = trimmed.contains('.') || trimmed.contains(['e', 'E']);
    if !has_marker {
        if let Ok(int) = trimmed.parse::<i64>() {
            return Some(Scalar::Int(int));
        }
    }
    let num = trimmed.parse::<f64>().ok().filter(|n| n.is_finite())?;
    if !has_marker && num.fract() == 0.0 && num.abs() <= i64::MAX as f64 {
        return Some(Scalar::Int(num as i64));
    }
    Some(Scalar::Float(num))
}

/// Drop the outermost parentheses only when they enclose the whole expression.
pub fn strip_wrapping_parens(text: &str) -> &str {
    let trimmed = text.trim();
    if !(trimmed.starts_with('(') && trimmed.ends_with(')')) || trimmed.len() < 2 {
        return trimmed;
    }
    let mut depth = 0i32;
    let last = trimmed.len() - 1;
    for (idx, ch) in trimmed.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && idx != last {
                    return trimmed;
                }
            }
            _ => {}
        }
    }
    trimmed[1..last].trim()
}

/// Split at the first occurrence of `token` outside `()`/`{}` and any extra pairs.
pub fn split_top_level(expr: &str, token: &str, extra_pairs: &[(char, char)]) -> Option<(String, String)> {
    let mut pairs = vec![('(', ')'), ('{', '}')];
    pairs.extend_from_slice(extra_pairs);
    let mut depth = 0usize;
    for (idx, ch) in expr.char_indices() {
        if idx + token.len() > expr.len() {
            break;
        }
        if pairs.iter().any(|(open, _)| *open == ch) {
            depth += 1;
            continue;
        }
        if depth > 0 && pairs.iter().any(|(_, close)| *close == ch) {
            depth -= 1;
        }
        if depth == 0 && expr[idx..].starts_with(token) {
            let left = expr[..idx].trim().to_string();
            let right = expr[idx + token.len()..].trim().to_string();
            return Some((left, right));
        }
    }
    None
}

/// Split on whitespace outside any bracket. Once `expected_parts - 1` pieces
/// are collected the remainder becomes the final piece.
pub fn split_top_level_whitespace(text: &str, expected_parts: usize) -> Vec<String> {
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        if OPEN_BRACKETS.contains(ch) {
            depth += 1;
        } else if CLOSE_BRACKETS.contains(ch) && depth > 0 {
            depth -= 1;
        }
        if ch.is_whitespace() && depth == 0 {
            if !buf.is_empty() {
                parts.push(buf.trim().to_string());
                buf.clear();
                if parts.len() + 1 == expected_parts {
                    parts.push(text[idx + ch.len_utf8()..].trim().to_string());
                    return parts;
                }
            }
            continue;
        }
        buf.push(ch);
    }
    if !buf.is_empty() {
        parts.push(buf.trim().to_string());
    }
    parts
}

/// Remove the first top-level occurrence of `literal`, joining the two sides with one space.
pub fn remove_literal_top_level(text: &str, literal: &str) -> String {
    let mut depth = 0usize;
    for (idx, ch) in text.char_indices() {
        if idx + literal.len() > text.len() {
            break;
        }
        if OPEN_BRACKETS.contains(ch) {
            depth += 1;
            continue;
        }
        if CLOSE_BRACKETS.contains(ch) && depth > 0 {
            depth -= 1;
        }
        if depth == 0 && text[idx..].starts_with(literal) {
            let left = text[..idx].trim_end();
            let right = text[idx + literal.len()..].trim_start();
            let mid = if !left.is_empty() && !right.is_empty() { " " } else { "" };
            return format!("{}{}{}", left, mid, right).trim().to_string();
        }
    }
    text.to_string()
}

pub fn strip_inline_literals(text: &str, literals: &[String]) -> String {
    let mut result = text.to_string();
    for literal in literals {
        let lit = literal.trim();
        if lit.is_empty() {
            continue;
        }
        result = remove_literal_top_level(&result, lit);
    }
    result
}

/// `#RGB` or `#RRGGBB`.
pub fn is_hex_color(text: &str) -> bool {
    match text.strip_prefix('#') {
        Some(hex) => (hex.len() == 3 || hex.len() == 6) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Dropdown text such as `[costume1 v]`.
pub fn is_menu_token(val: &str) -> bool {
    let stripped = val.trim();
    stripped.starts_with('[') && stripped.ends_with("v]")
}

pub fn first_token(line: &str) -> &str {
    line.split_whitespace().next().unwrap_or("")
}
