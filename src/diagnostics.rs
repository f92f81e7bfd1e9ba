use std::fmt::{self, Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Error,
    Warning,
    Info,
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Level::Error => "Error",
            Level::Warning => "Warning",
            Level::Info => "Info",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub level: Level,
    pub message: String,
    pub sprite: String,
    pub line: Option<usize>,
    pub line_text: Option<String>,
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: Sprite '{}'", self.level, self.message, self.sprite)?;
        if let Some(line) = self.line {
            write!(f, " Line {}", line)?;
        }
        if let Some(text) = self.line_text.as_deref().filter(|t| !t.is_empty()) {
            write!(f, "\n  -> {}", text)?;
        }
        Ok(())
    }
}

/// Per-target sink. The current line is attached to every message that
/// does not name one explicitly.
#[derive(Debug, Clone)]
pub struct DiagnosticContext {
    sprite: String,
    current_line: Option<usize>,
    diagnostics: Vec<Diagnostic>,
}

impl DiagnosticContext {
    pub fn new(sprite: impl Into<String>) -> Self {
        Self {
            sprite: sprite.into(),
            current_line: None,
            diagnostics: Vec::new(),
        }
    }

    pub fn sprite(&self) -> &str {
        &self.sprite
    }

    pub fn set_location(&mut self, line: Option<usize>) {
        self.current_line = line;
    }

    pub fn add(&mut self, level: Level, message: impl Into<String>, line_text: Option<String>) {
        self.diagnostics.push(Diagnostic {
            level,
            message: message.into(),
            sprite: self.sprite.clone(),
            line: self.current_line,
            line_text,
        });
    }

    pub fn error(&mut self, message: impl Into<String>, line_text: Option<String>) {
        self.add(Level::Error, message, line_text);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.add(Level::Warning, message, None);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.add(Level::Info, message, None);
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}

/// Run-wide collection across every target.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCollector {
    all: Vec<Diagnostic>,
}

impl DiagnosticCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, ctx: DiagnosticContext) {
        self.all.extend(ctx.into_diagnostics());
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.all
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.all
    }

    pub fn count(&self, level: Level) -> usize {
        count_level(&self.all, level)
    }

    pub fn has_errors(&self) -> bool {
        self.count(Level::Error) > 0
    }

    pub fn summary(&self) -> String {
        summarize(&self.all)
    }
}

fn count_level(diags: &[Diagnostic], level: Level) -> usize {
    diags.iter().filter(|d| d.level == level).count()
}

/// `N errors, M warnings`, or `No issues`.
pub fn summarize(diags: &[Diagnostic]) -> String {
    let plural = |n: usize, word: &str| format!("{} {}{}", n, word, if n == 1 { "" } else { "s" });
    let errors = count_level(diags, Level::Error);
    let warnings = count_level(diags, Level::Warning);
    let mut parts = Vec::new();
    if errors > 0 {
        parts.push(plural(errors, "error"));
    }
    if warnings > 0 {
        parts.push(plural(warnings, "warning"));
    }
    if parts.is_empty() {
        "No issues".to_string()
    } else {
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_location_and_preview() {
        let mut ctx = DiagnosticContext::new("Cat");
        ctx.set_location(Some(4));
        ctx.error("Unknown block 'fly'", Some("fly away".into()));
        ctx.set_location(None);
        ctx.warning("Undefined variable 'x' (auto-created)");
        let d = ctx.diagnostics();
        assert_eq!(
            d[0].to_string(),
            "Error: Unknown block 'fly': Sprite 'Cat' Line 4\n  -> fly away"
        );
        assert_eq!(
            d[1].to_string(),
            "Warning: Undefined variable 'x' (auto-created): Sprite 'Cat'"
        );
    }

    #[test]
    fn summary_counts() {
        let mut collector = DiagnosticCollector::new();
        assert_eq!(collector.summary(), "No issues");
        let mut ctx = DiagnosticContext::new("Stage");
        ctx.error("a", None);
        ctx.warning("b");
        ctx.warning("c");
        ctx.info("d");
        collector.extend(ctx);
        assert_eq!(collector.summary(), "1 error, 2 warnings");
        assert!(collector.has_errors());
    }
}
