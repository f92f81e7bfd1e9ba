pub mod assets;
pub mod ast;
pub mod blocks;
pub mod catalog;
pub mod diagnostics;
pub mod emitter;
pub mod error;
mod expr;
pub mod layout;
pub mod lexer;
pub mod parser;
pub mod procedures;
pub mod scope;
pub mod serializer;

#[cfg(not(target_arch = "wasm32"))]
pub mod cli;

#[cfg(not(target_arch = "wasm32"))]
pub mod codegen;

#[cfg(not(target_arch = "wasm32"))]
pub mod decompile;

#[cfg(not(target_arch = "wasm32"))]
pub mod folder;

#[cfg(all(target_arch = "wasm32", feature = "wasm-bindings"))]
pub mod wasm;

use blocks::BlockMap;
use diagnostics::{summarize, Diagnostic, DiagnosticContext, Level};
use emitter::Emitter;
use parser::Parser;
use scope::{IdGen, NameTable, Scope, TargetNames};

#[cfg(not(target_arch = "wasm32"))]
use anyhow::Result;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};

/// Vertical distance between seed positions of consecutive scripts.
pub const SCRIPT_SPACING: i64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Delete the output folder before extracting into it.
    pub clean: bool,
    /// Auto-arrange top-level stacks after emission.
    pub layout: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            clean: true,
            layout: true,
        }
    }
}

/// Everything a conversion run wants to tell the user besides its output.
#[derive(Debug, Clone, Default)]
pub struct ConversionReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ConversionReport {
    pub fn summary(&self) -> String {
        summarize(&self.diagnostics)
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.level == Level::Error)
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Parse and emit every script of one target.
///
/// Scripts are seeded at `x = 0` with `y` advancing by [`SCRIPT_SPACING`];
/// with `layout` set they are then auto-arranged. Names missing from the
/// scope are created in its local tables.
pub fn text_to_blocks<'a>(
    source: &str,
    scope: Scope<'a>,
    diag: Option<&'a mut DiagnosticContext>,
    layout: bool,
) -> BlockMap {
    let mut blocks = BlockMap::new();
    let scripts = lexer::split_scripts(source);
    if scripts.is_empty() {
        return blocks;
    }

    let mut parser = Parser::new(scope, diag);
    parser.declare_procedures(&scripts);
    let mut y = 0;
    for lines in &scripts {
        let nodes = parser.parse_script(lines);
        Emitter::new(&mut *parser.scope.ids, &mut blocks).emit_script(&nodes, 0, y);
        y += SCRIPT_SPACING;
    }
    tracing::debug!("emitted {} blocks from {} scripts", blocks.len(), scripts.len());

    if layout {
        layout::auto_arrange(&mut blocks);
    }
    blocks
}

/// Convert a lone script file with empty name tables.
pub fn convert_text(source: &str, layout: bool) -> (BlockMap, Vec<Diagnostic>) {
    let mut ids = IdGen::new();
    let mut broadcasts = NameTable::new();
    let mut locals = TargetNames::default();
    let globals = TargetNames::default();
    let mut diag = DiagnosticContext::new("Sprite1");
    let blocks = {
        let scope = Scope::new(&mut ids, &mut broadcasts, &mut locals, &globals);
        text_to_blocks(source, scope, Some(&mut diag), layout)
    };
    (blocks, diag.into_diagnostics())
}

pub fn blocks_to_text(blocks: &BlockMap) -> String {
    serializer::generate_target_code(blocks)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn run_cli(args: &cli::Args) -> Result<()> {
    let options = args.options();
    if args.to_sb3 {
        let mut progress = stage_reporter("Pack");
        progress(0, 1, "Resolving input folder");
        let input = canonicalize_dir(&args.input)?;
        let report = codegen::pack_folder_with_progress(&input, &args.sb3_output, options, Some(&mut progress))?;
        print_report(&report);
        if report.is_empty() {
            println!(
                "Successfully converted '{}' to '{}'.",
                input.display(),
                args.sb3_output.display()
            );
        }
        return Ok(());
    }

    let mut progress = stage_reporter("Extract");
    progress(0, 1, "Resolving input path");
    let input = canonicalize_file(&args.input)?;
    decompile::extract_sb3_with_progress(&input, &args.output_dir, options, Some(&mut progress))?;
    println!(
        "Successfully converted '{}' to '{}'.",
        input.display(),
        args.output_dir.display()
    );
    Ok(())
}

#[cfg(not(target_arch = "wasm32"))]
fn print_report(report: &ConversionReport) {
    if report.is_empty() {
        return;
    }
    println!();
    for diagnostic in &report.diagnostics {
        println!("{}", diagnostic);
    }
    println!();
    println!("Conversion completed with {}", report.summary());
}

#[cfg(not(target_arch = "wasm32"))]
pub fn canonicalize_file(path: &Path) -> Result<PathBuf> {
    if !path.exists() || !path.is_file() {
        return Err(anyhow::anyhow!("Input file not found: '{}'.", path.display()));
    }
    Ok(path.canonicalize()?)
}

#[cfg(not(target_arch = "wasm32"))]
pub fn canonicalize_dir(path: &Path) -> Result<PathBuf> {
    if !path.is_dir() {
        return Err(anyhow::anyhow!(
            "Input folder not found or not a directory: '{}'.",
            path.display()
        ));
    }
    Ok(path.canonicalize()?)
}

/// Prints one `[Pack] label 2/5 40%` line per reported step. The first
/// step is spent resolving the input, so stage steps are offset by one.
#[cfg(not(target_arch = "wasm32"))]
fn stage_reporter(prefix: &'static str) -> impl FnMut(usize, usize, &str) {
    move |step, total, label| {
        let (step, total) = (step + 1, total + 1);
        eprintln!("[{}] {} {}/{} {}%", prefix, label, step.min(total), total, percent(step, total));
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn percent(step: usize, total: usize) -> usize {
    let total = total.max(1);
    step.min(total) * 100 / total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_source_has_no_blocks_or_diagnostics() {
        for source in ["", "\n\n   \n"] {
            let (blocks, diags) = convert_text(source, true);
            assert!(blocks.is_empty());
            assert!(diags.is_empty());
        }
    }

    #[test]
    fn scripts_are_seeded_down_the_canvas() {
        let (blocks, _) = convert_text("when green flag clicked\n\nshow\n\nhide\n", false);
        let mut seeds: Vec<(i64, i64)> = blocks
            .iter()
            .filter(|(_, b)| b.top_level)
            .filter_map(|(_, b)| b.position)
            .collect();
        seeds.sort();
        assert_eq!(seeds, vec![(0, 0), (0, 120), (0, 240)]);
    }

    #[test]
    fn report_summary() {
        let mut ctx = DiagnosticContext::new("Cat");
        ctx.warning("Undefined variable 'x' (auto-created)");
        let report = ConversionReport {
            diagnostics: ctx.into_diagnostics(),
        };
        assert_eq!(report.summary(), "1 warning");
        assert!(!report.has_errors());
        assert_eq!(ConversionReport::default().summary(), "No issues");
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(percent(1, 2), 50);
        assert_eq!(percent(3, 3), 100);
        assert_eq!(percent(5, 3), 100);
        assert_eq!(percent(0, 0), 0);
    }
}
