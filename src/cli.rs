use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "scratchtext",
    about = "Convert Scratch 3 projects to editable scratchblocks folders and back."
)]
pub struct Args {
    #[arg(
        value_name = "INPUT",
        help = "Project archive (.sb3) to extract, or a project folder with --to-sb3."
    )]
    pub input: PathBuf,

    #[arg(long, default_value = "Project", help = "Folder to extract the project into.")]
    pub output_dir: PathBuf,

    #[arg(long, help = "Keep existing files in the output folder instead of deleting it first.")]
    pub no_clean: bool,

    #[arg(long, help = "Pack a project folder into an .sb3 archive.")]
    pub to_sb3: bool,

    #[arg(long, default_value = "output.sb3", help = "Archive path written by --to-sb3.")]
    pub sb3_output: PathBuf,

    #[arg(
        long,
        help = "Keep scripts at their stacked seed positions instead of auto-arranging them."
    )]
    pub no_layout: bool,
}

impl Args {
    pub fn options(&self) -> crate::ConvertOptions {
        crate::ConvertOptions {
            clean: !self.no_clean,
            layout: !self.no_layout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["scratchtext", "game.sb3"]);
        assert_eq!(args.output_dir, PathBuf::from("Project"));
        assert_eq!(args.sb3_output, PathBuf::from("output.sb3"));
        assert!(!args.to_sb3);
        assert_eq!(args.options(), crate::ConvertOptions::default());
    }

    #[test]
    fn flags_flip_options() {
        let args = Args::parse_from([
            "scratchtext",
            "Project",
            "--to-sb3",
            "--no-layout",
            "--no-clean",
            "--sb3-output",
            "out/game.sb3",
        ]);
        assert!(args.to_sb3);
        assert_eq!(args.sb3_output, PathBuf::from("out/game.sb3"));
        let options = args.options();
        assert!(!options.clean);
        assert!(!options.layout);
    }
}
