//! Command-line argument parsing for the `piano-align` binary, grounded in
//! the teacher's `cmdline.rs` (`structopt`-derived `Cli` struct).

use std::path::PathBuf;

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "piano-align", about = "Align a captured performance against a score and report accuracy")]
pub struct Cli {
    /// Path to the score JSON file.
    #[structopt(long, parse(from_os_str))]
    pub score: PathBuf,

    /// Path to the performance JSON file.
    #[structopt(long, parse(from_os_str))]
    pub performance: PathBuf,

    /// Tolerance preset.
    #[structopt(long, default_value = "default", possible_values = &["default", "strict", "beginner"])]
    pub preset: String,

    /// Emit the full FullResult as JSON instead of a human-readable summary.
    #[structopt(long)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,
}

impl Cli {
    pub fn options(&self) -> crate::options::AlignmentOptions {
        match self.preset.as_str() {
            "strict" => crate::options::AlignmentOptions::strict(),
            "beginner" => crate::options::AlignmentOptions::beginner(),
            _ => crate::options::AlignmentOptions::default(),
        }
    }
}
