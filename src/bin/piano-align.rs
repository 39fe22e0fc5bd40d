//! Batch CLI: reads a score and a performance as JSON, runs the full
//! evaluation pipeline, and prints a feedback report. Grounded in the
//! teacher's `main.rs` (env setup, `anyhow` error propagation to `main`)
//! and `cmdline.rs` (structopt argument parsing).

use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use structopt::StructOpt;

use piano_align::cli::Cli;
use piano_align::model::{Performance, Score};
use piano_align::pipeline::evaluate_pipeline;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let score = read_json::<Score>(&cli.score).with_context(|| format!("reading score from {}", cli.score.display()))?;
    let performance = read_json::<Performance>(&cli.performance)
        .with_context(|| format!("reading performance from {}", cli.performance.display()))?;

    let options = cli.options();
    let result = evaluate_pipeline(&score, &performance, &options).context("evaluating performance")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.feedback.summary);
        println!(
            "note accuracy: {:.1} ({:?})  rhythm: {:.1}  tempo: {:.1}",
            result.note_accuracy.score, result.note_accuracy.grade, result.rhythm.score, result.tempo.score
        );
        for issue in &result.feedback.top_issues {
            println!("  - {}", issue.message);
        }
        for (measure, note) in &result.feedback.measures_needing_attention {
            println!("  measure {measure}: {note}");
        }
        log::info!("processed in {:?}", result.total_processing_time);
    }

    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &std::path::Path) -> Result<T> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    Ok(serde_json::from_reader(reader)?)
}
