//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "spindle",
    about = "Inspect and convert binary execution traces",
    after_help = "\
EXAMPLES:
    spindle trace.spall                          Per-thread summary
    spindle trace.spall --events                 List every decoded event
    spindle trace.spall --export trace.json      Convert for chrome://tracing or Perfetto"
)]
pub struct Args {
    /// Trace file to read
    #[arg(value_name = "TRACE")]
    pub trace: PathBuf,

    /// Print every decoded event
    #[arg(long)]
    pub events: bool,

    /// Export trace in Chrome Trace Event format
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,
}
