//! Command-line front end: argument parsing and trace summaries

pub mod args;
pub mod summary;

pub use args::Args;
pub use summary::{describe_event, ThreadSummary, TraceSummary};
