//! # spindle - Main Entry Point
//!
//! Reads a binary trace written by the capture pipeline and:
//! - prints a per-thread summary (default, suppressed by `--quiet`)
//! - lists every decoded event (`--events`)
//! - converts it to Chrome Trace Event JSON (`--export trace.json`)
//!
//! A trace whose writer died mid-chunk is still summarized up to the last
//! complete chunk.

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::fs::File;
use std::io::BufWriter;

use spindle::cli::{describe_event, Args, TraceSummary};
use spindle::domain::ReadError;
use spindle::export::ChromeTraceExporter;
use spindle::reader::{Trace, TraceReader};
use spindle_common::DecodeError;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

/// Input that is not a spindle trace at all is a usage error
fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<ReadError>() {
        Some(ReadError::Decode(
            DecodeError::BadMagic(_)
            | DecodeError::UnsupportedVersion(_)
            | DecodeError::NonZeroReserved(_),
        )) => EXIT_USAGE,
        _ => EXIT_ERROR,
    }
}

/// Read every complete chunk, stopping with a warning at a truncated tail
fn read_trace(args: &Args) -> Result<Trace> {
    let mut reader = TraceReader::open(&args.trace)
        .with_context(|| format!("Failed to open {}", args.trace.display()))?;
    let header = reader
        .read_header()
        .with_context(|| format!("Failed to read header of {}", args.trace.display()))?;

    let mut chunks = Vec::new();
    for chunk in reader.chunks() {
        match chunk {
            Ok(chunk) => chunks.push(chunk),
            Err(ReadError::TruncatedChunk { expected, actual }) => {
                warn!(
                    "Trace ends in a truncated chunk ({actual} of {expected} bytes), ignoring it"
                );
                break;
            }
            Err(ReadError::Decode(DecodeError::Truncated { needed, available })) => {
                warn!("Trace ends in a truncated chunk header ({available}/{needed} bytes)");
                break;
            }
            Err(e) => return Err(e).context("Failed to read trace chunk"),
        }
    }

    info!("Read {} chunks from {}", chunks.len(), args.trace.display());
    Ok(Trace { header, chunks })
}

fn run() -> Result<()> {
    let args = Args::parse();
    let trace = read_trace(&args)?;

    if !args.quiet {
        println!("trace: {}", args.trace.display());
        let summary = TraceSummary::from_trace(&trace).context("Malformed event in trace")?;
        print!("{summary}");
    }

    if args.events {
        for chunk in &trace.chunks {
            println!(
                "-- {} {} first_ts={} ({} bytes)",
                chunk.pid(),
                chunk.tid(),
                chunk.header.first_ts,
                chunk.header.payload_size
            );
            for event in chunk.events() {
                let event = event.map_err(ReadError::from).context("Malformed event in trace")?;
                println!("{}", describe_event(&event));
            }
        }
    }

    if let Some(ref export_path) = args.export {
        let exporter = ChromeTraceExporter::from_trace(&trace)?;
        let file = File::create(export_path)
            .with_context(|| format!("Failed to create {}", export_path.display()))?;
        exporter.export(BufWriter::new(file))?;
        if !args.quiet {
            println!("saved: {} ({} events)", export_path.display(), exporter.event_count());
        }
    }

    Ok(())
}
