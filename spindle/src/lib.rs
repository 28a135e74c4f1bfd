//! # spindle - Per-Thread Buffered Execution Tracing
//!
//! spindle records timestamped begin/end events on each thread of a program into
//! a compact binary stream that timeline viewers can consume. Events are encoded
//! into a per-thread buffer with bounded per-event size and flushed as whole
//! chunks to a shared sink, so the hot path never locks or allocates.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Traced Program                            │
//! │   begin(name) / end()            enter(fn addr) / exit()        │
//! └───────────────┬──────────────────────────────┬──────────────────┘
//!                 │                              │
//!                 │                              ▼
//!                 │                 ┌──────────────────────────┐
//!                 │                 │ ThreadTracer             │
//!                 │                 │  SymbolCache → Resolver  │
//!                 │                 │  (DWARF / symbol table)  │
//!                 │                 └────────────┬─────────────┘
//!                 ▼                              ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │              WriteBuffer (one per thread, caller-owned)         │
//! │     encode into region → flush whole chunk when full            │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ one write per chunk
//!                                 ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │        ProfileSink (shared, Mutex) → TraceSink (file, memory)   │
//! └───────────────────────────────┬─────────────────────────────────┘
//!                                 │ .spall stream
//!                                 ▼
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐
//! │ TraceReader  │──▶│   Summary    │   │ ChromeTraceExporter      │
//! │              │──▶│   (CLI)      │   │ (trace.json)             │
//! └──────────────┘   └──────────────┘   └──────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! - [`capture`]: profile sink, write buffers, per-thread tracer, clocks
//! - [`symbolization`]: symbol cache and address resolvers
//! - [`reader`]: decode trace files back into chunks and events
//! - [`export`]: Chrome Trace Event Format JSON for visualization
//! - [`cli`]: command-line arguments and summaries
//! - [`config`]: capture settings
//! - [`domain`]: core domain types (Pid, Tid) and errors
//!
//! The wire format itself lives in the `spindle-common` crate.
//!
//! ## Typical Usage
//!
//! ```no_run
//! use spindle::capture::{current_pid, current_tid, ProfileSink, WriteBuffer};
//!
//! # fn main() -> Result<(), spindle::domain::CaptureError> {
//! let sink = ProfileSink::create_file("trace.spall", 1.0)?;
//! let mut buffer = WriteBuffer::new(vec![0u8; 1 << 20], current_pid(), current_tid())?;
//!
//! buffer.begin(&sink, "load", "", 100)?;
//! buffer.end(&sink, 150)?;
//!
//! buffer.quit(&sink)?;
//! sink.quit()?;
//! # Ok(())
//! # }
//! ```
//!
//! ```bash
//! # Summarize and convert a recorded trace
//! spindle trace.spall --export trace.json
//! ```

pub mod capture;
pub mod cli;
pub mod config;
pub mod domain;
pub mod export;
pub mod reader;
pub mod symbolization;
