//! Trace export functionality
//!
//! Converts binary traces into formats other tools understand. Currently
//! supports Chrome Trace Event Format for visualization in `chrome://tracing`,
//! Perfetto and Speedscope.

pub mod chrome_trace;

pub use chrome_trace::ChromeTraceExporter;
