use crate::domain::{ExportError, ReadError};
use crate::reader::{Chunk, Trace};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use spindle_common::Event;
use std::collections::HashMap;
use std::io::Write;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (usually function name)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "B" = begin, "E" = end, "i" = instant, "M" = metadata
    ph: String,
    /// Timestamp in microseconds
    ts: f64,
    pid: u32,
    tid: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Chrome trace exporter for timeline visualization
#[derive(Debug)]
pub struct ChromeTraceExporter {
    events: Vec<ChromeTraceEvent>,
    /// Microseconds per tick; changed by `OverwriteTimestamp` events
    timestamp_unit: f64,
}

impl ChromeTraceExporter {
    #[must_use]
    pub fn new(timestamp_unit: f64) -> Self {
        Self { events: Vec::new(), timestamp_unit }
    }

    /// Build an exporter holding every chunk of `trace`
    ///
    /// # Errors
    /// Returns an error if a chunk contains a malformed event.
    pub fn from_trace(trace: &Trace) -> Result<Self, ExportError> {
        let mut exporter = Self::new(trace.header.timestamp_unit);
        for chunk in &trace.chunks {
            exporter.add_chunk(chunk)?;
        }
        Ok(exporter)
    }

    /// Add the events of one chunk, in stream order
    ///
    /// # Errors
    /// Returns an error if the chunk contains a malformed event. Events before
    /// it are kept.
    pub fn add_chunk(&mut self, chunk: &Chunk) -> Result<(), ExportError> {
        let (pid, tid) = (chunk.header.pid, chunk.header.tid);

        for event in chunk.events() {
            let event = event.map_err(ReadError::from)?;
            match event {
                Event::Begin { when, name, args } => {
                    let args = (!args.is_empty()).then(|| {
                        HashMap::from([(
                            "args".to_string(),
                            serde_json::json!(String::from_utf8_lossy(args)),
                        )])
                    });
                    self.push(lossy(name), "B", self.ts(when), pid, tid, args);
                }
                Event::End { when } => {
                    self.push(String::new(), "E", self.ts(when), pid, tid, None);
                }
                Event::Instant { when, name } => {
                    self.push(lossy(name), "i", self.ts(when), pid, tid, None);
                }
                Event::NameThread { name } => self.push_name("thread_name", name, pid, tid),
                Event::NameProcess { name } => self.push_name("process_name", name, pid, tid),
                Event::OverwriteTimestamp { timestamp_unit } => {
                    self.timestamp_unit = timestamp_unit;
                }
                Event::PadSkip { .. } | Event::CustomData { .. } | Event::StreamOver => {}
            }
        }
        Ok(())
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Errors
    /// Returns an error if serialization or the underlying write fails.
    pub fn export<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let trace = ChromeTrace {
            trace_events: self.events.clone(),
            display_time_unit: "ms".to_string(),
        };
        serde_json::to_writer_pretty(writer, &trace)?;
        Ok(())
    }

    /// Get the number of events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    #[allow(clippy::cast_precision_loss)]
    fn ts(&self, when: u64) -> f64 {
        when as f64 * self.timestamp_unit
    }

    fn push_name(&mut self, kind: &str, name: &[u8], pid: u32, tid: u32) {
        let args = HashMap::from([("name".to_string(), serde_json::json!(lossy(name)))]);
        self.push(kind.to_string(), "M", 0.0, pid, tid, Some(args));
    }

    fn push(
        &mut self,
        name: String,
        ph: &str,
        ts: f64,
        pid: u32,
        tid: u32,
        args: Option<HashMap<String, JsonValue>>,
    ) {
        self.events.push(ChromeTraceEvent {
            name,
            cat: "function".to_string(),
            ph: ph.to_string(),
            ts,
            pid,
            tid,
            args,
        });
    }
}

fn lossy(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
