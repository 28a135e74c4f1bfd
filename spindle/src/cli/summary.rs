//! Per-thread trace summaries for terminal output
//!
//! Counts only; no timing analysis is done here.

use crate::domain::{Pid, Tid};
use crate::reader::Trace;
use spindle_common::{DecodeError, Event};
use std::collections::BTreeMap;
use std::fmt;

/// What one thread contributed to a trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadSummary {
    /// Last name given to the thread, if any
    pub name: Option<String>,
    pub chunks: usize,
    pub begins: usize,
    pub ends: usize,
    /// Every other event, padding included
    pub other: usize,
    /// Smallest chunk `first_ts`
    pub first_ts: u64,
}

impl ThreadSummary {
    #[must_use]
    pub fn events(&self) -> usize {
        self.begins + self.ends + self.other
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceSummary {
    pub timestamp_unit: f64,
    pub process_names: BTreeMap<Pid, String>,
    pub threads: BTreeMap<(Pid, Tid), ThreadSummary>,
}

impl TraceSummary {
    /// # Errors
    /// Returns the first malformed event found.
    pub fn from_trace(trace: &Trace) -> Result<Self, DecodeError> {
        let mut process_names = BTreeMap::new();
        let mut threads: BTreeMap<(Pid, Tid), ThreadSummary> = BTreeMap::new();

        for chunk in &trace.chunks {
            let key = (chunk.pid(), chunk.tid());
            let thread = threads.entry(key).or_insert_with(|| ThreadSummary {
                first_ts: chunk.header.first_ts,
                ..ThreadSummary::default()
            });
            thread.chunks += 1;
            thread.first_ts = thread.first_ts.min(chunk.header.first_ts);

            for event in chunk.events() {
                match event? {
                    Event::Begin { .. } => thread.begins += 1,
                    Event::End { .. } => thread.ends += 1,
                    Event::NameThread { name } => {
                        thread.name = Some(String::from_utf8_lossy(name).into_owned());
                        thread.other += 1;
                    }
                    Event::NameProcess { name } => {
                        process_names.insert(key.0, String::from_utf8_lossy(name).into_owned());
                        thread.other += 1;
                    }
                    _ => thread.other += 1,
                }
            }
        }

        Ok(Self {
            timestamp_unit: trace.header.timestamp_unit,
            process_names,
            threads,
        })
    }

    #[must_use]
    pub fn total_events(&self) -> usize {
        self.threads.values().map(ThreadSummary::events).sum()
    }

    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.threads.values().map(|t| t.chunks).sum()
    }
}

impl fmt::Display for TraceSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Timestamp unit: {} µs/tick", self.timestamp_unit)?;
        writeln!(
            f,
            "{} chunks, {} events, {} threads",
            self.total_chunks(),
            self.total_events(),
            self.threads.len()
        )?;
        writeln!(f)?;
        writeln!(
            f,
            "{:<12} {:<12} {:<20} {:>7} {:>9} {:>9} {:>7}",
            "PROCESS", "THREAD", "NAME", "CHUNKS", "BEGIN", "END", "OTHER"
        )?;
        for ((pid, tid), thread) in &self.threads {
            let name = thread.name.as_deref().unwrap_or("-");
            writeln!(
                f,
                "{:<12} {:<12} {:<20} {:>7} {:>9} {:>9} {:>7}",
                pid.to_string(),
                tid.to_string(),
                name,
                thread.chunks,
                thread.begins,
                thread.ends,
                thread.other
            )?;
            if thread.begins != thread.ends {
                writeln!(
                    f,
                    "    unbalanced: {} begin vs {} end events",
                    thread.begins, thread.ends
                )?;
            }
        }
        for (pid, name) in &self.process_names {
            writeln!(f, "{pid} named {name:?}")?;
        }
        Ok(())
    }
}

/// One-line rendering of an event for `--events`
#[must_use]
pub fn describe_event(event: &Event<'_>) -> String {
    match event {
        Event::Begin { when, name, args } if args.is_empty() => {
            format!("{when:>16} B {}", String::from_utf8_lossy(name))
        }
        Event::Begin { when, name, args } => format!(
            "{when:>16} B {} ({})",
            String::from_utf8_lossy(name),
            String::from_utf8_lossy(args)
        ),
        Event::End { when } => format!("{when:>16} E"),
        Event::Instant { when, name } => format!("{when:>16} I {}", String::from_utf8_lossy(name)),
        Event::NameThread { name } => {
            format!("{:>16} thread name {}", "", String::from_utf8_lossy(name))
        }
        Event::NameProcess { name } => {
            format!("{:>16} process name {}", "", String::from_utf8_lossy(name))
        }
        Event::OverwriteTimestamp { timestamp_unit } => {
            format!("{:>16} timestamp unit now {timestamp_unit}", "")
        }
        Event::PadSkip { size } => format!("{:>16} padding ({size} bytes)", ""),
        Event::CustomData { data } => format!("{:>16} custom data ({} bytes)", "", data.len()),
        Event::StreamOver => format!("{:>16} end of stream", ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::Chunk;
    use spindle_common::{
        encode_begin, encode_end, encode_name, BufferHeader, NameKind, StreamHeader,
    };

    fn chunk(tid: u32, first_ts: u64, payload: Vec<u8>) -> Chunk {
        Chunk {
            header: BufferHeader {
                payload_size: u32::try_from(payload.len()).unwrap(),
                tid,
                pid: 1,
                first_ts,
            },
            payload,
        }
    }

    fn sample_trace() -> Trace {
        let mut buf = [0u8; 128];
        let mut n = encode_name(&mut buf, b"main", NameKind::Thread).unwrap();
        n += encode_name(&mut buf[n..], b"app", NameKind::Process).unwrap();
        n += encode_begin(&mut buf[n..], b"f", b"", 10).unwrap();
        n += encode_end(&mut buf[n..], 20).unwrap();
        let first = buf[..n].to_vec();

        let mut buf = [0u8; 64];
        let n = encode_begin(&mut buf, b"g", b"", 30).unwrap();
        let second = buf[..n].to_vec();

        Trace {
            header: StreamHeader { timestamp_unit: 1.0 },
            chunks: vec![chunk(7, 10, first), chunk(8, 30, second.clone()), chunk(7, 5, second)],
        }
    }

    #[test]
    fn test_summary_counts_per_thread() {
        let summary = TraceSummary::from_trace(&sample_trace()).unwrap();
        let main = &summary.threads[&(Pid(1), Tid(7))];
        assert_eq!(main.name.as_deref(), Some("main"));
        assert_eq!(main.chunks, 2);
        assert_eq!((main.begins, main.ends, main.other), (2, 1, 2));
        assert_eq!(main.first_ts, 5);
        assert_eq!(summary.process_names[&Pid(1)], "app");
        assert_eq!(summary.total_chunks(), 3);
        assert_eq!(summary.total_events(), 6);
    }

    #[test]
    fn test_display_flags_unbalanced_threads() {
        let text = TraceSummary::from_trace(&sample_trace()).unwrap().to_string();
        assert!(text.contains("3 chunks, 6 events, 2 threads"));
        assert!(text.contains("unbalanced: 2 begin vs 1 end events"));
        assert!(text.contains("TID:8"));
    }

    #[test]
    fn test_describe_event() {
        let begin = Event::Begin { when: 5, name: b"f", args: b"x" };
        assert!(describe_event(&begin).ends_with("B f (x)"));
        assert!(describe_event(&Event::End { when: 6 }).ends_with("6 E"));
    }
}
