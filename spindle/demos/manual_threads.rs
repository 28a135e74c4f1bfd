//! Manual tracing from several threads into one trace file
//!
//! Each thread owns its write buffer and names itself; all of them flush into a
//! shared file sink.
//!
//! Run with: cargo run --example manual_threads -- [OUTPUT]
//! Then:     cargo run -- manual_threads.spall --export manual_threads.json

use anyhow::Result;
use log::info;
use spindle::capture::{current_pid, current_tid, Clock, MonotonicClock, ProfileSink, WriteBuffer};
use spindle::config::CaptureConfig;
use std::hint::black_box;

const THREADS: usize = 4;
const ROUNDS: u64 = 200;

fn work(n: u64) -> u64 {
    (0..n).fold(0u64, |acc, i| black_box(acc.wrapping_mul(31).wrapping_add(i)))
}

fn main() -> Result<()> {
    env_logger::init();
    let output = std::env::args().nth(1).unwrap_or_else(|| "manual_threads.spall".to_string());

    let clock = MonotonicClock::new();
    let config = CaptureConfig {
        buffer_size: 64 * 1024,
        timestamp_unit: clock.timestamp_unit(),
        ..CaptureConfig::default()
    };
    config.validate()?;

    let sink = ProfileSink::create_file(&output, config.timestamp_unit)?;

    std::thread::scope(|scope| -> Result<()> {
        let workers: Vec<_> = (0..THREADS)
            .map(|index| {
                let (sink, clock) = (&sink, &clock);
                scope.spawn(move || -> Result<()> {
                    // filled with ones so every page is touched before tracing starts
                    let region = vec![1u8; config.buffer_size];
                    let mut buffer = WriteBuffer::new(region, current_pid(), current_tid())?;
                    buffer.name_thread(sink, format!("worker-{index}"))?;

                    for round in 0..ROUNDS {
                        buffer.begin(sink, "round", format!("round={round}"), clock.now())?;
                        for step in 0..3u64 {
                            buffer.begin(sink, "step", "", clock.now())?;
                            black_box(work(1_000 * (step + 1)));
                            buffer.end(sink, clock.now())?;
                        }
                        buffer.end(sink, clock.now())?;
                    }

                    buffer.quit(sink)?;
                    Ok(())
                })
            })
            .collect();

        for worker in workers {
            worker.join().map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }
        Ok(())
    })?;

    sink.quit()?;
    info!("Trace written to {output}");
    println!("saved: {output}");
    Ok(())
}
