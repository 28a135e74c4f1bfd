//! Address-driven tracing with DWARF symbol resolution
//!
//! Instead of naming every event, the program reports the address of the
//! function it enters, the way compiler-inserted entry/exit hooks would. The
//! per-thread tracer resolves each address once through its symbol cache.
//!
//! Build with debug info for DWARF names (the default dev profile has it).
//!
//! Run with: cargo run --example auto_tracing -- [OUTPUT]

use anyhow::Result;
use spindle::capture::{current_pid, current_tid, Clock, MonotonicClock, ProfileSink, ThreadTracer};
use spindle::config::CaptureConfig;
use spindle::domain::CaptureError;
use spindle::symbolization::DwarfResolver;
use std::hint::black_box;

struct Traced<'a> {
    tracer: ThreadTracer<Vec<u8>, DwarfResolver>,
    sink: &'a ProfileSink,
    clock: MonotonicClock,
}

impl Traced<'_> {
    fn call<T>(&mut self, function: fn(&mut Self, u64) -> Result<T>, arg: u64) -> Result<T> {
        self.tracer.enter(self.sink, function as usize as u64, self.clock.now())?;
        let result = function(self, arg);
        self.tracer.exit(self.sink, self.clock.now())?;
        result
    }
}

#[inline(never)]
fn fibonacci(ctx: &mut Traced<'_>, n: u64) -> Result<u64> {
    if n < 2 {
        return Ok(n);
    }
    Ok(ctx.call(fibonacci, n - 1)? + ctx.call(fibonacci, n - 2)?)
}

#[inline(never)]
fn checksum(_ctx: &mut Traced<'_>, n: u64) -> Result<u64> {
    Ok((0..n).fold(0u64, |acc, i| black_box(acc ^ i.rotate_left(7))))
}

#[inline(never)]
fn run_all(ctx: &mut Traced<'_>, rounds: u64) -> Result<u64> {
    let mut total = 0;
    for round in 0..rounds {
        total += ctx.call(fibonacci, 12 + round % 4)?;
        total += ctx.call(checksum, 10_000)?;
    }
    Ok(total)
}

fn main() -> Result<()> {
    env_logger::init();
    let output = std::env::args().nth(1).unwrap_or_else(|| "auto_tracing.spall".to_string());

    let clock = MonotonicClock::new();
    let config = CaptureConfig {
        timestamp_unit: clock.timestamp_unit(),
        ..CaptureConfig::default()
    };
    config.validate()?;

    let sink = ProfileSink::create_file(&output, config.timestamp_unit)?;
    let resolver = DwarfResolver::for_current_exe()?;
    let tracer = ThreadTracer::new(
        config.allocate_buffer(),
        current_pid(),
        current_tid(),
        config.symbol_cache_capacity,
        resolver,
    )?;

    let mut ctx = Traced { tracer, sink: &sink, clock };
    ctx.tracer.name_thread(&sink, "main")?;
    let total = ctx.call(run_all, 20)?;
    println!("result: {total}, {} distinct functions", ctx.tracer.cache().len());

    ctx.tracer.quit(&sink).map_err(CaptureError::from)?;
    sink.quit()?;
    println!("saved: {output}");
    Ok(())
}
