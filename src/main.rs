use anyhow::{Context, Result};
use clap::Parser;
use tickprof::cli::{Cli, Command, OutputFormat};
use tickprof::clock::{ClockSource, SystemClock};
use tickprof::registry::TimerRegistry;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Recursive region: only the outermost call produces a sample
fn fib<C: ClockSource>(registry: &TimerRegistry<C>, n: u32) -> u64 {
    let _guard = registry.scope("demo::fib");
    if n < 2 {
        u64::from(n)
    } else {
        fib(registry, n - 1) + fib(registry, n - 2)
    }
}

fn checksum<C: ClockSource>(registry: &TimerRegistry<C>, seed: u64) -> u64 {
    registry.measure("demo::checksum", || {
        (0..4_096u64).fold(seed, |acc, i| acc.rotate_left(5) ^ i.wrapping_mul(0x9e37_79b9))
    })
}

/// Nested workload: `demo::iteration` encloses both inner regions
fn run_workload(registry: &TimerRegistry<SystemClock>, iterations: u32, depth: u32) -> u64 {
    let mut acc = 0u64;
    for i in 0..iterations {
        let _iteration = registry.scope("demo::iteration");
        acc = acc.wrapping_add(fib(registry, depth));
        acc ^= checksum(registry, u64::from(i));
    }
    acc
}

fn main() -> Result<()> {
    let args = Cli::parse();

    // Initialize tracing if --debug flag is set
    init_tracing(args.debug);

    let config = args.profiler_config()?;

    match args.command {
        Command::Calibrate => {
            let (_, calibration) = config.calibrate().context("Calibration failed")?;
            println!("clock:                {:?}", config.clock);
            println!("reference:            {}ms", config.calibration_ms);
            println!("ticks per millisecond: {}", calibration.ticks_per_ms);
            println!("overhead ticks:       {}", calibration.overhead_ticks);
        }
        Command::Demo {
            iterations,
            depth,
            format,
        } => {
            let registry = config
                .build_registry()
                .context("Failed to create timer registry")?;
            let acc = run_workload(&registry, iterations, depth);
            tracing::debug!(checksum = acc, "workload finished");

            let report = registry.report();
            match format {
                OutputFormat::Csv => print!("{}", report.to_csv()),
                OutputFormat::Json => println!("{}", report.to_json()?),
            }
        }
    }

    Ok(())
}
