use clap::Parser;
use sysvitals::{Config, Engine, Result};

#[derive(Parser, Debug)]
#[command(name = "sysvitals")]
#[command(author, version, about = "Host resource telemetry sampler", long_about = None)]
struct Args {
    #[arg(short, long, help = "Sampling interval in milliseconds")]
    interval: Option<u64>,

    #[arg(long, help = "Samples retained per metric series")]
    capacity: Option<usize>,

    #[arg(long, help = "Comma-separated metric ids to enable (default: all known)")]
    metrics: Option<String>,

    #[arg(long, help = "Disable GPU probing")]
    no_gpu: bool,

    #[arg(
        short,
        long,
        help = "Number of export snapshots to print before exiting (0 = run forever)",
        default_value = "0"
    )]
    samples: u64,

    #[arg(short, long, help = "Verbose logging")]
    verbose: bool,
}

/// Flags beat environment: only flags the user actually passed touch the
/// config, so an explicit `--interval 1000` still overrides SYSVITALS_*.
fn apply_cli_overrides(config: &mut Config, args: &Args) {
    if let Some(interval) = args.interval {
        config.sample_interval_ms = interval;
    }
    if let Some(capacity) = args.capacity {
        config.series_capacity = capacity;
    }
    if let Some(metrics) = &args.metrics {
        config.enabled_metrics = metrics
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
    }
    if args.no_gpu {
        config.gpu_probe_enabled = false;
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    log::info!("Starting sysvitals v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::from_env()?;
    apply_cli_overrides(&mut config, &args);

    let mut engine = Engine::start(config)?;
    let interval = engine.config().sample_interval();

    let mut printed = 0u64;
    loop {
        std::thread::sleep(interval);
        let document = engine.export_report()?;
        println!("{}", serde_json::to_string_pretty(&document)?);
        printed += 1;
        if args.samples != 0 && printed >= args.samples {
            break;
        }
    }

    engine.stop();
    Ok(())
}
