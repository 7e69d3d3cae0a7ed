use anyhow::{Context, Result};
use atomic_fairness::config::{parse_mask, CliArgs};
use atomic_fairness::Config;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atomic-fairness")]
#[command(about = "Measures how fairly pinned threads share a contended atomic counter")]
#[command(
    long_about = "By default runs one thread on each allowed cpu; use taskset(1) to \
                  restrict operation to fewer cpus/threads."
)]
struct Cli {
    #[arg(short = 'd', long, value_parser = parse_delay_mask, help = "Mask of cpus whose workers delay before each mode")]
    delay_mask: Option<u64>,

    #[arg(short = 's', long, help = "Number of counter rows to sweep")]
    sweep_count: Option<usize>,

    #[arg(short = 'n', long, help = "Sampling windows per phase, the first is discarded")]
    samples: Option<usize>,

    #[arg(short = 't', long = "interval", help = "Sampling window length in milliseconds")]
    interval_ms: Option<u64>,

    #[arg(short = 'v', long, help = "Statistics verbosity (0 to 3)")]
    verbosity: Option<u8>,

    #[arg(short = 'N', long, help = "Batches of increments per progress report")]
    batches_per_report: Option<u32>,

    #[arg(short = 'r', long, allow_negative_numbers = true, help = "Counter bucket spacing between workers")]
    spacer: Option<f64>,

    #[arg(long, help = "Increments per batch")]
    batch_size: Option<u32>,

    #[arg(long, help = "Delay in milliseconds for workers selected by the delay mask")]
    delay_ms: Option<u64>,

    #[arg(long, help = "Do not pin workers to their cpus")]
    no_pin: bool,

    #[arg(long = "threads", help = "Use at most this many cpus")]
    max_threads: Option<usize>,

    #[arg(long, help = "Write latency histograms as CSV into this directory")]
    plot_dir: Option<PathBuf>,

    #[arg(short = 'c', long = "config", env = "ATOMIC_FAIRNESS_CONFIG", help = "Config file (toml or json)")]
    config: Option<PathBuf>,

    #[arg(long, help = "Log level: error, warn, info, debug or trace")]
    log_level: Option<String>,
}

fn parse_delay_mask(s: &str) -> Result<u64, String> {
    parse_mask(s).map_err(|e| e.to_string())
}

impl From<Cli> for CliArgs {
    fn from(cli: Cli) -> Self {
        Self {
            config_file: cli.config,
            sweep_count: cli.sweep_count,
            samples: cli.samples,
            interval_ms: cli.interval_ms,
            batch_size: cli.batch_size,
            batches_per_report: cli.batches_per_report,
            spacer: cli.spacer,
            delay_mask: cli.delay_mask,
            delay_ms: cli.delay_ms,
            no_pin: cli.no_pin,
            max_threads: cli.max_threads,
            verbosity: cli.verbosity,
            plot_dir: cli.plot_dir,
            log_level: cli.log_level,
        }
    }
}

fn main() -> Result<()> {
    let cli_args = CliArgs::from(Cli::parse());

    let config = Config::load_with_cli(&cli_args).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    atomic_fairness::logging::setup_logging(&config.logging.level)?;

    atomic_fairness::run(config)
}
