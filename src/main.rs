/*!
 * Tripwire CLI - drives a circuit breaker against a simulated flaky service
 *
 * Useful for seeing how a breaker configuration behaves before putting it in
 * front of a real dependency: every transition is logged, and a summary of
 * admitted, rejected and failed calls is printed at the end.
 */

use anyhow::{Context, Result};
use clap::Parser;
use futures::future::join_all;
use rand::Rng;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;
use tripwire::{
    logging::{self, LogConfig, LogLevel},
    BreakerConfig, CallError, CircuitBreaker,
};

#[derive(Parser)]
#[command(name = "tripwire")]
#[command(version, about = "Exercise a circuit breaker against a simulated flaky service", long_about = None)]
struct Cli {
    /// Breaker configuration file (TOML)
    #[arg(short = 'c', long = "config", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Total number of calls to attempt across all workers
    #[arg(short = 'n', long, default_value = "200")]
    calls: u64,

    /// Number of concurrent workers
    #[arg(short = 'j', long, default_value = "4")]
    concurrency: usize,

    /// Probability that a call fails during the outage (0.0 - 1.0)
    #[arg(long, default_value = "0.5", value_parser = parse_probability)]
    failure_rate: f64,

    /// How long the outage lasts in milliseconds (0 = the whole run)
    #[arg(long, default_value = "0")]
    outage_ms: u64,

    /// Simulated latency of each call in milliseconds
    #[arg(long, default_value = "20")]
    latency_ms: u64,

    /// Pause between calls of one worker in milliseconds
    #[arg(long, default_value = "50")]
    pause_ms: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Write logs to a file instead of stdout
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
#[error("simulated service failure")]
struct SimulatedFailure;

#[derive(Debug, Default)]
struct Tally {
    succeeded: AtomicU64,
    failed: AtomicU64,
    rejected: AtomicU64,
}

struct Simulation {
    breaker: CircuitBreaker,
    tally: Tally,
    remaining: AtomicU64,
    started: Instant,
    failure_rate: f64,
    outage: Option<Duration>,
    latency: Duration,
    pause: Duration,
}

impl Simulation {
    fn in_outage(&self) -> bool {
        self.outage
            .is_none_or(|outage| self.started.elapsed() < outage)
    }

    async fn flaky_call(&self) -> Result<(), SimulatedFailure> {
        tokio::time::sleep(self.latency).await;
        let fails = self.in_outage() && rand::rng().random_bool(self.failure_rate);
        if fails {
            Err(SimulatedFailure)
        } else {
            Ok(())
        }
    }

    async fn worker(self: Arc<Self>) {
        while self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            match self.breaker.execute(|| self.flaky_call()).await {
                Ok(()) => self.tally.succeeded.fetch_add(1, Ordering::Relaxed),
                Err(CallError::Rejected(_)) => self.tally.rejected.fetch_add(1, Ordering::Relaxed),
                Err(CallError::Operation(_)) => self.tally.failed.fetch_add(1, Ordering::Relaxed),
            };
            tokio::time::sleep(self.pause).await;
        }
    }
}

fn parse_probability(s: &str) -> std::result::Result<f64, String> {
    let p: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if (0.0..=1.0).contains(&p) {
        Ok(p)
    } else {
        Err(format!("{} is not between 0.0 and 1.0", p))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logging(&LogConfig {
        level: cli.log_level,
        json: cli.json_logs,
        file: cli.log_file.clone(),
    })?;

    let config = match cli.config {
        Some(ref path) => BreakerConfig::load(path)
            .with_context(|| format!("loading breaker config from {}", path.display()))?,
        None => BreakerConfig::default(),
    };
    let breaker = config.build().context("building circuit breaker")?;
    info!(breaker = %breaker.name(), settings = ?breaker.settings(), "Starting simulation");

    let simulation = Arc::new(Simulation {
        breaker,
        tally: Tally::default(),
        remaining: AtomicU64::new(cli.calls),
        started: Instant::now(),
        failure_rate: cli.failure_rate,
        outage: (cli.outage_ms > 0).then(|| Duration::from_millis(cli.outage_ms)),
        latency: Duration::from_millis(cli.latency_ms),
        pause: Duration::from_millis(cli.pause_ms),
    });

    let workers = (0..cli.concurrency.max(1))
        .map(|_| tokio::spawn(Arc::clone(&simulation).worker()))
        .collect::<Vec<_>>();
    for joined in join_all(workers).await {
        joined.context("simulation worker panicked")?;
    }

    let tally = &simulation.tally;
    println!("breaker:    {}", simulation.breaker.name());
    println!("elapsed:    {:?}", simulation.started.elapsed());
    println!("succeeded:  {}", tally.succeeded.load(Ordering::Relaxed));
    println!("failed:     {}", tally.failed.load(Ordering::Relaxed));
    println!("rejected:   {}", tally.rejected.load(Ordering::Relaxed));
    println!("state:      {}", simulation.breaker.state());

    Ok(())
}
