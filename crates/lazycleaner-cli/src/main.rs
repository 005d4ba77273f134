use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use lazycleaner_core::impls::TokioBlockingFactory;
use lazycleaner_core::{CleanerBuilder, CleanerConfig, CleanerStatus, LazyCleaner};
use parking_lot::Mutex;
use rand::Rng;
use serde::Serialize;
use tokio::time::sleep;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Exercise a lazy cleaner end to end.
#[derive(Debug, Parser)]
#[command(name = "lazycleaner", version)]
struct Cli {
    /// YAML cleaner config (ttl, thread_name, stack_size, keep_thread_alive).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Used when RUST_LOG is not set.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Register three objects, release the middle one, drop the rest.
    Demo,
    /// Create resources from many threads, release some, leak the rest.
    Stress(StressArgs),
}

#[derive(Debug, Args)]
struct StressArgs {
    #[arg(long, default_value_t = 8)]
    threads: usize,

    /// Resources created per thread.
    #[arg(long, default_value_t = 100_000)]
    resources: u64,

    /// Fraction of resources released explicitly (the rest are dropped).
    #[arg(long, default_value_t = 0.5)]
    release_ratio: f64,

    /// Overrides the config ttl, e.g. `10ms`.
    #[arg(long)]
    ttl: Option<humantime::Duration>,

    /// Run the worker on tokio's blocking pool instead of its own thread.
    #[arg(long)]
    tokio_worker: bool,

    /// Give up waiting for the cleaner after this long.
    #[arg(long, default_value = "60s")]
    deadline: humantime::Duration,
}

#[derive(Debug, Serialize)]
struct DemoReport {
    /// object id -> leak flag
    collected: BTreeMap<u32, bool>,
    status: CleanerStatus,
}

#[derive(Debug, Serialize)]
struct StressReport {
    created: u64,
    disposed: u64,
    released: u64,
    leaked: u64,
    elapsed_ms: u128,
    status: CleanerStatus,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let config = match &cli.config {
        Some(path) => CleanerConfig::from_yaml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => CleanerConfig::default(),
    };

    match cli.command {
        Command::Demo => demo(&config).await,
        Command::Stress(args) => stress(config, args).await,
    }
}

fn init_tracing(default_level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn demo(config: &CleanerConfig) -> anyhow::Result<()> {
    let cleaner = LazyCleaner::from_config(config)?;
    let collected = Arc::new(Mutex::new(BTreeMap::new()));

    let mut objects = Vec::new();
    for id in 0..3_u32 {
        let collected = Arc::clone(&collected);
        objects.push(cleaner.register(format!("object-{id}"), move |leak| {
            collected.lock().insert(id, leak);
            Ok(())
        })?);
    }
    info!(watched = cleaner.watched_count(), "registered demo objects");

    objects[1].clean();
    objects.clear();

    // keep-alive from the config would hold the worker forever
    cleaner.set_keep_thread_alive(false)?;
    wait_idle(&cleaner, Duration::from_secs(30)).await?;

    let report = DemoReport {
        collected: collected.lock().clone(),
        status: cleaner.status(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn stress(config: CleanerConfig, args: StressArgs) -> anyhow::Result<()> {
    if !(0.0..=1.0).contains(&args.release_ratio) {
        bail!("--release-ratio must be within 0.0..=1.0, got {}", args.release_ratio);
    }

    let mut builder = CleanerBuilder::from_config(&config);
    if let Some(ttl) = args.ttl {
        builder = builder.ttl(ttl.into());
    }
    if args.tokio_worker {
        builder = builder.thread_factory(TokioBlockingFactory::current()?);
    }
    let cleaner = Arc::new(builder.build()?);

    let created = Arc::new(AtomicU64::new(0));
    let disposed = Arc::new(AtomicU64::new(0));
    let released = Arc::new(AtomicU64::new(0));
    let started = Instant::now();

    let producers: Vec<_> = (0..args.threads)
        .map(|_| {
            let cleaner = Arc::clone(&cleaner);
            let created = Arc::clone(&created);
            let disposed = Arc::clone(&disposed);
            let released = Arc::clone(&released);
            let per_thread = args.resources;
            let ratio = args.release_ratio;
            std::thread::spawn(move || -> anyhow::Result<()> {
                let mut rng = rand::thread_rng();
                for n in 0..per_thread {
                    created.fetch_add(1, Ordering::Relaxed);
                    let disposed = Arc::clone(&disposed);
                    let resource = cleaner.register(n, move |_leak| {
                        disposed.fetch_add(1, Ordering::Relaxed);
                        Ok(())
                    })?;
                    if rng.gen_bool(ratio) {
                        resource.clean();
                        released.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Ok(())
            })
        })
        .collect();
    for producer in producers {
        match producer.join() {
            Ok(result) => result?,
            Err(_) => bail!("producer thread panicked"),
        }
    }

    let deadline = Instant::now() + Duration::from(args.deadline);
    while disposed.load(Ordering::Relaxed) != created.load(Ordering::Relaxed) {
        if Instant::now() >= deadline {
            bail!(
                "gave up: created={} disposed={}",
                created.load(Ordering::Relaxed),
                disposed.load(Ordering::Relaxed)
            );
        }
        sleep(Duration::from_millis(5)).await;
    }
    cleaner.set_keep_thread_alive(false)?;
    wait_idle(&cleaner, deadline.saturating_duration_since(Instant::now())).await?;

    let created = created.load(Ordering::Relaxed);
    let released = released.load(Ordering::Relaxed);
    let report = StressReport {
        created,
        disposed: disposed.load(Ordering::Relaxed),
        released,
        leaked: created - released,
        elapsed_ms: started.elapsed().as_millis(),
        status: cleaner.status(),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn wait_idle(cleaner: &LazyCleaner, within: Duration) -> anyhow::Result<()> {
    let deadline = Instant::now() + within;
    while cleaner.is_thread_running() {
        if Instant::now() >= deadline {
            bail!("cleaner worker still running: {:?}", cleaner.status());
        }
        sleep(Duration::from_millis(5)).await;
    }
    Ok(())
}
