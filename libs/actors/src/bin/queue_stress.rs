//! Queue stress tool
//!
//! Hammers one object on a queue with increments from several threads, then
//! checks the total through a synchronous barrier and prints queue statistics.

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use queue_actors::{logging, BackendKind, Runtime, RuntimeSettings};
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Runtime settings file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Queue backend, overriding the settings file
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Number of submitting threads
    #[arg(short, long, default_value_t = 8)]
    threads: usize,

    /// Total increments across all threads
    #[arg(short, long, default_value_t = 10_000)]
    increments: u64,

    /// Shared pool size, overriding the settings file
    #[arg(long)]
    pool_threads: Option<usize>,

    /// Print the effective settings as TOML and exit
    #[arg(long)]
    print_settings: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Backend {
    Pool,
    Thread,
    Tokio,
}

impl From<Backend> for BackendKind {
    fn from(backend: Backend) -> Self {
        match backend {
            Backend::Pool => BackendKind::Pool,
            Backend::Thread => BackendKind::Thread,
            Backend::Tokio => BackendKind::Tokio,
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut settings = RuntimeSettings::load(args.config.as_deref())?;
    if let Some(backend) = args.backend {
        settings.backend = backend.into();
    }
    if let Some(threads) = args.pool_threads {
        settings.pool.threads = threads;
    }
    if args.print_settings {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }
    if args.threads == 0 {
        bail!("--threads must be at least 1");
    }

    logging::init(&settings.log_level)?;

    // The Tokio backend borrows the blocking pool of a runtime entered here.
    let tokio = match settings.backend {
        BackendKind::Tokio => Some(
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("Failed to start Tokio runtime")?,
        ),
        _ => None,
    };
    let _entered = tokio.as_ref().map(|rt| rt.enter());

    let runtime = Runtime::with_settings(settings)?;
    info!(runtime_id = runtime.id(), backend = ?runtime.settings().backend, "Starting counter stress run");

    let counter = runtime.object_on_queue(|| 0u64)?;
    let started = Instant::now();

    thread::scope(|scope| {
        for index in 0..args.threads {
            let share = args.increments / args.threads as u64
                + u64::from((index as u64) < args.increments % args.threads as u64);
            let weak = counter.weak();
            scope.spawn(move || {
                for _ in 0..share {
                    weak.with(|value| *value += 1);
                }
            });
        }
    });

    let total = counter.with_sync(|value| *value);
    let elapsed = started.elapsed();
    let stats = counter.queue().stats();

    println!("backend:          {}", counter.queue().backend());
    println!("submitters:       {}", args.threads);
    println!("increments:       {}", total);
    println!("elapsed:          {:.3?}", elapsed);
    println!(
        "throughput:       {:.0} tasks/s",
        stats.tasks_run as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
    );
    println!("tasks enqueued:   {}", stats.tasks_enqueued);
    println!("wakes scheduled:  {}", stats.wakes_scheduled);
    println!("drain passes:     {}", stats.drains);

    if total != args.increments {
        bail!("expected {} increments, counted {}", args.increments, total);
    }
    Ok(())
}
