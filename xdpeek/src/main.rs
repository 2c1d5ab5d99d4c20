use anyhow::Context as _;
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use aya::maps::perf::AsyncPerfEventArray;
use aya::programs::Xdp;
use aya::util::online_cpus;
use aya::Ebpf;

mod api;
mod config;
mod reader;
mod record;
mod stats;

use config::{CliArgs, Config};
use reader::{Printer, ReaderContext};
use record::MonotonicClock;
use stats::Stats;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = CliArgs::parse();

    // Load config from file if provided, otherwise use defaults.
    let mut config = if let Some(ref config_path) = cli.config {
        Config::from_file(Path::new(config_path))?
    } else {
        Config::default()
    };
    config.merge_cli(&cli)?;

    // Logging.
    if config.quiet {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new("error"))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::EnvFilter::new(
                std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
            ))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    // ── eBPF setup ────────────────────────────────────────────────────
    let mut bpf = Ebpf::load_file(&config.object)
        .with_context(|| format!("failed to load XDP object {}", config.object.display()))?;

    let program: &mut Xdp = bpf
        .program_mut("xdpeek")
        .context("xdpeek program missing from object")?
        .try_into()?;
    program.load()?;
    program
        .attach(&config.interface, config.xdp_mode.flags())
        .with_context(|| {
            format!(
                "failed to attach XDP program to {} in {:?} mode",
                config.interface, config.xdp_mode
            )
        })?;
    tracing::info!(
        "XDP program attached to {} ({:?} mode)",
        config.interface,
        config.xdp_mode
    );

    // ── Per-CPU readers ───────────────────────────────────────────────
    let cpus = online_cpus().map_err(|(_, e)| anyhow::anyhow!("failed to get online cpus: {}", e))?;
    let mut events = AsyncPerfEventArray::try_from(
        bpf.take_map("EVENTS").context("EVENTS map missing from object")?,
    )?;

    let stats = Stats::default();
    let ctx = ReaderContext {
        clock: MonotonicClock::calibrate().context("failed to read system clocks")?,
        stats: stats.clone(),
        printer: Printer::from_config(&config),
    };
    let (output, mut writer) = reader::spawn_writer(std::io::stdout());
    let mut readers = reader::spawn_readers(&mut events, &cpus, &config, &ctx, output)?;

    // ── Metrics API (optional) ────────────────────────────────────────
    if let Some(port) = config.metrics_port {
        let app_state = Arc::new(api::AppState::new(stats.clone(), config.interface.clone()));
        tokio::spawn(async move {
            if let Err(e) = api::serve(app_state, port).await {
                tracing::error!("metrics server failed: {}", e);
            }
        });
    }

    println!(
        "Starting packet tracing on {}... Press Ctrl-C to end.\n",
        config.interface
    );

    let outcome = tokio::select! {
        res = wait_for_shutdown() => res,
        e = reader::first_exit(&mut readers) => Err(e),
        res = &mut writer => Err(match res {
            Ok(Ok(_)) => anyhow::anyhow!("output writer stopped"),
            Ok(Err(e)) => anyhow::Error::new(e).context("failed to write records"),
            Err(e) => anyhow::Error::new(e).context("output writer panicked"),
        }),
    };
    if let Err(ref e) = outcome {
        tracing::error!("stopping early: {:#}", e);
    }

    readers.abort_all();
    tracing::info!("{}", stats.summary());
    tracing::info!("Removing XDP program from {}", config.interface);
    // Dropping `bpf` detaches the program.
    drop(bpf);

    outcome
}

async fn wait_for_shutdown() -> anyhow::Result<()> {
    let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => res?,
        _ = term.recv() => {}
    }
    Ok(())
}
