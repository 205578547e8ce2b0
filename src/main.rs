use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use tracing_subscriber::EnvFilter;

use asset_pipeline::assembler::{run_build, BuildStats};
use asset_pipeline::config::{Cli, Config};
use asset_pipeline::error::BuildError;

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config = Config::from_cli(cli)?;
    init_logging(config.verbose);

    // Setup Ctrl+C handler
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Configure Rayon thread pool
    rayon::ThreadPoolBuilder::new()
        .num_threads(config.jobs)
        .build_global()
        .ok();

    let policy = config.policy();
    info!(
        mode = %policy.mode(),
        source = %config.layout.source_root.display(),
        output = %config.layout.output_root.display(),
        jobs = config.jobs,
        "starting build"
    );
    if policy.should_enable_live_reload() {
        info!(
            port = config.dev_server.port,
            open = config.dev_server.open,
            "live reload enabled for the dev server"
        );
    }

    // Progress bar only in verbose mode; the length is set once the plan is known
    let progress = config.verbose.then(|| {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb
    });

    let start = Instant::now();
    let stats = BuildStats::new();

    let result = run_build(&config, &shutdown, &stats, progress.as_ref());

    if let Some(pb) = &progress {
        pb.finish_and_clear();
    }

    let report = match result {
        Ok(report) => report,
        Err(BuildError::Cancelled) => {
            eprintln!("\nBuild cancelled");
            return Ok(ExitCode::from(130));
        }
        Err(e) => {
            return Err(e).with_context(|| {
                format!("Build of {} failed", config.layout.source_root.display())
            })
        }
    };

    let duration = start.elapsed();
    println!(
        "Built {} artifacts ({} bytes) in {:.2}s",
        report.artifacts.len(),
        report.total_bytes(),
        duration.as_secs_f64()
    );

    if config.verbose {
        for artifact in &report.artifacts {
            println!("  {} ({} bytes)", artifact.url(), artifact.bytes);
        }
    }

    Ok(ExitCode::SUCCESS)
}
