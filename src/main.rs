//! jobcopy CLI - copy a directory tree through the job scheduler

use anyhow::{Context, Result};
use clap::Parser;
use jobcopy::config::{CliArgs, CopyConfig};
use jobcopy::core::DirectoryCopyService;
use jobcopy::observer::{LoggingObserver, ObserverSet};
use jobcopy::progress::ProgressReporter;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
    let args = CliArgs::parse();
    init_logging(&args);

    match run(&args) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// `RUST_LOG` wins; otherwise -q/-v pick the level
fn init_logging(args: &CliArgs) {
    let level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("jobcopy={}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn run(args: &CliArgs) -> Result<bool> {
    let config = CopyConfig::from_cli(args).context("invalid configuration")?;

    if args.verbose > 0 {
        print_config(&config);
    }

    let progress = Arc::new(if args.progress && !args.quiet {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    });
    let observers = ObserverSet::new()
        .with(Arc::new(LoggingObserver::new()))
        .with(progress.clone());

    let service = DirectoryCopyService::new(config.clone()).with_observer(Arc::new(observers));

    if config.dry_run {
        let plan = service.plan().with_context(|| {
            format!("failed to plan copy of {}", config.source.display())
        })?;
        println!("=== Dry Run Mode ===");
        println!("No files will be copied.\n");
        for line in plan.describe() {
            println!("{}", line);
        }
        println!(
            "\n{} directories, {} files, {}",
            plan.directory_jobs.len(),
            plan.file_jobs.len(),
            humansize::format_size(plan.total_bytes, humansize::BINARY)
        );
        return Ok(true);
    }

    progress.set_status(&format!("copying {}", config.source.display()));
    let summary = match service.start() {
        Ok(summary) => summary,
        Err(e) => {
            progress.finish_error(&e.to_string());
            return Err(e).with_context(|| {
                format!(
                    "failed to copy {} to {}",
                    config.source.display(),
                    config.destination.display()
                )
            });
        }
    };

    if summary.is_success() {
        progress.finish_success("done");
    } else {
        progress.finish_error("finished with failures");
    }

    if !args.quiet {
        summary.print_summary();
        if progress.is_enabled() {
            println!();
            progress.summary().print();
        }
    }

    Ok(summary.is_success())
}

fn print_config(config: &CopyConfig) {
    println!("=== Configuration ===");
    println!("Source:       {}", config.source.display());
    println!("Destination:  {}", config.destination.display());
    println!("Threads:      {}", config.effective_threads());
    println!("Retries:      {}", config.retries);
    println!("Recursive:    {}", config.recursive);
    println!("Overwrite:    {}", config.overwrite);
    println!(
        "Buffer size:  {}",
        humansize::format_size(config.buffer_size as u64, humansize::BINARY)
    );
    if let Some(pattern) = &config.pattern {
        println!("Pattern:      {}", pattern);
    }
    println!("Timestamps:   {}", config.copy_timestamps);
    println!("Attributes:   {}", config.copy_attributes);
    println!();
}
