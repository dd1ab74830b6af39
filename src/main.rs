//! pipecopy CLI - Bounded-Buffer Stream Copy
//!
//! Copies a file or stdin to a file or stdout through a bounded pipe.

use anyhow::Context;
use clap::Parser;
use pipecopy::config::{CliArgs, TransferOptions};
use pipecopy::core::StreamCopier;
use pipecopy::error::TransferError;
use pipecopy::progress::ProgressReporter;
use pipecopy::stream::Endpoint;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const STDIO: &str = "-";

type Input = Endpoint<Box<dyn AsyncRead + Unpin + Send>>;
type Output = Endpoint<Box<dyn AsyncWrite + Unpin + Send>>;

fn main() {
    // Parse CLI arguments
    let args = CliArgs::parse();

    // Initialize logging; RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level(&args)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle result
    if let Err(e) = run(args) {
        eprintln!("Error: {:#}", e);
        let cancelled = e
            .downcast_ref::<TransferError>()
            .map_or(false, TransferError::is_cancellation);
        std::process::exit(if cancelled { 130 } else { 1 });
    }
}

fn default_level(args: &CliArgs) -> &'static str {
    if args.quiet {
        return "error";
    }
    match args.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn run(args: CliArgs) -> anyhow::Result<()> {
    // Build configuration
    let options = TransferOptions::from_cli(&args)?;

    let rt = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    rt.block_on(copy(&args, options))
}

async fn copy(args: &CliArgs, options: TransferOptions) -> anyhow::Result<()> {
    let (mut source, total) = open_source(&args.source).await?;
    let mut destination = open_destination(&args.destination).await?;

    // Create progress reporter
    let progress = if args.progress && !args.quiet {
        ProgressReporter::new()
    } else {
        ProgressReporter::disabled()
    };
    if let Some(total) = total {
        progress.set_total_bytes(total);
    }
    let progress = Arc::new(progress);

    let copier = StreamCopier::new(options).with_shared_progress(progress.clone());

    // Print configuration if verbose
    if args.verbose > 0 {
        print_config(args, copier.options());
    }

    let token = copier.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling copy");
            token.cancel();
        }
    });

    info!(source = %args.source, destination = %args.destination, "Starting copy");
    match copier.copy(&mut source, &mut destination).await {
        Ok(result) => {
            progress.finish_success("Copy complete");
            info!(
                reported = progress.bytes_reported(),
                percent = progress.percentage().unwrap_or(100.0),
                "Progress totals"
            );
            // Keep stdout clean when it carries the data.
            if !args.quiet && args.destination != STDIO {
                result.print_summary();
            }
            Ok(())
        }
        Err(e) => {
            progress.finish_error(&e.to_string());
            Err(e.into())
        }
    }
}

async fn open_source(path: &str) -> anyhow::Result<(Input, Option<u64>)> {
    if path == STDIO {
        let stdin: Box<dyn AsyncRead + Unpin + Send> = Box::new(tokio::io::stdin());
        return Ok((Endpoint::reader(stdin), None));
    }

    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("Failed to open source {}", path))?;
    let len = file.metadata().await.ok().map(|m| m.len());
    let file: Box<dyn AsyncRead + Unpin + Send> = Box::new(file);
    Ok((Endpoint::reader(file), len))
}

async fn open_destination(path: &str) -> anyhow::Result<Output> {
    if path == STDIO {
        let stdout: Box<dyn AsyncWrite + Unpin + Send> = Box::new(tokio::io::stdout());
        return Ok(Endpoint::writer(stdout));
    }

    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create destination {}", path))?;
    let file: Box<dyn AsyncWrite + Unpin + Send> = Box::new(file);
    Ok(Endpoint::writer(file))
}

fn print_config(args: &CliArgs, options: &TransferOptions) {
    eprintln!("=== Configuration ===");
    eprintln!("Source:        {}", args.source);
    eprintln!("Destination:   {}", args.destination);
    eprintln!(
        "Pause at:      {}",
        humansize::format_size(options.pipe.pause_writer_threshold as u64, humansize::BINARY)
    );
    eprintln!(
        "Resume at:     {}",
        humansize::format_size(options.pipe.resume_writer_threshold as u64, humansize::BINARY)
    );
    eprintln!(
        "Segment size:  {}",
        humansize::format_size(options.pipe.minimum_segment_size as u64, humansize::BINARY)
    );
    eprintln!("Report side:   {}", options.progress_side.name());
    eprintln!();
}
