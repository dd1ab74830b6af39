//! Configuration settings for pipecopy
//!
//! Defines pipe sizing, progress attribution, CLI arguments and defaults
//! for a transfer.

use crate::error::{Result, TransferError};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default writer pause threshold (64 KiB)
pub const DEFAULT_PAUSE_WRITER_THRESHOLD: usize = 64 * 1024;

/// Default writer resume threshold (32 KiB)
pub const DEFAULT_RESUME_WRITER_THRESHOLD: usize = 32 * 1024;

/// Default minimum segment size (4 KiB)
pub const DEFAULT_MINIMUM_SEGMENT_SIZE: usize = 4 * 1024;

/// pipecopy - copy a stream through a bounded buffer
#[derive(Parser, Debug, Clone)]
#[command(name = "pipecopy")]
#[command(author = "pipecopy contributors")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Copy bytes through a bounded buffer with progress and cancellation")]
#[command(long_about = r#"
pipecopy reads a source and writes a destination concurrently, connected by a
bounded in-memory pipe. The reader suspends when the pipe is full and the
writer suspends when it is empty.

Examples:
  pipecopy in.bin out.bin                     # Basic copy
  pipecopy in.bin out.bin -b 1M --progress    # 1 MiB pipe with a progress bar
  cat in.bin | pipecopy - out.bin             # Copy from stdin
  pipecopy in.bin - --report-side write       # Report progress as bytes are written
"#)]
pub struct CliArgs {
    /// Source path ("-" for stdin)
    #[arg(value_name = "SOURCE")]
    pub source: String,

    /// Destination path ("-" for stdout)
    #[arg(value_name = "DESTINATION")]
    pub destination: String,

    /// Pipe capacity (e.g., 64K, 1M)
    #[arg(short = 'b', long, default_value = "64K", value_name = "SIZE")]
    pub buffer_size: String,

    /// Which stage reports progress
    #[arg(long, value_enum, default_value = "read")]
    pub report_side: ProgressSide,

    /// Load transfer options from a JSON file (CLI flags are ignored)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Show a progress bar
    #[arg(short = 'p', long)]
    pub progress: bool,

    /// Verbose output (can be repeated: -v, -vv, -vvv)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress non-error output)
    #[arg(short = 'q', long)]
    pub quiet: bool,
}

/// Stage whose chunk sizes are reported to the progress sink
///
/// Exactly one side reports so the same bytes are never counted twice.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSide {
    /// Report as bytes are read from the source (producer stage)
    #[default]
    Read,
    /// Report as bytes are written to the destination (consumer stage)
    Write,
}

impl ProgressSide {
    /// Get human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Sizing of the bounded pipe between the two stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipeOptions {
    /// Most bytes the pipe holds; `flush` suspends the writer at this level
    pub pause_writer_threshold: usize,
    /// Buffered bytes at or below which a suspended writer resumes
    pub resume_writer_threshold: usize,
    /// Smallest region handed out by `get_memory`
    pub minimum_segment_size: usize,
}

impl Default for PipeOptions {
    fn default() -> Self {
        Self {
            pause_writer_threshold: DEFAULT_PAUSE_WRITER_THRESHOLD,
            resume_writer_threshold: DEFAULT_RESUME_WRITER_THRESHOLD,
            minimum_segment_size: DEFAULT_MINIMUM_SEGMENT_SIZE,
        }
    }
}

impl PipeOptions {
    /// Options for a pipe holding at most `capacity` flushed bytes
    ///
    /// A single flush larger than `capacity` is only published into an
    /// empty pipe.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            pause_writer_threshold: capacity,
            resume_writer_threshold: capacity / 2,
            minimum_segment_size: DEFAULT_MINIMUM_SEGMENT_SIZE.min(capacity).max(1),
        }
    }

    /// Check the thresholds describe a finite, reachable window
    pub fn validate(&self) -> Result<()> {
        if self.pause_writer_threshold == 0 {
            return Err(TransferError::config(
                "pause_writer_threshold must be greater than zero (unbounded pipes are not supported)",
            ));
        }
        if self.resume_writer_threshold > self.pause_writer_threshold {
            return Err(TransferError::config(format!(
                "resume_writer_threshold ({}) must not exceed pause_writer_threshold ({})",
                self.resume_writer_threshold, self.pause_writer_threshold
            )));
        }
        if self.minimum_segment_size == 0 {
            return Err(TransferError::config(
                "minimum_segment_size must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Options for one stream copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TransferOptions {
    /// Pipe sizing
    pub pipe: PipeOptions,
    /// Stage that reports progress
    pub progress_side: ProgressSide,
}

impl TransferOptions {
    /// Create options from CLI arguments
    pub fn from_cli(args: &CliArgs) -> Result<Self> {
        if let Some(path) = &args.config {
            return Self::from_json_file(path);
        }

        let capacity = parse_size(&args.buffer_size)
            .map_err(|e| TransferError::config(format!("Invalid buffer size: {}", e)))?;
        let options = Self {
            pipe: PipeOptions::with_capacity(capacity as usize),
            progress_side: args.report_side,
        };
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file; missing fields take their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&text)?;
        options.validate()?;
        Ok(options)
    }

    /// Validate all nested options
    pub fn validate(&self) -> Result<()> {
        self.pipe.validate()
    }
}

/// Parse human-readable size string to bytes
pub fn parse_size(size: &str) -> std::result::Result<u64, String> {
    let size = size.trim().to_uppercase();

    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let (num_str, multiplier) = if size.ends_with("GB") || size.ends_with('G') {
        (size.trim_end_matches(|c| c == 'G' || c == 'B'), 1024u64 * 1024 * 1024)
    } else if size.ends_with("MB") || size.ends_with('M') {
        (size.trim_end_matches(|c| c == 'M' || c == 'B'), 1024u64 * 1024)
    } else if size.ends_with("KB") || size.ends_with('K') {
        (size.trim_end_matches(|c| c == 'K' || c == 'B'), 1024u64)
    } else if size.ends_with('B') {
        (size.trim_end_matches('B'), 1u64)
    } else {
        // Assume bytes if no suffix
        (size.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    Ok((num * multiplier as f64) as u64)
}
