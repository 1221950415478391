//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Topic Syncer - windowed extraction and multi-rate resampling of recorded topics
#[derive(Parser, Debug)]
#[command(
    name = "topic-syncer",
    author,
    version,
    about = "Windowed multi-topic extraction with multi-rate resampling",
    long_about = "Replays a JSON-lines recording of timestamped topics, extracts the selected\n\
                  fields in fixed time windows, optionally resamples every column onto a\n\
                  uniform grid, and writes one JSON object per row."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "TOPIC_SYNCER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (logs always go to stderr)
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "TOPIC_SYNCER_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Extract (and optionally resample) a recording
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Describe the topics of a recording
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(
        short,
        long,
        default_value = "pipeline.toml",
        env = "TOPIC_SYNCER_CONFIG"
    )]
    pub config: PathBuf,

    /// Override the recording path from configuration
    #[arg(short, long, env = "TOPIC_SYNCER_RECORDING")]
    pub recording: Option<PathBuf>,

    /// Override the output path from configuration ("-" for stdout)
    #[arg(short, long, env = "TOPIC_SYNCER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override the window duration (seconds)
    #[arg(long)]
    pub window_sec: Option<f64>,

    /// Override the resampling rate (Hz); enables resampling with the hold policy
    /// when the configuration has no sync section
    #[arg(long)]
    pub target_fps: Option<f64>,

    /// Maximum number of chunks to process (0 = unlimited)
    #[arg(long, default_value = "0", env = "TOPIC_SYNCER_MAX_CHUNKS")]
    pub max_chunks: u64,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "0", env = "TOPIC_SYNCER_METRICS_PORT")]
    pub metrics_port: u16,

    /// Validate configuration and exit without running pipeline
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "pipeline.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// JSON-lines recording to inspect
    #[arg(short, long, env = "TOPIC_SYNCER_RECORDING")]
    pub recording: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// List the leaf fields of every topic
    #[arg(long)]
    pub fields: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["topic-syncer", "run"]).unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.config, PathBuf::from("pipeline.toml"));
                assert_eq!(args.max_chunks, 0);
                assert_eq!(args.metrics_port, 0);
                assert!(!args.dry_run);
            }
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn test_run_overrides() {
        let cli = Cli::try_parse_from([
            "topic-syncer",
            "-v",
            "run",
            "-c",
            "cfg.json",
            "--recording",
            "rec.jsonl",
            "--target-fps",
            "10",
            "--window-sec",
            "2.5",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 1);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.recording, Some(PathBuf::from("rec.jsonl")));
        assert_eq!(args.target_fps, Some(10.0));
        assert_eq!(args.window_sec, Some(2.5));
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["topic-syncer", "-q", "-v", "run"]).is_err());
    }

    #[test]
    fn test_info_requires_recording() {
        assert!(Cli::try_parse_from(["topic-syncer", "info"]).is_err());
    }
}
