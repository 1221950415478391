//! `run` command implementation.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{info, warn};

use contracts::{PipelineConfig, SyncConfig, SyncPolicyConfig};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineStats, RunConfig};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    // Validate config path
    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    // Load and parse configuration
    let mut config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides, then re-check the combined result
    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .context("Configuration is invalid after command-line overrides")?;

    info!(
        recording = ?config.source.recording,
        topics = config.extract.topics.len(),
        window_sec = config.extract.window_sec,
        target_fps = ?config.sync.as_ref().map(|s| s.target_fps),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let run_config = RunConfig {
        pipeline: config,
        max_chunks: (args.max_chunks > 0).then_some(args.max_chunks),
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
    };

    let pipeline = Pipeline::new(run_config);
    let cancel = pipeline.cancel_handle();

    // Extraction is synchronous; keep it off the runtime workers
    let mut task = tokio::task::spawn_blocking(move || pipeline.run());

    // Setup graceful shutdown handler
    let shutdown_signal = setup_shutdown_signal();

    info!("Starting pipeline...");

    let finished = tokio::select! {
        joined = &mut task => Some(joined),
        _ = shutdown_signal => None,
    };
    let result = match finished {
        Some(joined) => joined,
        None => {
            warn!("Received shutdown signal, stopping pipeline after the current chunk...");
            cancel.cancel();
            task.await
        }
    };

    let stats = result
        .context("Pipeline task panicked")?
        .context("Pipeline execution failed")?;
    report(&stats);

    info!("Topic Syncer finished");
    Ok(())
}

/// Fold command-line overrides into the loaded configuration
fn apply_overrides(config: &mut PipelineConfig, args: &RunArgs) {
    if let Some(ref recording) = args.recording {
        info!(recording = %recording.display(), "Overriding recording from CLI");
        config.source.recording = Some(recording.clone());
    }
    if let Some(ref output) = args.output {
        info!(output = %output.display(), "Overriding output from CLI");
        config.output.path = (output != Path::new("-")).then(|| output.clone());
    }
    if let Some(window_sec) = args.window_sec {
        info!(window_sec, "Overriding window duration from CLI");
        config.extract.window_sec = window_sec;
    }
    if let Some(target_fps) = args.target_fps {
        info!(target_fps, "Overriding resampling rate from CLI");
        match config.sync.as_mut() {
            Some(sync) => sync.target_fps = target_fps,
            None => config.sync = Some(SyncConfig::new(target_fps)),
        }
    }
}

fn report(stats: &PipelineStats) {
    if stats.cancelled {
        warn!(
            chunks = stats.metrics.chunks,
            rows_written = stats.metrics.rows_written,
            "Pipeline stopped before the end of the recording"
        );
    } else {
        info!(
            chunks = stats.metrics.chunks,
            rows_written = stats.metrics.rows_written,
            rows_discarded = stats.rows_discarded,
            duration_secs = stats.duration.as_secs_f64(),
            rows_per_sec = format!("{:.2}", stats.rows_per_sec()),
            "Pipeline completed successfully"
        );
    }

    // Print detailed statistics
    stats.print_summary();
}

/// Setup Ctrl+C and SIGTERM signal handlers
///
/// A handler that cannot be installed never fires.
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(config: &PipelineConfig) {
    println!("\n=== Configuration Summary ===\n");
    println!("Source:");
    match &config.source.recording {
        Some(path) => println!("  Recording: {}", path.display()),
        None => println!("  Recording: (none)"),
    }
    println!("  Batch size: {}", config.source.batch_size);

    println!("\nExtract:");
    println!("  Window: {}s", config.extract.window_sec);
    if let Some(start) = config.extract.start_ns {
        println!("  Start: {start} ns");
    }
    if let Some(end) = config.extract.end_ns {
        println!("  End: {end} ns");
    }
    if config.extract.topics.is_empty() {
        println!("  Topics: all");
    } else {
        println!("  Topics ({}):", config.extract.topics.len());
        for selection in &config.extract.topics {
            match &selection.fields {
                Some(fields) if !fields.is_empty() => {
                    println!("  - {} [{}]", selection.topic, fields.join(", "))
                }
                _ => println!("  - {} [all fields]", selection.topic),
            }
        }
    }

    if let Some(sync) = &config.sync {
        println!("\nSync:");
        println!("  Target rate: {} Hz", sync.target_fps);
        println!("  Policy: {}", describe_policy(&sync.policy));
        println!("  Timestamp column: {}", sync.timestamp_column);
    }

    println!("\nOutput:");
    match &config.output.path {
        Some(path) => println!("  Path: {}", path.display()),
        None => println!("  Path: (stdout)"),
    }
    if config.output.skip_nulls {
        println!("  Null cells omitted");
    }

    println!();
}

pub(crate) fn describe_policy(policy: &SyncPolicyConfig) -> String {
    match policy {
        SyncPolicyConfig::Hold => "hold".to_string(),
        SyncPolicyConfig::AsOf { tolerance_ns } => format!("as_of (tolerance {tolerance_ns} ns)"),
        SyncPolicyConfig::Drop { step_ns: Some(step) } => format!("drop (step {step} ns)"),
        SyncPolicyConfig::Drop { step_ns: None } => "drop (grid step)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use contracts::ExtractConfig;
    use std::path::PathBuf;

    fn parse_run(extra: &[&str]) -> RunArgs {
        let mut argv = vec!["run"];
        argv.extend_from_slice(extra);
        RunArgs::try_parse_from(argv).unwrap()
    }

    fn base_config() -> PipelineConfig {
        PipelineConfig {
            version: Default::default(),
            source: Default::default(),
            extract: ExtractConfig::default(),
            sync: None,
            output: Default::default(),
        }
    }

    #[test]
    fn test_overrides_enable_sync() {
        let mut config = base_config();
        let args = parse_run(&["--target-fps", "20", "--recording", "rec.jsonl"]);
        apply_overrides(&mut config, &args);

        let sync = config.sync.expect("sync enabled");
        assert_eq!(sync.target_fps, 20.0);
        assert_eq!(sync.policy, SyncPolicyConfig::Hold);
        assert_eq!(config.source.recording, Some(PathBuf::from("rec.jsonl")));
    }

    #[test]
    fn test_override_keeps_policy() {
        let mut config = base_config();
        config.sync =
            Some(SyncConfig::new(5.0).with_policy(SyncPolicyConfig::AsOf { tolerance_ns: 9 }));
        apply_overrides(&mut config, &parse_run(&["--target-fps", "50"]));

        let sync = config.sync.expect("sync kept");
        assert_eq!(sync.target_fps, 50.0);
        assert_eq!(sync.policy, SyncPolicyConfig::AsOf { tolerance_ns: 9 });
    }

    #[test]
    fn test_dash_output_means_stdout() {
        let mut config = base_config();
        config.output.path = Some(PathBuf::from("out.jsonl"));
        apply_overrides(&mut config, &parse_run(&["--output", "-"]));
        assert_eq!(config.output.path, None);
    }

    #[test]
    fn test_describe_policy() {
        assert_eq!(describe_policy(&SyncPolicyConfig::Hold), "hold");
        assert_eq!(
            describe_policy(&SyncPolicyConfig::Drop { step_ns: None }),
            "drop (grid step)"
        );
    }
}
