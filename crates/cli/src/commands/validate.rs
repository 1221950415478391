//! `validate` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use contracts::PipelineConfig;

use super::run::describe_policy;
use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    recording: Option<String>,
    topic_count: usize,
    window_sec: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    target_fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    policy: Option<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    // Check file exists
    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    // Try to load and validate
    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    recording: config
                        .source
                        .recording
                        .as_ref()
                        .map(|p| p.display().to_string()),
                    topic_count: config.extract.topics.len(),
                    window_sec: config.extract.window_sec,
                    target_fps: config.sync.as_ref().map(|s| s.target_fps),
                    policy: config.sync.as_ref().map(|s| describe_policy(&s.policy)),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(config: &PipelineConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    match &config.source.recording {
        None => warnings
            .push("source.recording is not set - pass --recording when running".to_string()),
        Some(path) if !path.exists() => {
            warnings.push(format!("Recording '{}' does not exist yet", path.display()))
        }
        Some(_) => {}
    }

    if config.extract.topics.is_empty() {
        warnings.push("extract.topics is empty - every topic will be extracted".to_string());
    }

    if let (Some(start), Some(end)) = (config.extract.start_ns, config.extract.end_ns) {
        if config.extract.window_sec * 1e9 >= (end - start) as f64 {
            warnings.push(
                "extract.window_sec covers the whole range - everything loads into one chunk"
                    .to_string(),
            );
        }
    }

    if let Some(sync) = &config.sync {
        if sync.target_fps * config.extract.window_sec < 1.0 {
            warnings.push(format!(
                "sync.target_fps ({} Hz) yields less than one tick per window",
                sync.target_fps
            ));
        }
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            if let Some(ref recording) = summary.recording {
                println!("  Recording: {}", recording);
            }
            println!("  Topics: {}", summary.topic_count);
            println!("  Window: {}s", summary.window_sec);
            if let (Some(fps), Some(policy)) = (summary.target_fps, summary.policy.as_ref()) {
                println!("  Sync: {} Hz, {}", fps, policy);
            }
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
