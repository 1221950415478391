//! Configuration validation
//!
//! Rules:
//! - field-level rules declared with `validator` derives (batch size, rates, column name)
//! - topic names non-empty and unique
//! - selected field names non-empty
//! - window_sec finite and at least 1 ns
//! - start_ns < end_ns when both are set
//! - target_fps gives a grid step of at least 1 ns
//! - drop policy step_ns > 0 when set

use std::collections::HashSet;

use ::validator::{Validate, ValidationError, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, ExtractConfig, PipelineConfig, SyncConfig, SyncPolicyConfig};

const NANOS_PER_SEC: f64 = 1e9;

/// Validate a pipeline configuration
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(config: &PipelineConfig) -> Result<(), ContractError> {
    validate_declared(config)?;
    validate_topics(&config.extract)?;
    validate_window(&config.extract)?;
    validate_range(&config.extract)?;
    if let Some(sync) = &config.sync {
        validate_sync(sync)?;
    }
    Ok(())
}

/// Run the derive-declared rules
fn validate_declared(config: &PipelineConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        let (field, message) = first_violation(&errors, "")
            .unwrap_or_else(|| ("config".to_string(), errors.to_string()));
        ContractError::config_validation(field, message)
    })
}

/// First violation in field-name order, with its dotted path
fn first_violation(errors: &ValidationErrors, prefix: &str) -> Option<(String, String)> {
    let mut entries: Vec<_> = errors.errors().iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    for (name, kind) in entries {
        let path = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}.{name}")
        };
        let found = match kind {
            ValidationErrorsKind::Field(errs) => errs.first().map(|e| (path, describe(e))),
            ValidationErrorsKind::Struct(inner) => first_violation(inner, &path),
            ValidationErrorsKind::List(items) => items
                .iter()
                .find_map(|(idx, inner)| first_violation(inner, &format!("{path}[{idx}]"))),
        };
        if found.is_some() {
            return found;
        }
    }
    None
}

fn describe(error: &ValidationError) -> String {
    if let Some(message) = &error.message {
        return message.to_string();
    }
    match error.params.get("value") {
        Some(value) => format!("failed '{}' check (got {value})", error.code),
        None => format!("failed '{}' check", error.code),
    }
}

/// Topic names non-empty and unique, field names non-empty
fn validate_topics(extract: &ExtractConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, selection) in extract.topics.iter().enumerate() {
        if selection.topic.is_empty() {
            return Err(ContractError::config_validation(
                format!("extract.topics[{idx}].topic"),
                "topic name cannot be empty",
            ));
        }
        if !seen.insert(selection.topic.as_str()) {
            return Err(ContractError::config_validation(
                format!("extract.topics[topic={}]", selection.topic),
                "duplicate topic",
            ));
        }
        let fields = selection.fields.as_deref().unwrap_or_default();
        if fields.iter().any(|f| f.trim().is_empty()) {
            return Err(ContractError::config_validation(
                format!("extract.topics[topic={}].fields", selection.topic),
                "field name cannot be empty",
            ));
        }
    }
    Ok(())
}

fn validate_window(extract: &ExtractConfig) -> Result<(), ContractError> {
    let window = extract.window_sec;
    if !window.is_finite() || window <= 0.0 {
        return Err(ContractError::config_validation(
            "extract.window_sec",
            format!("window_sec must be finite and > 0, got {window}"),
        ));
    }
    if window * NANOS_PER_SEC < 1.0 {
        return Err(ContractError::config_validation(
            "extract.window_sec",
            format!("window_sec ({window}) is shorter than 1ns"),
        ));
    }
    Ok(())
}

fn validate_range(extract: &ExtractConfig) -> Result<(), ContractError> {
    if let (Some(start), Some(end)) = (extract.start_ns, extract.end_ns) {
        if start >= end {
            return Err(ContractError::config_validation(
                "extract.start_ns / extract.end_ns",
                format!("start_ns ({start}) must be < end_ns ({end})"),
            ));
        }
    }
    Ok(())
}

fn validate_sync(sync: &SyncConfig) -> Result<(), ContractError> {
    let fps = sync.target_fps;
    if !fps.is_finite() || fps <= 0.0 {
        return Err(ContractError::config_validation(
            "sync.target_fps",
            format!("target_fps must be finite and > 0, got {fps}"),
        ));
    }
    if NANOS_PER_SEC / fps < 1.0 {
        return Err(ContractError::config_validation(
            "sync.target_fps",
            format!("target_fps ({fps}) gives a grid step below 1ns"),
        ));
    }
    if let SyncPolicyConfig::Drop { step_ns: Some(0) } = sync.policy {
        return Err(ContractError::config_validation(
            "sync.policy.step_ns",
            "step_ns must be > 0",
        ));
    }
    Ok(())
}
