//! `info` command implementation.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use extractor::{Recording, TopicSummary};

use crate::cli::InfoArgs;
use crate::error::CliError;

/// Recording info for JSON output
#[derive(Serialize)]
struct RecordingInfo {
    path: String,
    samples: usize,
    out_of_order: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_ns: Option<u64>,
    topics: Vec<TopicInfo>,
}

#[derive(Serialize)]
struct TopicInfo {
    topic: String,
    samples: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    first_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rate_hz: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    fields: Vec<String>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(recording = %args.recording.display(), "Loading recording info");

    if !args.recording.exists() {
        return Err(CliError::recording_not_found(args.recording.display().to_string()).into());
    }

    let recording = Recording::load(&args.recording)
        .with_context(|| format!("Failed to load recording {}", args.recording.display()))?;

    let info = build_recording_info(&recording, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize recording info")?;
        println!("{}", json);
    } else {
        print_recording_info(&info);
    }

    Ok(())
}

fn build_recording_info(recording: &Recording, args: &InfoArgs) -> RecordingInfo {
    let topics: Vec<TopicInfo> = recording
        .summary()
        .into_iter()
        .map(|summary| topic_info(summary, args.fields))
        .collect();

    RecordingInfo {
        path: args.recording.display().to_string(),
        samples: recording.len(),
        out_of_order: recording.out_of_order(),
        first_ns: topics.iter().filter_map(|t| t.first_ns).min(),
        last_ns: topics.iter().filter_map(|t| t.last_ns).max(),
        topics,
    }
}

fn topic_info(summary: TopicSummary, with_fields: bool) -> TopicInfo {
    // mean rate over the topic's own span
    let rate_hz = match (summary.first_ns, summary.last_ns) {
        (Some(first), Some(last)) if last > first && summary.samples > 1 => {
            Some((summary.samples - 1) as f64 * 1e9 / (last - first) as f64)
        }
        _ => None,
    };

    TopicInfo {
        topic: summary.topic.to_string(),
        samples: summary.samples,
        first_ns: summary.first_ns,
        last_ns: summary.last_ns,
        rate_hz,
        fields: if with_fields {
            summary.schema.leaf_paths()
        } else {
            Vec::new()
        },
    }
}

fn print_recording_info(info: &RecordingInfo) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║                     Recording Overview                       ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    println!("📼 Recording");
    println!("   ├─ Path: {}", info.path);
    println!("   ├─ Samples: {}", info.samples);
    println!("   ├─ Out-of-order records: {}", info.out_of_order);
    match (info.first_ns, info.last_ns) {
        (Some(first), Some(last)) => println!(
            "   └─ Span: {} .. {} ns ({:.3}s)",
            first,
            last,
            (last - first) as f64 / 1e9
        ),
        _ => println!("   └─ Span: (empty)"),
    }

    println!("\n📡 Topics ({})", info.topics.len());
    for (i, topic) in info.topics.iter().enumerate() {
        let is_last = i == info.topics.len() - 1;
        let prefix = if is_last { "└─" } else { "├─" };
        let child_prefix = if is_last { "   " } else { "│  " };

        let rate = topic
            .rate_hz
            .map(|r| format!("{r:.2} Hz"))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "   {} {} ({} samples, {})",
            prefix, topic.topic, topic.samples, rate
        );

        for (j, field) in topic.fields.iter().enumerate() {
            let field_prefix = if j == topic.fields.len() - 1 { "└─" } else { "├─" };
            println!("   {}  {} {}", child_prefix, field_prefix, field);
        }
    }

    println!();
}
