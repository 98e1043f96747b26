use crate::constants::is_valid_subject;
use crate::error::{CollectError, Result};
use crate::types::NormalizedRecord;
use chrono::{DateTime, Local, SecondsFormat};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CSV_HEADER: [&str; 7] = [
    "text",
    "timestamp",
    "sourceId",
    "link",
    "metrics.replies",
    "metrics.retweets",
    "metrics.likes",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ExportFormat {
    Csv,
    Json,
    Both,
}

/// `{subject}_tweets_{YYYYmmdd_HHMMSS}.{extension}`
pub fn export_filename(subject: &str, at: DateTime<Local>, extension: &str) -> String {
    format!(
        "{}_tweets_{}.{}",
        subject,
        at.format("%Y%m%d_%H%M%S"),
        extension
    )
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

pub fn to_csv(records: &[NormalizedRecord]) -> String {
    let mut out = CSV_HEADER.join(",");
    out.push_str("\r\n");
    for record in records {
        let metrics = record.metrics();
        let row = [
            csv_field(record.text()),
            record.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
            csv_field(record.source_id()),
            csv_field(record.link().unwrap_or_default()),
            metrics.replies.to_string(),
            metrics.retweets.to_string(),
            metrics.likes.to_string(),
        ];
        out.push_str(&row.join(","));
        out.push_str("\r\n");
    }
    out
}

/// Write `records` under `output_dir` in the requested format(s) and return
/// the written paths.
pub fn export_records(
    records: &[NormalizedRecord],
    subject: &str,
    output_dir: &Path,
    format: ExportFormat,
) -> Result<Vec<PathBuf>> {
    if !is_valid_subject(subject) {
        return Err(CollectError::InvalidRequest(format!(
            "refusing to export under subject '{}'",
            subject
        )));
    }
    fs::create_dir_all(output_dir)?;
    let now = Local::now();
    let mut written = Vec::new();

    if matches!(format, ExportFormat::Csv | ExportFormat::Both) {
        let path = output_dir.join(export_filename(subject, now, "csv"));
        fs::write(&path, to_csv(records))?;
        written.push(path);
    }
    if matches!(format, ExportFormat::Json | ExportFormat::Both) {
        let path = output_dir.join(export_filename(subject, now, "json"));
        fs::write(&path, serde_json::to_string_pretty(records)?)?;
        written.push(path);
    }

    for path in &written {
        info!("Saved {} tweets to {}", records.len(), path.display());
    }
    Ok(written)
}
