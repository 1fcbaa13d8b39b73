//! Report output: the JSON file and the console rendering.

use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::path::Path;

use crate::models::SummaryReport;
use crate::progress::format_number;

/// Write `report` as pretty-printed JSON, creating parent directories.
pub fn write_report(report: &SummaryReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    eprintln!("Report saved to {}", path.display());
    Ok(())
}

/// Format a byte count as a human-readable string.
pub fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", format_number(bytes))
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Statistics block, file-type breakdown and master summary.
pub fn render_report(report: &SummaryReport) -> String {
    let stats = &report.statistics;
    let mut out = String::new();

    let _ = writeln!(out, "Document Summary Report");
    let _ = writeln!(out, "=======================");
    let _ = writeln!(out);
    let _ = writeln!(out, "  Documents:   {}", format_number(stats.total_documents as u64));
    let _ = writeln!(out, "  Summarized:  {}", format_number(stats.successful_summaries as u64));
    let _ = writeln!(out, "  Failed:      {}", format_number(stats.failed_summaries as u64));
    let _ = writeln!(
        out,
        "  Total size:  {} bytes ({})",
        format_number(stats.total_size_bytes),
        format_bytes(stats.total_size_bytes)
    );
    let _ = writeln!(out, "  Model:       {}", report.metadata.model_used);

    if !stats.file_types.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "  By type:");
        for (extension, count) in &stats.file_types {
            let label = if extension.is_empty() {
                "(none)"
            } else {
                extension.as_str()
            };
            let _ = writeln!(out, "    {:<10} {:>6}", label, format_number(*count as u64));
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Master Summary");
    let _ = writeln!(out, "--------------");
    let _ = writeln!(out, "{}", report.master_summary);
    out
}

pub fn print_report(report: &SummaryReport) {
    print!("{}", render_report(report));
}
