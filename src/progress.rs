//! Pipeline progress reporting.
//!
//! Progress goes to **stderr** so stdout stays reserved for the final report.
//! Three reporters: human-readable lines, one JSON object per line, or
//! nothing.

use std::io::Write;

/// A single progress event from a run.
#[derive(Clone, Debug, PartialEq)]
pub enum ProgressEvent {
    /// A source is listing items. Total unknown.
    Discovering { source: String },
    Extracting { n: usize, total: usize, name: String },
    Extracted { name: String, chars: usize, warning: bool },
    Summarizing { n: usize, total: usize, name: String },
    Summarized { name: String, ok: bool },
    Aggregating { documents: usize },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: `summarize  [3/12]  report.pdf`.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let line = match &event {
            ProgressEvent::Discovering { source } => format!("list {}  discovering...\n", source),
            ProgressEvent::Extracting { n, total, name } => {
                format!("extract  [{}/{}]  {}\n", n, total, name)
            }
            ProgressEvent::Extracted {
                name,
                chars,
                warning,
            } => {
                if *warning {
                    format!("extract  {}  failed, placeholder kept\n", name)
                } else {
                    format!("extract  {}  {} chars\n", name, format_number(*chars as u64))
                }
            }
            ProgressEvent::Summarizing { n, total, name } => {
                format!("summarize  [{}/{}]  {}\n", n, total, name)
            }
            ProgressEvent::Summarized { name, ok } => {
                format!("summarize  {}  {}\n", name, if *ok { "ok" } else { "error" })
            }
            ProgressEvent::Aggregating { documents } => {
                format!("aggregate  {} summaries\n", format_number(*documents as u64))
            }
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl JsonProgress {
    fn to_json(event: &ProgressEvent) -> serde_json::Value {
        match event {
            ProgressEvent::Discovering { source } => serde_json::json!({
                "event": "progress",
                "phase": "discovering",
                "source": source
            }),
            ProgressEvent::Extracting { n, total, name } => serde_json::json!({
                "event": "progress",
                "phase": "extracting",
                "n": n,
                "total": total,
                "name": name
            }),
            ProgressEvent::Extracted {
                name,
                chars,
                warning,
            } => serde_json::json!({
                "event": "extracted",
                "name": name,
                "chars": chars,
                "parse_status": if *warning { "warning" } else { "ok" }
            }),
            ProgressEvent::Summarizing { n, total, name } => serde_json::json!({
                "event": "progress",
                "phase": "summarizing",
                "n": n,
                "total": total,
                "name": name
            }),
            ProgressEvent::Summarized { name, ok } => serde_json::json!({
                "event": "summarized",
                "name": name,
                "summary_status": if *ok { "success" } else { "error" }
            }),
            ProgressEvent::Aggregating { documents } => serde_json::json!({
                "event": "progress",
                "phase": "aggregating",
                "documents": documents
            }),
        }
    }
}

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        if let Ok(line) = serde_json::to_string(&Self::to_json(&event)) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

/// `1234567` → `"1,234,567"`.
pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    /// Human when stderr is a terminal, otherwise off.
    Auto,
    Off,
    Human,
    Json,
}

impl ProgressMode {
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Auto => Self::default_for_tty().reporter(),
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
