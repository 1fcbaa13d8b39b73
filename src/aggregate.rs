//! Master-summary synthesis and run statistics.
//!
//! Runs once per batch, after every per-document summary has resolved.
//! A failing synthesis call still yields a complete [`Synthesis`]; only the
//! master summary text turns into an error message.

use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest, Message};
use crate::models::{Document, ReportMetadata, Statistics, SummaryReport};
use crate::summarize::truncate_to_budget;

pub const NO_DOCUMENTS_SUMMARY: &str = "No documents to summarize";

/// Everything in a report except the caller-supplied metadata.
#[derive(Debug, Clone)]
pub struct Synthesis {
    pub master_summary: String,
    pub statistics: Statistics,
    pub individual_summaries: Vec<Document>,
}

impl Synthesis {
    pub fn into_report(self, metadata: ReportMetadata) -> SummaryReport {
        SummaryReport {
            master_summary: self.master_summary,
            statistics: self.statistics,
            individual_summaries: self.individual_summaries,
            metadata,
        }
    }
}

/// Markdown digest of the successful summaries, or `None` if there are none.
///
/// Ordinals are positions in `docs` (1-based), so gaps mark documents that
/// failed.
pub fn combined_summaries(docs: &[Document]) -> Option<String> {
    let mut combined = String::from("# Document Summaries\n\n");
    let mut any = false;
    for (i, doc) in docs.iter().enumerate() {
        if !doc.is_summarized() {
            continue;
        }
        let summary = doc.summary.as_deref().unwrap_or_default();
        combined.push_str(&format!(
            "## Document {}: {}\n{}\n\n",
            i + 1,
            doc.filename,
            summary
        ));
        any = true;
    }
    any.then_some(combined)
}

fn master_prompt(combined: &str) -> String {
    format!(
        "You are analyzing a collection of documents. Below are summaries of individual documents.\n\
         \n\
         Please create a comprehensive master summary that:\n\
         1. Identifies the main themes and topics across all documents\n\
         2. Highlights the most important information\n\
         3. Notes any connections or relationships between documents\n\
         4. Provides an overall synthesis of the content\n\
         \n\
         Individual document summaries:\n\
         {}\n\
         \n\
         Master Summary:",
        combined
    )
}

pub struct Aggregator {
    client: Arc<dyn CompletionClient>,
    model: String,
    temperature: f32,
    max_tokens_per_chunk: usize,
    master_max_tokens: u32,
    timeout: Duration,
}

impl Aggregator {
    pub fn new(client: Arc<dyn CompletionClient>, config: &Config) -> Self {
        Self {
            client,
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            max_tokens_per_chunk: config.summarize.max_tokens_per_chunk,
            master_max_tokens: config.summarize.master_max_tokens,
            timeout: Duration::from_secs(config.llm.text_timeout_secs),
        }
    }

    /// One synthesis call over the successful summaries. No call is made
    /// when there is nothing to synthesize.
    pub async fn master_summary(&self, docs: &[Document]) -> String {
        let Some(combined) = combined_summaries(docs) else {
            return NO_DOCUMENTS_SUMMARY.to_string();
        };
        let combined = truncate_to_budget(&combined, self.max_tokens_per_chunk);

        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(master_prompt(&combined))],
            max_output_tokens: self.master_max_tokens,
            temperature: self.temperature,
            timeout: self.timeout,
        };

        match self.client.complete(request).await {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "master summary failed");
                format!("Error creating master summary: {}", e)
            }
        }
    }

    pub async fn aggregate(&self, docs: Vec<Document>) -> Synthesis {
        let master_summary = self.master_summary(&docs).await;
        Synthesis {
            master_summary,
            statistics: Statistics::from_documents(&docs),
            individual_summaries: docs,
        }
    }
}
