//! Per-document summarization.
//!
//! [`Summarizer::summarize`] is total: whatever the model does, the document
//! comes back with a summary and a status, and the error (if any) never
//! reaches the caller.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::llm::{CompletionClient, CompletionRequest, ContentPart, ImageUrl, Message};
use crate::models::{Document, SummaryStatus};
use crate::progress::{ProgressEvent, ProgressReporter};

/// Rough chars-per-token ratio used for input budgets.
pub const CHARS_PER_TOKEN: usize = 4;

pub const EMPTY_CONTENT_SUMMARY: &str = "No content to summarize";

/// What the model is given for each document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// The extracted text.
    Content,
    /// The document's `source_url`, for models that can fetch it themselves.
    Url,
}

/// Hard cut to `max_tokens * 4` chars with a trailing `...`. Text within the
/// budget is returned unchanged.
pub fn truncate_to_budget(text: &str, max_tokens: usize) -> String {
    let max_chars = max_tokens.saturating_mul(CHARS_PER_TOKEN);
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// `Filename: report.pdf (Type: .pdf)`
pub fn document_context(doc: &Document) -> String {
    format!("Filename: {} (Type: {})", doc.filename, doc.extension)
}

fn text_prompt(content: &str, context: &str) -> String {
    let context_line = if context.is_empty() {
        String::new()
    } else {
        format!("Context: {}", context)
    };
    format!(
        "Please provide a clear and concise summary of the following document.\n\
         Focus on the main ideas, key points, and important details.\n\
         \n\
         {}\n\
         \n\
         Document content:\n\
         {}\n\
         \n\
         Summary:",
        context_line, content
    )
}

fn url_prompt(filename: &str) -> String {
    let context = if filename.is_empty() {
        "Document".to_string()
    } else {
        format!("Document: {}", filename)
    };
    format!(
        "Please analyze this document and provide a clear, concise summary.\n\
         Focus on the main ideas, key points, and important details.\n\
         \n\
         {}\n\
         \n\
         What are the main topics and key information in this document?",
        context
    )
}

pub struct Summarizer {
    client: Arc<dyn CompletionClient>,
    model: String,
    url_model: String,
    temperature: f32,
    max_tokens_per_chunk: usize,
    summary_max_tokens: u32,
    url_summary_max_tokens: u32,
    text_timeout: Duration,
    document_timeout: Duration,
    concurrency: usize,
}

impl Summarizer {
    pub fn new(client: Arc<dyn CompletionClient>, config: &Config) -> Self {
        Self {
            client,
            model: config.llm.model.clone(),
            url_model: config.llm.url_model.clone(),
            temperature: config.llm.temperature,
            max_tokens_per_chunk: config.summarize.max_tokens_per_chunk,
            summary_max_tokens: config.summarize.summary_max_tokens,
            url_summary_max_tokens: config.summarize.url_summary_max_tokens,
            text_timeout: Duration::from_secs(config.llm.text_timeout_secs),
            document_timeout: Duration::from_secs(config.llm.document_timeout_secs),
            concurrency: config.summarize.concurrency.max(1),
        }
    }

    /// Summarize `doc.content`, recording the outcome on the document.
    pub async fn summarize(&self, mut doc: Document, context: &str) -> Document {
        if doc.content.trim().is_empty() {
            doc.set_summary(EMPTY_CONTENT_SUMMARY, SummaryStatus::Success);
            return doc;
        }

        let content = truncate_to_budget(&doc.content, self.max_tokens_per_chunk);
        let request = CompletionRequest {
            model: self.model.clone(),
            messages: vec![Message::user(text_prompt(&content, context))],
            max_output_tokens: self.summary_max_tokens,
            temperature: self.temperature,
            timeout: self.text_timeout,
        };

        match self.client.complete(request).await {
            Ok(summary) => doc.set_summary(summary, SummaryStatus::Success),
            Err(e) => {
                tracing::warn!(file = %doc.filename, error = %e, "summary failed");
                doc.set_summary(
                    format!("Error generating summary: {}", e),
                    SummaryStatus::Error,
                );
            }
        }
        doc
    }

    /// Hand the document's URL to a document-capable model instead of
    /// sending extracted text.
    pub async fn summarize_url(&self, mut doc: Document) -> Document {
        let Some(url) = doc.source_url.clone() else {
            doc.set_summary("Error: document has no source URL", SummaryStatus::Error);
            return doc;
        };

        let request = CompletionRequest {
            model: self.url_model.clone(),
            messages: vec![Message::user_parts(vec![
                ContentPart::Text {
                    text: url_prompt(&doc.filename),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url },
                },
            ])],
            max_output_tokens: self.url_summary_max_tokens,
            temperature: self.temperature,
            timeout: self.document_timeout,
        };

        match self.client.complete(request).await {
            Ok(summary) => doc.set_summary(summary, SummaryStatus::Success),
            Err(e) => {
                tracing::warn!(file = %doc.filename, error = %e, "url summary failed");
                doc.set_summary(format!("Error: {}", e), SummaryStatus::Error);
            }
        }
        doc
    }

    /// Summarize every document, at most `summarize.concurrency` at a time.
    /// The output order is the input order.
    pub async fn summarize_all(
        &self,
        docs: Vec<Document>,
        input: Input,
        progress: &dyn ProgressReporter,
    ) -> Vec<Document> {
        let total = docs.len();
        stream::iter(docs.into_iter().enumerate())
            .map(|(i, doc)| async move {
                progress.report(ProgressEvent::Summarizing {
                    n: i + 1,
                    total,
                    name: doc.filename.clone(),
                });
                let doc = match input {
                    Input::Content => {
                        let context = document_context(&doc);
                        self.summarize(doc, &context).await
                    }
                    Input::Url => self.summarize_url(doc).await,
                };
                progress.report(ProgressEvent::Summarized {
                    name: doc.filename.clone(),
                    ok: doc.is_summarized(),
                });
                doc
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn url_model(&self) -> &str {
        &self.url_model
    }
}
