//! Extension traits for parsers and retrieval sources.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────┐
//! │              ParserRegistry               │
//! │  ┌────────────┐   ┌─────────────────────┐ │
//! │  │ Registered │ → │ Built-in            │ │
//! │  │ (newest    │   │ pdf/word/sheet/html │ │
//! │  │  first)    │   │ rtf/text            │ │
//! │  └────────────┘   └─────────────────────┘ │
//! └──────────────┬────────────────────────────┘
//!                ▼  fallback: text
//!          extract_all() → Documents
//! ```
//!
//! Retrieval adapters implement [`Source`]; the pipeline only ever sees the
//! [`RetrievableItem`]s they list.
//!
//! # Usage
//!
//! ```rust
//! use docsum::extract::ParseOutcome;
//! use docsum::traits::ParserRegistry;
//!
//! let mut parsers = ParserRegistry::with_builtins();
//! parsers.register_fn(
//!     "shout",
//!     |path| path.extension().is_some_and(|e| e == "shout"),
//!     |bytes| ParseOutcome::Text(String::from_utf8_lossy(bytes).to_uppercase()),
//! );
//! assert_eq!(parsers.resolve_extension(".shout").name(), "shout");
//! assert_eq!(parsers.resolve_extension(".unknown").name(), "text");
//! ```

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::extract::{self, ParseOutcome};
use crate::models::RetrievableItem;

// ═══════════════════════════════════════════════════════════════════════
// Parser Trait
// ═══════════════════════════════════════════════════════════════════════

/// Maps the raw bytes of one file format to plain text.
///
/// `extract` must not panic and must not fail: every problem with the input
/// is reported as [`ParseOutcome::Failed`]. Only reading the file itself can
/// fail, and that is the caller's concern.
pub trait Parser: Send + Sync {
    /// Short identifier used in logs and `docsum parse` output.
    fn name(&self) -> &str;

    /// Whether this parser claims `path`. Usually decided by extension.
    fn can_handle(&self, path: &Path) -> bool;

    fn extract(&self, bytes: &[u8]) -> ParseOutcome;

    /// Read `path` and extract it.
    fn extract_file(&self, path: &Path) -> std::io::Result<ParseOutcome> {
        let bytes = std::fs::read(path)?;
        Ok(self.extract(&bytes))
    }
}

/// The formats understood out of the box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinParser {
    Text,
    Pdf,
    Word,
    Spreadsheet,
    Html,
    Rtf,
}

impl BuiltinParser {
    /// Dispatch order. Text comes last; it is also the fallback.
    pub const ALL: [BuiltinParser; 6] = [
        BuiltinParser::Pdf,
        BuiltinParser::Word,
        BuiltinParser::Spreadsheet,
        BuiltinParser::Html,
        BuiltinParser::Rtf,
        BuiltinParser::Text,
    ];

    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            BuiltinParser::Text => &["txt", "md", "csv", "log"],
            BuiltinParser::Pdf => &["pdf"],
            BuiltinParser::Word => &["docx", "doc"],
            BuiltinParser::Spreadsheet => &["xlsx", "xls"],
            BuiltinParser::Html => &["html", "htm"],
            BuiltinParser::Rtf => &["rtf"],
        }
    }

    /// Extract with knowledge of the exact extension, which splits the
    /// legacy binary Office formats from their XML successors.
    pub fn extract_as(self, extension: &str, bytes: &[u8]) -> ParseOutcome {
        match (self, extension) {
            (BuiltinParser::Text, _) => extract::extract_plain_text(bytes),
            (BuiltinParser::Pdf, _) => extract::extract_pdf(bytes),
            (BuiltinParser::Word, "doc") => extract::extract_legacy_doc(bytes),
            (BuiltinParser::Word, _) => extract::extract_docx(bytes),
            (BuiltinParser::Spreadsheet, "xls") => extract::extract_legacy_xls(bytes),
            (BuiltinParser::Spreadsheet, _) => extract::extract_xlsx(bytes),
            (BuiltinParser::Html, _) => extract::extract_html(bytes),
            (BuiltinParser::Rtf, _) => extract::extract_rtf(bytes),
        }
    }
}

/// Lower-cased extension without the dot.
fn bare_extension(path: &Path) -> String {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

impl Parser for BuiltinParser {
    fn name(&self) -> &str {
        match self {
            BuiltinParser::Text => "text",
            BuiltinParser::Pdf => "pdf",
            BuiltinParser::Word => "word",
            BuiltinParser::Spreadsheet => "spreadsheet",
            BuiltinParser::Html => "html",
            BuiltinParser::Rtf => "rtf",
        }
    }

    fn can_handle(&self, path: &Path) -> bool {
        self.extensions().contains(&bare_extension(path).as_str())
    }

    fn extract(&self, bytes: &[u8]) -> ParseOutcome {
        let default_extension = self.extensions()[0];
        self.extract_as(default_extension, bytes)
    }

    fn extract_file(&self, path: &Path) -> std::io::Result<ParseOutcome> {
        let bytes = std::fs::read(path)?;
        Ok(self.extract_as(&bare_extension(path), &bytes))
    }
}

/// A parser assembled from a predicate and an extraction function.
pub struct FnParser<P, E> {
    name: String,
    predicate: P,
    extractor: E,
}

impl<P, E> Parser for FnParser<P, E>
where
    P: Fn(&Path) -> bool + Send + Sync,
    E: Fn(&[u8]) -> ParseOutcome + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn can_handle(&self, path: &Path) -> bool {
        (self.predicate)(path)
    }

    fn extract(&self, bytes: &[u8]) -> ParseOutcome {
        (self.extractor)(bytes)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Registry
// ═══════════════════════════════════════════════════════════════════════

/// Ordered parser dispatch table.
///
/// Runtime registrations are consulted before the built-ins, newest first.
/// Resolution never fails: anything unclaimed goes to the text parser.
pub struct ParserRegistry {
    registered: Vec<Box<dyn Parser>>,
    builtins: Vec<BuiltinParser>,
}

impl ParserRegistry {
    /// A registry with no built-ins; every path resolves to the text parser
    /// unless something is registered.
    pub fn new() -> Self {
        Self {
            registered: Vec::new(),
            builtins: Vec::new(),
        }
    }

    pub fn with_builtins() -> Self {
        Self {
            registered: Vec::new(),
            builtins: BuiltinParser::ALL.to_vec(),
        }
    }

    /// Register a parser ahead of everything already present.
    pub fn register(&mut self, parser: Box<dyn Parser>) {
        self.registered.insert(0, parser);
    }

    pub fn register_fn<P, E>(&mut self, name: impl Into<String>, predicate: P, extractor: E)
    where
        P: Fn(&Path) -> bool + Send + Sync + 'static,
        E: Fn(&[u8]) -> ParseOutcome + Send + Sync + 'static,
    {
        self.register(Box::new(FnParser {
            name: name.into(),
            predicate,
            extractor,
        }));
    }

    /// First parser that claims `path`, or the text parser.
    pub fn resolve(&self, path: &Path) -> &dyn Parser {
        if let Some(parser) = self.registered.iter().find(|p| p.can_handle(path)) {
            return parser.as_ref();
        }
        match self.builtins.iter().find(|p| p.can_handle(path)) {
            Some(builtin) => builtin,
            None => &BuiltinParser::Text,
        }
    }

    /// Resolve by extension alone (`".pdf"` or `"pdf"`).
    pub fn resolve_extension(&self, extension: &str) -> &dyn Parser {
        let bare = extension.trim_start_matches('.');
        self.resolve(Path::new(&format!("file.{}", bare)))
    }

    /// Extract bytes that have no file on disk, dispatching on `extension`.
    pub fn extract_bytes(&self, extension: &str, bytes: &[u8]) -> ParseOutcome {
        let bare = extension.trim_start_matches('.').to_lowercase();
        let path = format!("file.{}", bare);
        if let Some(parser) = self
            .registered
            .iter()
            .find(|p| p.can_handle(Path::new(&path)))
        {
            return parser.extract(bytes);
        }
        let builtin = self
            .builtins
            .iter()
            .copied()
            .find(|p| p.extensions().contains(&bare.as_str()))
            .unwrap_or(BuiltinParser::Text);
        builtin.extract_as(&bare, bytes)
    }

    pub fn len(&self) -> usize {
        self.registered.len() + self.builtins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Source Trait
// ═══════════════════════════════════════════════════════════════════════

/// A retrieval adapter: somewhere documents come from.
///
/// `list` returns an error only for failures the operator must see
/// (authentication, a broken listing). Best-effort adapters log a warning
/// and return an empty list instead; the caller decides whether zero items
/// is fatal.
#[async_trait]
pub trait Source: Send + Sync {
    /// Adapter type, e.g. `"local"` or `"drive"`.
    fn kind(&self) -> &str;

    /// What is being listed (a folder path or URL), recorded in the report.
    fn location(&self) -> String;

    async fn list(&self) -> Result<Vec<RetrievableItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_dispatch_by_extension() {
        let registry = ParserRegistry::with_builtins();
        let cases = [
            ("a.PDF", "pdf"),
            ("b.docx", "word"),
            ("c.doc", "word"),
            ("d.xlsx", "spreadsheet"),
            ("e.htm", "html"),
            ("f.rtf", "rtf"),
            ("g.md", "text"),
            ("h.csv", "text"),
            ("i.weird", "text"),
            ("no_extension", "text"),
        ];
        for (file, expected) in cases {
            assert_eq!(
                registry.resolve(Path::new(file)).name(),
                expected,
                "{}",
                file
            );
        }
    }

    #[test]
    fn registered_parsers_take_priority_newest_first() {
        let mut registry = ParserRegistry::with_builtins();
        registry.register_fn(
            "first",
            |p| p.extension().is_some_and(|e| e == "pdf"),
            |_| ParseOutcome::Text("first".into()),
        );
        registry.register_fn(
            "second",
            |p| p.extension().is_some_and(|e| e == "pdf"),
            |_| ParseOutcome::Text("second".into()),
        );
        let parser = registry.resolve(Path::new("x.pdf"));
        assert_eq!(parser.name(), "second");
        assert_eq!(parser.extract(b""), ParseOutcome::Text("second".into()));
        assert_eq!(registry.resolve(Path::new("x.docx")).name(), "word");
    }

    #[test]
    fn empty_registry_falls_back_to_text() {
        let registry = ParserRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.resolve(Path::new("a.pdf")).name(), "text");
    }

    #[test]
    fn legacy_doc_gets_placeholder_and_broken_xls_fails() {
        let registry = ParserRegistry::with_builtins();
        assert!(matches!(
            registry.extract_bytes(".doc", b"\xD0\xCF\x11\xE0"),
            ParseOutcome::Failed(ref r) if r.contains(".doc")
        ));
        assert!(matches!(
            registry.extract_bytes("xls", b"\xD0\xCF\x11\xE0"),
            ParseOutcome::Failed(ref r) if r.contains("Excel workbook")
        ));
    }

    #[test]
    fn extract_file_reads_through_parser() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"binary").unwrap();
        let registry = ParserRegistry::with_builtins();
        let outcome = registry.resolve(&path).extract_file(&path).unwrap();
        assert!(!outcome.is_text());

        let missing = dir.path().join("missing.txt");
        assert!(registry.resolve(&missing).extract_file(&missing).is_err());
    }
}
