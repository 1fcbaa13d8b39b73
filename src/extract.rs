//! Multi-format text extraction.
//!
//! Every extractor takes raw bytes and returns a [`ParseOutcome`]: either the
//! plain UTF-8 text or a failure reason. Nothing here panics or returns an
//! error past the function boundary; the pipeline turns a failure into a
//! placeholder and keeps going.

use regex::Regex;
use std::borrow::Cow;
use std::io::Read;
use std::sync::LazyLock;

use quick_xml::events::{BytesStart, Event};

use crate::models::ParseStatus;

/// Maximum sheets to process in an xlsx.
const XLSX_MAX_SHEETS: usize = 100;
/// Maximum cells to process per sheet, gap cells included.
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Columns in a worksheet (`A` through `XFD`).
const XLSX_MAX_COLUMNS: usize = 16_384;
/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Result of running one extractor over one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    Text(String),
    Failed(String),
}

impl ParseOutcome {
    pub fn is_text(&self) -> bool {
        matches!(self, ParseOutcome::Text(_))
    }

    /// Content and status for a [`Document`](crate::models::Document).
    /// Failures become an `"Error: ..."` placeholder.
    pub fn into_content(self) -> (String, ParseStatus) {
        match self {
            ParseOutcome::Text(text) => (text, ParseStatus::Ok),
            ParseOutcome::Failed(reason) => (format!("Error: {}", reason), ParseStatus::Warning),
        }
    }
}

impl From<Result<String, ExtractError>> for ParseOutcome {
    fn from(result: Result<String, ExtractError>) -> Self {
        match result {
            Ok(text) => ParseOutcome::Text(text),
            Err(e) => ParseOutcome::Failed(e.to_string()),
        }
    }
}

#[derive(Debug)]
pub enum ExtractError {
    Unsupported(String),
    Pdf(String),
    Ooxml(String),
    Xls(String),
    Empty(&'static str),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::Unsupported(what) => write!(f, "{}", what),
            ExtractError::Pdf(e) => write!(f, "PDF extraction failed: {}", e),
            ExtractError::Ooxml(e) => write!(f, "Office document extraction failed: {}", e),
            ExtractError::Xls(e) => write!(f, "Excel workbook extraction failed: {}", e),
            ExtractError::Empty(format) => write!(f, "no text extracted from {}", format),
        }
    }
}

impl std::error::Error for ExtractError {}

// ═══════════════════════════════════════════════════════════════════════
// Plain text
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy)]
enum TextEncoding {
    Utf8,
    Utf16Bom,
    Windows1252,
}

/// Tried in order; the first that decodes without error wins.
const TEXT_ENCODINGS: [TextEncoding; 3] = [
    TextEncoding::Utf8,
    TextEncoding::Utf16Bom,
    TextEncoding::Windows1252,
];

/// Decode bytes as text. Never fails: after the strict encodings, invalid
/// UTF-8 sequences are replaced.
pub fn decode_text(bytes: &[u8]) -> String {
    for encoding in TEXT_ENCODINGS {
        let decoded = match encoding {
            TextEncoding::Utf8 => {
                let body = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
                std::str::from_utf8(body).ok().map(str::to_string)
            }
            TextEncoding::Utf16Bom => decode_utf16_bom(bytes),
            TextEncoding::Windows1252 => decode_windows_1252(bytes),
        };
        if let Some(text) = decoded {
            return text;
        }
    }
    String::from_utf8_lossy(bytes).into_owned()
}

fn decode_utf16_bom(bytes: &[u8]) -> Option<String> {
    let (body, little_endian) = match bytes {
        [0xFF, 0xFE, rest @ ..] => (rest, true),
        [0xFE, 0xFF, rest @ ..] => (rest, false),
        _ => return None,
    };
    if body.len() % 2 != 0 {
        return None;
    }
    let units = body.chunks_exact(2).map(|pair| {
        if little_endian {
            u16::from_le_bytes([pair[0], pair[1]])
        } else {
            u16::from_be_bytes([pair[0], pair[1]])
        }
    });
    char::decode_utf16(units).collect::<Result<String, _>>().ok()
}

fn decode_windows_1252(bytes: &[u8]) -> Option<String> {
    bytes.iter().map(|&b| cp1252_char(b)).collect()
}

/// Windows-1252 mapping; `None` for the five undefined code points.
pub(crate) fn cp1252_char(b: u8) -> Option<char> {
    const HIGH: [Option<char>; 32] = [
        Some('\u{20AC}'),
        None,
        Some('\u{201A}'),
        Some('\u{0192}'),
        Some('\u{201E}'),
        Some('\u{2026}'),
        Some('\u{2020}'),
        Some('\u{2021}'),
        Some('\u{02C6}'),
        Some('\u{2030}'),
        Some('\u{0160}'),
        Some('\u{2039}'),
        Some('\u{0152}'),
        None,
        Some('\u{017D}'),
        None,
        None,
        Some('\u{2018}'),
        Some('\u{2019}'),
        Some('\u{201C}'),
        Some('\u{201D}'),
        Some('\u{2022}'),
        Some('\u{2013}'),
        Some('\u{2014}'),
        Some('\u{02DC}'),
        Some('\u{2122}'),
        Some('\u{0161}'),
        Some('\u{203A}'),
        Some('\u{0153}'),
        None,
        Some('\u{017E}'),
        Some('\u{0178}'),
    ];
    match b {
        0x80..=0x9F => HIGH[(b - 0x80) as usize],
        _ => Some(b as char),
    }
}

pub fn extract_plain_text(bytes: &[u8]) -> ParseOutcome {
    ParseOutcome::Text(decode_text(bytes))
}

// ═══════════════════════════════════════════════════════════════════════
// PDF
// ═══════════════════════════════════════════════════════════════════════

pub fn extract_pdf(bytes: &[u8]) -> ParseOutcome {
    pdf_pages(bytes)
        .and_then(|pages| join_pdf_pages(&pages))
        .into()
}

/// `--- Page N ---` header per non-blank page, blank line between pages.
fn join_pdf_pages(pages: &[String]) -> Result<String, ExtractError> {
    let rendered: Vec<String> = pages
        .iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| format!("--- Page {} ---\n{}", i + 1, text))
        .collect();
    if rendered.is_empty() {
        return Err(ExtractError::Empty("PDF"));
    }
    Ok(rendered.join("\n\n"))
}

#[cfg(feature = "pdf")]
fn pdf_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    // pdf-extract can panic on malformed fonts; treat that as a parse failure.
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    })) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(ExtractError::Pdf(e.to_string())),
        Err(_) => Err(ExtractError::Pdf(
            "extractor panicked on malformed input".to_string(),
        )),
    }
}

#[cfg(not(feature = "pdf"))]
fn pdf_pages(_bytes: &[u8]) -> Result<Vec<String>, ExtractError> {
    Err(ExtractError::Unsupported(
        "PDF support not compiled in; rebuild with `--features pdf`".to_string(),
    ))
}

// ═══════════════════════════════════════════════════════════════════════
// Word processor documents
// ═══════════════════════════════════════════════════════════════════════

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn open_archive(bytes: &[u8]) -> Result<zip::ZipArchive<std::io::Cursor<&[u8]>>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::Ooxml(e.to_string()))
}

fn xml_reader(xml: &[u8]) -> quick_xml::Reader<&[u8]> {
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(false);
    reader
}

fn attr(e: &BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == local)
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

pub fn extract_docx(bytes: &[u8]) -> ParseOutcome {
    docx_text(bytes).into()
}

/// Body paragraphs first, then every table row as `cell | cell | ...`,
/// all separated by blank lines.
fn docx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;

    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();

    let mut paragraphs: Vec<String> = Vec::new();
    let mut table_rows: Vec<String> = Vec::new();
    let mut table_depth = 0usize;
    let mut para = String::new();
    let mut in_text = false;
    let mut cell_paras: Vec<String> = Vec::new();
    let mut row_cells: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"tbl" => table_depth += 1,
                b"tr" if table_depth == 1 => row_cells.clear(),
                b"tc" if table_depth == 1 => cell_paras.clear(),
                b"p" => para.clear(),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"tab" => para.push('\t'),
                b"br" | b"cr" => para.push('\n'),
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                para.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => {
                    let text = std::mem::take(&mut para);
                    if table_depth == 0 {
                        if !text.trim().is_empty() {
                            paragraphs.push(text);
                        }
                    } else {
                        cell_paras.push(text);
                    }
                }
                b"tc" if table_depth == 1 => {
                    row_cells.push(cell_paras.join("\n").trim().to_string());
                }
                b"tr" if table_depth == 1 => {
                    if row_cells.iter().any(|c| !c.is_empty()) {
                        table_rows.push(row_cells.join(" | "));
                    }
                }
                b"tbl" => table_depth = table_depth.saturating_sub(1),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    paragraphs.extend(table_rows);
    if paragraphs.is_empty() {
        return Err(ExtractError::Empty("DOCX"));
    }
    Ok(paragraphs.join("\n\n"))
}

pub fn extract_legacy_doc(_bytes: &[u8]) -> ParseOutcome {
    ParseOutcome::Failed(
        "legacy .doc files require additional tooling (e.g. antiword or LibreOffice)".to_string(),
    )
}

// ═══════════════════════════════════════════════════════════════════════
// Spreadsheets
// ═══════════════════════════════════════════════════════════════════════

pub fn extract_xlsx(bytes: &[u8]) -> ParseOutcome {
    xlsx_text(bytes).into()
}

pub fn extract_legacy_xls(bytes: &[u8]) -> ParseOutcome {
    match std::panic::catch_unwind(|| xls_text(bytes)) {
        Ok(result) => result.into(),
        Err(_) => ParseOutcome::Failed(
            ExtractError::Xls("reader panicked on malformed input".to_string()).to_string(),
        ),
    }
}

/// BIFF workbooks through calamine, rendered the same way as `.xlsx`.
fn xls_text(bytes: &[u8]) -> Result<String, ExtractError> {
    use calamine::{Data, Reader, Xls};

    let mut workbook: Xls<_> = Xls::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Xls(e.to_string()))?;
    let names = workbook.sheet_names().to_vec();
    if names.is_empty() {
        return Err(ExtractError::Empty("spreadsheet"));
    }

    let mut lines: Vec<String> = Vec::new();
    for name in names.into_iter().take(XLSX_MAX_SHEETS) {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| ExtractError::Xls(format!("{}: {}", name, e)))?;
        lines.push(format!("=== Sheet: {} ===", name));
        let mut cells = 0usize;
        for row in range.rows() {
            if cells >= XLSX_MAX_CELLS_PER_SHEET {
                break;
            }
            cells += row.len();
            let rendered = row
                .iter()
                .map(|cell| match cell {
                    Data::Bool(true) => "True".to_string(),
                    Data::Bool(false) => "False".to_string(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(" | ");
            if !rendered.trim().is_empty() {
                lines.push(rendered);
            }
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

/// `=== Sheet: name ===`, then one `a | b | c` line per non-empty row,
/// then a blank line, for every sheet.
fn xlsx_text(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = read_shared_strings(&mut archive)?;
    let sheets = workbook_sheets(&mut archive)?;
    if sheets.is_empty() {
        return Err(ExtractError::Empty("spreadsheet"));
    }

    let mut lines: Vec<String> = Vec::new();
    for (name, path) in sheets.into_iter().take(XLSX_MAX_SHEETS) {
        let sheet_xml = read_zip_entry_bounded(&mut archive, &path, MAX_XML_ENTRY_BYTES)?;
        lines.push(format!("=== Sheet: {} ===", name));
        for row in sheet_rows(&sheet_xml, &shared_strings)? {
            let rendered = row.join(" | ");
            if !rendered.trim().is_empty() {
                lines.push(rendered);
            }
        }
        lines.push(String::new());
    }
    Ok(lines.join("\n"))
}

fn read_shared_strings(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<String>, ExtractError> {
    // Workbooks with only numbers or inline strings have no shared string table.
    if archive.by_name("xl/sharedStrings.xml").is_err() {
        return Ok(Vec::new());
    }
    let xml = read_zip_entry_bounded(archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)?;
    let mut strings = Vec::new();
    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// `(sheet name, zip path)` in workbook order.
fn workbook_sheets(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<(String, String)>, ExtractError> {
    let Ok(workbook) = read_zip_entry_bounded(archive, "xl/workbook.xml", MAX_XML_ENTRY_BYTES)
    else {
        return Ok(list_worksheet_names(archive)
            .into_iter()
            .enumerate()
            .map(|(i, path)| (format!("Sheet{}", i + 1), path))
            .collect());
    };

    let mut declared: Vec<(String, Option<String>)> = Vec::new();
    let mut reader = xml_reader(&workbook);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheet" => {
                let name = attr(&e, b"name").unwrap_or_default();
                declared.push((name, attr(&e, b"id")));
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    let targets = workbook_relationships(archive)?;
    let fallback = list_worksheet_names(archive);
    Ok(declared
        .into_iter()
        .enumerate()
        .filter_map(|(i, (name, rel_id))| {
            let path = rel_id
                .and_then(|id| targets.iter().find(|(rid, _)| *rid == id))
                .map(|(_, target)| target.clone())
                .or_else(|| fallback.get(i).cloned())?;
            Some((name, path))
        })
        .collect())
}

/// Relationship id → absolute zip path for `xl/_rels/workbook.xml.rels`.
fn workbook_relationships(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
) -> Result<Vec<(String, String)>, ExtractError> {
    let Ok(xml) = read_zip_entry_bounded(archive, "xl/_rels/workbook.xml.rels", MAX_XML_ENTRY_BYTES)
    else {
        return Ok(Vec::new());
    };
    let mut rels = Vec::new();
    let mut reader = xml_reader(&xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e))
                if e.local_name().as_ref() == b"Relationship" =>
            {
                if let (Some(id), Some(target)) = (attr(&e, b"Id"), attr(&e, b"Target")) {
                    let path = match target.strip_prefix('/') {
                        Some(absolute) => absolute.to_string(),
                        None => format!("xl/{}", target),
                    };
                    rels.push((id, path));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rels)
}

fn list_worksheet_names(archive: &zip::ZipArchive<std::io::Cursor<&[u8]>>) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches("xl/worksheets/sheet")
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Zero-based column index from an `A1`-style reference. `None` when the
/// reference has no letters or names a column past `XFD`.
fn column_index(reference: &str) -> Option<usize> {
    let mut n = 0usize;
    let mut seen = false;
    for c in reference.chars().take_while(|c| c.is_ascii_alphabetic()) {
        let digit = c.to_ascii_uppercase() as usize - 'A' as usize + 1;
        n = n.checked_mul(26)?.checked_add(digit)?;
        if n > XLSX_MAX_COLUMNS {
            return None;
        }
        seen = true;
    }
    seen.then(|| n - 1)
}

/// Put `value` at `column` (or the next free slot), padding the gap with
/// empty cells. Returns how many cells the row grew by.
fn place(row: &mut Vec<String>, column: Option<usize>, value: String) -> usize {
    let before = row.len();
    let column = column.unwrap_or(before);
    if before < column {
        row.resize(column, String::new());
    }
    row.push(value);
    row.len() - before
}

#[derive(Default)]
struct CellState {
    kind: Option<String>,
    value: String,
    in_value: bool,
}

/// Rows of rendered cell values; gaps before a referenced column are empty strings.
fn sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>, ExtractError> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Option<Vec<String>> = None;
    let mut cell: Option<CellState> = None;
    let mut cell_count = 0usize;

    let mut reader = xml_reader(xml);
    let mut buf = Vec::new();

    let mut pending_column: Option<usize> = None;
    loop {
        if cell_count >= XLSX_MAX_CELLS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => row = Some(Vec::new()),
                b"c" => {
                    pending_column = attr(&e, b"r").as_deref().and_then(column_index);
                    cell = Some(CellState {
                        kind: attr(&e, b"t"),
                        ..Default::default()
                    });
                }
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = true;
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"row" => rows.push(Vec::new()),
                b"c" => {
                    if let Some(r) = row.as_mut() {
                        let column = attr(&e, b"r").as_deref().and_then(column_index);
                        cell_count += place(r, column, String::new());
                    }
                }
                _ => {}
            },
            Ok(Event::Text(te)) => {
                if let Some(c) = cell.as_mut().filter(|c| c.in_value) {
                    c.value.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => {
                    if let Some(c) = cell.as_mut() {
                        c.in_value = false;
                    }
                }
                b"c" => {
                    if let (Some(c), Some(r)) = (cell.take(), row.as_mut()) {
                        cell_count += place(r, pending_column.take(), render_cell(c, shared_strings));
                    }
                }
                b"row" => rows.extend(row.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

fn render_cell(cell: CellState, shared_strings: &[String]) -> String {
    let raw = cell.value.trim();
    match cell.kind.as_deref() {
        Some("s") => raw
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i).cloned())
            .unwrap_or_default(),
        Some("b") => match raw {
            "1" => "True".to_string(),
            "0" => "False".to_string(),
            other => other.to_string(),
        },
        Some("inlineStr") | Some("str") => cell.value,
        _ => raw.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// HTML
// ═══════════════════════════════════════════════════════════════════════

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script\s*>").expect("valid regex"));
static STYLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").expect("valid regex"));
static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid regex"));
static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)<\s*(?:br|hr|/p|/div|/li|/h[1-6]|/tr|/title|/table|/ul|/ol|/section|/article|/header|/footer|/blockquote|/pre)\b[^>]*>",
    )
    .expect("valid regex")
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid regex"));
static ENTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid regex")
});

pub fn extract_html(bytes: &[u8]) -> ParseOutcome {
    let html = String::from_utf8_lossy(bytes);
    let text = html_to_text(&html);
    if text.is_empty() {
        ParseOutcome::Failed(ExtractError::Empty("HTML").to_string())
    } else {
        ParseOutcome::Text(text)
    }
}

/// Visible text of an HTML page: scripts and styles removed, one phrase per
/// line, empty lines dropped.
pub fn html_to_text(html: &str) -> String {
    let stripped = SCRIPT_RE.replace_all(html, "");
    let stripped = STYLE_RE.replace_all(&stripped, "");
    let stripped = COMMENT_RE.replace_all(&stripped, "");
    let stripped = BLOCK_TAG_RE.replace_all(&stripped, "\n");
    let stripped = TAG_RE.replace_all(&stripped, "");
    let decoded = ENTITY_RE.replace_all(&stripped, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });

    decoded
        .lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|phrase| !phrase.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn decode_entity(name: &str) -> Option<String> {
    if let Some(num) = name.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse::<u32>().ok()?,
        };
        return char::from_u32(code).map(|c| c.to_string());
    }
    let c = match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "mdash" => '\u{2014}',
        "ndash" => '\u{2013}',
        "hellip" => '\u{2026}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        _ => return None,
    };
    Some(c.to_string())
}

// ═══════════════════════════════════════════════════════════════════════
// Rich text
// ═══════════════════════════════════════════════════════════════════════

pub fn extract_rtf(bytes: &[u8]) -> ParseOutcome {
    let source = String::from_utf8_lossy(bytes);
    let text = crate::rtf::rtf_to_text(&source);
    if text.trim().is_empty() {
        ParseOutcome::Failed(ExtractError::Empty("RTF").to_string())
    } else {
        ParseOutcome::Text(text)
    }
}
