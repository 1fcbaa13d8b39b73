//! RTF to plain text.
//!
//! A single pass over the control-word stream. Groups whose destination is not
//! body text (font tables, stylesheets, pictures, `\*` extensions, field
//! instructions) are dropped; paragraph and cell controls become line breaks
//! and tabs; `\'hh` escapes are decoded as Windows-1252 and `\uN` as UTF-16
//! code units.

use crate::extract::cp1252_char;

/// Destinations whose content never reaches the visible text.
const SKIPPED_DESTINATIONS: &[&str] = &[
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "object",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "themedata",
    "colorschememapping",
    "datastore",
    "xmlnstbl",
    "listtable",
    "listoverridetable",
    "rsidtbl",
    "generator",
    "latentstyles",
    "mmathPr",
    "fldinst",
    "filetbl",
    "revtbl",
    "pgdsctbl",
    "bkmkstart",
    "bkmkend",
];

#[derive(Clone, Copy)]
struct Group {
    ignorable: bool,
    /// Fallback characters that follow each `\uN` (set by `\ucN`).
    uc: usize,
}

impl Default for Group {
    fn default() -> Self {
        Self {
            ignorable: false,
            uc: 1,
        }
    }
}

struct Converter {
    out: String,
    group: Group,
    stack: Vec<Group>,
    skip: usize,
    high_surrogate: Option<u16>,
}

impl Converter {
    fn emit(&mut self, c: char) {
        if self.skip > 0 {
            self.skip -= 1;
        } else if !self.group.ignorable {
            self.out.push(c);
        }
    }

    fn emit_unicode(&mut self, value: i32) {
        let unit = (if value < 0 { value + 65_536 } else { value }) as u32;
        if self.group.ignorable {
            self.skip = self.group.uc;
            return;
        }
        match unit {
            0xD800..=0xDBFF => self.high_surrogate = Some(unit as u16),
            0xDC00..=0xDFFF => {
                if let Some(high) = self.high_surrogate.take() {
                    let decoded = char::decode_utf16([high, unit as u16])
                        .next()
                        .and_then(|r| r.ok())
                        .unwrap_or(char::REPLACEMENT_CHARACTER);
                    self.out.push(decoded);
                }
            }
            _ => self
                .out
                .push(char::from_u32(unit).unwrap_or(char::REPLACEMENT_CHARACTER)),
        }
        self.skip = self.group.uc;
    }

    fn control_word(&mut self, word: &str, param: Option<i32>) {
        if SKIPPED_DESTINATIONS.contains(&word) {
            self.group.ignorable = true;
            return;
        }
        match word {
            "uc" => self.group.uc = param.unwrap_or(1).max(0) as usize,
            "u" => {
                if let Some(value) = param {
                    self.emit_unicode(value);
                }
            }
            "par" | "line" | "sect" | "page" | "row" => self.emit('\n'),
            "tab" | "cell" => self.emit('\t'),
            "emdash" => self.emit('\u{2014}'),
            "endash" => self.emit('\u{2013}'),
            "bullet" => self.emit('\u{2022}'),
            "lquote" => self.emit('\u{2018}'),
            "rquote" => self.emit('\u{2019}'),
            "ldblquote" => self.emit('\u{201C}'),
            "rdblquote" => self.emit('\u{201D}'),
            "emspace" | "enspace" | "qmspace" => self.emit(' '),
            _ => {}
        }
    }
}

pub fn rtf_to_text(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut conv = Converter {
        out: String::with_capacity(input.len() / 2),
        group: Group::default(),
        stack: Vec::new(),
        skip: 0,
        high_surrogate: None,
    };

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' => {
                conv.stack.push(conv.group);
                conv.skip = 0;
                i += 1;
            }
            '}' => {
                conv.group = conv.stack.pop().unwrap_or_default();
                conv.skip = 0;
                i += 1;
            }
            '\r' | '\n' => i += 1,
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();

                    let num_start = i;
                    if chars.get(i) == Some(&'-') {
                        i += 1;
                    }
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                    let digits: String = chars[num_start..i].iter().collect();
                    let param = digits.parse::<i32>().ok();
                    if param.is_none() {
                        i = num_start;
                    }

                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }
                    conv.control_word(&word, param);
                } else {
                    i += 1;
                    match next {
                        '\'' => {
                            let hex: String = chars.iter().skip(i).take(2).collect();
                            if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                                i += 2;
                                conv.emit(cp1252_char(byte).unwrap_or(byte as char));
                            }
                        }
                        '*' => conv.group.ignorable = true,
                        '\\' | '{' | '}' => conv.emit(next),
                        '~' => conv.emit('\u{00A0}'),
                        '_' => conv.emit('-'),
                        '\r' | '\n' => conv.emit('\n'),
                        _ => {}
                    }
                }
            }
            c => {
                conv.emit(c);
                i += 1;
            }
        }
    }

    conv.out
}
