//! Field normalization
//!
//! Pure functions turning raw textual field values into typed values:
//! numeric years, page spans, split publisher/address pairs. Malformed text
//! is never fatal; every function degrades to an absent value.

use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::models::{FieldValue, RefField};

use super::parser::ParsedRecord;

/// Years in brackets win over the first standalone 4-digit number;
/// a trailing `-NN` is an edition/part marker and is discarded.
static PREF_YEAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(?P<year>[12][0-9]{3})(-[0-9]+)?\]").unwrap());
static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?P<year>[12][0-9]{3})").unwrap());

static ROMAN_ARABIC_PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?P<roman>[ivxlcdm]+)\+(?P<arabic>[0-9]+)").unwrap());
static ARABIC_ROMAN_PAGES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?P<arabic>[0-9]+)\+(?P<roman>[ivxlcdm]+)").unwrap());

static ARABIC_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?P<start>[0-9]+)\s*[-–—]+\s*(?P<end>[0-9]+)$").unwrap());
static ROMAN_RANGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?P<start>[ivxlcdm]+)\s*[-–—]+\s*(?P<end>[ivxlcdm]+)$").unwrap());
static ROMAN_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)^[ivxlcdm]+$").unwrap());

/// Page counts derived from a raw pages text. All members are independently
/// optional because the text may encode only a subset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSpan {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub total: Option<i64>,
}

/// Convert a roman numeral in standard subtractive notation,
/// case-insensitively. Returns `None` on any non-roman character.
pub fn roman_to_int(s: &str) -> Option<i64> {
    fn value(c: char) -> Option<i64> {
        Some(match c.to_ascii_lowercase() {
            'i' => 1,
            'v' => 5,
            'x' => 10,
            'l' => 50,
            'c' => 100,
            'd' => 500,
            'm' => 1000,
            _ => return None,
        })
    }
    let values: Option<Vec<i64>> = s.chars().map(value).collect();
    let values = values?;
    let mut total = 0;
    for (i, v) in values.iter().enumerate() {
        if values[i + 1..].iter().any(|later| later > v) {
            total -= v;
        } else {
            total += v;
        }
    }
    Some(total)
}

/// Extract a numeric year from free-form year text.
///
/// A 4-digit year in brackets is preferred; otherwise the first 4-digit
/// number starting with 1 or 2 is taken. Malformed text yields `None`.
pub fn extract_year(raw: &str) -> Option<i64> {
    let captures = PREF_YEAR_PATTERN
        .captures(raw)
        .or_else(|| YEAR_PATTERN.captures(raw))?;
    captures.name("year")?.as_str().parse().ok()
}

/// Split a `"Address: Publisher"` text on its first colon.
///
/// `publisher` is always extracted when a colon is present. The computed
/// address is only adopted when the record carries no address of its own or
/// an identical one; a differing, manually curated address is preserved.
pub fn split_publisher_address(
    raw: &str,
    existing_address: Option<&str>,
) -> (Option<String>, Option<String>) {
    let Some((address, publisher)) = raw.split_once(':') else {
        return (None, None);
    };
    let address = address.trim().to_string();
    let publisher = publisher.trim().to_string();
    let adopt_address = match existing_address {
        None => true,
        Some(a) => a == address,
    };
    (adopt_address.then_some(address), Some(publisher))
}

/// Derive page counts from raw pages text.
///
/// Tried in order: a combined roman+arabic pattern (`xii+34` or `34+xii`)
/// yielding only a total; otherwise a range computation over comma-separated
/// page lists. An explicit numeric `numberofpages` value always wins for the
/// total.
pub fn parse_pages(raw: &str, number_of_pages: Option<&str>) -> PageSpan {
    let mut span = PageSpan::default();

    let captures = ROMAN_ARABIC_PAGES
        .captures(raw)
        .or_else(|| ARABIC_ROMAN_PAGES.captures(raw));
    if let Some(caps) = captures {
        let roman = roman_to_int(caps.name("roman").map(|m| m.as_str()).unwrap_or(""));
        let arabic: Option<i64> = caps.name("arabic").and_then(|m| m.as_str().parse().ok());
        if let (Some(r), Some(a)) = (roman, arabic) {
            span.total = Some(r + a);
        }
    } else {
        let (start, end, total) = compute_pages(raw);
        span.start = start;
        span.end = end;
        span.total = total;
    }

    if let Some(n) = number_of_pages.and_then(|s| s.trim().parse::<i64>().ok()) {
        span.total = Some(n);
    }
    span
}

/// Page-range computation over arbitrary textual page lists.
///
/// Chunks are comma-separated. Arabic ranges contribute their length and set
/// start/end; roman chunks count as prefatory matter and only feed the
/// total. A lone arabic number is a bare page count; next to ranges it is a
/// single page. Unparsable chunks are skipped.
pub fn compute_pages(raw: &str) -> (Option<i64>, Option<i64>, Option<i64>) {
    enum Chunk {
        Range(i64, i64),
        Single(i64),
        Prefatory(i64),
    }

    let mut chunks = Vec::new();
    for part in raw.split(',') {
        let part = part.trim().trim_start_matches("pp.").trim_start_matches("p.").trim();
        if part.is_empty() {
            continue;
        }
        if let Some(caps) = ARABIC_RANGE.captures(part) {
            let start: i64 = caps["start"].parse().unwrap_or(0);
            let end: i64 = caps["end"].parse().unwrap_or(0);
            if end >= start && start > 0 {
                chunks.push(Chunk::Range(start, end));
            }
        } else if let Some(caps) = ROMAN_RANGE.captures(part) {
            if let (Some(start), Some(end)) =
                (roman_to_int(&caps["start"]), roman_to_int(&caps["end"]))
            {
                if end >= start {
                    chunks.push(Chunk::Prefatory(end - start + 1));
                }
            }
        } else if ROMAN_ONLY.is_match(part) {
            if let Some(v) = roman_to_int(part) {
                chunks.push(Chunk::Prefatory(v));
            }
        } else if let Ok(n) = part.parse::<i64>() {
            chunks.push(Chunk::Single(n));
        }
    }

    if chunks.is_empty() {
        return (None, None, None);
    }
    if let [Chunk::Single(n)] = chunks[..] {
        // a bare number is a page count, not a page
        return (None, None, Some(n));
    }

    let has_ranges = chunks.iter().any(|c| matches!(c, Chunk::Range(..)));
    let mut start = None;
    let mut end = None;
    let mut total = 0;
    for chunk in &chunks {
        match *chunk {
            Chunk::Range(s, e) => {
                total += e - s + 1;
                start.get_or_insert(s);
                end = Some(e);
            }
            Chunk::Single(n) => {
                if has_ranges {
                    total += 1;
                    start.get_or_insert(n);
                    end = Some(n);
                } else {
                    total += n;
                }
            }
            Chunk::Prefatory(n) => total += n,
        }
    }
    (start, end, Some(total))
}

/// Fold bibliography-specific text escaping: LaTeX accent commands and
/// grouping braces. Unknown escapes keep their argument.
pub fn unescape(raw: &str) -> String {
    fn accent(cmd: char, letter: char) -> Option<char> {
        Some(match (cmd, letter) {
            ('\'', 'a') => 'á', ('\'', 'e') => 'é', ('\'', 'i') => 'í',
            ('\'', 'o') => 'ó', ('\'', 'u') => 'ú', ('\'', 'c') => 'ć',
            ('\'', 'n') => 'ń', ('\'', 'y') => 'ý',
            ('`', 'a') => 'à', ('`', 'e') => 'è', ('`', 'i') => 'ì',
            ('`', 'o') => 'ò', ('`', 'u') => 'ù',
            ('"', 'a') => 'ä', ('"', 'e') => 'ë', ('"', 'i') => 'ï',
            ('"', 'o') => 'ö', ('"', 'u') => 'ü',
            ('^', 'a') => 'â', ('^', 'e') => 'ê', ('^', 'i') => 'î',
            ('^', 'o') => 'ô', ('^', 'u') => 'û',
            ('~', 'a') => 'ã', ('~', 'n') => 'ñ', ('~', 'o') => 'õ',
            ('c', 'c') => 'ç', ('v', 's') => 'š', ('v', 'c') => 'č',
            ('v', 'z') => 'ž',
            _ => return None,
        })
    }

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' | '}' => {}
            '~' => out.push(' '),
            '\\' => {
                let Some(cmd) = chars.next() else { break };
                match cmd {
                    '&' | '%' | '_' | '#' | '$' => out.push(cmd),
                    _ => {
                        // skip grouping before the argument letter
                        while chars.peek() == Some(&'{') {
                            chars.next();
                        }
                        match chars.peek().copied() {
                            Some(letter) if letter.is_ascii_alphabetic() => {
                                chars.next();
                                match accent(cmd, letter.to_ascii_lowercase()) {
                                    Some(folded) if letter.is_lowercase() => out.push(folded),
                                    Some(folded) => {
                                        out.extend(folded.to_uppercase());
                                    }
                                    None => {
                                        if cmd.is_ascii_alphabetic() {
                                            out.push(cmd);
                                        }
                                        out.push(letter);
                                    }
                                }
                            }
                            _ => {
                                if cmd.is_ascii_alphabetic() {
                                    out.push(cmd);
                                }
                            }
                        }
                    }
                }
            }
            _ => out.push(c),
        }
    }
    out
}

/// Lowercased ASCII-alphanumeric slug of a vocabulary tag, with combining
/// marks stripped.
pub fn slug(s: &str) -> String {
    s.nfkd()
        .filter(|c| c.is_ascii_alphanumeric())
        .flat_map(|c| c.to_lowercase())
        .collect()
}

/// Derive the typed numeric fields of a parsed record from its raw texts:
/// `year_int`, the page counts, and the publisher/address split.
pub fn normalize_record(rec: &mut ParsedRecord) {
    if let Some(year) = rec.text_field(RefField::Year) {
        if let Some(y) = extract_year(&year) {
            rec.fields.insert(RefField::YearInt, FieldValue::Int(y));
        }
    }

    if let Some(publisher) = rec.text_field(RefField::Publisher) {
        let existing = rec.text_field(RefField::Address);
        let (address, new_publisher) = split_publisher_address(&publisher, existing.as_deref());
        if let Some(p) = new_publisher {
            rec.fields.insert(RefField::Publisher, FieldValue::Text(p));
            if let Some(a) = address {
                rec.fields.insert(RefField::Address, FieldValue::Text(a));
            }
        }
    }

    // a bare 3-letter lgcode is a lone ISO code; bracket it so it reads
    // like the curated code lists
    let bracketed = rec
        .jsondata
        .get("lgcode")
        .filter(|code| code.len() == 3)
        .map(|code| format!("[{}]", code));
    if let Some(code) = bracketed {
        rec.jsondata.insert("lgcode".to_string(), code);
    }

    if let Some(pages) = rec.text_field(RefField::Pages) {
        let span = parse_pages(&pages, rec.jsondata.get("numberofpages").map(String::as_str));
        if let Some(start) = span.start {
            rec.fields.insert(RefField::StartpageInt, FieldValue::Int(start));
        }
        if let Some(end) = span.end {
            rec.fields.insert(RefField::EndpageInt, FieldValue::Int(end));
        }
        if let Some(total) = span.total {
            rec.fields.insert(RefField::PagesInt, FieldValue::Int(total));
        }
    } else if let Some(n) = rec
        .jsondata
        .get("numberofpages")
        .and_then(|s| s.trim().parse::<i64>().ok())
    {
        rec.fields.insert(RefField::PagesInt, FieldValue::Int(n));
    }
}
