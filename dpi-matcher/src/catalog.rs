//! Rule catalog reader.
//!
//! A catalog is UTF-8 text holding a sequence of `{ key: value, ... }`
//! records, separated by commas and whitespace. Only `className`, `pattern`,
//! `is_regex` and `rid` are interpreted; unknown keys pass through unread.

use std::{fs, path::Path};

use serde::Deserialize;

use crate::{
    error::{BuildError, Result},
    rule::{decode_pattern, MatchRule},
};

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(rename = "className")]
    class_name: Option<String>,
    pattern: Option<String>,
    #[serde(default)]
    is_regex: bool,
    #[serde(default)]
    rid: u32,
}

fn malformed(record: usize, reason: impl Into<String>) -> BuildError {
    BuildError::CatalogMalformed {
        record,
        reason: reason.into(),
    }
}

/// Reads every rule record from the catalog at `path`.
///
/// Duplicate and empty rules are passed through unchanged; filtering is the
/// automaton builder's job. Any unreadable file or unparsable record aborts
/// the whole load.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<MatchRule>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| BuildError::CatalogUnreadable {
        path: path.to_owned(),
        source,
    })?;
    parse_records(&text)
}

/// Parses catalog text into rules. Exposed separately so the reader can be
/// exercised without touching the filesystem.
pub fn parse_records(text: &str) -> Result<Vec<MatchRule>> {
    let mut rules = Vec::new();
    for (record, chunk) in split_records(text)?.into_iter().enumerate() {
        let raw: RawRecord = serde_json::from_str(chunk)
            .map_err(|e| malformed(record, format!("invalid record: {}", e)))?;
        if let Some(class) = &raw.class_name {
            if class != "MatchRule" {
                return Err(malformed(record, format!("unexpected class {:?}", class)));
            }
        }
        // A record without a pattern becomes an empty rule; the builder's
        // minimum-length filter drops it.
        let pattern = match &raw.pattern {
            Some(text) => decode_pattern(text).map_err(|e| malformed(record, e.to_string()))?,
            None => Vec::new(),
        };
        rules.push(MatchRule {
            pattern,
            rid: raw.rid,
            is_regex: raw.is_regex,
        });
    }
    Ok(rules)
}

/// Splits the catalog into top-level `{ ... }` chunks. Quote-aware so braces
/// and commas inside pattern strings do not terminate a record.
fn split_records(text: &str) -> Result<Vec<&str>> {
    let raw = text.as_bytes();
    let mut records = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < raw.len() {
        let b = raw[i];
        if let Some(q) = quote {
            if b == b'\\' {
                i += 2;
                continue;
            }
            if b == q {
                quote = None;
            }
            i += 1;
            continue;
        }
        match b {
            b'"' | b'\'' => quote = Some(b),
            b'{' => {
                if depth == 0 {
                    start = i;
                }
                depth += 1;
            }
            b'}' => {
                if depth == 0 {
                    return Err(malformed(records.len(), "unbalanced '}'"));
                }
                depth -= 1;
                if depth == 0 {
                    records.push(&text[start..=i]);
                }
            }
            b',' | b' ' | b'\t' | b'\r' | b'\n' => {}
            _ if depth == 0 => {
                return Err(malformed(records.len(), "stray bytes between records"));
            }
            _ => {}
        }
        i += 1;
    }
    if depth != 0 || quote.is_some() {
        return Err(malformed(records.len(), "unterminated record"));
    }
    Ok(records)
}
