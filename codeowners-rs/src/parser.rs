use std::{fs, path::Path};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{oracle::sanitize_output, Error, Result};

// Blank lines, whitespace-only lines and full-line comments.
static NOOP_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:#.*)?$").unwrap());

// Separates the pattern from the owners: the first run of whitespace that is
// followed by an `@`.
static OWNER_DELIMITER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+@").unwrap());

/// Parse the contents of a CODEOWNERS file into a `ParseResult`. Every
/// physical line produces exactly one entry in the resulting table, so entry
/// `i` always describes line `i + 1`.
pub fn parse(source: &str) -> ParseResult {
    let mut entries = Vec::new();
    let mut errors = Vec::new();

    for (idx, line) in source.lines().enumerate() {
        if NOOP_LINE.is_match(line) {
            entries.push(PatternEntry::blank());
            continue;
        }

        match split_rule(line) {
            Some(entry) => entries.push(entry),
            None => {
                let error = ParseError {
                    line: idx + 1,
                    text: line.to_owned(),
                };
                log::warn!("{}", error);
                errors.push(error);
                entries.push(PatternEntry::blank());
            }
        }
    }

    ParseResult {
        table: PatternTable { entries },
        errors,
    }
}

/// Read and parse a CODEOWNERS file. Invalid UTF-8 is replaced rather than
/// rejected so that line numbering is never lost.
pub fn parse_file(path: &Path) -> Result<ParseResult> {
    let bytes = fs::read(path).map_err(|err| Error::io(path, err))?;
    Ok(parse(&sanitize_output(bytes)))
}

fn split_rule(line: &str) -> Option<PatternEntry> {
    let mut parts = OWNER_DELIMITER.splitn(line, 2);
    let pattern = parts.next()?;
    let owner = parts.next()?;
    if pattern.is_empty() || owner.is_empty() {
        return None;
    }
    // The delimiter consumed the owner's leading `@`
    Some(PatternEntry {
        pattern: pattern.to_owned(),
        owner: format!("@{}", owner),
    })
}

/// The result of parsing a CODEOWNERS file: the full line-aligned table and
/// the lines that could not be understood as rules. Every line listed in
/// `errors` is present in `table` as a blank entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseResult {
    pub table: PatternTable,
    pub errors: Vec<ParseError>,
}

/// A line that looked like a rule but did not split into a pattern and an
/// `@owner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub line: usize,
    pub text: String,
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error line {}: {:?}", self.line, self.text)
    }
}

/// One physical line of a CODEOWNERS file. Comments, blank lines and invalid
/// lines are represented with an empty pattern and an empty owner.
///
/// Everything after the pattern is kept as a single owner string, so
/// `docs/ @alice @bob` has the owner `"@alice @bob"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternEntry {
    pub pattern: String,
    pub owner: String,
}

impl PatternEntry {
    pub fn new(pattern: impl Into<String>, owner: impl Into<String>) -> PatternEntry {
        PatternEntry {
            pattern: pattern.into(),
            owner: owner.into(),
        }
    }

    fn blank() -> PatternEntry {
        PatternEntry::default()
    }

    /// Whether this entry is an actual rule rather than a placeholder line.
    pub fn is_rule(&self) -> bool {
        !self.pattern.is_empty()
    }
}

/// Ordered, line-aligned list of `PatternEntry` values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up the entry for a 1-based line number.
    pub fn get(&self, line: usize) -> Option<&PatternEntry> {
        line.checked_sub(1).and_then(|idx| self.entries.get(idx))
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    /// Pattern strings in file order, including the empty placeholders.
    pub fn patterns(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.pattern.as_str()).collect()
    }
}
