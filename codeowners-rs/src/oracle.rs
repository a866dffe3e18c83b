use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    patternset::{Builder, TreeMatcher},
    Error, Result,
};

/// Evaluates a CODEOWNERS pattern list against a set of files.
///
/// Implementations must apply last-match-wins semantics: for each file the
/// reported line is the 1-based position, within `patterns`, of the last
/// pattern that matches it. Empty patterns are placeholders and never match.
/// Files that match nothing may be omitted or reported with `line: None`.
pub trait MatchOracle {
    fn match_paths(&self, patterns: &[&str], files: &[String]) -> Result<Vec<MatchResult>>;
}

/// A single verdict from a [`MatchOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchResult {
    pub file: String,
    pub line: Option<usize>,
    pub pattern: Option<String>,
}

impl MatchResult {
    pub fn unmatched(file: impl Into<String>) -> MatchResult {
        MatchResult {
            file: file.into(),
            line: None,
            pattern: None,
        }
    }

    pub fn matched(file: impl Into<String>, line: usize, pattern: impl Into<String>) -> MatchResult {
        MatchResult {
            file: file.into(),
            line: Some(line),
            pattern: Some(pattern.into()),
        }
    }
}

/// Convert raw process output to text. Valid UTF-8 is passed through
/// untouched; otherwise every undecodable sequence is replaced with
/// U+FFFD REPLACEMENT CHARACTER. This never fails.
pub fn sanitize_output(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

// <source>:<line>:<pattern>\t<path>, where source, line and pattern are all
// empty for paths that matched nothing.
static CHECK_IGNORE_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.*):(\d*):(.*)\t(.*)$").unwrap());

/// Parse the verbose, non-matching output of `git check-ignore -v -n`.
///
/// Every non-empty line must have the `<source>:<line>:<pattern>\t<path>`
/// shape; any other line fails the whole parse.
pub fn parse_check_ignore_output(output: &str) -> Result<Vec<MatchResult>> {
    let mut results = Vec::new();
    for raw in output.lines() {
        if raw.is_empty() {
            continue;
        }
        let caps = CHECK_IGNORE_LINE
            .captures(raw)
            .ok_or_else(|| Error::MalformedOracleOutput {
                line: raw.to_owned(),
            })?;
        let file = caps[4].to_owned();
        let result = if caps[2].is_empty() {
            MatchResult::unmatched(file)
        } else {
            let line = caps[2]
                .parse::<usize>()
                .map_err(|_| Error::MalformedOracleOutput {
                    line: raw.to_owned(),
                })?;
            MatchResult::matched(file, line, &caps[3])
        };
        results.push(result);
    }
    Ok(results)
}

/// Parse the output of `git check-ignore -z -v -n`: NUL-terminated
/// `<source>`, `<line>`, `<pattern>`, `<path>` fields, four per path. Paths
/// come through unquoted, whatever characters they contain.
pub fn parse_check_ignore_output_nul(output: &str) -> Result<Vec<MatchResult>> {
    let fields = match output.strip_suffix('\0') {
        Some(body) => body.split('\0').collect::<Vec<_>>(),
        None if output.is_empty() => Vec::new(),
        None => output.split('\0').collect(),
    };

    let records = fields.chunks_exact(4);
    if !records.remainder().is_empty() {
        return Err(Error::MalformedOracleOutput {
            line: records.remainder().join("\0"),
        });
    }

    records
        .map(|record| {
            let (line, pattern, file) = (record[1], record[2], record[3]);
            if line.is_empty() {
                return Ok(MatchResult::unmatched(file));
            }
            let line = line
                .parse::<usize>()
                .map_err(|_| Error::MalformedOracleOutput {
                    line: record.join("\0"),
                })?;
            Ok(MatchResult::matched(file, line, pattern))
        })
        .collect()
}

/// In-process [`MatchOracle`] backed by the glob matcher in
/// [`crate::patternset`], which follows gitignore semantics: a pattern that
/// matches a directory matches every file beneath it. Needs no external
/// tools.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuiltinOracle;

impl BuiltinOracle {
    pub fn new() -> BuiltinOracle {
        BuiltinOracle
    }

    fn build(patterns: &[&str]) -> (TreeMatcher, Vec<usize>) {
        // Pattern ids are dense, so keep a map back to 0-based line indices
        let mut builder = Builder::new();
        let mut line_indices = Vec::new();
        for (idx, pattern) in patterns.iter().enumerate() {
            if pattern.is_empty() {
                continue;
            }
            builder.add(pattern);
            line_indices.push(idx);
        }
        (builder.build(), line_indices)
    }
}

impl MatchOracle for BuiltinOracle {
    fn match_paths(&self, patterns: &[&str], files: &[String]) -> Result<Vec<MatchResult>> {
        let (matcher, line_indices) = Self::build(patterns);
        let matches = matcher.matches_for_paths(files);

        let results = files
            .iter()
            .map(|file| {
                let last = matches.get(file).and_then(|ids| ids.iter().max());
                match last {
                    Some(&id) => {
                        let idx = line_indices[id];
                        MatchResult::matched(file.as_str(), idx + 1, patterns[idx])
                    }
                    None => MatchResult::unmatched(file.as_str()),
                }
            })
            .collect();
        Ok(results)
    }
}
