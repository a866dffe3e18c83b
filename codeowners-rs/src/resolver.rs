use std::{
    collections::{BTreeMap, HashMap},
    path::{Path, PathBuf},
};

use once_cell::unsync::OnceCell;

use crate::{
    files::FileLister,
    locate_rules_file,
    oracle::{MatchOracle, MatchResult},
    parser::{self, PatternTable},
    Error, Result,
};

/// Owner reported for files that no rule matches.
pub const UNOWNED: &str = "UNOWNED";

/// The rule that owns a single file. `line` and `pattern` are `None` exactly
/// when the file is [`UNOWNED`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnershipRecord {
    pub file: String,
    pub owner: String,
    pub line: Option<usize>,
    pub pattern: Option<String>,
}

impl OwnershipRecord {
    pub fn unowned(file: impl Into<String>) -> OwnershipRecord {
        OwnershipRecord {
            file: file.into(),
            owner: UNOWNED.to_owned(),
            line: None,
            pattern: None,
        }
    }

    pub fn is_unowned(&self) -> bool {
        self.line.is_none()
    }
}

/// Per-run resolution context. The rules file is located and parsed at most
/// once, on first use; ownership itself is recomputed by every call to
/// [`Resolver::resolve`].
pub struct Resolver {
    root: PathBuf,
    rules_file: Option<PathBuf>,
    files: Box<dyn FileLister>,
    oracle: Box<dyn MatchOracle>,
    rules_path: OnceCell<PathBuf>,
    table: OnceCell<PatternTable>,
}

impl Resolver {
    pub fn new(
        root: impl Into<PathBuf>,
        files: impl FileLister + 'static,
        oracle: impl MatchOracle + 'static,
    ) -> Resolver {
        Resolver {
            root: root.into(),
            rules_file: None,
            files: Box::new(files),
            oracle: Box::new(oracle),
            rules_path: OnceCell::new(),
            table: OnceCell::new(),
        }
    }

    /// Use an explicit rules file instead of searching the candidate
    /// locations under the root.
    pub fn with_rules_file(mut self, path: impl Into<PathBuf>) -> Resolver {
        self.rules_file = Some(path.into());
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn rules_path(&self) -> Result<&Path> {
        self.rules_path
            .get_or_try_init(|| match &self.rules_file {
                Some(path) if path.is_file() => Ok(path.clone()),
                Some(_) => Err(Error::RulesFileNotFound {
                    root: self.root.clone(),
                }),
                None => locate_rules_file(&self.root),
            })
            .map(PathBuf::as_path)
    }

    pub fn pattern_table(&self) -> Result<&PatternTable> {
        self.table.get_or_try_init(|| {
            let path = self.rules_path()?;
            let result = parser::parse_file(path)?;
            log::debug!(
                "parsed {} lines from {} ({} invalid)",
                result.table.len(),
                path.display(),
                result.errors.len()
            );
            if result.table.is_empty() {
                log::warn!("{} is empty; every file will be unowned", path.display());
            }
            Ok(result.table)
        })
    }

    /// Resolve the owner of every listed file, in listing order.
    pub fn resolve(&self) -> Result<Vec<OwnershipRecord>> {
        let table = self.pattern_table()?;
        let files = self.files.list_files()?;
        let verdicts = self.oracle.match_paths(&table.patterns(), &files)?;
        join_owners(table, files, verdicts)
    }
}

// One record per file. Files the oracle said nothing about are unowned; a
// reported line that isn't a rule is an oracle defect.
fn join_owners(
    table: &PatternTable,
    files: Vec<String>,
    verdicts: Vec<MatchResult>,
) -> Result<Vec<OwnershipRecord>> {
    let by_file = verdicts
        .into_iter()
        .map(|verdict| (verdict.file.clone(), verdict))
        .collect::<HashMap<_, _>>();

    // A path may be listed more than once; every copy gets the same verdict
    files
        .into_iter()
        .map(|file| {
            let Some(verdict) = by_file.get(&file) else {
                return Ok(OwnershipRecord::unowned(file));
            };
            let Some(line) = verdict.line else {
                return Ok(OwnershipRecord::unowned(file));
            };
            match table.get(line) {
                Some(entry) if entry.is_rule() => Ok(OwnershipRecord {
                    owner: entry.owner.clone(),
                    line: Some(line),
                    pattern: Some(
                        verdict
                            .pattern
                            .clone()
                            .unwrap_or_else(|| entry.pattern.clone()),
                    ),
                    file,
                }),
                _ => Err(Error::UnknownRuleLine { line, file }),
            }
        })
        .collect()
}

/// Count files per owner, ordered by owner. Unowned files are counted under
/// [`UNOWNED`].
pub fn summarize(records: &[OwnershipRecord]) -> BTreeMap<&str, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.owner.as_str()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, fs, rc::Rc};

    use crate::BuiltinOracle;

    use super::*;

    const RULES: &str = "*.rb @alice\ndocs/* @bob\n# comment\nREADME.md @carol\n";

    struct FixedOracle {
        results: Vec<MatchResult>,
        calls: Rc<Cell<usize>>,
    }

    impl MatchOracle for FixedOracle {
        fn match_paths(&self, patterns: &[&str], _files: &[String]) -> Result<Vec<MatchResult>> {
            assert_eq!(patterns, &["*.rb", "docs/*", "", "README.md"]);
            self.calls.set(self.calls.get() + 1);
            Ok(self.results.clone())
        }
    }

    fn files(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    fn repo_with_rules(rules: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("CODEOWNERS"), rules).unwrap();
        dir
    }

    #[test]
    fn test_resolve_builtin() {
        let dir = repo_with_rules(RULES);
        let resolver = Resolver::new(
            dir.path(),
            files(&["a.rb", "docs/x.md", "README.md", "other.txt"]),
            BuiltinOracle::new(),
        );

        assert_eq!(
            resolver.resolve().unwrap(),
            vec![
                OwnershipRecord {
                    file: "a.rb".to_owned(),
                    owner: "@alice".to_owned(),
                    line: Some(1),
                    pattern: Some("*.rb".to_owned()),
                },
                OwnershipRecord {
                    file: "docs/x.md".to_owned(),
                    owner: "@bob".to_owned(),
                    line: Some(2),
                    pattern: Some("docs/*".to_owned()),
                },
                OwnershipRecord {
                    file: "README.md".to_owned(),
                    owner: "@carol".to_owned(),
                    line: Some(4),
                    pattern: Some("README.md".to_owned()),
                },
                OwnershipRecord::unowned("other.txt"),
            ]
        );
    }

    #[test]
    fn test_resolve_joins_oracle_lines() {
        let dir = repo_with_rules(RULES);
        let calls = Rc::new(Cell::new(0));
        let oracle = FixedOracle {
            results: vec![
                MatchResult::matched("lib/x.rb", 1, "*.rb"),
                MatchResult::unmatched("notes.txt"),
                MatchResult::matched("README.md", 4, "README.md"),
            ],
            calls: calls.clone(),
        };
        let resolver = Resolver::new(
            dir.path(),
            files(&["README.md", "lib/x.rb", "notes.txt", "silent.txt"]),
            oracle,
        );

        let records = resolver.resolve().unwrap();
        assert_eq!(
            records
                .iter()
                .map(|r| (r.file.as_str(), r.owner.as_str(), r.line))
                .collect::<Vec<_>>(),
            vec![
                ("README.md", "@carol", Some(4)),
                ("lib/x.rb", "@alice", Some(1)),
                ("notes.txt", UNOWNED, None),
                ("silent.txt", UNOWNED, None),
            ]
        );

        // Ownership is recomputed each time, the table is not
        resolver.resolve().unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_resolve_rejects_non_rule_lines() {
        let dir = repo_with_rules(RULES);
        for line in [3, 5, 0] {
            let oracle = FixedOracle {
                results: vec![MatchResult::matched("x", line, "?")],
                calls: Rc::new(Cell::new(0)),
            };
            let resolver = Resolver::new(dir.path(), files(&["x"]), oracle);
            assert!(matches!(
                resolver.resolve(),
                Err(Error::UnknownRuleLine { line: l, .. }) if l == line
            ));
        }
    }

    #[test]
    fn test_pattern_table_is_cached() {
        let dir = repo_with_rules(RULES);
        let resolver = Resolver::new(dir.path(), files(&[]), BuiltinOracle::new());
        assert_eq!(resolver.pattern_table().unwrap().len(), 4);

        fs::write(dir.path().join("CODEOWNERS"), "* @zed\n").unwrap();
        assert_eq!(resolver.pattern_table().unwrap().len(), 4);
        assert_eq!(
            resolver.pattern_table().unwrap().get(1).unwrap().owner,
            "@alice"
        );
    }

    #[test]
    fn test_missing_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = Resolver::new(dir.path(), files(&["a"]), BuiltinOracle::new());
        assert!(matches!(
            resolver.resolve(),
            Err(Error::RulesFileNotFound { .. })
        ));

        let resolver = Resolver::new(dir.path(), files(&["a"]), BuiltinOracle::new())
            .with_rules_file(dir.path().join("OWNERS"));
        assert!(matches!(
            resolver.rules_path(),
            Err(Error::RulesFileNotFound { .. })
        ));
    }

    #[test]
    fn test_explicit_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("OWNERS");
        fs::write(&path, "* @everyone\n").unwrap();
        let resolver =
            Resolver::new(dir.path(), files(&["a/b"]), BuiltinOracle::new()).with_rules_file(&path);

        assert_eq!(resolver.rules_path().unwrap(), path.as_path());
        assert_eq!(resolver.resolve().unwrap()[0].owner, "@everyone");
    }

    #[test]
    fn test_malformed_rule_is_never_an_owner() {
        let dir = repo_with_rules("* @a\nnopattern\n");
        let resolver = Resolver::new(dir.path(), files(&["nopattern"]), BuiltinOracle::new());
        let records = resolver.resolve().unwrap();
        assert_eq!(records[0].line, Some(1));
        assert_eq!(records[0].owner, "@a");
    }

    #[test]
    fn test_resolve_duplicate_paths() {
        let dir = repo_with_rules(RULES);
        let oracle = FixedOracle {
            results: vec![MatchResult::matched("a.rb", 1, "*.rb")],
            calls: Rc::new(Cell::new(0)),
        };
        let resolver = Resolver::new(dir.path(), files(&["a.rb", "a.rb", "a.rb"]), oracle);

        let records = resolver.resolve().unwrap();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.owner == "@alice" && r.line == Some(1)));
    }

    #[test]
    fn test_empty_rules_file() {
        let dir = repo_with_rules("");
        let resolver = Resolver::new(dir.path(), files(&["a.rb"]), BuiltinOracle::new());

        assert!(resolver.pattern_table().unwrap().is_empty());
        assert_eq!(
            resolver.resolve().unwrap(),
            vec![OwnershipRecord::unowned("a.rb")]
        );
    }

    #[test]
    fn test_summarize() {
        let records = vec![
            OwnershipRecord::unowned("x"),
            OwnershipRecord {
                file: "a".to_owned(),
                owner: "@b".to_owned(),
                line: Some(1),
                pattern: Some("*".to_owned()),
            },
            OwnershipRecord {
                file: "b".to_owned(),
                owner: "@b".to_owned(),
                line: Some(1),
                pattern: Some("*".to_owned()),
            },
        ];
        let summary = summarize(&records);
        assert_eq!(
            summary.into_iter().collect::<Vec<_>>(),
            vec![("@b", 2), (UNOWNED, 1)]
        );
    }
}
