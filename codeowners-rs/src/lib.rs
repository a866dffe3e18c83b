//! Resolve which CODEOWNERS rule owns every file in a repository, and prune
//! the rules that no longer match anything.
//!
//! Pattern matching itself is delegated to a [`MatchOracle`]: either git's
//! own `check-ignore` ([`git::Git`]) or the in-process matcher
//! ([`BuiltinOracle`]). This crate joins the oracle's verdicts back to the
//! line-aligned [`parser::PatternTable`].

mod error;
pub mod files;
pub mod git;
pub mod oracle;
pub mod parser;
pub mod patternset;
pub mod prune;
pub mod resolver;

use std::path::{Path, PathBuf};

pub use error::{Error, Result};
pub use files::{FileLister, WalkFiles};
pub use oracle::{BuiltinOracle, MatchOracle, MatchResult};
pub use parser::{parse, PatternEntry, PatternTable};
pub use resolver::{OwnershipRecord, Resolver, UNOWNED};

/// Locations searched for a CODEOWNERS file, in order, relative to the
/// repository root.
pub const RULES_FILE_CANDIDATES: &[&str] = &["CODEOWNERS", "docs/CODEOWNERS", ".github/CODEOWNERS"];

/// Return the first existing CODEOWNERS candidate under `root`.
pub fn locate_rules_file(root: &Path) -> Result<PathBuf> {
    RULES_FILE_CANDIDATES
        .iter()
        .map(|candidate| root.join(candidate))
        .find(|path| path.is_file())
        .ok_or_else(|| Error::RulesFileNotFound {
            root: root.to_path_buf(),
        })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_locate_rules_file_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join(".github")).unwrap();
        fs::create_dir_all(dir.path().join("docs")).unwrap();

        fs::write(dir.path().join(".github/CODEOWNERS"), "* @a\n").unwrap();
        assert_eq!(
            locate_rules_file(dir.path()).unwrap(),
            dir.path().join(".github/CODEOWNERS")
        );

        fs::write(dir.path().join("docs/CODEOWNERS"), "* @a\n").unwrap();
        assert_eq!(
            locate_rules_file(dir.path()).unwrap(),
            dir.path().join("docs/CODEOWNERS")
        );

        fs::write(dir.path().join("CODEOWNERS"), "* @a\n").unwrap();
        assert_eq!(
            locate_rules_file(dir.path()).unwrap(),
            dir.path().join("CODEOWNERS")
        );
    }

    #[test]
    fn test_locate_rules_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("CODEOWNERS")).unwrap();
        assert!(matches!(
            locate_rules_file(dir.path()),
            Err(Error::RulesFileNotFound { root }) if root == dir.path()
        ));
    }
}
