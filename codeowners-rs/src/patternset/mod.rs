//! In-process CODEOWNERS glob matching.
//!
//! Patterns are compiled into an NFA whose transitions consume one path
//! segment at a time. Paths to match are first arranged into a tree so that
//! shared directory prefixes are only stepped through once.

mod builder;
mod nfa;
mod path_tree;
mod tree_matcher;

pub use self::builder::Builder;
pub use self::tree_matcher::TreeMatcher;
