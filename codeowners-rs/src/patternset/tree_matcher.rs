use std::collections::HashMap;

use super::{
    nfa::{Nfa, StateId},
    path_tree::PathTree,
};

/// Matches paths in bulk against a compiled pattern set. Created using a
/// [`super::Builder`].
#[derive(Debug, Clone)]
pub struct TreeMatcher {
    nfa: Nfa,
}

impl TreeMatcher {
    pub(crate) fn new(nfa: Nfa) -> TreeMatcher {
        Self { nfa }
    }

    /// Match many paths against the patterns in the set. Returns a map from
    /// path to the ids of every pattern that matches it; paths that match
    /// nothing are absent. Ids follow the order patterns were added in.
    pub fn matches_for_paths(&self, paths: &[String]) -> HashMap<String, Vec<usize>> {
        let mut tree = PathTree::new();
        for path in paths {
            tree.insert(path);
        }

        let mut matches: HashMap<String, Vec<usize>> = HashMap::new();
        let mut queue = vec![(self.nfa.initial_states(), PathTree::ROOT)];
        while let Some((states, node_id)) = queue.pop() {
            let node = tree.node(node_id);
            if node_id != PathTree::ROOT && !node.paths.is_empty() {
                let accepted = states
                    .iter()
                    .flat_map(|&id| self.nfa.state(id).terminal_for_patterns.iter().copied())
                    .collect::<Vec<_>>();
                if !accepted.is_empty() {
                    for path in &node.paths {
                        matches
                            .entry(path.clone())
                            .or_default()
                            .extend(accepted.iter().copied());
                    }
                }
            }

            for (segment, &child_id) in &node.children {
                let next_states = self.next_states(segment, &states);
                if !next_states.is_empty() {
                    queue.push((next_states, child_id));
                }
            }
        }
        matches
    }

    // Step every state in `from_states` over one path segment, then follow
    // epsilon edges from wherever that lands.
    fn next_states(&self, segment: &str, from_states: &[StateId]) -> Vec<StateId> {
        let mut next_states = from_states
            .iter()
            .flat_map(|&id| self.nfa.transitions_from(id))
            .filter(|transition| transition.is_match(segment))
            .map(|transition| transition.target)
            .collect::<Vec<_>>();

        let epsilon_states = next_states
            .iter()
            .filter_map(|&id| self.nfa.epsilon_transitions_from(id))
            .collect::<Vec<_>>();
        next_states.extend(epsilon_states);
        next_states.sort_unstable_by_key(|&id| usize::from(id));
        next_states.dedup();
        next_states
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use crate::patternset::Builder;

    use super::*;

    #[test]
    fn test_literals() {
        let patterns = [
            "/src/parser/mod.rs",
            "/lib/parser/parse.rs",
            "/bin/parser/mod.rs",
            "mod.rs",
        ];
        let expected = &[
            ("src/parser/mod.rs", vec![0, 3]),
            ("lib/parser/parse.rs", vec![1]),
            ("lib/parser/mod.rs", vec![3]),
            ("lib/parser/util.rs", vec![]),
            ("src/lexer/mod.rs", vec![3]),
            ("src/parser/mod.go", vec![]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_prefixes() {
        let patterns = ["src", "src/parser", "src/parser/"];
        let expected = &[
            ("src/parser/mod.rs", vec![0, 1, 2]),
            ("src/parser", vec![0, 1]),
            ("foo/src/parser/mod.rs", vec![0]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_anchoring() {
        let patterns = ["/script/foo", "script/foo", "/foo", "foo"];
        let expected = &[
            ("script/foo", vec![0, 1, 3]),
            ("foo", vec![2, 3]),
            ("bar/script/foo", vec![3]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_wildcards() {
        let patterns = ["*.rb", "docs/*", "src/*/mod.rs", "*/*/mod.rs"];
        let expected = &[
            ("a.rb", vec![0]),
            ("lib/deep/a.rb", vec![0]),
            ("docs/x.md", vec![1]),
            ("docs/api/x.md", vec![1]),
            ("src/parser/mod.rs", vec![2, 3]),
            ("test/lexer/mod.rs", vec![3]),
            ("parser/mod.rs", vec![]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_trailing_wildcards() {
        let patterns = ["/mammals/*", "/fish/*/"];
        let expected = &[
            ("mammals", vec![]),
            ("mammals/equus", vec![0]),
            ("mammals/equus/zebra", vec![0]),
            ("fish", vec![]),
            ("fish/gaddus", vec![]),
            ("fish/gaddus/cod", vec![1]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_double_stars() {
        let patterns = ["/**/baz", "/foo/**/qux", "foo/**", "**"];
        let expected = &[
            ("baz", vec![0, 3]),
            ("x/y/baz", vec![0, 3]),
            ("foo/qux", vec![1, 2, 3]),
            ("foo/bar/baz/qux", vec![0, 1, 2, 3]),
            ("foo", vec![3]),
            ("bar/qux", vec![3]),
        ];

        assert_all_matches(expected, &patterns);
    }

    #[test]
    fn test_escape_sequences() {
        let patterns = ["f\\*o", "a*b\\??", "\\*qux", "bar\\*", "\\*"];
        let expected = &[
            ("f*o", vec![0]),
            ("foo", vec![]),
            ("axb?!", vec![1]),
            ("axb?", vec![]),
            ("axbc!", vec![]),
            ("*qux", vec![2]),
            ("xqux", vec![]),
            ("bar*", vec![3]),
            ("bar", vec![]),
            ("*", vec![4]),
            ("a", vec![]),
        ];

        assert_all_matches(expected, &patterns);
    }

    fn assert_all_matches(expected: &[(&str, Vec<usize>)], patterns: &[&str]) {
        let paths = expected
            .iter()
            .map(|(path, _)| path.to_string())
            .collect::<Vec<_>>();
        let mut builder = Builder::new();
        for pattern in patterns {
            builder.add(pattern);
        }
        let matches = builder.build().matches_for_paths(&paths);
        for (path, expected) in expected {
            assert_eq!(
                HashSet::<&usize>::from_iter(expected.iter()),
                HashSet::from_iter(matches.get(*path).unwrap_or(&vec![]).iter()),
                "matches for {:?}",
                path
            );
        }
    }
}
