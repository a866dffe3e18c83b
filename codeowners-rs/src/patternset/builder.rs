use super::{
    nfa::{Nfa, StateId, Transition},
    TreeMatcher,
};

/// Compiles CODEOWNERS patterns, read with gitignore semantics, into a
/// [`TreeMatcher`]. Pattern ids are assigned densely in insertion order,
/// starting at zero.
#[derive(Clone)]
pub struct Builder {
    nfa: Nfa,
    next_pattern_id: usize,
}

impl Builder {
    pub fn new() -> Self {
        Self {
            nfa: Nfa::new(),
            next_pattern_id: 0,
        }
    }

    /// Consume the builder and produce a matcher for the added patterns.
    pub fn build(self) -> TreeMatcher {
        TreeMatcher::new(self.nfa)
    }

    /// Add a pattern, returning its id.
    pub fn add(&mut self, pattern: &str) -> usize {
        let pattern_id = self.next_pattern_id;
        self.next_pattern_id += 1;

        // A leading slash anchors the pattern to the repository root
        let (pattern, leading_slash) = match pattern.strip_prefix('/') {
            Some(pattern) => (pattern, true),
            None => (pattern, false),
        };

        // Only files are matched, so a trailing slash just demands at least
        // one more path component below the directory
        let (pattern, trailing_slash) = match pattern.strip_suffix('/') {
            Some(pattern) => (pattern, true),
            None => (pattern, false),
        };

        let segments = pattern.split('/').collect::<Vec<_>>();

        // Single-segment patterns without a leading slash match at any depth;
        // everything else is anchored.
        let start_state_id = if !leading_slash && segments.len() == 1 {
            self.add_epsilon_transition(Nfa::START_STATE)
        } else {
            Nfa::START_STATE
        };

        let mut end_state_id =
            segments
                .iter()
                .fold(start_state_id, |from_id, segment| match *segment {
                    "**" => self.add_epsilon_transition(from_id),
                    _ => self.add_transition(from_id, segment),
                });

        if trailing_slash || segments.last() == Some(&"**") {
            end_state_id = self.add_transition(end_state_id, "*");
        }

        // A matched directory matches everything beneath it, as in gitignore
        end_state_id = self.add_epsilon_transition(end_state_id);

        self.nfa
            .state_mut(end_state_id)
            .mark_as_terminal(pattern_id);

        pattern_id
    }

    // Follow (or create) a transition for a literal or glob segment.
    fn add_transition(&mut self, from_id: StateId, segment: &str) -> StateId {
        let existing = self
            .nfa
            .transitions_from(from_id)
            .find(|t| t.path_segment == segment && t.target != from_id)
            .map(|t| t.target);
        if let Some(target) = existing {
            return target;
        }

        let state_id = self.nfa.add_state();
        self.nfa
            .state_mut(from_id)
            .add_transition(Transition::new(segment.to_owned(), state_id));
        state_id
    }

    // Follow (or create) an epsilon transition into a state that loops on any
    // segment. Consecutive `**` segments share one such state.
    fn add_epsilon_transition(&mut self, from_id: StateId) -> StateId {
        let loops_already = self
            .nfa
            .transitions_from(from_id)
            .any(|t| t.path_segment == "*" && t.target == from_id);
        if loops_already {
            return from_id;
        }

        if let Some(to_id) = self.nfa.epsilon_transitions_from(from_id) {
            return to_id;
        }

        let state_id = self.nfa.add_state();
        self.nfa
            .state_mut(state_id)
            .add_transition(Transition::new("*".to_owned(), state_id));
        self.nfa.state_mut(from_id).epsilon_transition = Some(state_id);
        state_id
    }
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}
