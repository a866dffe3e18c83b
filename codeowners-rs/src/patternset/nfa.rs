/// Non-deterministic automaton over path segments. Each state owns its
/// outgoing segment transitions and at most one epsilon transition; patterns
/// are recorded on the states that accept them.
#[derive(Debug, Clone)]
pub(crate) struct Nfa {
    states: Vec<State>,
}

impl Nfa {
    pub(crate) const START_STATE: StateId = StateId(0);

    pub(crate) fn new() -> Self {
        Self {
            states: vec![State::new()],
        }
    }

    pub(crate) fn add_state(&mut self) -> StateId {
        self.states.push(State::new());
        StateId((self.states.len() - 1) as u32)
    }

    #[inline]
    pub(crate) fn state(&self, id: StateId) -> &State {
        &self.states[usize::from(id)]
    }

    #[inline]
    pub(crate) fn state_mut(&mut self, id: StateId) -> &mut State {
        &mut self.states[usize::from(id)]
    }

    #[cfg(test)]
    pub(crate) fn states_iter(&self) -> impl Iterator<Item = &State> {
        self.states.iter()
    }

    pub(crate) fn initial_states(&self) -> Vec<StateId> {
        let mut states = vec![Self::START_STATE];
        states.extend(self.epsilon_transitions_from(Self::START_STATE));
        states
    }

    pub(crate) fn transitions_from(&self, id: StateId) -> impl Iterator<Item = &Transition> {
        self.state(id).transitions.iter()
    }

    pub(crate) fn epsilon_transitions_from(&self, id: StateId) -> Option<StateId> {
        self.state(id).epsilon_transition
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub(crate) struct StateId(pub(crate) u32);

impl From<StateId> for usize {
    fn from(id: StateId) -> usize {
        id.0 as usize
    }
}

#[derive(Debug, Clone)]
pub(crate) struct State {
    pub(crate) terminal_for_patterns: Vec<usize>,
    pub(crate) transitions: Vec<Transition>,
    pub(crate) epsilon_transition: Option<StateId>,
}

impl State {
    fn new() -> Self {
        Self {
            terminal_for_patterns: Vec::new(),
            transitions: Vec::new(),
            epsilon_transition: None,
        }
    }

    pub(crate) fn add_transition(&mut self, transition: Transition) {
        self.transitions.push(transition);
    }

    pub(crate) fn mark_as_terminal(&mut self, pattern_id: usize) {
        self.terminal_for_patterns.push(pattern_id);
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Transition {
    pub(crate) path_segment: String,
    pub(crate) target: StateId,
    condition: SegmentCondition,
}

impl Transition {
    pub(crate) fn new(path_segment: String, target: StateId) -> Transition {
        let condition = SegmentCondition::new(&path_segment);
        Self {
            path_segment,
            target,
            condition,
        }
    }

    pub(crate) fn is_match(&self, candidate: &str) -> bool {
        self.condition.is_match(candidate)
    }
}

#[derive(Debug, Clone, Copy)]
enum GlobToken {
    Char(char),
    Star,
    AnyChar,
}

/// How a single glob segment is tested against a path component. Globs
/// without wildcards in the middle avoid the regex engine entirely.
#[derive(Debug, Clone)]
enum SegmentCondition {
    Unconditional,
    Literal(String),
    Prefix(String),
    Suffix(String),
    Contains(String),
    Regex(regex::Regex),
}

impl SegmentCondition {
    fn new(glob: &str) -> Self {
        let tokens = tokenize(glob);
        if let Some(text) = literal(&tokens) {
            return Self::Literal(text);
        }

        let simple = match tokens.as_slice() {
            [GlobToken::Star] => Some(Self::Unconditional),
            [GlobToken::Star, middle @ .., GlobToken::Star] => literal(middle).map(Self::Contains),
            [GlobToken::Star, rest @ ..] => literal(rest).map(Self::Suffix),
            [rest @ .., GlobToken::Star] => literal(rest).map(Self::Prefix),
            _ => None,
        };
        simple.unwrap_or_else(|| Self::Regex(tokens_to_regex(&tokens)))
    }

    fn is_match(&self, candidate: &str) -> bool {
        match self {
            Self::Unconditional => true,
            Self::Literal(text) => candidate == text.as_str(),
            Self::Prefix(text) => candidate.starts_with(text.as_str()),
            Self::Suffix(text) => candidate.ends_with(text.as_str()),
            Self::Contains(text) => {
                memchr::memmem::find(candidate.as_bytes(), text.as_bytes()).is_some()
            }
            Self::Regex(re) => re.is_match(candidate),
        }
    }
}

// Backslash escapes the following character; runs of stars collapse into one
// since a single segment can't be matched any differently by `**`.
fn tokenize(glob: &str) -> Vec<GlobToken> {
    let mut tokens = Vec::with_capacity(glob.len());
    let mut chars = glob.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            '\\' => GlobToken::Char(chars.next().unwrap_or('\\')),
            '*' => GlobToken::Star,
            '?' => GlobToken::AnyChar,
            c => GlobToken::Char(c),
        };
        if matches!((tokens.last(), token), (Some(GlobToken::Star), GlobToken::Star)) {
            continue;
        }
        tokens.push(token);
    }
    tokens
}

fn literal(tokens: &[GlobToken]) -> Option<String> {
    tokens
        .iter()
        .map(|t| match t {
            GlobToken::Char(c) => Some(*c),
            _ => None,
        })
        .collect()
}

fn tokens_to_regex(tokens: &[GlobToken]) -> regex::Regex {
    let mut regex = String::with_capacity(tokens.len() + 8);
    regex.push_str(r"\A");
    for token in tokens {
        match token {
            GlobToken::Star => regex.push_str(r"[^/]*"),
            GlobToken::AnyChar => regex.push_str(r"[^/]"),
            GlobToken::Char(c) => {
                if regex_syntax::is_meta_character(*c) {
                    regex.push('\\');
                }
                regex.push(*c);
            }
        }
    }
    regex.push_str(r"\z");
    regex::Regex::new(&regex).unwrap_or_else(|_| panic!("invalid regex: {}", regex))
}
