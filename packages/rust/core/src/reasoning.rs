//! Sentinel-delimited reasoning: parsing model output and producing the
//! canonical thought/solution form stored in training examples.
//!
//! Model output must contain each sentinel exactly once, in the order
//! begin_of_thought, end_of_thought, begin_of_solution, end_of_solution.
//! Anything before the first sentinel (e.g. a `<think>` preamble) and after
//! the last one is ignored.

use ethicsgen_shared::EthicsGenError;

pub const BEGIN_THOUGHT: &str = "<|begin_of_thought|>";
pub const END_THOUGHT: &str = "<|end_of_thought|>";
pub const BEGIN_SOLUTION: &str = "<|begin_of_solution|>";
pub const END_SOLUTION: &str = "<|end_of_solution|>";

/// Sentinels in the order they must appear.
pub const SENTINELS: [&str; 4] = [BEGIN_THOUGHT, END_THOUGHT, BEGIN_SOLUTION, END_SOLUTION];

/// Why a completion could not be split into thought and solution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SentinelError {
    #[error("missing {0}")]
    Missing(&'static str),

    #[error("{0} appears more than once")]
    Duplicate(&'static str),

    #[error("expected {expected} but found {found}")]
    OutOfOrder {
        expected: &'static str,
        found: &'static str,
    },

    #[error("empty {0} section")]
    EmptySection(&'static str),
}

impl From<SentinelError> for EthicsGenError {
    fn from(e: SentinelError) -> Self {
        EthicsGenError::MalformedOutput(e.to_string())
    }
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    BeforeThought,
    InThought,
    BetweenSections,
    InSolution,
    Done,
}

impl State {
    /// The sentinel that moves this state forward.
    fn expects(self) -> Option<usize> {
        match self {
            Self::BeforeThought => Some(0),
            Self::InThought => Some(1),
            Self::BetweenSections => Some(2),
            Self::InSolution => Some(3),
            Self::Done => None,
        }
    }

    fn advance(self) -> Self {
        match self {
            Self::BeforeThought => Self::InThought,
            Self::InThought => Self::BetweenSections,
            Self::BetweenSections => Self::InSolution,
            Self::InSolution | Self::Done => Self::Done,
        }
    }
}

/// Thought and solution sections extracted from a completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReasoning {
    pub thought: String,
    pub solution: String,
}

impl ParsedReasoning {
    /// Split a completion into its thought and solution sections.
    pub fn parse(text: &str) -> Result<Self, SentinelError> {
        // Each sentinel exactly once.
        for sentinel in SENTINELS {
            match text.matches(sentinel).count() {
                0 => return Err(SentinelError::Missing(sentinel)),
                1 => {}
                _ => return Err(SentinelError::Duplicate(sentinel)),
            }
        }

        let mut found: Vec<(usize, usize)> = SENTINELS
            .iter()
            .enumerate()
            .filter_map(|(idx, s)| text.find(s).map(|pos| (pos, idx)))
            .collect();
        found.sort_unstable();

        let mut state = State::BeforeThought;
        let mut bounds = [0usize; 4];
        for (pos, idx) in found {
            let expected = state.expects().ok_or(SentinelError::Duplicate(SENTINELS[idx]))?;
            if idx != expected {
                return Err(SentinelError::OutOfOrder {
                    expected: SENTINELS[expected],
                    found: SENTINELS[idx],
                });
            }
            bounds[idx] = pos;
            state = state.advance();
        }

        let thought = text[bounds[0] + BEGIN_THOUGHT.len()..bounds[1]].trim();
        let solution = text[bounds[2] + BEGIN_SOLUTION.len()..bounds[3]].trim();

        if thought.is_empty() {
            return Err(SentinelError::EmptySection("thought"));
        }
        if solution.is_empty() {
            return Err(SentinelError::EmptySection("solution"));
        }

        Ok(Self {
            thought: thought.to_string(),
            solution: solution.to_string(),
        })
    }

    /// Canonical stored form: both sections wrapped in their sentinels.
    pub fn to_reasoning_string(&self) -> String {
        format!(
            "{BEGIN_THOUGHT}\n{}\n{END_THOUGHT}\n\n{BEGIN_SOLUTION}\n{}\n{END_SOLUTION}",
            self.thought, self.solution
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wrap(thought: &str, solution: &str) -> String {
        format!("{BEGIN_THOUGHT}{thought}{END_THOUGHT}{BEGIN_SOLUTION}{solution}{END_SOLUTION}")
    }

    #[test]
    fn parses_well_formed_output() {
        let parsed = ParsedReasoning::parse(&wrap("\nstep one\nstep two\n", " do X ")).unwrap();
        assert_eq!(parsed.thought, "step one\nstep two");
        assert_eq!(parsed.solution, "do X");
    }

    #[test]
    fn ignores_preamble_and_trailer() {
        let text = format!("<think>hmm</think>\nSure!\n{}\nHope this helps.", wrap("t", "s"));
        let parsed = ParsedReasoning::parse(&text).unwrap();
        assert_eq!(parsed.thought, "t");
        assert_eq!(parsed.solution, "s");
    }

    #[test]
    fn canonical_form_round_trips() {
        let parsed = ParsedReasoning::parse(&wrap("a", "b")).unwrap();
        let canonical = parsed.to_reasoning_string();
        assert_eq!(
            canonical,
            "<|begin_of_thought|>\na\n<|end_of_thought|>\n\n<|begin_of_solution|>\nb\n<|end_of_solution|>"
        );
        assert_eq!(ParsedReasoning::parse(&canonical).unwrap(), parsed);
        for s in SENTINELS {
            assert_eq!(canonical.matches(s).count(), 1);
        }
    }

    #[test]
    fn missing_sentinel() {
        let text = format!("{BEGIN_THOUGHT}t{BEGIN_SOLUTION}s{END_SOLUTION}");
        assert_eq!(
            ParsedReasoning::parse(&text),
            Err(SentinelError::Missing(END_THOUGHT))
        );
        assert_eq!(
            ParsedReasoning::parse("plain prose"),
            Err(SentinelError::Missing(BEGIN_THOUGHT))
        );
    }

    #[test]
    fn duplicate_sentinel() {
        let text = format!("{}{END_SOLUTION}", wrap("t", "s"));
        assert_eq!(
            ParsedReasoning::parse(&text),
            Err(SentinelError::Duplicate(END_SOLUTION))
        );
    }

    #[test]
    fn misordered_sentinels() {
        let text = format!("{BEGIN_SOLUTION}s{END_SOLUTION}{BEGIN_THOUGHT}t{END_THOUGHT}");
        assert_eq!(
            ParsedReasoning::parse(&text),
            Err(SentinelError::OutOfOrder {
                expected: BEGIN_THOUGHT,
                found: BEGIN_SOLUTION
            })
        );
    }

    #[test]
    fn empty_sections_are_malformed() {
        assert_eq!(
            ParsedReasoning::parse(&wrap("  \n ", "s")),
            Err(SentinelError::EmptySection("thought"))
        );
        assert_eq!(
            ParsedReasoning::parse(&wrap("t", "")),
            Err(SentinelError::EmptySection("solution"))
        );
    }

    #[test]
    fn converts_to_malformed_output_error() {
        let err: EthicsGenError = SentinelError::Missing(END_THOUGHT).into();
        assert!(matches!(err, EthicsGenError::MalformedOutput(ref m) if m.contains("end_of_thought")));
    }
}
