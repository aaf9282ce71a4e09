//! Difficulty adaptation on the fixed `Easy < Medium < Hard` ladder.
//!
//! A correct answer moves one rung up, an incorrect answer one rung down, and
//! both ends of the ladder are sticky.

use crate::model::Difficulty;

/// Outcome of resolving a stored difficulty label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedLevel {
    pub level: Difficulty,
    /// False when the label was not on the ladder and `Medium` was substituted.
    pub recognized: bool,
}

/// Resolve a free-form difficulty label onto the ladder.
///
/// Unrecognized labels resolve to `Medium`. Callers are expected to log a
/// warning when `recognized` is false.
#[must_use]
pub fn resolve_label(label: &str) -> ResolvedLevel {
    match label.parse::<Difficulty>() {
        Ok(level) => ResolvedLevel {
            level,
            recognized: true,
        },
        Err(_) => ResolvedLevel {
            level: Difficulty::Medium,
            recognized: false,
        },
    }
}

/// Next difficulty after an answer graded `is_correct` at `current`.
#[must_use]
pub fn next_difficulty(current: Difficulty, is_correct: bool) -> Difficulty {
    let rank = current.rank();
    if is_correct {
        Difficulty::from_rank(rank + 1)
    } else {
        Difficulty::from_rank(rank.saturating_sub(1))
    }
}
