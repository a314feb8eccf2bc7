//! Alignment data model: timed segments with word and character sub-units.

use crate::time::{serde_opt_secs, serde_secs};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The complete ordered set of timed segments for one song, persisted as
/// `alignment.json`. Insertion order is time order: segments are sorted
/// ascending by start and mutually non-overlapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Alignment {
    #[serde(default)]
    pub segments: Vec<Segment>,
    /// Display mode preferred by whatever produced this alignment.
    #[serde(default, rename = "preferedMode", skip_serializing_if = "Option::is_none")]
    pub prefered_mode: Option<String>,
}

/// A time-bounded lyric line with its aligned sub-units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Segment {
    #[serde(with = "serde_secs")]
    pub start: Duration,
    #[serde(with = "serde_secs")]
    pub end: Duration,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<Vec<Word>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chars: Option<Vec<CharSpan>>,
}

/// A word-level aligned unit within a segment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Word {
    #[serde(with = "serde_secs")]
    pub start: Duration,
    #[serde(with = "serde_secs")]
    pub end: Duration,
    pub word: String,
    /// Aligner confidence, when the inference backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// A character-level aligned unit within a segment.
///
/// Timestamps are optional: aligners leave them out for characters they could
/// not place, and the visual cache interpolates those from their neighbors.
/// A present zero is a real timestamp, never a missing one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CharSpan {
    #[serde(default, with = "serde_opt_secs", skip_serializing_if = "Option::is_none")]
    pub start: Option<Duration>,
    #[serde(default, with = "serde_opt_secs", skip_serializing_if = "Option::is_none")]
    pub end: Option<Duration>,
    #[serde(rename = "char")]
    pub character: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl Segment {
    /// Inclusive containment check on both bounds.
    #[must_use]
    pub fn contains(&self, pos: Duration) -> bool {
        self.start <= pos && pos <= self.end
    }
}

impl Alignment {
    /// Find the segment whose `[start, end]` contains `pos`.
    ///
    /// With the non-overlap invariant upheld, at most one segment matches.
    #[must_use]
    pub fn segment_at(&self, pos: Duration) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.contains(pos))
    }

    /// Check the alignment invariants: `start <= end` per unit, segments
    /// sorted ascending by start without overlap, and each word/char span
    /// within its parent segment's bounds.
    ///
    /// Violations are reported as human-readable strings; an empty result
    /// means the alignment is well-formed.
    #[must_use]
    pub fn invariant_violations(&self) -> Vec<String> {
        let mut violations = Vec::new();

        for (i, segment) in self.segments.iter().enumerate() {
            if segment.start > segment.end {
                violations.push(format!(
                    "segment {i}: start {:?} after end {:?}",
                    segment.start, segment.end
                ));
            }
            if let Some(previous) = i.checked_sub(1).and_then(|p| self.segments.get(p)) {
                if previous.end > segment.start {
                    violations.push(format!(
                        "segment {i} overlaps previous (starts {:?}, previous ends {:?})",
                        segment.start, previous.end
                    ));
                }
            }
            for word in segment.words.iter().flatten() {
                if word.start > word.end
                    || word.start < segment.start
                    || word.end > segment.end
                {
                    violations.push(format!(
                        "segment {i}: word '{}' [{:?}, {:?}] outside segment bounds",
                        word.word, word.start, word.end
                    ));
                }
            }
            for span in segment.chars.iter().flatten() {
                let low = span.start.is_some_and(|s| s < segment.start);
                let high = span.end.is_some_and(|e| e > segment.end);
                let inverted = span
                    .start
                    .zip(span.end)
                    .is_some_and(|(s, e)| s > e);
                if low || high || inverted {
                    violations.push(format!(
                        "segment {i}: char '{}' outside segment bounds",
                        span.character
                    ));
                }
            }
        }

        violations
    }
}
