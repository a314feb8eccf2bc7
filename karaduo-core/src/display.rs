//! Visual cache: render-ready expansion of an alignment into display units.
//!
//! The cache is rebuilt wholesale whenever the alignment changes; there is no
//! incremental update path. Three projections are kept per segment:
//!
//! - `chars`: the aligner's character units, with missing timestamps
//!   interpolated from their neighbors.
//! - `words`: each word split into per-letter units of equal duration, with
//!   synthetic space units bridging the gaps between words.
//! - `words_fast`: whole-word units with the same synthetic spaces.

use crate::alignment::{Alignment, Segment};
use std::time::Duration;

/// One renderable unit (a letter, character, word, or synthetic space).
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayUnit {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
    /// Confidence carried over from the aligned unit this was derived from.
    pub score: Option<f64>,
}

/// Render-ready expansion of one segment.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplaySegment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
    /// Index of the source segment within the alignment.
    pub index: usize,
    pub chars: Vec<DisplayUnit>,
    pub words: Vec<DisplayUnit>,
    pub words_fast: Vec<DisplayUnit>,
}

impl DisplaySegment {
    /// Inclusive containment with the display end extended by `padding`.
    #[must_use]
    pub fn contains_padded(&self, pos: Duration, padding: Duration) -> bool {
        self.start <= pos && pos <= self.end + padding
    }
}

/// Expand an alignment into its visual cache, index-aligned with
/// `alignment.segments`.
#[must_use]
pub fn build_display_cache(alignment: &Alignment) -> Vec<DisplaySegment> {
    alignment
        .segments
        .iter()
        .enumerate()
        .map(|(index, segment)| expand_segment(segment, index))
        .collect()
}

fn expand_segment(segment: &Segment, index: usize) -> DisplaySegment {
    let mut words = Vec::new();
    let mut words_fast = Vec::new();

    let aligned_words = segment.words.as_deref().unwrap_or_default();
    for (i, word) in aligned_words.iter().enumerate() {
        words_fast.push(DisplayUnit {
            start: word.start,
            end: word.end,
            text: word.word.clone(),
            score: word.score,
        });

        words.extend(split_word_letters(
            word.start,
            word.end,
            &word.word,
            word.score,
        ));

        // One synthetic space bridges each pair of consecutive words,
        // inheriting the leading word's score.
        if let Some(next) = aligned_words.get(i + 1) {
            let space = DisplayUnit {
                start: word.end,
                end: next.start,
                text: " ".to_string(),
                score: word.score,
            };
            words_fast.push(space.clone());
            words.push(space);
        }
    }

    DisplaySegment {
        start: segment.start,
        end: segment.end,
        text: segment.text.clone(),
        index,
        chars: interpolate_chars(segment),
        words,
        words_fast,
    }
}

/// Split a word of duration D and N letters into N contiguous units of D/N,
/// covering `[start, end]` exactly. Division happens on the scaled value
/// (`D * i / N`) so the units tile without rounding gaps.
fn split_word_letters(
    start: Duration,
    end: Duration,
    word: &str,
    score: Option<f64>,
) -> Vec<DisplayUnit> {
    let letters: Vec<char> = word.chars().collect();
    let Ok(count) = u32::try_from(letters.len()) else {
        return Vec::new();
    };
    if count == 0 {
        return Vec::new();
    }

    let duration = end.saturating_sub(start);
    letters
        .into_iter()
        .enumerate()
        .map(|(i, letter)| {
            let i = u32::try_from(i).unwrap_or(u32::MAX);
            DisplayUnit {
                start: start + duration * i / count,
                end: start + duration * (i + 1) / count,
                text: letter.to_string(),
                score,
            }
        })
        .collect()
}

/// Copy the segment's character units, filling absent timestamps: a missing
/// start becomes the previous character's (resolved) end, or the segment
/// start for the first unit; a missing end becomes the next character's start,
/// or the segment end for the last unit.
fn interpolate_chars(segment: &Segment) -> Vec<DisplayUnit> {
    let spans = segment.chars.as_deref().unwrap_or_default();
    let mut units = Vec::with_capacity(spans.len());

    for (i, span) in spans.iter().enumerate() {
        let start = span.start.unwrap_or_else(|| {
            units
                .last()
                .map_or(segment.start, |previous: &DisplayUnit| previous.end)
        });
        let end = span
            .end
            .or_else(|| spans.get(i + 1).and_then(|next| next.start))
            .unwrap_or(segment.end)
            .max(start);
        units.push(DisplayUnit {
            start,
            end,
            text: span.character.clone(),
            score: span.score,
        });
    }

    units
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::{CharSpan, Word};

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn word(start_ms: u64, end_ms: u64, text: &str) -> Word {
        Word {
            start: ms(start_ms),
            end: ms(end_ms),
            word: text.to_string(),
            score: None,
        }
    }

    fn segment_with_words(words: Vec<Word>) -> Segment {
        Segment {
            start: ms(1000),
            end: ms(3000),
            text: "Hi you".to_string(),
            words: Some(words),
            chars: None,
        }
    }

    #[test]
    fn test_words_cache_end_to_end() {
        // One segment [1.0, 3.0] with words Hi [1.0, 2.0] and you [2.5, 3.0]
        let alignment = Alignment {
            segments: vec![segment_with_words(vec![
                word(1000, 2000, "Hi"),
                word(2500, 3000, "you"),
            ])],
            prefered_mode: None,
        };

        let cache = build_display_cache(&alignment);
        assert_eq!(cache.len(), 1);
        let words = &cache[0].words;

        // 2 letters + 1 space + 3 letters
        assert_eq!(words.len(), 6);
        assert_eq!((words[0].start, words[0].end), (ms(1000), ms(1500)));
        assert_eq!(words[0].text, "H");
        assert_eq!((words[1].start, words[1].end), (ms(1500), ms(2000)));
        assert_eq!(words[1].text, "i");
        assert_eq!((words[2].start, words[2].end), (ms(2000), ms(2500)));
        assert_eq!(words[2].text, " ");
        // "you" split evenly across [2.5, 3.0]
        for (i, expected) in ["y", "o", "u"].iter().enumerate() {
            let unit = &words[3 + i];
            assert_eq!(unit.text, *expected);
            let offset = u32::try_from(i).unwrap();
            assert_eq!(unit.start, ms(2500) + ms(500) * offset / 3);
            assert_eq!(unit.end, ms(2500) + ms(500) * (offset + 1) / 3);
        }
        // Exact coverage without gaps or overlap
        assert_eq!(words[3].start, ms(2500));
        assert_eq!(words[5].end, ms(3000));
        for pair in words.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_words_fast_keeps_whole_words() {
        let alignment = Alignment {
            segments: vec![segment_with_words(vec![
                word(1000, 2000, "Hi"),
                word(2500, 3000, "you"),
            ])],
            prefered_mode: None,
        };

        let fast = &build_display_cache(&alignment)[0].words_fast;
        assert_eq!(fast.len(), 3);
        assert_eq!(fast[0].text, "Hi");
        assert_eq!(fast[1].text, " ");
        assert_eq!((fast[1].start, fast[1].end), (ms(2000), ms(2500)));
        assert_eq!(fast[2].text, "you");
    }

    #[test]
    fn test_space_inherits_leading_word_score() {
        let mut first = word(1000, 2000, "Hi");
        first.score = Some(0.8);
        let mut second = word(2500, 3000, "you");
        second.score = Some(0.4);

        let alignment = Alignment {
            segments: vec![segment_with_words(vec![first, second])],
            prefered_mode: None,
        };
        let cache = build_display_cache(&alignment);
        let space = cache[0].words_fast.iter().find(|u| u.text == " ").unwrap();
        assert_eq!(space.score, Some(0.8));
    }

    #[test]
    fn test_no_trailing_space_after_last_word() {
        let alignment = Alignment {
            segments: vec![segment_with_words(vec![word(1000, 2000, "solo")])],
            prefered_mode: None,
        };
        let cache = build_display_cache(&alignment);
        assert!(cache[0].words.iter().all(|u| u.text != " "));
        assert_eq!(cache[0].words_fast.len(), 1);
    }

    #[test]
    fn test_letter_split_is_unicode_aware() {
        let alignment = Alignment {
            segments: vec![segment_with_words(vec![word(1000, 2000, "你好")])],
            prefered_mode: None,
        };
        let words = &build_display_cache(&alignment)[0].words;
        assert_eq!(words.len(), 2);
        assert_eq!(words[0].text, "你");
        assert_eq!((words[0].start, words[0].end), (ms(1000), ms(1500)));
        assert_eq!(words[1].text, "好");
    }

    #[test]
    fn test_char_interpolation() {
        let spans = vec![
            CharSpan {
                start: None,
                end: None,
                character: "a".to_string(),
                score: None,
            },
            CharSpan {
                start: Some(ms(1500)),
                end: Some(ms(1800)),
                character: "b".to_string(),
                score: None,
            },
            CharSpan {
                start: None,
                end: None,
                character: "c".to_string(),
                score: None,
            },
        ];
        let segment = Segment {
            start: ms(1000),
            end: ms(3000),
            text: "abc".to_string(),
            words: None,
            chars: Some(spans),
        };
        let alignment = Alignment {
            segments: vec![segment],
            prefered_mode: None,
        };

        let chars = &build_display_cache(&alignment)[0].chars;
        // First: start falls back to segment start, end to next char's start
        assert_eq!((chars[0].start, chars[0].end), (ms(1000), ms(1500)));
        assert_eq!((chars[1].start, chars[1].end), (ms(1500), ms(1800)));
        // Last: start falls back to previous end, end to segment end
        assert_eq!((chars[2].start, chars[2].end), (ms(1800), ms(3000)));
    }

    #[test]
    fn test_zero_timestamp_is_not_missing() {
        // The original format used falsy checks, conflating t=0 with absent;
        // a present zero must survive interpolation untouched.
        let segment = Segment {
            start: Duration::ZERO,
            end: ms(1000),
            text: "a".to_string(),
            words: None,
            chars: Some(vec![CharSpan {
                start: Some(Duration::ZERO),
                end: Some(ms(400)),
                character: "a".to_string(),
                score: None,
            }]),
        };
        let alignment = Alignment {
            segments: vec![segment],
            prefered_mode: None,
        };
        let chars = &build_display_cache(&alignment)[0].chars;
        assert_eq!((chars[0].start, chars[0].end), (Duration::ZERO, ms(400)));
    }

    #[test]
    fn test_cache_index_alignment() {
        let alignment = Alignment {
            segments: vec![
                Segment {
                    start: ms(0),
                    end: ms(1000),
                    text: "one".to_string(),
                    words: None,
                    chars: None,
                },
                Segment {
                    start: ms(2000),
                    end: ms(3000),
                    text: "two".to_string(),
                    words: None,
                    chars: None,
                },
            ],
            prefered_mode: None,
        };
        let cache = build_display_cache(&alignment);
        assert_eq!(cache[0].index, 0);
        assert_eq!(cache[1].index, 1);
        assert_eq!(cache[1].text, "two");
    }
}
