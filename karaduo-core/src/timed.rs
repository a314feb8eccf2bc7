//! Plain timed lyric lines, as fetched from lyric sources or loaded from
//! LRC/SRT files. These are the input to forced alignment, not the aligned
//! output; see [`crate::alignment`] for the latter.

use std::time::Duration;

/// A lyric line with a start time and an optional end time.
///
/// The end is `None` when nothing bounds the line, which only happens for
/// the final line of a synced source.
#[derive(Debug, Clone, PartialEq)]
pub struct TimedLine {
    pub start: Duration,
    pub end: Option<Duration>,
    pub text: String,
}

/// Parse LRC content into timed lines.
///
/// Handles multi-timestamp lines and ID tags (tags are skipped, except
/// `[offset:ms]` which shifts every timestamp). Each line's end time is the
/// next line's start; the final line stays open-ended. Unparseable lines are
/// skipped rather than failing the whole file.
#[must_use]
pub fn parse_lrc(input: &str) -> Vec<TimedLine> {
    let mut offset_ms: i64 = 0;
    let mut lines = Vec::new();

    for raw in input.lines() {
        let raw = raw.trim();
        if raw.is_empty() {
            continue;
        }

        if let Some((tag, value)) = parse_id_tag(raw) {
            if tag.eq_ignore_ascii_case("offset") {
                if let Ok(parsed) = value.parse::<i64>() {
                    offset_ms = parsed;
                }
            }
            continue;
        }

        // Collect every leading [mm:ss.xx] timestamp
        let mut timestamps = Vec::new();
        let mut remaining = raw;
        while remaining.starts_with('[') {
            let Some(end) = remaining.find(']') else {
                break;
            };
            let Some(time) = parse_timestamp(&remaining[1..end]) else {
                break;
            };
            timestamps.push(time);
            remaining = &remaining[end + 1..];
        }
        if timestamps.is_empty() {
            continue;
        }

        let text = preprocess_text(remaining.trim());
        for start in timestamps {
            lines.push(TimedLine {
                start: apply_offset(start, offset_ms),
                end: None,
                text: text.clone(),
            });
        }
    }

    lines.sort_by_key(|line| line.start);
    close_line_ends(&mut lines);
    lines
}

/// Parse SRT content into timed lines. SRT carries explicit end times, so
/// they are kept as-is instead of being derived from the following cue.
#[must_use]
pub fn parse_srt(input: &str) -> Vec<TimedLine> {
    let mut lines = Vec::new();

    for block in input.split("\n\n") {
        let mut block_lines = block.lines().map(str::trim).filter(|l| !l.is_empty());

        // Cue index, tolerated but unused
        let Some(first) = block_lines.next() else {
            continue;
        };
        let timing = if first.contains("-->") {
            first
        } else {
            match block_lines.next() {
                Some(line) => line,
                None => continue,
            }
        };

        let Some((start_str, end_str)) = timing.split_once("-->") else {
            continue;
        };
        let Some(start) = parse_srt_timestamp(start_str.trim()) else {
            continue;
        };
        let end = parse_srt_timestamp(end_str.trim());

        let text = block_lines.collect::<Vec<_>>().join(" ");
        if text.is_empty() {
            continue;
        }
        lines.push(TimedLine {
            start,
            end,
            text: preprocess_text(&text),
        });
    }

    lines.sort_by_key(|line| line.start);
    lines
}

/// Normalize lyric text before alignment and display: typographic quotes
/// become ASCII ones and runs of whitespace collapse to single spaces.
#[must_use]
pub fn preprocess_text(text: &str) -> String {
    let normalized: String = text
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' => '\'',
            '\u{201C}' | '\u{201D}' => '"',
            c => c,
        })
        .collect();
    normalized.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Assign each line's end from its successor's start, leaving the last line
/// open-ended.
fn close_line_ends(lines: &mut [TimedLine]) {
    let starts: Vec<Duration> = lines.iter().map(|line| line.start).collect();
    for (i, line) in lines.iter_mut().enumerate() {
        line.end = starts.get(i + 1).copied();
    }
}

/// Parse an ID tag like `[ti:Title]`, rejecting timestamp brackets.
fn parse_id_tag(line: &str) -> Option<(&str, &str)> {
    let end = line.find(']')?;
    let content = line.strip_prefix('[')?.get(..end - 1)?;
    let (tag, value) = content.split_once(':')?;
    if tag.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((tag, value.trim()))
}

/// Parse `mm:ss.xx`, `mm:ss:xx`, or `mm:ss`.
fn parse_timestamp(s: &str) -> Option<Duration> {
    let parts: Vec<&str> = s.trim().split(':').collect();
    match parts.len() {
        2 => {
            let minutes: u64 = parts[0].parse().ok()?;
            let seconds: f64 = parts[1].parse().ok()?;
            if !seconds.is_finite() || seconds < 0.0 {
                return None;
            }
            Some(Duration::from_secs(minutes * 60) + Duration::from_secs_f64(seconds))
        }
        3 => {
            let minutes: u64 = parts[0].parse().ok()?;
            let seconds: u64 = parts[1].parse().ok()?;
            let hundredths: u64 = parts[2].parse().ok()?;
            Some(Duration::from_millis(
                (minutes * 60 + seconds) * 1000 + hundredths * 10,
            ))
        }
        _ => None,
    }
}

/// Parse an SRT timestamp `HH:MM:SS,mmm` (a dot separator is tolerated).
fn parse_srt_timestamp(s: &str) -> Option<Duration> {
    let (hms, millis) = s
        .split_once(',')
        .or_else(|| s.split_once('.'))
        .unwrap_or((s, "0"));
    let parts: Vec<&str> = hms.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: u64 = parts[0].parse().ok()?;
    let minutes: u64 = parts[1].parse().ok()?;
    let seconds: u64 = parts[2].parse().ok()?;
    let millis: u64 = millis.parse().ok()?;
    Some(Duration::from_millis(
        ((hours * 60 + minutes) * 60 + seconds) * 1000 + millis,
    ))
}

fn apply_offset(time: Duration, offset_ms: i64) -> Duration {
    if offset_ms >= 0 {
        #[allow(clippy::cast_sign_loss)]
        let shift = Duration::from_millis(offset_ms as u64);
        time + shift
    } else {
        #[allow(clippy::cast_sign_loss)]
        let shift = Duration::from_millis(offset_ms.unsigned_abs());
        time.saturating_sub(shift)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_lrc() {
        let input = "[00:12.34]Hello world";
        let lines = parse_lrc(input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start, Duration::from_millis(12340));
        assert_eq!(lines[0].end, None);
        assert_eq!(lines[0].text, "Hello world");
    }

    #[test]
    fn test_lrc_end_times_come_from_next_line() {
        let input = "[00:05.00]First\n[00:10.00]Second\n[00:15.00]Third";
        let lines = parse_lrc(input);
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].end, Some(Duration::from_secs(10)));
        assert_eq!(lines[1].end, Some(Duration::from_secs(15)));
        // Nothing bounds the final line
        assert_eq!(lines[2].end, None);
    }

    #[test]
    fn test_lrc_id_tags_skipped_offset_applied() {
        let input = "[ti:Song Title]\n[offset:500]\n[00:10.00]Test";
        let lines = parse_lrc(input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start, Duration::from_millis(10500));
    }

    #[test]
    fn test_lrc_negative_offset_saturates_at_zero() {
        let input = "[offset:-500]\n[00:00.20]Early";
        let lines = parse_lrc(input);
        assert_eq!(lines[0].start, Duration::ZERO);
    }

    #[test]
    fn test_lrc_multi_timestamp_line() {
        let input = "[00:05.00][00:15.00]Chorus";
        let lines = parse_lrc(input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start, Duration::from_secs(5));
        assert_eq!(lines[0].end, Some(Duration::from_secs(15)));
        assert_eq!(lines[1].start, Duration::from_secs(15));
        assert_eq!(lines[1].end, None);
    }

    #[test]
    fn test_lrc_unsorted_input_sorted() {
        let input = "[00:20.00]Later\n[00:10.00]Earlier";
        let lines = parse_lrc(input);
        assert_eq!(lines[0].text, "Earlier");
        assert_eq!(lines[0].end, Some(Duration::from_secs(20)));
        assert_eq!(lines[1].text, "Later");
    }

    #[test]
    fn test_lrc_garbage_lines_skipped() {
        let input = "not a lyric\n[00:05.00]Real line\n[broken";
        let lines = parse_lrc(input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].text, "Real line");
    }

    #[test]
    fn test_lrc_alternative_hundredths_format() {
        let lines = parse_lrc("[00:12:34]Hello");
        assert_eq!(lines[0].start, Duration::from_millis(12340));
    }

    #[test]
    fn test_parse_srt_blocks() {
        let input = "1\n00:00:05,000 --> 00:00:08,500\nFirst cue\n\n2\n00:00:10,000 --> 00:00:12,000\nSecond cue\nwrapped";
        let lines = parse_srt(input);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].start, Duration::from_secs(5));
        assert_eq!(lines[0].end, Some(Duration::from_millis(8500)));
        assert_eq!(lines[0].text, "First cue");
        assert_eq!(lines[1].text, "Second cue wrapped");
    }

    #[test]
    fn test_srt_without_cue_index() {
        let input = "00:01:00,000 --> 00:01:02,000\nNo index";
        let lines = parse_srt(input);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].start, Duration::from_secs(60));
    }

    #[test]
    fn test_preprocess_normalizes_quotes_and_whitespace() {
        assert_eq!(
            preprocess_text("don\u{2019}t  say \u{201C}stop\u{201D}"),
            "don't say \"stop\""
        );
        assert_eq!(preprocess_text("  spaced \t out  "), "spaced out");
    }

    #[test]
    fn test_cjk_lyrics_pass_through() {
        let lines = parse_lrc("[00:05.00]你好世界");
        assert_eq!(lines[0].text, "你好世界");
    }
}
