//! Lyric display projection: per-unit reveal progress and render-mode
//! segment selection.

use crate::container::SongContainer;
use crate::display::{DisplaySegment, DisplayUnit};
use std::time::Duration;

impl DisplayUnit {
    /// Reveal progress of this unit at `pos`, in `[0, 1]`.
    ///
    /// Zero-duration units flip from 0 to 1 the moment `pos` reaches their
    /// end; everything else interpolates linearly between start and end.
    /// Monotonic non-decreasing in `pos` for a fixed unit.
    #[must_use]
    pub fn progress(&self, pos: Duration) -> f32 {
        if pos < self.start {
            return 0.0;
        }
        if pos >= self.end {
            return 1.0;
        }
        let duration = self.end.saturating_sub(self.start);
        if duration.is_zero() {
            return 1.0;
        }
        let elapsed = pos.saturating_sub(self.start);
        #[allow(clippy::cast_possible_truncation)]
        let ratio = (elapsed.as_secs_f64() / duration.as_secs_f64()) as f32;
        ratio.clamp(0.0, 1.0)
    }
}

/// How the display layer should select segments for rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderMode {
    /// Suppress lyric output entirely.
    Hidden,
    /// Render the current segment plus the next one for look-ahead.
    Foresight,
    /// Render the current segment only. Any unrecognized or unset mode
    /// string resolves here.
    #[default]
    Current,
}

impl RenderMode {
    /// Parse the manifest's `renderMode` string.
    #[must_use]
    pub fn parse(mode: &str) -> Self {
        match mode {
            "none" => Self::Hidden,
            "foresight" => Self::Foresight,
            _ => Self::Current,
        }
    }
}

/// Segments to render at `pos`: the current segment resolved with display
/// hints, plus the next cached segment in foresight mode.
#[must_use]
pub fn visible_segments(container: &SongContainer, pos: Duration) -> Vec<&DisplaySegment> {
    let mode = RenderMode::parse(&container.manifest.styling.render_mode);
    if mode == RenderMode::Hidden {
        return Vec::new();
    }

    let Some(current) = container.display_segment_with_hints(pos) else {
        return Vec::new();
    };

    let mut segments = vec![current];
    if mode == RenderMode::Foresight {
        if let Some(next) = container.display_segment(current.index + 1) {
            segments.push(next);
        }
    }
    segments
}
