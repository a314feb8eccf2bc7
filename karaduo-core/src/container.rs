//! In-memory song container: manifest, alignment, audio stems, optional
//! assets, and the derived visual cache.

use crate::alignment::{Alignment, Segment};
use crate::display::{build_display_cache, DisplaySegment};
use crate::manifest::Manifest;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Default audio container extension for the two stems.
pub const DEFAULT_AUDIO_FORMAT: &str = "wav";
/// Default container extension for the optional background video.
pub const DEFAULT_VIDEO_FORMAT: &str = "mp4";

/// One song's complete playback payload.
///
/// Created by the codec on load, or assembled incrementally before a save.
/// The visual cache is owned here and rebuilt whole whenever the alignment
/// is replaced.
#[derive(Debug, Clone, Default)]
pub struct SongContainer {
    pub manifest: Manifest,
    alignment: Alignment,
    display_cache: Vec<DisplaySegment>,

    pub vocal_track: Option<Vec<u8>>,
    pub instrumental_track: Option<Vec<u8>>,
    pub background_video: Option<Vec<u8>>,
    /// Font byte buffers keyed by family name.
    pub fonts: BTreeMap<String, Vec<u8>>,

    pub vocal_format: String,
    pub instrumental_format: String,
    pub video_format: String,
}

impl SongContainer {
    /// Create an empty container with default manifest and formats.
    #[must_use]
    pub fn new() -> Self {
        Self {
            vocal_format: DEFAULT_AUDIO_FORMAT.to_string(),
            instrumental_format: DEFAULT_AUDIO_FORMAT.to_string(),
            video_format: DEFAULT_VIDEO_FORMAT.to_string(),
            ..Self::default()
        }
    }

    /// Replace the alignment, discarding and fully rebuilding the visual
    /// cache. Invariant violations are logged, not rejected: playback is
    /// best-effort with whatever the aligner produced.
    pub fn set_alignment(&mut self, alignment: Alignment) {
        for violation in alignment.invariant_violations() {
            warn!("Alignment invariant violated: {violation}");
        }
        self.alignment = alignment;
        self.display_cache = build_display_cache(&self.alignment);
        debug!(
            "Visual cache rebuilt: {} segments",
            self.display_cache.len()
        );
    }

    #[must_use]
    pub fn alignment(&self) -> &Alignment {
        &self.alignment
    }

    /// The render-ready cache, index-aligned with the alignment's segments.
    #[must_use]
    pub fn display_cache(&self) -> &[DisplaySegment] {
        &self.display_cache
    }

    /// Attach the vocal stem bytes.
    pub fn set_vocal_track(&mut self, bytes: Vec<u8>, format: impl Into<String>) {
        self.vocal_track = Some(bytes);
        self.vocal_format = format.into();
    }

    /// Attach the instrumental stem bytes.
    pub fn set_instrumental_track(&mut self, bytes: Vec<u8>, format: impl Into<String>) {
        self.instrumental_track = Some(bytes);
        self.instrumental_format = format.into();
    }

    /// Attach an optional background video.
    pub fn set_background_video(&mut self, bytes: Vec<u8>, format: impl Into<String>) {
        self.background_video = Some(bytes);
        self.video_format = format.into();
    }

    /// Attach a font buffer keyed by family name.
    pub fn add_font(&mut self, family: impl Into<String>, bytes: Vec<u8>) {
        self.fonts.insert(family.into(), bytes);
    }

    /// Both mandatory stems are present.
    #[must_use]
    pub fn has_both_tracks(&self) -> bool {
        self.vocal_track.is_some() && self.instrumental_track.is_some()
    }

    /// The segment containing `pos`, without display padding.
    #[must_use]
    pub fn segment_at(&self, pos: Duration) -> Option<&Segment> {
        self.alignment.segment_at(pos)
    }

    /// Display data whose (end-extended) window contains `pos`.
    ///
    /// Prefers the latest (highest index) match so that when padded windows
    /// overlap the next line wins over a lingering previous one.
    #[must_use]
    pub fn display_segment_padded(
        &self,
        pos: Duration,
        padding: Duration,
    ) -> Option<&DisplaySegment> {
        self.display_cache
            .iter()
            .rev()
            .find(|segment| segment.contains_padded(pos, padding))
    }

    /// Display data for `pos`, honoring the manifest's display time padding:
    /// exact containment first, padded containment as the fallback. The
    /// padding lets the last line linger briefly after it ends.
    #[must_use]
    pub fn display_segment_with_hints(&self, pos: Duration) -> Option<&DisplaySegment> {
        self.display_segment_padded(pos, Duration::ZERO).or_else(|| {
            self.display_segment_padded(pos, self.manifest.timing_hints.text_display_padding)
        })
    }

    /// Display data by alignment index.
    #[must_use]
    pub fn display_segment(&self, index: usize) -> Option<&DisplaySegment> {
        self.display_cache.get(index)
    }

    /// True when `pos` lies inside a segment *without* padding. This flag,
    /// not the padded lookup, drives the volume controller.
    #[must_use]
    pub fn is_focused(&self, pos: Duration) -> bool {
        self.segment_at(pos).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::Segment;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn container_with_segments(segments: Vec<(u64, u64, &str)>) -> SongContainer {
        let mut container = SongContainer::new();
        container.set_alignment(Alignment {
            segments: segments
                .into_iter()
                .map(|(start, end, text)| Segment {
                    start: ms(start),
                    end: ms(end),
                    text: text.to_string(),
                    words: None,
                    chars: None,
                })
                .collect(),
            prefered_mode: None,
        });
        container
    }

    #[test]
    fn test_alignment_replacement_rebuilds_cache() {
        let mut container = container_with_segments(vec![(0, 1000, "a")]);
        assert_eq!(container.display_cache().len(), 1);

        container.set_alignment(Alignment::default());
        assert!(container.display_cache().is_empty());
    }

    #[test]
    fn test_display_lookup_exact_before_padded() {
        let mut container = container_with_segments(vec![(1000, 2000, "a"), (2500, 3500, "b")]);
        container.manifest.timing_hints.text_display_padding = ms(1000);

        // 1.5s: inside "a" exactly
        assert_eq!(
            container.display_segment_with_hints(ms(1500)).unwrap().text,
            "a"
        );
        // 2.2s: inside no segment, but within "a"'s padded window
        assert_eq!(
            container.display_segment_with_hints(ms(2200)).unwrap().text,
            "a"
        );
        // 2.6s: exact hit on "b" wins even though "a" is still padded
        assert_eq!(
            container.display_segment_with_hints(ms(2600)).unwrap().text,
            "b"
        );
    }

    #[test]
    fn test_padded_lookup_prefers_latest_match() {
        // Two adjacent segments whose padded windows both cover 3.7s
        let mut container = container_with_segments(vec![(1000, 2000, "a"), (2500, 3500, "b")]);
        container.manifest.timing_hints.text_display_padding = ms(2000);

        assert_eq!(
            container.display_segment_with_hints(ms(3700)).unwrap().text,
            "b"
        );
    }

    #[test]
    fn test_no_hit_outside_all_windows() {
        let container = container_with_segments(vec![(1000, 2000, "a")]);
        assert!(container.display_segment_with_hints(ms(9000)).is_none());
    }

    #[test]
    fn test_focus_ignores_padding() {
        let mut container = container_with_segments(vec![(1000, 2000, "a")]);
        container.manifest.timing_hints.text_display_padding = ms(5000);

        assert!(container.is_focused(ms(1500)));
        assert!(container.is_focused(ms(2000)));
        // Inside the padded display window but outside the segment proper
        assert!(!container.is_focused(ms(2500)));
    }

    #[test]
    fn test_track_assembly() {
        let mut container = SongContainer::new();
        assert!(!container.has_both_tracks());
        container.set_vocal_track(vec![1, 2, 3], "flac");
        container.set_instrumental_track(vec![4, 5], "wav");
        assert!(container.has_both_tracks());
        assert_eq!(container.vocal_format, "flac");
    }
}
