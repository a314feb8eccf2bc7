//! Capability traits for the external collaborators of the packing
//! pipeline: the media library holding the original audio, the stem
//! separation and forced-alignment services, and lyric sources.
//!
//! Each collaborator is a narrow trait so callers can depend on exactly the
//! capability they need and tests can substitute any of them independently.

use crate::alignment::Alignment;
use crate::error::Result;
use crate::timed::TimedLine;
use async_trait::async_trait;
use std::time::Duration;

/// Query parameters for locating a track's lyrics.
#[derive(Debug, Clone)]
pub struct TrackQuery {
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    /// Track duration, used to disambiguate between versions of a song.
    pub duration: Option<Duration>,
}

impl TrackQuery {
    #[must_use]
    pub fn new(title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            artist: artist.into(),
            album: None,
            duration: None,
        }
    }

    #[must_use]
    pub fn with_album(mut self, album: impl Into<String>) -> Self {
        self.album = Some(album.into());
        self
    }

    #[must_use]
    pub const fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }
}

/// Metadata for a library item, used to seed the container manifest and
/// build lyric queries.
#[derive(Debug, Clone)]
pub struct TrackMetadata {
    pub title: String,
    pub artists: Vec<String>,
    pub album: Option<String>,
    pub duration: Option<Duration>,
}

/// A media library that can hand over original track audio and metadata by
/// library item ID.
#[async_trait]
pub trait MediaLibrary: Send + Sync {
    /// Human-readable name, for logs.
    fn name(&self) -> &'static str;

    /// Fetch the track's metadata.
    ///
    /// # Errors
    ///
    /// Returns an error when the item does not exist or the library is
    /// unreachable.
    async fn metadata(&self, item_id: &str) -> Result<TrackMetadata>;

    /// Download the track's original mixed audio.
    ///
    /// # Errors
    ///
    /// Returns an error when the item does not exist or the download fails.
    async fn fetch_audio(&self, item_id: &str) -> Result<Vec<u8>>;
}

/// Vocal and instrumental stems produced by source separation.
#[derive(Debug, Clone)]
pub struct SeparatedStems {
    pub vocals: Vec<u8>,
    pub instrumentals: Vec<u8>,
    /// File extension of the stem encoding, e.g. `wav`.
    pub format: String,
}

/// A service that splits mixed audio into vocal and instrumental stems.
///
/// Separation is expensive, so requests are keyed by the content hash of the
/// input audio and implementations are expected to reuse prior results for
/// the same hash.
#[async_trait]
pub trait StemSeparator: Send + Sync {
    /// Separate `audio` into stems.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteService` error when the separation backend fails.
    async fn separate(&self, audio: &[u8], content_hash: &str) -> Result<SeparatedStems>;
}

/// A service that force-aligns lyric text against a vocal stem, producing
/// segment, word, and character timings.
#[async_trait]
pub trait LyricAligner: Send + Sync {
    /// Align `lines` against the vocal stem identified by `content_hash`.
    ///
    /// The reference text is the full plain lyric text; sources that only
    /// provide line starts still contribute it so the aligner can recover
    /// word boundaries.
    ///
    /// # Errors
    ///
    /// Returns a `RemoteService` error when the alignment backend fails.
    async fn align(
        &self,
        lines: &[TimedLine],
        reference_text: &str,
        content_hash: &str,
    ) -> Result<Alignment>;
}

/// A provider of synced lyric lines for a track.
#[async_trait]
pub trait LyricsSource: Send + Sync {
    /// Human-readable source name, for logs and error context.
    fn name(&self) -> &'static str;

    /// Fetch synced lines for the queried track.
    ///
    /// # Errors
    ///
    /// Returns `LyricsNotFound` when the source has no synced lyrics for
    /// the track, or `LyricsSourceFailed` on transport errors.
    async fn fetch(&self, query: &TrackQuery) -> Result<Vec<TimedLine>>;
}
