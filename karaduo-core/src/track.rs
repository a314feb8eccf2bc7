//! The audio backend seam.
//!
//! The engine never touches samples; it drives tracks through this trait.
//! Implementations wrap whatever playback backend hosts the decoded stems
//! and must be non-blocking: every call returns immediately, with the real
//! work happening on the backend's own callbacks.

use crate::error::Result;
use std::sync::Mutex;
use std::time::Duration;

/// Non-blocking transport and volume control over one playing track.
pub trait AudioTrack: Send + Sync {
    /// Begin or resume playback.
    ///
    /// # Errors
    ///
    /// Returns a `SyncFault` when the backend cannot start the track
    /// (e.g. it failed to load).
    fn play(&self) -> Result<()>;

    /// Pause playback, keeping the current position.
    ///
    /// # Errors
    ///
    /// Returns a `SyncFault` when the backend rejects the command.
    fn pause(&self) -> Result<()>;

    /// Jump to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns a `SyncFault` when the backend cannot seek.
    fn seek(&self, position: Duration) -> Result<()>;

    /// Current playback position as reported by the backend.
    fn position(&self) -> Duration;

    /// Whether the track is actively playing.
    fn is_playing(&self) -> bool;

    /// Current volume in `[0, 1]`.
    fn volume(&self) -> f32;

    /// Set the volume.
    ///
    /// # Errors
    ///
    /// Returns a `SyncFault` when the backend rejects the command.
    fn set_volume(&self, volume: f32) -> Result<()>;
}

/// An in-memory [`AudioTrack`] whose position only moves when told to.
///
/// Backs the engine tests and headless consumers that need transport
/// semantics without an audio device. `advance` stands in for the backend's
/// clock so drift scenarios can be staged deterministically.
#[derive(Debug, Default)]
pub struct ManualTrack {
    state: Mutex<ManualTrackState>,
}

#[derive(Debug)]
struct ManualTrackState {
    position: Duration,
    playing: bool,
    volume: f32,
    seek_count: u64,
    volume_write_count: u64,
}

impl Default for ManualTrackState {
    fn default() -> Self {
        Self {
            position: Duration::ZERO,
            playing: false,
            // Backends start tracks at full volume
            volume: 1.0,
            seek_count: 0,
            volume_write_count: 0,
        }
    }
}

impl ManualTrack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the position forward, as a real backend's clock would.
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.position += by;
    }

    /// Place the position directly, without counting as a seek.
    pub fn set_position(&self, position: Duration) {
        self.lock().position = position;
    }

    /// Number of `seek` calls observed, for asserting on drift snaps.
    #[must_use]
    pub fn seek_count(&self) -> u64 {
        self.lock().seek_count
    }

    /// Number of `set_volume` calls observed, for asserting that volume
    /// writes only happen on change.
    #[must_use]
    pub fn volume_write_count(&self) -> u64 {
        self.lock().volume_write_count
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualTrackState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl AudioTrack for ManualTrack {
    fn play(&self) -> Result<()> {
        self.lock().playing = true;
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.lock().playing = false;
        Ok(())
    }

    fn seek(&self, position: Duration) -> Result<()> {
        let mut state = self.lock();
        state.position = position;
        state.seek_count += 1;
        Ok(())
    }

    fn position(&self) -> Duration {
        self.lock().position
    }

    fn is_playing(&self) -> bool {
        self.lock().playing
    }

    fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f32) -> Result<()> {
        let mut state = self.lock();
        state.volume = volume;
        state.volume_write_count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_track_transport() {
        let track = ManualTrack::new();
        assert!(!track.is_playing());

        track.play().unwrap();
        assert!(track.is_playing());

        track.advance(Duration::from_millis(250));
        assert_eq!(track.position(), Duration::from_millis(250));

        track.seek(Duration::from_secs(5)).unwrap();
        assert_eq!(track.position(), Duration::from_secs(5));
        assert_eq!(track.seek_count(), 1);

        track.pause().unwrap();
        assert!(!track.is_playing());
    }

    #[test]
    fn test_manual_track_volume() {
        let track = ManualTrack::new();
        track.set_volume(0.7).unwrap();
        assert!((track.volume() - 0.7).abs() < f32::EPSILON);
    }
}
