//! Dual-track playback synchronizer.
//!
//! The instrumental stem is the timing master; the vocal stem and the
//! optional background video follow it. Two periodic tasks run for the
//! lifetime of a loaded container:
//!
//! - the **display tick** reads the master position, snaps any playing
//!   follower that drifted past the threshold, and publishes the position
//!   for lookup/projection consumers;
//! - the **precision tick** (fixed 100 ms) recomputes per-track target
//!   volumes from the published position and writes them only on change.
//!
//! Replacing the container means shutting this engine down and building a
//! new one; `shutdown` cancels both tasks before the audio buffers can be
//! released, so no stale task can touch a replaced track.

use crate::container::SongContainer;
use crate::error::{CoreError, Result};
use crate::track::AudioTrack;
use crate::volume;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Tick periods and the drift threshold.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    /// Display-rate tick period.
    pub display_tick: Duration,
    /// Fixed volume-recomputation period, decoupled from the display rate.
    pub volume_tick: Duration,
    /// Follower offset beyond which a playing follower is hard-seeked.
    pub drift_threshold: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            display_tick: Duration::from_millis(16),
            volume_tick: Duration::from_millis(100),
            drift_threshold: Duration::from_millis(100),
        }
    }
}

/// Join handles for the engine's two periodic tasks.
pub struct EngineTasks {
    pub display: JoinHandle<()>,
    pub volume: JoinHandle<()>,
}

/// Synchronized playback over one loaded container.
///
/// Constructed explicitly per container and torn down with it; there is no
/// process-wide default engine.
pub struct PlayerEngine {
    container: Arc<SongContainer>,
    instrumental: Arc<dyn AudioTrack>,
    vocal: Arc<dyn AudioTrack>,
    video: Option<Arc<dyn AudioTrack>>,
    settings: EngineSettings,
    /// Single writer: the display tick, plus direct writes from seeks.
    position_tx: watch::Sender<Duration>,
    vocal_override: AtomicBool,
    cancel_token: CancellationToken,
}

impl PlayerEngine {
    /// Create an engine over a fully loaded container and its backend tracks.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` when the container is missing a stem —
    /// an incrementally assembled container must be completed before
    /// playback.
    pub fn new(
        container: Arc<SongContainer>,
        instrumental: Arc<dyn AudioTrack>,
        vocal: Arc<dyn AudioTrack>,
        video: Option<Arc<dyn AudioTrack>>,
        settings: EngineSettings,
    ) -> Result<Arc<Self>> {
        if !container.has_both_tracks() {
            return Err(CoreError::config(
                "container is not fully loaded: both stems are required for playback",
            ));
        }

        let (position_tx, _) = watch::channel(Duration::ZERO);
        Ok(Arc::new(Self {
            container,
            instrumental,
            vocal,
            video,
            settings,
            position_tx,
            vocal_override: AtomicBool::new(false),
            cancel_token: CancellationToken::new(),
        }))
    }

    /// Spawn the display and precision tasks.
    #[must_use]
    pub fn start(self: Arc<Self>) -> EngineTasks {
        info!(
            "Starting sync engine (display tick {:?}, volume tick {:?})",
            self.settings.display_tick, self.settings.volume_tick
        );

        let engine = Arc::clone(&self);
        let display = tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.settings.display_tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = engine.cancel_token.cancelled() => {
                        debug!("Display task shutting down");
                        break;
                    }
                    _ = interval.tick() => engine.display_tick(),
                }
            }
        });

        let engine = self;
        let volume = tokio::spawn(async move {
            let mut interval = tokio::time::interval(engine.settings.volume_tick);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    () = engine.cancel_token.cancelled() => {
                        debug!("Volume task shutting down");
                        break;
                    }
                    _ = interval.tick() => engine.volume_tick(),
                }
            }
        });

        EngineTasks { display, volume }
    }

    /// One display-rate step: drift correction plus position publication.
    fn display_tick(&self) {
        let master = self.instrumental.position();
        self.correct_drift(&self.vocal, "vocals", master);
        if let Some(ref video) = self.video {
            self.correct_drift(video, "background", master);
        }
        self.position_tx.send_replace(master);
    }

    /// Snap a playing follower that drifted past the threshold. Seeking a
    /// paused track is avoided: it causes an audible jump when it resumes.
    /// Failures are logged and retried on the next tick.
    fn correct_drift(&self, follower: &Arc<dyn AudioTrack>, name: &str, master: Duration) {
        let offset = abs_diff(follower.position(), master);
        if offset <= self.settings.drift_threshold || !follower.is_playing() {
            return;
        }
        debug!("Track '{name}' drifted {offset:?} from master, snapping");
        if let Err(e) = follower.seek(master) {
            warn!("Drift correction seek failed for '{name}', retrying next tick: {e}");
        }
    }

    /// One precision step: recompute target volumes from the published
    /// master position and write them only when they changed.
    fn volume_tick(&self) {
        let pos = *self.position_tx.borrow();
        let hints = &self.container.manifest.timing_hints;
        let focused = self.container.is_focused(pos);

        let vocal_target =
            volume::vocal_volume(hints, focused, self.vocal_override.load(Ordering::Relaxed));
        apply_volume(&self.vocal, "vocals", vocal_target);

        let instrumental_target = volume::instrumental_volume(hints, focused);
        apply_volume(&self.instrumental, "instrumentals", instrumental_target);
    }

    /// Resume playback on all tracks together.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncFault` encountered; the remaining tracks are
    /// still attempted so they stay as close to lock-step as possible.
    pub fn play(&self) -> Result<()> {
        self.for_all_tracks(|track| track.play())
    }

    /// Pause all tracks together.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncFault` encountered.
    pub fn pause(&self) -> Result<()> {
        self.for_all_tracks(|track| track.pause())
    }

    /// Seek all tracks to `position` and publish it immediately, without
    /// waiting for the next display tick.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncFault` encountered.
    pub fn seek(&self, position: Duration) -> Result<()> {
        let result = self.for_all_tracks(|track| track.seek(position));
        self.position_tx.send_replace(position);
        result
    }

    /// Rewind everything to zero and start playing.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncFault` encountered while seeking or starting.
    pub fn start_from_zero(&self) -> Result<()> {
        self.seek(Duration::ZERO)?;
        self.play()
    }

    /// Seek the followers to the master's current position, regardless of
    /// the drift threshold. For use after state-changing actions such as
    /// toggling the vocal override.
    ///
    /// # Errors
    ///
    /// Returns the first `SyncFault` encountered.
    pub fn resync(&self) -> Result<()> {
        let master = self.instrumental.position();
        let mut first_error = None;
        for (track, name) in self.followers() {
            if let Err(e) = track.seek(master) {
                warn!("Manual resync failed for '{name}': {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Toggle the manual vocal override (mute/solo escape hatch). Takes
    /// effect on the next precision tick.
    pub fn set_vocal_override(&self, active: bool) {
        self.vocal_override.store(active, Ordering::Relaxed);
    }

    #[must_use]
    pub fn vocal_override(&self) -> bool {
        self.vocal_override.load(Ordering::Relaxed)
    }

    /// Most recently published master position.
    #[must_use]
    pub fn position(&self) -> Duration {
        *self.position_tx.borrow()
    }

    /// Subscribe to master position updates.
    #[must_use]
    pub fn subscribe_position(&self) -> watch::Receiver<Duration> {
        self.position_tx.subscribe()
    }

    #[must_use]
    pub fn container(&self) -> &Arc<SongContainer> {
        &self.container
    }

    /// Cancel both periodic tasks. Must run before the container's audio
    /// buffers are released so a stale tick cannot mutate a replaced track.
    pub fn shutdown(&self) {
        info!("Sync engine shutting down");
        self.cancel_token.cancel();
    }

    fn for_all_tracks(&self, op: impl Fn(&dyn AudioTrack) -> Result<()>) -> Result<()> {
        let mut first_error = None;
        for (track, name) in self.all_tracks() {
            if let Err(e) = op(track.as_ref()) {
                warn!("Transport command failed for '{name}': {e}");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn all_tracks(&self) -> impl Iterator<Item = (&Arc<dyn AudioTrack>, &'static str)> {
        [
            Some((&self.instrumental, "instrumentals")),
            Some((&self.vocal, "vocals")),
            self.video.as_ref().map(|video| (video, "background")),
        ]
        .into_iter()
        .flatten()
    }

    fn followers(&self) -> impl Iterator<Item = (&Arc<dyn AudioTrack>, &'static str)> {
        [
            Some((&self.vocal, "vocals")),
            self.video.as_ref().map(|video| (video, "background")),
        ]
        .into_iter()
        .flatten()
    }
}

impl Drop for PlayerEngine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

fn abs_diff(a: Duration, b: Duration) -> Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

fn apply_volume(track: &Arc<dyn AudioTrack>, name: &str, target: f32) {
    if (track.volume() - target).abs() < f32::EPSILON {
        return;
    }
    if let Err(e) = track.set_volume(target) {
        warn!("Volume write failed for '{name}': {e}");
    }
}
