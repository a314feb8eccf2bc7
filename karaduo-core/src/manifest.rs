//! Container manifest: song metadata, timing hints, and styling.

use crate::error::{CoreError, Result};
use crate::time::serde_secs;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Current manifest schema version. Newer versions are accepted best-effort;
/// unknown fields are ignored on read.
pub const MANIFEST_VERSION: u32 = 1;

/// Song container manifest, persisted as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artists: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, rename = "timingHints")]
    pub timing_hints: TimingHints,
    #[serde(default)]
    pub styling: Styling,
}

const fn default_version() -> u32 {
    MANIFEST_VERSION
}

/// Volume levels and display timing used by the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TimingHints {
    #[serde(rename = "vocalTrackVolumeFocused")]
    pub vocal_volume_focused: f32,
    #[serde(rename = "instrumentalTrackVolumeFocused")]
    pub instrumental_volume_focused: f32,
    #[serde(rename = "vocalTrackVolumeUnfocused")]
    pub vocal_volume_unfocused: f32,
    #[serde(rename = "instrumentalTrackVolumeUnfocused")]
    pub instrumental_volume_unfocused: f32,
    /// How long a segment lingers on screen past its end.
    #[serde(
        rename = "textDisplayTimepadding",
        with = "serde_secs",
        default = "default_display_padding"
    )]
    pub text_display_padding: Duration,
    /// When false, focus state is ignored and the focused levels always apply.
    #[serde(rename = "useFocusUnfocusVolumeControl", default)]
    pub use_focus_volume_control: bool,
}

fn default_display_padding() -> Duration {
    Duration::from_secs(1)
}

impl Default for TimingHints {
    fn default() -> Self {
        Self {
            vocal_volume_focused: 0.0,
            instrumental_volume_focused: 1.0,
            vocal_volume_unfocused: 1.0,
            instrumental_volume_unfocused: 1.0,
            text_display_padding: default_display_padding(),
            use_focus_volume_control: false,
        }
    }
}

/// Presentation styling hints. The engine only interprets `render_mode`;
/// colors and blur levels pass through to the display layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Styling {
    #[serde(rename = "backgroundColor")]
    pub background_color: String,
    #[serde(rename = "blurFocused")]
    pub blur_focused: f32,
    #[serde(rename = "blurUnfocused")]
    pub blur_unfocused: f32,
    #[serde(rename = "renderMode")]
    pub render_mode: String,
}

impl Default for Styling {
    fn default() -> Self {
        Self {
            background_color: "#000000".to_string(),
            blur_focused: 0.0,
            blur_unfocused: 0.0,
            render_mode: "auto".to_string(),
        }
    }
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            title: None,
            artists: None,
            album: None,
            timing_hints: TimingHints::default(),
            styling: Styling::default(),
        }
    }
}

impl Manifest {
    /// Set the song title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    /// Set the artist list.
    pub fn set_artists(&mut self, artists: Vec<String>) {
        self.artists = Some(artists);
    }

    /// Set the album name.
    pub fn set_album(&mut self, album: impl Into<String>) {
        self.album = Some(album.into());
    }

    /// Validate the manifest values that the engine depends on.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Config` if a volume level lies outside `[0, 1]`
    /// or a blur level is negative.
    pub fn validate(&self) -> Result<()> {
        let volumes = [
            ("vocalTrackVolumeFocused", self.timing_hints.vocal_volume_focused),
            (
                "instrumentalTrackVolumeFocused",
                self.timing_hints.instrumental_volume_focused,
            ),
            (
                "vocalTrackVolumeUnfocused",
                self.timing_hints.vocal_volume_unfocused,
            ),
            (
                "instrumentalTrackVolumeUnfocused",
                self.timing_hints.instrumental_volume_unfocused,
            ),
        ];
        for (name, level) in volumes {
            if !(0.0..=1.0).contains(&level) {
                return Err(CoreError::config(format!(
                    "{name} must be within [0, 1], got {level}"
                )));
            }
        }
        for (name, blur) in [
            ("blurFocused", self.styling.blur_focused),
            ("blurUnfocused", self.styling.blur_unfocused),
        ] {
            if !blur.is_finite() || blur < 0.0 {
                return Err(CoreError::config(format!(
                    "{name} must be finite and non-negative, got {blur}"
                )));
            }
        }
        Ok(())
    }
}
