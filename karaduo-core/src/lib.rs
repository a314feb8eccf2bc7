pub mod alignment;
pub mod codec;
pub mod config;
pub mod container;
pub mod display;
pub mod engine;
pub mod error;
pub mod manifest;
pub mod paths;
pub mod projector;
pub mod services;
pub mod time;
pub mod timed;
pub mod track;
pub mod volume;

pub use alignment::{Alignment, CharSpan, Segment, Word};
pub use codec::{
    load_from_path, read_container, save_to_path, write_container, ALIGNMENT_ENTRY,
    BACKGROUND_STEM, FONTS_PREFIX, INSTRUMENTALS_STEM, MANIFEST_ENTRY, VOCALS_STEM,
};
pub use config::{EngineConfig, LyricsConfig, PlayerConfig, RemoteConfig};
pub use container::SongContainer;
pub use display::{build_display_cache, DisplaySegment, DisplayUnit};
pub use engine::{EngineSettings, EngineTasks, PlayerEngine};

/// Re-export toml error type for config parsing error handling
pub use toml::de::Error as TomlParseError;
pub use error::{CoreError, Result};
pub use manifest::{Manifest, Styling, TimingHints, MANIFEST_VERSION};
pub use paths::{
    config_dir, config_path, container_path, library_dir, CONFIG_DIR_NAME, CONFIG_FILE_NAME,
    CONTAINER_EXTENSION, LIBRARY_DIR_NAME,
};
pub use projector::{visible_segments, RenderMode};
pub use services::{
    LyricAligner, LyricsSource, MediaLibrary, SeparatedStems, StemSeparator, TrackMetadata,
    TrackQuery,
};
pub use time::DurationExt;
pub use timed::{parse_lrc, parse_srt, preprocess_text, TimedLine};
pub use track::{AudioTrack, ManualTrack};
pub use volume::{instrumental_volume, vocal_volume};
