use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    // Container format errors
    #[error("Malformed container: {message}")]
    Format { message: String },

    #[error("Missing mandatory container entry: {entry}")]
    MissingEntry { entry: String },

    #[error("Failed to decode {entry}: {source}")]
    Decode {
        entry: String,
        #[source]
        source: serde_json::Error,
    },

    // Synchronization errors
    #[error("Track '{track}' sync fault: {reason}")]
    SyncFault { track: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {message}")]
    Config { message: String },

    #[error("Config file not found at {path}. A template has been created - please edit it and rerun.")]
    ConfigNotFound { path: std::path::PathBuf },

    #[error("Failed to parse config file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Lyrics lookup errors
    #[error("Lyrics not found for track: {track} by {artist}")]
    LyricsNotFound { track: String, artist: String },

    #[error("Lyrics source {source_name} failed: {reason}")]
    LyricsSourceFailed { source_name: String, reason: String },

    // Remote service errors
    #[error("Remote service failed: {reason}")]
    RemoteService { reason: String },

    // Archive errors
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build a `Format` error from anything displayable.
    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    /// Build a `Config` error from anything displayable.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Build a `SyncFault` for a named track.
    pub fn sync_fault(track: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SyncFault {
            track: track.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
