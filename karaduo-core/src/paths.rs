//! Path constants for configuration and the local container library.

use std::path::PathBuf;

/// The name of the configuration directory under ~/.config/
pub const CONFIG_DIR_NAME: &str = "karaduo";

/// The name of the main configuration file
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// The directory holding packed song containers
pub const LIBRARY_DIR_NAME: &str = "library";

/// File extension for packed song containers
pub const CONTAINER_EXTENSION: &str = "ksz";

/// Get the configuration directory path (~/.config/karaduo/)
#[must_use]
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join(CONFIG_DIR_NAME)
}

/// Get the config file path (~/.config/karaduo/config.toml)
#[must_use]
pub fn config_path() -> PathBuf {
    config_dir().join(CONFIG_FILE_NAME)
}

/// Get the packed-container library path (`~/.config/karaduo/library/`)
#[must_use]
pub fn library_dir() -> PathBuf {
    config_dir().join(LIBRARY_DIR_NAME)
}

/// Build the library path for a packed container named `stem`
/// (`~/.config/karaduo/library/<stem>.ksz`)
#[must_use]
pub fn container_path(stem: &str) -> PathBuf {
    library_dir().join(format!("{stem}.{CONTAINER_EXTENSION}"))
}
