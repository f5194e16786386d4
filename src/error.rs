use std::path::PathBuf;

/// Central error type for sparkyd.
#[derive(Debug, thiserror::Error)]
pub enum KioskError {
    #[error("config error: {0}")]
    Config(String),

    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("no media to show")]
    NoMedia,

    #[error("decode error: {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("resize error: {path}: {source}")]
    Resize {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("render error: {0}")]
    Render(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("GPIO error: {0}")]
    Gpio(String),

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("server error: {0}")]
    Server(String),

    #[error("failed to launch {command}: {message}")]
    Launch { command: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watcher error: {0}")]
    Watcher(String),
}

pub type Result<T> = std::result::Result<T, KioskError>;
