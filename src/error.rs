use thiserror::Error;

/// Library-level errors using thiserror for structured error handling.
///
/// None of these are fatal to a detection loop: loops log them and retry on
/// the next tick. Setup code wraps them with anyhow context.

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Failed to enumerate monitors")]
    MonitorsUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to capture screen")]
    CaptureFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("No displays found")]
    NoDisplays,

    #[error("Invalid display index: {0}")]
    InvalidDisplayIndex(usize),

    #[error("Capture area {0:?} is outside the screen bounds")]
    OutOfBounds([i32; 4]),
}

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read template manifest from {path}")]
    ManifestFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to load template image {path}")]
    ImageFailed {
        path: String,
        #[source]
        source: image::ImageError,
    },

    #[error("Unknown event name in template {file}: {name}")]
    UnknownEvent { file: String, name: String },

    #[error("Unknown template category: {0}")]
    UnknownCategory(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Could not determine the platform config directory")]
    NoConfigDirectory,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ClockError {
    #[error("Clock read-out is unreadable: '{0}'")]
    Unreadable(String),

    #[error("Clock read-out is out of range: {minutes}:{seconds:02}")]
    OutOfRange { minutes: u32, seconds: u32 },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
