use thiserror::Error;

#[derive(Error, Debug)]
pub enum ControlError {
    /// Setup input that cannot describe a device. Aborts setup.
    #[error("Invalid device configuration: {0}")]
    InvalidConfig(String),

    #[error("Could not resolve host {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read configuration: {0}")]
    ConfigIo(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] serde_json::Error),

    /// Rejected before anything was sent to the device
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The controller was torn down while a key sequence was in progress
    #[error("Cancelled after {sent} key presses")]
    Cancelled { sent: usize },

    #[error("Device not found: {0}")]
    DeviceNotFound(String),
}

pub type Result<T> = std::result::Result<T, ControlError>;
