use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Extension error: {0}")]
    Extension(String),

    #[error("Stream device error: {0}")]
    Device(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Texture operation failed: {0}")]
    TextureError(String),

    #[error("Synchronization error: {0}")]
    SyncError(String),

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Operation not supported: {0}")]
    NotSupported(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("ABI mismatch: {0}")]
    AbiMismatch(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
