use thiserror::Error;

#[derive(Debug, Error)]
pub enum CosegError {
    #[error("Engine not initialized")]
    NotInitialized,
    #[error("Dimension mismatch on stream {stream}: {reason}")]
    DimensionMismatch { stream: usize, reason: String },
    #[error("Invalid ROI for stream {stream}: {reason}")]
    InvalidRoi { stream: usize, reason: String },
    #[error("No history for stream {stream}, no frame processed since initialization")]
    NoHistory { stream: usize },
    #[error("Stream index {index} out of range ({count} streams)")]
    StreamIndex { index: usize, count: usize },
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Invalid graphical model: {0}")]
    InvalidModel(String),
    #[error("Algorithm '{name}' failed: {source}")]
    Algorithm {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("Automatic model reset failed: {0}")]
    AutoResetFailed(#[source] Box<CosegError>),
}

pub type Result<T> = std::result::Result<T, CosegError>;
