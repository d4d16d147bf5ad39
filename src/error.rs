use thiserror::Error;

#[derive(Error, Debug)]
pub enum VideoError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Playback error: {0}")]
    Playback(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("an export is already in progress")]
    ExportInProgress,

    #[error("Encoding engine error: {0}")]
    Engine(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, VideoError>;
