// Error handling for the SDS reformatter

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SdsError>;

#[derive(Error, Debug)]
pub enum SdsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid record header at offset {offset}: {reason}")]
    InvalidHeader { offset: usize, reason: String },

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(u8),

    #[error("Invalid record length: {0}")]
    InvalidRecordLength(usize),

    #[error("Corrupted data: {0}")]
    CorruptedData(String),

    #[error("Difference {0} does not fit in a Steim word")]
    SteimOverflow(i64),

    #[error("Decompression failed: {0}")]
    DecompressionFailed(String),

    #[error("Merge failed: {0}")]
    Merge(#[from] MergeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("Can't merge traces of {id} with differing sampling rates ({first} vs {second})")]
    SamplingRateMismatch { id: String, first: f64, second: f64 },

    #[error("Can't merge traces of {id} with differing sample types")]
    SampleTypeMismatch { id: String },
}
