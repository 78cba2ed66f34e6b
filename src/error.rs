//! Error type shared by label loading, decoding, augmentation and encoding.

use std::path::PathBuf;
use thiserror::Error;

pub type BatchResult<T> = Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("label parse error at {path}:{line}: {msg}")]
    LabelParse {
        path: PathBuf,
        line: usize,
        msg: String,
    },
    /// `index` is the 1-based position in the file's `annotations` array
    #[error("invalid annotation #{index} in {path}: {msg}")]
    Annotation {
        path: PathBuf,
        index: usize,
        msg: String,
    },
    #[error("json parse error at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("image decode error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("transform `{op}` failed: {msg}")]
    Transform { op: &'static str, msg: String },
    #[error("label encoding failed: {0}")]
    Encode(String),
}

impl BatchError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        BatchError::Config(msg.into())
    }

    pub(crate) fn transform(op: &'static str, msg: impl Into<String>) -> Self {
        BatchError::Transform {
            op,
            msg: msg.into(),
        }
    }
}
