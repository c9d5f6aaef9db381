//! The single error type shared by the decoder, the ingestion engine and the
//! component store.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FitsError>;

#[derive(Error, Debug)]
pub enum FitsError {
    // ---------------------------------------------------------------------
    // Input / envelope
    // ---------------------------------------------------------------------
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt compressed archive {}: {reason}", path.display())]
    CorruptArchive { path: PathBuf, reason: String },

    // ---------------------------------------------------------------------
    // Segment decoding
    // ---------------------------------------------------------------------
    /// A segment header or data region could not be parsed.
    #[error("failed to decode segment {index} ('{name}'): {reason}")]
    Decode {
        index: usize,
        name: String,
        reason: String,
    },

    /// The decoder produced a segment that is neither an array nor a table.
    #[error("segment {index} ('{name}') has unsupported kind '{kind}'")]
    UnsupportedSegmentKind {
        index: usize,
        name: String,
        kind: String,
    },

    // ---------------------------------------------------------------------
    // Caller lookups
    // ---------------------------------------------------------------------
    #[error("no component named '{0}'")]
    NoSuchComponent(String),

    #[error("no segment named '{0}'")]
    NoSuchSegment(String),

    #[error("container does not follow the Stokes cube convention: {0}")]
    NotCubeConvention(String),

    // ---------------------------------------------------------------------
    // Wrapped library errors
    // ---------------------------------------------------------------------
    #[error("invalid ingest options: {0}")]
    Config(#[from] serde_json::Error),

    #[error("Arrow materialization failed: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("array materialization failed: {0}")]
    Shape(#[from] ndarray::ShapeError),
}

impl FitsError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FitsError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn decode(index: usize, name: &str, reason: impl Into<String>) -> Self {
        FitsError::Decode {
            index,
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// Lookup failures are the caller's to handle; everything else aborts the
    /// whole ingestion call.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            FitsError::NoSuchComponent(_)
                | FitsError::NoSuchSegment(_)
                | FitsError::NotCubeConvention(_)
        )
    }
}
