//! Error types
//!
//! [`TilerError`] covers every fatal failure of the library. Conditions that
//! only degrade the output (a node carrying both `matrix` and TRS fields, a
//! texture that cannot be copied) are logged and never surface here.

use thiserror::Error;

/// The main error type for slicing, tiling and container encoding.
#[derive(Error, Debug)]
pub enum TilerError {
    /// A cross-referenced index is absent from the asset graph.
    #[error("structural integrity error: {kind} index {index} referenced by {context} does not exist")]
    StructuralIntegrity {
        /// Element collection that was indexed (e.g. "accessor")
        kind: &'static str,
        /// The dangling index
        index: usize,
        /// Who referenced it
        context: String,
    },

    /// A declared buffer has no resolved bytes.
    #[error("buffer {index} has no data")]
    MissingBuffer {
        /// Index into the document's buffer list
        index: usize,
    },

    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or encoding error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64 decoding error.
    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Data URI that is not a base64 payload.
    #[error("Data URI error: {0}")]
    DataUri(String),

    /// Malformed binary glTF.
    #[error("Invalid GLB: {0}")]
    InvalidGlb(String),

    /// Malformed b3dm or i3dm container.
    #[error("Invalid tile container: {0}")]
    InvalidContainer(String),
}

impl TilerError {
    /// Shorthand for a dangling-index failure.
    pub fn dangling(kind: &'static str, index: usize, context: impl Into<String>) -> Self {
        TilerError::StructuralIntegrity {
            kind,
            index,
            context: context.into(),
        }
    }
}

/// Alias for `Result<T, TilerError>`.
pub type Result<T> = std::result::Result<T, TilerError>;
