//! Error types shared across QuickEdit crates.

use std::path::PathBuf;

/// Top-level error type for QuickEdit operations.
#[derive(Debug, thiserror::Error)]
pub enum QuickEditError {
    #[error("Project error: {message}")]
    Project { message: String },

    #[error("Source unavailable: {path}: {message}")]
    SourceUnavailable { path: PathBuf, message: String },

    #[error("Layer render error: {message}")]
    LayerRender { message: String },

    #[error("Cannot replace existing output {path}: {source}")]
    OutputConflict {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Encode backend error: {message}")]
    Backend { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using QuickEditError.
pub type QuickEditResult<T> = Result<T, QuickEditError>;

impl QuickEditError {
    pub fn project(msg: impl Into<String>) -> Self {
        Self::Project {
            message: msg.into(),
        }
    }

    pub fn source_unavailable(path: impl Into<PathBuf>, msg: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            path: path.into(),
            message: msg.into(),
        }
    }

    pub fn layer_render(msg: impl Into<String>) -> Self {
        Self::LayerRender {
            message: msg.into(),
        }
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_message_is_verbatim() {
        let err = QuickEditError::backend("ffmpeg exited with status 1: moov atom not found");
        assert_eq!(
            err.to_string(),
            "Encode backend error: ffmpeg exited with status 1: moov atom not found"
        );
    }

    #[test]
    fn test_output_conflict_keeps_path() {
        let err = QuickEditError::OutputConflict {
            path: PathBuf::from("/tmp/out.mp4"),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        };
        assert!(err.to_string().contains("/tmp/out.mp4"));
    }
}
