//! Error types for the RIB translator.

use std::path::PathBuf;
use thiserror::Error;

/// Message severity used by the translator's message channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Main error type for translation operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Output RIB or script file cannot be created
    #[error("Cannot open output file {path}: {source}")]
    OutputFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Input file (scene, globals) does not exist or cannot be read
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Parent job id passed to `add_job` is not registered
    #[error("Unknown parent job id: {0}")]
    UnknownParentJob(u32),

    /// Malformed parameter declaration or type name
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Malformed frame sequence text
    #[error("Invalid frame sequence: {0}")]
    InvalidFrameSequence(String),

    /// Shader introspection arrays disagree with the parameter count
    #[error("Shader {shader}: {field} has {actual} entries, expected {expected}")]
    ShaderInfoMismatch {
        shader: String,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Ribgen module could not be loaded or its entry points resolved
    #[error("RIBGen '{path}' on object '{object}': {message}")]
    RibGen {
        path: String,
        object: String,
        message: String,
    },

    /// Scene lookup failed
    #[error("Scene node not found: {0}")]
    NodeNotFound(String),

    /// Invalid configuration value
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data structure
    #[error("Invalid structure: {0}")]
    InvalidStructure(String),

    /// User requested cancellation
    #[error("Translation cancelled")]
    Cancelled,

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }

    /// Wrap an I/O error raised while creating `path`.
    pub fn output(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::OutputFile { path: path.into(), source }
    }

    /// True for the cancellation signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Severity of the condition on the message channel.
    pub fn severity(&self) -> Severity {
        match self {
            Self::Cancelled => Severity::Info,
            Self::RibGen { .. } | Self::NodeNotFound(_) => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Result type alias for translation operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::UnknownParentJob(7);
        assert!(e.to_string().contains('7'));

        let e = Error::ShaderInfoMismatch {
            shader: "plastic".into(),
            field: "details",
            expected: 4,
            actual: 3,
        };
        let s = e.to_string();
        assert!(s.contains("plastic") && s.contains("details"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_output_error_names_path() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = Error::output("/tmp/out/frame.0001.rib", io_err);
        assert!(err.to_string().contains("frame.0001.rib"));
        assert_eq!(err.severity(), Severity::Error);
    }

    #[test]
    fn test_cancel_is_not_an_error_severity() {
        assert!(Error::Cancelled.is_cancelled());
        assert_eq!(Error::Cancelled.severity(), Severity::Info);
    }
}
