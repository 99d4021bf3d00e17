//! Error types for pkgdelta-core

use thiserror::Error;

/// Result type alias for pkgdelta operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for pkgdelta operations
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing or dumping error
    #[error("YAML error: {0}")]
    Yaml(String),

    /// JSON parsing error (API dumps)
    #[error("JSON error: {0}")]
    Json(String),

    /// Git operation error
    #[error("Git error: {0}")]
    Git(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Changelog action failed validation
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Version string could not be parsed
    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    /// No release action recorded for the requested version
    #[error("couldn't find a release for {0}")]
    ReleaseNotFound(String),

    /// Release action exists but has no pull request reference
    #[error("release action for {0} is missing its pr")]
    ReleaseMissingPr(String),

    /// Archiving changelog files failed
    #[error("Archive error: {0}")]
    Archive(String),
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::Yaml(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err.to_string())
    }
}

impl From<git2::Error> for Error {
    fn from(err: git2::Error) -> Self {
        Error::Git(err.message().to_string())
    }
}

/// Fieldless error category for cheap pattern matching.
///
/// Single byte representation (`#[repr(u8)]`), `Copy`, no allocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorKind {
    /// I/O operation error
    Io,
    /// YAML error
    Yaml,
    /// JSON error
    Json,
    /// Git operation error
    Git,
    /// Configuration error
    Config,
    /// Action validation error
    InvalidAction,
    /// Version parse error
    InvalidVersion,
    /// Release lookup failed
    ReleaseNotFound,
    /// Release without pr
    ReleaseMissingPr,
    /// Archive error
    Archive,
}

impl Error {
    /// Get the error kind, zero allocation.
    #[inline]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_) => ErrorKind::Io,
            Error::Yaml(_) => ErrorKind::Yaml,
            Error::Json(_) => ErrorKind::Json,
            Error::Git(_) => ErrorKind::Git,
            Error::Config(_) => ErrorKind::Config,
            Error::InvalidAction(_) => ErrorKind::InvalidAction,
            Error::InvalidVersion(_) => ErrorKind::InvalidVersion,
            Error::ReleaseNotFound(_) => ErrorKind::ReleaseNotFound,
            Error::ReleaseMissingPr(_) => ErrorKind::ReleaseMissingPr,
            Error::Archive(_) => ErrorKind::Archive,
        }
    }

    /// Borrow the error message, zero allocation.
    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Error::Yaml(msg)
            | Error::Json(msg)
            | Error::Git(msg)
            | Error::Config(msg)
            | Error::InvalidAction(msg)
            | Error::InvalidVersion(msg)
            | Error::ReleaseNotFound(msg)
            | Error::ReleaseMissingPr(msg)
            | Error::Archive(msg) => msg,
            Error::Io(_) => "I/O error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_is_copy() {
        let err = Error::Git("test".to_string());
        let k = err.kind();
        let k2 = k;
        assert_eq!(k, k2);
    }

    #[test]
    fn test_error_kind_repr_u8() {
        assert_eq!(std::mem::size_of::<ErrorKind>(), 1);
    }

    #[test]
    fn test_error_message_borrows() {
        let err = Error::InvalidAction("group required".to_string());
        let msg: &str = err.message();
        assert_eq!(msg, "group required");
    }

    #[test]
    fn test_all_error_variants_have_kind() {
        let cases: Vec<(Error, ErrorKind)> = vec![
            (Error::Io(std::io::Error::other("io")), ErrorKind::Io),
            (Error::Yaml("y".into()), ErrorKind::Yaml),
            (Error::Json("j".into()), ErrorKind::Json),
            (Error::Git("g".into()), ErrorKind::Git),
            (Error::Config("c".into()), ErrorKind::Config),
            (Error::InvalidAction("a".into()), ErrorKind::InvalidAction),
            (Error::InvalidVersion("v".into()), ErrorKind::InvalidVersion),
            (Error::ReleaseNotFound("1.0.0".into()), ErrorKind::ReleaseNotFound),
            (
                Error::ReleaseMissingPr("1.0.0".into()),
                ErrorKind::ReleaseMissingPr,
            ),
            (Error::Archive("ar".into()), ErrorKind::Archive),
        ];

        for (err, expected_kind) in cases {
            assert_eq!(err.kind(), expected_kind, "Mismatch for {:?}", err);
        }
    }

    #[test]
    fn test_release_not_found_display() {
        let err = Error::ReleaseNotFound("1.2.3".into());
        assert_eq!(err.to_string(), "couldn't find a release for 1.2.3");
    }

    #[test]
    fn test_yaml_error_conversion() {
        let parsed: std::result::Result<Vec<u32>, _> = serde_yaml::from_str("[1, two");
        let err: Error = parsed.unwrap_err().into();
        assert_eq!(err.kind(), ErrorKind::Yaml);
    }
}
