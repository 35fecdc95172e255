//! Import errors

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

/// Errors surfaced by [`SegmentEnumerator`](crate::SegmentEnumerator)
///
/// Malformed marker data is never an error; only problems that make the
/// requested text unavailable are reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportError {
    /// A file needed for the requested range could not be opened or read
    FileAccess {
        path: PathBuf,
        kind: io::ErrorKind,
        message: String,
    },

    /// A writing system names a converter the registry does not know
    EncodingConverterNotFound {
        writing_system: String,
        converter: String,
    },
}

impl ImportError {
    pub fn file_access(path: &Path, err: &io::Error) -> Self {
        ImportError::FileAccess {
            path: path.to_path_buf(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    pub fn is_file_access(&self) -> bool {
        matches!(self, ImportError::FileAccess { .. })
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImportError::FileAccess { path, message, .. } => {
                write!(f, "Cannot read import file '{}': {}", path.display(), message)
            }
            ImportError::EncodingConverterNotFound { writing_system, converter } => {
                write!(
                    f,
                    "Encoding converter '{}' for writing system '{}' is not installed",
                    converter, writing_system
                )
            }
        }
    }
}

impl std::error::Error for ImportError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_access_from_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "gone");
        let err = ImportError::file_access(Path::new("/tmp/EPH.sfm"), &io_err);
        assert!(err.is_file_access());
        assert!(err.to_string().contains("/tmp/EPH.sfm"));
        assert!(err.to_string().contains("gone"));
        match err {
            ImportError::FileAccess { kind, .. } => assert_eq!(kind, io::ErrorKind::NotFound),
            _ => panic!("expected FileAccess"),
        }
    }

    #[test]
    fn test_converter_not_found_message() {
        let err = ImportError::EncodingConverterNotFound {
            writing_system: "xkal".to_string(),
            converter: "SIL-Kal".to_string(),
        };
        assert!(!err.is_file_access());
        assert_eq!(
            err.to_string(),
            "Encoding converter 'SIL-Kal' for writing system 'xkal' is not installed"
        );
    }
}
