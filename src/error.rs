//! Recoverable errors.
//!
//! Broken preconditions (bad indices, shape mismatches, malformed parameter
//! settings) are programming errors and panic at the call site. Everything in
//! this module is an environment failure the caller can catch: a file that cannot
//! be opened, a matrix file with a bad header, a truncated or unparsable body.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot write into output file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot read from file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid {what} {value} in the file {}. Must be non-negative.", path.display())]
    InvalidDimension {
        path: PathBuf,
        what: &'static str,
        value: i64,
    },

    #[error("The file {} is truncated, found {read} of {expected} expected items", path.display())]
    Truncated {
        path: PathBuf,
        expected: usize,
        read: usize,
    },

    #[error("Cannot parse {token:?} in the file {}", path.display())]
    Parse { path: PathBuf, token: String },

    #[error("The file {} ended unexpectedly", path.display())]
    UnexpectedEnd { path: PathBuf },

    #[error("The matrix in the file {} is {rows}x{cols}, a symmetric matrix must be square", path.display())]
    NotSquare {
        path: PathBuf,
        rows: usize,
        cols: usize,
    },

    #[error(
        "The matrix in the file {} is not symmetric! The element ({row},{col}) is {found} while the element ({col},{row}) is {expected}",
        path.display()
    )]
    NotSymmetric {
        path: PathBuf,
        row: usize,
        col: usize,
        found: String,
        expected: String,
    },

    #[error("Resume file {} is corrupt or not complete (code {code})", path.display())]
    CorruptResume { path: PathBuf, code: i32 },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn write(path: &Path, source: std::io::Error) -> Self {
        Error::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn read(path: &Path, source: std::io::Error) -> Self {
        Error::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    /// The file the error refers to.
    pub fn path(&self) -> &Path {
        match self {
            Error::Write { path, .. }
            | Error::Read { path, .. }
            | Error::InvalidDimension { path, .. }
            | Error::Truncated { path, .. }
            | Error::Parse { path, .. }
            | Error::UnexpectedEnd { path }
            | Error::NotSquare { path, .. }
            | Error::NotSymmetric { path, .. }
            | Error::CorruptResume { path, .. } => path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_file() {
        let err = Error::InvalidDimension {
            path: PathBuf::from("/tmp/m.dat"),
            what: "number of rows",
            value: -3,
        };
        let msg = err.to_string();
        assert!(msg.contains("/tmp/m.dat"), "{msg}");
        assert!(msg.contains("-3"), "{msg}");
        assert_eq!(err.path(), Path::new("/tmp/m.dat"));
    }

    #[test]
    fn io_errors_keep_their_source() {
        use std::error::Error as _;
        let err = Error::read(
            Path::new("missing.txt"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.source().is_some());
        assert!(err.to_string().contains("missing.txt"));
    }
}
