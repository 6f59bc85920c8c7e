//! Unified error type for gridsplit
//!
//! [`GridError`] covers every failure the compilation pipeline can surface.
//! All of them are fatal for the call that produced them: malformed shapes
//! are reported immediately, numeric degeneracies (zero reactance, zero
//! power factor) are handled with epsilon guards and never show up here.
//!
//! # Example
//!
//! ```ignore
//! use gridsplit_core::{GridError, GridResult};
//!
//! fn compile(store: &ElementStore) -> GridResult<()> {
//!     store.validate()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Unified error type for all gridsplit operations.
#[derive(Error, Debug)]
pub enum GridError {
    /// Array or matrix dimensions disagree with the declared element counts
    #[error("Shape mismatch in {what}: expected {expected}, found {found}")]
    Shape {
        what: String,
        expected: String,
        found: String,
    },

    /// An element references a bus, branch or time step that does not exist
    #[error("Index out of range in {what}: {index} >= {len}")]
    IndexOutOfRange {
        what: String,
        index: usize,
        len: usize,
    },

    /// I/O errors (config files)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing/deserialization errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic errors (for wrapping external errors)
    #[error("{0}")]
    Other(String),
}

impl GridError {
    /// Shape mismatch between an expected and an actual length.
    pub fn shape(what: impl Into<String>, expected: usize, found: usize) -> Self {
        GridError::Shape {
            what: what.into(),
            expected: expected.to_string(),
            found: found.to_string(),
        }
    }

    /// Shape mismatch between two `(rows, cols)` matrix shapes.
    pub fn matrix_shape(
        what: impl Into<String>,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Self {
        GridError::Shape {
            what: what.into(),
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }
}

/// Convenience type alias for Results using GridError.
pub type GridResult<T> = Result<T, GridError>;

/// Fail with [`GridError::Shape`] unless `found == expected`.
pub fn ensure_len(what: &str, expected: usize, found: usize) -> GridResult<()> {
    if expected == found {
        Ok(())
    } else {
        Err(GridError::shape(what, expected, found))
    }
}

/// Fail with [`GridError::IndexOutOfRange`] on the first index `>= len`.
pub fn ensure_indices(what: &str, idx: &[usize], len: usize) -> GridResult<()> {
    match idx.iter().find(|&&i| i >= len) {
        Some(&index) => Err(GridError::IndexOutOfRange {
            what: what.to_string(),
            index,
            len,
        }),
        None => Ok(()),
    }
}

// Conversion from anyhow::Error
impl From<anyhow::Error> for GridError {
    fn from(err: anyhow::Error) -> Self {
        GridError::Other(err.to_string())
    }
}

impl From<String> for GridError {
    fn from(s: String) -> Self {
        GridError::Other(s)
    }
}

impl From<&str> for GridError {
    fn from(s: &str) -> Self {
        GridError::Other(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_error_display() {
        let err = GridError::shape("branch.x", 3, 2);
        let msg = err.to_string();
        assert!(msg.contains("branch.x"));
        assert!(msg.contains("expected 3"));
        assert!(msg.contains("found 2"));
    }

    #[test]
    fn test_matrix_shape_display() {
        let err = GridError::matrix_shape("Ct", (4, 3), (4, 2));
        assert!(err.to_string().contains("4x3"));
        assert!(err.to_string().contains("4x2"));
    }

    #[test]
    fn test_ensure_len() {
        assert!(ensure_len("bus.vmin", 5, 5).is_ok());
        assert!(matches!(
            ensure_len("bus.vmin", 5, 4),
            Err(GridError::Shape { .. })
        ));
    }

    #[test]
    fn test_ensure_indices_reports_first_offender() {
        assert!(ensure_indices("load.bus", &[0, 2, 1], 3).is_ok());
        assert!(ensure_indices("load.bus", &[], 0).is_ok());
        assert!(matches!(
            ensure_indices("load.bus", &[0, 4, 7], 3),
            Err(GridError::IndexOutOfRange { index: 4, len: 3, .. })
        ));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GridError = io_err.into();
        assert!(matches!(err, GridError::Io(_)));
    }

    #[test]
    fn test_anyhow_conversion() {
        let err: GridError = anyhow::anyhow!("loader failed").into();
        assert_eq!(err.to_string(), "loader failed");
    }
}
