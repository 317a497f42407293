//! Error types for EMD operations
//!
//! Failures come in two tiers. [`EmdError`] is fatal: the call that produced it
//! returns no volume. [`MetadataIssue`] is recoverable: the reader logs it,
//! records it in the read outcome and carries on, so files written by older or
//! foreign tools without complete version metadata stay readable.

use std::fmt;
use thiserror::Error;

use crate::schema::CoordinateAxis;

/// Main error type for EMD operations
#[derive(Error, Debug)]
pub enum EmdError {
    /// A container, group, dataset or attribute primitive failed.
    #[error("Container I/O error: {0}")]
    Io(#[from] hdf5::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Type mismatch at {location}: expected {expected}, found {found}")]
    TypeMismatch {
        location: String,
        expected: String,
        found: String,
    },

    #[error("Unsupported element type: {0}")]
    UnsupportedType(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Invalid dimensions: {0}")]
    InvalidDimensions(String),

    /// One or more write steps failed. The file on disk is not conformant and
    /// must be rewritten from scratch.
    #[error("Write failed: {}", describe_failures(.0))]
    Write(Vec<StepFailure>),

    /// A soft metadata problem escalated by strict reading.
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataIssue),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Specialized Result type for EMD operations
pub type Result<T> = std::result::Result<T, EmdError>;

impl From<serde_json::Error> for EmdError {
    fn from(err: serde_json::Error) -> Self {
        EmdError::Serialization(err.to_string())
    }
}

/// Recoverable problem with a file's descriptive metadata.
#[derive(Error, Debug)]
pub enum MetadataIssue {
    #[error("attribute {node}:{name} is missing")]
    Missing { node: String, name: String },

    #[error("attribute {node}:{name} has type {found}, expected {expected}")]
    WrongType {
        node: String,
        name: String,
        expected: String,
        found: String,
    },

    #[error("attribute {node}:{name} is {found}, expected {expected}")]
    UnexpectedValue {
        node: String,
        name: String,
        expected: String,
        found: String,
    },

    #[error("attribute {node}:{name} could not be read: {reason}")]
    Unreadable {
        node: String,
        name: String,
        reason: String,
    },
}

impl MetadataIssue {
    /// Classify a failed attribute read as a metadata issue.
    pub fn from_attribute_error(node: &str, name: &str, err: EmdError) -> Self {
        let (node, name) = (node.to_string(), name.to_string());
        match err {
            EmdError::NotFound(_) => MetadataIssue::Missing { node, name },
            EmdError::TypeMismatch {
                expected, found, ..
            } => MetadataIssue::WrongType {
                node,
                name,
                expected,
                found,
            },
            other => MetadataIssue::Unreadable {
                node,
                name,
                reason: other.to_string(),
            },
        }
    }
}

/// One step of laying down an EMD file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStep {
    CreateContainer,
    RootGroup,
    VersionAttributes,
    DataGroup,
    TomographyGroup,
    GroupTypeAttribute,
    VolumeData,
    Coordinates(CoordinateAxis),
    CoordinateAttributes(CoordinateAxis),
    Close,
}

impl fmt::Display for WriteStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteStep::CreateContainer => write!(f, "create container"),
            WriteStep::RootGroup => write!(f, "open root group"),
            WriteStep::VersionAttributes => write!(f, "version attributes"),
            WriteStep::DataGroup => write!(f, "data group"),
            WriteStep::TomographyGroup => write!(f, "tomography group"),
            WriteStep::GroupTypeAttribute => write!(f, "emd_group_type attribute"),
            WriteStep::VolumeData => write!(f, "volume dataset"),
            WriteStep::Coordinates(axis) => write!(f, "coordinate dataset {}", axis.dataset()),
            WriteStep::CoordinateAttributes(axis) => {
                write!(f, "coordinate attributes of {}", axis.dataset())
            }
            WriteStep::Close => write!(f, "close container"),
        }
    }
}

/// A write step together with the error it produced.
#[derive(Debug)]
pub struct StepFailure {
    pub step: WriteStep,
    pub error: EmdError,
}

impl fmt::Display for StepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.step, self.error)
    }
}

fn describe_failures(failures: &[StepFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_error_classification() {
        let missing = MetadataIssue::from_attribute_error(
            "/",
            "version_major",
            EmdError::NotFound("/:version_major".to_string()),
        );
        assert!(matches!(missing, MetadataIssue::Missing { .. }));

        let wrong = MetadataIssue::from_attribute_error(
            "/",
            "version_minor",
            EmdError::TypeMismatch {
                location: "/:version_minor".to_string(),
                expected: "uint32".to_string(),
                found: "float32".to_string(),
            },
        );
        assert_eq!(
            wrong.to_string(),
            "attribute /:version_minor has type float32, expected uint32"
        );
    }

    #[test]
    fn test_write_error_lists_steps() {
        let err = EmdError::Write(vec![
            StepFailure {
                step: WriteStep::VolumeData,
                error: EmdError::InvalidDimensions("empty".to_string()),
            },
            StepFailure {
                step: WriteStep::Coordinates(CoordinateAxis::Y),
                error: EmdError::NotFound("/data/tomography".to_string()),
            },
        ]);
        let message = err.to_string();
        assert!(message.starts_with("Write failed: volume dataset"));
        assert!(message.contains("coordinate dataset dim2"));
    }
}
