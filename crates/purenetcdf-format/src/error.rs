//! Error types for the HDF5 write pipeline.

use std::fmt;
use std::io;
use std::path::PathBuf;

/// Errors produced while defining or writing an HDF5 file.
///
/// All failures are fatal for the operation that raised them; nothing is
/// retried. Variants carry the offending object path and, where applicable,
/// the expected vs actual values.
#[derive(Debug)]
pub enum HdfError {
    /// A group, dataset, or attribute name violates the HDF5 name grammar.
    InvalidName {
        /// The rejected name.
        name: String,
        /// Where the name was being introduced, e.g. `dataset in group "/x"`.
        location: String,
    },
    /// A group already contains a child (sub-group or dataset) of this name.
    DuplicateChild {
        /// Path of the group.
        group: String,
        /// The colliding child name.
        name: String,
    },
    /// An object already carries an attribute of this name.
    DuplicateAttribute {
        /// Path of the group or dataset.
        path: String,
        /// The colliding attribute name.
        name: String,
    },
    /// The output file already exists and overwrite was not allowed.
    FileExists(PathBuf),
    /// An operation was attempted in the wrong file state.
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Explanation of the state requirement.
        detail: &'static str,
    },
    /// Chunk or layout declaration is inconsistent with the variable shape.
    InvalidLayout {
        /// Path of the dataset.
        path: String,
        /// Explanation.
        detail: String,
    },
    /// Declared element type does not match the supplied value type.
    TypeMismatch {
        /// Path of the dataset or attribute.
        path: String,
        /// The declared datatype name.
        expected: &'static str,
        /// The observed datatype name.
        actual: &'static str,
    },
    /// Data extents do not match the declared chunk or edge rectangle.
    ShapeMismatch {
        /// Path of the dataset or attribute.
        path: String,
        /// Explanation with the declared and observed extents.
        detail: String,
    },
    /// A chunk start index is out of range or not a multiple of the chunk shape.
    InvalidStartIndex {
        /// Path of the dataset.
        path: String,
        /// Explanation.
        detail: String,
    },
    /// The addressed chunk has already been written.
    ChunkAlreadyWritten {
        /// Path of the dataset.
        path: String,
        /// Start indices of the chunk.
        start_ixs: Vec<u64>,
    },
    /// `close` found data-carrying chunks that were never written.
    ChunksNotWritten {
        /// One line per missing chunk: path and start indices.
        missing: String,
    },
    /// The requested feature is deliberately unsupported.
    Unsupported {
        /// Path of the dataset or attribute.
        path: String,
        /// Explanation.
        detail: &'static str,
    },
    /// An attribute value has a shape the datatype does not support.
    InvalidAttrValue {
        /// Path of the attribute.
        path: String,
        /// Explanation.
        detail: String,
    },
    /// Underlying write, seek, or deflate failure. Fatal for the writer.
    Io(io::Error),
}

impl fmt::Display for HdfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HdfError::InvalidName { name, location } => {
                write!(f, "invalid name \"{name}\" for {location}")
            }
            HdfError::DuplicateChild { group, name } => {
                write!(
                    f,
                    "duplicate child: group \"{group}\" already contains a sub-group or dataset named \"{name}\""
                )
            }
            HdfError::DuplicateAttribute { path, name } => {
                write!(
                    f,
                    "duplicate attribute: \"{path}\" already contains an attribute named \"{name}\""
                )
            }
            HdfError::FileExists(path) => {
                write!(f, "file {} already exists", path.display())
            }
            HdfError::InvalidState { operation, detail } => {
                write!(f, "cannot {operation}: {detail}")
            }
            HdfError::InvalidLayout { path, detail } => {
                write!(f, "invalid layout for \"{path}\": {detail}")
            }
            HdfError::TypeMismatch {
                path,
                expected,
                actual,
            } => {
                write!(
                    f,
                    "type mismatch for \"{path}\": declared {expected}, got {actual}"
                )
            }
            HdfError::ShapeMismatch { path, detail } => {
                write!(f, "shape mismatch for \"{path}\": {detail}")
            }
            HdfError::InvalidStartIndex { path, detail } => {
                write!(f, "invalid start indices for \"{path}\": {detail}")
            }
            HdfError::ChunkAlreadyWritten { path, start_ixs } => {
                write!(
                    f,
                    "chunk has already been written: \"{path}\" start indices {start_ixs:?}"
                )
            }
            HdfError::ChunksNotWritten { missing } => {
                write!(
                    f,
                    "close: the following dataset chunks still need to be written:\n{missing}"
                )
            }
            HdfError::Unsupported { path, detail } => {
                write!(f, "unsupported for \"{path}\": {detail}")
            }
            HdfError::InvalidAttrValue { path, detail } => {
                write!(f, "invalid attribute value for \"{path}\": {detail}")
            }
            HdfError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for HdfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HdfError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for HdfError {
    fn from(e: io::Error) -> Self {
        HdfError::Io(e)
    }
}

/// Checks a group, dataset, or attribute name against the HDF5 grammar
/// accepted by this writer: `[_A-Za-z][-_: A-Za-z0-9]*`.
pub fn check_name(name: &str, location: &str) -> Result<(), HdfError> {
    let mut chars = name.chars();
    let head_ok = matches!(chars.next(), Some(c) if c == '_' || c.is_ascii_alphabetic());
    let tail_ok = chars.all(|c| {
        c == '-' || c == '_' || c == ':' || c == ' ' || c.is_ascii_alphanumeric()
    });
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(HdfError::InvalidName {
            name: name.to_string(),
            location: location.to_string(),
        })
    }
}
