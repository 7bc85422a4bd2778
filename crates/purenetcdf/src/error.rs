//! Error types for the NetCDF-4 writer.

use std::fmt;

use purenetcdf_format::HdfError;

/// Errors raised by the NetCDF-4 convention layer.
#[derive(Debug)]
pub enum Error {
    /// Low-level HDF5 serializer error.
    Hdf(HdfError),
    /// A variable references a dimension that is not defined in its group
    /// or any ancestor group.
    DimensionNotFound {
        /// The variable being defined.
        var: String,
        /// The unresolved dimension name.
        dim: String,
    },
    /// A dimension was declared with an illegal length or duplicate name.
    InvalidDimension {
        /// The dimension name.
        name: String,
        /// Explanation.
        detail: String,
    },
    /// An operation was attempted in the wrong file state.
    InvalidState {
        /// What was attempted.
        operation: &'static str,
        /// Explanation of the state requirement.
        detail: &'static str,
    },
    /// A value does not suit the declared NetCDF type.
    InvalidValue {
        /// Path of the variable or attribute.
        path: String,
        /// Explanation.
        detail: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Hdf(e) => write!(f, "HDF5 error: {e}"),
            Error::DimensionNotFound { var, dim } => {
                write!(f, "dimension \"{dim}\" not found for variable \"{var}\"")
            }
            Error::InvalidDimension { name, detail } => {
                write!(f, "invalid dimension \"{name}\": {detail}")
            }
            Error::InvalidState { operation, detail } => {
                write!(f, "cannot {operation}: {detail}")
            }
            Error::InvalidValue { path, detail } => {
                write!(f, "invalid value for \"{path}\": {detail}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Hdf(e) => Some(e),
            _ => None,
        }
    }
}

impl From<HdfError> for Error {
    fn from(e: HdfError) -> Self {
        Error::Hdf(e)
    }
}
