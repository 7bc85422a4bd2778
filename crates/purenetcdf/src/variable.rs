//! NetCDF variables.

use purenetcdf_format::{ArrayData, ArrayValues, ObjId};

use crate::types::NcType;
use crate::{DimId, GroupId};

/// One variable of the file.
#[derive(Debug)]
pub struct NcVariable {
    /// Variable name.
    pub name: String,
    /// Declared NetCDF type.
    pub nc_type: NcType,
    /// Shared dimensions; `None` for a no-data attribute carrier, empty
    /// for a scalar.
    pub dims: Option<Vec<DimId>>,
    /// Owning group.
    pub parent: GroupId,
    /// DEFLATE level 0-9.
    pub compression_level: u32,
    /// The backing HDF5 dataset.
    pub hdf: ObjId,
}

impl NcVariable {
    /// Variable rank (0 for scalars and no-data carriers).
    pub fn rank(&self) -> usize {
        self.dims.as_ref().map_or(0, |d| d.len())
    }
}

/// Split a flat character string into the length-1 strings a `Char`
/// variable stores, padding missing trailing positions with empty
/// strings. `dims` is the rectangle being written.
pub fn text_array(dims: &[u64], text: &str) -> ArrayData {
    let want: u64 = dims.iter().product();
    let mut cells: Vec<String> = text.chars().map(|c| c.to_string()).collect();
    cells.truncate(want as usize);
    while (cells.len() as u64) < want {
        cells.push(String::new());
    }
    ArrayData::new(ArrayValues::Strings(cells), dims)
}
