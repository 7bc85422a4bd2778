//! NetCDF groups.

use purenetcdf_format::ObjId;

use crate::{DimId, GroupId, VarId};

/// One group of the file tree.
#[derive(Debug)]
pub struct NcGroup {
    /// Local name; empty for the root group.
    pub name: String,
    /// Parent group; `None` for the root.
    pub parent: Option<GroupId>,
    /// Child groups, in creation order.
    pub sub_groups: Vec<GroupId>,
    /// Dimensions declared in this group, in creation order.
    pub dimensions: Vec<DimId>,
    /// Variables declared in this group, in creation order.
    pub variables: Vec<VarId>,
    /// The backing HDF5 group.
    pub hdf: ObjId,
}

impl NcGroup {
    pub(crate) fn new(name: String, parent: Option<GroupId>, hdf: ObjId) -> Self {
        Self {
            name,
            parent,
            sub_groups: Vec::new(),
            dimensions: Vec::new(),
            variables: Vec::new(),
            hdf,
        }
    }
}
