//! Pure-Rust NetCDF-4 writer.
//!
//! Models a scientific dataset as a tree of groups holding named
//! dimensions, typed multi-dimensional variables, and attributes, and
//! serializes it as an HDF5 file readable by any NetCDF-4 implementation.
//!
//! The writer is two-phase: during *definition* the tree is built; after
//! [`NcFileWriter::end_define`] the schema is frozen, dimension scales and
//! the `CLASS` / `NAME` / `DIMENSION_LIST` / `REFERENCE_LIST` convention
//! attributes are in place, and chunk data may be written; [`NcFileWriter::close`]
//! finalizes the metadata.
//!
//! # Example
//!
//! ```no_run
//! use purenetcdf::{ArrayData, ArrayValues, NcFileWriter, NcOptions, NcType};
//!
//! let mut file = NcFileWriter::create("out.nc", NcOptions::default()).unwrap();
//! let root = file.root_group();
//! let t = file.add_dimension(root, "t", 3).unwrap();
//! let v = file
//!     .add_variable(root, "speed", NcType::Float, Some(&[t]), None, None, 0)
//!     .unwrap();
//! file.end_define().unwrap();
//! file.write(
//!     v,
//!     None,
//!     &ArrayData::new(ArrayValues::Floats(vec![0.5, 1.5, 2.5]), &[3]),
//!     false,
//! )
//! .unwrap();
//! file.close().unwrap();
//! ```

pub mod dimension;
pub mod error;
pub mod group;
pub mod types;
pub mod variable;

use std::path::Path;

use log::debug;

pub use dimension::NcDimension;
pub use error::Error;
pub use group::NcGroup;
pub use purenetcdf_format::{
    ArrayData, ArrayValues, AttrData, Dtype, FileStatus, FillValue, HdfError,
};
pub use types::{NcAttrValue, NcType};
pub use variable::{text_array, NcVariable};

use purenetcdf_format::error::check_name;
use purenetcdf_format::{FileOptions, FileWriter, ObjId};

/// Index of a group in the file tree.
pub type GroupId = usize;
/// Index of a dimension in the file tree.
pub type DimId = usize;
/// Index of a variable in the file tree.
pub type VarId = usize;

/// Software version reported by this writer.
pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// The placeholder `NAME` prefix for a dimension without a coordinate
/// variable, as written by the C NetCDF-4 library.
const DIM_WITHOUT_VARIABLE: &str = "This is a netCDF dimension but not a netCDF variable.";

/// Options for [`NcFileWriter::create`].
#[derive(Debug, Clone, Default)]
pub struct NcOptions {
    /// Replace an existing file instead of failing.
    pub overwrite: bool,
    /// Modification time in milliseconds since the epoch; 0 means "now".
    pub utc_mod_time_ms: u64,
}

/// An open NetCDF-4 output file. There is exactly one writer per file.
pub struct NcFileWriter {
    hdf: FileWriter,
    groups: Vec<NcGroup>,
    dimensions: Vec<NcDimension>,
    variables: Vec<NcVariable>,
    root: GroupId,
}

impl NcFileWriter {
    /// Create a new NetCDF-4 output file.
    pub fn create<P: AsRef<Path>>(path: P, options: NcOptions) -> Result<Self, Error> {
        let hdf = FileWriter::create(
            path,
            FileOptions {
                allow_overwrite: options.overwrite,
                utc_mod_time_ms: options.utc_mod_time_ms,
            },
        )?;
        let root_hdf = hdf.root_group();
        let groups = vec![NcGroup::new(String::new(), None, root_hdf)];
        Ok(Self {
            hdf,
            groups,
            dimensions: Vec::new(),
            variables: Vec::new(),
            root: 0,
        })
    }

    /// The root group.
    pub fn root_group(&self) -> GroupId {
        self.root
    }

    /// Current lifecycle state.
    pub fn status(&self) -> FileStatus {
        self.hdf.status()
    }

    /// The output file path.
    pub fn path(&self) -> &Path {
        self.hdf.path()
    }

    /// Borrow a group node.
    pub fn group(&self, id: GroupId) -> &NcGroup {
        &self.groups[id]
    }

    /// Borrow a dimension node.
    pub fn dimension(&self, id: DimId) -> &NcDimension {
        &self.dimensions[id]
    }

    /// Borrow a variable node.
    pub fn variable(&self, id: VarId) -> &NcVariable {
        &self.variables[id]
    }

    /// The underlying HDF5 writer, for byte-level inspection.
    pub fn hdf_writer(&self) -> &FileWriter {
        &self.hdf
    }

    /// Full path of a group, e.g. `/forecast`.
    pub fn group_path(&self, id: GroupId) -> String {
        self.hdf.object_path(self.groups[id].hdf)
    }

    /// Full path of a variable, e.g. `/forecast/temperature`.
    pub fn variable_path(&self, id: VarId) -> String {
        self.hdf.object_path(self.variables[id].hdf)
    }

    fn require_defining(&self, operation: &'static str) -> Result<(), Error> {
        if self.hdf.status() != FileStatus::Defining {
            return Err(Error::InvalidState {
                operation,
                detail: "definition is closed after end_define",
            });
        }
        Ok(())
    }

    /// Create a sub-group.
    pub fn add_group(&mut self, parent: GroupId, name: &str) -> Result<GroupId, Error> {
        self.require_defining("add group")?;
        let hdf = self.hdf.add_group(self.groups[parent].hdf, name)?;
        let id = self.groups.len();
        self.groups.push(NcGroup::new(name.to_string(), Some(parent), hdf));
        self.groups[parent].sub_groups.push(id);
        Ok(id)
    }

    /// Declare a dimension in a group.
    pub fn add_dimension(
        &mut self,
        group: GroupId,
        name: &str,
        len: u64,
    ) -> Result<DimId, Error> {
        self.require_defining("add dimension")?;
        check_name(name, &format!("dimension in group \"{}\"", self.group_path(group)))?;
        if len == 0 {
            return Err(Error::InvalidDimension {
                name: name.to_string(),
                detail: "length must be positive".to_string(),
            });
        }
        if self.groups[group]
            .dimensions
            .iter()
            .any(|&d| self.dimensions[d].name == name)
        {
            return Err(Error::InvalidDimension {
                name: name.to_string(),
                detail: format!(
                    "group \"{}\" already declares this dimension",
                    self.group_path(group)
                ),
            });
        }

        let id = self.dimensions.len();
        self.dimensions.push(NcDimension::new(name.to_string(), len, group));
        self.groups[group].dimensions.push(id);
        Ok(id)
    }

    /// Resolve a dimension name through a group and its ancestors.
    pub fn find_ancestor_dimension(&self, group: GroupId, name: &str) -> Option<DimId> {
        let mut cur = Some(group);
        while let Some(g) = cur {
            for &d in &self.groups[g].dimensions {
                if self.dimensions[d].name == name {
                    return Some(d);
                }
            }
            cur = self.groups[g].parent;
        }
        None
    }

    /// Declare a variable.
    ///
    /// `dims` of `None` declares a data-less attribute carrier; an empty
    /// slice declares a scalar. Every dimension must resolve through the
    /// parent chain. A variable named like an ancestor dimension becomes
    /// that dimension's coordinate variable.
    #[allow(clippy::too_many_arguments)]
    pub fn add_variable(
        &mut self,
        group: GroupId,
        name: &str,
        nc_type: NcType,
        dims: Option<&[DimId]>,
        chunk_lens: Option<&[u64]>,
        fill_value: Option<FillValue>,
        compression_level: u32,
    ) -> Result<VarId, Error> {
        self.require_defining("add variable")?;

        // Every named dimension must be the one visible from this group.
        if let Some(dims) = dims {
            for &d in dims {
                let found = self.find_ancestor_dimension(group, &self.dimensions[d].name);
                if found != Some(d) {
                    return Err(Error::DimensionNotFound {
                        var: name.to_string(),
                        dim: self.dimensions[d].name.clone(),
                    });
                }
            }
        }

        if compression_level > 0 && nc_type == NcType::String {
            return Err(Error::InvalidValue {
                path: name.to_string(),
                detail: "variable-length strings cannot be compressed".to_string(),
            });
        }

        let dtype = nc_type.to_dtype();
        let stg_field_len = if nc_type == NcType::Char { 1 } else { 0 };
        let fill_value = match (nc_type, fill_value) {
            (NcType::Char, Some(FillValue::Str(s))) => {
                if s.len() > 1 {
                    return Err(Error::InvalidValue {
                        path: name.to_string(),
                        detail: "char fill value must be a string of length 0 or 1".to_string(),
                    });
                }
                Some(FillValue::Str(s))
            }
            (_, f) => f,
        };

        let dim_lens: Option<Vec<u64>> =
            dims.map(|ds| ds.iter().map(|&d| self.dimensions[d].len).collect());

        let hdf = self.hdf.add_variable(
            self.groups[group].hdf,
            name,
            dtype,
            stg_field_len,
            dim_lens.as_deref(),
            chunk_lens,
            fill_value,
            compression_level,
        )?;

        let id = self.variables.len();
        self.variables.push(NcVariable {
            name: name.to_string(),
            nc_type,
            dims: dims.map(|d| d.to_vec()),
            parent: group,
            compression_level,
            hdf,
        });
        self.groups[group].variables.push(id);

        // A variable named like any visible dimension is that dimension's
        // coordinate variable.
        if let Some(d) = self.find_ancestor_dimension(group, name) {
            debug!("coordinate variable \"{name}\" for dimension {d}");
            self.dimensions[d].coord_var = Some(id);
        }

        // Record us with every dimension we use.
        if let Some(dims) = dims {
            for &d in dims {
                self.dimensions[d].ref_list.push(id);
            }
        }

        Ok(id)
    }

    /// Attach an attribute to a group.
    pub fn add_group_attribute(
        &mut self,
        group: GroupId,
        name: &str,
        value: NcAttrValue,
    ) -> Result<(), Error> {
        self.require_defining("add attribute")?;
        let (dtype, data) = value.into_parts();
        let hdf_id = self.groups[group].hdf;
        self.hdf.add_attribute(hdf_id, name, dtype, 0, data)?;
        Ok(())
    }

    /// Attach an attribute to a variable.
    pub fn add_variable_attribute(
        &mut self,
        var: VarId,
        name: &str,
        value: NcAttrValue,
    ) -> Result<(), Error> {
        self.require_defining("add attribute")?;
        let (dtype, data) = value.into_parts();
        let hdf_id = self.variables[var].hdf;
        self.hdf.add_attribute(hdf_id, name, dtype, 0, data)?;
        Ok(())
    }

    /// Whether a variable carries an attribute of the given name.
    pub fn attribute_exists(&self, var: VarId, name: &str) -> bool {
        self.hdf.attribute_exists(self.variables[var].hdf, name)
    }

    /// End the definition phase.
    ///
    /// Materializes the dimension scales, attaches the NetCDF-4 convention
    /// attributes, lays out the metadata (pass 1), and writes the
    /// zero-filled data of every dimension without a coordinate variable.
    pub fn end_define(&mut self) -> Result<(), Error> {
        self.require_defining("end_define")?;
        debug!("end_define: path {:?}", self.path());

        // For each dimension: ensure an HDF5 dataset represents it, and
        // attach the dimension-scale attributes to that dataset.
        for dim_id in 0..self.dimensions.len() {
            let (name, len, parent_group, coord_var) = {
                let d = &self.dimensions[dim_id];
                (d.name.clone(), d.len, d.parent, d.coord_var)
            };

            let (hdf_dim_var, name_attr) = match coord_var {
                None => {
                    let hdf = self.hdf.add_variable(
                        self.groups[parent_group].hdf,
                        &name,
                        Dtype::Float32,
                        0,
                        Some(&[len]),
                        None,
                        Some(FillValue::Float(0.0)),
                        0,
                    )?;
                    (hdf, format!("{DIM_WITHOUT_VARIABLE}{len:>10}\0"))
                }
                Some(v) => (self.variables[v].hdf, name.clone()),
            };
            self.dimensions[dim_id].hdf_dim_var = Some(hdf_dim_var);

            self.hdf.add_attribute(
                hdf_dim_var,
                "CLASS",
                Dtype::StringFix,
                0,
                AttrData::Str("DIMENSION_SCALE\0".to_string()),
            )?;
            self.hdf.add_attribute(
                hdf_dim_var,
                "NAME",
                Dtype::StringFix,
                0,
                AttrData::Str(name_attr),
            )?;

            // Back references from the scale to its users, skipped when
            // the only user is the dimension's own coordinate variable.
            let ref_list = self.dimensions[dim_id].ref_list.clone();
            let only_self_ref =
                ref_list.len() == 1 && self.variables[ref_list[0]].name == name;
            if !ref_list.is_empty() && !only_self_ref {
                let refs: Vec<ObjId> =
                    ref_list.iter().map(|&v| self.variables[v].hdf).collect();
                self.hdf.add_attribute(
                    hdf_dim_var,
                    "REFERENCE_LIST",
                    Dtype::Compound,
                    0,
                    AttrData::Refs(refs),
                )?;
            }
        }

        // For each variable of rank > 0: the per-axis dimension list,
        // skipped for a rank-1 coordinate variable pointing at itself.
        for var_id in 0..self.variables.len() {
            let dims = match &self.variables[var_id].dims {
                Some(d) if !d.is_empty() => d.clone(),
                _ => continue,
            };

            let mut coord_dim: Option<DimId> = None;
            let mut rows: Vec<Vec<ObjId>> = Vec::with_capacity(dims.len());
            for &d in &dims {
                if self.dimensions[d].coord_var.is_some() {
                    coord_dim = Some(d);
                }
                rows.push(vec![self.dimensions[d].hdf_dim_var.expect("scale set above")]);
            }

            let is_own_coord = dims.len() == 1
                && coord_dim
                    .map(|d| self.dimensions[d].name == self.variables[var_id].name)
                    .unwrap_or(false);
            if !is_own_coord {
                let hdf_id = self.variables[var_id].hdf;
                self.hdf.add_attribute(
                    hdf_id,
                    "DIMENSION_LIST",
                    Dtype::Vlen,
                    0,
                    AttrData::VlenRefs(rows),
                )?;
            }
        }

        self.hdf.end_define()?;

        // Write the zero-filled data of every synthesized dimension scale.
        for dim_id in 0..self.dimensions.len() {
            if self.dimensions[dim_id].coord_var.is_some() {
                continue;
            }
            let len = self.dimensions[dim_id].len;
            let hdf_var = self.dimensions[dim_id].hdf_dim_var.expect("scale set above");
            let zeros = ArrayData::new(ArrayValues::Floats(vec![0.0; len as usize]), &[len]);
            self.hdf.write_data(hdf_var, None, &zeros, false)?;
        }
        Ok(())
    }

    /// Write one chunk (or the whole value) of a variable.
    ///
    /// `Char` variables take length-1 strings; see [`text_array`] for
    /// building them from flat text.
    pub fn write(
        &mut self,
        var: VarId,
        start_ixs: Option<&[u64]>,
        data: &ArrayData,
        linear: bool,
    ) -> Result<(), Error> {
        let hdf_id = self.variables[var].hdf;
        self.hdf.write_data(hdf_id, start_ixs, data, linear)?;
        Ok(())
    }

    /// Finalize the metadata and close the file.
    pub fn close(&mut self) -> Result<(), Error> {
        debug!("close: path {:?}", self.path());
        self.hdf.close()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_path(name: &str) -> PathBuf {
        tempfile::Builder::new()
            .prefix(name)
            .tempdir()
            .unwrap()
            .keep()
            .join("out.nc")
    }

    #[test]
    fn dimensions_resolve_through_ancestors() {
        let path = temp_path("ancestors");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        let time = file.add_dimension(root, "time", 4).unwrap();
        let sub = file.add_group(root, "model").unwrap();
        // A dimension from the parent group is visible in the child.
        let v = file
            .add_variable(sub, "t2m", NcType::Float, Some(&[time]), None, None, 0)
            .unwrap();
        assert_eq!(file.variable(v).rank(), 1);
        assert_eq!(file.variable_path(v), "/model/t2m");
    }

    #[test]
    fn foreign_dimension_rejected() {
        let path = temp_path("foreign");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        let sub = file.add_group(root, "a").unwrap();
        let d = file.add_dimension(sub, "x", 3).unwrap();
        // "x" lives in /a, not visible from the root.
        assert!(matches!(
            file.add_variable(root, "v", NcType::Float, Some(&[d]), None, None, 0),
            Err(Error::DimensionNotFound { .. })
        ));
    }

    #[test]
    fn coordinate_variable_is_detected() {
        let path = temp_path("coord");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        let x = file.add_dimension(root, "x", 3).unwrap();
        let v = file
            .add_variable(root, "x", NcType::Float, Some(&[x]), None, None, 0)
            .unwrap();
        assert_eq!(file.dimension(x).coord_var, Some(v));
    }

    #[test]
    fn duplicate_dimension_rejected() {
        let path = temp_path("dupdim");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        file.add_dimension(root, "x", 3).unwrap();
        assert!(matches!(
            file.add_dimension(root, "x", 5),
            Err(Error::InvalidDimension { .. })
        ));
        assert!(matches!(
            file.add_dimension(root, "y", 0),
            Err(Error::InvalidDimension { .. })
        ));
    }

    #[test]
    fn string_compression_rejected() {
        let path = temp_path("strcomp");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        let t = file.add_dimension(root, "t", 3).unwrap();
        assert!(matches!(
            file.add_variable(root, "s", NcType::String, Some(&[t]), Some(&[3]), None, 5),
            Err(Error::InvalidValue { .. })
        ));
    }

    #[test]
    fn define_after_end_define_fails() {
        let path = temp_path("frozen");
        let mut file = NcFileWriter::create(&path, NcOptions::default()).unwrap();
        let root = file.root_group();
        file.end_define().unwrap();
        assert!(matches!(
            file.add_dimension(root, "x", 1),
            Err(Error::InvalidState { .. })
        ));
        assert!(matches!(file.end_define(), Err(Error::InvalidState { .. })));
    }
}
