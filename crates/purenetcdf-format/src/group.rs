//! Groups and datasets: the object arena and header assembly.
//!
//! Groups and datasets share one representation, [`HdfObject`], held in an
//! arena indexed by [`ObjId`] and owned by the file writer. Parent/child
//! links and every cross reference (attribute references, dimension lists)
//! are arena indices, so back references never form ownership cycles.

use log::debug;

use crate::attribute::attribute_message;
use crate::attribute_info::attribute_info_message;
use crate::btree_k::btree_k_message;
use crate::data_layout::{chunked_layout_message, contiguous_layout_message};
use crate::data_write::check_type_match;
use crate::dataspace::dataspace_message;
use crate::datatype::datatype_message;
use crate::dtype::Dtype;
use crate::error::HdfError;
use crate::fill_value::fill_value_message;
use crate::filter_pipeline::deflate_pipeline_message;
use crate::global_heap::GlobalHeap;
use crate::group_info::group_info_message;
use crate::link_info::link_info_message;
use crate::link_message::link_message;
use crate::message_type::MessageType;
use crate::mod_time::mod_time_message;
use crate::object_header::ObjectHeaderWriter;
use crate::value::{AttrData, FillValue};

/// Index of an object (group or dataset) in the file's arena.
pub type ObjId = usize;

/// One chunk of a dataset: its starting element indices, and the disk
/// address and byte size recorded when the chunk is written.
#[derive(Debug, Clone)]
pub struct HdfChunk {
    /// Element start index per axis (a multiple of the chunk shape).
    pub start_ixs: Vec<u64>,
    /// File offset of the chunk bytes; 0 until written.
    pub chunk_data_addr: u64,
    /// On-disk byte size (post-compression); 0 until written.
    pub chunk_data_size: u64,
}

/// An attribute attached to a group or dataset.
#[derive(Debug, Clone)]
pub struct Attribute {
    /// Attribute name.
    pub name: String,
    /// Declared datatype.
    pub dtype: Dtype,
    /// Element byte length for fixed-length strings.
    pub stg_field_len: usize,
    /// The captured value.
    pub value: AttrData,
}

/// A group or dataset.
#[derive(Debug)]
pub struct HdfObject {
    /// Local name; empty for the root group.
    pub name: String,
    /// Parent object; `None` for the root and the superblock extension.
    pub parent: Option<ObjId>,
    /// False: group. True: dataset (variable).
    pub is_variable: bool,
    /// True only for the superblock extension group.
    pub is_extension: bool,
    /// Child groups, in creation order.
    pub sub_groups: Vec<ObjId>,
    /// Child datasets, in creation order.
    pub sub_variables: Vec<ObjId>,
    /// Attributes, in creation order.
    pub attributes: Vec<Attribute>,

    /// Dataset datatype. Unused for groups.
    pub dtype: Dtype,
    /// Fixed-string element length, without any terminator.
    pub stg_field_len: usize,
    /// Dimension lengths. `None` = no data; empty = scalar.
    pub var_dims: Option<Vec<u64>>,
    /// Chunk shape; `None` = contiguous storage.
    pub chunk_dims: Option<Vec<u64>>,
    /// DEFLATE level 0-9; 0 = uncompressed.
    pub compression_level: u32,
    /// Optional typed fill value.
    pub fill_value: Option<FillValue>,

    /// Element byte length.
    pub element_len: usize,
    /// Total element count over `var_dims` (0 for scalars and no-data).
    pub tot_num_ele: u64,
    /// Flat chunk table in row-major order, last axis fastest.
    pub chunks: Vec<HdfChunk>,
    /// Row-major chunk strides: chunks spanned by one step along an axis.
    chunk_strides: Vec<u64>,

    /// File offset of this object's header, fixed during layout pass 1.
    pub blk_position: u64,
    /// File offset of the chunk B-tree (chunked datasets only).
    pub btree_position: u64,
}

impl HdfObject {
    /// Create a plain group.
    pub fn new_group(name: String, parent: Option<ObjId>) -> Self {
        Self {
            name,
            parent,
            is_variable: false,
            is_extension: false,
            sub_groups: Vec::new(),
            sub_variables: Vec::new(),
            attributes: Vec::new(),
            dtype: Dtype::UFixed08,
            stg_field_len: 0,
            var_dims: None,
            chunk_dims: None,
            compression_level: 0,
            fill_value: None,
            element_len: 0,
            tot_num_ele: 0,
            chunks: Vec::new(),
            chunk_strides: Vec::new(),
            blk_position: 0,
            btree_position: 0,
        }
    }

    /// Create the superblock extension group.
    pub fn new_extension() -> Self {
        let mut g = Self::new_group("superBlockExtension".to_string(), None);
        g.is_extension = true;
        g
    }

    /// Create a dataset and pre-compute its chunk table.
    #[allow(clippy::too_many_arguments)]
    pub fn new_variable(
        name: String,
        parent: Option<ObjId>,
        dtype: Dtype,
        stg_field_len: usize,
        var_dims: Option<Vec<u64>>,
        chunk_dims: Option<Vec<u64>>,
        fill_value: Option<FillValue>,
        compression_level: u32,
    ) -> Result<Self, HdfError> {
        let path = format!("dataset \"{name}\"");

        if compression_level > 9 {
            return Err(HdfError::InvalidLayout {
                path,
                detail: format!("compression level {compression_level} not in 0..=9"),
            });
        }
        let rank = var_dims.as_ref().map_or(0, |d| d.len());
        let no_data = var_dims.as_ref().map_or(true, |d| d.is_empty());

        if no_data {
            if chunk_dims.is_some() {
                return Err(HdfError::InvalidLayout {
                    path,
                    detail: "scalar or no-data variable cannot be chunked".to_string(),
                });
            }
            if compression_level > 0 {
                return Err(HdfError::InvalidLayout {
                    path,
                    detail: "scalar or no-data variable cannot be compressed".to_string(),
                });
            }
        }
        if let (Some(vd), Some(cd)) = (var_dims.as_ref(), chunk_dims.as_ref()) {
            if cd.len() != vd.len() {
                return Err(HdfError::InvalidLayout {
                    path,
                    detail: format!("chunk rank {} != variable rank {}", cd.len(), vd.len()),
                });
            }
            for i in 0..vd.len() {
                if cd[i] == 0 || cd[i] > vd[i] {
                    return Err(HdfError::InvalidLayout {
                        path,
                        detail: format!(
                            "chunk dim {} is {} but must be in 1..={}",
                            i, cd[i], vd[i]
                        ),
                    });
                }
            }
        }
        if compression_level > 0 && chunk_dims.is_none() {
            return Err(HdfError::InvalidLayout {
                path,
                detail: "compression requires chunked storage".to_string(),
            });
        }
        if compression_level > 0 && dtype == Dtype::StringVar {
            return Err(HdfError::Unsupported {
                path,
                detail: "variable-length strings cannot be compressed",
            });
        }
        if let Some(fill) = &fill_value {
            check_type_match(&path, dtype, fill.observed_dtype())?;
        }

        let tot_num_ele = match var_dims.as_ref() {
            Some(d) if !d.is_empty() => d.iter().product(),
            _ => 0,
        };

        // Chunk grid: ceil(var / chunk) per axis, one chunk if contiguous.
        let mut num_dim_chunks = vec![1u64; rank];
        let mut tot_num_chunks = 1u64;
        if let (Some(vd), Some(cd)) = (var_dims.as_ref(), chunk_dims.as_ref()) {
            for i in 0..rank {
                num_dim_chunks[i] = vd[i].div_ceil(cd[i]);
                tot_num_chunks *= num_dim_chunks[i];
            }
        }

        // chunk_strides[i] = chunks spanned by one chunk-step along axis i.
        let mut chunk_strides = vec![1u64; rank];
        for i in (0..rank.saturating_sub(1)).rev() {
            chunk_strides[i] = num_dim_chunks[i + 1] * chunk_strides[i + 1];
        }

        // Flat chunk table in row-major order, last axis fastest.
        let mut chunks = Vec::with_capacity(tot_num_chunks as usize);
        match (var_dims.as_ref(), chunk_dims.as_ref()) {
            (Some(vd), Some(cd)) if !vd.is_empty() => {
                let mut start = vec![0u64; rank];
                for _ in 0..tot_num_chunks {
                    chunks.push(HdfChunk {
                        start_ixs: start.clone(),
                        chunk_data_addr: 0,
                        chunk_data_size: 0,
                    });
                    for i in (0..rank).rev() {
                        start[i] += cd[i];
                        if start[i] < vd[i] {
                            break;
                        }
                        start[i] = 0;
                    }
                }
            }
            _ => {
                chunks.push(HdfChunk {
                    start_ixs: vec![0; rank],
                    chunk_data_addr: 0,
                    chunk_data_size: 0,
                });
            }
        }

        debug!(
            "new variable \"{}\": {} dims {:?} chunks {}",
            name,
            dtype.name(),
            var_dims,
            chunks.len()
        );

        Ok(Self {
            name,
            parent,
            is_variable: true,
            is_extension: false,
            sub_groups: Vec::new(),
            sub_variables: Vec::new(),
            attributes: Vec::new(),
            dtype,
            stg_field_len,
            element_len: dtype.element_len(stg_field_len),
            var_dims,
            chunk_dims,
            compression_level,
            fill_value,
            tot_num_ele,
            chunks,
            chunk_strides,
            blk_position: 0,
            btree_position: 0,
        })
    }

    /// Whether the dataset uses chunked storage.
    pub fn is_chunked(&self) -> bool {
        self.chunk_dims.is_some()
    }

    /// Variable rank (0 for scalars and no-data variables).
    pub fn rank(&self) -> usize {
        self.var_dims.as_ref().map_or(0, |d| d.len())
    }

    /// Find an attribute by name.
    pub fn find_attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Map chunk start indices to the flat chunk table index, validating
    /// range and chunk-multiple alignment.
    pub fn calc_chunk_ix(&self, path: &str, start_ixs: &[u64]) -> Result<usize, HdfError> {
        let var_dims = self.var_dims.as_deref().unwrap_or(&[]);
        if start_ixs.len() != var_dims.len() {
            return Err(HdfError::InvalidStartIndex {
                path: path.to_string(),
                detail: format!(
                    "rank {} start indices for rank {} variable",
                    start_ixs.len(),
                    var_dims.len()
                ),
            });
        }
        let mut ichunk = 0u64;
        for (i, &ix) in start_ixs.iter().enumerate() {
            if ix >= var_dims[i] {
                return Err(HdfError::InvalidStartIndex {
                    path: path.to_string(),
                    detail: format!("start index {ix} >= dimension {} on axis {i}", var_dims[i]),
                });
            }
            match self.chunk_dims.as_ref() {
                None => {
                    if ix != 0 {
                        return Err(HdfError::InvalidStartIndex {
                            path: path.to_string(),
                            detail: "contiguous storage requires zero start indices".to_string(),
                        });
                    }
                }
                Some(cd) => {
                    if ix % cd[i] != 0 {
                        return Err(HdfError::InvalidStartIndex {
                            path: path.to_string(),
                            detail: format!(
                                "start index {ix} on axis {i} is not a multiple of chunk dim {}",
                                cd[i]
                            ),
                        });
                    }
                    ichunk += (ix / cd[i]) * self.chunk_strides[i];
                }
            }
        }
        // A miss here is a bookkeeping bug, not a user error.
        assert!(
            (ichunk as usize) < self.chunks.len(),
            "chunk index {ichunk} outside table of {} for {path}",
            self.chunks.len()
        );
        Ok(ichunk as usize)
    }

    /// Encode the fill value for the fill message. Variable-length string
    /// fills land in the file-wide heap and are stored by reference.
    fn fill_bytes(&self, heap: &mut GlobalHeap) -> Option<Vec<u8>> {
        let fill = self.fill_value.as_ref()?;
        let mut out = Vec::new();
        match fill {
            FillValue::SByte(v) => out.push(*v as u8),
            FillValue::UByte(v) => out.push(*v),
            FillValue::Short(v) => out.extend_from_slice(&v.to_le_bytes()),
            FillValue::Int(v) => out.extend_from_slice(&v.to_le_bytes()),
            FillValue::Long(v) => out.extend_from_slice(&v.to_le_bytes()),
            FillValue::Float(v) => out.extend_from_slice(&v.to_le_bytes()),
            FillValue::Double(v) => out.extend_from_slice(&v.to_le_bytes()),
            FillValue::Str(s) => {
                if self.dtype == Dtype::StringFix {
                    let mut bytes = s.as_bytes().to_vec();
                    bytes.resize(self.stg_field_len, 0);
                    out.extend_from_slice(&bytes);
                } else {
                    let ix = heap.put(s.as_bytes());
                    out.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    out.extend_from_slice(&heap.blk_position.to_le_bytes());
                    out.extend_from_slice(&(ix as u32).to_le_bytes());
                }
            }
        }
        Some(out)
    }
}

/// Returns the full path within the file, e.g. `/forecast/temperature`.
pub fn object_path(objects: &[HdfObject], id: ObjId) -> String {
    let mut parts = Vec::new();
    let mut cur = Some(id);
    while let Some(i) = cur {
        parts.push(objects[i].name.clone());
        cur = objects[i].parent;
    }
    parts.reverse();
    let path = parts.join("/");
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

/// File-wide values needed while assembling object headers.
pub struct FormatContext {
    /// File open time in seconds since the epoch.
    pub mod_time_sec: u64,
    /// Indexed-storage K advertised in the superblock extension.
    pub indexed_storage_k: u16,
}

/// Assemble and serialize the v2 object header for `objects[id]`.
///
/// Child link targets and the chunk B-tree address read the positions
/// captured by layout pass 1; pass 1 itself sees stale zeros, which is
/// harmless because no message size depends on an address value.
pub fn build_object_header(
    objects: &[HdfObject],
    id: ObjId,
    ctx: &FormatContext,
    heap: &mut GlobalHeap,
) -> Result<Vec<u8>, HdfError> {
    let obj = &objects[id];
    let mut w = ObjectHeaderWriter::new(ctx.mod_time_sec);

    if obj.is_variable {
        w.add_message(
            MessageType::Datatype,
            datatype_message(obj.dtype, obj.stg_field_len),
        );
        w.add_message(
            MessageType::Dataspace,
            dataspace_message(obj.var_dims.as_deref()),
        );
        let layout = match obj.chunk_dims.as_ref() {
            Some(cd) => chunked_layout_message(cd, obj.element_len as u32, obj.btree_position),
            None => contiguous_layout_message(
                obj.chunks[0].chunk_data_addr,
                obj.chunks[0].chunk_data_size,
            ),
        };
        w.add_message(MessageType::DataLayout, layout);
        let fill = obj.fill_bytes(heap);
        w.add_message(MessageType::FillValue, fill_value_message(fill.as_deref()));
        w.add_message(MessageType::ModTime, mod_time_message(ctx.mod_time_sec));
        if obj.compression_level > 0 {
            w.add_message(
                MessageType::FilterPipeline,
                deflate_pipeline_message(obj.compression_level),
            );
        }
        w.add_message(
            MessageType::AttributeInfo,
            attribute_info_message(obj.attributes.len() as u16),
        );
        for attr in &obj.attributes {
            w.add_message(MessageType::Attribute, attribute_message(attr, objects, heap)?);
        }
    } else {
        w.add_message(MessageType::ModTime, mod_time_message(ctx.mod_time_sec));
        if obj.is_extension {
            w.add_message(MessageType::BtreeK, btree_k_message(ctx.indexed_storage_k));
        } else {
            w.add_message(
                MessageType::AttributeInfo,
                attribute_info_message(obj.attributes.len() as u16),
            );
            for attr in &obj.attributes {
                w.add_message(MessageType::Attribute, attribute_message(attr, objects, heap)?);
            }
        }
        w.add_message(MessageType::GroupInfo, group_info_message());
        let link_count = (obj.sub_groups.len() + obj.sub_variables.len()) as u64;
        w.add_message(MessageType::LinkInfo, link_info_message(link_count));
        let mut order = 0u64;
        for &child in obj.sub_groups.iter().chain(obj.sub_variables.iter()) {
            w.add_message(
                MessageType::Link,
                link_message(&objects[child].name, order, objects[child].blk_position),
            );
            order += 1;
        }
    }

    Ok(w.serialize())
}
