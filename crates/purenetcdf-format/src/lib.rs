//! Pure-Rust HDF5 write pipeline for NetCDF-4 files.
//!
//! This crate serializes a tree of groups, datasets, and attributes into a
//! single HDF5 file: v2 superblock, v2 object headers with link messages,
//! contiguous or chunked dataset storage, optional DEFLATE compression, and
//! global heap collections for variable-length strings.
//!
//! Metadata is laid out in two passes. Pass 1 (at `end_define`) sizes every
//! block and fixes its file position; raw chunk data is then appended behind
//! the metadata; pass 2 (at `close`) re-emits the metadata with the final
//! chunk addresses and writes it to the start of the file.

pub mod attribute;
pub mod attribute_info;
pub mod btree_k;
pub mod checksum;
pub mod chunk_btree;
pub mod data_layout;
pub mod data_write;
pub mod dataspace;
pub mod datatype;
pub mod dtype;
pub mod error;
pub mod file_writer;
pub mod fill_value;
pub mod filter_pipeline;
pub mod global_heap;
pub mod group;
pub mod group_info;
pub mod link_info;
pub mod link_message;
pub mod message_type;
pub mod mod_time;
pub mod object_header;
pub mod sink;
pub mod value;

pub use dtype::Dtype;
pub use error::HdfError;
pub use file_writer::{FileOptions, FileStatus, FileWriter};
pub use group::ObjId;
pub use value::{ArrayData, ArrayValues, AttrData, FillValue};

/// The size in bytes of all file offsets and lengths.
pub const OFFSET_SIZE: u8 = 8;

/// On-disk tag for an undefined address (all bits set).
pub const UNDEFINED_ADDR: u64 = u64::MAX;

/// Fill byte used for alignment gaps and short trailing-edge chunk padding.
pub const PAD_BYTE: u8 = 0x77;
