//! Chunk table: single-leaf version-1 B-tree for raw data chunks.
//!
//! Every chunked dataset points its layout message at one `TREE` leaf node
//! listing all chunks in row-major order. Each entry is a key (stored chunk
//! size, filter mask, per-axis element start offsets plus a trailing zero
//! for the element-size pseudo-dimension) followed by the chunk's file
//! address; a limit key holding the dataset dims closes the node. The
//! superblock extension's B-tree-K message is sized so one leaf is always
//! legal.

use crate::error::HdfError;
use crate::group::HdfObject;
use crate::sink::DataSink;
use crate::UNDEFINED_ADDR;

/// Serialize the chunk B-tree leaf for `var` (which must be chunked).
pub fn format_chunk_btree<S: DataSink>(var: &HdfObject, sink: &mut S) -> Result<(), HdfError> {
    let var_dims = var.var_dims.as_deref().unwrap_or(&[]);
    let nchunks = var.chunks.len();

    sink.put_bytes(b"TREE")?;
    sink.put_u8(1)?; // node type: raw data chunks
    sink.put_u8(0)?; // node level: leaf
    sink.put_u16(nchunks as u16)?;
    sink.put_u64(UNDEFINED_ADDR)?; // left sibling
    sink.put_u64(UNDEFINED_ADDR)?; // right sibling

    for chunk in &var.chunks {
        sink.put_u32(chunk.chunk_data_size as u32)?;
        sink.put_u32(0)?; // filter mask: all filters applied
        for &ix in &chunk.start_ixs {
            sink.put_u64(ix)?;
        }
        sink.put_u64(0)?; // element-size pseudo-dimension
        sink.put_u64(chunk.chunk_data_addr)?;
    }

    // Limit key: one past the last chunk in every dimension.
    sink.put_u32(0)?;
    sink.put_u32(0)?;
    for &d in var_dims {
        sink.put_u64(d)?;
    }
    sink.put_u64(0)?;
    Ok(())
}

/// Byte length of the serialized leaf for a rank/chunk-count pair.
pub fn chunk_btree_size(rank: usize, nchunks: usize) -> u64 {
    let key = 4 + 4 + 8 * (rank as u64 + 1);
    24 + nchunks as u64 * (key + 8) + key
}
