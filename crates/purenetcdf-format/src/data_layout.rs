//! Data layout message serialization (message type 0x0008).

/// Serialize a version-3 contiguous layout: data address + data size.
pub fn contiguous_layout_message(data_addr: u64, data_size: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(3); // version
    buf.push(1); // class: contiguous
    buf.extend_from_slice(&data_addr.to_le_bytes());
    buf.extend_from_slice(&data_size.to_le_bytes());
    buf
}

/// Serialize a version-3 chunked layout.
///
/// The on-disk dimensionality is the variable rank plus one: each chunk
/// dimension is 4 bytes and the trailing pseudo-dimension holds the element
/// byte length. `btree_addr` points at the chunk B-tree.
pub fn chunked_layout_message(chunk_dims: &[u64], element_len: u32, btree_addr: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(3); // version
    buf.push(2); // class: chunked
    buf.push((chunk_dims.len() + 1) as u8);
    buf.extend_from_slice(&btree_addr.to_le_bytes());
    for &d in chunk_dims {
        buf.extend_from_slice(&(d as u32).to_le_bytes());
    }
    buf.extend_from_slice(&element_len.to_le_bytes());
    buf
}
