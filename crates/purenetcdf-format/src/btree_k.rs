//! B-tree K values message serialization (message type 0x0013).
//!
//! The version-2 superblock has no K fields, so the tree-arity defaults
//! live in the superblock extension group. The indexed-storage K bounds
//! the entry count of chunk B-tree nodes; this writer emits single-leaf
//! chunk trees, so the K is sized to cover the largest chunk table.

/// Default indexed-storage K; raised when a dataset has more chunks.
pub const DEFAULT_INDEXED_K: u16 = 100;

/// Default group-internal K.
pub const GROUP_INTERNAL_K: u16 = 16;

/// Default group-leaf K.
pub const GROUP_LEAF_K: u16 = 4;

/// Serialize a version-0 B-tree K values message.
pub fn btree_k_message(indexed_storage_k: u16) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(0); // version
    buf.extend_from_slice(&indexed_storage_k.to_le_bytes());
    buf.extend_from_slice(&GROUP_INTERNAL_K.to_le_bytes());
    buf.extend_from_slice(&GROUP_LEAF_K.to_le_bytes());
    buf
}
