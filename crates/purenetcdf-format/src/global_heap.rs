//! Global heap collection (GCOL) writer.
//!
//! A collection-addressed store of length-prefixed byte items, referenced
//! by `(heap_addr, index)`. The file owns one heap for variable-length
//! attribute payloads and string fill values; each variable-length-string
//! dataset writes its own ephemeral collection just before its reference
//! list.

use crate::error::HdfError;
use crate::sink::DataSink;

/// Round up to the next multiple of 8.
fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

/// A write-side global heap collection.
#[derive(Debug, Default)]
pub struct GlobalHeap {
    items: Vec<Vec<u8>>,
    /// Offset of this collection, captured when it is laid out.
    pub blk_position: u64,
}

impl GlobalHeap {
    /// Create an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store an item; returns its 1-based index within the collection.
    pub fn put(&mut self, bytes: &[u8]) -> u16 {
        self.items.push(bytes.to_vec());
        self.items.len() as u16
    }

    /// Drop all items. Indices restart at 1.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the collection holds no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total on-disk collection size: header, items with their 16-byte
    /// headers and 8-byte padding, and the terminating null object.
    pub fn total_size(&self) -> u64 {
        let mut size = 16u64; // GCOL + version + reserved + collection size
        for item in &self.items {
            size += 16 + pad8(item.len()) as u64;
        }
        size + 16 // null object terminator
    }

    /// Format the collection. Emits exactly the same bytes on every call
    /// for the same item set, so sizing and final passes agree.
    pub fn format<S: DataSink>(&self, sink: &mut S) -> Result<(), HdfError> {
        sink.put_bytes(b"GCOL")?;
        sink.put_u8(1)?; // version
        sink.put_bytes(&[0, 0, 0])?; // reserved
        sink.put_u64(self.total_size())?;

        for (i, item) in self.items.iter().enumerate() {
            sink.put_u16((i + 1) as u16)?; // 1-based index
            sink.put_u16(0)?; // reference count
            sink.put_u32(0)?; // reserved
            sink.put_u64(item.len() as u64)?;
            sink.put_bytes(item)?;
            for _ in item.len()..pad8(item.len()) {
                sink.put_u8(0)?;
            }
        }

        // Null object: index 0, size = remaining free space (none).
        sink.put_u16(0)?;
        sink.put_u16(0)?;
        sink.put_u32(0)?;
        sink.put_u64(0)?;
        Ok(())
    }
}
