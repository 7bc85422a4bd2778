//! Filter pipeline message serialization (message type 0x000B).

/// Filter identification value for DEFLATE.
pub const FILTER_DEFLATE: u16 = 1;

/// Serialize a version-2 filter pipeline carrying a single DEFLATE filter
/// with one client data value: the compression level.
pub fn deflate_pipeline_message(compression_level: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(2); // version
    buf.push(1); // number of filters
    buf.extend_from_slice(&FILTER_DEFLATE.to_le_bytes());
    buf.extend_from_slice(&0u16.to_le_bytes()); // flags: mandatory
    buf.extend_from_slice(&1u16.to_le_bytes()); // one client data value
    buf.extend_from_slice(&compression_level.to_le_bytes());
    buf
}
