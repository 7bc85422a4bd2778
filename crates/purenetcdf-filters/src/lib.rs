//! DEFLATE (zlib) helpers for HDF5 chunk payloads.
//!
//! The write pipeline streams chunk data through its own zlib encoder;
//! these one-shot helpers exist for everything else, chiefly verifying
//! written chunks in tests. Pure Rust via `miniz_oxide`.

/// Decompress a zlib stream.
///
/// `max_output_size` > 0 pre-sizes the output buffer.
pub fn deflate_decompress(data: &[u8], max_output_size: usize) -> Result<Vec<u8>, String> {
    if max_output_size > 0 {
        miniz_oxide::inflate::decompress_to_vec_zlib_with_limit(data, max_output_size)
            .map_err(|e| format!("deflate decompress error: {e:?}"))
    } else {
        miniz_oxide::inflate::decompress_to_vec_zlib(data)
            .map_err(|e| format!("deflate decompress error: {e:?}"))
    }
}

/// Compress data into a zlib stream.
pub fn deflate_compress(data: &[u8], level: u32) -> Result<Vec<u8>, String> {
    let level = level.min(10) as u8;
    Ok(miniz_oxide::deflate::compress_to_vec_zlib(data, level))
}
