//! Dataspace message serialization (message type 0x0001).

/// Serialize a version-2 dataspace message.
///
/// `var_dims` of `None` is the null dataspace (a "no data" carrier used by
/// empty attributes); an empty slice is a scalar; otherwise a simple
/// dataspace with one 8-byte current size per axis. Max sizes are never
/// emitted.
pub fn dataspace_message(var_dims: Option<&[u64]>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(2); // version
    let rank = var_dims.map_or(0, |d| d.len());
    buf.push(rank as u8);
    buf.push(0); // flags: no max sizes, no permutations
    let stype = match var_dims {
        None => 2,
        Some(d) if d.is_empty() => 0,
        Some(_) => 1,
    };
    buf.push(stype);
    if let Some(dims) = var_dims {
        for &d in dims {
            buf.extend_from_slice(&d.to_le_bytes());
        }
    }
    buf
}
