//! Fill value message serialization (message type 0x0005).

/// Serialize a version-2 fill value message.
///
/// Space allocation time is "early", fill write time is "on allocation".
/// `fill_bytes` of `None` marks the fill as undefined; otherwise the 4-byte
/// size and the encoded fill follow. Variable-length string fills are a
/// 16-byte reference into the file-wide global heap, encoded by the caller.
pub fn fill_value_message(fill_bytes: Option<&[u8]>) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(2); // version
    buf.push(1); // space allocation time: early
    buf.push(0); // fill value write time: on allocation
    match fill_bytes {
        Some(bytes) => {
            buf.push(1); // fill value defined
            buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        None => buf.push(0),
    }
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defined_fill() {
        let buf = fill_value_message(Some(&7i32.to_le_bytes()));
        assert_eq!(&buf[..4], &[2, 1, 0, 1]);
        assert_eq!(&buf[4..8], &4u32.to_le_bytes());
        assert_eq!(&buf[8..12], &7i32.to_le_bytes());
    }

    #[test]
    fn undefined_fill() {
        assert_eq!(fill_value_message(None), vec![2, 1, 0, 0]);
    }
}
