//! Object modification time message serialization (message type 0x0012).

/// Serialize a version-1 modification time: 32-bit seconds since the epoch.
pub fn mod_time_message(utc_mod_time_sec: u64) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.push(1); // version
    buf.extend_from_slice(&[0, 0, 0]); // reserved
    buf.extend_from_slice(&(utc_mod_time_sec as u32).to_le_bytes());
    buf
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_truncate_to_32_bits() {
        let buf = mod_time_message(0x1_2345_6789);
        assert_eq!(buf.len(), 8);
        assert_eq!(&buf[..4], &[1, 0, 0, 0]);
        assert_eq!(&buf[4..8], &0x2345_6789u32.to_le_bytes());
    }
}
