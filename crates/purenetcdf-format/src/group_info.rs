//! Group info message serialization (message type 0x000A).

/// Serialize a version-0 group info message with no optional fields.
pub fn group_info_message() -> Vec<u8> {
    vec![0, 0]
}
