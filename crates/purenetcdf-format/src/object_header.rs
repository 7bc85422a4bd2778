//! Version-2 object header assembly.
//!
//! Every group and dataset serializes as an `OHDR` envelope: flag byte,
//! four timestamps, attribute phase-change values, the chunk-0 length in
//! the width its own value dictates, the concatenated messages (each with a
//! 2-byte creation order), and a trailing Jenkins checksum.
//!
//! The chunk-0 length field width depends on the length it describes, so
//! the message bytes are measured first and the envelope emitted once.

use crate::checksum::jenkins_lookup3;
use crate::message_type::MessageType;

/// Max attributes stored compactly before switching to dense storage.
const MAX_COMPACT_ATTRS: u16 = 30000;

/// Min attributes kept in dense storage before switching back.
const MIN_DENSE_ATTRS: u16 = 0;

/// Collects header messages and serializes the v2 envelope.
pub struct ObjectHeaderWriter {
    messages: Vec<(MessageType, u8, Vec<u8>)>, // (type, msg flags, body)
    mod_time_sec: u32,
}

impl ObjectHeaderWriter {
    /// Create a writer whose four header timestamps all equal
    /// `mod_time_sec` (the file open time).
    pub fn new(mod_time_sec: u64) -> Self {
        Self {
            messages: Vec::new(),
            mod_time_sec: mod_time_sec as u32,
        }
    }

    /// Append a message with flags 0.
    pub fn add_message(&mut self, msg_type: MessageType, body: Vec<u8>) {
        self.messages.push((msg_type, 0, body));
    }

    /// Number of messages added so far.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no messages have been added.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Serialize the complete header: OHDR prefix, messages, checksum.
    pub fn serialize(&self) -> Vec<u8> {
        // Each message: type(1) + size(2) + flags(1) + creation order(2) + body.
        let chunk0_len: u64 = self
            .messages
            .iter()
            .map(|(_, _, body)| 6 + body.len() as u64)
            .sum();

        let len_mask: u8 = if chunk0_len <= 0xFF {
            0
        } else if chunk0_len <= 0xFFFF {
            1
        } else if chunk0_len <= 0xFFFF_FFFF {
            2
        } else {
            3
        };

        // bit 2: track attr creation order; bit 3: index attr creation order;
        // bit 4: store phase-change values; bit 5: store times.
        let flags = len_mask | 0x04 | 0x08 | 0x10 | 0x20;

        let mut buf = Vec::new();
        buf.extend_from_slice(b"OHDR");
        buf.push(2); // version
        buf.push(flags);

        for _ in 0..4 {
            // access, modification, change, birth: all the file open time
            buf.extend_from_slice(&self.mod_time_sec.to_le_bytes());
        }

        buf.extend_from_slice(&MAX_COMPACT_ATTRS.to_le_bytes());
        buf.extend_from_slice(&MIN_DENSE_ATTRS.to_le_bytes());

        match len_mask {
            0 => buf.push(chunk0_len as u8),
            1 => buf.extend_from_slice(&(chunk0_len as u16).to_le_bytes()),
            2 => buf.extend_from_slice(&(chunk0_len as u32).to_le_bytes()),
            _ => buf.extend_from_slice(&chunk0_len.to_le_bytes()),
        }

        for (order, (msg_type, msg_flags, body)) in self.messages.iter().enumerate() {
            buf.push(msg_type.to_u8());
            buf.extend_from_slice(&(body.len() as u16).to_le_bytes());
            buf.push(*msg_flags);
            buf.extend_from_slice(&(order as u16).to_le_bytes());
            buf.extend_from_slice(body);
        }

        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }
}
