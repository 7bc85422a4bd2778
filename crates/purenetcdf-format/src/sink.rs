//! Write-only little-endian byte sinks.
//!
//! Two backing modes: [`ByteSink`] is a pure in-memory, auto-growing buffer
//! used for the metadata image and for staging reference lists; [`ChannelSink`]
//! fronts the output file for raw chunk data, flushing fixed-size blocks and
//! optionally passing them through a streaming DEFLATE (zlib) encoder.
//!
//! The raw-data formatter targets the [`DataSink`] trait so the same encoding
//! path serves attribute payloads (into a `ByteSink`) and chunk payloads
//! (into a `ChannelSink`).

use std::fs::File;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::HdfError;
use crate::PAD_BYTE;

/// Approximate block length written to the channel per flush.
pub const BLOCK_LEN: usize = 10_000;

/// Destination for little-endian puts.
pub trait DataSink {
    /// Append one byte.
    fn put_u8(&mut self, v: u8) -> Result<(), HdfError>;
    /// Append a raw byte slice.
    fn put_bytes(&mut self, v: &[u8]) -> Result<(), HdfError>;

    /// Append a signed byte.
    fn put_i8(&mut self, v: i8) -> Result<(), HdfError> {
        self.put_u8(v as u8)
    }
    /// Append a 16-bit value, little-endian.
    fn put_u16(&mut self, v: u16) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append a signed 16-bit value, little-endian.
    fn put_i16(&mut self, v: i16) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append a 32-bit value, little-endian.
    fn put_u32(&mut self, v: u32) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append a signed 32-bit value, little-endian.
    fn put_i32(&mut self, v: i32) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append a 64-bit value, little-endian.
    fn put_u64(&mut self, v: u64) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append a signed 64-bit value, little-endian.
    fn put_i64(&mut self, v: i64) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append an IEEE-754 single, little-endian.
    fn put_f32(&mut self, v: f32) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
    /// Append an IEEE-754 double, little-endian.
    fn put_f64(&mut self, v: f64) -> Result<(), HdfError> {
        self.put_bytes(&v.to_le_bytes())
    }
}

/// In-memory, auto-growing, append-only buffer.
#[derive(Debug, Default)]
pub struct ByteSink {
    buf: Vec<u8>,
}

impl ByteSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(BLOCK_LEN),
        }
    }

    /// Current position (== number of bytes written).
    pub fn pos(&self) -> u64 {
        self.buf.len() as u64
    }

    /// Borrow the full contents.
    pub fn bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Borrow a sub-range `start..lim`.
    pub fn bytes_range(&self, start: u64, lim: u64) -> &[u8] {
        &self.buf[start as usize..lim as usize]
    }

    /// Discard all contents.
    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Advance the position to the next multiple of 8 with the fill byte.
    pub fn align8(&mut self) -> u64 {
        while self.buf.len() % 8 != 0 {
            self.buf.push(PAD_BYTE);
        }
        self.pos()
    }

    /// Append the contents of another in-memory sink.
    pub fn put_sink(&mut self, other: &ByteSink) {
        self.buf.extend_from_slice(&other.buf);
    }

    /// Write the whole buffer to a file at its current seek position.
    pub fn write_to(&self, file: &mut File) -> Result<(), HdfError> {
        file.write_all(&self.buf)?;
        Ok(())
    }
}

impl DataSink for ByteSink {
    fn put_u8(&mut self, v: u8) -> Result<(), HdfError> {
        self.buf.push(v);
        Ok(())
    }

    fn put_bytes(&mut self, v: &[u8]) -> Result<(), HdfError> {
        self.buf.extend_from_slice(v);
        Ok(())
    }
}

enum Channel<'a> {
    Raw(&'a mut File),
    Deflate(ZlibEncoder<&'a mut File>),
}

/// File-backed sink for raw chunk data.
///
/// Accumulates up to [`BLOCK_LEN`] bytes, then writes the block to the
/// channel -- through the DEFLATE encoder when a compression level is
/// active. [`ChannelSink::finish`] flushes the residue and ends the zlib
/// stream; the number of bytes that reached the file is tracked by the
/// caller via the file position.
pub struct ChannelSink<'a> {
    buf: Vec<u8>,
    channel: Channel<'a>,
}

impl<'a> ChannelSink<'a> {
    /// Create a sink over an open file positioned at the chunk start.
    /// `compression_level` 0 writes verbatim; 1-9 wraps the channel in a
    /// streaming zlib encoder of that level.
    pub fn new(file: &'a mut File, compression_level: u32) -> Self {
        let channel = if compression_level > 0 {
            Channel::Deflate(ZlibEncoder::new(file, Compression::new(compression_level)))
        } else {
            Channel::Raw(file)
        };
        Self {
            buf: Vec::with_capacity(BLOCK_LEN),
            channel,
        }
    }

    fn flush_block(&mut self) -> Result<(), HdfError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        match &mut self.channel {
            Channel::Raw(f) => f.write_all(&self.buf)?,
            Channel::Deflate(e) => e.write_all(&self.buf)?,
        }
        self.buf.clear();
        Ok(())
    }

    /// Flush pending bytes and end the deflate stream, if any.
    pub fn finish(mut self) -> Result<(), HdfError> {
        self.flush_block()?;
        if let Channel::Deflate(e) = self.channel {
            e.finish()?;
        }
        Ok(())
    }
}

impl DataSink for ChannelSink<'_> {
    fn put_u8(&mut self, v: u8) -> Result<(), HdfError> {
        if self.buf.len() >= BLOCK_LEN {
            self.flush_block()?;
        }
        self.buf.push(v);
        Ok(())
    }

    fn put_bytes(&mut self, v: &[u8]) -> Result<(), HdfError> {
        if self.buf.len() + v.len() > BLOCK_LEN {
            self.flush_block()?;
        }
        self.buf.extend_from_slice(v);
        Ok(())
    }
}

/// Round `val` up to the next multiple of `bound`.
pub fn align_up(bound: u64, val: u64) -> u64 {
    if val % bound != 0 {
        val + bound - val % bound
    } else {
        val
    }
}
