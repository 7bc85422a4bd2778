//! Datatype message serialization (message type 0x0003).
//!
//! Emits the variable-length class/version/bitfield/size header followed by
//! the per-class properties. Only the classes the NetCDF-4 data model needs
//! are supported: fixed-point, IEEE float, fixed and variable-length ASCII
//! strings, object references, the `{reference, uint32}` compound used by
//! `REFERENCE_LIST`, and variable-length sequences of references used by
//! `DIMENSION_LIST`.

use byteorder::{ByteOrder, LittleEndian};

use crate::dtype::Dtype;

fn build_header(class: u8, version: u8, bf: [u8; 3], size: u32) -> Vec<u8> {
    let mut buf = vec![0u8; 8];
    buf[0] = (class & 0x0F) | ((version & 0x0F) << 4);
    buf[1] = bf[0];
    buf[2] = bf[1];
    buf[3] = bf[2];
    LittleEndian::write_u32(&mut buf[4..8], size);
    buf
}

fn fixed_point(size: u32, signed: bool) -> Vec<u8> {
    let bf0 = if signed { 0x08 } else { 0x00 };
    let mut buf = build_header(0, 1, [bf0, 0, 0], size);
    buf.extend_from_slice(&0u16.to_le_bytes()); // bit offset
    buf.extend_from_slice(&((size * 8) as u16).to_le_bytes()); // bit precision
    buf
}

fn floating_point(size: u32) -> Vec<u8> {
    // bf0 bits 4-5: mantissa normalization = 2 (MSB implied, IEEE 754);
    // bf1: sign bit location = precision - 1.
    let bf0 = 0x20u8;
    let bf1 = (size * 8 - 1) as u8;
    let mut buf = build_header(1, 1, [bf0, bf1, 0], size);
    buf.extend_from_slice(&0u16.to_le_bytes()); // bit offset
    buf.extend_from_slice(&((size * 8) as u16).to_le_bytes()); // bit precision
    let (exp_loc, exp_size, mant_loc, mant_size, bias): (u8, u8, u8, u8, u32) = match size {
        4 => (23, 8, 0, 23, 127),
        8 => (52, 11, 0, 52, 1023),
        _ => unreachable!("only f32/f64 are emitted"),
    };
    buf.push(exp_loc);
    buf.push(exp_size);
    buf.push(mant_loc);
    buf.push(mant_size);
    buf.extend_from_slice(&bias.to_le_bytes());
    buf
}

fn fixed_string(size: u32) -> Vec<u8> {
    // padding = 0 (null terminate), charset = 0 (ASCII)
    build_header(3, 1, [0x00, 0, 0], size)
}

fn object_reference() -> Vec<u8> {
    build_header(7, 1, [0x00, 0, 0], 8)
}

fn vlen_string() -> Vec<u8> {
    // bf0: vlen type = 1 (string), padding = 0 (null terminate) in bits 4-7;
    // bf1: charset = 0 (ASCII). Base type is a one-byte fixed string.
    let mut buf = build_header(9, 1, [0x01, 0x00, 0], 16);
    buf.extend_from_slice(&fixed_string(1));
    buf
}

fn vlen_of_references() -> Vec<u8> {
    // bf0: vlen type = 0 (sequence)
    let mut buf = build_header(9, 1, [0x00, 0x00, 0], 16);
    buf.extend_from_slice(&object_reference());
    buf
}

fn reference_list_compound() -> Vec<u8> {
    // Version-3 compound: {reference "dataset" @0, uint32 "dimension" @8},
    // total size 12, so member byte offsets take one byte each.
    let mut buf = build_header(6, 3, [2, 0, 0], 12);
    buf.extend_from_slice(b"dataset\0");
    buf.push(0);
    buf.extend_from_slice(&object_reference());
    buf.extend_from_slice(b"dimension\0");
    buf.push(8);
    buf.extend_from_slice(&fixed_point(4, false));
    buf
}

/// Serialize the datatype message body for `dtype`.
///
/// `stg_field_len` is the element byte length of a fixed-length string and
/// is ignored for every other class.
pub fn datatype_message(dtype: Dtype, stg_field_len: usize) -> Vec<u8> {
    match dtype {
        Dtype::SFixed08 => fixed_point(1, true),
        Dtype::UFixed08 => fixed_point(1, false),
        Dtype::Fixed16 => fixed_point(2, true),
        Dtype::Fixed32 => fixed_point(4, true),
        Dtype::Fixed64 => fixed_point(8, true),
        Dtype::Float32 => floating_point(4),
        Dtype::Float64 => floating_point(8),
        Dtype::StringFix => fixed_string(stg_field_len as u32),
        Dtype::StringVar => vlen_string(),
        Dtype::Reference => object_reference(),
        Dtype::Vlen => vlen_of_references(),
        Dtype::Compound => reference_list_compound(),
    }
}
