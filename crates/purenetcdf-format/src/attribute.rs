//! Attribute message serialization (message type 0x000C).
//!
//! Emits version-3 attribute messages: sizes, ASCII name, nested datatype
//! and dataspace messages, then the value bytes produced by the shared
//! raw-data formatter aimed at a byte sink. Variable-length payloads
//! (string arrays and `DIMENSION_LIST` reference rows) are stored in the
//! file-wide global heap and referenced by `(heap_addr, index)`.

use crate::data_write::RawFormatter;
use crate::dataspace::dataspace_message;
use crate::datatype::datatype_message;
use crate::dtype::Dtype;
use crate::error::HdfError;
use crate::global_heap::GlobalHeap;
use crate::group::{Attribute, HdfObject};
use crate::sink::{ByteSink, DataSink};
use crate::value::{ArrayValues, AttrData};

fn format_attr_data(
    attr: &Attribute,
    objects: &[HdfObject],
    heap: &mut GlobalHeap,
) -> Result<Vec<u8>, HdfError> {
    let positions: Vec<u64> = objects.iter().map(|o| o.blk_position).collect();
    let heap_addr = heap.blk_position;
    let mut sink = ByteSink::new();

    // DIMENSION_LIST rows do not flow through the element formatter: each
    // row becomes one heap item holding the concatenated references.
    if let AttrData::VlenRefs(rows) = &attr.value {
        if attr.dtype != Dtype::Vlen {
            return Err(HdfError::InvalidAttrValue {
                path: attr.name.clone(),
                detail: "reference rows require a variable-length datatype".to_string(),
            });
        }
        for row in rows {
            let mut item = Vec::with_capacity(row.len() * 8);
            for &id in row {
                item.extend_from_slice(&positions[id].to_le_bytes());
            }
            let ix = heap.put(&item);
            sink.put_u32(row.len() as u32)?;
            sink.put_u64(heap_addr)?;
            sink.put_u32(ix as u32)?;
        }
        return Ok(sink.bytes().to_vec());
    }

    let (values, dims): (ArrayValues, Vec<u64>) = match &attr.value {
        AttrData::SBytes(v) => (ArrayValues::SBytes(v.clone()), vec![v.len() as u64]),
        AttrData::UBytes(v) => (ArrayValues::UBytes(v.clone()), vec![v.len() as u64]),
        AttrData::Shorts(v) => (ArrayValues::Shorts(v.clone()), vec![v.len() as u64]),
        AttrData::Ints(v) => (ArrayValues::Ints(v.clone()), vec![v.len() as u64]),
        AttrData::Longs(v) => (ArrayValues::Longs(v.clone()), vec![v.len() as u64]),
        AttrData::Floats(v) => (ArrayValues::Floats(v.clone()), vec![v.len() as u64]),
        AttrData::Doubles(v) => (ArrayValues::Doubles(v.clone()), vec![v.len() as u64]),
        AttrData::Str(s) => (ArrayValues::Strings(vec![s.clone()]), Vec::new()),
        AttrData::Strings(v) => (ArrayValues::Strings(v.clone()), vec![v.len() as u64]),
        AttrData::Refs(v) => (ArrayValues::References(v.clone()), vec![v.len() as u64]),
        AttrData::VlenRefs(_) => unreachable!("handled above"),
    };

    let vlen = matches!(attr.dtype, Dtype::StringVar).then_some((heap, heap_addr));
    let mut fmt = RawFormatter::new(&attr.name, attr.dtype, attr.stg_field_len, &positions, vlen);
    fmt.format(&dims, &dims, &values, &mut sink)?;
    Ok(sink.bytes().to_vec())
}

/// Serialize the version-3 attribute message body.
pub fn attribute_message(
    attr: &Attribute,
    objects: &[HdfObject],
    heap: &mut GlobalHeap,
) -> Result<Vec<u8>, HdfError> {
    let mut name_bytes = attr.name.as_bytes().to_vec();
    name_bytes.push(0);

    let dt_bytes = datatype_message(attr.dtype, attr.stg_field_len);
    let ds_bytes = match attr.value.extent() {
        None => dataspace_message(Some(&[])),
        Some(n) => dataspace_message(Some(&[n])),
    };
    let data = format_attr_data(attr, objects, heap)?;

    let mut buf = Vec::new();
    buf.push(3); // version
    buf.push(0); // flags
    buf.extend_from_slice(&(name_bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(dt_bytes.len() as u16).to_le_bytes());
    buf.extend_from_slice(&(ds_bytes.len() as u16).to_le_bytes());
    buf.push(0); // name character set: ASCII
    buf.extend_from_slice(&name_bytes);
    buf.extend_from_slice(&dt_bytes);
    buf.extend_from_slice(&ds_bytes);
    buf.extend_from_slice(&data);
    Ok(buf)
}
