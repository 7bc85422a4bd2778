//! NetCDF-4 level integration tests: the boundary scenarios, verified by
//! parsing the written HDF5 bytes with a minimal reader.

use std::path::PathBuf;

use purenetcdf::{
    ArrayData, ArrayValues, FillValue, NcAttrValue, NcFileWriter, NcOptions, NcType,
};

fn temp_path(name: &str) -> PathBuf {
    tempfile::Builder::new()
        .prefix(name)
        .tempdir()
        .unwrap()
        .keep()
        .join("out.nc")
}

fn options() -> NcOptions {
    NcOptions {
        overwrite: false,
        utc_mod_time_ms: 1_700_000_000_000,
    }
}

// ---- minimal reader ----

const SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

fn root_addr(bytes: &[u8]) -> u64 {
    assert_eq!(&bytes[..8], &SIGNATURE);
    u64::from_le_bytes(bytes[36..44].try_into().unwrap())
}

struct Message {
    msg_type: u8,
    body: Vec<u8>,
}

fn parse_object_header(bytes: &[u8], at: usize) -> Vec<Message> {
    assert_eq!(&bytes[at..at + 4], b"OHDR", "object header at {at}");
    let flags = bytes[at + 5];
    let mut pos = at + 6;
    if flags & 0x20 != 0 {
        pos += 16;
    }
    if flags & 0x10 != 0 {
        pos += 4;
    }
    let width = 1usize << (flags & 0x03);
    let mut chunk0 = 0u64;
    for i in 0..width {
        chunk0 |= (bytes[pos + i] as u64) << (8 * i);
    }
    pos += width;
    let msgs_end = pos + chunk0 as usize;

    let mut messages = Vec::new();
    while pos < msgs_end {
        let msg_type = bytes[pos];
        let size = u16::from_le_bytes(bytes[pos + 1..pos + 3].try_into().unwrap()) as usize;
        pos += 4;
        if flags & 0x04 != 0 {
            pos += 2; // creation order
        }
        messages.push(Message {
            msg_type,
            body: bytes[pos..pos + size].to_vec(),
        });
        pos += size;
    }
    messages
}

fn parse_link(body: &[u8]) -> (String, u64) {
    let flags = body[1];
    let mut pos = 2;
    if flags & 0x08 != 0 {
        pos += 1;
    }
    if flags & 0x04 != 0 {
        pos += 8;
    }
    if flags & 0x10 != 0 {
        pos += 1;
    }
    let width = 1usize << (flags & 0x03);
    let mut name_len = 0usize;
    for i in 0..width {
        name_len |= (body[pos + i] as usize) << (8 * i);
    }
    pos += width;
    let name = String::from_utf8(body[pos..pos + name_len].to_vec()).unwrap();
    pos += name_len;
    let addr = u64::from_le_bytes(body[pos..pos + 8].try_into().unwrap());
    (name, addr)
}

fn child_addr(bytes: &[u8], group_addr: u64, name: &str) -> u64 {
    for m in parse_object_header(bytes, group_addr as usize) {
        if m.msg_type == 0x06 {
            let (n, addr) = parse_link(&m.body);
            if n == name {
                return addr;
            }
        }
    }
    panic!("no link named {name:?}");
}

/// Decode an attribute message body into (name, datatype class, value bytes).
fn parse_attr(body: &[u8]) -> (String, u8, Vec<u8>) {
    assert_eq!(body[0], 3, "attribute version");
    let name_size = u16::from_le_bytes(body[2..4].try_into().unwrap()) as usize;
    let dt_size = u16::from_le_bytes(body[4..6].try_into().unwrap()) as usize;
    let ds_size = u16::from_le_bytes(body[6..8].try_into().unwrap()) as usize;
    let name_start = 9;
    let name = String::from_utf8(body[name_start..name_start + name_size - 1].to_vec()).unwrap();
    let dt_class = body[name_start + name_size] & 0x0F;
    let data_start = name_start + name_size + dt_size + ds_size;
    (name, dt_class, body[data_start..].to_vec())
}

fn find_attr(bytes: &[u8], obj_addr: u64, name: &str) -> (u8, Vec<u8>) {
    for m in parse_object_header(bytes, obj_addr as usize) {
        if m.msg_type == 0x0C {
            let (n, dt_class, data) = parse_attr(&m.body);
            if n == name {
                return (dt_class, data);
            }
        }
    }
    panic!("no attribute named {name:?}");
}

fn has_attr(bytes: &[u8], obj_addr: u64, name: &str) -> bool {
    parse_object_header(bytes, obj_addr as usize)
        .iter()
        .filter(|m| m.msg_type == 0x0C)
        .any(|m| parse_attr(&m.body).0 == name)
}

/// Fetch an item from a global heap collection by `(heap_addr, index)`.
fn gcol_item(bytes: &[u8], heap_addr: u64, index: u32) -> Vec<u8> {
    let at = heap_addr as usize;
    assert_eq!(&bytes[at..at + 4], b"GCOL", "collection at {heap_addr}");
    assert_eq!(bytes[at + 4], 1);
    let total = u64::from_le_bytes(bytes[at + 8..at + 16].try_into().unwrap()) as usize;
    let mut pos = at + 16;
    while pos < at + total {
        let ix = u16::from_le_bytes(bytes[pos..pos + 2].try_into().unwrap());
        let size = u64::from_le_bytes(bytes[pos + 8..pos + 16].try_into().unwrap()) as usize;
        if ix == 0 {
            break;
        }
        if ix as u32 == index {
            return bytes[pos + 16..pos + 16 + size].to_vec();
        }
        pos += 16 + size.div_ceil(8) * 8;
    }
    panic!("heap item {index} not found in collection at {heap_addr}");
}

// ---- boundary scenarios ----

#[test]
fn scalar_int_with_fill() {
    let path = temp_path("scalar");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let s = file
        .add_variable(root, "s", NcType::Int, Some(&[]), None, Some(FillValue::Int(7)), 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(s, None, &ArrayData::scalar(ArrayValues::Ints(vec![42])), false)
        .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let s_addr = child_addr(&bytes, root_addr(&bytes), "s");
    let msgs = parse_object_header(&bytes, s_addr as usize);

    // Scalar dataspace, contiguous layout.
    let ds = msgs.iter().find(|m| m.msg_type == 0x01).unwrap();
    assert_eq!(&ds.body[..4], &[2, 0, 0, 0]);
    let layout = msgs.iter().find(|m| m.msg_type == 0x08).unwrap();
    assert_eq!(layout.body[1], 1);
    let addr = u64::from_le_bytes(layout.body[2..10].try_into().unwrap());
    let size = u64::from_le_bytes(layout.body[10..18].try_into().unwrap());
    assert_eq!(size, 4);
    let got = i32::from_le_bytes(bytes[addr as usize..addr as usize + 4].try_into().unwrap());
    assert_eq!(got, 42);

    // Fill value message carries 7.
    let fill = msgs.iter().find(|m| m.msg_type == 0x05).unwrap();
    assert_eq!(fill.body[3], 1);
    assert_eq!(&fill.body[8..12], &7i32.to_le_bytes());
}

#[test]
fn single_chunk_float_rectangle() {
    let path = temp_path("rect");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let y = file.add_dimension(root, "y", 4).unwrap();
    let x = file.add_dimension(root, "x", 6).unwrap();
    let v = file
        .add_variable(root, "grid", NcType::Float, Some(&[y, x]), Some(&[4, 6]), None, 0)
        .unwrap();
    file.end_define().unwrap();

    let values: Vec<f32> = (0..4)
        .flat_map(|i| (0..6).map(move |j| (i * 6 + j) as f32))
        .collect();
    file.write(
        v,
        Some(&[0, 0]),
        &ArrayData::new(ArrayValues::Floats(values.clone()), &[4, 6]),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].chunk_data_size, 96);

    let bytes = std::fs::read(&path).unwrap();
    let at = chunks[0].chunk_data_addr as usize;
    for (i, val) in values.iter().enumerate() {
        let got = f32::from_le_bytes(bytes[at + 4 * i..at + 4 * i + 4].try_into().unwrap());
        assert_eq!(got, *val);
    }
}

#[test]
fn vlen_strings_through_global_heap() {
    let path = temp_path("vlen");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let t = file.add_dimension(root, "t", 3).unwrap();
    let v = file
        .add_variable(root, "name", NcType::String, Some(&[t]), None, None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(
        v,
        None,
        &ArrayData::new(
            ArrayValues::Strings(vec!["a".into(), "bb".into(), "ccc".into()]),
            &[3],
        ),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    assert_eq!(chunks.len(), 1);
    // Three 16-byte (len, heap_addr, index) references.
    assert_eq!(chunks[0].chunk_data_size, 48);

    let at = chunks[0].chunk_data_addr as usize;
    let expect = ["a", "bb", "ccc"];
    for (i, want) in expect.iter().enumerate() {
        let r = at + 16 * i;
        let len = u32::from_le_bytes(bytes[r..r + 4].try_into().unwrap());
        let heap_addr = u64::from_le_bytes(bytes[r + 4..r + 12].try_into().unwrap());
        let index = u32::from_le_bytes(bytes[r + 12..r + 16].try_into().unwrap());
        assert_eq!(len as usize, want.len());
        let item = gcol_item(&bytes, heap_addr, index);
        assert_eq!(item, want.as_bytes());
    }
}

#[test]
fn chunked_deflate_level_5() {
    let path = temp_path("deflate");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let y = file.add_dimension(root, "y", 10).unwrap();
    let x = file.add_dimension(root, "x", 10).unwrap();
    let v = file
        .add_variable(root, "z", NcType::Float, Some(&[y, x]), Some(&[5, 5]), None, 5)
        .unwrap();
    file.end_define().unwrap();

    let mut raws = Vec::new();
    for (ci, start) in [[0u64, 0], [0, 5], [5, 0], [5, 5]].iter().enumerate() {
        let vals: Vec<f32> = (0..25).map(|i| (ci * 1000 + i) as f32).collect();
        let mut raw = Vec::new();
        for val in &vals {
            raw.extend_from_slice(&val.to_le_bytes());
        }
        raws.push(raw);
        file.write(
            v,
            Some(start),
            &ArrayData::new(ArrayValues::Floats(vals), &[5, 5]),
            false,
        )
        .unwrap();
    }
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    let mut addrs = std::collections::HashSet::new();
    for (chunk, raw) in chunks.iter().zip(&raws) {
        assert_ne!(chunk.chunk_data_addr, 0);
        assert_eq!(chunk.chunk_data_addr % 8, 0);
        assert!(chunk.chunk_data_size <= 5 * 5 * 4);
        assert!(addrs.insert(chunk.chunk_data_addr));
        let slice = &bytes[chunk.chunk_data_addr as usize
            ..(chunk.chunk_data_addr + chunk.chunk_data_size) as usize];
        let restored = purenetcdf_filters::deflate_decompress(slice, 100).unwrap();
        assert_eq!(&restored, raw);
    }
}

#[test]
fn dimension_without_coordinate_variable() {
    let path = temp_path("dimscale");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 3).unwrap();
    let v = file
        .add_variable(root, "v", NcType::Float, Some(&[x]), None, None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(
        v,
        None,
        &ArrayData::new(ArrayValues::Floats(vec![1.0, 2.0, 3.0]), &[3]),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let root_at = root_addr(&bytes);

    // A float32 dataset named "x" was synthesized for the dimension.
    let x_addr = child_addr(&bytes, root_at, "x");
    let (_, class_data) = find_attr(&bytes, x_addr, "CLASS");
    assert_eq!(class_data, b"DIMENSION_SCALE\0");
    let (_, name_data) = find_attr(&bytes, x_addr, "NAME");
    assert_eq!(
        name_data,
        b"This is a netCDF dimension but not a netCDF variable.         3\0"
    );

    // Its chunk holds three zero floats.
    let x_hdf = file.dimension(x).hdf_dim_var.unwrap();
    let x_chunks = file.hdf_writer().chunks(x_hdf);
    assert_eq!(x_chunks[0].chunk_data_size, 12);
    let at = x_chunks[0].chunk_data_addr as usize;
    for i in 0..3 {
        let got = f32::from_le_bytes(bytes[at + 4 * i..at + 4 * i + 4].try_into().unwrap());
        assert_eq!(got, 0.0);
    }

    // "v" has one DIMENSION_LIST row referencing "x".
    let v_addr = child_addr(&bytes, root_at, "v");
    let (dt_class, dl) = find_attr(&bytes, v_addr, "DIMENSION_LIST");
    assert_eq!(dt_class, 9); // variable-length
    assert_eq!(dl.len(), 16);
    let row_len = u32::from_le_bytes(dl[0..4].try_into().unwrap());
    let heap_addr = u64::from_le_bytes(dl[4..12].try_into().unwrap());
    let index = u32::from_le_bytes(dl[12..16].try_into().unwrap());
    assert_eq!(row_len, 1);
    let item = gcol_item(&bytes, heap_addr, index);
    assert_eq!(u64::from_le_bytes(item[..8].try_into().unwrap()), x_addr);

    // No REFERENCE_LIST: "v" is the sole referrer but not the coordinate,
    // so the scale does carry one pointing back at "v".
    let (_, rl) = find_attr(&bytes, x_addr, "REFERENCE_LIST");
    assert_eq!(rl.len(), 12);
    assert_eq!(u64::from_le_bytes(rl[0..8].try_into().unwrap()), v_addr);
    assert_eq!(u32::from_le_bytes(rl[8..12].try_into().unwrap()), 0);
}

#[test]
fn coordinate_variable_skips_self_references() {
    let path = temp_path("selfref");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 2).unwrap();
    let xv = file
        .add_variable(root, "x", NcType::Float, Some(&[x]), None, None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(
        xv,
        None,
        &ArrayData::new(ArrayValues::Floats(vec![0.5, 1.5]), &[2]),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let x_addr = child_addr(&bytes, root_addr(&bytes), "x");
    // The coordinate variable is its own scale: NAME is the dimension
    // name, and neither back reference attribute is emitted.
    let (_, name_data) = find_attr(&bytes, x_addr, "NAME");
    assert_eq!(name_data, b"x");
    assert!(!has_attr(&bytes, x_addr, "REFERENCE_LIST"));
    assert!(!has_attr(&bytes, x_addr, "DIMENSION_LIST"));
}

#[test]
fn trailing_edge_chunk_pads_with_fill_byte() {
    let path = temp_path("edge");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 7).unwrap();
    let v = file
        .add_variable(root, "v", NcType::Int, Some(&[x]), Some(&[4]), None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(
        v,
        Some(&[0]),
        &ArrayData::new(ArrayValues::Ints(vec![0, 1, 2, 3]), &[4]),
        false,
    )
    .unwrap();
    file.write(
        v,
        Some(&[4]),
        &ArrayData::new(ArrayValues::Ints(vec![4, 5, 6]), &[3]),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    // The edge chunk still spans the full rectangle on disk.
    assert_eq!(chunks[1].chunk_data_size, 16);
    let at = chunks[1].chunk_data_addr as usize;
    assert_eq!(&bytes[at..at + 4], &4i32.to_le_bytes());
    assert_eq!(&bytes[at + 8..at + 12], &6i32.to_le_bytes());
    assert_eq!(&bytes[at + 12..at + 16], &[0x77; 4]);
}

// ---- further behavior ----

#[test]
fn linear_edge_write_is_equivalent() {
    let path = temp_path("linear");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 7).unwrap();
    let v = file
        .add_variable(root, "v", NcType::Int, Some(&[x]), Some(&[4]), None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(v, Some(&[0]), &ArrayData::linear(ArrayValues::Ints(vec![0, 1, 2, 3])), true)
        .unwrap();
    file.write(v, Some(&[4]), &ArrayData::linear(ArrayValues::Ints(vec![4, 5, 6])), true)
        .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    let at = chunks[1].chunk_data_addr as usize;
    assert_eq!(&bytes[at..at + 4], &4i32.to_le_bytes());
    assert_eq!(&bytes[at + 12..at + 16], &[0x77; 4]);
}

#[test]
fn char_variable_stores_length_one_strings() {
    let path = temp_path("chars");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let n = file.add_dimension(root, "n", 4).unwrap();
    let v = file
        .add_variable(root, "tag", NcType::Char, Some(&[n]), None, None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(v, None, &purenetcdf::text_array(&[4], "abc"), false)
        .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let chunks = file.hdf_writer().chunks(file.variable(v).hdf);
    assert_eq!(chunks[0].chunk_data_size, 4);
    let at = chunks[0].chunk_data_addr as usize;
    // "abc" plus one NUL-padded empty cell.
    assert_eq!(&bytes[at..at + 4], b"abc\0");
}

#[test]
fn group_attributes_and_var_attributes_survive() {
    let path = temp_path("attrs");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    file.add_group_attribute(root, "title", NcAttrValue::Str("test file".into()))
        .unwrap();
    let t = file.add_dimension(root, "t", 2).unwrap();
    let v = file
        .add_variable(root, "speed", NcType::Double, Some(&[t]), None, None, 0)
        .unwrap();
    file.add_variable_attribute(v, "units", NcAttrValue::Str("m s-1".into()))
        .unwrap();
    file.add_variable_attribute(v, "valid_range", NcAttrValue::Doubles(vec![0.0, 50.0]))
        .unwrap();
    file.end_define().unwrap();
    file.write(
        v,
        None,
        &ArrayData::new(ArrayValues::Doubles(vec![1.0, 2.0]), &[2]),
        false,
    )
    .unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let root_at = root_addr(&bytes);
    let (_, title) = find_attr(&bytes, root_at, "title");
    assert_eq!(title, b"test file");

    let v_addr = child_addr(&bytes, root_at, "speed");
    let (_, units) = find_attr(&bytes, v_addr, "units");
    assert_eq!(units, b"m s-1");
    let (_, range) = find_attr(&bytes, v_addr, "valid_range");
    assert_eq!(f64::from_le_bytes(range[0..8].try_into().unwrap()), 0.0);
    assert_eq!(f64::from_le_bytes(range[8..16].try_into().unwrap()), 50.0);
}

#[test]
fn reference_list_counts_all_referrers() {
    let path = temp_path("reflist");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 2).unwrap();
    let xv = file
        .add_variable(root, "x", NcType::Float, Some(&[x]), None, None, 0)
        .unwrap();
    let a = file
        .add_variable(root, "a", NcType::Float, Some(&[x]), None, None, 0)
        .unwrap();
    file.end_define().unwrap();
    let data = ArrayData::new(ArrayValues::Floats(vec![1.0, 2.0]), &[2]);
    file.write(xv, None, &data, false).unwrap();
    file.write(a, None, &data, false).unwrap();
    file.close().unwrap();

    let bytes = std::fs::read(&path).unwrap();
    let root_at = root_addr(&bytes);
    let x_addr = child_addr(&bytes, root_at, "x");
    let a_addr = child_addr(&bytes, root_at, "a");

    // Two referrers (the coordinate variable itself and "a").
    let (dt_class, rl) = find_attr(&bytes, x_addr, "REFERENCE_LIST");
    assert_eq!(dt_class, 6); // compound
    assert_eq!(rl.len(), 24);
    assert_eq!(u64::from_le_bytes(rl[0..8].try_into().unwrap()), x_addr);
    assert_eq!(u32::from_le_bytes(rl[8..12].try_into().unwrap()), 0);
    assert_eq!(u64::from_le_bytes(rl[12..20].try_into().unwrap()), a_addr);
    assert_eq!(u32::from_le_bytes(rl[20..24].try_into().unwrap()), 1);

    // "a" lists "x" as its dimension; the coordinate variable does not.
    assert!(has_attr(&bytes, a_addr, "DIMENSION_LIST"));
    assert!(!has_attr(&bytes, x_addr, "DIMENSION_LIST"));
}

#[test]
fn write_before_end_define_fails() {
    let path = temp_path("early");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 2).unwrap();
    let v = file
        .add_variable(root, "v", NcType::Int, Some(&[x]), None, None, 0)
        .unwrap();
    let data = ArrayData::new(ArrayValues::Ints(vec![1, 2]), &[2]);
    assert!(file.write(v, None, &data, false).is_err());
}

#[test]
fn close_requires_all_chunks() {
    let path = temp_path("incomplete");
    let mut file = NcFileWriter::create(&path, options()).unwrap();
    let root = file.root_group();
    let x = file.add_dimension(root, "x", 8).unwrap();
    let v = file
        .add_variable(root, "v", NcType::Int, Some(&[x]), Some(&[4]), None, 0)
        .unwrap();
    file.end_define().unwrap();
    file.write(
        v,
        Some(&[0]),
        &ArrayData::new(ArrayValues::Ints(vec![1, 2, 3, 4]), &[4]),
        false,
    )
    .unwrap();
    // The second chunk was never written.
    assert!(file.close().is_err());
}
