//! NetCDF data types and attribute values.

use purenetcdf_format::{AttrData, Dtype};

/// The NetCDF-4 data types supported for variables and attributes.
///
/// `Char` is stored as an HDF5 fixed-length string of element length 1;
/// the NetCDF API has no fixed-length string type of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NcType {
    /// Signed 8-bit integer.
    SByte,
    /// Unsigned 8-bit integer.
    UByte,
    /// Signed 16-bit integer.
    Short,
    /// Signed 32-bit integer.
    Int,
    /// Signed 64-bit integer.
    Long,
    /// 32-bit IEEE float.
    Float,
    /// 64-bit IEEE float.
    Double,
    /// Single character (length-1 fixed string).
    Char,
    /// Variable-length string.
    String,
}

impl NcType {
    /// The HDF5 datatype tag a variable of this type is declared with.
    pub fn to_dtype(self) -> Dtype {
        match self {
            NcType::SByte => Dtype::SFixed08,
            NcType::UByte => Dtype::UFixed08,
            NcType::Short => Dtype::Fixed16,
            NcType::Int => Dtype::Fixed32,
            NcType::Long => Dtype::Fixed64,
            NcType::Float => Dtype::Float32,
            NcType::Double => Dtype::Float64,
            NcType::Char => Dtype::StringFix,
            NcType::String => Dtype::StringVar,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            NcType::SByte => "SBYTE",
            NcType::UByte => "UBYTE",
            NcType::Short => "SHORT",
            NcType::Int => "INT",
            NcType::Long => "LONG",
            NcType::Float => "FLOAT",
            NcType::Double => "DOUBLE",
            NcType::Char => "CHAR",
            NcType::String => "STRING",
        }
    }
}

/// An attribute value in the NetCDF model: a string, or a one-dimensional
/// array of strings or numbers. Scalars are promoted to one-element
/// arrays; character sequences collapse to a single string.
#[derive(Debug, Clone, PartialEq)]
pub enum NcAttrValue {
    /// Scalar signed byte.
    SByte(i8),
    /// Signed bytes.
    SBytes(Vec<i8>),
    /// Scalar unsigned byte.
    UByte(u8),
    /// Unsigned bytes.
    UBytes(Vec<u8>),
    /// Scalar short.
    Short(i16),
    /// Shorts.
    Shorts(Vec<i16>),
    /// Scalar int.
    Int(i32),
    /// Ints.
    Ints(Vec<i32>),
    /// Scalar long.
    Long(i64),
    /// Longs.
    Longs(Vec<i64>),
    /// Scalar float.
    Float(f32),
    /// Floats.
    Floats(Vec<f32>),
    /// Scalar double.
    Double(f64),
    /// Doubles.
    Doubles(Vec<f64>),
    /// Single character.
    Char(char),
    /// Character sequence (stored as one string).
    Chars(Vec<char>),
    /// Scalar string (stored as a fixed-length string; NetCDF readers
    /// cannot consume scalar variable-length string attributes).
    Str(String),
    /// String array.
    Strings(Vec<String>),
}

impl NcAttrValue {
    /// Lower to the HDF5 datatype tag and attribute payload.
    pub fn into_parts(self) -> (Dtype, AttrData) {
        match self {
            NcAttrValue::SByte(v) => (Dtype::SFixed08, AttrData::SBytes(vec![v])),
            NcAttrValue::SBytes(v) => (Dtype::SFixed08, AttrData::SBytes(v)),
            NcAttrValue::UByte(v) => (Dtype::UFixed08, AttrData::UBytes(vec![v])),
            NcAttrValue::UBytes(v) => (Dtype::UFixed08, AttrData::UBytes(v)),
            NcAttrValue::Short(v) => (Dtype::Fixed16, AttrData::Shorts(vec![v])),
            NcAttrValue::Shorts(v) => (Dtype::Fixed16, AttrData::Shorts(v)),
            NcAttrValue::Int(v) => (Dtype::Fixed32, AttrData::Ints(vec![v])),
            NcAttrValue::Ints(v) => (Dtype::Fixed32, AttrData::Ints(v)),
            NcAttrValue::Long(v) => (Dtype::Fixed64, AttrData::Longs(vec![v])),
            NcAttrValue::Longs(v) => (Dtype::Fixed64, AttrData::Longs(v)),
            NcAttrValue::Float(v) => (Dtype::Float32, AttrData::Floats(vec![v])),
            NcAttrValue::Floats(v) => (Dtype::Float32, AttrData::Floats(v)),
            NcAttrValue::Double(v) => (Dtype::Float64, AttrData::Doubles(vec![v])),
            NcAttrValue::Doubles(v) => (Dtype::Float64, AttrData::Doubles(v)),
            NcAttrValue::Char(c) => (Dtype::StringFix, AttrData::Str(c.to_string())),
            NcAttrValue::Chars(v) => {
                (Dtype::StringFix, AttrData::Str(v.into_iter().collect()))
            }
            NcAttrValue::Str(s) => (Dtype::StringFix, AttrData::Str(s)),
            NcAttrValue::Strings(v) => (Dtype::StringVar, AttrData::Strings(v)),
        }
    }
}
