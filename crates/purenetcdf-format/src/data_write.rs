//! Raw data formatting: validation and row-major element emission.
//!
//! One formatter serves both chunk writes (into the channel sink) and
//! attribute payloads (into a byte sink). Values arrive as a flat slice
//! plus a shape; the shape is validated against the declared chunk or
//! trailing-edge rectangle, then elements are emitted row-major with the
//! last axis fastest. Short trailing edges are padded: numeric and
//! fixed-string elements with the 0x77 fill byte, variable-length strings
//! with empty-string heap references.

use crate::dtype::Dtype;
use crate::error::HdfError;
use crate::global_heap::GlobalHeap;
use crate::sink::DataSink;
use crate::value::{ArrayData, ArrayValues};
use crate::PAD_BYTE;

/// Checks an observed value tag against the declared datatype.
///
/// Strings satisfy either string class, byte data satisfies either byte
/// class, and references satisfy both the plain reference and the compound
/// record; everything else must match exactly.
pub fn check_type_match(path: &str, declared: Dtype, observed: Dtype) -> Result<(), HdfError> {
    let ok = match declared {
        Dtype::StringFix | Dtype::StringVar => {
            matches!(observed, Dtype::StringFix | Dtype::StringVar)
        }
        Dtype::SFixed08 | Dtype::UFixed08 => matches!(observed, Dtype::UFixed08),
        Dtype::Compound | Dtype::Reference => matches!(observed, Dtype::Reference),
        other => observed == other,
    };
    if ok {
        Ok(())
    } else {
        Err(HdfError::TypeMismatch {
            path: path.to_string(),
            expected: declared.name(),
            actual: observed.name(),
        })
    }
}

/// Truncate or NUL-extend an ASCII string to exactly `field_len` bytes.
pub fn trunc_pad_null(s: &str, field_len: usize) -> Vec<u8> {
    let mut bytes = s.as_bytes().to_vec();
    bytes.resize(field_len, 0);
    bytes
}

/// Validate a chunk write's value shape and return the per-axis extents
/// the data actually covers (`virt_dims`).
///
/// `chunk_dims` is the effective chunk rectangle (the variable dims for
/// contiguous storage). In linear mode the value is a flat sequence whose
/// length must equal the full chunk volume or the trailing-edge remainder
/// volume; otherwise each observed extent must equal the chunk extent, or
/// the remainder extent when the chunk is the last along that axis.
pub fn validate_chunk_data(
    path: &str,
    declared: Dtype,
    var_dims: &[u64],
    chunk_dims: &[u64],
    start_ixs: &[u64],
    data: &ArrayData,
    linear: bool,
) -> Result<Vec<u64>, HdfError> {
    check_type_match(path, declared, data.values.observed_dtype())?;

    if data.values.len() as u64 != data.volume() {
        return Err(HdfError::ShapeMismatch {
            path: path.to_string(),
            detail: format!(
                "value holds {} elements but its shape {:?} implies {}",
                data.values.len(),
                data.dims,
                data.volume()
            ),
        });
    }

    let rank = var_dims.len();
    if rank == 0 {
        if !data.dims.is_empty() || data.values.len() != 1 {
            return Err(HdfError::ShapeMismatch {
                path: path.to_string(),
                detail: format!("scalar variable written with shape {:?}", data.dims),
            });
        }
        return Ok(Vec::new());
    }

    let rem_dims: Vec<u64> = (0..rank)
        .map(|i| chunk_dims[i].min(var_dims[i] - start_ixs[i]))
        .collect();

    if linear {
        if data.dims.len() != 1 {
            return Err(HdfError::ShapeMismatch {
                path: path.to_string(),
                detail: format!("linear write requires rank-1 data, got {:?}", data.dims),
            });
        }
        let n = data.dims[0];
        let chunk_volume: u64 = chunk_dims.iter().product();
        let rem_volume: u64 = rem_dims.iter().product();
        if n == chunk_volume {
            Ok(chunk_dims.to_vec())
        } else if n == rem_volume {
            Ok(rem_dims)
        } else {
            Err(HdfError::ShapeMismatch {
                path: path.to_string(),
                detail: format!(
                    "linear length {n} matches neither the chunk volume {chunk_volume} \
                     nor the edge volume {rem_volume}"
                ),
            })
        }
    } else {
        if data.dims.len() != rank {
            return Err(HdfError::ShapeMismatch {
                path: path.to_string(),
                detail: format!(
                    "data rank {} != variable rank {rank}",
                    data.dims.len()
                ),
            });
        }
        for i in 0..rank {
            let at_edge = start_ixs[i] + chunk_dims[i] >= var_dims[i];
            let ok = data.dims[i] == chunk_dims[i] || (at_edge && data.dims[i] == rem_dims[i]);
            if !ok {
                return Err(HdfError::ShapeMismatch {
                    path: path.to_string(),
                    detail: format!(
                        "axis {i}: data extent {} matches neither chunk extent {} \
                         nor edge extent {} (variable {:?}, start {:?})",
                        data.dims[i], chunk_dims[i], rem_dims[i], var_dims, start_ixs
                    ),
                });
            }
        }
        Ok(data.dims.clone())
    }
}

/// Element-wise emitter carrying the declared type, reference positions,
/// the per-dataset heap context, and the compound record counter.
pub struct RawFormatter<'a> {
    path: &'a str,
    dtype: Dtype,
    stg_field_len: usize,
    positions: &'a [u64],
    vlen_heap: Option<(&'a mut GlobalHeap, u64)>,
    counter: u32,
}

impl<'a> RawFormatter<'a> {
    /// Create a formatter. `vlen_heap` supplies the heap and its file
    /// address when the declared type stores through a GCOL.
    pub fn new(
        path: &'a str,
        dtype: Dtype,
        stg_field_len: usize,
        positions: &'a [u64],
        vlen_heap: Option<(&'a mut GlobalHeap, u64)>,
    ) -> Self {
        Self {
            path,
            dtype,
            stg_field_len,
            positions,
            vlen_heap,
            counter: 0,
        }
    }

    fn put_heap_ref<S: DataSink>(&mut self, bytes: &[u8], sink: &mut S) -> Result<(), HdfError> {
        let (heap, heap_addr) = match self.vlen_heap.as_mut() {
            Some((heap, addr)) => (heap, *addr),
            None => {
                return Err(HdfError::InvalidAttrValue {
                    path: self.path.to_string(),
                    detail: "variable-length value without a heap".to_string(),
                })
            }
        };
        let ix = heap.put(bytes);
        sink.put_u32(bytes.len() as u32)?;
        sink.put_u64(heap_addr)?;
        sink.put_u32(ix as u32)?;
        Ok(())
    }

    fn put_element<S: DataSink>(
        &mut self,
        values: &ArrayValues,
        ix: usize,
        sink: &mut S,
    ) -> Result<(), HdfError> {
        match (values, self.dtype) {
            (ArrayValues::SBytes(v), Dtype::SFixed08 | Dtype::UFixed08) => sink.put_i8(v[ix]),
            (ArrayValues::UBytes(v), Dtype::SFixed08 | Dtype::UFixed08) => sink.put_u8(v[ix]),
            (ArrayValues::Shorts(v), Dtype::Fixed16) => sink.put_i16(v[ix]),
            (ArrayValues::Ints(v), Dtype::Fixed32) => sink.put_i32(v[ix]),
            (ArrayValues::Longs(v), Dtype::Fixed64) => sink.put_i64(v[ix]),
            (ArrayValues::Floats(v), Dtype::Float32) => sink.put_f32(v[ix]),
            (ArrayValues::Doubles(v), Dtype::Float64) => sink.put_f64(v[ix]),
            (ArrayValues::Strings(v), Dtype::StringFix) => {
                sink.put_bytes(&trunc_pad_null(&v[ix], self.stg_field_len))
            }
            (ArrayValues::Strings(v), Dtype::StringVar) => {
                let bytes = v[ix].as_bytes().to_vec();
                self.put_heap_ref(&bytes, sink)
            }
            (ArrayValues::References(v), Dtype::Reference) => {
                sink.put_u64(self.positions[v[ix]])
            }
            (ArrayValues::References(v), Dtype::Compound) => {
                sink.put_u64(self.positions[v[ix]])?;
                let n = self.counter;
                self.counter += 1;
                sink.put_u32(n)
            }
            (values, declared) => Err(HdfError::TypeMismatch {
                path: self.path.to_string(),
                expected: declared.name(),
                actual: values.observed_dtype().name(),
            }),
        }
    }

    fn put_pad_element<S: DataSink>(&mut self, sink: &mut S) -> Result<(), HdfError> {
        if self.dtype == Dtype::StringVar {
            return self.put_heap_ref(&[], sink);
        }
        let elem_len = self.dtype.element_len(self.stg_field_len);
        for _ in 0..elem_len {
            sink.put_u8(PAD_BYTE)?;
        }
        Ok(())
    }

    /// Emit one chunk rectangle. `virt_dims` (from
    /// [`validate_chunk_data`]) bounds the region covered by `values`; the
    /// rest of the rectangle is padding.
    pub fn format<S: DataSink>(
        &mut self,
        chunk_dims: &[u64],
        virt_dims: &[u64],
        values: &ArrayValues,
        sink: &mut S,
    ) -> Result<(), HdfError> {
        let rank = chunk_dims.len();
        if rank == 0 {
            return self.put_element(values, 0, sink);
        }

        let last_chunk = chunk_dims[rank - 1] as usize;
        let last_virt = virt_dims[rank - 1] as usize;

        // Row-base strides over the data's own extents.
        let mut vstrides = vec![1u64; rank];
        for i in (0..rank - 1).rev() {
            vstrides[i] = vstrides[i + 1] * virt_dims[i + 1];
        }

        let mut cur = vec![0u64; rank - 1];
        loop {
            let in_data = cur.iter().enumerate().all(|(i, &c)| c < virt_dims[i]);
            if in_data {
                let base: u64 = cur.iter().enumerate().map(|(i, &c)| c * vstrides[i]).sum();
                for j in 0..last_virt {
                    self.put_element(values, (base + j as u64) as usize, sink)?;
                }
                for _ in last_virt..last_chunk {
                    self.put_pad_element(sink)?;
                }
            } else {
                for _ in 0..last_chunk {
                    self.put_pad_element(sink)?;
                }
            }

            // Advance the row odometer, most-significant axis last.
            let mut done = true;
            for i in (0..rank - 1).rev() {
                cur[i] += 1;
                if cur[i] < chunk_dims[i] {
                    done = false;
                    break;
                }
                cur[i] = 0;
            }
            if rank == 1 || done {
                break;
            }
        }
        Ok(())
    }
}
