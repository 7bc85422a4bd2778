//! The file writer: superblock, two-pass metadata layout, raw data output.
//!
//! There is exactly one `FileWriter` per output file. The definition phase
//! builds the object arena; `end_define` runs layout pass 1 into an
//! in-memory buffer to fix every block's position and the end-of-metadata
//! address; `write_data` appends aligned raw chunks behind the metadata;
//! `close` re-runs the layout as pass 2 with the final chunk addresses and
//! writes the buffer to the start of the file.

use std::collections::VecDeque;
use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::btree_k::DEFAULT_INDEXED_K;
use crate::chunk_btree::format_chunk_btree;
use crate::data_write::{validate_chunk_data, RawFormatter};
use crate::dtype::Dtype;
use crate::error::{check_name, HdfError};
use crate::global_heap::GlobalHeap;
use crate::group::{
    build_object_header, object_path, Attribute, FormatContext, HdfChunk, HdfObject, ObjId,
};
use crate::sink::{align_up, ByteSink, ChannelSink, DataSink};
use crate::value::{ArrayData, AttrData, FillValue};
use crate::{checksum::jenkins_lookup3, OFFSET_SIZE};

/// HDF5 file signature.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1a, b'\n'];

/// File lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Groups, datasets, and attributes may be created.
    Defining,
    /// Definition is complete; chunk data may be written.
    Writing,
    /// The file is closed; no further operation succeeds.
    Closed,
}

/// Options for [`FileWriter::create`].
#[derive(Debug, Clone, Default)]
pub struct FileOptions {
    /// Replace an existing file instead of failing.
    pub allow_overwrite: bool,
    /// Modification time in milliseconds since the epoch; 0 means "now".
    pub utc_mod_time_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Block {
    Superblock,
    Object(ObjId),
    ChunkBtree(ObjId),
}

/// Writer for one HDF5 output file.
pub struct FileWriter {
    path: PathBuf,
    out: Option<File>,
    status: FileStatus,

    objects: Vec<HdfObject>,
    extension: ObjId,
    root: ObjId,

    main_heap: GlobalHeap,
    main_buf: ByteSink,

    /// Current end-of-file address; metadata length after pass 1, then
    /// advanced by every chunk write.
    eof_addr: u64,
    /// Metadata image length fixed by pass 1; pass 2 must reproduce it.
    metadata_len: u64,

    utc_mod_time_ms: u64,
    utc_mod_time_sec: u64,
    indexed_storage_k: u16,
}

impl FileWriter {
    /// Create the output file and the root and superblock-extension groups.
    pub fn create<P: AsRef<Path>>(path: P, options: FileOptions) -> Result<Self, HdfError> {
        let path = path.as_ref().to_path_buf();

        if !options.allow_overwrite && path.exists() {
            return Err(HdfError::FileExists(path));
        }

        let utc_mod_time_ms = if options.utc_mod_time_ms != 0 {
            options.utc_mod_time_ms
        } else {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0)
        };

        let out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        debug!("create: path {:?} mod time {} ms", path, utc_mod_time_ms);

        let objects = vec![HdfObject::new_extension(), HdfObject::new_group(String::new(), None)];

        Ok(Self {
            path,
            out: Some(out),
            status: FileStatus::Defining,
            objects,
            extension: 0,
            root: 1,
            main_heap: GlobalHeap::new(),
            main_buf: ByteSink::new(),
            eof_addr: 0,
            metadata_len: 0,
            utc_mod_time_sec: utc_mod_time_ms / 1000,
            utc_mod_time_ms,
            indexed_storage_k: DEFAULT_INDEXED_K,
        })
    }

    /// The one and only root group.
    pub fn root_group(&self) -> ObjId {
        self.root
    }

    /// Current lifecycle state.
    pub fn status(&self) -> FileStatus {
        self.status
    }

    /// The output file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Modification time in milliseconds since the epoch.
    pub fn utc_mod_time_ms(&self) -> u64 {
        self.utc_mod_time_ms
    }

    /// Full in-file path of an object, e.g. `/forecast/temperature`.
    pub fn object_path(&self, id: ObjId) -> String {
        object_path(&self.objects, id)
    }

    /// Borrow an object (group or dataset).
    pub fn object(&self, id: ObjId) -> &HdfObject {
        &self.objects[id]
    }

    /// The chunk records of a dataset, in row-major order.
    pub fn chunks(&self, var: ObjId) -> &[HdfChunk] {
        &self.objects[var].chunks
    }

    fn require_status(
        &self,
        want: FileStatus,
        operation: &'static str,
        detail: &'static str,
    ) -> Result<(), HdfError> {
        if self.status != want {
            return Err(HdfError::InvalidState { operation, detail });
        }
        Ok(())
    }

    fn find_sub_item(&self, parent: ObjId, name: &str) -> Option<ObjId> {
        let p = &self.objects[parent];
        p.sub_groups
            .iter()
            .chain(p.sub_variables.iter())
            .copied()
            .find(|&c| self.objects[c].name == name)
    }

    /// Create a sub-group of `parent`.
    pub fn add_group(&mut self, parent: ObjId, name: &str) -> Result<ObjId, HdfError> {
        self.require_status(
            FileStatus::Defining,
            "add group",
            "cannot define after end_define",
        )?;
        if self.objects[parent].is_variable {
            return Err(HdfError::InvalidState {
                operation: "add group",
                detail: "cannot add a group to a variable",
            });
        }
        check_name(
            name,
            &format!("sub-group in group \"{}\"", self.object_path(parent)),
        )?;
        if self.find_sub_item(parent, name).is_some() {
            return Err(HdfError::DuplicateChild {
                group: self.object_path(parent),
                name: name.to_string(),
            });
        }

        let id = self.objects.len();
        self.objects.push(HdfObject::new_group(name.to_string(), Some(parent)));
        self.objects[parent].sub_groups.push(id);
        Ok(id)
    }

    /// Create a dataset in `parent`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_variable(
        &mut self,
        parent: ObjId,
        name: &str,
        dtype: Dtype,
        stg_field_len: usize,
        var_dims: Option<&[u64]>,
        chunk_dims: Option<&[u64]>,
        fill_value: Option<FillValue>,
        compression_level: u32,
    ) -> Result<ObjId, HdfError> {
        self.require_status(
            FileStatus::Defining,
            "add variable",
            "cannot define after end_define",
        )?;
        if self.objects[parent].is_variable {
            return Err(HdfError::InvalidState {
                operation: "add variable",
                detail: "cannot add a variable to a variable",
            });
        }
        check_name(
            name,
            &format!("dataset in group \"{}\"", self.object_path(parent)),
        )?;
        if self.find_sub_item(parent, name).is_some() {
            return Err(HdfError::DuplicateChild {
                group: self.object_path(parent),
                name: name.to_string(),
            });
        }

        let id = self.objects.len();
        let var = HdfObject::new_variable(
            name.to_string(),
            Some(parent),
            dtype,
            stg_field_len,
            var_dims.map(|d| d.to_vec()),
            chunk_dims.map(|d| d.to_vec()),
            fill_value,
            compression_level,
        )?;
        self.objects.push(var);
        self.objects[parent].sub_variables.push(id);
        Ok(id)
    }

    /// Attach an attribute to a group or dataset.
    ///
    /// For fixed-length strings a `stg_field_len` of 0 takes the longest
    /// string in the value as the element length.
    pub fn add_attribute(
        &mut self,
        obj: ObjId,
        name: &str,
        dtype: Dtype,
        stg_field_len: usize,
        value: AttrData,
    ) -> Result<(), HdfError> {
        self.require_status(
            FileStatus::Defining,
            "add attribute",
            "cannot define after end_define",
        )?;
        let path = self.object_path(obj);
        check_name(name, &format!("attribute in \"{path}\""))?;
        if self.objects[obj].find_attribute(name).is_some() {
            return Err(HdfError::DuplicateAttribute {
                path,
                name: name.to_string(),
            });
        }
        check_attr_value(&format!("{path}/{name}"), dtype, &value)?;

        let stg_field_len = if dtype == Dtype::StringFix && stg_field_len == 0 {
            value.max_string_len()
        } else {
            stg_field_len
        };

        self.objects[obj].attributes.push(Attribute {
            name: name.to_string(),
            dtype,
            stg_field_len,
            value,
        });
        Ok(())
    }

    /// Whether the object carries an attribute of the given name.
    pub fn attribute_exists(&self, obj: ObjId, name: &str) -> bool {
        self.objects[obj].find_attribute(name).is_some()
    }

    /// End the definition phase: run layout pass 1 and fix the address at
    /// which raw chunk data will begin.
    pub fn end_define(&mut self) -> Result<(), HdfError> {
        self.require_status(FileStatus::Defining, "end_define", "already called end_define")?;
        self.status = FileStatus::Writing;

        let max_chunks = self
            .objects
            .iter()
            .filter(|o| o.is_variable && o.is_chunked())
            .map(|o| o.chunks.len())
            .max()
            .unwrap_or(0);
        self.indexed_storage_k =
            DEFAULT_INDEXED_K.max(max_chunks.min(u16::MAX as usize) as u16);

        self.format_all(1)?;
        self.eof_addr = self.main_buf.pos();
        self.metadata_len = self.eof_addr;
        debug!("end_define: metadata length {}", self.metadata_len);
        Ok(())
    }

    /// Breadth-first layout of every metadata block into `main_buf`.
    ///
    /// Pass 1 fixes block positions; pass 2 re-emits the identical layout
    /// with final addresses. The global heap formats last so that every
    /// block has had the chance to add items.
    fn format_all(&mut self, pass: u8) -> Result<(), HdfError> {
        debug!("format_all: pass {pass}");
        self.main_buf.clear();
        self.main_heap.clear();

        let mut work: VecDeque<Block> = VecDeque::new();
        work.push_back(Block::Superblock);

        while let Some(block) = work.pop_front() {
            match block {
                Block::Superblock => {
                    self.format_superblock()?;
                    self.add_work(&mut work, Block::Object(self.extension));
                    self.add_work(&mut work, Block::Object(self.root));
                }
                Block::Object(id) => {
                    self.main_buf.align8();
                    self.objects[id].blk_position = self.main_buf.pos();
                    let ctx = FormatContext {
                        mod_time_sec: self.utc_mod_time_sec,
                        indexed_storage_k: self.indexed_storage_k,
                    };
                    let header =
                        build_object_header(&self.objects, id, &ctx, &mut self.main_heap)?;
                    self.main_buf.put_bytes(&header)?;

                    if self.objects[id].is_variable {
                        if self.objects[id].is_chunked() {
                            self.add_work(&mut work, Block::ChunkBtree(id));
                        }
                    } else {
                        let children: Vec<ObjId> = self.objects[id]
                            .sub_groups
                            .iter()
                            .chain(self.objects[id].sub_variables.iter())
                            .copied()
                            .collect();
                        for child in children {
                            self.add_work(&mut work, Block::Object(child));
                        }
                    }
                }
                Block::ChunkBtree(id) => {
                    self.main_buf.align8();
                    self.objects[id].btree_position = self.main_buf.pos();
                    let obj = &self.objects[id];
                    format_chunk_btree(obj, &mut self.main_buf)?;
                }
            }
        }

        self.main_buf.align8();
        self.main_heap.blk_position = self.main_buf.pos();
        let heap = std::mem::take(&mut self.main_heap);
        heap.format(&mut self.main_buf)?;
        self.main_heap = heap;
        Ok(())
    }

    fn add_work(&self, work: &mut VecDeque<Block>, block: Block) {
        if !work.contains(&block) {
            work.push_back(block);
        }
    }

    fn format_superblock(&mut self) -> Result<(), HdfError> {
        let buf = &mut self.main_buf;
        let start = buf.pos();
        buf.put_bytes(&HDF5_SIGNATURE)?;
        buf.put_u8(2)?; // superblock version
        buf.put_u8(OFFSET_SIZE)?;
        buf.put_u8(OFFSET_SIZE)?; // length size
        buf.put_u8(0)?; // consistency flags
        buf.put_u64(0)?; // base address
        buf.put_u64(self.objects[self.extension].blk_position)?;
        buf.put_u64(self.eof_addr)?;
        buf.put_u64(self.objects[self.root].blk_position)?;
        let digest = jenkins_lookup3(buf.bytes_range(start, buf.pos()));
        buf.put_u32(digest)?;
        Ok(())
    }

    /// Write one chunk (or the whole value for contiguous storage) of a
    /// dataset. `start_ixs` must be `None` for scalars and contiguous
    /// layouts, and chunk-aligned indices otherwise. With `linear` the
    /// value is a flat sequence covering the chunk or trailing-edge volume.
    pub fn write_data(
        &mut self,
        var: ObjId,
        start_ixs: Option<&[u64]>,
        data: &ArrayData,
        linear: bool,
    ) -> Result<(), HdfError> {
        self.require_status(FileStatus::Writing, "write data", "must call end_define first")?;
        let path = self.object_path(var);

        {
            let obj = &self.objects[var];
            if !obj.is_variable {
                return Err(HdfError::InvalidState {
                    operation: "write data",
                    detail: "cannot write data to a group",
                });
            }
            if obj.dtype == Dtype::Vlen {
                return Err(HdfError::Unsupported {
                    path,
                    detail: "variable-length datasets are not supported",
                });
            }
            if obj.var_dims.is_none() {
                return Err(HdfError::Unsupported {
                    path,
                    detail: "variable carries no data",
                });
            }
        }

        // Locate the chunk.
        let ichunk = match start_ixs {
            None => {
                if self.objects[var].is_chunked() {
                    return Err(HdfError::InvalidStartIndex {
                        path,
                        detail: "chunked variable requires start indices".to_string(),
                    });
                }
                0
            }
            Some(ixs) => {
                if self.objects[var].rank() == 0 {
                    return Err(HdfError::InvalidStartIndex {
                        path,
                        detail: "scalar variable must not pass start indices".to_string(),
                    });
                }
                if !self.objects[var].is_chunked() {
                    return Err(HdfError::InvalidStartIndex {
                        path,
                        detail: "contiguous variable must not pass start indices".to_string(),
                    });
                }
                self.objects[var].calc_chunk_ix(&path, ixs)?
            }
        };

        if self.objects[var].chunks[ichunk].chunk_data_addr != 0 {
            return Err(HdfError::ChunkAlreadyWritten {
                path,
                start_ixs: self.objects[var].chunks[ichunk].start_ixs.clone(),
            });
        }

        let var_dims = self.objects[var].var_dims.clone().unwrap_or_default();
        let chunk_dims = self
            .objects[var]
            .chunk_dims
            .clone()
            .unwrap_or_else(|| var_dims.clone());
        let start_eff = start_ixs
            .map(|s| s.to_vec())
            .unwrap_or_else(|| vec![0; var_dims.len()]);

        let virt_dims = validate_chunk_data(
            &path,
            self.objects[var].dtype,
            &var_dims,
            &chunk_dims,
            &start_eff,
            data,
            linear,
        )?;

        let dtype = self.objects[var].dtype;
        let stg_field_len = self.objects[var].stg_field_len;
        let compression_level = self.objects[var].compression_level;
        let positions: Vec<u64> = self.objects.iter().map(|o| o.blk_position).collect();

        let mut file = self.out.take().ok_or(HdfError::InvalidState {
            operation: "write data",
            detail: "output channel is gone",
        })?;

        let result = (|| -> Result<(u64, u64), HdfError> {
            let aligned = align_up(8, self.eof_addr);

            let chunk_addr = if dtype == Dtype::StringVar {
                // The strings live in a per-variable GCOL written just
                // before the reference list; the chunk records cover the
                // reference list only.
                let gcol_addr = aligned;
                file.seek(SeekFrom::Start(gcol_addr))?;

                let mut gcol = GlobalHeap::new();
                let mut ref_buf = ByteSink::new();
                let mut fmt = RawFormatter::new(
                    &path,
                    dtype,
                    stg_field_len,
                    &positions,
                    Some((&mut gcol, gcol_addr)),
                );
                fmt.format(&chunk_dims, &virt_dims, &data.values, &mut ref_buf)?;

                let mut sink = ChannelSink::new(&mut file, 0);
                gcol.format(&mut sink)?;
                sink.finish()?;

                let ref_addr = align_up(8, file.stream_position()?);
                file.seek(SeekFrom::Start(ref_addr))?;
                ref_buf.write_to(&mut file)?;
                ref_addr
            } else {
                file.seek(SeekFrom::Start(aligned))?;
                let mut sink = ChannelSink::new(&mut file, compression_level);
                let mut fmt = RawFormatter::new(&path, dtype, stg_field_len, &positions, None);
                fmt.format(&chunk_dims, &virt_dims, &data.values, &mut sink)?;
                sink.finish()?;
                aligned
            };

            let end_pos = file.stream_position()?;
            Ok((chunk_addr, end_pos))
        })();

        self.out = Some(file);
        let (chunk_addr, end_pos) = result?;

        let chunk = &mut self.objects[var].chunks[ichunk];
        chunk.chunk_data_addr = chunk_addr;
        chunk.chunk_data_size = end_pos - chunk_addr;
        debug!(
            "write_data: {path} chunk {ichunk} addr {chunk_addr} size {}",
            end_pos - chunk_addr
        );
        self.eof_addr = end_pos;
        Ok(())
    }

    /// Run layout pass 2 and write the metadata image to the start of the
    /// file. Fails if any data-carrying chunk was never written.
    pub fn close(&mut self) -> Result<(), HdfError> {
        match self.status {
            FileStatus::Defining => {
                return Err(HdfError::InvalidState {
                    operation: "close",
                    detail: "must call end_define before close",
                })
            }
            FileStatus::Closed => {
                return Err(HdfError::InvalidState {
                    operation: "close",
                    detail: "file is already closed",
                })
            }
            FileStatus::Writing => {}
        }
        self.status = FileStatus::Closed;

        let mut missing = String::new();
        for (id, obj) in self.objects.iter().enumerate() {
            if obj.is_variable && obj.tot_num_ele != 0 {
                for chunk in &obj.chunks {
                    if chunk.chunk_data_addr == 0 {
                        missing.push_str(&format!(
                            "  {}  chunk start indices: {:?}\n",
                            object_path(&self.objects, id),
                            chunk.start_ixs
                        ));
                    }
                }
            }
        }
        if !missing.is_empty() {
            return Err(HdfError::ChunksNotWritten { missing });
        }

        self.format_all(2)?;
        // The two passes must agree byte-for-byte on sizes; a mismatch
        // would overwrite chunk data and is a bug, not a user error.
        assert_eq!(
            self.metadata_len,
            self.main_buf.pos(),
            "metadata layout size changed between passes"
        );

        let mut file = self.out.take().ok_or(HdfError::InvalidState {
            operation: "close",
            detail: "output channel is gone",
        })?;
        file.seek(SeekFrom::Start(0))?;
        self.main_buf.write_to(&mut file)?;
        file.sync_all()?;
        debug!("close: {} metadata bytes, eof {}", self.metadata_len, self.eof_addr);
        Ok(())
    }
}

/// Validate an attribute value against its declared datatype.
fn check_attr_value(path: &str, dtype: Dtype, value: &AttrData) -> Result<(), HdfError> {
    let ok = match value {
        AttrData::SBytes(_) | AttrData::UBytes(_) => {
            matches!(dtype, Dtype::SFixed08 | Dtype::UFixed08)
        }
        AttrData::Shorts(_) => dtype == Dtype::Fixed16,
        AttrData::Ints(_) => dtype == Dtype::Fixed32,
        AttrData::Longs(_) => dtype == Dtype::Fixed64,
        AttrData::Floats(_) => dtype == Dtype::Float32,
        AttrData::Doubles(_) => dtype == Dtype::Float64,
        AttrData::Str(_) => dtype == Dtype::StringFix,
        AttrData::Strings(_) => matches!(dtype, Dtype::StringFix | Dtype::StringVar),
        AttrData::Refs(_) => matches!(dtype, Dtype::Reference | Dtype::Compound),
        AttrData::VlenRefs(_) => dtype == Dtype::Vlen,
    };
    if ok {
        Ok(())
    } else {
        Err(HdfError::InvalidAttrValue {
            path: path.to_string(),
            detail: format!("value shape does not suit datatype {}", dtype.name()),
        })
    }
}
