//! Memory-mapped companion data file source.
//!
//! The `.casmda` file can be several hundred megabytes, so it is mapped rather
//! than read up front. The map is wrapped in a [`Cursor`] to give the single
//! seek-and-read handle that every extraction driver shares.

use std::fs::File;
use std::io::Cursor;
use std::path::Path;

use memmap2::{Mmap, MmapOptions};

use crate::data::DataReader;
use crate::error::CasmResult;

/// A [`DataReader`] backed by a read-only memory map.
pub type MmapDataReader = DataReader<Cursor<Mmap>>;

/// Map the file at `path` and wrap it in a [`DataReader`].
pub fn open_data_file<P: AsRef<Path>>(path: P) -> CasmResult<MmapDataReader> {
    let file = File::open(path.as_ref())?;
    let mmap = unsafe { MmapOptions::new().map(&file)? };

    DataReader::new(Cursor::new(mmap))
}
