/// Shared parsing helpers
pub mod parser_utils;
/// Alternate backing stores for the companion data file
pub mod wrappers;

use std::io::{Read, Seek, SeekFrom};

use winnow::binary::Endianness;

use crate::data::parser_utils::{Field, read_null_terminated_string};
use crate::error::{Arena, CasmError, CasmResult};

/// A `(offset, size)` byte range inside the companion data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DataRange {
    pub offset: u32,
    pub size: u32,
}

impl DataRange {
    pub fn new(offset: u32, size: u32) -> Self {
        Self { offset, size }
    }

    pub fn len(&self) -> usize {
        self.size as usize
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn end(&self) -> u64 {
        self.offset as u64 + self.size as u64
    }
}

/// Read-only, bounds-checked view over an in-memory byte arena.
#[derive(Debug, Clone, Copy)]
pub struct ByteView<'a> {
    arena: Arena,
    data: &'a [u8],
    endian: Endianness,
}

impl<'a> ByteView<'a> {
    pub fn new(arena: Arena, data: &'a [u8], endian: Endianness) -> Self {
        Self {
            arena,
            data,
            endian,
        }
    }

    pub fn arena(&self) -> Arena {
        self.arena
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    fn out_of_bounds(&self, offset: usize, len: usize) -> CasmError {
        CasmError::OutOfBounds {
            arena: self.arena,
            offset: offset as u64,
            len: len as u64,
            available: self.data.len() as u64,
        }
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn bytes(&self, offset: usize, len: usize) -> CasmResult<&'a [u8]> {
        offset
            .checked_add(len)
            .and_then(|end| self.data.get(offset..end))
            .ok_or_else(|| self.out_of_bounds(offset, len))
    }

    /// Read a single typed field at `offset`.
    pub fn read_at<T: Field>(&self, offset: usize) -> CasmResult<T> {
        let input = &mut self.bytes(offset, T::SIZE)?;
        T::parse(input, self.endian).map_err(|_| self.out_of_bounds(offset, T::SIZE))
    }

    /// Read `count` consecutive fields starting at `offset`.
    pub fn read_array<T: Field>(&self, offset: usize, count: usize) -> CasmResult<Vec<T>> {
        let len = count
            .checked_mul(T::SIZE)
            .ok_or_else(|| self.out_of_bounds(offset, usize::MAX))?;
        let input = &mut self.bytes(offset, len)?;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
            values.push(T::parse(input, self.endian).map_err(|_| self.out_of_bounds(offset, len))?);
        }
        Ok(values)
    }

    /// Read the null-terminated string at `offset`.
    pub fn cstr_at(&self, offset: usize) -> CasmResult<&'a str> {
        read_null_terminated_string(self.data, offset).ok_or_else(|| {
            CasmError::corrupt(format!(
                "string at 0x{offset:X} is outside the {} or not valid UTF-8",
                self.arena
            ))
        })
    }
}

/// Sequential reader over the companion data file.
///
/// There is exactly one handle per run and it carries its own seek position, so
/// callers must not interleave reads from several places.
#[derive(Debug)]
pub struct DataReader<R> {
    inner: R,
    len: u64,
}

impl<R: Read + Seek> DataReader<R> {
    pub fn new(mut inner: R) -> CasmResult<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len })
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fail with `OutOfBounds` unless `range` lies within the file.
    pub fn check(&self, range: DataRange) -> CasmResult<()> {
        if range.end() > self.len {
            return Err(CasmError::OutOfBounds {
                arena: Arena::DataFile,
                offset: range.offset as u64,
                len: range.size as u64,
                available: self.len,
            });
        }
        Ok(())
    }

    pub fn seek(&mut self, offset: u64) -> CasmResult<()> {
        if offset > self.len {
            return Err(CasmError::OutOfBounds {
                arena: Arena::DataFile,
                offset,
                len: 0,
                available: self.len,
            });
        }
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Fill `buf` from the current position.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> CasmResult<()> {
        let position = self.inner.stream_position()?;
        if position + buf.len() as u64 > self.len {
            return Err(CasmError::OutOfBounds {
                arena: Arena::DataFile,
                offset: position,
                len: buf.len() as u64,
                available: self.len,
            });
        }
        self.inner.read_exact(buf)?;
        Ok(())
    }

    /// Seek to `range.offset` and fill `buf`, which must be exactly `range.size` long.
    pub fn read_range(&mut self, range: DataRange, buf: &mut [u8]) -> CasmResult<()> {
        debug_assert_eq!(buf.len(), range.len());
        self.check(range)?;
        self.seek(range.offset as u64)?;
        self.read_exact(buf)
    }

    /// Read a single big-endian field at `offset`.
    pub fn read_at<T: Field>(&mut self, offset: u64) -> CasmResult<T> {
        let mut buf = [0u8; 8];
        let buf = &mut buf[..T::SIZE];
        self.seek(offset)?;
        self.read_exact(buf)?;
        let input = &mut &buf[..];
        T::parse(input, Endianness::Big).map_err(|_| CasmError::OutOfBounds {
            arena: Arena::DataFile,
            offset,
            len: T::SIZE as u64,
            available: self.len,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn view_reads_are_bounds_checked() {
        let bytes = [1, 0, 0, 0, 2, 0];
        let view = ByteView::new(Arena::Container, &bytes, Endianness::Little);
        assert_eq!(view.read_at::<u32>(0).unwrap(), 1);
        assert_eq!(view.read_at::<u16>(4).unwrap(), 2);
        assert!(matches!(
            view.read_at::<u32>(4),
            Err(CasmError::OutOfBounds {
                arena: Arena::Container,
                offset: 4,
                len: 4,
                available: 6
            })
        ));
        assert!(view.bytes(usize::MAX, 2).is_err());
    }

    #[test]
    fn view_reads_arrays() {
        let bytes = [0, 1, 0, 2, 0, 3];
        let view = ByteView::new(Arena::Model, &bytes, Endianness::Big);
        assert_eq!(view.read_array::<u16>(0, 3).unwrap(), vec![1, 2, 3]);
        assert!(view.read_array::<u16>(2, 3).is_err());
    }

    #[test]
    fn reader_seeks_and_reads() {
        let mut reader = DataReader::new(Cursor::new(vec![0u8, 0, 0, 0, 0, 0, 0x12, 0x34])).unwrap();
        assert_eq!(reader.len(), 8);
        assert_eq!(reader.read_at::<u32>(4).unwrap(), 0x1234);

        let mut buf = [0u8; 2];
        reader.read_range(DataRange::new(6, 2), &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn reader_rejects_ranges_past_the_end() {
        let mut reader = DataReader::new(Cursor::new(vec![0u8; 8])).unwrap();
        let mut buf = [0u8; 4];
        assert!(matches!(
            reader.read_range(DataRange::new(6, 4), &mut buf),
            Err(CasmError::OutOfBounds {
                arena: Arena::DataFile,
                ..
            })
        ));
        assert!(reader.check(DataRange::new(u32::MAX, 1)).is_err());
    }
}
