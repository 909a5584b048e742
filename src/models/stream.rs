//! Sidecar `.stream` output and the registry that keeps shared buffers from being written twice.

use std::collections::HashMap;
use std::io::{self, Write};

/// A writer that tracks how many bytes have been appended so far.
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> StreamWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    /// Append `bytes` and return the stream offset they start at.
    pub fn append(&mut self, bytes: &[u8]) -> io::Result<u64> {
        let offset = self.position;
        self.inner.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(offset)
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Maps a source buffer index to the offset its bytes were written at in the current stream.
///
/// One registry covers exactly one output stream. Offsets from different
/// streams are meaningless to each other, so drivers create a fresh registry
/// per model.
#[derive(Debug, Default)]
pub struct BufferRegistry {
    offsets: HashMap<u32, u32>,
    order: Vec<u32>,
}

impl BufferRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the output offset of `source_index`, calling `write` only the first time it is seen.
    ///
    /// `write` must append the buffer to the stream and return the offset it
    /// was written at. If it fails nothing is recorded.
    pub fn intern<E>(
        &mut self,
        source_index: u32,
        write: impl FnOnce() -> Result<u32, E>,
    ) -> Result<u32, E> {
        if let Some(&offset) = self.offsets.get(&source_index) {
            return Ok(offset);
        }

        let offset = write()?;
        self.offsets.insert(source_index, offset);
        self.order.push(source_index);
        Ok(offset)
    }

    pub fn get(&self, source_index: u32) -> Option<u32> {
        self.offsets.get(&source_index).copied()
    }

    /// Source indices in the order they were first written.
    pub fn written(&self) -> &[u32] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;

    use super::*;

    #[test]
    fn repeated_references_write_once() {
        // Buffer n is n * 0x10 bytes long.
        let mut stream = StreamWriter::new(Vec::new());
        let mut registry = BufferRegistry::new();
        let mut writes = Vec::new();

        let resolved: Vec<u32> = [3u32, 1, 3, 2, 1]
            .into_iter()
            .map(|index| {
                registry
                    .intern(index, || {
                        writes.push(index);
                        let bytes = vec![index as u8; index as usize * 0x10];
                        Ok::<_, io::Error>(stream.append(&bytes)? as u32)
                    })
                    .unwrap()
            })
            .collect();

        assert_eq!(writes, vec![3, 1, 2]);
        assert_eq!(registry.written(), &[3, 1, 2]);
        assert_eq!(resolved, vec![0, 0x30, 0, 0x40, 0x30]);
        assert_eq!(stream.position(), 0x60);

        let bytes = stream.into_inner();
        assert!(bytes[..0x30].iter().all(|&b| b == 3));
        assert!(bytes[0x30..0x40].iter().all(|&b| b == 1));
        assert!(bytes[0x40..].iter().all(|&b| b == 2));
    }

    #[test]
    fn failed_write_is_not_recorded() {
        let mut registry = BufferRegistry::new();
        let failed = registry.intern(7, || Err::<u32, _>("read failed"));
        assert!(failed.is_err());
        assert!(registry.get(7).is_none());

        let offset = registry.intern(7, || Ok::<_, Infallible>(0x80)).unwrap();
        assert_eq!(offset, 0x80);
        assert_eq!(registry.len(), 1);
    }
}
