//! The `.casmhd` container: a big-endian root header of `(count, offset)`
//! pairs, each locating a table of fixed-size records inside the same buffer.
//!
//! A [`Container`] owns the whole buffer. It is normalized once on load and
//! only ever read afterwards; tables are reached through the typed accessors in
//! [`directory`].

/// Typed table views and name lookups
pub mod directory;
/// In-place byte order normalization
pub mod endian;
/// Root header layout
pub mod header;
/// Table record layouts
pub mod records;

use std::path::Path;

use winnow::binary::Endianness;

pub use directory::{Table, TableKind};
pub use header::{CONTAINER_MAGIC, RootHeader, TableRef};

use crate::data::ByteView;
use crate::error::{Arena, CasmError, CasmResult};

#[derive(Debug)]
pub struct Container {
    arena: Vec<u8>,
    root: RootHeader,
}

impl Container {
    /// Validate the magic and normalize `arena` into a readable container.
    pub fn from_bytes(mut arena: Vec<u8>) -> CasmResult<Self> {
        let magic = arena.get(..4).unwrap_or_default();
        if magic != CONTAINER_MAGIC {
            let mut actual = [0u8; 4];
            actual[..magic.len()].copy_from_slice(magic);
            return Err(CasmError::InvalidMagic {
                actual: u32::from_be_bytes(actual),
                expected: u32::from_be_bytes(CONTAINER_MAGIC),
            });
        }

        let root = endian::normalize(&mut arena)?;
        Ok(Self { arena, root })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> CasmResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn root(&self) -> &RootHeader {
        &self.root
    }

    pub fn view(&self) -> ByteView<'_> {
        ByteView::new(Arena::Container, &self.arena, Endianness::Little)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::header::ROOT_HEADER_SIZE;
    use crate::data::DataRange;

    fn put(arena: &mut [u8], word: usize, value: u32) {
        arena[word * 4..word * 4 + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Root header with an effects table of two entries, a TGLD name table, and string data.
    fn sample() -> Vec<u8> {
        let mut arena = vec![0u8; ROOT_HEADER_SIZE];
        arena[..4].copy_from_slice(b"MSMD");

        let effects = arena.len();
        arena.extend_from_slice(&0x100u32.to_be_bytes());
        arena.extend_from_slice(&0x10u32.to_be_bytes());
        arena.extend_from_slice(&0x200u32.to_be_bytes());
        arena.extend_from_slice(&0x20u32.to_be_bytes());
        put(&mut arena, 44, 2);
        put(&mut arena, 45, effects as u32);

        let names = arena.len();
        let strings = names + 8;
        arena.extend_from_slice(&(strings as u32).to_be_bytes());
        arena.extend_from_slice(&((strings + 5) as u32).to_be_bytes());
        arena.extend_from_slice(b"road\0tree\0");
        put(&mut arena, 31, 2);
        put(&mut arena, 32, names as u32);

        arena
    }

    #[test]
    fn rejects_bad_magic() {
        let mut arena = sample();
        arena[..4].copy_from_slice(b"XXXX");
        assert!(matches!(
            Container::from_bytes(arena),
            Err(CasmError::InvalidMagic { .. })
        ));
        assert!(matches!(
            Container::from_bytes(vec![b'M', b'S']),
            Err(CasmError::InvalidMagic { .. })
        ));
    }

    #[test]
    fn resolves_tables_after_normalizing() {
        let container = Container::from_bytes(sample()).unwrap();
        let effects = container.effects().unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects.get(1).unwrap().range, DataRange::new(0x200, 0x20));
        assert!(matches!(
            effects.get(2),
            Err(CasmError::IndexOutOfRange {
                table: TableKind::Effects,
                index: 2,
                count: 2
            })
        ));
        assert!(container.skybox_models().unwrap().is_empty());
    }

    #[test]
    fn resolves_tgld_names() {
        let container = Container::from_bytes(sample()).unwrap();
        assert_eq!(container.tgld_name(0).unwrap(), "road");
        assert_eq!(container.tgld_name(1).unwrap(), "tree");
        assert!(matches!(
            container.tgld_name(2),
            Err(CasmError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn out_of_range_name_is_corruption() {
        let mut arena = sample();
        let names = u32::from_be_bytes(arena[32 * 4..33 * 4].try_into().unwrap()) as usize;
        arena[names..names + 4].copy_from_slice(&0xFFFF_0000u32.to_be_bytes());
        let container = Container::from_bytes(arena).unwrap();
        assert!(matches!(
            container.tgld_name(0),
            Err(CasmError::CorruptContainer { .. })
        ));
    }

    #[test]
    fn table_past_the_end_fails_to_resolve() {
        let mut arena = sample();
        put(&mut arena, 44, 1000);
        let container = Container::from_bytes(arena).unwrap();
        assert!(matches!(
            container.effects(),
            Err(CasmError::OutOfBounds {
                arena: Arena::Container,
                ..
            })
        ));
    }
}
