//! In-place edits to a sub-model blob before its payload is written out.
//!
//! All offsets here are relative to the start of the blob, embedded header
//! included, and every field stays big-endian.

use winnow::binary::Endianness;

use crate::data::ByteView;
use crate::error::{Arena, CasmError, CasmResult};

fn view(blob: &[u8]) -> ByteView<'_> {
    ByteView::new(Arena::Model, blob, Endianness::Big)
}

fn to_offset(value: i32, what: &str) -> CasmResult<usize> {
    usize::try_from(value)
        .map_err(|_| CasmError::corrupt(format!("negative {what} offset {value}")))
}

fn put<const N: usize>(blob: &mut [u8], at: usize, bytes: [u8; N]) -> CasmResult<()> {
    let available = blob.len();
    let slot = at
        .checked_add(N)
        .and_then(|end| blob.get_mut(at..end))
        .ok_or(CasmError::OutOfBounds {
            arena: Arena::Model,
            offset: at as u64,
            len: N as u64,
            available: available as u64,
        })?;
    slot.copy_from_slice(&bytes);
    Ok(())
}

/// A 32-bit field holding an index into a buffer table, to be replaced with a stream offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferRef {
    /// Position of the field in the blob.
    pub at: usize,
    pub index: u32,
}

impl BufferRef {
    /// Overwrite the index with `offset`.
    pub fn rewrite(&self, blob: &mut [u8], offset: u32) -> CasmResult<()> {
        put(blob, self.at, offset.to_be_bytes())
    }
}

fn collect_refs(blob: &[u8], start: usize, count: usize) -> CasmResult<Vec<BufferRef>> {
    let indices = view(blob).read_array::<u32>(start, count)?;
    Ok(indices
        .into_iter()
        .enumerate()
        .map(|(i, index)| BufferRef {
            at: start + i * 4,
            index,
        })
        .collect())
}

/// The flat buffer index list of a map object.
pub fn object_buffer_refs(blob: &[u8], offset: i32, count: i32) -> CasmResult<Vec<BufferRef>> {
    if count <= 0 {
        return Ok(Vec::new());
    }
    let start = to_offset(offset, "external buffer ID")?;
    collect_refs(blob, start, count as usize)
}

/// The buffer lookup table of a map terrain.
///
/// The table starts with `(lookups_offset, lookup_count)`, the offset being
/// relative to the table itself. Each lookup holds two buffer indices; they
/// are returned in lookup order, slot 0 before slot 1.
pub fn terrain_buffer_refs(blob: &[u8], table_offset: i32) -> CasmResult<Vec<BufferRef>> {
    if table_offset == 0 {
        return Ok(Vec::new());
    }
    let table = to_offset(table_offset, "buffer lookup table")?;
    let view = view(blob);
    let lookups_offset = to_offset(view.read_at::<i32>(table)?, "buffer lookup")?;
    let lookup_count = view.read_at::<i32>(table + 4)?;
    if lookup_count <= 0 {
        return Ok(Vec::new());
    }

    let start = table
        .checked_add(lookups_offset)
        .ok_or_else(|| CasmError::corrupt("buffer lookup offset overflows"))?;
    collect_refs(blob, start, lookup_count as usize * 2)
}

/// Replace the container ID of each external texture with the entry it selects
/// in the texture container lookup table.
///
/// External textures are four 16-bit fields: texture ID, container ID,
/// external texture ID, and one unknown.
pub fn remap_texture_containers(
    blob: &mut [u8],
    textures_offset: i32,
    textures_count: i32,
    lookups_offset: i32,
) -> CasmResult<()> {
    if textures_count <= 0 {
        return Ok(());
    }
    let textures = to_offset(textures_offset, "external texture")?;
    let lookups = to_offset(lookups_offset, "texture container lookup")?;

    for i in 0..textures_count as usize {
        let field = textures + i * 8 + 2;
        let container_id = view(blob).read_at::<u16>(field)?;
        let lookup = view(blob).read_at::<u16>(lookups + container_id as usize * 2)?;
        put(blob, field, lookup.to_be_bytes())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_refs_and_rewrite() {
        let mut blob = vec![0u8; 0x20];
        blob[0x10..0x14].copy_from_slice(&5u32.to_be_bytes());
        blob[0x14..0x18].copy_from_slice(&2u32.to_be_bytes());

        let refs = object_buffer_refs(&blob, 0x10, 2).unwrap();
        assert_eq!(
            refs,
            vec![BufferRef { at: 0x10, index: 5 }, BufferRef { at: 0x14, index: 2 }]
        );

        refs[1].rewrite(&mut blob, 0x1234).unwrap();
        assert_eq!(blob[0x14..0x18], 0x1234u32.to_be_bytes());
        assert!(object_buffer_refs(&blob, 0x1C, 2).is_err());
        assert!(object_buffer_refs(&blob, 0, 0).unwrap().is_empty());
    }

    #[test]
    fn terrain_refs_visit_both_slots_in_order() {
        let mut blob = vec![0u8; 0x40];
        let table = 0x10;
        blob[table..table + 4].copy_from_slice(&8i32.to_be_bytes());
        blob[table + 4..table + 8].copy_from_slice(&2i32.to_be_bytes());
        for (i, index) in [4u32, 4, 1, 4].into_iter().enumerate() {
            let at = table + 8 + i * 4;
            blob[at..at + 4].copy_from_slice(&index.to_be_bytes());
        }

        let refs = terrain_buffer_refs(&blob, table as i32).unwrap();
        let indices: Vec<u32> = refs.iter().map(|r| r.index).collect();
        assert_eq!(indices, vec![4, 4, 1, 4]);
        assert_eq!(refs[2].at, table + 16);
    }

    #[test]
    fn container_ids_are_replaced_by_lookups() {
        let mut blob = vec![0u8; 0x30];
        // two textures at 0x00, container IDs 1 and 0
        blob[2..4].copy_from_slice(&1u16.to_be_bytes());
        blob[10..12].copy_from_slice(&0u16.to_be_bytes());
        // lookups at 0x20
        blob[0x20..0x22].copy_from_slice(&0x0007u16.to_be_bytes());
        blob[0x22..0x24].copy_from_slice(&0x0009u16.to_be_bytes());

        remap_texture_containers(&mut blob, 0, 2, 0x20).unwrap();
        assert_eq!(blob[2..4], 9u16.to_be_bytes());
        assert_eq!(blob[10..12], 7u16.to_be_bytes());
    }

    #[test]
    fn container_id_past_the_blob_fails() {
        let mut blob = vec![0u8; 0x10];
        blob[2..4].copy_from_slice(&0x100u16.to_be_bytes());
        assert!(matches!(
            remap_texture_containers(&mut blob, 0, 1, 8),
            Err(CasmError::OutOfBounds {
                arena: Arena::Model,
                ..
            })
        ));
    }
}
