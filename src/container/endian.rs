//! Big-endian to little-endian normalization of the root buffer.
//!
//! The root header words must be swapped first: the tables it points at can
//! only be located once their counts and offsets are readable. Each table is
//! then swapped record by record using its kind's [`SwapRun`] layout.

use std::ops::Range;

use tracing::warn;

use crate::container::TableKind;
use crate::container::header::{ROOT_HEADER_SIZE, ROOT_WORDS, RootHeader, TableRef};
use crate::container::records::SwapRun;
use crate::error::{Arena, CasmError, CasmResult};

const ROOT_LAYOUT: [SwapRun; 1] = [SwapRun::words(0, ROOT_WORDS)];

/// Reverse the byte order of every integer field `layout` describes.
///
/// Applying this twice with the same layout restores the original bytes.
pub fn swap_record(record: &mut [u8], layout: &[SwapRun]) {
    for run in layout {
        let width = run.width.bytes();
        for field in record[run.offset..run.end()].chunks_exact_mut(width) {
            field.reverse();
        }
    }
}

/// Byte range of a table inside an arena of `arena_len` bytes.
pub(crate) fn table_span(
    arena_len: usize,
    kind: TableKind,
    table: TableRef,
) -> CasmResult<Range<usize>> {
    let start = table.offset as usize;
    let len = (table.count as usize)
        .checked_mul(kind.record().stride())
        .ok_or_else(|| CasmError::corrupt(format!("{kind} table count {} overflows", table.count)))?;

    match start.checked_add(len) {
        Some(end) if end <= arena_len => Ok(start..end),
        _ => Err(CasmError::OutOfBounds {
            arena: Arena::Container,
            offset: start as u64,
            len: len as u64,
            available: arena_len as u64,
        }),
    }
}

/// Normalize the root header and every table it exposes, in place.
///
/// Tables with a zero count are never dereferenced. A table that does not fit
/// in the arena is left untouched; resolving it later reports the error to the
/// driver that needs it.
pub fn normalize(arena: &mut [u8]) -> CasmResult<RootHeader> {
    if arena.len() < ROOT_HEADER_SIZE {
        return Err(CasmError::OutOfBounds {
            arena: Arena::Container,
            offset: 0,
            len: ROOT_HEADER_SIZE as u64,
            available: arena.len() as u64,
        });
    }

    swap_record(&mut arena[..ROOT_HEADER_SIZE], &ROOT_LAYOUT);
    let input = &mut &arena[..ROOT_HEADER_SIZE];
    let root = RootHeader::parse(input).map_err(|e| CasmError::corrupt(format!("root header: {e}")))?;

    for kind in TableKind::ALL {
        let table = root.table(kind);
        if table.count == 0 {
            continue;
        }

        let span = match table_span(arena.len(), kind, table) {
            Ok(span) => span,
            Err(err) => {
                warn!(table = %kind, "not normalizing table: {err}");
                continue;
            }
        };

        let record = kind.record();
        for chunk in arena[span].chunks_exact_mut(record.stride()) {
            swap_record(chunk, record.swap_layout());
        }
    }

    Ok(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::records::{RecordKind, Width};

    fn patterned(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 + 3) as u8).collect()
    }

    #[test]
    fn double_swap_is_identity_for_every_kind() {
        for kind in RecordKind::ALL {
            let original = patterned(kind.stride());
            let mut record = original.clone();
            swap_record(&mut record, kind.swap_layout());
            assert_ne!(record, original, "{kind:?} layout swapped nothing");
            swap_record(&mut record, kind.swap_layout());
            assert_eq!(record, original, "{kind:?}");
        }
    }

    #[test]
    fn floats_are_left_alone() {
        let original = patterned(RecordKind::SkyboxModel.stride());
        let mut record = original.clone();
        swap_record(&mut record, RecordKind::SkyboxModel.swap_layout());

        // 13 float words pass through, offset and size are reversed.
        assert_eq!(record[..52], original[..52]);
        let mut offset = original[52..56].to_vec();
        offset.reverse();
        assert_eq!(record[52..56], offset[..]);
    }

    #[test]
    fn half_word_runs_swap_pairs() {
        let layout = [SwapRun {
            offset: 2,
            width: Width::U16,
            count: 2,
        }];
        let mut record = [0, 1, 2, 3, 4, 5, 6, 7];
        swap_record(&mut record, &layout);
        assert_eq!(record, [0, 1, 3, 2, 5, 4, 6, 7]);
    }

    #[test]
    fn normalize_swaps_header_then_tables() {
        let mut arena = vec![0u8; ROOT_HEADER_SIZE + 16];
        arena[..4].copy_from_slice(b"MSMD");
        // effects table: count 2 at word 44, offset at word 45
        arena[44 * 4..45 * 4].copy_from_slice(&2u32.to_be_bytes());
        arena[45 * 4..46 * 4].copy_from_slice(&(ROOT_HEADER_SIZE as u32).to_be_bytes());
        let table = ROOT_HEADER_SIZE;
        arena[table..table + 4].copy_from_slice(&0x10u32.to_be_bytes());
        arena[table + 4..table + 8].copy_from_slice(&0x20u32.to_be_bytes());

        let root = normalize(&mut arena).unwrap();
        assert_eq!(root.effects.count, 2);
        assert_eq!(root.magic, u32::from_le_bytes(*b"DMSM"));
        assert_eq!(arena[table..table + 4], 0x10u32.to_le_bytes());
        assert_eq!(arena[table + 4..table + 8], 0x20u32.to_le_bytes());
    }

    #[test]
    fn out_of_bounds_table_is_skipped() {
        let mut arena = vec![0u8; ROOT_HEADER_SIZE];
        arena[44 * 4..45 * 4].copy_from_slice(&100u32.to_be_bytes());
        arena[45 * 4..46 * 4].copy_from_slice(&0x10u32.to_be_bytes());
        let root = normalize(&mut arena).unwrap();
        assert!(table_span(arena.len(), TableKind::Effects, root.effects).is_err());
    }

    #[test]
    fn short_arena_is_rejected() {
        let mut arena = vec![0u8; 16];
        assert!(normalize(&mut arena).is_err());
    }
}
