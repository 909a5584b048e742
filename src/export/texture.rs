//! Cached and uncached texture extraction.
//!
//! A cached texture entry points at a small header in the companion file
//! listing up to [`CACHED_SLOTS`] textures. Each slot is either stored inline
//! after that header or redirected to an entry of the uncached texture table.

use std::io::{Read, Seek};
use std::ops::Range;
use std::path::Path;

use tracing::{debug, info};
use winnow::Parser;
use winnow::binary::{be_i32, be_u32};
use winnow::token::take;

use crate::container::{Container, Table};
use crate::container::records::DataFile;
use crate::data::parser_utils::WResult;
use crate::data::{DataRange, DataReader};
use crate::error::{CasmError, CasmResult};
use crate::export::queue::{TextureJob, TexturePipeline};
use crate::export::{DriverReport, create_dir};

/// Capacity of a cached texture header.
pub const CACHED_SLOTS: usize = 254;
const PREAMBLE_SIZE: usize = 8 * 4;
const SLOT_SIZE: usize = 4 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedSlot {
    pub size: u32,
    /// Relative to the cached entry's own offset.
    pub offset: u32,
    /// Negative for inline slots, otherwise an index into the uncached table.
    pub uncached_id: i32,
    pub unk: i32,
}

impl CachedSlot {
    fn parse(input: &mut &[u8]) -> WResult<Self> {
        let size = be_u32.parse_next(input)?;
        let offset = be_u32.parse_next(input)?;
        let uncached_id = be_i32.parse_next(input)?;
        let unk = be_i32.parse_next(input)?;
        Ok(Self {
            size,
            offset,
            uncached_id,
            unk,
        })
    }

    /// The companion file range this slot's texture lives in.
    pub fn resolve(&self, entry: DataRange, uncached: &Table<'_, DataFile>) -> CasmResult<DataRange> {
        match usize::try_from(self.uncached_id) {
            Ok(id) => Ok(uncached.get(id)?.range),
            Err(_) => {
                let offset = entry.offset.checked_add(self.offset).ok_or_else(|| {
                    CasmError::corrupt(format!(
                        "inline texture offset 0x{:X} overflows from entry at 0x{:X}",
                        self.offset, entry.offset
                    ))
                })?;
                Ok(DataRange::new(offset, self.size))
            }
        }
    }
}

/// The used slots of a cached texture header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedTextureHeader {
    pub slots: Vec<CachedSlot>,
}

impl CachedTextureHeader {
    /// Read the header at `offset`, touching only the slots in use.
    pub fn read<R: Read + Seek>(data: &mut DataReader<R>, offset: u32) -> CasmResult<Self> {
        let count = data.read_at::<u32>(offset as u64)? as usize;
        if count > CACHED_SLOTS {
            return Err(CasmError::corrupt(format!(
                "cached texture header at 0x{offset:X} lists {count} textures (max {CACHED_SLOTS})"
            )));
        }

        let len = PREAMBLE_SIZE + count * SLOT_SIZE;
        let mut buf = vec![0u8; len];
        data.read_range(DataRange::new(offset, len as u32), &mut buf)?;
        Self::parse(&mut &buf[..], count)
            .map_err(|e| CasmError::corrupt(format!("cached texture header at 0x{offset:X}: {e}")))
    }

    fn parse(input: &mut &[u8], count: usize) -> WResult<Self> {
        take(PREAMBLE_SIZE).void().parse_next(input)?;
        let slots = (0..count)
            .map(|_| CachedSlot::parse(input))
            .collect::<WResult<Vec<_>>>()?;
        Ok(Self { slots })
    }
}

/// Read `ranges` back to back into `scratch`, returning where each one landed.
fn gather<R: Read + Seek>(
    data: &mut DataReader<R>,
    ranges: &[DataRange],
    scratch: &mut [u8],
) -> CasmResult<Vec<Range<usize>>> {
    let mut cursor = 0;
    let mut spans = Vec::with_capacity(ranges.len());
    for &range in ranges {
        let span = cursor..cursor + range.len();
        data.read_range(range, &mut scratch[span.clone()])?;
        cursor = span.end;
        spans.push(span);
    }
    Ok(spans)
}

fn jobs<'a>(scratch: &'a [u8], spans: &[Range<usize>], dir: &Path) -> Vec<TextureJob<'a>> {
    spans
        .iter()
        .enumerate()
        .map(|(n, span)| TextureJob {
            ranges: vec![&scratch[span.clone()]],
            output: dir.join(format!("{n:03}")),
        })
        .collect()
}

/// Extract every cached texture entry into `dir/<entry>/NNN`.
pub fn extract_cached<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
    pipeline: &TexturePipeline,
) -> CasmResult<DriverReport> {
    let entries = container.cached_textures()?.to_vec()?;
    let uncached = container.terrain_textures()?;
    info!(entries = entries.len(), "extracting cached textures");

    let mut resolved = Vec::with_capacity(entries.len());
    for entry in &entries {
        let header = CachedTextureHeader::read(data, entry.range.offset)?;
        let ranges = header
            .slots
            .iter()
            .map(|slot| slot.resolve(entry.range, &uncached))
            .collect::<CasmResult<Vec<_>>>()?;
        resolved.push(ranges);
    }

    let largest = resolved
        .iter()
        .map(|ranges| ranges.iter().map(DataRange::len).sum::<usize>())
        .max()
        .unwrap_or(0);
    let mut scratch = vec![0u8; largest];

    let mut report = DriverReport::default();
    for (i, ranges) in resolved.iter().enumerate() {
        let entry_dir = dir.join(i.to_string());
        if let Err(err) = create_dir(&entry_dir) {
            report.record(Err(err))?;
            continue;
        }

        let spans = gather(data, ranges, &mut scratch)?;
        debug!(entry = i, textures = spans.len(), "converting cached textures");
        report.merge(pipeline.run(&jobs(&scratch, &spans, &entry_dir)));
    }

    Ok(report)
}

/// Extract every object texture into `dir/NNN`, preferring the near-resolution image.
pub fn extract_uncached<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
    pipeline: &TexturePipeline,
) -> CasmResult<DriverReport> {
    let ranges = container
        .object_textures()?
        .iter()
        .map(|texture| texture.map(|t| t.best_range()))
        .collect::<CasmResult<Vec<_>>>()?;
    info!(entries = ranges.len(), "extracting uncached textures");

    let total = ranges.iter().map(DataRange::len).sum();
    let mut scratch = vec![0u8; total];
    let spans = gather(data, &ranges, &mut scratch)?;
    Ok(pipeline.run(&jobs(&scratch, &spans, dir)))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn slot(size: u32, offset: u32, uncached_id: i32) -> CachedSlot {
        CachedSlot {
            size,
            offset,
            uncached_id,
            unk: 0,
        }
    }

    /// Container whose terrain texture table holds `(0x900, 0x40)` and `(0xA00, 0x80)`.
    fn container() -> Container {
        let mut arena = vec![0u8; crate::container::header::ROOT_HEADER_SIZE];
        arena[..4].copy_from_slice(b"MSMD");
        let table = arena.len() as u32;
        for word in [0x900u32, 0x40, 0xA00, 0x80] {
            arena.extend_from_slice(&word.to_be_bytes());
        }
        arena[38 * 4..39 * 4].copy_from_slice(&2u32.to_be_bytes());
        arena[39 * 4..40 * 4].copy_from_slice(&table.to_be_bytes());
        Container::from_bytes(arena).unwrap()
    }

    #[test]
    fn inline_slot_resolves_against_its_entry() {
        let container = container();
        let uncached = container.terrain_textures().unwrap();
        let entry = DataRange::new(0x1000, 0x400);

        let range = slot(0x20, 0x100, -1).resolve(entry, &uncached).unwrap();
        assert_eq!(range, DataRange::new(0x1100, 0x20));
    }

    #[test]
    fn indirect_slot_ignores_its_own_fields() {
        let container = container();
        let uncached = container.terrain_textures().unwrap();
        let entry = DataRange::new(0x1000, 0x400);

        let range = slot(0x20, 0x100, 1).resolve(entry, &uncached).unwrap();
        assert_eq!(range, DataRange::new(0xA00, 0x80));
        assert!(matches!(
            slot(0, 0, 2).resolve(entry, &uncached),
            Err(CasmError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn header_reads_only_used_slots() {
        let mut file = vec![0u8; 0x10];
        let offset = file.len() as u32;
        file.extend_from_slice(&2u32.to_be_bytes());
        file.extend_from_slice(&[0u8; 28]);
        for word in [0x10u32, 0x40, u32::MAX, 0, 0x20, 0, 3, 0] {
            file.extend_from_slice(&word.to_be_bytes());
        }

        let mut data = DataReader::new(Cursor::new(file)).unwrap();
        let header = CachedTextureHeader::read(&mut data, offset).unwrap();
        assert_eq!(header.slots, vec![slot(0x10, 0x40, -1), slot(0x20, 0, 3)]);
    }

    #[test]
    fn oversized_header_is_corrupt() {
        let mut data = DataReader::new(Cursor::new(1000u32.to_be_bytes().to_vec())).unwrap();
        assert!(matches!(
            CachedTextureHeader::read(&mut data, 0),
            Err(CasmError::CorruptContainer { .. })
        ));
    }
}
