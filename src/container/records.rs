//! Fixed-layout records stored in the container's tables.
//!
//! Every record is a run of 32-bit words. Float words are opaque to the
//! extractor and stay in their on-disk byte order; only the integer words are
//! listed in each kind's [`SwapRun`] layout and get normalized.

use winnow::Parser;
use winnow::binary::{le_i32, le_u32};
use winnow::token::take;

use crate::data::DataRange;
use crate::data::parser_utils::WResult;

/// Width of a swapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    U16,
    U32,
}

impl Width {
    pub const fn bytes(self) -> usize {
        match self {
            Width::U16 => 2,
            Width::U32 => 4,
        }
    }
}

/// `count` consecutive integer fields of `width` starting at byte `offset` of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapRun {
    pub offset: usize,
    pub width: Width,
    pub count: usize,
}

impl SwapRun {
    pub const fn words(first_word: usize, count: usize) -> Self {
        Self {
            offset: first_word * 4,
            width: Width::U32,
            count,
        }
    }

    pub const fn end(&self) -> usize {
        self.offset + self.width.bytes() * self.count
    }
}

/// The closed set of record layouts found in container tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Collision,
    SkyboxModel,
    TerrainLodModel,
    DataFile,
    ObjectTexture,
    TerrainModel,
    ObjectModel,
    TgldEntry,
    NameOffset,
}

impl RecordKind {
    pub const ALL: [RecordKind; 9] = [
        RecordKind::Collision,
        RecordKind::SkyboxModel,
        RecordKind::TerrainLodModel,
        RecordKind::DataFile,
        RecordKind::ObjectTexture,
        RecordKind::TerrainModel,
        RecordKind::ObjectModel,
        RecordKind::TgldEntry,
        RecordKind::NameOffset,
    ];

    /// Size of one record in bytes.
    pub const fn stride(self) -> usize {
        let words = match self {
            RecordKind::Collision => 22,
            RecordKind::SkyboxModel => 15,
            RecordKind::TerrainLodModel => 18,
            RecordKind::DataFile => 2,
            RecordKind::ObjectTexture => 5,
            RecordKind::TerrainModel => 19,
            RecordKind::ObjectModel => 16,
            RecordKind::TgldEntry => 14,
            RecordKind::NameOffset => 1,
        };
        words * 4
    }

    /// Integer fields that are byte swapped during normalization.
    pub const fn swap_layout(self) -> &'static [SwapRun] {
        match self {
            RecordKind::Collision => COLLISION_LAYOUT,
            RecordKind::SkyboxModel => SKYBOX_LAYOUT,
            RecordKind::TerrainLodModel => TERRAIN_LOD_LAYOUT,
            RecordKind::DataFile => DATA_FILE_LAYOUT,
            RecordKind::ObjectTexture => OBJECT_TEXTURE_LAYOUT,
            RecordKind::TerrainModel => TERRAIN_LAYOUT,
            RecordKind::ObjectModel => OBJECT_LAYOUT,
            RecordKind::TgldEntry => TGLD_LAYOUT,
            RecordKind::NameOffset => NAME_OFFSET_LAYOUT,
        }
    }
}

// 13 floats, offset, size, unk[3], nameOffset, unk[3]
const COLLISION_LAYOUT: &[SwapRun] = &[SwapRun::words(13, 9)];
// 13 floats, offset, size
const SKYBOX_LAYOUT: &[SwapRun] = &[SwapRun::words(13, 2)];
// 10 floats, offset, size, unk[2], 4 floats
const TERRAIN_LOD_LAYOUT: &[SwapRun] = &[SwapRun::words(10, 4)];
const DATA_FILE_LAYOUT: &[SwapRun] = &[SwapRun::words(0, 2)];
const OBJECT_TEXTURE_LAYOUT: &[SwapRun] = &[SwapRun::words(0, 5)];
// 9 floats, unk[2], 2 floats, offset, size, 4 floats
const TERRAIN_LAYOUT: &[SwapRun] = &[SwapRun::words(9, 2), SwapRun::words(13, 2)];
// 13 floats, offset, size, unk
const OBJECT_LAYOUT: &[SwapRun] = &[SwapRun::words(13, 3)];
// 6 floats, offset, size, unk[6]
const TGLD_LAYOUT: &[SwapRun] = &[SwapRun::words(6, 8)];
const NAME_OFFSET_LAYOUT: &[SwapRun] = &[SwapRun::words(0, 1)];

/// A record that can be read out of a normalized table.
pub trait Record: Sized {
    const KIND: RecordKind;

    /// Parse from exactly one normalized (little-endian) record.
    fn parse(input: &mut &[u8]) -> WResult<Self>;
}

fn skip_words(input: &mut &[u8], words: usize) -> WResult<()> {
    take(words * 4).void().parse_next(input)
}

fn parse_range(input: &mut &[u8]) -> WResult<DataRange> {
    let offset = le_u32.parse_next(input)?;
    let size = le_u32.parse_next(input)?;
    Ok(DataRange { offset, size })
}

/// Generic `(offset, size)` entry used for buffers, terrain textures, and effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFile {
    pub range: DataRange,
}

impl Record for DataFile {
    const KIND: RecordKind = RecordKind::DataFile;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        let range = parse_range(input)?;
        Ok(Self { range })
    }
}

/// An object texture with a mid-resolution and an optional near-resolution image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTextureFile {
    pub mid: DataRange,
    pub near: DataRange,
    pub unk: i32,
}

impl ObjectTextureFile {
    /// The near-resolution image when present, otherwise the mid-resolution one.
    pub fn best_range(&self) -> DataRange {
        if self.near.size != 0 {
            self.near
        } else {
            self.mid
        }
    }
}

impl Record for ObjectTextureFile {
    const KIND: RecordKind = RecordKind::ObjectTexture;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        let mid = parse_range(input)?;
        let near = parse_range(input)?;
        let unk = le_i32.parse_next(input)?;
        Ok(Self { mid, near, unk })
    }
}

/// A Havok collision blob with its name in the collision name table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmbeddedCollision {
    pub range: DataRange,
    pub name_offset: u32,
}

impl Record for EmbeddedCollision {
    const KIND: RecordKind = RecordKind::Collision;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 13)?;
        let range = parse_range(input)?;
        skip_words(input, 3)?;
        let name_offset = le_u32.parse_next(input)?;
        skip_words(input, 3)?;
        Ok(Self { range, name_offset })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkyboxModel {
    pub range: DataRange,
}

impl Record for SkyboxModel {
    const KIND: RecordKind = RecordKind::SkyboxModel;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 13)?;
        let range = parse_range(input)?;
        Ok(Self { range })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainLodModel {
    pub range: DataRange,
}

impl Record for TerrainLodModel {
    const KIND: RecordKind = RecordKind::TerrainLodModel;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 10)?;
        let range = parse_range(input)?;
        skip_words(input, 6)?;
        Ok(Self { range })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainModel {
    pub range: DataRange,
}

impl Record for TerrainModel {
    const KIND: RecordKind = RecordKind::TerrainModel;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 13)?;
        let range = parse_range(input)?;
        skip_words(input, 4)?;
        Ok(Self { range })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectModel {
    pub range: DataRange,
}

impl Record for ObjectModel {
    const KIND: RecordKind = RecordKind::ObjectModel;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 13)?;
        let range = parse_range(input)?;
        skip_words(input, 1)?;
        Ok(Self { range })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TgldEntry {
    pub range: DataRange,
}

impl Record for TgldEntry {
    const KIND: RecordKind = RecordKind::TgldEntry;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        skip_words(input, 6)?;
        let range = parse_range(input)?;
        skip_words(input, 6)?;
        Ok(Self { range })
    }
}

/// Root-relative offset of a TGLD name string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NameOffset(pub u32);

impl Record for NameOffset {
    const KIND: RecordKind = RecordKind::NameOffset;

    fn parse(input: &mut &[u8]) -> WResult<Self> {
        le_u32.map(NameOffset).parse_next(input)
    }
}
