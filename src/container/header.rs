//! The fixed-layout `DMSM` root header at the start of a `.casmhd` container.

use winnow::Parser;
use winnow::binary::le_u32;
use winnow::token::take;

use crate::container::TableKind;
use crate::data::parser_utils::WResult;

/// First four bytes of every supported container. Read as a big-endian word this is `DMSM`.
pub const CONTAINER_MAGIC: [u8; 4] = *b"MSMD";
/// Number of 32-bit words in the root header.
pub const ROOT_WORDS: usize = 54;
pub const ROOT_HEADER_SIZE: usize = ROOT_WORDS * 4;

/// A `(count, offset)` pair locating one table inside the root buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableRef {
    pub count: u32,
    pub offset: u32,
}

/// Parsed root header. Only valid once the header words have been normalized.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RootHeader {
    pub magic: u32,
    pub version: u32,
    pub terrain_models: TableRef,
    pub object_models: TableRef,
    pub collisions: TableRef,
    pub skybox_models: TableRef,
    pub object_buffers: TableRef,
    pub object_textures: TableRef,
    /// Base of the collision name strings; each collision adds its own `name_offset`.
    pub collision_names_offset: u32,
    pub grass: TableRef,
    pub unknown3: TableRef,
    pub unknown4: TableRef,
    pub tgld_names: TableRef,
    pub tgld_internal_offset: u32,
    pub tgld: TableRef,
    pub cached_textures: TableRef,
    pub terrain_textures: TableRef,
    pub bvsc_offset: u32,
    pub null_offset: u32,
    pub lcmd_offset: u32,
    pub lcmd_size: u32,
    pub effects: TableRef,
    pub terrain_lods: TableRef,
    pub unknown5: TableRef,
    pub terrain_buffers: TableRef,
    pub cems_offset: u32,
}

fn table_ref(input: &mut &[u8]) -> WResult<TableRef> {
    let count = le_u32.parse_next(input)?;
    let offset = le_u32.parse_next(input)?;
    Ok(TableRef { count, offset })
}

fn reserved(input: &mut &[u8], words: usize) -> WResult<()> {
    take(words * 4).void().parse_next(input)
}

impl RootHeader {
    pub fn parse(input: &mut &[u8]) -> WResult<Self> {
        let magic = le_u32.parse_next(input)?;
        let version = le_u32.parse_next(input)?;
        reserved(input, 4)?;
        let terrain_models = table_ref(input)?;
        let object_models = table_ref(input)?;
        let collisions = table_ref(input)?;
        let skybox_models = table_ref(input)?;
        reserved(input, 6)?;
        let object_buffers = table_ref(input)?;
        let object_textures = table_ref(input)?;
        let collision_names_offset = le_u32.parse_next(input)?;
        let grass = table_ref(input)?;
        let unknown3 = table_ref(input)?;
        let unknown4 = table_ref(input)?;
        let tgld_names = table_ref(input)?;
        let tgld_internal_offset = le_u32.parse_next(input)?;
        let tgld = table_ref(input)?;
        let cached_textures = table_ref(input)?;
        let terrain_textures = table_ref(input)?;
        let bvsc_offset = le_u32.parse_next(input)?;
        let null_offset = le_u32.parse_next(input)?;
        let lcmd_offset = le_u32.parse_next(input)?;
        let lcmd_size = le_u32.parse_next(input)?;
        let effects = table_ref(input)?;
        let terrain_lods = table_ref(input)?;
        reserved(input, 1)?;
        let unknown5 = table_ref(input)?;
        let terrain_buffers = table_ref(input)?;
        let cems_offset = le_u32.parse_next(input)?;

        Ok(Self {
            magic,
            version,
            terrain_models,
            object_models,
            collisions,
            skybox_models,
            object_buffers,
            object_textures,
            collision_names_offset,
            grass,
            unknown3,
            unknown4,
            tgld_names,
            tgld_internal_offset,
            tgld,
            cached_textures,
            terrain_textures,
            bvsc_offset,
            null_offset,
            lcmd_offset,
            lcmd_size,
            effects,
            terrain_lods,
            unknown5,
            terrain_buffers,
            cems_offset,
        })
    }

    pub fn table(&self, kind: TableKind) -> TableRef {
        match kind {
            TableKind::TerrainModels => self.terrain_models,
            TableKind::ObjectModels => self.object_models,
            TableKind::Collisions => self.collisions,
            TableKind::SkyboxModels => self.skybox_models,
            TableKind::ObjectBuffers => self.object_buffers,
            TableKind::ObjectTextures => self.object_textures,
            TableKind::TgldNames => self.tgld_names,
            TableKind::Tgld => self.tgld,
            TableKind::CachedTextures => self.cached_textures,
            TableKind::TerrainTextures => self.terrain_textures,
            TableKind::Effects => self.effects,
            TableKind::TerrainLods => self.terrain_lods,
            TableKind::TerrainBuffers => self.terrain_buffers,
        }
    }
}
