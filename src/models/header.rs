//! Embedded sub-model headers and the standalone `MXMD` header they are rewritten into.
//!
//! Sub-models stored in the companion file start with a kind-specific header.
//! On export that header is replaced by a standalone [`MxmdHeader`] and every
//! offset is shifted by the kind's declared delta.

use winnow::Parser;
use winnow::binary::{be_i16, be_i32};

use crate::data::parser_utils::{WResult, be_words};
use crate::error::{CasmError, CasmResult};

pub const MXMD_MAGIC: [u8; 4] = *b"MXMD";
pub const MXMD_VERSION: u32 = 10040;
pub const MXMD_HEADER_SIZE: usize = 72;

/// The sub-model kinds that carry an embedded header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Skybox,
    TerrainLod,
    MapObject,
    MapTerrain,
}

impl ModelKind {
    pub const ALL: [ModelKind; 4] = [
        ModelKind::Skybox,
        ModelKind::TerrainLod,
        ModelKind::MapObject,
        ModelKind::MapTerrain,
    ];

    /// Size of the header at the start of the extracted blob.
    pub const fn embedded_header_size(self) -> usize {
        match self {
            ModelKind::Skybox => SkyboxHeader::SIZE,
            ModelKind::TerrainLod => TerrainLodHeader::SIZE,
            ModelKind::MapObject => MapObjectHeader::SIZE,
            ModelKind::MapTerrain => MapTerrainHeader::SIZE,
        }
    }

    /// Amount subtracted from embedded offsets when writing a standalone header.
    ///
    /// These are fixed per kind for the shipped container version rather than
    /// derived from the header sizes.
    pub const fn offset_delta(self) -> i32 {
        match self {
            ModelKind::Skybox => -8,
            ModelKind::TerrainLod => 0,
            ModelKind::MapObject => 36,
            ModelKind::MapTerrain => 20,
        }
    }

    /// Shift an embedded offset into the standalone layout. Zero means absent and stays zero.
    pub const fn rebase(self, offset: i32) -> i32 {
        if offset == 0 {
            0
        } else {
            offset - self.offset_delta()
        }
    }
}

/// Header of a standalone model file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MxmdHeader {
    pub models_offset: i32,
    pub materials_offset: i32,
    pub unk_offset0: i32,
    pub vertex_buffer_offset: i32,
    pub shaders_offset: i32,
    pub cached_textures_offset: i32,
    pub unk_offset1: i32,
    pub external_textures_offset: i32,
    pub external_textures_count: i32,
    pub external_buffer_ids_offset: i32,
    pub external_buffer_ids_count: i32,
    pub instances_offset: i32,
}

impl MxmdHeader {
    /// Serialize as big-endian, matching the rest of the model payload.
    pub fn to_bytes(&self) -> [u8; MXMD_HEADER_SIZE] {
        let fields = [
            self.models_offset,
            self.materials_offset,
            self.unk_offset0,
            self.vertex_buffer_offset,
            self.shaders_offset,
            self.cached_textures_offset,
            self.unk_offset1,
            self.external_textures_offset,
            self.external_textures_count,
            self.external_buffer_ids_offset,
            self.external_buffer_ids_count,
            self.instances_offset,
        ];

        let mut out = [0u8; MXMD_HEADER_SIZE];
        out[..4].copy_from_slice(&MXMD_MAGIC);
        out[4..8].copy_from_slice(&MXMD_VERSION.to_be_bytes());
        for (slot, value) in out[8..].chunks_exact_mut(4).zip(fields) {
            slot.copy_from_slice(&value.to_be_bytes());
        }
        out
    }
}

fn parse_embedded<T>(
    blob: &[u8],
    kind: ModelKind,
    parser: fn(&mut &[u8]) -> WResult<T>,
) -> CasmResult<T> {
    let size = kind.embedded_header_size();
    let header = blob.get(..size).ok_or_else(|| {
        CasmError::corrupt(format!(
            "{kind:?} blob is 0x{:X} bytes, smaller than its 0x{size:X} byte header",
            blob.len()
        ))
    })?;
    parser(&mut &header[..]).map_err(|e| CasmError::corrupt(format!("{kind:?} header: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkyboxHeader {
    pub models_offset: i32,
    pub materials_offset: i32,
    pub unk_offset0: i32,
    pub vertex_buffer_offset: i32,
    pub cached_textures_offset: i32,
    pub shaders_offset: i32,
}

impl SkyboxHeader {
    pub const SIZE: usize = 64;

    fn parse_fields(input: &mut &[u8]) -> WResult<Self> {
        let [models_offset, materials_offset, unk_offset0, vertex_buffer_offset] =
            be_words::<4>(input)?;
        let cached_textures_offset = be_i32.parse_next(input)?;
        let _null = be_i32.parse_next(input)?;
        let shaders_offset = be_i32.parse_next(input)?;
        be_words::<9>(input)?;
        Ok(Self {
            models_offset,
            materials_offset,
            unk_offset0,
            vertex_buffer_offset,
            cached_textures_offset,
            shaders_offset,
        })
    }

    pub fn parse(blob: &[u8]) -> CasmResult<Self> {
        parse_embedded(blob, ModelKind::Skybox, Self::parse_fields)
    }

    pub fn to_standalone(&self) -> MxmdHeader {
        let kind = ModelKind::Skybox;
        MxmdHeader {
            models_offset: kind.rebase(self.models_offset),
            materials_offset: kind.rebase(self.materials_offset),
            unk_offset0: kind.rebase(self.unk_offset0),
            vertex_buffer_offset: kind.rebase(self.vertex_buffer_offset),
            cached_textures_offset: kind.rebase(self.cached_textures_offset),
            shaders_offset: kind.rebase(self.shaders_offset),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TerrainLodHeader {
    pub models_offset: i32,
    pub materials_offset: i32,
    pub unk_offset0: i32,
    pub vertex_buffer_offset: i32,
    pub cached_textures_offset: i32,
    pub shaders_offset: i32,
    pub indices_offset: i32,
    pub indices_count: i32,
}

impl TerrainLodHeader {
    pub const SIZE: usize = 72;

    fn parse_fields(input: &mut &[u8]) -> WResult<Self> {
        be_words::<2>(input)?;
        let [models_offset, materials_offset, unk_offset0] = be_words::<3>(input)?;
        let _null = be_i32.parse_next(input)?;
        let [
            vertex_buffer_offset,
            cached_textures_offset,
            shaders_offset,
            indices_offset,
            indices_count,
        ] = be_words::<5>(input)?;
        be_words::<7>(input)?;
        Ok(Self {
            models_offset,
            materials_offset,
            unk_offset0,
            vertex_buffer_offset,
            cached_textures_offset,
            shaders_offset,
            indices_offset,
            indices_count,
        })
    }

    pub fn parse(blob: &[u8]) -> CasmResult<Self> {
        parse_embedded(blob, ModelKind::TerrainLod, Self::parse_fields)
    }

    pub fn to_standalone(&self) -> MxmdHeader {
        let kind = ModelKind::TerrainLod;
        MxmdHeader {
            models_offset: kind.rebase(self.models_offset),
            materials_offset: kind.rebase(self.materials_offset),
            unk_offset0: kind.rebase(self.unk_offset0),
            vertex_buffer_offset: kind.rebase(self.vertex_buffer_offset),
            cached_textures_offset: kind.rebase(self.cached_textures_offset),
            shaders_offset: kind.rebase(self.shaders_offset),
            ..Default::default()
        }
    }
}

/// Header of a map object sub-model. Offsets are relative to the start of the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapObjectHeader {
    pub unk00: i16,
    pub unk01: i16,
    pub models_offset: i32,
    pub materials_offset: i32,
    pub unk_offset0: i32,
    pub instances_offset: i32,
    pub external_textures_offset: i32,
    pub external_textures_count: i32,
    pub external_buffer_ids_offset: i32,
    pub external_buffer_ids_count: i32,
    pub shaders_offset: i32,
    pub texture_container_lookups_offset: i32,
    pub texture_container_lookups_count: i32,
}

impl MapObjectHeader {
    pub const SIZE: usize = 104;

    fn parse_fields(input: &mut &[u8]) -> WResult<Self> {
        let unk00 = be_i16.parse_next(input)?;
        let unk01 = be_i16.parse_next(input)?;
        be_words::<2>(input)?;
        let [models_offset, materials_offset, unk_offset0, instances_offset] =
            be_words::<4>(input)?;
        let _unk03 = be_i32.parse_next(input)?;
        let [
            external_textures_offset,
            external_textures_count,
            external_buffer_ids_offset,
            external_buffer_ids_count,
        ] = be_words::<4>(input)?;
        be_words::<5>(input)?;
        let [
            shaders_offset,
            texture_container_lookups_offset,
            texture_container_lookups_count,
        ] = be_words::<3>(input)?;
        be_words::<6>(input)?;
        Ok(Self {
            unk00,
            unk01,
            models_offset,
            materials_offset,
            unk_offset0,
            instances_offset,
            external_textures_offset,
            external_textures_count,
            external_buffer_ids_offset,
            external_buffer_ids_count,
            shaders_offset,
            texture_container_lookups_offset,
            texture_container_lookups_count,
        })
    }

    pub fn parse(blob: &[u8]) -> CasmResult<Self> {
        parse_embedded(blob, ModelKind::MapObject, Self::parse_fields)
    }

    pub fn to_standalone(&self) -> MxmdHeader {
        let kind = ModelKind::MapObject;
        MxmdHeader {
            models_offset: kind.rebase(self.models_offset),
            materials_offset: kind.rebase(self.materials_offset),
            unk_offset0: kind.rebase(self.unk_offset0),
            shaders_offset: kind.rebase(self.shaders_offset),
            external_textures_offset: kind.rebase(self.external_textures_offset),
            external_textures_count: self.external_textures_count,
            external_buffer_ids_offset: kind.rebase(self.external_buffer_ids_offset),
            external_buffer_ids_count: self.external_buffer_ids_count,
            instances_offset: kind.rebase(self.instances_offset),
            ..Default::default()
        }
    }
}

/// Header of a map terrain sub-model. Offsets are relative to the start of the blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapTerrainHeader {
    pub unk00: i16,
    pub unk01: i16,
    pub models_offset: i32,
    pub materials_offset: i32,
    pub unk_offset0: i32,
    pub external_textures_offset: i32,
    pub external_textures_count: i32,
    pub shaders_offset: i32,
    pub texture_container_lookups_offset: i32,
    pub texture_container_lookups_count: i32,
    /// Points at the terrain buffer lookup table rather than a flat index list.
    pub buffer_lookups_offset: i32,
}

impl MapTerrainHeader {
    pub const SIZE: usize = 88;

    /// Terrain models encode their buffer count in the lookup table instead of the header.
    pub const STANDALONE_BUFFER_COUNT: i32 = -1;

    fn parse_fields(input: &mut &[u8]) -> WResult<Self> {
        let unk00 = be_i16.parse_next(input)?;
        let unk01 = be_i16.parse_next(input)?;
        be_words::<2>(input)?;
        let [models_offset, materials_offset, unk_offset0] = be_words::<3>(input)?;
        let _unk_offset00 = be_i32.parse_next(input)?;
        let [external_textures_offset, external_textures_count] = be_words::<2>(input)?;
        be_words::<2>(input)?;
        let [
            shaders_offset,
            texture_container_lookups_offset,
            texture_container_lookups_count,
            buffer_lookups_offset,
        ] = be_words::<4>(input)?;
        be_words::<7>(input)?;
        Ok(Self {
            unk00,
            unk01,
            models_offset,
            materials_offset,
            unk_offset0,
            external_textures_offset,
            external_textures_count,
            shaders_offset,
            texture_container_lookups_offset,
            texture_container_lookups_count,
            buffer_lookups_offset,
        })
    }

    pub fn parse(blob: &[u8]) -> CasmResult<Self> {
        parse_embedded(blob, ModelKind::MapTerrain, Self::parse_fields)
    }

    pub fn to_standalone(&self) -> MxmdHeader {
        let kind = ModelKind::MapTerrain;
        MxmdHeader {
            models_offset: kind.rebase(self.models_offset),
            materials_offset: kind.rebase(self.materials_offset),
            unk_offset0: kind.rebase(self.unk_offset0),
            shaders_offset: kind.rebase(self.shaders_offset),
            external_textures_offset: kind.rebase(self.external_textures_offset),
            external_textures_count: self.external_textures_count,
            external_buffer_ids_offset: kind.rebase(self.buffer_lookups_offset),
            external_buffer_ids_count: Self::STANDALONE_BUFFER_COUNT,
            ..Default::default()
        }
    }
}
