//! Typed, strided views over the tables in a normalized root buffer.

use std::fmt;
use std::marker::PhantomData;

use crate::container::Container;
use crate::container::endian::table_span;
use crate::container::records::{
    DataFile, EmbeddedCollision, NameOffset, ObjectModel, ObjectTextureFile, Record, RecordKind,
    SkyboxModel, TerrainLodModel, TerrainModel, TgldEntry,
};
use crate::data::ByteView;
use crate::error::{CasmError, CasmResult};

/// Every table the root header locates that the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableKind {
    TerrainModels,
    ObjectModels,
    Collisions,
    SkyboxModels,
    ObjectBuffers,
    ObjectTextures,
    TgldNames,
    Tgld,
    CachedTextures,
    TerrainTextures,
    Effects,
    TerrainLods,
    TerrainBuffers,
}

impl TableKind {
    /// All tables, in normalization order.
    pub const ALL: [TableKind; 13] = [
        TableKind::Collisions,
        TableKind::SkyboxModels,
        TableKind::TerrainLods,
        TableKind::TerrainTextures,
        TableKind::CachedTextures,
        TableKind::ObjectTextures,
        TableKind::TerrainModels,
        TableKind::ObjectModels,
        TableKind::ObjectBuffers,
        TableKind::TerrainBuffers,
        TableKind::Tgld,
        TableKind::TgldNames,
        TableKind::Effects,
    ];

    pub const fn record(self) -> RecordKind {
        match self {
            TableKind::TerrainModels => RecordKind::TerrainModel,
            TableKind::ObjectModels => RecordKind::ObjectModel,
            TableKind::Collisions => RecordKind::Collision,
            TableKind::SkyboxModels => RecordKind::SkyboxModel,
            TableKind::ObjectTextures => RecordKind::ObjectTexture,
            TableKind::TgldNames => RecordKind::NameOffset,
            TableKind::Tgld => RecordKind::TgldEntry,
            TableKind::TerrainLods => RecordKind::TerrainLodModel,
            TableKind::ObjectBuffers
            | TableKind::CachedTextures
            | TableKind::TerrainTextures
            | TableKind::Effects
            | TableKind::TerrainBuffers => RecordKind::DataFile,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TableKind::TerrainModels => "terrain model",
            TableKind::ObjectModels => "object model",
            TableKind::Collisions => "collision",
            TableKind::SkyboxModels => "skybox model",
            TableKind::ObjectBuffers => "object buffer",
            TableKind::ObjectTextures => "object texture",
            TableKind::TgldNames => "TGLD name",
            TableKind::Tgld => "TGLD",
            TableKind::CachedTextures => "cached texture",
            TableKind::TerrainTextures => "terrain texture",
            TableKind::Effects => "effect",
            TableKind::TerrainLods => "terrain LOD",
            TableKind::TerrainBuffers => "terrain buffer",
        }
    }
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A bounds-checked, strided view of one table.
#[derive(Debug, Clone, Copy)]
pub struct Table<'a, R> {
    kind: TableKind,
    view: ByteView<'a>,
    base: usize,
    count: usize,
    _record: PhantomData<R>,
}

impl<'a, R: Record> Table<'a, R> {
    pub fn kind(&self) -> TableKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn get(&self, index: usize) -> CasmResult<R> {
        if index >= self.count {
            return Err(CasmError::IndexOutOfRange {
                table: self.kind,
                index,
                count: self.count,
            });
        }

        let stride = R::KIND.stride();
        let input = &mut self.view.bytes(self.base + index * stride, stride)?;
        R::parse(input).map_err(|e| {
            CasmError::corrupt(format!("{} record {index}: {e}", self.kind))
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = CasmResult<R>> + '_ {
        (0..self.count).map(|index| self.get(index))
    }

    /// Parse every record up front.
    pub fn to_vec(&self) -> CasmResult<Vec<R>> {
        self.iter().collect()
    }
}

impl Container {
    fn resolve<R: Record>(&self, kind: TableKind) -> CasmResult<Table<'_, R>> {
        debug_assert_eq!(kind.record(), R::KIND);

        let table = self.root().table(kind);
        let view = self.view();
        if table.count == 0 {
            return Ok(Table {
                kind,
                view,
                base: 0,
                count: 0,
                _record: PhantomData,
            });
        }

        let span = table_span(view.len(), kind, table)?;
        Ok(Table {
            kind,
            view,
            base: span.start,
            count: table.count as usize,
            _record: PhantomData,
        })
    }

    pub fn terrain_models(&self) -> CasmResult<Table<'_, TerrainModel>> {
        self.resolve(TableKind::TerrainModels)
    }

    pub fn object_models(&self) -> CasmResult<Table<'_, ObjectModel>> {
        self.resolve(TableKind::ObjectModels)
    }

    pub fn collisions(&self) -> CasmResult<Table<'_, EmbeddedCollision>> {
        self.resolve(TableKind::Collisions)
    }

    pub fn skybox_models(&self) -> CasmResult<Table<'_, SkyboxModel>> {
        self.resolve(TableKind::SkyboxModels)
    }

    pub fn object_buffers(&self) -> CasmResult<Table<'_, DataFile>> {
        self.resolve(TableKind::ObjectBuffers)
    }

    pub fn object_textures(&self) -> CasmResult<Table<'_, ObjectTextureFile>> {
        self.resolve(TableKind::ObjectTextures)
    }

    pub fn tgld_names(&self) -> CasmResult<Table<'_, NameOffset>> {
        self.resolve(TableKind::TgldNames)
    }

    pub fn tgld(&self) -> CasmResult<Table<'_, TgldEntry>> {
        self.resolve(TableKind::Tgld)
    }

    pub fn cached_textures(&self) -> CasmResult<Table<'_, DataFile>> {
        self.resolve(TableKind::CachedTextures)
    }

    pub fn terrain_textures(&self) -> CasmResult<Table<'_, DataFile>> {
        self.resolve(TableKind::TerrainTextures)
    }

    pub fn effects(&self) -> CasmResult<Table<'_, DataFile>> {
        self.resolve(TableKind::Effects)
    }

    pub fn terrain_lods(&self) -> CasmResult<Table<'_, TerrainLodModel>> {
        self.resolve(TableKind::TerrainLods)
    }

    pub fn terrain_buffers(&self) -> CasmResult<Table<'_, DataFile>> {
        self.resolve(TableKind::TerrainBuffers)
    }

    /// Look up a string relative to `base`, treating anything outside the root buffer as corruption.
    fn name_at(&self, base: u32, offset: u32, what: &str) -> CasmResult<&str> {
        let at = (base as usize)
            .checked_add(offset as usize)
            .filter(|&at| at < self.view().len())
            .ok_or_else(|| {
                CasmError::corrupt(format!(
                    "{what} name offset 0x{offset:X} (base 0x{base:X}) is outside the container"
                ))
            })?;
        self.view().cstr_at(at)
    }

    pub fn collision_name(&self, collision: &EmbeddedCollision) -> CasmResult<&str> {
        self.name_at(
            self.root().collision_names_offset,
            collision.name_offset,
            "collision",
        )
    }

    /// Name of the `id`th TGLD entry. Name offsets are relative to the start of the root buffer.
    pub fn tgld_name(&self, id: usize) -> CasmResult<&str> {
        let NameOffset(offset) = self.tgld_names()?.get(id)?;
        self.name_at(0, offset, "TGLD")
    }

    fn root_slice(&self, start: u32, end: u32, what: &str) -> CasmResult<&[u8]> {
        let len = end.checked_sub(start).ok_or_else(|| {
            CasmError::corrupt(format!(
                "{what} ends at 0x{end:X} before it starts at 0x{start:X}"
            ))
        })?;
        self.view().bytes(start as usize, len as usize)
    }

    /// The `CEMS` blob, which runs up to the `BVSC` section.
    pub fn cems(&self) -> CasmResult<&[u8]> {
        let root = self.root();
        self.root_slice(root.cems_offset, root.bvsc_offset, "CEMS")
    }

    pub fn lcmd(&self) -> CasmResult<&[u8]> {
        let root = self.root();
        self.view()
            .bytes(root.lcmd_offset as usize, root.lcmd_size as usize)
    }

    /// The container's own TGLD blob, which runs up to the `CEMS` section.
    pub fn main_tgld(&self) -> CasmResult<&[u8]> {
        let root = self.root();
        self.root_slice(root.tgld_internal_offset, root.cems_offset, "main TGLD")
    }
}
