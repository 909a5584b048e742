//! Sub-model extraction: each blob's embedded header is replaced by a standalone
//! [`MxmdHeader`], and map models get their external buffers written to a
//! deduplicated `.stream` sidecar.

use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::container::records::DataFile;
use crate::container::{Container, Table};
use crate::data::{DataRange, DataReader};
use crate::error::{CasmError, CasmResult};
use crate::export::{DriverReport, create_output, largest, output_error, write_output};
use crate::models::header::{MapObjectHeader, MapTerrainHeader, SkyboxHeader, TerrainLodHeader};
use crate::models::payload::{self, BufferRef};
use crate::models::{BufferRegistry, ModelKind, MxmdHeader, StreamWriter};

/// Everything needed to finish a map model once its blob has been read.
struct MapModel {
    header: MxmdHeader,
    buffers: Vec<BufferRef>,
    textures_offset: i32,
    textures_count: i32,
    container_lookups_offset: i32,
}

fn model_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("{index}.model"))
}

fn payload(kind: ModelKind, blob: &[u8]) -> &[u8] {
    &blob[kind.embedded_header_size()..]
}

/// Extract models that have no external buffers.
fn extract_plain<R: Read + Seek>(
    kind: ModelKind,
    ranges: &[DataRange],
    data: &mut DataReader<R>,
    dir: &Path,
    rewrite: impl Fn(&[u8]) -> CasmResult<MxmdHeader>,
) -> CasmResult<DriverReport> {
    info!(kind = ?kind, entries = ranges.len(), "extracting models");
    let mut scratch = vec![0u8; largest(ranges)];
    let mut report = DriverReport::default();

    for (i, &range) in ranges.iter().enumerate() {
        let blob = &mut scratch[..range.len()];
        data.read_range(range, blob)?;
        let header = rewrite(blob)?;

        let path = model_path(dir, i);
        debug!(index = i, offset = range.offset, size = range.size, path = %path.display(), "writing model");
        report.record(write_output(&path, &[&header.to_bytes()[..], payload(kind, blob)]))?;
    }

    Ok(report)
}

pub fn extract_skyboxes<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let ranges = container
        .skybox_models()?
        .iter()
        .map(|m| m.map(|m| m.range))
        .collect::<CasmResult<Vec<_>>>()?;
    extract_plain(ModelKind::Skybox, &ranges, data, dir, |blob| {
        Ok(SkyboxHeader::parse(blob)?.to_standalone())
    })
}

pub fn extract_terrain_lods<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let ranges = container
        .terrain_lods()?
        .iter()
        .map(|m| m.map(|m| m.range))
        .collect::<CasmResult<Vec<_>>>()?;
    extract_plain(ModelKind::TerrainLod, &ranges, data, dir, |blob| {
        Ok(TerrainLodHeader::parse(blob)?.to_standalone())
    })
}

/// Write every referenced buffer once and point each reference at its stream offset.
fn write_stream<R: Read + Seek>(
    path: &Path,
    refs: &[BufferRef],
    table: &Table<'_, DataFile>,
    data: &mut DataReader<R>,
    blob: &mut [u8],
    scratch: &mut Vec<u8>,
) -> CasmResult<usize> {
    let ranges = refs
        .iter()
        .map(|r| table.get(r.index as usize).map(|b| b.range))
        .collect::<CasmResult<Vec<_>>>()?;
    let needed = largest(&ranges);
    if scratch.len() < needed {
        scratch.resize(needed, 0);
    }

    let mut stream = StreamWriter::new(create_output(path)?);
    let mut registry = BufferRegistry::new();
    for (r, &range) in refs.iter().zip(&ranges) {
        let offset = registry.intern(r.index, || {
            let buf = &mut scratch[..range.len()];
            data.read_range(range, buf)?;
            let at = stream.append(buf).map_err(output_error(path))?;
            u32::try_from(at)
                .map_err(|_| CasmError::corrupt(format!("{} grew past 4 GiB", path.display())))
        })?;
        r.rewrite(blob, offset)?;
    }

    stream.into_inner().flush().map_err(output_error(path))?;
    Ok(registry.len())
}

fn extract_map<R: Read + Seek>(
    kind: ModelKind,
    ranges: &[DataRange],
    buffers: &Table<'_, DataFile>,
    data: &mut DataReader<R>,
    dir: &Path,
    prepare: impl Fn(&[u8]) -> CasmResult<MapModel>,
) -> CasmResult<DriverReport> {
    info!(kind = ?kind, entries = ranges.len(), "extracting models");
    let mut scratch = vec![0u8; largest(ranges)];
    let mut buffer_scratch = Vec::new();
    let mut report = DriverReport::default();

    for (i, &range) in ranges.iter().enumerate() {
        let blob = &mut scratch[..range.len()];
        data.read_range(range, blob)?;
        let model = prepare(blob)?;

        let result = (|| {
            if !model.buffers.is_empty() {
                let stream_path = dir.join(format!("{i}.stream"));
                let written = write_stream(
                    &stream_path,
                    &model.buffers,
                    buffers,
                    data,
                    blob,
                    &mut buffer_scratch,
                )?;
                debug!(
                    index = i,
                    references = model.buffers.len(),
                    written,
                    path = %stream_path.display(),
                    "wrote buffer stream"
                );
            }

            payload::remap_texture_containers(
                blob,
                model.textures_offset,
                model.textures_count,
                model.container_lookups_offset,
            )?;

            let path = model_path(dir, i);
            debug!(index = i, offset = range.offset, size = range.size, path = %path.display(), "writing model");
            write_output(&path, &[&model.header.to_bytes()[..], payload(kind, blob)])
        })();
        report.record(result)?;
    }

    Ok(report)
}

/// Extract map objects into `dir/N.model` and `dir/N.stream`.
pub fn extract_map_objects<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let ranges = container
        .object_models()?
        .iter()
        .map(|m| m.map(|m| m.range))
        .collect::<CasmResult<Vec<_>>>()?;
    let buffers = container.object_buffers()?;

    extract_map(ModelKind::MapObject, &ranges, &buffers, data, dir, |blob| {
        let header = MapObjectHeader::parse(blob)?;
        Ok(MapModel {
            header: header.to_standalone(),
            buffers: payload::object_buffer_refs(
                blob,
                header.external_buffer_ids_offset,
                header.external_buffer_ids_count,
            )?,
            textures_offset: header.external_textures_offset,
            textures_count: header.external_textures_count,
            container_lookups_offset: header.texture_container_lookups_offset,
        })
    })
}

/// Extract map terrain into `dir/N.model` and `dir/N.stream`.
pub fn extract_map_terrain<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let ranges = container
        .terrain_models()?
        .iter()
        .map(|m| m.map(|m| m.range))
        .collect::<CasmResult<Vec<_>>>()?;
    let buffers = container.terrain_buffers()?;

    extract_map(ModelKind::MapTerrain, &ranges, &buffers, data, dir, |blob| {
        let header = MapTerrainHeader::parse(blob)?;
        Ok(MapModel {
            header: header.to_standalone(),
            buffers: payload::terrain_buffer_refs(blob, header.buffer_lookups_offset)?,
            textures_offset: header.external_textures_offset,
            textures_count: header.external_textures_count,
            container_lookups_offset: header.texture_container_lookups_offset,
        })
    })
}
