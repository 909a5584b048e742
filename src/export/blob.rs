//! Drivers that copy blobs out unchanged.

use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::container::Container;
use crate::data::{DataRange, DataReader};
use crate::error::CasmResult;
use crate::export::{DriverReport, largest, named_output, with_suffix, write_output};

/// Copy each `(range, output path)` pair out of the companion file.
///
/// Entries whose path could not be built are counted as skipped.
fn copy_ranges<R: Read + Seek>(
    entries: Vec<(DataRange, CasmResult<PathBuf>)>,
    data: &mut DataReader<R>,
) -> CasmResult<DriverReport> {
    let mut scratch = vec![0u8; largest(entries.iter().map(|(range, _)| range))];
    let mut report = DriverReport::default();

    for (i, (range, path)) in entries.into_iter().enumerate() {
        let path = match path {
            Ok(path) => path,
            Err(err) => {
                report.record(Err(err))?;
                continue;
            }
        };
        let blob = &mut scratch[..range.len()];
        data.read_range(range, blob)?;
        debug!(index = i, offset = range.offset, size = range.size, path = %path.display(), "writing blob");
        report.record(write_output(&path, &[&*blob]))?;
    }

    Ok(report)
}

/// Output path of a collision blob. Names normally end in `.`, so only the extension is appended.
fn collision_path(dir: &Path, name: &str) -> CasmResult<PathBuf> {
    let stem = name.strip_suffix('.').unwrap_or(name);
    Ok(with_suffix(&named_output(dir, stem)?, "hkx"))
}

pub fn extract_collisions<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let collisions = container.collisions()?.to_vec()?;
    info!(entries = collisions.len(), "extracting collision");

    let entries = collisions
        .iter()
        .map(|c| Ok((c.range, collision_path(dir, container.collision_name(c)?))))
        .collect::<CasmResult<Vec<_>>>()?;
    copy_ranges(entries, data)
}

/// Extract `main.tgld` from the container and every named TGLD entry from the companion file.
pub fn extract_tgld<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let mut report = DriverReport::default();
    match container.main_tgld() {
        Ok([]) => debug!("container has no main TGLD"),
        Ok(main) => report.record(write_output(&dir.join("main.tgld"), &[main]))?,
        Err(err) => {
            warn!("skipping main.tgld: {err}");
            report.skipped += 1;
        }
    }

    let tgld = container.tgld()?.to_vec()?;
    info!(entries = tgld.len(), "extracting TGLD");
    let entries = tgld
        .iter()
        .enumerate()
        .map(|(id, entry)| {
            let name = container.tgld_name(id)?;
            Ok((entry.range, named_output(dir, name).map(|p| with_suffix(&p, "tgld"))))
        })
        .collect::<CasmResult<Vec<_>>>()?;

    report.merge(copy_ranges(entries, data)?);
    Ok(report)
}

pub fn extract_effects<R: Read + Seek>(
    container: &Container,
    data: &mut DataReader<R>,
    dir: &Path,
) -> CasmResult<DriverReport> {
    let effects = container.effects()?.to_vec()?;
    info!(entries = effects.len(), "extracting effects");

    let entries = effects
        .iter()
        .enumerate()
        .map(|(i, effect)| (effect.range, Ok(dir.join(format!("{i}.epac")))))
        .collect();
    copy_ranges(entries, data)
}

/// Write the `CEMS` and `LCMD` sections of the container as `<stem>.cems` and `<stem>.lcmd`.
pub fn extract_raw_sections(container: &Container, dir: &Path, stem: &str) -> CasmResult<DriverReport> {
    let mut report = DriverReport::default();
    for (section, ext) in [(container.cems()?, "cems"), (container.lcmd()?, "lcmd")] {
        if section.is_empty() {
            debug!("container has no {ext} section");
            continue;
        }
        report.record(write_output(&with_suffix(&dir.join(stem), ext), &[section]))?;
    }
    Ok(report)
}
