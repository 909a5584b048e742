//! Per-resource-kind extraction drivers and the texture conversion stage they feed.
//!
//! Every driver follows the same shape: size one scratch buffer to the largest
//! entry of its table, then read, rewrite, and write each entry in order. A
//! failure to create or write a single output file skips that entry; any other
//! error ends the driver.

/// Collision, TGLD, effect, and raw container blobs
pub mod blob;
/// Texture converters
pub mod convert;
/// Skybox, terrain LOD, map object, and map terrain models
pub mod model;
/// MTXT footer parsing and surface untiling
pub mod mtxt;
/// Worker pool for texture conversion
pub mod queue;
/// Cached and uncached textures
pub mod texture;

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Component, Path, PathBuf};

use tracing::warn;

use crate::data::DataRange;
use crate::error::{CasmError, CasmResult};

/// Outcome counts for one driver run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverReport {
    pub written: usize,
    pub skipped: usize,
}

impl DriverReport {
    /// Count the result of one entry. Output failures are logged and skipped; anything else is returned.
    pub(crate) fn record(&mut self, result: CasmResult<()>) -> CasmResult<()> {
        match result {
            Ok(()) => {
                self.written += 1;
                Ok(())
            }
            Err(CasmError::OutputCreate { path, source }) => {
                warn!(path = %path.display(), "skipping entry: {source}");
                self.skipped += 1;
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub(crate) fn merge(&mut self, other: DriverReport) {
        self.written += other.written;
        self.skipped += other.skipped;
    }
}

pub(crate) fn output_error(path: &Path) -> impl FnOnce(io::Error) -> CasmError + '_ {
    move |source| CasmError::OutputCreate {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) fn create_output(path: &Path) -> CasmResult<BufWriter<File>> {
    File::create(path)
        .map(BufWriter::new)
        .map_err(output_error(path))
}

pub(crate) fn create_dir(path: &Path) -> CasmResult<()> {
    fs::create_dir_all(path).map_err(output_error(path))
}

/// Write `parts` back to back into a new file at `path`.
pub(crate) fn write_output(path: &Path, parts: &[&[u8]]) -> CasmResult<()> {
    let mut out = create_output(path)?;
    for part in parts {
        out.write_all(part).map_err(output_error(path))?;
    }
    out.flush().map_err(output_error(path))
}

/// Size of the scratch buffer needed to hold the largest of `ranges`.
pub(crate) fn largest<'a>(ranges: impl IntoIterator<Item = &'a DataRange>) -> usize {
    ranges.into_iter().map(DataRange::len).max().unwrap_or(0)
}

/// `dir` joined with a file name read from the container.
///
/// Names must be relative and may not climb out of `dir`. Anything else is an
/// output error for that entry alone.
pub(crate) fn named_output(dir: &Path, name: &str) -> CasmResult<PathBuf> {
    let relative = Path::new(name);
    let contained = relative
        .components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        && relative
            .components()
            .any(|c| matches!(c, Component::Normal(_)));
    if !contained {
        return Err(CasmError::OutputCreate {
            path: PathBuf::from(name),
            source: io::Error::new(
                io::ErrorKind::InvalidInput,
                "entry name is not a relative path inside the output directory",
            ),
        });
    }
    Ok(dir.join(relative))
}

/// `prefix` with `.ext` appended, keeping any dots already in the file name.
pub(crate) fn with_suffix(prefix: &Path, ext: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(".");
    path.push(ext);
    PathBuf::from(path)
}
