//! Runs every extraction driver over one `.casmhd` container and its `.casmda`
//! companion data file.

use std::fmt;
use std::path::{Path, PathBuf};

use bon::Builder;
use rayon::ThreadPoolBuildError;
use rootcause::Report;
use tracing::{error, info};

use crate::container::Container;
use crate::data::wrappers::mmap::{MmapDataReader, open_data_file};
use crate::error::{CasmResult, ExtractError};
use crate::export::convert::{ConvertOptions, TargetFormat, TextureConverter};
use crate::export::queue::{TexturePipeline, WorkerPool};
use crate::export::{DriverReport, blob, create_dir, model, texture};

/// Extension of the companion data file.
pub const DATA_FILE_EXTENSION: &str = "casmda";

#[derive(Debug, Clone, Default, Builder)]
pub struct ExtractOptions {
    #[builder(default)]
    pub target_format: TargetFormat,
    #[builder(default)]
    pub synthesize_blue_channel: bool,
    /// Texture worker count. `None` uses one per core.
    pub threads: Option<usize>,
    /// Defaults to a directory named after the container, next to it.
    pub output_dir: Option<PathBuf>,
    /// Keep textures as raw `MTXT` blobs.
    #[builder(default)]
    pub raw_textures: bool,
}

impl ExtractOptions {
    fn convert_options(&self) -> ConvertOptions {
        ConvertOptions {
            target_format: self.target_format,
            synthesize_blue_channel: self.synthesize_blue_channel,
        }
    }
}

/// `<dir>/<stem>.casmda` for a container at `<dir>/<stem>.casmhd`.
pub fn companion_path(container: &Path) -> PathBuf {
    container.with_extension(DATA_FILE_EXTENSION)
}

/// `<dir>/<stem>/` for a container at `<dir>/<stem>.casmhd`.
pub fn default_output_dir(container: &Path) -> PathBuf {
    container.with_extension("")
}

/// Extraction drivers, in the order a run executes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Skybox,
    RawBlobs,
    Tgld,
    Effects,
    Terrain,
    CachedTextures,
    UncachedTextures,
    Objects,
    Collision,
    TerrainLod,
}

impl Driver {
    pub const ALL: [Driver; 10] = [
        Driver::Skybox,
        Driver::RawBlobs,
        Driver::Tgld,
        Driver::Effects,
        Driver::Terrain,
        Driver::CachedTextures,
        Driver::UncachedTextures,
        Driver::Objects,
        Driver::Collision,
        Driver::TerrainLod,
    ];

    /// Where this driver writes, relative to the run's output directory.
    pub fn output_dir(self, root: &Path) -> PathBuf {
        let name = match self {
            Driver::Skybox => "skybox",
            Driver::RawBlobs => return root.to_path_buf(),
            Driver::Tgld => "TGLD",
            Driver::Effects => "effects",
            Driver::Terrain => "terrain",
            Driver::CachedTextures | Driver::UncachedTextures => "textures",
            Driver::Objects => "objects",
            Driver::Collision => "collision",
            Driver::TerrainLod => "terrainLOD",
        };
        root.join(name)
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Driver::Skybox => "skybox",
            Driver::RawBlobs => "raw blob",
            Driver::Tgld => "TGLD",
            Driver::Effects => "effect",
            Driver::Terrain => "map terrain",
            Driver::CachedTextures => "cached texture",
            Driver::UncachedTextures => "uncached texture",
            Driver::Objects => "map object",
            Driver::Collision => "collision",
            Driver::TerrainLod => "terrain LOD",
        })
    }
}

/// What a finished run produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractSummary {
    /// Drivers that ran to completion, in run order.
    pub reports: Vec<(Driver, DriverReport)>,
    /// Drivers stopped by a corrupt table or out-of-range reference.
    pub aborted: Vec<Driver>,
}

impl ExtractSummary {
    pub fn report(&self, driver: Driver) -> Option<DriverReport> {
        self.reports
            .iter()
            .find(|(d, _)| *d == driver)
            .map(|&(_, report)| report)
    }

    pub fn written(&self) -> usize {
        self.reports.iter().map(|(_, r)| r.written).sum()
    }

    pub fn skipped(&self) -> usize {
        self.reports.iter().map(|(_, r)| r.skipped).sum()
    }

    pub fn is_complete(&self) -> bool {
        self.aborted.is_empty()
    }
}

#[cfg(feature = "textures")]
fn converter(options: &ExtractOptions) -> Option<Box<dyn TextureConverter>> {
    use crate::export::mtxt::MtxtConverter;

    (!options.raw_textures).then(|| Box::new(MtxtConverter) as Box<dyn TextureConverter>)
}

#[cfg(not(feature = "textures"))]
fn converter(_options: &ExtractOptions) -> Option<Box<dyn TextureConverter>> {
    None
}

fn texture_pipeline(options: &ExtractOptions) -> Result<TexturePipeline, ThreadPoolBuildError> {
    let pool = WorkerPool::new(options.threads)?;
    Ok(match converter(options) {
        Some(converter) => TexturePipeline::new(pool, converter, options.convert_options()),
        None => TexturePipeline::raw(pool),
    })
}

/// An opened container ready to be extracted.
pub struct Extractor {
    container: Container,
    data: MmapDataReader,
    stem: String,
    output_dir: PathBuf,
    pipeline: TexturePipeline,
}

impl Extractor {
    /// Load the container at `path` and map its companion data file.
    ///
    /// Nothing is written until [`Extractor::run`]; a container with the wrong
    /// magic fails here.
    pub fn open<P: AsRef<Path>>(path: P, options: ExtractOptions) -> Result<Self, Report<ExtractError>> {
        let path = path.as_ref();
        let container = Container::load(path).map_err(|source| {
            Report::new(ExtractError::Container {
                path: path.to_path_buf(),
                source,
            })
        })?;

        let data_path = companion_path(path);
        let data = open_data_file(&data_path).map_err(|source| {
            Report::new(ExtractError::DataFile {
                path: data_path.clone(),
                source,
            })
        })?;

        let pipeline = texture_pipeline(&options).map_err(|e| Report::new(ExtractError::from(e)))?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output_dir = options
            .output_dir
            .clone()
            .unwrap_or_else(|| default_output_dir(path));

        info!(
            container = %path.display(),
            data_file = %data_path.display(),
            data_len = data.len(),
            version = container.root().version,
            workers = pipeline.threads(),
            "opened container"
        );

        Ok(Self {
            container,
            data,
            stem,
            output_dir,
            pipeline,
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn run_driver(&mut self, driver: Driver, dir: &Path) -> CasmResult<DriverReport> {
        let container = &self.container;
        let data = &mut self.data;
        match driver {
            Driver::Skybox => model::extract_skyboxes(container, data, dir),
            Driver::RawBlobs => blob::extract_raw_sections(container, dir, &self.stem),
            Driver::Tgld => blob::extract_tgld(container, data, dir),
            Driver::Effects => blob::extract_effects(container, data, dir),
            Driver::Terrain => model::extract_map_terrain(container, data, dir),
            Driver::CachedTextures => texture::extract_cached(container, data, dir, &self.pipeline),
            Driver::UncachedTextures => texture::extract_uncached(container, data, dir, &self.pipeline),
            Driver::Objects => model::extract_map_objects(container, data, dir),
            Driver::Collision => blob::extract_collisions(container, data, dir),
            Driver::TerrainLod => model::extract_terrain_lods(container, data, dir),
        }
    }

    /// Run every driver in order.
    ///
    /// A driver that hits a corrupt table is logged and recorded in
    /// [`ExtractSummary::aborted`]; the next driver still runs. Companion file
    /// I/O errors end the run.
    pub fn run(&mut self) -> Result<ExtractSummary, Report<ExtractError>> {
        info!(output = %self.output_dir.display(), "extracting");
        let mut summary = ExtractSummary::default();

        for driver in Driver::ALL {
            let dir = driver.output_dir(&self.output_dir);
            let result = create_dir(&dir).and_then(|()| self.run_driver(driver, &dir));
            match result {
                Ok(report) => {
                    info!(
                        %driver,
                        written = report.written,
                        skipped = report.skipped,
                        "driver finished"
                    );
                    summary.reports.push((driver, report));
                }
                Err(source) if source.is_run_fatal() => {
                    return Err(Report::new(ExtractError::Driver { driver, source }));
                }
                Err(err) => {
                    error!(%driver, "driver aborted: {err}");
                    summary.aborted.push(driver);
                }
            }
        }

        info!(
            written = summary.written(),
            skipped = summary.skipped(),
            aborted = summary.aborted.len(),
            "extraction finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn companion_and_output_paths_sit_next_to_the_container() {
        let path = Path::new("maps/ma0301.casmhd");
        assert_eq!(companion_path(path), Path::new("maps/ma0301.casmda"));
        assert_eq!(default_output_dir(path), Path::new("maps/ma0301"));
    }

    #[test]
    fn textures_share_an_output_directory() {
        let root = Path::new("out");
        assert_eq!(
            Driver::CachedTextures.output_dir(root),
            Driver::UncachedTextures.output_dir(root)
        );
        assert_eq!(Driver::RawBlobs.output_dir(root), root);
        assert_eq!(Driver::TerrainLod.output_dir(root), root.join("terrainLOD"));
    }

    #[test]
    fn options_builder_defaults() {
        let options = ExtractOptions::builder().threads(2).build();
        assert_eq!(options.threads, Some(2));
        assert_eq!(options.target_format, TargetFormat::Dds);
        assert!(!options.raw_textures);
        assert!(options.output_dir.is_none());
    }

    #[test]
    fn summary_totals() {
        let summary = ExtractSummary {
            reports: vec![
                (
                    Driver::Skybox,
                    DriverReport {
                        written: 2,
                        skipped: 0,
                    },
                ),
                (
                    Driver::Effects,
                    DriverReport {
                        written: 3,
                        skipped: 1,
                    },
                ),
            ],
            aborted: vec![Driver::Objects],
        };
        assert_eq!(summary.written(), 5);
        assert_eq!(summary.skipped(), 1);
        assert_eq!(summary.report(Driver::Effects).map(|r| r.skipped), Some(1));
        assert!(!summary.is_complete());
    }
}
