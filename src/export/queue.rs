//! Fixed-size worker pool that converts batches of already-extracted textures.
//!
//! Jobs only borrow bytes that were read before the batch started and each
//! writes its own path, so they run in any order. A batch returns once every
//! job has finished.

use std::path::PathBuf;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use tracing::{debug, warn};

use crate::export::DriverReport;
use crate::export::convert::{ConvertOptions, RawTextureWriter, TextureConverter};

pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    /// `threads` of `None` uses rayon's default.
    pub fn new(threads: Option<usize>) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.unwrap_or(0))
            .thread_name(|i| format!("casm-convert-{i}"))
            .build()?;
        Ok(Self { pool })
    }

    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Run `f` over every item and wait for all of them.
    pub fn run<T, O, F>(&self, items: &[T], f: F) -> Vec<O>
    where
        T: Sync,
        O: Send,
        F: Fn(&T) -> O + Sync + Send,
    {
        self.pool.install(|| items.par_iter().map(f).collect())
    }
}

/// One texture to convert: its byte ranges and the output path without extension.
#[derive(Debug, Clone)]
pub struct TextureJob<'a> {
    pub ranges: Vec<&'a [u8]>,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Converted,
    Raw,
    Failed,
}

/// Converts texture batches on a [`WorkerPool`], falling back to raw dumps when conversion fails.
pub struct TexturePipeline {
    pool: WorkerPool,
    converter: Box<dyn TextureConverter>,
    fallback: Option<RawTextureWriter>,
    options: ConvertOptions,
}

impl TexturePipeline {
    pub fn new(pool: WorkerPool, converter: Box<dyn TextureConverter>, options: ConvertOptions) -> Self {
        Self {
            pool,
            converter,
            fallback: Some(RawTextureWriter),
            options,
        }
    }

    /// A pipeline that only writes raw blobs.
    pub fn raw(pool: WorkerPool) -> Self {
        Self {
            pool,
            converter: Box::new(RawTextureWriter),
            fallback: None,
            options: ConvertOptions::default(),
        }
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    fn process(&self, job: &TextureJob<'_>) -> JobOutcome {
        let err = match self.converter.convert(&job.ranges, &job.output, &self.options) {
            Ok(()) => {
                debug!(output = %job.output.display(), "converted texture");
                return JobOutcome::Converted;
            }
            Err(err) => err,
        };

        let Some(fallback) = &self.fallback else {
            warn!(output = %job.output.display(), "texture conversion failed: {err}");
            return JobOutcome::Failed;
        };

        debug!(output = %job.output.display(), "writing raw texture: {err}");
        match fallback.convert(&job.ranges, &job.output, &self.options) {
            Ok(()) => JobOutcome::Raw,
            Err(raw_err) => {
                warn!(output = %job.output.display(), "texture conversion failed: {err}; raw dump failed: {raw_err}");
                JobOutcome::Failed
            }
        }
    }

    /// Convert every job. Failed items are logged and counted as skipped.
    pub fn run(&self, jobs: &[TextureJob<'_>]) -> DriverReport {
        let outcomes = self.pool.run(jobs, |job| self.process(job));

        let raw = outcomes.iter().filter(|&&o| o == JobOutcome::Raw).count();
        if raw > 0 {
            debug!(raw, "textures kept as raw MTXT");
        }
        let skipped = outcomes.iter().filter(|&&o| o == JobOutcome::Failed).count();
        DriverReport {
            written: outcomes.len() - skipped,
            skipped,
        }
    }
}
