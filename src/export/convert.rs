//! Texture converters. Each takes the byte ranges of one extracted texture and writes one file.

use std::borrow::Cow;
use std::io;
use std::path::{Path, PathBuf};

use bon::Builder;
use thiserror::Error;

use crate::export::with_suffix;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("texture of 0x{len:X} bytes is too short for an MTXT footer")]
    TooShort { len: usize },
    #[error("bad MTXT footer magic 0x{actual:08X}")]
    BadMagic { actual: u32 },
    #[error("unsupported GX2 surface format 0x{0:X}")]
    UnsupportedFormat(u32),
    #[error("unsupported GX2 tile mode {0}")]
    UnsupportedTileMode(u32),
    #[error("surface needs 0x{expected:X} bytes but only 0x{actual:X} are present")]
    Truncated { expected: usize, actual: usize },
    #[error("failed to encode texture: {0}")]
    Encode(String),
    #[error("failed to write {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Output container for converted textures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TargetFormat {
    #[default]
    Dds,
    Png,
}

impl TargetFormat {
    pub fn extension(self) -> &'static str {
        match self {
            TargetFormat::Dds => "dds",
            TargetFormat::Png => "png",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Builder)]
pub struct ConvertOptions {
    #[builder(default)]
    pub target_format: TargetFormat,
    /// Rebuild the blue channel of two-channel normal maps from red and green.
    #[builder(default)]
    pub synthesize_blue_channel: bool,
}

pub trait TextureConverter: Send + Sync {
    /// Convert one texture made of `ranges` and write it next to `output_prefix`,
    /// which gains the converter's extension.
    fn convert(
        &self,
        ranges: &[&[u8]],
        output_prefix: &Path,
        options: &ConvertOptions,
    ) -> Result<(), ConversionError>;
}

/// Concatenate the ranges of one texture, borrowing when there is only one.
pub(crate) fn joined<'a>(ranges: &[&'a [u8]]) -> Cow<'a, [u8]> {
    match ranges {
        [single] => Cow::Borrowed(*single),
        _ => Cow::Owned(ranges.concat()),
    }
}

pub(crate) fn write_file(path: &Path, bytes: &[u8]) -> Result<(), ConversionError> {
    std::fs::write(path, bytes).map_err(|source| ConversionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Writes the untouched `MTXT` blob.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawTextureWriter;

impl TextureConverter for RawTextureWriter {
    fn convert(
        &self,
        ranges: &[&[u8]],
        output_prefix: &Path,
        _options: &ConvertOptions,
    ) -> Result<(), ConversionError> {
        write_file(&with_suffix(output_prefix, "mtxt"), &joined(ranges))
    }
}

/// Reconstruct Z of a unit normal stored in the red and green channels of RGBA8 pixels.
pub fn synthesize_blue(rgba: &mut [u8]) {
    for pixel in rgba.chunks_exact_mut(4) {
        let x = pixel[0] as f32 / 255.0 * 2.0 - 1.0;
        let y = pixel[1] as f32 / 255.0 * 2.0 - 1.0;
        let z = (1.0 - x * x - y * y).max(0.0).sqrt();
        pixel[2] = ((z + 1.0) * 0.5 * 255.0).round() as u8;
    }
}
