//! `MTXT` textures: raw GX2 surface data followed by a 0x70 byte big-endian footer.

use winnow::Parser;
use winnow::binary::be_u32;
use winnow::token::take;

use crate::data::parser_utils::WResult;
use crate::export::convert::ConversionError;

pub const MTXT_MAGIC: [u8; 4] = *b"MTXT";
pub const FOOTER_SIZE: usize = 0x70;

/// GX2 surface formats found in map textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceFormat {
    R8,
    Rg8,
    Rgba8 { srgb: bool },
    Bc1 { srgb: bool },
    Bc2 { srgb: bool },
    Bc3 { srgb: bool },
    Bc4 { signed: bool },
    Bc5 { signed: bool },
}

impl SurfaceFormat {
    pub fn from_gx2(format: u32) -> Option<Self> {
        let format = match format {
            0x01 => SurfaceFormat::R8,
            0x07 => SurfaceFormat::Rg8,
            0x1A => SurfaceFormat::Rgba8 { srgb: false },
            0x41A => SurfaceFormat::Rgba8 { srgb: true },
            0x31 => SurfaceFormat::Bc1 { srgb: false },
            0x431 => SurfaceFormat::Bc1 { srgb: true },
            0x32 => SurfaceFormat::Bc2 { srgb: false },
            0x432 => SurfaceFormat::Bc2 { srgb: true },
            0x33 => SurfaceFormat::Bc3 { srgb: false },
            0x433 => SurfaceFormat::Bc3 { srgb: true },
            0x34 => SurfaceFormat::Bc4 { signed: false },
            0x234 => SurfaceFormat::Bc4 { signed: true },
            0x35 => SurfaceFormat::Bc5 { signed: false },
            0x235 => SurfaceFormat::Bc5 { signed: true },
            _ => return None,
        };
        Some(format)
    }

    /// Edge length in pixels of one block.
    pub fn block_dim(self) -> u32 {
        match self {
            SurfaceFormat::R8 | SurfaceFormat::Rg8 | SurfaceFormat::Rgba8 { .. } => 1,
            _ => 4,
        }
    }

    pub fn bytes_per_block(self) -> usize {
        match self {
            SurfaceFormat::R8 => 1,
            SurfaceFormat::Rg8 => 2,
            SurfaceFormat::Rgba8 { .. } => 4,
            SurfaceFormat::Bc1 { .. } | SurfaceFormat::Bc4 { .. } => 8,
            SurfaceFormat::Bc2 { .. } | SurfaceFormat::Bc3 { .. } | SurfaceFormat::Bc5 { .. } => 16,
        }
    }

    /// Formats that store only X and Y of a normal map.
    pub fn is_two_channel(self) -> bool {
        matches!(self, SurfaceFormat::Rg8 | SurfaceFormat::Bc5 { .. })
    }
}

/// The fields of the footer the converter needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MtxtFooter {
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub mip_count: u32,
    pub format: u32,
    pub image_size: u32,
    pub tile_mode: u32,
    /// Row pitch in blocks.
    pub pitch: u32,
}

impl MtxtFooter {
    fn parse_fields(input: &mut &[u8]) -> WResult<Self> {
        let _unk0 = be_u32.parse_next(input)?;
        let _swizzle = be_u32.parse_next(input)?;
        let _dimension = be_u32.parse_next(input)?;
        let width = be_u32.parse_next(input)?;
        let height = be_u32.parse_next(input)?;
        let depth = be_u32.parse_next(input)?;
        let mip_count = be_u32.parse_next(input)?;
        let format = be_u32.parse_next(input)?;
        let image_size = be_u32.parse_next(input)?;
        let _aa_mode = be_u32.parse_next(input)?;
        let tile_mode = be_u32.parse_next(input)?;
        let _unk1 = be_u32.parse_next(input)?;
        let _alignment = be_u32.parse_next(input)?;
        let pitch = be_u32.parse_next(input)?;
        take(13 * 4usize).void().parse_next(input)?;
        Ok(Self {
            width,
            height,
            depth,
            mip_count,
            format,
            image_size,
            tile_mode,
            pitch,
        })
    }

    /// Parse the footer at the end of `blob`.
    pub fn parse(blob: &[u8]) -> Result<Self, ConversionError> {
        let start = blob
            .len()
            .checked_sub(FOOTER_SIZE)
            .ok_or(ConversionError::TooShort { len: blob.len() })?;
        let footer = &blob[start..];
        let magic = &footer[FOOTER_SIZE - 4..];
        if magic != MTXT_MAGIC {
            return Err(ConversionError::BadMagic {
                actual: u32::from_be_bytes([magic[0], magic[1], magic[2], magic[3]]),
            });
        }

        Self::parse_fields(&mut &footer[..])
            .map_err(|_| ConversionError::TooShort { len: blob.len() })
    }

    pub fn surface_format(&self) -> Result<SurfaceFormat, ConversionError> {
        SurfaceFormat::from_gx2(self.format).ok_or(ConversionError::UnsupportedFormat(self.format))
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.tile_mode, 0 | 1)
    }
}

/// Copy the first mip of a linear surface into a tightly packed buffer.
pub fn untile_linear(
    blob: &[u8],
    footer: &MtxtFooter,
    format: SurfaceFormat,
) -> Result<Vec<u8>, ConversionError> {
    if !footer.is_linear() {
        return Err(ConversionError::UnsupportedTileMode(footer.tile_mode));
    }

    let block = format.block_dim();
    let bpb = format.bytes_per_block();
    let blocks_wide = footer.width.div_ceil(block) as usize;
    let blocks_high = footer.height.div_ceil(block) as usize;
    let image = &blob[..blob.len().saturating_sub(FOOTER_SIZE)];
    let oversized = || ConversionError::Truncated {
        expected: usize::MAX,
        actual: image.len(),
    };

    let row_len = blocks_wide.checked_mul(bpb).ok_or_else(oversized)?;
    let pitch = (footer.pitch as usize)
        .max(blocks_wide)
        .checked_mul(bpb)
        .ok_or_else(oversized)?;
    let needed = pitch
        .checked_mul(blocks_high.saturating_sub(1))
        .and_then(|n| n.checked_add(row_len))
        .ok_or_else(oversized)?;
    if blocks_high > 0 && image.len() < needed {
        return Err(ConversionError::Truncated {
            expected: needed,
            actual: image.len(),
        });
    }

    let mut packed = Vec::with_capacity(row_len * blocks_high);
    for row in 0..blocks_high {
        let start = row * pitch;
        packed.extend_from_slice(&image[start..start + row_len]);
    }
    Ok(packed)
}

/// Converts `MTXT` textures to DDS or PNG.
#[cfg(feature = "textures")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MtxtConverter;

#[cfg(feature = "textures")]
mod converter {
    use std::fs::File;
    use std::io::{BufWriter, Write};
    use std::path::Path;

    use image_dds::ddsfile::Dds;
    use image_dds::image::codecs::png::PngEncoder;
    use image_dds::image::{ExtendedColorType, ImageEncoder, RgbaImage};
    use image_dds::{ImageFormat, Surface};

    use super::{MtxtConverter, MtxtFooter, SurfaceFormat, untile_linear};
    use crate::export::convert::{
        ConversionError, ConvertOptions, TargetFormat, TextureConverter, joined, synthesize_blue,
    };
    use crate::export::with_suffix;

    fn image_format(format: SurfaceFormat) -> ImageFormat {
        match format {
            SurfaceFormat::R8 => ImageFormat::R8Unorm,
            SurfaceFormat::Rg8 => ImageFormat::Rg8Unorm,
            SurfaceFormat::Rgba8 { srgb: false } => ImageFormat::Rgba8Unorm,
            SurfaceFormat::Rgba8 { srgb: true } => ImageFormat::Rgba8UnormSrgb,
            SurfaceFormat::Bc1 { srgb: false } => ImageFormat::BC1RgbaUnorm,
            SurfaceFormat::Bc1 { srgb: true } => ImageFormat::BC1RgbaUnormSrgb,
            SurfaceFormat::Bc2 { srgb: false } => ImageFormat::BC2RgbaUnorm,
            SurfaceFormat::Bc2 { srgb: true } => ImageFormat::BC2RgbaUnormSrgb,
            SurfaceFormat::Bc3 { srgb: false } => ImageFormat::BC3RgbaUnorm,
            SurfaceFormat::Bc3 { srgb: true } => ImageFormat::BC3RgbaUnormSrgb,
            SurfaceFormat::Bc4 { signed: false } => ImageFormat::BC4RUnorm,
            SurfaceFormat::Bc4 { signed: true } => ImageFormat::BC4RSnorm,
            SurfaceFormat::Bc5 { signed: false } => ImageFormat::BC5RgUnorm,
            SurfaceFormat::Bc5 { signed: true } => ImageFormat::BC5RgSnorm,
        }
    }

    fn encode_error(e: impl std::fmt::Display) -> ConversionError {
        ConversionError::Encode(e.to_string())
    }

    fn write_dds(path: &Path, dds: &Dds) -> Result<(), ConversionError> {
        let io_error = |source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        };
        let mut out = BufWriter::new(File::create(path).map_err(io_error)?);
        dds.write(&mut out).map_err(encode_error)?;
        out.flush().map_err(io_error)
    }

    fn write_png(path: &Path, image: &RgbaImage) -> Result<(), ConversionError> {
        let file = File::create(path).map_err(|source| ConversionError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        PngEncoder::new(BufWriter::new(file))
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                ExtendedColorType::Rgba8,
            )
            .map_err(encode_error)
    }

    fn rgba_dds(image: &RgbaImage) -> Result<Dds, ConversionError> {
        Surface {
            width: image.width(),
            height: image.height(),
            depth: 1,
            layers: 1,
            mipmaps: 1,
            image_format: ImageFormat::Rgba8Unorm,
            data: image.as_raw().as_slice(),
        }
        .to_dds()
        .map_err(encode_error)
    }

    impl TextureConverter for MtxtConverter {
        fn convert(
            &self,
            ranges: &[&[u8]],
            output_prefix: &Path,
            options: &ConvertOptions,
        ) -> Result<(), ConversionError> {
            let blob = joined(ranges);
            let footer = MtxtFooter::parse(&blob)?;
            let format = footer.surface_format()?;
            let pixels = untile_linear(&blob, &footer, format)?;

            let dds = Surface {
                width: footer.width,
                height: footer.height,
                depth: 1,
                layers: 1,
                mipmaps: 1,
                image_format: image_format(format),
                data: pixels.as_slice(),
            }
            .to_dds()
            .map_err(encode_error)?;

            let synthesize = options.synthesize_blue_channel && format.is_two_channel();
            let path = with_suffix(output_prefix, options.target_format.extension());
            match options.target_format {
                TargetFormat::Dds if !synthesize => write_dds(&path, &dds),
                target => {
                    let mut image = image_dds::image_from_dds(&dds, 0).map_err(encode_error)?;
                    if synthesize {
                        synthesize_blue(&mut image);
                    }
                    match target {
                        TargetFormat::Png => write_png(&path, &image),
                        TargetFormat::Dds => write_dds(&path, &rgba_dds(&image)?),
                    }
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::export::mtxt::tests::mtxt;

        #[test]
        fn linear_rgba_converts_to_png() {
            let pixels = [255u8, 0, 0, 255, 0, 255, 0, 255, 0, 0, 255, 255, 255, 255, 255, 255];
            let blob = mtxt(&pixels, 2, 2, 0x1A, 1, 2);
            let dir = tempfile::tempdir().unwrap();
            let prefix = dir.path().join("000");
            let options = ConvertOptions::builder()
                .target_format(TargetFormat::Png)
                .build();

            MtxtConverter.convert(&[blob.as_slice()], &prefix, &options).unwrap();
            let png = std::fs::read(dir.path().join("000.png")).unwrap();
            assert_eq!(&png[1..4], b"PNG");
        }

        #[test]
        fn linear_bc1_converts_to_dds() {
            let blob = mtxt(&[0u8; 8], 4, 4, 0x31, 0, 1);
            let dir = tempfile::tempdir().unwrap();
            let prefix = dir.path().join("001");

            MtxtConverter
                .convert(&[blob.as_slice()], &prefix, &ConvertOptions::default())
                .unwrap();
            let dds = std::fs::read(dir.path().join("001.dds")).unwrap();
            assert_eq!(&dds[..4], b"DDS ");
        }
    }
}
