// Cache file -> drawable, with density scaling and nine-patch detection.

use std::fs;
use std::path::PathBuf;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use tracing::debug;

use crate::config::REFERENCE_DENSITY;
use crate::detect::ninepatch::{
    find_nine_patch_chunk, is_nine_patch_chunk, ChunkError, NinePatchChunk,
};
use crate::error::LoadError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeRequest {
    pub path: PathBuf,
    pub target_density: u32,
}

/// Decoded pixels at display density.
#[derive(Debug, Clone)]
pub struct Bitmap {
    pub image: RgbaImage,
    /// Density the pixels are now expressed in.
    pub density: u32,
    /// Dimensions before density scaling.
    pub source_size: (u32, u32),
    /// Factor applied to reach display density (1.0 when unscaled).
    pub scale: f32,
    /// Raw `npTc` payload, if the file carried one.
    pub nine_patch_chunk: Option<Vec<u8>>,
}

impl Bitmap {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    pub fn is_empty(&self) -> bool {
        self.left >= self.right || self.top >= self.bottom
    }
}

/// Stretchable drawable built from a valid nine-patch chunk.
#[derive(Debug, Clone)]
pub struct NinePatchDrawable {
    pub bitmap: Bitmap,
    pub chunk: NinePatchChunk,
    /// Always empty: content padding comes from the chunk, not the drawable.
    pub padding: Rect,
}

#[derive(Debug, Clone)]
pub struct BitmapDrawable {
    pub bitmap: Bitmap,
}

/// Exactly one variant per decode, chosen by the chunk validity check.
#[derive(Debug, Clone)]
pub enum DecodedArtifact {
    NinePatch(NinePatchDrawable),
    Bitmap(BitmapDrawable),
}

impl DecodedArtifact {
    pub fn is_nine_patch(&self) -> bool {
        matches!(self, DecodedArtifact::NinePatch(_))
    }

    pub fn bitmap(&self) -> &Bitmap {
        match self {
            DecodedArtifact::NinePatch(d) => &d.bitmap,
            DecodedArtifact::Bitmap(d) => &d.bitmap,
        }
    }

    pub fn width(&self) -> u32 {
        self.bitmap().width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap().height()
    }

    pub fn nine_patch_chunk(&self) -> Option<&NinePatchChunk> {
        match self {
            DecodedArtifact::NinePatch(d) => Some(&d.chunk),
            DecodedArtifact::Bitmap(_) => None,
        }
    }
}

pub struct ArtifactDecoder {
    reference_density: u32,
}

impl ArtifactDecoder {
    pub fn new(reference_density: u32) -> Self {
        Self { reference_density }
    }

    pub fn reference_density(&self) -> u32 {
        self.reference_density
    }

    /// Decode a published cache file.
    ///
    /// Fails only when no bitmap can be produced. A missing or broken
    /// nine-patch chunk degrades to [`DecodedArtifact::Bitmap`].
    pub fn decode(&self, request: &DecodeRequest) -> Result<DecodedArtifact, LoadError> {
        let bytes = fs::read(&request.path).map_err(|e| LoadError::Decode {
            path: request.path.clone(),
            message: e.to_string(),
        })?;
        let bitmap = self
            .decode_bitmap(&bytes, request.target_density)
            .map_err(|e| LoadError::Decode {
                path: request.path.clone(),
                message: e.to_string(),
            })?;
        Ok(classify(bitmap))
    }

    /// Decode pixels and rescale from the reference density to `target_density`.
    pub fn decode_bitmap(
        &self,
        bytes: &[u8],
        target_density: u32,
    ) -> Result<Bitmap, image::ImageError> {
        let image = image::load_from_memory(bytes)?.to_rgba8();
        let source_size = image.dimensions();
        let nine_patch_chunk = find_nine_patch_chunk(bytes).map(<[u8]>::to_vec);

        let (image, density, scale) = match self.scale_for(target_density) {
            Some(scale) => {
                let width = scale_dimension(source_size.0, scale);
                let height = scale_dimension(source_size.1, scale);
                debug!(
                    "scaling {}x{} -> {}x{} (density {} -> {})",
                    source_size.0,
                    source_size.1,
                    width,
                    height,
                    self.reference_density,
                    target_density
                );
                (
                    imageops::resize(&image, width, height, FilterType::Triangle),
                    target_density,
                    scale,
                )
            }
            None => (image, self.reference_density, 1.0),
        };

        Ok(Bitmap {
            image,
            density,
            source_size,
            scale,
            nine_patch_chunk,
        })
    }

    fn scale_for(&self, target_density: u32) -> Option<f32> {
        if target_density == 0
            || self.reference_density == 0
            || target_density == self.reference_density
        {
            return None;
        }
        Some(target_density as f32 / self.reference_density as f32)
    }
}

impl Default for ArtifactDecoder {
    fn default() -> Self {
        Self::new(REFERENCE_DENSITY)
    }
}

fn scale_dimension(value: u32, scale: f32) -> u32 {
    ((value as f32 * scale + 0.5) as u32).max(1)
}

/// Pick the drawable variant. Any chunk problem falls back to a plain bitmap.
pub fn classify(bitmap: Bitmap) -> DecodedArtifact {
    match probe_chunk(&bitmap) {
        Ok(Some(chunk)) => {
            debug!(
                "nine-patch chunk accepted: {} x divs, {} y divs",
                chunk.x_divs.len(),
                chunk.y_divs.len()
            );
            DecodedArtifact::NinePatch(NinePatchDrawable {
                bitmap,
                chunk,
                padding: Rect::default(),
            })
        }
        Ok(None) => DecodedArtifact::Bitmap(BitmapDrawable { bitmap }),
        Err(e) => {
            debug!("nine-patch chunk rejected, showing plain bitmap: {}", e);
            DecodedArtifact::Bitmap(BitmapDrawable { bitmap })
        }
    }
}

fn probe_chunk(bitmap: &Bitmap) -> Result<Option<NinePatchChunk>, ChunkError> {
    let raw = match bitmap.nine_patch_chunk.as_deref() {
        Some(raw) if is_nine_patch_chunk(raw) => raw,
        _ => return Ok(None),
    };

    let chunk = NinePatchChunk::parse(raw)?;
    let (source_width, source_height) = bitmap.source_size;
    chunk.check_bounds(source_width, source_height)?;

    if bitmap.scale == 1.0 {
        return Ok(Some(chunk));
    }
    Ok(Some(chunk.scaled(bitmap.scale, bitmap.width(), bitmap.height())))
}
