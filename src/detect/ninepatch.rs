use thiserror::Error;

/// PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Chunk type aapt uses for compiled nine-patch metadata.
pub const NINE_PATCH_CHUNK_TYPE: [u8; 4] = *b"npTc";

/// Fixed header preceding the div and color arrays.
pub const CHUNK_HEADER_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChunkError {
    #[error("chunk too short: {0} bytes")]
    TooShort(usize),
    #[error("chunk is an unserialized in-memory copy")]
    NotSerialized,
    #[error("chunk length {actual} does not match expected {expected}")]
    SizeMismatch { actual: usize, expected: usize },
    #[error("{axis} divs are not in ascending order")]
    UnorderedDivs { axis: &'static str },
    #[error("{axis} div {div} outside image extent {extent}")]
    DivOutOfBounds {
        axis: &'static str,
        div: i32,
        extent: u32,
    },
}

/// Content padding carried in the chunk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Padding {
    pub left: i32,
    pub right: i32,
    pub top: i32,
    pub bottom: i32,
}

/// Parsed nine-patch chunk: stretch regions, padding and region colors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NinePatchChunk {
    pub x_divs: Vec<i32>,
    pub y_divs: Vec<i32>,
    pub padding: Padding,
    pub colors: Vec<u32>,
}

/// Find the data of the first chunk of type `kind` in a PNG stream.
///
/// Walks the chunk list up to IEND. CRCs are not checked; a truncated or
/// malformed stream yields `None`.
pub fn find_png_chunk<'a>(data: &'a [u8], kind: &[u8; 4]) -> Option<&'a [u8]> {
    if data.len() < PNG_SIGNATURE.len() || data[..PNG_SIGNATURE.len()] != PNG_SIGNATURE {
        return None;
    }

    let mut offset = PNG_SIGNATURE.len();
    while offset + 8 <= data.len() {
        let len = read_u32(data, offset) as usize;
        let chunk_type = &data[offset + 4..offset + 8];
        let start = offset + 8;
        let end = start.checked_add(len)?;
        // Data plus the trailing 4-byte CRC must fit.
        if end.checked_add(4)? > data.len() {
            return None;
        }
        if chunk_type == kind {
            return Some(&data[start..end]);
        }
        if chunk_type == b"IEND" {
            return None;
        }
        offset = end + 4;
    }
    None
}

/// Convenience for the nine-patch chunk.
pub fn find_nine_patch_chunk(data: &[u8]) -> Option<&[u8]> {
    find_png_chunk(data, &NINE_PATCH_CHUNK_TYPE)
}

/// Byte-layout check for a serialized nine-patch chunk.
pub fn is_nine_patch_chunk(chunk: &[u8]) -> bool {
    if chunk.len() < CHUNK_HEADER_LEN {
        return false;
    }
    // 0xFF (-1) flags a chunk that was deserialized in place.
    if chunk[0] == 0xFF {
        return false;
    }
    chunk.len() == serialized_len(chunk[1], chunk[2], chunk[3])
}

fn serialized_len(num_x_divs: u8, num_y_divs: u8, num_colors: u8) -> usize {
    CHUNK_HEADER_LEN + 4 * (num_x_divs as usize + num_y_divs as usize + num_colors as usize)
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

fn read_i32(data: &[u8], offset: usize) -> i32 {
    read_u32(data, offset) as i32
}

impl NinePatchChunk {
    pub fn parse(chunk: &[u8]) -> Result<Self, ChunkError> {
        if chunk.len() < CHUNK_HEADER_LEN {
            return Err(ChunkError::TooShort(chunk.len()));
        }
        if chunk[0] == 0xFF {
            return Err(ChunkError::NotSerialized);
        }
        let (num_x, num_y, num_colors) = (chunk[1], chunk[2], chunk[3]);
        let expected = serialized_len(num_x, num_y, num_colors);
        if chunk.len() != expected {
            return Err(ChunkError::SizeMismatch {
                actual: chunk.len(),
                expected,
            });
        }

        // Offsets 4..12 hold in-memory div pointers and 28..32 the color
        // pointer; both are meaningless once serialized.
        let padding = Padding {
            left: read_i32(chunk, 12),
            right: read_i32(chunk, 16),
            top: read_i32(chunk, 20),
            bottom: read_i32(chunk, 24),
        };

        let mut offset = CHUNK_HEADER_LEN;
        let mut take = |count: u8| {
            let values: Vec<u32> = (0..count as usize)
                .map(|i| read_u32(chunk, offset + i * 4))
                .collect();
            offset += count as usize * 4;
            values
        };
        let x_divs: Vec<i32> = take(num_x).into_iter().map(|v| v as i32).collect();
        let y_divs: Vec<i32> = take(num_y).into_iter().map(|v| v as i32).collect();
        let colors = take(num_colors);

        check_ascending(&x_divs, "x")?;
        check_ascending(&y_divs, "y")?;

        Ok(Self {
            x_divs,
            y_divs,
            padding,
            colors,
        })
    }

    /// Serialize in the on-disk (big-endian) layout.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(serialized_len(
            self.x_divs.len() as u8,
            self.y_divs.len() as u8,
            self.colors.len() as u8,
        ));
        out.push(0);
        out.push(self.x_divs.len() as u8);
        out.push(self.y_divs.len() as u8);
        out.push(self.colors.len() as u8);
        out.extend_from_slice(&[0u8; 8]);
        for v in [
            self.padding.left,
            self.padding.right,
            self.padding.top,
            self.padding.bottom,
        ] {
            out.extend_from_slice(&v.to_be_bytes());
        }
        out.extend_from_slice(&[0u8; 4]);
        for div in self.x_divs.iter().chain(self.y_divs.iter()) {
            out.extend_from_slice(&div.to_be_bytes());
        }
        for color in &self.colors {
            out.extend_from_slice(&color.to_be_bytes());
        }
        out
    }

    /// Every div must fall inside the bitmap it describes.
    pub fn check_bounds(&self, width: u32, height: u32) -> Result<(), ChunkError> {
        check_within(&self.x_divs, width, "x")?;
        check_within(&self.y_divs, height, "y")
    }

    /// Rescale for a bitmap resized by `scale` to `width` x `height`.
    pub fn scaled(&self, scale: f32, width: u32, height: u32) -> Self {
        let round = |v: i32| (v as f32 * scale + 0.5) as i32;
        Self {
            x_divs: scale_divs(&self.x_divs, scale, width as i32),
            y_divs: scale_divs(&self.y_divs, scale, height as i32),
            padding: Padding {
                left: round(self.padding.left),
                right: round(self.padding.right),
                top: round(self.padding.top),
                bottom: round(self.padding.bottom),
            },
            colors: self.colors.clone(),
        }
    }
}

fn check_ascending(divs: &[i32], axis: &'static str) -> Result<(), ChunkError> {
    if divs.windows(2).any(|w| w[1] < w[0]) {
        return Err(ChunkError::UnorderedDivs { axis });
    }
    Ok(())
}

fn check_within(divs: &[i32], extent: u32, axis: &'static str) -> Result<(), ChunkError> {
    match divs.iter().find(|&&d| d < 0 || d as i64 > extent as i64) {
        Some(&div) => Err(ChunkError::DivOutOfBounds { axis, div, extent }),
        None => Ok(()),
    }
}

/// Scale div positions, keeping neighbours distinct and the last div within
/// `max_value`.
fn scale_divs(divs: &[i32], scale: f32, max_value: i32) -> Vec<i32> {
    let mut out: Vec<i32> = Vec::with_capacity(divs.len());
    for &div in divs {
        let mut scaled = (div as f32 * scale + 0.5) as i32;
        if let Some(&prev) = out.last() {
            if scaled == prev {
                scaled += 1;
            }
        }
        out.push(scaled);
    }

    if out.last().is_some_and(|&last| last > max_value) {
        // Slide the outermost divs back inside the bounds.
        let mut highest = max_value;
        for i in (0..out.len()).rev() {
            out[i] = highest;
            if i > 0 && out[i] <= out[i - 1] {
                highest = out[i] - 1;
            } else {
                break;
            }
        }
    }
    out
}
