//! Run-length mask transport codec.
//!
//! The segmentation service ships every binary mask as an uncompressed
//! COCO-style RLE: alternating background/foreground run lengths, starting
//! with background, walking the raster in **column-major** order (row index
//! increments fastest). Decoded masks are stored row-major, so the decode
//! deliberately changes address spaces: position `p` in the walk lands at
//! `row = p % rows`, `col = p / rows`, which is byte `row * cols + col` of
//! the output.
//!
//! Encoding is the remote service's job; this engine only decodes.

use crate::foundation::error::{SaviError, SaviResult};

/// Wire form of one run-length encoded mask: `{"size": [rows, cols],
/// "counts": [...]}`.
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RleMask {
    /// (rows, cols) of the mask raster.
    pub size: (u32, u32),
    pub counts: Vec<u32>,
}

impl RleMask {
    pub fn rows(&self) -> u32 {
        self.size.0
    }

    pub fn cols(&self) -> u32 {
        self.size.1
    }

    /// Decode into the canonical row-major [`BinaryMask`].
    ///
    /// Pure and idempotent: no shared state across calls. An odd-length
    /// counts sequence carries an implicit trailing zero foreground run;
    /// empty counts decode to an all-background mask. A foreground run that
    /// would write past `rows * cols` pixels is a protocol error.
    pub fn decode(&self) -> SaviResult<BinaryMask> {
        let (rows, cols) = self.size;
        let mut mask = BinaryMask::all_background(rows, cols);
        if mask.len() == 0 {
            return Ok(mask);
        }

        let rows = rows as usize;
        let cols = cols as usize;
        let total = rows * cols;
        let mut p = 0usize; // position in the column-major walk

        for pair in self.counts.chunks(2) {
            p = p.saturating_add(pair[0] as usize);
            let ones = pair.get(1).copied().unwrap_or(0) as usize;
            if ones == 0 {
                continue;
            }
            if p + ones > total {
                return Err(SaviError::protocol(format!(
                    "rle foreground run overruns {rows}x{cols} mask at position {p}"
                )));
            }
            for _ in 0..ones {
                let row = p % rows;
                let col = p / rows;
                mask.data[row * cols + col] = 1;
                p += 1;
            }
        }

        Ok(mask)
    }
}

/// A decoded binary mask: row-major flat, one byte per pixel (0 or 1),
/// indexed `row * cols + col`.
///
/// This is the single in-memory mask representation. Callers that want a
/// nested 2-D `[row][col]` layout go through [`BinaryMask::to_rows`], an
/// explicit conversion rather than an alternate representation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryMask {
    rows: u32,
    cols: u32,
    data: Vec<u8>,
}

impl BinaryMask {
    pub fn all_background(rows: u32, cols: u32) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; (rows as usize) * (cols as usize)],
        }
    }

    pub fn rows(&self) -> u32 {
        self.rows
    }

    pub fn cols(&self) -> u32 {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn is_set(&self, row: u32, col: u32) -> bool {
        if row >= self.rows || col >= self.cols {
            return false;
        }
        self.data[(row as usize) * (self.cols as usize) + (col as usize)] == 1
    }

    /// Number of foreground pixels.
    pub fn foreground(&self) -> usize {
        self.data.iter().filter(|&&b| b == 1).count()
    }

    /// Legacy 2-D `[row][col]` layout, for callers that still want nested
    /// rows. The flat form is canonical; this is a conversion, not an
    /// alternate representation.
    pub fn to_rows(&self) -> Vec<Vec<u8>> {
        self.data
            .chunks(self.cols.max(1) as usize)
            .map(<[u8]>::to_vec)
            .collect()
    }
}
