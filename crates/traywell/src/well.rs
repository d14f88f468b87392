//! Well records.
//!
//! A [`Well`] is produced and re-produced by the pipeline stages rather than
//! mutated in place: each stage consumes the previous value and returns the
//! next one (nominal → pixels and centroid → snapped → regenerated →
//! classified).

use image::RgbImage;

/// Integer pixel coordinate in the working (unwarped) frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub struct PixelPos {
    pub row: i32,
    pub col: i32,
}

impl PixelPos {
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Euclidean distance to another position.
    pub fn distance(self, other: PixelPos) -> f64 {
        let dr = (self.row - other.row) as f64;
        let dc = (self.col - other.col) as f64;
        (dr * dr + dc * dc).sqrt()
    }
}

/// Unweighted integer centroid (floor of the mean) of a pixel set.
pub(crate) fn centroid(pixels: &[PixelPos]) -> Option<PixelPos> {
    if pixels.is_empty() {
        return None;
    }
    let n = pixels.len() as i64;
    let sum_row: i64 = pixels.iter().map(|p| p.row as i64).sum();
    let sum_col: i64 = pixels.iter().map(|p| p.col as i64).sum();
    Some(PixelPos::new(
        sum_row.div_euclid(n) as i32,
        sum_col.div_euclid(n) as i32,
    ))
}

/// Per-well classification outcome.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellCall {
    /// Per-pixel positivity signal, parallel to [`Well::pixels`].
    ///
    /// 0 for negative pixels; 1 (visible) or the distance to the well center
    /// (UV) for positive pixels.
    pub pixel_signal: Vec<u32>,
    /// Number of pixels counted in the denominator.
    pub counted: usize,
    /// `sum(pixel_signal) / (counted + 1)`.
    pub score: f64,
    pub positive: bool,
}

/// A single well of the tray.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Well {
    /// Position predicted from the layout before any pixels were assigned.
    pub nominal: PixelPos,
    /// Nominal well size (edge length) in pixels.
    pub size_px: i32,
    /// Detected center. Falls back to `nominal` when no pixels were found.
    pub center: PixelPos,
    /// Whether `center` was computed from member pixels.
    pub centroid_valid: bool,
    /// Member pixels, sorted by (row, col).
    pub pixels: Vec<PixelPos>,
    /// RGB samples parallel to `pixels`.
    pub samples: Vec<[u8; 3]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call: Option<WellCall>,
}

impl Well {
    /// A well at its layout position with no pixels yet.
    pub fn nominal(nominal: PixelPos, size_px: i32) -> Self {
        Self {
            nominal,
            size_px,
            center: nominal,
            centroid_valid: false,
            pixels: Vec::new(),
            samples: Vec::new(),
            call: None,
        }
    }

    /// Assign member pixels and compute the centroid from them.
    pub(crate) fn with_blob(self, pixels: Vec<PixelPos>, image: &RgbImage) -> Self {
        let samples = sample_pixels(image, &pixels);
        let (center, centroid_valid) = match centroid(&pixels) {
            Some(c) => (c, true),
            None => {
                tracing::debug!(
                    "no pixels for well at ({}, {}); keeping nominal center",
                    self.nominal.row,
                    self.nominal.col
                );
                (self.nominal, false)
            }
        };
        Self {
            center,
            centroid_valid,
            pixels,
            samples,
            call: None,
            ..self
        }
    }

    /// Move the detected center without touching the member pixels.
    pub(crate) fn snapped_to(self, center: PixelPos) -> Self {
        Self { center, ..self }
    }

    /// Replace member pixels, keeping the current center. The center counts
    /// as valid only while the well has pixels.
    pub(crate) fn regenerated(self, pixels: Vec<PixelPos>, image: &RgbImage) -> Self {
        let samples = sample_pixels(image, &pixels);
        Self {
            centroid_valid: !pixels.is_empty(),
            pixels,
            samples,
            call: None,
            ..self
        }
    }

    /// Attach a classification outcome.
    pub(crate) fn classified(self, call: WellCall) -> Self {
        Self {
            call: Some(call),
            ..self
        }
    }

    pub fn n_pixels(&self) -> usize {
        self.pixels.len()
    }

    /// Nominal area of the well in pixels.
    pub fn nominal_area(&self) -> usize {
        let s = self.size_px.max(0) as usize;
        s * s
    }

    /// Fewer than half the expected pixels.
    pub fn has_few_pixels(&self) -> bool {
        self.pixels.len() * 2 < self.nominal_area()
    }

    /// More pixels than the full nominal area.
    pub fn has_excess_pixels(&self) -> bool {
        self.pixels.len() > self.nominal_area()
    }

    /// Positive call; false until classified.
    pub fn is_positive(&self) -> bool {
        self.call.as_ref().is_some_and(|c| c.positive)
    }
}

fn sample_pixels(image: &RgbImage, pixels: &[PixelPos]) -> Vec<[u8; 3]> {
    pixels
        .iter()
        .map(|p| image.get_pixel(p.col as u32, p.row as u32).0)
        .collect()
}
