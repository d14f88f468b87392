//! Image preparation ahead of well detection.
//!
//! Downscaling to the working width, background subtraction, the summed
//! intensity plane every detector stage reads from, and threshold selection.

mod background;
mod threshold;

pub use background::{
    estimate_background, normalize_background, subtract_background, BackgroundEstimate,
};
pub use threshold::{estimate_threshold, ThresholdEstimate, HISTOGRAM_BINS};

use image::RgbImage;

/// Downscale `image` to `target_width` when it is wider, keeping the aspect
/// ratio (`trunc(h·target/w) + 1` rows). Narrower images are returned as is.
pub fn resize_to_width(image: RgbImage, target_width: u32) -> RgbImage {
    if image.width() <= target_width || target_width == 0 {
        return image;
    }
    let height =
        (image.height() as u64 * target_width as u64 / image.width() as u64) as u32 + 1;
    tracing::debug!(
        from_width = image.width(),
        from_height = image.height(),
        to_width = target_width,
        to_height = height,
        "resizing input image"
    );
    image::imageops::resize(
        &image,
        target_width,
        height,
        image::imageops::FilterType::Lanczos3,
    )
}

/// Per-pixel sum of the three color channels (0..=765).
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityField {
    width: usize,
    height: usize,
    data: Vec<u16>,
}

impl IntensityField {
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| p.0.iter().map(|&v| v as u16).sum())
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Intensity at `(row, col)`; `None` outside the field.
    pub fn get(&self, row: i32, col: i32) -> Option<u16> {
        if row < 0 || col < 0 {
            return None;
        }
        let (r, c) = (row as usize, col as usize);
        if r >= self.height || c >= self.width {
            return None;
        }
        Some(self.data[r * self.width + c])
    }

    /// Whether `(row, col)` lies strictly inside the field (one-pixel border
    /// excluded).
    pub fn is_interior(&self, row: i32, col: i32) -> bool {
        row > 0
            && col > 0
            && (row as i64) < self.height as i64 - 1
            && (col as i64) < self.width as i64 - 1
    }

    pub fn row_sums(&self) -> Vec<u64> {
        if self.width == 0 {
            return vec![0; self.height];
        }
        self.data
            .chunks_exact(self.width)
            .map(|row| row.iter().map(|&v| v as u64).sum())
            .collect()
    }

    pub fn col_sums(&self) -> Vec<u64> {
        let mut sums = vec![0u64; self.width];
        if self.width == 0 {
            return sums;
        }
        for row in self.data.chunks_exact(self.width) {
            for (s, &v) in sums.iter_mut().zip(row) {
                *s += v as u64;
            }
        }
        sums
    }

    /// Pixel count per intensity value.
    pub fn histogram(&self) -> Vec<u64> {
        let mut hist = vec![0u64; HISTOGRAM_BINS];
        for &v in &self.data {
            hist[v as usize] += 1;
        }
        hist
    }
}
