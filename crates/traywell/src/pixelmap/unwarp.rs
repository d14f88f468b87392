use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::TrayError;

/// Resolution of the radius lookup table in normalized squared radius.
pub const RADIUS_TABLE_STEP: f64 = 1.0 / 100.0;
/// Number of table entries: 100 steps over `[0, 1]` plus 50 bins of margin
/// for target pixels beyond the source corner radius.
pub const RADIUS_TABLE_LEN: usize = 150;

/// Marker for target pixels that have no source pixel.
pub const NO_SOURCE: u32 = u32::MAX;

/// Distorted radius `Rd` for an undistorted radius `Ru` under
/// `Ru = Rd·(1 + k·Rd²)`.
///
/// Solves `k·Rd³ + Rd − Ru = 0` in closed form, followed by a short Newton
/// polish. For `k < 0` the smallest non-negative real root is returned; when
/// no such root exists the radius of maximum `Ru` is returned instead.
pub fn distorted_radius(k: f64, ru: f64) -> f64 {
    if k.abs() < 1e-12 {
        return ru;
    }
    // Depressed cubic x³ + p·x + q = 0.
    let p = 1.0 / k;
    let q = -ru / k;
    let disc = (q * 0.5).powi(2) + (p / 3.0).powi(3);

    let root = if disc >= 0.0 {
        let s = disc.sqrt();
        (-q * 0.5 + s).cbrt() + (-q * 0.5 - s).cbrt()
    } else {
        // Three real roots (only reachable for k < 0).
        let m = 2.0 * (-p / 3.0).sqrt();
        let theta = ((3.0 * q) / (p * m)).clamp(-1.0, 1.0).acos() / 3.0;
        (0..3)
            .map(|i| m * (theta - 2.0 * std::f64::consts::PI * i as f64 / 3.0).cos())
            .filter(|r| *r >= 0.0)
            .fold(f64::INFINITY, f64::min)
    };

    if !root.is_finite() || root < 0.0 {
        return if k < 0.0 { (-1.0 / (3.0 * k)).sqrt() } else { ru };
    }

    let mut x = root;
    for _ in 0..3 {
        let f = k * x * x * x + x - ru;
        let df = 3.0 * k * x * x + 1.0;
        if df.abs() < 1e-12 {
            break;
        }
        x -= f / df;
    }
    x
}

/// Tabulated inverse of the radial model over normalized squared radius.
///
/// Entry `i` holds `Rd²` for `Ru² = i·RADIUS_TABLE_STEP`.
#[derive(Debug, Clone, PartialEq)]
pub struct RadiusTable {
    k: f64,
    rd2: Vec<f64>,
}

impl RadiusTable {
    pub fn new(k: f64) -> Self {
        let rd2 = (0..RADIUS_TABLE_LEN)
            .map(|i| {
                let ru = (RADIUS_TABLE_STEP * i as f64).sqrt();
                distorted_radius(k, ru).powi(2)
            })
            .collect();
        Self { k, rd2 }
    }

    pub fn k(&self) -> f64 {
        self.k
    }

    /// Nearest-lower-bin lookup; indices past the end clamp to the last entry.
    pub fn lookup(&self, ru2: f64) -> f64 {
        let idx = (ru2 / RADIUS_TABLE_STEP) as usize;
        self.rd2[idx.min(self.rd2.len() - 1)]
    }

    pub fn entries(&self) -> &[f64] {
        &self.rd2
    }
}

/// Fixed radial lens model used to straighten tray photographs.
#[derive(Debug, Clone, PartialEq)]
pub struct LensUnwarper {
    table: RadiusTable,
}

impl LensUnwarper {
    pub fn new(k: f64) -> Self {
        Self {
            table: RadiusTable::new(k),
        }
    }

    pub fn k(&self) -> f64 {
        self.table.k()
    }

    pub fn table(&self) -> &RadiusTable {
        &self.table
    }

    /// Build the target→source map for a source of the given size.
    pub fn build_map(&self, source_width: u32, source_height: u32, padding: u32) -> UnwarpMap {
        let k = self.table.k();
        let src_w = source_width as i64;
        let src_h = source_height as i64;
        let tw = source_width + 2 * padding;
        let th = source_height + 2 * padding;

        let center_row = src_h / 2;
        let center_col = src_w / 2;
        let rmax2 = ((center_row * center_row + center_col * center_col) as f64).max(1.0);
        let target_center_row = th as i64 / 2;
        let target_center_col = tw as i64 / 2;

        let mut entries = vec![NO_SOURCE; tw as usize * th as usize];
        if tw > 0 {
            entries
                .par_chunks_mut(tw as usize)
                .enumerate()
                .for_each(|(row, out)| {
                    let dr = row as i64 - target_center_row;
                    for (col, slot) in out.iter_mut().enumerate() {
                        let dc = col as i64 - target_center_col;
                        let ru2 = (dr * dr + dc * dc) as f64 / rmax2;
                        let factor = 1.0 + k * self.table.lookup(ru2);
                        let sr = (dr as f64 / factor).trunc() as i64 + center_row;
                        let sc = (dc as f64 / factor).trunc() as i64 + center_col;
                        if (0..src_h).contains(&sr) && (0..src_w).contains(&sc) {
                            *slot = (sr * src_w + sc) as u32;
                        }
                    }
                });
        }

        tracing::debug!(
            k,
            source_width,
            source_height,
            padding,
            "built unwarp map"
        );

        UnwarpMap {
            key: UnwarpKey {
                k,
                source_width,
                source_height,
                padding,
            },
            entries,
        }
    }
}

/// Parameters an [`UnwarpMap`] is a pure function of.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UnwarpKey {
    pub k: f64,
    pub source_width: u32,
    pub source_height: u32,
    pub padding: u32,
}

impl UnwarpKey {
    pub fn target_width(&self) -> u32 {
        self.source_width + 2 * self.padding
    }

    pub fn target_height(&self) -> u32 {
        self.source_height + 2 * self.padding
    }
}

/// Precomputed pull map from target pixels to source pixel indices.
///
/// Entries are row-major over the target image; each holds `row·width + col`
/// of the source pixel, or [`NO_SOURCE`].
#[derive(Debug, Clone, PartialEq)]
pub struct UnwarpMap {
    key: UnwarpKey,
    entries: Vec<u32>,
}

impl UnwarpMap {
    /// Reassemble a map from stored entries. Returns `None` when the entry
    /// count does not match the key.
    pub(crate) fn from_parts(key: UnwarpKey, entries: Vec<u32>) -> Option<Self> {
        let expected = key.target_width() as usize * key.target_height() as usize;
        (entries.len() == expected).then_some(Self { key, entries })
    }

    pub fn key(&self) -> &UnwarpKey {
        &self.key
    }

    pub fn target_width(&self) -> u32 {
        self.key.target_width()
    }

    pub fn target_height(&self) -> u32 {
        self.key.target_height()
    }

    pub fn entries(&self) -> &[u32] {
        &self.entries
    }

    /// Source `(row, col)` for a target pixel, if it has one.
    pub fn source_of(&self, row: u32, col: u32) -> Option<(u32, u32)> {
        if row >= self.target_height() || col >= self.target_width() {
            return None;
        }
        let entry = self.entries[(row * self.target_width() + col) as usize];
        if entry == NO_SOURCE {
            return None;
        }
        let w = self.key.source_width;
        Some((entry / w, entry % w))
    }

    /// Pull every target pixel from the source image.
    pub fn apply(&self, source: &image::RgbImage) -> Result<image::RgbImage, TrayError> {
        let got = [source.width(), source.height()];
        let expected = [self.key.source_width, self.key.source_height];
        if got != expected {
            return Err(TrayError::UnwarpDimensionMismatch { expected, got });
        }

        let tw = self.target_width();
        let th = self.target_height();
        let mut out = image::RgbImage::new(tw, th);
        if tw == 0 || th == 0 {
            return Ok(out);
        }
        let src = source.as_raw();
        let row_len = tw as usize * 3;
        out.par_chunks_mut(row_len)
            .zip(self.entries.par_chunks(tw as usize))
            .for_each(|(dst_row, map_row)| {
                for (dst, &entry) in dst_row.chunks_exact_mut(3).zip(map_row) {
                    if entry != NO_SOURCE {
                        let s = entry as usize * 3;
                        dst.copy_from_slice(&src[s..s + 3]);
                    }
                }
            });
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn cubic_root_satisfies_forward_model() {
        for &k in &[0.1322595, 0.5, -0.05] {
            for i in 0..RADIUS_TABLE_LEN {
                let ru = (RADIUS_TABLE_STEP * i as f64).sqrt();
                let rd = distorted_radius(k, ru);
                assert!(rd >= 0.0);
                assert_abs_diff_eq!(rd * (1.0 + k * rd * rd), ru, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn zero_k_is_identity_radius() {
        assert_eq!(distorted_radius(0.0, 0.7), 0.7);
        let table = RadiusTable::new(0.0);
        assert_abs_diff_eq!(table.lookup(0.505), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn lookup_clamps_past_table_end() {
        let table = RadiusTable::new(0.1322595);
        assert_eq!(table.entries().len(), RADIUS_TABLE_LEN);
        assert_eq!(table.lookup(10.0), table.entries()[RADIUS_TABLE_LEN - 1]);
        assert_eq!(table.lookup(0.015), table.entries()[1]);
    }

    #[test]
    fn map_is_pure() {
        let unwarper = LensUnwarper::new(0.1322595);
        let a = unwarper.build_map(64, 48, 4);
        let b = LensUnwarper::new(0.1322595).build_map(64, 48, 4);
        assert_eq!(a, b);
    }

    #[test]
    fn zero_k_map_is_padding_translation() {
        let map = LensUnwarper::new(0.0).build_map(30, 20, 5);
        assert_eq!(map.target_width(), 40);
        assert_eq!(map.target_height(), 30);
        assert_eq!(map.source_of(5, 5), Some((0, 0)));
        assert_eq!(map.source_of(24, 34), Some((19, 29)));
        assert_eq!(map.source_of(4, 10), None);
        assert_eq!(map.source_of(10, 35), None);

        let mut src = image::RgbImage::new(30, 20);
        src.put_pixel(7, 3, image::Rgb([1, 2, 3]));
        let out = map.apply(&src).unwrap();
        assert_eq!(out.get_pixel(12, 8).0, [1, 2, 3]);
        assert_eq!(out.get_pixel(0, 0).0, [0, 0, 0]);
    }

    #[test]
    fn positive_k_pulls_corners_inward() {
        let map = LensUnwarper::new(0.1322595).build_map(64, 48, 0);
        // Center maps to itself.
        assert_eq!(map.source_of(24, 32), Some((24, 32)));
        let (r, c) = map.source_of(0, 0).unwrap();
        assert!(r > 0 && c > 0);
    }

    #[test]
    fn apply_rejects_wrong_dimensions() {
        let map = LensUnwarper::new(0.0).build_map(8, 8, 1);
        let err = map.apply(&image::RgbImage::new(9, 8)).unwrap_err();
        assert_eq!(
            err,
            TrayError::UnwarpDimensionMismatch {
                expected: [8, 8],
                got: [9, 8]
            }
        );
    }
}
