use rand::Rng;

use super::{GrowRequest, WellFinder};
use crate::classify::LightMode;
use crate::config::OverflowConfig;
use crate::tray_layout::TrayLayout;
use crate::well::{PixelPos, Well};

/// Hamming window of length `n` (`0.54 − 0.46·cos(2πi/(n−1))`).
pub fn hamming_window(n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![1.0],
        _ => (0..n)
            .map(|i| {
                0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (n - 1) as f64).cos()
            })
            .collect(),
    }
}

/// Overflow reservoir search result.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OverflowResult {
    /// Searched column band `[start, end)`.
    pub band: [i32; 2],
    /// Detected water fill line, if the band could be profiled.
    pub fill_line: Option<i32>,
    /// Windowed row differences the fill line was picked from.
    pub profile: Vec<f64>,
    pub seed: PixelPos,
    pub threshold: f64,
    pub row_floor: i32,
    /// Whether the fixed fallback location was used.
    pub fallback_used: bool,
    pub well: Well,
}

/// Row of the strongest windowed edge of `channel` summed across the band.
fn find_fill_line(
    image: &image::RgbImage,
    band: [i32; 2],
    channel: usize,
    offset: usize,
) -> Option<(i32, Vec<f64>)> {
    let width = image.width() as i32;
    let lo = band[0].clamp(0, width) as u32;
    let hi = band[1].clamp(0, width) as u32;
    let height = image.height() as usize;
    if lo >= hi || height <= offset {
        return None;
    }

    let sums: Vec<i64> = (0..image.height())
        .map(|row| {
            (lo..hi)
                .map(|col| image.get_pixel(col, row).0[channel] as i64)
                .sum()
        })
        .collect();
    let diffs: Vec<f64> = (0..height - offset)
        .map(|i| (sums[i + offset] - sums[i]).abs() as f64)
        .collect();
    let profile: Vec<f64> = diffs
        .iter()
        .zip(hamming_window(diffs.len()))
        .map(|(d, w)| d * w)
        .collect();

    let mut best = 0;
    for (i, &v) in profile.iter().enumerate() {
        if v > profile[best] {
            best = i;
        }
    }
    Some(((best + offset) as i32, profile))
}

/// Find the water fill line beside the big wells and grow the overflow
/// reservoir below it.
///
/// `right_col` is the snapped column of the last well of the first big row.
/// Failures fall back to a fixed location near the right image edge.
#[allow(clippy::too_many_arguments)]
pub fn analyze_overflow<R: Rng>(
    finder: &WellFinder<'_>,
    layout: &TrayLayout,
    right_col: i32,
    scale: f64,
    mode: LightMode,
    cfg: &OverflowConfig,
    rng: &mut R,
) -> OverflowResult {
    let image = finder.image();
    let field = finder.field();
    let band = [
        right_col + (layout.overflow_x_start_mm * scale) as i32,
        right_col + (layout.overflow_x_end_mm * scale) as i32,
    ];
    let range = band[1] - band[0];

    let fill = find_fill_line(image, band, mode.fill_line_channel(), cfg.diff_offset);
    let fill_line = fill.as_ref().map(|(line, _)| *line);
    let profile = fill.map(|(_, p)| p).unwrap_or_default();

    let primary = fill_line.and_then(|line| {
        let seed = PixelPos::new(line + range, (band[0] + band[1]).div_euclid(2));
        field.get(seed.row, seed.col).map(|v| (seed, v, line))
    });

    let fallback_used = primary.is_none();
    let (seed, intensity, row_floor) = match primary {
        Some(found) => found,
        None => {
            let seed = PixelPos::new(
                field.height() as i32 / 2,
                field.width() as i32 - cfg.fallback_col_offset as i32,
            );
            tracing::warn!(
                band_start = band[0],
                band_end = band[1],
                seed_row = seed.row,
                seed_col = seed.col,
                "overflow detection failed; using fallback location"
            );
            let intensity = field.get(seed.row, seed.col).unwrap_or(0);
            let floor = fill_line.map_or(0, |line| line.min(seed.row));
            (seed, intensity, floor)
        }
    };

    let threshold = cfg.threshold_ratio * intensity as f64;
    let size = range.max(1);
    let req = GrowRequest::new(seed, size, threshold).with_row_floor(row_floor);
    let outcome = finder.grower().grow_with_backoff(&req, rng);
    let well = Well::nominal(seed, size).with_blob(outcome.pixels, image);

    tracing::debug!(
        ?fill_line,
        n_pixels = well.n_pixels(),
        fallback_used,
        "overflow analyzed"
    );

    OverflowResult {
        band,
        fill_line,
        profile,
        seed,
        threshold,
        row_floor,
        fallback_used,
        well,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GrowConfig;
    use crate::preprocess::IntensityField;
    use approx::assert_abs_diff_eq;
    use image::{Rgb, RgbImage};
    use imageproc::drawing::draw_filled_rect_mut;
    use imageproc::rect::Rect;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn hamming_matches_reference_values() {
        let w = hamming_window(5);
        let expected = [0.08, 0.54, 1.0, 0.54, 0.08];
        for (a, b) in w.iter().zip(expected) {
            assert_abs_diff_eq!(*a, b, epsilon = 1e-12);
        }
        assert_eq!(hamming_window(1), vec![1.0]);
    }

    #[test]
    fn fill_line_and_reservoir_are_found() {
        let mut img = RgbImage::new(200, 160);
        draw_filled_rect_mut(&mut img, Rect::at(120, 60).of_size(51, 100), Rgb([100, 100, 100]));
        let field = IntensityField::from_rgb(&img);
        let grow = GrowConfig::default();
        let finder = WellFinder::new(&img, &field, &grow, 101.0);
        let mut rng = StdRng::seed_from_u64(6);

        let res = analyze_overflow(
            &finder,
            &TrayLayout::standard(),
            60,
            2.0,
            LightMode::Visible,
            &OverflowConfig::default(),
            &mut rng,
        );
        assert_eq!(res.band, [114, 144]);
        assert_eq!(res.fill_line, Some(62));
        assert!(!res.fallback_used);
        assert_eq!(res.seed, PixelPos::new(92, 129));
        assert_eq!(res.row_floor, 62);
        // Rows 62..=158 (last row is border), columns 120..=170.
        assert_eq!(res.well.n_pixels(), 97 * 51);
        assert!(res.well.centroid_valid);
    }

    #[test]
    fn narrow_image_uses_fallback_seed() {
        let mut img = RgbImage::new(100, 80);
        draw_filled_rect_mut(&mut img, Rect::at(35, 30).of_size(21, 21), Rgb([200, 200, 200]));
        let field = IntensityField::from_rgb(&img);
        let grow = GrowConfig::default();
        let finder = WellFinder::new(&img, &field, &grow, 101.0);
        let mut rng = StdRng::seed_from_u64(6);

        let res = analyze_overflow(
            &finder,
            &TrayLayout::standard(),
            90,
            2.0,
            LightMode::Uv,
            &OverflowConfig::default(),
            &mut rng,
        );
        assert!(res.fallback_used);
        assert_eq!(res.fill_line, None);
        assert_eq!(res.seed, PixelPos::new(40, 44));
        assert_eq!(res.row_floor, 0);
        assert_eq!(res.well.n_pixels(), 21 * 21);
        assert_eq!(res.well.center, PixelPos::new(40, 45));
    }
}
