use image::RgbImage;

use crate::config::BackgroundConfig;

/// Background row measured near the top edge of the tray.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BackgroundEstimate {
    /// First row containing well-bright samples (or the last row).
    pub well_top_row: usize,
    /// Rows `[start, end)` searched for the tray edge.
    pub edge_band: [usize; 2],
    /// Detected tray edge row (0 when no rising edge was found).
    pub edge_row: usize,
    /// Row the background profile was taken from.
    pub background_row: usize,
    /// Smoothed per-column `[r, g, b]` background.
    pub profile: Vec<[f64; 3]>,
    /// Summed-channel background per column, averaged across the row.
    pub level: f64,
}

/// Boxcar smoothing over `[i − width/2, i + width/2)`; the ends are copied.
fn boxcar(line: &[f64], width: usize) -> Vec<f64> {
    let half = width / 2;
    let mut out = line.to_vec();
    if width == 0 || line.len() < 2 * half {
        return out;
    }
    for i in half..line.len() - half {
        out[i] = line[i - half..i + half].iter().sum::<f64>() / width as f64;
    }
    out
}

/// Row index of the steepest rising edge of `channel` down the center column.
fn find_edge(image: &RgbImage, channel: usize, step: usize, band: [usize; 2]) -> usize {
    let height = image.height() as usize;
    let col = image.width() / 2;
    let sample = |row: usize| image.get_pixel(col, row as u32).0[channel] as i32;

    let mut peak = 0;
    let mut best = 0;
    for i in band[0]..band[1] {
        if i + step >= height {
            break;
        }
        let diff = sample(i + step) - sample(i);
        if diff > best {
            best = diff;
            peak = i;
        }
    }
    peak
}

/// Locate the tray edge above the wells and measure the background row
/// just below it.
pub fn estimate_background(image: &RgbImage, cfg: &BackgroundConfig) -> BackgroundEstimate {
    let width = image.width() as usize;
    let height = image.height() as usize;
    let last_row = height.saturating_sub(1);

    let well_top_row = (cfg.scan_start_row..height)
        .find(|&row| {
            (0..image.width()).any(|col| {
                image.get_pixel(col, row as u32).0[cfg.detect_channel] > cfg.well_threshold
            })
        })
        .unwrap_or(last_row);

    let band_end = well_top_row.saturating_sub(cfg.well_clearance);
    let band_start = band_end.saturating_sub(cfg.band_height);
    let edge_band = [band_start, band_end];
    let edge_row = find_edge(image, cfg.edge_channel, cfg.edge_step, edge_band);
    let background_row = (edge_row + cfg.edge_shift).min(last_row);

    let mut profile = vec![[0.0f64; 3]; width];
    if height > 0 {
        for ch in 0..3 {
            let line: Vec<f64> = (0..image.width())
                .map(|col| image.get_pixel(col, background_row as u32).0[ch] as f64)
                .collect();
            for (p, v) in profile.iter_mut().zip(boxcar(&line, cfg.smoothing_width)) {
                p[ch] = v;
            }
        }
    }
    let level = if width > 0 {
        profile.iter().map(|p| p[0] + p[1] + p[2]).sum::<f64>() / width as f64
    } else {
        0.0
    };

    tracing::debug!(
        well_top_row,
        edge_row,
        background_row,
        level,
        "background estimated"
    );

    BackgroundEstimate {
        well_top_row,
        edge_band,
        edge_row,
        background_row,
        profile,
        level,
    }
}

/// Subtract the background profile from every row, clip at zero and
/// rescale so the brightest sample becomes `target_max`.
pub fn subtract_background(
    image: &RgbImage,
    estimate: &BackgroundEstimate,
    target_max: f64,
) -> RgbImage {
    let width = image.width() as usize;
    let diff = |idx: usize, v: u8| {
        let col = (idx / 3) % width;
        (v as f64 - estimate.profile[col][idx % 3]).max(0.0)
    };

    let max = image
        .as_raw()
        .iter()
        .enumerate()
        .map(|(i, &v)| diff(i, v))
        .fold(0.0f64, f64::max);
    let mut out = RgbImage::new(image.width(), image.height());
    if max <= 0.0 {
        tracing::warn!("background subtraction left no signal; image is black");
        return out;
    }

    let ratio = target_max / max;
    for (i, (dst, &v)) in out.iter_mut().zip(image.as_raw().iter()).enumerate() {
        *dst = (diff(i, v) * ratio) as u8;
    }
    out
}

/// Estimate and subtract the background in one step.
pub fn normalize_background(
    image: &RgbImage,
    cfg: &BackgroundConfig,
) -> (RgbImage, BackgroundEstimate) {
    let estimate = estimate_background(image, cfg);
    let normalized = subtract_background(image, &estimate, cfg.target_max);
    (normalized, estimate)
}
