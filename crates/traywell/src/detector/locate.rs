use rand::Rng;

use super::WellFinder;
use crate::config::LocateConfig;
use crate::error::TrayError;
use crate::preprocess::IntensityField;
use crate::tray_layout::TrayLayout;
use crate::well::PixelPos;

/// Bright rectangle spanned by the big wells, in working-frame pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TrayRect {
    /// First row whose intensity sum crosses the start threshold.
    pub top: usize,
    /// Last row whose intensity sum crosses the end threshold.
    pub bottom: usize,
    /// First column whose intensity sum crosses the start threshold.
    pub left: usize,
}

impl TrayRect {
    pub fn height(&self) -> usize {
        self.bottom - self.top
    }
}

/// Find the tray rectangle from row and column intensity sums.
///
/// Returns `None` when any edge is missing or the rectangle has no height.
pub fn find_rectangle(field: &IntensityField, cfg: &LocateConfig) -> Option<TrayRect> {
    let rows = field.row_sums();
    let top = rows.iter().position(|&s| s > cfg.rect_start_threshold)?;
    let bottom = rows.iter().rposition(|&s| s > cfg.rect_end_threshold)?;
    let left = field
        .col_sums()
        .iter()
        .position(|&s| s > cfg.rect_start_threshold)?;
    (bottom > top).then_some(TrayRect { top, bottom, left })
}

/// Origin (top-left big well) and first scale estimate.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct OriginEstimate {
    pub rect: TrayRect,
    /// Pixels per mm implied by the rectangle height.
    pub rect_scale: f64,
    /// Origin predicted from the rectangle corner.
    pub approximate: PixelPos,
    /// Centroid of the blob grown at the approximate origin.
    pub origin: PixelPos,
    pub n_pixels: usize,
    /// Threshold factor that produced the blob.
    pub factor: f64,
}

/// Locate the tray rectangle, derive the scale, and pin the origin well.
pub fn locate_origin<R: Rng>(
    finder: &WellFinder<'_>,
    layout: &TrayLayout,
    cfg: &LocateConfig,
    image_id: &str,
    rng: &mut R,
) -> Result<OriginEstimate, TrayError> {
    let no_origin = || TrayError::NoOriginDetected {
        image_id: image_id.to_string(),
    };

    let Some(rect) = find_rectangle(finder.field(), cfg) else {
        tracing::warn!("{}: tray rectangle not found", image_id);
        return Err(no_origin());
    };
    let rect_scale = rect.height() as f64 / layout.big_grid_height_mm();
    let size = (layout.big_well_size_mm * rect_scale) as i32;

    let mut col = rect.left as i32 + size / 2;
    if layout.has_small_wells() {
        col -= (layout.first_small_well_col_mm * rect_scale) as i32;
    }
    let approximate = PixelPos::new(rect.top as i32 + size / 2, col);

    let req = super::GrowRequest::new(approximate, size, finder.threshold());
    let outcome = finder.grower().grow_with_backoff(&req, rng);
    let Some(origin) = crate::well::centroid(&outcome.pixels) else {
        tracing::warn!(
            "{}: no blob at approximate origin ({}, {})",
            image_id,
            approximate.row,
            approximate.col
        );
        return Err(no_origin());
    };

    tracing::debug!(
        top = rect.top,
        bottom = rect.bottom,
        left = rect.left,
        rect_scale,
        "tray rectangle"
    );

    Ok(OriginEstimate {
        rect,
        rect_scale,
        approximate,
        origin,
        n_pixels: outcome.pixels.len(),
        factor: outcome.factor,
    })
}
