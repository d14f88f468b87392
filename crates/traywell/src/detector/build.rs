//! Chained well-grid construction.
//!
//! Each well is searched at a position predicted from its detected left
//! neighbour, so perspective and skew drift accumulate into the prediction
//! instead of into the error.

use rand::Rng;

use super::WellFinder;
use crate::grid::{GridShape, WellGrid};
use crate::tray_layout::TrayLayout;
use crate::well::{PixelPos, Well};

/// Big-well grid plus the geometry refined from its first row.
#[derive(Debug, Clone, PartialEq)]
pub struct BigWells {
    pub grid: WellGrid,
    /// Pixels per mm measured across the first row.
    pub scale: f64,
    /// Mean row of the first row, original origin column.
    pub origin: PixelPos,
    pub size_px: i32,
    pub spacing_px: i32,
}

/// Find the wells of one row, chaining each prediction from the previous
/// detection. Positions missing from `shape` only advance the column.
///
/// `on_well` is called after every detected well with the wells found so
/// far; it may return a new spacing.
#[allow(clippy::too_many_arguments)]
fn chain_row<R: Rng>(
    finder: &WellFinder<'_>,
    shape: &GridShape,
    row: usize,
    start: PixelPos,
    size: i32,
    mut spacing: i32,
    rng: &mut R,
    mut on_well: impl FnMut(&[Well], i32) -> i32,
) -> Vec<Well> {
    let mut nominal = start;
    let mut wells: Vec<Well> = Vec::with_capacity(shape.cols);
    for col in 0..shape.cols {
        if !shape.contains(row, col) {
            nominal.col += spacing;
            continue;
        }
        let mut well = finder.find(nominal, size, rng);
        if let Some(prev) = wells.last() {
            if well.center.col == prev.center.col {
                tracing::debug!(
                    row,
                    col,
                    center_row = well.center.row,
                    center_col = well.center.col,
                    "duplicate well; forcing nominal column"
                );
                let row = well.center.row;
                well = well.snapped_to(PixelPos::new(row, nominal.col));
            }
        }
        nominal = PixelPos::new(well.center.row, well.center.col);
        wells.push(well);
        spacing = on_well(&wells, spacing);
        nominal.col += spacing;
    }
    wells
}

fn mean_row(wells: &[Well]) -> Option<i32> {
    if wells.is_empty() {
        return None;
    }
    let sum: i64 = wells.iter().map(|w| w.center.row as i64).sum();
    Some(sum.div_euclid(wells.len() as i64) as i32)
}

/// Lay out and detect the big wells, refining the scale after the first row.
pub fn build_big_wells<R: Rng>(
    finder: &WellFinder<'_>,
    layout: &TrayLayout,
    origin: PixelPos,
    rect_scale: f64,
    rng: &mut R,
) -> BigWells {
    let shape = layout.big_shape();
    let mut scale = rect_scale;
    let mut size = (layout.big_well_size_mm * scale) as i32;
    let mut spacing = (layout.big_well_spacing_mm * scale) as i32;
    let mut origin_row = origin.row;

    let mut rows = Vec::with_capacity(shape.n_rows());
    for i in 0..shape.n_rows() {
        let start = PixelPos::new(origin_row + i as i32 * spacing, origin.col);
        let first_row = i == 0;
        let wells = chain_row(finder, &shape, i, start, size, spacing, rng, |wells, spacing| {
            match (first_row, wells.first(), wells.last()) {
                (true, Some(first), Some(last)) if wells.len() > 1 => {
                    (last.center.col - first.center.col).div_euclid(wells.len() as i32 - 1)
                }
                _ => spacing,
            }
        });

        if first_row {
            if let (Some(first), Some(last)) = (wells.first(), wells.last()) {
                if wells.len() > 1 {
                    scale = (last.center.col - first.center.col) as f64
                        / (layout.big_well_spacing_mm * (wells.len() - 1) as f64);
                }
            }
            origin_row = mean_row(&wells).unwrap_or(origin_row);
            size = (layout.big_well_size_mm * scale) as i32;
            spacing = (layout.big_well_spacing_mm * scale) as i32;
            tracing::debug!(scale, origin_row, size, spacing, "refined big-well geometry");
        }
        rows.push(wells);
    }

    BigWells {
        grid: WellGrid::from_rows(shape, rows),
        scale,
        origin: PixelPos::new(origin_row, origin.col),
        size_px: size,
        spacing_px: spacing,
    }
}

/// Lay out and detect the small wells relative to the big-well origin.
///
/// Returns an empty grid for trays without small wells.
pub fn build_small_wells<R: Rng>(
    finder: &WellFinder<'_>,
    layout: &TrayLayout,
    big: &BigWells,
    rng: &mut R,
) -> WellGrid {
    let shape = layout.small_shape();
    if shape.n_rows() == 0 {
        return WellGrid::from_rows(shape, Vec::new());
    }

    let scale = big.scale;
    let size = (layout.small_well_size_mm * scale) as i32;
    let mut spacing = (layout.small_well_spacing_mm * scale) as i32;
    let mut anchor_row = big.origin.row + (layout.first_small_well_row_mm * scale) as i32;
    let anchor_col = big.origin.col + (layout.first_small_well_col_mm * scale) as i32;

    let mut rows = Vec::with_capacity(shape.n_rows());
    for i in 0..shape.n_rows() {
        let start = PixelPos::new(anchor_row + i as i32 * spacing, anchor_col);
        let wells = chain_row(finder, &shape, i, start, size, spacing, rng, |_, s| s);

        if i == 0 {
            if let (Some(first), Some(last)) = (wells.first(), wells.last()) {
                if wells.len() > 1 {
                    spacing = (last.center.col - first.center.col)
                        .div_euclid(wells.len() as i32 - 1);
                }
            }
            anchor_row = mean_row(&wells).unwrap_or(anchor_row);
            tracing::debug!(spacing, anchor_row, "refined small-well geometry");
        }
        rows.push(wells);
    }

    WellGrid::from_rows(shape, rows)
}
