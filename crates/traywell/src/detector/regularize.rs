//! Median snapping of well positions and regeneration of badly sized wells.

use rand::Rng;

use super::WellFinder;
use crate::config::RegularizeConfig;
use crate::grid::WellGrid;
use crate::well::{PixelPos, Well};

/// Median of `values`; even-length lists use the truncated mean of the two
/// middle values.
pub fn median(values: &[i32]) -> Option<i32> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        Some(sorted[mid])
    } else {
        Some(((sorted[mid - 1] as i64 + sorted[mid] as i64) / 2) as i32)
    }
}

/// Regrow wells whose pixel count is far from the nominal area.
fn regenerate<R: Rng>(
    well: Well,
    finder: &WellFinder<'_>,
    cfg: &RegularizeConfig,
    rng: &mut R,
) -> Well {
    let mut well = well;
    if well.has_few_pixels() {
        well = finder.regrow(well, cfg.relax_ratio, rng);
    }
    if well.has_excess_pixels() {
        well = finder.regrow(well, cfg.tighten_ratio, rng);
    }
    if well.pixels.is_empty() {
        tracing::warn!(
            row = well.center.row,
            col = well.center.col,
            "well has no pixels after regeneration"
        );
    }
    well
}

/// Snap big wells to per-row and per-column medians, then regenerate.
///
/// Row medians only use wells with more than `min_well_pixels` pixels when
/// any qualify; column medians use every row.
pub fn regularize_big<R: Rng>(
    grid: WellGrid,
    finder: &WellFinder<'_>,
    cfg: &RegularizeConfig,
    rng: &mut R,
) -> WellGrid {
    let row_medians: Vec<Option<i32>> = grid
        .rows
        .iter()
        .map(|wells| {
            let reliable: Vec<i32> = wells
                .iter()
                .filter(|w| w.n_pixels() > cfg.min_well_pixels)
                .map(|w| w.center.row)
                .collect();
            if reliable.is_empty() {
                median(&wells.iter().map(|w| w.center.row).collect::<Vec<_>>())
            } else {
                median(&reliable)
            }
        })
        .collect();

    let col_medians: Vec<Option<i32>> = (0..grid.shape.cols)
        .map(|c| {
            let cols: Vec<i32> = grid
                .iter()
                .filter(|(_, col, _)| *col == c)
                .map(|(_, _, w)| w.center.col)
                .collect();
            median(&cols)
        })
        .collect();

    grid.map_wells(|r, c, well| {
        let row = row_medians[r].unwrap_or(well.center.row);
        let col = col_medians[c].unwrap_or(well.center.col);
        regenerate(well.snapped_to(PixelPos::new(row, col)), finder, cfg, rng)
    })
}

/// Snap small wells: full-width rows set the row and column medians, short
/// rows keep their own row median and borrow the column medians.
pub fn regularize_small<R: Rng>(
    grid: WellGrid,
    finder: &WellFinder<'_>,
    cfg: &RegularizeConfig,
    rng: &mut R,
) -> WellGrid {
    if grid.is_empty() {
        return grid;
    }
    let full_rows = grid.shape.full_rows();

    let row_medians: Vec<Option<i32>> = grid
        .rows
        .iter()
        .map(|wells| median(&wells.iter().map(|w| w.center.row).collect::<Vec<_>>()))
        .collect();

    let col_medians: Vec<Option<i32>> = (0..grid.shape.cols)
        .map(|c| {
            let cols: Vec<i32> = full_rows
                .iter()
                .filter_map(|&r| grid.get(r, c))
                .map(|w| w.center.col)
                .collect();
            median(&cols)
        })
        .collect();

    grid.map_wells(|r, c, well| {
        let row = row_medians[r].unwrap_or(well.center.row);
        let col = col_medians[c].unwrap_or(well.center.col);
        regenerate(well.snapped_to(PixelPos::new(row, col)), finder, cfg, rng)
    })
}
