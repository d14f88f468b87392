//! Physical tray layouts.
//!
//! Two tray kinds are supported: a 5×10 grid of big wells, and a 6×8 grid of
//! big wells next to a 10×5 block of small wells whose outer corners (first
//! column of the first and last rows) carry no well. Every tray also has one
//! overflow reservoir to the right of the big wells.
//!
//! All distances are measured between well centers, in millimetres, and are
//! fixed properties of the tray. Pixel quantities are derived from them once
//! the image scale is known.

use crate::grid::GridShape;

const BIG_WELL_SPACING_MM: f64 = 21.3;
const BIG_WELL_SIZE_MM: f64 = 13.8;
const SMALL_WELL_SPACING_MM: f64 = 11.8;
const SMALL_WELL_SIZE_MM: f64 = 6.5;
/// Column of the first small well relative to the origin (top-left big) well.
const FIRST_SMALL_WELL_COL_MM: f64 = -64.5;
/// Row of the first small well relative to the origin well.
const FIRST_SMALL_WELL_ROW_MM: f64 = 1.0;
/// Overflow search band, relative to the last big-well column.
const OVERFLOW_X_START_MM: f64 = 27.0;
const OVERFLOW_X_END_MM: f64 = 42.0;

/// Which physical tray is in the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrayKind {
    /// 5×10 big wells, no small wells.
    Standard,
    /// 6×8 big wells plus a ragged 10×5 small-well block.
    WithSmallWells,
}

impl TrayKind {
    /// Select the tray kind from a has-small-wells flag.
    pub fn from_small_wells(has_small_wells: bool) -> Self {
        if has_small_wells {
            Self::WithSmallWells
        } else {
            Self::Standard
        }
    }
}

/// Fixed geometry of one tray kind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrayLayout {
    pub kind: TrayKind,
    pub big_rows: usize,
    pub big_cols: usize,
    pub small_rows: usize,
    pub small_cols: usize,
    pub big_well_spacing_mm: f64,
    pub big_well_size_mm: f64,
    pub small_well_spacing_mm: f64,
    pub small_well_size_mm: f64,
    pub first_small_well_col_mm: f64,
    pub first_small_well_row_mm: f64,
    pub overflow_x_start_mm: f64,
    pub overflow_x_end_mm: f64,
}

impl TrayLayout {
    /// Layout for the given tray kind.
    pub fn for_kind(kind: TrayKind) -> Self {
        let (big_rows, big_cols, small_rows, small_cols) = match kind {
            TrayKind::Standard => (5, 10, 0, 0),
            TrayKind::WithSmallWells => (6, 8, 10, 5),
        };
        Self {
            kind,
            big_rows,
            big_cols,
            small_rows,
            small_cols,
            big_well_spacing_mm: BIG_WELL_SPACING_MM,
            big_well_size_mm: BIG_WELL_SIZE_MM,
            small_well_spacing_mm: SMALL_WELL_SPACING_MM,
            small_well_size_mm: SMALL_WELL_SIZE_MM,
            first_small_well_col_mm: FIRST_SMALL_WELL_COL_MM,
            first_small_well_row_mm: FIRST_SMALL_WELL_ROW_MM,
            overflow_x_start_mm: OVERFLOW_X_START_MM,
            overflow_x_end_mm: OVERFLOW_X_END_MM,
        }
    }

    /// 5×10 big-well tray.
    pub fn standard() -> Self {
        Self::for_kind(TrayKind::Standard)
    }

    /// 6×8 big-well tray with the small-well block.
    pub fn with_small_wells() -> Self {
        Self::for_kind(TrayKind::WithSmallWells)
    }

    pub fn has_small_wells(&self) -> bool {
        self.kind == TrayKind::WithSmallWells
    }

    /// Physical height spanned by the big-well grid, outer edge to outer edge.
    pub fn big_grid_height_mm(&self) -> f64 {
        (self.big_rows.saturating_sub(1)) as f64 * self.big_well_spacing_mm
            + self.big_well_size_mm
    }

    /// Physical width spanned by the big-well grid, outer edge to outer edge.
    pub fn big_grid_width_mm(&self) -> f64 {
        (self.big_cols.saturating_sub(1)) as f64 * self.big_well_spacing_mm
            + self.big_well_size_mm
    }

    /// Shape of the big-well grid (always full).
    pub fn big_shape(&self) -> GridShape {
        GridShape::full(self.big_rows, self.big_cols)
    }

    /// Shape of the small-well grid: empty for the standard tray, otherwise
    /// full except for the first column of the first and last rows.
    pub fn small_shape(&self) -> GridShape {
        if self.has_small_wells() {
            GridShape::without_outer_corners(self.small_rows, self.small_cols)
        } else {
            GridShape::full(0, 0)
        }
    }

    /// Total number of wells the tray holds, overflow excluded.
    pub fn n_wells(&self) -> usize {
        self.big_shape().n_positions() + self.small_shape().n_positions()
    }
}

impl Default for TrayLayout {
    fn default() -> Self {
        Self::standard()
    }
}
