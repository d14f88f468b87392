//! Well grids with per-row width metadata.
//!
//! Positions are addressed in full-matrix coordinates `(row, col)`; a row may
//! cover only part of the columns (see [`RowSpan`]).

use crate::well::Well;

/// Occupied column range of one grid row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RowSpan {
    /// First occupied column.
    pub first_col: usize,
    /// Number of occupied columns.
    pub len: usize,
}

impl RowSpan {
    pub fn contains(&self, col: usize) -> bool {
        col >= self.first_col && col < self.first_col + self.len
    }

    pub fn cols(&self) -> std::ops::Range<usize> {
        self.first_col..self.first_col + self.len
    }
}

/// Ragged matrix layout.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GridShape {
    /// Full matrix width.
    pub cols: usize,
    pub rows: Vec<RowSpan>,
}

impl GridShape {
    /// Every row covers every column.
    pub fn full(rows: usize, cols: usize) -> Self {
        Self {
            cols,
            rows: vec![RowSpan { first_col: 0, len: cols }; rows],
        }
    }

    /// Full grid without the first column of the first and last rows.
    pub fn without_outer_corners(rows: usize, cols: usize) -> Self {
        let mut shape = Self::full(rows, cols);
        if cols > 0 {
            let short = RowSpan {
                first_col: 1,
                len: cols - 1,
            };
            if let Some(first) = shape.rows.first_mut() {
                *first = short;
            }
            if let Some(last) = shape.rows.last_mut() {
                *last = short;
            }
        }
        shape
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_positions(&self) -> usize {
        self.rows.iter().map(|r| r.len).sum()
    }

    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.rows.get(row).is_some_and(|r| r.contains(col))
    }

    /// A row covering the full matrix width.
    pub fn is_full_row(&self, row: usize) -> bool {
        self.rows
            .get(row)
            .is_some_and(|r| r.first_col == 0 && r.len == self.cols)
    }

    /// Indices of rows covering the full matrix width.
    pub fn full_rows(&self) -> Vec<usize> {
        (0..self.n_rows()).filter(|&r| self.is_full_row(r)).collect()
    }
}

/// Wells laid out according to a [`GridShape`].
///
/// `rows[r][k]` holds the well at full-matrix column `shape.rows[r].first_col + k`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellGrid {
    pub shape: GridShape,
    pub rows: Vec<Vec<Well>>,
}

impl WellGrid {
    /// A grid with no rows.
    pub fn empty() -> Self {
        Self {
            shape: GridShape::full(0, 0),
            rows: Vec::new(),
        }
    }

    pub(crate) fn from_rows(shape: GridShape, rows: Vec<Vec<Well>>) -> Self {
        debug_assert_eq!(shape.n_rows(), rows.len());
        debug_assert!(shape
            .rows
            .iter()
            .zip(rows.iter())
            .all(|(span, wells)| span.len == wells.len()));
        Self { shape, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }

    /// Well at full-matrix position `(row, col)`.
    pub fn get(&self, row: usize, col: usize) -> Option<&Well> {
        let span = self.shape.rows.get(row)?;
        if !span.contains(col) {
            return None;
        }
        self.rows.get(row)?.get(col - span.first_col)
    }

    /// Iterate `(row, col, well)` in row-major order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Well)> + '_ {
        self.rows.iter().enumerate().flat_map(move |(r, wells)| {
            let first = self.shape.rows[r].first_col;
            wells.iter().enumerate().map(move |(k, w)| (r, first + k, w))
        })
    }

    pub fn n_wells(&self) -> usize {
        self.rows.iter().map(Vec::len).sum()
    }

    /// Number of wells with a positive call.
    pub fn positive_count(&self) -> usize {
        self.iter().filter(|(_, _, w)| w.is_positive()).count()
    }

    /// Rebuild the grid by passing every well through `f`.
    pub(crate) fn map_wells(self, mut f: impl FnMut(usize, usize, Well) -> Well) -> Self {
        let Self { shape, rows } = self;
        let rows = rows
            .into_iter()
            .enumerate()
            .map(|(r, wells)| {
                let first = shape.rows[r].first_col;
                wells
                    .into_iter()
                    .enumerate()
                    .map(|(k, w)| f(r, first + k, w))
                    .collect()
            })
            .collect();
        Self { shape, rows }
    }
}
