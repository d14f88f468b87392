use std::collections::HashSet;

use rand::Rng;

use crate::config::GrowConfig;
use crate::preprocess::IntensityField;
use crate::well::PixelPos;

const NEIGHBORS: [(i32, i32); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// One region-growing query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrowRequest {
    /// Center of the seed sampling window.
    pub center: PixelPos,
    /// Nominal region size: sampling window edge and number of samples.
    pub size: i32,
    /// Seed threshold on summed intensity.
    pub threshold: f64,
    /// Rows above this are excluded, and columns left of `center.col − size`
    /// are not grown into.
    pub row_floor: Option<i32>,
}

impl GrowRequest {
    pub fn new(center: PixelPos, size: i32, threshold: f64) -> Self {
        Self {
            center,
            size,
            threshold,
            row_floor: None,
        }
    }

    pub fn with_row_floor(self, row_floor: i32) -> Self {
        Self {
            row_floor: Some(row_floor),
            ..self
        }
    }

    fn scaled(&self, factor: f64) -> Self {
        Self {
            threshold: self.threshold * factor,
            ..*self
        }
    }
}

/// Result of a grow with threshold backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct GrowOutcome {
    /// Region pixels, sorted by (row, col). Empty when every attempt failed.
    pub pixels: Vec<PixelPos>,
    /// Threshold factor of the last attempt.
    pub factor: f64,
    pub attempts: usize,
}

/// Seeded 8-connected flood fill over an [`IntensityField`].
#[derive(Debug, Clone, Copy)]
pub struct RegionGrower<'a> {
    field: &'a IntensityField,
    cfg: &'a GrowConfig,
}

impl<'a> RegionGrower<'a> {
    pub fn new(field: &'a IntensityField, cfg: &'a GrowConfig) -> Self {
        Self { field, cfg }
    }

    pub fn field(&self) -> &'a IntensityField {
        self.field
    }

    /// Random seed pixels above threshold inside the sampling window.
    fn seeds<R: Rng>(&self, req: &GrowRequest, rng: &mut R) -> Vec<PixelPos> {
        let size = req.size.max(0);
        let mut seeds = Vec::new();
        for _ in 0..size {
            let col = req.center.col + ((0.5 - rng.gen::<f64>()) * size as f64) as i32;
            let row = req.center.row + ((0.5 - rng.gen::<f64>()) * size as f64) as i32;
            if req.row_floor.is_some_and(|floor| row < floor) {
                continue;
            }
            if self
                .field
                .get(row, col)
                .is_some_and(|v| v as f64 > req.threshold)
            {
                seeds.push(PixelPos::new(row, col));
            }
        }
        seeds
    }

    fn accepts(&self, req: &GrowRequest, pos: PixelPos, relaxed: f64) -> bool {
        if let Some(floor) = req.row_floor {
            if pos.row < floor || pos.col < req.center.col - req.size {
                return false;
            }
        }
        self.field.is_interior(pos.row, pos.col)
            && self
                .field
                .get(pos.row, pos.col)
                .is_some_and(|v| v as f64 > relaxed)
    }

    /// Grow a region from random seeds around `req.center`.
    ///
    /// The result only depends on which connected regions received a seed.
    pub fn grow<R: Rng>(&self, req: &GrowRequest, rng: &mut R) -> Vec<PixelPos> {
        let relaxed = self.cfg.relaxed_ratio * req.threshold;
        let mut region: HashSet<PixelPos> = HashSet::new();
        let mut stack = Vec::new();

        for seed in self.seeds(req, rng) {
            if !region.insert(seed) {
                continue;
            }
            stack.push(seed);
            while let Some(p) = stack.pop() {
                for (dr, dc) in NEIGHBORS {
                    let n = PixelPos::new(p.row + dr, p.col + dc);
                    if !region.contains(&n) && self.accepts(req, n, relaxed) {
                        region.insert(n);
                        stack.push(n);
                    }
                }
            }
        }

        let mut pixels: Vec<PixelPos> = region.into_iter().collect();
        pixels.sort_unstable();
        pixels
    }

    /// Grow, relaxing the threshold by `backoff_step` until a region is
    /// found or the factor reaches `min_factor`.
    pub fn grow_with_backoff<R: Rng>(
        &self,
        req: &GrowRequest,
        rng: &mut R,
    ) -> GrowOutcome {
        let mut factor = 1.0;
        let mut attempts = 0;
        loop {
            attempts += 1;
            let pixels = self.grow(&req.scaled(factor), rng);
            if !pixels.is_empty() || factor * self.cfg.backoff_step <= self.cfg.min_factor {
                if pixels.is_empty() {
                    tracing::debug!(
                        row = req.center.row,
                        col = req.center.col,
                        attempts,
                        "region growing found nothing"
                    );
                }
                return GrowOutcome {
                    pixels,
                    factor,
                    attempts,
                };
            }
            factor *= self.cfg.backoff_step;
        }
    }
}
