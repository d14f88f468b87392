//! Per-pixel and per-well color calls.
//!
//! Visible light: a pixel is positive when its blue sample falls below a
//! linear function of red. UV: a pixel is positive when blue rises above a
//! red-dependent boundary, and its vote is weighted by the distance to the
//! well center, since fluorescence shows at the rim first.

use crate::config::ClassifyConfig;
use crate::grid::WellGrid;
use crate::well::{PixelPos, Well, WellCall};

/// Illumination the tray was photographed under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightMode {
    #[default]
    Visible,
    Uv,
}

impl LightMode {
    pub fn from_uv(uv: bool) -> Self {
        if uv {
            Self::Uv
        } else {
            Self::Visible
        }
    }

    /// Channel that shows the water fill line (red under UV, blue otherwise).
    pub fn fill_line_channel(self) -> usize {
        match self {
            Self::Uv => 0,
            Self::Visible => 2,
        }
    }
}

/// Pixel-level vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelVote {
    /// Contribution to the numerator (0 for negative pixels).
    pub signal: u32,
    /// Whether the pixel counts toward the denominator.
    pub counted: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct WellClassifier<'a> {
    mode: LightMode,
    cfg: &'a ClassifyConfig,
}

impl<'a> WellClassifier<'a> {
    pub fn new(mode: LightMode, cfg: &'a ClassifyConfig) -> Self {
        Self { mode, cfg }
    }

    pub fn mode(&self) -> LightMode {
        self.mode
    }

    /// Visible: blue values below this are positive.
    pub fn visible_boundary(&self, red: u8) -> f64 {
        self.cfg.vis_slope * red as f64 + self.cfg.vis_offset
    }

    /// UV: blue values above this are positive.
    pub fn uv_boundary(&self, red: u8) -> f64 {
        if red > self.cfg.uv_red_cutoff {
            self.cfg.uv_saturated_boundary
        } else {
            self.cfg.uv_slope * red as f64 + self.cfg.uv_offset
        }
    }

    pub fn vote(&self, sample: [u8; 3], pos: PixelPos, center: PixelPos) -> PixelVote {
        let [red, _, blue] = sample;
        match self.mode {
            LightMode::Visible => PixelVote {
                signal: u32::from((blue as f64) < self.visible_boundary(red)),
                counted: true,
            },
            LightMode::Uv => PixelVote {
                signal: if blue as f64 > self.uv_boundary(red) {
                    pos.distance(center) as u32
                } else {
                    0
                },
                counted: red < self.cfg.uv_red_cutoff,
            },
        }
    }

    /// Score a well: `sum(signal) / (counted + 1)` against the fractional
    /// threshold.
    pub fn call(&self, well: &Well) -> WellCall {
        let votes: Vec<PixelVote> = well
            .pixels
            .iter()
            .zip(&well.samples)
            .map(|(&pos, &sample)| self.vote(sample, pos, well.center))
            .collect();
        let counted = votes.iter().filter(|v| v.counted).count();
        let total: u64 = votes.iter().map(|v| v.signal as u64).sum();
        let score = total as f64 / (counted + 1) as f64;
        WellCall {
            pixel_signal: votes.iter().map(|v| v.signal).collect(),
            counted,
            score,
            positive: score > self.cfg.fractional_threshold,
        }
    }

    pub fn classify(&self, well: Well) -> Well {
        let call = self.call(&well);
        well.classified(call)
    }

    pub fn classify_grid(&self, grid: WellGrid) -> WellGrid {
        grid.map_wells(|_, _, well| self.classify(well))
    }
}
