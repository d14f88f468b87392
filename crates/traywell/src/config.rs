//! Analysis configuration.
//!
//! Pixel-unit defaults are calibrated for a 640 px working width; use
//! [`AnalyzeConfig::for_target_width`] to rescale them for another width.

use std::path::Path;

/// Working width the pixel-unit defaults were calibrated for.
pub const DEFAULT_TARGET_WIDTH: u32 = 640;

fn rescale_px(value: usize, from_width: u32, to_width: u32) -> usize {
    if from_width == 0 {
        return value;
    }
    value * to_width as usize / from_width as usize
}

/// A configuration value that would make the analysis index out of range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A channel index outside `0..=2`.
    ChannelOutOfRange { field: &'static str, value: usize },
    /// A working width of zero.
    ZeroTargetWidth,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ChannelOutOfRange { field, value } => {
                write!(f, "{} must be 0, 1 or 2, got {}", field, value)
            }
            Self::ZeroTargetWidth => write!(f, "target_width must be positive"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Lens-distortion correction parameters.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct UnwarpConfig {
    /// Radial distortion coefficient `k` of `Ru = Rd·(1 + k·Rd²)`, with radii
    /// normalized by the image corner radius.
    pub k: f64,
    /// Zero border added on every side of the unwarped image (pixels).
    pub padding: u32,
}

impl Default for UnwarpConfig {
    fn default() -> Self {
        Self {
            k: 0.1322595,
            padding: 20,
        }
    }
}

/// Background estimation and subtraction.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BackgroundConfig {
    /// First row scanned for well pixels.
    pub scan_start_row: usize,
    /// Channel whose row maximum marks the top of the well region.
    pub detect_channel: usize,
    /// Sample value above which a row is considered to contain wells.
    pub well_threshold: u8,
    /// Rows kept between the edge search band and the first well row.
    pub well_clearance: usize,
    /// Height of the tray-edge search band (rows).
    pub band_height: usize,
    /// Channel traced down the center column to find the tray edge.
    pub edge_channel: usize,
    /// Row step of the forward difference used for the edge trace.
    pub edge_step: usize,
    /// Rows below the detected edge where the background row is sampled.
    pub edge_shift: usize,
    /// Boxcar width used to smooth the background row.
    pub smoothing_width: usize,
    /// Value the brightest sample is rescaled to.
    pub target_max: f64,
}

impl Default for BackgroundConfig {
    fn default() -> Self {
        Self {
            scan_start_row: 40,
            detect_channel: 1,
            well_threshold: 100,
            well_clearance: 10,
            band_height: 40,
            edge_channel: 2,
            edge_step: 3,
            edge_shift: 6,
            smoothing_width: 20,
            target_max: 254.0,
        }
    }
}

/// Histogram threshold selection.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ThresholdConfig {
    /// Bins at or below this intensity are never chosen.
    pub lower_bound: usize,
    /// Bins scanned without a new minimum before the search stops.
    pub patience: usize,
    /// Thresholds above this value are treated as a bad histogram.
    pub ceiling: u32,
    /// Multiple of the background level used when the ceiling is exceeded.
    pub background_multiplier: f64,
}

impl Default for ThresholdConfig {
    fn default() -> Self {
        Self {
            lower_bound: 100,
            patience: 25,
            ceiling: 250,
            background_multiplier: 3.0,
        }
    }
}

/// Region growing and threshold backoff.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GrowConfig {
    /// Neighbors must exceed `relaxed_ratio × threshold` to join a region.
    pub relaxed_ratio: f64,
    /// Threshold factor multiplier per backoff retry.
    pub backoff_step: f64,
    /// Backoff stops once the factor drops to this value.
    pub min_factor: f64,
    /// Seed for the region-growing sampler. `None` seeds from entropy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for GrowConfig {
    fn default() -> Self {
        Self {
            relaxed_ratio: 0.9,
            backoff_step: 0.99,
            min_factor: 0.8,
            rng_seed: None,
        }
    }
}

/// Tray rectangle and scale checks.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Row/column intensity sum marking the start of the tray.
    pub rect_start_threshold: u64,
    /// Row intensity sum marking the end of the tray.
    pub rect_end_threshold: u64,
    /// Largest accepted relative difference between the refined scale and
    /// the scale implied by the tray rectangle.
    pub max_scale_deviation: f64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            rect_start_threshold: 30_000,
            rect_end_threshold: 50_000,
            max_scale_deviation: 0.25,
        }
    }
}

/// Median snapping and well regeneration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RegularizeConfig {
    /// Big wells need more pixels than this to vote in the medians.
    pub min_well_pixels: usize,
    /// Threshold ratio used to regrow wells with too few pixels.
    pub relax_ratio: f64,
    /// Threshold ratio used to regrow wells with too many pixels.
    pub tighten_ratio: f64,
}

impl Default for RegularizeConfig {
    fn default() -> Self {
        Self {
            min_well_pixels: 100,
            relax_ratio: 0.8,
            tighten_ratio: 1.2,
        }
    }
}

/// Overflow reservoir search.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OverflowConfig {
    /// Row offset of the finite difference across the fill line.
    pub diff_offset: usize,
    /// Seed threshold as a fraction of the intensity at the seed.
    pub threshold_ratio: f64,
    /// Fallback seed column, measured from the right image edge.
    pub fallback_col_offset: usize,
}

impl Default for OverflowConfig {
    fn default() -> Self {
        Self {
            diff_offset: 3,
            threshold_ratio: 0.7,
            fallback_col_offset: 56,
        }
    }
}

/// Color decision boundaries.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    /// Fraction of positive signal needed to call a well positive.
    pub fractional_threshold: f64,
    /// Visible: pixels with blue below `vis_slope·red + vis_offset` are positive.
    pub vis_slope: f64,
    pub vis_offset: f64,
    /// UV: pixels with blue above `uv_slope·red + uv_offset` are positive.
    pub uv_slope: f64,
    pub uv_offset: f64,
    /// UV: red samples at or above this are saturated and not counted.
    pub uv_red_cutoff: u8,
    /// UV: boundary used for red samples above the cutoff.
    pub uv_saturated_boundary: f64,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            fractional_threshold: 0.20,
            vis_slope: 0.7410561056105607,
            vis_offset: -25.893887788778862,
            uv_slope: 0.4787443744374433,
            uv_offset: 93.17743474347438,
            uv_red_cutoff: 150,
            uv_saturated_boundary: 256.0,
        }
    }
}

/// Top-level analysis configuration.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    /// Images wider than this are downscaled to it on entry.
    pub target_width: u32,
    pub unwarp: UnwarpConfig,
    pub background: BackgroundConfig,
    pub threshold: ThresholdConfig,
    pub grow: GrowConfig,
    pub locate: LocateConfig,
    pub regularize: RegularizeConfig,
    pub overflow: OverflowConfig,
    pub classify: ClassifyConfig,
}

impl Default for AnalyzeConfig {
    fn default() -> Self {
        Self::for_target_width(DEFAULT_TARGET_WIDTH)
    }
}

impl AnalyzeConfig {
    /// Defaults with pixel-unit parameters rescaled to `target_width`.
    pub fn for_target_width(target_width: u32) -> Self {
        Self {
            target_width: DEFAULT_TARGET_WIDTH,
            unwarp: UnwarpConfig::default(),
            background: BackgroundConfig::default(),
            threshold: ThresholdConfig::default(),
            grow: GrowConfig::default(),
            locate: LocateConfig::default(),
            regularize: RegularizeConfig::default(),
            overflow: OverflowConfig::default(),
            classify: ClassifyConfig::default(),
        }
        .with_target_width(target_width)
    }

    /// Switch to `target_width`, rescaling every pixel-unit parameter from
    /// the current width.
    pub fn with_target_width(self, target_width: u32) -> Self {
        let from = self.target_width;
        let px = |value: usize| rescale_px(value, from, target_width);
        Self {
            target_width,
            background: BackgroundConfig {
                scan_start_row: px(self.background.scan_start_row),
                well_clearance: px(self.background.well_clearance),
                band_height: px(self.background.band_height),
                edge_shift: px(self.background.edge_shift),
                smoothing_width: px(self.background.smoothing_width),
                ..self.background
            },
            regularize: RegularizeConfig {
                min_well_pixels: px(self.regularize.min_well_pixels),
                ..self.regularize
            },
            overflow: OverflowConfig {
                fallback_col_offset: px(self.overflow.fallback_col_offset),
                ..self.overflow
            },
            ..self
        }
    }

    /// Reject values the analysis cannot index with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.target_width == 0 {
            return Err(ConfigError::ZeroTargetWidth);
        }
        let channels = [
            ("background.detect_channel", self.background.detect_channel),
            ("background.edge_channel", self.background.edge_channel),
        ];
        for (field, value) in channels {
            if value > 2 {
                return Err(ConfigError::ChannelOutOfRange { field, value });
            }
        }
        Ok(())
    }

    /// Load a configuration from JSON. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let data = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_defaults_scale_with_width() {
        let cfg = AnalyzeConfig::for_target_width(960);
        assert_eq!(cfg.background.smoothing_width, 30);
        assert_eq!(cfg.background.edge_shift, 9);
        assert_eq!(cfg.regularize.min_well_pixels, 150);
        assert_eq!(cfg.overflow.fallback_col_offset, 84);
        assert_eq!(cfg.threshold.lower_bound, 100);
    }

    #[test]
    fn loaded_config_rescales_from_its_own_width() {
        let mut cfg = AnalyzeConfig::for_target_width(960);
        cfg.background.smoothing_width = 24;
        let cfg = cfg.with_target_width(1280);
        assert_eq!(cfg.target_width, 1280);
        assert_eq!(cfg.background.smoothing_width, 32);
        assert_eq!(cfg.background.edge_shift, 12);
        assert_eq!(cfg.regularize.min_well_pixels, 200);
        assert_eq!(cfg.overflow.fallback_col_offset, 112);
        assert_eq!(
            AnalyzeConfig::default().with_target_width(960),
            AnalyzeConfig::for_target_width(960)
        );
    }

    #[test]
    fn out_of_range_channels_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "background": { "edge_channel": 3 } }"#).unwrap();
        let err = AnalyzeConfig::from_json_file(&path).unwrap_err();
        assert_eq!(
            err.to_string(),
            "background.edge_channel must be 0, 1 or 2, got 3"
        );

        let mut cfg = AnalyzeConfig::default();
        assert_eq!(cfg.validate(), Ok(()));
        cfg.background.detect_channel = 7;
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::ChannelOutOfRange {
                field: "background.detect_channel",
                value: 7
            })
        );
        cfg.background.detect_channel = 1;
        cfg.target_width = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroTargetWidth));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: AnalyzeConfig =
            serde_json::from_str(r#"{ "unwarp": { "k": 0.0 }, "grow": { "rng_seed": 7 } }"#)
                .unwrap();
        assert_eq!(cfg.unwarp.k, 0.0);
        assert_eq!(cfg.unwarp.padding, 20);
        assert_eq!(cfg.grow.rng_seed, Some(7));
        assert_eq!(cfg.background, BackgroundConfig::default());
    }
}
