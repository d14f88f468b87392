//! traywell: per-well positive/negative calls from photographs of
//! multi-well water-assay trays.
//!
//! The processing stages are:
//!
//! 1. **Unwarp** – downscale to the working width and invert a fixed radial
//!    lens model through a cached pixel map.
//! 2. **Preprocess** – background row subtraction, contrast rescale and
//!    histogram threshold selection.
//! 3. **Detect** – tray rectangle and origin, chained self-calibrating well
//!    layout, median regularization, overflow reservoir.
//! 4. **Classify** – per-pixel color votes and per-well calls under visible
//!    or UV light.
//!
//! # Public API
//! - [`TrayAnalyzer`] and [`TrayRequest`] as primary entry points
//! - [`AnalyzeConfig`] for tuning
//! - [`TrayAnalysis`] / [`ClassifiedTray`] result structures
//!
//! Stage primitives are re-exported for benchmarking and tooling.

mod api;
mod classify;
mod config;
mod debug_dump;
mod detector;
mod error;
mod grid;
mod pipeline;
mod pixelmap;
mod preprocess;
mod tray_layout;
mod well;

#[cfg(test)]
mod test_utils;

pub use api::{load_image, TrayAnalyzer};
pub use classify::{LightMode, PixelVote, WellClassifier};
pub use config::{
    AnalyzeConfig, BackgroundConfig, ClassifyConfig, ConfigError, GrowConfig, LocateConfig,
    OverflowConfig, RegularizeConfig, ThresholdConfig, UnwarpConfig, DEFAULT_TARGET_WIDTH,
};
pub use debug_dump::{
    render_overlay, DebugDump, DebugImages, ImageDebug, OverflowDebug, StagesDebug, WellDebug,
    WellGroup, DEBUG_SCHEMA_V1,
};
pub use detector::{
    analyze_overflow, build_big_wells, build_small_wells, find_rectangle, hamming_window,
    locate_origin, median, regularize_big, regularize_small, BigWells, GrowOutcome, GrowRequest,
    OriginEstimate, OverflowResult, RegionGrower, TrayRect, WellFinder,
};
pub use error::TrayError;
pub use grid::{GridShape, RowSpan, WellGrid};
pub use pipeline::{ClassifiedTray, TrayAnalysis, TrayRequest, TrayStage};
pub use pixelmap::{
    distorted_radius, LensUnwarper, RadiusTable, UnwarpKey, UnwarpMap, UnwarpMapCache, NO_SOURCE,
    RADIUS_TABLE_LEN, RADIUS_TABLE_STEP,
};
pub use preprocess::{
    estimate_background, estimate_threshold, normalize_background, resize_to_width,
    subtract_background, BackgroundEstimate, IntensityField, ThresholdEstimate, HISTOGRAM_BINS,
};
pub use tray_layout::{TrayKind, TrayLayout};
pub use well::{PixelPos, Well, WellCall};
