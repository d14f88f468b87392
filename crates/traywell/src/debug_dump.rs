//! Versioned debug dump for tray analysis runs.
//!
//! Reuses the production stage records (background and threshold estimates,
//! origin estimate, overflow result) and adds a flat per-well listing.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;
use serde::{Deserialize, Serialize};

use crate::config::AnalyzeConfig;
use crate::detector::{OriginEstimate, OverflowResult};
use crate::grid::WellGrid;
use crate::pipeline::{RunTrace, TrayAnalysis, TrayRequest, TrayStage};
use crate::preprocess::{BackgroundEstimate, ThresholdEstimate};
use crate::well::{PixelPos, Well};

pub const DEBUG_SCHEMA_V1: &str = "traywell.debug.v1";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugDump {
    pub schema_version: String,
    pub image: ImageDebug,
    pub request: TrayRequest,
    pub config: AnalyzeConfig,
    pub stages: StagesDebug,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageDebug {
    pub input_width: u32,
    pub input_height: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub working_size: Option<[u32; 2]>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagesDebug {
    /// Stages reached, in order.
    pub trace: Vec<TrayStage>,
    /// Summed-channel histogram of the normalized image.
    pub histogram: Vec<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background: Option<BackgroundEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<ThresholdEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<OriginEstimate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wells: Vec<WellDebug>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overflow: Option<OverflowDebug>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellGroup {
    Big,
    Small,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WellDebug {
    pub group: WellGroup,
    pub row: usize,
    pub col: usize,
    pub nominal: PixelPos,
    pub center: PixelPos,
    pub centroid_valid: bool,
    pub n_pixels: usize,
}

impl WellDebug {
    fn from_well(group: WellGroup, row: usize, col: usize, well: &Well) -> Self {
        Self {
            group,
            row,
            col,
            nominal: well.nominal,
            center: well.center,
            centroid_valid: well.centroid_valid,
            n_pixels: well.n_pixels(),
        }
    }
}

/// Overflow diagnostics without the member pixel list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverflowDebug {
    pub band: [i32; 2],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill_line: Option<i32>,
    pub profile: Vec<f64>,
    pub seed: PixelPos,
    pub threshold: f64,
    pub row_floor: i32,
    pub fallback_used: bool,
    pub center: PixelPos,
    pub n_pixels: usize,
}

impl From<&OverflowResult> for OverflowDebug {
    fn from(o: &OverflowResult) -> Self {
        Self {
            band: o.band,
            fill_line: o.fill_line,
            profile: o.profile.clone(),
            seed: o.seed,
            threshold: o.threshold,
            row_floor: o.row_floor,
            fallback_used: o.fallback_used,
            center: o.well.center,
            n_pixels: o.well.n_pixels(),
        }
    }
}

fn wells_debug(group: WellGroup, grid: &WellGrid) -> impl Iterator<Item = WellDebug> + '_ {
    grid.iter()
        .map(move |(r, c, w)| WellDebug::from_well(group, r, c, w))
}

/// Intermediate images of a run; absent past the stage a run failed at.
#[derive(Debug, Clone, Default)]
pub struct DebugImages {
    pub unwarped: Option<RgbImage>,
    pub normalized: Option<RgbImage>,
}

impl DebugDump {
    pub(crate) fn from_trace(
        request: &TrayRequest,
        config: &AnalyzeConfig,
        trace: &RunTrace,
        analysis: Option<&TrayAnalysis>,
        error: Option<String>,
    ) -> Self {
        let analysis = analysis.or(trace.analysis.as_ref());
        let wells = analysis
            .map(|a| {
                wells_debug(WellGroup::Big, &a.big_wells)
                    .chain(wells_debug(WellGroup::Small, &a.small_wells))
                    .collect()
            })
            .unwrap_or_default();

        Self {
            schema_version: DEBUG_SCHEMA_V1.to_string(),
            image: ImageDebug {
                input_width: trace.input_size[0],
                input_height: trace.input_size[1],
                working_size: trace.working_size,
            },
            request: request.clone(),
            config: config.clone(),
            stages: StagesDebug {
                trace: trace.stages.clone(),
                histogram: trace.histogram.clone(),
                background: trace.background.clone(),
                threshold: trace.threshold,
                origin: trace.origin.clone(),
                scale: trace.scale,
                wells,
                overflow: trace.overflow.as_ref().map(OverflowDebug::from),
            },
            error,
        }
    }

    /// Histogram as `"bin count"` lines.
    pub fn histogram_text(&self) -> String {
        self.stages
            .histogram
            .iter()
            .enumerate()
            .map(|(bin, count)| format!("{} {}\n", bin, count))
            .collect()
    }
}

const POSITIVE: Rgb<u8> = Rgb([0, 255, 0]);
const NEGATIVE: Rgb<u8> = Rgb([255, 0, 0]);
const UNCALLED: Rgb<u8> = Rgb([255, 255, 0]);
const OVERFLOW: Rgb<u8> = Rgb([0, 255, 255]);

fn well_color(well: &Well) -> Rgb<u8> {
    match &well.call {
        Some(call) if call.positive => POSITIVE,
        Some(_) => NEGATIVE,
        None => UNCALLED,
    }
}

fn draw_well(canvas: &mut RgbImage, well: &Well, color: Rgb<u8>) {
    let size = well.size_px.max(1);
    let rect = Rect::at(well.center.col - size / 2, well.center.row - size / 2)
        .of_size(size as u32, size as u32);
    draw_hollow_rect_mut(canvas, rect, color);
    draw_cross_mut(canvas, color, well.center.col, well.center.row);
}

/// Draw well boxes (green positive, red negative, yellow unclassified), the
/// overflow band and the fill line over `image`.
pub fn render_overlay(image: &RgbImage, analysis: &TrayAnalysis) -> RgbImage {
    let mut canvas = image.clone();
    for (_, _, well) in analysis.big_wells.iter().chain(analysis.small_wells.iter()) {
        draw_well(&mut canvas, well, well_color(well));
    }

    let overflow = &analysis.overflow;
    let height = canvas.height() as f32;
    for &x in &overflow.band {
        draw_line_segment_mut(&mut canvas, (x as f32, 0.0), (x as f32, height), OVERFLOW);
    }
    if let Some(line) = overflow.fill_line {
        draw_line_segment_mut(
            &mut canvas,
            (overflow.band[0] as f32, line as f32),
            (overflow.band[1] as f32, line as f32),
            OVERFLOW,
        );
    }
    for p in &overflow.well.pixels {
        if let Some(px) = canvas.get_pixel_mut_checked(p.col as u32, p.row as u32) {
            px.0[2] = px.0[2].saturating_add(96);
        }
    }
    draw_cross_mut(
        &mut canvas,
        well_color(&overflow.well),
        overflow.well.center.col,
        overflow.well.center.row,
    );
    canvas
}
