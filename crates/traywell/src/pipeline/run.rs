//! Tray pipeline orchestrator: unwarp → normalize → threshold → locate →
//! build → regularize → overflow → scale check.

use image::RgbImage;
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::stage::StageTracker;
use super::{TrayAnalysis, TrayRequest, TrayStage};
use crate::config::AnalyzeConfig;
use crate::detector::{
    analyze_overflow, build_big_wells, build_small_wells, locate_origin, regularize_big,
    regularize_small, OriginEstimate, OverflowResult, WellFinder,
};
use crate::error::TrayError;
use crate::pixelmap::{UnwarpKey, UnwarpMapCache};
use crate::preprocess::{
    estimate_threshold, normalize_background, resize_to_width, BackgroundEstimate,
    IntensityField, ThresholdEstimate,
};
use crate::tray_layout::TrayLayout;
use crate::well::PixelPos;

/// Intermediate values of one run, kept for diagnostics.
///
/// Fields are filled as stages complete, so a failed run still reports
/// everything up to the failing stage.
#[derive(Debug, Default)]
pub(crate) struct RunTrace {
    pub input_size: [u32; 2],
    pub working_size: Option<[u32; 2]>,
    pub stages: Vec<TrayStage>,
    pub histogram: Vec<u64>,
    pub background: Option<BackgroundEstimate>,
    pub threshold: Option<ThresholdEstimate>,
    pub origin: Option<OriginEstimate>,
    pub scale: Option<f64>,
    pub overflow: Option<OverflowResult>,
    /// Wells of a run that reached the scale check, kept even when it failed.
    pub analysis: Option<TrayAnalysis>,
    pub unwarped: Option<RgbImage>,
    pub normalized: Option<RgbImage>,
}

/// Per-run switches.
#[derive(Default)]
pub(crate) struct RunOptions<'a> {
    pub observer: Option<&'a mut dyn FnMut()>,
    /// Keep the unwarped and normalized images in the trace.
    pub keep_images: bool,
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

/// Refined scale must be usable and agree with the tray outline.
pub(crate) fn scale_is_consistent(scale: f64, rect_scale: f64, max_deviation: f64) -> bool {
    scale.is_finite()
        && scale > 0.0
        && rect_scale > 0.0
        && ((scale - rect_scale) / rect_scale).abs() <= max_deviation
}

/// Resize to the working width and remove lens distortion.
pub(crate) fn unwarp_image(
    image: &RgbImage,
    cfg: &AnalyzeConfig,
    cache: &UnwarpMapCache,
) -> Result<RgbImage, TrayError> {
    if image.width() == 0 || image.height() == 0 {
        return Err(TrayError::EmptyImage);
    }
    let resized = resize_to_width(image.clone(), cfg.target_width);
    let map = cache.get_or_build(UnwarpKey {
        k: cfg.unwarp.k,
        source_width: resized.width(),
        source_height: resized.height(),
        padding: cfg.unwarp.padding,
    });
    map.apply(&resized)
}

// ---------------------------------------------------------------------------
// Orchestration
// ---------------------------------------------------------------------------
pub(crate) fn run(
    image: &RgbImage,
    request: &TrayRequest,
    cfg: &AnalyzeConfig,
    cache: &UnwarpMapCache,
    opts: RunOptions<'_>,
) -> (Result<TrayAnalysis, TrayError>, RunTrace) {
    let mut trace = RunTrace {
        input_size: [image.width(), image.height()],
        ..RunTrace::default()
    };
    let mut tracker = StageTracker::new(request.has_small_wells, opts.observer);
    let result = run_stages(image, request, cfg, cache, opts.keep_images, &mut tracker, &mut trace);
    trace.stages = tracker.into_trace();
    if let Err(e) = &result {
        tracing::warn!("{}: analysis failed: {}", request.image_id, e);
    }
    (result, trace)
}

fn run_stages(
    image: &RgbImage,
    request: &TrayRequest,
    cfg: &AnalyzeConfig,
    cache: &UnwarpMapCache,
    keep_images: bool,
    tracker: &mut StageTracker<'_>,
    trace: &mut RunTrace,
) -> Result<TrayAnalysis, TrayError> {
    let id = request.image_id.as_str();
    let layout = TrayLayout::for_kind(request.tray_kind());
    let mut rng = make_rng(cfg.grow.rng_seed);

    let unwarped = unwarp_image(image, cfg, cache)?;
    let image_size = [unwarped.width(), unwarped.height()];
    trace.working_size = Some(image_size);
    tracker.advance();
    tracing::info!("{}: unwarped to {}x{}", id, image_size[0], image_size[1]);

    let (normalized, background) = normalize_background(&unwarped, &cfg.background);
    if keep_images {
        trace.unwarped = Some(unwarped);
    }
    tracker.advance();
    tracing::info!(
        "{}: background level {:.1} from row {}",
        id,
        background.level,
        background.background_row
    );

    let field = IntensityField::from_rgb(&normalized);
    trace.histogram = field.histogram();
    let threshold = estimate_threshold(&trace.histogram, background.level, &cfg.threshold);
    let background_level = background.level;
    trace.background = Some(background);
    trace.threshold = Some(threshold);
    tracker.advance();
    tracing::info!("{}: threshold {}", id, threshold.threshold);

    let finder = WellFinder::new(&normalized, &field, &cfg.grow, threshold.threshold as f64);
    let origin = locate_origin(&finder, &layout, &cfg.locate, id, &mut rng)?;
    let rect_scale = origin.rect_scale;
    let origin_pos = origin.origin;
    trace.origin = Some(origin);
    tracker.advance();
    tracing::info!(
        "{}: origin ({}, {}), rectangle scale {:.4} px/mm",
        id,
        origin_pos.row,
        origin_pos.col,
        rect_scale
    );

    let big = build_big_wells(&finder, &layout, origin_pos, rect_scale, &mut rng);
    trace.scale = Some(big.scale);
    tracker.advance();
    tracing::info!(
        "{}: {} big wells, scale {:.4} px/mm",
        id,
        big.grid.n_wells(),
        big.scale
    );

    let small = build_small_wells(&finder, &layout, &big, &mut rng);
    if layout.has_small_wells() {
        tracker.advance();
        tracing::info!("{}: {} small wells", id, small.n_wells());
    }

    let big_grid = regularize_big(big.grid, &finder, &cfg.regularize, &mut rng);
    let small_grid = regularize_small(small, &finder, &cfg.regularize, &mut rng);
    tracker.advance();
    tracing::info!("{}: grids regularized", id);

    let right_col = layout
        .big_cols
        .checked_sub(1)
        .and_then(|c| big_grid.get(0, c))
        .map_or(big.origin.col, |w| w.center.col);
    let overflow = analyze_overflow(
        &finder,
        &layout,
        right_col,
        big.scale,
        request.mode,
        &cfg.overflow,
        &mut rng,
    );
    trace.overflow = Some(overflow.clone());
    tracker.advance();
    tracing::info!(
        "{}: overflow {} px{}",
        id,
        overflow.well.n_pixels(),
        if overflow.fallback_used { " (fallback)" } else { "" }
    );

    let analysis = TrayAnalysis {
        image_id: request.image_id.clone(),
        mode: request.mode,
        layout,
        image_size,
        origin: PixelPos::new(big.origin.row, origin_pos.col),
        scale: big.scale,
        rect_scale,
        threshold: threshold.threshold,
        background_level,
        big_wells: big_grid,
        small_wells: small_grid,
        overflow,
        stage: tracker.current(),
    };
    if keep_images {
        trace.normalized = Some(normalized);
    }

    if !scale_is_consistent(big.scale, rect_scale, cfg.locate.max_scale_deviation) {
        trace.analysis = Some(analysis);
        return Err(TrayError::BadScale {
            image_id: request.image_id.clone(),
            scale: big.scale,
            expected: rect_scale,
        });
    }

    tracker.advance();
    Ok(TrayAnalysis {
        stage: tracker.current(),
        ..analysis
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_check_bounds() {
        assert!(scale_is_consistent(2.3, 2.29, 0.25));
        assert!(scale_is_consistent(2.8, 2.3, 0.25));
        assert!(!scale_is_consistent(3.0, 2.3, 0.25));
        assert!(!scale_is_consistent(f64::NAN, 2.3, 0.25));
        assert!(!scale_is_consistent(0.0, 2.3, 0.25));
    }

    #[test]
    fn empty_image_is_rejected_before_unwarp() {
        let err = unwarp_image(
            &RgbImage::new(0, 0),
            &AnalyzeConfig::default(),
            &UnwarpMapCache::new(),
        )
        .unwrap_err();
        assert_eq!(err, TrayError::EmptyImage);
    }
}
