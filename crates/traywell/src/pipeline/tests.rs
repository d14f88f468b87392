use approx::assert_relative_eq;
use image::RgbImage;

use super::*;
use crate::config::AnalyzeConfig;
use crate::error::TrayError;
use crate::pixelmap::UnwarpMapCache;
use crate::test_utils::{synthetic_small_well_tray, synthetic_tray, undistorted_config};

const PADDING: f64 = 20.0;

fn analyze(
    image: &RgbImage,
    request: &TrayRequest,
    cfg: &AnalyzeConfig,
) -> (Result<TrayAnalysis, TrayError>, RunTrace) {
    run(image, request, cfg, &UnwarpMapCache::new(), RunOptions::default())
}

#[test]
fn synthetic_tray_end_to_end() {
    let tray = synthetic_tray(|r, c| (r * 10 + c) % 3 == 0);
    let cfg = undistorted_config();
    let mut calls = 0;
    let mut observer = || calls += 1;
    let (result, trace) = run(
        &tray.image,
        &TrayRequest::new("synthetic.tiff"),
        &cfg,
        &UnwarpMapCache::new(),
        RunOptions {
            observer: Some(&mut observer),
            keep_images: false,
        },
    );
    let analysis = result.unwrap();

    assert_eq!(analysis.image_size, [680, 520]);
    assert_eq!(analysis.stage, TrayStage::Processed);
    assert_eq!(trace.stages.last(), Some(&TrayStage::Processed));

    let (true_row, true_col) = tray.grid.center(0, 0);
    let origin = analysis.origin;
    assert!((origin.row as f64 - (true_row + PADDING)).abs() <= 2.0);
    assert!((origin.col as f64 - (true_col + PADDING)).abs() <= 2.0);
    assert_relative_eq!(analysis.scale, 49.0 / 21.3, max_relative = 0.02);

    for (r, c, well) in analysis.big_wells.iter() {
        let (row, col) = tray.grid.center(r, c);
        assert!((well.center.row as f64 - (row + PADDING)).abs() <= 2.0);
        assert!((well.center.col as f64 - (col + PADDING)).abs() <= 2.0);
        assert!(well.n_pixels() > 0);
    }
    assert!(analysis.small_wells.is_empty());
    assert!(!analysis.overflow.fallback_used);

    let classified = analysis.classify(&cfg.classify);
    assert_eq!(classified.analysis.stage, TrayStage::Classified);
    assert_eq!(classified.big_positive_count, tray.n_positive);
    assert_eq!(classified.small_positive_count, 0);
    assert!(!classified.overflow_positive());
    assert!(classified.big_calls()[0][0]);
    assert!(!classified.big_calls()[0][1]);

    assert_eq!(calls, 8);
}

#[test]
fn small_well_tray_end_to_end() {
    let tray = synthetic_small_well_tray(|r, c| r == c, |r, c| (r + c) % 4 == 1);
    let cfg = undistorted_config();
    let mut calls = 0;
    let mut observer = || calls += 1;
    let (result, trace) = run(
        &tray.image,
        &TrayRequest::new("small.tiff").with_small_wells(true),
        &cfg,
        &UnwarpMapCache::new(),
        RunOptions {
            observer: Some(&mut observer),
            keep_images: false,
        },
    );
    let analysis = result.unwrap();
    assert_eq!(trace.stages.last(), Some(&TrayStage::Processed));

    let (true_row, true_col) = tray.big.center(0, 0);
    assert!((analysis.origin.row as f64 - (true_row + PADDING)).abs() <= 2.0);
    assert!((analysis.origin.col as f64 - (true_col + PADDING)).abs() <= 2.0);

    assert_eq!(analysis.big_wells.n_wells(), 48);
    assert_eq!(analysis.small_wells.n_wells(), 48);
    assert!(analysis.small_wells.get(0, 0).is_none());
    assert!(analysis.small_wells.get(9, 0).is_none());
    for (r, c, well) in analysis.small_wells.iter() {
        let (row, col) = tray.small.center(r, c);
        assert!((well.center.row as f64 - (row + PADDING)).abs() <= 2.0, "({}, {})", r, c);
        assert!((well.center.col as f64 - (col + PADDING)).abs() <= 2.0, "({}, {})", r, c);
        assert!(well.centroid_valid, "({}, {})", r, c);
    }

    let classified = analysis.classify(&cfg.classify);
    assert_eq!(classified.big_positive_count, tray.n_big_positive);
    assert_eq!(classified.small_positive_count, tray.n_small_positive);
    let small_calls = classified.small_calls();
    assert!(!small_calls[0][0]);
    assert!(small_calls[0][1]);
    assert!(!small_calls[0][2]);

    assert_eq!(calls, 9);
}

#[test]
fn seeded_runs_are_reproducible() {
    let tray = synthetic_tray(|r, _| r == 2);
    let cfg = undistorted_config();
    let request = TrayRequest::new("a");
    let a = analyze(&tray.image, &request, &cfg).0.unwrap();
    let b = analyze(&tray.image, &request, &cfg).0.unwrap();
    assert_eq!(a.big_wells, b.big_wells);
    assert_eq!(a.overflow, b.overflow);
}

#[test]
fn black_image_has_no_origin() {
    let (result, trace) = analyze(
        &RgbImage::new(640, 480),
        &TrayRequest::new("black.tiff"),
        &undistorted_config(),
    );
    assert_eq!(
        result.unwrap_err(),
        TrayError::NoOriginDetected {
            image_id: "black.tiff".to_string()
        }
    );
    assert_eq!(trace.stages.last(), Some(&TrayStage::Thresholded));
    assert!(trace.origin.is_none());
}

#[test]
fn inconsistent_scale_fails_after_every_stage() {
    let tray = synthetic_tray(|_, _| false);
    let mut cfg = undistorted_config();
    cfg.locate.max_scale_deviation = 0.0;
    let (result, trace) = analyze(&tray.image, &TrayRequest::new("tight"), &cfg);

    match result {
        Err(TrayError::BadScale {
            image_id,
            scale,
            expected,
        }) => {
            assert_eq!(image_id, "tight");
            assert_relative_eq!(scale, 49.0 / 21.3, max_relative = 0.02);
            assert_relative_eq!(expected, 227.0 / 99.0, max_relative = 1e-9);
        }
        other => panic!("expected BadScale, got {:?}", other.map(|a| a.stage)),
    }
    assert_eq!(trace.stages.last(), Some(&TrayStage::OverflowAnalyzed));
    assert_eq!(trace.analysis.map(|a| a.big_wells.n_wells()), Some(50));
}

#[test]
fn debug_trace_keeps_intermediate_images() {
    let tray = synthetic_tray(|_, _| true);
    let (result, trace) = run(
        &tray.image,
        &TrayRequest::new("imgs"),
        &undistorted_config(),
        &UnwarpMapCache::new(),
        RunOptions {
            observer: None,
            keep_images: true,
        },
    );
    assert!(result.is_ok());
    assert_eq!(trace.input_size, [640, 480]);
    assert_eq!(trace.working_size, Some([680, 520]));
    assert_eq!(trace.unwarped.map(|i| i.dimensions()), Some((680, 520)));
    assert_eq!(trace.normalized.map(|i| i.dimensions()), Some((680, 520)));
    assert_eq!(trace.histogram.len(), crate::preprocess::HISTOGRAM_BINS);
    assert!(trace.threshold.is_some());
}
