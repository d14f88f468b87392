//! High-level analysis API.
//!
//! [`TrayAnalyzer`] owns an [`AnalyzeConfig`] and the unwarp map cache.
//! Create it once and analyze many images; it is `Sync`, so several threads
//! may share one analyzer.

use std::path::Path;

use image::RgbImage;

use crate::config::AnalyzeConfig;
use crate::debug_dump::{DebugDump, DebugImages};
use crate::error::TrayError;
use crate::pipeline::{self, ClassifiedTray, RunOptions, TrayAnalysis, TrayRequest};
use crate::pixelmap::UnwarpMapCache;

/// Primary analysis interface.
///
/// # Examples
///
/// ```no_run
/// use std::path::Path;
/// use traywell::{TrayAnalyzer, TrayRequest};
///
/// let analyzer = TrayAnalyzer::new();
/// let request = TrayRequest::new("tray.tiff");
/// let analysis = analyzer.analyze_path(Path::new("tray.tiff"), &request).unwrap();
/// let classified = analyzer.classify(analysis);
/// println!("{} positive big wells", classified.big_positive_count);
/// ```
#[derive(Debug, Default)]
pub struct TrayAnalyzer {
    config: AnalyzeConfig,
    cache: UnwarpMapCache,
}

impl TrayAnalyzer {
    /// Analyzer with default configuration and an in-memory unwarp cache.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: AnalyzeConfig) -> Self {
        Self {
            config,
            cache: UnwarpMapCache::new(),
        }
    }

    /// Persist unwarp maps under `dir` and reuse them across processes.
    pub fn with_unwarp_cache_dir(self, dir: impl Into<std::path::PathBuf>) -> Self {
        Self {
            cache: UnwarpMapCache::with_dir(dir),
            ..self
        }
    }

    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    pub fn unwarp_cache(&self) -> &UnwarpMapCache {
        &self.cache
    }

    /// Run every processing stage. Classification is a separate step.
    pub fn analyze(
        &self,
        image: &RgbImage,
        request: &TrayRequest,
    ) -> Result<TrayAnalysis, TrayError> {
        pipeline::run(image, request, &self.config, &self.cache, RunOptions::default()).0
    }

    /// Like [`analyze`](Self::analyze), calling `progress` once per stage
    /// boundary.
    pub fn analyze_with_progress(
        &self,
        image: &RgbImage,
        request: &TrayRequest,
        progress: &mut dyn FnMut(),
    ) -> Result<TrayAnalysis, TrayError> {
        let opts = RunOptions {
            observer: Some(progress),
            keep_images: false,
        };
        pipeline::run(image, request, &self.config, &self.cache, opts).0
    }

    /// Decode the image at `path` and analyze it.
    pub fn analyze_path(
        &self,
        path: &Path,
        request: &TrayRequest,
    ) -> Result<TrayAnalysis, TrayError> {
        let image = load_image(path)?;
        self.analyze(&image, request)
    }

    /// Call every well with the configured boundaries.
    pub fn classify(&self, analysis: TrayAnalysis) -> ClassifiedTray {
        analysis.classify(&self.config.classify)
    }

    /// Analyze and classify in one step.
    pub fn analyze_and_classify(
        &self,
        image: &RgbImage,
        request: &TrayRequest,
    ) -> Result<ClassifiedTray, TrayError> {
        Ok(self.classify(self.analyze(image, request)?))
    }

    /// Analyze while collecting diagnostics. The dump and images are
    /// returned whether or not the run succeeded.
    pub fn analyze_with_debug(
        &self,
        image: &RgbImage,
        request: &TrayRequest,
    ) -> (Result<TrayAnalysis, TrayError>, DebugDump, DebugImages) {
        let opts = RunOptions {
            observer: None,
            keep_images: true,
        };
        let (result, mut trace) = pipeline::run(image, request, &self.config, &self.cache, opts);
        let error = result.as_ref().err().map(ToString::to_string);
        let dump = DebugDump::from_trace(
            request,
            &self.config,
            &trace,
            result.as_ref().ok(),
            error,
        );
        let images = DebugImages {
            unwarped: trace.unwarped.take(),
            normalized: trace.normalized.take(),
        };
        (result, dump, images)
    }

    /// Resize to the working width and remove lens distortion.
    pub fn unwarp(&self, image: &RgbImage) -> Result<RgbImage, TrayError> {
        pipeline::unwarp_image(image, &self.config, &self.cache)
    }
}

/// Decode an image file into RGB.
pub fn load_image(path: &Path) -> Result<RgbImage, TrayError> {
    image::open(path)
        .map(|img| img.to_rgb8())
        .map_err(|e| TrayError::ImageLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
