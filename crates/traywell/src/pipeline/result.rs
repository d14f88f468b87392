use crate::classify::{LightMode, WellClassifier};
use crate::config::ClassifyConfig;
use crate::detector::OverflowResult;
use crate::grid::WellGrid;
use crate::tray_layout::{TrayKind, TrayLayout};
use crate::well::PixelPos;

use super::TrayStage;

/// What to analyze: image identity, lighting, and tray kind.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrayRequest {
    /// Identifier carried into errors and logs (usually the file name).
    pub image_id: String,
    pub mode: LightMode,
    pub has_small_wells: bool,
}

impl TrayRequest {
    /// Visible-light request for a standard tray.
    pub fn new(image_id: impl Into<String>) -> Self {
        Self {
            image_id: image_id.into(),
            mode: LightMode::Visible,
            has_small_wells: false,
        }
    }

    pub fn with_mode(mut self, mode: LightMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_small_wells(mut self, has_small_wells: bool) -> Self {
        self.has_small_wells = has_small_wells;
        self
    }

    pub fn tray_kind(&self) -> TrayKind {
        TrayKind::from_small_wells(self.has_small_wells)
    }
}

/// Geometry and wells of a fully processed tray.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TrayAnalysis {
    pub image_id: String,
    pub mode: LightMode,
    pub layout: TrayLayout,
    /// Working (unwarped) image dimensions [width, height].
    pub image_size: [u32; 2],
    /// Detected center of the first big well.
    pub origin: PixelPos,
    /// Pixels per millimetre, refined from the first big-well row.
    pub scale: f64,
    /// Pixels per millimetre implied by the tray rectangle.
    pub rect_scale: f64,
    pub threshold: u32,
    pub background_level: f64,
    pub big_wells: WellGrid,
    pub small_wells: WellGrid,
    pub overflow: OverflowResult,
    pub stage: TrayStage,
}

impl TrayAnalysis {
    /// Call every well positive or negative.
    pub fn classify(self, cfg: &ClassifyConfig) -> ClassifiedTray {
        let classifier = WellClassifier::new(self.mode, cfg);
        let big_wells = classifier.classify_grid(self.big_wells);
        let small_wells = classifier.classify_grid(self.small_wells);
        let overflow = OverflowResult {
            well: classifier.classify(self.overflow.well),
            ..self.overflow
        };

        let big_positive_count =
            big_wells.positive_count() + usize::from(overflow.well.is_positive());
        let small_positive_count = small_wells.positive_count();
        tracing::info!(
            "{}: {} big and {} small positive wells",
            self.image_id,
            big_positive_count,
            small_positive_count
        );
        tracing::debug!("stage {} -> {}", self.stage, TrayStage::Classified);

        ClassifiedTray {
            analysis: TrayAnalysis {
                big_wells,
                small_wells,
                overflow,
                stage: TrayStage::Classified,
                ..self
            },
            big_positive_count,
            small_positive_count,
        }
    }
}

/// A tray after classification.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ClassifiedTray {
    #[serde(flatten)]
    pub analysis: TrayAnalysis,
    /// Positive big wells, the overflow reservoir included.
    pub big_positive_count: usize,
    pub small_positive_count: usize,
}

impl ClassifiedTray {
    pub fn image_id(&self) -> &str {
        &self.analysis.image_id
    }

    /// Call matrix of the big wells in full-matrix coordinates.
    pub fn big_calls(&self) -> Vec<Vec<bool>> {
        calls(&self.analysis.big_wells)
    }

    /// Call matrix of the small wells; omitted corners read as `false`.
    pub fn small_calls(&self) -> Vec<Vec<bool>> {
        calls(&self.analysis.small_wells)
    }

    pub fn overflow_positive(&self) -> bool {
        self.analysis.overflow.well.is_positive()
    }
}

fn calls(grid: &WellGrid) -> Vec<Vec<bool>> {
    let mut out = vec![vec![false; grid.shape.cols]; grid.shape.n_rows()];
    for (r, c, well) in grid.iter() {
        out[r][c] = well.is_positive();
    }
    out
}
