/// Processing stages of one tray, in order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TrayStage {
    Created,
    Unwarped,
    Normalized,
    Thresholded,
    OriginFound,
    BigWellsBuilt,
    /// Only reached for trays with small wells.
    SmallWellsBuilt,
    Regularized,
    OverflowAnalyzed,
    Processed,
    Classified,
}

impl TrayStage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Unwarped => "unwarped",
            Self::Normalized => "normalized",
            Self::Thresholded => "thresholded",
            Self::OriginFound => "origin_found",
            Self::BigWellsBuilt => "big_wells_built",
            Self::SmallWellsBuilt => "small_wells_built",
            Self::Regularized => "regularized",
            Self::OverflowAnalyzed => "overflow_analyzed",
            Self::Processed => "processed",
            Self::Classified => "classified",
        }
    }

    /// Stage that follows `self`.
    pub fn next(self, has_small_wells: bool) -> Option<Self> {
        Some(match self {
            Self::Created => Self::Unwarped,
            Self::Unwarped => Self::Normalized,
            Self::Normalized => Self::Thresholded,
            Self::Thresholded => Self::OriginFound,
            Self::OriginFound => Self::BigWellsBuilt,
            Self::BigWellsBuilt if has_small_wells => Self::SmallWellsBuilt,
            Self::BigWellsBuilt | Self::SmallWellsBuilt => Self::Regularized,
            Self::Regularized => Self::OverflowAnalyzed,
            Self::OverflowAnalyzed => Self::Processed,
            Self::Processed => Self::Classified,
            Self::Classified => return None,
        })
    }
}

impl std::fmt::Display for TrayStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Walks the stage sequence and notifies the progress observer at every
/// boundary.
pub(crate) struct StageTracker<'a> {
    current: TrayStage,
    has_small_wells: bool,
    trace: Vec<TrayStage>,
    observer: Option<&'a mut dyn FnMut()>,
}

impl<'a> StageTracker<'a> {
    pub(crate) fn new(has_small_wells: bool, observer: Option<&'a mut dyn FnMut()>) -> Self {
        Self {
            current: TrayStage::Created,
            has_small_wells,
            trace: vec![TrayStage::Created],
            observer,
        }
    }

    pub(crate) fn current(&self) -> TrayStage {
        self.current
    }

    /// Move to the next stage.
    pub(crate) fn advance(&mut self) -> TrayStage {
        match self.current.next(self.has_small_wells) {
            Some(next) => {
                tracing::debug!("stage {} -> {}", self.current, next);
                self.current = next;
                self.trace.push(next);
                if let Some(observer) = self.observer.as_mut() {
                    observer();
                }
            }
            None => tracing::debug!("stage {} is final", self.current),
        }
        self.current
    }

    pub(crate) fn into_trace(self) -> Vec<TrayStage> {
        self.trace
    }
}
