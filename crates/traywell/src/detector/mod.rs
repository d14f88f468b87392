//! Well detection stages.
//!
//! Every stage reads the normalized image through an [`IntensityField`] and
//! finds pixels with the [`RegionGrower`]; the `pipeline` module owns the
//! call order.

mod build;
mod grow;
mod locate;
mod overflow;
mod regularize;

pub use build::{build_big_wells, build_small_wells, BigWells};
pub use grow::{GrowOutcome, GrowRequest, RegionGrower};
pub use locate::{find_rectangle, locate_origin, OriginEstimate, TrayRect};
pub use overflow::{analyze_overflow, hamming_window, OverflowResult};
pub use regularize::{median, regularize_big, regularize_small};

use image::RgbImage;
use rand::Rng;

use crate::config::GrowConfig;
use crate::preprocess::IntensityField;
use crate::well::{PixelPos, Well};

/// Turns grow queries into [`Well`] records sampled from the normalized image.
#[derive(Debug, Clone, Copy)]
pub struct WellFinder<'a> {
    image: &'a RgbImage,
    grower: RegionGrower<'a>,
    threshold: f64,
}

impl<'a> WellFinder<'a> {
    pub fn new(
        image: &'a RgbImage,
        field: &'a IntensityField,
        grow: &'a GrowConfig,
        threshold: f64,
    ) -> Self {
        Self {
            image,
            grower: RegionGrower::new(field, grow),
            threshold,
        }
    }

    pub fn image(&self) -> &'a RgbImage {
        self.image
    }

    pub fn field(&self) -> &'a IntensityField {
        self.grower.field()
    }

    pub fn grower(&self) -> &RegionGrower<'a> {
        &self.grower
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Grow a well at its nominal position with threshold backoff.
    pub fn find<R: Rng>(&self, nominal: PixelPos, size: i32, rng: &mut R) -> Well {
        let req = GrowRequest::new(nominal, size, self.threshold);
        let outcome = self.grower.grow_with_backoff(&req, rng);
        Well::nominal(nominal, size).with_blob(outcome.pixels, self.image)
    }

    /// Regrow a well at its current center with `ratio × threshold`.
    pub fn regrow<R: Rng>(&self, well: Well, ratio: f64, rng: &mut R) -> Well {
        let req = GrowRequest::new(well.center, well.size_px, self.threshold * ratio);
        let outcome = self.grower.grow_with_backoff(&req, rng);
        well.regenerated(outcome.pixels, self.image)
    }
}
