//! Lens-distortion correction for tray photographs.
//!
//! The camera is modeled with a single radial coefficient `k`
//! (`Ru = Rd·(1 + k·Rd²)`, radii normalized by the image corner radius). An
//! [`UnwarpMap`] precomputes, for every pixel of the padded target image, the
//! source pixel it pulls from; maps are shared through [`UnwarpMapCache`].

mod cache;
mod unwarp;

pub use cache::UnwarpMapCache;
pub use unwarp::{
    distorted_radius, LensUnwarper, RadiusTable, UnwarpKey, UnwarpMap, NO_SOURCE,
    RADIUS_TABLE_LEN, RADIUS_TABLE_STEP,
};
