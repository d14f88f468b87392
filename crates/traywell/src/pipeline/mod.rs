//! Tray analysis pipeline.
//!
//! Wires the stages together in a fixed order:
//! resize -> unwarp -> normalize -> threshold -> locate -> build (big, then
//! small) -> regularize -> overflow -> scale check.
//!
//! Algorithmic pieces live in `crate::pixelmap`, `crate::preprocess` and
//! `crate::detector`; this layer owns stage boundaries, the stage state
//! machine, and the result types. Classification is a separate step on
//! [`TrayAnalysis`].
//!
//! Entry points:
//! - `run`: one image through every stage, returning the analysis and a
//!   trace of intermediate values
//! - `unwarp_image`: resize and unwarp only

mod result;
mod run;
mod stage;

#[cfg(test)]
mod tests;

pub use result::{ClassifiedTray, TrayAnalysis, TrayRequest};
pub use stage::TrayStage;

pub(crate) use run::{run, unwarp_image, RunOptions, RunTrace};
