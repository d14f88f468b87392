//! Errors surfaced by a tray analysis run.

/// Fatal failures of a tray analysis run.
///
/// Recoverable anomalies (a well with no pixels, a failed fill-line search)
/// never show up here; they are logged and recorded on the result instead.
#[derive(Debug, Clone, PartialEq)]
pub enum TrayError {
    /// No pixel blob was found near the expected tray origin after the full
    /// threshold backoff, or the tray rectangle itself could not be found.
    NoOriginDetected {
        /// Identifier of the input image.
        image_id: String,
    },
    /// Final geometry is inconsistent with the physical tray dimensions.
    BadScale {
        /// Identifier of the input image.
        image_id: String,
        /// Refined scale (pixels per mm) measured from the first well row.
        scale: f64,
        /// Scale (pixels per mm) derived from the tray rectangle.
        expected: f64,
    },
    /// An unwarp map was applied to an image of different dimensions.
    UnwarpDimensionMismatch {
        /// Source dimensions the map was built for (width, height).
        expected: [u32; 2],
        /// Dimensions of the image it was applied to (width, height).
        got: [u32; 2],
    },
    /// The input image could not be read or decoded.
    ImageLoad {
        /// Path that was being read.
        path: String,
        /// Decoder error message.
        message: String,
    },
    /// The input image has no pixels.
    EmptyImage,
}

impl std::fmt::Display for TrayError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoOriginDetected { image_id } => {
                write!(f, "no tray origin detected in {}", image_id)
            }
            Self::BadScale {
                image_id,
                scale,
                expected,
            } => write!(
                f,
                "bad scale in {}: measured {:.4} px/mm, tray outline suggests {:.4} px/mm",
                image_id, scale, expected
            ),
            Self::UnwarpDimensionMismatch { expected, got } => write!(
                f,
                "unwarp map built for {}x{} applied to {}x{} image",
                expected[0], expected[1], got[0], got[1]
            ),
            Self::ImageLoad { path, message } => {
                write!(f, "failed to load image {}: {}", path, message)
            }
            Self::EmptyImage => write!(f, "input image is empty"),
        }
    }
}

impl std::error::Error for TrayError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_image() {
        let err = TrayError::NoOriginDetected {
            image_id: "tray_vis.tiff".to_string(),
        };
        assert_eq!(err.to_string(), "no tray origin detected in tray_vis.tiff");
    }
}
