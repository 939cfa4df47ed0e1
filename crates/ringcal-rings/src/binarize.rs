use ringcal_core::{adaptive_mean_threshold, GrayImage, GrayImageView};
use serde::{Deserialize, Serialize};

/// Grayscale → binary (0/255) conversion feeding the coarse grid detector.
pub trait Binarizer {
    fn binarize(&self, src: &GrayImageView<'_>) -> GrayImage;
}

/// Local-mean adaptive threshold.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveMeanBinarizer {
    /// Odd window side in pixels.
    pub block_size: usize,
    /// Subtracted from the local mean before comparison.
    pub bias: f32,
}

impl Default for AdaptiveMeanBinarizer {
    fn default() -> Self {
        Self {
            block_size: 61,
            bias: 0.0,
        }
    }
}

impl Binarizer for AdaptiveMeanBinarizer {
    fn binarize(&self, src: &GrayImageView<'_>) -> GrayImage {
        adaptive_mean_threshold(src, self.block_size, self.bias)
    }
}
