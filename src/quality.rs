use image::RgbImage;

use crate::util::to_gray;

const MIN_BRIGHTNESS: f32 = 30.0;
const MAX_BRIGHTNESS: f32 = 225.0;
const MIN_CONTRAST: f32 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityReport {
    pub mean: f32,
    pub std_dev: f32,
    pub low_quality: bool,
}

/// Flags images that are nearly black, nearly white or nearly flat.
pub fn assess_quality(image: &RgbImage) -> QualityReport {
    let gray = to_gray(image);
    let count = gray.len().max(1) as f64;
    let mean = gray.pixels().map(|p| p[0] as f64).sum::<f64>() / count;
    let variance = gray
        .pixels()
        .map(|p| (p[0] as f64 - mean).powi(2))
        .sum::<f64>()
        / count;

    let mean = mean as f32;
    let std_dev = variance.sqrt() as f32;
    QualityReport {
        mean,
        std_dev,
        low_quality: !(MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&mean) || std_dev < MIN_CONTRAST,
    }
}
