use std::fmt;

use image::{GrayImage, Luma, RgbImage};
use imageproc::{
    contrast::{otsu_level, threshold_mut, ThresholdType},
    filter::separable_filter_equal,
};
use tracing::instrument;

use crate::{
    clahe::{clahe, ClaheParams},
    util::{convolve3x3, gray_to_rgb, integral_table, merge_ycrcb, split_ycrcb, to_gray, window_mean},
};

const GAUSSIAN_3: [f32; 3] = [0.25, 0.5, 0.25];
const ADAPTIVE_BLOCK_SIZE: u32 = 11;
const ADAPTIVE_OFFSET: f32 = 2.0;
#[rustfmt::skip]
const SHARPEN_KERNEL: [f32; 9] = [
    -0.5, -0.5, -0.5,
    -0.5,  5.0, -0.5,
    -0.5, -0.5, -0.5,
];

/// Preprocessing applied before detection. Declaration order is generation
/// order, which is also the aggregator's tie-break priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum VariantKind {
    Identity,
    Otsu,
    Adaptive,
    Clahe,
    Sharpen,
}

impl VariantKind {
    pub const ALL: [VariantKind; 5] = [
        VariantKind::Identity,
        VariantKind::Otsu,
        VariantKind::Adaptive,
        VariantKind::Clahe,
        VariantKind::Sharpen,
    ];

    pub fn label(self) -> &'static str {
        match self {
            VariantKind::Identity => "identity",
            VariantKind::Otsu => "otsu",
            VariantKind::Adaptive => "adaptive",
            VariantKind::Clahe => "clahe",
            VariantKind::Sharpen => "sharpen",
        }
    }

    pub fn is_identity(self) -> bool {
        self == VariantKind::Identity
    }

    pub fn apply(self, image: &RgbImage) -> RgbImage {
        match self {
            VariantKind::Identity => image.clone(),
            VariantKind::Otsu => otsu_binarize(image),
            VariantKind::Adaptive => adaptive_binarize(image),
            VariantKind::Clahe => equalize_luma(image),
            VariantKind::Sharpen => sharpen(image),
        }
    }
}

impl fmt::Display for VariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone)]
pub struct Variant {
    pub kind: VariantKind,
    pub image: RgbImage,
}

#[instrument(level = "debug", skip(image))]
pub fn generate_variants(image: &RgbImage) -> Vec<Variant> {
    VariantKind::ALL
        .into_iter()
        .map(|kind| Variant {
            kind,
            image: kind.apply(image),
        })
        .collect()
}

#[instrument(level = "trace", skip(image))]
fn otsu_binarize(image: &RgbImage) -> RgbImage {
    let mut gray = separable_filter_equal(&to_gray(image), &GAUSSIAN_3[..]);
    let level = otsu_level(&gray);
    log::trace!("Otsu level {level}");
    threshold_mut(&mut gray, level, ThresholdType::Binary);
    gray_to_rgb(&gray)
}

#[instrument(level = "trace", skip(image))]
fn adaptive_binarize(image: &RgbImage) -> RgbImage {
    let gray = to_gray(image);
    let (width, height) = gray.dimensions();
    let table = integral_table(&gray);
    let radius = ADAPTIVE_BLOCK_SIZE / 2;

    let binary = GrayImage::from_fn(width, height, |x, y| {
        let cutoff = window_mean(&table, width, height, x, y, radius) - ADAPTIVE_OFFSET;
        let value = gray.get_pixel(x, y)[0] as f32;
        Luma([if value > cutoff { 255 } else { 0 }])
    });
    gray_to_rgb(&binary)
}

#[instrument(level = "trace", skip(image))]
fn equalize_luma(image: &RgbImage) -> RgbImage {
    let (luma, chroma) = split_ycrcb(image);
    let luma = clahe(&luma, ClaheParams::default());
    merge_ycrcb(&luma, &chroma)
}

fn sharpen(image: &RgbImage) -> RgbImage {
    convolve3x3(image, &SHARPEN_KERNEL)
}

#[cfg(test)]
mod tests {
    use image::Rgb;

    use super::*;

    fn checker(size: u32, cell: u32) -> RgbImage {
        RgbImage::from_fn(size, size, |x, y| {
            if (x / cell + y / cell) % 2 == 0 {
                Rgb([20, 20, 20])
            } else {
                Rgb([230, 230, 230])
            }
        })
    }

    fn is_binary(image: &RgbImage) -> bool {
        image
            .pixels()
            .all(|p| (p[0] == 0 || p[0] == 255) && p[0] == p[1] && p[1] == p[2])
    }

    #[test]
    fn produces_five_variants_in_order() {
        let image = checker(32, 4);
        let variants = generate_variants(&image);
        let kinds: Vec<_> = variants.iter().map(|v| v.kind).collect();
        assert_eq!(kinds, VariantKind::ALL.to_vec());
        assert_eq!(variants[0].image, image);
        assert!(variants
            .iter()
            .all(|v| v.image.dimensions() == image.dimensions()));
    }

    #[test]
    fn binarized_variants_only_hold_black_and_white() {
        let image = checker(40, 5);
        assert!(is_binary(&otsu_binarize(&image)));
        assert!(is_binary(&adaptive_binarize(&image)));
    }

    #[test]
    fn otsu_separates_dark_and_light_halves() {
        let image = RgbImage::from_fn(20, 20, |x, _| {
            if x < 10 {
                Rgb([30, 30, 30])
            } else {
                Rgb([200, 200, 200])
            }
        });
        let out = otsu_binarize(&image);
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(19, 19)[0], 255);
    }

    #[test]
    fn adaptive_keeps_flat_regions_white() {
        // pixel == mean, and mean - 2 < pixel
        let image = RgbImage::from_pixel(16, 16, Rgb([90, 90, 90]));
        let out = adaptive_binarize(&image);
        assert!(out.pixels().all(|p| p[0] == 255));
    }

    #[test]
    fn sharpen_leaves_flat_image_alone() {
        let image = RgbImage::from_pixel(9, 9, Rgb([120, 60, 30]));
        assert_eq!(sharpen(&image), image);
    }

    #[test]
    fn sharpen_boosts_edges() {
        let image = RgbImage::from_fn(10, 10, |x, _| {
            if x < 5 {
                Rgb([100, 100, 100])
            } else {
                Rgb([150, 150, 150])
            }
        });
        let out = sharpen(&image);
        assert!(out.get_pixel(4, 5)[0] < 100);
        assert!(out.get_pixel(5, 5)[0] > 150);
    }

    #[test]
    fn labels_are_stable() {
        let labels: Vec<_> = VariantKind::ALL.iter().map(|k| k.to_string()).collect();
        assert_eq!(labels, ["identity", "otsu", "adaptive", "clahe", "sharpen"]);
    }
}
