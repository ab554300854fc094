//! Contrast-limited adaptive histogram equalization on a single channel.

use image::{GrayImage, Luma};
use ndarray::Array3;
use tracing::instrument;

const BINS: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct ClaheParams {
    pub clip_limit: f32,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 2.0,
            tiles_x: 8,
            tiles_y: 8,
        }
    }
}

/// Equalizes `gray` tile by tile and blends neighbouring tile mappings
/// bilinearly. Images whose sides are not a multiple of the grid are
/// reflect-padded on the right and bottom first, so every tile has the same
/// size and even images smaller than the grid get equalized.
#[instrument(level = "debug", skip(gray))]
pub fn clahe(gray: &GrayImage, params: ClaheParams) -> GrayImage {
    let (width, height) = gray.dimensions();
    let ClaheParams {
        tiles_x, tiles_y, ..
    } = params;
    if tiles_x == 0 || tiles_y == 0 || width == 0 || height == 0 {
        return gray.clone();
    }

    let padded = pad_to_grid(gray, tiles_x, tiles_y);
    let tile_w = padded.width() / tiles_x;
    let tile_h = padded.height() / tiles_y;
    let luts = tile_luts(&padded, params, tile_w, tile_h);

    GrayImage::from_fn(width, height, |x, y| {
        let value = gray.get_pixel(x, y)[0] as usize;

        let fx = (x as f32 + 0.5) / tile_w as f32 - 0.5;
        let fy = (y as f32 + 0.5) / tile_h as f32 - 0.5;
        let tx0 = (fx.floor() as i64).clamp(0, tiles_x as i64 - 1) as usize;
        let tx1 = (fx.floor() as i64 + 1).clamp(0, tiles_x as i64 - 1) as usize;
        let ty0 = (fy.floor() as i64).clamp(0, tiles_y as i64 - 1) as usize;
        let ty1 = (fy.floor() as i64 + 1).clamp(0, tiles_y as i64 - 1) as usize;
        let ax = fx - fx.floor();
        let ay = fy - fy.floor();

        let top = luts[[ty0, tx0, value]] * (1.0 - ax) + luts[[ty0, tx1, value]] * ax;
        let bottom = luts[[ty1, tx0, value]] * (1.0 - ax) + luts[[ty1, tx1, value]] * ax;
        let mapped = top * (1.0 - ay) + bottom * ay;

        Luma([mapped.round().clamp(0.0, 255.0) as u8])
    })
}

/// Grows `gray` to the next multiple of the tile grid, mirroring about the
/// last row and column without repeating them.
fn pad_to_grid(gray: &GrayImage, tiles_x: u32, tiles_y: u32) -> GrayImage {
    let (width, height) = gray.dimensions();
    let padded_w = width.div_ceil(tiles_x) * tiles_x;
    let padded_h = height.div_ceil(tiles_y) * tiles_y;
    if (padded_w, padded_h) == (width, height) {
        return gray.clone();
    }
    log::trace!("Padding {width}x{height} to {padded_w}x{padded_h}");
    GrayImage::from_fn(padded_w, padded_h, |x, y| {
        *gray.get_pixel(reflect(x, width), reflect(y, height))
    })
}

fn reflect(i: u32, len: u32) -> u32 {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len - 1);
    let i = i % period;
    if i < len {
        i
    } else {
        period - i
    }
}

/// One mapping per tile, indexed `[tile_y, tile_x, intensity]`.
fn tile_luts(gray: &GrayImage, params: ClaheParams, tile_w: u32, tile_h: u32) -> Array3<f32> {
    let tiles_x = params.tiles_x as usize;
    let tiles_y = params.tiles_y as usize;
    let area = (tile_w * tile_h) as usize;
    let scale = 255.0 / area as f32;
    let mut luts = Array3::<f32>::zeros((tiles_y, tiles_x, BINS));

    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x0 = tx as u32 * tile_w;
            let y0 = ty as u32 * tile_h;

            let mut hist = [0usize; BINS];
            for y in y0..y0 + tile_h {
                for x in x0..x0 + tile_w {
                    hist[gray.get_pixel(x, y)[0] as usize] += 1;
                }
            }
            clip_histogram(&mut hist, params.clip_limit, area);

            let mut cdf = 0usize;
            for (bin, count) in hist.iter().enumerate() {
                cdf += count;
                luts[[ty, tx, bin]] = (cdf as f32 * scale).min(255.0);
            }
        }
    }

    luts
}

fn clip_histogram(hist: &mut [usize; BINS], clip_limit: f32, area: usize) {
    let clip = ((clip_limit * area as f32 / BINS as f32) as usize).max(1);
    let mut excess = 0usize;
    for count in hist.iter_mut() {
        if *count > clip {
            excess += *count - clip;
            *count = clip;
        }
    }

    let per_bin = excess / BINS;
    let remainder = excess % BINS;
    for (bin, count) in hist.iter_mut().enumerate() {
        *count += per_bin;
        if bin < remainder {
            *count += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_dimensions() {
        let gray = GrayImage::from_fn(80, 60, |x, y| Luma([((x + y) % 256) as u8]));
        let out = clahe(&gray, ClaheParams::default());
        assert_eq!(out.dimensions(), (80, 60));
    }

    #[test]
    fn uniform_image_stays_uniform() {
        let gray = GrayImage::from_pixel(64, 64, Luma([128]));
        let out = clahe(&gray, ClaheParams::default());
        let first = out.get_pixel(0, 0)[0];
        assert!(out.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn odd_sizes_keep_dimensions() {
        for (w, h) in [(1, 1), (9, 3), (20, 13), (3, 40)] {
            let gray = GrayImage::from_fn(w, h, |x, y| Luma([(x * 7 + y * 3) as u8]));
            assert_eq!(clahe(&gray, ClaheParams::default()).dimensions(), (w, h));
        }
    }

    #[test]
    fn image_smaller_than_grid_is_still_equalized() {
        let gray = GrayImage::from_fn(6, 6, |x, y| Luma([100 + ((x + y) % 3) as u8]));
        let out = clahe(&gray, ClaheParams::default());
        assert_ne!(out, gray);
        assert!(out.pixels().any(|p| p[0] > 200));
    }

    #[test]
    fn reflection_mirrors_without_repeating_the_edge() {
        let mirrored: Vec<u32> = (0..9).map(|i| reflect(i, 4)).collect();
        assert_eq!(mirrored, [0, 1, 2, 3, 2, 1, 0, 1, 2]);
        assert_eq!(reflect(5, 1), 0);
    }

    #[test]
    fn padding_reaches_grid_multiple() {
        let gray = GrayImage::from_fn(10, 5, |x, _| Luma([x as u8]));
        let padded = pad_to_grid(&gray, 8, 8);
        assert_eq!(padded.dimensions(), (16, 8));
        assert_eq!(padded.get_pixel(10, 0)[0], 8);
        assert_eq!(padded.get_pixel(0, 5)[0], 0);
    }

    #[test]
    fn clipping_conserves_pixel_count() {
        let mut hist = [0usize; BINS];
        hist[10] = 1000;
        hist[200] = 24;
        clip_histogram(&mut hist, 2.0, 1024);
        assert_eq!(hist.iter().sum::<usize>(), 1024);
        assert!(hist[10] < 1000);
    }
}
