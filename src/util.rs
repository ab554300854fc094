use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use nalgebra::{Matrix3, Vector3};
use tracing::instrument;

const CHROMA_OFFSET: f32 = 128.0;

pub(crate) fn to_gray(image: &RgbImage) -> GrayImage {
    DynamicImage::ImageRgb8(image.clone()).to_luma8()
}

pub(crate) fn gray_to_rgb(image: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(image.clone()).to_rgb8()
}

/// Summed-area table with a zero row and column in front, so
/// `table[y * (width + 1) + x]` is the sum over `[0, x) x [0, y)`.
pub(crate) fn integral_table(gray: &GrayImage) -> Vec<u64> {
    let (width, height) = gray.dimensions();
    let stride = (width + 1) as usize;
    let mut table = vec![0u64; stride * (height + 1) as usize];

    for y in 0..height {
        let mut row_sum = 0u64;
        for x in 0..width {
            row_sum += gray.get_pixel(x, y)[0] as u64;
            let idx = (y + 1) as usize * stride + (x + 1) as usize;
            let above = y as usize * stride + (x + 1) as usize;
            table[idx] = row_sum + table[above];
        }
    }

    table
}

/// Mean of the square window of `radius` around `(cx, cy)`, clipped to the image.
pub(crate) fn window_mean(
    table: &[u64],
    width: u32,
    height: u32,
    cx: u32,
    cy: u32,
    radius: u32,
) -> f32 {
    let stride = (width + 1) as usize;
    let x1 = cx.saturating_sub(radius) as usize;
    let y1 = cy.saturating_sub(radius) as usize;
    let x2 = ((cx + radius + 1) as usize).min(width as usize);
    let y2 = ((cy + radius + 1) as usize).min(height as usize);

    let area = ((x2 - x1) * (y2 - y1)) as f32;
    let sum = table[y2 * stride + x2] as f64 - table[y1 * stride + x2] as f64
        - table[y2 * stride + x1] as f64
        + table[y1 * stride + x1] as f64;
    sum as f32 / area
}

/// 3x3 convolution over every channel with replicated borders.
#[instrument(level = "trace", skip(image))]
pub(crate) fn convolve3x3(image: &RgbImage, kernel: &[f32; 9]) -> RgbImage {
    let (width, height) = image.dimensions();
    let max_x = width as i64 - 1;
    let max_y = height as i64 - 1;

    RgbImage::from_fn(width, height, |x, y| {
        let mut acc = [0f32; 3];
        for (tap, weight) in kernel.iter().enumerate() {
            let dx = (tap % 3) as i64 - 1;
            let dy = (tap / 3) as i64 - 1;
            let sx = (x as i64 + dx).clamp(0, max_x) as u32;
            let sy = (y as i64 + dy).clamp(0, max_y) as u32;
            let Rgb(channels) = image.get_pixel(sx, sy);
            for (sum, channel) in acc.iter_mut().zip(channels) {
                *sum += *channel as f32 * weight;
            }
        }
        Rgb(acc.map(|value| value.round().clamp(0.0, 255.0) as u8))
    })
}

fn rgb_to_ycrcb_matrix() -> Matrix3<f32> {
    Matrix3::new(
        0.299, 0.587, 0.114, //
        0.5, -0.418_688, -0.081_312, //
        -0.168_736, -0.331_264, 0.5,
    )
}

fn ycrcb_to_rgb_matrix() -> Matrix3<f32> {
    Matrix3::new(
        1.0, 1.402, 0.0, //
        1.0, -0.714_136, -0.344_136, //
        1.0, 0.0, 1.772,
    )
}

/// Splits an RGB image into a luma plane and the untouched chroma pairs.
pub(crate) fn split_ycrcb(image: &RgbImage) -> (GrayImage, Vec<(f32, f32)>) {
    let forward = rgb_to_ycrcb_matrix();
    let mut luma = GrayImage::new(image.width(), image.height());
    let mut chroma = Vec::with_capacity(image.len() / 3);

    for (pixel, out) in image.pixels().zip(luma.pixels_mut()) {
        let rgb = Vector3::new(pixel[0] as f32, pixel[1] as f32, pixel[2] as f32);
        let ycc = forward * rgb;
        *out = Luma([ycc.x.round().clamp(0.0, 255.0) as u8]);
        chroma.push((ycc.y + CHROMA_OFFSET, ycc.z + CHROMA_OFFSET));
    }

    (luma, chroma)
}

pub(crate) fn merge_ycrcb(luma: &GrayImage, chroma: &[(f32, f32)]) -> RgbImage {
    let inverse = ycrcb_to_rgb_matrix();
    let mut image = RgbImage::new(luma.width(), luma.height());

    for ((out, y), (cr, cb)) in image.pixels_mut().zip(luma.pixels()).zip(chroma) {
        let ycc = Vector3::new(y[0] as f32, cr - CHROMA_OFFSET, cb - CHROMA_OFFSET);
        let rgb = inverse * ycc;
        *out = Rgb([rgb.x, rgb.y, rgb.z].map(|c| c.round().clamp(0.0, 255.0) as u8));
    }

    image
}
