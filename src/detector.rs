use image::RgbImage;
use rqrr::PreparedImage;
use tracing::instrument;

use crate::{util::to_gray, Detections, Quad, Result};

/// Something that finds and decodes QR codes in a single image.
///
/// Implementations return decoded texts and, when known, their corner
/// quadrilaterals in the same order. Closures with the matching signature are
/// detectors too, which is how tests inject canned results.
pub trait QrDetector {
    fn detect(&self, image: &RgbImage) -> Result<Detections>;
}

impl<F> QrDetector for F
where
    F: Fn(&RgbImage) -> Result<Detections>,
{
    fn detect(&self, image: &RgbImage) -> Result<Detections> {
        self(image)
    }
}

/// Default detector backed by `rqrr`. Grids that fail to decode are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct RqrrDetector;

impl QrDetector for RqrrDetector {
    #[instrument(level = "debug", skip(self, image))]
    fn detect(&self, image: &RgbImage) -> Result<Detections> {
        let gray = to_gray(image);
        let mut prepared = PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        log::trace!("Found {} candidate grids", grids.len());

        let mut texts = Vec::with_capacity(grids.len());
        let mut quads = Vec::with_capacity(grids.len());
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => {
                    let corners = grid.bounds.map(|p| (p.x as f32, p.y as f32));
                    texts.push(content);
                    quads.push(Quad::new(corners));
                }
                Err(err) => log::debug!("Dropping undecodable grid: {err:?}"),
            }
        }

        Ok(Detections {
            texts,
            quads: Some(quads),
        })
    }
}
