use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_line_segment_mut, draw_text_mut};
use tracing::instrument;

use crate::{Error, Quad, Result};

const BUNDLED_FONT_NAME: &str = "DejaVuSansMono.ttf";
static BUNDLED_FONT: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

#[derive(Debug, Clone, Copy)]
pub struct AnnotationStyle {
    pub color: Rgb<u8>,
    pub line_width: u32,
    pub text_offset: f32,
    pub text_scale: f32,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Rgb([0, 255, 0]),
            line_width: 2,
            text_offset: 10.0,
            text_scale: 16.0,
        }
    }
}

pub struct Annotator {
    style: AnnotationStyle,
    font: FontArc,
}

impl Annotator {
    pub fn new(style: AnnotationStyle, font: FontArc) -> Self {
        Self { style, font }
    }

    /// Loads the TrueType font at `path`, or the bundled DejaVu Sans Mono.
    #[instrument(level = "debug")]
    pub fn with_font_path(style: AnnotationStyle, path: Option<&Path>) -> Result<Self> {
        let font = match path {
            Some(path) => load_font(path)?,
            None => bundled_font()?,
        };
        Ok(Self::new(style, font))
    }

    pub fn draw(&self, canvas: &mut RgbImage, text: &str, quad: &Quad) {
        let corners = quad.corners();
        for (i, start) in corners.iter().enumerate() {
            let end = corners[(i + 1) % corners.len()];
            for step in 0..self.style.line_width {
                let shift = step as f32;
                draw_line_segment_mut(
                    canvas,
                    (start.x + shift, start.y),
                    (end.x + shift, end.y),
                    self.style.color,
                );
                draw_line_segment_mut(
                    canvas,
                    (start.x, start.y + shift),
                    (end.x, end.y + shift),
                    self.style.color,
                );
            }
        }

        // draw_text_mut takes the top of the line box; the baseline sits
        // `ascent` below it and must end up `text_offset` above the vertex
        let anchor = quad.first();
        let scale = PxScale::from(self.style.text_scale);
        let ascent = self.font.as_scaled(scale).ascent();
        let top = anchor.y - self.style.text_offset - ascent;
        draw_text_mut(
            canvas,
            self.style.color,
            anchor.x.round() as i32,
            top.round() as i32,
            scale,
            &self.font,
            text,
        );
    }
}

fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    FontArc::try_from_vec(bytes).map_err(|source| Error::Font {
        path: path.to_path_buf(),
        source,
    })
}

fn bundled_font() -> Result<FontArc> {
    FontArc::try_from_slice(BUNDLED_FONT).map_err(|source| Error::Font {
        path: PathBuf::from(BUNDLED_FONT_NAME),
        source,
    })
}

/// Output location for `source`: same file name inside `output_dir`.
pub fn output_path(output_dir: &Path, source: &Path) -> PathBuf {
    match source.file_name() {
        Some(name) => output_dir.join(name),
        None => output_dir.join("annotated.png"),
    }
}

#[instrument(level = "debug", skip(image))]
pub fn write_annotated(image: &RgbImage, path: &Path) -> Result<()> {
    image.save(path).map_err(|source| Error::Write {
        path: path.to_path_buf(),
        source,
    })
}
