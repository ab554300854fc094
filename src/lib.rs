use std::path::{Path, PathBuf};

use image::RgbImage;
use tracing::instrument;

pub mod aggregate;
pub mod annotate;
pub mod batch;
mod clahe;
pub mod detector;
mod error;
pub mod loader;
pub mod models;
pub mod quality;
mod result;
mod util;
pub mod variants;

use aggregate::aggregate;
use annotate::{output_path, write_annotated, AnnotationStyle, Annotator};
pub use clahe::{clahe, ClaheParams};
pub use detector::{QrDetector, RqrrDetector};
pub use error::{Error, Result};
use loader::load_image;
use models::ModelFiles;
use quality::assess_quality;
pub use result::*;
use variants::generate_variants;

/// What to do when the detector errors on one variant of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Give up on the whole image; it is reported as having no codes.
    #[default]
    Abort,
    /// Log and move on to the next variant.
    Isolate,
}

pub struct QrScannerBuilder {
    output_dir: PathBuf,
    model_dir: PathBuf,
    font_path: Option<PathBuf>,
    failure_policy: FailurePolicy,
    skip_low_quality: bool,
    style: AnnotationStyle,
    detector: Option<Box<dyn QrDetector>>,
}

impl QrScannerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = path.into();
        self
    }

    pub fn model_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_dir = path.into();
        self
    }

    pub fn font(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn skip_low_quality(mut self, skip: bool) -> Self {
        self.skip_low_quality = skip;
        self
    }

    pub fn style(mut self, style: AnnotationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn detector(mut self, detector: impl QrDetector + 'static) -> Self {
        self.detector = Some(Box::new(detector));
        self
    }

    #[instrument(skip(self))]
    pub fn build(self) -> Result<QrScanner> {
        let annotator = Annotator::with_font_path(self.style, self.font_path.as_deref())?;
        Ok(QrScanner {
            detector: self.detector.unwrap_or_else(|| Box::new(RqrrDetector)),
            annotator,
            output_dir: self.output_dir,
            models: ModelFiles::in_dir(self.model_dir),
            failure_policy: self.failure_policy,
            skip_low_quality: self.skip_low_quality,
        })
    }
}

impl Default for QrScannerBuilder {
    fn default() -> Self {
        Self {
            output_dir: "output".into(),
            model_dir: "models".into(),
            font_path: None,
            failure_policy: FailurePolicy::default(),
            skip_low_quality: false,
            style: AnnotationStyle::default(),
            detector: None,
        }
    }
}

pub struct QrScanner {
    detector: Box<dyn QrDetector>,
    annotator: Annotator,
    output_dir: PathBuf,
    models: ModelFiles,
    failure_policy: FailurePolicy,
    skip_low_quality: bool,
}

impl QrScanner {
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn models(&self) -> &ModelFiles {
        &self.models
    }

    /// Runs every variant through the detector and merges the results.
    ///
    /// The returned canvas is the winning variant's image with outlines and
    /// labels drawn for every located code.
    #[instrument(skip(self, image))]
    pub fn scan(&self, image: &RgbImage) -> Result<ScanOutcome> {
        let mut variants = generate_variants(image);
        #[cfg(feature = "debug")]
        self.dump_variants(&variants);

        let mut runs = Vec::with_capacity(variants.len());
        for variant in &variants {
            let detections = match self.detector.detect(&variant.image) {
                Ok(detections) => detections,
                Err(err) => match self.failure_policy {
                    FailurePolicy::Abort => return Err(err),
                    FailurePolicy::Isolate => {
                        tracing::warn!(variant = %variant.kind, "Detector failed, skipping: {err}");
                        Detections::default()
                    }
                },
            };
            log::debug!(
                "{} variant: {} texts, {} outlines",
                variant.kind,
                detections.texts.len(),
                detections.quad_count()
            );
            runs.push((variant.kind, detections));
        }

        let merged = aggregate(&runs);
        let mut canvas = variants.swap_remove(merged.winner).image;
        for (text, quad) in &merged.entries {
            if let Some(quad) = quad {
                self.annotator.draw(&mut canvas, text, quad);
            }
        }

        Ok(ScanOutcome {
            results: merged.texts().map(QrResult::new).collect(),
            canvas,
            winner: merged.winner_kind,
        })
    }

    /// Loads, scans and, when codes were found, writes the annotated copy.
    /// Every failure is folded into the report.
    #[instrument(skip(self))]
    pub fn process_file(&self, path: &Path) -> ImageReport {
        let image = match load_image(path) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!("Could not load image: {err}");
                return ImageReport::LoadFailed {
                    reason: err.to_string(),
                };
            }
        };

        if self.skip_low_quality {
            let quality = assess_quality(&image);
            if quality.low_quality {
                log::debug!("Low quality image: {quality:?}");
                return ImageReport::Skipped {
                    reason: format!(
                        "low quality (mean {:.1}, std dev {:.1})",
                        quality.mean, quality.std_dev
                    ),
                };
            }
        }

        let outcome = match self.scan(&image) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::warn!("QR detection failed: {err}");
                return ImageReport::NotFound;
            }
        };
        if !outcome.has_codes() {
            return ImageReport::NotFound;
        }

        let target = output_path(&self.output_dir, path);
        let saved_to = match write_annotated(&outcome.canvas, &target) {
            Ok(()) => {
                tracing::info!(
                    winner = %outcome.winner,
                    "Saved annotated image to {}",
                    target.display()
                );
                Some(target)
            }
            Err(err) => {
                tracing::error!("{err}");
                None
            }
        };

        ImageReport::Found {
            results: outcome.results,
            saved_to,
        }
    }

    #[cfg(feature = "debug")]
    fn dump_variants(&self, variants: &[variants::Variant]) {
        let dir = self.output_dir.join("variants");
        if let Err(err) = std::fs::create_dir_all(&dir) {
            log::debug!("Cannot create {}: {err}", dir.display());
            return;
        }
        for variant in variants {
            let path = dir.join(format!("{}.png", variant.kind));
            if let Err(err) = variant.image.save(&path) {
                log::debug!("Cannot save {}: {err}", path.display());
            }
        }
    }
}
