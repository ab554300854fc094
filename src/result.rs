use std::path::PathBuf;

use geo::{Coord, LineString, Polygon};
use image::RgbImage;

use crate::variants::VariantKind;

/// Type label reported for every decoded payload.
pub const QR_CODE_KIND: &str = "QRCODE";

/// Four corners of a detected code in image pixel coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct Quad {
    pub rect: Polygon<f32>,
}

impl Quad {
    pub fn new(corners: [(f32, f32); 4]) -> Self {
        let points = corners.iter().map(|&(x, y)| Coord { x, y }).collect();
        Self {
            rect: Polygon::new(LineString::new(points), vec![]),
        }
    }

    /// The four corners in detector order, without the closing point.
    pub fn corners(&self) -> Vec<Coord<f32>> {
        self.rect.exterior().0.iter().take(4).copied().collect()
    }

    pub fn first(&self) -> Coord<f32> {
        self.rect.exterior().0[0]
    }
}

/// Raw output of one detector call. `quads` may be shorter than `texts` or
/// missing entirely.
#[derive(Debug, Clone, Default)]
pub struct Detections {
    pub texts: Vec<String>,
    pub quads: Option<Vec<Quad>>,
}

impl Detections {
    pub fn quad_count(&self) -> usize {
        self.quads.as_ref().map_or(0, Vec::len)
    }

    pub fn quad_at(&self, index: usize) -> Option<&Quad> {
        self.quads.as_ref().and_then(|quads| quads.get(index))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrResult {
    pub data: String,
    pub kind: &'static str,
}

impl QrResult {
    pub fn new(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            kind: QR_CODE_KIND,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub results: Vec<QrResult>,
    pub canvas: RgbImage,
    pub winner: VariantKind,
}

impl ScanOutcome {
    pub fn has_codes(&self) -> bool {
        !self.results.is_empty()
    }
}

#[derive(Debug, Clone)]
pub enum ImageReport {
    Found {
        results: Vec<QrResult>,
        saved_to: Option<PathBuf>,
    },
    NotFound,
    LoadFailed {
        reason: String,
    },
    Skipped {
        reason: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct BatchSummary {
    pub reports: Vec<(PathBuf, ImageReport)>,
}

impl BatchSummary {
    pub fn found(&self) -> usize {
        self.count(|report| matches!(report, ImageReport::Found { .. }))
    }

    pub fn not_found(&self) -> usize {
        self.count(|report| matches!(report, ImageReport::NotFound))
    }

    pub fn load_failed(&self) -> usize {
        self.count(|report| matches!(report, ImageReport::LoadFailed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|report| matches!(report, ImageReport::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&ImageReport) -> bool) -> usize {
        self.reports
            .iter()
            .filter(|(_, report)| predicate(report))
            .count()
    }
}
