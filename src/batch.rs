use std::path::{Path, PathBuf};

use tracing::instrument;

use crate::{BatchSummary, Error, ImageReport, QrScanner, Result};

pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "gif"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Regular files in `dir` with an image extension, sorted by name.
/// Subdirectories are not descended into.
#[instrument(level = "debug")]
pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let io_err = |source| Error::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && is_image(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Scans every image in `input_dir` one after another.
pub fn run_batch(scanner: &QrScanner, input_dir: &Path) -> Result<BatchSummary> {
    run_batch_with(scanner, input_dir, |_, _, _| {}, |_, _| {})
}

/// Like [`run_batch`], calling `before` with the image's position and the
/// total ahead of each image and `after` with its report.
#[instrument(skip(scanner, before, after))]
pub fn run_batch_with(
    scanner: &QrScanner,
    input_dir: &Path,
    mut before: impl FnMut(&Path, usize, usize),
    mut after: impl FnMut(&Path, &ImageReport),
) -> Result<BatchSummary> {
    let images = list_images(input_dir)?;
    let output_dir = scanner.output_dir();
    std::fs::create_dir_all(output_dir).map_err(|source| Error::Io {
        path: output_dir.to_path_buf(),
        source,
    })?;
    let total = images.len();
    tracing::info!("Found {total} image files");

    let mut summary = BatchSummary::default();
    for (index, path) in images.into_iter().enumerate() {
        before(&path, index, total);
        let report = scanner.process_file(&path);
        after(&path, &report);
        summary.reports.push((path, report));
    }

    tracing::info!(
        found = summary.found(),
        not_found = summary.not_found(),
        load_failed = summary.load_failed(),
        skipped = summary.skipped(),
        "Batch finished"
    );
    Ok(summary)
}
