use std::path::Path;

use image::{DynamicImage, Luma, Rgb, RgbImage};
use qrcode::QrCode;
use qrsweep::{
    batch::run_batch, Detections, Error, ImageReport, QrResult, QrScannerBuilder, Quad, Result,
};

const MARKER: Rgb<u8> = Rgb([255, 0, 0]);

/// Pretends a red block in the top-left corner is a QR code saying "HELLO".
fn marker_detector(image: &RgbImage) -> Result<Detections> {
    if *image.get_pixel(1, 1) != MARKER {
        return Ok(Detections::default());
    }
    Ok(Detections {
        texts: vec!["HELLO".to_string()],
        quads: Some(vec![Quad::new([
            (12.0, 12.0),
            (40.0, 12.0),
            (40.0, 40.0),
            (12.0, 40.0),
        ])]),
    })
}

fn write_fixtures(dir: &Path) {
    let mut hello = RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]));
    for y in 0..4 {
        for x in 0..4 {
            hello.put_pixel(x, y, MARKER);
        }
    }
    hello.save(dir.join("hello.png")).expect("save hello");
    RgbImage::from_pixel(64, 64, Rgb([255, 255, 255]))
        .save(dir.join("blank.png"))
        .expect("save blank");
    std::fs::write(dir.join("corrupt.png"), b"\x89PNG but not really").expect("write corrupt");
    std::fs::write(dir.join("readme.txt"), b"ignored").expect("write txt");
}

#[test]
fn batch_reports_found_missing_and_unreadable() {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = tempfile::tempdir().expect("input dir");
    let output = tempfile::tempdir().expect("output dir");
    let output_dir = output.path().join("annotated");
    write_fixtures(input.path());

    let scanner = QrScannerBuilder::new()
        .output_dir(&output_dir)
        .detector(marker_detector)
        .build()
        .expect("Failed to build scanner");
    let summary = run_batch(&scanner, input.path()).expect("batch");

    assert_eq!(summary.reports.len(), 3);
    assert_eq!(summary.found(), 1);
    assert_eq!(summary.not_found(), 1);
    assert_eq!(summary.load_failed(), 1);

    let (path, report) = summary
        .reports
        .iter()
        .find(|(_, report)| matches!(report, ImageReport::Found { .. }))
        .expect("one positive report");
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("hello.png"));
    let ImageReport::Found { results, saved_to } = report else {
        unreachable!()
    };
    assert_eq!(results, &vec![QrResult::new("HELLO")]);

    let written: Vec<_> = std::fs::read_dir(&output_dir)
        .expect("output dir exists")
        .map(|entry| entry.expect("entry").file_name())
        .collect();
    assert_eq!(written, ["hello.png"]);
    assert_eq!(saved_to.as_deref(), Some(output_dir.join("hello.png").as_path()));

    let original = image::open(input.path().join("hello.png"))
        .expect("open input")
        .to_rgb8();
    let annotated = image::open(output_dir.join("hello.png"))
        .expect("open output")
        .to_rgb8();
    assert_eq!(annotated.dimensions(), original.dimensions());
    assert_ne!(annotated, original);
    assert_eq!(*annotated.get_pixel(26, 12), Rgb([0, 255, 0]));
}

#[test]
fn failing_detector_reports_nothing_and_writes_nothing() {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = tempfile::tempdir().expect("input dir");
    let output = tempfile::tempdir().expect("output dir");
    write_fixtures(input.path());

    let scanner = QrScannerBuilder::new()
        .output_dir(output.path())
        .detector(|image: &RgbImage| -> Result<Detections> {
            if *image.get_pixel(1, 1) == Rgb([0, 0, 0]) {
                Err(Error::Detector("variant rejected".into()))
            } else {
                marker_detector(image)
            }
        })
        .build()
        .expect("Failed to build scanner");
    let summary = run_batch(&scanner, input.path()).expect("batch");

    // hello.png is found in its identity variant, but its otsu variant turns
    // the marker black and the error throws away the whole image
    assert_eq!(summary.found(), 0);
    assert_eq!(summary.not_found(), 2);
    assert_eq!(summary.load_failed(), 1);
    assert_eq!(std::fs::read_dir(output.path()).expect("read").count(), 0);
}

#[test]
fn empty_payloads_are_never_reported() {
    let input = tempfile::tempdir().expect("input dir");
    let output = tempfile::tempdir().expect("output dir");
    write_fixtures(input.path());

    let scanner = QrScannerBuilder::new()
        .output_dir(output.path())
        .detector(|_: &RgbImage| -> Result<Detections> {
            Ok(Detections {
                texts: vec![String::new()],
                quads: None,
            })
        })
        .build()
        .expect("Failed to build scanner");
    let summary = run_batch(&scanner, input.path()).expect("batch");

    assert_eq!(summary.found(), 0);
    assert_eq!(summary.not_found(), 2);
    assert_eq!(std::fs::read_dir(output.path()).expect("read").count(), 0);
}

#[test]
fn bundled_detector_finds_a_rendered_code() {
    let _ = env_logger::builder().is_test(true).try_init();

    let input = tempfile::tempdir().expect("input dir");
    let output = tempfile::tempdir().expect("output dir");
    let code = QrCode::new(b"HELLO").expect("encode");
    let gray = code.render::<Luma<u8>>().module_dimensions(6, 6).build();
    DynamicImage::ImageLuma8(gray)
        .save(input.path().join("code.png"))
        .expect("save code");
    RgbImage::from_pixel(1, 1, Rgb([255, 255, 255]))
        .save(input.path().join("dot.png"))
        .expect("save dot");
    RgbImage::from_pixel(9, 3, Rgb([10, 10, 10]))
        .save(input.path().join("strip.png"))
        .expect("save strip");

    let scanner = QrScannerBuilder::new()
        .output_dir(output.path())
        .build()
        .expect("Failed to build scanner");
    let summary = run_batch(&scanner, input.path()).expect("batch");

    assert_eq!(summary.found(), 1);
    assert_eq!(summary.not_found(), 2);
    let (path, report) = &summary.reports[0];
    assert_eq!(path.file_name().and_then(|n| n.to_str()), Some("code.png"));
    assert!(matches!(
        report,
        ImageReport::Found { results, .. } if results == &vec![QrResult::new("HELLO")]
    ));
    assert!(output.path().join("code.png").is_file());
}
