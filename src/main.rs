use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use qrsweep::{batch::run_batch_with, FailurePolicy, ImageReport, QrScannerBuilder};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "qrsweep")]
#[command(version, about = "Find and decode QR codes in a directory of images", long_about = None)]
struct Cli {
    /// Directory scanned for .jpg, .jpeg, .png, .bmp and .gif files
    #[arg(short, long, default_value = "input")]
    input: PathBuf,

    /// Directory receiving annotated copies of images with codes
    #[arg(short, long, default_value = "output")]
    output: PathBuf,

    /// Directory holding the detector model files
    #[arg(short, long, default_value = "models")]
    models: PathBuf,

    /// TrueType font for the decoded text labels
    #[arg(long)]
    font: Option<PathBuf>,

    /// Keep going with the remaining variants when the detector fails on one
    #[arg(long)]
    isolate_variant_failures: bool,

    /// Skip images that are too dark, too bright or too flat
    #[arg(long)]
    skip_low_quality: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    if cli.no_color {
        colored::control::set_override(false);
    }

    let policy = if cli.isolate_variant_failures {
        FailurePolicy::Isolate
    } else {
        FailurePolicy::Abort
    };
    let mut builder = QrScannerBuilder::new()
        .output_dir(&cli.output)
        .model_dir(&cli.models)
        .failure_policy(policy)
        .skip_low_quality(cli.skip_low_quality);
    if let Some(font) = &cli.font {
        builder = builder.font(font);
    }
    let scanner = builder.build().context("Failed to set up the scanner")?;

    let summary = run_batch_with(
        &scanner,
        &cli.input,
        |path, index, total| {
            if index == 0 {
                println!("Found {total} image files, processing...");
            }
            println!("\nProcessing image: {}", display_name(path));
        },
        print_report,
    )
    .with_context(|| format!("Failed to scan {}", cli.input.display()))?;

    if summary.reports.is_empty() {
        println!("{}", "No image files found.".red());
    } else {
        println!(
            "\n[*] Summary: {} with QR codes, {} without, {} unreadable, {} skipped",
            summary.found().to_string().green(),
            summary.not_found().to_string().red(),
            summary.load_failed().to_string().red(),
            summary.skipped()
        );
    }

    println!();
    let models = scanner.models();
    if !models.all_present() {
        println!("{}", "Some model files are missing:".red());
    }
    for (name, present) in models.status() {
        if present {
            println!("{} {name} found", "✓".green());
        } else {
            println!("{} {name} not found", "✗".red());
        }
    }

    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn print_report(path: &Path, report: &ImageReport) {
    let name = display_name(path);
    match report {
        ImageReport::Found { results, saved_to } => {
            println!("{}", format!("QR code detected in {name}!").green());
            for qr in results {
                println!("QR code type: {}", qr.kind.green());
                println!("QR code data: {}", qr.data.green());
            }
            match saved_to {
                Some(target) => println!("Result image saved to: {}", target.display()),
                None => println!("{}", "Failed to save result image".red()),
            }
        }
        ImageReport::NotFound => {
            println!("{}", format!("No QR code detected in {name}.").red());
        }
        ImageReport::LoadFailed { reason } => {
            println!("{}", format!("Could not read {name}: {reason}").red());
        }
        ImageReport::Skipped { reason } => {
            println!("Skipped {name}: {reason}");
        }
    }
}
