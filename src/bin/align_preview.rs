/// Standalone preview tool: measure a reference and a product photo,
/// print both measurements and the scale factor, and write the aligned
/// canvas. Shares the exact detector/aligner used by the event handler.
///
/// Usage: cargo run --bin align_preview -- reference.png product.png [--output aligned.png]

use anyhow::{Context, Result};
use std::sync::Arc;

use product_align::core::Config;
use product_align::services::{ObjectDetector, ScaleAligner};
use product_align::utils::{decode_rgb, encode_png};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("Usage: {} <reference> <product> [--output aligned.png]", args[0]);
        std::process::exit(1);
    }

    let reference_path = &args[1];
    let product_path = &args[2];
    let mut output_path = "aligned.png".to_string();

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--output" | "-o" => {
                if i + 1 < args.len() {
                    output_path = args[i + 1].clone();
                    i += 2;
                } else {
                    i += 1;
                }
            }
            _ => i += 1,
        }
    }

    let config = Arc::new(Config::new()?);
    let detector = ObjectDetector::new(config);
    let aligner = ScaleAligner::new();

    let reference = decode_rgb(&std::fs::read(reference_path).context("reading reference")?)
        .context("decoding reference")?;
    let product = decode_rgb(&std::fs::read(product_path).context("reading product")?)
        .context("decoding product")?;

    let ref_measurement = detector.detect(&reference).context("measuring reference")?;
    let prod_measurement = detector.detect(&product).context("measuring product")?;

    println!(
        "Reference: diagonal {:.2}px, centroid {:?}",
        ref_measurement.diagonal, ref_measurement.centroid
    );
    println!(
        "Product:   diagonal {:.2}px, centroid {:?}",
        prod_measurement.diagonal, prod_measurement.centroid
    );
    println!(
        "Scale factor: {:.4}",
        ref_measurement.diagonal / prod_measurement.diagonal
    );

    let canvas = aligner.align(
        &ref_measurement,
        reference.dimensions(),
        &product,
        &prod_measurement,
    )?;
    std::fs::write(&output_path, encode_png(&canvas)?).context("writing aligned output")?;
    println!("Wrote {}", output_path);

    Ok(())
}
