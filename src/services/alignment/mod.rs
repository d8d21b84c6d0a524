// Scale normalization and canvas compositing
//
// Rescales a product image so its measured object diagonal matches the
// reference's, then composites it onto a white reference-sized canvas
// with the object centroids coinciding. Off-canvas regions are clipped.

use crate::core::errors::AlignError;
use crate::core::types::Measurement;
use image::imageops::FilterType;
use image::{Rgb, RgbImage};
use tracing::debug;

const CANVAS_BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);

/// Produces reference-sized canvases with the product rescaled and
/// repositioned to match the reference object's size and location.
pub struct ScaleAligner;

impl ScaleAligner {
    pub fn new() -> Self {
        Self
    }

    /// Align one product image to the reference measurement.
    ///
    /// The output is always exactly `reference_dims`, 3-channel, white
    /// where the rescaled product does not cover the canvas. An empty
    /// canvas/product intersection yields a pure white canvas, not an
    /// error.
    pub fn align(
        &self,
        reference: &Measurement,
        reference_dims: (u32, u32),
        product: &RgbImage,
        measurement: &Measurement,
    ) -> Result<RgbImage, AlignError> {
        let (ref_w, ref_h) = reference_dims;

        if measurement.diagonal == 0.0 || reference.diagonal == 0.0 {
            return Err(AlignError::DegenerateScale {
                reference: reference.diagonal,
                product: measurement.diagonal,
            });
        }
        let scale = reference.diagonal / measurement.diagonal;

        let new_w = (f64::from(product.width()) * scale).round() as i64;
        let new_h = (f64::from(product.height()) * scale).round() as i64;
        if new_w < 1 || new_h < 1 {
            // Resizing to a zero extent has no meaningful result.
            return Err(AlignError::DegenerateScale {
                reference: reference.diagonal,
                product: measurement.diagonal,
            });
        }
        let resized = image::imageops::resize(
            product,
            new_w as u32,
            new_h as u32,
            FilterType::CatmullRom,
        );

        // Scale the centroid by the same factor, truncating like the
        // measurement itself does.
        let scaled_cx = (measurement.centroid.0 as f64 * scale) as i64;
        let scaled_cy = (measurement.centroid.1 as f64 * scale) as i64;

        let shift_x = reference.centroid.0 - scaled_cx;
        let shift_y = reference.centroid.1 - scaled_cy;
        debug!(scale, shift_x, shift_y, new_w, new_h, "compositing product onto canvas");

        let mut canvas = RgbImage::from_pixel(ref_w, ref_h, CANVAS_BACKGROUND);

        // Destination rectangle: intersection of the shifted product
        // with the canvas. Source rectangle follows by the symmetric
        // offset.
        let dst_x0 = shift_x.max(0);
        let dst_y0 = shift_y.max(0);
        let dst_x1 = (shift_x + new_w).min(i64::from(ref_w));
        let dst_y1 = (shift_y + new_h).min(i64::from(ref_h));

        if dst_x1 > dst_x0 && dst_y1 > dst_y0 {
            let src_x0 = (-shift_x).max(0);
            let src_y0 = (-shift_y).max(0);
            for dy in dst_y0..dst_y1 {
                let sy = (src_y0 + (dy - dst_y0)) as u32;
                for dx in dst_x0..dst_x1 {
                    let sx = (src_x0 + (dx - dst_x0)) as u32;
                    canvas.put_pixel(dx as u32, dy as u32, *resized.get_pixel(sx, sy));
                }
            }
        }

        Ok(canvas)
    }
}

impl Default for ScaleAligner {
    fn default() -> Self {
        Self::new()
    }
}
