// Dominant-object segmentation and measurement
//
// Pipeline: grayscale -> Gaussian blur -> inverted adaptive threshold ->
// morphological closing -> external contours -> max-area contour ->
// min-area-rect diagonal + contour-moment centroid.

use crate::core::config::Config;
use crate::core::errors::DetectionError;
use crate::core::types::Measurement;
use image::{GrayImage, Luma, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::filter::gaussian_blur_f32;
use imageproc::distance_transform::Norm;
use imageproc::geometry::min_area_rect;
use imageproc::morphology::close;
use imageproc::point::Point;
use std::sync::Arc;
use tracing::trace;

/// Measures the dominant foreground object of a single image.
///
/// Pure and deterministic: identical pixel data always yields the same
/// `Measurement`.
pub struct ObjectDetector {
    config: Arc<Config>,
}

impl ObjectDetector {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Segment the dominant foreground object and report its size and
    /// position. Fails with `NoObjectFound` when segmentation yields no
    /// contours.
    pub fn detect(&self, image: &RgbImage) -> Result<Measurement, DetectionError> {
        let det = &self.config.detection;

        let gray = image::imageops::grayscale(image);
        let blurred = gaussian_blur_f32(&gray, det.blur_sigma);
        let binary = adaptive_threshold_inv(&blurred, det.threshold_window, det.threshold_offset);
        let closed = close(&binary, Norm::LInf, det.closing_radius);

        let contours: Vec<Contour<i32>> = find_contours(&closed);
        let dominant = contours
            .iter()
            .filter(|c| c.border_type == BorderType::Outer)
            .fold(None::<(&Contour<i32>, f64)>, |best, c| {
                let area = contour_area(&c.points);
                match best {
                    // Strict comparison keeps the first-found contour on ties.
                    Some((_, best_area)) if area <= best_area => best,
                    _ => Some((c, area)),
                }
            })
            .map(|(c, _)| c)
            .ok_or(DetectionError::NoObjectFound)?;

        let corners = min_area_rect(&dominant.points);
        let width = distance(corners[0], corners[1]);
        let height = distance(corners[1], corners[2]);
        let diagonal = width.hypot(height);
        let centroid = contour_centroid(&dominant.points);

        trace!(
            diagonal,
            centroid_x = centroid.0,
            centroid_y = centroid.1,
            points = dominant.points.len(),
            "measured dominant contour"
        );

        Ok(Measurement { diagonal, centroid })
    }
}

/// Inverted locally-adaptive mean threshold.
///
/// A pixel becomes foreground (255) when it is darker than the mean of
/// its surrounding `window`-sided square (clipped at the borders) by
/// more than `offset`. This is the dark-object-on-light-background
/// convention; `imageproc::contrast::adaptive_threshold` exposes
/// neither the offset constant nor inversion, hence the integral-image
/// implementation here.
fn adaptive_threshold_inv(gray: &GrayImage, window: u32, offset: i32) -> GrayImage {
    let (w, h) = gray.dimensions();
    if w == 0 || h == 0 {
        return gray.clone();
    }
    let radius = (window / 2) as i64;

    // Integral image with a zero row/column of padding.
    let stride = w as usize + 1;
    let mut integral = vec![0u64; stride * (h as usize + 1)];
    for y in 0..h as usize {
        let mut row_sum = 0u64;
        for x in 0..w as usize {
            row_sum += u64::from(gray.get_pixel(x as u32, y as u32)[0]);
            integral[(y + 1) * stride + x + 1] = integral[y * stride + x + 1] + row_sum;
        }
    }

    let mut out = GrayImage::new(w, h);
    for y in 0..h as i64 {
        let y0 = (y - radius).max(0) as usize;
        let y1 = (y + radius + 1).min(h as i64) as usize;
        for x in 0..w as i64 {
            let x0 = (x - radius).max(0) as usize;
            let x1 = (x + radius + 1).min(w as i64) as usize;
            let sum = integral[y1 * stride + x1] + integral[y0 * stride + x0]
                - integral[y0 * stride + x1]
                - integral[y1 * stride + x0];
            let count = ((y1 - y0) * (x1 - x0)) as u64;
            let mean = (sum / count) as i32;
            let pixel = i32::from(gray.get_pixel(x as u32, y as u32)[0]);
            let value = if pixel < mean - offset { 255 } else { 0 };
            out.put_pixel(x as u32, y as u32, Luma([value]));
        }
    }
    out
}

fn distance(a: Point<i32>, b: Point<i32>) -> f64 {
    let dx = f64::from(a.x - b.x);
    let dy = f64::from(a.y - b.y);
    dx.hypot(dy)
}

/// Unsigned polygon area of a contour via the shoelace formula.
fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice_area = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += i64::from(p.x) * i64::from(q.y) - i64::from(q.x) * i64::from(p.y);
    }
    (twice_area as f64).abs() / 2.0
}

/// First-moment centroid of the contour's enclosed mass (Green's
/// theorem), truncated to integers. Returns `(0, 0)` for a contour
/// whose zeroth moment is zero.
fn contour_centroid(points: &[Point<i32>]) -> (i64, i64) {
    let n = points.len();
    if n < 3 {
        return (0, 0);
    }
    let mut twice_area = 0f64;
    let mut cx = 0f64;
    let mut cy = 0f64;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % n];
        let cross = f64::from(p.x) * f64::from(q.y) - f64::from(q.x) * f64::from(p.y);
        twice_area += cross;
        cx += (f64::from(p.x) + f64::from(q.x)) * cross;
        cy += (f64::from(p.y) + f64::from(q.y)) * cross;
    }
    if twice_area == 0.0 {
        return (0, 0);
    }
    let scale = 1.0 / (3.0 * twice_area);
    ((cx * scale) as i64, (cy * scale) as i64)
}
