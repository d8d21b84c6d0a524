use image::{ImageError, ImageFormat, RgbImage};
use std::io::Cursor;

/// Decode image bytes into an owned 3-channel buffer.
///
/// Callers map a failure here to `PipelineError::UnreadableImage` at
/// the file granularity.
pub fn decode_rgb(bytes: &[u8]) -> Result<RgbImage, ImageError> {
    Ok(image::load_from_memory(bytes)?.to_rgb8())
}

/// Encode a canvas as PNG bytes for archival.
pub fn encode_png(img: &RgbImage) -> Result<Vec<u8>, ImageError> {
    let mut png_bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut png_bytes), ImageFormat::Png)?;
    Ok(png_bytes)
}
