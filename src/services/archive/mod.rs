// Batch archive packing
//
// Bundles the aligned outputs of one batch into a single in-memory
// deflate-compressed zip, ready for upload.

use crate::core::errors::ArchiveError;
use crate::core::types::AlignedOutput;
use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack the given outputs into one zip file, entry per output.
pub fn pack(outputs: &[AlignedOutput]) -> Result<Vec<u8>, ArchiveError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for output in outputs {
        writer.start_file(output.entry_name.as_str(), options)?;
        writer.write_all(&output.png)?;
    }

    Ok(writer.finish()?.into_inner())
}
