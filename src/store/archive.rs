//! In-memory zip assembly for the bulk download
//!
//! Runs on a blocking thread. The buffer is owned by the writer until
//! `finish`, so an early return drops it along with everything written so far.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Cursor, ErrorKind};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ImageError;

/// Build a deflate-compressed archive of the named files in `dir`
///
/// Entries are named by the bare filename, converted lossily when it is not
/// UTF-8. Names that are not regular files (directories, or files removed
/// since the listing) are skipped.
pub fn build_zip(dir: &Path, names: &[OsString]) -> Result<Vec<u8>, ImageError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(false);

    for name in names {
        let mut file = match File::open(dir.join(name)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => continue,
            Err(e) => return Err(e.into()),
        };
        if !file.metadata()?.is_file() {
            continue;
        }

        writer.start_file(name.to_string_lossy(), options)?;
        io::copy(&mut file, &mut writer)?;
    }

    Ok(writer.finish()?.into_inner())
}
