//! I/O helpers shared by the header, record and table layers.

use std::io::{ErrorKind, Read};

use crate::error::DbfError;

/// Classifies I/O errors into specific DbfError variants.
pub fn classify_io_error(error: std::io::Error, context: &str) -> DbfError {
    match error.kind() {
        ErrorKind::PermissionDenied | ErrorKind::ReadOnlyFilesystem => DbfError::StreamNotWritable,
        _ => DbfError::IoError(format!("{}: {}", context, error)),
    }
}

/// Reads until `buf` is full or the reader is exhausted.
///
/// # Returns
/// Number of bytes actually read, which is less than `buf.len()` only at end of stream.
pub fn read_up_to<R: Read + ?Sized>(
    reader: &mut R,
    buf: &mut [u8],
    context: &str,
) -> Result<usize, DbfError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_io_error(e, context)),
        }
    }
    Ok(filled)
}
