//! Shared helpers for on-disk targets.

use std::io::Write;
use tempfile::NamedTempFile;

/// Creates a temporary file with the given content.
///
/// The file is removed when the returned handle is dropped.
pub fn create_temp_file(content: &[u8]) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content).unwrap();
    temp_file.flush().unwrap();
    temp_file
}
