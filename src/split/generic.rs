use std::fs::{File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

use tracing::{debug, info};

use crate::error::SplitError;

use super::{generic_part_path, remove_part_file, PartFile, PartSet};

/// Read/write buffer for copying part data.
const COPY_BUFFER_SIZE: usize = 1024 * 1024;

/// Split a file into raw byte parts of `part_size` bytes.
///
/// The last part holds the remainder. A zero-byte source yields no parts.
/// On any error every part created by this call is removed.
pub fn split_generic(source: &Path, part_size: u64) -> Result<Vec<PartFile>, SplitError> {
    if part_size == 0 {
        return Err(SplitError::InvalidPartSize);
    }

    let file = File::open(source)?;
    let total_size = file.metadata()?.len();

    if total_size == 0 {
        info!("Source file {} is empty, no parts created", source.display());
        return Ok(Vec::new());
    }

    let mut reader = BufReader::with_capacity(COPY_BUFFER_SIZE, file);
    let mut parts = PartSet::new();
    let mut written_total = 0u64;
    let mut index = 1;

    while written_total < total_size {
        let part_path = generic_part_path(source, index);

        let part_file = match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
        {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SplitError::PartExists(part_path.display().to_string()));
            }
            Err(e) => {
                return Err(SplitError::PartIo {
                    path: part_path.display().to_string(),
                    source: e,
                });
            }
        };

        let written = match write_part(&mut reader, part_file, part_size) {
            Ok(n) => n,
            Err(e) => {
                remove_part_file(&part_path);
                return Err(SplitError::PartIo {
                    path: part_path.display().to_string(),
                    source: e,
                });
            }
        };

        if written == 0 {
            // Source ended early; never keep an empty trailing part
            remove_part_file(&part_path);
            break;
        }

        debug!(
            "Wrote part {} ({} bytes) to {}",
            index,
            written,
            part_path.display()
        );

        parts.push(PartFile {
            index,
            path: part_path,
            size: written,
            duration: None,
        });
        written_total += written;
        index += 1;
    }

    if written_total != total_size {
        return Err(SplitError::Truncated {
            path: source.display().to_string(),
            expected: total_size,
            written: written_total,
        });
    }

    info!("Successfully created {} generic parts", parts.len());
    Ok(parts.into_parts())
}

/// Copy up to `limit` bytes into `file`, flushing and syncing it.
fn write_part<R: Read>(reader: &mut R, file: File, limit: u64) -> io::Result<u64> {
    let mut writer = BufWriter::with_capacity(COPY_BUFFER_SIZE, file);
    let written = io::copy(&mut reader.by_ref().take(limit), &mut writer)?;
    writer.flush()?;
    writer.into_inner().map_err(|e| e.into_error())?.sync_all()?;
    Ok(written)
}
