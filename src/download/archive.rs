//! The Archive Expander (spec §4.7): detects and recursively expands
//! zip/gzip-tar/bzip2-tar archives into a scoped temporary directory,
//! guarding against path escapes and decompression bombs.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;
use zip::ZipArchive;

use crate::errors::ExtentError;

/// Ancillary sidecar extensions an extractor keeps alongside the file they
/// accompany, without independently probing them (spec §4.7: `.ovr`,
/// `.aux.xml`, `.msk` ride along with their primary raster/vector file).
pub const ANCILLARY_EXTENSIONS: &[&str] = &["ovr", "aux.xml", "msk"];

/// The kind of archive detected from magic bytes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ArchiveKind {
    Zip,
    GzipTar,
    Bzip2Tar,
}

fn detect_archive_kind(path: &Path) -> std::io::Result<Option<ArchiveKind>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    if read < 2 {
        return Ok(None);
    }
    if &magic[0..2] == b"PK" {
        return Ok(Some(ArchiveKind::Zip));
    }
    if read >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
        return Ok(Some(ArchiveKind::GzipTar));
    }
    if read >= 3 && &magic[0..3] == b"BZh" {
        return Ok(Some(ArchiveKind::Bzip2Tar));
    }
    Ok(None)
}

/// True if `path`'s contents look like an archive this expander
/// understands.
pub fn is_archive(path: &Path) -> bool {
    matches!(detect_archive_kind(path), Ok(Some(_)))
}

/// Expand the archive at `path` into `dest_dir`, recursively expanding any
/// archives found inside (spec §4.7: "Archives may nest; expansion recurses
/// until no further archives are found"). `compressed_size` is the
/// archive's size on disk, used to compute the decompression-bomb ratio
/// guard.
///
/// Returns the list of regular (non-archive) file paths found, after full
/// recursive expansion.
pub fn expand(
    path: &Path,
    dest_dir: &Path,
    compressed_size: u64,
    max_expansion_ratio: u64,
) -> Result<Vec<PathBuf>, ExtentError> {
    let kind = detect_archive_kind(path)
        .map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not read archive header: {err}"),
        })?
        .ok_or_else(|| ExtentError::ArchiveUnsafe {
            reason: "not a recognized archive format".to_owned(),
        })?;

    std::fs::create_dir_all(dest_dir).map_err(|err| ExtentError::ArchiveUnsafe {
        reason: format!("could not create expansion directory: {err}"),
    })?;

    let max_expanded_bytes = compressed_size.saturating_mul(max_expansion_ratio);
    let mut expanded_bytes: u64 = 0;

    let entries = match kind {
        ArchiveKind::Zip => expand_zip(path, dest_dir, max_expanded_bytes, &mut expanded_bytes)?,
        ArchiveKind::GzipTar => {
            let file = File::open(path).map_err(|err| ExtentError::ArchiveUnsafe {
                reason: format!("could not open archive: {err}"),
            })?;
            expand_tar(
                Archive::new(GzDecoder::new(file)),
                dest_dir,
                max_expanded_bytes,
                &mut expanded_bytes,
            )?
        }
        ArchiveKind::Bzip2Tar => {
            let file = File::open(path).map_err(|err| ExtentError::ArchiveUnsafe {
                reason: format!("could not open archive: {err}"),
            })?;
            expand_tar(
                Archive::new(BzDecoder::new(file)),
                dest_dir,
                max_expanded_bytes,
                &mut expanded_bytes,
            )?
        }
    };

    // Recurse into any nested archives we just expanded.
    let mut results = Vec::new();
    for entry in entries {
        if is_archive(&entry) {
            let nested_dest = entry.with_extension("expanded");
            let nested_size = std::fs::metadata(&entry)
                .map(|m| m.len())
                .unwrap_or(0);
            let mut nested = expand(&entry, &nested_dest, nested_size, max_expansion_ratio)?;
            results.append(&mut nested);
        } else {
            results.push(entry);
        }
    }
    Ok(results)
}

/// Reject a tar/zip entry name that would escape `dest_dir` via `..` or an
/// absolute path.
fn safe_join(dest_dir: &Path, entry_name: &str) -> Result<PathBuf, ExtentError> {
    let entry_path = Path::new(entry_name);
    if entry_path.is_absolute() || entry_path.components().any(|c| c == std::path::Component::ParentDir) {
        return Err(ExtentError::ArchiveUnsafe {
            reason: format!("archive entry escapes destination directory: {entry_name:?}"),
        });
    }
    Ok(dest_dir.join(entry_path))
}

fn expand_zip(
    path: &Path,
    dest_dir: &Path,
    max_expanded_bytes: u64,
    expanded_bytes: &mut u64,
) -> Result<Vec<PathBuf>, ExtentError> {
    let file = File::open(path).map_err(|err| ExtentError::ArchiveUnsafe {
        reason: format!("could not open archive: {err}"),
    })?;
    let mut archive = ZipArchive::new(file).map_err(|err| ExtentError::ArchiveUnsafe {
        reason: format!("could not read zip central directory: {err}"),
    })?;

    let mut out = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not read zip entry {i}: {err}"),
        })?;
        if !entry.is_file() {
            continue;
        }
        let dest_path = safe_join(dest_dir, entry.name())?;
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ExtentError::ArchiveUnsafe {
                reason: format!("could not create directory {parent:?}: {err}"),
            })?;
        }
        *expanded_bytes += entry.size();
        if *expanded_bytes > max_expanded_bytes {
            return Err(ExtentError::ArchiveUnsafe {
                reason: format!(
                    "archive expands past {max_expanded_bytes} bytes, likely a decompression bomb"
                ),
            });
        }
        let mut out_file = File::create(&dest_path).map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not create {dest_path:?}: {err}"),
        })?;
        std::io::copy(&mut entry, &mut out_file).map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not write {dest_path:?}: {err}"),
        })?;
        debug!(entry = %entry.name(), "expanded zip entry");
        out.push(dest_path);
    }
    Ok(out)
}

fn expand_tar<R: Read>(
    mut archive: Archive<R>,
    dest_dir: &Path,
    max_expanded_bytes: u64,
    expanded_bytes: &mut u64,
) -> Result<Vec<PathBuf>, ExtentError> {
    let mut out = Vec::new();
    let entries = archive.entries().map_err(|err| ExtentError::ArchiveUnsafe {
        reason: format!("could not read tar entries: {err}"),
    })?;
    for entry_result in entries {
        let mut entry = entry_result.map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not read tar entry: {err}"),
        })?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .map_err(|err| ExtentError::ArchiveUnsafe {
                reason: format!("invalid tar entry path: {err}"),
            })?
            .to_string_lossy()
            .into_owned();
        let dest_path = safe_join(dest_dir, &name)?;
        if let Some(parent) = dest_path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| ExtentError::ArchiveUnsafe {
                reason: format!("could not create directory {parent:?}: {err}"),
            })?;
        }
        *expanded_bytes += entry.header().size().unwrap_or(0);
        if *expanded_bytes > max_expanded_bytes {
            return Err(ExtentError::ArchiveUnsafe {
                reason: format!(
                    "archive expands past {max_expanded_bytes} bytes, likely a decompression bomb"
                ),
            });
        }
        let mut out_file = File::create(&dest_path).map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not create {dest_path:?}: {err}"),
        })?;
        std::io::copy(&mut entry, &mut out_file).map_err(|err| ExtentError::ArchiveUnsafe {
            reason: format!("could not write {dest_path:?}: {err}"),
        })?;
        out.push(dest_path);
    }
    Ok(out)
}

/// True if `name` is an ancillary sidecar file that should ride along with
/// its primary file rather than being probed independently.
pub fn is_ancillary(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    ANCILLARY_EXTENSIONS
        .iter()
        .any(|ext| lower.ends_with(&format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_parent_dir_escape() {
        let dest = Path::new("/tmp/geoextent-test-dest");
        let result = safe_join(dest, "../../etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_absolute_entry_path() {
        let dest = Path::new("/tmp/geoextent-test-dest");
        let result = safe_join(dest, "/etc/passwd");
        assert!(result.is_err());
    }

    #[test]
    fn accepts_ordinary_relative_entry() {
        let dest = Path::new("/tmp/geoextent-test-dest");
        let result = safe_join(dest, "data/sample.shp").unwrap();
        assert_eq!(result, dest.join("data/sample.shp"));
    }

    #[test]
    fn recognizes_ancillary_sidecar_extensions() {
        assert!(is_ancillary("raster.tif.ovr"));
        assert!(is_ancillary("layer.shp.aux.xml"));
        assert!(!is_ancillary("layer.shp"));
    }

    #[test]
    fn unrecognized_bytes_are_not_an_archive() {
        let tmp = std::env::temp_dir().join("geoextent-not-an-archive.bin");
        std::fs::write(&tmp, b"not an archive").unwrap();
        assert!(!is_archive(&tmp));
        let _ = std::fs::remove_file(&tmp);
    }
}
