//! Artifact unarchiving for the component store.
//!
//! A recipe artifact declares an [`ridgeline_core::UnarchivePolicy`]; when it
//! is anything other than `None` the store extracts the downloaded file into
//! `artifacts-decompressed/<name>/<version>/` before the component is
//! considered installed. Only the two archive shapes the data model names
//! (`Zip`, `Tar`, the latter covering plain and gzip-compressed tarballs) are
//! supported — there is no plugin point for additional formats.

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use ridgeline_core::{Error, Result};
use tracing::{debug, warn};

/// Extract `archive` into `dest` according to `policy`.
///
/// `dest` is created if missing. Extraction is all-or-nothing: on any
/// member failing to extract the partially-written destination is left in
/// place for the caller to clean up (the component store always extracts
/// into a temporary directory and renames it into place, so a failed
/// extraction never corrupts an already-installed version).
pub fn unarchive(
    archive: &Path,
    dest: &Path,
    policy: ridgeline_core::UnarchivePolicy,
) -> Result<()> {
    use ridgeline_core::UnarchivePolicy as P;
    match policy {
        P::None => Ok(()),
        P::Zip => unarchive_zip(archive, dest),
        P::Tar => unarchive_tar(archive, dest),
    }
}

fn unarchive_zip(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| Error::Archive(format!("invalid zip archive: {e}")))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| Error::Archive(format!("zip entry {i}: {e}")))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!(index = i, "skipping zip entry with unsafe path");
            continue;
        };
        let out_path = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&out_path).map_err(|e| Error::io(&out_path, e))?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        let mut out = File::create(&out_path).map_err(|e| Error::io(&out_path, e))?;
        io::copy(&mut entry, &mut out).map_err(|e| Error::io(&out_path, e))?;
        apply_unix_mode(&entry, &out_path);
    }
    debug!(archive = %archive.display(), dest = %dest.display(), "unarchived zip");
    Ok(())
}

#[cfg(unix)]
fn apply_unix_mode(entry: &zip::read::ZipFile<'_, File>, out_path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Some(mode) = entry.unix_mode() {
        let _ = fs::set_permissions(out_path, fs::Permissions::from_mode(mode));
    }
}

#[cfg(not(unix))]
fn apply_unix_mode(_entry: &zip::read::ZipFile<'_, File>, _out_path: &Path) {}

fn unarchive_tar(archive: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest).map_err(|e| Error::io(dest, e))?;
    let file = File::open(archive).map_err(|e| Error::io(archive, e))?;
    let reader: Box<dyn Read> = if looks_gzipped(archive) {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    };
    let mut archive = tar::Archive::new(reader);
    archive
        .unpack(dest)
        .map_err(|e| Error::Archive(format!("tar extraction failed: {e}")))?;
    debug!(dest = %dest.display(), "unarchived tar");
    Ok(())
}

/// Tarball compression is determined by file extension rather than sniffing
/// magic bytes: artifact URIs in a recipe always carry the real extension
/// and the digest check already guards against a tampered body.
fn looks_gzipped(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let lower = name.to_ascii_lowercase();
    lower.ends_with(".tgz") || lower.ends_with(".tar.gz") || lower.ends_with(".gz")
}

/// Recursively delete `path` if it exists, tolerating a missing path.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

/// Total size in bytes of every regular file under `root`, used by the
/// store to report disk usage without a full walk at the call site.
pub fn dir_size(root: &Path) -> Result<u64> {
    let mut total = 0u64;
    for entry in walkdir::WalkDir::new(root) {
        let entry = entry.map_err(|e| Error::Archive(e.to_string()))?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(|e| Error::Archive(e.to_string()))?.len();
        }
    }
    Ok(total)
}

/// Build the path an artifact is decompressed into:
/// `<store>/artifacts-decompressed/<name>/<version>/`.
#[must_use]
pub fn decompressed_path(artifacts_decompressed_root: &Path, name: &str, version: &str) -> PathBuf {
    artifacts_decompressed_root.join(name).join(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn zip_roundtrip_extracts_files() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("bundle.zip");
        {
            let file = File::create(&archive_path).unwrap();
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file::<_, ()>("hello.txt", zip::write::FileOptions::default())
                .unwrap();
            writer.write_all(b"hi").unwrap();
            writer.finish().unwrap();
        }

        let dest = dir.path().join("out");
        unarchive(&archive_path, &dest, ridgeline_core::UnarchivePolicy::Zip).unwrap();
        let content = fs::read_to_string(dest.join("hello.txt")).unwrap();
        assert_eq!(content, "hi");
    }

    #[test]
    fn tar_gz_roundtrip_extracts_files() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("bundle.tar.gz");
        {
            let file = File::create(&archive_path).unwrap();
            let enc = flate2::write::GzEncoder::new(file, flate2::Compression::default());
            let mut builder = tar::Builder::new(enc);
            let data = b"payload";
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "file.bin", &data[..]).unwrap();
            builder.into_inner().unwrap().finish().unwrap();
        }

        let dest = dir.path().join("out");
        unarchive(&archive_path, &dest, ridgeline_core::UnarchivePolicy::Tar).unwrap();
        let content = fs::read(dest.join("file.bin")).unwrap();
        assert_eq!(content, b"payload");
    }

    #[test]
    fn none_policy_is_a_no_op() {
        let dir = tempdir().unwrap();
        let archive_path = dir.path().join("whatever");
        fs::write(&archive_path, b"x").unwrap();
        let dest = dir.path().join("out");
        unarchive(&archive_path, &dest, ridgeline_core::UnarchivePolicy::None).unwrap();
        assert!(!dest.exists());
    }

    #[test]
    fn remove_dir_if_exists_tolerates_missing() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(remove_dir_if_exists(&missing).is_ok());
    }
}
