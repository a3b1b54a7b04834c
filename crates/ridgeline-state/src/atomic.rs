//! Transactional temp-then-rename writes shared by every persisted store
//! in this crate: every persisted write lands via a temp file and an
//! atomic rename, so a crash mid-write never leaves a torn file behind.

use std::path::Path;

use ridgeline_core::{Error, Result};

/// Write `bytes` to `path` atomically: write to a sibling temp file, `fsync`
/// it, then rename over the destination. The parent directory is created if
/// missing.
pub fn write_atomically(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = path.parent().ok_or_else(|| Error::ConfigStore(format!("no parent directory for {}", path.display())))?;
    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::io(parent, e))?;
    use std::io::Write;
    tmp.write_all(bytes).map_err(|e| Error::io(path, e))?;
    tmp.as_file().sync_all().map_err(|e| Error::io(path, e))?;
    tmp.persist(path)
        .map_err(|e| Error::ConfigStore(format!("failed to persist {}: {}", path.display(), e.error)))?;
    Ok(())
}
