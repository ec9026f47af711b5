use std::fs::{File, create_dir_all};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use uuid::Uuid;

use super::{RegistryError, RegistryResult};

/// Serialize `value` as pretty JSON straight into `path`, atomically.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> RegistryResult<()> {
    write_atomic(path, |writer| {
        serde_json::to_writer_pretty(&mut *writer, value)?;
        writer.write_all(b"\n")?;
        Ok(())
    })
}

pub fn write_bytes_atomic(path: &Path, data: &[u8]) -> RegistryResult<()> {
    write_atomic(path, |writer| Ok(writer.write_all(data)?))
}

/// Stream `fill` into a hidden sibling of `path`, then rename it into place.
///
/// Readers see either the previous file or the complete new one. The
/// sibling is removed when `fill` or any filesystem step fails.
pub fn write_atomic<F>(path: &Path, fill: F) -> RegistryResult<()>
where
    F: FnOnce(&mut dyn Write) -> RegistryResult<()>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => Some(parent),
        _ => None,
    };
    if let Some(dir) = dir {
        create_dir_all(dir)?;
    }

    let staging = staging_path(path)?;
    let result = stage(&staging, fill).and_then(|()| Ok(std::fs::rename(&staging, path)?));
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
        return result;
    }

    if let Some(dir) = dir {
        sync_dir(dir)?;
    }
    Ok(())
}

fn stage<F>(staging: &Path, fill: F) -> RegistryResult<()>
where
    F: FnOnce(&mut dyn Write) -> RegistryResult<()>,
{
    let mut writer = BufWriter::new(File::create_new(staging)?);
    fill(&mut writer)?;
    let file = writer
        .into_inner()
        .map_err(|err| RegistryError::Io(err.into_error()))?;
    file.sync_all()?;
    Ok(())
}

/// `dir/.name.<uuid>.tmp`, unique per write so concurrent writers never
/// share a staging file.
fn staging_path(path: &Path) -> RegistryResult<PathBuf> {
    let name = path
        .file_name()
        .ok_or_else(|| RegistryError::InvalidPath(format!("{} has no file name", path.display())))?;
    Ok(path.with_file_name(format!(
        ".{}.{}.tmp",
        name.to_string_lossy(),
        Uuid::new_v4().simple()
    )))
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> std::io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}
