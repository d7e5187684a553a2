//! Archive unpacking with path-traversal checks.
//!
//! Format is chosen from the file name: `.zip`, or `.tar.gz` / `.tgz`.
//! The archive file is removed once extraction finishes, whether it
//! succeeded or not.

use crate::error::{BinwrapError, Result};
use crate::utils::fs;
use flate2::read::GzDecoder;
use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tar::{Archive, EntryType};
use zip::ZipArchive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarGz,
}

impl ArchiveFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?;

        if file_name.ends_with(".zip") {
            Some(ArchiveFormat::Zip)
        } else if file_name.ends_with(".tar.gz") || file_name.ends_with(".tgz") {
            Some(ArchiveFormat::TarGz)
        } else {
            None
        }
    }
}

/// Removes the wrapped file when dropped.
struct RemoveOnDrop(PathBuf);

impl Drop for RemoveOnDrop {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.0) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %self.0.display(), error = %e, "failed to remove archive");
            }
        }
    }
}

/// Unpack `archive_path` into `destination` and delete the archive.
pub fn extract_archive(archive_path: &Path, destination: &Path) -> Result<()> {
    let _cleanup = RemoveOnDrop(archive_path.to_path_buf());

    let format = ArchiveFormat::from_path(archive_path).ok_or_else(|| {
        BinwrapError::UnsupportedArchive {
            path: archive_path.to_path_buf(),
        }
    })?;

    tracing::info!(
        archive = %archive_path.display(),
        destination = %destination.display(),
        ?format,
        "extracting"
    );

    fs::ensure_dir_exists(destination)?;

    let result = match format {
        ArchiveFormat::Zip => extract_zip(archive_path, destination),
        ArchiveFormat::TarGz => extract_tar_gz(archive_path, destination),
    };

    if let Err(e) = &result {
        tracing::warn!(archive = %archive_path.display(), error = %e, "not a valid {format:?} archive");
    }

    result
}

fn extract_tar_gz(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| BinwrapError::at_path(archive_path, e))?;
    let mut archive = Archive::new(GzDecoder::new(file));
    let corrupt = |source: io::Error| BinwrapError::Extraction {
        path: archive_path.to_path_buf(),
        source,
    };

    for entry in archive.entries().map_err(corrupt)? {
        let mut entry = entry.map_err(corrupt)?;
        let name = entry.path().map_err(corrupt)?.to_string_lossy().into_owned();

        let Some(target) = fs::join_within(destination, &name)? else {
            continue;
        };

        let entry_type = entry.header().entry_type();
        match entry_type {
            EntryType::Directory => fs::ensure_dir_exists(&target)?,
            EntryType::Regular | EntryType::Continuous => {
                let mode = entry.header().mode().map_err(corrupt)?;
                write_entry(&mut entry, &target, mode)?;
            }
            other => {
                tracing::debug!(entry = %name, kind = ?other, "skipping unsupported tar entry");
            }
        }
    }

    Ok(())
}

fn extract_zip(archive_path: &Path, destination: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| BinwrapError::at_path(archive_path, e))?;
    let mut archive = ZipArchive::new(file)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let name = file.name().to_string();

        let Some(target) = fs::join_within(destination, &name)? else {
            continue;
        };

        if file.is_dir() {
            fs::ensure_dir_exists(&target)?;
            continue;
        }

        let mode = file.unix_mode().unwrap_or(0o644);
        write_entry(&mut file, &target, mode)?;
    }

    Ok(())
}

fn write_entry<R: io::Read>(reader: &mut R, target: &Path, mode: u32) -> Result<()> {
    if let Some(parent) = target.parent() {
        fs::ensure_dir_exists(parent)?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(mode & 0o7777);
    }

    let mut out = options
        .open(target)
        .map_err(|e| BinwrapError::at_path(target, e))?;
    io::copy(reader, &mut out).map_err(|e| BinwrapError::at_path(target, e))?;
    drop(out);

    // open() only applies the mode to new files
    fs::set_mode(target, mode)
}
