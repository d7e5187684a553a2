use crate::core::archive;
use crate::core::config::WrapperConfig;
use crate::core::download::Downloader;
use crate::core::platform::{self, Platform};
use crate::core::strip;
use crate::error::{BinwrapError, Result};
use crate::utils::fs;
use std::io;
use std::path::{Path, PathBuf};

/// What acquisition did to make the executable available.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// Downloads are disabled or there is nothing to download.
    Skipped(PathBuf),
    /// The executable was already on disk; no network access happened.
    AlreadyPresent(PathBuf),
    /// The executable was downloaded and installed.
    Installed(PathBuf),
}

impl Acquisition {
    pub fn path(&self) -> &Path {
        match self {
            Acquisition::Skipped(path)
            | Acquisition::AlreadyPresent(path)
            | Acquisition::Installed(path) => path,
        }
    }
}

/// Make sure the executable described by `config` exists on disk.
///
/// The downloader is only constructed when a download is actually needed.
pub fn ensure_installed<F>(
    config: &WrapperConfig,
    platform: &Platform,
    downloader: F,
) -> Result<Acquisition>
where
    F: FnOnce() -> Result<Downloader>,
{
    if config.skip_download || config.sources.is_empty() {
        return Ok(Acquisition::Skipped(platform::resolve_path(config, platform)));
    }

    let source = platform::select_source(&config.sources, platform).ok_or_else(|| {
        BinwrapError::NoMatchingSource {
            os: platform.os.clone(),
            arch: platform.arch.clone(),
        }
    })?;
    let target = platform::resolve_path(config, platform);

    match std::fs::metadata(&target) {
        Ok(_) => {
            tracing::debug!(path = %target.display(), "already present");
            return Ok(Acquisition::AlreadyPresent(target));
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(BinwrapError::at_path(&target, e)),
    }

    if source.url.is_empty() {
        tracing::debug!(path = %target.display(), "source has no url, nothing to download");
        return Ok(Acquisition::Skipped(target));
    }

    tracing::info!(path = %target.display(), "not found, downloading");

    let dest = config.dest_dir();
    let fetched = downloader()?.fetch(&source.url, dest)?;

    if config.skip_extract {
        install_file(&fetched, &target)?;
        tracing::info!(path = %target.display(), "executable ready");
    } else {
        tracing::info!(path = %fetched.display(), "downloaded, extracting");
        archive::extract_archive(&fetched, dest)?;
        strip::strip_dirs(dest, config.strip)?;

        if !target.exists() {
            tracing::warn!(path = %target.display(), "archive did not contain the executable");
        }
    }

    Ok(Acquisition::Installed(target))
}

/// Move a downloaded file into place and mark it executable.
fn install_file(fetched: &Path, target: &Path) -> Result<()> {
    if fetched == target {
        return fs::make_executable(target);
    }

    if let Some(parent) = target.parent() {
        if let Err(e) = fs::ensure_dir_exists(parent) {
            let _ = std::fs::remove_file(fetched);
            return Err(e);
        }
    }

    if let Err(e) = std::fs::rename(fetched, target) {
        let _ = std::fs::remove_file(fetched);
        return Err(BinwrapError::at_path(target, e));
    }

    fs::make_executable(target)
}
