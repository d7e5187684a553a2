use crate::core::config::Source;
use crate::core::platform::{self, Platform};
use crate::error::{BinwrapError, Result};
use std::path::{Path, PathBuf};

/// Print where the executable lives (or would live) on this platform.
pub fn print_path(manifest_path: &Path, dest: Option<&Path>) -> Result<PathBuf> {
    let (_, config) = super::load_config(manifest_path, dest)?;
    let path = platform::resolve_path(&config, &Platform::current());
    println!("{}", path.display());
    Ok(path)
}

/// Show which source would be used for a platform, defaulting to this one.
pub fn select_source(
    manifest_path: &Path,
    os: Option<&str>,
    arch: Option<&str>,
) -> Result<Source> {
    let (manifest, config) = super::load_config(manifest_path, None)?;
    let current = Platform::current();
    let target = Platform::new(
        os.unwrap_or(current.os.as_str()),
        arch.unwrap_or(current.arch.as_str()),
    );

    let source = platform::select_source(&config.sources, &target)
        .cloned()
        .ok_or_else(|| BinwrapError::NoMatchingSource {
            os: target.os.clone(),
            arch: target.arch.clone(),
        })?;

    println!("{} on {target}:", manifest.name());
    println!("   url:       {}", source.url);
    println!(
        "   exec path: {}",
        platform::exec_path_for(&config, &target)
    );

    Ok(source)
}
