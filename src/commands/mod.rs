pub mod fetch;
pub mod inspect;
pub mod run;

use crate::core::config::WrapperConfig;
use crate::core::manifest::WrapperManifest;
use crate::error::Result;
use std::path::Path;

/// Load a manifest and build its config, applying a `--dest` override.
pub fn load_config(
    manifest_path: &Path,
    dest: Option<&Path>,
) -> Result<(WrapperManifest, WrapperConfig)> {
    let manifest = WrapperManifest::load(manifest_path)?;
    let base_dir = manifest_path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut config = manifest.to_config(base_dir);
    if let Some(dest) = dest {
        config = config.dest(dest);
    }

    tracing::debug!(
        manifest = %manifest_path.display(),
        name = %manifest.name(),
        dest = %config.dest_dir().display(),
        "loaded manifest"
    );

    Ok((manifest, config))
}
