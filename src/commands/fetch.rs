use crate::core::acquire::Acquisition;
use crate::core::wrapper::BinWrapper;
use crate::error::Result;
use std::path::Path;

/// Make sure the binary is on disk without running it.
pub fn fetch_binary(manifest_path: &Path, dest: Option<&Path>) -> Result<Acquisition> {
    let (manifest, config) = super::load_config(manifest_path, dest)?;
    let mut wrapper = BinWrapper::new(config);

    let acquisition = wrapper.acquire()?;
    let path = acquisition.path().display();

    match &acquisition {
        Acquisition::Installed(_) => println!("✅ Installed {} at {path}", manifest.name()),
        Acquisition::AlreadyPresent(_) => {
            println!("✓ {} already present at {path}", manifest.name())
        }
        Acquisition::Skipped(_) => println!("Download skipped, expecting {path}"),
    }

    Ok(acquisition)
}
