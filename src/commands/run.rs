use crate::core::wrapper::BinWrapper;
use crate::error::{BinwrapError, Result};
use std::io::Write;
use std::path::Path;

/// Where the wrapped binary reads its stdin from.
pub enum StdinSource<'a> {
    None,
    Inherit,
    File(&'a Path),
}

/// Acquire and run the binary described by a manifest.
///
/// Stdout is streamed to ours; captured stderr is replayed once the process
/// exits, including when it fails.
pub fn run_binary(
    manifest_path: &Path,
    dest: Option<&Path>,
    stdin: StdinSource<'_>,
    args: &[String],
) -> Result<()> {
    let (manifest, config) = super::load_config(manifest_path, dest)?;
    let mut wrapper = BinWrapper::new(config);

    for arg in &manifest.wrapper.args {
        wrapper.arg(arg.as_str(), &[]);
    }
    if let Some(env) = &manifest.wrapper.env {
        wrapper.env(env.iter().cloned());
    }

    match stdin {
        StdinSource::None => {}
        StdinSource::Inherit => {
            wrapper.stdin(std::io::stdin());
        }
        StdinSource::File(path) => {
            let file =
                std::fs::File::open(path).map_err(|e| BinwrapError::at_path(path, e))?;
            wrapper.stdin(file);
        }
    }

    wrapper.stdout(std::io::stdout());

    let result = wrapper.run(args);

    let mut stderr = std::io::stderr();
    stderr.write_all(wrapper.captured_stderr())?;
    stderr.flush()?;

    result
}
