use crate::core::config::{Source, WrapperConfig};
use std::path::{PathBuf, MAIN_SEPARATOR};

/// Operating system and CPU architecture pair used to pick a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: String,
    pub arch: String,
}

impl Platform {
    pub fn new<S: Into<String>, T: Into<String>>(os: S, arch: T) -> Self {
        Self {
            os: os.into(),
            arch: arch.into(),
        }
    }

    /// The platform this process was compiled for.
    pub fn current() -> Self {
        Self::new(std::env::consts::OS, std::env::consts::ARCH)
    }

    pub fn is_windows(&self) -> bool {
        self.os == "windows"
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::current()
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.os, self.arch)
    }
}

fn field_matches(field: &Option<String>, value: &str) -> bool {
    match field.as_deref() {
        None | Some("") => true,
        Some(expected) => expected == value,
    }
}

/// First source whose os and arch are unset or equal to the platform's.
pub fn select_source<'a>(sources: &'a [Source], platform: &Platform) -> Option<&'a Source> {
    sources.iter().find(|source| {
        field_matches(&source.os, &platform.os) && field_matches(&source.arch, &platform.arch)
    })
}

/// Appends `.exe` for Windows targets unless the path already carries it.
pub fn with_exe_extension(exec_path: &str, platform: &Platform) -> String {
    if !platform.is_windows() {
        return exec_path.to_string();
    }

    let has_exe = std::path::Path::new(exec_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("exe"))
        .unwrap_or(false);

    if has_exe {
        exec_path.to_string()
    } else {
        format!("{exec_path}.exe")
    }
}

/// The source acquisition and path resolution work from, if any.
pub fn active_source<'a>(config: &'a WrapperConfig, platform: &Platform) -> Option<&'a Source> {
    if config.skip_download {
        return None;
    }
    select_source(&config.sources, platform)
}

/// Executable path relative to the destination directory, after applying the
/// active source's override and the Windows extension rule.
pub fn exec_path_for(config: &WrapperConfig, platform: &Platform) -> String {
    let exec_path = active_source(config, platform)
        .and_then(|source| source.exec_path.as_deref())
        .filter(|path| !path.is_empty())
        .unwrap_or(config.exec_path.as_str());

    if config.auto_exe {
        with_exe_extension(exec_path, platform)
    } else {
        exec_path.to_string()
    }
}

/// Full path of the executable.
///
/// A destination of exactly `.` keeps the `./name` form so the result is
/// never looked up on `PATH`.
pub fn resolve_path(config: &WrapperConfig, platform: &Platform) -> PathBuf {
    let exec_path = exec_path_for(config, platform);
    let dest = config.dest_dir();

    if dest.as_os_str() == "." {
        return PathBuf::from(format!(".{MAIN_SEPARATOR}{exec_path}"));
    }

    dest.join(exec_path)
}
