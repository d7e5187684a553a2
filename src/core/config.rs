use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// One candidate origin for the wrapped binary.
///
/// An empty `os` or `arch` matches any platform. An empty `url` means the
/// binary is expected to already be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub arch: Option<String>,
    #[serde(default)]
    pub exec_path: Option<String>,
}

impl Source {
    pub fn new<S: Into<String>>(url: S) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    /// Tie the source to an OS name as reported by `std::env::consts::OS`.
    pub fn os<S: Into<String>>(mut self, os: S) -> Self {
        self.os = Some(os.into());
        self
    }

    /// Tie the source to an architecture as reported by `std::env::consts::ARCH`.
    pub fn arch<S: Into<String>>(mut self, arch: S) -> Self {
        self.arch = Some(arch.into());
        self
    }

    /// Use a different file inside the installed tree as the executable.
    pub fn exec_path<S: Into<String>>(mut self, exec_path: S) -> Self {
        self.exec_path = Some(exec_path.into());
        self
    }
}

/// Everything needed to acquire the binary and locate it on disk.
#[derive(Debug, Clone, Default)]
pub struct WrapperConfig {
    pub sources: Vec<Source>,
    pub dest: Option<PathBuf>,
    pub exec_path: String,
    pub strip: usize,
    pub skip_download: bool,
    pub skip_extract: bool,
    pub auto_exe: bool,
    pub debug: bool,
    pub timeout: Option<Duration>,
}

impl WrapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn source(mut self, source: Source) -> Self {
        self.sources.push(source);
        self
    }

    /// Directory the binary is downloaded and unpacked into.
    pub fn dest<P: Into<PathBuf>>(mut self, dest: P) -> Self {
        self.dest = Some(dest.into());
        self
    }

    /// Path of the executable relative to `dest`.
    pub fn exec_path<S: Into<String>>(mut self, exec_path: S) -> Self {
        self.exec_path = exec_path.into();
        self
    }

    /// Number of leading directories to drop from extracted archives.
    pub fn strip(mut self, strip: usize) -> Self {
        self.strip = strip;
        self
    }

    pub fn skip_download(mut self) -> Self {
        self.skip_download = true;
        self
    }

    /// Install the downloaded file as the executable instead of unpacking it.
    pub fn skip_extract(mut self) -> Self {
        self.skip_extract = true;
        self
    }

    /// Append `.exe` to executable paths when targeting Windows.
    pub fn auto_exe(mut self) -> Self {
        self.auto_exe = true;
        self
    }

    pub fn debug(mut self) -> Self {
        self.debug = true;
        self
    }

    /// Bound each run. A zero duration means no bound.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = if timeout.is_zero() {
            None
        } else {
            Some(timeout)
        };
        self
    }

    /// Destination directory, defaulting to the current directory.
    pub fn dest_dir(&self) -> &Path {
        match &self.dest {
            Some(dest) if !dest.as_os_str().is_empty() => dest,
            _ => Path::new("."),
        }
    }
}
