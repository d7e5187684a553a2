use crate::core::config::{Source, WrapperConfig};
use crate::error::{BinwrapError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// On-disk description of a wrapped binary, as read by the `binwrap` CLI.
///
/// ```toml
/// [wrapper]
/// name = "cwebp"
/// dest = "vendor/cwebp"
/// exec_path = "cwebp"
/// strip = 2
///
/// [[source]]
/// url = "https://example.com/libwebp-linux-x86-64.tar.gz"
/// os = "linux"
/// arch = "x86_64"
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct WrapperManifest {
    pub wrapper: WrapperSection,
    #[serde(default, rename = "source")]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WrapperSection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub dest: Option<PathBuf>,
    pub exec_path: String,
    #[serde(default)]
    pub strip: usize,
    #[serde(default)]
    pub skip_download: bool,
    #[serde(default)]
    pub skip_extract: bool,
    #[serde(default)]
    pub auto_exe: bool,
    #[serde(default)]
    pub debug: bool,
    /// Zero or absent means unbounded.
    #[serde(default)]
    pub timeout_ms: u64,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Option<Vec<String>>,
}

impl WrapperManifest {
    /// Load a manifest, reading JSON for `.json` files and TOML otherwise.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(BinwrapError::ManifestNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path).map_err(|e| BinwrapError::at_path(path, e))?;
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let manifest = if is_json {
            Self::parse_json(&content)?
        } else {
            Self::parse(&content)?
        };
        manifest.validate()?;
        Ok(manifest)
    }

    /// Parse a manifest from TOML content
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| BinwrapError::manifest_error(e.to_string()))
    }

    pub fn parse_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| BinwrapError::manifest_error(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.wrapper.exec_path.is_empty() {
            return Err(BinwrapError::manifest_error("wrapper.exec_path is required"));
        }

        // A url-less source is only useful for its exec_path override.
        if !self.wrapper.skip_download {
            let missing = self.sources.iter().position(|s| {
                s.url.is_empty() && s.exec_path.as_deref().map_or(true, str::is_empty)
            });
            if let Some(index) = missing {
                return Err(BinwrapError::manifest_error(format!(
                    "source #{} needs a url or an exec_path (set wrapper.skip_download to run a local binary)",
                    index + 1
                )));
            }
        }

        if let Some(env) = &self.wrapper.env {
            if let Some(entry) = env.iter().find(|entry| !entry.contains('=')) {
                return Err(BinwrapError::InvalidEnvironment {
                    entry: entry.clone(),
                });
            }
        }

        Ok(())
    }

    /// Display name, falling back to the executable's file name.
    pub fn name(&self) -> String {
        self.wrapper.name.clone().unwrap_or_else(|| {
            Path::new(&self.wrapper.exec_path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| self.wrapper.exec_path.clone())
        })
    }

    /// Acquisition settings. Relative destinations are resolved against
    /// `base_dir` (normally the manifest's directory).
    pub fn to_config(&self, base_dir: &Path) -> WrapperConfig {
        let section = &self.wrapper;
        WrapperConfig {
            sources: self.sources.clone(),
            dest: section.dest.as_ref().map(|dest| base_dir.join(dest)),
            exec_path: section.exec_path.clone(),
            strip: section.strip,
            skip_download: section.skip_download,
            skip_extract: section.skip_extract,
            auto_exe: section.auto_exe,
            debug: section.debug,
            timeout: None,
        }
        .timeout(Duration::from_millis(section.timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CWEBP: &str = r#"
[wrapper]
name = "cwebp"
dest = "bin/cwebp"
exec_path = "cwebp"
strip = 2
auto_exe = true
timeout_ms = 1500
args = ["-quiet"]

[[source]]
url = "https://example.com/libwebp-0.6.0-mac-10.12.tar.gz"
os = "macos"

[[source]]
url = "https://example.com/libwebp-0.6.0-linux-x86-64.tar.gz"
os = "linux"
arch = "x86_64"

[[source]]
url = "https://example.com/libwebp-0.6.0-windows-x64.zip"
os = "windows"
exec_path = "bin/cwebp.exe"
"#;

    #[test]
    fn test_parse_manifest() {
        let manifest = WrapperManifest::parse(CWEBP).unwrap();
        assert_eq!(manifest.name(), "cwebp");
        assert_eq!(manifest.wrapper.strip, 2);
        assert_eq!(manifest.sources.len(), 3);
        assert_eq!(manifest.sources[1].arch.as_deref(), Some("x86_64"));
        assert_eq!(manifest.sources[2].exec_path.as_deref(), Some("bin/cwebp.exe"));
        assert!(manifest.validate().is_ok());
    }

    #[test]
    fn test_to_config() {
        let manifest = WrapperManifest::parse(CWEBP).unwrap();
        let config = manifest.to_config(Path::new("/project"));

        assert_eq!(config.dest_dir(), Path::new("/project/bin/cwebp"));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.auto_exe);
        assert_eq!(config.sources, manifest.sources);
    }

    #[test]
    fn test_parse_json_manifest() {
        let manifest = WrapperManifest::parse_json(
            r#"{"wrapper": {"exec_path": "bin/tool", "skip_download": true}}"#,
        )
        .unwrap();
        assert_eq!(manifest.name(), "tool");
        assert!(manifest.sources.is_empty());
        assert_eq!(manifest.to_config(Path::new(".")).timeout, None);
    }

    #[test]
    fn test_validate_rejects_missing_url() {
        let manifest = WrapperManifest::parse(
            r#"
[wrapper]
exec_path = "tool"

[[source]]
os = "linux"
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(BinwrapError::ManifestError { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_bad_env() {
        let manifest = WrapperManifest::parse(
            r#"
[wrapper]
exec_path = "tool"
env = ["PATH"]
"#,
        )
        .unwrap();
        assert!(matches!(
            manifest.validate(),
            Err(BinwrapError::InvalidEnvironment { .. })
        ));
    }

    #[test]
    fn test_validate_allows_urlless_override() {
        let manifest = WrapperManifest::parse(
            r#"
[wrapper]
exec_path = "tool"

[[source]]
os = "windows"
exec_path = "bin/tool.exe"
"#,
        )
        .unwrap();
        assert!(manifest.validate().is_ok());

        let config = manifest.to_config(Path::new("."));
        assert_eq!(config.sources[0].url, "");
        assert_eq!(config.sources[0].exec_path.as_deref(), Some("bin/tool.exe"));
    }

    #[test]
    fn test_load_missing_manifest() {
        let err = WrapperManifest::load(Path::new("/no/such/binwrap.toml")).unwrap_err();
        assert!(matches!(err, BinwrapError::ManifestNotFound { .. }));
    }
}
