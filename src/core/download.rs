use crate::error::{BinwrapError, Result};
use crate::utils::fs;
use percent_encoding::percent_decode_str;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use reqwest::Url;
use std::fs::OpenOptions;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

const MAX_REDIRECTS: usize = 10;
const CHUNK_SIZE: usize = 64 * 1024;

/// Blocking HTTP fetcher that streams a URL into a destination directory.
#[derive(Debug, Clone)]
pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("binwrap/", env!("CARGO_PKG_VERSION")))
            .redirect(redirect_policy())
            .build()
            .map_err(|e| BinwrapError::config_error(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client })
    }

    /// Use a preconfigured client, e.g. one with proxies or auth headers.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    /// Download `url` into `dest_dir`, naming the file after the last URL
    /// path segment. Returns the path of the written file.
    pub fn fetch(&self, url: &str, dest_dir: &Path) -> Result<PathBuf> {
        fs::ensure_dir_exists(dest_dir)?;

        let parsed = Url::parse(url).map_err(|e| BinwrapError::InvalidUrl {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        let file_name = file_name_from_url(&parsed).ok_or_else(|| BinwrapError::InvalidUrl {
            url: url.to_string(),
            message: "URL path has no file name".to_string(),
        })?;
        let destination = dest_dir.join(file_name);

        tracing::debug!(%url, path = %destination.display(), "fetching");

        let mut response = self
            .client
            .get(parsed)
            .send()
            .map_err(|source| BinwrapError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !(status.is_success() || status.is_redirection()) {
            return Err(BinwrapError::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(true);

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o755);
        }

        let mut file = options
            .open(&destination)
            .map_err(|e| BinwrapError::at_path(&destination, e))?;

        // Read and write failures are split so disk errors name the file.
        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut written = 0u64;
        loop {
            let read = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => {
                    return Err(BinwrapError::Transfer {
                        url: url.to_string(),
                        source,
                    })
                }
            };
            file.write_all(&buffer[..read])
                .map_err(|e| BinwrapError::at_path(&destination, e))?;
            written += read as u64;
        }
        file.flush()
            .map_err(|e| BinwrapError::at_path(&destination, e))?;

        tracing::info!(path = %destination.display(), bytes = written, "downloaded");
        Ok(destination)
    }
}

fn redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() > MAX_REDIRECTS {
            attempt.error("too many redirects")
        } else {
            attempt.follow()
        }
    })
}

/// Percent-decoded last path segment. An encoded separator never makes the
/// name reach outside the destination directory.
fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = percent_decode_str(segment).decode_utf8_lossy();
    let name = decoded.rsplit(|c: char| c == '/' || c == '\\').next()?;

    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}
