use crate::core::acquire::{self, Acquisition};
use crate::core::config::WrapperConfig;
use crate::core::download::Downloader;
use crate::core::platform::{self, Platform};
use crate::core::runner::{self, Invocation, ProcessHandle, RunOutput};
use crate::error::Result;
use std::io::{Read, Write};
use std::path::PathBuf;

/// Run state for one wrapped binary.
///
/// The acquisition settings in [`WrapperConfig`] are fixed at construction;
/// arguments, environment, and stdio routing can change between runs.
pub struct BinWrapper {
    config: WrapperConfig,
    platform: Platform,
    downloader: Option<Downloader>,
    args: Vec<String>,
    env: Option<Vec<String>>,
    stdin: Option<Box<dyn Read + Send>>,
    stdout: Option<Box<dyn Write + Send>>,
    output: RunOutput,
    process: ProcessHandle,
}

impl BinWrapper {
    pub fn new(config: WrapperConfig) -> Self {
        Self {
            config,
            platform: Platform::current(),
            downloader: None,
            args: Vec::new(),
            env: None,
            stdin: None,
            stdout: None,
            output: RunOutput::default(),
            process: ProcessHandle::new(),
        }
    }

    /// Resolve sources against a platform other than the running one.
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_downloader(mut self, downloader: Downloader) -> Self {
        self.downloader = Some(downloader);
        self
    }

    pub fn config(&self) -> &WrapperConfig {
        &self.config
    }

    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Add an argument (and optional values) passed on every run.
    pub fn arg<S: Into<String>>(&mut self, name: S, values: &[&str]) -> &mut Self {
        self.args.push(name.into());
        self.args.extend(values.iter().map(|v| v.to_string()));
        self
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Replace the inherited environment with `NAME=value` entries.
    pub fn env<I, S>(&mut self, env: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = Some(env.into_iter().map(Into::into).collect());
        self
    }

    pub fn stdin<R: Read + Send + 'static>(&mut self, reader: R) -> &mut Self {
        self.stdin = Some(Box::new(reader));
        self
    }

    /// Stream stdout to `writer` instead of capturing it.
    pub fn stdout<W: Write + Send + 'static>(&mut self, writer: W) -> &mut Self {
        self.stdout = Some(Box::new(writer));
        self
    }

    /// Full path to the executable.
    pub fn path(&self) -> PathBuf {
        platform::resolve_path(&self.config, &self.platform)
    }

    /// Download and install the binary if it is not on disk yet.
    pub fn acquire(&mut self) -> Result<Acquisition> {
        let cached = &mut self.downloader;
        acquire::ensure_installed(&self.config, &self.platform, || {
            if let Some(downloader) = cached.as_ref() {
                return Ok(downloader.clone());
            }
            let downloader = Downloader::new()?;
            *cached = Some(downloader.clone());
            Ok(downloader)
        })
    }

    /// Acquire if needed, then run with the accumulated arguments followed
    /// by `extra`. Blocks until the process exits or the timeout fires.
    pub fn run<S: AsRef<str>>(&mut self, extra: &[S]) -> Result<()> {
        self.acquire()?;

        let program = self.path();
        let mut args = self.args.clone();
        args.extend(extra.iter().map(|arg| arg.as_ref().to_string()));

        let command_line = format!("{} {}", program.display(), args.join(" "));
        if self.config.debug {
            tracing::info!(command = %command_line, "running");
        } else {
            tracing::debug!(command = %command_line, "running");
        }

        let invocation = Invocation {
            program: &program,
            args: &args,
            env: self.env.as_deref(),
            timeout: self.config.timeout,
            stdin: self.stdin.take(),
            stdout: self
                .stdout
                .as_mut()
                .map(|sink| &mut **sink as &mut (dyn Write + Send)),
        };

        runner::run(invocation, &self.process, &mut self.output)
    }

    /// Stdout captured by the last run. Empty when a stdout sink is set.
    pub fn captured_stdout(&self) -> &[u8] {
        &self.output.stdout
    }

    pub fn captured_stderr(&self) -> &[u8] {
        &self.output.stderr
    }

    /// Captured stdout followed by captured stderr.
    pub fn combined_output(&self) -> Vec<u8> {
        self.output.combined()
    }

    /// Handle that can terminate an in-flight run from another thread.
    pub fn process_handle(&self) -> ProcessHandle {
        self.process.clone()
    }

    /// Kill the running process, if any.
    pub fn terminate(&self) -> Result<()> {
        self.process.kill()
    }

    /// Clear arguments, captured output, environment, and stdio routing.
    /// Source, destination, and executable path are kept.
    pub fn reset(&mut self) -> &mut Self {
        self.args.clear();
        self.output.clear();
        self.env = None;
        self.stdin = None;
        self.stdout = None;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::Source;
    use std::path::Path;

    #[cfg(unix)]
    fn install_script(dir: &Path, name: &str, body: &str) {
        use std::os::unix::fs::PermissionsExt;

        std::fs::create_dir_all(dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    #[test]
    fn test_path_with_dot_dest() {
        let wrapper = BinWrapper::new(
            WrapperConfig::new().skip_download().dest(".").exec_path("tool"),
        );
        assert_eq!(
            wrapper.path(),
            PathBuf::from(format!(".{}tool", std::path::MAIN_SEPARATOR))
        );
    }

    #[test]
    fn test_arg_accumulates() {
        let mut wrapper = BinWrapper::new(WrapperConfig::new().exec_path("tool"));
        wrapper.arg("-q", &["80"]).arg("--verbose", &[]);
        assert_eq!(wrapper.args(), ["-q", "80", "--verbose"]);
    }

    #[test]
    fn test_run_without_binary_errors() {
        let temp = tempfile::tempdir().unwrap();
        let mut wrapper = BinWrapper::new(
            WrapperConfig::new().dest(temp.path()).exec_path("cwebp"),
        );
        assert!(wrapper.run(&["-version"]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_passes_configured_then_extra_args() {
        let temp = tempfile::tempdir().unwrap();
        install_script(temp.path(), "tool", r#"printf '%s\n' "$@""#);

        let mut wrapper = BinWrapper::new(
            WrapperConfig::new().skip_download().dest(temp.path()).exec_path("tool"),
        );
        wrapper.arg("-a", &["1"]);
        wrapper.run(&["--version"]).unwrap();

        assert_eq!(wrapper.captured_stdout(), b"-a\n1\n--version\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_reset_clears_output_keeps_paths() {
        let temp = tempfile::tempdir().unwrap();
        install_script(temp.path(), "tool", "echo out; echo err >&2");

        let mut wrapper = BinWrapper::new(
            WrapperConfig::new()
                .source(Source::new("").exec_path("tool"))
                .dest(temp.path())
                .exec_path("tool"),
        );
        wrapper.arg("x", &[]).env(["A=1"]);
        wrapper.run::<&str>(&[]).unwrap();
        assert_eq!(wrapper.combined_output(), b"out\nerr\n");

        let path_before = wrapper.path();
        wrapper.reset();

        assert!(wrapper.captured_stdout().is_empty());
        assert!(wrapper.captured_stderr().is_empty());
        assert!(wrapper.args().is_empty());
        assert_eq!(wrapper.path(), path_before);
        assert_eq!(wrapper.config().dest_dir(), temp.path());
    }

    #[cfg(unix)]
    #[derive(Clone, Default)]
    struct LogBuffer(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    #[cfg(unix)]
    impl Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[cfg(unix)]
    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
        type Writer = LogBuffer;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    /// Info-level log lines emitted while running a trivial script.
    #[cfg(unix)]
    fn info_logs(debug: bool) -> String {
        let temp = tempfile::tempdir().unwrap();
        install_script(temp.path(), "tool", "true");

        let mut config = WrapperConfig::new()
            .skip_download()
            .dest(temp.path())
            .exec_path("tool");
        if debug {
            config = config.debug();
        }

        let logs = LogBuffer::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_max_level(tracing::Level::INFO)
            .with_ansi(false)
            .finish();

        tracing::subscriber::with_default(subscriber, || {
            let mut wrapper = BinWrapper::new(config);
            wrapper.arg("-q", &[]);
            wrapper.run(&["--version"]).unwrap();
        });

        let bytes = logs.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[cfg(unix)]
    #[test]
    fn test_debug_flag_logs_command_line_at_info() {
        let logs = info_logs(true);
        assert!(logs.contains("running"), "{logs}");
        assert!(logs.contains("tool -q --version"), "{logs}");

        assert!(!info_logs(false).contains("running"));
    }

    #[test]
    fn test_terminate_without_run_is_noop() {
        let wrapper = BinWrapper::new(WrapperConfig::new().exec_path("tool"));
        wrapper.terminate().unwrap();
    }
}
