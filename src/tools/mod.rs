//! Capability interfaces for the codecs the pipeline delegates to, plus the
//! process runner and the toolkit that wires concrete implementations together.

pub mod external;
pub mod native;
#[cfg(test)]
pub(crate) mod testing;

use crate::config::{Config, Engine, ToolPaths};
use crate::constants::{STDERR_TAIL_BYTES, TOOL_POLL_INTERVAL_MS};
use crate::error::{ConvertError, ImageError, ToolError};
use crate::formats::TargetFormat;
use crate::logger::Reporter;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

pub use external::{ImageMagick, Poppler, SevenZip, Unrar};
pub use native::{ImageCrateTranscoder, ZipCodec};

pub trait ArchiveVerifier: Send + Sync {
    /// Tests archive integrity without extracting anything.
    fn verify(&self, archive: &Path) -> Result<(), ToolError>;
}

pub trait ArchiveExtractor: Send + Sync {
    /// Extracts every entry of `archive` into `dest`, overwriting silently.
    fn extract(&self, archive: &Path, dest: &Path) -> Result<(), ToolError>;
}

pub trait ArchivePacker: Send + Sync {
    /// Packs `entries` (relative to `root`) into a zip archive at `output`.
    fn pack(&self, root: &Path, entries: &[PathBuf], output: &Path) -> Result<(), ToolError>;
}

pub trait ImageTranscoder: Send + Sync {
    /// Pixel dimensions as `(width, height)`.
    fn dimensions(&self, image: &Path) -> Result<(u32, u32), ImageError>;

    /// Re-encodes `input` into `output`. When `resize` is set the result must fit
    /// inside that box with the aspect ratio kept.
    fn transcode(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<(u32, u32)>,
        format: TargetFormat,
        quality: u8,
    ) -> Result<(), ImageError>;
}

pub trait PdfRasterizer: Send + Sync {
    fn page_count(&self, pdf: &Path) -> Result<u32, ToolError>;

    /// Renders 1-based `page` to a PNG at `output`.
    fn rasterize_page(&self, pdf: &Path, page: u32, output: &Path) -> Result<(), ToolError>;

    /// Re-encodes every rendered page in place once all pages are out.
    fn finish_pages(&self, pages: &[PathBuf]) -> Result<(), ToolError>;
}

/// Run-wide cancellation flag, flipped once on interrupt.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Captured result of a finished tool.
#[derive(Debug)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external commands as bounded child processes.
///
/// Output is captured into anonymous temp files rather than pipes so a chatty
/// tool can never block on a full pipe while we poll it. The child is killed
/// when the optional timeout elapses or the run is cancelled.
#[derive(Clone)]
pub struct ToolRunner {
    timeout: Option<Duration>,
    cancel: CancelToken,
    reporter: Option<Arc<Reporter>>,
}

impl ToolRunner {
    pub fn new(timeout: Option<Duration>, cancel: CancelToken) -> Self {
        Self {
            timeout,
            cancel,
            reporter: None,
        }
    }

    /// Logs every command line through `reporter` in verbose mode.
    pub fn with_reporter(mut self, reporter: Arc<Reporter>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn run(
        &self,
        program: &str,
        args: &[&OsStr],
        cwd: Option<&Path>,
    ) -> Result<ToolOutput, ToolError> {
        let io_err = |source: std::io::Error| ToolError::Io {
            tool: program.to_string(),
            source,
        };

        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                tool: program.to_string(),
            });
        }

        if let Some(reporter) = &self.reporter {
            if reporter.is_verbose() {
                let line: Vec<String> = std::iter::once(program.to_string())
                    .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
                    .collect();
                reporter.verbose(&line.join(" "));
            }
        }

        let mut stdout_file = tempfile::tempfile().map_err(io_err)?;
        let mut stderr_file = tempfile::tempfile().map_err(io_err)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout_file.try_clone().map_err(io_err)?))
            .stderr(Stdio::from(stderr_file.try_clone().map_err(io_err)?));
        if let Some(dir) = cwd {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|source| ToolError::Spawn {
            tool: program.to_string(),
            source,
        })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait().map_err(io_err)? {
                break status;
            }
            if self.cancel.is_cancelled() {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ToolError::Cancelled {
                    tool: program.to_string(),
                });
            }
            if let Some(timeout) = self.timeout {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ToolError::TimedOut {
                        tool: program.to_string(),
                        after: timeout,
                    });
                }
            }
            thread::sleep(Duration::from_millis(TOOL_POLL_INTERVAL_MS));
        };

        let stdout = read_captured(&mut stdout_file).map_err(io_err)?;
        let stderr = read_captured(&mut stderr_file).map_err(io_err)?;

        if !status.success() {
            return Err(ToolError::Failed {
                tool: program.to_string(),
                status,
                stderr: tail(&stderr, STDERR_TAIL_BYTES),
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

fn read_captured(file: &mut File) -> std::io::Result<String> {
    file.seek(SeekFrom::Start(0))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn tail(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut start = text.len() - max_bytes;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    text[start..].to_string()
}

/// One implementation of every capability the pipeline needs.
#[derive(Clone)]
pub struct Toolkit {
    pub zip_verifier: Arc<dyn ArchiveVerifier>,
    pub zip_extractor: Arc<dyn ArchiveExtractor>,
    pub rar_extractor: Arc<dyn ArchiveExtractor>,
    pub rasterizer: Arc<dyn PdfRasterizer>,
    pub transcoder: Arc<dyn ImageTranscoder>,
    pub packer: Arc<dyn ArchivePacker>,
}

impl Toolkit {
    pub fn for_config(config: &Config, runner: ToolRunner) -> Self {
        match config.engine {
            Engine::External => Self::external(&config.tools, runner),
            Engine::Native => Self::native(&config.tools, runner),
        }
    }

    pub fn external(tools: &ToolPaths, runner: ToolRunner) -> Self {
        let seven_zip = Arc::new(SevenZip::new(&tools.seven_zip, runner.clone()));
        Self {
            zip_verifier: seven_zip.clone(),
            zip_extractor: seven_zip.clone(),
            rar_extractor: Arc::new(Unrar::new(&tools.unrar, runner.clone())),
            rasterizer: Arc::new(Poppler::new(&tools.pdfinfo, &tools.pdftoppm, runner.clone())),
            transcoder: Arc::new(ImageMagick::new(&tools.identify, &tools.convert, runner)),
            packer: seven_zip,
        }
    }

    pub fn native(tools: &ToolPaths, runner: ToolRunner) -> Self {
        let zip = Arc::new(ZipCodec::new(runner.cancel_token().clone()));
        Self {
            zip_verifier: zip.clone(),
            zip_extractor: zip.clone(),
            rar_extractor: Arc::new(Unrar::new(&tools.unrar, runner.clone())),
            rasterizer: Arc::new(Poppler::new(&tools.pdfinfo, &tools.pdftoppm, runner)),
            transcoder: Arc::new(ImageCrateTranscoder),
            packer: zip,
        }
    }
}

/// Binaries that must be on `PATH` before processing starts.
///
/// The external engine needs everything up front. The native engine only
/// needs unrar and poppler, and only when such inputs are present.
pub fn required_binaries<'a>(config: &'a Config, inputs: &[PathBuf]) -> Vec<&'a str> {
    let tools = &config.tools;
    match config.engine {
        Engine::External => vec![
            tools.seven_zip.as_str(),
            tools.identify.as_str(),
            tools.convert.as_str(),
            tools.unrar.as_str(),
            tools.pdfinfo.as_str(),
            tools.pdftoppm.as_str(),
        ],
        Engine::Native => {
            let has_ext = |wanted: &str| {
                inputs.iter().any(|p| {
                    p.extension()
                        .and_then(|e| e.to_str())
                        .is_some_and(|e| e.eq_ignore_ascii_case(wanted))
                })
            };
            let mut required = Vec::new();
            if has_ext("cbr") {
                required.push(tools.unrar.as_str());
            }
            if has_ext("pdf") {
                required.push(tools.pdfinfo.as_str());
                required.push(tools.pdftoppm.as_str());
            }
            required
        }
    }
}

/// Fails with every missing binary named at once.
pub fn check_dependencies(binaries: &[&str]) -> crate::error::Result<()> {
    let missing: Vec<String> = binaries
        .iter()
        .filter(|bin| which::which(bin).is_err())
        .map(|bin| bin.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConvertError::MissingDependencies(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_tail_respects_char_boundaries() {
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("abcdef", 3), "def");
        let text = "ééé";
        let t = tail(text, 3);
        assert!(t.len() <= 3);
        assert!(text.ends_with(&t));
    }

    #[test]
    fn test_check_dependencies_reports_missing() {
        let result = check_dependencies(&["definitely-not-a-real-binary-x1", "also-missing-x2"]);
        match result {
            Err(ConvertError::MissingDependencies(missing)) => {
                assert_eq!(missing, vec!["definitely-not-a-real-binary-x1", "also-missing-x2"]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_required_binaries_external_needs_everything() {
        let config = Config::new("/in", None);
        let required = required_binaries(&config, &[]);
        assert_eq!(
            required,
            vec!["7z", "identify", "convert", "unrar", "pdfinfo", "pdftoppm"]
        );
    }

    #[test]
    fn test_required_binaries_native_follows_inputs() {
        let config = Config::new("/in", None).with_engine(Engine::Native);
        assert!(required_binaries(&config, &[PathBuf::from("a.cbz")]).is_empty());

        let required = required_binaries(
            &config,
            &[PathBuf::from("a.CBR"), PathBuf::from("b.pdf")],
        );
        assert_eq!(required, vec!["unrar", "pdfinfo", "pdftoppm"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_reports_nonzero_exit() {
        let runner = ToolRunner::new(None, CancelToken::new());
        let result = runner.run("sh", &[OsStr::new("-c"), OsStr::new("echo boom >&2; exit 3")], None);
        match result {
            Err(ToolError::Failed { stderr, .. }) => assert!(stderr.contains("boom")),
            other => panic!("unexpected result: {:?}", other.map(|o| o.stdout)),
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_captures_stdout() {
        let runner = ToolRunner::new(None, CancelToken::new());
        let output = runner
            .run("sh", &[OsStr::new("-c"), OsStr::new("echo 640 480")], None)
            .unwrap();
        assert_eq!(output.stdout.trim(), "640 480");
    }

    #[cfg(unix)]
    #[test]
    fn test_runner_times_out() {
        let runner = ToolRunner::new(Some(Duration::from_millis(100)), CancelToken::new());
        let result = runner.run("sleep", &[OsStr::new("5")], None);
        assert!(matches!(result, Err(ToolError::TimedOut { .. })));
    }

    #[test]
    fn test_runner_refuses_after_cancel() {
        let token = CancelToken::new();
        token.cancel();
        let runner = ToolRunner::new(None, token);
        let result = runner.run("sh", &[], None);
        assert!(matches!(result, Err(ToolError::Cancelled { .. })));
    }

    #[test]
    fn test_runner_spawn_failure() {
        let runner = ToolRunner::new(None, CancelToken::new());
        let result = runner.run("definitely-not-a-real-binary-x1", &[], None);
        assert!(matches!(result, Err(ToolError::Spawn { .. })));
    }
}
