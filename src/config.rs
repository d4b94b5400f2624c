use crate::constants::{
    DEFAULT_CONVERT_BIN, DEFAULT_IDENTIFY_BIN, DEFAULT_MAX_HEIGHT, DEFAULT_MAX_WIDTH,
    DEFAULT_OUTPUT_DIR_NAME, DEFAULT_PDFINFO_BIN, DEFAULT_PDFTOPPM_BIN, DEFAULT_QUALITY,
    DEFAULT_SEVEN_ZIP_BIN, DEFAULT_UNRAR_BIN, MAX_QUALITY, MAX_WORKERS, MIN_QUALITY,
};
use crate::error::{ConvertError, Result};
use crate::formats::TargetFormat;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Which implementations back the codec capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Engine {
    /// 7z, ImageMagick, unrar and poppler
    #[default]
    External,
    /// Built-in zip and image codecs; unrar and poppler are still used for CBR and PDF
    Native,
}

/// Names (or paths) of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub seven_zip: String,
    pub identify: String,
    pub convert: String,
    pub unrar: String,
    pub pdftoppm: String,
    pub pdfinfo: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            seven_zip: DEFAULT_SEVEN_ZIP_BIN.to_string(),
            identify: DEFAULT_IDENTIFY_BIN.to_string(),
            convert: DEFAULT_CONVERT_BIN.to_string(),
            unrar: DEFAULT_UNRAR_BIN.to_string(),
            pdftoppm: DEFAULT_PDFTOPPM_BIN.to_string(),
            pdfinfo: DEFAULT_PDFINFO_BIN.to_string(),
        }
    }
}

/// Settings that drive page normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeSettings {
    pub quality: u8,
    pub max_width: u32,
    pub max_height: u32,
    pub format: TargetFormat,
}

impl NormalizeSettings {
    pub fn new(
        quality: Option<u8>,
        max_width: Option<u32>,
        max_height: Option<u32>,
        format: Option<TargetFormat>,
    ) -> Result<Self> {
        let quality = quality.unwrap_or(DEFAULT_QUALITY);
        if !(MIN_QUALITY..=MAX_QUALITY).contains(&quality) {
            return Err(ConvertError::InvalidQuality(quality));
        }

        let max_width = max_width.unwrap_or(DEFAULT_MAX_WIDTH);
        let max_height = max_height.unwrap_or(DEFAULT_MAX_HEIGHT);
        if max_width == 0 || max_height == 0 {
            return Err(ConvertError::InvalidDimensions(max_width, max_height));
        }

        Ok(Self {
            quality,
            max_width,
            max_height,
            format: format.unwrap_or_default(),
        })
    }
}

impl Default for NormalizeSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            max_width: DEFAULT_MAX_WIDTH,
            max_height: DEFAULT_MAX_HEIGHT,
            format: TargetFormat::default(),
        }
    }
}

/// Immutable run configuration, built once at startup and shared by every job.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_root: PathBuf,
    pub output_root: PathBuf,
    pub normalize: NormalizeSettings,
    pub workers: usize,
    pub tool_timeout: Option<Duration>,
    pub scratch_root: Option<PathBuf>,
    pub engine: Engine,
    pub tools: ToolPaths,
    pub verbose: bool,
}

impl Config {
    /// Creates a configuration with defaults for everything but the roots.
    /// Paths are taken as given; see [`Config::resolve_input`].
    pub fn new(input_root: impl Into<PathBuf>, output_root: Option<PathBuf>) -> Self {
        let input_root = input_root.into();
        let output_root = output_root.unwrap_or_else(|| input_root.join(DEFAULT_OUTPUT_DIR_NAME));
        Self {
            input_root,
            output_root,
            normalize: NormalizeSettings::default(),
            workers: default_worker_count(),
            tool_timeout: None,
            scratch_root: None,
            engine: Engine::default(),
            tools: ToolPaths::default(),
            verbose: false,
        }
    }

    pub fn with_normalize(mut self, normalize: NormalizeSettings) -> Self {
        self.normalize = normalize;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Result<Self> {
        if workers == 0 {
            return Err(ConvertError::InvalidWorkers(workers));
        }
        self.workers = workers;
        Ok(self)
    }

    pub fn with_tool_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.tool_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    pub fn with_scratch_root(mut self, scratch_root: Option<PathBuf>) -> Self {
        self.scratch_root = scratch_root;
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Validates and canonicalizes the input root. Touches nothing on disk.
    ///
    /// An existing output root is canonicalized too, so discovery can exclude
    /// it by prefix. One that does not exist yet holds nothing to exclude.
    pub fn resolve_input(mut self) -> Result<Self> {
        let original = self.input_root.clone();
        self.input_root = canonical_input_dir(&self.input_root)?;
        if let Ok(rest) = self.output_root.strip_prefix(&original) {
            self.output_root = self.input_root.join(rest);
        }
        if let Ok(existing) = self.output_root.canonicalize() {
            self.output_root = existing;
        }
        Ok(self)
    }

    /// Creates the output root (and scratch root, if set) and canonicalizes it.
    pub fn create_output_root(mut self) -> Result<Self> {
        fs::create_dir_all(&self.output_root)
            .map_err(|_| ConvertError::DirectoryCreationFailed(self.output_root.clone()))?;
        self.output_root = self
            .output_root
            .canonicalize()
            .map_err(|_| ConvertError::DirectoryCreationFailed(self.output_root.clone()))?;

        if let Some(scratch) = &self.scratch_root {
            fs::create_dir_all(scratch)
                .map_err(|_| ConvertError::DirectoryCreationFailed(scratch.clone()))?;
        }

        Ok(self)
    }
}

fn canonical_input_dir(path: &Path) -> Result<PathBuf> {
    if !path.exists() {
        return Err(ConvertError::InputNotFound(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(ConvertError::NotADirectory(path.to_path_buf()));
    }
    Ok(path.canonicalize()?)
}

/// `min(cores - 1, 8)`, never below one.
pub fn default_worker_count() -> usize {
    worker_count_for(num_cpus::get())
}

pub fn worker_count_for(cores: usize) -> usize {
    cores.saturating_sub(1).min(MAX_WORKERS).max(1)
}
