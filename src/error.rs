use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Run-level failures. Anything here stops the whole conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid quality value: {0}. Must be between 1 and 100")]
    InvalidQuality(u8),

    #[error("Invalid maximum dimensions: {0}x{1}. Both must be greater than zero")]
    InvalidDimensions(u32, u32),

    #[error("Invalid worker count: {0}. Must be at least 1")]
    InvalidWorkers(usize),

    #[error("Input directory not found: {0}")]
    InputNotFound(PathBuf),

    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("Failed to create output directory: {0}")]
    DirectoryCreationFailed(PathBuf),

    #[error("Missing dependencies: {}", .0.join(", "))]
    MissingDependencies(Vec<String>),

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(String),

    #[error("Walkdir error: {0}")]
    WalkdirError(#[from] walkdir::Error),

    #[error("Interrupted by user")]
    Interrupted,
}

pub type Result<T> = std::result::Result<T, ConvertError>;

/// Failure of a single codec invocation, external process or in-process.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}{}", format_stderr(.stderr))]
    Failed {
        tool: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("{tool} timed out after {after:?}")]
    TimedOut { tool: String, after: Duration },

    #[error("{tool} was cancelled")]
    Cancelled { tool: String },

    #[error("{tool}: {message}")]
    Native { tool: String, message: String },

    #[error("I/O error while running {tool}: {source}")]
    Io {
        tool: String,
        #[source]
        source: std::io::Error,
    },
}

impl ToolError {
    pub fn native(tool: &str, message: impl fmt::Display) -> Self {
        ToolError::Native {
            tool: tool.to_string(),
            message: message.to_string(),
        }
    }

    /// True when the tool ran and reported failure, as opposed to not running at all.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ToolError::Failed { .. } | ToolError::Native { .. })
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

/// Failure to normalize one image. Contained to that image.
#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("unparsable dimensions {0:?}")]
    UnparsableDimensions(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Tag carried by every failed job, used for reporting and tallies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    UnsupportedType,
    CorruptArchive,
    NoImagesFound,
    PdfError,
    ProcessError,
    ImageError,
    TimedOut,
    IoError,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureReason::UnsupportedType => "unsupported type",
            FailureReason::CorruptArchive => "corrupt archive",
            FailureReason::NoImagesFound => "no images found",
            FailureReason::PdfError => "PDF error",
            FailureReason::ProcessError => "process error",
            FailureReason::ImageError => "image error",
            FailureReason::TimedOut => "timed out",
            FailureReason::IoError => "I/O error",
        };
        f.write_str(name)
    }
}

/// Per-file failures. Any of these fails only the job that produced it.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("unsupported file type ({0})")]
    UnsupportedType(String),

    #[error("corrupt or unreadable archive: {0}")]
    CorruptArchive(#[source] ToolError),

    #[error("no images found")]
    NoImagesFound,

    #[error("all {failed} images failed to convert")]
    AllImagesFailed { failed: usize },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("process error: {0}")]
    Process(#[from] ToolError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn reason(&self) -> FailureReason {
        match self {
            JobError::UnsupportedType(_) => FailureReason::UnsupportedType,
            JobError::CorruptArchive(_) => FailureReason::CorruptArchive,
            JobError::NoImagesFound => FailureReason::NoImagesFound,
            JobError::AllImagesFailed { .. } => FailureReason::ImageError,
            JobError::Pdf(_) => FailureReason::PdfError,
            JobError::Process(ToolError::TimedOut { .. }) => FailureReason::TimedOut,
            JobError::Process(_) | JobError::Panicked(_) => FailureReason::ProcessError,
            JobError::Io(_) => FailureReason::IoError,
        }
    }

    pub fn is_cancellation(&self) -> bool {
        matches!(self, JobError::Process(ToolError::Cancelled { .. }))
    }
}
