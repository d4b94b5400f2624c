pub mod archive;
pub mod batch;
pub mod cli;
pub mod config;
pub mod constants;
pub mod detect;
pub mod error;
pub mod extract;
pub mod formats;
pub mod job;
pub mod logger;
pub mod normalize;
pub mod sanitize;
pub mod tools;
pub mod utils;
pub mod workspace;

pub use batch::{collect_comic_files, convert_library, discover_inputs, is_comic_file, RunSummary};
pub use config::{default_worker_count, Config, Engine, NormalizeSettings, ToolPaths};
pub use detect::{detect_file_kind, FileKind};
pub use error::{ConvertError, FailureReason, ImageError, JobError, Result, ToolError};
pub use formats::TargetFormat;
pub use job::{run_job, ConversionResult, ConversionStats, InputFile, JobContext, JobOutcome, Phase};
pub use logger::Reporter;
pub use normalize::{fit_within, ImageNormalizer, NormalizeOutcome};
pub use tools::{CancelToken, Toolkit};
