use crate::archive::pack_workspace;
use crate::config::Config;
use crate::constants::ARCHIVE_EXTENSION;
use crate::detect::{detect_file_kind, FileKind};
use crate::error::{ImageError, JobError, ToolError};
use crate::extract::extract;
use crate::logger::{Reporter, Stage};
use crate::normalize::{collect_images, ImageNormalizer, NormalizeOutcome};
use crate::sanitize::sanitize;
use crate::tools::{CancelToken, ToolRunner, Toolkit};
use crate::utils::{format_change, format_mb, percent_change};
use crate::workspace::Workspace;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a job needs, shared read-only across workers.
pub struct JobContext {
    pub config: Arc<Config>,
    pub toolkit: Toolkit,
    pub reporter: Arc<Reporter>,
    pub cancel: CancelToken,
}

impl JobContext {
    /// Wires the toolkit selected by `config.engine`.
    pub fn new(config: Config, reporter: Arc<Reporter>, cancel: CancelToken) -> Self {
        let runner =
            ToolRunner::new(config.tool_timeout, cancel.clone()).with_reporter(reporter.clone());
        let toolkit = Toolkit::for_config(&config, runner);
        Self::with_toolkit(config, toolkit, reporter, cancel)
    }

    pub fn with_toolkit(
        config: Config,
        toolkit: Toolkit,
        reporter: Arc<Reporter>,
        cancel: CancelToken,
    ) -> Self {
        Self {
            config: Arc::new(config),
            toolkit,
            reporter,
            cancel,
        }
    }
}

/// A discovered input. Its type is sniffed only once the job runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    /// Path below the input root, mirrored under the output root.
    pub relative: PathBuf,
    pub size: u64,
}

impl InputFile {
    pub fn new(input_root: &Path, path: PathBuf) -> io::Result<Self> {
        let size = fs::metadata(&path)?.len();
        Ok(Self::with_size(input_root, path, size))
    }

    /// Like [`InputFile::new`] with a size already known.
    pub fn with_size(input_root: &Path, path: PathBuf, size: u64) -> Self {
        let relative = match path.strip_prefix(input_root) {
            Ok(relative) => relative.to_path_buf(),
            Err(_) => path.file_name().map(PathBuf::from).unwrap_or_default(),
        };
        Self {
            path,
            relative,
            size,
        }
    }

    /// `<output_root>/<relative dir>/<stem>.cbz`
    pub fn output_path(&self, output_root: &Path) -> PathBuf {
        output_root
            .join(&self.relative)
            .with_extension(ARCHIVE_EXTENSION)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Detect,
    Extract,
    Sanitize,
    Normalize,
    Archive,
    Measure,
    /// Outside any single phase, such as a panicking worker.
    Job,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Detect => "detect",
            Phase::Extract => "extract",
            Phase::Sanitize => "sanitize",
            Phase::Normalize => "normalize",
            Phase::Archive => "archive",
            Phase::Measure => "measure",
            Phase::Job => "job",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConversionStats {
    /// Pages normalized successfully.
    pub images: usize,
    /// Zero-length pages dropped.
    pub skipped_images: usize,
    /// Pages packed as extracted because they failed to normalize.
    pub failed_images: usize,
    pub input_size: u64,
    pub output_size: u64,
}

impl ConversionStats {
    pub fn percent_change(&self) -> f64 {
        percent_change(self.input_size, self.output_size)
    }
}

#[derive(Debug)]
pub enum JobOutcome {
    /// The output existed before the run; nothing was touched.
    Skipped { output_size: u64 },
    Completed(ConversionStats),
    Failed { phase: Phase, error: JobError },
    /// Interrupted before or during processing.
    Cancelled,
}

/// The single, final record of one input file.
#[derive(Debug)]
pub struct ConversionResult {
    pub input: InputFile,
    pub output_path: PathBuf,
    pub outcome: JobOutcome,
    pub elapsed: Duration,
}

impl ConversionResult {
    /// Completed and skipped files both count as successes.
    pub fn is_success(&self) -> bool {
        matches!(
            self.outcome,
            JobOutcome::Completed(_) | JobOutcome::Skipped { .. }
        )
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.outcome, JobOutcome::Failed { .. })
    }
}

#[derive(Debug, Default)]
struct ImageTally {
    converted: usize,
    resized: usize,
    skipped: usize,
    failed: usize,
}

fn in_phase<E: Into<JobError>>(phase: Phase) -> impl FnOnce(E) -> (Phase, JobError) {
    move |error| (phase, error.into())
}

fn cancelled(stage: &str) -> JobError {
    JobError::Process(ToolError::Cancelled {
        tool: stage.to_string(),
    })
}

/// Runs one input through detect, extract, sanitize, normalize, archive and measure.
///
/// Never panics on a bad input and never returns an error: every failure ends
/// up in the result's outcome.
pub fn run_job(ctx: &JobContext, input: &InputFile) -> ConversionResult {
    let started = Instant::now();
    let output_path = input.output_path(&ctx.config.output_root);
    let outcome = execute(ctx, input, &output_path);
    report_outcome(&ctx.reporter, input, &outcome);
    ConversionResult {
        input: input.clone(),
        output_path,
        outcome,
        elapsed: started.elapsed(),
    }
}

fn execute(ctx: &JobContext, input: &InputFile, output_path: &Path) -> JobOutcome {
    if ctx.cancel.is_cancelled() {
        return JobOutcome::Cancelled;
    }
    if let Ok(meta) = fs::metadata(output_path) {
        if meta.is_file() {
            return JobOutcome::Skipped {
                output_size: meta.len(),
            };
        }
    }

    ctx.reporter
        .stage(&input.path, Stage::Started, &format_mb(input.size));

    match convert(ctx, input, output_path) {
        Ok(stats) => JobOutcome::Completed(stats),
        Err((_, error)) if error.is_cancellation() => JobOutcome::Cancelled,
        Err((phase, error)) => JobOutcome::Failed { phase, error },
    }
}

fn convert(
    ctx: &JobContext,
    input: &InputFile,
    output_path: &Path,
) -> Result<ConversionStats, (Phase, JobError)> {
    let kind = detect_file_kind(&input.path).map_err(in_phase(Phase::Detect))?;
    if kind == FileKind::Unknown {
        return Err((
            Phase::Detect,
            JobError::UnsupportedType(kind.mime_type().to_string()),
        ));
    }
    ctx.reporter
        .verbose(&format!("{} detected as {}", input.relative.display(), kind));

    let workspace = Workspace::create(ctx.config.scratch_root.as_deref())
        .map_err(in_phase(Phase::Extract))?;
    let stats = run_phases(ctx, input, kind, &workspace, output_path)?;

    if let Err(e) = workspace.close() {
        ctx.reporter.warn(&format!(
            "could not remove workspace for {}: {}",
            input.relative.display(),
            e
        ));
    }
    Ok(stats)
}

fn run_phases(
    ctx: &JobContext,
    input: &InputFile,
    kind: FileKind,
    workspace: &Workspace,
    output_path: &Path,
) -> Result<ConversionStats, (Phase, JobError)> {
    extract(&input.path, kind, workspace, &ctx.toolkit, &ctx.reporter)
        .map_err(in_phase(Phase::Extract))?;

    let report = sanitize(workspace.root(), Some(&workspace.staging_path()))
        .map_err(in_phase(Phase::Sanitize))?;
    if report.collisions > 0 {
        ctx.reporter.stage(
            &input.path,
            Stage::Warning,
            &format!("{} padded names kept, trimmed name taken", report.collisions),
        );
    }
    ctx.reporter.verbose(&format!(
        "{}: {} junk entries removed, {} names trimmed",
        input.relative.display(),
        report.removed,
        report.renamed
    ));

    let tally = normalize_all(ctx, input, workspace).map_err(in_phase(Phase::Normalize))?;

    if ctx.cancel.is_cancelled() {
        return Err((Phase::Archive, cancelled("archive")));
    }
    pack_workspace(workspace, ctx.toolkit.packer.as_ref(), output_path)
        .map_err(in_phase(Phase::Archive))?;

    let output_size = fs::metadata(output_path)
        .map_err(in_phase(Phase::Measure))?
        .len();

    Ok(ConversionStats {
        images: tally.converted,
        skipped_images: tally.skipped,
        failed_images: tally.failed,
        input_size: input.size,
        output_size,
    })
}

fn normalize_all(
    ctx: &JobContext,
    input: &InputFile,
    workspace: &Workspace,
) -> Result<ImageTally, JobError> {
    let images = collect_images(workspace.root(), Some(&workspace.staging_path()))?;
    if images.is_empty() {
        return Err(JobError::NoImagesFound);
    }

    let normalizer = ImageNormalizer::new(ctx.toolkit.transcoder.as_ref(), ctx.config.normalize);
    let bar = ctx
        .reporter
        .item_bar(&input.path, images.len() as u64, "img");
    let mut tally = ImageTally::default();

    for image in &images {
        if ctx.cancel.is_cancelled() {
            bar.finish_and_clear();
            return Err(cancelled("normalize"));
        }
        let name = image
            .strip_prefix(workspace.root())
            .unwrap_or(image)
            .display()
            .to_string();

        match normalizer.normalize(image) {
            Ok(NormalizeOutcome::Converted { resized, .. }) => {
                tally.converted += 1;
                if resized {
                    tally.resized += 1;
                }
            }
            Ok(NormalizeOutcome::SkippedEmpty) => {
                tally.skipped += 1;
                ctx.reporter.stage(
                    &input.path,
                    Stage::Warning,
                    &format!("empty image skipped: {}", name),
                );
            }
            Err(ImageError::Tool(e @ ToolError::Cancelled { .. })) => {
                bar.finish_and_clear();
                return Err(JobError::Process(e));
            }
            Err(e) => {
                tally.failed += 1;
                ctx.reporter
                    .stage(&input.path, Stage::Error, &format!("image {}: {}", name, e));
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    ctx.reporter.verbose(&format!(
        "{}: {} images normalized, {} resized",
        input.relative.display(),
        tally.converted,
        tally.resized
    ));

    if tally.converted == 0 {
        return Err(if tally.failed > 0 {
            JobError::AllImagesFailed {
                failed: tally.failed,
            }
        } else {
            JobError::NoImagesFound
        });
    }
    Ok(tally)
}

fn report_outcome(reporter: &Reporter, input: &InputFile, outcome: &JobOutcome) {
    match outcome {
        JobOutcome::Skipped { .. } => {
            reporter.stage(&input.path, Stage::Skipped, "output already exists");
        }
        JobOutcome::Completed(stats) => {
            let stage = if stats.percent_change() > 0.0 {
                Stage::Grown
            } else {
                Stage::Completed
            };
            let message = format!(
                "({} img, {} → {}, {})",
                stats.images,
                format_mb(stats.input_size),
                format_mb(stats.output_size),
                format_change(stats.input_size, stats.output_size)
            );
            reporter.stage(&input.path, stage, &message);
        }
        JobOutcome::Failed { phase, error } => {
            reporter.stage(&input.path, Stage::Error, &format!("{} failed: {}", phase, error));
        }
        JobOutcome::Cancelled => {
            reporter.verbose(&format!("{} cancelled", input.relative.display()));
        }
    }
}
