use crate::constants::COMIC_EXTENSIONS;
use crate::error::{ConvertError, FailureReason, JobError, Result};
use crate::job::{run_job, ConversionResult, InputFile, JobContext, JobOutcome, Phase};
use crate::logger::Reporter;
use crate::utils::{format_elapsed, percent_change};
use std::any::Any;
use std::collections::HashMap;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

pub fn is_comic_file(path: &Path) -> bool {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|ext| COMIC_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}

/// All comic files under `input_root`, sorted, skipping anything inside
/// `output_root`. Both roots are expected to be canonical.
pub fn collect_comic_files(input_root: &Path, output_root: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(input_root)
        .into_iter()
        .filter_entry(|e| !e.path().starts_with(output_root));

    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file() && is_comic_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Discovers every input for a run and records its size.
pub fn discover_inputs(input_root: &Path, output_root: &Path) -> Result<Vec<InputFile>> {
    collect_comic_files(input_root, output_root)?
        .into_iter()
        .map(|path| InputFile::new(input_root, path).map_err(ConvertError::from))
        .collect()
}

/// Aggregate of one run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    pub total: usize,
    pub completed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub cancelled: usize,
    pub failures_by_reason: HashMap<FailureReason, usize>,
    pub elapsed: Duration,
    /// Input bytes of every file that was attempted or skipped.
    pub input_bytes: u64,
    /// Output bytes found on disk after every worker finished. Failed files add nothing.
    pub output_bytes: u64,
    pub interrupted: bool,
}

impl RunSummary {
    /// Completed plus skipped.
    pub fn succeeded(&self) -> usize {
        self.completed + self.skipped
    }

    pub fn saved_bytes(&self) -> i64 {
        self.input_bytes as i64 - self.output_bytes as i64
    }

    /// Share of the input saved; negative when outputs grew.
    pub fn saved_percent(&self) -> f64 {
        -percent_change(self.input_bytes, self.output_bytes)
    }

    pub fn print(&self, reporter: &Reporter) {
        reporter.summary("");
        reporter.summary(&format!("{}", console::style("=== RESULTS ===").green()));
        reporter.summary(&format!(
            "Succeeded: {} ({} already converted)",
            self.succeeded(),
            self.skipped
        ));
        reporter.summary(&format!("Failed: {}", self.failed));

        let mut reasons: Vec<(&FailureReason, &usize)> = self.failures_by_reason.iter().collect();
        reasons.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.to_string().cmp(&b.0.to_string())));
        for (reason, count) in reasons {
            reporter.summary(&format!("  {}: {}", reason, count));
        }
        if self.cancelled > 0 {
            reporter.summary(&format!("Cancelled: {}", self.cancelled));
        }
        reporter.summary(&format!("Time: {}", format_elapsed(self.elapsed)));
        reporter.summary(&format!(
            "{}",
            console::style(format!(
                "Total space saved: {:.2} MB ({:+.1}%)",
                self.saved_bytes() as f64 / (1024.0 * 1024.0),
                self.saved_percent()
            ))
            .cyan()
        ));
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs one job per input over a pool of `config.workers` threads.
///
/// Results are collected as jobs finish. Once every worker has reported,
/// output sizes are re-read from disk. After an interrupt, jobs that had not
/// started come back as cancelled and the summary is marked interrupted.
pub fn convert_library(ctx: Arc<JobContext>, inputs: Vec<InputFile>) -> Result<RunSummary> {
    let started = Instant::now();
    let total = inputs.len();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(ctx.config.workers)
        .thread_name(|i| format!("comic-worker-{}", i))
        .build()
        .map_err(|e| ConvertError::ThreadPool(e.to_string()))?;

    let progress = ctx.reporter.files_bar(total as u64);
    let (tx, rx) = mpsc::channel::<ConversionResult>();

    for input in inputs {
        let tx = tx.clone();
        let ctx = Arc::clone(&ctx);
        pool.spawn(move || {
            let job_started = Instant::now();
            let result = panic::catch_unwind(AssertUnwindSafe(|| run_job(&ctx, &input)))
                .unwrap_or_else(|payload| ConversionResult {
                    output_path: input.output_path(&ctx.config.output_root),
                    input: input.clone(),
                    outcome: JobOutcome::Failed {
                        phase: Phase::Job,
                        error: JobError::Panicked(panic_message(payload)),
                    },
                    elapsed: job_started.elapsed(),
                });
            // the receiver outlives every job
            let _ = tx.send(result);
        });
    }
    drop(tx);

    let mut results = Vec::with_capacity(total);
    for result in rx {
        progress.inc(1);
        results.push(result);
    }
    progress.finish_and_clear();

    let mut summary = summarize(&results);
    summary.elapsed = started.elapsed();
    summary.interrupted = ctx.cancel.is_cancelled();
    Ok(summary)
}

/// Tallies results and re-stats their outputs. Call only after all jobs joined.
pub fn summarize(results: &[ConversionResult]) -> RunSummary {
    let mut summary = RunSummary {
        total: results.len(),
        ..Default::default()
    };

    for result in results {
        match &result.outcome {
            JobOutcome::Completed(_) => summary.completed += 1,
            JobOutcome::Skipped { .. } => summary.skipped += 1,
            JobOutcome::Failed { error, .. } => {
                summary.failed += 1;
                *summary.failures_by_reason.entry(error.reason()).or_insert(0) += 1;
            }
            JobOutcome::Cancelled => summary.cancelled += 1,
        }

        if matches!(result.outcome, JobOutcome::Cancelled) {
            continue;
        }
        summary.input_bytes += result.input.size;
        if !result.is_failure() {
            summary.output_bytes += fs::metadata(&result.output_path)
                .map(|m| m.len())
                .unwrap_or(0);
        }
    }
    summary
}
