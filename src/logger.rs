use crate::constants::{
    IMAGE_BAR_TEMPLATE, NAME_COLUMN_WIDTH, PROGRESS_BAR_TEMPLATE, PROGRESS_CHARS,
    STAGE_COLUMN_WIDTH,
};
use console::{pad_str, style, truncate_str, Alignment, Term};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;
use std::sync::Mutex;

/// Pipeline stage shown in front of each progress line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Started,
    Skipped,
    Pdf,
    Warning,
    Error,
    Completed,
    /// Completed, but the output came out larger than the input.
    Grown,
}

impl Stage {
    pub fn label(&self) -> &'static str {
        match self {
            Stage::Started => "STARTED",
            Stage::Skipped => "SKIPPED",
            Stage::Pdf => "PDF",
            Stage::Warning => "WARNING",
            Stage::Error => "ERROR",
            Stage::Completed | Stage::Grown => "COMPLETED",
        }
    }

    fn styled(&self) -> String {
        let padded = format!("{:<width$}", self.label(), width = STAGE_COLUMN_WIDTH);
        let styled = match self {
            Stage::Started | Stage::Skipped | Stage::Pdf => style(padded).cyan(),
            Stage::Warning | Stage::Grown => style(padded).yellow(),
            Stage::Error => style(padded).red(),
            Stage::Completed => style(padded).green(),
        };
        styled.to_string()
    }

    fn is_error(&self) -> bool {
        matches!(self, Stage::Error)
    }
}

/// Shortens `name` to `width` columns keeping its tail, then pads it to exactly `width`.
pub fn fit_name(name: &str, width: usize) -> String {
    if console::measure_text_width(name) <= width {
        return pad_str(name, width, Alignment::Left, None).into_owned();
    }

    let tail: String = {
        let chars: Vec<char> = name.chars().collect();
        let start = chars.len().saturating_sub(7);
        chars[start..].iter().collect()
    };
    let head_width = width.saturating_sub(console::measure_text_width(&tail) + 1);
    let head = truncate_str(name, head_width, "");
    let fitted = format!("{}…{}", head, tail);
    pad_str(&fitted, width, Alignment::Left, Some("")).into_owned()
}

/// The one console sink shared by every worker.
///
/// Lines go through the progress bars' `MultiProgress` so they never tear an
/// active bar, and an internal mutex keeps concurrent lines whole.
pub struct Reporter {
    multi: MultiProgress,
    lock: Mutex<()>,
    quiet: bool,
    verbose: bool,
    muted: bool,
}

impl Reporter {
    pub fn new(quiet: bool, verbose: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            lock: Mutex::new(()),
            quiet,
            verbose,
            muted: false,
        }
    }

    /// A reporter that draws nothing, for tests and embedding.
    pub fn hidden() -> Self {
        Self {
            multi: MultiProgress::with_draw_target(ProgressDrawTarget::hidden()),
            lock: Mutex::new(()),
            quiet: true,
            verbose: false,
            muted: true,
        }
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose && !self.quiet
    }

    /// `[HH:MM:SS] STAGE      name message`
    pub fn stage(&self, file: &Path, stage: Stage, message: &str) {
        if self.quiet && !stage.is_error() {
            return;
        }
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        let line = format!(
            "{} {} {} {}",
            chrono::Local::now().format("[%H:%M:%S]"),
            stage.styled(),
            fit_name(&name, NAME_COLUMN_WIDTH),
            message
        );
        self.line(&line);
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            self.line(message);
        }
    }

    pub fn verbose(&self, message: &str) {
        if self.is_verbose() {
            self.line(&format!("🔍 {}", message));
        }
    }

    pub fn warn(&self, message: &str) {
        if !self.quiet {
            self.line(&format!("⚠️  {}", message));
        }
    }

    /// Final report lines. Printed to stdout even in quiet mode.
    pub fn summary(&self, message: &str) {
        if self.muted {
            return;
        }
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.multi.is_hidden() || self.multi.println(message).is_err() {
            println!("{}", message);
        }
    }

    fn line(&self, text: &str) {
        let _guard = self.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if self.multi.is_hidden() {
            if !self.muted && (!self.quiet || text.starts_with('❌')) {
                eprintln!("{}", text);
            }
            return;
        }
        if self.multi.println(text).is_err() {
            eprintln!("{}", text);
        }
    }

    /// The overall files bar.
    pub fn files_bar(&self, total: u64) -> ProgressBar {
        let bar = self.add_bar(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(PROGRESS_BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(PROGRESS_CHARS),
        );
        bar.set_prefix(style("📦 Total progress").magenta().to_string());
        bar
    }

    /// A transient per-file bar for pages or images; clear it with `finish_and_clear`.
    pub fn item_bar(&self, file: &Path, total: u64, unit: &str) -> ProgressBar {
        let bar = self.add_bar(total);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(IMAGE_BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars(PROGRESS_CHARS),
        );
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        bar.set_prefix(fit_name(&name, NAME_COLUMN_WIDTH));
        bar.set_message(unit.to_string());
        bar
    }

    fn add_bar(&self, total: u64) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }
        self.multi.add(ProgressBar::new(total))
    }

    /// Puts the terminal back the way we found it.
    pub fn restore_terminal(&self) {
        let _ = self.multi.clear();
        let _ = Term::stderr().show_cursor();
        let _ = Term::stdout().show_cursor();
    }
}
