use anyhow::Context;
use clap::Parser;
use comic_squeeze::batch::{convert_library, discover_inputs};
use comic_squeeze::cli::{Args, Commands};
use comic_squeeze::config::{Config, NormalizeSettings, ToolPaths};
use comic_squeeze::error::ConvertError;
use comic_squeeze::job::JobContext;
use comic_squeeze::logger::Reporter;
use comic_squeeze::tools::{check_dependencies, required_binaries, CancelToken};
use console::style;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // help and version go to stdout and are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", style("Error:").red().bold(), e);
            ExitCode::from(1)
        }
    }
}

fn run(args: Args) -> anyhow::Result<()> {
    let Commands::Convert {
        input,
        output,
        quality,
        max_width,
        max_height,
        format,
        jobs,
        timeout,
        scratch_dir,
        engine,
        unrar_bin,
        quiet,
        verbose,
    } = args.command;

    let settings = NormalizeSettings::new(quality, max_width, max_height, format)?;
    let mut tools = ToolPaths::default();
    if let Some(bin) = unrar_bin {
        tools.unrar = bin;
    }
    let mut config = Config::new(input, output)
        .with_normalize(settings)
        .with_tool_timeout(timeout.map(Duration::from_secs))
        .with_scratch_root(scratch_dir)
        .with_engine(engine)
        .with_tools(tools)
        .with_verbose(verbose);
    if let Some(jobs) = jobs {
        config = config.with_workers(jobs)?;
    }
    let config = config.resolve_input()?;

    let inputs = discover_inputs(&config.input_root, &config.output_root)?;
    let paths: Vec<PathBuf> = inputs.iter().map(|i| i.path.clone()).collect();
    check_dependencies(&required_binaries(&config, &paths))?;
    let config = config.create_output_root()?;

    let reporter = Arc::new(Reporter::new(quiet, verbose));
    print_banner(&reporter, &config);

    if inputs.is_empty() {
        reporter.warn("No comic files found to convert");
        return Ok(());
    }
    reporter.info(&format!("\nFiles to convert: {}", inputs.len()));

    let cancel = CancelToken::new();
    watch_for_interrupt(cancel.clone(), Arc::clone(&reporter))?;

    let ctx = Arc::new(JobContext::new(config, Arc::clone(&reporter), cancel));
    let summary = convert_library(ctx, inputs);
    reporter.restore_terminal();
    let summary = summary?;

    summary.print(&reporter);
    if summary.interrupted {
        return Err(ConvertError::Interrupted.into());
    }
    Ok(())
}

fn print_banner(reporter: &Reporter, config: &Config) {
    reporter.info(&format!("{}", style("=== COMIC SQUEEZE ===").green()));
    reporter.info(&format!("📁 Input:   {}", config.input_root.display()));
    reporter.info(&format!("📁 Output:  {}", config.output_root.display()));
    reporter.info(&format!("⚙️  Workers: {}", config.workers));
    reporter.info(&format!(
        "🎯 Pages:   {} q{}, max {}x{}",
        config.normalize.format,
        config.normalize.quality,
        config.normalize.max_width,
        config.normalize.max_height
    ));
    if let Some(timeout) = config.tool_timeout {
        reporter.verbose(&format!("tool timeout {:?}", timeout));
    }
}

/// Flips `cancel` on the first Ctrl-C. Jobs not yet started then come back
/// cancelled and running tools are killed.
fn watch_for_interrupt(cancel: CancelToken, reporter: Arc<Reporter>) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start the signal runtime")?;

    thread::Builder::new()
        .name("ctrl-c".to_string())
        .spawn(move || {
            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                cancel.cancel();
                reporter.warn("Interrupt received, stopping...");
            }
        })
        .context("failed to spawn the interrupt watcher")?;
    Ok(())
}
