use crate::constants::PDF_PAGE_PREFIX;
use crate::detect::FileKind;
use crate::error::{JobError, ToolError};
use crate::logger::{Reporter, Stage};
use crate::tools::Toolkit;
use crate::workspace::Workspace;
use std::fs;
use std::path::{Path, PathBuf};

/// Populates `workspace` with the raw page images of `input`.
pub fn extract(
    input: &Path,
    kind: FileKind,
    workspace: &Workspace,
    toolkit: &Toolkit,
    reporter: &Reporter,
) -> Result<(), JobError> {
    match kind {
        FileKind::Zip => extract_zip(input, workspace, toolkit),
        FileKind::Rar => {
            toolkit.rar_extractor.extract(input, workspace.root())?;
            Ok(())
        }
        FileKind::Pdf => rasterize_pdf(input, workspace, toolkit, reporter),
        FileKind::Image => stage_image(input, workspace),
        FileKind::Unknown => Err(JobError::UnsupportedType(kind.mime_type().to_string())),
    }
}

/// Verifies, then extracts, a zip through a plain ASCII copy of it.
fn extract_zip(input: &Path, workspace: &Workspace, toolkit: &Toolkit) -> Result<(), JobError> {
    let staging = workspace.staging_dir()?;
    let copy = tempfile::Builder::new()
        .prefix("input-")
        .suffix(".zip")
        .tempfile_in(&staging)?
        .into_temp_path();
    fs::copy(input, &copy)?;

    toolkit.zip_verifier.verify(&copy).map_err(|e| {
        if e.is_rejection() {
            JobError::CorruptArchive(e)
        } else {
            JobError::Process(e)
        }
    })?;
    toolkit.zip_extractor.extract(&copy, workspace.root())?;
    copy.close()?;
    Ok(())
}

fn pdf_error(error: ToolError) -> JobError {
    match error {
        ToolError::Cancelled { .. } | ToolError::TimedOut { .. } => JobError::Process(error),
        other => JobError::Pdf(other.to_string()),
    }
}

pub fn page_file_name(page: u32) -> String {
    format!("{}{:03}.png", PDF_PAGE_PREFIX, page)
}

fn rasterize_pdf(
    input: &Path,
    workspace: &Workspace,
    toolkit: &Toolkit,
    reporter: &Reporter,
) -> Result<(), JobError> {
    let rasterizer = &toolkit.rasterizer;
    let pages = rasterizer.page_count(input).map_err(pdf_error)?;
    if pages == 0 {
        return Err(JobError::Pdf("document has no pages".to_string()));
    }
    reporter.stage(input, Stage::Pdf, &format!("rasterizing {} pages", pages));

    let bar = reporter.item_bar(input, pages as u64, "pages");
    let mut rendered: Vec<PathBuf> = Vec::with_capacity(pages as usize);
    for page in 1..=pages {
        let output = workspace.root().join(page_file_name(page));
        let result = rasterizer.rasterize_page(input, page, &output);
        if let Err(e) = result {
            bar.finish_and_clear();
            return Err(pdf_error(e));
        }
        if !output.is_file() {
            bar.finish_and_clear();
            return Err(JobError::Pdf(format!("page {} was not rendered", page)));
        }
        rendered.push(output);
        bar.inc(1);
    }
    bar.finish_and_clear();

    rasterizer.finish_pages(&rendered).map_err(pdf_error)
}

fn stage_image(input: &Path, workspace: &Workspace) -> Result<(), JobError> {
    let name = input
        .file_name()
        .ok_or_else(|| JobError::UnsupportedType("image without a file name".to_string()))?;
    fs::copy(input, workspace.root().join(name))?;
    Ok(())
}
