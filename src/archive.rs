use crate::constants::PARTIAL_SUFFIX;
use crate::error::JobError;
use crate::tools::ArchivePacker;
use crate::workspace::Workspace;
use std::ffi::OsString;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Every file left in the workspace, relative to its root and sorted.
/// The staging directory is never included.
pub fn collect_entries(workspace: &Workspace) -> io::Result<Vec<PathBuf>> {
    let root = workspace.root();
    let mut entries = Vec::new();
    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|e| !workspace.is_staging(e.path()));
    for entry in walker {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Ok(relative) = entry.path().strip_prefix(root) {
            entries.push(relative.to_path_buf());
        }
    }
    entries.sort();
    Ok(entries)
}

fn partial_path(output: &Path) -> PathBuf {
    let mut name: OsString = output.file_name().unwrap_or_default().to_owned();
    name.push(".");
    name.push(PARTIAL_SUFFIX);
    output.with_file_name(name)
}

/// Packs the workspace into `output`.
///
/// The archive is written beside `output` and renamed into place only once
/// complete, so a failed pack leaves nothing at `output`. Returns the number
/// of packed entries.
pub fn pack_workspace(
    workspace: &Workspace,
    packer: &dyn ArchivePacker,
    output: &Path,
) -> Result<usize, JobError> {
    let entries = collect_entries(workspace)?;
    if entries.is_empty() {
        return Err(JobError::NoImagesFound);
    }

    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let partial = partial_path(output);
    // 7z appends to an existing archive
    if partial.exists() {
        fs::remove_file(&partial)?;
    }

    if let Err(e) = packer.pack(workspace.root(), &entries, &partial) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    if let Err(e) = fs::rename(&partial, output) {
        let _ = fs::remove_file(&partial);
        return Err(e.into());
    }
    Ok(entries.len())
}
