use crate::constants::{STAGING_DIR_NAME, WORKSPACE_PREFIX};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Scratch directory owned by exactly one job.
///
/// The directory tree is removed when the workspace is dropped, so every exit
/// path of a job (including early returns and panics) releases it.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Creates a fresh directory under `scratch_root`, or the system temp dir.
    pub fn create(scratch_root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(WORKSPACE_PREFIX);
        let dir = match scratch_root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };
        Ok(Self { dir })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Subdirectory for safe copies of inputs. Its contents are never packed.
    pub fn staging_dir(&self) -> io::Result<PathBuf> {
        let staging = self.staging_path();
        fs::create_dir_all(&staging)?;
        Ok(staging)
    }

    pub fn staging_path(&self) -> PathBuf {
        self.root().join(STAGING_DIR_NAME)
    }

    pub fn is_staging(&self, path: &Path) -> bool {
        path.starts_with(self.staging_path())
    }

    /// Removes the tree now and reports failure instead of swallowing it.
    pub fn close(self) -> io::Result<()> {
        self.dir.close()
    }
}
