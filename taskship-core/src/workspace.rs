//! Per-task scratch directory.
//!
//! A [`Workspace`] owns a fresh temporary directory with an `attachments/`
//! subtree and a project subtree. Dropping it removes the directory on every
//! exit path unless retention was requested, in which case the tree is left
//! on disk and its location is logged.

use std::io;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{info, warn};

use crate::naming::slugify;

pub struct Workspace {
    dir: Option<TempDir>,
    root: PathBuf,
    attachments_dir: PathBuf,
    project_dir: PathBuf,
    retain: bool,
}

impl Workspace {
    /// Create the workspace under `parent` (system temp dir when `None`).
    pub fn create(parent: Option<&Path>, task: &str, retain: bool) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("task-");
        let dir = match parent {
            Some(parent) => {
                std::fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        let root = dir.path().to_path_buf();
        let attachments_dir = root.join("attachments");
        let project_name = match slugify(task) {
            name if name.is_empty() || name == "attachments" => "project".to_string(),
            name => name,
        };
        let project_dir = root.join(project_name);
        std::fs::create_dir_all(&attachments_dir)?;
        std::fs::create_dir_all(&project_dir)?;
        info!(root = %root.display(), retain, "[WORKSPACE] created");
        Ok(Self {
            dir: Some(dir),
            root,
            attachments_dir,
            project_dir,
            retain,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn attachments_dir(&self) -> &Path {
        &self.attachments_dir
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        let Some(dir) = self.dir.take() else {
            return;
        };
        if self.retain {
            let kept = dir.keep();
            info!(root = %kept.display(), "[WORKSPACE] retained build artifacts");
            return;
        }
        match dir.close() {
            Ok(()) => info!(root = %self.root.display(), "[WORKSPACE] cleaned up"),
            Err(e) => warn!(root = %self.root.display(), error = ?e, "[WORKSPACE] cleanup failed"),
        }
    }
}
