use std::path::{Path, PathBuf};

use crate::{Error, Result};

/// Source of the repository-relative paths that ownership is resolved for.
pub trait FileLister {
    fn list_files(&self) -> Result<Vec<String>>;
}

/// A fixed list of paths.
impl FileLister for Vec<String> {
    fn list_files(&self) -> Result<Vec<String>> {
        Ok(self.clone())
    }
}

/// Lists every file below a directory, skipping the `.git` directory.
/// Paths are `/`-separated, relative to the root and sorted.
#[derive(Debug, Clone)]
pub struct WalkFiles {
    root: PathBuf,
}

impl WalkFiles {
    pub fn new(root: impl Into<PathBuf>) -> WalkFiles {
        WalkFiles { root: root.into() }
    }
}

impl FileLister for WalkFiles {
    fn list_files(&self) -> Result<Vec<String>> {
        let walker = walkdir::WalkDir::new(&self.root)
            .min_depth(1)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git");

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(&self.root).to_path_buf();
                Error::io(path, err.into())
            })?;
            if entry.file_type().is_dir() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(&self.root) {
                files.push(to_slash_path(relative));
            }
        }
        files.sort();
        Ok(files)
    }
}

fn to_slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
