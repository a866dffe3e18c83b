//! Removal of CODEOWNERS rules that match no file.
//!
//! Pruning happens in two steps. [`plan`] resolves ownership and splits the
//! rules file into the lines to keep and the rules nobody uses, without
//! touching the filesystem. [`apply`] then moves the original file to a
//! fresh backup path and puts the kept lines in its place.

use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};

use crate::{oracle::sanitize_output, Error, Resolver, Result};

/// A rule line that no file resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnusedRule {
    /// 1-based line number in the rules file.
    pub line: usize,
    /// The line as written, without its line terminator.
    pub text: String,
}

/// The outcome of [`plan`]: the exact bytes to keep plus the lines dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrunePlan {
    pub path: PathBuf,
    pub kept: Vec<u8>,
    pub unused: Vec<UnusedRule>,
}

impl PrunePlan {
    pub fn is_noop(&self) -> bool {
        self.unused.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PruneOutcome {
    /// Every rule matched at least one file; nothing was written.
    NothingToDo,
    Pruned {
        unused: Vec<UnusedRule>,
        backup: PathBuf,
        path: PathBuf,
    },
}

/// Work out which rule lines are unused. Comment, blank and invalid lines
/// always count as used, since they aren't rules.
pub fn plan(resolver: &Resolver) -> Result<PrunePlan> {
    let table = resolver.pattern_table()?;
    let mut used = table
        .entries()
        .iter()
        .map(|entry| !entry.is_rule())
        .collect::<Vec<_>>();

    for record in resolver.resolve()? {
        if let Some(flag) = record.line.and_then(|line| used.get_mut(line - 1)) {
            *flag = true;
        }
    }

    // Re-read rather than reuse the table so kept lines stay byte-for-byte
    let path = resolver.rules_path()?.to_path_buf();
    let source = fs::read(&path).map_err(|err| Error::io(&path, err))?;
    let (kept, unused) = partition_lines(&source, &used);
    Ok(PrunePlan { path, kept, unused })
}

// Lines past the end of `used` (the file grew since it was parsed) are kept.
fn partition_lines(source: &[u8], used: &[bool]) -> (Vec<u8>, Vec<UnusedRule>) {
    let mut kept = Vec::with_capacity(source.len());
    let mut unused = Vec::new();
    for (idx, line) in source.split_inclusive(|&b| b == b'\n').enumerate() {
        if used.get(idx).copied().unwrap_or(true) {
            kept.extend_from_slice(line);
        } else {
            unused.push(UnusedRule {
                line: idx + 1,
                text: line_text(line),
            });
        }
    }
    (kept, unused)
}

fn line_text(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    sanitize_output(line.to_vec())
}

/// Fail with [`Error::NotWritable`] unless `path` can be opened for writing.
/// The file is not modified.
pub fn check_writable(path: &Path) -> Result<()> {
    let not_writable = || Error::NotWritable {
        path: path.to_path_buf(),
    };
    let metadata = fs::metadata(path).map_err(|_| not_writable())?;
    if metadata.permissions().readonly() {
        return Err(not_writable());
    }
    OpenOptions::new()
        .write(true)
        .open(path)
        .map(|_| ())
        .map_err(|_| not_writable())
}

/// The first of `<path>.bak`, `<path>.bak2`, `<path>.bak3`, ... that does not
/// exist yet.
pub fn backup_path_for(path: &Path) -> PathBuf {
    let with_suffix = |suffix: String| {
        let mut name = path.as_os_str().to_owned();
        name.push(format!(".bak{}", suffix));
        PathBuf::from(name)
    };

    let mut candidate = with_suffix(String::new());
    let mut n = 2;
    while candidate.exists() {
        candidate = with_suffix(n.to_string());
        n += 1;
    }
    candidate
}

/// Replace the rules file with the plan's kept lines, moving the original to
/// a backup path. Returns the backup path.
///
/// The new contents are fully written next to the rules file before the
/// original is moved. If putting them in place fails, the original is moved
/// back.
pub fn apply(plan: &PrunePlan) -> Result<PathBuf> {
    let path = plan.path.as_path();
    check_writable(path)?;

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut replacement = tempfile::Builder::new()
        .prefix(".codeowners")
        .tempfile_in(dir)
        .map_err(|err| Error::io(dir, err))?;
    let written = replacement
        .write_all(&plan.kept)
        .and_then(|_| replacement.as_file().sync_all());
    written.map_err(|err| Error::io(replacement.path(), err))?;

    // Keep the original permissions on the rewritten file
    if let Ok(metadata) = fs::metadata(path) {
        if let Err(err) = fs::set_permissions(replacement.path(), metadata.permissions()) {
            log::warn!("could not copy permissions of {}: {}", path.display(), err);
        }
    }

    let backup = backup_path_for(path);
    fs::rename(path, &backup).map_err(|err| Error::io(path, err))?;
    log::info!("moved {} to {}", path.display(), backup.display());

    if let Err(err) = replacement.persist(path) {
        log::error!("could not replace {}: {}", path.display(), err.error);
        if let Err(restore) = fs::rename(&backup, path) {
            log::error!(
                "could not restore {} from {}: {}",
                path.display(),
                backup.display(),
                restore
            );
        }
        return Err(Error::io(path, err.error));
    }
    log::info!("wrote {} kept bytes to {}", plan.kept.len(), path.display());

    Ok(backup)
}

/// Plan and, when any rule is unused, apply a prune.
pub fn prune(resolver: &Resolver) -> Result<PruneOutcome> {
    let plan = plan(resolver)?;
    if plan.is_noop() {
        return Ok(PruneOutcome::NothingToDo);
    }
    let backup = apply(&plan)?;
    Ok(PruneOutcome::Pruned {
        unused: plan.unused,
        backup,
        path: plan.path,
    })
}
