//! Git-backed collaborators: repository root discovery, tracked file
//! listing and `check-ignore` as the match oracle.

use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::{Command, Output, Stdio},
    thread,
};

use crate::{
    files::FileLister,
    oracle::{parse_check_ignore_output_nul, sanitize_output, MatchOracle, MatchResult},
    Error, Result,
};

/// Find the top level of the work tree containing `dir`.
pub fn toplevel(dir: &Path) -> Result<PathBuf> {
    let output = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .current_dir(dir)
        .output()
        .map_err(|err| Error::io(dir, err))?;
    let stdout = check_status("git rev-parse", output)?;
    Ok(PathBuf::from(sanitize_output(stdout).trim_end()))
}

/// Runs git inside a work tree.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    pub fn new(root: impl Into<PathBuf>) -> Git {
        Git { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new("git");
        cmd.current_dir(&self.root);
        cmd
    }
}

impl FileLister for Git {
    fn list_files(&self) -> Result<Vec<String>> {
        let output = self
            .command()
            .args(["ls-files", "-z"])
            .output()
            .map_err(|err| Error::io(&self.root, err))?;
        let stdout = check_status("git ls-files", output)?;
        let mut files = sanitize_output(stdout)
            .split('\0')
            .filter(|f| !f.is_empty())
            .map(str::to_owned)
            .collect::<Vec<_>>();
        // Unmerged paths are listed once per stage
        files.dedup();
        log::debug!("git ls-files listed {} files", files.len());
        Ok(files)
    }
}

impl MatchOracle for Git {
    /// Git has no way to apply an arbitrary pattern file to tracked paths
    /// directly, so the patterns are installed as the global excludes file
    /// and `check-ignore` is asked, without consulting the index, which
    /// pattern (if any) ignores each path.
    fn match_paths(&self, patterns: &[&str], files: &[String]) -> Result<Vec<MatchResult>> {
        if files.is_empty() {
            return Ok(Vec::new());
        }

        let mut pattern_file = tempfile::Builder::new()
            .prefix("codeowner_patterns")
            .tempfile()
            .map_err(|err| Error::io(std::env::temp_dir(), err))?;
        let written = pattern_file
            .write_all(patterns.join("\n").as_bytes())
            .and_then(|_| pattern_file.flush());
        written.map_err(|err| Error::io(pattern_file.path(), err))?;

        let mut child = self
            .command()
            .arg("-c")
            .arg(format!("core.excludesFile={}", pattern_file.path().display()))
            .args(["-c", "core.quotePath=false"])
            .args([
                "check-ignore",
                "--no-index",
                "--verbose",
                "--non-matching",
                "--stdin",
                "-z",
            ])
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| Error::io(&self.root, err))?;
        log::debug!(
            "matching {} files against {} patterns with git check-ignore",
            files.len(),
            patterns.len()
        );

        // Feed stdin from another thread so a full stdout pipe can't stall us
        let mut stdin = child.stdin.take().ok_or_else(|| {
            Error::io(&self.root, io::Error::new(io::ErrorKind::Other, "stdin was not captured"))
        })?;
        // NUL-separated, so names with newlines or quotes pass through as-is
        let input = files.join("\0") + "\0";
        let writer = thread::spawn(move || stdin.write_all(input.as_bytes()));

        let output = child
            .wait_with_output()
            .map_err(|err| Error::io(&self.root, err))?;
        if let Ok(Err(err)) = writer.join() {
            // A broken pipe means git exited early; its status says why
            if err.kind() != io::ErrorKind::BrokenPipe {
                return Err(Error::io(&self.root, err));
            }
        }

        // check-ignore exits with 1 when no path is ignored
        let stdout = match output.status.code() {
            Some(1) => output.stdout,
            _ => check_status("git check-ignore", output)?,
        };
        parse_check_ignore_output_nul(&sanitize_output(stdout))
    }
}

fn check_status(program: &str, output: Output) -> Result<Vec<u8>> {
    if output.status.success() {
        Ok(output.stdout)
    } else {
        Err(Error::Command {
            program: program.to_owned(),
            status: output.status,
            stderr: sanitize_output(output.stderr).trim_end().to_owned(),
        })
    }
}
