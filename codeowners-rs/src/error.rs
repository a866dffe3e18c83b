use std::{io, path::PathBuf, process::ExitStatus};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while locating, resolving or pruning a CODEOWNERS file.
///
/// Malformed rule lines are not errors: they are logged and degrade to
/// blank entries in the [`crate::parser::PatternTable`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("CODEOWNERS file does not exist under {}", root.display())]
    RulesFileNotFound { root: PathBuf },

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("`{program}` exited with {status}: {stderr}")]
    Command {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("malformed matcher output line: {line:?}")]
    MalformedOracleOutput { line: String },

    #[error("matcher reported line {line} for {file}, which is not a rule")]
    UnknownRuleLine { line: usize, file: String },

    #[error("No write access to {}; file not written.", path.display())]
    NotWritable { path: PathBuf },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
