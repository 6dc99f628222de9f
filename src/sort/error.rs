/// Error taxonomy for the sort engine.
///
/// Input and worker failures abort the job before merge output starts; merge
/// and output failures abort mid-stream. Cleanup failures are reported
/// separately and never change the outcome of the job.
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::common::io_error_msg;

/// Why a user-supplied source could not be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputErrorKind {
    NotFound,
    IsADirectory,
    PermissionDenied,
    Other,
}

impl InputErrorKind {
    /// Classify an I/O error raised while opening or reading a source.
    pub fn classify(e: &io::Error) -> Self {
        #[cfg(unix)]
        {
            if e.raw_os_error() == Some(libc::EISDIR) {
                return InputErrorKind::IsADirectory;
            }
        }
        match e.kind() {
            io::ErrorKind::NotFound => InputErrorKind::NotFound,
            io::ErrorKind::PermissionDenied => InputErrorKind::PermissionDenied,
            _ => InputErrorKind::Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum SortError {
    #[error("{}", input_message(.name, .kind, .source))]
    Input {
        name: String,
        kind: InputErrorKind,
        #[source]
        source: io::Error,
    },

    #[error("worker malfunction: {}", io_error_msg(.0))]
    Worker(#[source] io::Error),

    #[error("unable to read temporary file {}: {}", .path.display(), io_error_msg(.source))]
    MergeIo {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write failed: {}", io_error_msg(.0))]
    Output(#[source] io::Error),

    #[error("{0}")]
    Config(String),
}

impl SortError {
    pub fn input(name: &str, source: io::Error) -> Self {
        SortError::Input {
            name: name.to_string(),
            kind: InputErrorKind::classify(&source),
            source,
        }
    }
}

fn input_message(name: &str, kind: &InputErrorKind, source: &io::Error) -> String {
    match kind {
        InputErrorKind::IsADirectory => format!("read failed: {}: Is a directory", name),
        InputErrorKind::NotFound => format!("cannot read: {}: No such file or directory", name),
        InputErrorKind::PermissionDenied => format!("cannot read: {}: Permission denied", name),
        InputErrorKind::Other => format!("read failed: {}: {}", name, io_error_msg(source)),
    }
}

/// Failure closing or deleting a Run's backing file.
#[derive(Debug, Error)]
#[error("failed to remove temporary file {}: {}", .path.display(), io_error_msg(.source))]
pub struct CleanupError {
    pub path: PathBuf,
    #[source]
    pub source: io::Error,
}
