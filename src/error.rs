use std::ffi::OsString;
use std::io;
use std::path::PathBuf;
use std::process::ExitStatus;
use thiserror::Error;

/// Everything that can abort a merge run.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("cannot scan {path:?}")]
    Scan {
        path: PathBuf,
        source: walkdir::Error,
    },

    #[error("cannot read merge ledger {path:?}")]
    LedgerUnreadable { path: PathBuf, source: io::Error },

    /// The ledger exists but its content cannot be trusted. Never treated as
    /// an empty ledger, that would merge everything a second time.
    #[error("merge ledger {path:?} is corrupt: {reason}")]
    LedgerCorrupt { path: PathBuf, reason: String },

    #[error("cannot write merge ledger {path:?}")]
    LedgerWrite { path: PathBuf, source: io::Error },

    #[error("{program:?} not found, is ffmpeg installed?")]
    EngineMissing { program: OsString, source: io::Error },

    #[error("cannot talk to the merge process")]
    EngineIo { source: io::Error },

    #[error("merge process exited with {status}: {stderr}")]
    EngineFailed { status: ExitStatus, stderr: String },

    #[error("cannot publish {path:?}")]
    Publish { path: PathBuf, source: io::Error },
}
