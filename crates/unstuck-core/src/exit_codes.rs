//! Process exit codes.
//!
//! `0`, `1` and `2` mirror `ApplyResult.exitCode`. Codes from 10 up mean the
//! command itself failed: 10-19 for problems the operator can fix (bad flags,
//! unreachable cluster, missing target), 20 and above for everything else.

use unstuck_common::{Error, ErrorCategory};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Nothing to do, or every action succeeded.
    Clean = 0,
    AllFailed = 1,
    /// Some actions failed or were skipped.
    Partial = 2,

    /// Bad flags, config file, or report input.
    ArgsError = 10,
    /// kubectl could not reach the cluster or was denied.
    ClusterError = 11,
    NotFound = 12,

    InternalError = 20,
    IoError = 21,
    TimeoutError = 22,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for a finished `apply`; anything unknown counts as partial.
    pub fn from_apply(code: i32) -> Self {
        match code {
            0 => ExitCode::Clean,
            1 => ExitCode::AllFailed,
            _ => ExitCode::Partial,
        }
    }

    pub fn for_error(err: &Error) -> Self {
        if let Error::NotFound { .. } = err {
            return ExitCode::NotFound;
        }
        if let Error::Timeout { .. } = err {
            return ExitCode::TimeoutError;
        }
        match err.category() {
            ErrorCategory::Input | ErrorCategory::Config => ExitCode::ArgsError,
            ErrorCategory::Cluster => ExitCode::ClusterError,
            ErrorCategory::Io => ExitCode::IoError,
            ErrorCategory::Action => ExitCode::InternalError,
        }
    }
}
