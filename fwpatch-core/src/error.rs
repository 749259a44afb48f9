//! Error types for fwpatch.
//!
//! This module defines error types that distinguish between:
//! - Precondition failures (exit code 2): missing target, patch file or framework root,
//!   or a sentinel path blocked by a directory
//! - Patch application failures and runtime errors (exit code 1)

use camino::Utf8PathBuf;
use thiserror::Error;

/// The top-level error type for fwpatch operations.
#[derive(Debug, Error)]
pub enum PatchError {
    /// An input the applicator needs is absent (exit code 2).
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The patch tool ran and reported failure (exit code 1).
    #[error("patch application failed: {0}")]
    PatchApplication(#[from] PatchApplicationError),

    /// A runtime/tool error occurred (exit code 1).
    /// This includes I/O errors while spawning the tool or writing the sentinel.
    #[error("runtime error: {0:#}")]
    Runtime(#[from] anyhow::Error),
}

/// Inputs that must exist before a patch is attempted.
#[derive(Debug, Error)]
pub enum PreconditionError {
    /// The package registry has no directory for the requested package.
    #[error("package '{name}' is not installed")]
    PackageNotFound { name: String },

    /// The framework root does not exist or is not a directory.
    #[error("framework root {path} is not a directory")]
    FrameworkRootMissing { path: Utf8PathBuf },

    /// The source file to patch is absent.
    #[error("target file {path} does not exist")]
    TargetMissing { path: Utf8PathBuf },

    /// The patch file is absent.
    #[error("patch file {path} does not exist")]
    PatchFileMissing { path: Utf8PathBuf },

    /// Something other than a regular file occupies the sentinel path, so
    /// the sentinel could never be written.
    #[error("sentinel path {path} exists but is not a file")]
    SentinelNotAFile { path: Utf8PathBuf },
}

/// The patch tool exited unsuccessfully.
#[derive(Debug, Error)]
#[error("`{command}` exited with {}", describe_code(.code))]
pub struct PatchApplicationError {
    /// The command line that was run, joined with spaces.
    pub command: String,
    /// Exit code, or `None` if the process was terminated by a signal.
    pub code: Option<i32>,
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (terminated by signal)".to_string(),
    }
}

impl PatchError {
    /// Returns true if this is a precondition failure (exit code 2).
    pub fn is_precondition(&self) -> bool {
        matches!(self, PatchError::Precondition(_))
    }

    /// Returns the recommended exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            PatchError::Precondition(_) => 2,
            PatchError::PatchApplication(_) | PatchError::Runtime(_) => 1,
        }
    }
}

/// Result type alias using PatchError.
pub type PatchResult<T> = Result<T, PatchError>;

#[cfg(test)]
mod tests {
    use super::{PatchApplicationError, PatchError, PreconditionError};
    use camino::Utf8PathBuf;

    #[test]
    fn precondition_reports_exit_code_2() {
        let err = PatchError::from(PreconditionError::TargetMissing {
            path: Utf8PathBuf::from("fw/cores/esp32/esp32-hal-uart.c"),
        });
        assert!(err.is_precondition());
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("precondition failed"));
        assert!(err.to_string().contains("esp32-hal-uart.c"));
    }

    #[test]
    fn patch_application_reports_exit_code_1() {
        let err = PatchError::from(PatchApplicationError {
            command: "patch a.c fix.patch".to_string(),
            code: Some(1),
        });
        assert!(!err.is_precondition());
        assert_eq!(err.exit_code(), 1);
        assert_eq!(
            err.to_string(),
            "patch application failed: `patch a.c fix.patch` exited with status 1"
        );
    }

    #[test]
    fn signal_termination_is_described() {
        let err = PatchApplicationError {
            command: "patch".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn runtime_error_reports_exit_code_1() {
        let err = PatchError::from(anyhow::anyhow!("boom"));
        assert!(!err.is_precondition());
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("runtime error"));
    }
}
