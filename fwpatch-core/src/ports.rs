//! Port traits abstracting the build environment away from the applicator.

use camino::Utf8PathBuf;

/// Exit status reported by a [`CommandRunner`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    /// Exit code, or `None` if the process did not exit normally.
    pub code: Option<i32>,
}

impl RunStatus {
    pub const SUCCESS: RunStatus = RunStatus { code: Some(0) };
    pub const FAILURE: RunStatus = RunStatus { code: Some(1) };

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes an external command. `args[0]` is the program.
///
/// An `Err` means the command could not be run at all; a command that ran
/// and failed is reported through [`RunStatus`].
pub trait CommandRunner {
    fn run(&self, args: &[String]) -> anyhow::Result<RunStatus>;
}

/// Looks up where a named package has been extracted.
pub trait PackageResolver {
    /// Returns `None` when the package is not installed.
    fn package_dir(&self, name: &str) -> anyhow::Result<Option<Utf8PathBuf>>;
}
