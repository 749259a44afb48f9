//! Sentinel-guarded patch application.
//!
//! A framework instance moves from [`PatchState::Unpatched`] to
//! [`PatchState::Patched`] once the patch tool succeeds and the sentinel is
//! written. Re-extracting the framework deletes the sentinel and resets it.

use crate::error::{PatchApplicationError, PatchResult, PreconditionError};
use crate::patchfile;
use crate::ports::CommandRunner;
use crate::settings::{DEFAULT_PATCH_PROGRAM, DEFAULT_SENTINEL};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Observable state of one extracted framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchState {
    Unpatched,
    Patched,
}

/// What a call to [`ensure_patched`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// The sentinel was present; nothing was touched.
    AlreadyPatched,
    /// The patch tool ran successfully.
    Applied,
    /// The target already held the patched content; the tool was not run.
    DetectedApplied,
}

/// One patch to apply to one framework instance.
#[derive(Debug, Clone)]
pub struct PatchJob {
    pub framework_root: Utf8PathBuf,
    /// Relative to `framework_root`.
    pub target: Utf8PathBuf,
    /// Absolute, or relative to the process working directory.
    pub patch_file: Utf8PathBuf,
    /// Relative to `framework_root`.
    pub sentinel: Utf8PathBuf,
    /// Program and leading arguments; target and patch file are appended.
    pub patch_command: Vec<String>,
    pub write_sentinel: bool,
    pub detect_applied: bool,
}

impl PatchJob {
    pub fn new(
        framework_root: impl Into<Utf8PathBuf>,
        target: impl Into<Utf8PathBuf>,
        patch_file: impl Into<Utf8PathBuf>,
    ) -> Self {
        Self {
            framework_root: framework_root.into(),
            target: target.into(),
            patch_file: patch_file.into(),
            sentinel: Utf8PathBuf::from(DEFAULT_SENTINEL),
            patch_command: vec![DEFAULT_PATCH_PROGRAM.to_string()],
            write_sentinel: true,
            detect_applied: true,
        }
    }

    pub fn with_sentinel(mut self, sentinel: impl Into<Utf8PathBuf>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    pub fn sentinel_path(&self) -> Utf8PathBuf {
        self.framework_root.join(&self.sentinel)
    }

    pub fn target_path(&self) -> Utf8PathBuf {
        self.framework_root.join(&self.target)
    }

    fn command_line(&self, target: &Utf8Path) -> Vec<String> {
        let mut args = self.patch_command.clone();
        args.push(target.to_string());
        args.push(self.patch_file.to_string());
        args
    }
}

/// Report whether the sentinel under `framework_root` exists.
pub fn patch_state(framework_root: &Utf8Path, sentinel: &Utf8Path) -> PatchState {
    if framework_root.join(sentinel).is_file() {
        PatchState::Patched
    } else {
        PatchState::Unpatched
    }
}

/// Apply `job` unless its sentinel says it already was.
///
/// Inputs are only checked when the sentinel is absent. A failed tool run
/// leaves the sentinel unwritten so the next build retries. A directory at
/// the sentinel path is rejected up front when the sentinel is to be
/// written, before the target is touched.
pub fn ensure_patched(job: &PatchJob, runner: &dyn CommandRunner) -> PatchResult<PatchOutcome> {
    let sentinel = job.sentinel_path();
    if sentinel.is_file() {
        debug!(sentinel = sentinel.as_str(), "sentinel present; skipping patch");
        return Ok(PatchOutcome::AlreadyPatched);
    }

    if !job.framework_root.is_dir() {
        return Err(PreconditionError::FrameworkRootMissing {
            path: job.framework_root.clone(),
        }
        .into());
    }
    let target = job.target_path();
    if !target.is_file() {
        return Err(PreconditionError::TargetMissing { path: target }.into());
    }
    if !job.patch_file.is_file() {
        return Err(PreconditionError::PatchFileMissing {
            path: job.patch_file.clone(),
        }
        .into());
    }
    if job.write_sentinel && sentinel.exists() {
        return Err(PreconditionError::SentinelNotAFile { path: sentinel }.into());
    }

    if job.detect_applied && target_already_patched(&target, &job.patch_file) {
        info!(
            target = target.as_str(),
            "target already contains the patch; not running the patch tool"
        );
        finish(job, &sentinel)?;
        return Ok(PatchOutcome::DetectedApplied);
    }

    if job.patch_command.is_empty() {
        return Err(anyhow::anyhow!("patch command is empty").into());
    }
    let args = job.command_line(&target);
    let command = args.join(" ");
    info!(command = command.as_str(), "applying patch");

    let status = runner
        .run(&args)
        .with_context(|| format!("run `{}`", command))?;
    if !status.success() {
        warn!(command = command.as_str(), code = ?status.code, "patch tool failed");
        return Err(PatchApplicationError {
            command,
            code: status.code,
        }
        .into());
    }

    finish(job, &sentinel)?;
    Ok(PatchOutcome::Applied)
}

fn finish(job: &PatchJob, sentinel: &Utf8Path) -> PatchResult<()> {
    if !job.write_sentinel {
        debug!("sentinel writing disabled");
        return Ok(());
    }
    write_sentinel(sentinel)?;
    info!(sentinel = sentinel.as_str(), "wrote sentinel");
    Ok(())
}

fn write_sentinel(path: &Utf8Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create parent dir for {}", path))?;
    }
    fs::write(path, b"").with_context(|| format!("write sentinel {}", path))
}

fn target_already_patched(target: &Utf8Path, patch_file: &Utf8Path) -> bool {
    let current = match fs::read_to_string(target) {
        Ok(s) => s,
        Err(e) => {
            debug!("cannot read {} as text: {}", target, e);
            return false;
        }
    };
    match patchfile::load_patch(patch_file) {
        Ok(patch) => patchfile::is_already_applied(&current, &patch),
        Err(e) => {
            debug!("cannot load {}: {:#}", patch_file, e);
            false
        }
    }
}
