//! Apply and status pipelines, extracted from the CLI.
//!
//! These entry points are environment-agnostic: package lookup and process
//! execution are performed through the port traits.

use crate::applicator::{PatchJob, PatchOutcome, PatchState, ensure_patched, patch_state};
use crate::error::{PatchResult, PreconditionError};
use crate::ports::{CommandRunner, PackageResolver};
use crate::settings::{ApplySettings, FrameworkSource, StatusSettings};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::debug;

/// Outcome of `run_status`.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub framework_root: Utf8PathBuf,
    pub sentinel: Utf8PathBuf,
    pub state: PatchState,
}

/// Locate the framework root for `source`.
pub fn resolve_framework_root(
    source: &FrameworkSource,
    resolver: &dyn PackageResolver,
) -> PatchResult<Utf8PathBuf> {
    let root = match source {
        FrameworkSource::Root(dir) => dir.clone(),
        FrameworkSource::Package(name) => resolver
            .package_dir(name)?
            .ok_or_else(|| PreconditionError::PackageNotFound { name: name.clone() })?,
    };
    if !root.is_dir() {
        return Err(PreconditionError::FrameworkRootMissing { path: root }.into());
    }
    debug!(framework_root = root.as_str(), "resolved framework root");
    Ok(root)
}

/// Build the job for `settings` against an already resolved root.
pub fn job_for(settings: &ApplySettings, framework_root: Utf8PathBuf) -> PatchJob {
    PatchJob {
        framework_root,
        target: settings.target.clone(),
        patch_file: project_path(&settings.project_dir, &settings.patch_file),
        sentinel: settings.sentinel.clone(),
        patch_command: settings.patch_command.clone(),
        write_sentinel: settings.write_sentinel,
        detect_applied: settings.detect_applied,
    }
}

/// Run the apply pipeline: resolve the framework, then ensure it is patched.
pub fn run_apply(
    settings: &ApplySettings,
    resolver: &dyn PackageResolver,
    runner: &dyn CommandRunner,
) -> PatchResult<PatchOutcome> {
    let root = resolve_framework_root(&settings.framework, resolver)?;
    let job = job_for(settings, root);
    ensure_patched(&job, runner)
}

/// Run the status pipeline.
pub fn run_status(
    settings: &StatusSettings,
    resolver: &dyn PackageResolver,
) -> PatchResult<StatusReport> {
    let root = resolve_framework_root(&settings.framework, resolver)?;
    let state = patch_state(&root, &settings.sentinel);
    Ok(StatusReport {
        sentinel: root.join(&settings.sentinel),
        framework_root: root,
        state,
    })
}

/// Anchor `rel` at `project_dir` unless it is already absolute.
pub fn project_path(project_dir: &Utf8Path, rel: &Utf8Path) -> Utf8PathBuf {
    if rel.is_absolute() {
        rel.to_path_buf()
    } else {
        project_dir.join(rel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{BuiltinPatchRunner, StaticPackageResolver};
    use crate::error::PatchError;
    use crate::settings::DEFAULT_PACKAGE;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    #[test]
    fn unknown_package_is_a_precondition_error() {
        let resolver = StaticPackageResolver::new();
        let err = resolve_framework_root(&FrameworkSource::default(), &resolver)
            .expect_err("unresolved");
        assert!(matches!(
            err,
            PatchError::Precondition(PreconditionError::PackageNotFound { ref name })
                if name == DEFAULT_PACKAGE
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn explicit_root_must_exist() {
        let (_temp, base) = temp_root();
        let source = FrameworkSource::Root(base.join("missing"));
        let err = resolve_framework_root(&source, &StaticPackageResolver::new())
            .expect_err("missing root");
        assert!(err.is_precondition());
    }

    #[test]
    fn patch_file_is_relative_to_project_dir() {
        let settings = ApplySettings {
            project_dir: Utf8PathBuf::from("/work/firmware"),
            ..Default::default()
        };
        let job = job_for(&settings, Utf8PathBuf::from("/pio/fw"));
        assert_eq!(
            job.patch_file,
            Utf8PathBuf::from("/work/firmware/patches/1-rxfifo_full_thrhd.patch")
        );
        assert_eq!(
            job.target_path(),
            Utf8PathBuf::from("/pio/fw/cores/esp32/esp32-hal-uart.c")
        );
        assert_eq!(job.sentinel_path(), Utf8PathBuf::from("/pio/fw/.patching-done"));
    }

    #[test]
    fn absolute_patch_file_is_kept() {
        let settings = ApplySettings {
            project_dir: Utf8PathBuf::from("/work/firmware"),
            patch_file: Utf8PathBuf::from("/shared/uart.patch"),
            ..Default::default()
        };
        let job = job_for(&settings, Utf8PathBuf::from("/pio/fw"));
        assert_eq!(job.patch_file, Utf8PathBuf::from("/shared/uart.patch"));
    }

    #[test]
    fn apply_then_status_through_package_lookup() {
        let (_temp, base) = temp_root();
        let fw = base.join("packages").join(DEFAULT_PACKAGE);
        std::fs::create_dir_all(fw.join("cores/esp32")).expect("mkdir");
        std::fs::write(fw.join("cores/esp32/esp32-hal-uart.c"), "A\n").expect("write");
        let project = base.join("project");
        std::fs::create_dir_all(project.join("patches")).expect("mkdir");
        std::fs::write(
            project.join("patches/1-rxfifo_full_thrhd.patch"),
            diffy::create_patch("A\n", "B\n").to_string(),
        )
        .expect("write patch");

        let resolver = StaticPackageResolver::new().with_package(DEFAULT_PACKAGE, fw.clone());
        let status_settings = StatusSettings::default();
        let before = run_status(&status_settings, &resolver).expect("status");
        assert_eq!(before.state, PatchState::Unpatched);

        let settings = ApplySettings {
            project_dir: project,
            ..Default::default()
        };
        let outcome = run_apply(&settings, &resolver, &BuiltinPatchRunner).expect("apply");
        assert_eq!(outcome, PatchOutcome::Applied);

        let after = run_status(&status_settings, &resolver).expect("status");
        assert_eq!(after.state, PatchState::Patched);
        assert_eq!(after.sentinel, fw.join(".patching-done"));
    }
}
