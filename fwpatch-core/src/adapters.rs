//! Default port implementations.

use crate::patchfile;
use crate::ports::{CommandRunner, PackageResolver, RunStatus};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;
use std::process::Command;
use tracing::{debug, warn};

/// Runs commands as child processes with inherited stdio.
#[derive(Debug, Clone, Default)]
pub struct ShellCommandRunner;

impl CommandRunner for ShellCommandRunner {
    fn run(&self, args: &[String]) -> anyhow::Result<RunStatus> {
        let (program, rest) = args.split_first().context("empty command line")?;
        debug!(program = program.as_str(), args = ?rest, "spawning");
        let status = Command::new(program)
            .args(rest)
            .status()
            .with_context(|| format!("spawn {}", program))?;
        Ok(RunStatus {
            code: status.code(),
        })
    }
}

/// Applies the patch in-process with `diffy` instead of spawning `patch`.
///
/// Reads the last two arguments as `<target> <patch_file>`, matching the
/// `patch <original> <patchfile>` call shape; the program name and any
/// flags before them are ignored. Returns status 1 when the diff does not
/// apply, like `patch(1)`.
#[derive(Debug, Clone, Default)]
pub struct BuiltinPatchRunner;

impl CommandRunner for BuiltinPatchRunner {
    fn run(&self, args: &[String]) -> anyhow::Result<RunStatus> {
        let [.., target, patch_file] = args else {
            anyhow::bail!("expected `<target> <patch_file>` arguments, got {:?}", args);
        };
        let target = Utf8Path::new(target);
        let original = fs::read_to_string(target).with_context(|| format!("read {}", target))?;
        let patch = patchfile::load_patch(Utf8Path::new(patch_file))?;

        match patchfile::apply_to_content(&original, &patch) {
            Ok(patched) => {
                fs::write(target, patched).with_context(|| format!("write {}", target))?;
                Ok(RunStatus::SUCCESS)
            }
            Err(e) => {
                warn!("{} does not apply to {}: {:#}", patch_file, target, e);
                Ok(RunStatus::FAILURE)
            }
        }
    }
}

/// Resolves packages from a PlatformIO core directory: `<core_dir>/packages/<name>`.
#[derive(Debug, Clone)]
pub struct PlatformioPackageResolver {
    pub core_dir: Utf8PathBuf,
}

impl PlatformioPackageResolver {
    pub fn new(core_dir: Utf8PathBuf) -> Self {
        Self { core_dir }
    }

    /// `$PLATFORMIO_CORE_DIR`, else `~/.platformio`.
    pub fn from_env() -> anyhow::Result<Self> {
        if let Some(dir) = std::env::var_os("PLATFORMIO_CORE_DIR") {
            let dir = Utf8PathBuf::from_path_buf(dir.into())
                .map_err(|p| anyhow::anyhow!("PLATFORMIO_CORE_DIR is not UTF-8: {}", p.display()))?;
            return Ok(Self::new(dir));
        }
        let home = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .context("cannot locate home directory; set PLATFORMIO_CORE_DIR")?;
        let home = Utf8PathBuf::from_path_buf(home.into())
            .map_err(|p| anyhow::anyhow!("home directory is not UTF-8: {}", p.display()))?;
        Ok(Self::new(home.join(".platformio")))
    }
}

impl PackageResolver for PlatformioPackageResolver {
    fn package_dir(&self, name: &str) -> anyhow::Result<Option<Utf8PathBuf>> {
        let dir = self.core_dir.join("packages").join(name);
        if dir.is_dir() {
            debug!(package = name, dir = dir.as_str(), "resolved package");
            Ok(Some(dir))
        } else {
            debug!(package = name, dir = dir.as_str(), "package directory missing");
            Ok(None)
        }
    }
}

/// In-memory package map for embedding and testing.
#[derive(Debug, Clone, Default)]
pub struct StaticPackageResolver {
    packages: BTreeMap<String, Utf8PathBuf>,
}

impl StaticPackageResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, name: impl Into<String>, dir: impl Into<Utf8PathBuf>) -> Self {
        self.packages.insert(name.into(), dir.into());
        self
    }
}

impl PackageResolver for StaticPackageResolver {
    fn package_dir(&self, name: &str) -> anyhow::Result<Option<Utf8PathBuf>> {
        Ok(self.packages.get(name).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn temp_root() -> (TempDir, Utf8PathBuf) {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        (temp, root)
    }

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn builtin_runner_rewrites_target() {
        let (_temp, root) = temp_root();
        let target = root.join("uart.c");
        let patch = root.join("fix.patch");
        std::fs::write(&target, "int thrhd = 112;\n").expect("write");
        std::fs::write(
            &patch,
            diffy::create_patch("int thrhd = 112;\n", "int thrhd = 1;\n").to_string(),
        )
        .expect("write patch");

        let status = BuiltinPatchRunner
            .run(&args(&["patch", target.as_str(), patch.as_str()]))
            .expect("run");

        assert!(status.success());
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "int thrhd = 1;\n");
    }

    #[test]
    fn builtin_runner_reports_failure_without_touching_target() {
        let (_temp, root) = temp_root();
        let target = root.join("uart.c");
        let patch = root.join("fix.patch");
        std::fs::write(&target, "something else\n").expect("write");
        std::fs::write(&patch, diffy::create_patch("a\n", "b\n").to_string()).expect("write patch");

        let status = BuiltinPatchRunner
            .run(&args(&["patch", target.as_str(), patch.as_str()]))
            .expect("run");

        assert_eq!(status, RunStatus::FAILURE);
        assert_eq!(std::fs::read_to_string(&target).expect("read"), "something else\n");
    }

    #[test]
    fn builtin_runner_rejects_short_command_line() {
        let err = BuiltinPatchRunner.run(&args(&["patch"])).expect_err("too short");
        assert!(err.to_string().contains("expected"));
    }

    #[cfg(unix)]
    #[test]
    fn shell_runner_reports_exit_codes() {
        let runner = ShellCommandRunner;
        assert!(runner.run(&args(&["true"])).expect("true").success());
        assert_eq!(runner.run(&args(&["false"])).expect("false").code, Some(1));
    }

    #[test]
    fn shell_runner_errors_when_program_is_missing() {
        let runner = ShellCommandRunner;
        assert!(runner.run(&args(&["fwpatch-no-such-program"])).is_err());
        assert!(runner.run(&[]).is_err());
    }

    #[test]
    fn platformio_resolver_finds_installed_packages() {
        let (_temp, root) = temp_root();
        let pkg = root.join("packages").join("framework-arduinoespressif32");
        std::fs::create_dir_all(&pkg).expect("mkdir");

        let resolver = PlatformioPackageResolver::new(root.clone());
        assert_eq!(
            resolver.package_dir("framework-arduinoespressif32").expect("resolve"),
            Some(pkg)
        );
        assert_eq!(resolver.package_dir("toolchain-xtensa32").expect("resolve"), None);
    }

    #[test]
    fn static_resolver_returns_registered_dirs() {
        let resolver = StaticPackageResolver::new().with_package("framework-a", "/opt/fw-a");
        assert_eq!(
            resolver.package_dir("framework-a").expect("resolve"),
            Some(Utf8PathBuf::from("/opt/fw-a"))
        );
        assert!(resolver.package_dir("framework-b").expect("resolve").is_none());
    }
}
