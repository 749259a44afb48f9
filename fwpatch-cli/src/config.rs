//! Configuration file loading for fwpatch.
//!
//! Discovers and loads `fwpatch.toml` from the project directory.
//! Merges config file settings with CLI arguments (CLI takes precedence).

use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use fwpatch_core::pipeline::project_path;
use fwpatch_core::settings::{
    ApplySettings, DEFAULT_PACKAGE, DEFAULT_PATCH_FILE, DEFAULT_PATCH_PROGRAM, DEFAULT_SENTINEL,
    DEFAULT_TARGET, FrameworkSource, StatusSettings,
};
use serde::Deserialize;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "fwpatch.toml";

/// Top-level configuration from fwpatch.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FwpatchConfig {
    /// Where the framework lives.
    pub framework: FrameworkConfig,

    /// What to patch and how.
    pub patch: PatchConfig,
}

/// Framework section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FrameworkConfig {
    /// Package name looked up in the PlatformIO core directory.
    pub package: String,

    /// Explicit framework directory; wins over `package`.
    pub root: Option<Utf8PathBuf>,
}

impl Default for FrameworkConfig {
    fn default() -> Self {
        Self {
            package: DEFAULT_PACKAGE.to_string(),
            root: None,
        }
    }
}

/// Patch section of the config.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PatchConfig {
    /// Target file, relative to the framework root.
    pub target: Utf8PathBuf,

    /// Patch file, relative to the project directory.
    pub file: Utf8PathBuf,

    /// Sentinel file, relative to the framework root.
    pub sentinel: Utf8PathBuf,

    /// Patch program and leading arguments.
    pub command: Vec<String>,

    /// Apply in-process instead of running `command`.
    pub builtin: bool,

    pub write_sentinel: bool,

    pub detect_applied: bool,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            target: Utf8PathBuf::from(DEFAULT_TARGET),
            file: Utf8PathBuf::from(DEFAULT_PATCH_FILE),
            sentinel: Utf8PathBuf::from(DEFAULT_SENTINEL),
            command: vec![DEFAULT_PATCH_PROGRAM.to_string()],
            builtin: false,
            write_sentinel: true,
            detect_applied: true,
        }
    }
}

/// Path of the config file for `project_dir`, if one exists.
///
/// Only `<project_dir>/fwpatch.toml` is considered; parent directories are
/// not searched, so a build hook always reads the config of the project it
/// was pointed at.
pub fn discover_config(project_dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let path = project_dir.join(CONFIG_FILE_NAME);
    let found = path.is_file();
    debug!(path = path.as_str(), found, "config lookup");
    found.then_some(path)
}

/// Read and parse the config file at `path`.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<FwpatchConfig> {
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path))?;
    parse_config(&contents).with_context(|| format!("parse {}", path))
}

/// Parse config text. Missing sections and keys fall back to the
/// ESP32 UART patch layout.
pub fn parse_config(contents: &str) -> anyhow::Result<FwpatchConfig> {
    toml::from_str(contents).context("invalid TOML")
}

/// Config for `project_dir`, or the built-in layout when it has none.
///
/// Relative paths inside the file are left as written; [`ConfigMerger`]
/// anchors `framework.root` and `patch.file` to `project_dir`.
pub fn load_or_default(project_dir: &Utf8Path) -> anyhow::Result<FwpatchConfig> {
    discover_config(project_dir)
        .map(|path| load_config(&path))
        .unwrap_or_else(|| Ok(FwpatchConfig::default()))
}

/// CLI values that locate the framework and its files.
#[derive(Debug, Clone, Default)]
pub struct LocateArgs {
    pub framework_root: Option<Utf8PathBuf>,
    pub package: Option<String>,
    pub sentinel: Option<Utf8PathBuf>,
}

/// CLI values specific to `apply`.
#[derive(Debug, Clone, Default)]
pub struct ApplyOverrides {
    pub target: Option<Utf8PathBuf>,
    pub patch: Option<Utf8PathBuf>,
    pub builtin: bool,
    pub no_sentinel: bool,
    pub no_detect: bool,
}

/// Builder for merging config file with CLI arguments.
pub struct ConfigMerger {
    config: FwpatchConfig,
}

impl ConfigMerger {
    /// Create a new merger from a loaded config.
    pub fn new(config: FwpatchConfig) -> Self {
        Self { config }
    }

    /// Whether the in-process runner should be used.
    ///
    /// The CLI `--builtin` flag turns it on; it cannot turn a config `true` off.
    pub fn use_builtin(&self, overrides: &ApplyOverrides) -> bool {
        overrides.builtin || self.config.patch.builtin
    }

    /// CLI/env roots stay relative to the working directory; a relative
    /// config `root` is relative to the project directory holding the file.
    fn framework(&self, project_dir: &Utf8Path, locate: &LocateArgs) -> FrameworkSource {
        if let Some(root) = &locate.framework_root {
            return FrameworkSource::Root(root.clone());
        }
        if let Some(name) = &locate.package {
            return FrameworkSource::Package(name.clone());
        }
        match &self.config.framework.root {
            Some(root) => FrameworkSource::Root(project_path(project_dir, root)),
            None => FrameworkSource::Package(self.config.framework.package.clone()),
        }
    }

    /// Merge with apply command CLI arguments.
    ///
    /// CLI values replace config values; `--no-*` flags switch config-enabled
    /// behaviour off.
    pub fn merge_apply_args(
        &self,
        project_dir: &Utf8Path,
        locate: &LocateArgs,
        overrides: &ApplyOverrides,
    ) -> ApplySettings {
        let patch = &self.config.patch;
        ApplySettings {
            project_dir: project_dir.to_path_buf(),
            framework: self.framework(project_dir, locate),
            target: overrides.target.clone().unwrap_or_else(|| patch.target.clone()),
            patch_file: overrides.patch.clone().unwrap_or_else(|| patch.file.clone()),
            sentinel: locate.sentinel.clone().unwrap_or_else(|| patch.sentinel.clone()),
            patch_command: patch.command.clone(),
            write_sentinel: patch.write_sentinel && !overrides.no_sentinel,
            detect_applied: patch.detect_applied && !overrides.no_detect,
        }
    }

    /// Merge with status command CLI arguments.
    pub fn merge_status_args(
        &self,
        project_dir: &Utf8Path,
        locate: &LocateArgs,
    ) -> StatusSettings {
        StatusSettings {
            framework: self.framework(project_dir, locate),
            sentinel: locate
                .sentinel
                .clone()
                .unwrap_or_else(|| self.config.patch.sentinel.clone()),
        }
    }
}
