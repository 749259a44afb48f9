//! Clap-free settings for the apply and status pipelines.

use camino::Utf8PathBuf;

/// PlatformIO package holding the ESP32 Arduino core.
pub const DEFAULT_PACKAGE: &str = "framework-arduinoespressif32";
/// Source file rewritten by the patch, relative to the framework root.
pub const DEFAULT_TARGET: &str = "cores/esp32/esp32-hal-uart.c";
/// Patch file, relative to the project directory.
pub const DEFAULT_PATCH_FILE: &str = "patches/1-rxfifo_full_thrhd.patch";
/// Marker written under the framework root once the patch is in.
pub const DEFAULT_SENTINEL: &str = ".patching-done";
/// Program used to apply the patch.
pub const DEFAULT_PATCH_PROGRAM: &str = "patch";

/// Where the framework root comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameworkSource {
    /// An explicit directory.
    Root(Utf8PathBuf),
    /// A package name resolved through a `PackageResolver`.
    Package(String),
}

impl Default for FrameworkSource {
    fn default() -> Self {
        FrameworkSource::Package(DEFAULT_PACKAGE.to_string())
    }
}

/// Settings for the apply pipeline.
#[derive(Debug, Clone)]
pub struct ApplySettings {
    /// Directory that relative patch paths are resolved against.
    pub project_dir: Utf8PathBuf,
    pub framework: FrameworkSource,

    // Layout
    pub target: Utf8PathBuf,
    pub patch_file: Utf8PathBuf,
    pub sentinel: Utf8PathBuf,

    // Behaviour
    pub patch_command: Vec<String>,
    pub write_sentinel: bool,
    pub detect_applied: bool,
}

impl Default for ApplySettings {
    fn default() -> Self {
        Self {
            project_dir: Utf8PathBuf::from("."),
            framework: FrameworkSource::default(),
            target: Utf8PathBuf::from(DEFAULT_TARGET),
            patch_file: Utf8PathBuf::from(DEFAULT_PATCH_FILE),
            sentinel: Utf8PathBuf::from(DEFAULT_SENTINEL),
            patch_command: vec![DEFAULT_PATCH_PROGRAM.to_string()],
            write_sentinel: true,
            detect_applied: true,
        }
    }
}

/// Settings for the status pipeline.
#[derive(Debug, Clone)]
pub struct StatusSettings {
    pub framework: FrameworkSource,
    pub sentinel: Utf8PathBuf,
}

impl Default for StatusSettings {
    fn default() -> Self {
        Self {
            framework: FrameworkSource::default(),
            sentinel: Utf8PathBuf::from(DEFAULT_SENTINEL),
        }
    }
}
