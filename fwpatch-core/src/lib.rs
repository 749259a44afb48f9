//! Embeddable core library for fwpatch.
//!
//! Applies a patch to a file inside an extracted framework package exactly
//! once, recording success with a zero-byte sentinel under the framework
//! root. Provides a clap-free entry point suitable for calling from a build
//! hook or another host process.
//!
//! # Port traits
//!
//! The build environment is abstracted behind port traits in [`ports`]:
//! - [`CommandRunner`](ports::CommandRunner) — run the patch tool
//! - [`PackageResolver`](ports::PackageResolver) — locate an installed package
//!
//! The [`adapters`] module provides process-, `diffy`- and
//! PlatformIO-backed implementations.
//!
//! # Entry points
//!
//! - [`ensure_patched`](applicator::ensure_patched) — apply one job
//! - [`run_apply`](pipeline::run_apply) — resolve the framework and apply
//! - [`run_status`](pipeline::run_status) — report the sentinel state

pub mod adapters;
pub mod applicator;
pub mod error;
pub mod patchfile;
pub mod pipeline;
pub mod ports;
pub mod settings;

pub use applicator::{PatchJob, PatchOutcome, PatchState, ensure_patched, patch_state};
pub use error::{PatchApplicationError, PatchError, PatchResult, PreconditionError};
