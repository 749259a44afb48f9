mod config;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Parser, Subcommand};
use config::{ApplyOverrides, ConfigMerger, LocateArgs};
use fwpatch_core::adapters::{
    BuiltinPatchRunner, PlatformioPackageResolver, ShellCommandRunner, StaticPackageResolver,
};
use fwpatch_core::pipeline::{run_apply, run_status};
use fwpatch_core::ports::{CommandRunner, PackageResolver};
use fwpatch_core::settings::FrameworkSource;
use fwpatch_core::{PatchError, PatchOutcome, PatchState};
use std::process::ExitCode;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "fwpatch",
    version,
    about = "Apply a framework source patch exactly once per extracted package."
)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Patch the framework unless its sentinel says it already was.
    Apply(ApplyArgs),
    /// Report whether the framework has been patched.
    Status(StatusArgs),
}

#[derive(Debug, Parser)]
struct Locate {
    /// Project directory holding fwpatch.toml and the patches (default: current directory).
    #[arg(long, default_value = ".")]
    project_dir: Utf8PathBuf,

    /// Framework directory; skips the package lookup.
    #[arg(long, env = "FWPATCH_FRAMEWORK_ROOT")]
    framework_root: Option<Utf8PathBuf>,

    /// Package to look up in the PlatformIO core directory; ignored when a root is given.
    #[arg(long)]
    package: Option<String>,

    /// Sentinel file, relative to the framework root.
    #[arg(long)]
    sentinel: Option<Utf8PathBuf>,
}

impl Locate {
    fn locate_args(&self) -> LocateArgs {
        LocateArgs {
            framework_root: self.framework_root.clone(),
            package: self.package.clone(),
            sentinel: self.sentinel.clone(),
        }
    }
}

#[derive(Debug, Parser)]
struct ApplyArgs {
    #[command(flatten)]
    locate: Locate,

    /// File to patch, relative to the framework root.
    #[arg(long)]
    target: Option<Utf8PathBuf>,

    /// Patch file, relative to the project directory.
    #[arg(long)]
    patch: Option<Utf8PathBuf>,

    /// Apply the patch in-process instead of running `patch`.
    #[arg(long, default_value_t = false)]
    builtin: bool,

    /// Do not write the sentinel after a successful patch.
    #[arg(long, default_value_t = false)]
    no_sentinel: bool,

    /// Always run the patch tool, even if the target already looks patched.
    #[arg(long, default_value_t = false)]
    no_detect: bool,
}

#[derive(Debug, Parser)]
struct StatusArgs {
    #[command(flatten)]
    locate: Locate,

    /// Output format (text, json).
    #[arg(long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.cmd {
        Command::Apply(args) => cmd_apply(args),
        Command::Status(args) => cmd_status(args),
    };

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            error!("{:?}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// 2 for missing inputs, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<PatchError>()
        .map(PatchError::exit_code)
        .unwrap_or(1)
}

fn load_merger(locate: &Locate) -> anyhow::Result<ConfigMerger> {
    let file_config =
        config::load_or_default(&locate.project_dir).context("load fwpatch.toml config")?;
    Ok(ConfigMerger::new(file_config))
}

fn resolver_for(framework: &FrameworkSource) -> anyhow::Result<Box<dyn PackageResolver>> {
    match framework {
        // An explicit root never consults the resolver.
        FrameworkSource::Root(_) => Ok(Box::new(StaticPackageResolver::new())),
        FrameworkSource::Package(_) => Ok(Box::new(PlatformioPackageResolver::from_env()?)),
    }
}

fn cmd_apply(args: ApplyArgs) -> anyhow::Result<()> {
    let merger = load_merger(&args.locate)?;
    let overrides = ApplyOverrides {
        target: args.target,
        patch: args.patch,
        builtin: args.builtin,
        no_sentinel: args.no_sentinel,
        no_detect: args.no_detect,
    };
    let settings =
        merger.merge_apply_args(&args.locate.project_dir, &args.locate.locate_args(), &overrides);
    debug!("merged settings: {:?}", settings);

    let resolver = resolver_for(&settings.framework)?;
    let runner: Box<dyn CommandRunner> = if merger.use_builtin(&overrides) {
        Box::new(BuiltinPatchRunner)
    } else {
        Box::new(ShellCommandRunner)
    };

    let outcome = run_apply(&settings, resolver.as_ref(), runner.as_ref())?;
    match outcome {
        PatchOutcome::AlreadyPatched => info!("framework already patched"),
        PatchOutcome::Applied => info!("patch applied"),
        PatchOutcome::DetectedApplied => info!("patch was already present"),
    }
    Ok(())
}

fn cmd_status(args: StatusArgs) -> anyhow::Result<()> {
    let merger = load_merger(&args.locate)?;
    let settings = merger.merge_status_args(&args.locate.project_dir, &args.locate.locate_args());
    let resolver = resolver_for(&settings.framework)?;
    let report = run_status(&settings, resolver.as_ref())?;

    match args.format {
        OutputFormat::Text => {
            let state = match report.state {
                PatchState::Patched => "patched",
                PatchState::Unpatched => "unpatched",
            };
            println!("{:<16} {}", "framework root:", report.framework_root);
            println!("{:<16} {}", "sentinel:", report.sentinel);
            println!("{:<16} {}", "state:", state);
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
