//! `install` command: download and install a CEF runtime.

use std::path::PathBuf;
use std::sync::Mutex;

use cefloader::pipeline::{InstallReport, InstallStage};
use cefloader::config::timeout_from_minutes;
use cefloader::{ConfigFile, LoaderConfig, RuntimeInstaller};
use clap::Args;

use super::common::{expand_tilde, resolve_loader_config, TargetArgs};
use crate::error::CliError;

/// Arguments for `cefloader install`.
#[derive(Debug, Args)]
pub struct InstallArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Directory to install the runtime into (default: the executable's directory)
    #[arg(long)]
    pub app_dir: Option<PathBuf>,

    /// Application name written into Info.plist on macOS
    #[arg(long)]
    pub app_name: Option<String>,

    /// Parent directory for temporary download files
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Maximum parallel ranged requests
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-chunk timeout in minutes
    #[arg(long)]
    pub timeout_minutes: Option<u64>,

    /// Skip the size and SHA-1 check against the build index
    #[arg(long)]
    pub no_verify: bool,
}

/// Run the install command.
pub fn run(args: InstallArgs, config: &ConfigFile) -> Result<(), CliError> {
    let loader = apply_overrides(resolve_loader_config(config, &args.target)?, args)?;

    println!("Installing CEF {}", loader.build);
    println!("  Target:    {}", loader.platform_identifier()?);
    println!("  Directory: {}", loader.app_dir.display());
    println!();

    let last_stage = Mutex::new(None);
    let installer = RuntimeInstaller::from_config(loader)?.with_progress(Box::new(
        move |stage, percent| print_progress(&last_stage, stage, percent),
    ));

    let report = installer.install()?;
    print_report(&report);
    Ok(())
}

/// Layer the install-only flags over the resolved configuration.
fn apply_overrides(
    mut loader: LoaderConfig,
    args: InstallArgs,
) -> Result<LoaderConfig, CliError> {
    if let Some(dir) = &args.app_dir {
        loader = loader.with_app_dir(expand_tilde(dir));
    }
    if let Some(name) = args.app_name {
        loader = loader.with_app_name(name);
    }
    if let Some(dir) = &args.staging_dir {
        loader = loader.with_staging_dir(expand_tilde(dir));
    }
    if let Some(workers) = args.workers {
        loader = loader.with_workers(workers);
    }
    if let Some(minutes) = args.timeout_minutes {
        loader = loader.with_chunk_timeout(timeout_from_minutes(minutes)?);
    }
    if args.no_verify {
        loader = loader.with_verify_checksum(false);
    }
    Ok(loader)
}

fn print_progress(last_stage: &Mutex<Option<InstallStage>>, stage: InstallStage, percent: u32) {
    let Ok(mut last) = last_stage.lock() else {
        return;
    };

    if *last != Some(stage) {
        *last = Some(stage);
        if matches!(stage, InstallStage::Idle | InstallStage::Cleanup) {
            return;
        }
        println!("{}...", stage);
    } else if percent > 0 {
        println!("  {}%", percent);
    }
}

fn print_report(report: &InstallReport) {
    println!();
    println!("Installed {}", report.archive_name);
    println!("  Downloaded:  {} bytes ({})", report.bytes_downloaded, report.download_mode);
    println!("  Extracted:   {} files", report.files_extracted);
    println!("  Installed:   {} files", report.files_installed);
    println!("  Total time:  {:.1}s", report.timings.total().as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;
    use cefloader::{BuildIdentifier, LoaderError};
    use std::time::Duration;

    fn loader() -> LoaderConfig {
        LoaderConfig::new(BuildIdentifier::new("87.1.14", "87.0.4280.141"))
    }

    fn args(timeout_minutes: Option<u64>) -> InstallArgs {
        InstallArgs {
            target: TargetArgs::default(),
            app_dir: None,
            app_name: None,
            staging_dir: None,
            workers: Some(2),
            timeout_minutes,
            no_verify: true,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let config = apply_overrides(loader(), args(Some(4))).unwrap();

        assert_eq!(config.workers, 2);
        assert_eq!(config.chunk_timeout, Duration::from_secs(240));
        assert!(!config.verify_checksum);
    }

    #[test]
    fn test_huge_timeout_flag_rejected() {
        let result = apply_overrides(loader(), args(Some(u64::MAX)));

        match result {
            Err(e @ CliError::Loader(LoaderError::InvalidConfig(_))) => {
                assert_eq!(e.exit_code(), 2);
            }
            other => panic!("expected invalid config, got {:?}", other),
        }
    }
}
