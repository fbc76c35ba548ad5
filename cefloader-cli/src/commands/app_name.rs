//! `app-name` command: patch the application name in Info.plist.

use std::path::PathBuf;

use cefloader::installer::apply_app_name;
use clap::Args;

use super::common::expand_tilde;
use crate::error::CliError;

/// Arguments for `cefloader app-name`.
#[derive(Debug, Args)]
pub struct AppNameArgs {
    /// Directory containing Info.plist
    pub app_dir: PathBuf,

    /// Application name to write
    pub name: String,
}

/// Run the app-name command.
pub fn run(args: AppNameArgs) -> Result<(), CliError> {
    let app_dir = expand_tilde(&args.app_dir);

    if apply_app_name(&app_dir, &args.name)? {
        println!("Set application name to '{}'", args.name);
    } else {
        println!("No Info.plist in {}, nothing to do", app_dir.display());
    }

    Ok(())
}
