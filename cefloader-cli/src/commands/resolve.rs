//! `resolve` command: look up the download URL without downloading.

use cefloader::{ConfigFile, RuntimeInstaller};

use super::common::{resolve_loader_config, TargetArgs};
use crate::error::CliError;

/// Run the resolve command.
pub fn run(target: TargetArgs, config: &ConfigFile) -> Result<(), CliError> {
    let loader = resolve_loader_config(config, &target)?;
    let platform = loader.platform_identifier()?;
    let installer = RuntimeInstaller::from_config(loader)?;

    let archive = installer.resolve()?;
    let descriptor = &archive.descriptor;

    println!("Platform: {}", platform);
    println!("Archive:  {}", archive.name());
    println!("URL:      {}", archive.url);
    println!("Size:     {} bytes", descriptor.size);
    if !descriptor.sha1.is_empty() {
        println!("SHA-1:    {}", descriptor.sha1);
    }
    if let Some(modified) = descriptor.last_modified {
        println!("Modified: {}", modified.format("%Y-%m-%d %H:%M UTC"));
    }

    Ok(())
}
