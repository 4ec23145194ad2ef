//! `harbor init`

use anyhow::{Context, Result};
use clap::Args;

use harbor_core::{config, paths, BerthRegistry, VesselRegistry};

/// Provision the vessel and berth stores and write a default config.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let home = super::home()?;

        let config = config::init_at(&home).context("failed to write config")?;
        VesselRegistry::open_at(&home)
            .provision()
            .context("failed to provision vessel store")?;
        BerthRegistry::open_at(&home)
            .provision()
            .context("failed to provision berth store")?;

        println!("✓ Initialized {}", paths::harbor_root(&home).display());
        println!(
            "  call timeout: {}ms, log format: {}",
            config.call_timeout().as_millis(),
            config.log_format
        );
        Ok(())
    }
}
