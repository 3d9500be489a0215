//! Clean command — thin CLI layer over `gantry_core::release::clean`.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use gantry_core::config::{Config, ReleaseSettings, SettingsOverrides};
use gantry_core::release;

/// Arguments for the `clean` subcommand.
#[derive(Args, Debug, Default)]
pub struct CleanArgs {
    /// Distribution directory to remove
    #[arg(long, value_name = "DIR")]
    pub distribution_dir: Option<Utf8PathBuf>,

    /// Preview without deleting anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the clean command.
#[instrument(name = "cmd_clean", skip_all)]
pub fn cmd_clean(args: CleanArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(dry_run = args.dry_run, "executing clean command");

    let overrides = SettingsOverrides {
        distribution_dir: args.distribution_dir,
        dry_run: args.dry_run,
        ..SettingsOverrides::default()
    };
    let settings = ReleaseSettings::resolve(config, overrides);

    release::clean(&settings).context("clean failed")?;

    if global_json {
        println!(
            "{}",
            serde_json::json!({
                "status": "success",
                "distribution_dir": settings.distribution_dir,
                "dry_run": settings.dry_run,
            })
        );
    } else if settings.dry_run {
        println!(
            "{} Dry run — would remove {}",
            "○".green(),
            settings.distribution_dir
        );
    } else {
        println!("{} Removed {}", "✓".green(), settings.distribution_dir);
    }

    Ok(())
}
