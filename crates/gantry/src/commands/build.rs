//! Build command — thin CLI layer over `gantry_core::release::build`.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use gantry_core::config::{Config, ReleaseSettings, SettingsOverrides};
use gantry_core::release;

/// Arguments for the `build` subcommand.
#[derive(Args, Debug, Default)]
pub struct BuildArgs {
    /// Build step command (repeatable; whitespace-split)
    #[arg(long = "build-step", value_name = "CMD")]
    pub build_steps: Vec<String>,

    /// Preview without running anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Execute the build command.
#[instrument(name = "cmd_build", skip_all)]
pub fn cmd_build(args: BuildArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(dry_run = args.dry_run, "executing build command");

    let overrides = SettingsOverrides {
        build_steps: super::steps_override(&args.build_steps),
        dry_run: args.dry_run,
        ..SettingsOverrides::default()
    };
    let settings = ReleaseSettings::resolve(config, overrides);
    let count = settings.build_steps.len();

    release::build(&settings).context("build failed")?;

    if global_json {
        println!(
            "{}",
            serde_json::json!({
                "status": "success",
                "steps": count,
                "dry_run": settings.dry_run,
            })
        );
    } else if settings.dry_run {
        println!("{} Dry run complete — {count} build step(s) rehearsed", "○".green());
    } else if count == 0 {
        println!("{} Nothing to build (no build steps configured)", "–".yellow());
    } else {
        println!("{} Build complete ({count} step(s))", "✓".green());
    }

    Ok(())
}
