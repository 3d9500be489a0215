//! Release command — thin CLI layer over `gantry_core::release`.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use inquire::Confirm;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use gantry_core::config::{Config, ReleaseSettings, SettingsOverrides};
use gantry_core::release::{self, ReleaseEvent, StepOutcome};

/// Arguments for the `release` subcommand.
#[derive(Args, Debug, Default)]
pub struct ReleaseArgs {
    /// Version to release (e.g., "1.2.3" or "v1.2.3")
    pub version: String,

    /// Branch releases may run from ("*" for any)
    #[arg(long, value_name = "BRANCH")]
    pub releasable_branch: Option<String>,

    /// Distribution directory
    #[arg(long, value_name = "DIR")]
    pub distribution_dir: Option<Utf8PathBuf>,

    /// Changelog file to edit and commit (repeatable)
    #[arg(long = "news-file", value_name = "FILE")]
    pub news_files: Vec<Utf8PathBuf>,

    /// Lint step command (repeatable; whitespace-split)
    #[arg(long = "lint-step", value_name = "CMD")]
    pub lint_steps: Vec<String>,

    /// Test step command (repeatable; whitespace-split)
    #[arg(long = "test-step", value_name = "CMD")]
    pub test_steps: Vec<String>,

    /// Build step command (repeatable; whitespace-split)
    #[arg(long = "build-step", value_name = "CMD")]
    pub build_steps: Vec<String>,

    /// Publish step command (repeatable; whitespace-split)
    #[arg(long = "publish-step", value_name = "CMD")]
    pub publish_steps: Vec<String>,

    /// Allow uncommitted changes in the working directory
    #[arg(long)]
    pub allow_dirty: bool,

    /// Skip the remote up-to-date check
    #[arg(long)]
    pub skip_remote_check: bool,

    /// Preview what would happen without making changes
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

/// Execute the release command.
#[instrument(name = "cmd_release", skip_all)]
pub fn cmd_release(args: ReleaseArgs, global_json: bool, config: &Config) -> anyhow::Result<()> {
    debug!(
        version = %args.version,
        json_output = global_json,
        dry_run = args.dry_run,
        "executing release command"
    );

    let overrides = SettingsOverrides {
        distribution_dir: args.distribution_dir,
        releasable_branch: args.releasable_branch,
        news_files: (!args.news_files.is_empty()).then_some(args.news_files),
        lint_steps: super::steps_override(&args.lint_steps),
        test_steps: super::steps_override(&args.test_steps),
        build_steps: super::steps_override(&args.build_steps),
        publish_steps: super::steps_override(&args.publish_steps),
        require_clean: args.allow_dirty.then_some(false),
        require_up_to_date: args.skip_remote_check.then_some(false),
        editor: None,
        dry_run: args.dry_run,
    };
    let settings = ReleaseSettings::resolve(config, overrides);
    let is_dry = settings.dry_run;

    if !global_json {
        if is_dry {
            println!("\n{}", "DRY RUN — no changes will be made".yellow().bold());
        }
        println!(
            "\n{}: {} {} {}",
            "Release".bold(),
            args.version.green().bold(),
            "from".dimmed(),
            settings.releasable_branch.to_string().dimmed(),
        );
        print_step_summary(&settings);
    }

    // Confirm before executing (unless dry-run, --yes, or config says no)
    if !is_dry && !global_json {
        let config_confirm = config
            .release
            .as_ref()
            .and_then(|r| r.confirm)
            .unwrap_or(true);

        if config_confirm && !args.yes {
            let confirmed = Confirm::new("Proceed with release?")
                .with_default(true)
                .prompt()
                .context("confirmation prompt failed")?;
            if !confirmed {
                println!("{}", "Release cancelled.".yellow());
                return Ok(());
            }
            println!();
        }
    }

    let outcome = release::release(&args.version, &settings, |event| {
        if !global_json {
            handle_event(&event, is_dry);
        }
    })
    .context("release failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        println!();
        if is_dry {
            println!(
                "{} Dry run complete — {} steps rehearsed",
                "✓".green(),
                outcome.steps.len(),
            );
        } else {
            println!(
                "{} Released {} ({} steps)",
                "✓".green().bold(),
                outcome.tag.green().bold(),
                outcome.steps.len(),
            );
        }
    }

    Ok(())
}

/// Handle a release event for terminal progress display.
fn handle_event(event: &ReleaseEvent, is_dry: bool) {
    match event {
        ReleaseEvent::StepStarted(step) => {
            let spinner = ProgressBar::new_spinner();
            spinner.set_style(
                ProgressStyle::with_template("  {spinner:.cyan} {msg}")
                    .unwrap()
                    .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
            spinner.set_message(format!("{step}..."));
            // Steps are synchronous; the spinner shows briefly to indicate
            // activity before the outcome line replaces it.
            spinner.finish_and_clear();
        }
        ReleaseEvent::StepCompleted(step, outcome) => match outcome {
            StepOutcome::Success { message } => {
                let prefix = if is_dry { "○" } else { "✓" };
                println!(
                    "  {} {} {}",
                    prefix.green(),
                    format!("{step}").bold(),
                    message.dimmed(),
                );
            }
            StepOutcome::Skipped { reason } => {
                println!(
                    "  {} {} {}",
                    "–".yellow(),
                    format!("{step}").bold(),
                    format!("skipped: {reason}").dimmed(),
                );
            }
        },
    }
}

/// Print which steps carry configured commands before the confirmation prompt.
fn print_step_summary(settings: &ReleaseSettings) {
    let configured: &[(&str, usize)] = &[
        ("lint", settings.lint_steps.len()),
        ("test", settings.test_steps.len()),
        ("build", settings.build_steps.len()),
        ("publish", settings.publish_steps.len()),
    ];

    let active: Vec<String> = configured
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(name, count)| format!("{name} ({count})"))
        .collect();

    if active.is_empty() {
        println!("  {}: {}", "Steps".dimmed(), "none configured".dimmed());
    } else {
        println!("  {}: {}", "Steps".dimmed(), active.join(", ").bold());
    }
    println!(
        "  {}: {}",
        "News files".dimmed(),
        settings
            .news_files
            .iter()
            .map(|file| file.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!();
}
