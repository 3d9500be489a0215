//! Release orchestrator — the gated lifecycle workflow.
//!
//! A sequential state machine: validate, clean, lint, test, branch gate,
//! working-directory gate, changelog, tag, build, publish, push. Every step
//! either passes control to the next or aborts the whole run. The
//! pre-mutation steps abort cleanly; a publish failure additionally rolls
//! back the changelog commit and the release tag. Failures in the other
//! mutating steps (changelog, tag, build) are fatal and left for manual
//! cleanup.
//!
//! Execution is fully sequential and blocking; no timeouts are imposed on
//! external tools. Running two orchestrators against the same repository
//! concurrently is unsupported.

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::{BranchFilter, CommandLine, ReleaseSettings};
use crate::git::{self, GitError};
use crate::runner::{self, RunError, RunOptions};
use crate::version::{self, VersionError};

// ──────────────────────────────────────────────
// Errors
// ──────────────────────────────────────────────

/// Errors from the release workflow.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The requested version is not valid semver.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// A tag for the requested version already exists.
    #[error("a tag for version {version} already exists")]
    DuplicateTag {
        /// The duplicated version.
        version: Version,
    },

    /// The current branch is not the releasable branch.
    #[error("releases run from branch `{expected}`, currently on `{current}`")]
    WrongBranch {
        /// The checked-out branch.
        current: String,
        /// The branch the settings allow.
        expected: String,
    },

    /// The working directory has uncommitted changes.
    #[error("uncommitted changes in the working directory")]
    DirtyWorkingDirectory,

    /// The branch is behind its remote.
    #[error("working directory is not up to date with the remote")]
    BehindRemote,

    /// A lifecycle step's command failed.
    #[error("{step} step failed: {source}")]
    StepFailed {
        /// Which step failed.
        step: ReleaseStep,
        /// The failing invocation.
        #[source]
        source: RunError,
    },

    /// The publish step failed; the tag and release commit were rolled back.
    #[error("publish failed: {source}; {}", if *rolled_back {
        "rolled back the release tag and commit"
    } else {
        "rollback incomplete, manual cleanup required"
    })]
    PublishFailed {
        /// The failing upload invocation.
        #[source]
        source: RunError,
        /// Whether the rollback commands themselves succeeded.
        rolled_back: bool,
    },

    /// Removing the distribution directory failed.
    #[error("failed to remove {dir}: {source}")]
    CleanFailed {
        /// The directory that could not be removed.
        dir: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A git query failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Result alias for release operations.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

// ──────────────────────────────────────────────
// Steps and events
// ──────────────────────────────────────────────

/// Steps of the release workflow, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseStep {
    /// Parse the version and reject duplicates.
    Validate,
    /// Remove the distribution directory.
    Clean,
    /// Run the configured lint commands.
    Lint,
    /// Run the configured test commands.
    Test,
    /// Require the releasable branch.
    BranchGate,
    /// Require a clean, up-to-date working directory.
    WorkdirGate,
    /// Edit and commit the news files.
    Changelog,
    /// Create the annotated release tag.
    Tag,
    /// Run the configured build commands.
    Build,
    /// Upload the distribution artifacts.
    Publish,
    /// Push the commit and tag to the remote.
    Push,
}

impl std::fmt::Display for ReleaseStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validate => write!(f, "validate"),
            Self::Clean => write!(f, "clean"),
            Self::Lint => write!(f, "lint"),
            Self::Test => write!(f, "test"),
            Self::BranchGate => write!(f, "branch-gate"),
            Self::WorkdirGate => write!(f, "workdir-gate"),
            Self::Changelog => write!(f, "changelog"),
            Self::Tag => write!(f, "tag"),
            Self::Build => write!(f, "build"),
            Self::Publish => write!(f, "publish"),
            Self::Push => write!(f, "push"),
        }
    }
}

/// Events emitted at step boundaries for progress reporting.
#[derive(Debug, Clone)]
pub enum ReleaseEvent {
    /// A step has started.
    StepStarted(ReleaseStep),
    /// A step has completed.
    StepCompleted(ReleaseStep, StepOutcome),
}

/// Outcome of a single step.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepOutcome {
    /// The step ran (or was rehearsed) successfully.
    Success {
        /// Description of what happened.
        message: String,
    },
    /// The step had nothing to do.
    Skipped {
        /// Why the step was skipped.
        reason: String,
    },
}

/// Outcome of the full release workflow.
#[derive(Debug, Clone, Serialize)]
pub struct ReleaseOutcome {
    /// The released version.
    pub version: Version,
    /// The tag that was created.
    pub tag: String,
    /// Per-step outcomes, in execution order.
    pub steps: Vec<(ReleaseStep, StepOutcome)>,
    /// Whether this was a rehearsal.
    pub dry_run: bool,
    /// Hash of the release commit (absent for dry runs).
    pub commit: Option<String>,
}

// ──────────────────────────────────────────────
// Standalone operations
// ──────────────────────────────────────────────

/// Remove the distribution directory.
///
/// Idempotent: a missing directory is not an error. Skipped (logged, not
/// performed) under dry-run.
#[instrument(skip(settings), fields(dir = %settings.distribution_dir, dry_run = settings.dry_run))]
pub fn clean(settings: &ReleaseSettings) -> ReleaseResult<()> {
    if settings.dry_run {
        info!(dir = %settings.distribution_dir, "dry-run: would remove distribution directory");
        return Ok(());
    }
    remove_distribution_dir(&settings.distribution_dir)
}

/// Run the configured build steps.
#[instrument(skip(settings), fields(dry_run = settings.dry_run))]
pub fn build(settings: &ReleaseSettings) -> ReleaseResult<()> {
    let context = StepContext {
        version: None,
        tag: None,
        dist: settings.distribution_dir.to_string(),
    };
    run_steps(ReleaseStep::Build, &settings.build_steps, &context, settings.dry_run)
}

// ──────────────────────────────────────────────
// The workflow
// ──────────────────────────────────────────────

/// Run the full release workflow.
///
/// `on_event` fires at step boundaries so the caller can render progress.
/// Under `settings.dry_run` every side-effecting invocation is replaced by
/// the runner's no-op, while the validation and gate queries still run for
/// real — a rehearsal must report a bad version, a foreign branch, or a
/// dirty tree just like the real thing.
#[instrument(skip(settings, on_event), fields(version = version_input, dry_run = settings.dry_run))]
pub fn release(
    version_input: &str,
    settings: &ReleaseSettings,
    mut on_event: impl FnMut(ReleaseEvent),
) -> ReleaseResult<ReleaseOutcome> {
    let dry_run = settings.dry_run;
    let mut steps = Vec::new();

    // ── Validate ──
    // Runs in full even while rehearsing: cheap, non-mutating, and a bad
    // version should fail before any other work.
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Validate));
    let version = version::parse_version(version_input)?;
    let existing = git::tags()?;
    if version::tag_exists(&version, &existing) {
        return Err(ReleaseError::DuplicateTag { version });
    }
    let tag = version.to_string();
    complete(
        ReleaseStep::Validate,
        StepOutcome::Success {
            message: format!("version {version} is unused"),
        },
        &mut steps,
        &mut on_event,
    );

    let context = StepContext {
        version: Some(version.to_string()),
        tag: Some(tag.clone()),
        dist: settings.distribution_dir.to_string(),
    };

    // ── Clean ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Clean));
    let outcome = if dry_run {
        StepOutcome::Skipped {
            reason: format!("dry-run: would remove {}", settings.distribution_dir),
        }
    } else {
        remove_distribution_dir(&settings.distribution_dir)?;
        StepOutcome::Success {
            message: format!("removed {}", settings.distribution_dir),
        }
    };
    complete(ReleaseStep::Clean, outcome, &mut steps, &mut on_event);

    // ── Lint, Test ──
    for (step, commands) in [
        (ReleaseStep::Lint, &settings.lint_steps),
        (ReleaseStep::Test, &settings.test_steps),
    ] {
        on_event(ReleaseEvent::StepStarted(step));
        let outcome = if commands.is_empty() {
            StepOutcome::Skipped {
                reason: "no commands configured".into(),
            }
        } else {
            run_steps(step, commands, &context, dry_run)?;
            StepOutcome::Success {
                message: format!("{} passed", count_label(commands.len(), "command")),
            }
        };
        complete(step, outcome, &mut steps, &mut on_event);
    }

    // ── Branch gate ──
    // Evaluated even under dry-run; the wildcard filter is the only way to
    // disable it.
    on_event(ReleaseEvent::StepStarted(ReleaseStep::BranchGate));
    let outcome = match settings.releasable_branch {
        BranchFilter::Any => StepOutcome::Skipped {
            reason: "any branch may release".into(),
        },
        BranchFilter::Exact(ref expected) => {
            require_branch(expected)?;
            StepOutcome::Success {
                message: format!("on releasable branch `{expected}`"),
            }
        }
        BranchFilter::Auto => match git::default_branch() {
            None => StepOutcome::Skipped {
                reason: "no default branch detected".into(),
            },
            Some(expected) => {
                require_branch(&expected)?;
                StepOutcome::Success {
                    message: format!("on default branch `{expected}`"),
                }
            }
        },
    };
    complete(ReleaseStep::BranchGate, outcome, &mut steps, &mut on_event);

    // ── Working-directory gate ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::WorkdirGate));
    let outcome = if !settings.require_clean && !settings.require_up_to_date {
        StepOutcome::Skipped {
            reason: "working-directory checks disabled".into(),
        }
    } else {
        if settings.require_clean && !git::working_directory_clean() {
            return Err(ReleaseError::DirtyWorkingDirectory);
        }
        if settings.require_up_to_date && !git::working_directory_up_to_date() {
            return Err(ReleaseError::BehindRemote);
        }
        StepOutcome::Success {
            message: "working directory is releasable".into(),
        }
    };
    complete(ReleaseStep::WorkdirGate, outcome, &mut steps, &mut on_event);

    // ── Changelog ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Changelog));
    let editor = settings.editor.clone().unwrap_or_else(default_editor);
    // Inherited stdio: the editor owns the terminal until the user is done.
    let mutate = RunOptions::new().strict().dry_run(dry_run);
    for file in &settings.news_files {
        let mut argv = editor.clone();
        argv.push(file.to_string());
        runner::run(&argv, &mutate).map_err(|source| ReleaseError::StepFailed {
            step: ReleaseStep::Changelog,
            source,
        })?;
    }
    for file in &settings.news_files {
        runner::run(&git_argv(&["add", file.as_str()]), &mutate).map_err(|source| {
            ReleaseError::StepFailed {
                step: ReleaseStep::Changelog,
                source,
            }
        })?;
    }
    runner::run(
        &git_argv(&["commit", "-m", &format!("preparing release {version}")]),
        &mutate,
    )
    .map_err(|source| ReleaseError::StepFailed {
        step: ReleaseStep::Changelog,
        source,
    })?;
    complete(
        ReleaseStep::Changelog,
        StepOutcome::Success {
            message: format!("committed {}", count_label(settings.news_files.len(), "news file")),
        },
        &mut steps,
        &mut on_event,
    );

    // ── Tag ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Tag));
    runner::run(
        &git_argv(&["tag", "-a", &tag, "-m", &format!("release {version}")]),
        &mutate,
    )
    .map_err(|source| ReleaseError::StepFailed {
        step: ReleaseStep::Tag,
        source,
    })?;
    complete(
        ReleaseStep::Tag,
        StepOutcome::Success {
            message: format!("created annotated tag {tag}"),
        },
        &mut steps,
        &mut on_event,
    );

    // ── Build ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Build));
    let outcome = if settings.build_steps.is_empty() {
        StepOutcome::Skipped {
            reason: "no commands configured".into(),
        }
    } else {
        run_steps(ReleaseStep::Build, &settings.build_steps, &context, dry_run)?;
        StepOutcome::Success {
            message: format!("{} passed", count_label(settings.build_steps.len(), "command")),
        }
    };
    complete(ReleaseStep::Build, outcome, &mut steps, &mut on_event);

    // ── Publish ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Publish));
    let outcome = if settings.publish_steps.is_empty() {
        StepOutcome::Skipped {
            reason: "no commands configured".into(),
        }
    } else {
        match run_steps(ReleaseStep::Publish, &settings.publish_steps, &context, dry_run) {
            Ok(()) => StepOutcome::Success {
                message: format!("uploaded via {}", count_label(settings.publish_steps.len(), "command")),
            },
            Err(ReleaseError::StepFailed { source, .. }) => {
                let rolled_back = rollback(&tag, dry_run);
                return Err(ReleaseError::PublishFailed { source, rolled_back });
            }
            Err(other) => return Err(other),
        }
    };
    complete(ReleaseStep::Publish, outcome, &mut steps, &mut on_event);

    // ── Push ──
    on_event(ReleaseEvent::StepStarted(ReleaseStep::Push));
    runner::run(&git_argv(&["push"]), &mutate).map_err(|source| ReleaseError::StepFailed {
        step: ReleaseStep::Push,
        source,
    })?;
    runner::run(&git_argv(&["push", "origin", &tag]), &mutate).map_err(|source| {
        ReleaseError::StepFailed {
            step: ReleaseStep::Push,
            source,
        }
    })?;
    complete(
        ReleaseStep::Push,
        StepOutcome::Success {
            message: format!("pushed commit and tag {tag}"),
        },
        &mut steps,
        &mut on_event,
    );

    let commit = if dry_run { None } else { git::commit_id().ok() };

    info!(%version, dry_run, "release complete");

    Ok(ReleaseOutcome {
        version,
        tag,
        steps,
        dry_run,
        commit,
    })
}

// ──────────────────────────────────────────────
// Internal helpers
// ──────────────────────────────────────────────

/// Placeholder values substituted into configured step commands.
#[derive(Debug, Clone)]
struct StepContext {
    version: Option<String>,
    tag: Option<String>,
    dist: String,
}

/// Replace `{version}`, `{tag}` and `{dist}` placeholders in a command line.
///
/// Placeholders without a value in this context are left untouched.
fn interpolate(argv: &[String], context: &StepContext) -> Vec<String> {
    argv.iter()
        .map(|arg| {
            let mut arg = arg.replace("{dist}", &context.dist);
            if let Some(ref version) = context.version {
                arg = arg.replace("{version}", version);
            }
            if let Some(ref tag) = context.tag {
                arg = arg.replace("{tag}", tag);
            }
            arg
        })
        .collect()
}

/// Run every command of a step strictly, in order.
fn run_steps(
    step: ReleaseStep,
    commands: &[CommandLine],
    context: &StepContext,
    dry_run: bool,
) -> ReleaseResult<()> {
    for command in commands {
        let argv = interpolate(command, context);
        runner::run(&argv, &RunOptions::new().strict().dry_run(dry_run))
            .map_err(|source| ReleaseError::StepFailed { step, source })?;
    }
    Ok(())
}

/// Abort unless the checked-out branch matches.
fn require_branch(expected: &str) -> ReleaseResult<()> {
    let current = git::current_branch()?;
    if current == expected {
        Ok(())
    } else {
        Err(ReleaseError::WrongBranch {
            current,
            expected: expected.to_string(),
        })
    }
}

/// Delete the release tag and drop the changelog commit.
///
/// Best-effort; the combined result feeds the `rolled_back` flag on
/// [`ReleaseError::PublishFailed`].
fn rollback(tag: &str, dry_run: bool) -> bool {
    warn!(%tag, "publish failed, rolling back tag and release commit");
    let options = RunOptions::new().capture().dry_run(dry_run);
    let tag_deleted = runner::run(&git_argv(&["tag", "-d", tag]), &options)
        .map(|e| !e.executed || e.success())
        .unwrap_or(false);
    let reset = runner::run(&git_argv(&["reset", "--hard", "HEAD~1"]), &options)
        .map(|e| !e.executed || e.success())
        .unwrap_or(false);
    debug!(tag_deleted, reset, "rollback finished");
    tag_deleted && reset
}

/// Editor command for changelog editing: `$EDITOR`, split on whitespace,
/// falling back to `nano`.
fn default_editor() -> CommandLine {
    std::env::var("EDITOR")
        .ok()
        .map(|value| value.split_whitespace().map(str::to_string).collect::<Vec<_>>())
        .filter(|argv| !argv.is_empty())
        .unwrap_or_else(|| vec!["nano".to_string()])
}

fn git_argv(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

fn count_label(count: usize, noun: &str) -> String {
    format!("{count} {noun}{}", if count == 1 { "" } else { "s" })
}

fn remove_distribution_dir(dir: &Utf8Path) -> ReleaseResult<()> {
    match std::fs::remove_dir_all(dir.as_std_path()) {
        Ok(()) => {
            debug!(%dir, "removed distribution directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(ReleaseError::CleanFailed {
            dir: dir.to_path_buf(),
            source,
        }),
    }
}

fn complete(
    step: ReleaseStep,
    outcome: StepOutcome,
    steps: &mut Vec<(ReleaseStep, StepOutcome)>,
    on_event: &mut impl FnMut(ReleaseEvent),
) {
    on_event(ReleaseEvent::StepCompleted(step, outcome.clone()));
    steps.push((step, outcome));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SettingsOverrides};

    fn line(args: &[&str]) -> CommandLine {
        args.iter().map(ToString::to_string).collect()
    }

    fn settings_with(overrides: SettingsOverrides) -> ReleaseSettings {
        ReleaseSettings::resolve(&Config::default(), overrides)
    }

    #[test]
    fn step_display_names() {
        assert_eq!(ReleaseStep::Validate.to_string(), "validate");
        assert_eq!(ReleaseStep::BranchGate.to_string(), "branch-gate");
        assert_eq!(ReleaseStep::WorkdirGate.to_string(), "workdir-gate");
        assert_eq!(ReleaseStep::Push.to_string(), "push");
    }

    #[test]
    fn step_serializes_kebab_case() {
        let json = serde_json::to_string(&ReleaseStep::BranchGate).unwrap();
        assert_eq!(json, "\"branch-gate\"");
    }

    #[test]
    fn outcome_serializes_with_status_tag() {
        let outcome = StepOutcome::Skipped {
            reason: "dry-run".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"status\":\"skipped\""));
        assert!(json.contains("\"reason\":\"dry-run\""));
    }

    #[test]
    fn release_outcome_serializes() {
        let outcome = ReleaseOutcome {
            version: Version::new(1, 2, 3),
            tag: "1.2.3".into(),
            steps: vec![(
                ReleaseStep::Validate,
                StepOutcome::Success {
                    message: "ok".into(),
                },
            )],
            dry_run: true,
            commit: None,
        };
        let json = serde_json::to_string_pretty(&outcome).unwrap();
        assert!(json.contains("\"tag\": \"1.2.3\""));
        assert!(json.contains("\"dry_run\": true"));
        assert!(json.contains("\"validate\""));
    }

    #[test]
    fn interpolate_replaces_placeholders() {
        let context = StepContext {
            version: Some("1.2.3".into()),
            tag: Some("1.2.3".into()),
            dist: "dist".into(),
        };
        let argv = interpolate(&line(&["upload", "{dist}/*", "--tag", "{tag}"]), &context);
        assert_eq!(argv, line(&["upload", "dist/*", "--tag", "1.2.3"]));
    }

    #[test]
    fn interpolate_leaves_unknown_placeholders() {
        let context = StepContext {
            version: Some("1.2.3".into()),
            tag: Some("1.2.3".into()),
            dist: "dist".into(),
        };
        let argv = interpolate(&line(&["echo", "{unknown}"]), &context);
        assert_eq!(argv, line(&["echo", "{unknown}"]));
    }

    #[test]
    fn interpolate_without_version_keeps_placeholder() {
        let context = StepContext {
            version: None,
            tag: None,
            dist: "out".into(),
        };
        let argv = interpolate(&line(&["pack", "{dist}", "{version}"]), &context);
        assert_eq!(argv, line(&["pack", "out", "{version}"]));
    }

    #[test]
    fn count_label_pluralizes() {
        assert_eq!(count_label(1, "command"), "1 command");
        assert_eq!(count_label(3, "command"), "3 commands");
    }

    #[test]
    fn default_editor_is_never_empty() {
        assert!(!default_editor().is_empty());
    }

    #[test]
    fn clean_is_idempotent() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dist = camino::Utf8PathBuf::from_path_buf(tmp.path().join("dist")).unwrap();

        let settings = settings_with(SettingsOverrides {
            distribution_dir: Some(dist.clone()),
            ..SettingsOverrides::default()
        });

        // Directory does not exist yet
        clean(&settings).unwrap();

        // Populate and remove
        std::fs::create_dir_all(dist.join("nested")).unwrap();
        std::fs::write(dist.join("nested/artifact.tar.gz"), b"bits").unwrap();
        clean(&settings).unwrap();
        assert!(!dist.as_std_path().exists());

        // And again, now that it is gone
        clean(&settings).unwrap();
    }

    #[test]
    fn clean_dry_run_leaves_the_directory() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dist = camino::Utf8PathBuf::from_path_buf(tmp.path().join("dist")).unwrap();
        std::fs::create_dir_all(&dist).unwrap();

        let settings = settings_with(SettingsOverrides {
            distribution_dir: Some(dist.clone()),
            dry_run: true,
            ..SettingsOverrides::default()
        });

        clean(&settings).unwrap();
        assert!(dist.as_std_path().exists());
    }

    #[test]
    fn build_with_no_steps_is_a_no_op() {
        let settings = settings_with(SettingsOverrides::default());
        build(&settings).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn build_failure_reports_the_step() {
        let settings = settings_with(SettingsOverrides {
            build_steps: Some(vec![line(&["false"])]),
            ..SettingsOverrides::default()
        });
        match build(&settings) {
            Err(ReleaseError::StepFailed { step, .. }) => assert_eq!(step, ReleaseStep::Build),
            other => panic!("expected StepFailed, got {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn build_dry_run_never_fails() {
        let settings = settings_with(SettingsOverrides {
            build_steps: Some(vec![line(&["false"])]),
            dry_run: true,
            ..SettingsOverrides::default()
        });
        build(&settings).unwrap();
    }
}
