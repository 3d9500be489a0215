//! Read-only queries against the version-control repository.
//!
//! Every query shells out to `git` through the command runner, so the
//! user's own configuration (SSH keys, credential helpers, aliases) is in
//! effect. None of these operations mutate repository state; the release
//! orchestrator issues its mutations (commit, tag, push) as explicit runner
//! invocations of its own.
//!
//! Queries never retry. The ones the orchestrator cannot proceed without
//! return a [`GitResult`]; the soft checks degrade to `None`/`false` when
//! they cannot be completed.

use thiserror::Error;
use tracing::{debug, instrument};

use crate::runner::{self, RunError, RunOptions};

/// Errors from git queries.
#[derive(Error, Debug)]
pub enum GitError {
    /// The underlying `git` invocation failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// The remote URL does not contain a usable repository name.
    #[error("cannot derive a repository name from remote url `{url}`")]
    UnnamedRemote {
        /// The configured remote URL.
        url: String,
    },
}

/// Result alias for git queries.
pub type GitResult<T> = Result<T, GitError>;

/// Run a git query and return its trimmed stdout.
fn query(args: &[&str]) -> GitResult<String> {
    let argv = git_argv(args);
    let execution = runner::run(&argv, &RunOptions::new().capture().strict())?;
    Ok(execution.stdout.trim().to_string())
}

fn git_argv(args: &[&str]) -> Vec<String> {
    std::iter::once("git")
        .chain(args.iter().copied())
        .map(str::to_string)
        .collect()
}

/// Short project name derived from the `origin` remote URL.
#[instrument]
pub fn repository_name() -> GitResult<String> {
    let url = query(&["config", "--get", "remote.origin.url"])?;
    let name = short_name(&url).ok_or_else(|| GitError::UnnamedRemote { url: url.clone() })?;
    debug!(%name, "repository name");
    Ok(name.to_string())
}

/// Symbolic name of the checked-out branch.
///
/// A detached HEAD reports the literal string `HEAD`.
#[instrument]
pub fn current_branch() -> GitResult<String> {
    let branch = query(&["rev-parse", "--abbrev-ref", "HEAD"])?;
    debug!(%branch, "current branch");
    Ok(branch)
}

/// The branch the remote considers canonical.
///
/// Returns `None` — not an error — when no remote head is configured;
/// callers treat that as "skip this check".
#[instrument]
pub fn default_branch() -> Option<String> {
    let output = query(&["rev-parse", "--abbrev-ref", "origin/HEAD"]).ok()?;
    let branch = output.strip_prefix("origin/").unwrap_or(&output).to_string();
    if branch.is_empty() {
        debug!("no default branch configured");
        None
    } else {
        debug!(%branch, "default branch");
        Some(branch)
    }
}

/// Whether the working directory has no uncommitted modifications.
///
/// Any failure to complete the check reports `false`.
#[instrument]
pub fn working_directory_clean() -> bool {
    let clean = runner::run(
        &git_argv(&["diff", "--quiet", "--exit-code"]),
        &RunOptions::new().capture(),
    )
    .map(|execution| execution.success())
    .unwrap_or(false);
    debug!(clean, "working directory status");
    clean
}

/// Whether a fetch dry run reports nothing left to pull.
///
/// `false` — not an error — when the check cannot be completed.
#[instrument]
pub fn working_directory_up_to_date() -> bool {
    let up_to_date = runner::run(
        &git_argv(&["fetch", "--dry-run"]),
        &RunOptions::new().capture(),
    )
    .map(|execution| {
        // git writes the pending-ref listing to stderr
        execution.success()
            && execution.stdout.trim().is_empty()
            && execution.stderr.trim().is_empty()
    })
    .unwrap_or(false);
    debug!(up_to_date, "remote status");
    up_to_date
}

/// Full hash of HEAD (40 hexadecimal characters for SHA-1 repositories).
#[instrument]
pub fn commit_id() -> GitResult<String> {
    query(&["rev-parse", "HEAD"])
}

/// All tags currently known locally, in git's output order.
#[instrument]
pub fn tags() -> GitResult<Vec<String>> {
    let output = query(&["tag"])?;
    let tags: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    debug!(count = tags.len(), "tags");
    Ok(tags)
}

/// Check whether the current directory is inside a git work tree.
#[instrument]
pub fn inside_repository() -> bool {
    query(&["rev-parse", "--is-inside-work-tree"])
        .map(|output| output == "true")
        .unwrap_or(false)
}

/// Last path segment of a remote URL, without a `.git` suffix.
///
/// Handles both HTTPS (`https://host/owner/repo.git`) and SSH
/// (`git@host:owner/repo.git`) forms.
fn short_name(url: &str) -> Option<&str> {
    let trimmed = url.trim_end_matches('/');
    let tail = trimmed.rsplit(['/', ':']).next()?;
    let tail = tail.strip_suffix(".git").unwrap_or(tail);
    if tail.is_empty() { None } else { Some(tail) }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The repository-dependent queries are exercised only when the test
    // process happens to run inside a git checkout; in isolated
    // environments they gracefully report absent/false instead.

    #[test]
    fn inside_repository_never_panics() {
        let _ = inside_repository();
    }

    #[test]
    fn current_branch_works_in_repo() {
        if inside_repository() {
            let branch = current_branch().unwrap();
            assert!(!branch.is_empty());
        }
    }

    #[test]
    fn commit_id_is_a_full_hash_in_repo() {
        if inside_repository() {
            let id = commit_id().unwrap();
            assert_eq!(id.len(), 40);
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
    }

    #[test]
    fn tags_works_in_repo() {
        if inside_repository() {
            assert!(tags().is_ok());
        }
    }

    #[test]
    fn clean_and_up_to_date_never_panic() {
        let _ = working_directory_clean();
        let _ = working_directory_up_to_date();
    }

    #[test]
    fn short_name_https() {
        assert_eq!(short_name("https://github.com/acme/widget.git"), Some("widget"));
    }

    #[test]
    fn short_name_https_no_suffix() {
        assert_eq!(short_name("https://github.com/acme/widget"), Some("widget"));
    }

    #[test]
    fn short_name_ssh() {
        assert_eq!(short_name("git@github.com:acme/widget.git"), Some("widget"));
    }

    #[test]
    fn short_name_trailing_slash() {
        assert_eq!(short_name("https://github.com/acme/widget/"), Some("widget"));
    }

    #[test]
    fn short_name_rejects_empty() {
        assert_eq!(short_name(""), None);
        assert_eq!(short_name(".git"), None);
    }
}
