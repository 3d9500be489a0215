//! Version parsing and tag validation.
//!
//! A release version must be strict semver and must not collide with an
//! existing tag. Both checks run before the orchestrator touches anything.

use semver::Version;
use thiserror::Error;

/// Errors from version validation.
#[derive(Error, Debug)]
pub enum VersionError {
    /// The input is not a semantic version.
    #[error("invalid version `{input}`: {source}")]
    InvalidSemver {
        /// The rejected input.
        input: String,
        /// The parse error.
        #[source]
        source: semver::Error,
    },
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Parse a version string, tolerating a leading `v`.
pub fn parse_version(input: &str) -> VersionResult<Version> {
    let stripped = input.strip_prefix('v').unwrap_or(input);
    Version::parse(stripped).map_err(|source| VersionError::InvalidSemver {
        input: input.to_string(),
        source,
    })
}

/// Whether an equivalent tag already exists.
///
/// Comparison is lenient: `v1.2.3` and `1.2.3` name the same release.
/// Tags that are not versions at all are ignored.
pub fn tag_exists(version: &Version, tags: &[String]) -> bool {
    tags.iter()
        .any(|tag| parse_version(tag).is_ok_and(|parsed| parsed == *version))
}
