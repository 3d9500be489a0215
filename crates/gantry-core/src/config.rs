//! Configuration loading and settings resolution.
//!
//! Two layers:
//!
//! 1. [`Config`] — the on-disk project configuration, discovered by walking
//!    up from the working directory and merged with user config and
//!    defaults (TOML, YAML, or JSON).
//! 2. [`ReleaseSettings`] — the immutable record the orchestrator consumes,
//!    produced once per invocation by [`ReleaseSettings::resolve`] with
//!    precedence: command-line override > project file > built-in default.
//!
//! # Config file locations (in order of precedence, highest first):
//! - `.gantry.<ext>` in the current directory or any parent
//! - `gantry.<ext>` in the current directory or any parent
//! - `~/.config/gantry/config.<ext>` (user config)
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`.

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};

/// One external command as an ordered argument vector (program + args).
pub type CommandLine = Vec<String>;

/// Default distribution output directory.
pub const DEFAULT_DISTRIBUTION_DIR: &str = "dist";

/// Default changelog file opened during the changelog step.
pub const DEFAULT_NEWS_FILE: &str = "CHANGELOG.md";

/// The on-disk configuration for gantry.
///
/// All section fields are optional; absent values fall back to built-in
/// defaults during settings resolution.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Project layout overrides.
    pub project: Option<ProjectConfig>,
    /// Lifecycle step commands.
    pub steps: Option<StepsConfig>,
    /// Release gate behavior.
    pub release: Option<ReleaseConfig>,
}

/// Project layout configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectConfig {
    /// Distribution output directory (default: `dist`).
    pub distribution_dir: Option<Utf8PathBuf>,
    /// Branch releases may run from: a branch name, or `"*"` for any.
    /// Unset means "the remote's default branch, when detectable".
    pub releasable_branch: Option<String>,
    /// Changelog/news files opened for editing and committed with a release.
    pub news_files: Option<Vec<Utf8PathBuf>>,
}

/// Lifecycle step commands, each an ordered list of argument vectors.
///
/// Commands support `{version}`, `{tag}` and `{dist}` placeholder
/// interpolation during a release.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StepsConfig {
    /// Lint commands (e.g., `[["cargo", "clippy", "--", "-D", "warnings"]]`).
    pub lint: Option<Vec<CommandLine>>,
    /// Test commands.
    pub test: Option<Vec<CommandLine>>,
    /// Build commands producing the distribution artifacts.
    pub build: Option<Vec<CommandLine>>,
    /// Publish commands uploading artifacts to a package index.
    pub publish: Option<Vec<CommandLine>>,
}

/// Release gate behavior.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseConfig {
    /// Require a clean working directory before releasing (default: `true`).
    pub require_clean: Option<bool>,
    /// Require the branch to be up to date with its remote (default: `true`).
    pub require_up_to_date: Option<bool>,
    /// Prompt for confirmation before a real release (default: `true`).
    ///
    /// Set to `false` for CI/scripted use. The `--yes`/`-y` CLI flag
    /// overrides this at runtime.
    pub confirm: Option<bool>,
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup and config file names.
const APP_NAME: &str = "gantry";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Starting directory for project config search.
    project_search_root: Option<Utf8PathBuf>,
    /// Whether to include user config from the XDG directory.
    include_user_config: bool,
    /// Stop searching when we hit a directory containing this file/dir.
    boundary_marker: Option<String>,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            project_search_root: None,
            include_user_config: true,
            boundary_marker: Some(".git".to_string()),
            explicit_files: Vec::new(),
        }
    }

    /// Set the starting directory for project config search.
    ///
    /// The loader walks up from this directory looking for config files.
    #[must_use]
    pub fn with_project_search<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.project_search_root = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set whether to include user config from `~/.config/gantry/`.
    #[must_use]
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Disable the boundary marker (search all the way to the filesystem root).
    #[must_use]
    pub fn without_boundary_marker(mut self) -> Self {
        self.boundary_marker = None;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    /// Explicit files are loaded after discovered files.
    #[must_use]
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    ///
    /// Precedence (highest to lowest):
    /// 1. Explicit files (in order added via `with_file`)
    /// 2. Project config (closest to search root)
    /// 3. User config (`~/.config/gantry/config.<ext>`)
    /// 4. Default values
    #[tracing::instrument(skip(self), fields(search_root = ?self.project_search_root))]
    pub fn load(self) -> ConfigResult<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = Self::find_user_config()
        {
            figment = Self::merge_file(figment, &user_config);
        }

        if let Some(ref root) = self.project_search_root
            && let Some(project_config) = self.find_project_config(root)
        {
            figment = Self::merge_file(figment, &project_config);
        }

        for file in &self.explicit_files {
            figment = Self::merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(log_level = config.log_level.as_str(), "configuration loaded");
        Ok(config)
    }

    /// Find project config by walking up from the given directory.
    fn find_project_config(&self, start: &Utf8Path) -> Option<Utf8PathBuf> {
        let mut current = Some(start.to_path_buf());

        while let Some(dir) = current {
            if let Some(ref marker) = self.boundary_marker {
                let marker_path = dir.join(marker);
                if marker_path.exists() && dir != start {
                    // Crossed into a different project; stop searching.
                    break;
                }
            }

            for ext in CONFIG_EXTENSIONS {
                let dotfile = dir.join(format!(".{APP_NAME}.{ext}"));
                if dotfile.is_file() {
                    return Some(dotfile);
                }

                let regular = dir.join(format!("{APP_NAME}.{ext}"));
                if regular.is_file() {
                    return Some(regular);
                }
            }

            current = dir.parent().map(Utf8Path::to_path_buf);
        }

        None
    }

    /// Find user config in the XDG config directory.
    fn find_user_config() -> Option<Utf8PathBuf> {
        let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
        let config_dir = proj_dirs.config_dir();

        for ext in CONFIG_EXTENSIONS {
            let config_path = config_dir.join(format!("config.{ext}"));
            if config_path.is_file() {
                return Utf8PathBuf::from_path_buf(config_path).ok();
            }
        }

        None
    }

    /// Merge a config file into the figment, detecting format from extension.
    fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
        match path.extension() {
            Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
            Some("json") => figment.merge(Json::file_exact(path.as_str())),
            _ => figment.merge(Toml::file_exact(path.as_str())),
        }
    }
}

/// Which branches a release may run from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchFilter {
    /// Compare against the remote's default branch; skip the gate when none
    /// can be detected.
    Auto,
    /// Any branch may release (the `"*"` wildcard).
    Any,
    /// Exactly this branch.
    Exact(String),
}

impl BranchFilter {
    /// Interpret an optional filter string: absent is [`Self::Auto`],
    /// `"*"` is [`Self::Any`], anything else an exact branch name.
    pub fn from_option(value: Option<&str>) -> Self {
        match value {
            None => Self::Auto,
            Some("*") => Self::Any,
            Some(name) => Self::Exact(name.to_string()),
        }
    }
}

impl std::fmt::Display for BranchFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "(default branch)"),
            Self::Any => write!(f, "*"),
            Self::Exact(name) => write!(f, "{name}"),
        }
    }
}

/// Command-line overrides applied on top of the file configuration.
///
/// `None` means "not given on the command line"; the config file or the
/// built-in default applies.
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    /// Distribution output directory.
    pub distribution_dir: Option<Utf8PathBuf>,
    /// Releasable branch filter (`"*"` for any).
    pub releasable_branch: Option<String>,
    /// Changelog/news files.
    pub news_files: Option<Vec<Utf8PathBuf>>,
    /// Lint step commands.
    pub lint_steps: Option<Vec<CommandLine>>,
    /// Test step commands.
    pub test_steps: Option<Vec<CommandLine>>,
    /// Build step commands.
    pub build_steps: Option<Vec<CommandLine>>,
    /// Publish step commands.
    pub publish_steps: Option<Vec<CommandLine>>,
    /// Working-directory cleanliness requirement.
    pub require_clean: Option<bool>,
    /// Remote up-to-date requirement.
    pub require_up_to_date: Option<bool>,
    /// Changelog editor command (tests use this; the CLI leaves it to `$EDITOR`).
    pub editor: Option<CommandLine>,
    /// Rehearse without side effects.
    pub dry_run: bool,
}

/// Fully-resolved settings for one orchestrator invocation.
///
/// Immutable once built; every step reads from this record instead of
/// reaching for ambient state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReleaseSettings {
    /// Distribution output directory.
    pub distribution_dir: Utf8PathBuf,
    /// Which branches a release may run from.
    pub releasable_branch: BranchFilter,
    /// Changelog/news files, in edit order.
    pub news_files: Vec<Utf8PathBuf>,
    /// Lint step commands.
    pub lint_steps: Vec<CommandLine>,
    /// Test step commands.
    pub test_steps: Vec<CommandLine>,
    /// Build step commands.
    pub build_steps: Vec<CommandLine>,
    /// Publish step commands. Empty means the publish step is skipped.
    pub publish_steps: Vec<CommandLine>,
    /// Abort when the working directory has uncommitted changes.
    pub require_clean: bool,
    /// Abort when the branch is behind its remote.
    pub require_up_to_date: bool,
    /// Changelog editor command; `None` resolves from `$EDITOR` at edit time.
    pub editor: Option<CommandLine>,
    /// Rehearse without side effects.
    pub dry_run: bool,
}

impl ReleaseSettings {
    /// Build settings by a pure merge of built-in defaults, the file
    /// configuration, and command-line overrides — later sources win.
    pub fn resolve(config: &Config, overrides: SettingsOverrides) -> Self {
        let project = config.project.as_ref();
        let steps = config.steps.as_ref();
        let release = config.release.as_ref();

        Self {
            distribution_dir: overrides
                .distribution_dir
                .or_else(|| project.and_then(|p| p.distribution_dir.clone()))
                .unwrap_or_else(|| Utf8PathBuf::from(DEFAULT_DISTRIBUTION_DIR)),
            releasable_branch: BranchFilter::from_option(
                overrides
                    .releasable_branch
                    .as_deref()
                    .or_else(|| project.and_then(|p| p.releasable_branch.as_deref())),
            ),
            news_files: overrides
                .news_files
                .or_else(|| project.and_then(|p| p.news_files.clone()))
                .unwrap_or_else(|| vec![Utf8PathBuf::from(DEFAULT_NEWS_FILE)]),
            lint_steps: overrides
                .lint_steps
                .or_else(|| steps.and_then(|s| s.lint.clone()))
                .unwrap_or_default(),
            test_steps: overrides
                .test_steps
                .or_else(|| steps.and_then(|s| s.test.clone()))
                .unwrap_or_default(),
            build_steps: overrides
                .build_steps
                .or_else(|| steps.and_then(|s| s.build.clone()))
                .unwrap_or_default(),
            publish_steps: overrides
                .publish_steps
                .or_else(|| steps.and_then(|s| s.publish.clone()))
                .unwrap_or_default(),
            require_clean: overrides
                .require_clean
                .or_else(|| release.and_then(|r| r.require_clean))
                .unwrap_or(true),
            require_up_to_date: overrides
                .require_up_to_date
                .or_else(|| release.and_then(|r| r.require_up_to_date))
                .unwrap_or(true),
            editor: overrides.editor,
            dry_run: overrides.dry_run,
        }
    }
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self::resolve(&Config::default(), SettingsOverrides::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.log_dir.is_none());
        assert!(config.project.is_none());
        assert!(config.steps.is_none());
    }

    #[test]
    fn loader_builds_with_defaults() {
        let loader = ConfigLoader::new()
            .with_user_config(false)
            .without_boundary_marker();

        let config = loader.load().unwrap();
        assert_eq!(config.log_level, LogLevel::Info);
    }

    #[test]
    fn single_file_overrides_default() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        fs::write(
            &config_path,
            r#"log_level = "debug"

[project]
distribution_dir = "target/dist"
releasable_branch = "main"

[steps]
lint = [["cargo", "clippy", "--", "-D", "warnings"]]
"#,
        )
        .unwrap();

        let config_path = Utf8PathBuf::try_from(config_path).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&config_path)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Debug);
        let project = config.project.unwrap();
        assert_eq!(project.distribution_dir.unwrap(), "target/dist");
        assert_eq!(project.releasable_branch.as_deref(), Some("main"));
        let lint = config.steps.unwrap().lint.unwrap();
        assert_eq!(lint.len(), 1);
        assert_eq!(lint[0][0], "cargo");
    }

    #[test]
    fn later_file_overrides_earlier() {
        let tmp = TempDir::new().unwrap();

        let base_config = tmp.path().join("base.toml");
        fs::write(&base_config, r#"log_level = "warn""#).unwrap();

        let override_config = tmp.path().join("override.toml");
        fs::write(&override_config, r#"log_level = "error""#).unwrap();

        let base_config = Utf8PathBuf::try_from(base_config).unwrap();
        let override_config = Utf8PathBuf::try_from(override_config).unwrap();

        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_file(&base_config)
            .with_file(&override_config)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Error);
    }

    #[test]
    fn discovers_dotfile_in_parent_directory() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(".gantry.toml"), r#"log_level = "warn""#).unwrap();
        let nested = tmp.path().join("a/b");
        fs::create_dir_all(&nested).unwrap();

        let nested = Utf8PathBuf::try_from(nested).unwrap();
        let config = ConfigLoader::new()
            .with_user_config(false)
            .with_project_search(&nested)
            .load()
            .unwrap();

        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn resolve_uses_builtin_defaults() {
        let settings = ReleaseSettings::default();
        assert_eq!(settings.distribution_dir, DEFAULT_DISTRIBUTION_DIR);
        assert_eq!(settings.releasable_branch, BranchFilter::Auto);
        assert_eq!(settings.news_files, vec![Utf8PathBuf::from(DEFAULT_NEWS_FILE)]);
        assert!(settings.lint_steps.is_empty());
        assert!(settings.publish_steps.is_empty());
        assert!(settings.require_clean);
        assert!(settings.require_up_to_date);
        assert!(!settings.dry_run);
    }

    #[test]
    fn resolve_prefers_config_over_defaults() {
        let config = Config {
            project: Some(ProjectConfig {
                distribution_dir: Some(Utf8PathBuf::from("out")),
                releasable_branch: Some("*".to_string()),
                news_files: Some(vec![Utf8PathBuf::from("NEWS.md")]),
            }),
            release: Some(ReleaseConfig {
                require_clean: Some(false),
                ..ReleaseConfig::default()
            }),
            ..Config::default()
        };

        let settings = ReleaseSettings::resolve(&config, SettingsOverrides::default());
        assert_eq!(settings.distribution_dir, "out");
        assert_eq!(settings.releasable_branch, BranchFilter::Any);
        assert_eq!(settings.news_files, vec![Utf8PathBuf::from("NEWS.md")]);
        assert!(!settings.require_clean);
        assert!(settings.require_up_to_date);
    }

    #[test]
    fn resolve_prefers_overrides_over_config() {
        let config = Config {
            project: Some(ProjectConfig {
                distribution_dir: Some(Utf8PathBuf::from("out")),
                releasable_branch: Some("main".to_string()),
                news_files: None,
            }),
            steps: Some(StepsConfig {
                test: Some(vec![vec!["pytest".to_string()]]),
                ..StepsConfig::default()
            }),
            ..Config::default()
        };

        let overrides = SettingsOverrides {
            distribution_dir: Some(Utf8PathBuf::from("artifacts")),
            releasable_branch: Some("release".to_string()),
            test_steps: Some(vec![vec!["cargo".to_string(), "test".to_string()]]),
            dry_run: true,
            ..SettingsOverrides::default()
        };

        let settings = ReleaseSettings::resolve(&config, overrides);
        assert_eq!(settings.distribution_dir, "artifacts");
        assert_eq!(
            settings.releasable_branch,
            BranchFilter::Exact("release".to_string())
        );
        assert_eq!(settings.test_steps, vec![vec!["cargo".to_string(), "test".to_string()]]);
        assert!(settings.dry_run);
    }

    #[test]
    fn branch_filter_parsing() {
        assert_eq!(BranchFilter::from_option(None), BranchFilter::Auto);
        assert_eq!(BranchFilter::from_option(Some("*")), BranchFilter::Any);
        assert_eq!(
            BranchFilter::from_option(Some("main")),
            BranchFilter::Exact("main".to_string())
        );
    }
}
