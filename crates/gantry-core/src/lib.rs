//! Core library for gantry.
//!
//! This crate provides the building blocks used by the `gantry` CLI and by
//! projects that vendor gantry for their own lifecycle automation.
//!
//! # Modules
//!
//! - [`config`] - Configuration loading and settings resolution
//! - [`error`] - Error types and result aliases
//! - [`git`] - Read-only repository queries
//! - [`release`] - The release workflow state machine
//! - [`runner`] - External process execution with dry-run support
//! - [`testfiles`] - Source/test file correspondence check
//! - [`version`] - Version parsing and tag validation
//!
//! # Quick Start
//!
//! ```no_run
//! use gantry_core::config::{Config, ReleaseSettings, SettingsOverrides};
//!
//! let settings = ReleaseSettings::resolve(
//!     &Config::default(),
//!     SettingsOverrides {
//!         dry_run: true,
//!         ..SettingsOverrides::default()
//!     },
//! );
//! let outcome = gantry_core::release::release("1.2.3", &settings, |_| {})
//!     .expect("release rehearsal failed");
//! println!("rehearsed {} steps", outcome.steps.len());
//! ```
#![deny(unsafe_code)]

pub mod config;

pub mod error;

pub mod git;

pub mod release;

pub mod runner;

pub mod testfiles;

pub mod version;

pub use config::{Config, ConfigLoader, LogLevel, ReleaseSettings, SettingsOverrides};

pub use error::{ConfigError, ConfigResult};

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
