//! Command implementations

pub mod build;

pub mod clean;

pub mod release;

use gantry_core::config::CommandLine;

/// Split a `--*-step` flag value into an argument vector.
///
/// Flag values are whitespace-split; there is no shell quoting. Configure
/// steps in the project file when an argument needs embedded whitespace.
fn parse_step(value: &str) -> CommandLine {
    value.split_whitespace().map(str::to_string).collect()
}

/// Turn repeated step flags into a settings override.
///
/// No flags means "not overridden" so the config file still applies.
fn steps_override(values: &[String]) -> Option<Vec<CommandLine>> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().map(|value| parse_step(value)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_step_splits_on_whitespace() {
        assert_eq!(
            parse_step("cargo clippy -- -D warnings"),
            vec!["cargo", "clippy", "--", "-D", "warnings"]
        );
    }

    #[test]
    fn steps_override_empty_means_unset() {
        assert!(steps_override(&[]).is_none());
    }

    #[test]
    fn steps_override_maps_each_flag() {
        let flags = vec!["cargo test".to_string(), "cargo doc".to_string()];
        let steps = steps_override(&flags).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[0], vec!["cargo", "test"]);
    }
}
