//! Tracker configuration.
//!
//! Resolved once, on the first instrumented call, from environment variables:
//! - `ALLOCWATCH_OUTPUT`: `<stdout>`, `<stderr>` (default) or a file path that
//!   is created or truncated.
//! - `ALLOCWATCH_REPORT`: print every allocation history at exit (default on).
//! - `ALLOCWATCH_COLLECT`: free still-allocated chunks at exit (default on).
//! - `ALLOCWATCH_VERBOSE`: log every instrumented call as it happens.
//! - `ALLOCWATCH_VALIDATE`: report frees and resizes of unknown addresses.
//! - `ALLOCWATCH_JSON_SUMMARY`: append the final counters as one JSON line.

use std::path::PathBuf;

pub const ENV_OUTPUT: &str = "ALLOCWATCH_OUTPUT";
pub const ENV_REPORT: &str = "ALLOCWATCH_REPORT";
pub const ENV_COLLECT: &str = "ALLOCWATCH_COLLECT";
pub const ENV_VERBOSE: &str = "ALLOCWATCH_VERBOSE";
pub const ENV_VALIDATE: &str = "ALLOCWATCH_VALIDATE";
pub const ENV_JSON_SUMMARY: &str = "ALLOCWATCH_JSON_SUMMARY";

/// Where tracker output goes.
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash)]
pub enum OutputTarget {
    Stdout,
    #[default]
    Stderr,
    File(PathBuf),
}

impl OutputTarget {
    /// Parse `<stdout>`, `<stderr>` or a path.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "<stdout>" => Self::Stdout,
            "<stderr>" | "" => Self::Stderr,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

/// Parse a boolean switch (case-insensitive), `None` when unrecognised.
#[must_use]
pub fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "on" | "true" | "yes" | "enabled" => Some(true),
        "0" | "off" | "false" | "no" | "disabled" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub output: OutputTarget,
    pub report: bool,
    pub collect: bool,
    pub verbose: bool,
    pub validate: bool,
    pub json_summary: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            output: OutputTarget::Stderr,
            report: true,
            collect: true,
            verbose: false,
            validate: false,
            json_summary: false,
        }
    }
}

impl TrackerConfig {
    /// Configuration from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Configuration from an arbitrary variable lookup. Unset or unparsable
    /// switches keep their defaults.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let switch = |key: &str, default: bool| {
            lookup(key)
                .and_then(|raw| parse_switch(&raw))
                .unwrap_or(default)
        };
        Self {
            output: lookup(ENV_OUTPUT)
                .map(|raw| OutputTarget::parse(&raw))
                .unwrap_or(defaults.output),
            report: switch(ENV_REPORT, defaults.report),
            collect: switch(ENV_COLLECT, defaults.collect),
            verbose: switch(ENV_VERBOSE, defaults.verbose),
            validate: switch(ENV_VALIDATE, defaults.validate),
            json_summary: switch(ENV_JSON_SUMMARY, defaults.json_summary),
        }
    }
}
