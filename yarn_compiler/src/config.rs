//! Compiler settings.
//!
//! Settings come from defaults, the process environment, or a `[compiler]`
//! table in a TOML project file:
//!
//! ```toml
//! [compiler]
//! solver_time_limit_secs = 5
//! enforce_time_limit = true
//! track_all_nodes = false
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::{CResult, CompileError};

/// Wall-clock limit for the individual constraint retry loop.
pub const DEFAULT_SOLVER_TIME_LIMIT: Duration = Duration::from_secs(10);

pub const ENV_SOLVER_TIME_LIMIT: &str = "YARN_SOLVER_TIME_LIMIT";
pub const ENV_ENFORCE_TIME_LIMIT: &str = "YARN_SOLVER_ENFORCE_TIME_LIMIT";
pub const ENV_TRACK_ALL_NODES: &str = "YARN_TRACK_ALL_NODES";

#[derive(Debug, Clone, PartialEq)]
pub struct CompilerConfig {
    pub solver_time_limit: Duration,
    /// Off in debug builds so that stepping through the solver never trips
    /// the limit.
    pub enforce_time_limit: bool,
    /// Give every node a visit counter, not only the ones scripts query.
    pub track_all_nodes: bool,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            solver_time_limit: DEFAULT_SOLVER_TIME_LIMIT,
            enforce_time_limit: !cfg!(debug_assertions),
            track_all_nodes: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    compiler: Option<CompilerSection>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompilerSection {
    solver_time_limit_secs: Option<f64>,
    enforce_time_limit: Option<bool>,
    track_all_nodes: Option<bool>,
}

impl CompilerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source; unparsable values keep the
    /// default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(secs) = lookup(ENV_SOLVER_TIME_LIMIT).and_then(|v| parse_seconds(&v)) {
            config.solver_time_limit = secs;
        }
        if let Some(flag) = lookup(ENV_ENFORCE_TIME_LIMIT).and_then(|v| parse_flag(&v)) {
            config.enforce_time_limit = flag;
        }
        if let Some(flag) = lookup(ENV_TRACK_ALL_NODES).and_then(|v| parse_flag(&v)) {
            config.track_all_nodes = flag;
        }
        config
    }

    pub fn from_toml_str(source: &str) -> CResult<Self> {
        let parsed: ConfigFile =
            toml::from_str(source).map_err(|e| CompileError::Config(e.to_string()))?;
        let mut config = Self::default();
        let Some(section) = parsed.compiler else {
            return Ok(config);
        };
        if let Some(secs) = section.solver_time_limit_secs {
            config.solver_time_limit = seconds(secs).ok_or_else(|| {
                CompileError::Config(format!("solver_time_limit_secs must be positive, got {secs}"))
            })?;
        }
        if let Some(flag) = section.enforce_time_limit {
            config.enforce_time_limit = flag;
        }
        if let Some(flag) = section.track_all_nodes {
            config.track_all_nodes = flag;
        }
        Ok(config)
    }

    pub fn with_time_limit(mut self, limit: Duration) -> Self {
        self.solver_time_limit = limit;
        self.enforce_time_limit = true;
        self
    }
}

fn seconds(secs: f64) -> Option<Duration> {
    (secs.is_finite() && secs > 0.0).then(|| Duration::from_secs_f64(secs))
}

fn parse_seconds(value: &str) -> Option<Duration> {
    value.trim().parse::<f64>().ok().and_then(seconds)
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_limit_is_ten_seconds() {
        let config = CompilerConfig::default();
        assert_eq!(config.solver_time_limit, Duration::from_secs(10));
        assert_eq!(config.enforce_time_limit, !cfg!(debug_assertions));
    }

    #[test]
    fn test_from_lookup_reads_both_variables() {
        let vars: HashMap<&str, &str> = [
            (ENV_SOLVER_TIME_LIMIT, "2.5"),
            (ENV_ENFORCE_TIME_LIMIT, "yes"),
        ]
        .into_iter()
        .collect();
        let config = CompilerConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(config.solver_time_limit, Duration::from_millis(2500));
        assert!(config.enforce_time_limit);
        assert!(!config.track_all_nodes);
    }

    #[test]
    fn test_from_lookup_ignores_garbage() {
        let config = CompilerConfig::from_lookup(|k| match k {
            ENV_SOLVER_TIME_LIMIT => Some("-3".to_string()),
            ENV_ENFORCE_TIME_LIMIT => Some("maybe".to_string()),
            _ => None,
        });
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_from_toml_str() {
        let config = CompilerConfig::from_toml_str(
            "[compiler]\nsolver_time_limit_secs = 3\nenforce_time_limit = false\ntrack_all_nodes = true\n",
        )
        .unwrap();
        assert_eq!(config.solver_time_limit, Duration::from_secs(3));
        assert!(!config.enforce_time_limit);
        assert!(config.track_all_nodes);
    }

    #[test]
    fn test_from_toml_without_section_is_default() {
        let config = CompilerConfig::from_toml_str("[project]\nname = \"demo\"\n").unwrap();
        assert_eq!(config, CompilerConfig::default());
    }

    #[test]
    fn test_from_toml_rejects_unknown_keys_and_zero_limit() {
        assert!(CompilerConfig::from_toml_str("[compiler]\nspeed = 1\n").is_err());
        assert!(CompilerConfig::from_toml_str("[compiler]\nsolver_time_limit_secs = 0\n").is_err());
    }
}
