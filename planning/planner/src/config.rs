//! Configuration of the Fast Downward planner.

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

use crate::errors::{PlannerError, Result};
use crate::status::ResultStatus;

/// Environment variable giving the path of the `fast-downward.py` driver script.
pub const DOWNWARD_PATH_VAR: &str = "DOWNWARD_PATH";

const DEFAULT_EXECUTABLE: &str = "fast-downward.py";

/// Log level of the planner itself, passed with `--log-level`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warning => write!(f, "warning"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct DownwardConfig {
    /// Driver script of the planner.
    pub executable: PathBuf,
    /// Interpreter running the driver script. If `None`, the script is executed directly.
    pub interpreter: Option<PathBuf>,
    /// Predefined configuration of the planner, e.g. `lama-first`. Exclusive with `search_config`.
    pub alias: Option<String>,
    /// Search configuration, e.g. `astar(lmcut())`.
    pub search_config: Option<String>,
    pub anytime_alias: Option<String>,
    pub anytime_search_config: Option<String>,
    pub translate_options: Vec<String>,
    /// Time limit of the search component, in the syntax of the planner (e.g. `30s`, `5m`).
    pub search_time_limit: Option<String>,
    pub log_level: LogLevel,
    /// Whether the search configuration is optimal. Optimal configurations solve a problem whose goal is
    /// reached by a dedicated action.
    pub optimal: bool,
}

/// Path of the planner: the value of `DOWNWARD_PATH` if set, `fast-downward.py` otherwise.
pub fn default_executable() -> PathBuf {
    std::env::var_os(DOWNWARD_PATH_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_EXECUTABLE))
}

impl Default for DownwardConfig {
    fn default() -> Self {
        DownwardConfig::satisficing()
    }
}

impl DownwardConfig {
    /// Greedy search with the LAMA configuration, continued by the full LAMA 2011 configuration in anytime
    /// mode.
    pub fn satisficing() -> Self {
        DownwardConfig {
            executable: default_executable(),
            interpreter: None,
            alias: Some("lama-first".to_string()),
            search_config: None,
            anytime_alias: Some("seq-sat-lama-2011".to_string()),
            anytime_search_config: None,
            translate_options: Vec::new(),
            search_time_limit: None,
            log_level: LogLevel::Info,
            optimal: false,
        }
    }

    /// A* with the LM-cut heuristic.
    pub fn optimal() -> Self {
        DownwardConfig {
            executable: default_executable(),
            interpreter: None,
            alias: None,
            search_config: Some("astar(lmcut())".to_string()),
            anytime_alias: None,
            anytime_search_config: None,
            translate_options: Vec::new(),
            search_time_limit: None,
            log_level: LogLevel::Info,
            optimal: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.alias.is_some() && self.search_config.is_some() {
            return Err(PlannerError::InvalidConfig(
                "an alias and a search configuration cannot be given together".to_string(),
            ));
        }
        if self.anytime_alias.is_some() && self.anytime_search_config.is_some() {
            return Err(PlannerError::InvalidConfig(
                "an anytime alias and an anytime search configuration cannot be given together".to_string(),
            ));
        }
        if self.executable.as_os_str().is_empty() {
            return Err(PlannerError::InvalidConfig("empty planner executable".to_string()));
        }
        Ok(())
    }

    pub fn has_anytime_config(&self) -> bool {
        self.anytime_alias.is_some() || self.anytime_search_config.is_some()
    }

    /// Status reported when the planner terminates normally without a plan.
    pub fn no_plan_guarantee(&self) -> ResultStatus {
        if self.optimal {
            ResultStatus::UnsolvableProven
        } else {
            ResultStatus::UnsolvableIncompletely
        }
    }

    /// Status reported for a plan of a problem with quality metrics.
    pub fn metrics_guarantee(&self) -> ResultStatus {
        if self.optimal {
            ResultStatus::SolvedOptimally
        } else {
            ResultStatus::SolvedSatisficing
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_valid() {
        assert!(DownwardConfig::satisficing().validate().is_ok());
        assert!(DownwardConfig::optimal().validate().is_ok());
        assert!(DownwardConfig::satisficing().has_anytime_config());
        assert!(!DownwardConfig::optimal().has_anytime_config());
        assert_eq!(DownwardConfig::optimal().no_plan_guarantee(), ResultStatus::UnsolvableProven);
        assert_eq!(
            DownwardConfig::satisficing().metrics_guarantee(),
            ResultStatus::SolvedSatisficing
        );
    }

    #[test]
    fn alias_excludes_search_config() {
        let mut config = DownwardConfig::satisficing();
        config.search_config = Some("eager_greedy([ff()])".to_string());
        assert!(matches!(config.validate(), Err(PlannerError::InvalidConfig(_))));

        let mut config = DownwardConfig::optimal();
        config.anytime_alias = Some("seq-opt-bjolp".to_string());
        assert!(config.validate().is_ok());
        config.anytime_search_config = Some("astar(blind())".to_string());
        assert!(matches!(config.validate(), Err(PlannerError::InvalidConfig(_))));
    }
}
