//! Run configuration.
//!
//! Loaded from TOML; every section and field has a default so a missing or
//! partial file still yields a usable configuration:
//!
//! ```
//! use course_slot_scheduler::config::{ConsensusMethod, SchedulerConfig};
//!
//! let config = SchedulerConfig::from_toml_str(r#"
//!     [consensus]
//!     method = "borda"
//!
//!     [solver]
//!     time_limit_secs = 30.0
//! "#).unwrap();
//!
//! assert_eq!(config.consensus.method, ConsensusMethod::Borda);
//! assert_eq!(config.balance.day_pattern_tolerance, 2);
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::solver::SolveBudget;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SchedulerConfig {
    pub consensus: ConsensusConfig,
    pub satisfaction: SatisfactionConfig,
    pub balance: BalanceConfig,
    pub solver: SolverConfig,
    pub run: RunConfig,
    pub server: ServerConfig,
}

impl SchedulerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.satisfaction.validate()?;
        if let Some(t) = self.solver.time_limit_secs {
            if !(t.is_finite() && t > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "time_limit_secs must be positive, got {t}"
                )));
            }
        }
        if let Some(gap) = self.solver.mip_rel_gap {
            if !(0.0..=1.0).contains(&gap) {
                return Err(ConfigError::Invalid(format!(
                    "mip_rel_gap must lie in [0, 1], got {gap}"
                )));
            }
        }
        if self.consensus.exact_slot_limit > ConsensusConfig::MAX_EXACT_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "exact_slot_limit {} exceeds {}",
                self.consensus.exact_slot_limit,
                ConsensusConfig::MAX_EXACT_SLOTS
            )));
        }
        Ok(())
    }

    pub fn budget(&self) -> SolveBudget {
        SolveBudget {
            time_limit: self
                .solver
                .time_limit_secs
                .and_then(|t| Duration::try_from_secs_f64(t).ok()),
            node_limit: self.solver.node_limit,
            mip_rel_gap: self.solver.mip_rel_gap,
            threads: self.solver.threads,
            random_seed: self.solver.random_seed,
            log_to_console: self.solver.log_to_console,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusMethod {
    /// Exact Kemeny-Young, falling back to Borda above `exact_slot_limit`.
    #[default]
    Exact,
    Borda,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ConsensusConfig {
    pub method: ConsensusMethod,
    pub exact_slot_limit: usize,
}

impl ConsensusConfig {
    /// Subset DP memory is 2^n entries.
    pub const MAX_EXACT_SLOTS: usize = 20;
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            method: ConsensusMethod::Exact,
            exact_slot_limit: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SatisfactionConfig {
    pub base_score: f64,
    pub tie_break_min: f64,
    pub tie_break_max: f64,
}

impl SatisfactionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.tie_break_min, self.tie_break_max);
        if !(min.is_finite() && max.is_finite() && min >= 0.0 && min < max) {
            return Err(ConfigError::Invalid(format!(
                "tie break range [{min}, {max}) is empty or negative"
            )));
        }
        if !self.base_score.is_finite() {
            return Err(ConfigError::Invalid("base_score must be finite".to_string()));
        }
        Ok(())
    }
}

impl Default for SatisfactionConfig {
    fn default() -> Self {
        Self {
            base_score: 5.0,
            tie_break_min: 0.1,
            tie_break_max: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct BalanceConfig {
    /// Allowed |MWF - TT|.
    pub day_pattern_tolerance: u32,
    /// Allowed max - min over start-time groups.
    pub start_time_tolerance: u32,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            day_pattern_tolerance: 2,
            start_time_tolerance: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct SolverConfig {
    pub time_limit_secs: Option<f64>,
    pub node_limit: Option<u64>,
    pub mip_rel_gap: Option<f64>,
    pub threads: u32,
    pub random_seed: i32,
    pub log_to_console: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit_secs: Some(60.0),
            node_limit: None,
            mip_rel_gap: None,
            threads: 1,
            random_seed: 1234,
            log_to_console: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct RunConfig {
    /// Seed for the satisfaction tie-break when the request carries none.
    pub seed: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self { seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "snake_case")]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8080".to_string(),
        }
    }
}
