//! YAML configuration for the decision core.
//!
//! Every field has a default, so an empty file (or no file at all) gives the
//! stock tuning. Values are handed to the evaluator, policy and state machine
//! explicitly through the `build_*` helpers.

use crate::evaluator::{Evaluator, SearchLimits};
use crate::meld::{Rules, ScoreTable};
use crate::state::{GameStateMachine, MachineConfig};
use crate::strategy::{DecisionPolicy, StrategyConfig, StrategyPolicy};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub rules: RulesConfig,
    pub scores: ScoreTable,
    pub evaluator: EvaluatorConfig,
    pub strategy: StrategyConfig,
    pub machine: MachineConfig,
}

/// Game-variant switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Let runs continue from 13 back to 1.
    pub run_wrap: bool,
}

/// Search caps and cache size for the meld evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EvaluatorConfig {
    #[serde(default = "default_max_nodes")]
    pub max_nodes: u64,
    /// Wall-clock budget per evaluation in milliseconds.
    #[serde(default = "default_time_budget_ms")]
    pub time_budget_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

fn default_max_nodes() -> u64 {
    SearchLimits::default().max_nodes
}

fn default_time_budget_ms() -> u64 {
    SearchLimits::default().time_budget.as_millis() as u64
}

fn default_cache_capacity() -> usize {
    Evaluator::DEFAULT_CACHE_CAPACITY
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            max_nodes: default_max_nodes(),
            time_budget_ms: default_time_budget_ms(),
            cache_capacity: default_cache_capacity(),
        }
    }
}

impl EvaluatorConfig {
    pub fn limits(&self) -> SearchLimits {
        SearchLimits {
            max_nodes: self.max_nodes,
            time_budget: Duration::from_millis(self.time_budget_ms),
        }
    }
}

impl RulesConfig {
    pub fn rules(&self) -> Rules {
        Rules {
            run_wrap: self.run_wrap,
            ..Rules::default()
        }
    }
}

impl Config {
    /// Loads configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        // serde_yaml rejects an empty document for a struct
        if yaml.trim().is_empty() {
            return Ok(Config::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn to_yaml(&self) -> Result<String, ConfigError> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn build_evaluator(&self) -> Evaluator {
        Evaluator::new(
            self.rules.rules(),
            self.scores.clone(),
            self.evaluator.limits(),
        )
        .with_cache_capacity(self.evaluator.cache_capacity)
    }

    pub fn build_policy(&self) -> StrategyPolicy {
        StrategyPolicy::new(self.build_evaluator(), self.strategy.clone())
    }

    pub fn build_machine<P: DecisionPolicy>(&self, policy: P) -> GameStateMachine<P> {
        GameStateMachine::new(policy, self.machine.clone())
    }
}
