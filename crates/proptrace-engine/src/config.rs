use std::ops::RangeInclusive;
use std::path::Path;

use proptrace_model::{DEFAULT_ACCOUNTS, DEFAULT_TOTAL_SUPPLY};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::errors::GenerateError;

/// Default number of operation records per run.
pub const DEFAULT_TRACE_LENGTH: usize = 1000;

/// Knobs for one generation run.
///
/// Every field has a default, so a JSON config file only needs to name
/// what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Number of operation records to emit.
    pub trace_length: usize,
    /// Account pool parameters are drawn from.
    pub accounts: Vec<String>,
    pub initial_supply: i64,
    pub initial_balance_min: i64,
    pub initial_balance_max: i64,
    pub block_size_min: usize,
    pub block_size_max: usize,
    /// Consecutive failures tolerated per requested record.
    pub retry_factor: usize,
    /// Chance of splicing a business pattern after an accepted record.
    pub pattern_probability: f64,
    /// How many recent records count against an operation's weight.
    pub recent_window: usize,
    /// Base selection weight of `transfer` and `transferFrom`.
    pub transfer_weight: u32,
    /// Fixed seed for reproducible runs; entropy when absent.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            trace_length: DEFAULT_TRACE_LENGTH,
            accounts: DEFAULT_ACCOUNTS.iter().map(|a| a.to_string()).collect(),
            initial_supply: DEFAULT_TOTAL_SUPPLY,
            initial_balance_min: 1000,
            initial_balance_max: 10000,
            block_size_min: 10,
            block_size_max: 20,
            retry_factor: 100,
            pattern_probability: 0.3,
            recent_window: 10,
            transfer_weight: 5,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    pub fn with_length(mut self, trace_length: usize) -> Self {
        self.trace_length = trace_length;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_pattern_probability(mut self, p: f64) -> Self {
        self.pattern_probability = p;
        self
    }

    /// Consecutive failures after which the search gives up.
    pub fn retry_budget(&self) -> usize {
        self.trace_length.saturating_mul(self.retry_factor)
    }

    /// Starting balance range. An inverted range collapses to its minimum.
    pub fn balance_range(&self) -> RangeInclusive<i64> {
        self.initial_balance_min..=self.initial_balance_max.max(self.initial_balance_min)
    }

    pub fn block_size_range(&self) -> RangeInclusive<usize> {
        self.block_size_min..=self.block_size_max
    }

    /// The run's random source: seeded if a seed is configured.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    pub fn validate(&self) -> Result<(), GenerateError> {
        if self.accounts.is_empty() {
            return Err(GenerateError::InvalidConfig(
                "account pool must not be empty".into(),
            ));
        }
        if self.block_size_min == 0 || self.block_size_min > self.block_size_max {
            return Err(GenerateError::InvalidConfig(format!(
                "block size range {}..={} is empty or starts at zero",
                self.block_size_min, self.block_size_max
            )));
        }
        if self.initial_balance_min > self.initial_balance_max {
            return Err(GenerateError::InvalidConfig(format!(
                "initial balance range {}..={} is empty",
                self.initial_balance_min, self.initial_balance_max
            )));
        }
        let funded = i64::try_from(self.accounts.len())
            .ok()
            .and_then(|n| self.initial_balance_max.checked_mul(n));
        if funded.is_none() {
            return Err(GenerateError::InvalidConfig(format!(
                "initial balance {} across {} accounts overflows the ledger",
                self.initial_balance_max,
                self.accounts.len()
            )));
        }
        if !(0.0..=1.0).contains(&self.pattern_probability) {
            return Err(GenerateError::InvalidConfig(format!(
                "pattern probability {} is outside [0, 1]",
                self.pattern_probability
            )));
        }
        Ok(())
    }

    /// Load a JSON config file and validate it.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, GenerateError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| GenerateError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: GeneratorConfig =
            serde_json::from_str(&raw).map_err(|source| GenerateError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }
}
