// Override spread and amount calculations for direct upline/downline pairs

use crate::errors::{AppError, Result};
use serde::{Deserialize, Serialize};

/// Lowest rung of the contract ladder.
pub const MIN_CONTRACT_LEVEL: i32 = 80;
/// Highest rung of the contract ladder.
pub const MAX_CONTRACT_LEVEL: i32 = 145;
/// Ladder rungs are 5 points apart.
pub const CONTRACT_LEVEL_STEP: i32 = 5;
/// Level assumed for agents with no contract level on file.
pub const STREET_LEVEL: i32 = 100;

/// A validated rung on the 80..=145 contract ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractLevel(i32);

impl ContractLevel {
    pub fn new(level: i32) -> Result<Self> {
        if !(MIN_CONTRACT_LEVEL..=MAX_CONTRACT_LEVEL).contains(&level)
            || level % CONTRACT_LEVEL_STEP != 0
        {
            return Err(AppError::Validation(format!(
                "contract level must be between {} and {} in steps of {}",
                MIN_CONTRACT_LEVEL, MAX_CONTRACT_LEVEL, CONTRACT_LEVEL_STEP
            )));
        }
        Ok(Self(level))
    }

    /// Resolve an optional stored level, falling back to street level.
    pub fn resolve(level: Option<i32>) -> Self {
        Self::resolve_with(level, Self::default())
    }

    /// Resolve an optional stored level against a configured fallback.
    pub fn resolve_with(level: Option<i32>, default: Self) -> Self {
        level.and_then(|l| Self::new(l).ok()).unwrap_or(default)
    }

    pub fn value(&self) -> i32 {
        self.0
    }
}

impl Default for ContractLevel {
    fn default() -> Self {
        Self(STREET_LEVEL)
    }
}

/// Percentage-point spread the upline earns on the agent's production.
/// Never negative: an upline at or below the agent's level earns nothing.
pub fn compute_spread(agent: ContractLevel, upline: ContractLevel) -> i32 {
    (upline.value() - agent.value()).max(0)
}

/// Override dollars for a given production total and spread percentage.
/// Pure and total: missing inputs resolve to zero, never an error.
pub fn compute_override_amount(agent_production: f64, spread_percent: i32) -> f64 {
    if spread_percent <= 0 || agent_production <= 0.0 {
        return 0.0;
    }
    agent_production * (f64::from(spread_percent) / 100.0)
}

/// Spread and amount for one direct upline/downline pair. Unset levels on
/// either side resolve to `default`.
///
/// Multi-level rollups are a composition of direct pairs done by the caller;
/// this function never recurses into deeper descendants.
pub fn direct_pair_override(
    agent_level: Option<i32>,
    upline_level: Option<i32>,
    agent_production: f64,
    default: ContractLevel,
) -> (i32, f64) {
    let spread = compute_spread(
        ContractLevel::resolve_with(agent_level, default),
        ContractLevel::resolve_with(upline_level, default),
    );
    (spread, compute_override_amount(agent_production, spread))
}
