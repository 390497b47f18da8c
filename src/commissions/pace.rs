// Production rollups and pace-to-target projections

use crate::config::PaceConfig;
use crate::db::schema::ProductionRow;
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Fractions smaller than this are treated as "start of period".
const MIN_ELAPSED_FRACTION: f64 = 1e-9;

/// Aggregate production over a set of premium rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductionSummary {
    pub ap_total: f64,
    pub policy_count: usize,
    pub avg_premium: f64,
}

/// Sum issued premium across the supplied rows. The rows are expected to be
/// pre-filtered to the relevant lifecycle status and date range by the store.
pub fn aggregate_production(rows: &[ProductionRow]) -> ProductionSummary {
    let ap_total: f64 = rows.iter().map(|r| r.premium).sum();
    let policy_count = rows.len();
    let avg_premium = if policy_count > 0 {
        ap_total / policy_count as f64
    } else {
        0.0
    };
    ProductionSummary {
        ap_total,
        policy_count,
        avg_premium,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaceStatus {
    Ahead,
    OnPace,
    Behind,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PaceProjection {
    pub projected: f64,
    pub percentage: f64,
    pub status: PaceStatus,
}

/// Project period-end production from what has landed so far.
///
/// `elapsed_fraction` is day-of-period over days-in-period; at the very start
/// of a period the projection degrades to the raw total instead of dividing
/// by zero. A zero target reports 0% rather than infinity.
pub fn compute_pace(
    target: f64,
    elapsed_fraction: f64,
    actual_to_date: f64,
    pending: f64,
    thresholds: &PaceConfig,
) -> PaceProjection {
    let banked = actual_to_date + pending;
    let projected = if elapsed_fraction > MIN_ELAPSED_FRACTION {
        banked / elapsed_fraction
    } else {
        banked
    };

    let percentage = if target > 0.0 {
        projected / target * 100.0
    } else {
        0.0
    };

    let status = if percentage > thresholds.ahead_threshold_pct {
        PaceStatus::Ahead
    } else if percentage < thresholds.behind_threshold_pct {
        PaceStatus::Behind
    } else {
        PaceStatus::OnPace
    };

    PaceProjection {
        projected,
        percentage,
        status,
    }
}

/// Externally supplied per-agent target inputs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AgentTarget {
    pub expected_policies_per_year: f64,
    pub average_premium: f64,
}

impl AgentTarget {
    pub fn yearly_ap(&self) -> f64 {
        self.expected_policies_per_year * self.average_premium
    }
}

/// Yearly team target: per-agent yearly targets summed.
pub fn team_yearly_target(targets: &[AgentTarget]) -> f64 {
    targets.iter().map(AgentTarget::yearly_ap).sum()
}

/// Monthly team target: one twelfth of each agent's yearly target, summed.
pub fn team_monthly_target(targets: &[AgentTarget]) -> f64 {
    team_yearly_target(targets) / 12.0
}

/// Fraction of the month elapsed as of `date` (day-of-month / days-in-month).
pub fn month_elapsed_fraction(date: NaiveDate) -> f64 {
    f64::from(date.day()) / f64::from(days_in_month(date))
}

/// Fraction of the year elapsed as of `date` (day-of-year / days-in-year).
pub fn year_elapsed_fraction(date: NaiveDate) -> f64 {
    f64::from(date.ordinal()) / f64::from(days_in_year(date.year()))
}

fn days_in_month(date: NaiveDate) -> u32 {
    let (next_year, next_month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .unwrap_or(30)
}

fn days_in_year(year: i32) -> u32 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    }
}
