//! Policy thresholds.
//!
//! Every cut-off the views apply lives here under a name, with the dashboard's
//! stock values as defaults. A JSON file may override any subset of them.

use std::path::{Path, PathBuf};

use chrono::Month;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::DashboardError;

pub const CONFIG_ENV: &str = "AUDIT_INSIGHTS_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub narrative: NarrativeThresholds,
    pub stages: StagePolicy,
    pub recruiters: RecruiterPolicy,
    pub trends: TrendPolicy,
    pub insights: InsightThresholds,
}

impl DashboardConfig {
    /// Reads the file given explicitly, else the one named by
    /// `AUDIT_INSIGHTS_CONFIG`, else falls back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, DashboardError> {
        let path: Option<PathBuf> = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let Some(path) = path else {
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(&path)?;
        let config: Self = serde_json::from_str(&raw)?;
        info!(path = %path.display(), "loaded dashboard config");
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrativeThresholds {
    /// Accuracy under this is flagged "below target".
    pub below_target: f64,
    /// Accuracy at or above this is flagged "excellent".
    pub excellent: f64,
    pub top_error_parameters: usize,
}

impl Default for NarrativeThresholds {
    fn default() -> Self {
        Self {
            below_target: 90.0,
            excellent: 95.0,
            top_error_parameters: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StagePolicy {
    pub breakdown_size: usize,
}

impl Default for StagePolicy {
    fn default() -> Self {
        Self { breakdown_size: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecruiterPolicy {
    /// Samples needed before a recruiter can be named recruiter of the period.
    pub min_samples: f64,
    /// Accuracy gap (percentage points) treated as a tie.
    pub near_tie_margin: f64,
    /// Standard deviation of recruiter accuracy flagged as high variance.
    pub variance_threshold: f64,
    pub leaderboard_size: usize,
}

impl Default for RecruiterPolicy {
    fn default() -> Self {
        Self {
            min_samples: 10.0,
            near_tie_margin: 0.1,
            variance_threshold: 10.0,
            leaderboard_size: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendPolicy {
    /// Calendar month (1-12) that opens the financial year.
    pub fiscal_year_start: u8,
    pub forecast_horizon: usize,
    /// Additive offsets applied to the last observed value, one per period.
    pub forecast_steps: Vec<f64>,
}

impl TrendPolicy {
    pub fn fiscal_start(&self) -> Month {
        Month::try_from(self.fiscal_year_start).unwrap_or(Month::April)
    }
}

impl Default for TrendPolicy {
    fn default() -> Self {
        Self {
            fiscal_year_start: 4,
            forecast_horizon: 3,
            forecast_steps: vec![0.5, 0.8, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InsightThresholds {
    /// Accuracy under this is reported as critical rather than below target.
    pub critical_accuracy: f64,
    /// Parameter error rate (%) above which a parameter is called out.
    pub parameter_error_rate: f64,
    /// Share (%) of all failures above which a recruiter is called out.
    pub recruiter_error_share: f64,
    /// Sample coverage (%) the audit programme aims for.
    pub sample_coverage_target: f64,
    pub max_items_per_rule: usize,
}

impl Default for InsightThresholds {
    fn default() -> Self {
        Self {
            critical_accuracy: 85.0,
            parameter_error_rate: 10.0,
            recruiter_error_share: 20.0,
            sample_coverage_target: 10.0,
            max_items_per_rule: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config: DashboardConfig =
            serde_json::from_str(r#"{"narrative": {"below_target": 88.0}}"#).unwrap();
        assert_eq!(config.narrative.below_target, 88.0);
        assert_eq!(config.narrative.excellent, 95.0);
        assert_eq!(config.recruiters.min_samples, 10.0);
    }

    #[test]
    fn invalid_fiscal_month_falls_back_to_april() {
        let policy = TrendPolicy {
            fiscal_year_start: 13,
            ..TrendPolicy::default()
        };
        assert_eq!(policy.fiscal_start(), Month::April);
        let policy = TrendPolicy {
            fiscal_year_start: 1,
            ..TrendPolicy::default()
        };
        assert_eq!(policy.fiscal_start(), Month::January);
    }

    #[test]
    fn explicit_path_is_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"recruiters": {"min_samples": 25}}"#).unwrap();
        let config = DashboardConfig::load(Some(&path)).unwrap();
        assert_eq!(config.recruiters.min_samples, 25.0);
    }
}
