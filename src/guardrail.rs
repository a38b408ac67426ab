//! Guardrail checks
//!
//! Guardrail metrics (churn, engagement, day-7 retention) are monitored so
//! that a variant winning on revenue does not quietly harm the player
//! experience. A summary passes when no configured threshold is crossed.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::metrics::AggregateSummary;
use crate::{Error, Result};

/// Guardrail thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Highest acceptable churn rate (ratio).
    pub max_churn_rate: f64,
    /// Lowest acceptable mean playtime in minutes.
    pub min_engagement_minutes: f64,
    /// Lowest acceptable day-7 retention rate (ratio).
    pub min_retention_day7: f64,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            max_churn_rate: 0.10,
            min_engagement_minutes: 30.0,
            min_retention_day7: 0.35,
        }
    }
}

impl GuardrailConfig {
    /// Validate threshold ranges.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if a rate lies outside `[0, 1]` or the
    /// engagement floor is negative or not finite.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("max_churn_rate", self.max_churn_rate),
            ("min_retention_day7", self.min_retention_day7),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::ConfigError(format!(
                    "guardrail {name} must be within [0, 1], got {value}"
                )));
            }
        }

        if !self.min_engagement_minutes.is_finite() || self.min_engagement_minutes < 0.0 {
            return Err(Error::ConfigError(format!(
                "guardrail min_engagement_minutes must be non-negative, got {}",
                self.min_engagement_minutes
            )));
        }

        Ok(())
    }

    /// Check a summary against every threshold.
    #[must_use]
    pub fn evaluate(&self, summary: &AggregateSummary) -> GuardrailReport {
        let mut violations = Vec::new();

        if summary.churn_rate > self.max_churn_rate {
            violations.push(GuardrailViolation {
                metric: GuardrailMetric::ChurnRate,
                observed: summary.churn_rate,
                threshold: self.max_churn_rate,
            });
        }
        if summary.engagement_minutes < self.min_engagement_minutes {
            violations.push(GuardrailViolation {
                metric: GuardrailMetric::EngagementMinutes,
                observed: summary.engagement_minutes,
                threshold: self.min_engagement_minutes,
            });
        }
        if summary.retention_day7_rate < self.min_retention_day7 {
            violations.push(GuardrailViolation {
                metric: GuardrailMetric::RetentionDay7,
                observed: summary.retention_day7_rate,
                threshold: self.min_retention_day7,
            });
        }

        GuardrailReport { violations }
    }
}

/// Metric a guardrail watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailMetric {
    /// Churn above the ceiling.
    ChurnRate,
    /// Engagement below the floor.
    EngagementMinutes,
    /// Day-7 retention below the floor.
    RetentionDay7,
}

impl fmt::Display for GuardrailMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChurnRate => "churn rate",
            Self::EngagementMinutes => "engagement minutes",
            Self::RetentionDay7 => "day-7 retention",
        })
    }
}

/// One crossed threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    /// Which guardrail.
    pub metric: GuardrailMetric,
    /// Value in the summary.
    pub observed: f64,
    /// Configured limit.
    pub threshold: f64,
}

/// Outcome of checking one summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GuardrailReport {
    /// Crossed thresholds, in check order.
    pub violations: Vec<GuardrailViolation>,
}

impl GuardrailReport {
    /// Whether every guardrail held.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}
