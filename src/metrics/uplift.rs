//! Relative ARPDAU uplift of a treatment variant over the baseline

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AggregateSummary;

/// Result of an uplift computation.
///
/// `Undefined` covers the cases where no meaningful percentage exists: a
/// missing summary on either side, or a baseline ARPDAU of zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "percent", rename_all = "lowercase")]
pub enum Uplift {
    /// Percentage change versus the baseline.
    Computed(f64),
    /// No baseline to compare against.
    Undefined,
}

impl Uplift {
    /// Get the percentage, if defined.
    #[must_use]
    pub const fn percent(self) -> Option<f64> {
        match self {
            Self::Computed(value) => Some(value),
            Self::Undefined => None,
        }
    }

    /// Get the percentage, mapping `Undefined` to 0.
    #[must_use]
    pub const fn percent_or_zero(self) -> f64 {
        match self {
            Self::Computed(value) => value,
            Self::Undefined => 0.0,
        }
    }

    /// Whether the uplift could be computed.
    #[must_use]
    pub const fn is_defined(self) -> bool {
        matches!(self, Self::Computed(_))
    }
}

/// Shown with one decimal. The sign follows the rounded value, so changes
/// below 0.05% print as `0.0%`.
impl fmt::Display for Uplift {
    #[allow(clippy::float_cmp)]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Computed(value) => {
                let rounded = (value * 10.0).round() / 10.0;
                if rounded == 0.0 {
                    f.write_str("0.0%")
                } else if rounded > 0.0 {
                    write!(f, "+{rounded:.1}%")
                } else {
                    write!(f, "{rounded:.1}%")
                }
            }
            Self::Undefined => f.write_str("n/a"),
        }
    }
}

/// Compute the uplift of `treatment` over `baseline` as a tagged result.
///
/// `((treatment.arpdau - baseline.arpdau) / baseline.arpdau) * 100`, or
/// `Uplift::Undefined` when either summary is absent or the baseline ARPDAU
/// is zero.
#[must_use]
#[allow(clippy::float_cmp)]
pub fn uplift(
    treatment: Option<&AggregateSummary>,
    baseline: Option<&AggregateSummary>,
) -> Uplift {
    match (treatment, baseline) {
        (Some(treatment), Some(baseline)) if baseline.arpdau != 0.0 => Uplift::Computed(
            ((treatment.arpdau - baseline.arpdau) / baseline.arpdau) * 100.0,
        ),
        _ => Uplift::Undefined,
    }
}

/// Compute the uplift percentage of `treatment` over `baseline`.
///
/// Returns 0 when either summary is absent or the baseline ARPDAU is zero.
/// This is a display policy: 0 here can mean "no change" or "cannot
/// compute". Use [`uplift`] to tell the two apart.
///
/// # Example
///
/// ```rust
/// use experiment_insights::metrics::{compute_uplift, AggregateSummary};
///
/// let summary = |arpdau| AggregateSummary {
///     arpdau,
///     conversion_rate: 0.05,
///     retention_day7_rate: 0.4,
///     churn_rate: 0.6,
///     engagement_minutes: 45.0,
///     sample_size: 1000,
/// };
///
/// let lift = compute_uplift(Some(&summary(0.46)), Some(&summary(0.40)));
/// assert!((lift - 15.0).abs() < 1e-9);
/// assert_eq!(compute_uplift(Some(&summary(0.46)), None), 0.0);
/// ```
#[must_use]
pub fn compute_uplift(
    treatment: Option<&AggregateSummary>,
    baseline: Option<&AggregateSummary>,
) -> f64 {
    uplift(treatment, baseline).percent_or_zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(arpdau: f64) -> AggregateSummary {
        AggregateSummary {
            arpdau,
            conversion_rate: 0.1,
            retention_day7_rate: 0.4,
            churn_rate: 0.6,
            engagement_minutes: 40.0,
            sample_size: 100,
        }
    }

    #[test]
    fn test_uplift_scenario() {
        let value = compute_uplift(Some(&summary(0.46)), Some(&summary(0.40)));
        assert!((value - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_uplift_identical_is_zero() {
        let s = summary(0.37);
        assert_eq!(uplift(Some(&s), Some(&s)), Uplift::Computed(0.0));
    }

    #[test]
    fn test_uplift_zero_baseline_is_undefined() {
        assert_eq!(uplift(Some(&summary(0.5)), Some(&summary(0.0))), Uplift::Undefined);
        assert!(compute_uplift(Some(&summary(0.5)), Some(&summary(0.0))).abs() < f64::EPSILON);
    }

    #[test]
    fn test_uplift_missing_side_is_undefined() {
        assert_eq!(uplift(None, Some(&summary(0.4))), Uplift::Undefined);
        assert_eq!(uplift(Some(&summary(0.4)), None), Uplift::Undefined);
        assert_eq!(uplift(None, None), Uplift::Undefined);
    }

    #[test]
    fn test_uplift_negative() {
        let value = compute_uplift(Some(&summary(0.30)), Some(&summary(0.40)));
        assert!((value + 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_uplift_display() {
        assert_eq!(Uplift::Computed(15.0).to_string(), "+15.0%");
        assert_eq!(Uplift::Computed(-2.24).to_string(), "-2.2%");
        assert_eq!(Uplift::Undefined.to_string(), "n/a");
    }

    #[test]
    fn test_uplift_display_near_zero() {
        assert_eq!(Uplift::Computed(0.04).to_string(), "0.0%");
        assert_eq!(Uplift::Computed(-0.04).to_string(), "0.0%");
        assert_eq!(Uplift::Computed(0.0).to_string(), "0.0%");
        assert_eq!(Uplift::Computed(0.06).to_string(), "+0.1%");
        assert_eq!(Uplift::Computed(-0.06).to_string(), "-0.1%");
    }

    #[test]
    fn test_uplift_serde_tagged() {
        let json = serde_json::to_string(&Uplift::Computed(1.5)).unwrap();
        assert_eq!(json, r#"{"kind":"computed","percent":1.5}"#);
        let json = serde_json::to_string(&Uplift::Undefined).unwrap();
        assert_eq!(json, r#"{"kind":"undefined"}"#);
    }
}
