//! Aggregate summary of one (experiment, variant) pair

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::experiment::{CohortRecord, KpiRecord, Variant};

/// Summary metrics for one experiment variant.
///
/// Derived on demand from cohort and KPI records and never persisted.
/// `arpdau` here is total cohort spend per assigned player; the daily
/// `KpiRecord::arpdau` figure is a reported trend value and is never mixed
/// into summaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateSummary {
    /// Total spend divided by assigned players.
    pub arpdau: f64,
    /// Share of players that converted.
    pub conversion_rate: f64,
    /// Share of players retained on day 7.
    pub retention_day7_rate: f64,
    /// `1 - retention_day7_rate`.
    pub churn_rate: f64,
    /// Mean playtime in minutes.
    pub engagement_minutes: f64,
    /// Number of matching cohort records.
    pub sample_size: usize,
}

/// Running totals over a set of cohort records.
///
/// Shared by the aggregate calculator and the cohort table statistics so
/// both count players the same way.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CohortTotals {
    /// Number of records folded in.
    pub players: usize,
    /// Sum of `total_spend`.
    pub spend: f64,
    /// Records with the conversion flag set.
    pub converters: usize,
    /// Records retained on day 7.
    pub retained_day7: usize,
    /// Sum of playtime minutes.
    pub playtime_minutes: u64,
}

impl CohortTotals {
    /// Fold one record into the totals.
    pub fn add(&mut self, cohort: &CohortRecord) {
        self.players += 1;
        self.spend += cohort.total_spend();
        self.converters += usize::from(cohort.converted());
        self.retained_day7 += usize::from(cohort.retention_day7());
        self.playtime_minutes += u64::from(cohort.playtime_minutes());
    }

    /// Whether no records have been folded in.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.players == 0
    }

    /// Spend per player, `None` when empty.
    #[must_use]
    pub fn average_spend(&self) -> Option<f64> {
        self.per_player(self.spend)
    }

    /// Mean playtime, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn average_playtime(&self) -> Option<f64> {
        self.per_player(self.playtime_minutes as f64)
    }

    /// Conversion share, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn conversion_rate(&self) -> Option<f64> {
        self.per_player(self.converters as f64)
    }

    /// Day-7 retention share, `None` when empty.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn retention_day7_rate(&self) -> Option<f64> {
        self.per_player(self.retained_day7 as f64)
    }

    #[allow(clippy::cast_precision_loss)]
    fn per_player(&self, value: f64) -> Option<f64> {
        (self.players > 0).then(|| value / self.players as f64)
    }
}

impl<'a> FromIterator<&'a CohortRecord> for CohortTotals {
    fn from_iter<I: IntoIterator<Item = &'a CohortRecord>>(iter: I) -> Self {
        let mut totals = Self::default();
        for cohort in iter {
            totals.add(cohort);
        }
        totals
    }
}

/// Compute the aggregate summary for one experiment variant.
///
/// `cohorts` and `kpi_records` may be the full collections or any
/// pre-filtered subset; only records matching both `experiment_id` and
/// `variant` are used.
///
/// Returns `None` ("insufficient data") when either the matching cohort set
/// or the matching KPI set is empty, so no rate is ever divided by zero.
///
/// # Example
///
/// ```rust
/// use chrono::{NaiveDate, TimeZone, Utc};
/// use experiment_insights::experiment::{CohortRecord, KpiRecord, Variant};
/// use experiment_insights::metrics::compute_aggregate;
///
/// let at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
/// let cohorts = vec![
///     CohortRecord::builder("exp-1", Variant::A, "p1", at)
///         .retention(true, true, false)
///         .converted(true)
///         .total_spend(10.0)
///         .playtime_minutes(60)
///         .build()?,
///     CohortRecord::builder("exp-1", Variant::A, "p2", at)
///         .playtime_minutes(30)
///         .build()?,
/// ];
/// let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
/// let kpis = vec![KpiRecord::builder("exp-1", Variant::A, day).build()];
///
/// let summary = compute_aggregate("exp-1", Variant::A, &cohorts, &kpis).unwrap();
/// assert_eq!(summary.sample_size, 2);
/// assert_eq!(summary.arpdau, 5.0);
/// assert_eq!(summary.engagement_minutes, 45.0);
/// # Ok::<(), experiment_insights::Error>(())
/// ```
#[must_use]
pub fn compute_aggregate<'c, 'k, C, K>(
    experiment_id: &str,
    variant: Variant,
    cohorts: C,
    kpi_records: K,
) -> Option<AggregateSummary>
where
    C: IntoIterator<Item = &'c CohortRecord>,
    K: IntoIterator<Item = &'k KpiRecord>,
{
    let has_kpis = kpi_records
        .into_iter()
        .any(|k| k.belongs_to(experiment_id, variant));
    if !has_kpis {
        trace!(experiment_id, %variant, "no KPI records for variant");
        return None;
    }

    let totals: CohortTotals = cohorts
        .into_iter()
        .filter(|c| c.belongs_to(experiment_id, variant))
        .collect();
    if totals.is_empty() {
        trace!(experiment_id, %variant, "no cohort records for variant");
        return None;
    }

    let retention_day7_rate = totals.retention_day7_rate()?;
    let summary = AggregateSummary {
        arpdau: totals.average_spend()?,
        conversion_rate: totals.conversion_rate()?,
        retention_day7_rate,
        churn_rate: 1.0 - retention_day7_rate,
        engagement_minutes: totals.average_playtime()?,
        sample_size: totals.players,
    };

    debug!(
        experiment_id,
        %variant,
        sample_size = summary.sample_size,
        arpdau = summary.arpdau,
        "computed aggregate summary"
    );

    Some(summary)
}
