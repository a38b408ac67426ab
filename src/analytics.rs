//! KPI analytics
//!
//! Aggregate views over daily KPI records: scope selection, overview
//! averages, per-metric time series and a date × variant pivot for charts.
//! These views use the reported daily figures as-is; variant comparisons and
//! uplift live in [`crate::metrics`].

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::experiment::{ExperimentRepository, ExperimentStatus, KpiRecord, Variant};

/// Which KPI records an analytics view covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KpiScope {
    /// Every KPI record.
    All,
    /// Records of running experiments only.
    Running,
    /// Records of a single experiment.
    Experiment(String),
}

/// Select KPI records for a scope, ordered by date then variant.
#[must_use]
pub fn select_kpis<'r, R>(repo: &'r R, scope: &KpiScope) -> Vec<&'r KpiRecord>
where
    R: ExperimentRepository + ?Sized,
{
    let mut records: Vec<&KpiRecord> = match scope {
        KpiScope::All => repo.kpi_records().iter().collect(),
        KpiScope::Running => {
            let running: Vec<&str> = repo
                .experiments_with_status(ExperimentStatus::Running)
                .into_iter()
                .map(|e| e.experiment_id())
                .collect();
            repo.kpi_records()
                .iter()
                .filter(|k| running.contains(&k.experiment_id()))
                .collect()
        }
        KpiScope::Experiment(id) => return repo.kpis_for(id),
    };

    records.sort_by_key(|k| (k.date(), k.variant()));
    debug!(?scope, count = records.len(), "selected KPI records");
    records
}

/// Averages over a set of KPI records.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KpiOverview {
    /// Mean reported ARPDAU.
    pub avg_reported_arpdau: f64,
    /// Mean churn rate.
    pub avg_churn_rate: f64,
    /// Mean conversion rate.
    pub avg_conversion_rate: f64,
    /// Mean engagement minutes.
    pub avg_engagement_minutes: f64,
    /// Mean day-7 retention rate.
    pub avg_retention_day7: f64,
    /// Sum of daily sample sizes.
    pub total_sample_size: u64,
    /// Number of records averaged.
    pub record_count: usize,
}

/// Compute the KPI overview, or `None` when there are no records.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn kpi_overview<'a, I>(records: I) -> Option<KpiOverview>
where
    I: IntoIterator<Item = &'a KpiRecord>,
{
    let mut sums = [0.0_f64; 5];
    let mut total_sample_size = 0_u64;
    let mut count = 0_usize;

    for record in records {
        sums[0] += record.reported_arpdau();
        sums[1] += record.churn_rate();
        sums[2] += record.conversion_rate();
        sums[3] += record.engagement_minutes();
        sums[4] += record.retention_day7();
        total_sample_size += u64::from(record.sample_size());
        count += 1;
    }

    if count == 0 {
        return None;
    }

    let n = count as f64;
    Some(KpiOverview {
        avg_reported_arpdau: sums[0] / n,
        avg_churn_rate: sums[1] / n,
        avg_conversion_rate: sums[2] / n,
        avg_engagement_minutes: sums[3] / n,
        avg_retention_day7: sums[4] / n,
        total_sample_size,
        record_count: count,
    })
}

/// A single data point in a time series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesPoint {
    /// Calendar day
    pub date: NaiveDate,
    /// Metric value for the day
    pub value: f64,
    /// Variant the value belongs to
    pub variant: Variant,
}

/// Daily series of the four charted KPIs for one experiment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentTimeSeries {
    /// Reported daily ARPDAU.
    pub reported_arpdau: Vec<TimeSeriesPoint>,
    /// Churn rate.
    pub churn: Vec<TimeSeriesPoint>,
    /// Engagement minutes.
    pub engagement: Vec<TimeSeriesPoint>,
    /// Conversion rate.
    pub conversion: Vec<TimeSeriesPoint>,
}

impl ExperimentTimeSeries {
    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reported_arpdau.is_empty()
    }

    /// Get number of points per series
    #[must_use]
    pub fn len(&self) -> usize {
        self.reported_arpdau.len()
    }
}

/// Split KPI records into per-metric series, keeping record order.
#[must_use]
pub fn experiment_time_series<'a, I>(records: I) -> ExperimentTimeSeries
where
    I: IntoIterator<Item = &'a KpiRecord>,
{
    let mut series = ExperimentTimeSeries::default();

    for record in records {
        let point = |value| TimeSeriesPoint {
            date: record.date(),
            value,
            variant: record.variant(),
        };
        series.reported_arpdau.push(point(record.reported_arpdau()));
        series.churn.push(point(record.churn_rate()));
        series.engagement.push(point(record.engagement_minutes()));
        series.conversion.push(point(record.conversion_rate()));
    }

    series
}

/// Chart values for one variant on one day.
///
/// Churn and conversion are percentages; reported ARPDAU and engagement
/// are raw.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyVariantValues {
    /// Reported ARPDAU.
    pub reported_arpdau: f64,
    /// Churn rate × 100.
    pub churn_percent: f64,
    /// Conversion rate × 100.
    pub conversion_percent: f64,
    /// Engagement minutes.
    pub engagement_minutes: f64,
}

/// One chart row: a date and the values of every variant reporting that day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyVariantRow {
    /// Calendar day
    pub date: NaiveDate,
    /// Values keyed by variant
    pub values: BTreeMap<Variant, DailyVariantValues>,
}

#[derive(Default)]
struct PivotCell {
    reported_arpdau: f64,
    churn: f64,
    conversion: f64,
    engagement: f64,
    count: u32,
}

/// Pivot KPI records into one row per date (ascending).
///
/// Records sharing a date and variant (several experiments in scope) are
/// averaged.
#[must_use]
pub fn pivot_by_date<'a, I>(records: I) -> Vec<DailyVariantRow>
where
    I: IntoIterator<Item = &'a KpiRecord>,
{
    let mut cells: BTreeMap<NaiveDate, BTreeMap<Variant, PivotCell>> = BTreeMap::new();

    for record in records {
        let cell = cells
            .entry(record.date())
            .or_default()
            .entry(record.variant())
            .or_default();
        cell.reported_arpdau += record.reported_arpdau();
        cell.churn += record.churn_rate();
        cell.conversion += record.conversion_rate();
        cell.engagement += record.engagement_minutes();
        cell.count += 1;
    }

    cells
        .into_iter()
        .map(|(date, by_variant)| DailyVariantRow {
            date,
            values: by_variant
                .into_iter()
                .map(|(variant, cell)| {
                    let n = f64::from(cell.count);
                    let values = DailyVariantValues {
                        reported_arpdau: cell.reported_arpdau / n,
                        churn_percent: cell.churn / n * 100.0,
                        conversion_percent: cell.conversion / n * 100.0,
                        engagement_minutes: cell.engagement / n,
                    };
                    (variant, values)
                })
                .collect(),
        })
        .collect()
}

/// Distinct variants in first-seen order.
#[must_use]
pub fn variants_present<'a, I>(records: I) -> Vec<Variant>
where
    I: IntoIterator<Item = &'a KpiRecord>,
{
    let mut variants = Vec::new();
    for record in records {
        if !variants.contains(&record.variant()) {
            variants.push(record.variant());
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::{ExperimentRecord, MemoryRepository};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn kpi(
        experiment_id: &str,
        variant: Variant,
        day: u32,
        reported_arpdau: f64,
    ) -> KpiRecord {
        KpiRecord::builder(experiment_id, variant, date(day))
            .reported_arpdau(reported_arpdau)
            .churn_rate(0.08)
            .conversion_rate(0.05)
            .engagement_minutes(40.0)
            .retention_day7(0.4)
            .sample_size(100)
            .build()
    }

    fn repo() -> MemoryRepository {
        let mut repo = MemoryRepository::new();
        for (id, status) in [
            ("exp-1", ExperimentStatus::Running),
            ("exp-2", ExperimentStatus::Completed),
        ] {
            repo.add_experiment(
                ExperimentRecord::builder(id, id, date(1))
                    .status(status)
                    .build()
                    .unwrap(),
            )
            .unwrap();
        }
        repo.add_kpi_records([
            kpi("exp-1", Variant::B, 2, 0.6),
            kpi("exp-1", Variant::A, 2, 0.4),
            kpi("exp-2", Variant::A, 1, 0.2),
        ])
        .unwrap();
        repo
    }

    #[test]
    fn test_select_kpis_scopes() {
        let repo = repo();
        assert_eq!(select_kpis(&repo, &KpiScope::All).len(), 3);
        assert_eq!(select_kpis(&repo, &KpiScope::Running).len(), 2);
        assert_eq!(
            select_kpis(&repo, &KpiScope::Experiment("exp-2".to_string())).len(),
            1
        );
        assert!(select_kpis(&repo, &KpiScope::Experiment("nope".to_string())).is_empty());
    }

    #[test]
    fn test_select_kpis_all_is_date_ordered() {
        let repo = repo();
        let dates: Vec<_> = select_kpis(&repo, &KpiScope::All)
            .iter()
            .map(|k| k.date())
            .collect();
        assert_eq!(dates, vec![date(1), date(2), date(2)]);
    }

    #[test]
    fn test_kpi_overview() {
        let repo = repo();
        let overview = kpi_overview(repo.kpi_records()).unwrap();
        assert_eq!(overview.record_count, 3);
        assert_eq!(overview.total_sample_size, 300);
        assert!((overview.avg_reported_arpdau - 0.4).abs() < 1e-12);
        assert!((overview.avg_churn_rate - 0.08).abs() < 1e-12);
    }

    #[test]
    fn test_kpi_overview_empty_is_none() {
        let empty: Vec<KpiRecord> = Vec::new();
        assert!(kpi_overview(&empty).is_none());
    }

    #[test]
    fn test_experiment_time_series() {
        let repo = repo();
        let series = experiment_time_series(repo.kpis_for("exp-1"));
        assert_eq!(series.len(), 2);
        assert_eq!(series.reported_arpdau[0].variant, Variant::A);
        assert!((series.reported_arpdau[1].value - 0.6).abs() < f64::EPSILON);
        assert!((series.churn[0].value - 0.08).abs() < f64::EPSILON);
    }

    #[test]
    fn test_pivot_by_date() {
        let repo = repo();
        let rows = pivot_by_date(repo.kpi_records());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, date(1));
        assert_eq!(rows[1].values.len(), 2);

        let b = rows[1].values[&Variant::B];
        assert!((b.reported_arpdau - 0.6).abs() < f64::EPSILON);
        assert!((b.churn_percent - 8.0).abs() < 1e-9);
        assert!((b.conversion_percent - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_pivot_averages_collisions() {
        let records = vec![kpi("exp-1", Variant::A, 1, 0.2), kpi("exp-2", Variant::A, 1, 0.4)];
        let rows = pivot_by_date(&records);
        assert_eq!(rows.len(), 1);
        assert!((rows[0].values[&Variant::A].reported_arpdau - 0.3).abs() < 1e-12);
    }

    #[test]
    fn test_variants_present_first_seen_order() {
        let records = vec![
            kpi("exp-1", Variant::C, 1, 0.1),
            kpi("exp-1", Variant::A, 1, 0.1),
            kpi("exp-1", Variant::C, 2, 0.1),
        ];
        assert_eq!(variants_present(&records), vec![Variant::C, Variant::A]);
    }
}
