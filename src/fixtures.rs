//! Deterministic demo data
//!
//! Populates a [`MemoryRepository`] with five monetization experiments,
//! per-player cohorts and fourteen days of KPI records. Later variants are
//! seeded with better conversion, retention and revenue so the reports show
//! a visible uplift. Generation is driven by a seeded `StdRng`: the same
//! seed and `as_of` date always produce identical data.

use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::experiment::{
    CohortRecord, ExperimentRecord, ExperimentStatus, KpiRecord, MemoryRepository, Variant,
};
use crate::{Error, Result};

/// Window over which players are assigned, counted back from `as_of`.
const ASSIGNMENT_WINDOW_DAYS: i64 = 14;

/// Players represented by each day's KPI figures, split across variants.
const KPI_DAILY_SAMPLE: u32 = 5000;

/// Longest KPI window, in days, that fixture generation accepts.
pub const MAX_KPI_DAYS: u32 = 3660;

/// Fixture generation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureOptions {
    /// RNG seed.
    pub seed: u64,
    /// Reference day; KPI records cover the `kpi_days` days before it.
    /// `None` means today (UTC).
    pub as_of: Option<NaiveDate>,
    /// Number of daily KPI records per variant.
    pub kpi_days: u32,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            as_of: None,
            kpi_days: 14,
        }
    }
}

impl FixtureOptions {
    /// Set the seed.
    #[must_use]
    pub const fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Pin the reference day.
    #[must_use]
    pub const fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }

    /// Reference day, defaulting to today.
    #[must_use]
    pub fn resolved_as_of(&self) -> NaiveDate {
        self.as_of.unwrap_or_else(|| Utc::now().date_naive())
    }
}

struct ExperimentSeed {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    status: ExperimentStatus,
    start: (i32, u32, u32),
    end: Option<(i32, u32, u32)>,
    sample_size: u32,
    created: (i32, u32, u32),
    updated: (i32, u32, u32),
}

const EXPERIMENTS: [ExperimentSeed; 5] = [
    ExperimentSeed {
        id: "exp-001",
        name: "Premium Bundle Pricing Test",
        description: "Testing $9.99 vs $14.99 vs $19.99 pricing for premium bundle",
        status: ExperimentStatus::Running,
        start: (2025, 1, 1),
        end: None,
        sample_size: 15_000,
        created: (2024, 12, 28),
        updated: (2025, 1, 1),
    },
    ExperimentSeed {
        id: "exp-002",
        name: "Starter Pack Bundle Size",
        description: "Testing different bundle sizes: 100 coins vs 250 coins vs 500 coins",
        status: ExperimentStatus::Running,
        start: (2025, 1, 5),
        end: None,
        sample_size: 12_000,
        created: (2025, 1, 2),
        updated: (2025, 1, 5),
    },
    ExperimentSeed {
        id: "exp-003",
        name: "Daily Deal Frequency",
        description: "Testing daily deals shown once vs twice vs three times per day",
        status: ExperimentStatus::Completed,
        start: (2024, 12, 15),
        end: Some((2025, 1, 10)),
        sample_size: 20_000,
        created: (2024, 12, 10),
        updated: (2025, 1, 10),
    },
    ExperimentSeed {
        id: "exp-004",
        name: "VIP Subscription Tiers",
        description: "Testing 2-tier vs 3-tier vs 4-tier VIP subscription model",
        status: ExperimentStatus::Paused,
        start: (2024, 12, 20),
        end: None,
        sample_size: 8_000,
        created: (2024, 12, 15),
        updated: (2025, 1, 8),
    },
    ExperimentSeed {
        id: "exp-005",
        name: "First Purchase Discount",
        description: "Testing 20% vs 30% vs 50% discount on first purchase",
        status: ExperimentStatus::Draft,
        start: (2025, 1, 20),
        end: None,
        sample_size: 10_000,
        created: (2025, 1, 12),
        updated: (2025, 1, 12),
    },
];

fn ymd((y, m, d): (i32, u32, u32)) -> Result<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
        .ok_or_else(|| Error::InvalidInput(format!("invalid fixture date {y}-{m}-{d}")))
}

/// The five demo experiments, each with variants A/B/C.
///
/// # Errors
///
/// Only fails if a built-in record is invalid.
pub fn experiments() -> Result<Vec<ExperimentRecord>> {
    EXPERIMENTS
        .iter()
        .map(|seed| {
            let mut builder = ExperimentRecord::builder(seed.id, seed.name, ymd(seed.start)?)
                .description(seed.description)
                .status(seed.status)
                .variants([Variant::A, Variant::B, Variant::C])
                .sample_size(seed.sample_size)
                .created_at(ymd(seed.created)?)
                .updated_at(ymd(seed.updated)?);
            if let Some(end) = seed.end {
                builder = builder.end_date(ymd(end)?);
            }
            builder.build()
        })
        .collect()
}

/// Generate cohort records for one experiment.
///
/// Each variant receives `sample_size / variant_count` players. Variant
/// index `i` converts with probability `0.05 + 0.02 i` and retains to day 7
/// with probability `0.40 + 0.05 i`; only converters spend.
///
/// # Errors
///
/// Only fails if a generated record is invalid.
#[allow(clippy::cast_precision_loss)]
pub fn cohorts_for(
    experiment: &ExperimentRecord,
    as_of: NaiveDate,
    rng: &mut StdRng,
) -> Result<Vec<CohortRecord>> {
    let variants = experiment.variants();
    let per_variant = experiment.sample_size() as usize / variants.len();
    let window_end: DateTime<Utc> = as_of.and_time(chrono::NaiveTime::MIN).and_utc();
    let window_secs = ASSIGNMENT_WINDOW_DAYS * 24 * 60 * 60;

    let mut cohorts = Vec::with_capacity(per_variant * variants.len());
    for (index, &variant) in variants.iter().enumerate() {
        let base_conversion = 0.02_f64.mul_add(index as f64, 0.05);
        let base_retention = 0.05_f64.mul_add(index as f64, 0.40);

        for i in 0..per_variant {
            let id = experiment.experiment_id();
            let assigned_at = window_end - Duration::seconds(rng.gen_range(0..window_secs));
            let converted = rng.gen::<f64>() < base_conversion;
            let spend = if converted { rng.gen_range(5.0..55.0) } else { 0.0 };

            let player_id = format!("player-{id}-{variant}-{i}");
            let record = CohortRecord::builder(id, variant, player_id, assigned_at)
                .cohort_id(format!("cohort-{id}-{variant}-{i}"))
                .retention(
                    rng.gen::<f64>() > 0.3,
                    rng.gen::<f64>() < base_retention,
                    rng.gen::<f64>() > 0.7,
                )
                .converted(converted)
                .total_spend(spend)
                .session_count(rng.gen_range(1..=20))
                .playtime_minutes(rng.gen_range(30..330))
                .build()?;
            cohorts.push(record);
        }
    }

    Ok(cohorts)
}

/// Generate daily KPI records for one experiment.
///
/// Covers the `days` days before `as_of`. Variant index `i` scales revenue,
/// engagement, conversion and retention by `1 + 0.15 i` and divides churn
/// by it, with ±10% daily noise.
///
/// # Errors
///
/// Returns `Error::InvalidInput` if `days` exceeds [`MAX_KPI_DAYS`] or the
/// date range underflows the calendar.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn kpis_for(
    experiment: &ExperimentRecord,
    as_of: NaiveDate,
    days: u32,
    rng: &mut StdRng,
) -> Result<Vec<KpiRecord>> {
    if days > MAX_KPI_DAYS {
        return Err(Error::InvalidInput(format!(
            "KPI window of {days} days exceeds the maximum of {MAX_KPI_DAYS}"
        )));
    }

    let variants = experiment.variants();
    let daily_sample = KPI_DAILY_SAMPLE / variants.len() as u32;

    let mut records = Vec::with_capacity(days as usize * variants.len());
    for day in 0..days {
        let date = as_of
            .checked_sub_days(Days::new(u64::from(days - day)))
            .ok_or_else(|| Error::InvalidInput(format!("KPI window before {as_of} underflows")))?;

        for (index, &variant) in variants.iter().enumerate() {
            let multiplier = 0.15_f64.mul_add(index as f64, 1.0);
            let noise = rng.gen::<f64>().mul_add(0.2, 0.9);

            records.push(
                KpiRecord::builder(experiment.experiment_id(), variant, date)
                    .reported_arpdau(0.45 * multiplier * noise)
                    .churn_rate(0.08 / multiplier * noise)
                    .engagement_minutes(45.0 * multiplier * noise)
                    .conversion_rate(0.05 * multiplier * noise)
                    .retention_day7(0.42 * multiplier * noise)
                    .sample_size(daily_sample)
                    .build(),
            );
        }
    }

    Ok(records)
}

/// Build a repository filled with demo data.
///
/// KPI records exist only for running and completed experiments; drafts
/// and paused experiments have cohorts but no daily figures.
///
/// # Errors
///
/// Returns an error if generated data fails repository validation.
pub fn generate(options: &FixtureOptions) -> Result<MemoryRepository> {
    let as_of = options.resolved_as_of();
    let mut rng = StdRng::seed_from_u64(options.seed);
    let mut repo = MemoryRepository::new();

    let experiments = experiments()?;
    for experiment in &experiments {
        repo.add_experiment(experiment.clone())?;
    }

    for experiment in &experiments {
        let cohorts = cohorts_for(experiment, as_of, &mut rng)?;
        repo.add_cohorts(cohorts)?;
    }

    for experiment in experiments.iter().filter(|e| e.status().reports_kpis()) {
        let kpis = kpis_for(experiment, as_of, options.kpi_days, &mut rng)?;
        repo.add_kpi_records(kpis)?;
    }

    info!(
        seed = options.seed,
        %as_of,
        experiments = repo.experiment_count(),
        cohorts = repo.cohort_count(),
        kpis = repo.kpi_count(),
        "generated fixture data"
    );

    Ok(repo)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::ExperimentRepository;

    fn options() -> FixtureOptions {
        FixtureOptions::default()
            .with_seed(7)
            .with_as_of(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
    }

    #[test]
    fn test_fixture_experiments() {
        let experiments = experiments().unwrap();
        assert_eq!(experiments.len(), 5);
        assert_eq!(experiments[2].status(), ExperimentStatus::Completed);
        assert!(experiments[2].end_date().is_some());
        assert!(experiments.iter().all(|e| e.baseline() == Variant::A));
    }

    #[test]
    fn test_fixture_cohort_counts() {
        let repo = generate(&options()).unwrap();
        // 15000/3 * 3 = 15000 players for exp-001
        assert_eq!(repo.cohorts_for("exp-001").len(), 15_000);
        // 10000/3 = 3333 per variant for exp-005
        assert_eq!(repo.cohorts_for("exp-005").len(), 9_999);
    }

    #[test]
    fn test_fixture_kpis_only_for_reporting_experiments() {
        let repo = generate(&options()).unwrap();
        assert_eq!(repo.kpis_for("exp-001").len(), 14 * 3);
        assert_eq!(repo.kpis_for("exp-003").len(), 14 * 3);
        assert!(repo.kpis_for("exp-004").is_empty());
        assert!(repo.kpis_for("exp-005").is_empty());

        let first = repo.kpis_for("exp-001")[0];
        assert_eq!(first.date(), NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(first.sample_size(), 1666);
    }

    #[test]
    fn test_fixture_is_deterministic() {
        let a = generate(&options()).unwrap();
        let b = generate(&options()).unwrap();
        assert_eq!(a.cohorts()[..100], b.cohorts()[..100]);
        assert_eq!(a.kpi_records(), b.kpi_records());

        let c = generate(&options().with_seed(8)).unwrap();
        assert_ne!(a.kpi_records(), c.kpi_records());
    }

    #[test]
    fn test_fixture_spend_only_for_converters() {
        let repo = generate(&options()).unwrap();
        assert!(repo
            .cohorts()
            .iter()
            .all(|c| c.converted() || c.total_spend() == 0.0));
    }

    #[test]
    fn test_kpis_for_rejects_oversized_window() {
        let experiment = &experiments().unwrap()[0];
        let as_of = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let mut rng = StdRng::seed_from_u64(1);

        let result = kpis_for(experiment, as_of, 4_000_000_000, &mut rng);
        assert!(matches!(result, Err(Error::InvalidInput(_))));

        let mut opts = options();
        opts.kpi_days = MAX_KPI_DAYS + 1;
        assert!(generate(&opts).is_err());
    }
}
