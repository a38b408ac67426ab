//! Experiment repository - storage interface for experiment, cohort and KPI records
//!
//! Report, analytics and cohort code take an `&impl ExperimentRepository`
//! instead of reading process-wide fixture state, so the same computations
//! run against fixtures, Parquet snapshots or any other backing store.

use std::collections::HashMap;

use tracing::debug;

use super::{CohortRecord, ExperimentRecord, ExperimentStatus, KpiRecord};
use crate::{Error, Result};

/// Read access to experiment data.
///
/// Only the four slice/lookup methods are required; the filtered views have
/// default implementations built on them.
pub trait ExperimentRepository {
    /// All experiments in insertion order.
    fn experiments(&self) -> &[ExperimentRecord];

    /// Get an experiment by ID.
    fn experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord>;

    /// All cohort records.
    fn cohorts(&self) -> &[CohortRecord];

    /// All KPI records.
    fn kpi_records(&self) -> &[KpiRecord];

    /// Cohort records of one experiment, in storage order.
    fn cohorts_for(&self, experiment_id: &str) -> Vec<&CohortRecord> {
        self.cohorts()
            .iter()
            .filter(|c| c.experiment_id() == experiment_id)
            .collect()
    }

    /// KPI records of one experiment, ordered by date then variant.
    fn kpis_for(&self, experiment_id: &str) -> Vec<&KpiRecord> {
        let mut records: Vec<&KpiRecord> = self
            .kpi_records()
            .iter()
            .filter(|k| k.experiment_id() == experiment_id)
            .collect();

        // Sort by (date, variant) for time-series ordering
        records.sort_by_key(|k| (k.date(), k.variant()));

        records
    }

    /// Experiments in the given lifecycle status.
    fn experiments_with_status(&self, status: ExperimentStatus) -> Vec<&ExperimentRecord> {
        self.experiments()
            .iter()
            .filter(|e| e.status() == status)
            .collect()
    }
}

/// In-memory repository.
///
/// ## Design
///
/// Experiments live in a vector (listing order) with a hash index for O(1)
/// lookup by ID. Cohort and KPI records are append-only vectors that are
/// filtered at query time.
///
/// ## Referential integrity
///
/// Cohort and KPI records are only accepted for known experiments and for
/// variants the experiment actually declares.
#[derive(Debug, Default, Clone)]
pub struct MemoryRepository {
    experiments: Vec<ExperimentRecord>,
    index: HashMap<String, usize>,
    cohorts: Vec<CohortRecord>,
    kpis: Vec<KpiRecord>,
}

impl MemoryRepository {
    /// Create a new empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the repository is empty (no experiments, cohorts, or KPI records).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty() && self.cohorts.is_empty() && self.kpis.is_empty()
    }

    /// Get the number of experiments.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of cohort records.
    #[must_use]
    pub fn cohort_count(&self) -> usize {
        self.cohorts.len()
    }

    /// Get the number of KPI records.
    #[must_use]
    pub fn kpi_count(&self) -> usize {
        self.kpis.len()
    }

    /// Add an experiment. An experiment with the same ID is replaced in place.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if a replacement drops a variant that
    /// stored cohort or KPI records still reference. The repository is left
    /// unchanged.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) -> Result<()> {
        let id = experiment.experiment_id();

        let Some(&slot) = self.index.get(id) else {
            self.index.insert(id.to_string(), self.experiments.len());
            self.experiments.push(experiment);
            return Ok(());
        };

        let orphaned = self
            .cohorts
            .iter()
            .map(|c| (c.experiment_id(), c.variant()))
            .chain(self.kpis.iter().map(|k| (k.experiment_id(), k.variant())))
            .find(|&(owner, variant)| owner == id && !experiment.has_variant(variant));
        if let Some((_, variant)) = orphaned {
            return Err(Error::InvalidInput(format!(
                "experiment '{id}' still has records for variant {variant}"
            )));
        }

        self.experiments[slot] = experiment;
        Ok(())
    }

    /// Add one cohort record.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the experiment is unknown or does not
    /// declare the record's variant.
    pub fn add_cohort(&mut self, cohort: CohortRecord) -> Result<()> {
        self.check_membership(cohort.experiment_id(), cohort.variant())?;
        self.cohorts.push(cohort);
        Ok(())
    }

    /// Add a batch of cohort records. Nothing is added if any record is rejected.
    ///
    /// # Errors
    ///
    /// See [`add_cohort`](Self::add_cohort).
    pub fn add_cohorts(&mut self, cohorts: impl IntoIterator<Item = CohortRecord>) -> Result<()> {
        let cohorts: Vec<CohortRecord> = cohorts.into_iter().collect();
        for cohort in &cohorts {
            self.check_membership(cohort.experiment_id(), cohort.variant())?;
        }
        debug!(count = cohorts.len(), "adding cohort records");
        self.cohorts.extend(cohorts);
        Ok(())
    }

    /// Add one KPI record.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` if the experiment is unknown or does not
    /// declare the record's variant.
    pub fn add_kpi_record(&mut self, record: KpiRecord) -> Result<()> {
        self.check_membership(record.experiment_id(), record.variant())?;
        self.kpis.push(record);
        Ok(())
    }

    /// Add a batch of KPI records. Nothing is added if any record is rejected.
    ///
    /// # Errors
    ///
    /// See [`add_kpi_record`](Self::add_kpi_record).
    pub fn add_kpi_records(&mut self, records: impl IntoIterator<Item = KpiRecord>) -> Result<()> {
        let records: Vec<KpiRecord> = records.into_iter().collect();
        for record in &records {
            self.check_membership(record.experiment_id(), record.variant())?;
        }
        debug!(count = records.len(), "adding KPI records");
        self.kpis.extend(records);
        Ok(())
    }

    fn check_membership(&self, experiment_id: &str, variant: super::Variant) -> Result<()> {
        let experiment = self.experiment(experiment_id).ok_or_else(|| {
            Error::InvalidInput(format!("record references unknown experiment '{experiment_id}'"))
        })?;

        if !experiment.has_variant(variant) {
            return Err(Error::InvalidInput(format!(
                "experiment '{experiment_id}' has no variant {variant}"
            )));
        }

        Ok(())
    }
}

impl ExperimentRepository for MemoryRepository {
    fn experiments(&self) -> &[ExperimentRecord] {
        &self.experiments
    }

    fn experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.index
            .get(experiment_id)
            .map(|&slot| &self.experiments[slot])
    }

    fn cohorts(&self) -> &[CohortRecord] {
        &self.cohorts
    }

    fn kpi_records(&self) -> &[KpiRecord] {
        &self.kpis
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::experiment::Variant;
    use chrono::{NaiveDate, TimeZone, Utc};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn experiment(id: &str, status: ExperimentStatus) -> ExperimentRecord {
        ExperimentRecord::builder(id, "Test", date(1))
            .status(status)
            .variants([Variant::A, Variant::B])
            .build()
            .unwrap()
    }

    fn cohort(experiment_id: &str, variant: Variant, player: &str) -> CohortRecord {
        let at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
        CohortRecord::builder(experiment_id, variant, player, at)
            .build()
            .unwrap()
    }

    #[test]
    fn test_repository_default() {
        let repo = MemoryRepository::new();
        assert!(repo.is_empty());
        assert_eq!(repo.experiment_count(), 0);
        assert_eq!(repo.cohort_count(), 0);
        assert_eq!(repo.kpi_count(), 0);
    }

    #[test]
    fn test_repository_add_and_get() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();
        repo.add_cohort(cohort("exp-1", Variant::A, "p1")).unwrap();
        repo.add_kpi_record(KpiRecord::builder("exp-1", Variant::B, date(3)).build())
            .unwrap();

        assert!(!repo.is_empty());
        assert!(repo.experiment("exp-1").is_some());
        assert!(repo.experiment("exp-2").is_none());
        assert_eq!(repo.cohorts_for("exp-1").len(), 1);
        assert_eq!(repo.kpis_for("exp-1").len(), 1);
    }

    #[test]
    fn test_repository_replaces_experiment_in_place() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Draft)).unwrap();
        repo.add_experiment(experiment("exp-2", ExperimentStatus::Draft)).unwrap();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();

        assert_eq!(repo.experiment_count(), 2);
        assert_eq!(repo.experiments()[0].status(), ExperimentStatus::Running);
    }

    #[test]
    fn test_repository_rejects_unknown_experiment() {
        let mut repo = MemoryRepository::new();
        let result = repo.add_cohort(cohort("exp-missing", Variant::A, "p1"));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_repository_rejects_undeclared_variant() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();

        let batch = vec![
            cohort("exp-1", Variant::A, "p1"),
            cohort("exp-1", Variant::D, "p2"),
        ];
        assert!(repo.add_cohorts(batch).is_err());
        // all-or-nothing
        assert_eq!(repo.cohort_count(), 0);
    }

    #[test]
    fn test_kpis_for_ordering() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();

        // Add out of order
        repo.add_kpi_records([
            KpiRecord::builder("exp-1", Variant::B, date(3)).build(),
            KpiRecord::builder("exp-1", Variant::A, date(3)).build(),
            KpiRecord::builder("exp-1", Variant::A, date(2)).build(),
        ])
        .unwrap();

        let kpis = repo.kpis_for("exp-1");
        let keys: Vec<_> = kpis.iter().map(|k| (k.date(), k.variant())).collect();
        assert_eq!(
            keys,
            vec![
                (date(2), Variant::A),
                (date(3), Variant::A),
                (date(3), Variant::B)
            ]
        );
    }

    #[test]
    fn test_experiments_with_status() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();
        repo.add_experiment(experiment("exp-2", ExperimentStatus::Paused)).unwrap();
        repo.add_experiment(experiment("exp-3", ExperimentStatus::Running)).unwrap();

        let running = repo.experiments_with_status(ExperimentStatus::Running);
        assert_eq!(running.len(), 2);
        assert_eq!(running[1].experiment_id(), "exp-3");
    }

    #[test]
    fn test_replacement_keeps_referenced_variants() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();
        repo.add_cohort(cohort("exp-1", Variant::B, "p1")).unwrap();

        let narrowed = ExperimentRecord::builder("exp-1", "Test", date(1))
            .variants([Variant::A])
            .build()
            .unwrap();
        let result = repo.add_experiment(narrowed);

        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert!(repo.experiment("exp-1").unwrap().has_variant(Variant::B));
    }

    #[test]
    fn test_replacement_checks_kpi_records() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();
        repo.add_kpi_record(KpiRecord::builder("exp-1", Variant::B, date(2)).build())
            .unwrap();

        let narrowed = ExperimentRecord::builder("exp-1", "Test", date(1))
            .variants([Variant::A])
            .build()
            .unwrap();
        assert!(repo.add_experiment(narrowed).is_err());
    }

    #[test]
    fn test_replacement_may_add_variants() {
        let mut repo = MemoryRepository::new();
        repo.add_experiment(experiment("exp-1", ExperimentStatus::Running)).unwrap();
        repo.add_cohort(cohort("exp-1", Variant::B, "p1")).unwrap();

        let widened = ExperimentRecord::builder("exp-1", "Test", date(1))
            .variants([Variant::A, Variant::B, Variant::C])
            .build()
            .unwrap();
        repo.add_experiment(widened).unwrap();
        assert_eq!(repo.experiment("exp-1").unwrap().variants().len(), 3);
    }
}
