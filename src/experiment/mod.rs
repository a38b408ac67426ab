//! Experiment Schema
//!
//! Data structures for A/B experiment results and the repository that
//! serves them.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< CohortRecord (N)   [one per assigned player]
//!          │
//!          └──────────< KpiRecord (N)      [one per variant per day]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use chrono::{NaiveDate, TimeZone, Utc};
//! use experiment_insights::experiment::{
//!     CohortRecord, ExperimentRecord, ExperimentRepository, ExperimentStatus, MemoryRepository,
//!     Variant,
//! };
//!
//! let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
//! let experiment = ExperimentRecord::builder("exp-001", "Bundle Pricing", start)
//!     .status(ExperimentStatus::Running)
//!     .variants([Variant::A, Variant::B])
//!     .build()?;
//!
//! let mut repo = MemoryRepository::new();
//! repo.add_experiment(experiment)?;
//!
//! let assigned = Utc.with_ymd_and_hms(2025, 1, 2, 9, 30, 0).unwrap();
//! repo.add_cohort(
//!     CohortRecord::builder("exp-001", Variant::B, "player-42", assigned)
//!         .converted(true)
//!         .total_spend(9.99)
//!         .build()?,
//! )?;
//!
//! assert_eq!(repo.cohorts_for("exp-001").len(), 1);
//! # Ok::<(), experiment_insights::Error>(())
//! ```

mod cohort_record;
mod experiment_record;
mod kpi_record;
mod store;
mod variant;

pub use cohort_record::{CohortRecord, CohortRecordBuilder};
pub use experiment_record::{ExperimentRecord, ExperimentRecordBuilder};
pub use kpi_record::{KpiRecord, KpiRecordBuilder};
pub use store::{ExperimentRepository, MemoryRepository};
pub use variant::{ExperimentStatus, Variant};
