//! Integration test for the dashboard pipeline
//!
//! Tests the complete flow on generated demo data:
//! 1. Generate fixtures for a pinned date
//! 2. Build experiment reports (summaries, uplift, missing variants)
//! 3. Filter cohorts and export CSV
//! 4. Save and reload a Parquet snapshot

use chrono::{NaiveDate, TimeZone, Utc};
use experiment_insights::analytics::{self, KpiScope};
use experiment_insights::cohort::CohortFilter;
use experiment_insights::experiment::{
    CohortRecord, ExperimentRecord, ExperimentRepository, ExperimentStatus, KpiRecord,
    MemoryRepository, Variant,
};
use experiment_insights::fixtures::{self, FixtureOptions};
use experiment_insights::metrics::{compute_aggregate, compute_uplift, Uplift};
use experiment_insights::report::experiment_report;
use experiment_insights::{export, storage, Error};
use tempfile::TempDir;

fn options() -> FixtureOptions {
    FixtureOptions::default()
        .with_seed(42)
        .with_as_of(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap())
}

fn demo_repo() -> MemoryRepository {
    fixtures::generate(&options()).unwrap()
}

#[test]
fn test_two_player_scenario() {
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 9, 0, 0).unwrap();
    let cohorts = vec![
        CohortRecord::builder("exp-1", Variant::A, "p1", at)
            .retention(true, true, false)
            .converted(true)
            .total_spend(10.0)
            .playtime_minutes(60)
            .build()
            .unwrap(),
        CohortRecord::builder("exp-1", Variant::A, "p2", at)
            .playtime_minutes(30)
            .build()
            .unwrap(),
    ];
    let day = NaiveDate::from_ymd_opt(2025, 1, 2).unwrap();
    let kpis = vec![KpiRecord::builder("exp-1", Variant::A, day).build()];

    let s = compute_aggregate("exp-1", Variant::A, &cohorts, &kpis).unwrap();
    assert_eq!(s.sample_size, 2);
    assert!((s.arpdau - 5.0).abs() < f64::EPSILON);
    assert!((s.conversion_rate - 0.5).abs() < f64::EPSILON);
    assert!((s.retention_day7_rate - 0.5).abs() < f64::EPSILON);
    assert!((s.churn_rate - 0.5).abs() < f64::EPSILON);
    assert!((s.engagement_minutes - 45.0).abs() < f64::EPSILON);

    // Variant B has neither cohorts nor KPI records
    assert!(compute_aggregate("exp-1", Variant::B, &cohorts, &kpis).is_none());
}

#[test]
fn test_fixture_report_every_running_experiment() {
    let repo = demo_repo();

    for experiment in repo.experiments_with_status(ExperimentStatus::Running) {
        let report = experiment_report(&repo, experiment.experiment_id()).unwrap();
        assert_eq!(report.baseline, Variant::A);
        assert_eq!(report.variant_metrics.len(), 3);
        assert!(report.missing_variants.is_empty());
        assert_eq!(report.time_series.len(), 14 * 3);

        let baseline = report.variant(Variant::A).unwrap();
        assert_eq!(baseline.uplift, Uplift::Computed(0.0));
        for m in &report.variant_metrics {
            let s = m.summary;
            assert_eq!(s.churn_rate + s.retention_day7_rate, 1.0);
            assert!(m.uplift.is_defined());
        }
    }
}

#[test]
fn test_report_matches_direct_computation() {
    let repo = demo_repo();
    let report = experiment_report(&repo, "exp-003").unwrap();

    let cohorts = repo.cohorts_for("exp-003");
    let kpis = repo.kpis_for("exp-003");
    let a = compute_aggregate("exp-003", Variant::A, cohorts.iter().copied(), kpis.iter().copied());
    let c = compute_aggregate("exp-003", Variant::C, cohorts.iter().copied(), kpis.iter().copied());

    let reported = report.variant(Variant::C).unwrap();
    assert_eq!(Some(reported.summary), c);
    assert_eq!(reported.uplift.percent_or_zero(), compute_uplift(c.as_ref(), a.as_ref()));
}

#[test]
fn test_paused_and_draft_have_no_summaries() {
    let repo = demo_repo();

    for id in ["exp-004", "exp-005"] {
        let report = experiment_report(&repo, id).unwrap();
        assert!(report.variant_metrics.is_empty());
        assert_eq!(report.missing_variants, vec![Variant::A, Variant::B, Variant::C]);
        assert!(report.time_series.is_empty());
        assert!(report.best_treatment().is_none());
    }
}

#[test]
fn test_unknown_experiment_is_not_found() {
    let repo = demo_repo();
    assert!(matches!(experiment_report(&repo, "exp-404"), Err(Error::NotFound(_))));
}

#[test]
fn test_zero_spend_baseline_reports_undefined_uplift() {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
    let mut repo = MemoryRepository::new();
    repo.add_experiment(
        ExperimentRecord::builder("exp-1", "Zero", start)
            .status(ExperimentStatus::Running)
            .build()
            .unwrap(),
    )
    .unwrap();
    for variant in [Variant::A, Variant::B] {
        let spend = if variant == Variant::B { 3.0 } else { 0.0 };
        repo.add_cohort(
            CohortRecord::builder("exp-1", variant, format!("p-{variant}"), at)
                .total_spend(spend)
                .build()
                .unwrap(),
        )
        .unwrap();
        repo.add_kpi_record(KpiRecord::builder("exp-1", variant, start).build())
            .unwrap();
    }

    let report = experiment_report(&repo, "exp-1").unwrap();
    assert_eq!(report.variant(Variant::B).unwrap().uplift, Uplift::Undefined);
    assert_eq!(report.variant(Variant::A).unwrap().uplift, Uplift::Undefined);
}

#[test]
fn test_cohort_filter_and_csv_export() {
    let repo = demo_repo();
    let rows = CohortFilter::new()
        .variant(Variant::B)
        .player_search("PLAYER-EXP-002-B-1")
        .apply(repo.cohorts_for("exp-002"));

    // Indices 1, 10-19, 100-199 and 1000-1999 of 4000 players
    assert_eq!(rows.len(), 1 + 10 + 100 + 1000);

    let mut out = Vec::new();
    export::cohorts_csv(&mut out, rows.iter().copied()).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), rows.len() + 1);
    assert!(text.lines().skip(1).all(|l| l.contains(",B,")));
}

#[test]
fn test_running_kpi_scope() {
    let repo = demo_repo();
    let running = analytics::select_kpis(&repo, &KpiScope::Running);
    // exp-001 and exp-002, 14 days x 3 variants each
    assert_eq!(running.len(), 2 * 14 * 3);

    let rows = analytics::pivot_by_date(running.iter().copied());
    assert_eq!(rows.len(), 14);
    assert!(rows.iter().all(|r| r.values.len() == 3));
}

#[test]
fn test_snapshot_round_trip() {
    let dir = TempDir::new().unwrap();
    let repo = demo_repo();

    storage::save_snapshot(dir.path(), &repo).unwrap();
    assert!(dir.path().join(storage::EXPERIMENTS_FILE).exists());
    assert!(dir.path().join(storage::COHORTS_FILE).exists());
    assert!(dir.path().join(storage::KPIS_FILE).exists());

    let loaded = storage::load_snapshot(dir.path()).unwrap();
    assert_eq!(loaded.experiments(), repo.experiments());
    assert_eq!(loaded.cohorts(), repo.cohorts());
    assert_eq!(loaded.kpi_records(), repo.kpi_records());

    let before = experiment_report(&repo, "exp-001").unwrap();
    let after = experiment_report(&loaded, "exp-001").unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_snapshot_missing_directory() {
    let dir = TempDir::new().unwrap();
    let result = storage::load_snapshot(dir.path().join("absent"));
    assert!(matches!(result, Err(Error::StorageError(_))));
}

#[test]
fn test_snapshot_rejects_orphan_rows() {
    let dir = TempDir::new().unwrap();
    let repo = demo_repo();
    storage::save_snapshot(dir.path(), &repo).unwrap();

    // Drop every experiment: cohort rows now reference unknown IDs
    std::fs::write(dir.path().join(storage::EXPERIMENTS_FILE), "[]").unwrap();
    let result = storage::load_snapshot(dir.path());
    assert!(matches!(result, Err(Error::InvalidInput(_))));
}

#[test]
fn test_narrowed_experiment_keeps_snapshot_loadable() {
    let dir = TempDir::new().unwrap();
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
    let at = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

    let mut repo = MemoryRepository::new();
    repo.add_experiment(
        ExperimentRecord::builder("exp-1", "Narrow", start)
            .variants([Variant::A, Variant::B])
            .build()
            .unwrap(),
    )
    .unwrap();
    repo.add_cohort(
        CohortRecord::builder("exp-1", Variant::B, "p-b", at)
            .build()
            .unwrap(),
    )
    .unwrap();

    let narrowed = ExperimentRecord::builder("exp-1", "Narrow", start)
        .variants([Variant::A])
        .build()
        .unwrap();
    assert!(matches!(repo.add_experiment(narrowed), Err(Error::InvalidInput(_))));

    storage::save_snapshot(dir.path(), &repo).unwrap();
    let loaded = storage::load_snapshot(dir.path()).unwrap();
    assert_eq!(loaded.cohorts(), repo.cohorts());
    assert_eq!(loaded.experiments(), repo.experiments());
}
