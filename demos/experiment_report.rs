//! Experiment Report Example
//!
//! Walks through the dashboard views on generated demo data: experiment
//! overview, variant summaries with uplift, guardrails, cohort filtering
//! and KPI trends.
//!
//! Run with: cargo run --example experiment_report

use chrono::NaiveDate;
use experiment_insights::analytics::{self, KpiScope};
use experiment_insights::cohort::{self, CohortFilter};
use experiment_insights::config::DashboardConfig;
use experiment_insights::experiment::{ExperimentRepository, Variant};
use experiment_insights::fixtures::FixtureOptions;
use experiment_insights::metrics::{compute_aggregate, compute_uplift};
use experiment_insights::report;
use experiment_insights::Dashboard;

fn main() -> experiment_insights::Result<()> {
    println!("=== Experiment Insights ===\n");

    let as_of = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
    let config = DashboardConfig::default()
        .with_fixtures(FixtureOptions::default().with_as_of(as_of));
    let dashboard = Dashboard::builder().config(config).build()?;
    let repo = dashboard.repository();

    // -------------------------------------------------------------------------
    // 1. Overview
    // -------------------------------------------------------------------------
    println!("1. Overview");
    let overview = report::dashboard_overview(repo);
    println!(
        "   {} experiments, {} running, {} completed",
        overview.total, overview.running, overview.completed
    );
    println!("   Players in running tests: {}", overview.active_sample_size);

    // -------------------------------------------------------------------------
    // 2. Aggregate metrics by hand
    // -------------------------------------------------------------------------
    println!("\n2. Aggregates for exp-001");
    let cohorts = repo.cohorts_for("exp-001");
    let kpis = repo.kpis_for("exp-001");

    let summarize = |variant| {
        compute_aggregate("exp-001", variant, cohorts.iter().copied(), kpis.iter().copied())
    };

    let baseline = summarize(Variant::A);
    for variant in Variant::ALL {
        let summary = summarize(variant);
        match summary {
            Some(s) => println!(
                "   {variant}: ARPDAU {:.4}, conversion {:.2}%, churn {:.2}%, uplift {:+.1}%",
                s.arpdau,
                s.conversion_rate * 100.0,
                s.churn_rate * 100.0,
                compute_uplift(Some(&s), baseline.as_ref())
            ),
            None => println!("   {variant}: no data"),
        }
    }

    // -------------------------------------------------------------------------
    // 3. Full report with guardrails
    // -------------------------------------------------------------------------
    println!("\n3. Report for exp-003");
    let result = dashboard.report("exp-003")?;
    for m in &result.variant_metrics {
        println!("   {}: {} players, uplift {}", m.variant, m.summary.sample_size, m.uplift);
    }
    for (variant, check) in result.guardrails(&dashboard.config().guardrails) {
        println!(
            "   Guardrails {variant}: {}",
            if check.passed() { "pass" } else { "breach" }
        );
    }

    // -------------------------------------------------------------------------
    // 4. Cohort table
    // -------------------------------------------------------------------------
    println!("\n4. Converters search in exp-002 variant C");
    let rows = CohortFilter::new()
        .variant(Variant::C)
        .player_search("-c-1")
        .apply(repo.cohorts_for("exp-002"));
    if let Some(stats) = cohort::cohort_stats(rows.iter().copied()) {
        println!(
            "   {} rows, {} converted, avg spend ${:.2}",
            stats.total_players, stats.converters, stats.avg_spend
        );
    }

    // -------------------------------------------------------------------------
    // 5. KPI trend
    // -------------------------------------------------------------------------
    println!("\n5. Running experiments trend (reported ARPDAU)");
    let records = analytics::select_kpis(repo, &KpiScope::Running);
    for row in analytics::pivot_by_date(records.iter().copied()).iter().take(3) {
        let values: Vec<String> = row
            .values
            .iter()
            .map(|(variant, v)| format!("{variant}={:.3}", v.reported_arpdau))
            .collect();
        println!("   {}: {}", row.date, values.join(" "));
    }

    println!("\n=== Done ===");
    Ok(())
}
