//! abdash - A/B experiment dashboard CLI
//!
//! Prints experiment results, cohort tables and KPI trends from a snapshot
//! directory or from deterministic demo data.

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use experiment_insights::analytics::{self, KpiScope};
use experiment_insights::cohort::{self, CohortFilter};
use experiment_insights::experiment::{ExperimentRepository, Variant};
use experiment_insights::report::{self, ExperimentReport};
use experiment_insights::{export, storage, Dashboard};

#[derive(Parser)]
#[command(name = "abdash")]
#[command(about = "A/B experiment results for game monetization", long_about = None)]
#[command(version)]
struct Cli {
    /// Snapshot directory to load instead of generated demo data
    #[arg(long, global = true, env = "ABDASH_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// JSON config file (guardrails, preview limit, fixture settings)
    #[arg(long, global = true, env = "ABDASH_CONFIG")]
    config: Option<PathBuf>,

    /// Seed for generated demo data
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List experiments with status counts
    List,

    /// Show variant metrics, uplift and guardrails for an experiment
    Report {
        /// Experiment ID (e.g., exp-001)
        experiment: String,

        /// Print the full report as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Show the cohort table of an experiment
    Cohorts {
        /// Experiment ID
        experiment: String,

        /// Only rows of this variant
        #[arg(short, long)]
        variant: Option<Variant>,

        /// Only players whose ID contains this text
        #[arg(short, long)]
        search: Option<String>,

        /// Write the filtered rows to this CSV file
        #[arg(short, long)]
        export: Option<PathBuf>,
    },

    /// Show KPI averages and the daily trend
    Kpis {
        /// Restrict to one experiment
        #[arg(short, long, conflicts_with = "running")]
        experiment: Option<String>,

        /// Restrict to running experiments
        #[arg(long, default_value_t = false)]
        running: bool,
    },

    /// Save the loaded data as a Parquet snapshot
    Snapshot {
        /// Output directory
        dir: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("experiment_insights=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    let mut builder = Dashboard::builder();
    if let Some(dir) = &cli.data_dir {
        builder = builder.data_dir(dir);
    }
    if let Some(path) = &cli.config {
        builder = builder.config_file(path);
    }
    if let Some(seed) = cli.seed {
        builder = builder.seed(seed);
    }
    let dashboard = builder.build().context("failed to load dashboard data")?;

    match cli.command {
        Commands::List => list(&dashboard),
        Commands::Report { experiment, json } => {
            let report = dashboard.report(&experiment)?;
            if json {
                println!("{}", export::report_json(&report)?);
            } else {
                print_report(&dashboard, &report);
            }
        }
        Commands::Cohorts {
            experiment,
            variant,
            search,
            export,
        } => cohorts(&dashboard, &experiment, variant, search, export)?,
        Commands::Kpis {
            experiment,
            running,
        } => {
            let scope = match (experiment, running) {
                (Some(id), _) => KpiScope::Experiment(id),
                (None, true) => KpiScope::Running,
                (None, false) => KpiScope::All,
            };
            kpis(&dashboard, &scope);
        }
        Commands::Snapshot { dir } => {
            storage::save_snapshot(&dir, dashboard.repository())
                .with_context(|| format!("failed to write snapshot to {}", dir.display()))?;
            println!("Snapshot written to {}", dir.display());
        }
    }

    Ok(())
}

fn list(dashboard: &Dashboard) {
    let repo = dashboard.repository();
    let overview = report::dashboard_overview(repo);

    println!(
        "{} experiments: {} running, {} completed, {} paused, {} draft ({} players in running tests)",
        overview.total,
        overview.running,
        overview.completed,
        overview.paused,
        overview.draft,
        overview.active_sample_size
    );
    println!();
    println!("{:<10} {:<10} {:<11} {:>8}  NAME", "ID", "STATUS", "START", "SAMPLE");
    for experiment in repo.experiments() {
        println!(
            "{:<10} {:<10} {:<11} {:>8}  {}",
            experiment.experiment_id(),
            experiment.status(),
            experiment.start_date(),
            experiment.sample_size(),
            experiment.name()
        );
    }
}

fn print_report(dashboard: &Dashboard, report: &ExperimentReport) {
    let experiment = &report.experiment;
    println!("{} - {} [{}]", experiment.experiment_id(), experiment.name(), experiment.status());
    if !experiment.description().is_empty() {
        println!("{}", experiment.description());
    }
    println!();
    println!(
        "{:<8} {:>7} {:>8} {:>10} {:>9} {:>8} {:>10} {:>9}",
        "VARIANT", "PLAYERS", "ARPDAU", "CONVERSION", "D7 RETAIN", "CHURN", "ENGAGE MIN", "UPLIFT"
    );
    for m in &report.variant_metrics {
        let s = &m.summary;
        let label = if m.variant == report.baseline {
            format!("{} (base)", m.variant)
        } else {
            m.variant.to_string()
        };
        println!(
            "{:<8} {:>7} {:>8.4} {:>9.2}% {:>8.2}% {:>7.2}% {:>10.1} {:>9}",
            label,
            s.sample_size,
            s.arpdau,
            s.conversion_rate * 100.0,
            s.retention_day7_rate * 100.0,
            s.churn_rate * 100.0,
            s.engagement_minutes,
            m.uplift.to_string()
        );
    }

    if !report.missing_variants.is_empty() {
        let missing: Vec<String> = report.missing_variants.iter().map(ToString::to_string).collect();
        println!();
        println!("No data yet for variant(s): {}", missing.join(", "));
    }

    if let Some(best) = report.best_treatment() {
        println!();
        println!("Best treatment: {} ({})", best.variant, best.uplift);
    }

    let checks = report.guardrails(&dashboard.config().guardrails);
    let failing: Vec<_> = checks.iter().filter(|(_, r)| !r.passed()).collect();
    println!();
    if failing.is_empty() {
        println!("Guardrails: all variants pass");
    } else {
        for (variant, result) in failing {
            for violation in &result.violations {
                println!(
                    "Guardrail breach on {variant}: {} = {:.4} (limit {:.4})",
                    violation.metric, violation.observed, violation.threshold
                );
            }
        }
    }
}

fn cohorts(
    dashboard: &Dashboard,
    experiment_id: &str,
    variant: Option<Variant>,
    search: Option<String>,
    export_path: Option<PathBuf>,
) -> Result<()> {
    let repo = dashboard.repository();
    let experiment = repo
        .experiment(experiment_id)
        .with_context(|| format!("experiment '{experiment_id}' not found"))?;

    let mut filter = CohortFilter::new();
    if let Some(variant) = variant {
        filter = filter.variant(variant);
    }
    if let Some(term) = search {
        filter = filter.player_search(term);
    }
    let all = repo.cohorts_for(experiment_id);
    let rows = filter.apply(all.iter().copied());

    if let Some(stats) = cohort::cohort_stats(rows.iter().copied()) {
        println!(
            "{} players, {} converted, {} retained D7, avg spend ${:.2}, avg {:.1} min",
            stats.total_players,
            stats.converters,
            stats.retained_day7,
            stats.avg_spend,
            stats.avg_engagement_minutes
        );
    } else {
        println!("No cohort rows match");
    }

    let breakdown = cohort::variant_breakdown(experiment, all.iter().copied());
    if !breakdown.is_empty() {
        println!();
        println!(
            "{:<8} {:>7} {:>10} {:>10} {:>9} {:>10}",
            "VARIANT", "PLAYERS", "CONVERSION", "D7 RETAIN", "AVG SPEND", "ENGAGE MIN"
        );
        for row in &breakdown {
            println!(
                "{:<8} {:>7} {:>9.2}% {:>9.2}% {:>9.2} {:>10.1}",
                row.variant,
                row.players,
                row.conversion_rate * 100.0,
                row.retention_rate * 100.0,
                row.avg_spend,
                row.avg_engagement_minutes
            );
        }
    }

    let preview = cohort::preview(&rows, dashboard.config().cohort_preview_limit);
    println!();
    for row in &preview.rows {
        println!(
            "{:<28} {} {} D1:{} D7:{} conv:{} ${:>7.2} {:>3} sessions",
            row.player_id(),
            row.variant(),
            row.assigned_at().format("%Y-%m-%d %H:%M"),
            u8::from(row.retention_day1()),
            u8::from(row.retention_day7()),
            u8::from(row.converted()),
            row.total_spend(),
            row.session_count()
        );
    }
    if preview.truncated {
        println!(
            "Showing {} of {} rows; use --export to save all",
            preview.rows.len(),
            preview.total
        );
    }

    if let Some(path) = export_path {
        let path = if path.is_dir() {
            path.join(export::cohort_export_file_name(
                experiment_id,
                Utc::now().date_naive(),
            ))
        } else {
            path
        };
        let file = File::create(&path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        export::cohorts_csv(BufWriter::new(file), rows.iter().copied())?;
        println!("Exported {} rows to {}", rows.len(), path.display());
    }

    Ok(())
}

fn kpis(dashboard: &Dashboard, scope: &KpiScope) {
    let records = analytics::select_kpis(dashboard.repository(), scope);

    let Some(overview) = analytics::kpi_overview(records.iter().copied()) else {
        println!("No KPI records in scope");
        return;
    };

    println!(
        "{} records: reported ARPDAU {:.4}, churn {:.2}%, conversion {:.2}%, D7 retention {:.2}%, {:.1} min",
        overview.record_count,
        overview.avg_reported_arpdau,
        overview.avg_churn_rate * 100.0,
        overview.avg_conversion_rate * 100.0,
        overview.avg_retention_day7 * 100.0,
        overview.avg_engagement_minutes
    );

    let variants = analytics::variants_present(records.iter().copied());
    println!();
    print!("{:<11}", "DATE");
    for variant in &variants {
        print!(" {:>12}", format!("REPORTED {variant}"));
    }
    println!();

    for row in analytics::pivot_by_date(records.iter().copied()) {
        print!("{:<11}", row.date.to_string());
        for variant in &variants {
            match row.values.get(variant) {
                Some(values) => print!(" {:>12.4}", values.reported_arpdau),
                None => print!(" {:>12}", "-"),
            }
        }
        println!();
    }
}
