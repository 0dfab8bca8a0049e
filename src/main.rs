use std::path::PathBuf;

use anyhow::Context;
use chrono::{Datelike, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;

mod challenge;
mod config;
mod db;
mod events;
mod goals;
mod models;
mod report;
mod watcher;
mod weights;

use config::AppConfig;
use events::{DashboardEvent, EventBus};
use models::MonthlyGoals;

#[derive(Parser)]
#[command(name = "sales-ops")]
#[command(about = "Commission goals and sales challenge tracker", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Load realistic seed data
    Seed,
    /// Upsert weekly performance records from a CSV file
    ImportWeekly {
        #[arg(long)]
        csv: PathBuf,
    },
    /// Reconcile monthly revenue goals for a year
    Goals {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Replace all twelve monthly targets for a year
    SetGoals {
        #[arg(long)]
        year: i32,
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        targets: Vec<f64>,
    },
    /// Show progress and leaderboard for every challenge
    Challenges {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Periodically promote challenges to completed or expired
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Show or replace a stored configuration blob
    Config {
        #[arg(long)]
        config_type: String,
        #[arg(long)]
        set: Option<PathBuf>,
    },
    /// Generate a markdown report
    Report {
        #[arg(long)]
        year: Option<i32>,
        #[arg(long)]
        as_of: Option<NaiveDate>,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.database_url)
        .await
        .context("failed to connect to Postgres")?;

    let bus = EventBus::default();
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::InitDb => {
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Seed => {
            db::seed(&pool).await?;
            println!("Seed data inserted.");
        }
        Commands::ImportWeekly { csv } => {
            let written = db::import_weekly_csv(&pool, &csv).await?;
            for record in &written {
                bus.publish(DashboardEvent::WeeklyRecordUpserted {
                    employee_id: record.employee_id,
                    week_ending: record.week_ending,
                });
            }
            println!("Upserted {} weekly records from {}.", written.len(), csv.display());
        }
        Commands::Goals { year, as_of } => {
            let as_of = as_of.unwrap_or(today);
            let year = year.unwrap_or(as_of.year());
            let monthly = db::load_monthly_goals(&pool, year, config.default_monthly_target).await?;
            let proposals = db::fetch_proposals(&pool).await?;
            let reconciliation = goals::reconcile_year(&monthly, &proposals, as_of);
            let breakdowns = goals::allocate_contracts(&monthly, &proposals);
            println!("{}", report::render_goals(&reconciliation));
            println!("{}", report::render_breakdowns(&breakdowns));
        }
        Commands::SetGoals { year, targets } => {
            let targets: [f64; 12] = targets
                .try_into()
                .map_err(|values: Vec<f64>| anyhow::anyhow!("expected 12 targets, got {}", values.len()))?;
            if let Some(bad) = targets.iter().find(|t| **t < 0.0) {
                anyhow::bail!("monthly targets cannot be negative, got {bad}");
            }

            let goals = MonthlyGoals { year, targets };
            db::save_monthly_goals(&pool, &goals).await?;
            bus.publish(DashboardEvent::MonthlyGoalsUpdated { year });
            println!(
                "Saved goals for {}: {:.2} across the year.",
                goals.year,
                goals.targets.iter().sum::<f64>()
            );
        }
        Commands::Challenges { as_of } => {
            let as_of = as_of.unwrap_or(today);
            let snapshot = watcher::Snapshot::fetch(&pool).await?;
            for challenge in &snapshot.challenges {
                if let Err(err) = challenge.validate() {
                    tracing::warn!(challenge = %challenge.id, error = %err, "invalid challenge definition");
                }
            }
            println!(
                "{}",
                report::render_challenges(
                    &snapshot.challenges,
                    &snapshot.employees,
                    &snapshot.records,
                    &snapshot.proposals,
                    as_of,
                )
            );
        }
        Commands::Watch { interval_secs } => {
            let every = match interval_secs {
                Some(secs) => config::evaluation_interval(secs)?,
                None => config.evaluation_interval,
            };
            let mut receiver = bus.subscribe();
            tokio::spawn(async move {
                while let Ok(event) = receiver.recv().await {
                    println!("event: {event:?}");
                }
            });
            watcher::run(pool, bus, every, config.default_monthly_target).await?;
        }
        Commands::Config { config_type, set } => {
            if let Some(path) = set {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let value: serde_json::Value = serde_json::from_str(&raw)
                    .with_context(|| format!("{} is not valid JSON", path.display()))?;
                db::save_config(&pool, &config_type, &value).await?;
                println!("Stored {config_type}.");
            } else {
                match db::load_config::<serde_json::Value>(&pool, &config_type).await? {
                    Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                    None => println!("No configuration stored for {config_type}."),
                }
            }
        }
        Commands::Report { year, as_of, out } => {
            let as_of = as_of.unwrap_or(today);
            let year = year.unwrap_or(as_of.year());
            let monthly = db::load_monthly_goals(&pool, year, config.default_monthly_target).await?;
            let snapshot = watcher::Snapshot::fetch(&pool).await?;
            let reconciliation = goals::reconcile_year(&monthly, &snapshot.proposals, as_of);
            let breakdowns = goals::allocate_contracts(&monthly, &snapshot.proposals);
            let report = report::build_report(
                as_of,
                &reconciliation,
                &breakdowns,
                &snapshot.challenges,
                &snapshot.employees,
                &snapshot.records,
                &snapshot.proposals,
            );
            std::fs::write(&out, report)?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
