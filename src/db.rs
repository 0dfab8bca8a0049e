use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::events;
use crate::models::{
    Challenge, ChallengeStatus, Employee, MonthlyGoals, Proposal, ProposalStatus, Role,
    StatusTransition, TargetType, WeeklyPerformanceRecord,
};
use crate::weights::{self, MetricWeights};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

const SEED_EMPLOYEE_IDS: [&str; 3] = [
    "b8e2c4a1-57d3-4f0e-9c6a-2d41e7f5a301",
    "b8e2c4a1-57d3-4f0e-9c6a-2d41e7f5a302",
    "b8e2c4a1-57d3-4f0e-9c6a-2d41e7f5a303",
];

pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let employees = vec![
        (
            Uuid::parse_str(SEED_EMPLOYEE_IDS[0])?,
            "Marina Alves",
            "marina.alves@salesops.example",
            Role::Seller.as_str(),
        ),
        (
            Uuid::parse_str(SEED_EMPLOYEE_IDS[1])?,
            "Rafael Costa",
            "rafael.costa@salesops.example",
            Role::Sdr.as_str(),
        ),
        (
            Uuid::parse_str(SEED_EMPLOYEE_IDS[2])?,
            "Helena Prado",
            "helena.prado@salesops.example",
            Role::Admin.as_str(),
        ),
    ];

    for (id, name, email, role) in &employees {
        sqlx::query(
            r#"
            INSERT INTO sales_ops.employees (id, full_name, email, role)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO UPDATE
            SET full_name = EXCLUDED.full_name, role = EXCLUDED.role
            "#,
        )
        .bind(id)
        .bind(name)
        .bind(email)
        .bind(role)
        .execute(pool)
        .await?;
    }

    let marina = employees[0].0;
    let rafael = employees[1].0;
    let weights = MetricWeights::default();

    let weeks = vec![
        (marina, NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?, 2, 4, 1, 3, 2),
        (marina, NaiveDate::from_ymd_opt(2026, 2, 13).context("invalid date")?, 1, 3, 2, 5, 1),
        (rafael, NaiveDate::from_ymd_opt(2026, 2, 6).context("invalid date")?, 3, 0, 0, 9, 6),
        (rafael, NaiveDate::from_ymd_opt(2026, 2, 13).context("invalid date")?, 0, 1, 0, 7, 4),
    ];

    for (employee_id, week_ending, education, presented, signed, mql, visits) in weeks {
        let mut record = WeeklyPerformanceRecord {
            employee_id,
            week_ending,
            education_points: education,
            proposals_presented: presented,
            contracts_signed: signed,
            mql,
            visits_scheduled: visits,
            total_points: 0.0,
        };
        record.total_points = weights.total_points(&record);
        upsert_weekly_record(pool, &record).await?;
    }

    let proposals = vec![
        (
            Uuid::parse_str("6b1f0c3e-9d0a-4f5e-8a51-1f6de1a0c001")?,
            "Padaria Sol",
            2500.0,
            30000.0,
            ProposalStatus::ClosedWon.as_str(),
            NaiveDate::from_ymd_opt(2026, 1, 22),
            marina,
            Some(rafael),
        ),
        (
            Uuid::parse_str("6b1f0c3e-9d0a-4f5e-8a51-1f6de1a0c002")?,
            "Clinica Vida",
            4200.0,
            50400.0,
            ProposalStatus::ClosedWon.as_str(),
            NaiveDate::from_ymd_opt(2026, 2, 11),
            marina,
            None,
        ),
        (
            Uuid::parse_str("6b1f0c3e-9d0a-4f5e-8a51-1f6de1a0c003")?,
            "Auto Pecas Norte",
            1800.0,
            21600.0,
            ProposalStatus::Negotiation.as_str(),
            None,
            marina,
            Some(rafael),
        ),
    ];

    for (id, client, monthly, total, status, closing, closer, originator) in proposals {
        sqlx::query(
            r#"
            INSERT INTO sales_ops.proposals
            (id, client_name, monthly_value, total_value, status, closing_date, closer_id, originator_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(id)
        .bind(client)
        .bind(monthly)
        .bind(total)
        .bind(status)
        .bind(closing)
        .bind(closer)
        .bind(originator)
        .execute(pool)
        .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO sales_ops.challenges
        (id, title, description, start_date, end_date, prize, target_type, target_value)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(Uuid::parse_str("9e3c7a55-1b44-4c1a-bb0e-7d1c2f5e0a10")?)
    .bind("February MQL sprint")
    .bind("Generate 40 marketing qualified leads as a team")
    .bind(NaiveDate::from_ymd_opt(2026, 2, 1).context("invalid date")?)
    .bind(NaiveDate::from_ymd_opt(2026, 2, 28).context("invalid date")?)
    .bind("Team lunch")
    .bind(TargetType::Mql.as_str())
    .bind(40.0_f64)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn fetch_employees(pool: &PgPool) -> anyhow::Result<Vec<Employee>> {
    let rows = sqlx::query(
        "SELECT id, full_name, email, role FROM sales_ops.employees ORDER BY full_name",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch employees")?;

    let mut employees = Vec::with_capacity(rows.len());
    for row in rows {
        let role: String = row.get("role");
        employees.push(Employee {
            id: row.get("id"),
            full_name: row.get("full_name"),
            email: row.get("email"),
            role: role.parse()?,
        });
    }
    Ok(employees)
}

pub async fn fetch_weekly_records(pool: &PgPool) -> anyhow::Result<Vec<WeeklyPerformanceRecord>> {
    let rows = sqlx::query(
        "SELECT employee_id, week_ending, education_points, proposals_presented, \
         contracts_signed, mql, visits_scheduled, total_points \
         FROM sales_ops.weekly_performance ORDER BY week_ending, employee_id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch weekly performance records")?;

    Ok(rows
        .into_iter()
        .map(|row| WeeklyPerformanceRecord {
            employee_id: row.get("employee_id"),
            week_ending: row.get("week_ending"),
            education_points: row.get("education_points"),
            proposals_presented: row.get("proposals_presented"),
            contracts_signed: row.get("contracts_signed"),
            mql: row.get("mql"),
            visits_scheduled: row.get("visits_scheduled"),
            total_points: row.get("total_points"),
        })
        .collect())
}

pub async fn fetch_proposals(pool: &PgPool) -> anyhow::Result<Vec<Proposal>> {
    let rows = sqlx::query(
        "SELECT id, client_name, monthly_value, total_value, status, closing_date, \
         created_on, closer_id, originator_id \
         FROM sales_ops.proposals ORDER BY created_on, id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch proposals")?;

    let mut proposals = Vec::with_capacity(rows.len());
    for row in rows {
        let status: String = row.get("status");
        proposals.push(Proposal {
            id: row.get("id"),
            client_name: row.get("client_name"),
            monthly_value: row.get("monthly_value"),
            total_value: row.get("total_value"),
            status: status.parse()?,
            closing_date: row.get("closing_date"),
            created_on: row.get("created_on"),
            closer_id: row.get("closer_id"),
            originator_id: row.get("originator_id"),
        });
    }
    Ok(proposals)
}

pub async fn fetch_challenges(pool: &PgPool) -> anyhow::Result<Vec<Challenge>> {
    let rows = sqlx::query(
        "SELECT id, title, description, start_date, end_date, prize, target_type, \
         target_value, status, participant_ids, winner_ids, completed_at \
         FROM sales_ops.challenges ORDER BY start_date, id",
    )
    .fetch_all(pool)
    .await
    .context("failed to fetch challenges")?;

    rows.iter().map(challenge_from_row).collect()
}

fn challenge_from_row(row: &PgRow) -> anyhow::Result<Challenge> {
    let target_type: String = row.get("target_type");
    let status: String = row.get("status");
    Ok(Challenge {
        id: row.get("id"),
        title: row.get("title"),
        description: row.get("description"),
        start_date: row.get("start_date"),
        end_date: row.get("end_date"),
        prize: row.get("prize"),
        target_type: TargetType::parse(&target_type),
        target_value: row.get("target_value"),
        status: status.parse::<ChallengeStatus>()?,
        participant_ids: row.get("participant_ids"),
        winner_ids: row.get("winner_ids"),
        completed_at: row.get("completed_at"),
    })
}

pub async fn upsert_weekly_record(
    pool: &PgPool,
    record: &WeeklyPerformanceRecord,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sales_ops.weekly_performance
        (id, employee_id, week_ending, education_points, proposals_presented,
         contracts_signed, mql, visits_scheduled, total_points)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (employee_id, week_ending) DO UPDATE
        SET education_points = EXCLUDED.education_points,
            proposals_presented = EXCLUDED.proposals_presented,
            contracts_signed = EXCLUDED.contracts_signed,
            mql = EXCLUDED.mql,
            visits_scheduled = EXCLUDED.visits_scheduled,
            total_points = EXCLUDED.total_points,
            updated_at = NOW()
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(record.employee_id)
    .bind(record.week_ending)
    .bind(record.education_points)
    .bind(record.proposals_presented)
    .bind(record.contracts_signed)
    .bind(record.mql)
    .bind(record.visits_scheduled)
    .bind(record.total_points)
    .execute(pool)
    .await
    .with_context(|| {
        format!(
            "failed to upsert weekly record for {} ending {}",
            record.employee_id, record.week_ending
        )
    })?;
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
struct WeeklyCsvRow {
    email: String,
    week_ending: NaiveDate,
    #[serde(default)]
    education_points: i32,
    #[serde(default)]
    proposals_presented: i32,
    #[serde(default)]
    contracts_signed: i32,
    #[serde(default)]
    mql: i32,
    #[serde(default)]
    visits_scheduled: i32,
    total_points: Option<f64>,
}

impl WeeklyCsvRow {
    fn into_record(self, employee_id: Uuid, weights: &MetricWeights) -> WeeklyPerformanceRecord {
        let mut record = WeeklyPerformanceRecord {
            employee_id,
            week_ending: self.week_ending,
            education_points: self.education_points,
            proposals_presented: self.proposals_presented,
            contracts_signed: self.contracts_signed,
            mql: self.mql,
            visits_scheduled: self.visits_scheduled,
            total_points: 0.0,
        };
        record.total_points = self
            .total_points
            .unwrap_or_else(|| weights.total_points(&record));
        record
    }
}

/// Upserts weekly records from a CSV keyed by employee email. Returns the
/// records written so callers can announce them.
pub async fn import_weekly_csv(
    pool: &PgPool,
    csv_path: &std::path::Path,
) -> anyhow::Result<Vec<WeeklyPerformanceRecord>> {
    let weights: MetricWeights = load_config(pool, weights::CONFIG_TYPE)
        .await?
        .unwrap_or_default();

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut written = Vec::new();

    for result in reader.deserialize::<WeeklyCsvRow>() {
        let row = result?;
        let employee_id: Option<Uuid> =
            sqlx::query("SELECT id FROM sales_ops.employees WHERE email = $1")
                .bind(&row.email)
                .fetch_optional(pool)
                .await?
                .map(|r| r.get("id"));

        let Some(employee_id) = employee_id else {
            tracing::warn!(email = %row.email, "skipping weekly row for unknown employee");
            continue;
        };

        let record = row.into_record(employee_id, &weights);
        upsert_weekly_record(pool, &record).await?;
        written.push(record);
    }

    Ok(written)
}

/// Writes a status promotion. Rows already in a terminal state are left
/// untouched; returns whether the row changed.
pub async fn apply_transition(pool: &PgPool, transition: &StatusTransition) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE sales_ops.challenges
        SET status = $2,
            completed_at = COALESCE($3, completed_at),
            winner_ids = CASE WHEN cardinality($4::uuid[]) > 0 THEN $4 ELSE winner_ids END
        WHERE id = $1 AND status = 'active'
        "#,
    )
    .bind(transition.challenge_id)
    .bind(transition.status.as_str())
    .bind(transition.completed_at)
    .bind(&transition.winner_ids)
    .execute(pool)
    .await
    .with_context(|| format!("failed to update challenge {}", transition.challenge_id))?;

    Ok(result.rows_affected() > 0)
}

pub async fn load_config<T: DeserializeOwned>(
    pool: &PgPool,
    config_type: &str,
) -> anyhow::Result<Option<T>> {
    let payload: Option<serde_json::Value> =
        sqlx::query("SELECT payload FROM sales_ops.system_config WHERE config_type = $1")
            .bind(config_type)
            .fetch_optional(pool)
            .await
            .with_context(|| format!("failed to load config '{config_type}'"))?
            .map(|row| row.get("payload"));

    payload
        .map(|value| {
            serde_json::from_value(value)
                .with_context(|| format!("config '{config_type}' has an unexpected shape"))
        })
        .transpose()
}

pub async fn save_config<T: Serialize>(
    pool: &PgPool,
    config_type: &str,
    value: &T,
) -> anyhow::Result<()> {
    let payload = serde_json::to_value(value)?;
    sqlx::query(
        r#"
        INSERT INTO sales_ops.system_config (config_type, payload, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (config_type) DO UPDATE
        SET payload = EXCLUDED.payload, updated_at = NOW()
        "#,
    )
    .bind(config_type)
    .bind(payload)
    .execute(pool)
    .await
    .with_context(|| format!("failed to save config '{config_type}'"))?;
    Ok(())
}

/// Loads the goals for `year`, persisting `default_target` for every month
/// the first time a year is requested.
pub async fn load_monthly_goals(
    pool: &PgPool,
    year: i32,
    default_target: f64,
) -> anyhow::Result<MonthlyGoals> {
    let config_type = MonthlyGoals::config_type(year);
    if let Some(goals) = load_config::<MonthlyGoals>(pool, &config_type).await? {
        return Ok(goals);
    }

    let goals = MonthlyGoals::with_default(year, default_target);
    save_config(pool, &config_type, &goals).await?;
    tracing::info!(year, default_target, "created default monthly goals");
    Ok(goals)
}

/// Saves all twelve months and notifies listening processes so their goal
/// caches drop the year.
pub async fn save_monthly_goals(pool: &PgPool, goals: &MonthlyGoals) -> anyhow::Result<()> {
    save_config(pool, &MonthlyGoals::config_type(goals.year), goals).await?;
    sqlx::query("SELECT pg_notify($1, $2)")
        .bind(events::NOTIFY_CHANNEL)
        .bind(events::goals_notification(goals.year))
        .execute(pool)
        .await
        .with_context(|| format!("failed to announce goals for {}", goals.year))?;
    Ok(())
}
