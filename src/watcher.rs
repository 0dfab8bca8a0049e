use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use sqlx::PgPool;

use crate::challenge;
use crate::db;
use crate::events::{self, DashboardEvent, EventBus, GoalCache};
use crate::goals;
use crate::models::{
    Challenge, Employee, MonthlyGoals, Proposal, StatusTransition, WeeklyPerformanceRecord,
};

pub struct Snapshot {
    pub employees: Vec<Employee>,
    pub records: Vec<WeeklyPerformanceRecord>,
    pub proposals: Vec<Proposal>,
    pub challenges: Vec<Challenge>,
}

impl Snapshot {
    pub async fn fetch(pool: &PgPool) -> anyhow::Result<Self> {
        Ok(Self {
            employees: db::fetch_employees(pool).await?,
            records: db::fetch_weekly_records(pool).await?,
            proposals: db::fetch_proposals(pool).await?,
            challenges: db::fetch_challenges(pool).await?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.employees.is_empty() || self.challenges.is_empty()
    }
}

pub fn plan_transitions(snapshot: &Snapshot, as_of: DateTime<Utc>) -> Vec<StatusTransition> {
    snapshot
        .challenges
        .iter()
        .filter_map(|c| {
            challenge::next_transition(
                c,
                &snapshot.employees,
                &snapshot.records,
                &snapshot.proposals,
                as_of,
            )
        })
        .collect()
}

/// One evaluation pass. Returns how many challenges changed status.
pub async fn evaluate_once(pool: &PgPool, bus: &EventBus, as_of: DateTime<Utc>) -> anyhow::Result<usize> {
    let snapshot = Snapshot::fetch(pool).await?;
    if snapshot.is_empty() {
        tracing::debug!("no employees or challenges loaded yet, skipping evaluation");
        return Ok(0);
    }

    let mut changed = 0;
    for transition in plan_transitions(&snapshot, as_of) {
        if db::apply_transition(pool, &transition).await? {
            tracing::info!(
                challenge = %transition.challenge_id,
                status = %transition.status,
                winners = transition.winner_ids.len(),
                "challenge status changed"
            );
            bus.publish(DashboardEvent::ChallengeStatusChanged {
                id: transition.challenge_id,
                status: transition.status,
            });
            changed += 1;
        }
    }
    Ok(changed)
}

async fn cached_goals(
    pool: &PgPool,
    cache: &GoalCache,
    year: i32,
    default_target: f64,
) -> anyhow::Result<MonthlyGoals> {
    if let Some(goals) = cache.get(year) {
        return Ok(goals);
    }
    let goals = db::load_monthly_goals(pool, year, default_target).await?;
    cache.insert(goals.clone());
    Ok(goals)
}

async fn log_goal_progress(
    pool: &PgPool,
    cache: &GoalCache,
    default_target: f64,
    as_of: DateTime<Utc>,
) -> anyhow::Result<()> {
    let today = as_of.date_naive();
    let monthly = cached_goals(pool, cache, today.year(), default_target).await?;
    let proposals = db::fetch_proposals(pool).await?;
    let reconciliation = goals::reconcile_year(&monthly, &proposals, today);
    tracing::info!(
        year = reconciliation.year,
        realized = reconciliation.total_actual,
        target = reconciliation.total_target,
        progress_pct = reconciliation.progress_pct,
        "monthly goal progress"
    );
    Ok(())
}

pub async fn run(
    pool: PgPool,
    bus: EventBus,
    every: Duration,
    default_target: f64,
) -> anyhow::Result<()> {
    if every.is_zero() {
        anyhow::bail!("evaluation interval must be at least one second");
    }

    let cache = GoalCache::default();
    let _invalidator = cache.spawn_invalidator(bus.subscribe());
    let _relay = events::spawn_relay(&pool, bus.clone()).await?;

    let mut ticker = tokio::time::interval(every);
    tracing::info!(interval_secs = every.as_secs(), "challenge watcher started");

    loop {
        ticker.tick().await;
        let now = Utc::now();
        match evaluate_once(&pool, &bus, now).await {
            Ok(0) => {}
            Ok(changed) => tracing::info!(changed, "evaluation pass finished"),
            Err(err) => tracing::error!(error = %format!("{err:#}"), "evaluation pass failed"),
        }
        if let Err(err) = log_goal_progress(&pool, &cache, default_target, now).await {
            tracing::error!(error = %format!("{err:#}"), "goal progress refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    use crate::models::{ChallengeStatus, Role, TargetType};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn challenge(status: ChallengeStatus, end: NaiveDate) -> Challenge {
        Challenge {
            id: Uuid::new_v4(),
            title: "Visits".to_string(),
            description: String::new(),
            start_date: date(2026, 3, 1),
            end_date: end,
            prize: String::new(),
            target_type: TargetType::VisitsScheduled,
            target_value: 5.0,
            status,
            participant_ids: Vec::new(),
            winner_ids: Vec::new(),
            completed_at: None,
        }
    }

    #[test]
    fn plans_only_active_challenges() {
        let seller = Employee {
            id: Uuid::new_v4(),
            full_name: "Ana".to_string(),
            email: "ana@example.com".to_string(),
            role: Role::Seller,
        };
        let snapshot = Snapshot {
            employees: vec![seller],
            records: Vec::new(),
            proposals: Vec::new(),
            challenges: vec![
                challenge(ChallengeStatus::Active, date(2026, 3, 31)),
                challenge(ChallengeStatus::Expired, date(2026, 3, 31)),
                challenge(ChallengeStatus::Active, date(2026, 6, 30)),
            ],
        };
        let as_of = Utc.with_ymd_and_hms(2026, 4, 2, 9, 0, 0).unwrap();

        let planned = plan_transitions(&snapshot, as_of);
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].challenge_id, snapshot.challenges[0].id);
        assert_eq!(planned[0].status, ChallengeStatus::Expired);
    }

    #[tokio::test]
    async fn zero_interval_is_rejected_before_ticking() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/sales_ops")
            .unwrap();
        let result = run(pool, EventBus::default(), Duration::from_secs(0), 1000.0).await;
        assert!(result.is_err());
    }

    #[test]
    fn empty_collections_mark_snapshot_empty() {
        let snapshot = Snapshot {
            employees: Vec::new(),
            records: Vec::new(),
            proposals: Vec::new(),
            challenges: vec![challenge(ChallengeStatus::Active, date(2026, 3, 31))],
        };
        assert!(snapshot.is_empty());
    }
}
