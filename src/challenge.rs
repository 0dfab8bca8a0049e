//! Challenge progress evaluation.
//!
//! Everything here is a pure read over already-fetched collections. Status
//! promotion is decided by [`next_transition`] but written back by the
//! watcher, never by the evaluator itself.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{
    Challenge, ChallengeStatus, Contribution, Employee, Proposal, ProposalStatus, Role,
    StatusTransition, TargetType, WeeklyPerformanceRecord,
};

/// An explicit participant list is authoritative, admins included. Otherwise
/// every non-admin employee takes part. `narrow_to` intersects the result with
/// a single id.
pub fn resolve_participants(
    challenge: &Challenge,
    employees: &[Employee],
    narrow_to: Option<Uuid>,
) -> BTreeSet<Uuid> {
    let mut participants: BTreeSet<Uuid> = if challenge.participant_ids.is_empty() {
        employees
            .iter()
            .filter(|e| e.role != Role::Admin)
            .map(|e| e.id)
            .collect()
    } else {
        challenge.participant_ids.iter().copied().collect()
    };

    if let Some(id) = narrow_to {
        participants.retain(|p| *p == id);
    }

    participants
}

pub fn evaluate_progress(
    challenge: &Challenge,
    employees: &[Employee],
    records: &[WeeklyPerformanceRecord],
    proposals: &[Proposal],
    narrow_to: Option<Uuid>,
) -> f64 {
    let participants = resolve_participants(challenge, employees, narrow_to);

    let field: fn(&WeeklyPerformanceRecord) -> f64 = match &challenge.target_type {
        TargetType::Sales => return sales_total(challenge, proposals, &participants),
        TargetType::Points => |r| r.total_points,
        TargetType::Mql => |r| r.mql as f64,
        TargetType::VisitsScheduled => |r| r.visits_scheduled as f64,
        TargetType::ContractsSigned => |r| r.contracts_signed as f64,
        TargetType::EducationPoints => |r| r.education_points as f64,
        TargetType::Unrecognized(tag) => {
            tracing::warn!(challenge = %challenge.id, target_type = %tag, "unrecognized target type, progress reported as zero");
            return 0.0;
        }
    };

    records
        .iter()
        .filter(|r| challenge.contains(r.week_ending))
        .filter(|r| participants.contains(&r.employee_id))
        .map(field)
        .sum()
}

fn sales_total(challenge: &Challenge, proposals: &[Proposal], participants: &BTreeSet<Uuid>) -> f64 {
    proposals
        .iter()
        .filter(|p| p.status == ProposalStatus::ClosedWon)
        .filter(|p| challenge.contains(p.closing_date.unwrap_or(p.created_on)))
        .filter(|p| {
            participants.contains(&p.closer_id)
                || p.originator_id.map(|id| participants.contains(&id)).unwrap_or(false)
        })
        .map(|p| p.total_value)
        .sum()
}

pub fn progress_percentage(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (value / target * 100.0).min(100.0)
}

/// Resolved participants in input order: the explicit list as given, or the
/// roster order. Duplicates are dropped.
fn participants_in_order(challenge: &Challenge, employees: &[Employee]) -> Vec<Uuid> {
    let resolved = resolve_participants(challenge, employees, None);
    let source: Vec<Uuid> = if challenge.participant_ids.is_empty() {
        employees.iter().map(|e| e.id).collect()
    } else {
        challenge.participant_ids.clone()
    };

    let mut seen = BTreeSet::new();
    source
        .into_iter()
        .filter(|id| resolved.contains(id) && seen.insert(*id))
        .collect()
}

/// Per-participant contributions, highest first. Ties keep participant order.
pub fn leaderboard(
    challenge: &Challenge,
    employees: &[Employee],
    records: &[WeeklyPerformanceRecord],
    proposals: &[Proposal],
) -> Vec<Contribution> {
    let names: HashMap<Uuid, &str> = employees
        .iter()
        .map(|e| (e.id, e.full_name.as_str()))
        .collect();

    let mut rows: Vec<Contribution> = participants_in_order(challenge, employees)
        .into_iter()
        .map(|id| Contribution {
            employee_id: id,
            employee_name: names
                .get(&id)
                .map(|name| name.to_string())
                .unwrap_or_else(|| id.to_string()),
            value: evaluate_progress(challenge, employees, records, proposals, Some(id)),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.value
            .partial_cmp(&a.value)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    rows
}

pub fn days_remaining(challenge: &Challenge, as_of: NaiveDate) -> i64 {
    (challenge.end_date - as_of).num_days().max(0)
}

/// Decides the status promotion for one challenge as of `as_of`. Terminal
/// challenges never transition again.
pub fn next_transition(
    challenge: &Challenge,
    employees: &[Employee],
    records: &[WeeklyPerformanceRecord],
    proposals: &[Proposal],
    as_of: DateTime<Utc>,
) -> Option<StatusTransition> {
    if challenge.status.is_terminal() {
        return None;
    }

    let progress = evaluate_progress(challenge, employees, records, proposals, None);
    if progress >= challenge.target_value {
        return Some(StatusTransition {
            challenge_id: challenge.id,
            status: ChallengeStatus::Completed,
            completed_at: Some(as_of),
            winner_ids: top_contributors(&leaderboard(challenge, employees, records, proposals)),
        });
    }

    if as_of.date_naive() > challenge.end_date {
        return Some(StatusTransition {
            challenge_id: challenge.id,
            status: ChallengeStatus::Expired,
            completed_at: None,
            winner_ids: Vec::new(),
        });
    }

    None
}

fn top_contributors(board: &[Contribution]) -> Vec<Uuid> {
    let Some(best) = board.first().map(|c| c.value) else {
        return Vec::new();
    };
    if best <= 0.0 {
        return Vec::new();
    }
    board
        .iter()
        .take_while(|c| c.value == best)
        .map(|c| c.employee_id)
        .collect()
}
