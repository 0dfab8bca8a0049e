use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error, PartialEq)]
pub enum ChallengeError {
    #[error("challenge end date {end} must be after start date {start}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("challenge target value must be positive, got {0}")]
    NonPositiveTarget(f64),

    #[error("unknown challenge status '{0}'")]
    UnknownStatus(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    Seller,
    Sdr,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Seller => "seller",
            Role::Sdr => "sdr",
        }
    }
}

impl FromStr for Role {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(Role::Admin),
            "manager" => Ok(Role::Manager),
            "seller" => Ok(Role::Seller),
            "sdr" => Ok(Role::Sdr),
            other => Err(anyhow::anyhow!("unknown employee role '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Employee {
    pub id: Uuid,
    pub full_name: String,
    pub email: String,
    pub role: Role,
}

/// One row per (employee, week ending date). Re-submitting the same pair
/// overwrites the stored counters.
#[derive(Debug, Clone, PartialEq)]
pub struct WeeklyPerformanceRecord {
    pub employee_id: Uuid,
    pub week_ending: NaiveDate,
    pub education_points: i32,
    pub proposals_presented: i32,
    pub contracts_signed: i32,
    pub mql: i32,
    pub visits_scheduled: i32,
    pub total_points: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalStatus {
    Open,
    Negotiation,
    ClosedWon,
    ClosedLost,
}

impl ProposalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Open => "open",
            ProposalStatus::Negotiation => "negotiation",
            ProposalStatus::ClosedWon => "closed_won",
            ProposalStatus::ClosedLost => "closed_lost",
        }
    }
}

impl FromStr for ProposalStatus {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(ProposalStatus::Open),
            "negotiation" => Ok(ProposalStatus::Negotiation),
            "closed_won" => Ok(ProposalStatus::ClosedWon),
            "closed_lost" => Ok(ProposalStatus::ClosedLost),
            other => Err(anyhow::anyhow!("unknown proposal status '{other}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Proposal {
    pub id: Uuid,
    pub client_name: String,
    pub monthly_value: f64,
    pub total_value: f64,
    pub status: ProposalStatus,
    pub closing_date: Option<NaiveDate>,
    pub created_on: NaiveDate,
    pub closer_id: Uuid,
    pub originator_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TargetType {
    Points,
    Sales,
    Mql,
    VisitsScheduled,
    ContractsSigned,
    EducationPoints,
    /// Stored tag that matches none of the known metrics.
    Unrecognized(String),
}

impl TargetType {
    pub fn parse(tag: &str) -> Self {
        match tag {
            "points" => TargetType::Points,
            "sales" => TargetType::Sales,
            "mql" => TargetType::Mql,
            "visitas_agendadas" => TargetType::VisitsScheduled,
            "contratos_assinados" => TargetType::ContractsSigned,
            "pontos_educacao" => TargetType::EducationPoints,
            other => TargetType::Unrecognized(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TargetType::Points => "points",
            TargetType::Sales => "sales",
            TargetType::Mql => "mql",
            TargetType::VisitsScheduled => "visitas_agendadas",
            TargetType::ContractsSigned => "contratos_assinados",
            TargetType::EducationPoints => "pontos_educacao",
            TargetType::Unrecognized(tag) => tag,
        }
    }
}

impl fmt::Display for TargetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeStatus {
    Active,
    Completed,
    Expired,
}

impl ChallengeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeStatus::Active => "active",
            ChallengeStatus::Completed => "completed",
            ChallengeStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChallengeStatus::Active)
    }
}

impl FromStr for ChallengeStatus {
    type Err = ChallengeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "active" => Ok(ChallengeStatus::Active),
            "completed" => Ok(ChallengeStatus::Completed),
            "expired" => Ok(ChallengeStatus::Expired),
            other => Err(ChallengeError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Challenge {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub prize: String,
    pub target_type: TargetType,
    pub target_value: f64,
    pub status: ChallengeStatus,
    /// Empty means every non-admin employee takes part.
    pub participant_ids: Vec<Uuid>,
    pub winner_ids: Vec<Uuid>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Challenge {
    pub fn validate(&self) -> Result<(), ChallengeError> {
        if self.end_date <= self.start_date {
            return Err(ChallengeError::InvalidWindow {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if self.target_value <= 0.0 {
            return Err(ChallengeError::NonPositiveTarget(self.target_value));
        }
        Ok(())
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyGoals {
    pub year: i32,
    pub targets: [f64; 12],
}

impl MonthlyGoals {
    pub fn with_default(year: i32, value: f64) -> Self {
        Self {
            year,
            targets: [value; 12],
        }
    }

    pub fn config_type(year: i32) -> String {
        format!("monthly_goals_{year}")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthShare {
    pub month: u32,
    pub amount: f64,
}

/// How one contract's annualized value was spread over monthly deficits.
#[derive(Debug, Clone)]
pub struct ContractBreakdown {
    pub proposal_id: Uuid,
    pub client_name: String,
    pub closing_date: NaiveDate,
    pub annual_value: f64,
    pub shares: Vec<MonthShare>,
    pub unallocated: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthReconciliation {
    pub month: u32,
    pub stated_target: f64,
    pub carry_in: f64,
    pub effective_target: f64,
    pub actual: f64,
    pub surplus: f64,
    pub deficit: f64,
    pub carry_out: f64,
    pub is_closed: bool,
}

#[derive(Debug, Clone)]
pub struct YearReconciliation {
    pub year: i32,
    pub months: Vec<MonthReconciliation>,
    pub total_actual: f64,
    pub total_target: f64,
    pub progress_pct: f64,
}

#[derive(Debug, Clone)]
pub struct Contribution {
    pub employee_id: Uuid,
    pub employee_name: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub challenge_id: Uuid,
    pub status: ChallengeStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub winner_ids: Vec<Uuid>,
}
