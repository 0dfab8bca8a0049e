use std::fmt::Write;

use chrono::NaiveDate;

use crate::challenge;
use crate::models::{
    Challenge, ContractBreakdown, Employee, Proposal, WeeklyPerformanceRecord, YearReconciliation,
};

const MONTH_NAMES: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

pub fn month_name(month: u32) -> &'static str {
    month
        .checked_sub(1)
        .and_then(|index| MONTH_NAMES.get(index as usize))
        .copied()
        .unwrap_or("?")
}

pub fn render_goals(reconciliation: &YearReconciliation) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "## Monthly Goals {}", reconciliation.year);
    let _ = writeln!(
        output,
        "Realized {:.2} of {:.2} ({:.1}%)",
        reconciliation.total_actual, reconciliation.total_target, reconciliation.progress_pct
    );
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "| Month | Target | Carry-in | Effective | Actual | Surplus | Deficit | Carry-out | Closed |"
    );
    let _ = writeln!(output, "|---|---|---|---|---|---|---|---|---|");

    for month in &reconciliation.months {
        let _ = writeln!(
            output,
            "| {} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {:.2} | {} |",
            month_name(month.month),
            month.stated_target,
            month.carry_in,
            month.effective_target,
            month.actual,
            month.surplus,
            month.deficit,
            month.carry_out,
            if month.is_closed { "yes" } else { "no" }
        );
    }

    output
}

pub fn render_breakdowns(breakdowns: &[ContractBreakdown]) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Contract Allocation");

    if breakdowns.is_empty() {
        let _ = writeln!(output, "No closed contracts this year.");
        return output;
    }

    for breakdown in breakdowns {
        let spread = breakdown
            .shares
            .iter()
            .map(|share| format!("{} {:.2}", month_name(share.month), share.amount))
            .collect::<Vec<_>>()
            .join(", ");
        let _ = writeln!(
            output,
            "- {} (closed {}): {:.2} annual -> {}{}",
            breakdown.client_name,
            breakdown.closing_date,
            breakdown.annual_value,
            if spread.is_empty() { "no open deficit" } else { spread.as_str() },
            if breakdown.unallocated > 0.0 {
                format!(" (unallocated {:.2})", breakdown.unallocated)
            } else {
                String::new()
            }
        );
    }

    output
}

pub fn render_challenges(
    challenges: &[Challenge],
    employees: &[Employee],
    records: &[WeeklyPerformanceRecord],
    proposals: &[Proposal],
    as_of: NaiveDate,
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "## Challenges");

    if challenges.is_empty() {
        let _ = writeln!(output, "No challenges configured.");
        return output;
    }

    for c in challenges {
        let progress = challenge::evaluate_progress(c, employees, records, proposals, None);
        let _ = writeln!(output);
        let _ = writeln!(output, "### {} [{}]", c.title, c.status);
        if !c.description.is_empty() {
            let _ = writeln!(output, "{}", c.description);
        }
        let _ = writeln!(
            output,
            "{} {} to {}, prize: {}",
            c.target_type, c.start_date, c.end_date, c.prize
        );
        let _ = writeln!(
            output,
            "Progress {:.2} / {:.2} ({:.1}%), {} days remaining",
            progress,
            c.target_value,
            challenge::progress_percentage(progress, c.target_value),
            challenge::days_remaining(c, as_of)
        );

        let board = challenge::leaderboard(c, employees, records, proposals);
        for (rank, row) in board.iter().take(10).enumerate() {
            let _ = writeln!(output, "{}. {} {:.2}", rank + 1, row.employee_name, row.value);
        }
    }

    output
}

pub fn build_report(
    as_of: NaiveDate,
    reconciliation: &YearReconciliation,
    breakdowns: &[ContractBreakdown],
    challenges: &[Challenge],
    employees: &[Employee],
    records: &[WeeklyPerformanceRecord],
    proposals: &[Proposal],
) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "# Sales Operations Report");
    let _ = writeln!(output, "Generated as of {}", as_of);
    let _ = writeln!(output);
    output.push_str(&render_goals(reconciliation));
    let _ = writeln!(output);
    output.push_str(&render_breakdowns(breakdowns));
    let _ = writeln!(output);
    output.push_str(&render_challenges(challenges, employees, records, proposals, as_of));
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::goals;
    use crate::models::{ChallengeStatus, MonthlyGoals, ProposalStatus, Role, TargetType};
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn month_names_cover_the_year() {
        assert_eq!(month_name(1), "Jan");
        assert_eq!(month_name(12), "Dec");
        assert_eq!(month_name(0), "?");
        assert_eq!(month_name(13), "?");
    }

    #[test]
    fn report_lists_goals_contracts_and_leaderboard() {
        let seller = Employee {
            id: Uuid::new_v4(),
            full_name: "Marina Alves".to_string(),
            email: "marina@example.com".to_string(),
            role: Role::Seller,
        };
        let proposals = vec![Proposal {
            id: Uuid::new_v4(),
            client_name: "Padaria Sol".to_string(),
            monthly_value: 100.0,
            total_value: 1200.0,
            status: ProposalStatus::ClosedWon,
            closing_date: Some(date(2026, 2, 10)),
            created_on: date(2026, 1, 15),
            closer_id: seller.id,
            originator_id: None,
        }];
        let challenges = vec![Challenge {
            id: Uuid::new_v4(),
            title: "February sales".to_string(),
            description: String::new(),
            start_date: date(2026, 2, 1),
            end_date: date(2026, 2, 28),
            prize: "Trip".to_string(),
            target_type: TargetType::Sales,
            target_value: 2400.0,
            status: ChallengeStatus::Active,
            participant_ids: Vec::new(),
            winner_ids: Vec::new(),
            completed_at: None,
        }];
        let monthly = MonthlyGoals::with_default(2026, 500.0);
        let as_of = date(2026, 2, 20);
        let reconciliation = goals::reconcile_year(&monthly, &proposals, as_of);
        let breakdowns = goals::allocate_contracts(&monthly, &proposals);
        let employees = vec![seller];

        let report = build_report(
            as_of,
            &reconciliation,
            &breakdowns,
            &challenges,
            &employees,
            &[],
            &proposals,
        );

        assert!(report.contains("| Feb | 500.00 | 500.00 | 1000.00 | 1200.00 | 200.00 | 0.00 | -200.00 | no |"));
        assert!(report.contains("Padaria Sol (closed 2026-02-10): 1200.00 annual -> Feb 500.00, Mar 500.00, Apr 200.00"));
        assert!(report.contains("Progress 1200.00 / 2400.00 (50.0%), 8 days remaining"));
        assert!(report.contains("1. Marina Alves 1200.00"));
    }
}
