use chrono::{Datelike, NaiveDate};

use crate::models::{
    ContractBreakdown, MonthReconciliation, MonthShare, MonthlyGoals, Proposal, ProposalStatus,
    YearReconciliation,
};

/// Every contract is credited with a full year of its monthly value, whatever
/// month it closes in.
pub fn annual_value(proposal: &Proposal) -> f64 {
    proposal.monthly_value * 12.0
}

pub fn closed_in_year(proposals: &[Proposal], year: i32) -> Vec<&Proposal> {
    proposals
        .iter()
        .filter(|p| p.status == ProposalStatus::ClosedWon)
        .filter(|p| p.closing_date.map(|d| d.year() == year).unwrap_or(false))
        .collect()
}

pub fn progress_percentage(actual: f64, target: f64) -> f64 {
    if target <= 0.0 {
        0.0
    } else {
        actual / target * 100.0
    }
}

/// Spreads each contract's annual value over the outstanding monthly deficits,
/// walking forward from its closing month. Display only: headline totals book
/// the full value at the closing month.
pub fn allocate_contracts(goals: &MonthlyGoals, proposals: &[Proposal]) -> Vec<ContractBreakdown> {
    let mut contracts = closed_in_year(proposals, goals.year);
    contracts.sort_by_key(|p| p.closing_date);

    let mut deficits = goals.targets;
    let mut breakdowns = Vec::with_capacity(contracts.len());

    for contract in contracts {
        let Some(closing_date) = contract.closing_date else {
            continue;
        };
        let annual = annual_value(contract);
        let mut remaining = annual;
        let mut shares = Vec::new();

        let mut index = closing_date.month0() as usize;
        while index < 12 && remaining > 0.0 {
            if deficits[index] > 0.0 {
                let amount = remaining.min(deficits[index]);
                deficits[index] -= amount;
                remaining -= amount;
                shares.push(MonthShare {
                    month: index as u32 + 1,
                    amount,
                });
            }
            index += 1;
        }

        breakdowns.push(ContractBreakdown {
            proposal_id: contract.id,
            client_name: contract.client_name.clone(),
            closing_date,
            annual_value: annual,
            shares,
            unallocated: remaining,
        });
    }

    breakdowns
}

pub fn monthly_actuals(proposals: &[Proposal], year: i32) -> [f64; 12] {
    let mut actuals = [0.0; 12];
    for proposal in closed_in_year(proposals, year) {
        if let Some(date) = proposal.closing_date {
            actuals[date.month0() as usize] += annual_value(proposal);
        }
    }
    actuals
}

/// Walks January to December once, carrying unmet deficit forward as a
/// positive carry-in and surplus as a negative one. Months with a zero target
/// never emit carry-over.
pub fn reconcile_year(
    goals: &MonthlyGoals,
    proposals: &[Proposal],
    as_of: NaiveDate,
) -> YearReconciliation {
    let actuals = monthly_actuals(proposals, goals.year);
    let mut months = Vec::with_capacity(12);
    let mut carry_in = 0.0;

    for (index, (&stated_target, &actual)) in goals.targets.iter().zip(actuals.iter()).enumerate() {
        let month = index as u32 + 1;
        let effective_target = (stated_target + carry_in).max(0.0);

        let (surplus, deficit) = if actual >= effective_target {
            (actual - effective_target, 0.0)
        } else {
            (0.0, effective_target - actual)
        };

        let carry_out = if stated_target == 0.0 {
            0.0
        } else if surplus > 0.0 {
            -surplus
        } else {
            deficit
        };

        months.push(MonthReconciliation {
            month,
            stated_target,
            carry_in,
            effective_target,
            actual,
            surplus,
            deficit,
            carry_out,
            is_closed: month_has_ended(goals.year, month, as_of),
        });

        carry_in = carry_out;
    }

    let total_actual: f64 = actuals.iter().sum();
    let total_target: f64 = goals.targets.iter().sum();

    YearReconciliation {
        year: goals.year,
        months,
        total_actual,
        total_target,
        progress_pct: progress_percentage(total_actual, total_target),
    }
}

fn month_has_ended(year: i32, month: u32, as_of: NaiveDate) -> bool {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    match NaiveDate::from_ymd_opt(next_year, next_month, 1) {
        Some(first_of_next) => as_of >= first_of_next,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn won(client: &str, monthly_value: f64, closing: NaiveDate) -> Proposal {
        Proposal {
            id: Uuid::new_v4(),
            client_name: client.to_string(),
            monthly_value,
            total_value: monthly_value * 12.0,
            status: ProposalStatus::ClosedWon,
            closing_date: Some(closing),
            created_on: closing,
            closer_id: Uuid::new_v4(),
            originator_id: None,
        }
    }

    fn goals(targets: [f64; 12]) -> MonthlyGoals {
        MonthlyGoals { year: 2026, targets }
    }

    #[test]
    fn january_deficit_raises_february_target() {
        let mut targets = [0.0; 12];
        targets[0] = 100.0;
        targets[1] = 200.0;
        let result = reconcile_year(&goals(targets), &[], date(2026, 1, 15));

        assert_eq!(result.months[0].deficit, 100.0);
        assert_eq!(result.months[0].carry_out, 100.0);
        assert_eq!(result.months[1].carry_in, 100.0);
        assert_eq!(result.months[1].effective_target, 300.0);
    }

    #[test]
    fn january_surplus_lowers_february_target() {
        let mut targets = [0.0; 12];
        targets[0] = 100.0;
        targets[1] = 30.0;
        // 12.5 * 12 = 150 booked in January
        let proposals = vec![won("Acme", 12.5, date(2026, 1, 20))];
        let result = reconcile_year(&goals(targets), &proposals, date(2026, 3, 1));

        assert_eq!(result.months[0].surplus, 50.0);
        assert_eq!(result.months[0].carry_out, -50.0);
        assert_eq!(result.months[1].effective_target, 0.0);
    }

    #[test]
    fn effective_target_follows_carry_chain() {
        let targets = [100.0, 80.0, 60.0, 0.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0];
        let proposals = vec![
            won("Acme", 10.0, date(2026, 2, 3)),
            won("Globex", 25.0, date(2026, 5, 9)),
            won("Initech", 2.0, date(2026, 4, 1)),
        ];
        let result = reconcile_year(&goals(targets), &proposals, date(2026, 12, 31));

        let mut previous_carry = 0.0;
        for month in &result.months {
            assert_eq!(month.carry_in, previous_carry);
            assert_eq!(
                month.effective_target,
                (month.stated_target + previous_carry).max(0.0)
            );
            previous_carry = month.carry_out;
        }
    }

    #[test]
    fn zero_target_month_emits_no_carry() {
        let mut targets = [100.0; 12];
        targets[2] = 0.0;
        let proposals = vec![won("Acme", 50.0, date(2026, 3, 10))];
        let result = reconcile_year(&goals(targets), &proposals, date(2026, 6, 1));

        assert_eq!(result.months[2].actual, 600.0);
        assert_eq!(result.months[2].carry_out, 0.0);
        assert_eq!(result.months[3].effective_target, 100.0);
    }

    #[test]
    fn headline_totals_match_annualized_contracts() {
        let proposals = vec![
            won("Acme", 10.0, date(2026, 1, 3)),
            won("Globex", 20.0, date(2026, 6, 30)),
            won("Old", 99.0, date(2025, 12, 31)),
            Proposal {
                status: ProposalStatus::Negotiation,
                ..won("Pending", 500.0, date(2026, 2, 2))
            },
        ];
        let result = reconcile_year(&goals([100.0; 12]), &proposals, date(2026, 7, 1));

        let monthly_sum: f64 = result.months.iter().map(|m| m.actual).sum();
        assert_eq!(monthly_sum, 360.0);
        assert_eq!(result.total_actual, 360.0);
        assert_eq!(result.total_target, 1200.0);
        assert!((result.progress_pct - 30.0).abs() < 1e-9);
    }

    #[test]
    fn zero_annual_target_reports_zero_progress() {
        let proposals = vec![won("Acme", 10.0, date(2026, 1, 3))];
        let result = reconcile_year(&goals([0.0; 12]), &proposals, date(2026, 7, 1));
        assert_eq!(result.progress_pct, 0.0);
    }

    #[test]
    fn greedy_spread_fills_deficits_forward() {
        let mut targets = [0.0; 12];
        targets[0] = 100.0;
        targets[1] = 100.0;
        targets[2] = 100.0;
        let proposals = vec![
            // 20 * 12 = 240 closing in January
            won("Acme", 20.0, date(2026, 1, 5)),
            // 10 * 12 = 120 closing in February
            won("Globex", 10.0, date(2026, 2, 1)),
        ];
        let breakdowns = allocate_contracts(&goals(targets), &proposals);

        assert_eq!(breakdowns.len(), 2);
        assert_eq!(
            breakdowns[0].shares,
            vec![
                MonthShare { month: 1, amount: 100.0 },
                MonthShare { month: 2, amount: 100.0 },
                MonthShare { month: 3, amount: 40.0 },
            ]
        );
        assert_eq!(breakdowns[0].unallocated, 0.0);
        assert_eq!(breakdowns[1].shares, vec![MonthShare { month: 3, amount: 60.0 }]);
        assert_eq!(breakdowns[1].unallocated, 60.0);
    }

    #[test]
    fn greedy_spread_orders_by_closing_date() {
        let mut targets = [0.0; 12];
        targets[5] = 120.0;
        let proposals = vec![
            won("Late", 10.0, date(2026, 6, 20)),
            won("Early", 10.0, date(2026, 6, 2)),
        ];
        let breakdowns = allocate_contracts(&goals(targets), &proposals);
        assert_eq!(breakdowns[0].client_name, "Early");
        assert_eq!(breakdowns[0].shares.len(), 1);
        assert!(breakdowns[1].shares.is_empty());
        assert_eq!(breakdowns[1].unallocated, 120.0);
    }

    #[test]
    fn closed_months_follow_as_of() {
        let result = reconcile_year(&goals([10.0; 12]), &[], date(2026, 3, 1));
        assert!(result.months[0].is_closed);
        assert!(result.months[1].is_closed);
        assert!(!result.months[2].is_closed);
        assert!(!result.months[11].is_closed);
    }
}
