use serde::{Deserialize, Serialize};

use crate::config::LedgerConfig;
use crate::decimal::{Money, Rate};
use crate::model::Loan;

/// interest due on a loan for the current cycle week
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterestDue {
    pub amount: Money,
    pub week_number: u32,
    /// true for the week-4 application computed on amount_granted
    pub first: bool,
}

/// accrual engine for regular loans
///
/// evaluated once per weekly cycle, after the loan's interest_weeks counter
/// has been incremented; the first/subsequent branches are mutually exclusive
/// within one run via the first_interest_applied flag
pub struct AccrualEngine {
    pub rate: Rate,
    pub cycle_weeks: u32,
    pub weekly_penalty: Money,
}

impl AccrualEngine {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            rate: config.loan_interest_rate,
            cycle_weeks: config.accrual_cycle_weeks,
            weekly_penalty: config.loan_penalty,
        }
    }

    /// interest transition for this week, if any
    ///
    /// first application: week == cycle, computed on amount_granted;
    /// subsequent applications: every cycle boundary after the first,
    /// computed on the current remaining balance
    pub fn interest_due(&self, loan: &Loan) -> Option<InterestDue> {
        if loan.interest_weeks == self.cycle_weeks && !loan.first_interest_applied {
            let amount = loan.amount_granted.apply_rate(self.rate);
            if amount > Money::ZERO {
                return Some(InterestDue {
                    amount,
                    week_number: loan.interest_weeks,
                    first: true,
                });
            }
        } else if loan.first_interest_applied
            && loan.interest_weeks >= self.cycle_weeks
            && loan.interest_weeks % self.cycle_weeks == 0
        {
            let amount = loan.remaining_balance.apply_rate(self.rate);
            if amount > Money::ZERO {
                return Some(InterestDue {
                    amount,
                    week_number: loan.interest_weeks,
                    first: false,
                });
            }
        }
        None
    }

    /// flat penalty assessed when no repayment landed in the trailing window
    ///
    /// runs independently of interest, every cycle, regular loans only
    pub fn penalty_due(&self, repaid_this_week: bool) -> Option<Money> {
        if repaid_this_week {
            None
        } else {
            Some(self.weekly_penalty)
        }
    }
}
