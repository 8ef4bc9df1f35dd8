use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::decimal::{Money, Rate};

/// ledger-wide policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// interest charged on regular loans each accrual cycle (2%)
    pub loan_interest_rate: Rate,
    /// weeks between interest applications (4)
    pub accrual_cycle_weeks: u32,
    /// flat penalty per missed weekly loan repayment
    pub loan_penalty: Money,
    /// flat penalty per missed weekly savings contribution
    pub savings_penalty: Money,
    /// trailing window used by missed-payment checks
    pub missed_payment_window_days: i64,
    /// minimum accepted payment amount
    pub minimum_payment: Money,
    /// default rate for fixed deposits opened by payment allocation
    pub fixed_deposit_rate: Rate,
    /// default fixed deposit term in months
    pub fixed_deposit_months: u32,
    /// fail confirmation when a loan-type payment has no eligible target;
    /// false restores the legacy absorb-silently behavior
    pub strict_allocation: bool,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            loan_interest_rate: Rate::from_decimal(dec!(0.02)),
            accrual_cycle_weeks: 4,
            loan_penalty: Money::from_major(2500),
            savings_penalty: Money::from_major(500),
            missed_payment_window_days: 7,
            minimum_payment: Money::from_major(1100),
            fixed_deposit_rate: Rate::from_percentage(5),
            fixed_deposit_months: 12,
            strict_allocation: true,
        }
    }
}
