use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;

/// unique identifier for a member
pub type MemberId = Uuid;

/// unique identifier for a cooperative group (managed externally)
pub type GroupId = Uuid;

/// unique identifier for a regular loan
pub type LoanId = Uuid;

/// unique identifier for an investment loan
pub type InvestmentLoanId = Uuid;

/// unique identifier for a manual payment
pub type PaymentId = Uuid;

/// unique identifier for a fixed deposit
pub type FixedDepositId = Uuid;

/// member status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MemberStatus {
    Pending,
    Active,
    Inactive,
}

/// regular loan status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanStatus {
    /// granted but not yet active
    Pending,
    /// accruing interest, accepting repayments
    Active,
    /// fully repaid, balance pinned at zero
    Completed,
    /// written off
    Defaulted,
}

/// investment loan status (no interest, no penalties)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestmentLoanStatus {
    Active,
    Completed,
    Defaulted,
}

/// loan product selector for grant operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoanKind {
    Regular,
    Investment,
}

/// declared purpose of a manual payment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    /// membership registration fee, no ledger effect
    Registration,
    /// credit to the member's savings balance
    Savings,
    /// repayment against regular loans, oldest first
    OutstandingBalance,
    /// repayment against investment loans, oldest first
    InvestmentLoan,
    /// opens a new fixed deposit
    FixedDeposit,
}

/// manual payment lifecycle, one-way pending -> {confirmed, rejected}
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Confirmed,
    Rejected,
}

/// kind of event recorded against a regular loan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanPaymentType {
    Repayment,
    Interest,
    Penalty,
}

/// how a payment record entered the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Manual,
}

/// transaction ledger entry status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// caller scope for permission checks; role derivation lives outside the core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerScope {
    /// superadmin: every group
    AllGroups,
    /// group admin: exactly one group
    Group(GroupId),
}

impl CallerScope {
    /// check whether this scope covers the given group
    pub fn covers(&self, group: Option<GroupId>) -> bool {
        match self {
            CallerScope::AllGroups => true,
            CallerScope::Group(own) => group.map(|g| g == *own).unwrap_or(false),
        }
    }
}

/// pre-authorized caller context handed in by the auth collaborator
#[derive(Debug, Clone, Copy)]
pub struct Caller {
    pub user_id: Uuid,
    pub scope: CallerScope,
}

impl Caller {
    pub fn superadmin(user_id: Uuid) -> Self {
        Self {
            user_id,
            scope: CallerScope::AllGroups,
        }
    }

    pub fn group_admin(user_id: Uuid, group: GroupId) -> Self {
        Self {
            user_id,
            scope: CallerScope::Group(group),
        }
    }
}

/// one slice of a penalty-first payment split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PenaltyDeduction {
    pub kind: PenaltyKind,
    pub amount: Money,
    pub records_settled: u32,
}

/// which pending-penalty bucket a deduction came out of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PenaltyKind {
    Savings,
    Loan,
}

/// penalty/purpose breakdown computed by the splitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AllocationBreakdown {
    pub original_amount: Money,
    pub penalties_deducted: Money,
    pub remainder_applied: Money,
    pub deductions: Vec<PenaltyDeduction>,
}

impl AllocationBreakdown {
    pub fn total(&self) -> Money {
        self.penalties_deducted + self.remainder_applied
    }
}
