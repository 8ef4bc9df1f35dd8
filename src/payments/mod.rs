pub mod allocator;
pub mod splitter;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::model::ManualPayment;
use crate::types::{
    AllocationBreakdown, FixedDepositId, InvestmentLoanId, LoanId, MemberId, PaymentId,
};

pub use allocator::PaymentAllocator;
pub use splitter::PenaltySplitter;

/// one balance mutation to perform at commit time
///
/// plans are computed against a read-only view of the ledger and applied
/// infallibly afterwards, so a failed confirmation mutates nothing
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationStep {
    SettleSavingsPenalties {
        member_id: MemberId,
        amount: Money,
        record_ids: Vec<Uuid>,
    },
    SettleLoanPenalty {
        loan_id: LoanId,
        amount: Money,
        record_ids: Vec<Uuid>,
    },
    RepayLoan {
        loan_id: LoanId,
        amount: Money,
    },
    RepayInvestmentLoan {
        loan_id: InvestmentLoanId,
        amount: Money,
    },
    CreditSavings {
        member_id: MemberId,
        amount: Money,
    },
    OpenFixedDeposit {
        member_id: MemberId,
        amount: Money,
    },
    /// legacy non-strict mode: loan-type payment with no eligible target
    Absorb {
        amount: Money,
    },
}

/// full mutation plan for one payment confirmation
#[derive(Debug, Clone, PartialEq)]
pub struct AllocationPlan {
    pub steps: Vec<AllocationStep>,
    pub breakdown: AllocationBreakdown,
    /// remainder that found no balance to land on; kept by the society,
    /// never refunded
    pub excess_unapplied: Money,
}

/// balances touched while applying an allocation plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct AllocationResult {
    pub payment_id: PaymentId,
    pub breakdown: AllocationBreakdown,
    pub excess_unapplied: Money,
    pub loans_updated: Vec<LoanId>,
    pub loans_completed: Vec<LoanId>,
    pub investment_loans_updated: Vec<InvestmentLoanId>,
    pub investment_loans_completed: Vec<InvestmentLoanId>,
    pub savings_balance: Option<Money>,
    pub fixed_deposit_id: Option<FixedDepositId>,
}

/// confirmation result handed back to the admin layer
#[derive(Debug, Clone)]
pub struct ConfirmationOutcome {
    pub payment: ManualPayment,
    pub allocation: AllocationResult,
}
