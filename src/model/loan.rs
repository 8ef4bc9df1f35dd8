use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{
    GroupId, InvestmentLoanId, InvestmentLoanStatus, LoanId, LoanPaymentType, LoanStatus,
    MemberId, PaymentId,
};

/// regular loan: 2%/4-week compounding interest, weekly late penalty
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub member_id: MemberId,
    pub group_id: Option<GroupId>,
    /// original ask
    pub amount: Money,
    /// actually disbursed
    pub amount_granted: Money,
    /// reduced only by repayment allocation, increased only by interest
    pub remaining_balance: Money,
    /// weekly batch counter driving the accrual cycle
    pub interest_weeks: u32,
    /// one-way false -> true on the first interest application
    pub first_interest_applied: bool,
    pub total_interest_added: Money,
    pub pending_penalty: Money,
    pub total_penalties_paid: Money,
    pub purpose: String,
    pub status: LoanStatus,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl Loan {
    pub fn grant(
        member_id: MemberId,
        group_id: Option<GroupId>,
        amount: Money,
        purpose: String,
        granted_by: Uuid,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            group_id,
            amount,
            amount_granted: amount,
            remaining_balance: amount,
            interest_weeks: 0,
            first_interest_applied: false,
            total_interest_added: Money::ZERO,
            pending_penalty: Money::ZERO,
            total_penalties_paid: Money::ZERO,
            purpose,
            status: LoanStatus::Active,
            granted_by,
            granted_at: now,
            created_at: now,
            seq,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    /// eligible target for an outstanding_balance payment
    pub fn accepts_repayment(&self) -> bool {
        self.is_active() && self.remaining_balance > Money::ZERO
    }

    /// deduct a repayment, clamping at zero and completing when paid off
    ///
    /// returns the amount actually applied
    pub fn apply_repayment(&mut self, amount: Money) -> Money {
        let applied = amount.min(self.remaining_balance);
        self.remaining_balance -= applied;
        if self.remaining_balance <= Money::ZERO {
            self.remaining_balance = Money::ZERO;
            self.status = LoanStatus::Completed;
        }
        applied
    }

    /// capitalize interest into the balance
    pub fn add_interest(&mut self, amount: Money) {
        self.remaining_balance += amount;
        self.total_interest_added += amount;
    }

    /// move an amount from pending to paid penalties
    pub fn settle_penalty(&mut self, amount: Money) {
        self.pending_penalty -= amount;
        self.total_penalties_paid += amount;
    }
}

/// investment loan: zero interest, zero penalties, repayment only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentLoan {
    pub id: InvestmentLoanId,
    pub member_id: MemberId,
    pub group_id: Option<GroupId>,
    pub amount: Money,
    /// decreases only via repayment
    pub outstanding_balance: Money,
    pub purpose: String,
    pub status: InvestmentLoanStatus,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl InvestmentLoan {
    pub fn grant(
        member_id: MemberId,
        group_id: Option<GroupId>,
        amount: Money,
        purpose: String,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            group_id,
            amount,
            outstanding_balance: amount,
            purpose,
            status: InvestmentLoanStatus::Active,
            created_at: now,
            seq,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == InvestmentLoanStatus::Active
    }

    pub fn accepts_repayment(&self) -> bool {
        self.is_active() && self.outstanding_balance > Money::ZERO
    }

    pub fn apply_repayment(&mut self, amount: Money) -> Money {
        let applied = amount.min(self.outstanding_balance);
        self.outstanding_balance -= applied;
        if self.outstanding_balance <= Money::ZERO {
            self.outstanding_balance = Money::ZERO;
            self.status = InvestmentLoanStatus::Completed;
        }
        applied
    }
}

/// immutable audit record per allocation event against a regular loan
///
/// repayment and interest rows are born settled; penalty rows start pending
/// and flip once when the penalty is paid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanPayment {
    pub id: Uuid,
    pub loan_id: LoanId,
    pub manual_payment_id: Option<PaymentId>,
    pub amount: Money,
    pub payment_type: LoanPaymentType,
    pub week_number: Option<u32>,
    pub is_pending: bool,
    pub paid_amount: Option<Money>,
    pub paid_date: Option<DateTime<Utc>>,
    /// loan balance snapshot after this event
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl LoanPayment {
    pub fn repayment(
        loan_id: LoanId,
        manual_payment_id: Option<PaymentId>,
        amount: Money,
        balance_after: Money,
        description: String,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            manual_payment_id,
            amount,
            payment_type: LoanPaymentType::Repayment,
            week_number: None,
            is_pending: false,
            paid_amount: None,
            paid_date: None,
            balance_after,
            description,
            created_at: now,
            seq,
        }
    }

    pub fn interest(
        loan_id: LoanId,
        amount: Money,
        week_number: u32,
        balance_after: Money,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            manual_payment_id: None,
            amount,
            payment_type: LoanPaymentType::Interest,
            week_number: Some(week_number),
            is_pending: false,
            paid_amount: None,
            paid_date: None,
            balance_after,
            description: "Interest applied to loan balance".to_string(),
            created_at: now,
            seq,
        }
    }

    pub fn penalty(
        loan_id: LoanId,
        amount: Money,
        week_number: u32,
        balance_after: Money,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            manual_payment_id: None,
            amount,
            payment_type: LoanPaymentType::Penalty,
            week_number: Some(week_number),
            is_pending: true,
            paid_amount: None,
            paid_date: None,
            balance_after,
            description: "Weekly penalty for missed loan payment".to_string(),
            created_at: now,
            seq,
        }
    }

    pub fn mark_paid(&mut self, amount: Money, now: DateTime<Utc>) {
        self.is_pending = false;
        self.paid_amount = Some(amount);
        self.paid_date = Some(now);
    }
}

/// audit record per repayment against an investment loan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvestmentLoanPayment {
    pub id: Uuid,
    pub loan_id: InvestmentLoanId,
    pub manual_payment_id: Option<PaymentId>,
    pub amount: Money,
    pub balance_after: Money,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl InvestmentLoanPayment {
    pub fn repayment(
        loan_id: InvestmentLoanId,
        manual_payment_id: Option<PaymentId>,
        amount: Money,
        balance_after: Money,
        description: String,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            manual_payment_id,
            amount,
            balance_after,
            description,
            created_at: now,
            seq,
        }
    }
}
