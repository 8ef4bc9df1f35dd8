use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::batch::CycleWeek;
use crate::decimal::Money;
use crate::types::{
    FixedDepositId, InvestmentLoanId, LoanId, MemberId, PaymentId, PaymentType,
};

/// all events that can be emitted by ledger operations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // member lifecycle
    MemberCreated {
        member_id: MemberId,
        timestamp: DateTime<Utc>,
    },

    // payment lifecycle
    PaymentSubmitted {
        payment_id: PaymentId,
        member_id: Option<MemberId>,
        amount: Money,
        payment_type: PaymentType,
        timestamp: DateTime<Utc>,
    },
    PaymentConfirmed {
        payment_id: PaymentId,
        amount: Money,
        payment_type: PaymentType,
        timestamp: DateTime<Utc>,
    },
    PaymentRejected {
        payment_id: PaymentId,
        reason: String,
        timestamp: DateTime<Utc>,
    },
    /// legacy non-strict mode only: loan-type payment with no target loan
    AllocationAbsorbed {
        payment_id: PaymentId,
        amount: Money,
        payment_type: PaymentType,
        timestamp: DateTime<Utc>,
    },

    // allocation effects
    SavingsCredited {
        member_id: MemberId,
        amount: Money,
        new_balance: Money,
        timestamp: DateTime<Utc>,
    },
    SavingsWithdrawn {
        member_id: MemberId,
        amount: Money,
        new_balance: Money,
        timestamp: DateTime<Utc>,
    },
    LoanRepaymentApplied {
        loan_id: LoanId,
        amount: Money,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    InvestmentLoanRepaymentApplied {
        loan_id: InvestmentLoanId,
        amount: Money,
        balance_after: Money,
        timestamp: DateTime<Utc>,
    },
    LoanCompleted {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },
    InvestmentLoanCompleted {
        loan_id: InvestmentLoanId,
        timestamp: DateTime<Utc>,
    },

    // penalty settlement
    SavingsPenaltyPaid {
        member_id: MemberId,
        amount: Money,
        records_settled: u32,
        timestamp: DateTime<Utc>,
    },
    LoanPenaltyPaid {
        loan_id: LoanId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // weekly cycle
    InterestApplied {
        loan_id: LoanId,
        amount: Money,
        week_number: u32,
        new_balance: Money,
        first: bool,
    },
    LoanPenaltyAssessed {
        loan_id: LoanId,
        amount: Money,
        week_number: u32,
    },
    SavingsPenaltyAssessed {
        member_id: MemberId,
        amount: Money,
        week: CycleWeek,
    },

    // fixed deposits
    FixedDepositOpened {
        deposit_id: FixedDepositId,
        member_id: MemberId,
        amount: Money,
        maturity_date: chrono::NaiveDate,
    },
    FixedDepositCollected {
        deposit_id: FixedDepositId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },

    // loans
    LoanGranted {
        loan_id: LoanId,
        member_id: MemberId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    InvestmentLoanGranted {
        loan_id: InvestmentLoanId,
        member_id: MemberId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
}

/// event store for collecting events during operations
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}
