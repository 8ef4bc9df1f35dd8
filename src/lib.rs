pub mod batch;
pub mod config;
pub mod decimal;
pub mod errors;
pub mod events;
pub mod interest;
pub mod ledger;
pub mod model;
pub mod payments;
pub mod types;

// re-export key types
pub use batch::{BatchError, BatchReport, CycleWeek};
pub use config::LedgerConfig;
pub use decimal::{Money, Rate};
pub use errors::{LedgerError, Result};
pub use events::{Event, EventStore};
pub use interest::{AccrualEngine, InterestDue};
pub use ledger::{GrantedLoan, Ledger};
pub use model::{
    BankDetails, FixedDeposit, InvestmentLoan, InvestmentLoanPayment, Loan, LoanPayment,
    ManualPayment, Member, OutstandingBalance, PaymentRecord, Savings, SavingsPenalty,
    TransactionRecord,
};
pub use payments::{
    AllocationPlan, AllocationResult, AllocationStep, ConfirmationOutcome, PaymentAllocator,
    PenaltySplitter,
};
pub use types::{
    AllocationBreakdown, Caller, CallerScope, FixedDepositId, GroupId, InvestmentLoanId,
    InvestmentLoanStatus, LoanId, LoanKind, LoanPaymentType, LoanStatus, MemberId, MemberStatus,
    PaymentId, PaymentMethod, PaymentStatus, PaymentType, PenaltyDeduction, PenaltyKind,
    TransactionStatus,
};

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
