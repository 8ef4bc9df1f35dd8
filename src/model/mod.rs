pub mod deposit;
pub mod loan;
pub mod member;
pub mod payment;

pub use deposit::FixedDeposit;
pub use loan::{InvestmentLoan, InvestmentLoanPayment, Loan, LoanPayment};
pub use member::{Member, OutstandingBalance, Savings, SavingsPenalty};
pub use payment::{BankDetails, ManualPayment, PaymentRecord, TransactionRecord};
