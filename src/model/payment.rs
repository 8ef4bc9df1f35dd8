use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{
    GroupId, MemberId, PaymentId, PaymentMethod, PaymentStatus, PaymentType, TransactionStatus,
};

/// bank-transfer details attached to a manual payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BankDetails {
    pub bank_name: String,
    pub transaction_reference: String,
    pub transfer_date: Option<NaiveDate>,
}

/// manual payment intake record
///
/// status is one-way pending -> {confirmed, rejected}; confirmation is the
/// single point where balances mutate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManualPayment {
    pub id: PaymentId,
    /// absent only for registration payments submitted before member creation
    pub member_id: Option<MemberId>,
    pub group_id: Option<GroupId>,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub reference_number: String,
    pub bank_details: BankDetails,
    /// set by the penalty-aware path: confirmation runs the splitter first
    pub split_penalties: bool,
    /// estimated penalty breakdown captured at submission, for audit
    pub penalty_details: Option<Value>,
    /// estimated purpose application captured at submission, for audit
    pub applied_to_purpose: Option<Value>,
    /// idempotency guard set at the end of allocation
    pub processed: bool,
    pub admin_notes: String,
    pub confirmed_by: Option<Uuid>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl ManualPayment {
    pub fn submit(
        member_id: Option<MemberId>,
        group_id: Option<GroupId>,
        amount: Money,
        payment_type: PaymentType,
        bank_details: BankDetails,
        now: DateTime<Utc>,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            member_id,
            group_id,
            amount,
            payment_type,
            status: PaymentStatus::Pending,
            reference_number: reference_number(id, now),
            bank_details,
            split_penalties: false,
            penalty_details: None,
            applied_to_purpose: None,
            processed: false,
            admin_notes: String::new(),
            confirmed_by: None,
            confirmed_at: None,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn confirm(&mut self, confirmed_by: Uuid, now: DateTime<Utc>) {
        self.status = PaymentStatus::Confirmed;
        self.confirmed_by = Some(confirmed_by);
        self.confirmed_at = Some(now);
    }

    pub fn reject(&mut self, reason: String) {
        self.status = PaymentStatus::Rejected;
        self.admin_notes = reason;
    }
}

/// payment reference: MP + timestamp + id tail; the surrogate id carries
/// uniqueness, the timestamp is for human eyes
fn reference_number(id: PaymentId, now: DateTime<Utc>) -> String {
    let tail = &id.simple().to_string()[..8];
    format!("MP{}{}", now.format("%Y%m%d%H%M%S"), tail)
}

/// settlement audit row written alongside every confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub member_id: Option<MemberId>,
    pub group_id: Option<GroupId>,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub manual_payment_id: PaymentId,
    pub is_successful: bool,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn for_confirmation(payment: &ManualPayment, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id: payment.member_id,
            group_id: payment.group_id,
            amount: payment.amount,
            payment_method: PaymentMethod::Manual,
            manual_payment_id: payment.id,
            is_successful: true,
            created_at: now,
        }
    }
}

/// transaction ledger entry written alongside every confirmation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub id: Uuid,
    pub member_id: Option<MemberId>,
    pub payment_type: PaymentType,
    pub amount: Money,
    pub description: String,
    pub status: TransactionStatus,
    pub reference: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    pub fn completed(payment: &ManualPayment, now: DateTime<Utc>) -> Self {
        let id = Uuid::new_v4();
        let prefix = match payment.payment_type {
            PaymentType::Registration => "REG",
            PaymentType::Savings => "SAVE",
            PaymentType::OutstandingBalance => "LOAN",
            PaymentType::InvestmentLoan => "INVL",
            PaymentType::FixedDeposit => "FIXD",
        };
        let tail = &id.simple().to_string()[..8];
        Self {
            id,
            member_id: payment.member_id,
            payment_type: payment.payment_type,
            amount: payment.amount,
            description: format!("Manual payment confirmed - {}", payment.reference_number),
            status: TransactionStatus::Completed,
            reference: format!("{}{}{}", prefix, now.format("%Y%m%d%H%M%S"), tail),
            created_at: now,
        }
    }
}
