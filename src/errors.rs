use thiserror::Error;
use uuid::Uuid;

use crate::batch::CycleWeek;
use crate::decimal::Money;
use crate::types::PaymentStatus;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("invalid payment amount: {amount}")]
    InvalidAmount { amount: Money },

    #[error("payment below minimum: minimum {minimum}, provided {provided}")]
    BelowMinimum { minimum: Money, provided: Money },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: Uuid },

    #[error("invalid state: {entity} is {current}, expected {expected}")]
    InvalidState {
        entity: &'static str,
        current: String,
        expected: String,
    },

    #[error("payment is not pending: current status is {status:?}")]
    PaymentNotPending { status: PaymentStatus },

    #[error("permission denied: caller scope does not cover this group")]
    PermissionDenied,

    #[error("no eligible loans for {payment_type} payment")]
    NoEligibleLoans { payment_type: &'static str },

    #[error("insufficient savings: available {available}, requested {requested}")]
    InsufficientSavings { available: Money, requested: Money },

    #[error("weekly cycle {week} already processed; last run covered {last}")]
    CycleAlreadyProcessed { week: CycleWeek, last: CycleWeek },
}

impl LedgerError {
    pub fn validation(message: impl Into<String>) -> Self {
        LedgerError::Validation {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LedgerError>;
