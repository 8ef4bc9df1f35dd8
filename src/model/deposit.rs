use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::{Money, Rate};
use crate::types::{FixedDepositId, MemberId};

/// fixed deposit; is_active flips true -> false once, on collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedDeposit {
    pub id: FixedDepositId,
    pub member_id: MemberId,
    pub amount: Money,
    pub interest_rate: Rate,
    pub duration_months: u32,
    pub start_date: NaiveDate,
    /// start_date + duration_months * 30 days
    pub maturity_date: NaiveDate,
    pub is_active: bool,
    pub collected_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl FixedDeposit {
    pub fn open(
        member_id: MemberId,
        amount: Money,
        interest_rate: Rate,
        duration_months: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let start_date = now.date_naive();
        Self {
            id: Uuid::new_v4(),
            member_id,
            amount,
            interest_rate,
            duration_months,
            start_date,
            maturity_date: start_date + Duration::days(duration_months as i64 * 30),
            is_active: true,
            collected_at: None,
            created_at: now,
        }
    }

    pub fn collect(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.collected_at = Some(now);
    }
}
