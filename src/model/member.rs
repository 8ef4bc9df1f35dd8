use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::decimal::Money;
use crate::types::{GroupId, MemberId, MemberStatus};

/// cooperative member
///
/// created together with its Savings and OutstandingBalance records in one
/// commit; every member has exactly one of each for its entire lifetime
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    pub id: MemberId,
    pub group_id: Option<GroupId>,
    pub status: MemberStatus,
    pub pending_savings_penalty: Money,
    pub total_savings_penalties_paid: Money,
    pub last_savings_date: Option<DateTime<Utc>>,
    pub registered_at: DateTime<Utc>,
}

impl Member {
    pub fn new(group_id: Option<GroupId>, registered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id,
            status: MemberStatus::Active,
            pending_savings_penalty: Money::ZERO,
            total_savings_penalties_paid: Money::ZERO,
            last_savings_date: None,
            registered_at,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active
    }

    /// move an amount from pending to paid penalties
    pub fn settle_savings_penalty(&mut self, amount: Money) {
        self.pending_savings_penalty -= amount;
        self.total_savings_penalties_paid += amount;
    }
}

/// member savings balance
///
/// credited only by savings-type payment allocation; decremented only by an
/// explicit withdrawal
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Savings {
    pub member_id: MemberId,
    pub balance: Money,
    pub last_updated: DateTime<Utc>,
}

impl Savings {
    pub fn new(member_id: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            balance: Money::ZERO,
            last_updated: now,
        }
    }

    pub fn credit(&mut self, amount: Money, now: DateTime<Utc>) {
        self.balance += amount;
        self.last_updated = now;
    }

    pub fn debit(&mut self, amount: Money, now: DateTime<Utc>) {
        self.balance -= amount;
        self.last_updated = now;
    }
}

/// cached aggregate of a member's active-loan balances
///
/// recomputed on demand; the loan records remain the source of truth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutstandingBalance {
    pub member_id: MemberId,
    pub total: Money,
    pub last_updated: DateTime<Utc>,
}

impl OutstandingBalance {
    pub fn new(member_id: MemberId, now: DateTime<Utc>) -> Self {
        Self {
            member_id,
            total: Money::ZERO,
            last_updated: now,
        }
    }
}

/// weekly savings penalty record; is_pending flips true -> false exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavingsPenalty {
    pub id: Uuid,
    pub member_id: MemberId,
    pub amount: Money,
    pub week_number: u32,
    pub is_pending: bool,
    pub paid_amount: Option<Money>,
    pub paid_date: Option<DateTime<Utc>>,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub seq: u64,
}

impl SavingsPenalty {
    pub fn assess(
        member_id: MemberId,
        amount: Money,
        week_number: u32,
        now: DateTime<Utc>,
        seq: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            member_id,
            amount,
            week_number,
            is_pending: true,
            paid_amount: None,
            paid_date: None,
            description: "Weekly penalty for missed savings contribution".to_string(),
            created_at: now,
            seq,
        }
    }

    /// settle this record; paid_amount and paid_date set atomically with the flip
    pub fn mark_paid(&mut self, amount: Money, now: DateTime<Utc>) {
        self.is_pending = false;
        self.paid_amount = Some(amount);
        self.paid_date = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settle_savings_penalty() {
        let now = Utc::now();
        let mut member = Member::new(None, now);
        member.pending_savings_penalty = Money::from_major(1000);

        member.settle_savings_penalty(Money::from_major(500));

        assert_eq!(member.pending_savings_penalty, Money::from_major(500));
        assert_eq!(member.total_savings_penalties_paid, Money::from_major(500));
    }

    #[test]
    fn test_penalty_record_pays_once() {
        let now = Utc::now();
        let mut penalty = SavingsPenalty::assess(Uuid::new_v4(), Money::from_major(500), 12, now, 1);
        assert!(penalty.is_pending);

        penalty.mark_paid(Money::from_major(500), now);

        assert!(!penalty.is_pending);
        assert_eq!(penalty.paid_amount, Some(Money::from_major(500)));
        assert_eq!(penalty.paid_date, Some(now));
    }
}
