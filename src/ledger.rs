use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde_json::json;

use crate::batch::CycleWeek;
use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::{Event, EventStore};
use crate::model::{
    BankDetails, FixedDeposit, InvestmentLoan, InvestmentLoanPayment, Loan, LoanPayment,
    ManualPayment, Member, OutstandingBalance, PaymentRecord, Savings, SavingsPenalty,
    TransactionRecord,
};
use crate::payments::{ConfirmationOutcome, PaymentAllocator};
use crate::types::{
    AllocationBreakdown, Caller, FixedDepositId, GroupId, InvestmentLoanId, LoanId, LoanKind,
    LoanPaymentType, MemberId, PaymentId, PaymentType,
};

/// record returned by a grant, one variant per loan product
#[derive(Debug, Clone)]
pub enum GrantedLoan {
    Regular(Loan),
    Investment(InvestmentLoan),
}

impl GrantedLoan {
    pub fn id(&self) -> uuid::Uuid {
        match self {
            GrantedLoan::Regular(loan) => loan.id,
            GrantedLoan::Investment(loan) => loan.id,
        }
    }
}

/// in-memory ledger for one cooperative society
///
/// all mutating operations go through here; loan and penalty records are the
/// source of truth, the per-member aggregates are caches refreshed after
/// every operation that can move them
pub struct Ledger {
    pub config: LedgerConfig,
    pub events: EventStore,
    pub(crate) members: BTreeMap<MemberId, Member>,
    pub(crate) savings: BTreeMap<MemberId, Savings>,
    pub(crate) outstanding: BTreeMap<MemberId, OutstandingBalance>,
    pub(crate) loans: BTreeMap<LoanId, Loan>,
    pub(crate) investment_loans: BTreeMap<InvestmentLoanId, InvestmentLoan>,
    pub(crate) loan_payments: Vec<LoanPayment>,
    pub(crate) investment_loan_payments: Vec<InvestmentLoanPayment>,
    pub(crate) savings_penalty_records: Vec<SavingsPenalty>,
    pub(crate) manual_payments: BTreeMap<PaymentId, ManualPayment>,
    pub(crate) payment_records: Vec<PaymentRecord>,
    pub(crate) transactions: Vec<TransactionRecord>,
    pub(crate) fixed_deposits: BTreeMap<FixedDepositId, FixedDeposit>,
    pub(crate) last_cycle_week: Option<CycleWeek>,
    /// monotonic ordering counter; FIFO walks sort on it so allocation order
    /// stays deterministic even under a frozen test clock
    seq: u64,
}

impl Ledger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            events: EventStore::new(),
            members: BTreeMap::new(),
            savings: BTreeMap::new(),
            outstanding: BTreeMap::new(),
            loans: BTreeMap::new(),
            investment_loans: BTreeMap::new(),
            loan_payments: Vec::new(),
            investment_loan_payments: Vec::new(),
            savings_penalty_records: Vec::new(),
            manual_payments: BTreeMap::new(),
            payment_records: Vec::new(),
            transactions: Vec::new(),
            fixed_deposits: BTreeMap::new(),
            last_cycle_week: None,
            seq: 0,
        }
    }

    pub(crate) fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    // ------------------------------------------------------------------
    // members

    /// create a member together with its savings and outstanding-balance
    /// records; every member has exactly one of each for its lifetime
    pub fn create_member(&mut self, group_id: Option<GroupId>, time: &SafeTimeProvider) -> MemberId {
        let now = time.now();
        let member = Member::new(group_id, now);
        let member_id = member.id;
        self.savings.insert(member_id, Savings::new(member_id, now));
        self.outstanding
            .insert(member_id, OutstandingBalance::new(member_id, now));
        self.members.insert(member_id, member);
        self.events.emit(Event::MemberCreated {
            member_id,
            timestamp: now,
        });
        member_id
    }

    // ------------------------------------------------------------------
    // loans

    /// disburse a loan to an active member; regular loans start the accrual
    /// cycle at zero weeks, investment loans never accrue
    pub fn grant_loan(
        &mut self,
        caller: &Caller,
        member_id: MemberId,
        kind: LoanKind,
        amount: Money,
        purpose: String,
        time: &SafeTimeProvider,
    ) -> Result<GrantedLoan> {
        if amount <= Money::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let member = self.member(member_id)?;
        if !member.is_active() {
            return Err(LedgerError::InvalidState {
                entity: "member",
                current: format!("{:?}", member.status),
                expected: "Active".to_string(),
            });
        }
        if !caller.scope.covers(member.group_id) {
            return Err(LedgerError::PermissionDenied);
        }
        let group_id = member.group_id;

        let now = time.now();
        let seq = self.next_seq();
        let granted = match kind {
            LoanKind::Regular => {
                let loan = Loan::grant(
                    member_id,
                    group_id,
                    amount,
                    purpose,
                    caller.user_id,
                    now,
                    seq,
                );
                self.loans.insert(loan.id, loan.clone());
                self.events.emit(Event::LoanGranted {
                    loan_id: loan.id,
                    member_id,
                    amount,
                    timestamp: now,
                });
                GrantedLoan::Regular(loan)
            }
            LoanKind::Investment => {
                let loan = InvestmentLoan::grant(member_id, group_id, amount, purpose, now, seq);
                self.investment_loans.insert(loan.id, loan.clone());
                self.events.emit(Event::InvestmentLoanGranted {
                    loan_id: loan.id,
                    member_id,
                    amount,
                    timestamp: now,
                });
                GrantedLoan::Investment(loan)
            }
        };
        self.refresh_outstanding(member_id, now);
        Ok(granted)
    }

    // ------------------------------------------------------------------
    // payment intake

    /// record a bank-transfer payment; nothing moves until an admin confirms
    pub fn submit_payment(
        &mut self,
        member_id: Option<MemberId>,
        amount: Money,
        payment_type: PaymentType,
        bank_details: BankDetails,
        time: &SafeTimeProvider,
    ) -> Result<ManualPayment> {
        self.validate_amount(amount)?;
        let group_id = self.resolve_payment_group(member_id, payment_type)?;

        let now = time.now();
        let payment =
            ManualPayment::submit(member_id, group_id, amount, payment_type, bank_details, now);
        self.events.emit(Event::PaymentSubmitted {
            payment_id: payment.id,
            member_id,
            amount,
            payment_type,
            timestamp: now,
        });
        self.manual_payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    /// record a payment through the penalty-aware path: pending penalties
    /// will be deducted before the remainder reaches its purpose
    ///
    /// the returned breakdown is an estimate against current balances; the
    /// authoritative split is recomputed when the payment is confirmed
    pub fn process_payment_with_penalties(
        &mut self,
        member_id: MemberId,
        amount: Money,
        payment_type: PaymentType,
        bank_details: BankDetails,
        time: &SafeTimeProvider,
    ) -> Result<(ManualPayment, AllocationBreakdown)> {
        if payment_type == PaymentType::Registration {
            return Err(LedgerError::validation(
                "registration payments have no penalties to split",
            ));
        }
        self.validate_amount(amount)?;
        let group_id = self.resolve_payment_group(Some(member_id), payment_type)?;

        let now = time.now();
        let mut payment = ManualPayment::submit(
            Some(member_id),
            group_id,
            amount,
            payment_type,
            bank_details,
            now,
        );
        payment.split_penalties = true;

        // submission-time estimate; eligibility is enforced at confirmation
        let estimate = PaymentAllocator::lenient().plan(self, &payment)?;
        payment.penalty_details = serde_json::to_value(&estimate.breakdown.deductions).ok();
        payment.applied_to_purpose = Some(json!({
            "payment_type": payment_type,
            "amount": estimate.breakdown.remainder_applied,
        }));

        self.events.emit(Event::PaymentSubmitted {
            payment_id: payment.id,
            member_id: Some(member_id),
            amount,
            payment_type,
            timestamp: now,
        });
        self.manual_payments.insert(payment.id, payment.clone());
        Ok((payment, estimate.breakdown))
    }

    // ------------------------------------------------------------------
    // confirmation

    /// confirm a pending payment and allocate it against live balances
    ///
    /// planning happens before any mutation, so an allocation failure leaves
    /// the payment pending and every balance untouched
    pub fn confirm_payment(
        &mut self,
        caller: &Caller,
        payment_id: PaymentId,
        time: &SafeTimeProvider,
    ) -> Result<ConfirmationOutcome> {
        let payment = self.manual_payment(payment_id)?;
        if !caller.scope.covers(payment.group_id) {
            return Err(LedgerError::PermissionDenied);
        }
        if !payment.is_pending() {
            return Err(LedgerError::PaymentNotPending {
                status: payment.status,
            });
        }
        if payment.processed {
            return Err(LedgerError::InvalidState {
                entity: "payment",
                current: "processed".to_string(),
                expected: "unprocessed".to_string(),
            });
        }
        let snapshot = payment.clone();

        let plan = PaymentAllocator::new(&self.config).plan(self, &snapshot)?;

        let now = time.now();
        let allocation = self.apply_plan(&snapshot, &plan, now);

        let payment = self
            .manual_payments
            .get_mut(&payment_id)
            .ok_or(LedgerError::NotFound {
                entity: "payment",
                id: payment_id,
            })?;
        payment.confirm(caller.user_id, now);
        payment.processed = true;
        if payment.split_penalties {
            payment.penalty_details = serde_json::to_value(&plan.breakdown.deductions).ok();
        }
        payment.applied_to_purpose = Some(json!({
            "payment_type": payment.payment_type,
            "amount": plan.breakdown.remainder_applied,
        }));
        let confirmed = payment.clone();

        self.payment_records
            .push(PaymentRecord::for_confirmation(&confirmed, now));
        self.transactions
            .push(TransactionRecord::completed(&confirmed, now));
        self.events.emit(Event::PaymentConfirmed {
            payment_id,
            amount: confirmed.amount,
            payment_type: confirmed.payment_type,
            timestamp: now,
        });
        if let Some(member_id) = confirmed.member_id {
            self.refresh_outstanding(member_id, now);
        }

        Ok(ConfirmationOutcome {
            payment: confirmed,
            allocation,
        })
    }

    /// reject a pending payment; terminal, with no ledger effect
    pub fn reject_payment(
        &mut self,
        caller: &Caller,
        payment_id: PaymentId,
        reason: String,
        time: &SafeTimeProvider,
    ) -> Result<ManualPayment> {
        let payment = self.manual_payment(payment_id)?;
        if !caller.scope.covers(payment.group_id) {
            return Err(LedgerError::PermissionDenied);
        }
        if !payment.is_pending() {
            return Err(LedgerError::PaymentNotPending {
                status: payment.status,
            });
        }
        let now = time.now();
        let rejected = match self.manual_payments.get_mut(&payment_id) {
            Some(payment) => {
                payment.reject(reason.clone());
                payment.clone()
            }
            None => {
                return Err(LedgerError::NotFound {
                    entity: "payment",
                    id: payment_id,
                })
            }
        };
        self.events.emit(Event::PaymentRejected {
            payment_id,
            reason,
            timestamp: now,
        });
        Ok(rejected)
    }

    // ------------------------------------------------------------------
    // savings and deposits

    /// withdraw from a member's savings balance
    pub fn withdraw_savings(
        &mut self,
        caller: &Caller,
        member_id: MemberId,
        amount: Money,
        time: &SafeTimeProvider,
    ) -> Result<Money> {
        if amount <= Money::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if !caller.scope.covers(self.member(member_id)?.group_id) {
            return Err(LedgerError::PermissionDenied);
        }
        let available = self.savings_of(member_id)?.balance;
        if available < amount {
            return Err(LedgerError::InsufficientSavings {
                available,
                requested: amount,
            });
        }
        let now = time.now();
        let new_balance = match self.savings.get_mut(&member_id) {
            Some(savings) => {
                savings.debit(amount, now);
                savings.balance
            }
            None => available,
        };
        self.events.emit(Event::SavingsWithdrawn {
            member_id,
            amount,
            new_balance,
            timestamp: now,
        });
        Ok(new_balance)
    }

    /// pay out a matured fixed deposit: principal plus flat term interest
    pub fn collect_fixed_deposit(
        &mut self,
        caller: &Caller,
        deposit_id: FixedDepositId,
        time: &SafeTimeProvider,
    ) -> Result<Money> {
        let deposit = self.fixed_deposit(deposit_id)?;
        let member = self.member(deposit.member_id)?;
        if !caller.scope.covers(member.group_id) {
            return Err(LedgerError::PermissionDenied);
        }
        if !deposit.is_active {
            return Err(LedgerError::InvalidState {
                entity: "fixed deposit",
                current: "collected".to_string(),
                expected: "active".to_string(),
            });
        }
        let now = time.now();
        if now.date_naive() < deposit.maturity_date {
            return Err(LedgerError::validation("fixed deposit has not matured"));
        }
        let payout = deposit.amount + deposit.amount.apply_rate(deposit.interest_rate);
        if let Some(deposit) = self.fixed_deposits.get_mut(&deposit_id) {
            deposit.collect(now);
        }
        self.events.emit(Event::FixedDepositCollected {
            deposit_id,
            amount: payout,
            timestamp: now,
        });
        Ok(payout)
    }

    /// recompute and return the member's outstanding balance
    pub fn outstanding_balance(
        &mut self,
        member_id: MemberId,
        time: &SafeTimeProvider,
    ) -> Result<Money> {
        self.member(member_id)?;
        let now = time.now();
        Ok(self.refresh_outstanding(member_id, now))
    }

    pub(crate) fn refresh_outstanding(&mut self, member_id: MemberId, now: DateTime<Utc>) -> Money {
        let regular: Money = self
            .loans
            .values()
            .filter(|loan| loan.member_id == member_id && loan.is_active())
            .map(|loan| loan.remaining_balance)
            .sum();
        let investment: Money = self
            .investment_loans
            .values()
            .filter(|loan| loan.member_id == member_id && loan.is_active())
            .map(|loan| loan.outstanding_balance)
            .sum();
        let total = regular + investment;
        if let Some(cached) = self.outstanding.get_mut(&member_id) {
            cached.total = total;
            cached.last_updated = now;
        }
        total
    }

    // ------------------------------------------------------------------
    // validation helpers

    fn validate_amount(&self, amount: Money) -> Result<()> {
        if amount <= Money::ZERO {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if amount < self.config.minimum_payment {
            return Err(LedgerError::BelowMinimum {
                minimum: self.config.minimum_payment,
                provided: amount,
            });
        }
        Ok(())
    }

    fn resolve_payment_group(
        &self,
        member_id: Option<MemberId>,
        payment_type: PaymentType,
    ) -> Result<Option<GroupId>> {
        match member_id {
            Some(member_id) => {
                let member = self.member(member_id)?;
                if !member.is_active() {
                    return Err(LedgerError::InvalidState {
                        entity: "member",
                        current: format!("{:?}", member.status),
                        expected: "Active".to_string(),
                    });
                }
                Ok(member.group_id)
            }
            None => {
                if payment_type != PaymentType::Registration {
                    return Err(LedgerError::validation("payment type requires a member"));
                }
                Ok(None)
            }
        }
    }

    // ------------------------------------------------------------------
    // queries

    pub fn member(&self, member_id: MemberId) -> Result<&Member> {
        self.members.get(&member_id).ok_or(LedgerError::NotFound {
            entity: "member",
            id: member_id,
        })
    }

    pub fn savings_of(&self, member_id: MemberId) -> Result<&Savings> {
        self.savings.get(&member_id).ok_or(LedgerError::NotFound {
            entity: "savings",
            id: member_id,
        })
    }

    pub fn loan(&self, loan_id: LoanId) -> Result<&Loan> {
        self.loans.get(&loan_id).ok_or(LedgerError::NotFound {
            entity: "loan",
            id: loan_id,
        })
    }

    pub fn investment_loan(&self, loan_id: InvestmentLoanId) -> Result<&InvestmentLoan> {
        self.investment_loans
            .get(&loan_id)
            .ok_or(LedgerError::NotFound {
                entity: "investment loan",
                id: loan_id,
            })
    }

    pub fn manual_payment(&self, payment_id: PaymentId) -> Result<&ManualPayment> {
        self.manual_payments
            .get(&payment_id)
            .ok_or(LedgerError::NotFound {
                entity: "payment",
                id: payment_id,
            })
    }

    pub fn fixed_deposit(&self, deposit_id: FixedDepositId) -> Result<&FixedDeposit> {
        self.fixed_deposits
            .get(&deposit_id)
            .ok_or(LedgerError::NotFound {
                entity: "fixed deposit",
                id: deposit_id,
            })
    }

    /// active regular loans for a member, oldest grant first
    pub fn active_regular_loans(&self, member_id: MemberId) -> Vec<&Loan> {
        let mut loans: Vec<&Loan> = self
            .loans
            .values()
            .filter(|loan| loan.member_id == member_id && loan.is_active())
            .collect();
        loans.sort_by_key(|loan| loan.seq);
        loans
    }

    /// active investment loans for a member, oldest grant first
    pub fn active_investment_loans(&self, member_id: MemberId) -> Vec<&InvestmentLoan> {
        let mut loans: Vec<&InvestmentLoan> = self
            .investment_loans
            .values()
            .filter(|loan| loan.member_id == member_id && loan.is_active())
            .collect();
        loans.sort_by_key(|loan| loan.seq);
        loans
    }

    /// pending savings penalty records for a member, oldest first
    pub fn pending_savings_penalties(&self, member_id: MemberId) -> Vec<&SavingsPenalty> {
        let mut records: Vec<&SavingsPenalty> = self
            .savings_penalty_records
            .iter()
            .filter(|p| p.member_id == member_id && p.is_pending)
            .collect();
        records.sort_by_key(|p| p.seq);
        records
    }

    /// pending penalty rows against a loan, oldest first
    pub fn pending_loan_penalty_records(&self, loan_id: LoanId) -> Vec<&LoanPayment> {
        let mut records: Vec<&LoanPayment> = self
            .loan_payments
            .iter()
            .filter(|p| {
                p.loan_id == loan_id
                    && p.payment_type == LoanPaymentType::Penalty
                    && p.is_pending
            })
            .collect();
        records.sort_by_key(|p| p.seq);
        records
    }

    /// full audit trail for one loan, in event order
    pub fn loan_payments_for(&self, loan_id: LoanId) -> Vec<&LoanPayment> {
        let mut records: Vec<&LoanPayment> = self
            .loan_payments
            .iter()
            .filter(|p| p.loan_id == loan_id)
            .collect();
        records.sort_by_key(|p| p.seq);
        records
    }

    pub fn investment_loan_payments_for(
        &self,
        loan_id: InvestmentLoanId,
    ) -> Vec<&InvestmentLoanPayment> {
        let mut records: Vec<&InvestmentLoanPayment> = self
            .investment_loan_payments
            .iter()
            .filter(|p| p.loan_id == loan_id)
            .collect();
        records.sort_by_key(|p| p.seq);
        records
    }

    pub fn payment_records(&self) -> &[PaymentRecord] {
        &self.payment_records
    }

    pub fn transactions(&self) -> &[TransactionRecord] {
        &self.transactions
    }

    pub fn last_cycle_week(&self) -> Option<CycleWeek> {
        self.last_cycle_week
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new(LedgerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PaymentStatus, PenaltyKind};
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;
    use uuid::Uuid;

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 3, 3, 10, 0, 0).unwrap(),
        ))
    }

    fn setup() -> (Ledger, MemberId, Caller, SafeTimeProvider) {
        let time = test_time();
        let mut ledger = Ledger::new(LedgerConfig::default());
        let member_id = ledger.create_member(None, &time);
        (ledger, member_id, Caller::superadmin(Uuid::new_v4()), time)
    }

    fn submit(
        ledger: &mut Ledger,
        member_id: MemberId,
        amount: i64,
        payment_type: PaymentType,
        time: &SafeTimeProvider,
    ) -> PaymentId {
        ledger
            .submit_payment(
                Some(member_id),
                Money::from_major(amount),
                payment_type,
                BankDetails::default(),
                time,
            )
            .unwrap()
            .id
    }

    #[test]
    fn test_member_creation_cascades_balances() {
        let (ledger, member_id, _, _) = setup();

        assert!(ledger.member(member_id).unwrap().is_active());
        assert!(ledger.savings_of(member_id).unwrap().balance.is_zero());
        assert!(ledger.outstanding[&member_id].total.is_zero());
    }

    #[test]
    fn test_savings_payments_accumulate() {
        let (mut ledger, member_id, admin, time) = setup();

        for amount in [2000, 5000] {
            let payment_id = submit(&mut ledger, member_id, amount, PaymentType::Savings, &time);
            ledger.confirm_payment(&admin, payment_id, &time).unwrap();
        }

        assert_eq!(
            ledger.savings_of(member_id).unwrap().balance,
            Money::from_major(7000)
        );
    }

    #[test]
    fn test_confirmation_is_not_repeatable() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(&mut ledger, member_id, 2000, PaymentType::Savings, &time);
        ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        let err = ledger.confirm_payment(&admin, payment_id, &time).unwrap_err();

        assert!(matches!(err, LedgerError::PaymentNotPending { .. }));
        // the balance moved exactly once
        assert_eq!(
            ledger.savings_of(member_id).unwrap().balance,
            Money::from_major(2000)
        );
    }

    #[test]
    fn test_fifo_repayment_across_loans() {
        let (mut ledger, member_id, admin, time) = setup();
        let first = ledger
            .grant_loan(&admin, member_id, LoanKind::Regular, Money::from_major(1000), "a".into(), &time)
            .unwrap()
            .id();
        let second = ledger
            .grant_loan(&admin, member_id, LoanKind::Regular, Money::from_major(500), "b".into(), &time)
            .unwrap()
            .id();

        let payment_id = submit(
            &mut ledger,
            member_id,
            1200,
            PaymentType::OutstandingBalance,
            &time,
        );
        let outcome = ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        assert_eq!(ledger.loan(first).unwrap().remaining_balance, Money::ZERO);
        assert!(!ledger.loan(first).unwrap().is_active());
        assert_eq!(
            ledger.loan(second).unwrap().remaining_balance,
            Money::from_major(300)
        );
        assert_eq!(outcome.allocation.loans_completed, vec![first]);
        assert_eq!(ledger.outstanding[&member_id].total, Money::from_major(300));
    }

    #[test]
    fn test_strict_confirmation_fails_without_loans() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(
            &mut ledger,
            member_id,
            2000,
            PaymentType::OutstandingBalance,
            &time,
        );

        let err = ledger.confirm_payment(&admin, payment_id, &time).unwrap_err();

        assert!(matches!(err, LedgerError::NoEligibleLoans { .. }));
        // nothing moved; the payment stays pending for a retry
        let payment = ledger.manual_payment(payment_id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert!(!payment.processed);
        assert!(ledger.savings_of(member_id).unwrap().balance.is_zero());
    }

    #[test]
    fn test_lenient_confirmation_absorbs_without_loans() {
        let time = test_time();
        let mut config = LedgerConfig::default();
        config.strict_allocation = false;
        let mut ledger = Ledger::new(config);
        let member_id = ledger.create_member(None, &time);
        let admin = Caller::superadmin(Uuid::new_v4());

        let payment_id = submit(
            &mut ledger,
            member_id,
            2000,
            PaymentType::OutstandingBalance,
            &time,
        );
        let outcome = ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        assert_eq!(outcome.payment.status, PaymentStatus::Confirmed);
        assert_eq!(outcome.allocation.excess_unapplied, Money::from_major(2000));
        assert!(ledger.savings_of(member_id).unwrap().balance.is_zero());
        assert!(ledger
            .events
            .events()
            .iter()
            .any(|e| matches!(e, Event::AllocationAbsorbed { .. })));
    }

    #[test]
    fn test_penalty_split_settles_before_principal() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(&admin, member_id, LoanKind::Regular, Money::from_major(5000), "a".into(), &time)
            .unwrap()
            .id();
        seed_savings_penalty(&mut ledger, member_id, 500, &time);
        seed_loan_penalty(&mut ledger, loan_id, 1000, &time);

        let (payment, estimate) = ledger
            .process_payment_with_penalties(
                member_id,
                Money::from_major(3000),
                PaymentType::OutstandingBalance,
                BankDetails::default(),
                &time,
            )
            .unwrap();
        assert!(payment.split_penalties);
        assert!(payment.penalty_details.is_some());

        assert_eq!(estimate.penalties_deducted, Money::from_major(1500));
        assert_eq!(estimate.remainder_applied, Money::from_major(1500));
        assert_eq!(estimate.deductions.len(), 2);
        assert_eq!(estimate.deductions[0].kind, PenaltyKind::Savings);
        assert_eq!(estimate.deductions[1].kind, PenaltyKind::Loan);

        ledger.confirm_payment(&admin, payment.id, &time).unwrap();

        let loan = ledger.loan(loan_id).unwrap();
        assert_eq!(loan.remaining_balance, Money::from_major(3500));
        assert!(loan.pending_penalty.is_zero());
        assert_eq!(loan.total_penalties_paid, Money::from_major(1000));
        let member = ledger.member(member_id).unwrap();
        assert!(member.pending_savings_penalty.is_zero());
        assert_eq!(member.total_savings_penalties_paid, Money::from_major(500));
        assert!(ledger.pending_savings_penalties(member_id).is_empty());
        assert!(ledger.pending_loan_penalty_records(loan_id).is_empty());
    }

    #[test]
    fn test_payment_consumed_entirely_by_penalties() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(&admin, member_id, LoanKind::Regular, Money::from_major(5000), "a".into(), &time)
            .unwrap()
            .id();
        seed_loan_penalty(&mut ledger, loan_id, 2500, &time);

        let (payment, estimate) = ledger
            .process_payment_with_penalties(
                member_id,
                Money::from_major(2500),
                PaymentType::OutstandingBalance,
                BankDetails::default(),
                &time,
            )
            .unwrap();
        ledger.confirm_payment(&admin, payment.id, &time).unwrap();

        assert_eq!(estimate.penalties_deducted, Money::from_major(2500));
        assert!(estimate.remainder_applied.is_zero());
        // principal untouched
        assert_eq!(
            ledger.loan(loan_id).unwrap().remaining_balance,
            Money::from_major(5000)
        );
    }

    #[test]
    fn test_group_scope_enforced_on_confirmation() {
        let time = test_time();
        let mut ledger = Ledger::new(LedgerConfig::default());
        let group = Uuid::new_v4();
        let member_id = ledger.create_member(Some(group), &time);
        let payment_id = submit(&mut ledger, member_id, 2000, PaymentType::Savings, &time);

        let outsider = Caller::group_admin(Uuid::new_v4(), Uuid::new_v4());
        let err = ledger
            .confirm_payment(&outsider, payment_id, &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied));

        let insider = Caller::group_admin(Uuid::new_v4(), group);
        ledger.confirm_payment(&insider, payment_id, &time).unwrap();
    }

    #[test]
    fn test_submission_validation() {
        let (mut ledger, member_id, _, time) = setup();

        let err = ledger
            .submit_payment(
                Some(member_id),
                Money::from_major(1000),
                PaymentType::Savings,
                BankDetails::default(),
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::BelowMinimum { .. }));

        let err = ledger
            .submit_payment(
                Some(member_id),
                Money::ZERO,
                PaymentType::Savings,
                BankDetails::default(),
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidAmount { .. }));

        // savings payments must name a member; registrations need not
        let err = ledger
            .submit_payment(
                None,
                Money::from_major(2000),
                PaymentType::Savings,
                BankDetails::default(),
                &time,
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));
        ledger
            .submit_payment(
                None,
                Money::from_major(20_300),
                PaymentType::Registration,
                BankDetails::default(),
                &time,
            )
            .unwrap();
    }

    #[test]
    fn test_rejected_payment_cannot_be_confirmed() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(&mut ledger, member_id, 2000, PaymentType::Savings, &time);

        ledger
            .reject_payment(&admin, payment_id, "reference mismatch".into(), &time)
            .unwrap();

        let payment = ledger.manual_payment(payment_id).unwrap();
        assert_eq!(payment.status, PaymentStatus::Rejected);
        assert_eq!(payment.admin_notes, "reference mismatch");

        let err = ledger.confirm_payment(&admin, payment_id, &time).unwrap_err();
        assert!(matches!(err, LedgerError::PaymentNotPending { .. }));
        assert!(ledger.savings_of(member_id).unwrap().balance.is_zero());
    }

    #[test]
    fn test_withdrawal_requires_funds() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(&mut ledger, member_id, 2000, PaymentType::Savings, &time);
        ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        let err = ledger
            .withdraw_savings(&admin, member_id, Money::from_major(3000), &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientSavings { .. }));

        let balance = ledger
            .withdraw_savings(&admin, member_id, Money::from_major(1500), &time)
            .unwrap();
        assert_eq!(balance, Money::from_major(500));
    }

    #[test]
    fn test_fixed_deposit_lifecycle() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(
            &mut ledger,
            member_id,
            50_000,
            PaymentType::FixedDeposit,
            &time,
        );
        let outcome = ledger.confirm_payment(&admin, payment_id, &time).unwrap();
        let deposit_id = outcome.allocation.fixed_deposit_id.unwrap();

        // not yet matured
        let err = ledger
            .collect_fixed_deposit(&admin, deposit_id, &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { .. }));

        time.test_control().unwrap().advance(Duration::days(360));
        let payout = ledger
            .collect_fixed_deposit(&admin, deposit_id, &time)
            .unwrap();
        // principal plus flat 5%
        assert_eq!(payout, Money::from_major(52_500));

        let err = ledger
            .collect_fixed_deposit(&admin, deposit_id, &time)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
    }

    #[test]
    fn test_investment_loan_repayment_and_isolation() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Investment,
                Money::from_major(8000),
                "equipment".into(),
                &time,
            )
            .unwrap()
            .id();

        // weekly cycles never touch investment loans
        let week = crate::batch::CycleWeek::new(2025, 11);
        ledger.run_weekly_cycle(&admin, week, &time).unwrap();
        let loan = ledger.investment_loan(loan_id).unwrap();
        assert_eq!(loan.outstanding_balance, Money::from_major(8000));

        let payment_id = submit(
            &mut ledger,
            member_id,
            3000,
            PaymentType::InvestmentLoan,
            &time,
        );
        ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        let loan = ledger.investment_loan(loan_id).unwrap();
        assert_eq!(loan.outstanding_balance, Money::from_major(5000));
        assert_eq!(ledger.investment_loan_payments_for(loan_id).len(), 1);
    }

    #[test]
    fn test_confirmation_writes_audit_records() {
        let (mut ledger, member_id, admin, time) = setup();
        let payment_id = submit(&mut ledger, member_id, 2000, PaymentType::Savings, &time);
        ledger.confirm_payment(&admin, payment_id, &time).unwrap();

        assert_eq!(ledger.payment_records().len(), 1);
        assert_eq!(ledger.transactions().len(), 1);
        assert!(ledger.transactions()[0].reference.starts_with("SAVE"));
        assert_eq!(
            ledger.payment_records()[0].manual_payment_id,
            payment_id
        );
    }

    // seed pending penalties the way the weekly cycle would, without
    // running full cycles
    fn seed_savings_penalty(
        ledger: &mut Ledger,
        member_id: MemberId,
        amount: i64,
        time: &SafeTimeProvider,
    ) {
        let now = time.now();
        let amount = Money::from_major(amount);
        let seq = ledger.next_seq();
        ledger
            .savings_penalty_records
            .push(SavingsPenalty::assess(member_id, amount, 10, now, seq));
        if let Some(member) = ledger.members.get_mut(&member_id) {
            member.pending_savings_penalty += amount;
        }
    }

    fn seed_loan_penalty(
        ledger: &mut Ledger,
        loan_id: LoanId,
        amount: i64,
        time: &SafeTimeProvider,
    ) {
        let now = time.now();
        let amount = Money::from_major(amount);
        let seq = ledger.next_seq();
        let balance = ledger.loans[&loan_id].remaining_balance;
        ledger
            .loan_payments
            .push(LoanPayment::penalty(loan_id, amount, 10, balance, now, seq));
        if let Some(loan) = ledger.loans.get_mut(&loan_id) {
            loan.pending_penalty += amount;
        }
    }
}
