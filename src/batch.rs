use std::fmt;

use chrono::{DateTime, Datelike, Duration, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::interest::AccrualEngine;
use crate::ledger::Ledger;
use crate::model::{LoanPayment, SavingsPenalty};
use crate::types::{Caller, CallerScope, LoanId, LoanPaymentType, MemberId, PaymentStatus};

/// iso week identifying one batch run
///
/// the ledger keeps a watermark of the last processed week and rejects
/// replays, so retrying a crashed run is safe
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct CycleWeek {
    pub year: i32,
    pub week: u32,
}

impl CycleWeek {
    pub fn new(year: i32, week: u32) -> Self {
        Self { year, week }
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let iso = dt.iso_week();
        Self {
            year: iso.year(),
            week: iso.week(),
        }
    }

    pub fn next(self) -> Self {
        // 52 is close enough for watermark arithmetic in tests; real runs
        // derive the week from the clock
        if self.week >= 52 {
            Self {
                year: self.year + 1,
                week: 1,
            }
        } else {
            Self {
                year: self.year,
                week: self.week + 1,
            }
        }
    }
}

impl fmt::Display for CycleWeek {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-W{:02}", self.year, self.week)
    }
}

/// one entity failure inside a batch run; the run continues past it
#[derive(Debug, Clone, Serialize)]
pub struct BatchError {
    pub entity: &'static str,
    pub id: Uuid,
    pub message: String,
}

/// summary of one weekly cycle run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub week: CycleWeek,
    pub loans_processed: u32,
    pub interest_applications: u32,
    pub loan_penalties_assessed: u32,
    pub members_processed: u32,
    pub savings_penalties_assessed: u32,
    pub updated_loans: Vec<LoanId>,
    pub penalized_members: Vec<MemberId>,
    pub errors: Vec<BatchError>,
}

impl BatchReport {
    fn new(week: CycleWeek) -> Self {
        Self {
            week,
            loans_processed: 0,
            interest_applications: 0,
            loan_penalties_assessed: 0,
            members_processed: 0,
            savings_penalties_assessed: 0,
            updated_loans: Vec::new(),
            penalized_members: Vec::new(),
            errors: Vec::new(),
        }
    }
}

#[derive(Default)]
struct LoanWeekOutcome {
    interest: bool,
    penalty: bool,
}

impl Ledger {
    /// run the weekly cycle: loan interest and penalties first, then savings
    /// penalties, superadmin only
    ///
    /// per-entity failures are collected into the report instead of aborting
    /// the run; the watermark only advances on a run that returns Ok
    pub fn run_weekly_cycle(
        &mut self,
        caller: &Caller,
        week: CycleWeek,
        time: &SafeTimeProvider,
    ) -> Result<BatchReport> {
        if caller.scope != CallerScope::AllGroups {
            return Err(LedgerError::PermissionDenied);
        }
        if let Some(last) = self.last_cycle_week {
            if week <= last {
                return Err(LedgerError::CycleAlreadyProcessed { week, last });
            }
        }
        let now = time.now();
        let mut report = BatchReport::new(week);

        // phase 1: regular loans, oldest first
        let mut loan_ids: Vec<(u64, LoanId)> = self
            .loans
            .values()
            .filter(|loan| loan.is_active())
            .map(|loan| (loan.seq, loan.id))
            .collect();
        loan_ids.sort_unstable();
        for (_, loan_id) in loan_ids {
            match self.process_loan_week(loan_id, week, now) {
                Ok(outcome) => {
                    report.loans_processed += 1;
                    report.updated_loans.push(loan_id);
                    if outcome.interest {
                        report.interest_applications += 1;
                    }
                    if outcome.penalty {
                        report.loan_penalties_assessed += 1;
                    }
                }
                Err(err) => report.errors.push(BatchError {
                    entity: "loan",
                    id: loan_id,
                    message: err.to_string(),
                }),
            }
        }

        // phase 2: savings penalties for every active member
        let mut member_ids: Vec<(DateTime<Utc>, MemberId)> = self
            .members
            .values()
            .filter(|member| member.is_active())
            .map(|member| (member.registered_at, member.id))
            .collect();
        member_ids.sort_unstable();
        for (_, member_id) in member_ids {
            match self.assess_savings_penalty(member_id, week, now) {
                Ok(assessed) => {
                    report.members_processed += 1;
                    if assessed {
                        report.savings_penalties_assessed += 1;
                        report.penalized_members.push(member_id);
                    }
                }
                Err(err) => report.errors.push(BatchError {
                    entity: "member",
                    id: member_id,
                    message: err.to_string(),
                }),
            }
        }

        // interest changed loan balances; refresh the cached aggregates
        let mut touched: Vec<MemberId> = report
            .updated_loans
            .iter()
            .filter_map(|id| self.loans.get(id).map(|loan| loan.member_id))
            .collect();
        touched.sort_unstable();
        touched.dedup();
        for member_id in touched {
            self.refresh_outstanding(member_id, now);
        }

        self.last_cycle_week = Some(week);
        Ok(report)
    }

    /// advance one loan by a week: bump the counter, capitalize interest on
    /// cycle boundaries, assess the flat penalty when no repayment landed in
    /// the trailing window
    fn process_loan_week(
        &mut self,
        loan_id: LoanId,
        week: CycleWeek,
        now: DateTime<Utc>,
    ) -> Result<LoanWeekOutcome> {
        let window_start = now - Duration::days(self.config.missed_payment_window_days);
        let repaid_recently = self.loan_payments.iter().any(|p| {
            p.loan_id == loan_id
                && p.payment_type == LoanPaymentType::Repayment
                && p.created_at >= window_start
        });
        let engine = AccrualEngine::new(&self.config);

        let loan = self
            .loans
            .get_mut(&loan_id)
            .ok_or(LedgerError::NotFound {
                entity: "loan",
                id: loan_id,
            })?;
        loan.interest_weeks += 1;

        let mut interest_applied = None;
        if let Some(due) = engine.interest_due(loan) {
            loan.add_interest(due.amount);
            if due.first {
                loan.first_interest_applied = true;
            }
            interest_applied = Some((due, loan.remaining_balance));
        }

        let mut penalty_assessed = None;
        if let Some(amount) = engine.penalty_due(repaid_recently) {
            loan.pending_penalty += amount;
            penalty_assessed = Some((amount, loan.remaining_balance));
        }

        let mut outcome = LoanWeekOutcome::default();
        if let Some((due, balance_after)) = interest_applied {
            let seq = self.next_seq();
            self.loan_payments.push(LoanPayment::interest(
                loan_id,
                due.amount,
                due.week_number,
                balance_after,
                now,
                seq,
            ));
            self.events.emit(Event::InterestApplied {
                loan_id,
                amount: due.amount,
                week_number: due.week_number,
                new_balance: balance_after,
                first: due.first,
            });
            outcome.interest = true;
        }
        if let Some((amount, balance_after)) = penalty_assessed {
            let seq = self.next_seq();
            self.loan_payments.push(LoanPayment::penalty(
                loan_id,
                amount,
                week.week,
                balance_after,
                now,
                seq,
            ));
            self.events.emit(Event::LoanPenaltyAssessed {
                loan_id,
                amount,
                week_number: week.week,
            });
            outcome.penalty = true;
        }
        Ok(outcome)
    }

    /// assess the flat savings penalty when no confirmed payment landed in
    /// the trailing window
    fn assess_savings_penalty(
        &mut self,
        member_id: MemberId,
        week: CycleWeek,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let window_start = now - Duration::days(self.config.missed_payment_window_days);
        let contributed = self.manual_payments.values().any(|p| {
            p.member_id == Some(member_id)
                && p.status == PaymentStatus::Confirmed
                && p.confirmed_at.map(|t| t >= window_start).unwrap_or(false)
        });
        if contributed {
            return Ok(false);
        }

        let amount = self.config.savings_penalty;
        let seq = self.next_seq();
        let member = self
            .members
            .get_mut(&member_id)
            .ok_or(LedgerError::NotFound {
                entity: "member",
                id: member_id,
            })?;
        member.pending_savings_penalty += amount;
        // the assessment restarts the member's contribution clock
        member.last_savings_date = Some(now);
        self.savings_penalty_records
            .push(SavingsPenalty::assess(member_id, amount, week.week, now, seq));
        self.events.emit(Event::SavingsPenaltyAssessed {
            member_id,
            amount,
            week,
        });
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use crate::decimal::Money;
    use crate::model::BankDetails;
    use crate::types::{LoanKind, PaymentType};
    use chrono::TimeZone;
    use hourglass_rs::TimeSource;

    fn test_time() -> SafeTimeProvider {
        SafeTimeProvider::new(TimeSource::Test(
            Utc.with_ymd_and_hms(2025, 1, 6, 9, 0, 0).unwrap(),
        ))
    }

    fn setup() -> (Ledger, MemberId, Caller, SafeTimeProvider) {
        let time = test_time();
        let mut ledger = Ledger::new(LedgerConfig::default());
        let member_id = ledger.create_member(None, &time);
        let admin = Caller::superadmin(Uuid::new_v4());
        (ledger, member_id, admin, time)
    }

    fn run_weeks(
        ledger: &mut Ledger,
        admin: &Caller,
        time: &SafeTimeProvider,
        start: CycleWeek,
        count: u32,
    ) -> CycleWeek {
        let control = time.test_control().unwrap();
        let mut week = start;
        for _ in 0..count {
            control.advance(Duration::days(7));
            ledger.run_weekly_cycle(admin, week, time).unwrap();
            week = week.next();
        }
        week
    }

    #[test]
    fn test_interest_capitalizes_at_week_four() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Regular,
                Money::from_major(10_000),
                "trade".into(),
                &time,
            )
            .unwrap()
            .id();

        run_weeks(&mut ledger, &admin, &time, CycleWeek::new(2025, 2), 4);

        let loan = ledger.loan(loan_id).unwrap();
        assert_eq!(loan.remaining_balance, Money::from_major(10_200));
        assert_eq!(loan.total_interest_added, Money::from_major(200));
        assert!(loan.first_interest_applied);

        // exactly one interest row, stamped with the loan's cycle counter
        let interest_rows: Vec<_> = ledger
            .loan_payments_for(loan_id)
            .into_iter()
            .filter(|p| p.payment_type == LoanPaymentType::Interest)
            .collect();
        assert_eq!(interest_rows.len(), 1);
        assert_eq!(interest_rows[0].week_number, Some(4));
    }

    #[test]
    fn test_subsequent_interest_compounds_on_balance() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Regular,
                Money::from_major(10_000),
                "trade".into(),
                &time,
            )
            .unwrap()
            .id();

        run_weeks(&mut ledger, &admin, &time, CycleWeek::new(2025, 2), 8);

        // week 4: 2% of 10000 = 200; week 8: 2% of 10200 = 204
        let loan = ledger.loan(loan_id).unwrap();
        assert_eq!(loan.remaining_balance, Money::from_major(10_404));
        assert_eq!(loan.total_interest_added, Money::from_major(404));
    }

    #[test]
    fn test_penalty_accumulates_weekly_without_repayment() {
        let (mut ledger, member_id, admin, time) = setup();
        let loan_id = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Regular,
                Money::from_major(10_000),
                "trade".into(),
                &time,
            )
            .unwrap()
            .id();

        run_weeks(&mut ledger, &admin, &time, CycleWeek::new(2025, 2), 3);

        let loan = ledger.loan(loan_id).unwrap();
        assert_eq!(loan.pending_penalty, Money::from_major(7_500));

        let pending = ledger.pending_loan_penalty_records(loan_id);
        assert_eq!(pending.len(), 3);
        assert!(pending.iter().all(|p| p.amount == Money::from_major(2_500)));
    }

    #[test]
    fn test_savings_penalty_for_silent_member() {
        let (mut ledger, member_id, admin, time) = setup();

        let control = time.test_control().unwrap();
        control.advance(Duration::days(8));
        let report = ledger
            .run_weekly_cycle(&admin, CycleWeek::new(2025, 2), &time)
            .unwrap();

        assert_eq!(report.savings_penalties_assessed, 1);
        assert_eq!(report.penalized_members, vec![member_id]);

        let member = ledger.member(member_id).unwrap();
        assert_eq!(member.pending_savings_penalty, Money::from_major(500));
        assert_eq!(member.last_savings_date, Some(time.now()));
        assert_eq!(ledger.pending_savings_penalties(member_id).len(), 1);
    }

    #[test]
    fn test_completed_loan_stops_accruing() {
        let (mut ledger, member_id, admin, time) = setup();
        let first = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Regular,
                Money::from_major(1_000),
                "a".into(),
                &time,
            )
            .unwrap()
            .id();
        let second = ledger
            .grant_loan(
                &admin,
                member_id,
                LoanKind::Regular,
                Money::from_major(5_000),
                "b".into(),
                &time,
            )
            .unwrap()
            .id();

        // pay the first loan off exactly
        let payment = ledger
            .submit_payment(
                Some(member_id),
                Money::from_major(1_000),
                PaymentType::OutstandingBalance,
                BankDetails::default(),
                &time,
            )
            .unwrap();
        ledger.confirm_payment(&admin, payment.id, &time).unwrap();
        assert!(!ledger.loan(first).unwrap().is_active());
        let rows_before = ledger.loan_payments_for(first).len();

        run_weeks(&mut ledger, &admin, &time, CycleWeek::new(2025, 2), 4);

        let payment = ledger
            .submit_payment(
                Some(member_id),
                Money::from_major(500),
                PaymentType::OutstandingBalance,
                BankDetails::default(),
                &time,
            )
            .unwrap();
        ledger.confirm_payment(&admin, payment.id, &time).unwrap();

        // the settled loan gains no interest or repayment rows and stays at zero
        let done = ledger.loan(first).unwrap();
        assert_eq!(done.remaining_balance, Money::ZERO);
        assert!(done.total_interest_added.is_zero());
        assert_eq!(ledger.loan_payments_for(first).len(), rows_before);

        // the live loan took the week-4 interest and the later repayment
        assert_eq!(
            ledger.loan(second).unwrap().remaining_balance,
            Money::from_major(4_600)
        );
    }

    #[test]
    fn test_replayed_week_is_rejected() {
        let (mut ledger, _, admin, time) = setup();
        let week = CycleWeek::new(2025, 2);
        ledger.run_weekly_cycle(&admin, week, &time).unwrap();

        let err = ledger.run_weekly_cycle(&admin, week, &time).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::CycleAlreadyProcessed { .. }
        ));
    }

    #[test]
    fn test_cycle_requires_superadmin() {
        let (mut ledger, _, _, time) = setup();
        let group_admin = Caller::group_admin(Uuid::new_v4(), Uuid::new_v4());

        let err = ledger
            .run_weekly_cycle(&group_admin, CycleWeek::new(2025, 2), &time)
            .unwrap_err();

        assert!(matches!(err, LedgerError::PermissionDenied));
    }

    #[test]
    fn test_cycle_week_ordering_and_display() {
        let late_2024 = CycleWeek::new(2024, 52);
        let early_2025 = CycleWeek::new(2025, 1);

        assert!(late_2024 < early_2025);
        assert_eq!(late_2024.next(), early_2025);
        assert_eq!(early_2025.to_string(), "2025-W01");
        assert_eq!(
            CycleWeek::from_datetime(Utc.with_ymd_and_hms(2025, 1, 6, 0, 0, 0).unwrap()),
            CycleWeek::new(2025, 2)
        );
    }
}
