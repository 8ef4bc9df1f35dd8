use crate::decimal::Money;
use crate::errors::Result;
use crate::ledger::Ledger;
use crate::payments::AllocationStep;
use crate::types::{MemberId, PaymentType, PenaltyDeduction, PenaltyKind};

/// penalty slice of a split plan, computed before the purpose allocation
#[derive(Debug, Clone, Default)]
pub struct SplitOutcome {
    pub steps: Vec<AllocationStep>,
    pub deductions: Vec<PenaltyDeduction>,
    pub penalties_deducted: Money,
    pub remaining: Money,
}

/// penalty-aware payment splitter
///
/// deducts pending savings penalties first, then pending loan penalties for
/// repayment-type payments, and hands the remainder to the purpose allocator.
/// planning is read-only; the returned steps are applied at confirmation
/// against live balances, so the estimate captured at submission and the
/// final application can differ if the weekly cycle ran in between
pub struct PenaltySplitter;

impl PenaltySplitter {
    pub fn plan(
        ledger: &Ledger,
        member_id: MemberId,
        payment_type: PaymentType,
        amount: Money,
    ) -> Result<SplitOutcome> {
        let member = ledger.member(member_id)?;
        let mut outcome = SplitOutcome {
            remaining: amount,
            ..SplitOutcome::default()
        };

        // savings penalties come out of every split payment
        let savings_due = member.pending_savings_penalty.min(outcome.remaining);
        if savings_due > Money::ZERO {
            let record_ids = settled_record_ids(
                ledger
                    .pending_savings_penalties(member_id)
                    .iter()
                    .map(|p| (p.id, p.amount)),
                savings_due,
            );
            outcome.deductions.push(PenaltyDeduction {
                kind: PenaltyKind::Savings,
                amount: savings_due,
                records_settled: record_ids.len() as u32,
            });
            outcome.steps.push(AllocationStep::SettleSavingsPenalties {
                member_id,
                amount: savings_due,
                record_ids,
            });
            outcome.penalties_deducted += savings_due;
            outcome.remaining -= savings_due;
        }

        // loan penalties only when the payment repays regular loans;
        // investment loans never carry penalties
        if payment_type == PaymentType::OutstandingBalance && outcome.remaining > Money::ZERO {
            let target = ledger
                .active_regular_loans(member_id)
                .into_iter()
                .find(|loan| loan.pending_penalty > Money::ZERO);
            if let Some(loan) = target {
                let loan_due = loan.pending_penalty.min(outcome.remaining);
                let record_ids = settled_record_ids(
                    ledger
                        .pending_loan_penalty_records(loan.id)
                        .iter()
                        .map(|p| (p.id, p.amount)),
                    loan_due,
                );
                outcome.deductions.push(PenaltyDeduction {
                    kind: PenaltyKind::Loan,
                    amount: loan_due,
                    records_settled: record_ids.len() as u32,
                });
                outcome.steps.push(AllocationStep::SettleLoanPenalty {
                    loan_id: loan.id,
                    amount: loan_due,
                    record_ids,
                });
                outcome.penalties_deducted += loan_due;
                outcome.remaining -= loan_due;
            }
        }

        Ok(outcome)
    }
}

/// oldest-first record ids fully covered by the deducted amount
///
/// a record only partially covered stays pending; the aggregate pending
/// figure on the owner still drops by the full deduction
fn settled_record_ids(
    records: impl Iterator<Item = (uuid::Uuid, Money)>,
    deducted: Money,
) -> Vec<uuid::Uuid> {
    let mut ids = Vec::new();
    let mut covered = Money::ZERO;
    for (id, amount) in records {
        if covered + amount > deducted {
            break;
        }
        covered += amount;
        ids.push(id);
    }
    ids
}
