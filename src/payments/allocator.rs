use chrono::{DateTime, Utc};

use crate::config::LedgerConfig;
use crate::decimal::Money;
use crate::errors::{LedgerError, Result};
use crate::events::Event;
use crate::ledger::Ledger;
use crate::model::{FixedDeposit, InvestmentLoanPayment, LoanPayment, ManualPayment};
use crate::payments::splitter::{PenaltySplitter, SplitOutcome};
use crate::payments::{AllocationPlan, AllocationResult, AllocationStep};
use crate::types::{AllocationBreakdown, LoanStatus, MemberId, PaymentType};

/// payment purpose allocator
///
/// turns a pending payment into a mutation plan: penalty deductions first
/// (when the payment was submitted through the penalty-aware path), then the
/// remainder routed by payment type. planning never mutates the ledger, so a
/// plan that fails leaves the payment pending and every balance untouched
pub struct PaymentAllocator {
    strict: bool,
}

impl PaymentAllocator {
    pub fn new(config: &LedgerConfig) -> Self {
        Self {
            strict: config.strict_allocation,
        }
    }

    /// lenient planner used for submission-time estimates; eligibility is
    /// re-checked at confirmation under the configured strictness
    pub fn lenient() -> Self {
        Self { strict: false }
    }

    pub fn plan(&self, ledger: &Ledger, payment: &ManualPayment) -> Result<AllocationPlan> {
        let split = if payment.split_penalties {
            let member_id = payment
                .member_id
                .ok_or_else(|| LedgerError::validation("split payment requires a member"))?;
            PenaltySplitter::plan(ledger, member_id, payment.payment_type, payment.amount)?
        } else {
            SplitOutcome {
                remaining: payment.amount,
                ..SplitOutcome::default()
            }
        };

        let (purpose_steps, applied, excess) =
            self.plan_purpose(ledger, payment, split.remaining)?;

        let mut steps = split.steps;
        steps.extend(purpose_steps);

        Ok(AllocationPlan {
            steps,
            breakdown: AllocationBreakdown {
                original_amount: payment.amount,
                penalties_deducted: split.penalties_deducted,
                remainder_applied: applied,
                deductions: split.deductions,
            },
            excess_unapplied: excess,
        })
    }

    /// route the post-penalty remainder by payment type
    ///
    /// returns (steps, amount applied, excess with no balance to land on)
    fn plan_purpose(
        &self,
        ledger: &Ledger,
        payment: &ManualPayment,
        remainder: Money,
    ) -> Result<(Vec<AllocationStep>, Money, Money)> {
        if remainder.is_zero() {
            return Ok((Vec::new(), Money::ZERO, Money::ZERO));
        }

        match payment.payment_type {
            // the fee is society income; nothing to allocate
            PaymentType::Registration => Ok((Vec::new(), remainder, Money::ZERO)),

            PaymentType::Savings => {
                let member_id = self.required_member(payment)?;
                let step = AllocationStep::CreditSavings {
                    member_id,
                    amount: remainder,
                };
                Ok((vec![step], remainder, Money::ZERO))
            }

            PaymentType::FixedDeposit => {
                let member_id = self.required_member(payment)?;
                let step = AllocationStep::OpenFixedDeposit {
                    member_id,
                    amount: remainder,
                };
                Ok((vec![step], remainder, Money::ZERO))
            }

            PaymentType::OutstandingBalance => {
                let member_id = self.required_member(payment)?;
                let targets: Vec<(uuid::Uuid, Money)> = ledger
                    .active_regular_loans(member_id)
                    .into_iter()
                    .filter(|loan| loan.accepts_repayment())
                    .map(|loan| (loan.id, loan.remaining_balance))
                    .collect();
                self.plan_fifo(remainder, targets, "outstanding_balance", true)
            }

            PaymentType::InvestmentLoan => {
                let member_id = self.required_member(payment)?;
                let targets: Vec<(uuid::Uuid, Money)> = ledger
                    .active_investment_loans(member_id)
                    .into_iter()
                    .filter(|loan| loan.accepts_repayment())
                    .map(|loan| (loan.id, loan.outstanding_balance))
                    .collect();
                self.plan_fifo(remainder, targets, "investment_loan", false)
            }
        }
    }

    /// oldest-first repayment plan over the eligible targets
    fn plan_fifo(
        &self,
        remainder: Money,
        targets: Vec<(uuid::Uuid, Money)>,
        type_name: &'static str,
        regular: bool,
    ) -> Result<(Vec<AllocationStep>, Money, Money)> {
        if targets.is_empty() {
            if self.strict {
                return Err(LedgerError::NoEligibleLoans {
                    payment_type: type_name,
                });
            }
            // legacy behavior: the society keeps the money, nothing is credited
            let step = AllocationStep::Absorb { amount: remainder };
            return Ok((vec![step], Money::ZERO, remainder));
        }

        let mut steps = Vec::new();
        let mut rest = remainder;
        for (loan_id, balance) in targets {
            if rest.is_zero() {
                break;
            }
            let take = rest.min(balance);
            steps.push(if regular {
                AllocationStep::RepayLoan {
                    loan_id,
                    amount: take,
                }
            } else {
                AllocationStep::RepayInvestmentLoan {
                    loan_id,
                    amount: take,
                }
            });
            rest -= take;
        }
        Ok((steps, remainder - rest, rest))
    }

    fn required_member(&self, payment: &ManualPayment) -> Result<MemberId> {
        payment
            .member_id
            .ok_or_else(|| LedgerError::validation("payment type requires a member"))
    }
}

impl Ledger {
    /// apply a freshly computed plan; infallible by construction since the
    /// plan was derived from the current state under the same borrow
    pub(crate) fn apply_plan(
        &mut self,
        payment: &ManualPayment,
        plan: &AllocationPlan,
        now: DateTime<Utc>,
    ) -> AllocationResult {
        let mut result = AllocationResult {
            payment_id: payment.id,
            breakdown: plan.breakdown.clone(),
            excess_unapplied: plan.excess_unapplied,
            ..AllocationResult::default()
        };

        for step in &plan.steps {
            match step {
                AllocationStep::SettleSavingsPenalties {
                    member_id,
                    amount,
                    record_ids,
                } => {
                    if let Some(member) = self.members.get_mut(member_id) {
                        member.settle_savings_penalty(*amount);
                    }
                    for record in self
                        .savings_penalty_records
                        .iter_mut()
                        .filter(|r| record_ids.contains(&r.id))
                    {
                        let paid = record.amount;
                        record.mark_paid(paid, now);
                    }
                    self.events.emit(Event::SavingsPenaltyPaid {
                        member_id: *member_id,
                        amount: *amount,
                        records_settled: record_ids.len() as u32,
                        timestamp: now,
                    });
                }

                AllocationStep::SettleLoanPenalty {
                    loan_id,
                    amount,
                    record_ids,
                } => {
                    if let Some(loan) = self.loans.get_mut(loan_id) {
                        loan.settle_penalty(*amount);
                    }
                    for record in self
                        .loan_payments
                        .iter_mut()
                        .filter(|r| record_ids.contains(&r.id))
                    {
                        let paid = record.amount;
                        record.mark_paid(paid, now);
                    }
                    self.events.emit(Event::LoanPenaltyPaid {
                        loan_id: *loan_id,
                        amount: *amount,
                        timestamp: now,
                    });
                }

                AllocationStep::RepayLoan { loan_id, amount } => {
                    let seq = self.next_seq();
                    let (applied, balance_after, completed) =
                        match self.loans.get_mut(loan_id) {
                            Some(loan) => {
                                let applied = loan.apply_repayment(*amount);
                                (
                                    applied,
                                    loan.remaining_balance,
                                    loan.status == LoanStatus::Completed,
                                )
                            }
                            None => continue,
                        };
                    self.loan_payments.push(LoanPayment::repayment(
                        *loan_id,
                        Some(payment.id),
                        applied,
                        balance_after,
                        format!("Repayment from payment {}", payment.reference_number),
                        now,
                        seq,
                    ));
                    self.events.emit(Event::LoanRepaymentApplied {
                        loan_id: *loan_id,
                        amount: applied,
                        balance_after,
                        timestamp: now,
                    });
                    result.loans_updated.push(*loan_id);
                    if completed {
                        result.loans_completed.push(*loan_id);
                        self.events.emit(Event::LoanCompleted {
                            loan_id: *loan_id,
                            timestamp: now,
                        });
                    }
                }

                AllocationStep::RepayInvestmentLoan { loan_id, amount } => {
                    let seq = self.next_seq();
                    let (applied, balance_after, completed) =
                        match self.investment_loans.get_mut(loan_id) {
                            Some(loan) => {
                                let applied = loan.apply_repayment(*amount);
                                (applied, loan.outstanding_balance, !loan.is_active())
                            }
                            None => continue,
                        };
                    self.investment_loan_payments.push(InvestmentLoanPayment::repayment(
                        *loan_id,
                        Some(payment.id),
                        applied,
                        balance_after,
                        format!("Repayment from payment {}", payment.reference_number),
                        now,
                        seq,
                    ));
                    self.events.emit(Event::InvestmentLoanRepaymentApplied {
                        loan_id: *loan_id,
                        amount: applied,
                        balance_after,
                        timestamp: now,
                    });
                    result.investment_loans_updated.push(*loan_id);
                    if completed {
                        result.investment_loans_completed.push(*loan_id);
                        self.events.emit(Event::InvestmentLoanCompleted {
                            loan_id: *loan_id,
                            timestamp: now,
                        });
                    }
                }

                AllocationStep::CreditSavings { member_id, amount } => {
                    if let Some(savings) = self.savings.get_mut(member_id) {
                        savings.credit(*amount, now);
                        let new_balance = savings.balance;
                        result.savings_balance = Some(new_balance);
                        self.events.emit(Event::SavingsCredited {
                            member_id: *member_id,
                            amount: *amount,
                            new_balance,
                            timestamp: now,
                        });
                    }
                    if let Some(member) = self.members.get_mut(member_id) {
                        member.last_savings_date = Some(now);
                    }
                }

                AllocationStep::OpenFixedDeposit { member_id, amount } => {
                    let deposit = FixedDeposit::open(
                        *member_id,
                        *amount,
                        self.config.fixed_deposit_rate,
                        self.config.fixed_deposit_months,
                        now,
                    );
                    self.events.emit(Event::FixedDepositOpened {
                        deposit_id: deposit.id,
                        member_id: *member_id,
                        amount: *amount,
                        maturity_date: deposit.maturity_date,
                    });
                    result.fixed_deposit_id = Some(deposit.id);
                    self.fixed_deposits.insert(deposit.id, deposit);
                }

                AllocationStep::Absorb { amount } => {
                    self.events.emit(Event::AllocationAbsorbed {
                        payment_id: payment.id,
                        amount: *amount,
                        payment_type: payment.payment_type,
                        timestamp: now,
                    });
                }
            }
        }

        result
    }
}
