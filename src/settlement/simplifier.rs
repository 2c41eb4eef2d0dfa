use crate::core::error::{InvariantViolation, Result};
use crate::core::ledger::{credit_and_debit, Balances};
use crate::core::participant::ParticipantId;
use crate::settlement::distribution::SimplifiedDistribution;
use log::{debug, error};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A participant waiting in one of the settlement queues.
///
/// `outstanding` is always positive: the amount still owed to a creditor,
/// or still owed by a debtor.
#[derive(Debug, Clone, PartialEq, Eq)]
struct QueueEntry {
    participant: ParticipantId,
    outstanding: Decimal,
}

impl Ord for QueueEntry {
    /// Larger outstanding amount first; on ties the smaller id wins.
    fn cmp(&self, other: &Self) -> Ordering {
        self.outstanding
            .cmp(&other.outstanding)
            .then_with(|| other.participant.cmp(&self.participant))
    }
}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Reduces net balances to a minimal set of settling transfers.
pub struct DebtSimplifier;

impl DebtSimplifier {
    /// Compute a settlement plan for `balances` (credit positive, debit
    /// negative).
    ///
    /// # Algorithm
    ///
    /// Greedy min-cash-flow matching over two priority queues:
    ///
    /// 1. Creditors and debtors go into separate max-queues keyed by the
    ///    amount outstanding. Zero balances are skipped.
    /// 2. Pop the largest creditor and the largest debtor; the debtor pays
    ///    `min(credit, debt)`.
    /// 3. Whichever side is left with a remainder is pushed back. If both
    ///    are cleared, neither is.
    /// 4. Stop when no creditor remains.
    ///
    /// Every round clears at least one participant, so `n` participants
    /// with a nonzero balance produce at most `n - 1` transfers.
    ///
    /// Ties between equal amounts are broken by [`ParticipantId`] order, so
    /// the plan is fully determined by the input.
    ///
    /// # Errors
    ///
    /// Returns [`InvariantViolation`] if the balances do not sum to zero,
    /// if their credit or debit total is out of range, or if the queues
    /// fall out of step, which can only happen on corrupt input.
    pub fn simplify(balances: &Balances) -> Result<SimplifiedDistribution> {
        let Some((credit, debit)) = credit_and_debit(balances.values().copied()) else {
            error!("balance totals overflow the decimal range");
            return Err(InvariantViolation::TotalOverflow.into());
        };
        let sum = credit - debit;
        if !sum.is_zero() {
            error!("cannot settle balances summing to {}", sum);
            return Err(InvariantViolation::BalanceDrift { sum }.into());
        }

        let mut creditors = BinaryHeap::new();
        let mut debtors = BinaryHeap::new();
        for (participant, balance) in balances {
            let entry = QueueEntry {
                participant: participant.clone(),
                outstanding: balance.abs(),
            };
            match balance.cmp(&Decimal::ZERO) {
                Ordering::Greater => creditors.push(entry),
                Ordering::Less => debtors.push(entry),
                Ordering::Equal => {}
            }
        }
        debug!(
            "settling {} creditor(s) against {} debtor(s)",
            creditors.len(),
            debtors.len()
        );

        let mut distribution = SimplifiedDistribution::new();
        while let Some(creditor) = creditors.pop() {
            let Some(debtor) = debtors.pop() else {
                let remaining = creditors.len() + 1;
                error!("no debtors left while {} creditor(s) are owed", remaining);
                return Err(InvariantViolation::UnsettledCreditors { remaining }.into());
            };

            let transfer = creditor.outstanding.min(debtor.outstanding);
            debug!(
                "{} pays {} to {}",
                debtor.participant, transfer, creditor.participant
            );
            distribution
                .insert_edge(
                    debtor.participant.clone(),
                    creditor.participant.clone(),
                    transfer,
                )
                .map_err(|violation| {
                    error!("{}", violation);
                    violation
                })?;

            if debtor.outstanding > transfer {
                debtors.push(QueueEntry {
                    participant: debtor.participant,
                    outstanding: debtor.outstanding - transfer,
                });
            } else if creditor.outstanding > transfer {
                creditors.push(QueueEntry {
                    participant: creditor.participant,
                    outstanding: creditor.outstanding - transfer,
                });
            }
        }

        if !debtors.is_empty() {
            error!("{} debtor(s) left after all creditors were paid", debtors.len());
            return Err(InvariantViolation::UnsettledDebtors {
                remaining: debtors.len(),
            }
            .into());
        }

        Ok(distribution)
    }

    /// Re-settle an existing plan from the balances it implies.
    pub fn simplify_distribution(
        distribution: &SimplifiedDistribution,
    ) -> Result<SimplifiedDistribution> {
        Self::simplify(&distribution.implied_balances())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::LedgerError;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn balances(entries: &[(&str, Decimal)]) -> Balances {
        entries.iter().map(|(p, b)| (id(p), *b)).collect()
    }

    #[test]
    fn test_queue_order() {
        let mut heap = BinaryHeap::new();
        for (p, amount) in [("B", dec!(5)), ("A", dec!(5)), ("C", dec!(9))] {
            heap.push(QueueEntry {
                participant: id(p),
                outstanding: amount,
            });
        }
        let order: Vec<String> = std::iter::from_fn(|| heap.pop())
            .map(|e| e.participant.to_string())
            .collect();
        assert_eq!(order, vec!["C", "A", "B"]);
    }

    #[test]
    fn test_chain_collapses_to_single_edge() {
        let b = balances(&[("A", dec!(10)), ("B", Decimal::ZERO), ("C", dec!(-10))]);
        let result = DebtSimplifier::simplify(&b).unwrap();
        assert_eq!(result.edge_count(), 1);
        assert_eq!(result.owed(&id("C"), &id("A")), dec!(10));
    }

    #[test]
    fn test_three_creditor_settle() {
        let b = balances(&[
            ("A", dec!(30)),
            ("B", dec!(20)),
            ("C", dec!(-25)),
            ("D", dec!(-25)),
        ]);
        let result = DebtSimplifier::simplify(&b).unwrap();
        assert_eq!(result.edge_count(), 3);
        assert_eq!(result.owed(&id("C"), &id("A")), dec!(25));
        assert_eq!(result.owed(&id("D"), &id("B")), dec!(20));
        assert_eq!(result.owed(&id("D"), &id("A")), dec!(5));
        assert!(result.settles(&b));
    }

    #[test]
    fn test_exact_match_requeues_neither() {
        let b = balances(&[
            ("A", dec!(10)),
            ("B", dec!(7.5)),
            ("C", dec!(-10)),
            ("D", dec!(-7.5)),
        ]);
        let result = DebtSimplifier::simplify(&b).unwrap();
        assert_eq!(result.edge_count(), 2);
        assert_eq!(result.owed(&id("C"), &id("A")), dec!(10));
        assert_eq!(result.owed(&id("D"), &id("B")), dec!(7.5));
    }

    #[test]
    fn test_one_creditor_many_debtors() {
        let b = balances(&[
            ("A", dec!(-1.11)),
            ("B", dec!(-2.22)),
            ("C", dec!(-3.33)),
            ("Z", dec!(6.66)),
        ]);
        let result = DebtSimplifier::simplify(&b).unwrap();
        assert_eq!(result.edge_count(), 3);
        assert_eq!(result.total_owed_by(&id("C")), dec!(3.33));
        assert_eq!(result.implied_balances()[&id("Z")], dec!(6.66));
    }

    #[test]
    fn test_ties_broken_by_id() {
        let b = balances(&[
            ("Y", dec!(5)),
            ("X", dec!(5)),
            ("Q", dec!(-5)),
            ("P", dec!(-5)),
        ]);
        let result = DebtSimplifier::simplify(&b).unwrap();
        assert_eq!(result.owed(&id("P"), &id("X")), dec!(5));
        assert_eq!(result.owed(&id("Q"), &id("Y")), dec!(5));
    }

    #[test]
    fn test_all_zero_yields_empty_plan() {
        let b = balances(&[("A", Decimal::ZERO), ("B", Decimal::ZERO)]);
        assert!(DebtSimplifier::simplify(&b).unwrap().is_empty());
        assert!(DebtSimplifier::simplify(&Balances::new()).unwrap().is_empty());
    }

    #[test]
    fn test_unbalanced_input_is_invariant_violation() {
        let b = balances(&[("A", dec!(10)), ("B", dec!(-9.99))]);
        let err = DebtSimplifier::simplify(&b).unwrap_err();
        assert!(err.is_invariant_violation());
        assert_eq!(
            err,
            LedgerError::InvariantViolation(InvariantViolation::BalanceDrift { sum: dec!(0.01) })
        );
    }

    #[test]
    fn test_out_of_range_totals_are_invariant_violation() {
        let big = Decimal::MAX * dec!(0.6);
        let b = balances(&[("A", big), ("B", big), ("C", -big), ("D", -big)]);
        let err = DebtSimplifier::simplify(&b).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InvariantViolation(InvariantViolation::TotalOverflow)
        );
    }

    #[test]
    fn test_simplify_distribution_is_stable() {
        let b = balances(&[
            ("A", dec!(30)),
            ("B", dec!(20)),
            ("C", dec!(-25)),
            ("D", dec!(-25)),
        ]);
        let first = DebtSimplifier::simplify(&b).unwrap();
        let second = DebtSimplifier::simplify_distribution(&first).unwrap();
        assert_eq!(first, second);
    }
}
