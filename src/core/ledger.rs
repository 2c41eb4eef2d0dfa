use crate::core::error::{InvariantViolation, LedgerError, Result};
use crate::core::expense::{Expense, ShareBreakdown};
use crate::core::participant::ParticipantId;
use crate::settlement::distribution::SimplifiedDistribution;
use crate::settlement::simplifier::DebtSimplifier;
use log::{debug, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Signed balance per participant.
pub type Balances = BTreeMap<ParticipantId, Decimal>;

/// Running journal of pairwise debts: `debtor -> creditor -> signed amount`.
///
/// A value of `-x` under `[d][c]` means `d` owes `c` the amount `x`.
pub type PairwiseDebts = BTreeMap<ParticipantId, BTreeMap<ParticipantId, Decimal>>;

/// Sum positive and negative balances separately: `(credit, debit)`, both
/// non-negative. `None` if either total leaves the decimal range.
pub(crate) fn credit_and_debit(
    balances: impl IntoIterator<Item = Decimal>,
) -> Option<(Decimal, Decimal)> {
    balances
        .into_iter()
        .try_fold((Decimal::ZERO, Decimal::ZERO), |(credit, debit), balance| {
            if balance.is_sign_negative() {
                Some((credit, debit.checked_sub(balance)?))
            } else {
                Some((credit.checked_add(balance)?, debit))
            }
        })
}

/// The shared-expense ledger for one run.
///
/// Tracks every participant's net position along with the raw pairwise
/// journal and the append-only expense log.
///
/// A positive balance means the participant is owed money (net creditor).
/// A negative balance means the participant owes money (net debtor).
/// Balances always sum to exactly zero.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Ledger {
    /// ParticipantId -> net balance
    balances: Balances,
    /// Raw pairwise journal, not netted across expenses.
    pairwise: PairwiseDebts,
    /// Successfully applied expenses, in order.
    expenses: Vec<Expense>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant with a zero balance.
    pub fn new_person(&mut self, id: impl Into<ParticipantId>) -> Result<()> {
        let id = id.into();
        if self.balances.contains_key(&id) {
            return Err(LedgerError::DuplicateParticipant(id));
        }
        debug!("registered participant {}", id);
        self.pairwise.insert(id.clone(), BTreeMap::new());
        self.balances.insert(id, Decimal::ZERO);
        Ok(())
    }

    /// Apply an expense: `creditor` paid `amount` on behalf of each debtor
    /// in `shares`.
    ///
    /// The whole breakdown is validated before any balance moves, so a
    /// rejected expense leaves the ledger exactly as it was.
    pub fn record_expense(
        &mut self,
        creditor: impl Into<ParticipantId>,
        amount: Decimal,
        shares: ShareBreakdown,
    ) -> Result<()> {
        self.record(Expense::new(creditor.into(), amount, shares))
    }

    /// Parse a textual breakdown such as `"B=10,C=5"` and record it.
    pub fn record_breakdown(
        &mut self,
        creditor: impl Into<ParticipantId>,
        amount: Decimal,
        breakdown: &str,
    ) -> Result<()> {
        let creditor = creditor.into();
        let shares = breakdown.parse::<ShareBreakdown>().map_err(|e| {
            warn!("rejected expense paid by {}: {}", creditor, e);
            e
        })?;
        self.record_expense(creditor, amount, shares)
    }

    /// Apply a fully built expense record.
    pub fn record(&mut self, expense: Expense) -> Result<()> {
        if let Err(e) = self.validate(&expense) {
            warn!("rejected expense '{}': {}", expense, e);
            return Err(e);
        }

        for (debtor, share) in expense.shares().iter() {
            self.transfer(expense.creditor(), debtor, share);
        }
        self.verify_conservation()?;

        debug!("recorded expense {} ({})", expense.id(), expense);
        self.expenses.push(expense);
        Ok(())
    }

    fn validate(&self, expense: &Expense) -> Result<()> {
        let creditor = expense.creditor();
        if !self.contains(creditor) {
            return Err(LedgerError::UnknownParticipant(creditor.clone()));
        }
        if expense.shares().is_empty() {
            return Err(LedgerError::MalformedShare(
                "breakdown has no entries".to_string(),
            ));
        }
        for (debtor, share) in expense.shares().iter() {
            if !self.contains(debtor) {
                return Err(LedgerError::UnknownParticipant(debtor.clone()));
            }
            if debtor == creditor {
                return Err(LedgerError::MalformedShare(format!(
                    "{debtor} cannot owe a share of their own expense"
                )));
            }
            if share <= Decimal::ZERO {
                return Err(LedgerError::MalformedShare(format!(
                    "share for {debtor} must be positive, got {share}"
                )));
            }
        }
        self.check_range(expense)
    }

    /// Every balance, journal entry and the ledger-wide credit total must
    /// stay representable after the expense is applied.
    fn check_range(&self, expense: &Expense) -> Result<()> {
        let overflow = || {
            LedgerError::MalformedShare(format!(
                "shares of '{}' exceed the representable amount range",
                expense
            ))
        };
        let creditor = expense.creditor();
        let total = expense.shares().checked_total().ok_or_else(overflow)?;

        let mut projected = Balances::new();
        let creditor_balance = self
            .balance(creditor)
            .unwrap_or(Decimal::ZERO)
            .checked_add(total)
            .ok_or_else(overflow)?;
        projected.insert(creditor.clone(), creditor_balance);

        for (debtor, share) in expense.shares().iter() {
            let balance = self
                .balance(debtor)
                .unwrap_or(Decimal::ZERO)
                .checked_sub(share)
                .ok_or_else(overflow)?;
            projected.insert(debtor.clone(), balance);
            self.owed(debtor, creditor)
                .checked_add(share)
                .ok_or_else(overflow)?;
        }

        let after = self
            .balances
            .iter()
            .map(|(p, balance)| projected.get(p).copied().unwrap_or(*balance));
        credit_and_debit(after).ok_or_else(overflow)?;
        Ok(())
    }

    /// Move `share` from the debtor's balance to the creditor's.
    /// Both participants and the resulting amounts must already be
    /// validated.
    fn transfer(&mut self, creditor: &ParticipantId, debtor: &ParticipantId, share: Decimal) {
        if let Some(balance) = self.balances.get_mut(creditor) {
            *balance += share;
        }
        if let Some(balance) = self.balances.get_mut(debtor) {
            *balance -= share;
        }
        *self
            .pairwise
            .entry(debtor.clone())
            .or_default()
            .entry(creditor.clone())
            .or_insert(Decimal::ZERO) -= share;
        debug!("transfer {} -> {}: {}", debtor, creditor, share);
    }

    /// Number of nonzero entries in the raw pairwise journal.
    pub fn raw_transfer_count(&self) -> usize {
        self.pairwise
            .values()
            .flat_map(|creditors| creditors.values())
            .filter(|amount| !amount.is_zero())
            .count()
    }

    /// Check that every balance movement was matched by an opposite one.
    pub fn verify_conservation(&self) -> Result<()> {
        let (credit, debit) =
            credit_and_debit(self.balances.values().copied()).ok_or_else(|| {
                log::error!("ledger balance totals overflowed");
                InvariantViolation::TotalOverflow
            })?;
        let sum = credit - debit;
        if sum.is_zero() {
            Ok(())
        } else {
            log::error!("ledger balances drifted to {}", sum);
            Err(InvariantViolation::BalanceDrift { sum }.into())
        }
    }

    /// Verify that the ledger is balanced: sum of all balances = 0.
    pub fn is_balanced(&self) -> bool {
        self.verify_conservation().is_ok()
    }

    /// Compute the minimal settlement for the current balances.
    pub fn simplify(&self) -> Result<SimplifiedDistribution> {
        DebtSimplifier::simplify(&self.balances)
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.balances.contains_key(id)
    }

    pub fn participants(&self) -> impl Iterator<Item = &ParticipantId> {
        self.balances.keys()
    }

    pub fn participant_count(&self) -> usize {
        self.balances.len()
    }

    /// Net balance of a participant, or `None` if unknown.
    pub fn balance(&self, id: &ParticipantId) -> Option<Decimal> {
        self.balances.get(id).copied()
    }

    pub fn balances(&self) -> &Balances {
        &self.balances
    }

    pub fn pairwise_debts(&self) -> &PairwiseDebts {
        &self.pairwise
    }

    /// Amount `debtor` owes `creditor` according to the raw journal.
    pub fn owed(&self, debtor: &ParticipantId, creditor: &ParticipantId) -> Decimal {
        self.pairwise
            .get(debtor)
            .and_then(|creditors| creditors.get(creditor))
            .map(|amount| -*amount)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn expenses(&self) -> &[Expense] {
        &self.expenses
    }

    /// Total amount that needs to change hands (sum of positive balances).
    ///
    /// `record` keeps this total representable.
    pub fn total_outstanding(&self) -> Decimal {
        self.balances
            .values()
            .filter(|v| **v > Decimal::ZERO)
            .sum()
    }

    pub fn balance_report(&self) -> BalanceReport<'_> {
        BalanceReport { ledger: self }
    }
}

/// Renders every participant's balance in id order.
pub struct BalanceReport<'a> {
    ledger: &'a Ledger,
}

impl fmt::Display for BalanceReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Balances:")?;
        for (participant, balance) in self.ledger.balances() {
            writeln!(f, "- {}: {}", participant, balance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn ledger_with(people: &[&str]) -> Ledger {
        let mut ledger = Ledger::new();
        for p in people {
            ledger.new_person(*p).unwrap();
        }
        ledger
    }

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn test_ledger_basic() {
        let mut ledger = ledger_with(&["A", "B"]);
        ledger
            .record_expense("A", dec!(100), ShareBreakdown::from([("B", dec!(100))]))
            .unwrap();

        assert_eq!(ledger.balance(&id("A")), Some(dec!(100)));
        assert_eq!(ledger.balance(&id("B")), Some(dec!(-100)));
        assert_eq!(ledger.owed(&id("B"), &id("A")), dec!(100));
        assert_eq!(ledger.pairwise_debts()[&id("B")][&id("A")], dec!(-100));
        assert_eq!(ledger.expenses().len(), 1);
    }

    #[test]
    fn test_new_person_starts_at_zero() {
        let ledger = ledger_with(&["A"]);
        assert_eq!(ledger.balance(&id("A")), Some(Decimal::ZERO));
        assert_eq!(ledger.balance(&id("B")), None);
        assert_eq!(ledger.participant_count(), 1);
    }

    #[test]
    fn test_duplicate_participant() {
        let mut ledger = ledger_with(&["A"]);
        let err = ledger.new_person("A").unwrap_err();
        assert_eq!(err, LedgerError::DuplicateParticipant(id("A")));
        assert_eq!(ledger.participant_count(), 1);
    }

    #[test]
    fn test_unknown_creditor_rejected() {
        let mut ledger = ledger_with(&["A"]);
        let err = ledger
            .record_expense("Z", dec!(5), ShareBreakdown::from([("A", dec!(5))]))
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownParticipant(id("Z")));
        assert!(ledger.expenses().is_empty());
    }

    #[test]
    fn test_invalid_share_rejects_whole_expense() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        // B sorts before Z, so a non-atomic implementation would already
        // have moved B's share when it reached Z.
        let err = ledger
            .record_expense(
                "A",
                dec!(15),
                ShareBreakdown::from([("B", dec!(10)), ("Z", dec!(5))]),
            )
            .unwrap_err();
        assert_eq!(err, LedgerError::UnknownParticipant(id("Z")));
        assert!(ledger.balances().values().all(|b| b.is_zero()));
        assert_eq!(ledger.raw_transfer_count(), 0);
        assert!(ledger.expenses().is_empty());
    }

    #[test]
    fn test_non_positive_share_rejected() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        for share in [Decimal::ZERO, dec!(-1)] {
            let err = ledger
                .record_expense(
                    "A",
                    dec!(10),
                    ShareBreakdown::from([("B", dec!(10)), ("C", share)]),
                )
                .unwrap_err();
            assert!(matches!(err, LedgerError::MalformedShare(_)));
        }
        assert_eq!(ledger.balance(&id("B")), Some(Decimal::ZERO));
    }

    #[test]
    fn test_empty_breakdown_rejected() {
        let mut ledger = ledger_with(&["A"]);
        let err = ledger
            .record_expense("A", dec!(10), ShareBreakdown::new())
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
    }

    #[test]
    fn test_self_share_rejected() {
        let mut ledger = ledger_with(&["A", "B"]);
        let err = ledger
            .record_expense(
                "A",
                dec!(20),
                ShareBreakdown::from([("A", dec!(10)), ("B", dec!(10))]),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
        assert_eq!(ledger.balance(&id("B")), Some(Decimal::ZERO));
    }

    #[test]
    fn test_overflowing_credit_total_rejected() {
        let mut ledger = ledger_with(&["A", "B", "C", "D"]);
        let big = Decimal::MAX * dec!(0.6);
        ledger
            .record_expense("A", big, ShareBreakdown::from([("C", big)]))
            .unwrap();
        let before = ledger.balances().clone();

        let err = ledger
            .record_expense("B", big, ShareBreakdown::from([("D", big)]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
        assert_eq!(ledger.balances(), &before);
        assert_eq!(ledger.raw_transfer_count(), 1);
        assert_eq!(ledger.expenses().len(), 1);
        assert!(ledger.is_balanced());
        assert_eq!(ledger.total_outstanding(), big);
        assert_eq!(ledger.simplify().unwrap().owed(&id("C"), &id("A")), big);
    }

    #[test]
    fn test_overflowing_journal_entry_rejected() {
        let mut ledger = ledger_with(&["A", "B"]);
        let big = Decimal::MAX * dec!(0.6);
        ledger
            .record_expense("A", big, ShareBreakdown::from([("B", big)]))
            .unwrap();
        ledger
            .record_expense("B", big, ShareBreakdown::from([("A", big)]))
            .unwrap();
        assert_eq!(ledger.total_outstanding(), Decimal::ZERO);

        // Balances would stay in range, but B's debt to A would not.
        let err = ledger
            .record_expense("A", big, ShareBreakdown::from([("B", big)]))
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
        assert_eq!(ledger.owed(&id("B"), &id("A")), big);
        assert_eq!(ledger.balance(&id("A")), Some(Decimal::ZERO));
        assert_eq!(ledger.expenses().len(), 2);
    }

    #[test]
    fn test_overflowing_breakdown_rejected() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        let err = ledger
            .record_expense(
                "A",
                Decimal::MAX,
                ShareBreakdown::from([("B", Decimal::MAX), ("C", dec!(1))]),
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
        assert!(ledger.balances().values().all(|b| b.is_zero()));
    }

    #[test]
    fn test_credit_and_debit_totals() {
        let totals = credit_and_debit([dec!(5), dec!(-3), dec!(-2), Decimal::ZERO]);
        assert_eq!(totals, Some((dec!(5), dec!(5))));

        let big = Decimal::MAX * dec!(0.6);
        assert_eq!(credit_and_debit([big, -big, big, -big]), None);
    }

    #[test]
    fn test_record_breakdown() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        ledger.record_breakdown("A", dec!(30), "B=10, C=10").unwrap();
        assert_eq!(ledger.balance(&id("A")), Some(dec!(20)));
        assert_eq!(ledger.expenses()[0].amount(), dec!(30));

        let err = ledger.record_breakdown("A", dec!(5), "B=5,C").unwrap_err();
        assert!(matches!(err, LedgerError::MalformedShare(_)));
        assert_eq!(ledger.expenses().len(), 1);
    }

    #[test]
    fn test_pairwise_journal_is_not_netted() {
        let mut ledger = ledger_with(&["A", "B"]);
        ledger
            .record_expense("A", dec!(10), ShareBreakdown::from([("B", dec!(10))]))
            .unwrap();
        ledger
            .record_expense("B", dec!(4), ShareBreakdown::from([("A", dec!(4))]))
            .unwrap();
        ledger
            .record_expense("A", dec!(2), ShareBreakdown::from([("B", dec!(2))]))
            .unwrap();

        assert_eq!(ledger.owed(&id("B"), &id("A")), dec!(12));
        assert_eq!(ledger.owed(&id("A"), &id("B")), dec!(4));
        assert_eq!(ledger.raw_transfer_count(), 2);
        assert_eq!(ledger.balance(&id("A")), Some(dec!(8)));
        assert!(ledger.is_balanced());
    }

    #[test]
    fn test_ledger_circular_cancels() {
        let mut ledger = ledger_with(&["A", "B", "C"]);
        ledger.record_breakdown("A", dec!(100), "B=100").unwrap();
        ledger.record_breakdown("B", dec!(100), "C=100").unwrap();
        ledger.record_breakdown("C", dec!(100), "A=100").unwrap();

        // Perfect cycle: everyone's net position is zero
        assert_eq!(ledger.balance(&id("A")), Some(Decimal::ZERO));
        assert_eq!(ledger.total_outstanding(), Decimal::ZERO);
        assert_eq!(ledger.raw_transfer_count(), 3);
        assert!(ledger.simplify().unwrap().is_empty());
    }

    #[test]
    fn test_balance_report() {
        let mut ledger = ledger_with(&["B", "A"]);
        ledger.record_breakdown("A", dec!(7.5), "B=7.5").unwrap();
        assert_eq!(
            ledger.balance_report().to_string(),
            "Balances:\n- A: 7.5\n- B: -7.5\n"
        );
    }
}
