use crate::core::error::InvariantViolation;
use crate::core::ledger::Balances;
use crate::core::participant::ParticipantId;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single settling payment: `debtor` pays `creditor` `amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub debtor: ParticipantId,
    pub creditor: ParticipantId,
    pub amount: Decimal,
}

/// The settlement plan produced by [`DebtSimplifier`].
///
/// Maps each paying participant to the participants they pay and the
/// (strictly positive) amount. Between any two participants there is at
/// most one edge, in one direction. Deserializing goes through the same
/// checks, so a plan read back from JSON upholds both rules.
///
/// [`DebtSimplifier`]: crate::settlement::simplifier::DebtSimplifier
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SimplifiedDistribution {
    edges: BTreeMap<ParticipantId, BTreeMap<ParticipantId, Decimal>>,
}

impl SimplifiedDistribution {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the edge `debtor -> creditor`.
    ///
    /// Fails if the amount is not positive, if both ends are the same
    /// participant, or if the pair is already connected in either
    /// direction.
    pub(crate) fn insert_edge(
        &mut self,
        debtor: ParticipantId,
        creditor: ParticipantId,
        amount: Decimal,
    ) -> Result<(), InvariantViolation> {
        if amount <= Decimal::ZERO || debtor == creditor {
            return Err(InvariantViolation::InvalidEdge {
                debtor,
                creditor,
                amount,
            });
        }
        if self.has_edge(&debtor, &creditor) || self.has_edge(&creditor, &debtor) {
            return Err(InvariantViolation::DuplicateEdge { debtor, creditor });
        }
        self.edges.entry(debtor).or_default().insert(creditor, amount);
        Ok(())
    }

    fn has_edge(&self, debtor: &ParticipantId, creditor: &ParticipantId) -> bool {
        self.edges
            .get(debtor)
            .is_some_and(|creditors| creditors.contains_key(creditor))
    }

    /// Number of transfers in the plan.
    pub fn edge_count(&self) -> usize {
        self.edges.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Amount `debtor` pays `creditor`, zero if there is no such edge.
    pub fn owed(&self, debtor: &ParticipantId, creditor: &ParticipantId) -> Decimal {
        self.edges
            .get(debtor)
            .and_then(|creditors| creditors.get(creditor))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Total amount a participant pays across all their edges.
    pub fn total_owed_by(&self, debtor: &ParticipantId) -> Decimal {
        self.edges
            .get(debtor)
            .map(|creditors| creditors.values().sum())
            .unwrap_or(Decimal::ZERO)
    }

    /// Participants with at least one outgoing payment, in id order.
    pub fn debtors(&self) -> impl Iterator<Item = &ParticipantId> {
        self.edges.keys()
    }

    /// Outgoing payments of one debtor, in creditor id order.
    pub fn payments_of(
        &self,
        debtor: &ParticipantId,
    ) -> impl Iterator<Item = (&ParticipantId, Decimal)> {
        self.edges
            .get(debtor)
            .into_iter()
            .flat_map(|creditors| creditors.iter().map(|(c, amount)| (c, *amount)))
    }

    /// All edges, ordered by debtor then creditor.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.edges
            .iter()
            .flat_map(|(debtor, creditors)| {
                creditors.iter().map(move |(creditor, amount)| Transfer {
                    debtor: debtor.clone(),
                    creditor: creditor.clone(),
                    amount: *amount,
                })
            })
            .collect()
    }

    /// Sum of all transfer amounts.
    pub fn total_amount(&self) -> Decimal {
        self.edges
            .values()
            .flat_map(|creditors| creditors.values())
            .sum()
    }

    /// Balances this plan settles: incoming minus outgoing per participant.
    ///
    /// Only participants touched by an edge appear in the result.
    pub fn implied_balances(&self) -> Balances {
        let mut balances = Balances::new();
        for (debtor, creditors) in &self.edges {
            for (creditor, amount) in creditors {
                *balances.entry(debtor.clone()).or_insert(Decimal::ZERO) -= amount;
                *balances.entry(creditor.clone()).or_insert(Decimal::ZERO) += amount;
            }
        }
        balances
    }

    /// True if executing this plan brings every balance in `balances` to
    /// exactly zero.
    pub fn settles(&self, balances: &Balances) -> bool {
        let implied = self.implied_balances();
        let mismatched_known = balances
            .iter()
            .any(|(p, balance)| implied.get(p).copied().unwrap_or(Decimal::ZERO) != *balance);
        let touches_unknown = implied
            .iter()
            .any(|(p, amount)| !balances.contains_key(p) && !amount.is_zero());
        !mismatched_known && !touches_unknown
    }
}

impl TryFrom<BTreeMap<ParticipantId, BTreeMap<ParticipantId, Decimal>>> for SimplifiedDistribution {
    type Error = InvariantViolation;

    fn try_from(
        edges: BTreeMap<ParticipantId, BTreeMap<ParticipantId, Decimal>>,
    ) -> Result<Self, Self::Error> {
        let mut distribution = Self::new();
        for (debtor, creditors) in edges {
            for (creditor, amount) in creditors {
                distribution.insert_edge(debtor.clone(), creditor, amount)?;
            }
        }
        Ok(distribution)
    }
}

impl<'de> Deserialize<'de> for SimplifiedDistribution {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let edges = BTreeMap::<ParticipantId, BTreeMap<ParticipantId, Decimal>>::deserialize(
            deserializer,
        )?;
        Self::try_from(edges).map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for SimplifiedDistribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, debtor) in self.debtors().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            writeln!(f, "{} owes {} in total", debtor, self.total_owed_by(debtor))?;
            for (creditor, amount) in self.payments_of(debtor) {
                writeln!(f, "- owes {} to {}", amount, creditor)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    fn sample() -> SimplifiedDistribution {
        let mut d = SimplifiedDistribution::new();
        d.insert_edge(id("C"), id("A"), dec!(25)).unwrap();
        d.insert_edge(id("D"), id("B"), dec!(20)).unwrap();
        d.insert_edge(id("D"), id("A"), dec!(5)).unwrap();
        d
    }

    #[test]
    fn test_edges_and_totals() {
        let d = sample();
        assert_eq!(d.edge_count(), 3);
        assert_eq!(d.owed(&id("D"), &id("A")), dec!(5));
        assert_eq!(d.owed(&id("A"), &id("D")), Decimal::ZERO);
        assert_eq!(d.total_owed_by(&id("D")), dec!(25));
        assert_eq!(d.total_amount(), dec!(50));
        assert_eq!(d.debtors().collect::<Vec<_>>(), vec![&id("C"), &id("D")]);
    }

    #[test]
    fn test_transfers_are_ordered() {
        let transfers = sample().transfers();
        let pairs: Vec<(&str, &str)> = transfers
            .iter()
            .map(|t| (t.debtor.as_str(), t.creditor.as_str()))
            .collect();
        assert_eq!(pairs, vec![("C", "A"), ("D", "A"), ("D", "B")]);
    }

    #[test]
    fn test_duplicate_edge_rejected_in_both_directions() {
        let mut d = sample();
        let err = d.insert_edge(id("C"), id("A"), dec!(1)).unwrap_err();
        assert_eq!(
            err,
            InvariantViolation::DuplicateEdge {
                debtor: id("C"),
                creditor: id("A"),
            }
        );
        assert!(d.insert_edge(id("A"), id("C"), dec!(1)).is_err());
        assert_eq!(d.owed(&id("C"), &id("A")), dec!(25));
    }

    #[test]
    fn test_invalid_edges_rejected() {
        let mut d = SimplifiedDistribution::new();
        for (debtor, creditor, amount) in [
            ("A", "B", Decimal::ZERO),
            ("A", "B", dec!(-3)),
            ("A", "A", dec!(3)),
        ] {
            let err = d.insert_edge(id(debtor), id(creditor), amount).unwrap_err();
            assert!(matches!(err, InvariantViolation::InvalidEdge { .. }));
        }
        assert!(d.is_empty());
    }

    #[test]
    fn test_payments_of() {
        let d = sample();
        let payments: Vec<(&ParticipantId, Decimal)> = d.payments_of(&id("D")).collect();
        assert_eq!(payments, vec![(&id("A"), dec!(5)), (&id("B"), dec!(20))]);
        assert_eq!(d.payments_of(&id("A")).count(), 0);
    }

    #[test]
    fn test_deserialize_round_trip() {
        let d = sample();
        let json = serde_json::to_string(&d).unwrap();
        let back: SimplifiedDistribution = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_deserialize_rejects_broken_plans() {
        for json in [
            r#"{"A":{"B":"5"},"B":{"A":"2"}}"#,
            r#"{"A":{"B":"0"}}"#,
            r#"{"A":{"B":"-1"}}"#,
            r#"{"A":{"A":"4"}}"#,
        ] {
            let result = serde_json::from_str::<SimplifiedDistribution>(json);
            assert!(result.is_err(), "{json} should be rejected");
        }
    }

    #[test]
    fn test_implied_balances_and_settles() {
        let d = sample();
        let implied = d.implied_balances();
        assert_eq!(implied[&id("A")], dec!(30));
        assert_eq!(implied[&id("B")], dec!(20));
        assert_eq!(implied[&id("C")], dec!(-25));
        assert_eq!(implied[&id("D")], dec!(-25));

        let mut balances = implied.clone();
        balances.insert(id("E"), Decimal::ZERO);
        assert!(d.settles(&balances));

        balances.insert(id("A"), dec!(29));
        assert!(!d.settles(&balances));
    }

    #[test]
    fn test_display_report() {
        let expected = "C owes 25 in total\n\
                        - owes 25 to A\n\
                        \n\
                        D owes 25 in total\n\
                        - owes 5 to A\n\
                        - owes 20 to B\n";
        assert_eq!(sample().to_string(), expected);
    }

    #[test]
    fn test_empty_distribution() {
        let d = SimplifiedDistribution::new();
        assert!(d.is_empty());
        assert_eq!(d.edge_count(), 0);
        assert_eq!(d.to_string(), "");
        assert!(d.settles(&Balances::new()));
    }
}
