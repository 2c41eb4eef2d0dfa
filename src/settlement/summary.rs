use crate::core::ledger::Ledger;
use crate::core::participant::ParticipantId;
use crate::settlement::distribution::SimplifiedDistribution;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Before/after comparison of the raw journal and the settlement plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementSummary {
    /// Number of registered participants.
    pub participant_count: usize,
    /// Nonzero pairwise debts in the raw journal.
    pub raw_transfers: usize,
    /// Transfers in the simplified plan.
    pub simplified_transfers: usize,
    /// Total money moved by the plan.
    pub total_settled: Decimal,
    /// What each paying participant hands over in total.
    pub debtor_totals: BTreeMap<ParticipantId, Decimal>,
}

impl SettlementSummary {
    pub fn new(ledger: &Ledger, distribution: &SimplifiedDistribution) -> Self {
        let debtor_totals = distribution
            .debtors()
            .map(|d| (d.clone(), distribution.total_owed_by(d)))
            .collect();

        SettlementSummary {
            participant_count: ledger.participant_count(),
            raw_transfers: ledger.raw_transfer_count(),
            simplified_transfers: distribution.edge_count(),
            total_settled: distribution.total_amount(),
            debtor_totals,
        }
    }

    /// Transfers avoided by simplifying.
    pub fn transfers_saved(&self) -> usize {
        self.raw_transfers.saturating_sub(self.simplified_transfers)
    }

    /// Fraction of raw transfers avoided, for display.
    pub fn reduction_ratio(&self) -> f64 {
        if self.raw_transfers == 0 {
            return 0.0;
        }
        self.transfers_saved() as f64 / self.raw_transfers as f64
    }
}

impl std::fmt::Display for SettlementSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let saved = self.transfers_saved();
        writeln!(
            f,
            "Simplify debts saved {} balance transfer{} ({} -> {})",
            saved,
            if saved == 1 { "" } else { "s" },
            self.raw_transfers,
            self.simplified_transfers
        )?;
        writeln!(f, "Total settled: {}", self.total_settled)?;
        writeln!(f, "Reduction:     {:.1}%", self.reduction_ratio() * 100.0)
    }
}
