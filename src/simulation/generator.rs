//! Random expense ledgers for benchmarks, demos and the `generate`
//! command.

use crate::core::error::Result;
use crate::core::expense::{Expense, ExpenseDetails, ShareBreakdown};
use crate::core::ledger::Ledger;
use crate::core::participant::ParticipantId;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

const CATEGORIES: [&str; 5] = ["Food", "Lodging", "Transport", "Groceries", "Entertainment"];

/// Configuration for generating a random ledger.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Number of participants.
    pub participant_count: usize,
    /// Number of expenses to record.
    pub expense_count: usize,
    /// Upper bound on debtors per expense.
    pub max_debtors_per_expense: usize,
    /// Smallest single share.
    pub min_share: Decimal,
    /// Largest single share.
    pub max_share: Decimal,
    /// Currency label written on every expense.
    pub currency: String,
    /// Fixed seed for reproducible output.
    pub seed: Option<u64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            participant_count: 8,
            expense_count: 40,
            max_debtors_per_expense: 4,
            min_share: Decimal::new(100, 2),
            max_share: Decimal::from(250),
            currency: "USD".to_string(),
            seed: None,
        }
    }
}

/// Build a ledger filled with random expenses.
pub fn generate_ledger(config: &GeneratorConfig) -> Result<Ledger> {
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let participants: Vec<ParticipantId> = (0..config.participant_count)
        .map(|i| ParticipantId::new(format!("P{:03}", i)))
        .collect();

    let mut ledger = Ledger::new();
    for participant in &participants {
        ledger.new_person(participant.clone())?;
    }
    if participants.len() < 2 {
        return Ok(ledger);
    }

    let min_cents = to_cents(config.min_share);
    let max_cents = to_cents(config.max_share).max(min_cents);
    let max_debtors = config
        .max_debtors_per_expense
        .clamp(1, participants.len() - 1);
    let today = Utc::now();

    for i in 0..config.expense_count {
        let creditor = &participants[rng.gen_range(0..participants.len())];
        let others: Vec<&ParticipantId> = participants.iter().filter(|p| *p != creditor).collect();
        let debtor_count = rng.gen_range(1..=max_debtors);

        let shares: ShareBreakdown = others
            .choose_multiple(&mut rng, debtor_count)
            .map(|debtor| {
                let cents = rng.gen_range(min_cents..=max_cents);
                ((*debtor).clone(), Decimal::new(cents, 2))
            })
            .collect();
        // The payer's own portion never becomes a share.
        let own_portion = Decimal::new(rng.gen_range(0..=max_cents), 2);
        let amount = shares.total() + own_portion;

        let details = ExpenseDetails {
            date: Some(
                (today - Duration::days((config.expense_count - i) as i64))
                    .format("%Y-%m-%d")
                    .to_string(),
            ),
            description: Some(format!("Expense {}", i + 1)),
            category: CATEGORIES.choose(&mut rng).map(|c| c.to_string()),
            currency: Some(config.currency.clone()),
        };
        ledger.record(Expense::new(creditor.clone(), amount, shares).with_details(details))?;
    }

    Ok(ledger)
}

fn to_cents(amount: Decimal) -> i64 {
    (amount * Decimal::from(100))
        .trunc()
        .to_i64()
        .unwrap_or(1)
        .max(1)
}
