use crate::core::error::LedgerError;
use crate::core::participant::ParticipantId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// How much each debtor owes the creditor for one expense.
///
/// Debtors are kept in id order. The textual form is `"B=10, C=5.25"`;
/// see the [`FromStr`] impl.
///
/// # Examples
///
/// ```
/// use expense_settlement::core::expense::ShareBreakdown;
/// use expense_settlement::core::participant::ParticipantId;
/// use rust_decimal_macros::dec;
///
/// let shares: ShareBreakdown = "B=10, C=5.25".parse().unwrap();
/// assert_eq!(shares.len(), 2);
/// assert_eq!(shares.get(&ParticipantId::new("C")), Some(dec!(5.25)));
/// assert_eq!(shares.total(), dec!(15.25));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShareBreakdown(BTreeMap<ParticipantId, Decimal>);

impl ShareBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a debtor's share, returning the previous one if present.
    pub fn insert(&mut self, debtor: ParticipantId, share: Decimal) -> Option<Decimal> {
        self.0.insert(debtor, share)
    }

    pub fn get(&self, debtor: &ParticipantId) -> Option<Decimal> {
        self.0.get(debtor).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, Decimal)> {
        self.0.iter().map(|(debtor, share)| (debtor, *share))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all shares. Not necessarily equal to the expense amount.
    ///
    /// # Panics
    ///
    /// Panics if the sum exceeds [`Decimal::MAX`]. The ledger rejects such
    /// breakdowns, so this never happens for a recorded expense.
    pub fn total(&self) -> Decimal {
        self.0.values().sum()
    }

    /// Sum of all shares, or `None` on overflow.
    pub fn checked_total(&self) -> Option<Decimal> {
        self.0
            .values()
            .try_fold(Decimal::ZERO, |acc, share| acc.checked_add(*share))
    }
}

impl FromIterator<(ParticipantId, Decimal)> for ShareBreakdown {
    fn from_iter<T: IntoIterator<Item = (ParticipantId, Decimal)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<const N: usize> From<[(&str, Decimal); N]> for ShareBreakdown {
    fn from(entries: [(&str, Decimal); N]) -> Self {
        entries
            .into_iter()
            .map(|(debtor, share)| (ParticipantId::new(debtor), share))
            .collect()
    }
}

impl FromStr for ShareBreakdown {
    type Err = LedgerError;

    /// Parse `"debtor=share, debtor=share, ..."`.
    ///
    /// Every share must be a strictly positive decimal and every debtor
    /// may appear only once.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut shares = BTreeMap::new();
        for entry in s.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let (debtor, share) = entry.split_once('=').ok_or_else(|| {
                LedgerError::MalformedShare(format!("expected debtor=share, got '{entry}'"))
            })?;
            let debtor = debtor.trim();
            if debtor.is_empty() {
                return Err(LedgerError::MalformedShare(format!(
                    "missing debtor in '{entry}'"
                )));
            }
            let share: Decimal = share.trim().parse().map_err(|e| {
                LedgerError::MalformedShare(format!("invalid share for {debtor}: {e}"))
            })?;
            if share <= Decimal::ZERO {
                return Err(LedgerError::MalformedShare(format!(
                    "share for {debtor} must be positive, got {share}"
                )));
            }
            if shares.insert(ParticipantId::new(debtor), share).is_some() {
                return Err(LedgerError::MalformedShare(format!(
                    "debtor {debtor} listed more than once"
                )));
            }
        }
        if shares.is_empty() {
            return Err(LedgerError::MalformedShare(
                "breakdown has no entries".to_string(),
            ));
        }
        let shares = Self(shares);
        if shares.checked_total().is_none() {
            return Err(LedgerError::MalformedShare(
                "shares add up to more than the largest representable amount".to_string(),
            ));
        }
        Ok(shares)
    }
}

impl fmt::Display for ShareBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (debtor, share)) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{}={}", debtor, share)?;
        }
        Ok(())
    }
}

/// Descriptive fields carried over from an expense export row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseDetails {
    pub date: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    /// Currency label as written in the export. Never used in arithmetic.
    pub currency: Option<String>,
}

/// One shared cost: `creditor` paid `amount`, split as `shares`.
///
/// Expenses are immutable audit records. The ledger derives balances from
/// the shares only; `amount` is kept for reporting and is not required
/// to equal the sum of the shares (the creditor's own portion, for
/// example, never appears as a share).
///
/// # Examples
///
/// ```
/// use expense_settlement::core::expense::{Expense, ShareBreakdown};
/// use expense_settlement::core::participant::ParticipantId;
/// use rust_decimal_macros::dec;
///
/// let expense = Expense::new(
///     ParticipantId::new("A"),
///     dec!(30),
///     ShareBreakdown::from([("B", dec!(10)), ("C", dec!(10))]),
/// );
///
/// assert_eq!(expense.shares().total(), dec!(20));
/// assert_eq!(expense.to_string(), "A paid 30 for B=10,C=10");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Expense {
    id: uuid::Uuid,
    creditor: ParticipantId,
    amount: Decimal,
    shares: ShareBreakdown,
    recorded_at: DateTime<Utc>,
    #[serde(default)]
    details: ExpenseDetails,
}

impl Expense {
    pub fn new(creditor: ParticipantId, amount: Decimal, shares: ShareBreakdown) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            creditor,
            amount,
            shares,
            recorded_at: Utc::now(),
            details: ExpenseDetails::default(),
        }
    }

    /// Attach export metadata (date, description, category, currency).
    pub fn with_details(mut self, details: ExpenseDetails) -> Self {
        self.details = details;
        self
    }

    // --- Accessors ---

    pub fn id(&self) -> uuid::Uuid {
        self.id
    }

    pub fn creditor(&self) -> &ParticipantId {
        &self.creditor
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn shares(&self) -> &ShareBreakdown {
        &self.shares
    }

    pub fn recorded_at(&self) -> DateTime<Utc> {
        self.recorded_at
    }

    pub fn details(&self) -> &ExpenseDetails {
        &self.details
    }
}

impl fmt::Display for Expense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} paid {} for {}", self.creditor, self.amount, self.shares)
    }
}
