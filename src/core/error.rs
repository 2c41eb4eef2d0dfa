use crate::core::participant::ParticipantId;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors returned by ledger and settlement operations.
///
/// The first three variants reject bad input and leave the ledger
/// untouched. [`LedgerError::InvariantViolation`] signals a defect in
/// the bookkeeping itself and must never be ignored by callers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("participant {0} is already registered")]
    DuplicateParticipant(ParticipantId),

    #[error("participant {0} is not registered")]
    UnknownParticipant(ParticipantId),

    #[error("malformed share: {0}")]
    MalformedShare(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(#[from] InvariantViolation),
}

impl LedgerError {
    /// True for errors caused by the caller's input.
    pub fn is_input_error(&self) -> bool {
        !self.is_invariant_violation()
    }

    /// True for errors that indicate a bookkeeping defect.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, LedgerError::InvariantViolation(_))
    }
}

/// Internal consistency failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("balances sum to {sum}, expected exactly zero")]
    BalanceDrift { sum: Decimal },

    #[error("settlement produced a second edge {debtor} -> {creditor}")]
    DuplicateEdge {
        debtor: ParticipantId,
        creditor: ParticipantId,
    },

    #[error("settlement finished with {remaining} debtor(s) still owing")]
    UnsettledDebtors { remaining: usize },

    #[error("settlement ran out of debtors with {remaining} creditor(s) still owed")]
    UnsettledCreditors { remaining: usize },

    #[error("balance totals exceed the representable decimal range")]
    TotalOverflow,

    #[error("invalid settlement edge {debtor} -> {creditor} of {amount}")]
    InvalidEdge {
        debtor: ParticipantId,
        creditor: ParticipantId,
        amount: Decimal,
    },
}

pub type Result<T> = std::result::Result<T, LedgerError>;
