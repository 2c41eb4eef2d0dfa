//! # expense-settlement
//!
//! Shared-expense ledger with minimal debt settlement.
//!
//! Participants record who paid for whom; the ledger keeps exact running
//! balances, and the simplifier turns the resulting web of IOUs into the
//! fewest transfers that bring everyone back to zero.
//!
//! ## Architecture
//!
//! - **core** — Participants, expenses, the ledger and its error taxonomy
//! - **settlement** — Debt simplification and settlement reports
//! - **input** — Reader/writer for the tabular expense export
//! - **simulation** — Random ledger generation for testing
//!
//! ## Example
//!
//! ```
//! use expense_settlement::prelude::*;
//! use rust_decimal_macros::dec;
//!
//! let mut ledger = Ledger::new();
//! for name in ["A", "B", "C"] {
//!     ledger.new_person(name).unwrap();
//! }
//! ledger.record_breakdown("A", dec!(10), "B=10").unwrap();
//! ledger.record_breakdown("B", dec!(10), "C=10").unwrap();
//!
//! let plan = ledger.simplify().unwrap();
//! assert_eq!(plan.edge_count(), 1);
//! assert_eq!(plan.owed(&ParticipantId::new("C"), &ParticipantId::new("A")), dec!(10));
//! ```

pub mod core;
pub mod input;
pub mod settlement;
pub mod simulation;

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::core::error::{InvariantViolation, LedgerError};
    pub use crate::core::expense::{Expense, ShareBreakdown};
    pub use crate::core::ledger::{Balances, Ledger};
    pub use crate::core::participant::ParticipantId;
    pub use crate::settlement::distribution::{SimplifiedDistribution, Transfer};
    pub use crate::settlement::simplifier::DebtSimplifier;
    pub use crate::settlement::summary::SettlementSummary;
}
