//! Weekend trip settlement example.
//!
//! Records a handful of shared expenses, prints everyone's balance and
//! the smallest set of transfers that settles the group.

use expense_settlement::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::cmp::Ordering;

fn main() -> Result<(), LedgerError> {
    println!("╔═══════════════════════════════════════════════╗");
    println!("║  expense-settlement: Weekend Trip Settlement  ║");
    println!("╚═══════════════════════════════════════════════╝\n");

    let mut ledger = Ledger::new();
    for name in ["Alice", "Bob", "Carol", "Dave"] {
        ledger.new_person(name)?;
    }

    // --- Scenario 1: Recording expenses ---
    println!("━━━ Scenario 1: Recording Expenses ━━━\n");

    ledger.record_breakdown("Alice", dec!(240), "Bob=60, Carol=60, Dave=60")?;
    ledger.record_breakdown("Bob", dec!(90), "Alice=30, Carol=30")?;
    ledger.record_breakdown("Carol", dec!(45.50), "Dave=45.50")?;
    ledger.record_expense(
        "Dave",
        dec!(80),
        ShareBreakdown::from([("Alice", dec!(20)), ("Bob", dec!(20)), ("Carol", dec!(20))]),
    )?;

    for expense in ledger.expenses() {
        println!("  {}", expense);
    }
    println!();

    // A debtor nobody registered is rejected and changes nothing.
    match ledger.record_breakdown("Alice", dec!(15), "Bob=5, Eve=10") {
        Err(e) => println!("  Rejected: {}\n", e),
        Ok(()) => println!("  Unexpectedly accepted\n"),
    }

    // --- Scenario 2: Balances ---
    println!("━━━ Scenario 2: Balances ━━━\n");

    for (participant, balance) in ledger.balances() {
        let status = match balance.cmp(&Decimal::ZERO) {
            Ordering::Greater => "CREDITOR",
            Ordering::Less => "DEBTOR",
            Ordering::Equal => "SETTLED",
        };
        println!("  {:<8} {:>10}  [{}]", participant, balance, status);
    }
    println!();

    // --- Scenario 3: Simplified settlement ---
    println!("━━━ Scenario 3: Simplified Settlement ━━━\n");

    let plan = ledger.simplify()?;
    let summary = SettlementSummary::new(&ledger, &plan);
    println!("{}\n", summary);
    print!("{}", plan);

    Ok(())
}
