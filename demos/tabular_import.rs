//! Load a spreadsheet-style expense export and settle it.
//!
//! Reads the file named on the command line, or a built-in sample when
//! no path is given.

use expense_settlement::input::tabular::{load_ledger, InputError};
use expense_settlement::settlement::summary::SettlementSummary;
use std::fs::File;
use std::io::{BufReader, Cursor};

const SAMPLE: &str = "\
Date,Description,Category,Cost,Currency,Mia,Noah,Olga
2024-03-01,Train tickets,Transport,120.00,EUR,120.00,-60.00,-60.00
2024-03-01,Hotel,Lodging,300.00,EUR,-100.00,200.00,-100.00
2024-03-02,Museum,Entertainment,36.00,EUR,-12.00,-12.00,24.00

2024-03-03,Total balance, , ,EUR,8.00,128.00,-136.00
";

fn main() -> Result<(), InputError> {
    env_logger::init();

    println!("╔══════════════════════════════════════════════╗");
    println!("║  expense-settlement: Tabular Export Import   ║");
    println!("╚══════════════════════════════════════════════╝\n");

    let ledger = match std::env::args().nth(1) {
        Some(path) => load_ledger(BufReader::new(File::open(path)?))?,
        None => load_ledger(Cursor::new(SAMPLE))?,
    };

    println!(
        "Loaded {} expenses across {} participants\n",
        ledger.expenses().len(),
        ledger.participant_count()
    );
    println!("{}", ledger.balance_report());

    let plan = ledger.simplify()?;
    println!("{}\n", SettlementSummary::new(&ledger, &plan));
    print!("{}", plan);

    Ok(())
}
