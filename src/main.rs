//! expense-settlement CLI
//!
//! Settle a shared-expense export from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Print balances and the minimal settlement plan
//! expense-settlement settle --input trip.csv
//!
//! # Output as JSON
//! expense-settlement settle --input trip.csv --format json
//!
//! # Balances only
//! expense-settlement balances --input trip.csv
//!
//! # Generate a random export for testing
//! expense-settlement generate --participants 6 --expenses 40 --output trip.csv
//! ```
//!
//! Set `RUST_LOG=debug` to trace every transfer.

use expense_settlement::core::ledger::Ledger;
use expense_settlement::input::tabular::{load_ledger, write_export};
use expense_settlement::settlement::summary::SettlementSummary;
use expense_settlement::simulation::generator::{generate_ledger, GeneratorConfig};
use log::info;
use rust_decimal::Decimal;
use std::cmp::Ordering;
use std::fs::File;
use std::io::{self, BufReader};
use std::process;

fn print_usage() {
    eprintln!(
        r#"expense-settlement — shared-expense ledger with minimal debt settlement

USAGE:
    expense-settlement <COMMAND> [OPTIONS]

COMMANDS:
    settle      Load an expense export and print the minimal settlement
    balances    Load an expense export and print each participant's balance
    generate    Generate a random expense export (for testing)
    help        Show this message

OPTIONS (settle, balances):
    --input <FILE>      Path to the expense export
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (generate):
    --participants <N>  Number of participants (default: 8)
    --expenses <N>      Number of expenses (default: 40)
    --seed <N>          Seed for reproducible output
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    expense-settlement settle --input trip.csv
    expense-settlement settle --input trip.csv --format json
    expense-settlement balances --input trip.csv
    expense-settlement generate --participants 5 --expenses 20 --output trip.csv"#
    );
}

/// JSON output schema for `balances`.
#[derive(serde::Serialize)]
struct BalancesOutput {
    balances: Vec<BalanceOutput>,
    raw_transfers: usize,
}

#[derive(serde::Serialize)]
struct BalanceOutput {
    participant: String,
    balance: String,
    status: String,
}

/// JSON output schema for `settle`.
#[derive(serde::Serialize)]
struct SettleOutput {
    balances: Vec<BalanceOutput>,
    summary: SettlementSummary,
    transfers: Vec<TransferOutput>,
}

#[derive(serde::Serialize)]
struct TransferOutput {
    from: String,
    to: String,
    amount: String,
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn load(path: &str) -> Ledger {
    let file = File::open(path).unwrap_or_else(|e| fail(format!("reading '{}': {}", path, e)));
    let ledger = load_ledger(BufReader::new(file)).unwrap_or_else(|e| fail(e));
    info!(
        "loaded '{}': {} participants, {} expenses",
        path,
        ledger.participant_count(),
        ledger.expenses().len()
    );
    ledger
}

fn balance_rows(ledger: &Ledger) -> Vec<BalanceOutput> {
    ledger
        .balances()
        .iter()
        .map(|(participant, balance)| BalanceOutput {
            participant: participant.to_string(),
            balance: balance.to_string(),
            status: match balance.cmp(&Decimal::ZERO) {
                Ordering::Greater => "CREDITOR",
                Ordering::Less => "DEBTOR",
                Ordering::Equal => "SETTLED",
            }
            .to_string(),
        })
        .collect()
}

fn print_json<T: serde::Serialize>(value: &T) {
    let json = serde_json::to_string_pretty(value).unwrap_or_else(|e| fail(e));
    println!("{}", json);
}

/// Parse `--input` and `--format` for the commands that read an export.
fn input_args(args: &[String]) -> (String, String) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--input requires a file path")),
                );
            }
            "--format" => {
                i += 1;
                format = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail("--format requires 'text' or 'json'"));
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    if format != "text" && format != "json" {
        fail(format!("unknown format '{}', expected text or json", format));
    }
    let path = input_path.unwrap_or_else(|| fail("--input <FILE> is required"));
    (path, format)
}

fn cmd_settle(args: &[String]) {
    let (path, format) = input_args(args);
    let ledger = load(&path);
    let plan = ledger.simplify().unwrap_or_else(|e| fail(e));
    let summary = SettlementSummary::new(&ledger, &plan);

    if format == "json" {
        let output = SettleOutput {
            balances: balance_rows(&ledger),
            summary,
            transfers: plan
                .transfers()
                .into_iter()
                .map(|t| TransferOutput {
                    from: t.debtor.to_string(),
                    to: t.creditor.to_string(),
                    amount: t.amount.to_string(),
                })
                .collect(),
        };
        print_json(&output);
    } else {
        println!("{}", ledger.balance_report());
        println!("Simplifying debts...");
        println!("{}", summary);
        if plan.is_empty() {
            println!("Everyone is settled up.");
        } else {
            print!("{}", plan);
        }
    }
}

fn cmd_balances(args: &[String]) {
    let (path, format) = input_args(args);
    let ledger = load(&path);

    if format == "json" {
        print_json(&BalancesOutput {
            balances: balance_rows(&ledger),
            raw_transfers: ledger.raw_transfer_count(),
        });
    } else {
        print!("{}", ledger.balance_report());
        println!("\nRaw transfers: {}", ledger.raw_transfer_count());
    }
}

fn numeric_arg<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| fail(format!("{} requires a number", flag)))
}

fn cmd_generate(args: &[String]) {
    let mut config = GeneratorConfig::default();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--participants" => {
                i += 1;
                config.participant_count = numeric_arg(args, i, "--participants");
            }
            "--expenses" => {
                i += 1;
                config.expense_count = numeric_arg(args, i, "--expenses");
            }
            "--seed" => {
                i += 1;
                config.seed = Some(numeric_arg(args, i, "--seed"));
            }
            "--output" => {
                i += 1;
                output_path = Some(
                    args.get(i)
                        .cloned()
                        .unwrap_or_else(|| fail("--output requires a file path")),
                );
            }
            _ => fail(format!("unknown option: {}", args[i])),
        }
        i += 1;
    }

    let ledger = generate_ledger(&config).unwrap_or_else(|e| fail(e));

    if let Some(path) = output_path {
        let file = File::create(&path).unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
        write_export(&ledger, file).unwrap_or_else(|e| fail(e));
        eprintln!(
            "Generated {} expenses across {} participants → {}",
            ledger.expenses().len(),
            ledger.participant_count(),
            path
        );
    } else {
        write_export(&ledger, io::stdout().lock()).unwrap_or_else(|e| fail(e));
    }
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "settle" => cmd_settle(rest),
        "balances" => cmd_balances(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
