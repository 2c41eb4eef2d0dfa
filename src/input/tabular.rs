//! Reader and writer for the tabular expense export.
//!
//! The export is a comma-separated file with one column per participant:
//!
//! ```text
//! Date,Description,Category,Cost,Currency,A,B,C,D
//!
//! 2024-03-01,Dinner,Food,59.71,USD,0.00,-29.85,29.85,0.00
//! 2024-03-02,Hotel,Lodging,407.00,USD,-135.66,-135.67,-135.67,407.00
//!
//! 2024-03-09,Total balance, , ,USD,-135.66,-165.52,-105.82,407.00
//! ```
//!
//! In each row exactly one participant column is positive: that person
//! paid. Negative columns are what the others owe them; zeros are
//! bystanders. Fields may be quoted (`"Dinner, drinks"`) and surrounding
//! whitespace is ignored.

use crate::core::error::LedgerError;
use crate::core::expense::{Expense, ExpenseDetails, ShareBreakdown};
use crate::core::ledger::Ledger;
use crate::core::participant::ParticipantId;
use csv::{ReaderBuilder, StringRecord, Trim, Writer};
use log::{debug, info};
use rust_decimal::Decimal;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Column layout of an export.
#[derive(Debug, Clone)]
pub struct ExportLayout {
    /// Index of the first participant column.
    pub first_participant_column: usize,
    /// Description that marks the trailing totals row.
    pub trailer_label: String,
}

impl Default for ExportLayout {
    fn default() -> Self {
        Self {
            first_participant_column: 5,
            trailer_label: "Total balance".to_string(),
        }
    }
}

/// Errors raised while reading an export.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read export: {0}")]
    Io(#[from] io::Error),

    #[error("malformed export: {0}")]
    Csv(#[from] csv::Error),

    #[error("export has no header row")]
    MissingHeader,

    #[error("header lists no participants after column {offset}")]
    NoParticipants { offset: usize },

    #[error("line {line}: expected {expected} columns, found {found}")]
    ColumnCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    #[error("line {line}: invalid number '{value}' in column {column}")]
    InvalidNumber {
        line: usize,
        column: String,
        value: String,
    },

    #[error("line {line}: no participant has a positive share")]
    NoCreditor { line: usize },

    #[error("line {line}: both {first} and {second} have a positive share")]
    MultipleCreditors {
        line: usize,
        first: ParticipantId,
        second: ParticipantId,
    },

    #[error("line {line}: {source}")]
    Rejected { line: usize, source: LedgerError },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// One data row, already split into creditor and debtor shares.
#[derive(Debug, Clone)]
pub struct ExpenseRow {
    /// 1-based line number in the export.
    pub line: usize,
    pub creditor: ParticipantId,
    pub cost: Decimal,
    pub shares: ShareBreakdown,
    pub details: ExpenseDetails,
}

impl ExpenseRow {
    pub fn into_expense(self) -> Expense {
        Expense::new(self.creditor, self.cost, self.shares).with_details(self.details)
    }
}

/// A parsed export: the participant roster and its expense rows.
#[derive(Debug, Clone)]
pub struct Export {
    pub participants: Vec<ParticipantId>,
    pub rows: Vec<ExpenseRow>,
}

impl Export {
    /// Register every participant and record every row.
    pub fn into_ledger(self) -> Result<Ledger, InputError> {
        let mut ledger = Ledger::new();
        for participant in self.participants {
            ledger.new_person(participant)?;
        }
        let row_count = self.rows.len();
        for row in self.rows {
            let line = row.line;
            ledger
                .record(row.into_expense())
                .map_err(|source| InputError::Rejected { line, source })?;
        }
        info!(
            "loaded {} expense(s) for {} participant(s)",
            row_count,
            ledger.participant_count()
        );
        Ok(ledger)
    }
}

/// Parse an export with the default layout.
pub fn parse_export<R: Read>(reader: R) -> Result<Export, InputError> {
    parse_export_with(reader, &ExportLayout::default())
}

/// Parse an export and build a ledger from it.
pub fn load_ledger<R: Read>(reader: R) -> Result<Ledger, InputError> {
    parse_export(reader)?.into_ledger()
}

pub fn parse_export_with<R: Read>(
    mut reader: R,
    layout: &ExportLayout,
) -> Result<Export, InputError> {
    let mut input = Vec::new();
    reader.read_to_end(&mut input)?;

    let mut csv_reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(input.as_slice());
    let mut records = csv_reader
        .records()
        .filter(|record| !matches!(record, Ok(r) if is_blank(r)));
    let offset = layout.first_participant_column;

    let header = records.next().ok_or(InputError::MissingHeader)??;
    let participants: Vec<ParticipantId> = header
        .iter()
        .skip(offset)
        .map(ParticipantId::new)
        .collect();
    if participants.is_empty() {
        return Err(InputError::NoParticipants { offset });
    }
    let expected = offset + participants.len();

    let mut rows = Vec::new();
    for record in records {
        let record = record?;
        let line = line_of(&input, &record);
        if record.get(1) == Some(layout.trailer_label.as_str()) {
            debug!("reached totals row at line {}", line);
            break;
        }
        if record.len() != expected {
            return Err(InputError::ColumnCount {
                line,
                expected,
                found: record.len(),
            });
        }
        rows.push(parse_row(line, &record, &participants, offset)?);
    }

    Ok(Export { participants, rows })
}

fn is_blank(record: &StringRecord) -> bool {
    record.iter().all(str::is_empty)
}

/// 1-based line on which the record starts.
///
/// A record's position points before any blank lines the reader skipped,
/// so those line breaks are counted here.
fn line_of(input: &[u8], record: &StringRecord) -> usize {
    let Some(pos) = record.position() else {
        return 0;
    };
    let start = usize::try_from(pos.byte()).unwrap_or(usize::MAX);
    let skipped = input
        .get(start..)
        .unwrap_or_default()
        .iter()
        .take_while(|b| matches!(b, b'\r' | b'\n'))
        .filter(|b| **b == b'\n')
        .count();
    usize::try_from(pos.line()).unwrap_or(usize::MAX) + skipped
}

fn parse_number(line: usize, column: &str, value: &str) -> Result<Decimal, InputError> {
    value.parse().map_err(|_| InputError::InvalidNumber {
        line,
        column: column.to_string(),
        value: value.to_string(),
    })
}

fn optional(cell: &str) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}

fn parse_row(
    line: usize,
    record: &StringRecord,
    participants: &[ParticipantId],
    offset: usize,
) -> Result<ExpenseRow, InputError> {
    let cell = |i: usize| record.get(i).unwrap_or("");
    let cost = parse_number(line, "Cost", cell(3))?;

    let mut creditor: Option<&ParticipantId> = None;
    let mut shares = ShareBreakdown::new();
    for (participant, raw) in participants.iter().zip(record.iter().skip(offset)) {
        let value = parse_number(line, participant.as_str(), raw)?;
        if value > Decimal::ZERO {
            if let Some(first) = creditor {
                return Err(InputError::MultipleCreditors {
                    line,
                    first: first.clone(),
                    second: participant.clone(),
                });
            }
            creditor = Some(participant);
        } else if value < Decimal::ZERO {
            shares.insert(participant.clone(), -value);
        }
    }
    let creditor = creditor.ok_or(InputError::NoCreditor { line })?;

    Ok(ExpenseRow {
        line,
        creditor: creditor.clone(),
        cost,
        shares,
        details: ExpenseDetails {
            date: optional(cell(0)),
            description: optional(cell(1)),
            category: optional(cell(2)),
            currency: optional(cell(4)),
        },
    })
}

/// Write a ledger's expenses back out in export form, ending with the
/// totals row. Fields containing commas or quotes are quoted.
pub fn write_export<W: Write>(ledger: &Ledger, writer: W) -> csv::Result<()> {
    let mut csv_writer = Writer::from_writer(writer);
    let participants: Vec<&ParticipantId> = ledger.participants().collect();

    let mut header = vec!["Date", "Description", "Category", "Cost", "Currency"];
    header.extend(participants.iter().map(|p| p.as_str()));
    csv_writer.write_record(&header)?;

    for expense in ledger.expenses() {
        let details = expense.details();
        let mut record = vec![
            details.date.clone().unwrap_or_default(),
            details.description.clone().unwrap_or_default(),
            details.category.clone().unwrap_or_default(),
            expense.amount().to_string(),
            details.currency.clone().unwrap_or_default(),
        ];
        record.extend(participants.iter().map(|p| {
            if *p == expense.creditor() {
                expense.shares().total().to_string()
            } else {
                expense
                    .shares()
                    .get(p)
                    .map(|share| (-share).to_string())
                    .unwrap_or_else(|| "0".to_string())
            }
        }));
        csv_writer.write_record(&record)?;
    }

    let mut totals = vec![String::new(), "Total balance".to_string()];
    totals.extend(std::iter::repeat(String::new()).take(3));
    totals.extend(ledger.balances().values().map(|b| b.to_string()));
    csv_writer.write_record(&totals)?;
    csv_writer.flush()?;
    Ok(())
}
