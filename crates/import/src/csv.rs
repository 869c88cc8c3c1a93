use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;

use crate::normalize::BankRow;

/// Header names of the expected bank statement layout.
#[derive(Debug, Clone)]
pub struct StatementColumns {
    pub date: String,
    pub description: String,
    pub amount: String,
    pub kind: String,
    pub payee: String,
}

impl Default for StatementColumns {
    fn default() -> Self {
        Self {
            date: "Date".to_string(),
            description: "Description".to_string(),
            amount: "Amount".to_string(),
            kind: "Type".to_string(),
            payee: "Payee".to_string(),
        }
    }
}

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Column positions resolved from the header row. `None` means the column is absent.
struct ColumnIndex {
    date: Option<usize>,
    description: Option<usize>,
    amount: Option<usize>,
    kind: Option<usize>,
    payee: Option<usize>,
}

impl ColumnIndex {
    fn resolve(headers: &csv::StringRecord, columns: &StatementColumns) -> Self {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);
        Self {
            date: find(&columns.date),
            description: find(&columns.description),
            amount: find(&columns.amount),
            kind: find(&columns.kind),
            payee: find(&columns.payee),
        }
    }
}

pub struct StatementReader {
    columns: StatementColumns,
}

impl Default for StatementReader {
    fn default() -> Self {
        Self::new(StatementColumns::default())
    }
}

impl StatementReader {
    pub fn new(columns: StatementColumns) -> Self {
        Self { columns }
    }

    /// Reads every data row. Missing columns default to empty, or `"0"` for the amount.
    pub fn read<R: Read>(&self, data: R) -> Result<Vec<BankRow>, StatementError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(data);

        let index = ColumnIndex::resolve(reader.headers()?, &self.columns);
        let mut rows = Vec::new();

        for result in reader.records() {
            let record = result?;

            if record.iter().all(|field| field.trim().is_empty()) {
                continue;
            }

            let field = |col: Option<usize>| col.and_then(|c| record.get(c)).map(str::trim);
            let non_empty = |col: Option<usize>| {
                field(col).filter(|s| !s.is_empty()).map(str::to_string)
            };

            rows.push(BankRow {
                date: field(index.date).unwrap_or_default().to_string(),
                description: non_empty(index.description),
                payee: non_empty(index.payee),
                amount: non_empty(index.amount).unwrap_or_else(|| "0".to_string()),
                kind: field(index.kind).unwrap_or_default().to_string(),
            });
        }

        Ok(rows)
    }

    pub fn read_path(&self, path: &Path) -> Result<Vec<BankRow>, StatementError> {
        self.read(File::open(path)?)
    }
}

pub fn read_bank_statement<R: Read>(data: R) -> Result<Vec<BankRow>, StatementError> {
    StatementReader::default().read(data)
}
