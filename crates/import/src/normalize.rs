use std::str::FromStr;

use chrono::{Local, NaiveDate};
use ledgerline_core::LedgerRow;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Formats tried for bank-statement and stored ledger dates, in priority order.
pub const BANK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Formats tried for dates scraped from receipts, in priority order.
pub const RECEIPT_DATE_FORMATS: &[&str] = &["%m/%d/%y", "%m/%d/%Y"];

const CURRENCY_SYMBOLS: &[char] = &['$', '€', '£', '¥', '₹'];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed amount: {0:?}")]
    MalformedAmount(String),
}

// ── Amounts ───────────────────────────────────────────────────────────────────

/// Parses a monetary amount such as `"$1,234.56"`, `"-45.67"` or `"(12.50)"`
/// into a signed decimal.
pub fn normalize_amount(raw: &str) -> Result<Decimal, NormalizeError> {
    let malformed = || NormalizeError::MalformedAmount(raw.to_string());

    let s = raw.trim();
    let (negative, s) = if s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        (true, &s[1..s.len() - 1])
    } else {
        (false, s)
    };

    let cleaned: String = s
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != ',' && !c.is_whitespace())
        .collect();

    if !is_decimal_literal(&cleaned) {
        return Err(malformed());
    }

    let value = Decimal::from_str(&cleaned).map_err(|_| malformed())?;
    Ok(if negative { -value } else { value })
}

/// Optional sign, digits, at most one decimal point, at least one digit.
fn is_decimal_literal(s: &str) -> bool {
    let digits = s.strip_prefix(['-', '+']).unwrap_or(s);
    let mut seen_digit = false;
    let mut seen_point = false;
    for c in digits.chars() {
        match c {
            '0'..='9' => seen_digit = true,
            '.' if !seen_point => seen_point = true,
            _ => return false,
        }
    }
    seen_digit
}

// ── Dates ─────────────────────────────────────────────────────────────────────

/// Parses `raw` with the first matching format. Unparseable or empty input
/// yields today's local date; this never fails.
pub fn normalize_date(raw: &str, formats: &[&str]) -> NaiveDate {
    normalize_date_or(raw, formats, Local::now().date_naive())
}

/// Same as [`normalize_date`] with an explicit fallback date.
pub fn normalize_date_or(raw: &str, formats: &[&str], fallback: NaiveDate) -> NaiveDate {
    parse_date(raw, formats).unwrap_or(fallback)
}

/// Strict variant: `None` when no format matches.
pub fn parse_date(raw: &str, formats: &[&str]) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    formats
        .iter()
        .filter(|fmt| has_full_year(s, fmt))
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// chrono's `%Y` takes any number of digits; a `%Y` field written with
/// fewer or more than four digits is not a match.
fn has_full_year(raw: &str, format: &str) -> bool {
    let Some(field) = format.split('%').skip(1).position(|spec| spec.starts_with('Y')) else {
        return true;
    };
    raw.split(|c: char| !c.is_ascii_digit())
        .filter(|f| !f.is_empty())
        .nth(field)
        .is_some_and(|year| year.len() == 4)
}

// ── Transactions ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Bank,
    Ledger,
}

/// One row of an uploaded bank statement, exactly as read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankRow {
    pub date: String,
    pub description: Option<String>,
    pub payee: Option<String>,
    pub amount: String,
    /// The statement's `Type` column (`debit`, `credit`, ...). Informational only.
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawTransaction {
    Bank(BankRow),
    Ledger(LedgerRow),
}

impl RawTransaction {
    pub fn kind(&self) -> SourceKind {
        match self {
            RawTransaction::Bank(_) => SourceKind::Bank,
            RawTransaction::Ledger(_) => SourceKind::Ledger,
        }
    }

    fn date_field(&self) -> &str {
        match self {
            RawTransaction::Bank(row) => &row.date,
            RawTransaction::Ledger(row) => &row.date,
        }
    }

    fn amount_field(&self) -> &str {
        match self {
            RawTransaction::Bank(row) => &row.amount,
            RawTransaction::Ledger(row) => &row.amount,
        }
    }

    /// Bank rows prefer their description and fall back to the payee;
    /// ledger rows only carry a payee.
    fn description_field(&self) -> &str {
        let candidates = match self {
            RawTransaction::Bank(row) => [row.description.as_deref(), row.payee.as_deref()],
            RawTransaction::Ledger(row) => [row.payee.as_deref(), None],
        };
        candidates
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_default()
    }
}

impl From<BankRow> for RawTransaction {
    fn from(row: BankRow) -> Self {
        RawTransaction::Bank(row)
    }
}

impl From<LedgerRow> for RawTransaction {
    fn from(row: LedgerRow) -> Self {
        RawTransaction::Ledger(row)
    }
}

/// Canonical comparison form shared by both sides of a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NormalizedTransaction {
    pub date: NaiveDate,
    pub amount: Decimal,
    pub description: String,
}

pub fn normalize(raw: &RawTransaction) -> Result<NormalizedTransaction, NormalizeError> {
    normalize_on(raw, Local::now().date_naive())
}

/// Normalizes with `today` standing in for unparseable dates.
pub fn normalize_on(
    raw: &RawTransaction,
    today: NaiveDate,
) -> Result<NormalizedTransaction, NormalizeError> {
    let amount = normalize_amount(raw.amount_field())?;
    let date = normalize_date_or(raw.date_field(), BANK_DATE_FORMATS, today);
    Ok(NormalizedTransaction {
        date,
        amount,
        description: raw.description_field().to_string(),
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    /// Position of the row in the input sequence.
    pub index: usize,
    pub kind: SourceKind,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedBatch {
    pub transactions: Vec<NormalizedTransaction>,
    pub rejected: Vec<RejectedRow>,
}

/// Normalizes every row, dropping rows whose amount is malformed instead of
/// failing the whole batch.
pub fn normalize_batch<I>(rows: I) -> NormalizedBatch
where
    I: IntoIterator,
    I::Item: Into<RawTransaction>,
{
    let today = Local::now().date_naive();
    let mut batch = NormalizedBatch::default();

    for (index, row) in rows.into_iter().enumerate() {
        let raw = row.into();
        match normalize_on(&raw, today) {
            Ok(tx) => batch.transactions.push(tx),
            Err(e) => {
                tracing::warn!(index, kind = ?raw.kind(), "skipping row: {e}");
                batch.rejected.push(RejectedRow {
                    index,
                    kind: raw.kind(),
                    reason: e.to_string(),
                });
            }
        }
    }

    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    // ── normalize_amount ──────────────────────────────────────────────────────

    #[test]
    fn amount_strips_symbol_and_grouping() {
        assert_eq!(normalize_amount("$1,234.56").unwrap(), dec("1234.56"));
        assert_eq!(normalize_amount("€ 1,000").unwrap(), dec("1000"));
        assert_eq!(normalize_amount("£7.50").unwrap(), dec("7.50"));
    }

    #[test]
    fn amount_keeps_sign() {
        assert_eq!(normalize_amount("-45.67").unwrap(), dec("-45.67"));
        assert_eq!(normalize_amount("-$45.67").unwrap(), dec("-45.67"));
        assert_eq!(normalize_amount("+3.00").unwrap(), dec("3"));
    }

    #[test]
    fn amount_accounting_parens_are_negative() {
        assert_eq!(normalize_amount("(75.25)").unwrap(), dec("-75.25"));
        assert_eq!(normalize_amount("($1,000.00)").unwrap(), dec("-1000"));
    }

    #[test]
    fn amount_rejects_garbage() {
        assert_eq!(
            normalize_amount("abc"),
            Err(NormalizeError::MalformedAmount("abc".to_string()))
        );
        assert!(normalize_amount("").is_err());
        assert!(normalize_amount("$").is_err());
        assert!(normalize_amount("1.2.3").is_err());
        assert!(normalize_amount("1_000").is_err());
        assert!(normalize_amount("12abc").is_err());
        assert!(normalize_amount("()").is_err());
    }

    #[test]
    fn amount_is_idempotent_on_canonical_output() {
        for raw in ["$1,234.56", "-45.67", "(0.99)", "10"] {
            let once = normalize_amount(raw).unwrap();
            let twice = normalize_amount(&once.to_string()).unwrap();
            assert_eq!(once, twice, "input {raw}");
        }
    }

    // ── normalize_date ────────────────────────────────────────────────────────

    #[test]
    fn date_bank_formats() {
        let fallback = d(2000, 1, 1);
        assert_eq!(normalize_date_or("2024-01-15", BANK_DATE_FORMATS, fallback), d(2024, 1, 15));
        assert_eq!(normalize_date_or("01/15/2024", BANK_DATE_FORMATS, fallback), d(2024, 1, 15));
        assert_eq!(normalize_date_or("15/01/2024", BANK_DATE_FORMATS, fallback), d(2024, 1, 15));
        assert_eq!(normalize_date_or("2024/01/15", BANK_DATE_FORMATS, fallback), d(2024, 1, 15));
        assert_eq!(normalize_date_or(" 2024-01-15 ", BANK_DATE_FORMATS, fallback), d(2024, 1, 15));
    }

    #[test]
    fn date_bank_formats_need_four_digit_years() {
        let fallback = d(2000, 1, 1);
        assert_eq!(normalize_date_or("01/15/24", BANK_DATE_FORMATS, fallback), fallback);
        assert_eq!(normalize_date_or("1/2/3", BANK_DATE_FORMATS, fallback), fallback);
        assert_eq!(normalize_date_or("24-01-15", BANK_DATE_FORMATS, fallback), fallback);
        assert_eq!(normalize_date_or("01/15/20245", BANK_DATE_FORMATS, fallback), fallback);
        assert_eq!(normalize_date_or("1/2/2024", BANK_DATE_FORMATS, fallback), d(2024, 1, 2));
    }

    #[test]
    fn date_ambiguous_slash_prefers_month_first() {
        let fallback = d(2000, 1, 1);
        assert_eq!(normalize_date_or("02/03/2024", BANK_DATE_FORMATS, fallback), d(2024, 2, 3));
    }

    #[test]
    fn date_receipt_formats() {
        let fallback = d(2000, 1, 1);
        assert_eq!(normalize_date_or("01/15/24", RECEIPT_DATE_FORMATS, fallback), d(2024, 1, 15));
        assert_eq!(normalize_date_or("01/15/2024", RECEIPT_DATE_FORMATS, fallback), d(2024, 1, 15));
        // ISO is not a receipt format.
        assert_eq!(normalize_date_or("2024-01-15", RECEIPT_DATE_FORMATS, fallback), fallback);
    }

    #[test]
    fn date_falls_back_to_today() {
        let today = Local::now().date_naive();
        assert_eq!(normalize_date("", BANK_DATE_FORMATS), today);
        assert_eq!(normalize_date("13/45/2024", BANK_DATE_FORMATS), today);
        assert_eq!(normalize_date("not a date", RECEIPT_DATE_FORMATS), today);
    }

    #[test]
    fn date_is_idempotent_on_canonical_output() {
        let fallback = d(2000, 1, 1);
        let once = normalize_date_or("03/04/2024", BANK_DATE_FORMATS, fallback);
        let twice = normalize_date_or(&once.to_string(), BANK_DATE_FORMATS, fallback);
        assert_eq!(once, twice);
    }

    #[test]
    fn parse_date_is_strict() {
        assert_eq!(parse_date("", BANK_DATE_FORMATS), None);
        assert_eq!(parse_date("2024-02-30", BANK_DATE_FORMATS), None);
    }

    // ── normalize ─────────────────────────────────────────────────────────────

    fn bank(date: &str, description: Option<&str>, payee: Option<&str>, amount: &str) -> BankRow {
        BankRow {
            date: date.to_string(),
            description: description.map(String::from),
            payee: payee.map(String::from),
            amount: amount.to_string(),
            kind: "debit".to_string(),
        }
    }

    fn ledger(date: &str, payee: Option<&str>, amount: &str) -> LedgerRow {
        LedgerRow {
            date: date.to_string(),
            payee: payee.map(String::from),
            amount: amount.to_string(),
            currency: "USD".to_string(),
        }
    }

    #[test]
    fn normalize_bank_row() {
        let raw = RawTransaction::from(bank("2024-01-15", Some("WALMART"), None, "$45.67"));
        assert_eq!(raw.kind(), SourceKind::Bank);
        let tx = normalize(&raw).unwrap();
        assert_eq!(tx.date, d(2024, 1, 15));
        assert_eq!(tx.amount, dec("45.67"));
        assert_eq!(tx.description, "WALMART");
    }

    #[test]
    fn normalize_bank_description_falls_back_to_payee() {
        let today = d(2024, 6, 1);
        let tx = normalize_on(&bank("2024-01-15", None, Some("ACME"), "1").into(), today).unwrap();
        assert_eq!(tx.description, "ACME");
        let tx = normalize_on(&bank("2024-01-15", Some(" "), Some("ACME"), "1").into(), today).unwrap();
        assert_eq!(tx.description, "ACME");
        let tx = normalize_on(&bank("2024-01-15", None, None, "1").into(), today).unwrap();
        assert_eq!(tx.description, "");
    }

    #[test]
    fn normalize_ledger_row_uses_payee() {
        let raw = RawTransaction::from(ledger("2024-01-18", Some("Local Coffee Shop"), "15.99"));
        assert_eq!(raw.kind(), SourceKind::Ledger);
        let tx = normalize(&raw).unwrap();
        assert_eq!(tx.date, d(2024, 1, 18));
        assert_eq!(tx.amount, dec("15.99"));
        assert_eq!(tx.description, "Local Coffee Shop");

        let tx = normalize(&ledger("2024-01-18", None, "1").into()).unwrap();
        assert_eq!(tx.description, "");
    }

    #[test]
    fn normalize_bad_date_uses_today() {
        let today = d(2024, 6, 1);
        let tx = normalize_on(&bank("someday", Some("X"), None, "1.00").into(), today).unwrap();
        assert_eq!(tx.date, today);
    }

    #[test]
    fn normalize_malformed_amount_fails() {
        let err = normalize(&bank("2024-01-15", Some("X"), None, "n/a").into()).unwrap_err();
        assert_eq!(err, NormalizeError::MalformedAmount("n/a".to_string()));
    }

    #[test]
    fn batch_skips_malformed_rows() {
        let rows = vec![
            bank("2024-01-15", Some("A"), None, "10.00"),
            bank("2024-01-16", Some("B"), None, "ten"),
            bank("2024-01-17", Some("C"), None, "12.00"),
        ];
        let batch = normalize_batch(rows);
        assert_eq!(batch.transactions.len(), 2);
        assert_eq!(batch.transactions[1].description, "C");
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].index, 1);
        assert_eq!(batch.rejected[0].kind, SourceKind::Bank);
    }
}
