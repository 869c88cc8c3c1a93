use chrono::{Local, NaiveDate};
use ledgerline_core::{LedgerError, Money, ValidatedTransaction};
use ledgerline_import::{normalize_amount, parse_date, NormalizeError, RECEIPT_DATE_FORMATS};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PostingError {
    #[error("Receipt has no amount")]
    MissingAmount,
    #[error(transparent)]
    Amount(#[from] NormalizeError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Fields scraped from a receipt document. Values are kept exactly as they
/// appeared in the text; normalization happens when the receipt is posted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptData {
    pub merchant: Option<String>,
    pub amount: Option<String>,
    pub date: Option<String>,
    pub filename: String,
}

impl ReceiptData {
    /// The receipt's date, or `today` when it is missing or unreadable.
    pub fn posting_date(&self, today: NaiveDate) -> NaiveDate {
        let Some(raw) = self.date.as_deref() else {
            return today;
        };
        parse_date(&raw.replace('-', "/"), RECEIPT_DATE_FORMATS)
            .or_else(|| parse_date(raw, &["%Y-%m-%d"]))
            .unwrap_or(today)
    }

    /// Builds the ledger transaction for this receipt. A receipt without a
    /// valid amount is never posted.
    pub fn to_posting(&self) -> Result<ValidatedTransaction, PostingError> {
        self.to_posting_on(Local::now().date_naive())
    }

    pub fn to_posting_on(&self, today: NaiveDate) -> Result<ValidatedTransaction, PostingError> {
        let raw = self
            .amount
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or(PostingError::MissingAmount)?;
        let amount = Money::from_decimal(normalize_amount(raw)?);
        let date = self.posting_date(today);
        Ok(ValidatedTransaction::from_receipt(self.merchant.as_deref(), amount, date)?)
    }
}
