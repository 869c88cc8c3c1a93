use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::account::{AccountName, LedgerError, CHECKING, DEFAULT_CURRENCY, RECEIPTS};
use super::money::Money;

pub const RECEIPT_NARRATION: &str = "Receipt from email";
pub const UNKNOWN_PAYEE: &str = "Unknown";

/// One leg of a transaction. Positive units debit the account, negative units credit it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub account: AccountName,
    pub units: Money,
    pub currency: String,
}

impl Posting {
    pub fn new(account: AccountName, units: Money, currency: &str) -> Self {
        Posting {
            account,
            units,
            currency: currency.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnvalidatedTransaction {
    pub date: NaiveDate,
    pub flag: char,
    pub payee: Option<String>,
    pub narration: String,
    pub postings: Vec<Posting>,
}

impl UnvalidatedTransaction {
    pub fn total_debits(&self) -> Money {
        self.postings
            .iter()
            .filter(|p| !p.units.is_negative())
            .map(|p| p.units)
            .sum()
    }

    pub fn total_credits(&self) -> Money {
        self.postings
            .iter()
            .filter(|p| p.units.is_negative())
            .map(|p| p.units.abs())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedTransaction {
    pub id: Option<i64>,
    pub date: NaiveDate,
    pub flag: char,
    pub payee: Option<String>,
    pub narration: String,
    pub postings: Vec<Posting>,
    pub balanced_total: Money,
}

impl ValidatedTransaction {
    pub fn validate(tx: UnvalidatedTransaction) -> Result<ValidatedTransaction, LedgerError> {
        if tx.postings.len() < 2 {
            return Err(LedgerError::EmptyTransaction);
        }

        let total_debits = tx.total_debits();
        let total_credits = tx.total_credits();

        if total_debits != total_credits {
            return Err(LedgerError::Unbalanced(total_debits, total_credits));
        }

        Ok(ValidatedTransaction {
            id: None,
            date: tx.date,
            flag: tx.flag,
            payee: tx.payee,
            narration: tx.narration,
            postings: tx.postings,
            balanced_total: total_debits,
        })
    }

    /// Builds the two-leg posting for a paid receipt: the expense is debited
    /// and checking is credited by the same amount.
    pub fn from_receipt(
        merchant: Option<&str>,
        amount: Money,
        date: NaiveDate,
    ) -> Result<ValidatedTransaction, LedgerError> {
        let expense: AccountName = RECEIPTS.parse()?;
        let checking: AccountName = CHECKING.parse()?;
        let payee = merchant
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_PAYEE);

        ValidatedTransaction::validate(UnvalidatedTransaction {
            date,
            flag: '*',
            payee: Some(payee.to_string()),
            narration: RECEIPT_NARRATION.to_string(),
            postings: vec![
                Posting::new(expense, amount, DEFAULT_CURRENCY),
                Posting::new(checking, -amount, DEFAULT_CURRENCY),
            ],
        })
    }

    /// The first posting, which is what the ledger reports as the transaction amount.
    pub fn primary_posting(&self) -> Option<&Posting> {
        self.postings.first()
    }
}

/// A recorded transaction as the ledger lists it: string-typed, one amount per entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub date: String,
    pub payee: Option<String>,
    pub amount: String,
    pub currency: String,
}

impl From<&ValidatedTransaction> for LedgerRow {
    fn from(tx: &ValidatedTransaction) -> Self {
        let (amount, currency) = tx
            .primary_posting()
            .map(|p| (format!("{:.2}", p.units.amount()), p.currency.clone()))
            .unwrap_or_else(|| ("0.00".to_string(), DEFAULT_CURRENCY.to_string()));
        LedgerRow {
            date: tx.date.format("%Y-%m-%d").to_string(),
            payee: tx.payee.clone(),
            amount,
            currency,
        }
    }
}
