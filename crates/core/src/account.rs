use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const CHECKING: &str = "Assets:Checking";
pub const RECEIPTS: &str = "Expenses:Receipts";
pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Income,
    Expense,
}

impl AccountType {
    /// Maps the root segment of a colon-separated account name.
    pub fn from_root(root: &str) -> Option<Self> {
        match root {
            "Assets" => Some(AccountType::Asset),
            "Liabilities" => Some(AccountType::Liability),
            "Equity" => Some(AccountType::Equity),
            "Income" => Some(AccountType::Income),
            "Expenses" => Some(AccountType::Expense),
            _ => None,
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountType::Asset => write!(f, "Asset"),
            AccountType::Liability => write!(f, "Liability"),
            AccountType::Equity => write!(f, "Equity"),
            AccountType::Income => write!(f, "Income"),
            AccountType::Expense => write!(f, "Expense"),
        }
    }
}

/// A validated colon-separated account name such as `Expenses:Receipts`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountName(String);

impl AccountName {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn account_type(&self) -> AccountType {
        // Construction guarantees a known root.
        self.0
            .split(':')
            .next()
            .and_then(AccountType::from_root)
            .unwrap_or(AccountType::Asset)
    }
}

impl FromStr for AccountName {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut segments = s.split(':');
        let root = segments.next().unwrap_or_default();
        if AccountType::from_root(root).is_none() {
            return Err(LedgerError::InvalidAccountName(s.to_string()));
        }
        let mut rest = segments.peekable();
        if rest.peek().is_none() {
            return Err(LedgerError::InvalidAccountName(s.to_string()));
        }
        for seg in rest {
            let valid = seg
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
                && seg.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
            if !valid {
                return Err(LedgerError::InvalidAccountName(s.to_string()));
            }
        }
        Ok(AccountName(s.to_string()))
    }
}

impl TryFrom<String> for AccountName {
    type Error = LedgerError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<AccountName> for String {
    fn from(name: AccountName) -> Self {
        name.0
    }
}

impl fmt::Display for AccountName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: AccountName,
    pub currencies: Vec<String>,
    pub opened: NaiveDate,
}

impl Account {
    pub fn open(name: AccountName, currency: &str, opened: NaiveDate) -> Self {
        Account {
            name,
            currencies: vec![currency.to_string()],
            opened,
        }
    }

    /// The accounts every receipt ledger needs, opened at the Unix epoch.
    pub fn defaults() -> Vec<Account> {
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
        [CHECKING, RECEIPTS]
            .iter()
            .map(|name| Account::open(AccountName(name.to_string()), DEFAULT_CURRENCY, epoch))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("Unbalanced transaction: debits={0}, credits={1}")]
    Unbalanced(super::money::Money, super::money::Money),
    #[error("Transaction must have at least two postings")]
    EmptyTransaction,
    #[error("Account not open: {0}")]
    UnknownAccount(String),
    #[error("Invalid account name: {0}")]
    InvalidAccountName(String),
}
