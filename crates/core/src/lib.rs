pub mod account;
pub mod beancount;
pub mod money;
pub mod period;
pub mod transaction;

pub use account::{Account, AccountName, AccountType, LedgerError, CHECKING, DEFAULT_CURRENCY, RECEIPTS};
pub use money::Money;
pub use period::{DateWindow, DateWindowError};
pub use transaction::{LedgerRow, Posting, UnvalidatedTransaction, ValidatedTransaction, RECEIPT_NARRATION};
