//! Plain-text ledger output in beancount syntax.

use std::fmt;

use crate::account::Account;
use crate::transaction::ValidatedTransaction;

/// A ledger rendered as a beancount file: `open` directives first, then
/// transactions in the order given.
pub struct Beancount<'a> {
    pub accounts: &'a [Account],
    pub transactions: &'a [ValidatedTransaction],
}

impl fmt::Display for Beancount<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for account in self.accounts {
            write_open(f, account)?;
        }
        for tx in self.transactions {
            write_transaction(f, tx)?;
        }
        Ok(())
    }
}

pub fn render(accounts: &[Account], transactions: &[ValidatedTransaction]) -> String {
    Beancount {
        accounts,
        transactions,
    }
    .to_string()
}

fn write_open(out: &mut impl fmt::Write, account: &Account) -> fmt::Result {
    writeln!(
        out,
        "{} open {} {}",
        account.opened,
        account.name,
        account.currencies.join(",")
    )?;
    writeln!(out)
}

fn write_transaction(out: &mut impl fmt::Write, tx: &ValidatedTransaction) -> fmt::Result {
    write!(out, "{} {}", tx.date, tx.flag)?;
    if let Some(payee) = &tx.payee {
        write!(out, " \"{}\"", escape(payee))?;
    }
    writeln!(out, " \"{}\"", escape(&tx.narration))?;
    for posting in &tx.postings {
        writeln!(
            out,
            "  {}  {:.2} {}",
            posting.account,
            posting.units.amount(),
            posting.currency
        )?;
    }
    writeln!(out)
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
