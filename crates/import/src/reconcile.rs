use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::normalize::NormalizedTransaction;

/// How many entries of each bucket a summary previews by default.
pub const DEFAULT_PREVIEW_LIMIT: usize = 10;

/// Whether a ledger transaction may satisfy more than one bank transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Each ledger transaction is consumed by its first match.
    #[default]
    OneToOne,
    /// Ledger transactions stay in the candidate pool after matching.
    AllowReuse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub bank: NormalizedTransaction,
    pub ledger: NormalizedTransaction,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationResult {
    pub matches: Vec<MatchPair>,
    pub ledger_only: Vec<NormalizedTransaction>,
    pub bank_only: Vec<NormalizedTransaction>,
}

impl ReconciliationResult {
    /// Both sides fully accounted for.
    pub fn is_reconciled(&self) -> bool {
        self.ledger_only.is_empty() && self.bank_only.is_empty()
    }

    /// Counts plus the first `limit` entries of each bucket.
    pub fn preview(&self, limit: usize) -> ReconciliationSummary {
        ReconciliationSummary {
            matches: self.matches.len(),
            ledger_only: self.ledger_only.len(),
            bank_only: self.bank_only.len(),
            details: ReconciliationDetails {
                matches: self.matches.iter().take(limit).cloned().collect(),
                ledger_only: self.ledger_only.iter().take(limit).cloned().collect(),
                bank_only: self.bank_only.iter().take(limit).cloned().collect(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationSummary {
    pub matches: usize,
    pub ledger_only: usize,
    pub bank_only: usize,
    pub details: ReconciliationDetails,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationDetails {
    pub matches: Vec<MatchPair>,
    pub ledger_only: Vec<NormalizedTransaction>,
    pub bank_only: Vec<NormalizedTransaction>,
}

/// Greedy first-fit matcher between bank and ledger transactions.
///
/// Bank transactions are visited in input order; each takes the first ledger
/// transaction (in input order) on the same date whose amount differs by
/// strictly less than `amount_tolerance`. Descriptions are not compared.
/// The outcome depends on input order and is not an optimal assignment.
#[derive(Debug, Clone)]
pub struct Reconciler {
    pub policy: MatchPolicy,
    pub amount_tolerance: Decimal,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            policy: MatchPolicy::OneToOne,
            amount_tolerance: Decimal::new(1, 2),
        }
    }
}

impl Reconciler {
    pub fn new(policy: MatchPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn is_match(&self, bank: &NormalizedTransaction, ledger: &NormalizedTransaction) -> bool {
        (bank.amount - ledger.amount).abs() < self.amount_tolerance && bank.date == ledger.date
    }

    pub fn reconcile(
        &self,
        bank: &[NormalizedTransaction],
        ledger: &[NormalizedTransaction],
    ) -> ReconciliationResult {
        let mut consumed = vec![false; ledger.len()];
        let mut result = ReconciliationResult::default();

        for b in bank {
            let candidate = ledger.iter().enumerate().find(|(i, l)| {
                (self.policy == MatchPolicy::AllowReuse || !consumed[*i]) && self.is_match(b, l)
            });

            match candidate {
                Some((i, l)) => {
                    consumed[i] = true;
                    result.matches.push(MatchPair {
                        bank: b.clone(),
                        ledger: l.clone(),
                    });
                }
                None => result.bank_only.push(b.clone()),
            }
        }

        result.ledger_only = ledger
            .iter()
            .zip(&consumed)
            .filter(|(_, used)| !**used)
            .map(|(l, _)| l.clone())
            .collect();

        tracing::debug!(
            bank = bank.len(),
            ledger = ledger.len(),
            matches = result.matches.len(),
            ledger_only = result.ledger_only.len(),
            bank_only = result.bank_only.len(),
            "reconciled"
        );

        result
    }
}

/// Reconciles with the default one-to-one policy and 0.01 tolerance.
pub fn reconcile(
    bank: &[NormalizedTransaction],
    ledger: &[NormalizedTransaction],
) -> ReconciliationResult {
    Reconciler::default().reconcile(bank, ledger)
}
