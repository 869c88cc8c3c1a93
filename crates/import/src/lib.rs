pub mod csv;
pub mod normalize;
pub mod reconcile;

pub use csv::{read_bank_statement, StatementColumns, StatementError, StatementReader};
pub use normalize::{
    normalize, normalize_amount, normalize_batch, normalize_date, normalize_date_or, normalize_on,
    parse_date, BankRow, NormalizeError, NormalizedBatch, NormalizedTransaction, RawTransaction,
    RejectedRow, SourceKind, BANK_DATE_FORMATS, RECEIPT_DATE_FORMATS,
};
pub use reconcile::{
    reconcile, MatchPair, MatchPolicy, ReconciliationDetails, ReconciliationResult,
    ReconciliationSummary, Reconciler, DEFAULT_PREVIEW_LIMIT,
};

pub use ledgerline_core::LedgerRow;
