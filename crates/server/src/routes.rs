use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use ledgerline_core::{DateWindow, LedgerRow};
use ledgerline_email::{collect_pdf_attachments, Attachment, MailSource, SearchCriteria};
use ledgerline_import::{
    normalize_batch, read_bank_statement, RejectedRow, ReconciliationSummary,
    DEFAULT_PREVIEW_LIMIT,
};
use ledgerline_receipt::PostingError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;
const STATEMENT_FIELD: &str = "file";

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/ledger", get(ledger))
        .route("/ledger/beancount", get(ledger_beancount))
        .route("/process-emails", post(process_emails))
        .route("/upload-bank-statement", post(upload_bank_statement));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

// ── Ledger ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
struct LedgerResponse {
    success: bool,
    transactions: Vec<LedgerRow>,
}

async fn ledger(State(state): State<AppState>) -> Result<Json<LedgerResponse>, ApiError> {
    let transactions = state.store.list_transactions().await?;
    Ok(Json(LedgerResponse {
        success: true,
        transactions,
    }))
}

async fn ledger_beancount(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let text = state.store.export_beancount().await?;
    Ok(([(header::CONTENT_TYPE, "text/plain; charset=utf-8")], text))
}

// ── Email intake ──────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
struct ProcessEmailsRequest {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct TimeWindow {
    start_date: Option<String>,
    end_date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProcessedEntry {
    filename: String,
    merchant: Option<String>,
    amount: Option<String>,
    date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ProcessEmailsResponse {
    success: bool,
    processed_count: usize,
    skipped_count: usize,
    results: Vec<ProcessedEntry>,
    time_window: TimeWindow,
}

/// The body is optional; anything that is not a JSON object means "no window".
fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<ProcessEmailsRequest, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !is_json || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ProcessEmailsRequest::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
}

fn parse_request_date(raw: Option<&str>, field: &str) -> Result<Option<NaiveDate>, ApiError> {
    match raw.filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| ApiError::bad_request(format!("Invalid {field} format. Use YYYY-MM-DD"))),
    }
}

async fn process_emails(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ProcessEmailsResponse>, ApiError> {
    let request = parse_request(&headers, &body)?;
    let start = parse_request_date(request.start_date.as_deref(), "start_date")?;
    let end = parse_request_date(request.end_date.as_deref(), "end_date")?;
    let window = DateWindow::new(start, end).map_err(|e| ApiError::bad_request(e.to_string()))?;

    let source = state.mail.clone().ok_or(ledgerline_email::MailError::NotConfigured)?;
    let criteria = SearchCriteria::unseen().within(window);
    tracing::info!(%window, "processing receipt emails");

    let fetch_source = Arc::clone(&source);
    let messages =
        tokio::task::spawn_blocking(move || collect_pdf_attachments(fetch_source.as_ref(), &criteria))
            .await
            .map_err(anyhow::Error::from)??;

    let mut results = Vec::new();
    let mut skipped_count = 0;

    for message in messages {
        let mut settled = true;
        for attachment in &message.attachments {
            match post_receipt(&state, attachment).await {
                ReceiptOutcome::Posted(entry) => results.push(entry),
                ReceiptOutcome::Skipped => skipped_count += 1,
                ReceiptOutcome::Retry => {
                    skipped_count += 1;
                    settled = false;
                }
            }
        }

        if settled {
            mark_seen(Arc::clone(&source), message.id).await;
        } else {
            tracing::warn!(id = %message.id, "leaving message unread for a later run");
        }
    }

    tracing::info!(processed = results.len(), skipped = skipped_count, "email processing finished");

    Ok(Json(ProcessEmailsResponse {
        success: true,
        processed_count: results.len(),
        skipped_count,
        results,
        time_window: TimeWindow {
            start_date: request.start_date,
            end_date: request.end_date,
        },
    }))
}

enum ReceiptOutcome {
    Posted(ProcessedEntry),
    /// Nothing to post now or later: unreadable, no amount, or already posted.
    Skipped,
    /// The ledger could not record it; the message should be fetched again.
    Retry,
}

async fn post_receipt(state: &AppState, attachment: &Attachment) -> ReceiptOutcome {
    let filename = &attachment.filename;
    let processed = match state.pipeline.process_bytes(&attachment.data, filename).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(%filename, "could not read receipt: {e}");
            return ReceiptOutcome::Skipped;
        }
    };

    match state.store.has_receipt(&processed.hash_hex).await {
        Ok(false) => {}
        Ok(true) => {
            tracing::info!(%filename, hash = %processed.hash_hex, "receipt already posted");
            return ReceiptOutcome::Skipped;
        }
        Err(e) => {
            tracing::warn!(%filename, "could not check receipt history: {e}");
            return ReceiptOutcome::Retry;
        }
    }

    let receipt = processed.receipt;
    let tx = match receipt.to_posting() {
        Ok(tx) => tx,
        Err(PostingError::MissingAmount) => {
            tracing::info!(%filename, "no amount found, skipping");
            return ReceiptOutcome::Skipped;
        }
        Err(e) => {
            tracing::warn!(%filename, "could not post receipt: {e}");
            return ReceiptOutcome::Skipped;
        }
    };

    if let Err(e) = state
        .store
        .add_receipt(&tx, &processed.hash_hex, &receipt.filename)
        .await
    {
        tracing::warn!(%filename, "could not record receipt: {e}");
        return ReceiptOutcome::Retry;
    }

    ReceiptOutcome::Posted(ProcessedEntry {
        filename: receipt.filename,
        merchant: receipt.merchant,
        amount: receipt.amount,
        date: receipt.date,
    })
}

async fn mark_seen(source: Arc<dyn MailSource>, id: String) {
    let task_id = id.clone();
    match tokio::task::spawn_blocking(move || source.mark_seen(&task_id)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(%id, "could not mark message seen: {e}"),
        Err(e) => tracing::warn!(%id, "mark-seen task failed: {e}"),
    }
}

// ── Bank statement comparison ─────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct Comparison {
    #[serde(flatten)]
    summary: ReconciliationSummary,
    rejected: Vec<RejectedRow>,
}

#[derive(Debug, Serialize)]
struct ComparisonResponse {
    success: bool,
    comparison: Comparison,
}

async fn upload_bank_statement(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(e.body_text()))?
    {
        if field.name() != Some(STATEMENT_FIELD) {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        upload = Some((filename, data));
        break;
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::bad_request("No file uploaded"))?;
    if filename.is_empty() {
        return Err(ApiError::bad_request("No file selected"));
    }
    if !filename.ends_with(".csv") {
        return Err(ApiError::bad_request("Invalid file type"));
    }

    let bank_rows = read_bank_statement(data.as_ref())?;
    let ledger_rows = state.store.list_transactions().await?;

    let bank = normalize_batch(bank_rows);
    let ledger = normalize_batch(ledger_rows);
    let result = state.reconciler.reconcile(&bank.transactions, &ledger.transactions);

    tracing::info!(
        filename = %filename,
        matches = result.matches.len(),
        ledger_only = result.ledger_only.len(),
        bank_only = result.bank_only.len(),
        rejected = bank.rejected.len() + ledger.rejected.len(),
        "bank statement compared"
    );

    let mut rejected = bank.rejected;
    rejected.extend(ledger.rejected);

    Ok(Json(ComparisonResponse {
        success: true,
        comparison: Comparison {
            summary: result.preview(DEFAULT_PREVIEW_LIMIT),
            rejected,
        },
    }))
}
