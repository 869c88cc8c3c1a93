use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use ledgerline_email::{DirectoryMailSource, MailSource};
use ledgerline_import::Reconciler;
use ledgerline_receipt::{PdfTextExtractor, ReceiptPipeline, TextExtractor};
use ledgerline_storage::LedgerStore;

use crate::config::AppConfig;

pub type Pipeline = ReceiptPipeline<Box<dyn TextExtractor>>;

#[derive(Clone)]
pub struct AppState {
    pub store: LedgerStore,
    /// `None` when no maildrop is configured.
    pub mail: Option<Arc<dyn MailSource>>,
    pub pipeline: Arc<Pipeline>,
    pub reconciler: Reconciler,
}

impl AppState {
    pub fn new(
        store: LedgerStore,
        mail: Option<Arc<dyn MailSource>>,
        extractor: Box<dyn TextExtractor>,
        attachments_dir: PathBuf,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            store,
            mail,
            pipeline: Arc::new(ReceiptPipeline::new(extractor, attachments_dir)),
            reconciler,
        }
    }

    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let storage = &config.storage;
        tokio::fs::create_dir_all(&storage.data_dir)
            .await
            .with_context(|| format!("creating data directory {}", storage.data_dir.display()))?;

        let store = LedgerStore::open(&storage.ledger_path())
            .await
            .context("opening ledger database")?;

        let mail = config.email.maildrop_dir.as_ref().map(|dir| {
            tracing::info!(maildrop = %dir.display(), "email intake enabled");
            Arc::new(DirectoryMailSource::new(dir.clone())) as Arc<dyn MailSource>
        });
        if mail.is_none() {
            tracing::warn!("no maildrop configured; email processing is disabled");
        }

        Ok(Self::new(
            store,
            mail,
            Box::new(PdfTextExtractor),
            storage.attachments_dir(),
            Reconciler::new(config.reconcile.policy),
        ))
    }
}
