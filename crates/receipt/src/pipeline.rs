use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::extract::ReceiptParser;
use crate::hash::AttachmentStore;
use crate::text::{ExtractError, TextExtractor};
use crate::types::ReceiptData;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Text extraction failed: {0}")]
    Extract(#[from] ExtractError),
}

/// The result of running one receipt document through the pipeline.
#[derive(Debug)]
pub struct ProcessedReceipt {
    /// SHA-256 hex digest of the document.
    pub hash_hex: String,
    pub attachment_path: PathBuf,
    /// Identical bytes were already in the attachment store.
    pub duplicate: bool,
    pub text: String,
    pub receipt: ReceiptData,
}

/// Orchestrates: hash → content-store → text extraction → field extraction.
pub struct ReceiptPipeline<E: TextExtractor> {
    extractor: E,
    store: AttachmentStore,
}

impl<E: TextExtractor> ReceiptPipeline<E> {
    pub fn new(extractor: E, attachments_dir: PathBuf) -> Self {
        Self {
            extractor,
            store: AttachmentStore::new(attachments_dir),
        }
    }

    /// Process a document on disk.
    pub async fn process_file(&self, path: &Path) -> Result<ProcessedReceipt, PipelineError> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("receipt.pdf");
        self.process_bytes(&bytes, filename).await
    }

    /// Process a document already in memory, such as an email attachment.
    pub async fn process_bytes(
        &self,
        data: &[u8],
        filename: &str,
    ) -> Result<ProcessedReceipt, PipelineError> {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("pdf")
            .to_lowercase();

        let stored = self.store.store(data, &ext).await?;
        let text = self.extractor.extract_text(data)?;
        let receipt = ReceiptParser::parse(&text, filename);

        tracing::debug!(
            filename,
            hash = %stored.hash_hex,
            duplicate = stored.duplicate,
            merchant = ?receipt.merchant,
            amount = ?receipt.amount,
            "receipt extracted"
        );

        Ok(ProcessedReceipt {
            hash_hex: stored.hash_hex,
            attachment_path: stored.path,
            duplicate: stored.duplicate,
            text,
            receipt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::StaticTextExtractor;

    #[tokio::test]
    async fn process_bytes_extracts_fields() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ReceiptPipeline::new(
            StaticTextExtractor::new("Local Coffee Shop\n01/18/24\nLatte 4.50\nTotal $15.99"),
            dir.path().to_path_buf(),
        );

        let result = pipeline.process_bytes(b"%PDF-1.4 fake", "coffee.PDF").await.unwrap();

        assert_eq!(result.hash_hex.len(), 64);
        assert!(result.attachment_path.exists());
        assert_eq!(result.attachment_path.extension().unwrap(), "pdf");
        assert!(!result.duplicate);
        assert_eq!(result.receipt.merchant.as_deref(), Some("Local Coffee Shop"));
        assert_eq!(result.receipt.amount.as_deref(), Some("$15.99"));
        assert_eq!(result.receipt.date.as_deref(), Some("01/18/24"));
        assert_eq!(result.receipt.filename, "coffee.PDF");
    }

    #[tokio::test]
    async fn same_document_twice_is_flagged_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ReceiptPipeline::new(StaticTextExtractor::new("X"), dir.path().to_path_buf());

        let first = pipeline.process_bytes(b"same", "a.pdf").await.unwrap();
        let second = pipeline.process_bytes(b"same", "b.pdf").await.unwrap();

        assert!(!first.duplicate);
        assert!(second.duplicate);
        assert_eq!(first.attachment_path, second.attachment_path);
    }

    #[tokio::test]
    async fn process_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let doc = dir.path().join("walmart.pdf");
        std::fs::write(&doc, b"%PDF walmart").unwrap();
        let pipeline = ReceiptPipeline::new(
            StaticTextExtractor::new("Walmart\nTotal $45.67"),
            dir.path().join("attachments"),
        );

        let result = pipeline.process_file(&doc).await.unwrap();
        assert_eq!(result.receipt.filename, "walmart.pdf");
        assert_eq!(result.receipt.amount.as_deref(), Some("$45.67"));
    }

    #[tokio::test]
    async fn extraction_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = ReceiptPipeline::new(crate::text::PdfTextExtractor, dir.path().to_path_buf());
        let result = pipeline.process_bytes(b"not a pdf", "bad.pdf").await;
        assert!(matches!(result, Err(PipelineError::Extract(_))));
    }
}
