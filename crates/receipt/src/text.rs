use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("PDF text extraction failed: {0}")]
    Pdf(String),
    #[error("Document contains no text")]
    Empty,
}

/// Abstraction over a document-to-text backend.
/// Implementations accept the raw document bytes and return its text.
pub trait TextExtractor: Send + Sync {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError>;
}

impl<T: TextExtractor + ?Sized> TextExtractor for Box<T> {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        (**self).extract_text(document)
    }
}

// ── PDF backend ───────────────────────────────────────────────────────────────

/// Reads the text layer of a PDF. Scanned PDFs without a text layer yield
/// [`ExtractError::Empty`].
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfTextExtractor;

impl TextExtractor for PdfTextExtractor {
    fn extract_text(&self, document: &[u8]) -> Result<String, ExtractError> {
        // pdf-extract can panic on malformed documents; emailed files are untrusted.
        let text = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(document))
            .map_err(|_| ExtractError::Pdf("parser panicked".to_string()))?
            .map_err(|e| ExtractError::Pdf(e.to_string()))?;
        if text.trim().is_empty() {
            return Err(ExtractError::Empty);
        }
        Ok(text)
    }
}

// ── Static backend (tests and fixtures) ───────────────────────────────────────

/// Returns a pre-set string regardless of the document.
pub struct StaticTextExtractor {
    pub text: String,
}

impl StaticTextExtractor {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

impl TextExtractor for StaticTextExtractor {
    fn extract_text(&self, _document: &[u8]) -> Result<String, ExtractError> {
        Ok(self.text.clone())
    }
}
