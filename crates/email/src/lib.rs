pub mod message;
pub mod search;
pub mod source;

pub use message::{pdf_attachments, Attachment};
pub use search::SearchCriteria;
pub use source::{
    collect_pdf_attachments, DirectoryMailSource, MailConfig, MailSource, RawMessage, ReceiptMessage,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("Email source not configured")]
    NotConfigured,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Malformed message: {0}")]
    Parse(#[from] mailparse::MailParseError),
}
