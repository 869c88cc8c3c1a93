pub mod extract;
pub mod hash;
pub mod pipeline;
pub mod text;
pub mod types;

pub use extract::ReceiptParser;
pub use hash::{AttachmentStore, StoredAttachment};
pub use pipeline::{PipelineError, ProcessedReceipt, ReceiptPipeline};
pub use text::{ExtractError, PdfTextExtractor, StaticTextExtractor, TextExtractor};
pub use types::{PostingError, ReceiptData};
