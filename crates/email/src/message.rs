use chrono::{DateTime, NaiveDate};
use mailparse::{parse_mail, MailHeaderMap, ParsedMail};

use crate::MailError;

/// A decoded file attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Every attachment whose filename ends in `.pdf`, in MIME tree order.
pub fn pdf_attachments(raw: &[u8]) -> Result<Vec<Attachment>, MailError> {
    let mail = parse_mail(raw)?;
    let mut found = Vec::new();
    walk(&mail, &mut found)?;
    Ok(found)
}

/// The calendar date from the `Date:` header, if present and readable.
pub fn sent_date(raw: &[u8]) -> Result<Option<NaiveDate>, MailError> {
    let mail = parse_mail(raw)?;
    Ok(mail
        .headers
        .get_first_value("Date")
        .and_then(|v| mailparse::dateparse(&v).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map(|dt| dt.date_naive()))
}

fn walk(part: &ParsedMail<'_>, found: &mut Vec<Attachment>) -> Result<(), MailError> {
    if part.ctype.mimetype.starts_with("multipart/") {
        for sub in &part.subparts {
            walk(sub, found)?;
        }
        return Ok(());
    }

    if let Some(filename) = filename(part) {
        if filename.to_lowercase().ends_with(".pdf") {
            found.push(Attachment {
                filename,
                content_type: part.ctype.mimetype.clone(),
                data: part.get_body_raw()?,
            });
        }
    }
    Ok(())
}

/// `Content-Disposition: filename=` first, then `Content-Type: name=`.
fn filename(part: &ParsedMail<'_>) -> Option<String> {
    let disposition = part.get_content_disposition();
    disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
