use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::message::{pdf_attachments, sent_date, Attachment};
use crate::search::SearchCriteria;
use crate::MailError;

const SEEN_DIR: &str = "seen";
const MESSAGE_EXT: &str = "eml";

/// Where receipt emails are picked up from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Directory of `.eml` files delivered by the mail fetcher.
    pub maildrop_dir: Option<PathBuf>,
}

/// An undecoded RFC 822 message and the id used to acknowledge it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub id: String,
    pub bytes: Vec<u8>,
}

pub trait MailSource: Send + Sync {
    fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<RawMessage>, MailError>;

    /// Marks a fetched message as read so an `UNSEEN` search skips it.
    fn mark_seen(&self, id: &str) -> Result<(), MailError>;
}

/// Maildrop folder: unread messages are `*.eml` files at the top level,
/// read ones are moved into `seen/`.
#[derive(Debug, Clone)]
pub struct DirectoryMailSource {
    dir: PathBuf,
}

impl DirectoryMailSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn from_config(config: &MailConfig) -> Result<Self, MailError> {
        config
            .maildrop_dir
            .clone()
            .map(Self::new)
            .ok_or(MailError::NotConfigured)
    }

    fn seen_dir(&self) -> PathBuf {
        self.dir.join(SEEN_DIR)
    }

    fn messages_in(dir: &Path) -> Result<Vec<PathBuf>, MailError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|x| x == MESSAGE_EXT))
            .collect();
        paths.sort();
        Ok(paths)
    }
}

impl MailSource for DirectoryMailSource {
    fn fetch(&self, criteria: &SearchCriteria) -> Result<Vec<RawMessage>, MailError> {
        if !self.dir.is_dir() {
            return Err(MailError::NotConfigured);
        }

        let mut paths = Self::messages_in(&self.dir)?;
        if !criteria.unseen {
            paths.extend(Self::messages_in(&self.seen_dir())?);
        }

        let mut messages = Vec::new();
        for path in paths {
            let bytes = fs::read(&path)?;
            let sent = match sent_date(&bytes) {
                Ok(sent) => sent,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "unreadable message: {e}");
                    continue;
                }
            };
            if !criteria.accepts(sent) {
                continue;
            }
            let id = path
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            messages.push(RawMessage { id, bytes });
        }

        tracing::debug!(dir = %self.dir.display(), count = messages.len(), keys = ?criteria.imap_keys(), "fetched messages");
        Ok(messages)
    }

    fn mark_seen(&self, id: &str) -> Result<(), MailError> {
        let from = self.dir.join(id);
        if !from.is_file() {
            return Ok(());
        }
        fs::create_dir_all(self.seen_dir())?;
        fs::rename(from, self.seen_dir().join(id))?;
        Ok(())
    }
}

/// The PDF attachments of one fetched message. The message stays unread
/// until the caller acknowledges `id` with [`MailSource::mark_seen`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptMessage {
    pub id: String,
    pub attachments: Vec<Attachment>,
}

/// Fetches matching messages and extracts their PDF attachments. A message
/// that cannot be parsed is skipped; nothing is marked seen here.
pub fn collect_pdf_attachments(
    source: &dyn MailSource,
    criteria: &SearchCriteria,
) -> Result<Vec<ReceiptMessage>, MailError> {
    let mut messages = Vec::new();

    for message in source.fetch(criteria)? {
        match pdf_attachments(&message.bytes) {
            Ok(attachments) => messages.push(ReceiptMessage {
                id: message.id,
                attachments,
            }),
            Err(e) => tracing::warn!(id = %message.id, "skipping message: {e}"),
        }
    }

    Ok(messages)
}
