use chrono::{Duration, NaiveDate};
use ledgerline_core::DateWindow;
use serde::Serialize;

/// Which messages to fetch: unread ones, optionally limited to a date window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SearchCriteria {
    pub unseen: bool,
    pub window: DateWindow,
}

impl SearchCriteria {
    pub fn unseen() -> Self {
        Self {
            unseen: true,
            window: DateWindow::unbounded(),
        }
    }

    pub fn within(mut self, window: DateWindow) -> Self {
        self.window = window;
        self
    }

    /// IMAP SEARCH keys. IMAP `BEFORE` is exclusive, so an inclusive end date
    /// becomes `BEFORE` the following day.
    pub fn imap_keys(&self) -> Vec<String> {
        let mut keys = Vec::new();
        if self.unseen {
            keys.push("UNSEEN".to_string());
        }
        if let Some(start) = self.window.start {
            keys.push(format!("SINCE {}", imap_date(start)));
        }
        if let Some(end) = self.window.end {
            keys.push(format!("BEFORE {}", imap_date(end + Duration::days(1))));
        }
        keys
    }

    /// Undated messages only pass an unbounded window.
    pub fn accepts(&self, sent: Option<NaiveDate>) -> bool {
        match sent {
            Some(date) => self.window.contains(date),
            None => self.window.is_unbounded(),
        }
    }
}

fn imap_date(date: NaiveDate) -> String {
    date.format("%d-%b-%Y").to_string()
}
