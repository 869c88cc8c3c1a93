use std::sync::OnceLock;

use regex::Regex;

use crate::types::ReceiptData;

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_total_label,
    r"(?i)\b(?:grand\s+total|total\s+due|amount\s+due|balance\s+due|total)\s*:?\s*(\$?\s*[\d,]*\d\.\d{2})\b");
re!(re_amount,
    r"\$?\d[\d,]*\.\d{2}\b");
re!(re_date_numeric,
    r"\b\d{1,2}[/-]\d{1,2}[/-]\d{2,4}\b");
re!(re_date_iso,
    r"\b\d{4}-\d{2}-\d{2}\b");

/// How many leading lines are searched for the merchant name.
const MERCHANT_SCAN_LINES: usize = 10;

pub struct ReceiptParser;

impl ReceiptParser {
    /// Scrape merchant, amount and date from a receipt's extracted text.
    pub fn parse(text: &str, filename: &str) -> ReceiptData {
        ReceiptData {
            merchant: Self::merchant(text),
            amount: Self::amount(text),
            date: Self::date(text),
            filename: filename.to_string(),
        }
    }

    /// The first early line longer than three characters with no digits in it.
    fn merchant(text: &str) -> Option<String> {
        text.lines()
            .take(MERCHANT_SCAN_LINES)
            .map(str::trim)
            .find(|l| l.chars().count() > 3 && !l.chars().any(|c| c.is_ascii_digit()))
            .map(str::to_string)
    }

    /// A labeled total wins; otherwise the last amount on the page.
    fn amount(text: &str) -> Option<String> {
        let labeled = re_total_label()
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .last()
            .map(|m| m.as_str().replace(' ', ""));

        labeled.or_else(|| re_amount().find_iter(text).last().map(|m| m.as_str().to_string()))
    }

    /// The first date on the page, numeric month/day forms before ISO.
    fn date(text: &str) -> Option<String> {
        re_date_numeric()
            .find(text)
            .or_else(|| re_date_iso().find(text))
            .map(|m| m.as_str().to_string())
    }
}
