//! Normalization helpers for money amounts and receipt dates.
//!
//! Totals arrive as whatever the OCR service or language model felt like
//! returning: `"R1,234.50"`, `"$ 45"`, `"1234,50"`, `"-12.00"`. The receipt
//! invariant is a bare non-negative decimal string with two fraction digits.

use chrono::NaiveDate;

/// Normalize an amount string to a non-negative `"1234.50"`-style decimal.
///
/// Currency symbols and thousands separators are dropped; a single trailing
/// comma-decimal (`"1234,50"`) is accepted. Unparseable or negative input
/// collapses to `"0.00"`.
pub fn normalize_total(raw: &str) -> String {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == ',' || *c == '-')
        .collect();

    // "1.234,50" / "1234,50" → comma is the decimal separator
    if let Some(comma) = cleaned.rfind(',') {
        let fraction_len = cleaned.len() - comma - 1;
        if fraction_len <= 2 && !cleaned[comma..].contains('.') {
            cleaned = format!(
                "{}.{}",
                cleaned[..comma].replace(['.', ','], ""),
                &cleaned[comma + 1..]
            );
        } else {
            cleaned = cleaned.replace(',', "");
        }
    }

    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => format!("{v:.2}"),
        _ => "0.00".to_string(),
    }
}

/// Lenient calendar-date parsing across the formats receipts actually use.
///
/// Returns `None` when nothing matches; callers default to "today" per the
/// extraction invariant.
pub fn parse_date_lenient(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    // ISO first (the AI contract asks for it), then the usual suspects.
    const FORMATS: &[&str] = &[
        "%Y-%m-%d",
        "%Y/%m/%d",
        "%d/%m/%Y",
        "%d-%m-%Y",
        "%d %b %Y",
        "%d %B %Y",
        "%b %d, %Y",
        "%B %d, %Y",
    ];

    for format in FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }

    // Timestamps like "2024-03-01T10:22:00Z": take the date part.
    if raw.len() >= 10 {
        if let Ok(date) = NaiveDate::parse_from_str(&raw[..10], "%Y-%m-%d") {
            return Some(date);
        }
    }

    None
}
