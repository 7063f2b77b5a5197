//! Body-text receipt detection: does this email *itself* look like a receipt?
//!
//! Order matters here: signature/footer noise is stripped before keyword
//! scoring, so boilerplate ("powered by", legal disclaimers, sign-offs)
//! cannot trigger a false positive. Scoring then requires at least two
//! distinct keyword matches; one incidental "order" in a shipping footer
//! must not buy an expensive language-model call.

use regex::Regex;
use serde::Serialize;

/// Keywords that mark a body as receipt/invoice-like. Matching is
/// lowercase-substring; entries must be distinct to count twice.
pub const RECEIPT_KEYWORDS: &[&str] = &[
    "invoice",
    "receipt",
    "total",
    "vat",
    "payment confirmation",
    "tax invoice",
    "proof of payment",
    "credit note",
    "quotation",
    "amount due",
    "subtotal",
    "balance due",
    "payment received",
    "order confirmation",
    "purchase",
];

/// Line prefixes that open an email signature or footer.
const SIGNATURE_PREFIXES: &[&str] = &["sent from my", "powered by", "get outlook for"];

/// Short closing lines ("Thanks,", "Kind regards") that start the sign-off.
const CLOSING_PHRASES: &[&str] = &[
    "thanks",
    "thank you",
    "regards",
    "best regards",
    "kind regards",
    "warm regards",
    "cheers",
    "sincerely",
];

/// Legal-boilerplate openers.
const DISCLAIMER_PREFIXES: &[&str] = &[
    "this email and any attachments",
    "this message and any attachments",
    "confidentiality notice",
    "disclaimer:",
];

/// Longest a line may be and still count as a sign-off.
const MAX_CLOSING_LINE_CHARS: usize = 40;

/// Detector result: the decision plus the text the AI extractor should see.
#[derive(Debug, Clone, Serialize)]
pub struct BodyDetection {
    pub is_receipt_like: bool,
    pub matched_keywords: Vec<&'static str>,
    /// Signature-stripped plain text (derived from HTML when no text part)
    pub text: String,
}

/// Scores subject + body text against the receipt keyword table.
pub struct BodyReceiptDetector {
    script_style: Regex,
    tags: Regex,
}

impl BodyReceiptDetector {
    pub fn new() -> Self {
        Self {
            script_style: Regex::new(r"(?is)<(script|style|head)[^>]*>.*?</(script|style|head)>")
                .unwrap(),
            tags: Regex::new(r"<[^>]+>").unwrap(),
        }
    }

    /// Run detection over one email's subject and body parts.
    pub fn detect(&self, subject: &str, text: Option<&str>, html: Option<&str>) -> BodyDetection {
        let plain = match text {
            Some(t) if !t.trim().is_empty() => t.to_string(),
            _ => html.map(|h| self.html_to_text(h)).unwrap_or_default(),
        };
        let stripped = strip_signature(&plain);

        let haystack = format!("{subject}\n{stripped}").to_lowercase();
        let matched: Vec<&'static str> = RECEIPT_KEYWORDS
            .iter()
            .copied()
            .filter(|k| haystack.contains(k))
            .collect();

        BodyDetection {
            is_receipt_like: matched.len() >= 2,
            matched_keywords: matched,
            text: stripped,
        }
    }

    /// Build a plain-text equivalent of an HTML body: drop script/style
    /// blocks, turn block-level closers into newlines, strip tags, decode the
    /// common entities.
    pub fn html_to_text(&self, html: &str) -> String {
        let without_blocks = self.script_style.replace_all(html, " ");
        let with_breaks = without_blocks
            .replace("<br>", "\n")
            .replace("<br/>", "\n")
            .replace("<br />", "\n")
            .replace("</p>", "\n")
            .replace("</div>", "\n")
            .replace("</tr>", "\n")
            .replace("</li>", "\n");
        let stripped = self.tags.replace_all(&with_breaks, " ");
        // `&amp;` last so it cannot open a second round of decoding
        let decoded = stripped
            .replace("&nbsp;", " ")
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&amp;", "&");

        decoded
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Default for BodyReceiptDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Cut the text at the first signature/footer line; everything from that line
/// onward is discarded.
pub fn strip_signature(text: &str) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let cut = lines
        .iter()
        .position(|l| is_signature_cut(l))
        .unwrap_or(lines.len());
    lines[..cut].join("\n").trim_end().to_string()
}

fn is_signature_cut(line: &str) -> bool {
    let trimmed = line.trim().to_lowercase();
    if trimmed == "--" || trimmed == "—" {
        return true;
    }
    if SIGNATURE_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    if DISCLAIMER_PREFIXES.iter().any(|p| trimmed.starts_with(p)) {
        return true;
    }
    trimmed.len() <= MAX_CLOSING_LINE_CHARS
        && CLOSING_PHRASES.iter().any(|p| trimmed.starts_with(p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_distinct_keywords_required() {
        let d = BodyReceiptDetector::new();
        assert!(!d.detect("Your order", Some("shipping soon"), None).is_receipt_like);
        // Exactly one keyword: false
        assert!(!d.detect("", Some("your receipt is attached"), None).is_receipt_like);
        // Two distinct keywords: true
        assert!(
            d.detect("", Some("Tax Invoice\nTotal: R450.00"), None)
                .is_receipt_like
        );
    }

    #[test]
    fn subject_counts_toward_score() {
        let d = BodyReceiptDetector::new();
        let detection = d.detect("Payment confirmation", Some("Total: $15.00"), None);
        assert!(detection.is_receipt_like);
    }

    #[test]
    fn signature_keywords_do_not_score() {
        let d = BodyReceiptDetector::new();
        // Both keywords sit below the signature cut
        let body = "See you tomorrow.\n--\nJane Doe\nInvoice clerk\nTotal Accounting Ltd";
        let detection = d.detect("Hello", Some(body), None);
        assert!(!detection.is_receipt_like);
        assert!(!detection.text.contains("Invoice clerk"));
    }

    #[test]
    fn sign_off_line_cuts_the_tail() {
        let stripped = strip_signature("Tax Invoice\nTotal: R450.00\nThank you for your order\nACME (Pty) Ltd");
        assert!(stripped.ends_with("R450.00"));
    }

    #[test]
    fn long_lines_starting_with_thanks_are_kept() {
        let body = "thanks to your purchase last week we are issuing a credit note for the difference";
        let stripped = strip_signature(body);
        assert_eq!(stripped, body);
    }

    #[test]
    fn sent_from_my_cuts() {
        let stripped = strip_signature("Receipt attached\nSent from my iPhone");
        assert_eq!(stripped, "Receipt attached");
    }

    #[test]
    fn html_fallback_strips_tags_and_scripts() {
        let d = BodyReceiptDetector::new();
        let html = "<html><head><style>.x{color:red}</style></head>\
                    <body><p>Tax Invoice</p><script>track()</script>\
                    <div>Total:&nbsp;R99.00</div></body></html>";
        let detection = d.detect("", None, Some(html));
        assert!(detection.is_receipt_like);
        assert!(!detection.text.contains("track()"));
        assert!(!detection.text.contains("color:red"));
    }

    #[test]
    fn entities_decoded() {
        let d = BodyReceiptDetector::new();
        let text = d.html_to_text("<p>Fish &amp; Chips &#39;n stuff&nbsp;&lt;takeaway&gt;</p>");
        assert_eq!(text, "Fish & Chips 'n stuff <takeaway>");
    }

    #[test]
    fn plain_text_preferred_over_html() {
        let d = BodyReceiptDetector::new();
        let detection = d.detect("", Some("just text"), Some("<p>Tax Invoice Total</p>"));
        assert_eq!(detection.text, "just text");
    }
}
