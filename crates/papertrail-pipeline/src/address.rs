//! Address resolution: recipient header → alias token.
//!
//! Personal inbound addresses look like `jane1@receipts.papertrail.com` (or
//! the `.co.za` variant) and arrive wrapped in whatever the sending client
//! produced: bare, angle-bracketed, with a display name. The alias is the
//! lowercase alphanumeric token before the receipts domain; when the domain
//! doesn't match, the local-part before the first `@` is used as a fallback
//! so staging/test domains still resolve.

use regex::Regex;

/// Domains whose local-part is a receipt alias.
pub const ALIAS_DOMAINS: &[&str] = &["receipts.papertrail.com", "receipts.papertrail.co.za"];

/// Extract the alias token from a raw "to" header value.
///
/// Returns `None` when the header carries no `@` address at all: the
/// "malformed address" condition, distinct from an alias that simply doesn't
/// resolve to an account.
pub fn parse_receipt_alias(to_header: &str) -> Option<String> {
    let lower = to_header.to_lowercase();

    let alias_re = Regex::new(r"([a-z0-9]+)@receipts\.papertrail\.(?:com|co\.za)").unwrap();
    if let Some(captures) = alias_re.captures(&lower) {
        return Some(captures[1].to_string());
    }

    // Unknown domain: fall back to the local-part before the first '@'.
    let address = match (lower.find('<'), lower.rfind('>')) {
        (Some(open), Some(close)) if open < close => &lower[open + 1..close],
        _ => lower.as_str(),
    };
    let at = address.find('@')?;
    let local: String = address[..at]
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    if local.is_empty() {
        None
    } else {
        Some(local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_address_resolves() {
        assert_eq!(
            parse_receipt_alias("jane1@receipts.papertrail.com"),
            Some("jane1".to_string())
        );
    }

    #[test]
    fn display_name_and_angle_brackets_accepted() {
        assert_eq!(
            parse_receipt_alias("Jane Doe <jane1@receipts.papertrail.com>"),
            Some("jane1".to_string())
        );
    }

    #[test]
    fn both_domain_suffixes_accepted() {
        assert_eq!(
            parse_receipt_alias("bob7@receipts.papertrail.co.za"),
            Some("bob7".to_string())
        );
    }

    #[test]
    fn alias_is_lowercased() {
        assert_eq!(
            parse_receipt_alias("JANE1@RECEIPTS.PAPERTRAIL.COM"),
            Some("jane1".to_string())
        );
    }

    #[test]
    fn unknown_domain_falls_back_to_local_part() {
        assert_eq!(
            parse_receipt_alias("jane.doe@example.com"),
            Some("janedoe".to_string())
        );
        assert_eq!(
            parse_receipt_alias("Support <help-desk@corp.example>"),
            Some("helpdesk".to_string())
        );
    }

    #[test]
    fn no_address_is_none() {
        assert_eq!(parse_receipt_alias("undisclosed recipients"), None);
        assert_eq!(parse_receipt_alias(""), None);
    }
}
