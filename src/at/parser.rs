//! Pure response parsers.
//!
//! These classify device output and extract structured fields from free text.
//! No I/O, no state: absence of a match is a normal result, never an error.

use std::sync::LazyLock;

use regex::Regex;

/// Quoted sender field immediately after the incoming-SMS tag.
static SMS_SENDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\+CMT:\s*"([^"]+)""#).expect("sms sender pattern"));

/// First non-empty quoted field after the subscriber-number tag. For the
/// canonical `+CNUM: "","+84...",129,7,4` shape the empty alpha field cannot
/// satisfy `[^"]+`, so this lands on the number in the second position.
static CNUM_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\+CNUM:.*?"([^"]+)""#).expect("cnum number pattern"));

/// Country-code-prefixed or leading-zero digit run.
static MSISDN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(84\d{8,10}|0\d{8,10})").expect("msisdn pattern"));

/// Extract the sender from an incoming-SMS notification header line.
///
/// Returns `None` when the tag is absent or the quotes are malformed.
pub fn sms_notification_sender(line: &str) -> Option<String> {
    SMS_SENDER.captures(line).map(|c| c[1].to_string())
}

/// Extract the subscriber number from a `+CNUM`-style response.
///
/// Scans line by line; an empty quoted field yields `None`, never an empty
/// string.
pub fn subscriber_number(response: &str) -> Option<String> {
    for line in response.lines() {
        if !line.contains(crate::at::SUBSCRIBER_NUMBER_TAG) {
            continue;
        }
        if let Some(captures) = CNUM_NUMBER.captures(line) {
            let number = captures[1].trim();
            if !number.is_empty() {
                return Some(number.to_string());
            }
        }
    }
    None
}

/// Find the first MSISDN candidate in free text, in document order.
///
/// Zero-width spaces are stripped and non-breaking spaces mapped to plain
/// spaces before matching. This is a heuristic: digits embedded in unrelated
/// text can match, and that risk is accepted.
pub fn first_msisdn(text: &str) -> Option<String> {
    let clean = text.replace('\u{200b}', "").replace('\u{a0}', " ");
    MSISDN.find(&clean).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_sender_extracted_from_header() {
        let line = r#"+CMT: "+84901234567","","24/01/01,12:34:56+28""#;
        assert_eq!(
            sms_notification_sender(line),
            Some("+84901234567".to_string())
        );
    }

    #[test]
    fn test_sms_sender_missing_tag() {
        assert_eq!(sms_notification_sender(r#"+CUSD: 1,"hello",15"#), None);
        assert_eq!(sms_notification_sender(""), None);
    }

    #[test]
    fn test_sms_sender_malformed_quotes() {
        assert_eq!(sms_notification_sender("+CMT: +84901234567,145"), None);
        assert_eq!(sms_notification_sender(r#"+CMT: """#), None);
    }

    #[test]
    fn test_subscriber_number_second_quoted_field() {
        let resp = "AT+CNUM\r\n+CNUM: \"\",\"+84901234567\",129,7,4\r\n\r\nOK";
        assert_eq!(subscriber_number(resp), Some("+84901234567".to_string()));
    }

    #[test]
    fn test_subscriber_number_empty_field_is_none() {
        assert_eq!(subscriber_number("+CNUM: \"\",\"\",129,7,4"), None);
        assert_eq!(subscriber_number("+CNUM: \"\",\"   \",129,7,4"), None);
    }

    #[test]
    fn test_subscriber_number_absent_tag() {
        assert_eq!(subscriber_number("OK"), None);
        assert_eq!(subscriber_number(""), None);
    }

    #[test]
    fn test_subscriber_number_trims_whitespace() {
        assert_eq!(
            subscriber_number("+CNUM: \"\",\" +84901234567 \",129"),
            Some("+84901234567".to_string())
        );
    }

    #[test]
    fn test_msisdn_country_code_run() {
        assert_eq!(
            first_msisdn("Goi dang ky 84901234567 thanh cong"),
            Some("84901234567".to_string())
        );
    }

    #[test]
    fn test_msisdn_leading_zero_run() {
        assert_eq!(
            first_msisdn("So cua ban la 0901234567."),
            Some("0901234567".to_string())
        );
    }

    #[test]
    fn test_msisdn_first_match_in_document_order() {
        assert_eq!(
            first_msisdn("0901234567 truoc, 84907654321 sau"),
            Some("0901234567".to_string())
        );
    }

    #[test]
    fn test_msisdn_no_match() {
        assert_eq!(first_msisdn("khong co so nao o day"), None);
        assert_eq!(first_msisdn(""), None);
    }

    #[test]
    fn test_msisdn_strips_zero_width_and_nbsp() {
        let text = "so:\u{200b}8490\u{200b}1234567\u{a0}het";
        assert_eq!(first_msisdn(text), Some("84901234567".to_string()));
        // idempotent under repeated stripping
        let clean = text.replace('\u{200b}', "").replace('\u{a0}', " ");
        assert_eq!(first_msisdn(&clean), Some("84901234567".to_string()));
    }
}
