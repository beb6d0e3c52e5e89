//! The fixed AT command vocabulary this engine speaks.
//!
//! Commands are written with a trailing `\r` (interactive sends) or `\r\n`
//! (executor exchanges); the SMS body is terminated by a single Ctrl+Z byte.

/// Liveness probe. A responsive modem answers `OK`.
pub const PROBE: &str = "AT";

/// Select text-mode SMS (as opposed to PDU mode).
pub const TEXT_MODE: &str = "AT+CMGF=1";

/// Select the GSM 7-bit character set.
pub const CHARSET_GSM: &str = "AT+CSCS=\"GSM\"";

/// Push new-message notifications to the host immediately (`+CMT:` URCs)
/// instead of storing them on the SIM.
pub const PUSH_NOTIFICATIONS: &str = "AT+CNMI=2,2,0,0,0";

/// SIM status query (`READY`, `SIM PIN`, ...).
pub const SIM_STATUS: &str = "AT+CPIN?";

/// Subscriber-number query.
pub const SUBSCRIBER_NUMBER: &str = "AT+CNUM";

/// Header tag of an incoming-SMS notification; the message body follows on
/// the next line.
pub const SMS_NOTIFICATION_TAG: &str = "+CMT:";

/// Tag of a subscriber-number response line.
pub const SUBSCRIBER_NUMBER_TAG: &str = "+CNUM:";

/// Success marker in command output.
pub const OK: &str = "OK";

/// SIM-ready marker in `AT+CPIN?` output.
pub const SIM_READY: &str = "READY";

/// Ctrl+Z, the end-of-message byte for an SMS body.
pub const END_OF_MESSAGE: u8 = 0x1A;

/// Addressed SMS send. The device answers with a `>` prompt and expects the
/// body next, terminated by [`END_OF_MESSAGE`].
pub fn sms_send(phone: &str) -> String {
    format!("AT+CMGS=\"{phone}\"")
}

/// Initiate a USSD session for `code` with a 15-second network validity
/// period. The reply arrives later as a `+CUSD:` line.
pub fn ussd_initiate(code: &str) -> String {
    format!("AT+CUSD=1,\"{code}\",15")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sms_send_quotes_destination() {
        assert_eq!(sms_send("+84901234567"), "AT+CMGS=\"+84901234567\"");
    }

    #[test]
    fn test_ussd_initiate_carries_validity_period() {
        assert_eq!(ussd_initiate("*101#"), "AT+CUSD=1,\"*101#\",15");
    }
}
