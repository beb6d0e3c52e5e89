use chrono::{DateTime, Utc};
use serde::Serialize;

/// An event published by a session.
///
/// Only two kinds exist: verbatim log lines (USSD replies, leftover command
/// output, lifecycle notes) and incoming SMS notifications. Events from one
/// session are strictly ordered: the listener loop is the single producer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionEvent {
    /// A raw line from the device, or an engine lifecycle note
    Log { text: String },

    /// An incoming SMS (sender absent when the header had no quoted field)
    Sms {
        sender: Option<String>,
        text: String,
    },
}

/// An event as recorded in the session's append-only log.
#[derive(Debug, Clone, Serialize)]
pub struct LoggedEvent {
    /// Production time
    pub at: DateTime<Utc>,

    #[serde(flatten)]
    pub event: SessionEvent,
}

/// A received SMS as stored in the session inbox.
#[derive(Debug, Clone, Serialize)]
pub struct SmsRecord {
    /// Port the message arrived on
    pub port: String,

    /// Sender number, when the notification header carried one
    pub sender: Option<String>,

    /// Message body
    pub text: String,

    /// Arrival time
    pub received_at: DateTime<Utc>,
}
