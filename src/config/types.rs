use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

/// Root configuration for modemd
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Per-session defaults (baud, timing)
    #[serde(default)]
    pub defaults: SessionDefaults,

    /// Diagnostic probe settings
    #[serde(default)]
    pub probe: ProbeConfig,

    /// Logging settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,

    /// Ports to connect at startup
    #[serde(default)]
    pub autoconnect: Vec<String>,
}

/// HTTP API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind address
    #[serde(default = "default_api_address")]
    pub address: SocketAddr,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_api_address(),
        }
    }
}

fn default_api_address() -> SocketAddr {
    "127.0.0.1:8000".parse().expect("default api address")
}

/// Per-session defaults.
///
/// The settle durations are deliberate pacing pauses required by device
/// timing, not waits on a result; see the session module.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionDefaults {
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bound on each listener line read
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Event broadcast capacity per session
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Settle window after each initialization command
    #[serde(default = "default_init_settle", with = "humantime_serde")]
    pub init_settle: Duration,

    /// Pause after the text-mode select preceding an SMS send
    #[serde(default = "default_sms_mode_settle", with = "humantime_serde")]
    pub sms_mode_settle: Duration,

    /// Pause after the addressed-send command, before the body
    #[serde(default = "default_sms_address_settle", with = "humantime_serde")]
    pub sms_address_settle: Duration,

    /// Pause after the charset select preceding a USSD initiate
    #[serde(default = "default_ussd_charset_settle", with = "humantime_serde")]
    pub ussd_charset_settle: Duration,

    /// Backoff after a transient listener read failure
    #[serde(default = "default_error_backoff", with = "humantime_serde")]
    pub error_backoff: Duration,

    /// Grace pause letting the listener observe the stop flag on close
    #[serde(default = "default_close_grace", with = "humantime_serde")]
    pub close_grace: Duration,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout: default_read_timeout(),
            event_capacity: default_event_capacity(),
            init_settle: default_init_settle(),
            sms_mode_settle: default_sms_mode_settle(),
            sms_address_settle: default_sms_address_settle(),
            ussd_charset_settle: default_ussd_charset_settle(),
            error_backoff: default_error_backoff(),
            close_grace: default_close_grace(),
        }
    }
}

fn default_baud_rate() -> u32 {
    115_200
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(1)
}

fn default_event_capacity() -> usize {
    256
}

fn default_init_settle() -> Duration {
    Duration::from_millis(500)
}

fn default_sms_mode_settle() -> Duration {
    Duration::from_millis(300)
}

fn default_sms_address_settle() -> Duration {
    Duration::from_millis(500)
}

fn default_ussd_charset_settle() -> Duration {
    Duration::from_millis(200)
}

fn default_error_backoff() -> Duration {
    Duration::from_millis(500)
}

fn default_close_grace() -> Duration {
    Duration::from_millis(200)
}

/// Diagnostic probe configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Serial baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bound on each probe line read
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,

    /// Settle window after short commands
    #[serde(default = "default_init_settle", with = "humantime_serde")]
    pub at_settle: Duration,

    /// Settle window after the subscriber-number query (modems answer slowly)
    #[serde(default = "default_cnum_settle", with = "humantime_serde")]
    pub cnum_settle: Duration,

    /// Total drain window for a USSD reply
    #[serde(default = "default_ussd_window", with = "humantime_serde")]
    pub ussd_window: Duration,

    /// Candidate USSD codes tried in order until one yields a number.
    /// Carrier-specific; override for your network.
    #[serde(default = "default_ussd_codes")]
    pub ussd_codes: Vec<String>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            baud_rate: default_baud_rate(),
            read_timeout: default_read_timeout(),
            at_settle: default_init_settle(),
            cnum_settle: default_cnum_settle(),
            ussd_window: default_ussd_window(),
            ussd_codes: default_ussd_codes(),
        }
    }
}

fn default_cnum_settle() -> Duration {
    Duration::from_millis(1500)
}

fn default_ussd_window() -> Duration {
    Duration::from_secs(12)
}

fn default_ussd_codes() -> Vec<String> {
    vec!["*0#".to_string(), "*888#".to_string(), "*101#".to_string()]
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// JSON log format
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
