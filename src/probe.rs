//! One-shot port diagnostics.
//!
//! Probes open a port exclusively (no session, no listener) and run
//! synchronous exchanges through the command executor, so the drain-style
//! reads here never compete with a listener loop for the same channel.
//! (A port already held by a registry session cannot be probed: the serial
//! device is exclusively owned by that session.)
//!
//! Every failure is captured in the report rather than propagated; scanning
//! an inventory of ports should survive any single port misbehaving.

use serde::Serialize;
use std::io;
use tracing::{debug, info};

use crate::at::{self, executor, parser};
use crate::channel::{ChannelFactory, LineReader, LineWriter};
use crate::config::ProbeConfig;
use crate::discovery::{self, PortInfo};

/// SIM card status as classified from `AT+CPIN?` output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimStatus {
    Ready,
    NeedPin,
    NeedPuk,
    NotInserted,
    Unknown,
}

impl std::fmt::Display for SimStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimStatus::Ready => write!(f, "READY"),
            SimStatus::NeedPin => write!(f, "NEED_PIN"),
            SimStatus::NeedPuk => write!(f, "NEED_PUK"),
            SimStatus::NotInserted => write!(f, "NOT_INSERTED"),
            SimStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Classify `AT+CPIN?` output.
pub fn classify_sim_status(response: &str) -> SimStatus {
    if response.contains(at::SIM_READY) {
        SimStatus::Ready
    } else if response.contains("SIM PIN") {
        SimStatus::NeedPin
    } else if response.contains("SIM PUK") {
        SimStatus::NeedPuk
    } else if response.contains("SIM NOT INSERTED") {
        SimStatus::NotInserted
    } else {
        SimStatus::Unknown
    }
}

/// Outcome of probing one port.
#[derive(Debug, Clone, Serialize)]
pub struct PortReport {
    /// Port identifier
    pub port: String,

    /// Description from discovery, when probed via a scan
    pub description: Option<String>,

    /// Did the liveness probe answer `OK`
    pub at_ok: bool,

    /// SIM status, when the modem answered the liveness probe
    pub sim_status: Option<SimStatus>,

    /// Extracted subscriber number
    pub phone_number: Option<String>,

    /// USSD code that produced the number, when USSD was the source
    pub used_ussd: Option<String>,

    /// Raw text of the last query response (last write wins across USSD
    /// attempts, kept for debugging even when extraction failed)
    pub raw_response: Option<String>,

    /// Failure reason, when the probe stopped early
    pub error: Option<String>,
}

impl PortReport {
    fn new(port: &str) -> Self {
        Self {
            port: port.to_string(),
            description: None,
            at_ok: false,
            sim_status: None,
            phone_number: None,
            used_ussd: None,
            raw_response: None,
            error: None,
        }
    }
}

/// Probe one port for a live modem and its subscriber number.
pub async fn probe_port(
    factory: &dyn ChannelFactory,
    port: &str,
    config: &ProbeConfig,
) -> PortReport {
    let mut report = PortReport::new(port);

    let opened = factory
        .open(port, config.baud_rate, config.read_timeout)
        .await;
    let (mut reader, mut writer) = match opened {
        Ok(halves) => halves,
        Err(e) => {
            report.error = Some(format!("open failed: {e}"));
            return report;
        }
    };

    if let Err(e) = run_probe(reader.as_mut(), writer.as_mut(), config, &mut report).await {
        report.error = Some(format!("probe failed: {e}"));
    }
    report
}

async fn run_probe(
    reader: &mut dyn LineReader,
    writer: &mut dyn LineWriter,
    config: &ProbeConfig,
    report: &mut PortReport,
) -> io::Result<()> {
    let response = executor::send_command(reader, writer, at::PROBE, config.at_settle).await?;
    if !response.contains(at::OK) {
        report.error = Some(format!("no OK from {}: {response:?}", at::PROBE));
        return Ok(());
    }
    report.at_ok = true;

    let response = executor::send_command(reader, writer, at::SIM_STATUS, config.at_settle).await?;
    let status = classify_sim_status(&response);
    report.sim_status = Some(status);
    if status != SimStatus::Ready {
        report.error = Some(format!("SIM not ready: {response:?}"));
        return Ok(());
    }

    // ask the modem directly first
    let response =
        executor::send_command(reader, writer, at::SUBSCRIBER_NUMBER, config.cnum_settle).await?;
    if let Some(number) = parser::subscriber_number(&response) {
        debug!(port = %report.port, number = %number, "subscriber number from direct query");
        report.phone_number = Some(number);
        report.raw_response = Some(response);
        return Ok(());
    }

    // fall back to interrogating the network over USSD
    for code in &config.ussd_codes {
        executor::send_command(reader, writer, at::CHARSET_GSM, config.at_settle).await?;
        writer
            .write_all(format!("{}\r\n", at::ussd_initiate(code)).as_bytes())
            .await?;
        let raw = executor::drain_for(reader, config.ussd_window).await?;
        if raw.is_empty() {
            continue;
        }

        report.raw_response = Some(raw.clone());
        if let Some(number) = parser::first_msisdn(&raw) {
            debug!(port = %report.port, number = %number, code = %code, "subscriber number from ussd");
            report.phone_number = Some(number);
            report.used_ussd = Some(code.clone());
            break;
        }
    }

    if report.phone_number.is_none() {
        report.error = Some("no subscriber number in any response".to_string());
    }
    Ok(())
}

/// Probe every port in the host inventory.
pub async fn scan_all(
    factory: &dyn ChannelFactory,
    config: &ProbeConfig,
) -> io::Result<Vec<PortReport>> {
    let ports = discovery::list_ports()?;
    info!(ports = ports.len(), "scanning serial ports");

    let mut reports = Vec::with_capacity(ports.len());
    for PortInfo {
        device,
        description,
    } in ports
    {
        let mut report = probe_port(factory, &device, config).await;
        report.description = description;
        reports.push(report);
    }
    Ok(reports)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::mock::MockChannelFactory;
    use std::time::Duration;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fast_config() -> ProbeConfig {
        ProbeConfig {
            read_timeout: ms(40),
            at_settle: ms(10),
            cnum_settle: ms(10),
            ussd_window: ms(120),
            ussd_codes: vec!["*101#".to_string()],
            ..ProbeConfig::default()
        }
    }

    /// Script a device: answer each received command line with the paired
    /// response. Lines the script does not know are left unanswered.
    fn script_device(device: DuplexStream, pairs: Vec<(&'static str, &'static str)>) {
        tokio::spawn(async move {
            let mut lines = BufReader::new(device).lines();
            let mut responses: Vec<(String, String)> = pairs
                .into_iter()
                .map(|(c, r)| (c.to_string(), r.to_string()))
                .collect();
            while let Ok(Some(line)) = lines.next_line().await {
                let line = line.trim().to_string();
                if let Some(index) = responses.iter().position(|(c, _)| *c == line) {
                    let (_, response) = responses.remove(index);
                    let device = lines.get_mut().get_mut();
                    let _ = device.write_all(response.as_bytes()).await;
                }
            }
        });
    }

    #[test]
    fn test_classify_sim_status() {
        assert_eq!(classify_sim_status("+CPIN: READY\r\nOK"), SimStatus::Ready);
        assert_eq!(classify_sim_status("+CPIN: SIM PIN"), SimStatus::NeedPin);
        assert_eq!(classify_sim_status("+CPIN: SIM PUK"), SimStatus::NeedPuk);
        assert_eq!(
            classify_sim_status("+CME ERROR: SIM NOT INSERTED"),
            SimStatus::NotInserted
        );
        assert_eq!(classify_sim_status("garbage"), SimStatus::Unknown);
        assert_eq!(classify_sim_status(""), SimStatus::Unknown);
    }

    #[tokio::test]
    async fn test_probe_open_failure_is_reported() {
        let factory = MockChannelFactory::new();
        factory.fail_port("sim0");

        let report = probe_port(&factory, "sim0", &fast_config()).await;
        assert!(!report.at_ok);
        assert!(report.error.as_deref().unwrap().contains("open failed"));
    }

    /// Run a probe against a scripted device and return the report.
    async fn probe_scripted(pairs: Vec<(&'static str, &'static str)>) -> PortReport {
        let factory = std::sync::Arc::new(MockChannelFactory::new());
        let shared = factory.clone();
        let config = fast_config();

        let task =
            tokio::spawn(async move { probe_port(shared.as_ref(), "sim0", &config).await });

        // probe_port opens the channel before its first exchange, so the
        // device end is in the factory after a short pause
        tokio::time::sleep(ms(10)).await;
        let device = factory.take_device("sim0").expect("device not opened");
        script_device(device, pairs);

        task.await.expect("probe task panicked")
    }

    #[tokio::test]
    async fn test_probe_silent_modem_fails_liveness() {
        let report = probe_scripted(vec![]).await;
        assert!(!report.at_ok);
        assert!(report.error.as_deref().unwrap().contains("no OK"));
    }

    #[tokio::test]
    async fn test_probe_number_from_direct_query() {
        let report = probe_scripted(vec![
            ("AT", "OK\r\n"),
            ("AT+CPIN?", "+CPIN: READY\r\nOK\r\n"),
            ("AT+CNUM", "+CNUM: \"\",\"+84901234567\",129,7,4\r\nOK\r\n"),
        ])
        .await;

        assert!(report.at_ok);
        assert_eq!(report.sim_status, Some(SimStatus::Ready));
        assert_eq!(report.phone_number.as_deref(), Some("+84901234567"));
        assert!(report.used_ussd.is_none());
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_falls_back_to_ussd() {
        let report = probe_scripted(vec![
            ("AT", "OK\r\n"),
            ("AT+CPIN?", "+CPIN: READY\r\nOK\r\n"),
            ("AT+CNUM", "OK\r\n"),
            ("AT+CSCS=\"GSM\"", "OK\r\n"),
            (
                "AT+CUSD=1,\"*101#\",15",
                "+CUSD: 0,\"Goi dang ky 84901234567 thanh cong\",15\r\n",
            ),
        ])
        .await;

        assert!(report.at_ok);
        assert_eq!(report.phone_number.as_deref(), Some("84901234567"));
        assert_eq!(report.used_ussd.as_deref(), Some("*101#"));
        assert!(report
            .raw_response
            .as_deref()
            .unwrap()
            .contains("thanh cong"));
        assert!(report.error.is_none());
    }

    #[tokio::test]
    async fn test_probe_sim_not_ready_stops_early() {
        let report = probe_scripted(vec![
            ("AT", "OK\r\n"),
            ("AT+CPIN?", "+CPIN: SIM PIN\r\n"),
        ])
        .await;

        assert!(report.at_ok);
        assert_eq!(report.sim_status, Some(SimStatus::NeedPin));
        assert!(report.phone_number.is_none());
        assert!(report.error.as_deref().unwrap().contains("SIM not ready"));
    }
}
