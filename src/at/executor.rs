//! Blocking command/response exchange.
//!
//! Used only where the listener loop is not competing for the channel:
//! session initialization and one-shot diagnostic probes. The exchange is
//! settle-time based, not event driven: the device gives no reply framing
//! beyond line endings, so we write, wait a fixed window, and drain whatever
//! arrived. An empty response is valid and means "nothing within the window".

use std::io;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use crate::channel::{LineReader, LineWriter};

/// Poll window used when draining lines that are already buffered.
const DRAIN_POLL: Duration = Duration::from_millis(50);

/// Write one command and return the text available after the settle window.
///
/// Stale input buffered from earlier traffic is discarded before the write.
/// No retry is performed; callers interpret the content (`OK`, `READY`, ...)
/// to decide success.
pub async fn send_command(
    reader: &mut dyn LineReader,
    writer: &mut dyn LineWriter,
    command: &str,
    settle: Duration,
) -> io::Result<String> {
    drain_available(reader).await?;
    writer
        .write_all(format!("{}\r\n", command.trim()).as_bytes())
        .await?;
    sleep(settle).await;
    drain_available(reader).await
}

/// Accumulate every line arriving within `window`, then return the lot.
///
/// Unlike [`send_command`] this reads for the whole window regardless of what
/// arrives. USSD replies trickle in with no terminator worth trusting.
pub async fn drain_for(reader: &mut dyn LineReader, window: Duration) -> io::Result<String> {
    let deadline = Instant::now() + window;
    let mut lines = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        match reader.read_line_within(remaining).await? {
            Some(line) => lines.push(line),
            None => break,
        }
    }
    Ok(join_trimmed(lines))
}

/// Drain lines currently available without blocking beyond a short poll.
async fn drain_available(reader: &mut dyn LineReader) -> io::Result<String> {
    let mut lines = Vec::new();
    while let Some(line) = reader.read_line_within(DRAIN_POLL).await? {
        lines.push(line);
    }
    Ok(join_trimmed(lines))
}

fn join_trimmed(lines: Vec<String>) -> String {
    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{FramedLineReader, StreamWriter};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[tokio::test]
    async fn test_send_command_returns_settled_response() {
        let (mut device, host) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(host);
        let mut reader = FramedLineReader::new(read_half, ms(30));
        let mut writer = StreamWriter::new(write_half);

        let exchange = tokio::spawn(async move {
            send_command(&mut reader, &mut writer, "AT", ms(120)).await
        });

        let mut cmd = [0u8; 4];
        device.read_exact(&mut cmd).await.unwrap();
        assert_eq!(&cmd, b"AT\r\n");
        device.write_all(b"\r\nOK\r\n").await.unwrap();

        let response = exchange.await.unwrap().unwrap();
        assert_eq!(response, "OK");
    }

    #[tokio::test]
    async fn test_send_command_discards_stale_input() {
        let (mut device, host) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(host);
        let mut reader = FramedLineReader::new(read_half, ms(30));
        let mut writer = StreamWriter::new(write_half);

        device.write_all(b"LEFTOVER\r\n").await.unwrap();

        let response = send_command(&mut reader, &mut writer, "AT+CMGF=1", ms(20))
            .await
            .unwrap();
        assert_eq!(response, "");
    }

    #[tokio::test]
    async fn test_silent_device_yields_empty_response() {
        let (_device, host) = tokio::io::duplex(1024);
        let (read_half, write_half) = tokio::io::split(host);
        let mut reader = FramedLineReader::new(read_half, ms(30));
        let mut writer = StreamWriter::new(write_half);

        let response = send_command(&mut reader, &mut writer, "AT", ms(20))
            .await
            .unwrap();
        assert_eq!(response, "");
    }

    #[tokio::test]
    async fn test_drain_for_accumulates_over_the_window() {
        let (mut device, host) = tokio::io::duplex(1024);
        let (read_half, _write_half) = tokio::io::split(host);
        let mut reader = FramedLineReader::new(read_half, ms(30));

        tokio::spawn(async move {
            device.write_all(b"+CUSD: 1,\"So cua ban\r\n").await.unwrap();
            tokio::time::sleep(ms(40)).await;
            device.write_all(b"la 84901234567\",15\r\n").await.unwrap();
        });

        let text = drain_for(&mut reader, ms(200)).await.unwrap();
        assert!(text.contains("So cua ban"));
        assert!(text.contains("84901234567"));
    }
}
