//! Line channel adapter.
//!
//! The session engine never touches a serial device directly: it reads and
//! writes through the [`LineReader`] / [`LineWriter`] pair produced by a
//! [`ChannelFactory`]. The production factory opens a `tokio-serial` stream
//! and splits it; [`mock::MockChannelFactory`] hands out in-memory duplex
//! channels for tests and fixtures.

pub mod mock;

use std::io;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::timeout;
use tokio_serial::SerialPortBuilderExt;

/// Read half of a line channel.
///
/// Every read is bounded: `Ok(None)` means the window elapsed without a
/// complete line and is not an error. A closed channel surfaces as an
/// `UnexpectedEof` I/O error.
#[async_trait]
pub trait LineReader: Send {
    /// One bounded line read using the channel's configured timeout.
    async fn read_line(&mut self) -> io::Result<Option<String>>;

    /// One bounded line read with an explicit window.
    async fn read_line_within(&mut self, wait: Duration) -> io::Result<Option<String>>;
}

/// Write half of a line channel. Writes are flushed before returning.
#[async_trait]
pub trait LineWriter: Send {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()>;
}

/// Both halves of an opened channel, in read/write order.
pub type ChannelHalves = (Box<dyn LineReader>, Box<dyn LineWriter>);

/// Opens channels keyed by port identifier.
#[async_trait]
pub trait ChannelFactory: Send + Sync {
    async fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<ChannelHalves>;
}

/// Newline-framed reader over any byte stream.
///
/// Bytes consumed from the stream are accumulated in `pending`, so a line
/// split across read windows is completed by a later call instead of lost.
/// Lines are decoded lossily and trimmed (`\r\n` endings and padding spaces
/// removed).
pub struct FramedLineReader<R> {
    inner: BufReader<R>,
    pending: Vec<u8>,
    read_timeout: Duration,
}

impl<R: AsyncRead + Unpin + Send> FramedLineReader<R> {
    pub fn new(stream: R, read_timeout: Duration) -> Self {
        Self {
            inner: BufReader::new(stream),
            pending: Vec::new(),
            read_timeout,
        }
    }

    fn take_line(&mut self) -> String {
        let raw = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&raw).trim().to_string()
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> LineReader for FramedLineReader<R> {
    async fn read_line(&mut self) -> io::Result<Option<String>> {
        let wait = self.read_timeout;
        self.read_line_within(wait).await
    }

    async fn read_line_within(&mut self, wait: Duration) -> io::Result<Option<String>> {
        match timeout(wait, self.inner.read_until(b'\n', &mut self.pending)).await {
            // Window elapsed; whatever arrived stays in `pending`.
            Err(_) => Ok(None),
            Ok(Ok(0)) => {
                if self.pending.is_empty() {
                    Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "line channel closed",
                    ))
                } else {
                    // EOF with an unterminated final line.
                    Ok(Some(self.take_line()))
                }
            }
            Ok(Ok(_)) => Ok(Some(self.take_line())),
            Ok(Err(e)) => Err(e),
        }
    }
}

/// Flushing writer over any byte sink.
pub struct StreamWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin + Send> StreamWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { inner: sink }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send> LineWriter for StreamWriter<W> {
    async fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        AsyncWriteExt::write_all(&mut self.inner, bytes).await?;
        self.inner.flush().await
    }
}

/// Production factory: opens a serial device and splits it into halves.
pub struct SerialChannelFactory;

#[async_trait]
impl ChannelFactory for SerialChannelFactory {
    async fn open(
        &self,
        port: &str,
        baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<ChannelHalves> {
        let stream = tokio_serial::new(port, baud_rate)
            .open_native_async()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let (read_half, write_half) = tokio::io::split(stream);
        Ok((
            Box::new(FramedLineReader::new(read_half, read_timeout)),
            Box::new(StreamWriter::new(write_half)),
        ))
    }
}
