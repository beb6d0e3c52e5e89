//! In-memory channel factory for tests and fixtures.
//!
//! Each `open` call creates a duplex pair: the engine gets one end, framed
//! like a real serial channel, and the other end is kept so the test can play
//! the device (feed notification lines, inspect outbound commands).

use std::collections::HashSet;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::DuplexStream;

use super::{ChannelFactory, ChannelHalves, FramedLineReader, StreamWriter};

const BUFFER_SIZE: usize = 4096;

/// Factory handing out in-memory duplex channels.
#[derive(Default)]
pub struct MockChannelFactory {
    devices: Mutex<Vec<(String, DuplexStream)>>,
    failing: Mutex<HashSet<String>>,
}

impl MockChannelFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `open` calls for `port` fail, emulating a missing or
    /// busy device.
    pub fn fail_port(&self, port: &str) {
        self.failing
            .lock()
            .expect("failing lock poisoned")
            .insert(port.to_string());
    }

    /// Take the device end of the most recent channel opened for `port`.
    pub fn take_device(&self, port: &str) -> Option<DuplexStream> {
        let mut devices = self.devices.lock().expect("devices lock poisoned");
        let index = devices.iter().rposition(|(p, _)| p == port)?;
        Some(devices.remove(index).1)
    }
}

#[async_trait]
impl ChannelFactory for MockChannelFactory {
    async fn open(
        &self,
        port: &str,
        _baud_rate: u32,
        read_timeout: Duration,
    ) -> io::Result<ChannelHalves> {
        if self
            .failing
            .lock()
            .expect("failing lock poisoned")
            .contains(port)
        {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no such device: {port}"),
            ));
        }

        let (device, host) = tokio::io::duplex(BUFFER_SIZE);
        self.devices
            .lock()
            .expect("devices lock poisoned")
            .push((port.to_string(), device));

        let (read_half, write_half) = tokio::io::split(host);
        Ok((
            Box::new(FramedLineReader::new(read_half, read_timeout)),
            Box::new(StreamWriter::new(write_half)),
        ))
    }
}
