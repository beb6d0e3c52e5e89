//! Per-port modem session.
//!
//! A session exclusively owns one line channel. After the initialization
//! sequence completes, a dedicated listener task performs every read; callers
//! only ever write, under the session's lock. Replies to outbound commands
//! are therefore never awaited in place; they surface later through the
//! listener as ordinary log events.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{broadcast, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::at::{self, executor, parser};
use crate::channel::{ChannelFactory, LineReader, LineWriter};
use crate::config::SessionDefaults;

use super::events::{LoggedEvent, SessionEvent, SmsRecord};

/// Session error types.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("modem initialization failed: {0}")]
    Init(#[source] io::Error),

    #[error("modem not connected")]
    NotConnected,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No channel held
    Closed,
    /// Channel acquired, initialization commands running
    Initializing,
    /// Listener task running
    Listening,
    /// Close in progress (transient, unobservable through the registry)
    Closing,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Closed => write!(f, "CLOSED"),
            SessionState::Initializing => write!(f, "INITIALIZING"),
            SessionState::Listening => write!(f, "LISTENING"),
            SessionState::Closing => write!(f, "CLOSING"),
        }
    }
}

/// A modem on one serial port.
pub struct ModemSession {
    /// Port identifier (immutable key)
    port: String,

    /// Baud, timeouts and settle pacing
    defaults: SessionDefaults,

    /// Session state
    state: RwLock<SessionState>,

    /// Cooperative cancellation flag for the listener loop
    listener_active: AtomicBool,

    /// Write half of the channel; `None` when closed. Guards outbound
    /// command sequences against interleaving.
    writer: Mutex<Option<Box<dyn LineWriter>>>,

    /// Listener task handle (joined on close)
    listener: Mutex<Option<JoinHandle<()>>>,

    /// Event fan-out to subscribers
    events: broadcast::Sender<SessionEvent>,

    /// Append-only event log
    event_log: StdMutex<Vec<LoggedEvent>>,

    /// Received SMS records
    inbox: StdMutex<Vec<SmsRecord>>,
}

impl ModemSession {
    /// Create a session for `port`. No channel is acquired until [`open`].
    ///
    /// [`open`]: ModemSession::open
    pub fn new(port: impl Into<String>, defaults: SessionDefaults) -> Arc<Self> {
        let (events, _) = broadcast::channel(defaults.event_capacity);
        Arc::new(Self {
            port: port.into(),
            defaults,
            state: RwLock::new(SessionState::Closed),
            listener_active: AtomicBool::new(false),
            writer: Mutex::new(None),
            listener: Mutex::new(None),
            events,
            event_log: StdMutex::new(Vec::new()),
            inbox: StdMutex::new(Vec::new()),
        })
    }

    /// Get the port identifier.
    pub fn port(&self) -> &str {
        &self.port
    }

    /// Get the session state.
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Subscribe to the session's event stream.
    ///
    /// Events arrive in production order. A slow subscriber can lag and miss
    /// events (broadcast semantics); the event log keeps the full history.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Snapshot of the append-only event log.
    pub fn event_log(&self) -> Vec<LoggedEvent> {
        self.event_log.lock().expect("event log lock poisoned").clone()
    }

    /// Snapshot of the received-SMS inbox.
    pub fn inbox(&self) -> Vec<SmsRecord> {
        self.inbox.lock().expect("inbox lock poisoned").clone()
    }

    /// Acquire the channel, run the initialization sequence, and start the
    /// listener.
    ///
    /// The four setup commands run strictly in order *before* the listener
    /// exists: starting it earlier would let the initializer and the listener
    /// race for the same input buffer. Each raw response is appended to the
    /// event log regardless of content; only channel errors abort, releasing
    /// the channel so the session is never left half-open.
    pub async fn open(self: &Arc<Self>, factory: &dyn ChannelFactory) -> Result<(), SessionError> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Closed {
                return Ok(());
            }
            *state = SessionState::Initializing;
        }

        let opened = factory
            .open(&self.port, self.defaults.baud_rate, self.defaults.read_timeout)
            .await;
        let (mut reader, mut writer) = match opened {
            Ok(halves) => halves,
            Err(source) => {
                *self.state.write().await = SessionState::Closed;
                return Err(SessionError::Open {
                    port: self.port.clone(),
                    source,
                });
            }
        };

        if let Err(e) = self.initialize(reader.as_mut(), writer.as_mut()).await {
            *self.state.write().await = SessionState::Closed;
            return Err(SessionError::Init(e));
        }

        *self.writer.lock().await = Some(writer);
        self.listener_active.store(true, Ordering::SeqCst);
        *self.state.write().await = SessionState::Listening;

        let task = tokio::spawn(Arc::clone(self).listen(reader));
        *self.listener.lock().await = Some(task);

        info!(port = %self.port, "session open");
        self.publish_log(format!("connected to {}", self.port));
        Ok(())
    }

    /// Run the four configuration commands: liveness probe, text-mode SMS,
    /// GSM charset, immediate push delivery of new-message notifications.
    async fn initialize(
        &self,
        reader: &mut dyn LineReader,
        writer: &mut dyn LineWriter,
    ) -> io::Result<()> {
        for command in [
            at::PROBE,
            at::TEXT_MODE,
            at::CHARSET_GSM,
            at::PUSH_NOTIFICATIONS,
        ] {
            let response =
                executor::send_command(reader, writer, command, self.defaults.init_settle).await?;
            debug!(port = %self.port, command, response = %response, "init step");
            self.publish_log(format!("{command} -> {response:?}"));
        }
        Ok(())
    }

    /// Listener loop: one bounded line read per iteration.
    ///
    /// An incoming-SMS header is followed by exactly one more read for the
    /// body (the protocol always places it on the next line); every other
    /// non-empty line is published verbatim. Read failures are logged and
    /// backed off, never fatal. The loop ends only when the stop flag
    /// clears, checked after each read attempt.
    async fn listen(self: Arc<Self>, mut reader: Box<dyn LineReader>) {
        debug!(port = %self.port, "listener started");
        loop {
            match reader.read_line().await {
                Ok(Some(line)) if !line.is_empty() => {
                    if line.starts_with(at::SMS_NOTIFICATION_TAG) {
                        let sender = parser::sms_notification_sender(&line);
                        let text = match reader.read_line().await {
                            Ok(Some(body)) => body,
                            Ok(None) => String::new(),
                            Err(e) => {
                                self.publish_log(format!("read error: {e}"));
                                String::new()
                            }
                        };
                        self.record_sms(sender, text);
                    } else {
                        self.publish_log(line);
                    }
                }
                Ok(_) => {} // timeout or blank line
                Err(e) => {
                    warn!(port = %self.port, error = %e, "listener read failed");
                    self.publish_log(format!("read error: {e}"));
                    sleep(self.defaults.error_backoff).await;
                }
            }

            if !self.listener_active.load(Ordering::SeqCst) {
                break;
            }
        }
        debug!(port = %self.port, "listener stopped");
    }

    /// Send an SMS. Fire and forget: the device's eventual `OK` or error
    /// surfaces later as a log event picked up by the listener.
    pub async fn send_sms(&self, phone: &str, text: &str) -> Result<(), SessionError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;

        writer
            .write_all(format!("{}\r", at::TEXT_MODE).as_bytes())
            .await?;
        sleep(self.defaults.sms_mode_settle).await;

        writer
            .write_all(format!("{}\r", at::sms_send(phone)).as_bytes())
            .await?;
        sleep(self.defaults.sms_address_settle).await;

        let mut body = text.as_bytes().to_vec();
        body.push(at::END_OF_MESSAGE);
        writer.write_all(&body).await?;
        drop(guard);

        info!(port = %self.port, phone, "sms submitted");
        self.publish_log(format!("sms to {phone}: {text}"));
        Ok(())
    }

    /// Initiate a USSD session. Fire and forget: the `+CUSD:` reply surfaces
    /// through the listener as log lines for the caller to scan.
    pub async fn send_ussd(&self, code: &str) -> Result<(), SessionError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;

        writer
            .write_all(format!("{}\r", at::CHARSET_GSM).as_bytes())
            .await?;
        sleep(self.defaults.ussd_charset_settle).await;

        writer
            .write_all(format!("{}\r", at::ussd_initiate(code)).as_bytes())
            .await?;
        drop(guard);

        info!(port = %self.port, code, "ussd submitted");
        self.publish_log(format!("ussd {code} sent"));
        Ok(())
    }

    /// Write an arbitrary command line. The response surfaces through the
    /// listener; the engine does not correlate it to this call.
    pub async fn run_command(&self, command: &str) -> Result<(), SessionError> {
        let command = command.trim();
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(SessionError::NotConnected)?;
        writer.write_all(format!("{command}\r\n").as_bytes()).await?;
        drop(guard);

        self.publish_log(format!("command {command} sent"));
        Ok(())
    }

    /// Stop the listener and release the channel. No-op when already closed.
    ///
    /// Cancellation is cooperative: the stop flag clears, a grace pause lets
    /// the loop finish its current bounded read, and the task is joined (the
    /// read itself is timeout-bounded, so the join always completes). The
    /// channel is fully released before returning, so the port can be
    /// reopened immediately.
    pub async fn close(&self) {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Listening {
                return;
            }
            *state = SessionState::Closing;
        }

        self.listener_active.store(false, Ordering::SeqCst);
        sleep(self.defaults.close_grace).await;

        if let Some(task) = self.listener.lock().await.take() {
            if let Err(e) = task.await {
                warn!(port = %self.port, error = %e, "listener join failed");
            }
        }

        *self.writer.lock().await = None;
        *self.state.write().await = SessionState::Closed;

        info!(port = %self.port, "session closed");
        self.publish_log(format!("disconnected from {}", self.port));
    }

    fn record_sms(&self, sender: Option<String>, text: String) {
        let now = Utc::now();
        info!(
            port = %self.port,
            sender = sender.as_deref().unwrap_or("unknown"),
            "incoming sms"
        );

        self.inbox.lock().expect("inbox lock poisoned").push(SmsRecord {
            port: self.port.clone(),
            sender: sender.clone(),
            text: text.clone(),
            received_at: now,
        });

        let event = SessionEvent::Sms { sender, text };
        self.event_log
            .lock()
            .expect("event log lock poisoned")
            .push(LoggedEvent {
                at: now,
                event: event.clone(),
            });
        let _ = self.events.send(event);
    }

    fn publish_log(&self, text: impl Into<String>) {
        let event = SessionEvent::Log { text: text.into() };
        self.event_log
            .lock()
            .expect("event log lock poisoned")
            .push(LoggedEvent {
                at: Utc::now(),
                event: event.clone(),
            });
        let _ = self.events.send(event);
    }
}
