//! Reconnecting WebSocket channel for job events.
//!
//! [`JobChannel`] owns the connection lifecycle: each [`start`] spawns a
//! session task that resolves the stream URL, connects, republishes
//! decoded frames, and reconnects with the [`BackoffSchedule`] whenever
//! the connection closes. [`stop`] cancels the session and closes the
//! live connection.
//!
//! Events are fanned out over a [`tokio::sync::broadcast`] channel. A
//! receiver that falls behind loses the oldest events and observes
//! `RecvError::Lagged`; publishing never waits for receivers.
//!
//! [`start`]: JobEventSource::start
//! [`stop`]: JobEventSource::stop

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use futures::StreamExt;
use jobstream_core::config::{ClientConfig, DEFAULT_EVENT_BUFFER};
use reqwest::Url;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::events::JobEvent;
use crate::messages::decode;
use crate::reconnect::{BackoffSchedule, EmptyScheduleError};
use crate::resolver::UrlResolver;
use crate::source::JobEventSource;

/// `Disconnected` reason published when the stream URL cannot be built.
pub const RESOLVE_FAILURE_REASON: &str = "missing credential or address";

/// Upper bound on waiting for the close handshake during [`JobChannel::stop`].
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Reconnecting, receive-only job event channel.
///
/// Cheap to share behind an `Arc`; all methods take `&self`. Must be
/// started inside a Tokio runtime, since `start()` spawns the session task.
pub struct JobChannel {
    inner: Arc<ChannelInner>,
}

struct ChannelInner {
    resolver: UrlResolver,
    backoff: BackoffSchedule,
    event_tx: broadcast::Sender<JobEvent>,
    control: Mutex<Control>,
}

/// Start/stop bookkeeping, guarded by a single mutex.
struct Control {
    stopped: bool,
    /// Cancellation token of the running session, if any.
    session: Option<CancellationToken>,
}

/// How a single connection ended.
enum SessionEnd {
    /// The session was cancelled by `stop()` or a newer `start()`.
    Cancelled,
    /// The connection closed or could not be opened.
    Closed(Option<String>),
}

impl JobChannel {
    pub fn new(resolver: UrlResolver, backoff: BackoffSchedule) -> Self {
        Self::with_capacity(resolver, backoff, DEFAULT_EVENT_BUFFER)
    }

    /// Create a channel whose broadcast buffer holds `capacity` events.
    pub fn with_capacity(resolver: UrlResolver, backoff: BackoffSchedule, capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(ChannelInner {
                resolver,
                backoff,
                event_tx,
                control: Mutex::new(Control {
                    stopped: true,
                    session: None,
                }),
            }),
        }
    }

    /// Build a channel using the backoff and buffer settings of `config`.
    pub fn from_config(
        resolver: UrlResolver,
        config: &ClientConfig,
    ) -> Result<Self, EmptyScheduleError> {
        let backoff = BackoffSchedule::new(config.backoff.clone())?;
        Ok(Self::with_capacity(resolver, backoff, config.event_buffer))
    }

    /// `true` before the first `start()` and after `stop()`.
    pub fn is_stopped(&self) -> bool {
        self.inner.control().stopped
    }
}

impl JobEventSource for JobChannel {
    fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.inner.event_tx.subscribe()
    }

    /// Reset the reconnect counter and connect immediately.
    ///
    /// A session started earlier is cancelled first, closing its
    /// connection, so the channel never holds two connections.
    fn start(&self) {
        let cancel = CancellationToken::new();
        {
            let mut control = self.inner.control();
            if let Some(previous) = control.session.take() {
                previous.cancel();
            }
            control.stopped = false;
            control.session = Some(cancel.clone());
        }

        tracing::info!("Starting job stream channel");
        let session = Session {
            inner: Arc::clone(&self.inner),
            cancel,
            reconnect_attempt: 0,
        };
        tokio::spawn(session.run());
    }

    /// Cancel any pending attempt and close the live connection.
    fn stop(&self) {
        let mut control = self.inner.control();
        control.stopped = true;
        if let Some(session) = control.session.take() {
            tracing::info!("Stopping job stream channel");
            session.cancel();
        }
    }
}

impl Drop for JobChannel {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ChannelInner {
    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: JobEvent) {
        // An error only means there are no subscribers right now.
        let _ = self.event_tx.send(event);
    }
}

/// One `start()`..`stop()` lifetime: connect, pump frames, back off, repeat.
struct Session {
    inner: Arc<ChannelInner>,
    cancel: CancellationToken,
    /// Index into the backoff schedule; reset on every successful open.
    reconnect_attempt: usize,
}

impl Session {
    async fn run(mut self) {
        let mut delay = Duration::ZERO;

        loop {
            if !delay.is_zero() {
                tracing::info!(
                    attempt = self.reconnect_attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Reconnecting to job stream",
                );
                tokio::select! {
                    _ = self.cancel.cancelled() => return,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            if self.cancel.is_cancelled() {
                return;
            }

            let url = match self.inner.resolver.resolve().await {
                Ok(url) => url,
                Err(e) => {
                    // Configuration problem: wait for the caller to start again.
                    tracing::warn!(error = %e, "Cannot resolve job stream address");
                    self.publish(JobEvent::disconnected(RESOLVE_FAILURE_REASON));
                    return;
                }
            };

            let reason = match self.connect_and_pump(&url).await {
                SessionEnd::Cancelled => return,
                SessionEnd::Closed(reason) => reason,
            };
            if self.cancel.is_cancelled() {
                return;
            }

            tracing::warn!(
                reason = reason.as_deref().unwrap_or("<none>"),
                attempt = self.reconnect_attempt,
                "Job stream disconnected",
            );
            self.publish(JobEvent::Disconnected { reason });

            delay = self.inner.backoff.delay_for(self.reconnect_attempt);
            self.reconnect_attempt = self.inner.backoff.next_attempt(self.reconnect_attempt);
        }
    }

    /// Open one connection and forward its frames until it ends.
    async fn connect_and_pump(&mut self, url: &Url) -> SessionEnd {
        let connected = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return SessionEnd::Cancelled,
            result = connect_async(url.as_str()) => result,
        };
        let mut ws_stream = match connected {
            Ok((ws_stream, _response)) => ws_stream,
            Err(e) => {
                tracing::debug!(host = url.host_str().unwrap_or(""), error = %e, "Job stream connect failed");
                return SessionEnd::Closed(Some(e.to_string()));
            }
        };

        tracing::info!(host = url.host_str().unwrap_or(""), "Connected to job stream");
        self.reconnect_attempt = 0;
        self.publish(JobEvent::Connected);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    let _ = tokio::time::timeout(CLOSE_TIMEOUT, ws_stream.close(None)).await;
                    return SessionEnd::Cancelled;
                }
                msg = ws_stream.next() => match msg {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Binary(bytes))) => match std::str::from_utf8(&bytes) {
                        Ok(text) => self.handle_frame(text),
                        Err(_) => tracing::trace!("Ignoring non-UTF-8 binary frame"),
                    },
                    Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                        // Ping/pong replies are handled by tungstenite.
                    }
                    Some(Ok(Message::Close(frame))) => {
                        tracing::info!(?frame, "Job stream closed by server");
                        let reason = frame
                            .map(|f| f.reason.into_owned())
                            .filter(|r| !r.is_empty());
                        return SessionEnd::Closed(reason);
                    }
                    Some(Err(e)) => {
                        tracing::error!(error = %e, "Job stream receive error");
                        return SessionEnd::Closed(Some(e.to_string()));
                    }
                    None => return SessionEnd::Closed(None),
                },
            }
        }
    }

    /// Publish unless this session has been cancelled.
    ///
    /// The check runs under the control lock, which `start()` and `stop()`
    /// hold while cancelling, so nothing is published once they return.
    fn publish(&self, event: JobEvent) {
        let _control = self.inner.control();
        if !self.cancel.is_cancelled() {
            self.inner.publish(event);
        }
    }

    fn handle_frame(&self, text: &str) {
        match decode(text) {
            Some(event) => {
                tracing::debug!(?event, "Job stream event");
                self.publish(event);
            }
            None => tracing::debug!(raw_message = %text, "Dropped unrecognized job stream frame"),
        }
    }
}
