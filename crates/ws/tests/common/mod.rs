//! Scripted local WebSocket server for channel tests.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use jobstream_core::settings::SettingsStore;
use jobstream_ws::{BackoffSchedule, JobChannel, JobEvent, UrlResolver};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Notify};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

/// Generous bound for anything that should happen "soon".
pub const WAIT: Duration = Duration::from_secs(5);

/// One step the server performs on an accepted connection.
#[derive(Clone)]
pub enum Action {
    Text(&'static str),
    Binary(&'static str),
    /// Close with `CloseCode::Away` and the given reason.
    Close(&'static str),
    /// Send the same text frame `n` times back to back.
    Burst(&'static str, usize),
}

pub struct WsTestServer {
    pub addr: SocketAddr,
    /// Request targets (`path?query`) in accept order.
    pub requests: Arc<Mutex<Vec<String>>>,
    pub connections: Arc<AtomicUsize>,
    /// Signalled each time a client closes a connection the server held open.
    pub client_closed: Arc<Notify>,
}

impl WsTestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

/// Start a server. Connection `n` runs `scripts[n]` (the last script is
/// reused once they run out). A script that does not end with `Close`
/// keeps the connection open until the client closes it.
pub async fn spawn_ws_server(scripts: Vec<Vec<Action>>) -> WsTestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));
    let connections = Arc::new(AtomicUsize::new(0));
    let client_closed = Arc::new(Notify::new());

    let server = WsTestServer {
        addr,
        requests: Arc::clone(&requests),
        connections: Arc::clone(&connections),
        client_closed: Arc::clone(&client_closed),
    };

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            let index = connections.fetch_add(1, Ordering::SeqCst);
            let script = scripts[index.min(scripts.len() - 1)].clone();
            let requests = Arc::clone(&requests);
            let client_closed = Arc::clone(&client_closed);

            tokio::spawn(async move {
                let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    requests.lock().unwrap().push(req.uri().to_string());
                    Ok(resp)
                };
                let Ok(mut ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await else {
                    return;
                };

                for action in script {
                    // Give the client a moment to publish `Connected` first.
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    match action {
                        Action::Text(text) => {
                            let _ = ws.send(Message::Text(text.to_string())).await;
                        }
                        Action::Binary(text) => {
                            let _ = ws.send(Message::Binary(text.as_bytes().to_vec())).await;
                        }
                        Action::Burst(text, n) => {
                            for _ in 0..n {
                                if ws.send(Message::Text(text.to_string())).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Action::Close(reason) => {
                            let _ = ws
                                .close(Some(CloseFrame {
                                    code: CloseCode::Away,
                                    reason: reason.into(),
                                }))
                                .await;
                            // Drain until the client acknowledges or drops.
                            while let Some(Ok(_)) = ws.next().await {}
                            return;
                        }
                    }
                }

                while let Some(msg) = ws.next().await {
                    if matches!(msg, Err(_) | Ok(Message::Close(_))) {
                        break;
                    }
                }
                client_closed.notify_one();
            });
        }
    });

    server
}

/// Channel wired to `base_url` with an optional stored credential.
pub async fn channel_for(
    base_url: &str,
    token: Option<&str>,
    backoff: BackoffSchedule,
) -> (JobChannel, Arc<SettingsStore>) {
    let settings = SettingsStore::shared(base_url);
    if let Some(token) = token {
        settings.save_credential(token).await;
    }
    let resolver = UrlResolver::new(settings.clone(), settings.clone());
    (JobChannel::new(resolver, backoff), settings)
}

/// Receive the next event or panic after [`WAIT`].
pub async fn next_event(rx: &mut broadcast::Receiver<JobEvent>) -> JobEvent {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for a job event")
        .expect("event channel closed")
}

/// Collect events until one matches `done` (inclusive).
pub async fn collect_until<F>(rx: &mut broadcast::Receiver<JobEvent>, done: F) -> Vec<JobEvent>
where
    F: Fn(&JobEvent) -> bool,
{
    let mut events = Vec::new();
    loop {
        let event = next_event(rx).await;
        let finished = done(&event);
        events.push(event);
        if finished {
            return events;
        }
    }
}

/// A loopback address with nothing listening on it.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
