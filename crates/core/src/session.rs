// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! One persistent WebSocket session to a remote entity.
//!
//! ## State machine
//!
//! ```text
//!     Idle
//!      ↓
//!   Connecting ──────┐
//!      ↓             │ (handshake failed)
//!     Open           │
//!      ↓             │
//!    Closed ←────────┘
//! ```
//!
//! A session is single-use: once `Closed` it never reconnects. Retry and
//! backoff are caller policy, by design.
//!
//! The reader task is the only reader of the socket. Decoded messages are
//! published through the session's event stream in arrival order; a frame
//! that fails to decode is logged and dropped without disturbing the frames
//! after it. Writes go through `send()`, which serializes one envelope per
//! text frame and holds the sink lock for the duration of the write.

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch, Mutex};
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use upview_api::message::{parse_frame, Envelope, Message};

use crate::error::{ClientError, Result};
use crate::events::{self, SessionEvent};

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, WsMessage>;

/// Lifecycle phase of a session.
///
/// `Idle` is only ever observed through controllers that have not connected
/// yet; a constructed [`Session`] starts at `Open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Open,
    Closed,
}

struct Shared {
    name: String,
    state: watch::Sender<SessionState>,
    events: broadcast::Sender<SessionEvent>,
    cancel: CancellationToken,
}

impl Shared {
    /// Transitions to `Closed` and emits the terminal event.
    ///
    /// Returns whether this call performed the transition. Only the first
    /// caller wins; every later call is a no-op, which is what makes both
    /// `disconnect()` and remote-close handling idempotent.
    fn close(&self, reason: &str) -> bool {
        let first = self.state.send_if_modified(|state| {
            if *state == SessionState::Closed {
                false
            } else {
                *state = SessionState::Closed;
                true
            }
        });
        if first {
            debug!(session = %self.name, reason = %reason, "session closed");
            self.cancel.cancel();
            let _ = self.events.send(SessionEvent::Closed { reason: reason.to_string() });
        }
        first
    }
}

/// Handle to one live WebSocket session.
///
/// Cheap to clone; all clones share the same connection, state, and event
/// stream.
#[derive(Clone)]
pub struct Session {
    shared: std::sync::Arc<Shared>,
    writer: std::sync::Arc<Mutex<WsSink>>,
}

impl Session {
    /// Opens a WebSocket to `endpoint` and starts the reader task.
    ///
    /// `name` identifies the remote entity in logs and event streams. The
    /// endpoint arrives already resolved; this crate does no URL templating.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the handshake fails. No
    /// session value exists in that case, so a failed connect leaves nothing
    /// to tear down.
    pub async fn connect(name: &str, endpoint: &str) -> Result<Self> {
        Ok(Self::connect_with_events(name, endpoint).await?.0)
    }

    /// Like [`Self::connect`], but also returns a receiver subscribed before
    /// the reader task starts.
    ///
    /// Node controllers greet immediately after the handshake; a subscription
    /// taken after `connect` returns could miss those frames. This variant
    /// guarantees the receiver sees every message, the greeting included.
    ///
    /// # Errors
    ///
    /// Same as [`Self::connect`].
    pub async fn connect_with_events(
        name: &str,
        endpoint: &str,
    ) -> Result<(Self, broadcast::Receiver<SessionEvent>)> {
        debug!(session = %name, endpoint = %endpoint, "connecting");
        let (stream, _) = connect_async(endpoint).await?;
        let (write, mut read) = stream.split();

        let (state, _) = watch::channel(SessionState::Open);
        let shared = std::sync::Arc::new(Shared {
            name: name.to_string(),
            state,
            events: events::channel(),
            cancel: CancellationToken::new(),
        });
        let receiver = shared.events.subscribe();
        let _ = shared.events.send(SessionEvent::Opened);

        let reader_shared = std::sync::Arc::clone(&shared);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = reader_shared.cancel.cancelled() => break,
                    frame = read.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            Self::dispatch(&reader_shared, text.as_str());
                        },
                        Some(Ok(WsMessage::Close(_))) => {
                            reader_shared.close("closed by server");
                            break;
                        },
                        // Binary frames are not part of the protocol;
                        // ping/pong is handled by the transport.
                        Some(Ok(_)) => {},
                        Some(Err(e)) => {
                            warn!(session = %reader_shared.name, error = %e, "read failed");
                            reader_shared.close("transport error");
                            break;
                        },
                        None => {
                            reader_shared.close("connection ended");
                            break;
                        },
                    },
                }
            }
        });

        debug!(session = %name, "session open");
        Ok((Self { shared, writer: std::sync::Arc::new(Mutex::new(write)) }, receiver))
    }

    /// Decodes one text frame and publishes its messages in order.
    ///
    /// Decode failures are dropped with a diagnostic; they never close the
    /// session or affect later frames.
    fn dispatch(shared: &Shared, text: &str) {
        let envelopes = match parse_frame(text) {
            Ok(envelopes) => envelopes,
            Err(e) => {
                warn!(session = %shared.name, error = %e, "dropping malformed frame");
                return;
            },
        };
        for envelope in envelopes {
            let kind = envelope.kind;
            match Message::try_from(envelope) {
                Ok(message) => {
                    let _ = shared.events.send(SessionEvent::Message(message));
                },
                Err(e) => {
                    warn!(
                        session = %shared.name,
                        kind = kind.code(),
                        error = %e,
                        "dropping undecodable message"
                    );
                },
            }
        }
    }

    /// Serializes and writes one envelope as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Misuse`] without touching the transport when
    /// the session is not open, and [`ClientError::Transport`] when the write
    /// itself fails (which also closes the session).
    pub async fn send(&self, envelope: &Envelope) -> Result<()> {
        let state = self.state();
        if state != SessionState::Open {
            return Err(ClientError::Misuse(format!(
                "cannot send on session '{}' while {state:?}",
                self.shared.name
            )));
        }
        let text = envelope.to_text()?;
        let mut sink = self.writer.lock().await;
        if let Err(e) = sink.send(WsMessage::Text(text.into())).await {
            self.shared.close("write failed");
            return Err(ClientError::Transport(e));
        }
        Ok(())
    }

    /// Closes the session.
    ///
    /// Safe to call any number of times: the first call emits exactly one
    /// [`SessionEvent::Closed`] and stops the reader; the rest are no-ops.
    pub async fn disconnect(&self) {
        if self.shared.close("closed by client") {
            let mut sink = self.writer.lock().await;
            let _ = sink.send(WsMessage::Close(None)).await;
        }
    }

    /// Current lifecycle phase.
    pub fn state(&self) -> SessionState {
        *self.shared.state.borrow()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// The remote entity this session was opened for.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Subscribes to this session's lifecycle and message stream.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.shared.events.subscribe()
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
