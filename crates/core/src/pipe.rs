// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipe controller: one pipeline, one session, status and control.
//!
//! A pipe controller owns the reconstructed topology of its definition and a
//! session to the pipeline-scoped socket. Inbound status reports overwrite
//! the execution state; queue-update frames refresh the per-queue views.
//! Control commands (start, pause, restart, terminate) are encoded as
//! pipe-control frames and sent through the session — pipes are the only
//! entities this client commands.

use indexmap::IndexMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use upview_api::defs::{PipeDef, ProcessorDef};
use upview_api::message::{Envelope, Message, Payload};
use upview_api::status::{PipeAction, PipeState};

use crate::error::{ClientError, Result};
use crate::events::{self, PipeEvent, SessionEvent};
use crate::queue::QueueView;
use crate::session::{Session, SessionState};
use crate::topology::{self, ProcessorTree};

/// Live view over one pipeline.
///
/// Cheap to clone; all clones share the same session, state, and streams.
#[derive(Debug, Clone)]
pub struct PipeView {
    inner: std::sync::Arc<PipeShared>,
}

#[derive(Debug)]
struct PipeShared {
    def: PipeDef,
    tree: ProcessorTree,
    state: watch::Sender<PipeState>,
    queues: std::sync::Mutex<IndexMap<String, QueueView>>,
    session: std::sync::Mutex<Option<Session>>,
    events: broadcast::Sender<PipeEvent>,
}

impl PipeShared {
    fn handle_message(&self, message: Message) {
        // Pipeline sockets carry frames addressed to the pipe itself and to
        // its member processors (queue updates in the greeting). Anything
        // else is a mis-routed broadcast and is dropped quietly.
        let for_pipe = message.is_for(&self.def.id, &self.def.name);
        let for_member =
            self.def.processors.contains_key(&message.dest) || self.def.root.id == message.dest;
        if !for_pipe && !for_member {
            debug!(pipe_id = %self.def.id, dest = %message.dest, "ignoring frame for another entity");
            return;
        }

        match message {
            Message { payload: Payload::PipeStatus { status, .. }, .. } => {
                self.state.send_replace(status);
                // Same-value reports are republished: they double as a
                // liveness signal.
                let _ = self.events.send(PipeEvent::StatusChanged(status));
            },
            Message { payload: Payload::QueueUpdate(update), .. } => {
                let mut queues =
                    self.queues.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                for (id, def) in &update.queues {
                    queues.insert(id.clone(), QueueView::new(def.clone()));
                }
                drop(queues);
                let _ = self.events.send(PipeEvent::QueuesUpdated(update));
            },
            other => {
                let _ = self.events.send(PipeEvent::Raw(other));
            },
        }
    }

    fn session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl PipeView {
    /// Builds the topology eagerly; the definition is immutable afterwards.
    pub fn new(def: PipeDef) -> Self {
        let tree = topology::build_tree(&def);
        let queues = def
            .queues
            .values()
            .map(|queue| (queue.id.clone(), QueueView::new(queue.clone())))
            .collect();
        Self {
            inner: std::sync::Arc::new(PipeShared {
                def,
                tree,
                state: watch::channel(PipeState::Init).0,
                queues: std::sync::Mutex::new(queues),
                session: std::sync::Mutex::new(None),
                events: events::channel(),
            }),
        }
    }

    pub fn def(&self) -> &PipeDef {
        &self.inner.def
    }

    pub fn id(&self) -> &str {
        &self.inner.def.id
    }

    pub fn name(&self) -> &str {
        &self.inner.def.name
    }

    /// The reconstructed processor tree, rooted at the pipe's root.
    pub fn tree(&self) -> &ProcessorTree {
        &self.inner.tree
    }

    /// Processors with no incoming queue edge.
    pub fn entry_processors(&self) -> Vec<&ProcessorDef> {
        topology::entry_processors(&self.inner.def)
    }

    /// Current execution status as last reported by the runtime.
    pub fn state(&self) -> PipeState {
        *self.inner.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == PipeState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state() == PipeState::Paused
    }

    pub fn queue(&self, id: &str) -> Option<QueueView> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Snapshot of the per-queue views, in definition order.
    pub fn queues(&self) -> Vec<QueueView> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Opens a session to the pipe's already-resolved WebSocket endpoint.
    ///
    /// The runtime greets with an array frame (a status report followed by
    /// queue wiring); both flow through the normal decode path and land on
    /// this controller's event stream.
    ///
    /// Idempotent while a session is open: calling again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the handshake fails.
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        if self.inner.session().is_some_and(|s| s.is_open()) {
            return Ok(());
        }

        let (session, mut events) =
            Session::connect_with_events(&self.inner.def.id, endpoint).await?;
        *self.inner.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(session);

        let shared = std::sync::Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Message(message)) => shared.handle_message(message),
                    Ok(SessionEvent::Opened) => {},
                    Ok(SessionEvent::Closed { reason }) => {
                        let _ = shared.events.send(PipeEvent::Closed { reason });
                        break;
                    },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(pipe_id = %shared.def.id, missed, "pipe handler lagged behind");
                    },
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(())
    }

    /// Closes the session, if any. Safe to call repeatedly.
    pub async fn disconnect(&self) {
        if let Some(session) = self.inner.session() {
            session.disconnect().await;
        }
    }

    /// State of the underlying session; `Idle` when none was ever opened.
    pub fn session_state(&self) -> SessionState {
        self.inner.session().map_or(SessionState::Idle, |s| s.state())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipeEvent> {
        self.inner.events.subscribe()
    }

    /// Sends one pipe-control frame carrying `action`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Misuse`] without any transport write when the
    /// pipe has no open session, and [`ClientError::Transport`] when the
    /// write fails.
    pub async fn control(&self, action: PipeAction) -> Result<()> {
        let session = self.inner.session().filter(Session::is_open).ok_or_else(|| {
            ClientError::Misuse(format!("pipe '{}' is not connected", self.inner.def.id))
        })?;
        let frame = Envelope::pipe_control(
            &self.inner.def.id,
            &self.inner.def.id,
            &self.inner.def.name,
            action,
        );
        debug!(pipe_id = %self.inner.def.id, action = ?action, "sending control frame");
        session.send(&frame).await
    }

    /// Requests the runtime to start the pipeline.
    ///
    /// # Errors
    ///
    /// See [`Self::control`].
    pub async fn start(&self) -> Result<()> {
        self.control(PipeAction::Start).await
    }

    /// Requests the runtime to pause the pipeline.
    ///
    /// # Errors
    ///
    /// See [`Self::control`].
    pub async fn pause(&self) -> Result<()> {
        self.control(PipeAction::Pause).await
    }

    /// Requests the runtime to restart the pipeline.
    ///
    /// # Errors
    ///
    /// See [`Self::control`].
    pub async fn restart(&self) -> Result<()> {
        self.control(PipeAction::Restart).await
    }

    /// Requests the runtime to terminate the pipeline.
    ///
    /// # Errors
    ///
    /// See [`Self::control`].
    pub async fn terminate(&self) -> Result<()> {
        self.control(PipeAction::Terminate).await
    }
}
