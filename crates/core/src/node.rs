// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Node controller: one compute node, one session, live utilization.
//!
//! Nodes are passive reporters. The controller never sends control frames;
//! it opens a session, republishes utilization snapshots to subscribers, and
//! fans embedded queue and processor figures out to registered views so those
//! watchers get fresh stats without sockets of their own.
//!
//! ## Status
//!
//! ```text
//!     Init ──→ Connected ⇄ Available
//! ```
//!
//! `Init` until the first connect, `Connected` while the session is open,
//! `Available` after it closes. Reconnecting is the caller's decision.

use indexmap::IndexMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};
use upview_api::defs::NodeDef;
use upview_api::message::{Message, Payload};
use upview_api::metrics::NodeSnapshot;

use crate::error::{ClientError, Result};
use crate::events::{self, NodeEvent, SessionEvent};
use crate::processor::ProcessorView;
use crate::queue::QueueView;
use crate::session::{Session, SessionState};

/// Connection-derived status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    /// Definition loaded, never connected.
    Init,
    /// Known and reachable, no live session.
    Available,
    /// Session open, reports flowing.
    Connected,
}

/// Live view over one compute node.
///
/// Cheap to clone; all clones share the same session, status, and streams.
#[derive(Debug, Clone)]
pub struct NodeView {
    inner: std::sync::Arc<NodeShared>,
}

#[derive(Debug)]
struct NodeShared {
    def: NodeDef,
    status: watch::Sender<NodeStatus>,
    usage: watch::Sender<Option<NodeSnapshot>>,
    queues: std::sync::Mutex<IndexMap<String, QueueView>>,
    processors: std::sync::Mutex<IndexMap<String, ProcessorView>>,
    session: std::sync::Mutex<Option<Session>>,
    events: broadcast::Sender<NodeEvent>,
}

impl NodeShared {
    fn set_status(&self, status: NodeStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            debug!(node_id = %self.def.id, status = ?status, "node status changed");
            let _ = self.events.send(NodeEvent::StatusChanged(status));
        }
    }

    fn handle_message(&self, message: Message) {
        if !message.is_for(&self.def.id, &self.def.name) {
            // Broadcast-style delivery routinely carries frames for others.
            debug!(node_id = %self.def.id, dest = %message.dest, "ignoring frame for another entity");
            return;
        }
        match message {
            Message { payload: Payload::NodeUsage(snapshot), .. } => {
                self.fan_out(&snapshot);
                self.usage.send_replace(Some(snapshot.clone()));
                let _ = self.events.send(NodeEvent::Usage(snapshot));
            },
            other => {
                let _ = self.events.send(NodeEvent::Raw(other));
            },
        }
    }

    /// Pushes embedded queue and processor figures to registered views.
    fn fan_out(&self, snapshot: &NodeSnapshot) {
        let queues = self.queues.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for queue_stats in &snapshot.queues_usage {
            if let Some(view) = queues.get(&queue_stats.q_id) {
                view.update_stats(queue_stats.clone());
            }
        }
        drop(queues);

        let processors = self.processors.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        for proc_stats in &snapshot.processors_usage {
            if let Some(view) = processors.get(&proc_stats.processor_id) {
                view.update_stats(proc_stats.clone());
            }
        }
    }

    fn session(&self) -> Option<Session> {
        self.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone()
    }
}

impl NodeView {
    pub fn new(def: NodeDef) -> Self {
        Self {
            inner: std::sync::Arc::new(NodeShared {
                def,
                status: watch::channel(NodeStatus::Init).0,
                usage: watch::channel(None).0,
                queues: std::sync::Mutex::new(IndexMap::new()),
                processors: std::sync::Mutex::new(IndexMap::new()),
                session: std::sync::Mutex::new(None),
                events: events::channel(),
            }),
        }
    }

    pub fn def(&self) -> &NodeDef {
        &self.inner.def
    }

    pub fn id(&self) -> &str {
        &self.inner.def.id
    }

    pub fn status(&self) -> NodeStatus {
        *self.inner.status.borrow()
    }

    /// Latest utilization snapshot, if any has arrived on this session.
    pub fn last_usage(&self) -> Option<NodeSnapshot> {
        self.inner.usage.borrow().clone()
    }

    /// Registers a queue view to receive embedded queue figures by `q_id`.
    pub fn watch_queue(&self, view: QueueView) {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(view.id().to_string(), view);
    }

    pub fn queue(&self, id: &str) -> Option<QueueView> {
        self.inner
            .queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Registers a processor view to receive embedded stats by processor id.
    pub fn watch_processor(&self, view: ProcessorView) {
        self.inner
            .processors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(view.id().to_string(), view);
    }

    pub fn processor(&self, id: &str) -> Option<ProcessorView> {
        self.inner
            .processors
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Opens a session to the node's already-resolved WebSocket endpoint.
    ///
    /// Idempotent while a session is open: calling again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Transport`] when the handshake fails; the node
    /// keeps its previous status and may be connected again later.
    pub async fn connect(&self, endpoint: &str) -> Result<()> {
        if self.inner.session().is_some_and(|s| s.is_open()) {
            return Ok(());
        }

        let (session, mut events) =
            Session::connect_with_events(&self.inner.def.id, endpoint).await?;
        *self.inner.session.lock().unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(session);
        self.inner.set_status(NodeStatus::Connected);

        let shared = std::sync::Arc::clone(&self.inner);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Message(message)) => shared.handle_message(message),
                    Ok(SessionEvent::Opened) => {},
                    Ok(SessionEvent::Closed { .. }) => {
                        shared.set_status(NodeStatus::Available);
                        break;
                    },
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(node_id = %shared.def.id, missed, "node handler lagged behind");
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
            self.inner.set_status(NodeStatus::Available);
        }
    }

    /// State of the underlying session; `Idle` when none was ever opened.
    pub fn session_state(&self) -> SessionState {
        self.inner.session().map_or(SessionState::Idle, |s| s.state())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.inner.events.subscribe()
    }
}

// Keep the misuse taxonomy reachable for callers composing their own flows.
impl NodeView {
    /// Returns the open session or a [`ClientError::Misuse`].
    ///
    /// # Errors
    ///
    /// Fails when the node has no open session.
    pub fn require_session(&self) -> Result<Session> {
        self.inner
            .session()
            .filter(Session::is_open)
            .ok_or_else(|| ClientError::Misuse(format!("node '{}' is not connected", self.id())))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use upview_api::defs::{EntityKind, QueueDef};
    use upview_api::message::MessageKind;
    use upview_api::metrics::{CpuMetric, GaugeMetric, MetricKind, MetricUnit, QueueSnapshot};

    fn node_def() -> NodeDef {
        NodeDef {
            id: "n1".to_string(),
            name: "worker".to_string(),
            kind: EntityKind::Node,
            controller: false,
            controller_host: None,
            controller_port: None,
            resources: Vec::new(),
            config: None,
            settings: None,
        }
    }

    fn usage_message(dest: &str, q_pending: f64) -> Message {
        let snapshot = NodeSnapshot {
            node_id: "n1".to_string(),
            cpu_total: CpuMetric {
                core_id: "all".to_string(),
                kind: MetricKind::Compute,
                value: 12.0,
                unit: MetricUnit::Percentage,
            },
            memory: GaugeMetric {
                id: "mem".to_string(),
                kind: MetricKind::Memory,
                value: 50.0,
                unit: MetricUnit::Percentage,
            },
            cores_usage: Vec::new(),
            disks_usage: Vec::new(),
            queues_usage: vec![QueueSnapshot {
                q_id: "q1".to_string(),
                pending_counter: upview_api::metrics::Metric::counter(q_pending),
                ..QueueSnapshot::default()
            }],
            processors_usage: Vec::new(),
        };
        Message {
            kind: MessageKind::NodeStatus,
            sender: "n1".to_string(),
            dest: dest.to_string(),
            scope: EntityKind::Node,
            payload: Payload::NodeUsage(snapshot),
        }
    }

    #[test]
    fn test_usage_report_republishes_and_fans_out() {
        let view = NodeView::new(node_def());
        let queue = QueueView::new(QueueDef::between("q1", "a", "b"));
        view.watch_queue(queue.clone());
        let mut events = view.subscribe();

        view.inner.handle_message(usage_message("n1", 9.0));

        assert!(matches!(events.try_recv().unwrap(), NodeEvent::Usage(_)));
        assert_eq!(view.last_usage().unwrap().cpu_total.value, 12.0);
        assert_eq!(queue.stats().pending_counter.value, 9.0);
    }

    #[test]
    fn test_frame_for_another_dest_is_ignored() {
        let view = NodeView::new(node_def());
        let mut events = view.subscribe();

        view.inner.handle_message(usage_message("someone-else", 9.0));

        assert!(events.try_recv().is_err());
        assert!(view.last_usage().is_none());
    }

    #[test]
    fn test_dest_may_be_the_node_name() {
        let view = NodeView::new(node_def());
        view.inner.handle_message(usage_message("worker", 1.0));
        assert!(view.last_usage().is_some());
    }

    #[test]
    fn test_unrecognized_message_is_forwarded_raw() {
        let view = NodeView::new(node_def());
        let mut events = view.subscribe();

        view.inner.handle_message(Message {
            kind: MessageKind::Other(42),
            sender: "n1".to_string(),
            dest: "n1".to_string(),
            scope: EntityKind::Node,
            payload: Payload::Other { body: None, extra: serde_json::Map::new() },
        });

        assert!(matches!(events.try_recv().unwrap(), NodeEvent::Raw(_)));
    }

    #[test]
    fn test_status_change_is_published_once_per_transition() {
        let view = NodeView::new(node_def());
        let mut events = view.subscribe();

        view.inner.set_status(NodeStatus::Connected);
        view.inner.set_status(NodeStatus::Connected);
        view.inner.set_status(NodeStatus::Available);

        assert!(matches!(events.try_recv().unwrap(), NodeEvent::StatusChanged(NodeStatus::Connected)));
        assert!(matches!(events.try_recv().unwrap(), NodeEvent::StatusChanged(NodeStatus::Available)));
        assert!(events.try_recv().is_err());
    }
}
