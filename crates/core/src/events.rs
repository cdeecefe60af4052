// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Typed event streams for sessions and controllers.
//!
//! Every session and controller owns its own bounded
//! [`tokio::sync::broadcast`] channel; there is no global event bus.
//! `subscribe()` hands out a plain receiver, so any number of consumers can
//! observe the same stream. A slow consumer sees
//! [`tokio::sync::broadcast::error::RecvError::Lagged`] and may resubscribe;
//! the publishing side never blocks on it.

use tokio::sync::broadcast;
use upview_api::message::{Message, ProcQueues};
use upview_api::metrics::{NodeSnapshot, ProcessorSnapshot, ProcessorTotals, QueueSnapshot};
use upview_api::status::PipeState;

use crate::node::NodeStatus;

/// Buffered events per stream before lag kicks in.
pub const EVENT_CAPACITY: usize = 64;

/// Creates a bounded event channel with the crate-wide capacity.
pub(crate) fn channel<T: Clone>() -> broadcast::Sender<T> {
    broadcast::channel(EVENT_CAPACITY).0
}

/// Lifecycle and traffic of one socket session.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The handshake completed and frames may flow.
    Opened,
    /// A decoded inbound message, in arrival order.
    Message(Message),
    /// The session reached its terminal state. Emitted exactly once.
    Closed { reason: String },
}

/// What a node controller publishes.
#[derive(Debug, Clone)]
pub enum NodeEvent {
    StatusChanged(NodeStatus),
    /// A fresh utilization snapshot, replacing the previous one.
    Usage(NodeSnapshot),
    /// Traffic the node controller does not interpret, forwarded as-is.
    Raw(Message),
}

/// What a pipe controller publishes.
#[derive(Debug, Clone)]
pub enum PipeEvent {
    /// Execution status reported by the runtime. Same-value reports are
    /// republished; they double as a liveness signal.
    StatusChanged(PipeState),
    /// Queue wiring pushed by the runtime.
    QueuesUpdated(ProcQueues),
    /// Traffic the pipe controller does not interpret, forwarded as-is.
    Raw(Message),
    /// The underlying session closed.
    Closed { reason: String },
}

/// What a processor controller publishes.
#[derive(Debug, Clone)]
pub enum ProcessorEvent {
    /// A fresh per-instance snapshot plus its aggregated totals.
    Stats { snapshot: ProcessorSnapshot, totals: ProcessorTotals },
}

/// What a queue view publishes.
#[derive(Debug, Clone)]
pub enum QueueEvent {
    /// A fresh snapshot, replacing the previous one wholesale.
    Stats(QueueSnapshot),
}
