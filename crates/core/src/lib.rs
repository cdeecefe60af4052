// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! core: topology reconstruction and live status propagation for UPipe.
//!
//! The view API serves pipeline definitions as flat maps; node controllers
//! stream status and utilization over WebSockets. This crate turns both into
//! something a dashboard can use:
//!
//! - [`topology`] rebuilds the processor graph from queue edges, hardened
//!   against cycles and dangling references;
//! - [`session`] wraps one persistent socket with an explicit state machine
//!   and a typed event stream;
//! - [`node`], [`pipe`], [`processor`] and [`queue`] hold per-entity live
//!   state, interpret inbound messages, and issue pipe control commands.
//!
//! The crate is a passive observer of server-held truth: it mirrors status,
//! never owns it, and nothing in here is fatal to the process. Reconnection
//! is deliberately out of scope; a closed session stays closed.

// Module declarations
pub mod error;
pub mod events;
pub mod node;
pub mod pipe;
pub mod processor;
pub mod queue;
pub mod session;
pub mod topology;

// Convenience re-exports for commonly used types

// Errors
pub use error::{ClientError, Result};

// Event streams
pub use events::{NodeEvent, PipeEvent, ProcessorEvent, QueueEvent, SessionEvent};

// Sessions
pub use session::{Session, SessionState};

// Controllers
pub use node::{NodeStatus, NodeView};
pub use pipe::PipeView;
pub use processor::ProcessorView;
pub use queue::QueueView;

// Topology
pub use topology::{build_tree, entry_processors, ProcessorTree};
