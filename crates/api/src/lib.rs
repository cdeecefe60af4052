// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! api: the wire contract spoken by UPipe node controllers.
//!
//! All traffic is JSON. The view REST API serves entity definitions wrapped
//! in [`response::ApiResponse`]; the WebSocket side exchanges
//! [`message::Envelope`] frames dispatched by an integer `type` code.
//!
//! ## Modules
//!
//! - [`defs`]: entity definitions (nodes, pipes, processors, queues)
//! - [`message`]: envelope, typed message decode, frame parsing
//! - [`metrics`]: performance metrics and utilization snapshots
//! - [`status`]: execution status and control codes
//! - [`response`]: view API response envelope
//! - [`error`]: decode errors
//!
//! ## Example (decoding a frame)
//!
//! ```
//! use upview_api::message::{parse_frame, Message, Payload};
//!
//! let frame = r#"{ "type": 8, "sender": "demo", "dest": "demo", "scope": 4,
//!                  "status": 5, "pipe_name": "demo" }"#;
//! for envelope in parse_frame(frame).unwrap() {
//!     let message = Message::try_from(envelope).unwrap();
//!     if let Payload::PipeStatus { status, .. } = message.payload {
//!         println!("pipe is {status:?}");
//!     }
//! }
//! ```

// Module declarations
pub mod defs;
pub mod error;
pub mod message;
pub mod metrics;
pub mod response;
pub mod status;

// Convenience re-exports for commonly used types

// Definitions
pub use defs::{EntityKind, NodeDef, PipeDef, ProcessorDef, QueueDef, ResourceDef};

// Wire messages
pub use message::{parse_frame, Envelope, Message, MessageKind, Payload, ProcQueues};

// Metrics and snapshots
pub use metrics::{
    Metric, NodeSnapshot, ProcessSnapshot, ProcessorSnapshot, ProcessorTotals, QueueLoad,
    QueueSnapshot,
};

// Status and control codes
pub use status::{PipeAction, PipeState, ProcessorState};

// Response envelope
pub use response::ApiResponse;

// Error handling
pub use error::DecodeError;
