// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Processor view: a processor definition plus aggregated instance stats.
//!
//! Processors are observed, never commanded: control flows through the owning
//! pipe only. A processor view has no socket either; per-processor stats
//! arrive inside node utilization reports and are pushed in through
//! [`ProcessorView::update_stats`].

use tokio::sync::{broadcast, watch};
use upview_api::defs::ProcessorDef;
use upview_api::metrics::{ProcessorSnapshot, ProcessorTotals};

use crate::events::{self, ProcessorEvent};

/// Live view over one processor.
///
/// Cheap to clone; all clones share the same snapshot and event stream.
#[derive(Debug, Clone)]
pub struct ProcessorView {
    inner: std::sync::Arc<ProcessorShared>,
}

#[derive(Debug)]
struct ProcessorShared {
    def: ProcessorDef,
    snapshot: watch::Sender<ProcessorSnapshot>,
    events: broadcast::Sender<ProcessorEvent>,
}

impl ProcessorView {
    pub fn new(def: ProcessorDef) -> Self {
        let empty = ProcessorSnapshot {
            processor_id: def.id.clone(),
            pipe_id: None,
            instances_stats: Vec::new(),
        };
        Self {
            inner: std::sync::Arc::new(ProcessorShared {
                def,
                snapshot: watch::channel(empty).0,
                events: events::channel(),
            }),
        }
    }

    pub fn def(&self) -> &ProcessorDef {
        &self.inner.def
    }

    pub fn id(&self) -> &str {
        &self.inner.def.id
    }

    /// Replaces the retained snapshot and publishes it together with the
    /// derived totals.
    pub fn update_stats(&self, snapshot: ProcessorSnapshot) {
        let totals = snapshot.totals();
        self.inner.snapshot.send_replace(snapshot.clone());
        let _ = self.inner.events.send(ProcessorEvent::Stats { snapshot, totals });
    }

    /// Latest per-instance snapshot. Empty before the first report.
    pub fn latest(&self) -> ProcessorSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    /// Aggregate of the latest snapshot: all zeros before the first report.
    pub fn totals(&self) -> ProcessorTotals {
        self.inner.snapshot.borrow().totals()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ProcessorEvent> {
        self.inner.events.subscribe()
    }
}
