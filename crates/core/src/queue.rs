// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Queue view: a queue definition plus its latest performance snapshot.
//!
//! Queues have no socket of their own. Their stats arrive inside node
//! utilization reports and are fanned out by the owning [`crate::node::NodeView`].

use tokio::sync::{broadcast, watch};
use upview_api::defs::{PipeDef, QueueDef};
use upview_api::metrics::QueueSnapshot;

use crate::events::{self, QueueEvent};

/// Live view over one queue edge.
///
/// Cheap to clone; all clones share the same snapshot and event stream.
#[derive(Debug, Clone)]
pub struct QueueView {
    inner: std::sync::Arc<QueueShared>,
}

#[derive(Debug)]
struct QueueShared {
    def: QueueDef,
    stats: watch::Sender<QueueSnapshot>,
    events: broadcast::Sender<QueueEvent>,
}

impl QueueView {
    /// Starts with the default all-zero snapshot, so consumers can always
    /// read a full metric set without waiting for the first live report.
    pub fn new(def: QueueDef) -> Self {
        Self {
            inner: std::sync::Arc::new(QueueShared {
                def,
                stats: watch::channel(QueueSnapshot::default()).0,
                events: events::channel(),
            }),
        }
    }

    pub fn def(&self) -> &QueueDef {
        &self.inner.def
    }

    pub fn id(&self) -> &str {
        &self.inner.def.id
    }

    /// Latest snapshot, or the default one before the first report.
    pub fn stats(&self) -> QueueSnapshot {
        self.inner.stats.borrow().clone()
    }

    /// Replaces the snapshot wholesale and publishes it. No field merging.
    pub fn update_stats(&self, snapshot: QueueSnapshot) {
        self.inner.stats.send_replace(snapshot.clone());
        let _ = self.inner.events.send(QueueEvent::Stats(snapshot));
    }

    /// Source and destination processor ids of this edge.
    pub fn endpoints(&self) -> (&str, &str) {
        (&self.inner.def.from_p, &self.inner.def.to_p)
    }

    /// Whether either endpoint names a processor absent from `pipe`.
    ///
    /// Dangling edges are tolerated everywhere in this crate; this is a
    /// diagnostic helper only.
    pub fn is_dangling(&self, pipe: &PipeDef) -> bool {
        let known = |id: &str| pipe.processors.contains_key(id) || pipe.root.id == id;
        !known(&self.inner.def.from_p) || !known(&self.inner.def.to_p)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.inner.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use upview_api::metrics::Metric;

    #[test]
    fn test_starts_with_default_snapshot() {
        let view = QueueView::new(QueueDef::between("q1", "a", "b"));
        assert_eq!(view.stats(), QueueSnapshot::default());
        assert_eq!(view.stats().pending_counter.value, 0.0);
    }

    #[test]
    fn test_update_replaces_and_publishes() {
        let view = QueueView::new(QueueDef::between("q1", "a", "b"));
        let mut events = view.subscribe();

        let snapshot = QueueSnapshot {
            q_id: "q1".to_string(),
            pending_counter: Metric::counter(7.0),
            ..QueueSnapshot::default()
        };
        view.update_stats(snapshot.clone());

        assert_eq!(view.stats(), snapshot);
        assert!(matches!(events.try_recv().unwrap(), QueueEvent::Stats(s) if s.pending_counter.value == 7.0));
    }
}
