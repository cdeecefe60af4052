// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Pipeline topology reconstruction.
//!
//! The view API serves a pipe as two flat maps (processors, queue edges) plus
//! a designated root processor. These functions rebuild the directed graph a
//! dashboard actually wants: the set of entry processors and a tree rooted at
//! the pipe's root.
//!
//! The builder is hardened against bad server data: edges naming a processor
//! that is not in the map are skipped, and a visited set bounds expansion so
//! a malformed definition containing a cycle cannot recurse forever. Both are
//! tolerated inputs, not errors.
//!
//! Complexity is O(P·Q) per expansion step, which is fine at dashboard scale
//! (tens of processors).

use std::collections::HashSet;

use tracing::debug;
use upview_api::defs::{PipeDef, ProcessorDef};

/// Processors with no incoming queue edge.
///
/// These form the root set of the pipeline DAG. Order follows the pipe's
/// processor map, so repeated calls over the same definition are stable.
pub fn entry_processors(pipe: &PipeDef) -> Vec<&ProcessorDef> {
    pipe.processors
        .values()
        .filter(|proc| !pipe.queues.values().any(|queue| queue.to_p == proc.id))
        .collect()
}

/// One node of a reconstructed pipeline tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorTree {
    pub def: ProcessorDef,
    pub children: Vec<ProcessorTree>,
}

impl ProcessorTree {
    /// Preorder listing of processor ids, root first.
    pub fn flatten(&self) -> Vec<&str> {
        let mut ids = vec![self.def.id.as_str()];
        for child in &self.children {
            ids.extend(child.flatten());
        }
        ids
    }

    /// Whether `id` appears anywhere in the tree.
    pub fn contains(&self, id: &str) -> bool {
        self.def.id == id || self.children.iter().any(|child| child.contains(id))
    }

    /// Number of levels, counting the root as one.
    pub fn depth(&self) -> usize {
        1 + self.children.iter().map(Self::depth).max().unwrap_or(0)
    }
}

/// Rebuilds the processor tree of a pipe, rooted at its designated root.
///
/// Children are discovered by following queues whose `from_p` matches the
/// current processor, in queue-map order. Each processor is expanded at most
/// once: an edge whose destination was already placed in the tree is skipped,
/// so cyclic or duplicated wiring terminates cleanly. Edges whose destination
/// names no processor in the map (the sink queue, or a dangling reference)
/// contribute no child.
pub fn build_tree(pipe: &PipeDef) -> ProcessorTree {
    let mut visited = HashSet::new();
    visited.insert(pipe.root.id.as_str());
    expand(pipe, &pipe.root, &mut visited)
}

fn expand<'p>(
    pipe: &'p PipeDef,
    current: &ProcessorDef,
    visited: &mut HashSet<&'p str>,
) -> ProcessorTree {
    let mut children = Vec::new();
    for queue in pipe.queues.values() {
        if queue.from_p != current.id {
            continue;
        }
        let Some(child) = pipe.processors.get(&queue.to_p) else {
            debug!(queue_id = %queue.id, to_p = %queue.to_p, "skipping edge to unknown processor");
            continue;
        };
        if !visited.insert(child.id.as_str()) {
            debug!(queue_id = %queue.id, to_p = %queue.to_p, "skipping edge to already-placed processor");
            continue;
        }
        children.push(expand(pipe, child, visited));
    }
    ProcessorTree { def: current.clone(), children }
}
