// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Performance metrics and entity snapshots.
//!
//! Node controllers report utilization as nested snapshot structures: a node
//! snapshot carries per-core CPU readings plus the latest queue and processor
//! figures. Every metric field is defaulted so that sparse payloads decode to
//! the zero metric instead of failing.
//!
//! Snapshots are values. Consumers replace a whole snapshot when a newer one
//! arrives; there is no field-level merging anywhere in the client.

use serde::{Deserialize, Serialize};

/// What a metric measures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Compute,
    Memory,
    DiskIo,
    NetworkIo,
    Throughput,
    Storage,
    #[default]
    Generic,
}

/// How a metric value is scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricUnit {
    /// Plain counter or gauge.
    #[default]
    Number,
    /// 0..100 utilization.
    Percentage,
    /// Data frames per second.
    Dfps,
}

/// A single reported reading.
///
/// The default value (`generic` / `number` / `0.0`) is what consumers see for
/// an entity that has not reported yet.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metric {
    #[serde(rename = "metric_type", default)]
    pub kind: MetricKind,
    #[serde(default)]
    pub value: f64,
    #[serde(default)]
    pub unit: MetricUnit,
}

impl Metric {
    /// A throughput reading in data frames per second.
    pub const fn dfps(value: f64) -> Self {
        Self { kind: MetricKind::Throughput, value, unit: MetricUnit::Dfps }
    }

    /// A plain counter reading.
    pub const fn counter(value: f64) -> Self {
        Self { kind: MetricKind::Generic, value, unit: MetricUnit::Number }
    }
}

/// A per-core CPU utilization reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CpuMetric {
    pub core_id: String,
    #[serde(rename = "metric_type", default = "MetricKind::compute")]
    pub kind: MetricKind,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "MetricUnit::percentage")]
    pub unit: MetricUnit,
}

/// A utilization reading for an identified device (memory bank, disk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeMetric {
    pub id: String,
    #[serde(rename = "metric_type", default)]
    pub kind: MetricKind,
    #[serde(default)]
    pub value: f64,
    #[serde(default = "MetricUnit::percentage")]
    pub unit: MetricUnit,
}

impl MetricKind {
    const fn compute() -> Self {
        Self::Compute
    }
}

impl MetricUnit {
    const fn percentage() -> Self {
        Self::Percentage
    }
}

/// Latest readings for one queue.
///
/// `q_id` ties the snapshot back to a queue definition. Before the first live
/// report a queue shows `QueueSnapshot::default()`: empty id, zero metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub q_id: String,
    #[serde(default)]
    pub dfps_in: Metric,
    #[serde(default)]
    pub dfps_out: Metric,
    #[serde(default)]
    pub allocation_counter: Metric,
    #[serde(default)]
    pub exe_counter: Metric,
    #[serde(default)]
    pub pending_counter: Metric,
    #[serde(default)]
    pub allocation_index: Metric,
    #[serde(default)]
    pub exe_index: Metric,
    #[serde(default)]
    pub free_space: Metric,
    #[serde(default)]
    pub size: Metric,
}

/// Latest readings for one OS process hosting a processor instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessSnapshot {
    pub pid: u32,
    #[serde(default)]
    pub dfps_in: Metric,
    #[serde(default)]
    pub dfps_out: Metric,
    #[serde(default)]
    pub received_counter: Metric,
    #[serde(default)]
    pub processed_counter: Metric,
}

/// Per-processor readings: one entry per running instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorSnapshot {
    pub processor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipe_id: Option<String>,
    #[serde(default)]
    pub instances_stats: Vec<ProcessSnapshot>,
}

impl ProcessorSnapshot {
    /// Sums instance readings into one figure per axis.
    ///
    /// An empty (or absent on the wire) instance list yields all zeros.
    pub fn totals(&self) -> ProcessorTotals {
        let mut totals = ProcessorTotals::default();
        for instance in &self.instances_stats {
            totals.dfps_in += instance.dfps_in.value;
            totals.dfps_out += instance.dfps_out.value;
            totals.received += instance.received_counter.value;
            totals.processed += instance.processed_counter.value;
        }
        totals
    }
}

/// Aggregate throughput and counters for a processor across its instances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProcessorTotals {
    pub dfps_in: f64,
    pub dfps_out: f64,
    pub received: f64,
    pub processed: f64,
}

/// Full utilization report for one compute node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    pub node_id: String,
    pub cpu_total: CpuMetric,
    pub memory: GaugeMetric,
    #[serde(default)]
    pub cores_usage: Vec<CpuMetric>,
    #[serde(default)]
    pub disks_usage: Vec<GaugeMetric>,
    #[serde(default)]
    pub queues_usage: Vec<QueueSnapshot>,
    #[serde(default)]
    pub processors_usage: Vec<ProcessorSnapshot>,
}

/// Pending-depth report for one queue, timestamped in epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueLoad {
    pub q_id: String,
    pub pending: i64,
    pub time: i64,
}
