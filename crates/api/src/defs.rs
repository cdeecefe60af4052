// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Entity definitions served by the view API.
//!
//! These are the flat structures a node controller hands out over
//! `GET /view/{nodes,queues,pipes}`. A pipe definition is deliberately not a
//! tree: processors and queues arrive as keyed maps plus a virtual `root`
//! processor and a virtual `sink` queue, and the client reconstructs the
//! topology from the queue endpoints.
//!
//! Maps use [`indexmap::IndexMap`] so definition order survives a decode and
//! re-encode unchanged.

use indexmap::IndexMap;
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};

/// Integer-coded entity discriminator used in definitions and message scopes.
///
/// The set is open: codes this client does not know decode to [`Self::Other`]
/// so definitions written by newer servers stay loadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Processor,
    ProcessorInstance,
    Process,
    Pipeline,
    PipelineController,
    Server,
    Node,
    Queue,
    /// A code not recognized by this client/version.
    Other(u8),
}

impl EntityKind {
    /// The wire code for this kind.
    pub const fn code(self) -> u8 {
        match self {
            Self::Processor => 1,
            Self::ProcessorInstance => 2,
            Self::Process => 3,
            Self::Pipeline => 4,
            Self::PipelineController => 5,
            Self::Server => 6,
            Self::Node => 7,
            Self::Queue => 8,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for EntityKind {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::Processor,
            2 => Self::ProcessorInstance,
            3 => Self::Process,
            4 => Self::Pipeline,
            5 => Self::PipelineController,
            6 => Self::Server,
            7 => Self::Node,
            8 => Self::Queue,
            other => Self::Other(other),
        }
    }
}

impl Serialize for EntityKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for EntityKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Self::from)
    }
}

/// Hardware resource classes a node can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Node,
    Cpu,
    Gpu,
    Tpu,
    Memory,
    NetworkIo,
    DiskIo,
    StandardStorage,
    SsdStorage,
}

/// A hardware resource attached to a node definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

/// Tunables attached to a processor definition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorSettings {
    /// Maximum number of instances the controller may scale to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscale: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_buffer_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// One processor in a pipe definition.
///
/// The launch fields (`entry`, `function`, `interpreter`) only matter to the
/// runtime; the client carries them through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessorDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interpreter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<ProcessorSettings>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
}

impl ProcessorDef {
    /// A minimal definition, enough for wiring tests and synthetic pipes.
    pub fn named(id: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            kind: Some(EntityKind::Processor),
            entry: None,
            function: None,
            interpreter: None,
            settings: None,
            config: None,
        }
    }
}

/// One queue edge in a pipe definition.
///
/// `from_p` and `to_p` name processor ids. Either side may reference a
/// processor that is absent from the definition map; such dangling edges are
/// valid input and simply do not contribute to the reconstructed topology.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueDef {
    pub id: String,
    pub name: String,
    pub from_p: String,
    pub to_p: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

impl QueueDef {
    /// A minimal queue between two processors.
    pub fn between(id: &str, from_p: &str, to_p: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            from_p: from_p.to_string(),
            to_p: to_p.to_string(),
            size: 0,
            host: None,
            kind: Some(EntityKind::Queue),
            config: None,
            settings: None,
        }
    }
}

/// A complete pipe definition: processors, queue edges, and the two virtual
/// endpoints (entry `root`, terminal `sink`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipeDef {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub processors: IndexMap<String, ProcessorDef>,
    #[serde(default)]
    pub queues: IndexMap<String, QueueDef>,
    pub root: ProcessorDef,
    pub sink: QueueDef,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntityKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

/// A compute node as advertised over the view API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    /// Whether this node hosts the controller for its cluster.
    #[serde(default)]
    pub controller: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_kind_codes_round_trip() {
        for code in 1..=8u8 {
            let kind = EntityKind::from(code);
            assert_ne!(kind, EntityKind::Other(code));
            assert_eq!(kind.code(), code);
        }
        assert_eq!(EntityKind::from(42), EntityKind::Other(42));
        assert_eq!(EntityKind::Other(42).code(), 42);
    }

    #[test]
    fn test_entity_kind_serializes_as_integer() {
        let json = serde_json::to_string(&EntityKind::Queue).unwrap();
        assert_eq!(json, "8");
        let kind: EntityKind = serde_json::from_str("7").unwrap();
        assert_eq!(kind, EntityKind::Node);
    }

    #[test]
    fn test_pipe_def_decodes_with_missing_maps() {
        let json = r#"{
            "id": "pipe-1",
            "name": "demo",
            "root": { "id": "pipe-1:root", "name": "root" },
            "sink": { "id": "sink", "name": "sink", "from_p": "c", "to_p": "sink", "size": 100 }
        }"#;

        let pipe: PipeDef = serde_json::from_str(json).unwrap();
        assert!(pipe.processors.is_empty());
        assert!(pipe.queues.is_empty());
        assert_eq!(pipe.root.id, "pipe-1:root");
        assert_eq!(pipe.sink.to_p, "sink");
    }

    #[test]
    fn test_queue_map_order_survives_round_trip() {
        let mut queues = IndexMap::new();
        for id in ["q3", "q1", "q2"] {
            queues.insert(id.to_string(), QueueDef::between(id, "a", "b"));
        }
        let json = serde_json::to_string(&queues).unwrap();
        let decoded: IndexMap<String, QueueDef> = serde_json::from_str(&json).unwrap();
        let order: Vec<&String> = decoded.keys().collect();
        assert_eq!(order, ["q3", "q1", "q2"]);
    }

    #[test]
    fn test_node_def_type_field_maps_to_kind() {
        let json = r#"{ "id": "n1", "name": "worker", "type": 7, "controller": true }"#;
        let node: NodeDef = serde_json::from_str(json).unwrap();
        assert_eq!(node.kind, EntityKind::Node);
        assert!(node.controller);
        assert!(node.resources.is_empty());

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["type"], 7);
    }
}
