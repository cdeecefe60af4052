// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! WebSocket message envelope and typed decode.
//!
//! Every frame on a controller socket is JSON: either a single [`Envelope`]
//! or an array of envelopes (controllers batch the connection greeting).
//! An envelope routes by three header fields:
//!
//! - `type`: integer message kind, the sole dispatch key
//! - `dest`: id or name of the entity the frame is addressed to
//! - `scope`: the entity class the frame concerns
//!
//! [`Message::try_from`] turns an envelope into a [`Payload`]-carrying typed
//! message. Dispatch happens on the `type` code alone; payload fields are
//! never sniffed to guess a kind. Kinds this client does not interpret come
//! out as [`Payload::Other`] with the original body and sibling fields kept
//! intact, so subscribers can still observe them.

use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use indexmap::IndexMap;

use crate::defs::{EntityKind, QueueDef};
use crate::error::DecodeError;
use crate::metrics::{NodeSnapshot, QueueLoad};
use crate::status::{PipeAction, PipeState};

/// Integer-coded message discriminator.
///
/// The set is open: unknown codes decode to [`Self::Other`] and flow through
/// to subscribers unprocessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Pending-depth report for a queue.
    QueueStatus,
    /// Queue wiring pushed to a processor.
    QueueUpdate,
    ProcessorRegister,
    /// Graceful shutdown request.
    TerminationRequest,
    PipeRegister,
    NodeInit,
    /// Pipeline control command.
    PipeControl,
    /// Pipeline execution status report.
    PipeStatus,
    ConfigUpdate,
    RegistrationInfo,
    InstanceAction,
    /// Node utilization snapshot.
    NodeStatus,
    ProcessStatus,
    /// A code not recognized by this client/version.
    Other(u8),
}

impl MessageKind {
    pub const fn code(self) -> u8 {
        match self {
            Self::QueueStatus => 1,
            Self::QueueUpdate => 2,
            Self::ProcessorRegister => 3,
            Self::TerminationRequest => 4,
            Self::PipeRegister => 5,
            Self::NodeInit => 6,
            Self::PipeControl => 7,
            Self::PipeStatus => 8,
            Self::ConfigUpdate => 9,
            Self::RegistrationInfo => 10,
            Self::InstanceAction => 11,
            Self::NodeStatus => 12,
            Self::ProcessStatus => 13,
            Self::Other(code) => code,
        }
    }
}

impl From<u8> for MessageKind {
    fn from(code: u8) -> Self {
        match code {
            1 => Self::QueueStatus,
            2 => Self::QueueUpdate,
            3 => Self::ProcessorRegister,
            4 => Self::TerminationRequest,
            5 => Self::PipeRegister,
            6 => Self::NodeInit,
            7 => Self::PipeControl,
            8 => Self::PipeStatus,
            9 => Self::ConfigUpdate,
            10 => Self::RegistrationInfo,
            11 => Self::InstanceAction,
            12 => Self::NodeStatus,
            13 => Self::ProcessStatus,
            other => Self::Other(other),
        }
    }
}

impl Serialize for MessageKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for MessageKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        u8::deserialize(deserializer).map(Self::from)
    }
}

/// Raw wire message, exactly as exchanged with a controller.
///
/// Kind-specific fields (`status`, `pipe_name`, `stats`, `action`, ...) ride
/// next to the header rather than inside `body`; the flattened `extra` map
/// captures them losslessly in both directions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub sender: String,
    pub dest: String,
    pub scope: EntityKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Envelope {
    /// Builds a pipeline control frame.
    ///
    /// `dest` is the pipe id; `sender` identifies the issuing side (the
    /// original runtime uses the pipe's own id there).
    pub fn pipe_control(sender: &str, dest: &str, pipe_name: &str, action: PipeAction) -> Self {
        let mut extra = serde_json::Map::new();
        extra.insert("action".to_string(), Value::from(action.code()));
        extra.insert("pipe_name".to_string(), Value::from(pipe_name));
        Self {
            kind: MessageKind::PipeControl,
            sender: sender.to_string(),
            dest: dest.to_string(),
            scope: EntityKind::Pipeline,
            body: None,
            extra,
        }
    }

    /// Serializes this envelope to frame text.
    ///
    /// # Errors
    /// Returns an error if a payload value cannot be represented as JSON.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parses one WebSocket text frame into envelopes.
///
/// Controllers send either a single JSON object or a JSON array of them;
/// array order is preserved.
///
/// # Errors
/// Returns [`DecodeError::Malformed`] when the text is not valid JSON or an
/// element is not an envelope.
pub fn parse_frame(text: &str) -> Result<Vec<Envelope>, DecodeError> {
    let value: Value = serde_json::from_str(text)?;
    match value {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(DecodeError::from))
            .collect(),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

/// Queue wiring for one processor, the body of a queue-update message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcQueues {
    pub proc_id: String,
    #[serde(default)]
    pub queues: IndexMap<String, QueueDef>,
}

/// A decoded inbound message: routing header plus typed payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageKind,
    pub sender: String,
    pub dest: String,
    pub scope: EntityKind,
    pub payload: Payload,
}

impl Message {
    /// Whether this message is addressed to the given entity id or name.
    pub fn is_for(&self, id: &str, name: &str) -> bool {
        self.dest == id || self.dest == name
    }
}

/// Typed payload of a decoded message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Pipeline execution status report.
    PipeStatus { pipe_name: String, status: PipeState },
    /// Pipeline control command.
    PipeControl { pipe_name: String, action: PipeAction },
    /// Node utilization snapshot.
    NodeUsage(NodeSnapshot),
    /// Pending-depth report for a queue.
    QueueLoad(QueueLoad),
    /// Queue wiring pushed to a processor.
    QueueUpdate(ProcQueues),
    /// Replacement configuration, taken verbatim from the body.
    ConfigUpdate(Value),
    /// Instance identity assigned by the controller.
    RegistrationInfo { instance_id: Option<i64> },
    /// Graceful shutdown request.
    TerminationRequest,
    /// A kind this client does not interpret, forwarded untouched.
    Other { body: Option<Value>, extra: serde_json::Map<String, Value> },
}

#[derive(Deserialize)]
struct RegistrationBody {
    #[serde(default)]
    instance_id: Option<i64>,
}

impl TryFrom<Envelope> for Message {
    type Error = DecodeError;

    /// Decodes an envelope by its `type` code.
    ///
    /// # Errors
    /// Returns a [`DecodeError`] when a recognized kind is missing its body
    /// or a required sibling field, or when a payload fails to parse. Unknown
    /// kinds never error; they become [`Payload::Other`].
    fn try_from(env: Envelope) -> Result<Self, Self::Error> {
        let Envelope { kind, sender, dest, scope, body, extra } = env;
        let payload = match kind {
            MessageKind::PipeStatus => Payload::PipeStatus {
                pipe_name: extra_field(kind, &extra, "pipe_name")?,
                status: extra_field(kind, &extra, "status")?,
            },
            MessageKind::PipeControl => Payload::PipeControl {
                pipe_name: extra_field(kind, &extra, "pipe_name")?,
                action: extra_field(kind, &extra, "action")?,
            },
            MessageKind::NodeStatus => Payload::NodeUsage(extra_field(kind, &extra, "stats")?),
            MessageKind::QueueStatus => Payload::QueueLoad(body_field(kind, body.as_ref())?),
            MessageKind::QueueUpdate => Payload::QueueUpdate(body_field(kind, body.as_ref())?),
            MessageKind::ConfigUpdate => Payload::ConfigUpdate(body.unwrap_or(Value::Null)),
            MessageKind::RegistrationInfo => {
                let parsed: RegistrationBody = body_field(kind, body.as_ref())?;
                Payload::RegistrationInfo { instance_id: parsed.instance_id }
            },
            MessageKind::TerminationRequest => Payload::TerminationRequest,
            _ => Payload::Other { body, extra },
        };

        Ok(Self { kind, sender, dest, scope, payload })
    }
}

/// Reads a kind-specific sibling field from the envelope header level.
fn extra_field<T>(
    kind: MessageKind,
    extra: &serde_json::Map<String, Value>,
    name: &'static str,
) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned,
{
    let value = extra.get(name).ok_or(DecodeError::MissingField { kind, name })?;
    T::deserialize(value).map_err(DecodeError::from)
}

/// Parses the envelope body into the kind's expected shape.
fn body_field<T>(kind: MessageKind, body: Option<&Value>) -> Result<T, DecodeError>
where
    T: serde::de::DeserializeOwned,
{
    let body = body.ok_or(DecodeError::MissingBody { kind })?;
    T::deserialize(body).map_err(DecodeError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_one(json: &str) -> Message {
        let envelopes = parse_frame(json).unwrap();
        assert_eq!(envelopes.len(), 1);
        Message::try_from(envelopes.into_iter().next().unwrap()).unwrap()
    }

    #[test]
    fn test_pipe_status_decodes_from_siblings() {
        let msg = decode_one(
            r#"{ "type": 8, "sender": "demo", "dest": "demo", "scope": 4,
                 "status": 5, "pipe_name": "demo" }"#,
        );
        assert_eq!(msg.kind, MessageKind::PipeStatus);
        assert_eq!(
            msg.payload,
            Payload::PipeStatus { pipe_name: "demo".to_string(), status: PipeState::Running }
        );
    }

    #[test]
    fn test_greeting_array_preserves_order() {
        let frame = r#"[
            { "type": 8, "sender": "demo", "dest": "demo", "scope": 4,
              "status": 3, "pipe_name": "demo" },
            { "type": 2, "sender": "demo:root", "dest": "demo:root", "scope": 1,
              "body": { "proc_id": "demo:root", "queues": {} } }
        ]"#;

        let envelopes = parse_frame(frame).unwrap();
        assert_eq!(envelopes.len(), 2);
        assert_eq!(envelopes[0].kind, MessageKind::PipeStatus);
        assert_eq!(envelopes[1].kind, MessageKind::QueueUpdate);
    }

    #[test]
    fn test_unknown_kind_is_forwarded_untouched() {
        let msg = decode_one(
            r#"{ "type": 99, "sender": "s", "dest": "d", "scope": 6,
                 "body": { "anything": [1, 2] }, "custom": true }"#,
        );
        assert_eq!(msg.kind, MessageKind::Other(99));
        match msg.payload {
            Payload::Other { body, extra } => {
                assert_eq!(body.unwrap()["anything"][1], 2);
                assert_eq!(extra.get("custom"), Some(&Value::Bool(true)));
            },
            other => panic!("expected Other payload, got {other:?}"),
        }
    }

    #[test]
    fn test_recognized_kind_without_body_is_an_error() {
        let envelopes =
            parse_frame(r#"{ "type": 2, "sender": "s", "dest": "d", "scope": 1 }"#).unwrap();
        let err = Message::try_from(envelopes.into_iter().next().unwrap()).unwrap_err();
        assert!(err.to_string().contains("no body"));
    }

    #[test]
    fn test_status_with_bad_code_is_an_error() {
        let envelopes = parse_frame(
            r#"{ "type": 8, "sender": "s", "dest": "d", "scope": 4,
                 "status": 42, "pipe_name": "p" }"#,
        )
        .unwrap();
        assert!(Message::try_from(envelopes.into_iter().next().unwrap()).is_err());
    }

    #[test]
    fn test_control_frame_shape() {
        let env = Envelope::pipe_control("pipe-1", "pipe-1", "demo", PipeAction::Pause);
        let json: Value = serde_json::from_str(&env.to_text().unwrap()).unwrap();
        assert_eq!(json["type"], 7);
        assert_eq!(json["action"], 3);
        assert_eq!(json["pipe_name"], "demo");
        assert_eq!(json["dest"], "pipe-1");
        assert_eq!(json["scope"], 4);
        assert!(json.get("body").is_none());
    }

    #[test]
    fn test_node_usage_carries_snapshot() {
        let msg = decode_one(
            r#"{ "type": 12, "sender": "n1", "dest": "n1", "scope": 7,
                 "stats": { "node_id": "n1",
                            "cpu_total": { "core_id": "all", "value": 17.5 },
                            "memory": { "id": "mem", "value": 40.0 } } }"#,
        );
        match msg.payload {
            Payload::NodeUsage(stats) => {
                assert_eq!(stats.node_id, "n1");
                assert_eq!(stats.cpu_total.value, 17.5);
            },
            other => panic!("expected NodeUsage, got {other:?}"),
        }
    }

    #[test]
    fn test_queue_load_from_body() {
        let msg = decode_one(
            r#"{ "type": 1, "sender": "proc", "dest": "node", "scope": 7,
                 "body": { "q_id": "q1", "pending": 12, "time": 1700000000000 } }"#,
        );
        match msg.payload {
            Payload::QueueLoad(load) => {
                assert_eq!(load.q_id, "q1");
                assert_eq!(load.pending, 12);
            },
            other => panic!("expected QueueLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_frame_is_an_error() {
        assert!(parse_frame("{ not json").is_err());
        assert!(parse_frame(r#"[ { "type": 8 } ]"#).is_err());
    }

    #[test]
    fn test_dest_matching_accepts_id_or_name() {
        let msg = decode_one(
            r#"{ "type": 8, "sender": "x", "dest": "demo", "scope": 4,
                 "status": 3, "pipe_name": "demo" }"#,
        );
        assert!(msg.is_for("pipe-1", "demo"));
        assert!(msg.is_for("demo", "demo"));
        assert!(!msg.is_for("pipe-2", "other"));
    }
}
