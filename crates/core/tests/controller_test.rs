// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use futures_util::{SinkExt, StreamExt};
use indexmap::IndexMap;
use serde_json::json;
use tokio::time::{timeout, Duration};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use upview_api::defs::{EntityKind, NodeDef, PipeDef, ProcessorDef, QueueDef};
use upview_api::status::PipeState;
use upview_core::{ClientError, NodeEvent, NodeStatus, NodeView, PipeEvent, PipeView, QueueView};

fn pipe_def() -> PipeDef {
    let mut processors = IndexMap::new();
    for id in ["a", "b", "c"] {
        processors.insert(id.to_string(), ProcessorDef::named(id));
    }
    let mut queues = IndexMap::new();
    queues.insert("q1".to_string(), QueueDef::between("q1", "a", "b"));
    queues.insert("q2".to_string(), QueueDef::between("q2", "b", "c"));
    PipeDef {
        id: "pipe-1".to_string(),
        name: "demo".to_string(),
        processors,
        queues,
        root: ProcessorDef::named("a"),
        sink: QueueDef::between("sink", "c", ""),
        kind: Some(EntityKind::Pipeline),
        config: None,
        settings: None,
    }
}

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

async fn next_pipe_event(rx: &mut tokio::sync::broadcast::Receiver<PipeEvent>) -> PipeEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a pipe event")
        .expect("event stream ended")
}

async fn next_node_event(rx: &mut tokio::sync::broadcast::Receiver<NodeEvent>) -> NodeEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a node event")
        .expect("event stream ended")
}

#[tokio::test]
async fn test_pipe_greeting_flows_through_the_normal_decode_path() {
    let _ = tracing_subscriber::fmt::try_init();
    let Some(mut server) = common::start_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let view = PipeView::new(pipe_def());
    let mut events = view.subscribe();
    view.connect(&server.url).await.unwrap();
    let mut socket = server.accept().await;

    // Controllers greet with an array frame: status first, then the root's
    // queue wiring.
    let greeting = json!([
        { "type": 8, "sender": "ctrl", "dest": "pipe-1", "scope": 4,
          "status": 3, "pipe_name": "demo" },
        { "type": 2, "sender": "ctrl", "dest": "a", "scope": 1,
          "body": { "proc_id": "a", "queues": {
              "q1": { "id": "q1", "name": "q1", "from_p": "a", "to_p": "b", "size": 1000 }
          } } }
    ]);
    socket.send(WsMessage::text(greeting.to_string())).await.unwrap();

    assert!(matches!(
        next_pipe_event(&mut events).await,
        PipeEvent::StatusChanged(PipeState::Ready)
    ));
    match next_pipe_event(&mut events).await {
        PipeEvent::QueuesUpdated(update) => {
            assert_eq!(update.proc_id, "a");
            assert!(update.queues.contains_key("q1"));
        },
        other => panic!("expected queue update, got {other:?}"),
    }
    assert_eq!(view.state(), PipeState::Ready);

    view.disconnect().await;
}

#[tokio::test]
async fn test_pause_sends_exactly_one_control_frame() {
    let Some(mut server) = common::start_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let view = PipeView::new(pipe_def());
    let mut events = view.subscribe();
    view.connect(&server.url).await.unwrap();
    let mut socket = server.accept().await;

    // Bring the pipe to Running first.
    socket
        .send(WsMessage::text(
            json!({ "type": 8, "sender": "ctrl", "dest": "pipe-1", "scope": 4,
                    "status": 5, "pipe_name": "demo" })
                .to_string(),
        ))
        .await
        .unwrap();
    assert!(matches!(
        next_pipe_event(&mut events).await,
        PipeEvent::StatusChanged(PipeState::Running)
    ));
    assert!(view.is_running());

    view.pause().await.unwrap();

    let frame = timeout(Duration::from_secs(5), socket.next())
        .await
        .expect("timed out waiting for the control frame")
        .expect("socket ended")
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(frame.to_text().unwrap()).unwrap();
    assert_eq!(value["type"], 7);
    assert_eq!(value["action"], 3);
    assert_eq!(value["dest"], "pipe-1");
    assert_eq!(value["scope"], 4);
    assert_eq!(value["pipe_name"], "demo");

    // And nothing more.
    let extra = timeout(Duration::from_millis(300), socket.next()).await;
    assert!(extra.is_err(), "unexpected second frame: {extra:?}");

    view.disconnect().await;
}

#[tokio::test]
async fn test_control_after_session_closed_is_a_misuse_error() {
    let Some(mut server) = common::start_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let view = PipeView::new(pipe_def());
    let mut events = view.subscribe();
    view.connect(&server.url).await.unwrap();
    let socket = server.accept().await;
    drop(socket);

    assert!(matches!(next_pipe_event(&mut events).await, PipeEvent::Closed { .. }));
    let err = view.pause().await.unwrap_err();
    assert!(matches!(err, ClientError::Misuse(_)));
}

#[tokio::test]
async fn test_node_usage_fans_out_to_queue_views() {
    let Some(mut server) = common::start_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let node = NodeView::new(node_def());
    let queue = QueueView::new(QueueDef::between("q1", "a", "b"));
    node.watch_queue(queue.clone());
    let mut events = node.subscribe();

    assert_eq!(node.status(), NodeStatus::Init);
    node.connect(&server.url).await.unwrap();
    let mut socket = server.accept().await;
    assert!(matches!(
        next_node_event(&mut events).await,
        NodeEvent::StatusChanged(NodeStatus::Connected)
    ));

    // A frame addressed to someone else first: silently ignored.
    socket
        .send(WsMessage::text(
            json!({ "type": 12, "sender": "n2", "dest": "n2", "scope": 7,
                    "stats": { "node_id": "n2",
                               "cpu_total": { "core_id": "all", "value": 1.0 },
                               "memory": { "id": "mem", "value": 1.0 } } })
                .to_string(),
        ))
        .await
        .unwrap();

    socket
        .send(WsMessage::text(
            json!({ "type": 12, "sender": "n1", "dest": "n1", "scope": 7,
                    "stats": {
                        "node_id": "n1",
                        "cpu_total": { "core_id": "all", "value": 33.0 },
                        "memory": { "id": "mem", "value": 55.0 },
                        "queues_usage": [
                            { "q_id": "q1", "pending_counter": { "value": 4 } }
                        ]
                    } })
                .to_string(),
        ))
        .await
        .unwrap();

    match next_node_event(&mut events).await {
        NodeEvent::Usage(snapshot) => {
            assert_eq!(snapshot.node_id, "n1");
            assert_eq!(snapshot.cpu_total.value, 33.0);
        },
        other => panic!("expected a usage event, got {other:?}"),
    }
    assert_eq!(queue.stats().pending_counter.value, 4.0);
    assert_eq!(node.last_usage().unwrap().node_id, "n1");

    node.disconnect().await;
    assert_eq!(node.status(), NodeStatus::Available);
}

#[tokio::test]
async fn test_node_connect_is_idempotent_while_open() {
    let Some(mut server) = common::start_server().await else {
        eprintln!("skipping: local TCP bind not permitted");
        return;
    };

    let node = NodeView::new(node_def());
    node.connect(&server.url).await.unwrap();
    let _socket = server.accept().await;

    // Second connect while open is a no-op: no second connection arrives.
    node.connect(&server.url).await.unwrap();
    let extra = timeout(Duration::from_millis(300), server.accept_opt()).await;
    assert!(extra.is_err(), "unexpected second connection");

    node.disconnect().await;
}
