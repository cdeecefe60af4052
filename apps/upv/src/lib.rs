// SPDX-FileCopyrightText: © 2026 UPipe Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Fetch glue and terminal commands for the `upv` binary.
//!
//! This is the external collaborator of `upview-core`: it pulls entity
//! definitions off a node controller's view API, hands them to the core's
//! builders and controllers, and streams their events to stdout.

use std::collections::HashSet;

use tokio::time::{timeout, Duration};
use tracing::{debug, info};
use upview_api::defs::{NodeDef, PipeDef, QueueDef};
use upview_api::response::ApiResponse;
use upview_api::status::PipeAction;
use upview_core::topology::ProcessorTree;
use upview_core::{NodeEvent, NodeView, PipeEvent, PipeView};
use url::Url;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Normalizes `server` into an HTTP base URL.
///
/// Accepts a bare `host:port` or an explicit `http(s)://` URL; path, query
/// and fragment are stripped.
fn http_base_url(server: &str) -> Result<Url, BoxError> {
    let mut url = if server.contains("://") {
        Url::parse(server)?
    } else {
        Url::parse(&format!("http://{server}"))?
    };
    match url.scheme() {
        "http" | "https" => {},
        _ => return Err("Server must be host:port or an http(s) URL".into()),
    }
    url.set_path("");
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Derives the WebSocket endpoint a controller exposes for `name`.
///
/// # Errors
///
/// Returns an error if `server` is not a valid host or URL.
pub fn ws_endpoint(server: &str, name: &str) -> Result<String, BoxError> {
    let mut url = http_base_url(server)?;
    let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
    url.set_scheme(scheme).map_err(|()| "Failed to convert http:// to ws://")?;
    url.set_path(&format!("/ws/connect/{name}"));
    Ok(url.to_string())
}

/// Thin client for the view REST API.
pub struct ViewClient {
    http: reqwest::Client,
    base: Url,
}

impl ViewClient {
    /// # Errors
    ///
    /// Returns an error if `server` is not a valid host or URL.
    pub fn new(server: &str) -> Result<Self, BoxError> {
        Ok(Self { http: reqwest::Client::new(), base: http_base_url(server)? })
    }

    async fn fetch<T>(&self, path: &str) -> Result<T, BoxError>
    where
        T: serde::de::DeserializeOwned + Default,
    {
        let url = self.base.join(path)?;
        debug!(url = %url, "fetching definitions");
        let response = self.http.get(url).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Server returned error {status}: {body}").into());
        }
        let body: ApiResponse<T> = response.json().await?;
        Ok(body.into_data()?)
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn nodes(&self) -> Result<Vec<NodeDef>, BoxError> {
        self.fetch("/view/nodes").await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn pipes(&self) -> Result<Vec<PipeDef>, BoxError> {
        self.fetch("/view/pipes").await
    }

    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    pub async fn queues(&self) -> Result<Vec<QueueDef>, BoxError> {
        self.fetch("/view/queues").await
    }

    /// Looks a pipe up by id or name.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or no pipe matches.
    pub async fn find_pipe(&self, ident: &str) -> Result<PipeDef, BoxError> {
        self.pipes()
            .await?
            .into_iter()
            .find(|pipe| pipe.id == ident || pipe.name == ident)
            .ok_or_else(|| format!("No such pipe: {ident}").into())
    }

    /// Looks a node up by id or name.
    ///
    /// # Errors
    ///
    /// Returns an error if the fetch fails or no node matches.
    pub async fn find_node(&self, ident: &str) -> Result<NodeDef, BoxError> {
        self.nodes()
            .await?
            .into_iter()
            .find(|node| node.id == ident || node.name == ident)
            .ok_or_else(|| format!("No such node: {ident}").into())
    }
}

/// Fetch and print node definitions.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn list_nodes(server: &str) -> Result<(), BoxError> {
    let nodes = ViewClient::new(server)?.nodes().await?;
    if nodes.is_empty() {
        println!("No nodes registered.");
        return Ok(());
    }
    println!("{:<24} {:<20} {:<10} RESOURCES", "ID", "NAME", "CONTROLLER");
    println!("{}", "-".repeat(70));
    for node in nodes {
        println!(
            "{:<24} {:<20} {:<10} {}",
            node.id,
            node.name,
            if node.controller { "yes" } else { "no" },
            node.resources.len()
        );
    }
    Ok(())
}

/// Fetch and print pipe definitions.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn list_pipes(server: &str) -> Result<(), BoxError> {
    let pipes = ViewClient::new(server)?.pipes().await?;
    if pipes.is_empty() {
        println!("No pipes registered.");
        return Ok(());
    }
    println!("{:<24} {:<20} {:<12} QUEUES", "ID", "NAME", "PROCESSORS");
    println!("{}", "-".repeat(70));
    for pipe in pipes {
        println!(
            "{:<24} {:<20} {:<12} {}",
            pipe.id,
            pipe.name,
            pipe.processors.len(),
            pipe.queues.len()
        );
    }
    Ok(())
}

/// Fetch and print queue definitions.
///
/// # Errors
///
/// Returns an error if the fetch fails.
pub async fn list_queues(server: &str) -> Result<(), BoxError> {
    let queues = ViewClient::new(server)?.queues().await?;
    if queues.is_empty() {
        println!("No queues registered.");
        return Ok(());
    }
    println!("{:<24} {:<16} {:<16} SIZE", "ID", "FROM", "TO");
    println!("{}", "-".repeat(70));
    for queue in queues {
        println!("{:<24} {:<16} {:<16} {}", queue.id, queue.from_p, queue.to_p, queue.size);
    }
    Ok(())
}

fn print_branch(node: &ProcessorTree, depth: usize, entries: &HashSet<&str>) {
    let marker = if entries.contains(node.def.id.as_str()) { " (entry)" } else { "" };
    println!("{}{}{marker}", "  ".repeat(depth), node.def.name);
    for child in &node.children {
        print_branch(child, depth + 1, entries);
    }
}

/// Fetch one pipe, rebuild its topology, and print it as an indented tree.
///
/// # Errors
///
/// Returns an error if the fetch fails or the pipe does not exist.
pub async fn show_tree(pipe_ident: &str, server: &str) -> Result<(), BoxError> {
    let def = ViewClient::new(server)?.find_pipe(pipe_ident).await?;
    let view = PipeView::new(def);

    let entries: HashSet<&str> =
        view.entry_processors().iter().map(|proc| proc.id.as_str()).collect();
    println!("pipe {} ({})", view.name(), view.id());
    print_branch(view.tree(), 0, &entries);
    Ok(())
}

/// Connect to a pipe's socket and stream its events until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the fetch or the connect fails.
pub async fn watch_pipe(pipe_ident: &str, server: &str) -> Result<(), BoxError> {
    let def = ViewClient::new(server)?.find_pipe(pipe_ident).await?;
    let endpoint = ws_endpoint(server, &def.name)?;
    let view = PipeView::new(def);
    let mut events = view.subscribe();
    view.connect(&endpoint).await?;
    info!(pipe = %view.name(), "watching (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(PipeEvent::StatusChanged(status)) => println!("status: {status:?}"),
                Ok(PipeEvent::QueuesUpdated(update)) => {
                    println!("queues updated for {}: {}", update.proc_id, update.queues.len());
                },
                Ok(PipeEvent::Raw(message)) => {
                    println!("message: kind={} from={}", message.kind.code(), message.sender);
                },
                Ok(PipeEvent::Closed { reason }) => {
                    println!("connection closed: {reason}");
                    return Ok(());
                },
                Err(_) => break,
            },
        }
    }

    view.disconnect().await;
    Ok(())
}

/// Connect to a node's socket and print usage snapshots until Ctrl-C.
///
/// # Errors
///
/// Returns an error if the fetch or the connect fails.
pub async fn watch_node(node_ident: &str, server: &str) -> Result<(), BoxError> {
    let def = ViewClient::new(server)?.find_node(node_ident).await?;
    let endpoint = ws_endpoint(server, &def.name)?;
    let view = NodeView::new(def);
    let mut events = view.subscribe();
    view.connect(&endpoint).await?;
    info!(node = %view.id(), "watching (Ctrl-C to stop)");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Ok(NodeEvent::Usage(snapshot)) => {
                    println!(
                        "cpu {:>5.1}%  mem {:>5.1}%  queues {}  processors {}",
                        snapshot.cpu_total.value,
                        snapshot.memory.value,
                        snapshot.queues_usage.len(),
                        snapshot.processors_usage.len()
                    );
                },
                Ok(NodeEvent::StatusChanged(status)) => println!("node status: {status:?}"),
                Ok(NodeEvent::Raw(_)) => {},
                Err(_) => break,
            },
        }
    }

    view.disconnect().await;
    Ok(())
}

/// Issue one control action against a pipe and report the next status.
///
/// # Errors
///
/// Returns an error if the fetch, connect, or send fails, or no status
/// report arrives in time.
pub async fn control_pipe(
    pipe_ident: &str,
    action: PipeAction,
    server: &str,
) -> Result<(), BoxError> {
    let def = ViewClient::new(server)?.find_pipe(pipe_ident).await?;
    let endpoint = ws_endpoint(server, &def.name)?;
    let view = PipeView::new(def);
    let mut events = view.subscribe();
    view.connect(&endpoint).await?;

    view.control(action).await?;
    info!(pipe = %view.name(), action = ?action, "control frame sent");

    // The runtime answers with a status report; surface the first one.
    let deadline = Duration::from_secs(10);
    loop {
        match timeout(deadline, events.recv()).await {
            Ok(Ok(PipeEvent::StatusChanged(status))) => {
                println!("pipe {} is now {status:?}", view.name());
                break;
            },
            Ok(Ok(PipeEvent::Closed { reason })) => {
                return Err(format!("connection closed before a status report: {reason}").into());
            },
            Ok(Ok(_)) => {},
            Ok(Err(e)) => return Err(format!("event stream ended: {e}").into()),
            Err(_) => return Err("timed out waiting for a status report".into()),
        }
    }

    view.disconnect().await;
    Ok(())
}
