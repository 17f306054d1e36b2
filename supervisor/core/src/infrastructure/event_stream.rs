// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Ordered, capped event transport between the runner and live clients.
//!
//! A single pump task drains the active runner into a bounded backlog on a
//! fixed cadence and fans events out to one bounded queue per connected
//! client; each connection has exactly one delivery task consuming its queue
//! FIFO, so an in-flight flush can never be preempted or duplicated. All
//! buffers drop their oldest entries on overflow — this is a live monitoring
//! feed with bounded staleness, not a durable log.
//!
//! When the runner reaches a terminal state and the queues are empty, one
//! final delayed drain catches events emitted in the terminal transition.
//! Clients stay connected afterwards: a subsequent resume installs a new
//! runner on the same feed.

use axum::extract::ws::{Message, WebSocket};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::application::runner::AgentRunner;
use crate::domain::events::AdapterEvent;
use crate::infrastructure::artifact_upload::ArtifactUploader;

pub const EVENT_BUFFER_CAPACITY: usize = 1000;
const PUMP_INTERVAL: Duration = Duration::from_millis(50);
const FINAL_DRAIN_DELAY: Duration = Duration::from_millis(100);

/// The slot holding the currently active runner, shared with the HTTP layer.
pub type SharedRunner = Arc<RwLock<Option<Arc<dyn AgentRunner>>>>;

/// Mutex-guarded ring buffer with drop-oldest-on-overflow semantics.
pub struct EventBuffer {
    queue: Mutex<VecDeque<AdapterEvent>>,
    capacity: usize,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    /// Append events, dropping the oldest entries beyond capacity. Returns
    /// how many were dropped.
    pub fn push_many(&self, events: Vec<AdapterEvent>) -> usize {
        let mut queue = self.queue.lock();
        queue.extend(events);
        let mut dropped = 0;
        while queue.len() > self.capacity {
            queue.pop_front();
            dropped += 1;
        }
        dropped
    }

    pub fn drain(&self) -> Vec<AdapterEvent> {
        self.queue.lock().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}

struct ClientHandle {
    id: u64,
    queue: Arc<EventBuffer>,
}

pub struct ClientSubscription {
    pub id: u64,
    pub queue: Arc<EventBuffer>,
}

pub struct EventStreamer {
    runner: SharedRunner,
    backlog: EventBuffer,
    clients: Mutex<Vec<ClientHandle>>,
    uploader: Option<ArtifactUploader>,
    next_client_id: AtomicU64,
    finalized: AtomicBool,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl EventStreamer {
    pub fn new(runner: SharedRunner, uploader: Option<ArtifactUploader>) -> Self {
        Self {
            runner,
            backlog: EventBuffer::new(EVENT_BUFFER_CAPACITY),
            clients: Mutex::new(Vec::new()),
            uploader,
            next_client_id: AtomicU64::new(1),
            finalized: AtomicBool::new(false),
            pump: Mutex::new(None),
        }
    }

    /// Backlog depth, reported by the health endpoint.
    pub fn pending_buffer_size(&self) -> usize {
        self.backlog.len()
    }

    /// Move the runner's queued events into the backlog. Also called by the
    /// kill/pause handlers so terminal events are captured immediately.
    pub async fn drain_runner(&self) {
        let runner = self.runner.read().await.clone();
        let Some(runner) = runner else { return };
        let events = runner.drain_events();
        if events.is_empty() {
            return;
        }
        let dropped = self.backlog.push_many(events);
        if dropped > 0 {
            warn!(dropped, "event backlog overflow; oldest entries dropped");
        }
    }

    fn fan_out(&self) {
        let clients = self.clients.lock();
        if clients.is_empty() {
            return;
        }
        let events = self.backlog.drain();
        if events.is_empty() {
            return;
        }
        for client in clients.iter() {
            let dropped = client.queue.push_many(events.clone());
            if dropped > 0 {
                warn!(client = client.id, dropped, "slow client; oldest entries dropped");
            }
        }
    }

    async fn terminal_and_idle(&self) -> bool {
        let runner = self.runner.read().await.clone();
        match runner {
            Some(runner) => !runner.is_running() && self.backlog.is_empty(),
            None => false,
        }
    }

    /// Start the periodic pump. Idempotent per streamer instance.
    pub fn start_pump(self: &Arc<Self>) {
        let mut pump = self.pump.lock();
        if pump.is_some() {
            return;
        }
        let streamer = self.clone();
        *pump = Some(tokio::spawn(async move {
            loop {
                streamer.drain_runner().await;
                streamer.fan_out();

                if streamer.runner.read().await.as_ref().is_some_and(|r| r.is_running()) {
                    streamer.finalized.store(false, Ordering::SeqCst);
                } else if streamer.terminal_and_idle().await
                    && !streamer.finalized.swap(true, Ordering::SeqCst)
                {
                    // One delayed drain to catch terminal-transition events.
                    tokio::time::sleep(FINAL_DRAIN_DELAY).await;
                    streamer.drain_runner().await;
                    streamer.fan_out();
                }

                tokio::time::sleep(PUMP_INTERVAL).await;
            }
        }));
    }

    pub fn subscribe(&self) -> ClientSubscription {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let queue = Arc::new(EventBuffer::new(EVENT_BUFFER_CAPACITY));
        self.clients.lock().push(ClientHandle {
            id,
            queue: queue.clone(),
        });
        debug!(client = id, "event stream client connected");
        ClientSubscription { id, queue }
    }

    pub fn unsubscribe(&self, id: u64) {
        self.clients.lock().retain(|c| c.id != id);
        debug!(client = id, "event stream client disconnected");
    }

    /// Deliver events to one WebSocket until it disconnects. Disconnects
    /// release only this client; the runner is never affected.
    pub async fn serve(self: Arc<Self>, mut socket: WebSocket) {
        let subscription = self.subscribe();
        'connection: loop {
            for envelope in subscription.queue.drain() {
                let envelope = match &self.uploader {
                    Some(uploader) => uploader.rewrite(envelope).await,
                    None => envelope,
                };
                let frame = match serde_json::to_string(&envelope) {
                    Ok(json) => json,
                    Err(error) => {
                        warn!(%error, "failed to serialize event frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break 'connection;
                }
            }
            // The protocol defines no client-to-server frames; recv is only
            // watched so a silent disconnect releases this client promptly.
            tokio::select! {
                _ = tokio::time::sleep(PUMP_INTERVAL) => {}
                message = socket.recv() => {
                    match message {
                        Some(Ok(_)) => {}
                        Some(Err(_)) | None => break 'connection,
                    }
                }
            }
        }
        self.unsubscribe(subscription.id);
    }
}
