// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Logical time source.
//!
//! A monotonic tick counter driven one of two ways, fixed at construction:
//! wall-clock (an interval timer increments by 1 per fire) or manual
//! (`advance` increments explicitly, notifying once per unit increment).
//! Stopping a wall-clock service pauses counting without reset; restarting
//! resumes from the last value with no catch-up for missed time.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::domain::error::SupervisorError;

type TickCallback = Box<dyn Fn(u64) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickMode {
    WallClock { interval: Duration },
    Manual,
}

pub struct TickService {
    mode: TickMode,
    counter: Arc<AtomicU64>,
    subscribers: Arc<Mutex<Vec<TickCallback>>>,
    timer: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
}

impl TickService {
    pub fn new(mode: TickMode) -> Self {
        Self {
            mode,
            counter: Arc::new(AtomicU64::new(0)),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            timer: Mutex::new(None),
            running: AtomicBool::new(false),
        }
    }

    pub fn wall_clock(interval: Duration) -> Self {
        Self::new(TickMode::WallClock { interval })
    }

    pub fn manual() -> Self {
        Self::new(TickMode::Manual)
    }

    pub fn mode(&self) -> TickMode {
        self.mode
    }

    pub fn current_tick(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }

    /// Subscribers see every tick value exactly once, in strictly increasing
    /// order. Callbacks run on the advancing thread/task and must not call
    /// back into the service.
    pub fn on_tick(&self, callback: impl Fn(u64) + Send + Sync + 'static) {
        self.subscribers.lock().push(Box::new(callback));
    }

    /// Idempotent. In wall-clock mode the first tick fires one full interval
    /// after start.
    pub fn start(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        if let TickMode::WallClock { interval } = self.mode {
            let counter = self.counter.clone();
            let subscribers = self.subscribers.clone();
            let task = tokio::spawn(async move {
                let start = tokio::time::Instant::now() + interval;
                let mut timer = tokio::time::interval_at(start, interval);
                loop {
                    timer.tick().await;
                    advance_once(&counter, &subscribers);
                }
            });
            *self.timer.lock() = Some(task);
        }
    }

    /// Idempotent. The counter keeps its value while stopped.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.timer.lock().take() {
            task.abort();
        }
    }

    /// Manual mode only: advance by `n`, notifying subscribers synchronously
    /// at each intermediate value before returning. Returns the new tick.
    pub fn advance(&self, n: u64) -> Result<u64, SupervisorError> {
        if matches!(self.mode, TickMode::WallClock { .. }) {
            return Err(SupervisorError::unsupported(
                "advance() is invalid on a wall-clock tick service",
            ));
        }
        for _ in 0..n {
            advance_once(&self.counter, &self.subscribers);
        }
        Ok(self.current_tick())
    }
}

impl Drop for TickService {
    fn drop(&mut self) {
        if let Some(task) = self.timer.lock().take() {
            task.abort();
        }
    }
}

fn advance_once(counter: &AtomicU64, subscribers: &Mutex<Vec<TickCallback>>) {
    // Increment and notify under the subscriber lock so observers see ticks
    // in order, once each, even with concurrent readers of current_tick().
    let subscribers = subscribers.lock();
    let value = counter.fetch_add(1, Ordering::SeqCst) + 1;
    for callback in subscribers.iter() {
        callback(value);
    }
}
