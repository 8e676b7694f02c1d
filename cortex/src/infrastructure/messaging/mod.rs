// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Trigger Bus
//!
//! Delivery of trigger topics between the syncer, the extractor pool, and
//! anything else that wants to know a table was refreshed. Publishers
//! fire-and-forget; delivery is at-least-once; subscribers tolerate
//! duplicates because the listener coalesces.
//!
//! ## Coalescing
//!
//! A [`TriggerListener`] is a single pending bit plus a wakeup, not a
//! queue: any number of triggers arriving while a subscriber is busy
//! collapse into exactly one follow-up run. This is the backpressure
//! model of the extractor pool; nothing ever enqueues unbounded work.

pub mod memory;
pub mod mqtt;

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use cortex_domain::SchedulerError;

pub use memory::MemoryTriggerBus;
pub use mqtt::MqttTriggerBus;

/// Coalescing subscription handle: one pending bit, one wakeup.
#[derive(Clone)]
pub struct TriggerListener {
    pending: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl TriggerListener {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Marks a trigger as pending and wakes the subscriber.
    ///
    /// Called by bus implementations on every matching delivery; repeated
    /// calls before the subscriber wakes collapse into one.
    pub fn signal(&self) {
        self.pending.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Waits until at least one trigger is pending, then clears the bit.
    ///
    /// `Notify::notify_one` stores a permit when nobody is waiting, so a
    /// signal arriving between the pending check and the await is never
    /// lost.
    pub async fn wait(&self) {
        loop {
            if self.pending.swap(false, Ordering::SeqCst) {
                return;
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking check-and-clear, used when draining at shutdown.
    pub fn take_pending(&self) -> bool {
        self.pending.swap(false, Ordering::SeqCst)
    }
}

impl Default for TriggerListener {
    fn default() -> Self {
        Self::new()
    }
}

/// Publish/subscribe port onto the trigger bus.
#[async_trait]
pub trait TriggerBus: Send + Sync {
    /// Publishes one topic occurrence, fire-and-forget.
    async fn publish(&self, topic: &str) -> Result<(), SchedulerError>;

    /// Subscribes to a set of topics; any matching delivery signals the
    /// returned listener.
    async fn subscribe(&self, topics: &[String]) -> Result<TriggerListener, SchedulerError>;
}
