// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # In-Process Trigger Bus
//!
//! Topic delivery inside one process: used by tests and by single-binary
//! deployments where syncer, extractors, and scheduler share a runtime.
//! Semantics match the MQTT bus (fire-and-forget, at-least-once within
//! the process, coalesced per listener).

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeSet;

use cortex_domain::SchedulerError;

use super::{TriggerBus, TriggerListener};

struct Subscription {
    topics: BTreeSet<String>,
    listener: TriggerListener,
}

/// Trigger bus backed by process-local subscriptions.
#[derive(Default)]
pub struct MemoryTriggerBus {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl MemoryTriggerBus {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TriggerBus for MemoryTriggerBus {
    async fn publish(&self, topic: &str) -> Result<(), SchedulerError> {
        let subscriptions = self.subscriptions.lock();
        for subscription in subscriptions.iter() {
            if subscription.topics.contains(topic) {
                subscription.listener.signal();
            }
        }
        Ok(())
    }

    async fn subscribe(&self, topics: &[String]) -> Result<TriggerListener, SchedulerError> {
        let listener = TriggerListener::new();
        self.subscriptions.lock().push(Subscription {
            topics: topics.iter().cloned().collect(),
            listener: listener.clone(),
        });
        Ok(listener)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_publish_reaches_matching_subscriber() {
        let bus = MemoryTriggerBus::new();
        let listener = bus.subscribe(&["topic/a".to_string()]).await.unwrap();

        bus.publish("topic/a").await.unwrap();
        tokio::time::timeout(Duration::from_millis(100), listener.wait())
            .await
            .expect("delivered");
    }

    #[tokio::test]
    async fn test_publish_skips_non_matching_subscriber() {
        let bus = MemoryTriggerBus::new();
        let listener = bus.subscribe(&["topic/a".to_string()]).await.unwrap();

        bus.publish("topic/b").await.unwrap();
        assert!(!listener.take_pending());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_all_signalled() {
        let bus = MemoryTriggerBus::new();
        let first = bus.subscribe(&["t".to_string()]).await.unwrap();
        let second = bus.subscribe(&["t".to_string(), "u".to_string()]).await.unwrap();

        bus.publish("t").await.unwrap();
        assert!(first.take_pending());
        assert!(second.take_pending());
    }
}
