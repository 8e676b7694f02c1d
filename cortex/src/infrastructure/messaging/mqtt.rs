// /////////////////////////////////////////////////////////////////////////////
// Cortex Scheduling Engine
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # MQTT Trigger Bus
//!
//! Trigger delivery across daemon boundaries through an MQTT broker.
//! Topics are published fire-and-forget at QoS 1 (at-least-once); the
//! payload is empty because the topic itself is the message. Duplicate
//! deliveries are harmless: every subscriber coalesces through its
//! [`TriggerListener`].
//!
//! The event loop runs in a background task and reconnects with a fixed
//! backoff on broker loss; subscriptions are replayed by rumqttc on
//! reconnect.

use async_trait::async_trait;
use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use cortex_bootstrap::CancellationToken;
use cortex_domain::SchedulerError;

use super::{TriggerBus, TriggerListener};

struct Subscription {
    topics: BTreeSet<String>,
    listener: TriggerListener,
}

/// Trigger bus backed by an MQTT broker.
pub struct MqttTriggerBus {
    client: AsyncClient,
    subscriptions: Arc<Mutex<Vec<Subscription>>>,
}

impl MqttTriggerBus {
    /// Connects to the broker and spawns the event loop task.
    ///
    /// The loop dispatches incoming publishes to matching listeners and
    /// exits when the cancellation token fires.
    pub fn connect(host: &str, port: u16, client_id: &str, token: CancellationToken) -> Self {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_clean_session(false);

        let (client, mut event_loop) = AsyncClient::new(options, 64);
        let subscriptions: Arc<Mutex<Vec<Subscription>>> = Arc::new(Mutex::new(Vec::new()));

        let dispatch = subscriptions.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        debug!("MQTT event loop shutting down");
                        break;
                    }
                    event = event_loop.poll() => match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            let subscriptions = dispatch.lock();
                            for subscription in subscriptions.iter() {
                                if subscription.topics.contains(&publish.topic) {
                                    subscription.listener.signal();
                                }
                            }
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("MQTT connection error, retrying: {}", e);
                            tokio::time::sleep(Duration::from_secs(1)).await;
                        }
                    }
                }
            }
        });

        Self { client, subscriptions }
    }
}

#[async_trait]
impl TriggerBus for MqttTriggerBus {
    async fn publish(&self, topic: &str) -> Result<(), SchedulerError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, [])
            .await
            .map_err(|e| SchedulerError::BusError(format!("failed to publish {}: {}", topic, e)))
    }

    async fn subscribe(&self, topics: &[String]) -> Result<TriggerListener, SchedulerError> {
        let listener = TriggerListener::new();
        self.subscriptions.lock().push(Subscription {
            topics: topics.iter().cloned().collect(),
            listener: listener.clone(),
        });
        for topic in topics {
            self.client
                .subscribe(topic.clone(), QoS::AtLeastOnce)
                .await
                .map_err(|e| SchedulerError::BusError(format!("failed to subscribe to {}: {}", topic, e)))?;
        }
        Ok(listener)
    }
}
