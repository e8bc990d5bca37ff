/********************************************************************************
 * Copyright (c) 2026 Contributors to the Eclipse Foundation
 *
 * See the NOTICE file(s) distributed with this work for additional
 * information regarding copyright ownership.
 *
 * This program and the accompanying materials are made available under the
 * terms of the Apache License Version 2.0 which is available at
 * https://www.apache.org/licenses/LICENSE-2.0
 *
 * SPDX-License-Identifier: Apache-2.0
 ********************************************************************************/

//! Delta-only realtime fan-out to live subscribers.

use crate::observability::{events, fields};
use crate::realtime::broadcast_cache::BroadcastCache;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

const COMPONENT: &str = "realtime_fan_out";

/// Event name carried by every realtime broadcast.
pub const MQTT_DATA_EVENT: &str = "mqtt:data";

/// Payload delivered to live subscribers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RealtimeEvent {
    pub topic: String,
    pub value: Option<f64>,
    pub metadata: Option<Value>,
    pub time: DateTime<Utc>,
}

/// Live-subscriber collaborator, e.g. a websocket server.
pub trait RealtimeHub: Send + Sync {
    fn broadcast(&self, event_name: &str, event: &RealtimeEvent);

    fn subscriber_count(&self) -> usize;
}

/// Broadcasts an accepted message only when someone listens and the raw
/// payload changed since the last broadcast on the same topic.
pub struct RealtimeFanOut {
    hub: Arc<dyn RealtimeHub>,
    cache: BroadcastCache,
}

impl RealtimeFanOut {
    pub fn new(hub: Arc<dyn RealtimeHub>) -> Self {
        Self {
            hub,
            cache: BroadcastCache::new(),
        }
    }

    /// Returns `true` when the event was broadcast.
    pub async fn publish(
        &self,
        topic: &str,
        raw_payload: &[u8],
        value: Option<f64>,
        metadata: Option<Value>,
        time: DateTime<Utc>,
    ) -> bool {
        let subscribers = self.hub.subscriber_count();
        if subscribers == 0 {
            debug!(
                event = events::REALTIME_BROADCAST_SUPPRESSED,
                component = COMPONENT,
                topic,
                reason = fields::REASON_NO_SUBSCRIBERS,
                "no live subscribers"
            );
            return false;
        }

        if !self.cache.replace_if_changed(topic, raw_payload).await {
            debug!(
                event = events::REALTIME_BROADCAST_SUPPRESSED,
                component = COMPONENT,
                topic,
                reason = fields::REASON_UNCHANGED_PAYLOAD,
                "payload unchanged since last broadcast"
            );
            return false;
        }

        let event = RealtimeEvent {
            topic: topic.to_string(),
            value,
            metadata,
            time,
        };
        self.hub.broadcast(MQTT_DATA_EVENT, &event);
        debug!(
            event = events::REALTIME_BROADCAST_SENT,
            component = COMPONENT,
            topic,
            subscribers,
            "broadcast realtime event"
        );
        true
    }

    pub fn cache(&self) -> &BroadcastCache {
        &self.cache
    }
}
