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

//! [`RealtimeHub`] backed by a tokio broadcast channel.

use crate::realtime::fan_out::{RealtimeEvent, RealtimeHub};
use tokio::sync::broadcast::{self, Receiver, Sender};

/// One realtime delivery: event name plus payload.
#[derive(Clone, Debug, PartialEq)]
pub struct RealtimeMessage {
    pub event_name: String,
    pub event: RealtimeEvent,
}

/// Each live subscriber holds a [`Receiver`]; the subscriber count is the
/// number of receivers alive. Slow receivers lag and lose the oldest events.
pub struct ChannelHub {
    sender: Sender<RealtimeMessage>,
}

impl ChannelHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> Receiver<RealtimeMessage> {
        self.sender.subscribe()
    }
}

impl RealtimeHub for ChannelHub {
    fn broadcast(&self, event_name: &str, event: &RealtimeEvent) {
        // Errors only when every receiver is gone.
        let _ = self.sender.send(RealtimeMessage {
            event_name: event_name.to_string(),
            event: event.clone(),
        });
    }

    fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelHub;
    use crate::realtime::fan_out::{RealtimeEvent, RealtimeHub, MQTT_DATA_EVENT};
    use chrono::Utc;

    #[tokio::test]
    async fn subscribers_receive_broadcasts() {
        let hub = ChannelHub::new(8);
        assert_eq!(hub.subscriber_count(), 0);

        let mut receiver = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 1);

        let event = RealtimeEvent {
            topic: "m1/co2".to_string(),
            value: Some(412.0),
            metadata: None,
            time: Utc::now(),
        };
        hub.broadcast(MQTT_DATA_EVENT, &event);

        let message = receiver.recv().await.expect("event should arrive");
        assert_eq!(message.event_name, MQTT_DATA_EVENT);
        assert_eq!(message.event, event);

        drop(receiver);
        assert_eq!(hub.subscriber_count(), 0);
    }
}
