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

//! Broker session: options, the retained config publisher and the event loop
//! that feeds the pipeline.

use crate::config::MqttConfig;
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use telemetry_pipeline::sensor_config::{ConfigPublisher, PublishError};
use telemetry_pipeline::TelemetryPipeline;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "mqtt_session";
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(2);

pub fn connect(config: &MqttConfig) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    AsyncClient::new(options, config.channel_capacity.max(1))
}

/// Publishes sensor configuration as retained QoS 1 messages.
pub struct MqttConfigPublisher {
    client: AsyncClient,
}

impl MqttConfigPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ConfigPublisher for MqttConfigPublisher {
    async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload)
            .await
            .map_err(|err| PublishError(err.to_string()))
    }
}

/// Drives the connection until `shutdown` flips to `true`. rumqttc
/// reconnects on the next poll after an error; each ConnAck resubscribes and
/// republishes retained sensor configs.
pub async fn run_event_loop(
    mut eventloop: EventLoop,
    client: AsyncClient,
    pipeline: Arc<TelemetryPipeline>,
    config: MqttConfig,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            event = eventloop.poll() => event,
            _ = shutdown.changed() => break,
        };

        match event {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                info!(
                    component = COMPONENT,
                    host = config.host.as_str(),
                    port = config.port,
                    code = ?ack.code,
                    "connected to broker"
                );
                // Requests go through the event loop's channel, so they must
                // not be awaited from inside it.
                tokio::spawn(on_connected(
                    client.clone(),
                    pipeline.clone(),
                    config.subscription.clone(),
                ));
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                pipeline.on_message(&publish.topic, &publish.payload).await;
            }
            Ok(other) => {
                debug!(component = COMPONENT, packet = ?other, "mqtt event");
            }
            Err(err) => {
                warn!(
                    component = COMPONENT,
                    err = %err,
                    retry_ms = config.reconnect_delay().as_millis() as u64,
                    "mqtt connection error, retrying"
                );
                tokio::select! {
                    _ = tokio::time::sleep(config.reconnect_delay()) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }

    disconnect(&client, &mut eventloop, DISCONNECT_TIMEOUT).await;
    info!(component = COMPONENT, "mqtt event loop stopped");
}

/// Queues a DISCONNECT and polls the event loop until it has been written.
/// Returns `false` when the connection fails or `timeout` runs out first.
pub(crate) async fn disconnect(
    client: &AsyncClient,
    eventloop: &mut EventLoop,
    timeout: Duration,
) -> bool {
    if let Err(err) = client.try_disconnect() {
        debug!(component = COMPONENT, err = %err, "disconnect request not queued");
        return false;
    }

    let drained = tokio::time::timeout(timeout, async {
        loop {
            match eventloop.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return true,
                Ok(other) => {
                    debug!(
                        component = COMPONENT,
                        packet = ?other,
                        "mqtt event while disconnecting"
                    );
                }
                Err(err) => {
                    debug!(
                        component = COMPONENT,
                        err = %err,
                        "connection ended before disconnect"
                    );
                    return false;
                }
            }
        }
    })
    .await;

    match drained {
        Ok(sent) => sent,
        Err(_) => {
            warn!(
                component = COMPONENT,
                timeout_ms = timeout.as_millis() as u64,
                "disconnect not sent before timeout"
            );
            false
        }
    }
}

async fn on_connected(client: AsyncClient, pipeline: Arc<TelemetryPipeline>, filter: String) {
    if let Err(err) = client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
        error!(
            component = COMPONENT,
            filter = filter.as_str(),
            err = %err,
            "subscribe request failed"
        );
        return;
    }
    info!(component = COMPONENT, filter = filter.as_str(), "subscribed");

    if let Err(err) = pipeline.republish_sensor_configs().await {
        error!(
            component = COMPONENT,
            err = %err,
            "could not republish sensor configs"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{connect, disconnect};
    use crate::config::MqttConfig;
    use rumqttc::{Event, Packet};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const CONNACK_ACCEPTED: [u8; 4] = [0x20, 0x02, 0x00, 0x00];
    const DISCONNECT: [u8; 2] = [0xE0, 0x00];

    fn local_config(port: u16) -> MqttConfig {
        json5::from_str(&format!(r#"{{ host: "127.0.0.1", port: {port} }}"#))
            .expect("mqtt config should parse")
    }

    #[tokio::test]
    async fn disconnect_is_written_before_the_session_ends() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let broker = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut connect_packet = [0u8; 256];
            let read = socket.read(&mut connect_packet).await.unwrap();
            assert_eq!(connect_packet[0], 0x10, "first packet must be CONNECT");
            assert!(read > 2);
            socket.write_all(&CONNACK_ACCEPTED).await.unwrap();

            let mut rest = Vec::new();
            socket.read_to_end(&mut rest).await.unwrap();
            rest
        });

        let (client, mut eventloop) = connect(&local_config(port));
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Event::Incoming(Packet::ConnAck(_)) = eventloop.poll().await.unwrap() {
                    break;
                }
            }
        })
        .await
        .expect("client should connect");

        assert!(disconnect(&client, &mut eventloop, Duration::from_secs(2)).await);
        drop(eventloop);

        let received = tokio::time::timeout(Duration::from_secs(5), broker)
            .await
            .expect("broker should see the socket close")
            .unwrap();
        assert!(received
            .windows(DISCONNECT.len())
            .any(|window| window == DISCONNECT));
    }

    #[tokio::test]
    async fn disconnect_gives_up_when_broker_is_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let (client, mut eventloop) = connect(&local_config(port));

        let started = tokio::time::Instant::now();
        assert!(!disconnect(&client, &mut eventloop, Duration::from_secs(2)).await);
        assert!(started.elapsed() <= Duration::from_secs(3));
    }
}
