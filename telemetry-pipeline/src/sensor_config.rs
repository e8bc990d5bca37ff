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

//! Sensor configuration write path.
//!
//! A config change is merged into the module's device state first, then the
//! module's full enabled configuration is published as a retained message on
//! `<module>/sensors/config`, so a device that reboots later still picks it up.

use crate::device_state::fragment::SensorConfigFragment;
use crate::device_state::{DeviceFragment, DeviceState, DeviceStateStore};
use crate::observability::events;
use crate::storage::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use tracing::{error, info, warn};

const COMPONENT: &str = "sensor_config";
const CONFIG_TOPIC_SUFFIX: &str = "sensors/config";

/// Transport failure while publishing a config message.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublishError(pub String);

impl Display for PublishError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "publish failed: {}", self.0)
    }
}

impl Error for PublishError {}

/// Transport side of the config path. Implementations publish with the
/// retain flag and at-least-once delivery.
#[async_trait]
pub trait ConfigPublisher: Send + Sync {
    async fn publish_retained(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}

/// Per-sensor settings as exchanged with devices.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct SensorSettings {
    #[serde(
        default,
        alias = "intervalSeconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Wire shape of `<module>/sensors/config`: `{"sensors": {"co2": {"interval": 30}}}`.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub sensors: BTreeMap<String, SensorSettings>,
}

impl ModuleConfig {
    /// Enabled sensor configs of a merged state.
    pub fn from_state(state: &DeviceState) -> Self {
        let sensors = state
            .enabled_sensor_configs()
            .map(|(sensor_type, config)| {
                (
                    sensor_type.clone(),
                    SensorSettings {
                        interval: config.interval_seconds,
                        model: config.model.clone(),
                    },
                )
            })
            .collect();
        Self { sensors }
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }
}

pub fn config_topic(module_id: &str) -> String {
    format!("{module_id}/{CONFIG_TOPIC_SUFFIX}")
}

#[derive(Debug)]
pub enum ConfigWriteError {
    InvalidModuleId(String),
    InvalidSensorType(String),
    InvalidInterval { sensor_type: String },
    Storage(StorageError),
    Encode(serde_json::Error),
    Publish(PublishError),
}

impl Display for ConfigWriteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWriteError::InvalidModuleId(module_id) => {
                write!(f, "invalid module id: {module_id:?}")
            }
            ConfigWriteError::InvalidSensorType(sensor_type) => {
                write!(f, "invalid sensor type: {sensor_type:?}")
            }
            ConfigWriteError::InvalidInterval { sensor_type } => {
                write!(f, "interval for {sensor_type} must be at least one second")
            }
            ConfigWriteError::Storage(err) => write!(f, "failed to persist config: {err}"),
            ConfigWriteError::Encode(err) => write!(f, "failed to encode config: {err}"),
            ConfigWriteError::Publish(err) => write!(f, "failed to publish config: {err}"),
        }
    }
}

impl Error for ConfigWriteError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigWriteError::Storage(err) => Some(err),
            ConfigWriteError::Encode(err) => Some(err),
            ConfigWriteError::Publish(err) => Some(err),
            _ => None,
        }
    }
}

// Ids end up in topic names, so wildcard and separator characters are refused.
fn is_valid_topic_segment(segment: &str) -> bool {
    !segment.is_empty() && !segment.contains(['/', '+', '#'])
}

pub struct SensorConfigService {
    states: Arc<DeviceStateStore>,
    publisher: Arc<dyn ConfigPublisher>,
}

impl SensorConfigService {
    pub fn new(states: Arc<DeviceStateStore>, publisher: Arc<dyn ConfigPublisher>) -> Self {
        Self { states, publisher }
    }

    /// Persists the change, then publishes the module's resulting enabled
    /// configuration. Nothing is published when persisting fails.
    pub async fn update(
        &self,
        module_id: &str,
        change: &ModuleConfig,
        now: DateTime<Utc>,
    ) -> Result<ModuleConfig, ConfigWriteError> {
        if !is_valid_topic_segment(module_id) {
            return Err(ConfigWriteError::InvalidModuleId(module_id.to_string()));
        }

        let mut fragment = BTreeMap::new();
        for (sensor_type, settings) in &change.sensors {
            if !is_valid_topic_segment(sensor_type) {
                return Err(ConfigWriteError::InvalidSensorType(sensor_type.clone()));
            }
            if settings.interval == Some(0) {
                return Err(ConfigWriteError::InvalidInterval {
                    sensor_type: sensor_type.clone(),
                });
            }
            fragment.insert(
                sensor_type.clone(),
                SensorConfigFragment {
                    interval_seconds: settings.interval,
                    model: settings.model.clone(),
                    enabled: None,
                },
            );
        }

        let state = self
            .states
            .apply_fragment(module_id, &DeviceFragment::SensorsConfig(fragment), now)
            .await
            .map_err(ConfigWriteError::Storage)?;
        info!(
            event = events::CONFIG_PERSISTED,
            component = COMPONENT,
            module_id,
            sensors = change.sensors.len(),
            "persisted sensor config change"
        );

        let config = ModuleConfig::from_state(&state);
        self.publish(module_id, &config).await?;
        Ok(config)
    }

    /// Republishes every module's enabled configuration. Used on each broker
    /// (re)connect. Returns how many modules were published.
    pub async fn republish_all(&self) -> Result<usize, ConfigWriteError> {
        let modules = self
            .states
            .list_modules()
            .await
            .map_err(ConfigWriteError::Storage)?;

        let mut published = 0;
        for module_id in modules {
            let state = match self.states.get(&module_id).await {
                Ok(Some(state)) => state,
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        event = events::CONFIG_PUBLISH_FAILED,
                        component = COMPONENT,
                        module_id = module_id.as_str(),
                        err = %err,
                        "could not load config for republish"
                    );
                    continue;
                }
            };

            let config = ModuleConfig::from_state(&state);
            if config.is_empty() {
                continue;
            }
            if self.publish(&module_id, &config).await.is_ok() {
                published += 1;
            }
        }

        info!(
            event = events::CONFIG_REPUBLISHED,
            component = COMPONENT,
            modules = published,
            "republished sensor configs"
        );
        Ok(published)
    }

    async fn publish(&self, module_id: &str, config: &ModuleConfig) -> Result<(), ConfigWriteError> {
        let topic = config_topic(module_id);
        let payload = serde_json::to_vec(config).map_err(ConfigWriteError::Encode)?;

        match self.publisher.publish_retained(&topic, payload).await {
            Ok(()) => {
                info!(
                    event = events::CONFIG_PUBLISHED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    sensors = config.sensors.len(),
                    "published retained sensor config"
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    event = events::CONFIG_PUBLISH_FAILED,
                    component = COMPONENT,
                    topic = topic.as_str(),
                    err = %err,
                    "failed to publish sensor config"
                );
                Err(ConfigWriteError::Publish(err))
            }
        }
    }
}
