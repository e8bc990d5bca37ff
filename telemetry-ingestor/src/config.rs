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

use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Duration;
use telemetry_pipeline::{PipelineConfig, PipelineConfigError};

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub(crate) pipeline: PipelineConfig,
    pub(crate) mqtt: MqttConfig,
    #[serde(default)]
    pub(crate) database: Option<DatabaseConfig>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct MqttConfig {
    pub(crate) host: String,
    #[serde(default = "default_mqtt_port")]
    pub(crate) port: u16,
    #[serde(default = "default_client_id")]
    pub(crate) client_id: String,
    #[serde(default = "default_keep_alive_secs")]
    pub(crate) keep_alive_secs: u64,
    #[serde(default)]
    pub(crate) username: Option<String>,
    #[serde(default)]
    pub(crate) password: Option<String>,
    #[serde(default = "default_subscription")]
    pub(crate) subscription: String,
    #[serde(default = "default_channel_capacity")]
    pub(crate) channel_capacity: usize,
    #[serde(default = "default_reconnect_delay_ms")]
    pub(crate) reconnect_delay_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub(crate) url: String,
    #[serde(default = "default_max_connections")]
    pub(crate) max_connections: u32,
}

fn default_mqtt_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "telemetry-ingestor".to_string()
}

fn default_keep_alive_secs() -> u64 {
    30
}

fn default_subscription() -> String {
    "#".to_string()
}

fn default_channel_capacity() -> usize {
    64
}

fn default_reconnect_delay_ms() -> u64 {
    2000
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(json5::Error),
    Pipeline(PipelineConfigError),
    MissingDatabase,
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(err) => write!(f, "unable to read config file: {err}"),
            ConfigError::Parse(err) => write!(f, "unable to parse config file: {err}"),
            ConfigError::Pipeline(err) => write!(f, "invalid pipeline settings: {err}"),
            ConfigError::MissingDatabase => {
                write!(f, "a database section is required unless --dry-run is set")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ConfigError::Read(err) => Some(err),
            ConfigError::Parse(err) => Some(err),
            ConfigError::Pipeline(err) => Some(err),
            ConfigError::MissingDatabase => None,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Read)?;
        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = json5::from_str(contents).map_err(ConfigError::Parse)?;
        config.pipeline.validate().map_err(ConfigError::Pipeline)?;
        Ok(config)
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs.max(5))
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms.max(100))
    }
}
