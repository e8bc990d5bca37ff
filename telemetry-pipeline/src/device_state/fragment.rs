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

//! Partial device-state updates, one variant per message class.
//!
//! Every field is optional: `None` means the device did not mention it, and
//! merging never replaces an existing value with `None`.

use crate::device_state::model::{ChipInfo, FlashInfo, PsramInfo};
use crate::ingress::topic_classifier::StateClass;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Malformed fragment payloads.
#[derive(Debug)]
pub enum FragmentError {
    InvalidJson(serde_json::Error),
    NotAnObject(StateClass),
}

impl Display for FragmentError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FragmentError::InvalidJson(err) => write!(f, "fragment is not valid: {err}"),
            FragmentError::NotAnObject(class) => {
                write!(f, "{} fragment must be a JSON object", class.as_str())
            }
        }
    }
}

impl Error for FragmentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            FragmentError::InvalidJson(err) => Some(err),
            FragmentError::NotAnObject(_) => None,
        }
    }
}

impl From<serde_json::Error> for FragmentError {
    fn from(err: serde_json::Error) -> Self {
        FragmentError::InvalidJson(err)
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemoryFragment {
    #[serde(alias = "heap_total_kb")]
    pub heap_total_kb: Option<i64>,
    #[serde(alias = "heap_free_kb")]
    pub heap_free_kb: Option<i64>,
    #[serde(alias = "heap_min_free_kb")]
    pub heap_min_free_kb: Option<i64>,
    pub psram: Option<PsramInfo>,
}

/// Periodic `<module>/system` payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct SystemSnapshotFragment {
    pub rssi: Option<i32>,
    pub memory: Option<MemoryFragment>,
}

/// Once-per-boot `<module>/system/config` payload.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SystemConfigFragment {
    pub ip: Option<String>,
    pub mac: Option<String>,
    #[serde(alias = "module_type")]
    pub module_type: Option<String>,
    #[serde(
        default,
        alias = "uptime_start",
        deserialize_with = "deserialize_number_or_string"
    )]
    pub uptime_start: Option<i64>,
    pub flash: Option<FlashInfo>,
    pub memory: Option<MemoryFragment>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorStatusFragment {
    pub status: Option<String>,
    /// Outer `None`: key absent. `Some(None)`: the device sent `null`.
    #[serde(
        default,
        alias = "lastValue",
        deserialize_with = "deserialize_present"
    )]
    pub value: Option<Option<f64>>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SensorConfigFragment {
    #[serde(alias = "interval")]
    pub interval_seconds: Option<u32>,
    pub model: Option<String>,
    pub enabled: Option<bool>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct HardwareConfigFragment {
    pub chip: Option<ChipInfo>,
}

/// One decoded state message.
#[derive(Clone, Debug, PartialEq)]
pub enum DeviceFragment {
    SystemSnapshot(SystemSnapshotFragment),
    SystemConfig(SystemConfigFragment),
    SensorsStatus(BTreeMap<String, SensorStatusFragment>),
    SensorsConfig(BTreeMap<String, SensorConfigFragment>),
    HardwareConfig(HardwareConfigFragment),
}

impl DeviceFragment {
    pub fn class(&self) -> StateClass {
        match self {
            DeviceFragment::SystemSnapshot(_) => StateClass::SystemSnapshot,
            DeviceFragment::SystemConfig(_) => StateClass::SystemConfig,
            DeviceFragment::SensorsStatus(_) => StateClass::SensorsStatus,
            DeviceFragment::SensorsConfig(_) => StateClass::SensorsConfig,
            DeviceFragment::HardwareConfig(_) => StateClass::HardwareConfig,
        }
    }

    pub fn decode(class: StateClass, payload: &str) -> Result<Self, FragmentError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_value(class, value)
    }

    pub fn from_value(class: StateClass, value: Value) -> Result<Self, FragmentError> {
        if !value.is_object() {
            return Err(FragmentError::NotAnObject(class));
        }

        let fragment = match class {
            StateClass::SystemSnapshot => {
                DeviceFragment::SystemSnapshot(serde_json::from_value(value)?)
            }
            StateClass::SystemConfig => DeviceFragment::SystemConfig(serde_json::from_value(value)?),
            StateClass::SensorsStatus => {
                DeviceFragment::SensorsStatus(serde_json::from_value(value)?)
            }
            StateClass::SensorsConfig => {
                DeviceFragment::SensorsConfig(serde_json::from_value(unwrap_sensors_envelope(
                    value,
                ))?)
            }
            StateClass::HardwareConfig => {
                DeviceFragment::HardwareConfig(serde_json::from_value(value)?)
            }
        };
        Ok(fragment)
    }
}

// Configs published back to devices are wrapped as `{"sensors": {...}}`, and
// the ingestor receives its own retained publish.
fn unwrap_sensors_envelope(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.get("sensors").is_some_and(Value::is_object) => {
            map.remove("sensors").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Option<f64>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<f64>::deserialize(deserializer).map(Some)
}

fn deserialize_number_or_string<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Integer(i64),
        Float(f64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberOrString::Integer(value)) => Ok(Some(value)),
        Some(NumberOrString::Float(value)) if value.is_finite() => Ok(Some(value as i64)),
        Some(NumberOrString::Float(_)) => Ok(None),
        Some(NumberOrString::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::{DeviceFragment, FragmentError};
    use crate::ingress::topic_classifier::StateClass;
    use std::error::Error;

    #[test]
    fn firmware_system_config_decodes() {
        let payload = r#"{"ip":"10.0.0.5","mac":"AA:BB","uptime_start":"42",
            "flash":{"used_kb":1200,"free_kb":800,"system_kb":2096},
            "memory":{"heap_total_kb":320,"psram":{"totalKb":4096,"freeKb":4000,"usedPercent":2.3}}}"#;

        let DeviceFragment::SystemConfig(fragment) =
            DeviceFragment::decode(StateClass::SystemConfig, payload).expect("should decode")
        else {
            panic!("wrong variant");
        };

        assert_eq!(fragment.uptime_start, Some(42));
        assert_eq!(fragment.flash.and_then(|flash| flash.system_kb), Some(2096));
        let memory = fragment.memory.expect("memory present");
        assert_eq!(memory.heap_total_kb, Some(320));
        assert_eq!(memory.psram.and_then(|psram| psram.used_percent), Some(2.3));
    }

    #[test]
    fn sensor_status_distinguishes_null_from_absent() {
        let payload = r#"{"co2":{"status":"ok","value":412},"pm25":{"status":"missing","value":null},"voc":{"status":"ok"}}"#;

        let DeviceFragment::SensorsStatus(sensors) =
            DeviceFragment::decode(StateClass::SensorsStatus, payload).expect("should decode")
        else {
            panic!("wrong variant");
        };

        assert_eq!(sensors["co2"].value, Some(Some(412.0)));
        assert_eq!(sensors["pm25"].value, Some(None));
        assert_eq!(sensors["voc"].value, None);
    }

    #[test]
    fn sensor_config_accepts_interval_and_envelope() {
        let bare = DeviceFragment::decode(
            StateClass::SensorsConfig,
            r#"{"co2":{"model":"MH-Z14A","interval":30}}"#,
        )
        .expect("bare config should decode");
        let wrapped = DeviceFragment::decode(
            StateClass::SensorsConfig,
            r#"{"sensors":{"co2":{"model":"MH-Z14A","intervalSeconds":30}}}"#,
        )
        .expect("wrapped config should decode");

        assert_eq!(bare, wrapped);
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let err = DeviceFragment::decode(StateClass::HardwareConfig, "42").unwrap_err();
        assert!(matches!(err, FragmentError::NotAnObject(StateClass::HardwareConfig)));

        let err = DeviceFragment::decode(StateClass::SystemSnapshot, "{").unwrap_err();
        assert!(err.source().is_some());
    }

    #[test]
    fn wrongly_typed_fields_are_rejected() {
        assert!(DeviceFragment::decode(StateClass::SystemSnapshot, r#"{"rssi":"strong"}"#).is_err());
    }
}
