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

//! Routing-key classification for inbound device messages.
//!
//! Classification is pure and total: every input, however malformed, maps to a
//! [`TopicClass`], with [`TopicClass::Unrecognized`] carrying the reason.

const SENSOR_NAMESPACE: &str = "sensors";

/// Sensor types accepted on the two-segment `module/<type>` shape used by
/// older firmware.
pub const LEGACY_SENSOR_TYPES: [&str; 6] = [
    "co2",
    "temperature",
    "humidity",
    "voc",
    "pressure",
    "temperature_bmp",
];

/// Device-state sub-document a message updates.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum StateClass {
    SystemSnapshot,
    SystemConfig,
    SensorsStatus,
    SensorsConfig,
    HardwareConfig,
}

impl StateClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StateClass::SystemSnapshot => "system",
            StateClass::SystemConfig => "system_config",
            StateClass::SensorsStatus => "sensors_status",
            StateClass::SensorsConfig => "sensors_config",
            StateClass::HardwareConfig => "hardware_config",
        }
    }
}

// Ordered so the longer suffix wins over `/system`.
const STATE_SUFFIXES: [(&str, StateClass); 5] = [
    ("/system/config", StateClass::SystemConfig),
    ("/sensors/status", StateClass::SensorsStatus),
    ("/sensors/config", StateClass::SensorsConfig),
    ("/hardware/config", StateClass::HardwareConfig),
    ("/system", StateClass::SystemSnapshot),
];

const LOG_SUFFIX: &str = "/logs";

/// Why a routing key was not classified.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnrecognizedReason {
    TooShort,
    ReservedModule,
    UnknownShape,
}

impl UnrecognizedReason {
    pub fn as_str(self) -> &'static str {
        match self {
            UnrecognizedReason::TooShort => crate::observability::fields::REASON_TOPIC_TOO_SHORT,
            UnrecognizedReason::ReservedModule => {
                crate::observability::fields::REASON_RESERVED_MODULE
            }
            UnrecognizedReason::UnknownShape => crate::observability::fields::REASON_UNKNOWN_SHAPE,
        }
    }
}

/// Classification result, borrowing its identifiers from the routing key.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TopicClass<'a> {
    State {
        module_id: &'a str,
        class: StateClass,
    },
    Measurement {
        module_id: &'a str,
        sensor_type: &'a str,
    },
    DeviceLog {
        module_id: &'a str,
    },
    Unrecognized(UnrecognizedReason),
}

impl<'a> TopicClass<'a> {
    pub fn module_id(&self) -> Option<&'a str> {
        match *self {
            TopicClass::State { module_id, .. }
            | TopicClass::Measurement { module_id, .. }
            | TopicClass::DeviceLog { module_id } => Some(module_id),
            TopicClass::Unrecognized(_) => None,
        }
    }
}

/// Classifies routing keys against a fixed set of reserved module ids.
#[derive(Clone, Debug, Default)]
pub struct TopicClassifier {
    reserved_modules: Vec<String>,
}

impl TopicClassifier {
    pub fn new<I, S>(reserved_modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            reserved_modules: reserved_modules.into_iter().map(Into::into).collect(),
        }
    }

    pub fn classify<'a>(&self, topic: &'a str) -> TopicClass<'a> {
        let segments: Vec<&'a str> = topic.split('/').collect();
        if segments.len() < 2 || segments[0].is_empty() {
            return TopicClass::Unrecognized(UnrecognizedReason::TooShort);
        }

        let module_id = segments[0];
        if self.is_reserved(module_id) {
            return TopicClass::Unrecognized(UnrecognizedReason::ReservedModule);
        }

        for (suffix, class) in STATE_SUFFIXES {
            // The suffix must follow the module id, not replace it.
            if topic.ends_with(suffix) && topic.len() > suffix.len() {
                return TopicClass::State { module_id, class };
            }
        }

        if topic.ends_with(LOG_SUFFIX) {
            return TopicClass::DeviceLog { module_id };
        }

        match segments[..] {
            [_, namespace, sensor_type]
                if namespace == SENSOR_NAMESPACE && !sensor_type.is_empty() =>
            {
                TopicClass::Measurement {
                    module_id,
                    sensor_type,
                }
            }
            [_, sensor_type] if LEGACY_SENSOR_TYPES.contains(&sensor_type) => {
                TopicClass::Measurement {
                    module_id,
                    sensor_type,
                }
            }
            _ => TopicClass::Unrecognized(UnrecognizedReason::UnknownShape),
        }
    }

    fn is_reserved(&self, module_id: &str) -> bool {
        self.reserved_modules
            .iter()
            .any(|reserved| reserved == module_id)
    }
}
