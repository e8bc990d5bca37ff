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

//! Re-emits firmware log lines published on `<module>/logs`.

use crate::observability::{events, fields};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error, info, trace, warn, Level};

const COMPONENT: &str = "device_log";
const SOURCE: &str = "esp32";

#[derive(Debug, Deserialize)]
struct DeviceLogLine {
    #[serde(default)]
    level: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    time: Option<Value>,
}

/// Maps a firmware level name onto a tracing level. Unknown names log as info.
pub fn map_level(level: &str) -> Level {
    match level.to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" | "fatal" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Forwards one device log line. Returns the level used, or `None` when the
/// payload is not a log object.
pub fn forward_device_log(module_id: &str, payload: &[u8]) -> Option<Level> {
    let line: DeviceLogLine = match serde_json::from_slice(payload) {
        Ok(line) => line,
        Err(err) => {
            debug!(
                event = events::DEVICE_LOG_MALFORMED,
                component = COMPONENT,
                module_id,
                payload = fields::format_payload_preview(payload),
                err = %err,
                "dropping malformed device log"
            );
            return None;
        }
    };

    let level = map_level(line.level.as_deref().unwrap_or("info"));
    let msg = line.msg.unwrap_or_default();
    let device_time = match line.time {
        Some(Value::String(time)) => time,
        Some(other) => other.to_string(),
        None => fields::NONE.to_string(),
    };

    macro_rules! emit {
        ($macro:ident) => {
            $macro!(
                event = events::DEVICE_LOG_FORWARDED,
                component = COMPONENT,
                source = SOURCE,
                module_id,
                device_time = device_time.as_str(),
                "{msg}"
            )
        };
    }

    match level {
        Level::TRACE => emit!(trace),
        Level::DEBUG => emit!(debug),
        Level::WARN => emit!(warn),
        Level::ERROR => emit!(error),
        _ => emit!(info),
    }

    Some(level)
}
