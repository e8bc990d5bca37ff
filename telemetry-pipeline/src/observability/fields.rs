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

//! Canonical `reason` values and value-format helpers shared by events.

pub const REASON_TOPIC_TOO_SHORT: &str = "topic_too_short";
pub const REASON_RESERVED_MODULE: &str = "reserved_module";
pub const REASON_UNKNOWN_SHAPE: &str = "unknown_shape";
pub const REASON_NO_SUBSCRIBERS: &str = "no_subscribers";
pub const REASON_UNCHANGED_PAYLOAD: &str = "unchanged_payload";
pub const REASON_OUT_OF_RANGE: &str = "out_of_range";

/// Placeholder for an absent optional field value.
pub const NONE: &str = "none";

const PAYLOAD_PREVIEW_MAX_CHARS: usize = 120;

/// Identity of one flush worker, attached to every event it emits.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct WorkerContext {
    pub worker_id: String,
    pub buffer: &'static str,
}

impl WorkerContext {
    pub fn new(worker_id: impl Into<String>, buffer: &'static str) -> Self {
        Self {
            worker_id: worker_id.into(),
            buffer,
        }
    }
}

/// Lossy UTF-8 preview of a payload, truncated on a character boundary.
pub fn format_payload_preview(payload: &[u8]) -> String {
    let text = String::from_utf8_lossy(payload);
    let mut preview: String = text.chars().take(PAYLOAD_PREVIEW_MAX_CHARS).collect();
    if text.chars().count() > PAYLOAD_PREVIEW_MAX_CHARS {
        preview.push_str("...");
    }
    preview
}
