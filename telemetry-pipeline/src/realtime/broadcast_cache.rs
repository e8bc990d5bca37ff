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

//! Last-broadcast payload per routing key.

use std::collections::HashMap;
use tokio::sync::Mutex;

/// One entry per distinct topic ever broadcast, kept for the process lifetime.
#[derive(Debug, Default)]
pub struct BroadcastCache {
    last_sent: Mutex<HashMap<String, Vec<u8>>>,
}

impl BroadcastCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `payload` for `topic` and returns `true` when it differs from
    /// the last recorded payload. Identical payloads leave the cache as is.
    pub async fn replace_if_changed(&self, topic: &str, payload: &[u8]) -> bool {
        let mut last_sent = self.last_sent.lock().await;
        match last_sent.get_mut(topic) {
            Some(previous) if previous.as_slice() == payload => false,
            Some(previous) => {
                previous.clear();
                previous.extend_from_slice(payload);
                true
            }
            None => {
                last_sent.insert(topic.to_string(), payload.to_vec());
                true
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.last_sent.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.last_sent.lock().await.is_empty()
    }
}
