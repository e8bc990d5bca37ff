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

//! Bounded in-memory batch buffer shared by the ingress path and a flush worker.

use crate::observability::events;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;
use tracing::{debug, warn};

const COMPONENT: &str = "batch_buffer";

/// Ordered pending entries plus the capacity trigger and hard ceiling.
///
/// Every mutation happens under one lock, so snapshot-and-clear never observes
/// a partial append and an append racing a flush is never lost.
pub struct BatchBuffer<T> {
    label: &'static str,
    flush_capacity: usize,
    max_buffered: usize,
    entries: Mutex<VecDeque<T>>,
    dropped: AtomicU64,
}

impl<T> BatchBuffer<T> {
    pub fn new(label: &'static str, flush_capacity: usize, max_buffered: usize) -> Self {
        let flush_capacity = flush_capacity.max(1);
        Self {
            label,
            flush_capacity,
            max_buffered: max_buffered.max(flush_capacity),
            entries: Mutex::new(VecDeque::new()),
            dropped: AtomicU64::new(0),
        }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Appends one entry. When the buffer reaches its flush capacity the whole
    /// content is taken in the same critical section and returned as a batch.
    pub async fn append(&self, entry: T) -> Option<Vec<T>> {
        let mut entries = self.entries.lock().await;
        entries.push_back(entry);
        self.enforce_ceiling(&mut entries);

        if entries.len() >= self.flush_capacity {
            let batch: Vec<T> = entries.drain(..).collect();
            debug!(
                event = events::FLUSH_START,
                component = COMPONENT,
                buffer = self.label,
                batch_size = batch.len(),
                trigger = "capacity",
                "capacity reached, handing batch to flush worker"
            );
            return Some(batch);
        }
        None
    }

    /// Takes every pending entry, oldest first.
    pub async fn drain(&self) -> Vec<T> {
        self.entries.lock().await.drain(..).collect()
    }

    /// Puts a failed batch back in front of newer entries, keeping its order.
    pub async fn requeue_front(&self, batch: Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let mut entries = self.entries.lock().await;
        for entry in batch.into_iter().rev() {
            entries.push_front(entry);
        }
        self.enforce_ceiling(&mut entries);
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// Entries discarded because the ceiling was exceeded.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn enforce_ceiling(&self, entries: &mut VecDeque<T>) {
        let overflow = entries.len().saturating_sub(self.max_buffered);
        if overflow == 0 {
            return;
        }

        entries.drain(..overflow);
        let total = self.dropped.fetch_add(overflow as u64, Ordering::Relaxed) + overflow as u64;
        warn!(
            event = events::BUFFER_OVERFLOW_DROPPED,
            component = COMPONENT,
            buffer = self.label,
            dropped = overflow,
            dropped_total = total,
            max_buffered = self.max_buffered,
            "buffer ceiling exceeded, dropped oldest entries"
        );
    }
}
