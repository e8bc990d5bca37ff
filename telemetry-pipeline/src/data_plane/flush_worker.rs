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

//! Background flush worker owning the write path of one [`BatchBuffer`].
//!
//! The ingress path never awaits storage: capacity-triggered batches are handed
//! over a channel, and the worker also drains the buffer on a fixed interval.
//! One worker per buffer serializes writes, so batches are persisted in the
//! order they were taken.

use crate::data_plane::batch_buffer::BatchBuffer;
use crate::observability::{events, fields::WorkerContext};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

const COMPONENT: &str = "flush_worker";

/// Result of writing one batch: how many entries landed, how many were
/// discarded as unusable, and which ones must be retried.
#[derive(Debug)]
pub struct BatchOutcome<T> {
    pub written: usize,
    pub skipped: usize,
    pub retry: Vec<T>,
    pub error: Option<String>,
}

impl<T> BatchOutcome<T> {
    pub fn written(written: usize) -> Self {
        Self {
            written,
            skipped: 0,
            retry: Vec::new(),
            error: None,
        }
    }

    pub fn failed(retry: Vec<T>, error: impl Into<String>) -> Self {
        Self {
            written: 0,
            skipped: 0,
            retry,
            error: Some(error.into()),
        }
    }

    /// The store refused the batch for good; nothing is retried.
    pub fn discarded(skipped: usize, error: impl Into<String>) -> Self {
        Self {
            written: 0,
            skipped,
            retry: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Destination of flushed batches.
#[async_trait]
pub trait BatchSink<T>: Send + Sync {
    async fn write_batch(&self, batch: Vec<T>) -> BatchOutcome<T>;
}

/// Totals of one or more flush attempts.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FlushReport {
    pub written: usize,
    pub skipped: usize,
    pub requeued: usize,
}

impl FlushReport {
    fn absorb(&mut self, other: FlushReport) {
        self.written += other.written;
        self.skipped += other.skipped;
        self.requeued += other.requeued;
    }
}

pub(crate) enum FlushCommand<T> {
    Batch(Vec<T>),
    FlushNow(oneshot::Sender<FlushReport>),
    Shutdown(oneshot::Sender<FlushReport>),
}

/// Cloneable handle the ingress path uses to reach a running worker.
pub(crate) struct FlushHandle<T> {
    sender: mpsc::UnboundedSender<FlushCommand<T>>,
}

impl<T> Clone for FlushHandle<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl<T> FlushHandle<T> {
    /// Hands a batch to the worker, giving it back if the worker is gone.
    pub(crate) fn hand_off(&self, batch: Vec<T>) -> Result<(), Vec<T>> {
        self.sender
            .send(FlushCommand::Batch(batch))
            .map_err(|mpsc::error::SendError(command)| match command {
                FlushCommand::Batch(batch) => batch,
                _ => Vec::new(),
            })
    }

    /// Waits for queued batches, then drains the buffer once.
    pub(crate) async fn flush_now(&self) -> Option<FlushReport> {
        let (reply, response) = oneshot::channel();
        self.sender.send(FlushCommand::FlushNow(reply)).ok()?;
        response.await.ok()
    }

    /// Runs a final flush and stops the worker.
    pub(crate) async fn shutdown(&self) -> Option<FlushReport> {
        let (reply, response) = oneshot::channel();
        self.sender.send(FlushCommand::Shutdown(reply)).ok()?;
        response.await.ok()
    }
}

/// Worker timing knobs.
#[derive(Clone, Copy, Debug)]
pub(crate) struct FlushSchedule {
    pub(crate) flush_interval: Duration,
    pub(crate) report_interval: Option<Duration>,
}

pub(crate) struct FlushWorker<T> {
    context: WorkerContext,
    buffer: Arc<BatchBuffer<T>>,
    sink: Arc<dyn BatchSink<T>>,
}

impl<T: Send + 'static> FlushWorker<T> {
    /// Spawns the worker loop on the current tokio runtime.
    pub(crate) fn spawn(
        buffer: Arc<BatchBuffer<T>>,
        sink: Arc<dyn BatchSink<T>>,
        schedule: FlushSchedule,
    ) -> (FlushHandle<T>, JoinHandle<()>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let worker = FlushWorker {
            context: WorkerContext::new(uuid::Uuid::new_v4().to_string(), buffer.label()),
            buffer,
            sink,
        };
        let join = tokio::spawn(worker.run(receiver, schedule));
        (FlushHandle { sender }, join)
    }

    async fn run(
        self,
        mut receiver: mpsc::UnboundedReceiver<FlushCommand<T>>,
        schedule: FlushSchedule,
    ) {
        let mut flush_ticks = delayed_interval(schedule.flush_interval);
        let mut report_ticks = schedule.report_interval.map(delayed_interval);

        info!(
            event = events::FLUSH_WORKER_START,
            component = COMPONENT,
            worker_id = self.context.worker_id.as_str(),
            buffer = self.context.buffer,
            flush_interval_ms = schedule.flush_interval.as_millis() as u64,
            "flush worker started"
        );

        loop {
            tokio::select! {
                command = receiver.recv() => match command {
                    Some(FlushCommand::Batch(batch)) => {
                        self.write(batch, "capacity").await;
                    }
                    Some(FlushCommand::FlushNow(reply)) => {
                        let report = self.flush_buffer("manual").await;
                        let _ = reply.send(report);
                    }
                    Some(FlushCommand::Shutdown(reply)) => {
                        let report = self.drain_pending(&mut receiver).await;
                        let _ = reply.send(report);
                        break;
                    }
                    None => {
                        self.drain_pending(&mut receiver).await;
                        break;
                    }
                },
                _ = flush_ticks.tick() => {
                    self.flush_buffer("interval").await;
                }
                _ = next_report(&mut report_ticks) => {
                    self.report_status().await;
                }
            }
        }

        let pending = self.buffer.len().await;
        info!(
            event = events::FLUSH_WORKER_STOP,
            component = COMPONENT,
            worker_id = self.context.worker_id.as_str(),
            buffer = self.context.buffer,
            pending = pending,
            "flush worker stopped"
        );
    }

    async fn drain_pending(
        &self,
        receiver: &mut mpsc::UnboundedReceiver<FlushCommand<T>>,
    ) -> FlushReport {
        let mut report = FlushReport::default();
        receiver.close();
        while let Ok(command) = receiver.try_recv() {
            match command {
                FlushCommand::Batch(batch) => report.absorb(self.write(batch, "shutdown").await),
                FlushCommand::FlushNow(reply) | FlushCommand::Shutdown(reply) => {
                    let _ = reply.send(FlushReport::default());
                }
            }
        }
        report.absorb(self.flush_buffer("shutdown").await);
        report
    }

    async fn flush_buffer(&self, trigger: &'static str) -> FlushReport {
        let batch = self.buffer.drain().await;
        if batch.is_empty() {
            return FlushReport::default();
        }
        self.write(batch, trigger).await
    }

    async fn write(&self, batch: Vec<T>, trigger: &'static str) -> FlushReport {
        let batch_size = batch.len();
        debug!(
            event = events::FLUSH_START,
            component = COMPONENT,
            worker_id = self.context.worker_id.as_str(),
            buffer = self.context.buffer,
            batch_size,
            trigger,
            "flushing batch"
        );

        let outcome = self.sink.write_batch(batch).await;
        let report = FlushReport {
            written: outcome.written,
            skipped: outcome.skipped,
            requeued: outcome.retry.len(),
        };

        if report.requeued > 0 {
            error!(
                event = events::FLUSH_FAILED_REQUEUED,
                component = COMPONENT,
                worker_id = self.context.worker_id.as_str(),
                buffer = self.context.buffer,
                batch_size,
                requeued = report.requeued,
                err = outcome.error.as_deref().unwrap_or("unknown"),
                "flush failed, entries returned to buffer"
            );
            self.buffer.requeue_front(outcome.retry).await;
        }

        if report.written > 0 {
            info!(
                event = events::FLUSH_OK,
                component = COMPONENT,
                worker_id = self.context.worker_id.as_str(),
                buffer = self.context.buffer,
                written = report.written,
                skipped = report.skipped,
                trigger,
                "flushed batch"
            );
        } else if report.skipped > 0 {
            warn!(
                event = events::FLUSH_OK,
                component = COMPONENT,
                worker_id = self.context.worker_id.as_str(),
                buffer = self.context.buffer,
                skipped = report.skipped,
                trigger,
                "flush wrote nothing, all entries skipped"
            );
        }

        report
    }

    async fn report_status(&self) {
        let buffered = self.buffer.len().await;
        if buffered == 0 {
            return;
        }
        info!(
            event = events::BUFFER_STATUS,
            component = COMPONENT,
            worker_id = self.context.worker_id.as_str(),
            buffer = self.context.buffer,
            buffered,
            dropped_total = self.buffer.dropped(),
            "entries waiting in buffer"
        );
    }
}

fn delayed_interval(period: Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_report(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::{BatchOutcome, BatchSink, FlushSchedule, FlushWorker};
    use crate::data_plane::batch_buffer::BatchBuffer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        fail: AtomicBool,
        batches: Mutex<Vec<Vec<u32>>>,
    }

    #[async_trait]
    impl BatchSink<u32> for RecordingSink {
        async fn write_batch(&self, batch: Vec<u32>) -> BatchOutcome<u32> {
            if self.fail.load(Ordering::SeqCst) {
                return BatchOutcome::failed(batch, "store offline");
            }
            let written = batch.len();
            self.batches.lock().await.push(batch);
            BatchOutcome::written(written)
        }
    }

    fn slow_schedule() -> FlushSchedule {
        FlushSchedule {
            flush_interval: Duration::from_secs(3_600),
            report_interval: None,
        }
    }

    #[tokio::test]
    async fn capacity_batches_are_written_in_hand_off_order() {
        let buffer = Arc::new(BatchBuffer::<u32>::new("test", 2, 100));
        let sink = Arc::new(RecordingSink::default());
        let (handle, join) = FlushWorker::spawn(buffer.clone(), sink.clone(), slow_schedule());

        for value in 1..=5 {
            if let Some(batch) = buffer.append(value).await {
                assert!(handle.hand_off(batch).is_ok());
            }
        }
        let report = handle.flush_now().await.expect("worker should reply");

        assert_eq!(report.written, 1);
        assert_eq!(*sink.batches.lock().await, vec![vec![1, 2], vec![3, 4], vec![5]]);

        handle.shutdown().await;
        join.await.expect("worker task should join");
    }

    #[tokio::test]
    async fn failed_flush_requeues_and_next_flush_retries_same_order() {
        let buffer = Arc::new(BatchBuffer::<u32>::new("test", 100, 1_000));
        let sink = Arc::new(RecordingSink::default());
        let (handle, _join) = FlushWorker::spawn(buffer.clone(), sink.clone(), slow_schedule());
        for value in [7, 8, 9] {
            buffer.append(value).await;
        }

        sink.fail.store(true, Ordering::SeqCst);
        let failed = handle.flush_now().await.expect("worker should reply");
        assert_eq!(failed.requeued, 3);
        assert_eq!(buffer.len().await, 3);

        sink.fail.store(false, Ordering::SeqCst);
        buffer.append(10).await;
        let retried = handle.flush_now().await.expect("worker should reply");

        assert_eq!(retried.written, 4);
        assert_eq!(*sink.batches.lock().await, vec![vec![7, 8, 9, 10]]);
    }

    #[tokio::test(start_paused = true)]
    async fn interval_tick_flushes_partial_buffer() {
        let buffer = Arc::new(BatchBuffer::<u32>::new("test", 100, 1_000));
        let sink = Arc::new(RecordingSink::default());
        let schedule = FlushSchedule {
            flush_interval: Duration::from_millis(50),
            report_interval: Some(Duration::from_millis(20)),
        };
        let (_handle, _join) = FlushWorker::spawn(buffer.clone(), sink.clone(), schedule);

        buffer.append(1).await;
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(*sink.batches.lock().await, vec![vec![1]]);
        assert!(buffer.is_empty().await);
    }

    #[tokio::test]
    async fn shutdown_flushes_remaining_entries() {
        let buffer = Arc::new(BatchBuffer::<u32>::new("test", 100, 1_000));
        let sink = Arc::new(RecordingSink::default());
        let (handle, join) = FlushWorker::spawn(buffer.clone(), sink.clone(), slow_schedule());
        buffer.append(42).await;

        let report = handle.shutdown().await.expect("worker should reply");
        join.await.expect("worker task should join");

        assert_eq!(report.written, 1);
        assert!(handle.hand_off(vec![1]).is_err());
    }
}
