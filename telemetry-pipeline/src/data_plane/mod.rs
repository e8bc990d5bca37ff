//! Data-plane layer.
//!
//! Owns the in-memory batch buffers and the background workers that drain
//! them into storage. The ingress path only appends and hands batches off;
//! every storage write happens on a flush worker.

pub mod batch_buffer;
pub mod flush_worker;
pub mod measurement_writer;
