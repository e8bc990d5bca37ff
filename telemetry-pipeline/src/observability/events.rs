//! Canonical structured event names used across `telemetry-pipeline`.

// Pipeline lifecycle events.
pub const PIPELINE_START: &str = "pipeline_start";
pub const PIPELINE_STOP: &str = "pipeline_stop";

// Ingress events.
pub const INGRESS_RECEIVE: &str = "ingress_receive";
pub const INGRESS_DROP_UNRECOGNIZED_TOPIC: &str = "ingress_drop_unrecognized_topic";
pub const INGRESS_DROP_UNPARSEABLE_VALUE: &str = "ingress_drop_unparseable_value";
pub const INGRESS_VALUE_REJECTED: &str = "ingress_value_rejected";
pub const INGRESS_MEASUREMENT_BUFFERED: &str = "ingress_measurement_buffered";
pub const INGRESS_STATE_UPDATE_BUFFERED: &str = "ingress_state_update_buffered";
pub const INGRESS_FLUSH_HANDOFF_FAILED: &str = "ingress_flush_handoff_failed";
pub const DEVICE_LOG_FORWARDED: &str = "device_log_forwarded";
pub const DEVICE_LOG_MALFORMED: &str = "device_log_malformed";

// Buffer and flush worker events.
pub const BUFFER_OVERFLOW_DROPPED: &str = "buffer_overflow_dropped";
pub const BUFFER_STATUS: &str = "buffer_status";
pub const FLUSH_START: &str = "flush_start";
pub const FLUSH_OK: &str = "flush_ok";
pub const FLUSH_FAILED_REQUEUED: &str = "flush_failed_requeued";
pub const FLUSH_DUPLICATES_IGNORED: &str = "flush_duplicates_ignored";
pub const FLUSH_BATCH_DISCARDED: &str = "flush_batch_discarded";
pub const FLUSH_WORKER_START: &str = "flush_worker_start";
pub const FLUSH_WORKER_STOP: &str = "flush_worker_stop";

// Device-state events.
pub const STATE_FRAGMENT_SKIPPED: &str = "state_fragment_skipped";
pub const STATE_PERSIST_FAILED: &str = "state_persist_failed";
pub const STATE_PERSIST_REJECTED: &str = "state_persist_rejected";
pub const STATE_MERGED: &str = "state_merged";

// Realtime fan-out events.
pub const REALTIME_BROADCAST_SENT: &str = "realtime_broadcast_sent";
pub const REALTIME_BROADCAST_SUPPRESSED: &str = "realtime_broadcast_suppressed";

// History events.
pub const HISTORY_TIER_SELECTED: &str = "history_tier_selected";
pub const HISTORY_BUCKETED_FALLBACK: &str = "history_bucketed_fallback";
pub const HISTORY_QUERY_FAILED: &str = "history_query_failed";

// Sensor configuration events.
pub const CONFIG_PERSISTED: &str = "config_persisted";
pub const CONFIG_PUBLISHED: &str = "config_published";
pub const CONFIG_PUBLISH_FAILED: &str = "config_publish_failed";
pub const CONFIG_REPUBLISHED: &str = "config_republished";
