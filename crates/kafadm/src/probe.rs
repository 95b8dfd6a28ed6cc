// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cluster liveness probe.
//!
//! Round-trips marker messages through a dedicated ephemeral topic and
//! reports latency statistics. The ephemeral topic is deleted on every
//! exit path, including interruption; zero collected samples yield no
//! statistics instead of a division by zero.

use crate::admin::{AdminError, TopicAdmin};
use crate::codec::{CodecError, RecordConsumer, RecordProducer, StagedRecord};
use crate::topic::TopicSpec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Ephemeral topic the probe round-trips through.
pub const PROBE_TOPIC: &str = "kafadm_probe";

/// Consumer group the probe reads its own markers with.
pub const PROBE_GROUP_ID: &str = "kafadm_probe_group";

/// Probe errors.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error(transparent)]
    Admin(#[from] AdminError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// One probe session.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    /// Number of round trips to attempt.
    pub iterations: u32,

    /// Pause between iterations.
    pub interval: Duration,

    /// Per-poll wait while looking for the echoed marker.
    pub poll_timeout: Duration,
}

impl Default for ProbeRequest {
    fn default() -> Self {
        Self {
            iterations: 10,
            interval: Duration::from_secs(1),
            poll_timeout: Duration::from_millis(100),
        }
    }
}

/// Latency summary over the collected round trips.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeStats {
    pub count: usize,
    pub min_ms: f64,
    pub avg_ms: f64,
    pub max_ms: f64,
}

impl ProbeStats {
    /// `None` for an empty sample set; averaging zero samples is
    /// undefined and must not crash the report.
    pub fn from_samples(samples: &[f64]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }
        let mut min_ms = f64::INFINITY;
        let mut max_ms = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for &sample in samples {
            min_ms = min_ms.min(sample);
            max_ms = max_ms.max(sample);
            sum += sample;
        }
        Some(Self {
            count: samples.len(),
            min_ms,
            avg_ms: sum / samples.len() as f64,
            max_ms,
        })
    }
}

/// Result of a probe session.
#[derive(Debug, Clone)]
pub struct ProbeReport {
    /// Round-trip times in milliseconds, in iteration order.
    pub samples: Vec<f64>,
}

impl ProbeReport {
    pub fn stats(&self) -> Option<ProbeStats> {
        ProbeStats::from_samples(&self.samples)
    }
}

/// Run one probe session: setup, round-trip loop, guaranteed teardown.
///
/// `on_sample` is invoked after each completed round trip so callers can
/// report progress live. Clearing `running` ends the loop early without
/// error; the ephemeral topic is deleted regardless of how the loop
/// exits.
pub fn run(
    request: &ProbeRequest,
    admin: &mut dyn TopicAdmin,
    consumer: &mut dyn RecordConsumer,
    producer: &mut dyn RecordProducer,
    running: &AtomicBool,
    on_sample: &mut dyn FnMut(u32, f64),
) -> Result<ProbeReport, ProbeError> {
    // Setup: existence of the ephemeral topic is not a failure.
    match admin.create(&[TopicSpec::new(PROBE_TOPIC)]) {
        Ok(()) => tracing::debug!(topic = PROBE_TOPIC, "created probe topic"),
        Err(AdminError::TopicAlreadyExists(_)) => {
            tracing::debug!(topic = PROBE_TOPIC, "probe topic already exists");
        }
        Err(e) => return Err(e.into()),
    }

    let result = probe_loop(request, consumer, producer, running, on_sample);

    // Teardown runs regardless of how the loop exited. A concurrent
    // deletion is tolerated; anything else masks the loop result only
    // when the loop itself succeeded.
    match admin.delete(PROBE_TOPIC) {
        Ok(()) | Err(AdminError::TopicDoesNotExist(_)) => {}
        Err(e) => {
            tracing::warn!(error = %e, "failed to delete probe topic");
            result?;
            return Err(e.into());
        }
    }

    result.map(|samples| ProbeReport { samples })
}

fn probe_loop(
    request: &ProbeRequest,
    consumer: &mut dyn RecordConsumer,
    producer: &mut dyn RecordProducer,
    running: &AtomicBool,
    on_sample: &mut dyn FnMut(u32, f64),
) -> Result<Vec<f64>, ProbeError> {
    consumer.subscribe(PROBE_TOPIC, PROBE_GROUP_ID, true)?;

    let session = chrono::Utc::now().timestamp_millis();
    let mut samples = Vec::with_capacity(request.iterations as usize);

    for i in 0..request.iterations {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let marker = format!("{session}:{i}");
        let record = StagedRecord {
            key: None,
            value: Some(marker.clone()),
            partition: 0,
            schema_id: None,
        };

        let start = Instant::now();
        producer.send(PROBE_TOPIC, &record, None)?;
        producer.flush()?;

        // Block until our own marker comes back; stale messages from a
        // previous session carry a different marker and are skipped.
        loop {
            if !running.load(Ordering::SeqCst) {
                return Ok(samples);
            }
            match consumer.poll(request.poll_timeout)? {
                Some(echoed) if echoed.value.as_deref() == Some(marker.as_str()) => break,
                _ => {}
            }
        }

        let elapsed_ms = start.elapsed().as_secs_f64() * 1_000.0;
        samples.push(elapsed_ms);
        on_sample(i, elapsed_ms);

        if i + 1 < request.iterations {
            pause(request.interval, running);
        }
    }

    Ok(samples)
}

/// Sleep for `interval` in short slices so an interrupt takes effect
/// without waiting out the full pause.
fn pause(interval: Duration, running: &AtomicBool) {
    const SLICE: Duration = Duration::from_millis(50);
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            break;
        }
        std::thread::sleep(remaining.min(SLICE));
    }
}
