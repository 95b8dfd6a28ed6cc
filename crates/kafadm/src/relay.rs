// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Cross-context message relay.
//!
//! Stages messages through local storage between two independent cluster
//! connections: drain from the source context, confirm, replay into the
//! destination context. The two contexts are never connected at the same
//! time, and a zero-message drain aborts before the destination is
//! contacted at all. Staging cleanup runs on every exit path.

use crate::codec::{CodecError, CodecKind, DrainRequest, RecordConsumer, RecordProducer};
use crate::confirm::Confirm;
use crate::staging::{StagingArea, StagingError};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Relay errors.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("no messages transferred: the source topic is empty or the starting offset was past the end")]
    EmptyTransfer,

    #[error("relay rejected by operator")]
    Aborted,

    #[error("relay interrupted while draining")]
    Interrupted,

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Opens broker connections for a named context. Connections are opened
/// strictly sequentially: the source consumer is dropped before the
/// destination producer is requested.
pub trait ClusterConnector {
    fn consumer(&self, context: &str) -> Result<Box<dyn RecordConsumer>, CodecError>;
    fn producer(&self, context: &str) -> Result<Box<dyn RecordProducer>, CodecError>;
}

/// One relay invocation.
#[derive(Debug, Clone)]
pub struct RelayRequest {
    /// Topic name, identical on both sides.
    pub topic: String,
    /// Source context name.
    pub from_context: String,
    /// Destination context name.
    pub to_context: String,
    /// Number of messages to transfer.
    pub count: u64,
    /// Drain from the earliest offset instead of the latest.
    pub from_earliest: bool,
    /// Codec variant for staging.
    pub codec: CodecKind,
    /// Keep the staging directory after the relay.
    pub retain_staging: bool,
    /// Directory the per-session staging area is created under.
    pub staging_root: PathBuf,
    /// Consumer idle wait before the source counts as exhausted.
    pub idle_timeout: Duration,
}

impl RelayRequest {
    pub fn new(
        topic: impl Into<String>,
        from_context: impl Into<String>,
        to_context: impl Into<String>,
        count: u64,
    ) -> Self {
        Self {
            topic: topic.into(),
            from_context: from_context.into(),
            to_context: to_context.into(),
            count,
            from_earliest: false,
            codec: CodecKind::Plain,
            retain_staging: false,
            staging_root: PathBuf::from("."),
            idle_timeout: Duration::from_secs(10),
        }
    }
}

/// Counts reported after a successful relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayReport {
    /// Messages drained from the source into staging.
    pub staged: u64,
    /// Messages produced into the destination.
    pub produced: u64,
}

/// Session identity: topic name plus creation timestamp in milliseconds.
fn session_id(topic: &str) -> String {
    format!("{}_{}", topic, chrono::Utc::now().timestamp_millis())
}

/// Run one relay: drain, confirm, replay.
pub fn run(
    request: &RelayRequest,
    connector: &dyn ClusterConnector,
    confirm: &dyn Confirm,
    running: &AtomicBool,
) -> Result<RelayReport, RelayError> {
    let session = session_id(&request.topic);
    let group_id = format!("group_for_{session}");
    let staging = StagingArea::acquire(
        request.staging_root.join(format!("relay_{session}")),
        request.retain_staging,
    )?;
    let codec = request.codec.build();

    tracing::info!(
        topic = %request.topic,
        from = %request.from_context,
        count = request.count,
        "draining from source context"
    );

    // Draining: the full drain completes before any destination contact.
    let mut consumer = connector.consumer(&request.from_context)?;
    let drain = DrainRequest {
        group_id: &group_id,
        topic: &request.topic,
        max_count: request.count,
        from_earliest: request.from_earliest,
        idle_timeout: request.idle_timeout,
    };
    let staged = codec.drain(consumer.as_mut(), staging.path(), &drain, running)?;
    drop(consumer);

    if !running.load(Ordering::SeqCst) {
        staging.release()?;
        return Err(RelayError::Interrupted);
    }
    if staged == 0 {
        staging.release()?;
        return Err(RelayError::EmptyTransfer);
    }

    // AwaitingConfirmation.
    let question = format!(
        "Replay {staged} message(s) into topic '{}' on context '{}'?",
        request.topic, request.to_context
    );
    if !confirm.ask(&question) {
        staging.release()?;
        return Err(RelayError::Aborted);
    }

    // Replaying: destination side only from here on.
    tracing::info!(
        topic = %request.topic,
        to = %request.to_context,
        staged,
        "replaying into destination context"
    );
    let mut producer = connector.producer(&request.to_context)?;
    let produced = codec.replay(producer.as_mut(), &request.topic, staging.path())?;

    staging.release()?;
    Ok(RelayReport { staged, produced })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::testing::QueueConsumer;
    use crate::codec::{SourcedRecord, StagedRecord};
    use crate::confirm::testing::ScriptedConfirm;
    use crate::confirm::AutoApprove;
    use std::cell::{Cell, RefCell};
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Producer double whose sends stay observable after the box is gone.
    #[derive(Debug, Default)]
    struct SharedProducer {
        sent: Arc<Mutex<Vec<StagedRecord>>>,
    }

    impl RecordProducer for SharedProducer {
        fn send(
            &mut self,
            _topic: &str,
            record: &StagedRecord,
            _schema: Option<&str>,
        ) -> Result<(), CodecError> {
            self.sent.lock().expect("lock").push(record.clone());
            Ok(())
        }

        fn flush(&mut self) -> Result<(), CodecError> {
            Ok(())
        }
    }

    struct FakeConnector {
        source: RefCell<Option<QueueConsumer>>,
        produced: Arc<Mutex<Vec<StagedRecord>>>,
        producer_requests: Cell<usize>,
    }

    impl FakeConnector {
        fn with_source(values: &[&str]) -> Self {
            Self {
                source: RefCell::new(Some(QueueConsumer::with_values(values))),
                produced: Arc::new(Mutex::new(Vec::new())),
                producer_requests: Cell::new(0),
            }
        }
    }

    impl ClusterConnector for FakeConnector {
        fn consumer(&self, _context: &str) -> Result<Box<dyn RecordConsumer>, CodecError> {
            let consumer = self
                .source
                .borrow_mut()
                .take()
                .ok_or_else(|| CodecError::Broker("source already taken".into()))?;
            Ok(Box::new(consumer))
        }

        fn producer(&self, _context: &str) -> Result<Box<dyn RecordProducer>, CodecError> {
            self.producer_requests.set(self.producer_requests.get() + 1);
            Ok(Box::new(SharedProducer {
                sent: Arc::clone(&self.produced),
            }))
        }
    }

    fn request(root: &std::path::Path, count: u64) -> RelayRequest {
        let mut req = RelayRequest::new("orders", "staging-ctx", "prod-ctx", count);
        req.staging_root = root.to_path_buf();
        req.idle_timeout = Duration::from_millis(5);
        req
    }

    fn staging_entries(root: &std::path::Path) -> Vec<PathBuf> {
        std::fs::read_dir(root)
            .expect("read root")
            .map(|e| e.expect("entry").path())
            .collect()
    }

    #[test]
    fn test_relay_transfers_requested_count() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&["a", "b", "c", "d"]);
        let running = AtomicBool::new(true);

        let report = run(&request(dir.path(), 3), &connector, &AutoApprove, &running)
            .expect("relay");

        assert_eq!(report, RelayReport { staged: 3, produced: 3 });
        assert_eq!(connector.produced.lock().expect("lock").len(), 3);
        // Staging cleaned up without retention.
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[test]
    fn test_relay_short_source_transfers_what_exists() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&["a", "b"]);
        let running = AtomicBool::new(true);

        let report = run(&request(dir.path(), 10), &connector, &AutoApprove, &running)
            .expect("relay");

        assert_eq!(report, RelayReport { staged: 2, produced: 2 });
    }

    #[test]
    fn test_scenario_d_empty_source_never_contacts_destination() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&[]);
        let running = AtomicBool::new(true);
        let confirm = ScriptedConfirm::new(true);

        let err = run(&request(dir.path(), 10), &connector, &confirm, &running)
            .expect_err("empty transfer");

        assert!(matches!(err, RelayError::EmptyTransfer));
        assert_eq!(connector.producer_requests.get(), 0);
        assert_eq!(confirm.times_asked(), 0);
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[test]
    fn test_rejection_skips_destination_but_cleans_up() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&["a"]);
        let running = AtomicBool::new(true);
        let confirm = ScriptedConfirm::new(false);

        let err = run(&request(dir.path(), 1), &connector, &confirm, &running)
            .expect_err("rejected");

        assert!(matches!(err, RelayError::Aborted));
        assert_eq!(confirm.times_asked(), 1);
        assert_eq!(connector.producer_requests.get(), 0);
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[test]
    fn test_retained_staging_survives() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&["a", "b"]);
        let running = AtomicBool::new(true);

        let mut req = request(dir.path(), 2);
        req.retain_staging = true;
        let report = run(&req, &connector, &AutoApprove, &running).expect("relay");

        assert_eq!(report.produced, 2);
        let entries = staging_entries(dir.path());
        assert_eq!(entries.len(), 1);
        assert!(entries[0].join(crate::codec::RECORDS_FILE).is_file());
    }

    #[test]
    fn test_interrupt_during_drain_cleans_up() {
        let dir = tempdir().expect("tempdir");
        let connector = FakeConnector::with_source(&["a", "b", "c"]);
        let running = AtomicBool::new(false);

        let err = run(&request(dir.path(), 3), &connector, &AutoApprove, &running)
            .expect_err("interrupted");

        assert!(matches!(err, RelayError::Interrupted));
        assert_eq!(connector.producer_requests.get(), 0);
        assert!(staging_entries(dir.path()).is_empty());
    }

    #[test]
    fn test_schema_relay_end_to_end() {
        let dir = tempdir().expect("tempdir");
        let schema = r#"{"type":"record","name":"Order"}"#;
        let mut source = QueueConsumer::default();
        source.records.push_back(SourcedRecord {
            key: Some("k".into()),
            value: Some("v".into()),
            partition: 0,
            schema: Some(schema.into()),
        });
        let connector = FakeConnector {
            source: RefCell::new(Some(source)),
            produced: Arc::new(Mutex::new(Vec::new())),
            producer_requests: Cell::new(0),
        };
        let running = AtomicBool::new(true);

        let mut req = request(dir.path(), 1);
        req.codec = CodecKind::Schema;
        let report = run(&req, &connector, &AutoApprove, &running).expect("relay");

        assert_eq!(report, RelayReport { staged: 1, produced: 1 });
        let produced = connector.produced.lock().expect("lock");
        assert_eq!(produced[0].schema_id, Some(0));
    }
}
