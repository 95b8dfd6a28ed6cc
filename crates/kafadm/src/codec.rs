// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Staging codecs: drain a source topic into a staging directory, replay
//! a staging directory into a destination topic.
//!
//! Two interchangeable variants implement the same contract. [`PlainCodec`]
//! stages raw key/value records; [`SchemaCodec`] additionally captures each
//! record's schema in deduplicated sidecar files. Both stream records
//! line-at-a-time through the staging file, so an arbitrarily large
//! requested count never grows resident memory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;

/// Name of the record stream inside a staging directory.
pub const RECORDS_FILE: &str = "records.jsonl";

/// Codec and broker-seam errors.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("record encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("broker error: {0}")]
    Broker(String),

    #[error("staged record references unknown schema id {0}")]
    MissingSchema(u32),
}

/// One staged message. The on-disk representation is one JSON object per
/// line; `schema_id` is only present for the schema variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedRecord {
    pub key: Option<String>,
    pub value: Option<String>,
    pub partition: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<u32>,
}

/// A message as fetched from the source topic, schema attached when the
/// source can supply one.
#[derive(Debug, Clone)]
pub struct SourcedRecord {
    pub key: Option<String>,
    pub value: Option<String>,
    pub partition: i32,
    pub schema: Option<String>,
}

/// Consuming side of the broker seam.
pub trait RecordConsumer {
    /// Join `group_id` on `topic`, positioned at the earliest or latest
    /// offset.
    fn subscribe(
        &mut self,
        topic: &str,
        group_id: &str,
        from_earliest: bool,
    ) -> Result<(), CodecError>;

    /// Fetch the next message, `None` once nothing arrives within the
    /// configured wait.
    fn poll(&mut self, timeout: Duration) -> Result<Option<SourcedRecord>, CodecError>;
}

/// Producing side of the broker seam.
pub trait RecordProducer {
    /// Produce one record, re-attaching its schema when present.
    fn send(
        &mut self,
        topic: &str,
        record: &StagedRecord,
        schema: Option<&str>,
    ) -> Result<(), CodecError>;

    /// Block until everything sent so far is acknowledged.
    fn flush(&mut self) -> Result<(), CodecError>;
}

/// Drain parameters shared by both codec variants.
#[derive(Debug, Clone)]
pub struct DrainRequest<'a> {
    pub group_id: &'a str,
    pub topic: &'a str,
    /// Stop once this many messages are staged.
    pub max_count: u64,
    /// Start from the earliest offset instead of the latest.
    pub from_earliest: bool,
    /// Idle wait before concluding the source is exhausted.
    pub idle_timeout: Duration,
}

/// The codec contract: `drain` and `replay` over one staging directory.
/// A directory is only readable by the variant that wrote it.
pub trait StagingCodec {
    /// Drain up to `request.max_count` messages into `dir`. Returns the
    /// number actually staged; fewer than requested is a result, not an
    /// error. Clearing `running` stops the drain at a record boundary.
    fn drain(
        &self,
        consumer: &mut dyn RecordConsumer,
        dir: &Path,
        request: &DrainRequest<'_>,
        running: &AtomicBool,
    ) -> Result<u64, CodecError>;

    /// Replay every staged record into `topic`. Returns the produced count.
    fn replay(
        &self,
        producer: &mut dyn RecordProducer,
        topic: &str,
        dir: &Path,
    ) -> Result<u64, CodecError>;
}

/// Which codec variant a relay or probe session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CodecKind {
    #[default]
    Plain,
    Schema,
}

impl CodecKind {
    /// Select the variant implementation. Selection is configuration, not
    /// type hierarchy: both sides of a relay must agree on the kind.
    pub fn build(self) -> Box<dyn StagingCodec> {
        match self {
            Self::Plain => Box::new(PlainCodec),
            Self::Schema => Box::new(SchemaCodec),
        }
    }
}

/// Plain bytes variant: key/value/partition JSON lines, schemas ignored.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainCodec;

/// Schema-encoded variant: JSON lines plus `schema_<id>.json` sidecars,
/// one per distinct schema seen while draining.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaCodec;

fn schema_file(dir: &Path, id: u32) -> std::path::PathBuf {
    dir.join(format!("schema_{id}.json"))
}

fn drain_records<F>(
    consumer: &mut dyn RecordConsumer,
    dir: &Path,
    request: &DrainRequest<'_>,
    running: &AtomicBool,
    mut stage: F,
) -> Result<u64, CodecError>
where
    F: FnMut(SourcedRecord, &mut BufWriter<File>) -> Result<(), CodecError>,
{
    consumer.subscribe(request.topic, request.group_id, request.from_earliest)?;

    let mut writer = BufWriter::new(File::create(dir.join(RECORDS_FILE))?);
    let mut staged = 0u64;

    while staged < request.max_count && running.load(Ordering::SeqCst) {
        match consumer.poll(request.idle_timeout)? {
            Some(record) => {
                stage(record, &mut writer)?;
                staged += 1;
            }
            // Source exhausted within the configured wait.
            None => break,
        }
    }

    writer.flush()?;
    tracing::debug!(topic = request.topic, staged, "drain finished");
    Ok(staged)
}

fn write_line(writer: &mut BufWriter<File>, record: &StagedRecord) -> Result<(), CodecError> {
    serde_json::to_writer(&mut *writer, record)?;
    writer.write_all(b"\n")?;
    Ok(())
}

impl StagingCodec for PlainCodec {
    fn drain(
        &self,
        consumer: &mut dyn RecordConsumer,
        dir: &Path,
        request: &DrainRequest<'_>,
        running: &AtomicBool,
    ) -> Result<u64, CodecError> {
        drain_records(consumer, dir, request, running, |record, writer| {
            write_line(
                writer,
                &StagedRecord {
                    key: record.key,
                    value: record.value,
                    partition: record.partition,
                    schema_id: None,
                },
            )
        })
    }

    fn replay(
        &self,
        producer: &mut dyn RecordProducer,
        topic: &str,
        dir: &Path,
    ) -> Result<u64, CodecError> {
        let reader = BufReader::new(File::open(dir.join(RECORDS_FILE))?);
        let mut produced = 0u64;

        for line in reader.lines() {
            let record: StagedRecord = serde_json::from_str(&line?)?;
            producer.send(topic, &record, None)?;
            produced += 1;
        }

        producer.flush()?;
        Ok(produced)
    }
}

impl StagingCodec for SchemaCodec {
    fn drain(
        &self,
        consumer: &mut dyn RecordConsumer,
        dir: &Path,
        request: &DrainRequest<'_>,
        running: &AtomicBool,
    ) -> Result<u64, CodecError> {
        // Schema text -> sidecar file id, deduplicated across the drain.
        let mut schema_ids: HashMap<String, u32> = HashMap::new();
        let dir_owned = dir.to_path_buf();

        drain_records(consumer, dir, request, running, move |record, writer| {
            let schema_id = match record.schema {
                Some(schema) => match schema_ids.get(&schema) {
                    Some(id) => Some(*id),
                    None => {
                        let id = schema_ids.len() as u32;
                        std::fs::write(schema_file(&dir_owned, id), &schema)?;
                        schema_ids.insert(schema, id);
                        Some(id)
                    }
                },
                None => None,
            };
            write_line(
                writer,
                &StagedRecord {
                    key: record.key,
                    value: record.value,
                    partition: record.partition,
                    schema_id,
                },
            )
        })
    }

    fn replay(
        &self,
        producer: &mut dyn RecordProducer,
        topic: &str,
        dir: &Path,
    ) -> Result<u64, CodecError> {
        let reader = BufReader::new(File::open(dir.join(RECORDS_FILE))?);
        let mut schemas: HashMap<u32, String> = HashMap::new();
        let mut produced = 0u64;

        for line in reader.lines() {
            let record: StagedRecord = serde_json::from_str(&line?)?;
            let schema = match record.schema_id {
                Some(id) => {
                    if !schemas.contains_key(&id) {
                        let path = schema_file(dir, id);
                        let text = std::fs::read_to_string(&path)
                            .map_err(|_| CodecError::MissingSchema(id))?;
                        schemas.insert(id, text);
                    }
                    schemas.get(&id).map(String::as_str)
                }
                None => None,
            };
            producer.send(topic, &record, schema)?;
            produced += 1;
        }

        producer.flush()?;
        Ok(produced)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{CollectingProducer, QueueConsumer};
    use super::*;
    use tempfile::tempdir;

    fn request(max_count: u64) -> DrainRequest<'static> {
        DrainRequest {
            group_id: "relay-group",
            topic: "orders",
            max_count,
            from_earliest: true,
            idle_timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_plain_drain_caps_at_requested_count() {
        let dir = tempdir().expect("tempdir");
        let mut consumer = QueueConsumer::with_values(&["a", "b", "c", "d", "e"]);
        let running = AtomicBool::new(true);

        let staged = PlainCodec
            .drain(&mut consumer, dir.path(), &request(3), &running)
            .expect("drain");

        assert_eq!(staged, 3);
        assert_eq!(
            consumer.subscribed,
            Some(("orders".into(), "relay-group".into(), true))
        );
    }

    #[test]
    fn test_plain_drain_reports_short_source() {
        let dir = tempdir().expect("tempdir");
        let mut consumer = QueueConsumer::with_values(&["a", "b"]);
        let running = AtomicBool::new(true);

        let staged = PlainCodec
            .drain(&mut consumer, dir.path(), &request(10), &running)
            .expect("drain");

        // M < N available stages M without error.
        assert_eq!(staged, 2);
    }

    #[test]
    fn test_plain_drain_stops_when_interrupted() {
        let dir = tempdir().expect("tempdir");
        let mut consumer = QueueConsumer::with_values(&["a", "b", "c"]);
        let running = AtomicBool::new(false);

        let staged = PlainCodec
            .drain(&mut consumer, dir.path(), &request(3), &running)
            .expect("drain");

        assert_eq!(staged, 0);
        assert_eq!(consumer.records.len(), 3);
    }

    #[test]
    fn test_plain_drain_then_replay() {
        let dir = tempdir().expect("tempdir");
        let mut consumer = QueueConsumer::with_values(&["a", "b", "c"]);
        let running = AtomicBool::new(true);

        let staged = PlainCodec
            .drain(&mut consumer, dir.path(), &request(3), &running)
            .expect("drain");
        assert_eq!(staged, 3);

        let mut producer = CollectingProducer::default();
        let produced = PlainCodec
            .replay(&mut producer, "orders", dir.path())
            .expect("replay");

        assert_eq!(produced, 3);
        assert!(producer.flushed);
        assert_eq!(producer.sent[0].0, "orders");
        assert_eq!(producer.sent[0].1.value.as_deref(), Some("a"));
        assert_eq!(producer.sent[2].1.value.as_deref(), Some("c"));
    }

    #[test]
    fn test_schema_codec_dedups_sidecars_and_replays_schemas() {
        let dir = tempdir().expect("tempdir");
        let order_schema = r#"{"type":"record","name":"Order"}"#;
        let refund_schema = r#"{"type":"record","name":"Refund"}"#;
        let mut consumer = QueueConsumer::default();
        for (value, schema) in [
            ("o1", order_schema),
            ("o2", order_schema),
            ("r1", refund_schema),
        ] {
            consumer.records.push_back(SourcedRecord {
                key: None,
                value: Some(value.into()),
                partition: 1,
                schema: Some(schema.into()),
            });
        }
        let running = AtomicBool::new(true);

        let staged = SchemaCodec
            .drain(&mut consumer, dir.path(), &request(10), &running)
            .expect("drain");
        assert_eq!(staged, 3);

        // Two distinct schemas, two sidecar files.
        assert!(dir.path().join("schema_0.json").is_file());
        assert!(dir.path().join("schema_1.json").is_file());
        assert!(!dir.path().join("schema_2.json").exists());

        let mut producer = CollectingProducer::default();
        let produced = SchemaCodec
            .replay(&mut producer, "orders", dir.path())
            .expect("replay");

        assert_eq!(produced, 3);
        assert_eq!(producer.sent[0].2.as_deref(), Some(order_schema));
        assert_eq!(producer.sent[1].2.as_deref(), Some(order_schema));
        assert_eq!(producer.sent[2].2.as_deref(), Some(refund_schema));
    }

    #[test]
    fn test_schema_replay_missing_sidecar() {
        let dir = tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(RECORDS_FILE),
            "{\"key\":null,\"value\":\"v\",\"partition\":0,\"schema_id\":7}\n",
        )
        .expect("write");

        let mut producer = CollectingProducer::default();
        assert!(matches!(
            SchemaCodec.replay(&mut producer, "orders", dir.path()),
            Err(CodecError::MissingSchema(7))
        ));
    }
}
