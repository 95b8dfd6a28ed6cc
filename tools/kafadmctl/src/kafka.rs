// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! rdkafka-backed implementations of the broker seams.
//!
//! Compiled with the `kafka` feature. Admin calls go through rdkafka's
//! futures-based `AdminClient`, driven by a current-thread tokio runtime;
//! the relay and probe seams use the synchronous `BaseConsumer` and
//! `BaseProducer`.

use kafadm::codec::{CodecError, RecordConsumer, RecordProducer, SourcedRecord, StagedRecord};
use kafadm::relay::ClusterConnector;
use kafadm::{AdminError, ContextSettings, ContextStore, TopicAdmin, TopicFilter, TopicSpec};
use rdkafka::admin::{
    AdminClient, AdminOptions, AlterConfig, NewTopic, ResourceSpecifier, TopicReplication,
};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{BaseConsumer, Consumer};
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::Message;
use rdkafka::producer::{BaseProducer, BaseRecord, Producer};
use std::collections::BTreeMap;
use std::collections::HashMap;
use std::time::Duration;

const CALL_TIMEOUT: Duration = Duration::from_secs(30);

fn base_config(settings: &ContextSettings) -> ClientConfig {
    let mut config = ClientConfig::new();
    config.set("bootstrap.servers", settings.bootstrap_servers.join(","));
    if let Some(protocol) = &settings.security_protocol {
        config.set("security.protocol", protocol);
    }
    if let Some(mechanism) = &settings.sasl_mechanism {
        config.set("sasl.mechanism", mechanism);
    }
    if let Some(username) = &settings.sasl_username {
        config.set("sasl.username", username);
    }
    if let Some(password) = &settings.sasl_password {
        config.set("sasl.password", password);
    }
    config
}

fn map_admin_code(topic: &str, code: RDKafkaErrorCode) -> AdminError {
    match code {
        RDKafkaErrorCode::TopicAlreadyExists => AdminError::TopicAlreadyExists(topic.to_string()),
        RDKafkaErrorCode::UnknownTopic | RDKafkaErrorCode::UnknownTopicOrPartition => {
            AdminError::TopicDoesNotExist(topic.to_string())
        }
        other => AdminError::Broker(format!("{topic}: {other}")),
    }
}

fn broker_err(e: KafkaError) -> AdminError {
    AdminError::Broker(e.to_string())
}

/// Admin client for one context.
pub struct KafkaAdmin {
    settings: ContextSettings,
    client: AdminClient<DefaultClientContext>,
    runtime: tokio::runtime::Runtime,
}

impl KafkaAdmin {
    pub fn connect(settings: &ContextSettings) -> Result<Self, AdminError> {
        let client: AdminClient<DefaultClientContext> =
            base_config(settings).create().map_err(broker_err)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| AdminError::Broker(e.to_string()))?;
        Ok(Self {
            settings: settings.clone(),
            client,
            runtime,
        })
    }

    /// Topic config entries as reported by the broker, defaults excluded.
    fn topic_config(&self, name: &str) -> Result<BTreeMap<String, String>, AdminError> {
        let opts = AdminOptions::new().request_timeout(Some(CALL_TIMEOUT));
        let resources = self
            .runtime
            .block_on(
                self.client
                    .describe_configs([&ResourceSpecifier::Topic(name)], &opts),
            )
            .map_err(broker_err)?;

        let mut config = BTreeMap::new();
        for resource in resources {
            let resource = resource.map_err(|code| map_admin_code(name, code))?;
            for entry in resource.entries {
                if entry.is_default {
                    continue;
                }
                if let Some(value) = entry.value {
                    config.insert(entry.name, value);
                }
            }
        }
        Ok(config)
    }

    /// Structural attributes from cluster metadata.
    fn topic_shape(&self, name: &str) -> Result<(i32, i32), AdminError> {
        let metadata = self
            .client
            .inner()
            .fetch_metadata(Some(name), CALL_TIMEOUT)
            .map_err(broker_err)?;
        let topic = metadata
            .topics()
            .iter()
            .find(|t| t.name() == name)
            .ok_or_else(|| AdminError::TopicDoesNotExist(name.to_string()))?;
        if topic.partitions().is_empty() {
            return Err(AdminError::TopicDoesNotExist(name.to_string()));
        }
        let replication = topic.partitions()[0].replicas().len() as i32;
        Ok((topic.partitions().len() as i32, replication))
    }
}

impl TopicAdmin for KafkaAdmin {
    fn list_topics(&self, filter: &TopicFilter) -> Result<Vec<TopicSpec>, AdminError> {
        let metadata = self
            .client
            .inner()
            .fetch_metadata(None, CALL_TIMEOUT)
            .map_err(broker_err)?;

        let mut topics = Vec::new();
        for topic in metadata.topics() {
            if !filter.matches(topic.name()) || topic.partitions().is_empty() {
                continue;
            }
            let replication = topic.partitions()[0].replicas().len() as i32;
            let config = self.topic_config(topic.name())?;
            topics.push(
                TopicSpec::new(topic.name())
                    .partitions(topic.partitions().len() as i32)
                    .replication(replication)
                    .with_config(config),
            );
        }
        topics.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(topics)
    }

    fn get(&self, name: &str) -> Result<TopicSpec, AdminError> {
        let (partitions, replication) = self.topic_shape(name)?;
        let config = self.topic_config(name)?;
        Ok(TopicSpec::new(name)
            .partitions(partitions)
            .replication(replication)
            .with_config(config))
    }

    fn create(&mut self, topics: &[TopicSpec]) -> Result<(), AdminError> {
        if topics.is_empty() {
            return Ok(());
        }
        let new_topics: Vec<NewTopic<'_>> = topics
            .iter()
            .map(|spec| {
                let mut topic = NewTopic::new(
                    &spec.name,
                    spec.partitions,
                    TopicReplication::Fixed(spec.replication),
                );
                for (key, value) in &spec.config {
                    topic = topic.set(key, value);
                }
                topic
            })
            .collect();

        let opts = AdminOptions::new().request_timeout(Some(CALL_TIMEOUT));
        let results = self
            .runtime
            .block_on(self.client.create_topics(new_topics.iter(), &opts))
            .map_err(broker_err)?;
        for result in results {
            let (topic, code) = match result {
                Ok(_) => continue,
                Err(pair) => pair,
            };
            return Err(map_admin_code(&topic, code));
        }
        Ok(())
    }

    fn alter(&mut self, topics: &[TopicSpec]) -> Result<(), AdminError> {
        if topics.is_empty() {
            return Ok(());
        }
        let alterations: Vec<AlterConfig<'_>> = topics
            .iter()
            .map(|spec| {
                let mut alter = AlterConfig::new(ResourceSpecifier::Topic(&spec.name));
                for (key, value) in &spec.config {
                    alter = alter.set(key, value);
                }
                alter
            })
            .collect();

        let opts = AdminOptions::new().request_timeout(Some(CALL_TIMEOUT));
        let results = self
            .runtime
            .block_on(self.client.alter_configs(alterations.iter(), &opts))
            .map_err(broker_err)?;
        for (spec, result) in topics.iter().zip(results) {
            if let Err((_, code)) = result {
                return Err(map_admin_code(&spec.name, code));
            }
        }
        Ok(())
    }

    fn delete(&mut self, name: &str) -> Result<(), AdminError> {
        let opts = AdminOptions::new().request_timeout(Some(CALL_TIMEOUT));
        let results = self
            .runtime
            .block_on(self.client.delete_topics(&[name], &opts))
            .map_err(broker_err)?;
        for result in results {
            if let Err((topic, code)) = result {
                return Err(map_admin_code(&topic, code));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for KafkaAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaAdmin")
            .field("bootstrap_servers", &self.settings.bootstrap_servers)
            .finish_non_exhaustive()
    }
}

/// Consuming seam over `BaseConsumer`. The consumer is built at
/// subscribe time because the group id is part of its configuration.
pub struct KafkaRecordConsumer {
    settings: ContextSettings,
    consumer: Option<BaseConsumer>,
}

impl KafkaRecordConsumer {
    pub fn new(settings: &ContextSettings) -> Self {
        Self {
            settings: settings.clone(),
            consumer: None,
        }
    }
}

impl RecordConsumer for KafkaRecordConsumer {
    fn subscribe(
        &mut self,
        topic: &str,
        group_id: &str,
        from_earliest: bool,
    ) -> Result<(), CodecError> {
        let mut config = base_config(&self.settings);
        config
            .set("group.id", group_id)
            .set("enable.auto.commit", "true")
            .set(
                "auto.offset.reset",
                if from_earliest { "earliest" } else { "latest" },
            );
        let consumer: BaseConsumer = config
            .create()
            .map_err(|e| CodecError::Broker(e.to_string()))?;
        consumer
            .subscribe(&[topic])
            .map_err(|e| CodecError::Broker(e.to_string()))?;
        self.consumer = Some(consumer);
        Ok(())
    }

    fn poll(&mut self, timeout: Duration) -> Result<Option<SourcedRecord>, CodecError> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| CodecError::Broker("poll before subscribe".into()))?;
        match consumer.poll(timeout) {
            None => Ok(None),
            Some(Err(e)) => Err(CodecError::Broker(e.to_string())),
            Some(Ok(message)) => Ok(Some(SourcedRecord {
                key: message
                    .key()
                    .map(|k| String::from_utf8_lossy(k).into_owned()),
                value: message
                    .payload()
                    .map(|v| String::from_utf8_lossy(v).into_owned()),
                partition: message.partition(),
                // Schema extraction needs a registry client; the staging
                // codecs treat a missing schema as plain bytes.
                schema: None,
            })),
        }
    }
}

/// Producing seam over `BaseProducer`.
pub struct KafkaRecordProducer {
    producer: BaseProducer,
}

impl KafkaRecordProducer {
    pub fn new(settings: &ContextSettings) -> Result<Self, CodecError> {
        let producer: BaseProducer = base_config(settings)
            .create()
            .map_err(|e| CodecError::Broker(e.to_string()))?;
        Ok(Self { producer })
    }
}

impl RecordProducer for KafkaRecordProducer {
    fn send(
        &mut self,
        topic: &str,
        record: &StagedRecord,
        _schema: Option<&str>,
    ) -> Result<(), CodecError> {
        let mut base = BaseRecord::<str, str>::to(topic);
        if let Some(key) = &record.key {
            base = base.key(key);
        }
        if let Some(value) = &record.value {
            base = base.payload(value);
        }
        if record.partition >= 0 {
            base = base.partition(record.partition);
        }
        self.producer
            .send(base)
            .map_err(|(e, _)| CodecError::Broker(e.to_string()))?;
        self.producer.poll(Duration::from_millis(0));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), CodecError> {
        self.producer
            .flush(CALL_TIMEOUT)
            .map_err(|e| CodecError::Broker(e.to_string()))
    }
}

/// Connector resolving context names against the loaded store.
pub struct KafkaConnector {
    contexts: HashMap<String, ContextSettings>,
}

impl KafkaConnector {
    pub fn from_store(store: &ContextStore) -> Self {
        let contexts = store
            .available_contexts()
            .into_iter()
            .filter_map(|name| {
                store
                    .settings(name)
                    .ok()
                    .map(|settings| (name.to_string(), settings.clone()))
            })
            .collect();
        Self { contexts }
    }

    fn settings(&self, context: &str) -> Result<&ContextSettings, CodecError> {
        self.contexts
            .get(context)
            .ok_or_else(|| CodecError::Broker(format!("context not defined: {context}")))
    }
}

impl ClusterConnector for KafkaConnector {
    fn consumer(&self, context: &str) -> Result<Box<dyn RecordConsumer>, CodecError> {
        Ok(Box::new(KafkaRecordConsumer::new(self.settings(context)?)))
    }

    fn producer(&self, context: &str) -> Result<Box<dyn RecordProducer>, CodecError> {
        Ok(Box::new(KafkaRecordProducer::new(self.settings(context)?)?))
    }
}
