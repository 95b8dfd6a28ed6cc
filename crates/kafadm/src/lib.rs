// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! kafadm - operator tooling for Kafka-style broker clusters.
//!
//! Core pieces:
//! - declarative topic reconciliation ([`reconcile`]): compute the delta
//!   between a desired-topics document and live cluster state, apply it
//!   all-or-nothing behind a single confirmation;
//! - cross-context message relay ([`relay`]): drain a source topic into a
//!   scoped staging directory, then replay into a destination context,
//!   never holding both connections at once;
//! - liveness probing ([`probe`]): round-trip markers through an
//!   ephemeral topic with guaranteed teardown.
//!
//! The broker client itself is a collaborator behind narrow seams
//! ([`admin::TopicAdmin`], [`codec::RecordConsumer`],
//! [`codec::RecordProducer`]); `kafadmctl` wires an rdkafka-backed
//! implementation.

pub mod admin;
pub mod codec;
pub mod confirm;
pub mod context;
pub mod diff;
pub mod probe;
pub mod reconcile;
pub mod relay;
pub mod staging;
pub mod topic;

pub use admin::{AdminError, TopicAdmin, TopicFilter};
pub use codec::{CodecError, CodecKind, DrainRequest, RecordConsumer, RecordProducer, StagedRecord};
pub use confirm::{AutoApprove, Confirm};
pub use context::{ContextConfig, ContextError, ContextSettings, ContextStore};
pub use diff::{ConfigChange, TopicDiff};
pub use probe::{ProbeReport, ProbeRequest, ProbeStats};
pub use reconcile::{ApplyReport, Plan, ReconcileError};
pub use relay::{ClusterConnector, RelayError, RelayReport, RelayRequest};
pub use staging::{StagingArea, StagingError};
pub use topic::{SpecError, TopicSpec, TopicsDocument};
