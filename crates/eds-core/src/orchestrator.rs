//! Classifies endpoint mutations as full vs. incremental and emits push
//! intents to the outer push scheduler.

use std::collections::HashSet;

use crate::index::EndpointIndex;
use crate::metrics::Metrics;
use crate::model::IstioEndpoint;
use crate::strng::{self, Strng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKind {
	ServiceEntry,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConfigKey {
	pub kind: ConfigKind,
	pub name: Strng,
	pub namespace: Strng,
}

/// Emitted by the orchestrator on every endpoint report that warrants a
/// push. Delivered to the outer push scheduler, which is expected to
/// coalesce intents across distinct (service, namespace) pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushIntent {
	pub full: bool,
	pub configs: HashSet<ConfigKey>,
	pub reason: Strng,
}

/// The external collaborator that turns a [`PushIntent`] into actual
/// connection pushes. Out of scope for this crate's core logic; an
/// implementation lives in `eds-app`.
pub trait PushScheduler: Send + Sync {
	fn schedule(&self, intent: PushIntent);
}

/// A scheduler that only logs -- useful as a default wiring and in tests.
#[derive(Debug, Default)]
pub struct LoggingPushScheduler;

impl PushScheduler for LoggingPushScheduler {
	fn schedule(&self, intent: PushIntent) {
		tracing::debug!(full = intent.full, reason = %intent.reason, configs = intent.configs.len(), "push intent scheduled");
	}
}

pub struct UpdateOrchestrator<'a> {
	index: &'a EndpointIndex,
	metrics: &'a Metrics,
	scheduler: &'a dyn PushScheduler,
}

impl<'a> UpdateOrchestrator<'a> {
	pub fn new(index: &'a EndpointIndex, metrics: &'a Metrics, scheduler: &'a dyn PushScheduler) -> Self {
		Self { index, metrics, scheduler }
	}

	/// Drives `upsertShard` and emits a push intent: full if the shard entry
	/// was freshly created or the service-account set changed, incremental
	/// otherwise. The endpoint-update counter is incremented unconditionally,
	/// including for no-op updates -- callers that want a true change-rate
	/// signal must de-duplicate externally.
	pub fn report_endpoint_change(&self, cluster_id: impl Into<Strng>, service: impl Into<Strng>, namespace: impl Into<Strng>, endpoints: Vec<IstioEndpoint>) {
		self.metrics.record_endpoint_update();
		let service = service.into();
		let namespace = namespace.into();

		let full = self.index.upsert_shard(cluster_id, service.clone(), namespace.clone(), endpoints);

		let mut configs = HashSet::new();
		configs.insert(ConfigKey {
			kind: ConfigKind::ServiceEntry,
			name: service,
			namespace,
		});
		self.scheduler.schedule(PushIntent {
			full,
			configs,
			reason: strng::new("endpoint-update"),
		});
	}

	/// Same as [`Self::report_endpoint_change`] but never emits a push
	/// intent. Used by [`crate::registry::RegistryAggregator`]'s
	/// reconciliation scans, which already know they're refreshing cached
	/// state rather than reacting to a live change.
	pub fn report_endpoint_change_cache_only(&self, cluster_id: impl Into<Strng>, service: impl Into<Strng>, namespace: impl Into<Strng>, endpoints: Vec<IstioEndpoint>) {
		self.metrics.record_endpoint_update();
		self.index.upsert_shard(cluster_id, service, namespace, endpoints);
	}
}
