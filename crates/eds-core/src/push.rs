//! Per-connection push: iterate a proxy's subscribed clusters, build each
//! one's assignment, package into a discovery response, and send.

use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::time::Instant;

use crate::builder::{BuildOutcome, EndpointBuilder, LoadAssignment, Proxy};
use crate::cluster_name::ClusterName;
use crate::config::PushContext;
use crate::errors::PushError;
use crate::index::EndpointIndex;
use crate::locality::LocalityPolicyEngine;
use crate::metrics::Metrics;
use crate::splithorizon::SplitHorizonFilter;
use crate::strng::{self, Strng};

pub const ENDPOINT_TYPE_URL: &str = "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

/// A single data-plane proxy's live subscription state.
#[derive(Debug, Clone, PartialEq)]
pub struct Subscription {
	pub proxy: Proxy,
	/// Cluster names the proxy is watching, each encoding `subset|hostname|port`.
	pub watched_clusters: HashSet<Strng>,
	pub last_sent_version: Option<Strng>,
}

/// Abstraction over the outer xDS transport. The core never retries a send
/// failure; the transport layer owns retry policy.
pub trait Connection: Send + Sync {
	fn id(&self) -> &str;
	fn send(&self, response: DiscoveryResponse) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryResponse {
	pub type_url: Strng,
	pub version: Strng,
	pub nonce: Strng,
	pub resources: Vec<LoadAssignment>,
}

/// Derives a nonce deterministically from the push snapshot's version, so
/// that repeated pushes of the same version produce the same nonce. Opaque
/// to callers.
fn derive_nonce(version: &str) -> Strng {
	let mut hasher = std::collections::hash_map::DefaultHasher::new();
	version.hash(&mut hasher);
	strng::format!("{:016x}", hasher.finish())
}

pub struct PushLoop<'a> {
	index: &'a EndpointIndex,
	push: &'a PushContext,
	metrics: &'a Metrics,
	locality_engine: LocalityPolicyEngine,
	split_horizon: SplitHorizonFilter,
}

impl<'a> PushLoop<'a> {
	pub fn new(index: &'a EndpointIndex, push: &'a PushContext, metrics: &'a Metrics) -> Self {
		Self {
			index,
			push,
			metrics,
			locality_engine: LocalityPolicyEngine::new(),
			split_horizon: SplitHorizonFilter::new(),
		}
	}

	/// Pushes to `connection`. When `updated_services` is `Some`, only
	/// clusters whose hostname is in the set are considered -- this realizes
	/// an incremental push. Build work happens entirely before the send; no
	/// index or shard lock is held across the connection write.
	pub fn push(&self, connection: &dyn Connection, subscription: &Subscription, version: &str, updated_services: Option<&HashSet<Strng>>) -> Result<(), PushError> {
		let start = Instant::now();
		let mut resources = Vec::new();
		let mut total_endpoints: u64 = 0;

		for cluster_name in &subscription.watched_clusters {
			if let Some(updated) = updated_services {
				match ClusterName::parse(cluster_name) {
					Ok(parsed) if updated.contains(&parsed.hostname) => {}
					_ => continue,
				}
			}

			let builder = EndpointBuilder::new(cluster_name.clone(), &subscription.proxy, self.push, self.index, Some(self.metrics));
			let assignment = match builder.build_assignment() {
				BuildOutcome::Skip => continue,
				BuildOutcome::Empty(a) => a,
				BuildOutcome::Assignment(a) => self.finish_assignment(a, cluster_name, &subscription.proxy),
			};
			total_endpoints += assignment.locality_groups.iter().map(|g| g.endpoints.len() as u64).sum::<u64>();
			resources.push(assignment);
		}

		let response = DiscoveryResponse {
			type_url: strng::new(ENDPOINT_TYPE_URL),
			version: strng::new(version),
			nonce: derive_nonce(version),
			resources,
		};

		match connection.send(response) {
			Ok(()) => {
				self.metrics.record_push(start.elapsed().as_secs_f64(), total_endpoints);
				Ok(())
			}
			Err(source) => {
				self.metrics.record_send_error(connection.id());
				Err(PushError::SendFailed {
					connection_id: strng::new(connection.id()),
					source,
				})
			}
		}
	}

	fn finish_assignment(&self, assignment: LoadAssignment, cluster_name: &str, proxy: &Proxy) -> LoadAssignment {
		let filtered = self.split_horizon.apply(&assignment, &proxy.network, &self.push.mesh.networks);
		let ClusterName { subset, hostname, .. } = match ClusterName::parse(cluster_name) {
			Ok(parsed) => parsed,
			Err(_) => return filtered,
		};
		let policy = self.push.resolve_traffic_policy(&hostname, &subset);
		self.locality_engine.apply(&filtered, &proxy.locality, policy.as_ref())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{MeshConfig, Port, Resolution, Service};
	use crate::model::{IstioEndpoint, Locality};
	use std::sync::{Arc, Mutex};

	struct RecordingConnection {
		id: String,
		fail: bool,
		sent: Mutex<Vec<DiscoveryResponse>>,
	}

	impl Connection for RecordingConnection {
		fn id(&self) -> &str {
			&self.id
		}

		fn send(&self, response: DiscoveryResponse) -> anyhow::Result<()> {
			if self.fail {
				anyhow::bail!("simulated transport failure");
			}
			self.sent.lock().unwrap().push(response);
			Ok(())
		}
	}

	fn service() -> Service {
		Service {
			hostname: Strng::from("reviews.bookinfo.svc.cluster.local"),
			namespace: Strng::from("bookinfo"),
			ports: vec![Port {
				name: Strng::from("http"),
				number: 9080,
				protocol: Strng::from("TCP"),
			}],
			resolution: Resolution::ClientSideLb,
			cluster_local_override: None,
		}
	}

	fn proxy() -> Proxy {
		Proxy {
			id: Strng::from("sidecar~10.0.0.9~reviews-v1~bookinfo"),
			locality: Locality::default(),
			cluster_id: Strng::from("c1"),
			network: Strng::default(),
			labels: Default::default(),
		}
	}

	#[test]
	fn push_sends_built_assignments() {
		let index = EndpointIndex::new();
		index.upsert_shard("c1", "reviews.bookinfo.svc.cluster.local", "bookinfo", vec![IstioEndpoint::new("10.0.0.1", 9080, "http")]);
		let mut registry = prometheus_client::registry::Registry::default();
		let metrics = Metrics::new(&mut registry);
		let push_ctx = PushContext::new(Arc::new(MeshConfig::default())).with_service(service());
		let push_loop = PushLoop::new(&index, &push_ctx, &metrics);

		let mut watched = HashSet::new();
		watched.insert(Strng::from("outbound|9080||reviews.bookinfo.svc.cluster.local"));
		let subscription = Subscription {
			proxy: proxy(),
			watched_clusters: watched,
			last_sent_version: None,
		};

		let connection = RecordingConnection {
			id: "conn-1".into(),
			fail: false,
			sent: Mutex::new(Vec::new()),
		};
		push_loop.push(&connection, &subscription, "v1", None).unwrap();

		let sent = connection.sent.lock().unwrap();
		assert_eq!(sent.len(), 1);
		assert_eq!(sent[0].resources.len(), 1);
		assert_eq!(sent[0].type_url, ENDPOINT_TYPE_URL);
	}

	#[test]
	fn incremental_push_skips_clusters_outside_update_set() {
		let index = EndpointIndex::new();
		index.upsert_shard("c1", "reviews.bookinfo.svc.cluster.local", "bookinfo", vec![IstioEndpoint::new("10.0.0.1", 9080, "http")]);
		let mut registry = prometheus_client::registry::Registry::default();
		let metrics = Metrics::new(&mut registry);
		let push_ctx = PushContext::new(Arc::new(MeshConfig::default())).with_service(service());
		let push_loop = PushLoop::new(&index, &push_ctx, &metrics);

		let mut watched = HashSet::new();
		watched.insert(Strng::from("outbound|9080||reviews.bookinfo.svc.cluster.local"));
		let subscription = Subscription {
			proxy: proxy(),
			watched_clusters: watched,
			last_sent_version: None,
		};

		let connection = RecordingConnection {
			id: "conn-1".into(),
			fail: false,
			sent: Mutex::new(Vec::new()),
		};
		let updated: HashSet<Strng> = HashSet::from([Strng::from("ratings.bookinfo.svc.cluster.local")]);
		push_loop.push(&connection, &subscription, "v1", Some(&updated)).unwrap();

		let sent = connection.sent.lock().unwrap();
		assert_eq!(sent[0].resources.len(), 0);
	}

	#[test]
	fn send_failure_records_error_and_returns_it() {
		let index = EndpointIndex::new();
		let mut registry = prometheus_client::registry::Registry::default();
		let metrics = Metrics::new(&mut registry);
		let push_ctx = PushContext::new(Arc::new(MeshConfig::default()));
		let push_loop = PushLoop::new(&index, &push_ctx, &metrics);

		let subscription = Subscription {
			proxy: proxy(),
			watched_clusters: HashSet::new(),
			last_sent_version: None,
		};
		let connection = RecordingConnection {
			id: "conn-1".into(),
			fail: true,
			sent: Mutex::new(Vec::new()),
		};
		let err = push_loop.push(&connection, &subscription, "v1", None);
		assert!(matches!(err, Err(PushError::SendFailed { .. })));
	}

	#[test]
	fn nonce_is_deterministic_for_the_same_version() {
		assert_eq!(derive_nonce("v42"), derive_nonce("v42"));
		assert_ne!(derive_nonce("v42"), derive_nonce("v43"));
	}
}
