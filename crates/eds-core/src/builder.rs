//! Per-cluster view materialization: filter the index by subset and locality,
//! group by locality, weight, and hand back a [`LoadAssignment`].

use std::collections::HashMap;

use crate::cluster_name::ClusterName;
use crate::config::PushContext;
use crate::errors::ClusterNameError;
use crate::index::EndpointIndex;
use crate::locality::HostStatusFilter;
use crate::metrics::Metrics;
use crate::model::{HealthStatus, Locality, ProxyEndpoint};
use crate::strng::Strng;

/// Identity and placement of a connected data-plane proxy.
#[derive(Debug, Clone, PartialEq)]
pub struct Proxy {
	pub id: Strng,
	pub locality: Locality,
	pub cluster_id: Strng,
	pub network: Strng,
	pub labels: HashMap<Strng, Strng>,
}

/// One locality's worth of endpoints within a [`LoadAssignment`]: the
/// hierarchical locality label, its member endpoints, the aggregate weight
/// (sum of member weights), and a priority set only by
/// [`crate::locality::LocalityPolicyEngine`].
#[derive(Debug, Clone, PartialEq)]
pub struct LocalityLbEndpoints {
	pub locality: Locality,
	pub endpoints: Vec<ProxyEndpoint>,
	pub weight: u32,
	pub priority: u32,
}

/// The materialized, cacheable, per-proxy-class view of one cluster.
///
/// Shared read-only across every proxy consuming this cluster; callers that
/// need to mutate it (locality policy) must clone first.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadAssignment {
	pub cluster_name: Strng,
	pub locality_groups: Vec<LocalityLbEndpoints>,
}

impl LoadAssignment {
	fn empty(cluster_name: Strng) -> Self {
		Self {
			cluster_name,
			locality_groups: Vec::new(),
		}
	}
}

/// The result of [`EndpointBuilder::build_assignment`]. `Skip` corresponds to
/// `null` in the wire protocol: the caller must drop this cluster from the
/// response entirely rather than emit an empty resource for it.
#[derive(Debug, Clone, PartialEq)]
pub enum BuildOutcome {
	Assignment(LoadAssignment),
	Empty(LoadAssignment),
	Skip,
}

/// Stateless, constructed fresh for each (clusterName, proxy, push snapshot)
/// triple.
pub struct EndpointBuilder<'a> {
	cluster_name: Strng,
	parsed: Result<ClusterName, ClusterNameError>,
	proxy: &'a Proxy,
	push: &'a PushContext,
	index: &'a EndpointIndex,
	metrics: Option<&'a Metrics>,
}

impl<'a> EndpointBuilder<'a> {
	pub fn new(cluster_name: impl Into<Strng>, proxy: &'a Proxy, push: &'a PushContext, index: &'a EndpointIndex, metrics: Option<&'a Metrics>) -> Self {
		let cluster_name = cluster_name.into();
		let parsed = ClusterName::parse(&cluster_name);
		Self {
			cluster_name,
			parsed,
			proxy,
			push,
			index,
			metrics,
		}
	}

	pub fn build_assignment(&self) -> BuildOutcome {
		let parsed = match &self.parsed {
			Ok(p) => p,
			Err(err) => {
				tracing::debug!(cluster = %self.cluster_name, error = %err, "invalid cluster name, returning no assignment");
				return BuildOutcome::Empty(LoadAssignment::empty(self.cluster_name.clone()));
			}
		};

		let Some(service) = self.push.find_service(&parsed.hostname) else {
			return BuildOutcome::Empty(LoadAssignment::empty(self.cluster_name.clone()));
		};

		if service.resolution == crate::config::Resolution::Dns {
			return BuildOutcome::Skip;
		}

		if service.port_by_number(parsed.port).is_none() {
			return BuildOutcome::Empty(LoadAssignment::empty(self.cluster_name.clone()));
		}

		let Some(shard) = self.index.read_shards(&parsed.hostname, &service.namespace) else {
			return BuildOutcome::Empty(LoadAssignment::empty(self.cluster_name.clone()));
		};

		let rule = self.push.find_destination_rule(&parsed.hostname);
		let subset = rule.and_then(|r| r.subset(&parsed.subset));
		let label_filter = rule.map(|r| r.effective_labels(subset)).unwrap_or_default();
		let is_cluster_local = self.push.mesh.is_cluster_local(service);
		let host_status_filter = self
			.push
			.resolve_traffic_policy(&parsed.hostname, &parsed.subset)
			.map(|p| p.host_status_filter)
			.unwrap_or_default();

		let mut groups: HashMap<Locality, Vec<ProxyEndpoint>> = HashMap::new();
		{
			let mut inner = shard.lock();
			for (cluster_id, endpoints) in inner.shards.iter_mut() {
				if is_cluster_local && cluster_id != &self.proxy.cluster_id {
					continue;
				}
				for ep in endpoints.iter_mut() {
					if ep.service_port_name != parsed_port_name(service, parsed.port) {
						continue;
					}
					if !ep.matches_subset(&label_filter) {
						continue;
					}
					if host_status_filter == HostStatusFilter::HealthyOnly && ep.health_status != HealthStatus::Healthy {
						continue;
					}
					let locality = ep.locality.clone();
					let materialized = ep.materialize().clone();
					groups.entry(locality).or_default().push(materialized);
				}
			}
		}

		if groups.is_empty() {
			if let Some(metrics) = self.metrics {
				metrics.record_no_instances(&self.cluster_name);
			}
			return BuildOutcome::Empty(LoadAssignment::empty(self.cluster_name.clone()));
		}

		let locality_groups = groups
			.into_iter()
			.map(|(locality, endpoints)| {
				let weight = endpoints.iter().map(|e| e.weight).sum();
				LocalityLbEndpoints {
					locality,
					endpoints,
					weight,
					priority: 0,
				}
			})
			.collect();

		BuildOutcome::Assignment(LoadAssignment {
			cluster_name: self.cluster_name.clone(),
			locality_groups,
		})
	}
}

/// Service-port-name lookup by port number; falls back to the port number's
/// string form when the service's port metadata doesn't carry a name, which
/// keeps the comparison total rather than `Option`-shaped.
fn parsed_port_name(service: &crate::config::Service, port: u16) -> Strng {
	service
		.port_by_number(port)
		.map(|p| p.name.clone())
		.unwrap_or_else(|| crate::strng::format!("{port}"))
}
