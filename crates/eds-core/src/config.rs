//! Read-only configuration snapshots passed in with each push, plus the
//! mesh-wide configuration file format.
//!
//! `Service`, `Port`, `DestinationRule` and `Subset` are owned by the
//! surrounding control plane's config store; the EDS core only ever borrows
//! them for the duration of a single build. `MeshConfig` is the on-disk
//! mesh-wide settings document, loaded once at startup and reloaded by the
//! outer process on SIGHUP (not this crate's concern).

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

use crate::locality::TrafficPolicy;
use crate::strng::Strng;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
	pub name: Strng,
	pub number: u16,
	/// e.g. "TCP", "HTTP", "UDP". Used by [`crate::registry`] to skip
	/// connectionless ports during reconciliation.
	pub protocol: Strng,
}

impl Port {
	pub fn is_connectionless(&self) -> bool {
		self.protocol.eq_ignore_ascii_case("udp")
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Resolution {
	#[default]
	ClientSideLb,
	Dns,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
	pub hostname: Strng,
	pub namespace: Strng,
	pub ports: Vec<Port>,
	pub resolution: Resolution,
	/// Overrides `MeshConfig::cluster_local_hosts` for this one service, when
	/// set. `None` defers to the mesh-wide policy.
	pub cluster_local_override: Option<bool>,
}

impl Service {
	pub fn port_by_number(&self, number: u16) -> Option<&Port> {
		self.ports.iter().find(|p| p.number == number)
	}
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Subset {
	pub name: Strng,
	pub labels: HashMap<Strng, Strng>,
	pub traffic_policy: Option<TrafficPolicy>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DestinationRule {
	pub host: Strng,
	/// Labels applied to every subset unless overridden by the subset itself.
	pub labels: HashMap<Strng, Strng>,
	pub traffic_policy: Option<TrafficPolicy>,
	pub subsets: Vec<Subset>,
}

impl DestinationRule {
	pub fn subset(&self, name: &str) -> Option<&Subset> {
		self.subsets.iter().find(|s| s.name == name)
	}

	/// Merges the rule's top-level labels with `subset`'s own, subset wins.
	pub fn effective_labels(&self, subset: Option<&Subset>) -> HashMap<Strng, Strng> {
		let mut labels = self.labels.clone();
		if let Some(subset) = subset {
			labels.extend(subset.labels.clone());
		}
		labels
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayAddress {
	pub address: Strng,
	pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NetworkGateways {
	pub gateways: Vec<GatewayAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MeshNetworks {
	pub networks: HashMap<Strng, NetworkGateways>,
}

impl MeshNetworks {
	pub fn is_multi_network(&self) -> bool {
		self.networks.len() > 1
	}

	pub fn gateways_for(&self, network: &str) -> &[GatewayAddress] {
		self
			.networks
			.get(network)
			.map(|g| g.gateways.as_slice())
			.unwrap_or_default()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
	pub name: Strng,
	/// Primary registries push endpoint changes inline; non-primary ones are
	/// polled by [`crate::registry::RegistryAggregator`].
	pub primary: bool,
}

/// The mesh-wide configuration document, loaded from YAML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MeshConfig {
	#[serde(default)]
	pub networks: MeshNetworks,
	#[serde(default)]
	pub cluster_local_hosts: HashSet<Strng>,
	#[serde(default)]
	pub default_traffic_policy: Option<TrafficPolicy>,
	#[serde(default)]
	pub registries: Vec<RegistryConfig>,
}

impl MeshConfig {
	pub fn is_cluster_local(&self, service: &Service) -> bool {
		service
			.cluster_local_override
			.unwrap_or_else(|| self.cluster_local_hosts.contains(&service.hostname))
	}

	pub fn non_primary_registries(&self) -> impl Iterator<Item = &RegistryConfig> {
		self.registries.iter().filter(|r| !r.primary)
	}
}

/// Loads and validates a [`MeshConfig`] document from `path`.
///
/// Parse errors are reported with the full field path via
/// `serde_path_to_error`.
pub fn parse_config(path: impl AsRef<Path>) -> anyhow::Result<MeshConfig> {
	let path = path.as_ref();
	let raw = std::fs::read_to_string(path)
		.with_context(|| format!("failed to read mesh config at {}", path.display()))?;
	let deserializer = serde_yaml::Deserializer::from_str(&raw);
	serde_path_to_error::deserialize(deserializer)
		.with_context(|| format!("failed to parse mesh config at {}", path.display()))
}

/// A read-only snapshot of control-plane config handed to every build in one
/// push cycle: the set of known services and destination rules, plus the
/// mesh config in effect. Cheap to clone -- everything inside is an `Arc`.
#[derive(Debug, Clone, Default)]
pub struct PushContext {
	services: HashMap<Strng, Arc<Service>>,
	destination_rules: HashMap<Strng, Arc<DestinationRule>>,
	pub mesh: Arc<MeshConfig>,
}

impl PushContext {
	pub fn new(mesh: Arc<MeshConfig>) -> Self {
		Self {
			services: HashMap::new(),
			destination_rules: HashMap::new(),
			mesh,
		}
	}

	pub fn with_service(mut self, service: Service) -> Self {
		self.services.insert(service.hostname.clone(), Arc::new(service));
		self
	}

	pub fn with_destination_rule(mut self, rule: DestinationRule) -> Self {
		self
			.destination_rules
			.insert(rule.host.clone(), Arc::new(rule));
		self
	}

	pub fn find_service(&self, hostname: &str) -> Option<&Arc<Service>> {
		self.services.get(hostname)
	}

	/// Merges mesh-default, destination-rule top-level, and subset-specific
	/// traffic policy for `hostname`/`subset_name`, last-wins.
	pub fn resolve_traffic_policy(&self, hostname: &str, subset_name: &str) -> Option<TrafficPolicy> {
		let rule = self.find_destination_rule(hostname);
		let subset = rule.and_then(|r| r.subset(subset_name));
		TrafficPolicy::merge(self.mesh.default_traffic_policy.as_ref(), rule.map(|r| &r.traffic_policy).and_then(|p| p.as_ref()), subset.and_then(|s| s.traffic_policy.as_ref()))
	}

	pub fn find_destination_rule(&self, hostname: &str) -> Option<&Arc<DestinationRule>> {
		self.destination_rules.get(hostname)
	}

	pub fn services(&self) -> impl Iterator<Item = &Arc<Service>> {
		self.services.values()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cluster_local_override_beats_mesh_default() {
		let mut mesh = MeshConfig::default();
		mesh.cluster_local_hosts.insert(Strng::from("reviews.bookinfo.svc.cluster.local"));

		let svc = Service {
			hostname: Strng::from("reviews.bookinfo.svc.cluster.local"),
			namespace: Strng::from("bookinfo"),
			ports: vec![],
			resolution: Resolution::ClientSideLb,
			cluster_local_override: Some(false),
		};
		assert!(!mesh.is_cluster_local(&svc));
	}

	#[test]
	fn mesh_default_applies_when_no_override() {
		let mut mesh = MeshConfig::default();
		mesh.cluster_local_hosts.insert(Strng::from("reviews.bookinfo.svc.cluster.local"));

		let svc = Service {
			hostname: Strng::from("reviews.bookinfo.svc.cluster.local"),
			namespace: Strng::from("bookinfo"),
			ports: vec![],
			resolution: Resolution::ClientSideLb,
			cluster_local_override: None,
		};
		assert!(mesh.is_cluster_local(&svc));
	}

	#[test]
	fn parse_config_reports_path_on_bad_yaml() {
		let dir = std::env::temp_dir().join(format!("eds-core-test-{}", std::process::id()));
		std::fs::create_dir_all(&dir).unwrap();
		let path = dir.join("mesh.yaml");
		std::fs::write(&path, "networks: [this-should-be-a-map]").unwrap();
		let err = parse_config(&path).unwrap_err();
		assert!(format!("{err:#}").contains("mesh.yaml"));
		let _ = std::fs::remove_dir_all(&dir);
	}
}
