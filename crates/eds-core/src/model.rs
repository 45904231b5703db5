//! The data model shared by every component: one network endpoint
//! ([`IstioEndpoint`]), its locality placement, and the lazily materialized
//! wire-shape endpoint the builder hands out ([`ProxyEndpoint`]).

use std::fmt;
use std::str::FromStr;

use crate::strng::{self, Strng};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum TlsMode {
	#[default]
	Disabled,
	Simple,
	IstioMutual,
}

/// Registry-reported endpoint health. An `Unhealthy` endpoint is dropped
/// from a built assignment unless the cluster's traffic policy overrides
/// host-status filtering to include it anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum HealthStatus {
	#[default]
	Healthy,
	Unhealthy,
	Draining,
}

/// Hierarchical placement label `region/zone/sub-zone`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub struct Locality {
	pub region: Strng,
	pub zone: Strng,
	pub subzone: Strng,
}

impl Locality {
	pub fn is_empty(&self) -> bool {
		self.region.is_empty() && self.zone.is_empty() && self.subzone.is_empty()
	}

	/// Region-only match: used by failover priority ordering.
	pub fn region_matches(&self, other: &Locality) -> bool {
		!self.region.is_empty() && self.region == other.region
	}

	pub fn zone_matches(&self, other: &Locality) -> bool {
		self.region_matches(other) && self.zone == other.zone
	}

	pub fn subzone_matches(&self, other: &Locality) -> bool {
		self.zone_matches(other) && self.subzone == other.subzone
	}
}

impl FromStr for Locality {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let mut parts = s.splitn(3, '/');
		Ok(Locality {
			region: strng::new(parts.next().unwrap_or_default()),
			zone: strng::new(parts.next().unwrap_or_default()),
			subzone: strng::new(parts.next().unwrap_or_default()),
		})
	}
}

impl fmt::Display for Locality {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}/{}", self.region, self.zone, self.subzone)
	}
}

/// One network endpoint contributed by a registry shard.
///
/// `proxy_endpoint` is the memoized, materialized wire representation. It is
/// only ever read or written while the owning shard's mutex is held, and it
/// is always built fresh (starts `None`) on a brand-new `IstioEndpoint`
/// value -- since `EndpointIndex::upsert_shard` replaces a clusterID's whole
/// endpoint list wholesale rather than mutating fields in place, there is no
/// separate invalidation path to get wrong: a changed address/port/network/
/// tls_mode simply arrives as a new `IstioEndpoint` with a fresh `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct IstioEndpoint {
	pub address: Strng,
	pub port: u16,
	pub service_port_name: Strng,
	pub locality: Locality,
	pub service_account: Option<Strng>,
	pub network: Strng,
	pub tls_mode: TlsMode,
	pub labels: std::collections::HashMap<Strng, Strng>,
	/// 0 is materialized as 1; see [`IstioEndpoint::effective_weight`].
	pub weight: u32,
	pub health_status: HealthStatus,
	proxy_endpoint: Option<ProxyEndpoint>,
}

impl IstioEndpoint {
	pub fn new(address: impl Into<Strng>, port: u16, service_port_name: impl Into<Strng>) -> Self {
		Self {
			address: address.into(),
			port,
			service_port_name: service_port_name.into(),
			locality: Locality::default(),
			service_account: None,
			network: Strng::default(),
			tls_mode: TlsMode::default(),
			labels: Default::default(),
			weight: 0,
			health_status: HealthStatus::default(),
			proxy_endpoint: None,
		}
	}

	pub fn with_locality(mut self, locality: Locality) -> Self {
		self.locality = locality;
		self
	}

	pub fn with_service_account(mut self, sa: impl Into<Strng>) -> Self {
		self.service_account = Some(sa.into());
		self
	}

	pub fn with_network(mut self, network: impl Into<Strng>) -> Self {
		self.network = network.into();
		self
	}

	pub fn with_tls_mode(mut self, mode: TlsMode) -> Self {
		self.tls_mode = mode;
		self
	}

	pub fn with_labels(mut self, labels: std::collections::HashMap<Strng, Strng>) -> Self {
		self.labels = labels;
		self
	}

	pub fn with_weight(mut self, weight: u32) -> Self {
		self.weight = weight;
		self
	}

	pub fn with_health_status(mut self, status: HealthStatus) -> Self {
		self.health_status = status;
		self
	}

	pub fn effective_weight(&self) -> u32 {
		if self.weight == 0 { 1 } else { self.weight }
	}

	/// Checks whether `filter` (destination-rule subset labels) is satisfied
	/// by this endpoint's labels -- every key in `filter` must be present in
	/// `self.labels` with an equal value.
	pub fn matches_subset(&self, filter: &std::collections::HashMap<Strng, Strng>) -> bool {
		filter
			.iter()
			.all(|(k, v)| self.labels.get(k).is_some_and(|lv| lv == v))
	}

	/// Returns the memoized wire representation, building it on first access.
	/// Callers must already hold the owning shard's mutex.
	pub fn materialize(&mut self) -> &ProxyEndpoint {
		if self.proxy_endpoint.is_none() {
			self.proxy_endpoint = Some(ProxyEndpoint {
				address: self.address.clone(),
				port: self.port,
				weight: self.effective_weight(),
				metadata: EndpointMetadata {
					network: self.network.clone(),
					tls_mode: self.tls_mode,
				},
			});
		}
		self.proxy_endpoint.as_ref().expect("just populated")
	}
}

/// The lazily-built wire-shape endpoint: socket address, weight, and the
/// metadata the data plane needs (network name, TLS transport-socket mode).
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct ProxyEndpoint {
	pub address: Strng,
	pub port: u16,
	pub weight: u32,
	pub metadata: EndpointMetadata,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct EndpointMetadata {
	pub network: Strng,
	pub tls_mode: TlsMode,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn locality_parses_three_segments() {
		let l: Locality = "region1/zone1/subzone1".parse().unwrap();
		assert_eq!(l.region, "region1");
		assert_eq!(l.zone, "zone1");
		assert_eq!(l.subzone, "subzone1");
	}

	#[test]
	fn locality_tolerates_missing_segments() {
		let l: Locality = "region1".parse().unwrap();
		assert_eq!(l.region, "region1");
		assert_eq!(l.zone, "");
		assert_eq!(l.subzone, "");
	}

	#[test]
	fn weight_zero_materializes_as_one() {
		let mut ep = IstioEndpoint::new("10.0.0.1", 80, "http").with_weight(0);
		assert_eq!(ep.materialize().weight, 1);
	}

	#[test]
	fn weight_nonzero_is_preserved() {
		let mut ep = IstioEndpoint::new("10.0.0.1", 80, "http").with_weight(5);
		assert_eq!(ep.materialize().weight, 5);
	}

	#[test]
	fn subset_filter_requires_all_keys() {
		let mut labels = std::collections::HashMap::new();
		labels.insert(strng::new("version"), strng::new("v1"));
		let ep = IstioEndpoint::new("10.0.0.1", 80, "http").with_labels(labels);

		let mut filter = std::collections::HashMap::new();
		filter.insert(strng::new("version"), strng::new("v1"));
		assert!(ep.matches_subset(&filter));

		filter.insert(strng::new("env"), strng::new("prod"));
		assert!(!ep.matches_subset(&filter));
	}
}
