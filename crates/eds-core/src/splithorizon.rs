//! Cross-network endpoint filtering and gateway substitution.
//!
//! Runs before [`crate::locality::LocalityPolicyEngine`] in the push
//! pipeline. A no-op unless the mesh declares more than one network.

use crate::builder::LoadAssignment;
use crate::config::MeshNetworks;
use crate::model::ProxyEndpoint;
use crate::strng::Strng;

#[derive(Debug, Default, Clone, Copy)]
pub struct SplitHorizonFilter;

impl SplitHorizonFilter {
	pub fn new() -> Self {
		Self
	}

	/// Drops endpoints on networks unreachable from `proxy_network`, and
	/// substitutes a mesh network gateway address for endpoints whose own
	/// network differs from the proxy's but has a configured gateway.
	pub fn apply(&self, assignment: &LoadAssignment, proxy_network: &str, networks: &MeshNetworks) -> LoadAssignment {
		if !networks.is_multi_network() {
			return assignment.clone();
		}

		let mut out = assignment.clone();
		for group in &mut out.locality_groups {
			group.endpoints = group
				.endpoints
				.drain(..)
				.filter_map(|ep| self.reach(ep, proxy_network, networks))
				.collect();
			group.weight = group.endpoints.iter().map(|e| e.weight).sum();
		}
		out.locality_groups.retain(|g| !g.endpoints.is_empty());
		out
	}

	fn reach(&self, mut ep: ProxyEndpoint, proxy_network: &str, networks: &MeshNetworks) -> Option<ProxyEndpoint> {
		if ep.metadata.network.is_empty() || ep.metadata.network == proxy_network {
			return Some(ep);
		}

		let gateways = networks.gateways_for(&ep.metadata.network);
		let gateway = gateways.first()?;
		ep.address = Strng::from(gateway.address.as_str());
		ep.port = gateway.port;
		Some(ep)
	}
}
