//! Hand-derived wire messages for the `ClusterLoadAssignment` resource and
//! its enclosing `DiscoveryResponse`. There is no `.proto` source or
//! `build.rs` codegen step here -- the handful of fields EDS actually needs
//! are derived directly, the way a small internal resource type in the
//! teacher's codebase would be.

use prost::Message;

use eds_core::{EndpointMetadata as CoreMetadata, LoadAssignment, Locality as CoreLocality, TlsMode};

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Locality {
	#[prost(string, tag = "1")]
	pub region: String,
	#[prost(string, tag = "2")]
	pub zone: String,
	#[prost(string, tag = "3")]
	pub sub_zone: String,
}

impl From<&CoreLocality> for Locality {
	fn from(l: &CoreLocality) -> Self {
		Locality {
			region: l.region.to_string(),
			zone: l.zone.to_string(),
			sub_zone: l.subzone.to_string(),
		}
	}
}

#[derive(Clone, PartialEq, Eq, Message)]
pub struct Metadata {
	#[prost(string, tag = "1")]
	pub network: String,
	#[prost(string, tag = "2")]
	pub tls_mode: String,
}

impl From<&CoreMetadata> for Metadata {
	fn from(m: &CoreMetadata) -> Self {
		Metadata {
			network: m.network.to_string(),
			tls_mode: tls_mode_str(m.tls_mode).to_string(),
		}
	}
}

fn tls_mode_str(mode: TlsMode) -> &'static str {
	match mode {
		TlsMode::Disabled => "DISABLE",
		TlsMode::Simple => "SIMPLE",
		TlsMode::IstioMutual => "ISTIO_MUTUAL",
	}
}

#[derive(Clone, PartialEq, Message)]
pub struct Endpoint {
	#[prost(string, tag = "1")]
	pub address: String,
	#[prost(uint32, tag = "2")]
	pub port: u32,
	#[prost(message, optional, tag = "3")]
	pub metadata: Option<Metadata>,
}

#[derive(Clone, PartialEq, Message)]
pub struct LbEndpoint {
	#[prost(message, optional, tag = "1")]
	pub endpoint: Option<Endpoint>,
	#[prost(uint32, tag = "2")]
	pub load_balancing_weight: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct LocalityLbEndpoints {
	#[prost(message, optional, tag = "1")]
	pub locality: Option<Locality>,
	#[prost(message, repeated, tag = "2")]
	pub lb_endpoints: Vec<LbEndpoint>,
	#[prost(uint32, tag = "3")]
	pub load_balancing_weight: u32,
	#[prost(uint32, tag = "4")]
	pub priority: u32,
}

#[derive(Clone, PartialEq, Message)]
pub struct ClusterLoadAssignment {
	#[prost(string, tag = "1")]
	pub cluster_name: String,
	#[prost(message, repeated, tag = "2")]
	pub endpoints: Vec<LocalityLbEndpoints>,
}

impl From<&LoadAssignment> for ClusterLoadAssignment {
	fn from(a: &LoadAssignment) -> Self {
		ClusterLoadAssignment {
			cluster_name: a.cluster_name.to_string(),
			endpoints: a
				.locality_groups
				.iter()
				.map(|group| LocalityLbEndpoints {
					locality: Some((&group.locality).into()),
					lb_endpoints: group
						.endpoints
						.iter()
						.map(|ep| LbEndpoint {
							endpoint: Some(Endpoint {
								address: ep.address.to_string(),
								port: ep.port as u32,
								metadata: Some((&ep.metadata).into()),
							}),
							load_balancing_weight: ep.weight,
						})
						.collect(),
					load_balancing_weight: group.weight,
					priority: group.priority,
				})
				.collect(),
		}
	}
}

#[derive(Clone, PartialEq, Message)]
pub struct DiscoveryResponse {
	#[prost(string, tag = "1")]
	pub type_url: String,
	#[prost(string, tag = "2")]
	pub version_info: String,
	#[prost(string, tag = "3")]
	pub nonce: String,
	#[prost(message, repeated, tag = "4")]
	pub resources: Vec<ClusterLoadAssignment>,
}

impl From<&eds_core::DiscoveryResponse> for DiscoveryResponse {
	fn from(r: &eds_core::DiscoveryResponse) -> Self {
		DiscoveryResponse {
			type_url: r.type_url.to_string(),
			version_info: r.version.to_string(),
			nonce: r.nonce.to_string(),
			resources: r.resources.iter().map(ClusterLoadAssignment::from).collect(),
		}
	}
}
