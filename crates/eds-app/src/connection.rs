//! A logging-only [`eds_core::Connection`] used until the real delta-xDS
//! gRPC transport is wired in. Encodes each response through `eds_xds`'s
//! wire types so the encode path is exercised even without a live connection.

use eds_core::{Connection, DiscoveryResponse};
use prost::Message as _;
use tracing::debug;

pub struct LoggingConnection {
	id: String,
}

impl LoggingConnection {
	pub fn new(id: impl Into<String>) -> Self {
		Self { id: id.into() }
	}
}

impl Connection for LoggingConnection {
	fn id(&self) -> &str {
		&self.id
	}

	fn send(&self, response: DiscoveryResponse) -> anyhow::Result<()> {
		let wire = eds_xds::DiscoveryResponse::from(&response);
		let bytes = wire.encode_to_vec();
		debug!(connection = %self.id, resources = wire.resources.len(), bytes = bytes.len(), "would send discovery response");
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use eds_core::config::{MeshConfig, PushContext};
	use eds_core::{EndpointIndex, Metrics, PushLoop, Subscription};
	use std::collections::HashSet;
	use std::sync::Arc;

	#[test]
	fn push_through_logging_connection_succeeds_with_no_subscriptions() {
		let index = EndpointIndex::new();
		let mut registry = prometheus_client::registry::Registry::default();
		let metrics = Metrics::new(&mut registry);
		let push_ctx = PushContext::new(Arc::new(MeshConfig::default()));
		let push_loop = PushLoop::new(&index, &push_ctx, &metrics);

		let subscription = Subscription {
			proxy: eds_core::Proxy {
				id: eds_core::Strng::from("test-proxy"),
				locality: eds_core::Locality::default(),
				cluster_id: eds_core::Strng::from("c1"),
				network: eds_core::Strng::default(),
				labels: Default::default(),
			},
			watched_clusters: HashSet::new(),
			last_sent_version: None,
		};

		let connection = LoggingConnection::new("conn-1");
		push_loop.push(&connection, &subscription, "v1", None).unwrap();
	}
}
