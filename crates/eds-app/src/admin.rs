//! Admin/metrics HTTP surface: `/metrics` (Prometheus text exposition) and
//! `/debug/edsz` (a JSON dump of every currently-known (service, namespace)
//! shard entry).

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use eds_core::EndpointIndex;
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use serde::Serialize;

#[derive(Clone)]
pub struct MetricsApp {
	registry: Arc<Registry>,
}

impl MetricsApp {
	pub fn new(registry: Arc<Registry>) -> Self {
		Self { registry }
	}

	pub fn router(&self) -> Router {
		Router::new().route("/metrics", get(metrics_handler)).with_state(self.clone())
	}
}

async fn metrics_handler(State(app): State<MetricsApp>) -> Result<String, StatusCode> {
	let mut buffer = String::new();
	encode(&mut buffer, &app.registry).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
	Ok(buffer)
}

#[derive(Clone)]
pub struct DebugApp {
	index: Arc<EndpointIndex>,
}

#[derive(Serialize)]
struct ShardDump {
	service: String,
	namespace: String,
	clusters: Vec<ClusterDump>,
}

#[derive(Serialize)]
struct ClusterDump {
	cluster_id: String,
	endpoint_count: usize,
}

impl DebugApp {
	pub fn new(index: Arc<EndpointIndex>) -> Self {
		Self { index }
	}

	pub fn router(&self) -> Router {
		Router::new().route("/debug/edsz", get(edsz_handler)).with_state(self.clone())
	}
}

async fn edsz_handler(State(app): State<DebugApp>) -> Result<String, StatusCode> {
	let dump: Vec<ShardDump> = app
		.index
		.snapshot_keys()
		.into_iter()
		.filter_map(|(service, namespace)| {
			let shard = app.index.read_shards(&service, &namespace)?;
			let clusters = shard
				.lock()
				.shards
				.iter()
				.map(|(cluster_id, endpoints)| ClusterDump {
					cluster_id: cluster_id.to_string(),
					endpoint_count: endpoints.len(),
				})
				.collect();
			Some(ShardDump {
				service: service.to_string(),
				namespace: namespace.to_string(),
				clusters,
			})
		})
		.collect();

	serde_json::to_string(&dump).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
