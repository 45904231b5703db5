//! Metrics exposed by the EDS subsystem.
//!
//! Registered against a caller-owned [`Registry`], mirroring how the
//! teacher's `agent_xds::metrics::Metrics` takes its registry at
//! construction rather than reaching for a process-global one.

use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ClusterLabel {
	pub cluster: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConnectionLabel {
	pub connection_id: String,
}

#[derive(Debug)]
pub struct Metrics {
	endpoint_updates: Counter,
	service_updates: Counter,
	service_deletes: Counter,
	eds_pushes: Counter,
	eds_push_duration_seconds: Histogram,
	eds_send_errors: Family<ConnectionLabel, Counter>,
	eds_no_instances: Family<ClusterLabel, Counter>,
	eds_empty_assignments: Counter,
	eds_endpoints_pushed: Counter,
}

impl Metrics {
	pub fn new(registry: &mut Registry) -> Self {
		let endpoint_updates = Counter::default();
		registry.register("eds_endpoint_updates", "Endpoint change reports received", endpoint_updates.clone());

		let service_updates = Counter::default();
		registry.register("eds_service_updates", "Service add/update events received", service_updates.clone());

		let service_deletes = Counter::default();
		registry.register("eds_service_deletes", "Service delete events received", service_deletes.clone());

		let eds_pushes = Counter::default();
		registry.register("eds_pushes_total", "EDS pushes sent", eds_pushes.clone());

		let eds_push_duration_seconds = Histogram::new([0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0].into_iter());
		registry.register("eds_push_duration_seconds", "EDS push latency", eds_push_duration_seconds.clone());

		let eds_send_errors = Family::default();
		registry.register("eds_send_errors_total", "EDS pushes that failed to send, by connection", eds_send_errors.clone());

		let eds_no_instances = Family::default();
		registry.register("eds_no_instances", "Clusters built with zero surviving endpoints", eds_no_instances.clone());

		let eds_empty_assignments = Counter::default();
		registry.register("eds_empty_assignments_total", "Empty assignments returned by the builder", eds_empty_assignments.clone());

		let eds_endpoints_pushed = Counter::default();
		registry.register("eds_endpoints_pushed_total", "Total endpoints included across all pushes", eds_endpoints_pushed.clone());

		Self {
			endpoint_updates,
			service_updates,
			service_deletes,
			eds_pushes,
			eds_push_duration_seconds,
			eds_send_errors,
			eds_no_instances,
			eds_empty_assignments,
			eds_endpoints_pushed,
		}
	}

	pub fn record_endpoint_update(&self) {
		self.endpoint_updates.inc();
	}

	pub fn record_service_update(&self) {
		self.service_updates.inc();
	}

	pub fn record_service_delete(&self) {
		self.service_deletes.inc();
	}

	pub fn record_no_instances(&self, cluster_name: &str) {
		self.eds_no_instances
			.get_or_create(&ClusterLabel { cluster: cluster_name.to_string() })
			.inc();
		self.eds_empty_assignments.inc();
	}

	pub fn record_push(&self, duration_seconds: f64, endpoints_sent: u64) {
		self.eds_pushes.inc();
		self.eds_push_duration_seconds.observe(duration_seconds);
		self.eds_endpoints_pushed.inc_by(endpoints_sent);
	}

	pub fn record_send_error(&self, connection_id: &str) {
		self.eds_send_errors
			.get_or_create(&ConnectionLabel {
				connection_id: connection_id.to_string(),
			})
			.inc();
	}
}
