//! Pull-style subscription refresh: an alternative entry point to
//! [`crate::push::PushLoop`] for a caller that wants serialized resources
//! back directly rather than a send.
//!
//! Selection is the *inverse* of `PushLoop`: the generator skips clusters
//! whose hostname is in the updated set, since an external update pipeline
//! is expected to handle that subset through a different path. Preserve
//! this contract: it exists so an external update pipeline can own that
//! subset through a separate path without double-delivery.

use std::collections::HashSet;

use crate::builder::{BuildOutcome, EndpointBuilder, LoadAssignment, Proxy};
use crate::cluster_name::ClusterName;
use crate::config::PushContext;
use crate::index::EndpointIndex;
use crate::locality::LocalityPolicyEngine;
use crate::metrics::Metrics;
use crate::splithorizon::SplitHorizonFilter;
use crate::strng::Strng;

pub struct Generator<'a> {
	index: &'a EndpointIndex,
	push: &'a PushContext,
	metrics: &'a Metrics,
	locality_engine: LocalityPolicyEngine,
	split_horizon: SplitHorizonFilter,
}

impl<'a> Generator<'a> {
	pub fn new(index: &'a EndpointIndex, push: &'a PushContext, metrics: &'a Metrics) -> Self {
		Self {
			index,
			push,
			metrics,
			locality_engine: LocalityPolicyEngine::new(),
			split_horizon: SplitHorizonFilter::new(),
		}
	}

	/// Builds a resource for every cluster in `watched_resources` whose
	/// hostname is *not* in `updated_configs`, dropping `null` (DNS
	/// resolution) results.
	pub fn generate(&self, proxy: &Proxy, watched_resources: &HashSet<Strng>, updated_configs: &HashSet<Strng>) -> Vec<LoadAssignment> {
		let mut resources = Vec::new();

		for cluster_name in watched_resources {
			let parsed = match ClusterName::parse(cluster_name) {
				Ok(parsed) => parsed,
				Err(_) => continue,
			};
			if updated_configs.contains(&parsed.hostname) {
				continue;
			}

			let builder = EndpointBuilder::new(cluster_name.clone(), proxy, self.push, self.index, Some(self.metrics));
			let assignment = match builder.build_assignment() {
				BuildOutcome::Skip => continue,
				BuildOutcome::Empty(a) => a,
				BuildOutcome::Assignment(a) => {
					let filtered = self.split_horizon.apply(&a, &proxy.network, &self.push.mesh.networks);
					let policy = self.push.resolve_traffic_policy(&parsed.hostname, &parsed.subset);
					self.locality_engine.apply(&filtered, &proxy.locality, policy.as_ref())
				}
			};
			resources.push(assignment);
		}

		resources
	}
}
