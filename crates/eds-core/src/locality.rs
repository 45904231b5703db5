//! Locality-aware load balancing and failover.
//!
//! `TrafficPolicy`, `OutlierDetection` and `LocalityLoadBalancerSetting` are
//! plain config snapshot types modeled on Istio's DestinationRule CRD shape
//! (mesh-default, overridden by destination-rule top-level, overridden again
//! by a destination-rule subset). `LocalityPolicyEngine` applies the merged
//! policy to an already-built [`crate::builder::LoadAssignment`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::builder::LoadAssignment;
use crate::model::Locality;
use crate::strng::Strng;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct OutlierDetection {
	pub consecutive_errors: u32,
	pub interval_seconds: u32,
	pub base_ejection_seconds: u32,
}

/// One entry of a locality distribution: redistribute traffic bound for
/// `from` across the localities named in `to`, keyed by locality string
/// (`region`, `region/zone`, or `region/zone/subzone`) with an integer
/// percentage weight. Percentages need not sum to 100; they are normalized.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalityDistribution {
	pub from: Strng,
	pub to: HashMap<Strng, u32>,
}

/// An explicit locality failover: when traffic originating in `from` cannot
/// be served locally, prefer `to` over the default nearest-locality ordering.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LocalityFailover {
	pub from: Strng,
	pub to: Strng,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LocalityLoadBalancerSetting {
	#[serde(default)]
	pub distribute: Vec<LocalityDistribution>,
	#[serde(default)]
	pub failover: Vec<LocalityFailover>,
}

/// Governs whether endpoint-health filtering in `EndpointBuilder` excludes
/// non-`Healthy` endpoints or passes every reported endpoint through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum HostStatusFilter {
	#[default]
	HealthyOnly,
	AllowAll,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TrafficPolicy {
	pub outlier_detection: Option<OutlierDetection>,
	pub locality_lb_setting: Option<LocalityLoadBalancerSetting>,
	#[serde(default)]
	pub host_status_filter: HostStatusFilter,
}

impl TrafficPolicy {
	/// Merges mesh-wide, destination-rule top-level, and subset-specific
	/// policy, last non-`None` field wins.
	pub fn merge(mesh: Option<&TrafficPolicy>, rule: Option<&TrafficPolicy>, subset: Option<&TrafficPolicy>) -> Option<TrafficPolicy> {
		let outlier_detection = subset
			.and_then(|p| p.outlier_detection)
			.or_else(|| rule.and_then(|p| p.outlier_detection))
			.or_else(|| mesh.and_then(|p| p.outlier_detection));
		let locality_lb_setting = subset
			.and_then(|p| p.locality_lb_setting.clone())
			.or_else(|| rule.and_then(|p| p.locality_lb_setting.clone()))
			.or_else(|| mesh.and_then(|p| p.locality_lb_setting.clone()));
		let host_status_filter = subset
			.or(rule)
			.or(mesh)
			.map(|p| p.host_status_filter)
			.unwrap_or_default();

		if outlier_detection.is_none() && locality_lb_setting.is_none() && host_status_filter == HostStatusFilter::HealthyOnly {
			return None;
		}
		Some(TrafficPolicy {
			outlier_detection,
			locality_lb_setting,
			host_status_filter,
		})
	}

	pub fn failover_enabled(&self) -> bool {
		self.outlier_detection.is_some()
	}
}

/// Stateless; applies a merged [`TrafficPolicy`] to a built assignment.
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalityPolicyEngine;

impl LocalityPolicyEngine {
	pub fn new() -> Self {
		Self
	}

	/// Returns the unmodified assignment (cheap, no locality setting), or a
	/// deep-enough clone with priorities and weights redistributed.
	///
	/// The input `assignment` is shared read-only across proxies consuming
	/// the same cluster; this never mutates it in place.
	pub fn apply(&self, assignment: &LoadAssignment, proxy_locality: &Locality, policy: Option<&TrafficPolicy>) -> LoadAssignment {
		let Some(policy) = policy else {
			return assignment.clone();
		};
		let Some(setting) = &policy.locality_lb_setting else {
			return assignment.clone();
		};

		let mut out = assignment.clone();
		self.assign_priorities(&mut out, proxy_locality, &setting.failover);
		self.redistribute_weights(&mut out, proxy_locality, &setting.distribute);
		out
	}

	fn assign_priorities(&self, assignment: &mut LoadAssignment, proxy_locality: &Locality, failover: &[LocalityFailover]) {
		let boosted_region = failover
			.iter()
			.find(|f| f.from == proxy_locality.region)
			.map(|f| f.to.clone());

		for group in &mut assignment.locality_groups {
			group.priority = if group.locality.subzone_matches(proxy_locality) {
				0
			} else if group.locality.zone_matches(proxy_locality) {
				1
			} else if group.locality.region_matches(proxy_locality) {
				2
			} else if boosted_region.as_deref() == Some(group.locality.region.as_str()) {
				3
			} else {
				4
			};
		}
	}

	fn redistribute_weights(&self, assignment: &mut LoadAssignment, proxy_locality: &Locality, distribute: &[LocalityDistribution]) {
		let Some(rule) = distribute.iter().find(|d| locality_prefix_matches(&d.from, proxy_locality)) else {
			return;
		};
		let total_pct: u32 = rule.to.values().sum();
		if total_pct == 0 {
			return;
		}

		for group in &mut assignment.locality_groups {
			let key = group.locality.to_string();
			let Some(pct) = find_matching_percentage(&rule.to, &key) else {
				group.weight = 0;
				continue;
			};
			let base: u32 = group.endpoints.iter().map(|e| e.weight).sum();
			group.weight = base.saturating_mul(pct) / total_pct.max(1);
		}
	}
}

fn locality_prefix_matches(pattern: &str, locality: &Locality) -> bool {
	let candidate = locality.to_string();
	let pattern = pattern.trim_end_matches("/*");
	candidate.starts_with(pattern)
}

fn find_matching_percentage(to: &HashMap<Strng, u32>, locality: &str) -> Option<u32> {
	to.iter()
		.find(|(k, _)| locality.starts_with(k.trim_end_matches("/*").as_str()))
		.map(|(_, v)| *v)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::builder::{LoadAssignment, LocalityLbEndpoints};
	use crate::model::ProxyEndpoint;

	fn group(locality_str: &str, weights: &[u32]) -> LocalityLbEndpoints {
		let locality: Locality = locality_str.parse().unwrap();
		let endpoints = weights
			.iter()
			.map(|w| ProxyEndpoint {
				address: Strng::from("10.0.0.1"),
				port: 80,
				weight: *w,
				metadata: crate::model::EndpointMetadata {
					network: Strng::default(),
					tls_mode: crate::model::TlsMode::default(),
				},
			})
			.collect();
		LocalityLbEndpoints {
			locality,
			endpoints,
			weight: weights.iter().sum(),
			priority: 0,
		}
	}

	#[test]
	fn merge_prefers_subset_then_rule_then_mesh() {
		let mesh = TrafficPolicy {
			outlier_detection: Some(OutlierDetection {
				consecutive_errors: 1,
				..Default::default()
			}),
			locality_lb_setting: None,
			host_status_filter: HostStatusFilter::default(),
		};
		let subset = TrafficPolicy {
			outlier_detection: Some(OutlierDetection {
				consecutive_errors: 5,
				..Default::default()
			}),
			locality_lb_setting: None,
			host_status_filter: HostStatusFilter::default(),
		};
		let merged = TrafficPolicy::merge(Some(&mesh), None, Some(&subset)).unwrap();
		assert_eq!(merged.outlier_detection.unwrap().consecutive_errors, 5);
	}

	#[test]
	fn merge_picks_up_host_status_filter_from_most_specific_present_level() {
		let mesh = TrafficPolicy {
			outlier_detection: None,
			locality_lb_setting: None,
			host_status_filter: HostStatusFilter::AllowAll,
		};
		let merged = TrafficPolicy::merge(Some(&mesh), None, None).unwrap();
		assert_eq!(merged.host_status_filter, HostStatusFilter::AllowAll);

		let rule = TrafficPolicy {
			outlier_detection: Some(OutlierDetection::default()),
			locality_lb_setting: None,
			host_status_filter: HostStatusFilter::HealthyOnly,
		};
		let merged = TrafficPolicy::merge(Some(&mesh), Some(&rule), None).unwrap();
		assert_eq!(merged.host_status_filter, HostStatusFilter::HealthyOnly);
	}

	#[test]
	fn no_policy_returns_assignment_unchanged() {
		let engine = LocalityPolicyEngine::new();
		let assignment = LoadAssignment {
			cluster_name: Strng::from("outbound|80||reviews.bookinfo.svc.cluster.local"),
			locality_groups: vec![group("region1/zone1/subzone1", &[5])],
		};
		let proxy_locality: Locality = "region1/zone1/subzone1".parse().unwrap();
		let out = engine.apply(&assignment, &proxy_locality, None);
		assert_eq!(out, assignment);
	}

	#[test]
	fn locality_setting_assigns_nearest_priority_first() {
		let engine = LocalityPolicyEngine::new();
		let assignment = LoadAssignment {
			cluster_name: Strng::from("outbound|80||reviews.bookinfo.svc.cluster.local"),
			locality_groups: vec![group("region1/zone1/subzone1", &[5]), group("region2/zone2/subzone2", &[5])],
		};
		let proxy_locality: Locality = "region1/zone1/subzone1".parse().unwrap();
		let policy = TrafficPolicy {
			outlier_detection: None,
			locality_lb_setting: Some(LocalityLoadBalancerSetting::default()),
			host_status_filter: HostStatusFilter::default(),
		};
		let out = engine.apply(&assignment, &proxy_locality, Some(&policy));
		assert_eq!(out.locality_groups[0].priority, 0);
		assert_eq!(out.locality_groups[1].priority, 4);
		// input assignment is untouched
		assert_eq!(assignment.locality_groups[0].priority, 0);
	}

	#[test]
	fn distribute_redistributes_weight_by_percentage() {
		let engine = LocalityPolicyEngine::new();
		let assignment = LoadAssignment {
			cluster_name: Strng::from("outbound|80||reviews.bookinfo.svc.cluster.local"),
			locality_groups: vec![group("region1/zone1/subzone1", &[10]), group("region1/zone2/subzone1", &[10])],
		};
		let proxy_locality: Locality = "region1/zone1/subzone1".parse().unwrap();
		let mut to = HashMap::new();
		to.insert(Strng::from("region1/zone1"), 80);
		to.insert(Strng::from("region1/zone2"), 20);
		let policy = TrafficPolicy {
			outlier_detection: None,
			locality_lb_setting: Some(LocalityLoadBalancerSetting {
				distribute: vec![LocalityDistribution {
					from: Strng::from("region1/*"),
					to,
				}],
				failover: vec![],
			}),
			host_status_filter: HostStatusFilter::default(),
		};
		let out = engine.apply(&assignment, &proxy_locality, Some(&policy));
		assert_eq!(out.locality_groups[0].weight, 8);
		assert_eq!(out.locality_groups[1].weight, 2);
	}
}
