//! Generic delta-xDS resource plumbing: the part of the transport layer that
//! decodes a `Resource` blob into a typed value and fans it out to a typed
//! `Handler`, aggregating per-resource failures as NACKs rather than failing
//! the whole response.

use std::fmt;

use prost::bytes::Bytes;
use prost::DecodeError;
use thiserror::Error;

#[derive(Eq, Hash, PartialEq, Debug, Clone)]
pub struct ResourceKey {
	pub name: String,
	pub type_url: String,
}

impl fmt::Display for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.type_url, self.name)
	}
}

#[derive(Debug)]
pub struct RejectedConfig {
	pub name: String,
	pub reason: anyhow::Error,
}

impl RejectedConfig {
	pub fn new(name: String, reason: anyhow::Error) -> Self {
		Self { name, reason }
	}
}

impl fmt::Display for RejectedConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.name, self.reason)
	}
}

#[derive(Clone, Debug, Error)]
pub enum AdsError {
	#[error("unknown resource type: {0}")]
	UnknownResourceType(String),
	#[error("decode: {0}")]
	Decode(#[from] DecodeError),
	#[error("xDS payload without a resource body")]
	MissingResource,
}

/// A single decoded resource within a discovery response.
#[derive(Debug, Clone, PartialEq)]
pub struct XdsResource<T> {
	pub name: String,
	pub resource: T,
}

/// One entry of a delta response: either a new/updated resource body, or the
/// name of a resource to remove.
#[derive(Debug, Clone, PartialEq)]
pub enum XdsUpdate<T> {
	Update(XdsResource<T>),
	Remove(String),
}

impl<T> XdsUpdate<T> {
	pub fn name(&self) -> String {
		match self {
			XdsUpdate::Update(r) => r.name.clone(),
			XdsUpdate::Remove(n) => n.clone(),
		}
	}
}

/// Decodes a raw `(name, bytes)` pair into a typed [`XdsResource`].
pub fn decode_proto<T: prost::Message + Default>(name: &str, raw: Option<&[u8]>) -> Result<XdsResource<T>, AdsError> {
	let bytes = raw.ok_or(AdsError::MissingResource)?;
	let resource = T::decode(Bytes::copy_from_slice(bytes)).map_err(AdsError::Decode)?;
	Ok(XdsResource {
		name: name.to_string(),
		resource,
	})
}

/// Handles a response for one resource type. Implementations mutate their
/// own state and report per-resource rejections; they never fail the whole
/// batch for one bad resource.
pub trait Handler<T: prost::Message>: Send + Sync + 'static {
	fn handle(&self, updates: Box<&mut dyn Iterator<Item = XdsUpdate<T>>>) -> Result<(), Vec<RejectedConfig>>;
}

/// Processes a stream of updates one at a time via `handle_one`, collecting
/// per-resource failures as NACKs instead of aborting the batch.
pub fn handle_single_resource<T: prost::Message, F: FnMut(XdsUpdate<T>) -> anyhow::Result<()>>(updates: impl Iterator<Item = XdsUpdate<T>>, mut handle_one: F) -> Result<(), Vec<RejectedConfig>> {
	let rejects: Vec<RejectedConfig> = updates
		.filter_map(|res| {
			let name = res.name();
			handle_one(res).err().map(|e| RejectedConfig::new(name, e))
		})
		.collect();
	if rejects.is_empty() {
		Ok(())
	} else {
		Err(rejects)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::proto::ClusterLoadAssignment;

	#[test]
	fn decode_proto_round_trips_bytes() {
		let assignment = ClusterLoadAssignment {
			cluster_name: "outbound|80||reviews.bookinfo.svc.cluster.local".to_string(),
			endpoints: vec![],
		};
		let bytes = prost::Message::encode_to_vec(&assignment);
		let decoded: XdsResource<ClusterLoadAssignment> = decode_proto("reviews", Some(&bytes)).unwrap();
		assert_eq!(decoded.resource, assignment);
	}

	#[test]
	fn decode_proto_without_bytes_is_missing_resource() {
		let result: Result<XdsResource<ClusterLoadAssignment>, _> = decode_proto("reviews", None);
		assert!(matches!(result, Err(AdsError::MissingResource)));
	}

	#[test]
	fn handle_single_resource_collects_rejections_without_aborting() {
		let updates = vec![
			XdsUpdate::Update(XdsResource {
				name: "good".to_string(),
				resource: ClusterLoadAssignment::default(),
			}),
			XdsUpdate::Update(XdsResource {
				name: "bad".to_string(),
				resource: ClusterLoadAssignment::default(),
			}),
		];
		let result = handle_single_resource(updates.into_iter(), |update| {
			if update.name() == "bad" {
				anyhow::bail!("rejected");
			}
			Ok(())
		});
		let rejects = result.unwrap_err();
		assert_eq!(rejects.len(), 1);
		assert_eq!(rejects[0].name, "bad");
	}
}
