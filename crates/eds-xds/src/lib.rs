//! Generic delta-xDS resource plumbing and the wire shapes for the endpoint
//! resource. The connection framing, ADS gRPC service, and TLS bootstrap
//! this plumbing is wired into are `eds-app`'s concern.

pub mod handler;
pub mod proto;

pub use handler::{decode_proto, handle_single_resource, AdsError, Handler, RejectedConfig, ResourceKey, XdsResource, XdsUpdate};
pub use proto::{ClusterLoadAssignment, DiscoveryResponse, Endpoint, LbEndpoint, Locality, LocalityLbEndpoints, Metadata};
