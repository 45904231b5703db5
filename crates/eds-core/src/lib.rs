//! Endpoint Discovery Service core: the sharded endpoint index, the update
//! orchestration that classifies mutations as full or incremental pushes,
//! and the per-proxy view materialization pipeline that turns that index
//! into xDS load-assignment resources.
//!
//! The outer xDS transport, admission webhooks, CLI bootstrap and TLS
//! material live in `eds-app` and `eds-xds`; this crate only knows about the
//! in-memory model and the synchronous build path.

pub mod builder;
pub mod cluster_name;
pub mod config;
pub mod errors;
pub mod generator;
pub mod index;
pub mod locality;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod prelude;
pub mod push;
pub mod registry;
pub mod splithorizon;
pub mod strng;

pub use builder::{BuildOutcome, EndpointBuilder, LoadAssignment, LocalityLbEndpoints, Proxy};
pub use cluster_name::ClusterName;
pub use config::{DestinationRule, MeshConfig, PushContext, Service, Subset};
pub use errors::{AggregationError, ClusterNameError, PushError};
pub use generator::Generator;
pub use index::{EndpointIndex, EndpointShards};
pub use locality::{HostStatusFilter, LocalityPolicyEngine, OutlierDetection, TrafficPolicy};
pub use metrics::Metrics;
pub use model::{EndpointMetadata, HealthStatus, IstioEndpoint, Locality, ProxyEndpoint, TlsMode};
pub use orchestrator::{LoggingPushScheduler, PushIntent, PushScheduler, UpdateOrchestrator};
pub use push::{Connection, DiscoveryResponse, PushLoop, Subscription};
pub use registry::{Registry, RegistryAggregator};
pub use splithorizon::SplitHorizonFilter;
pub use strng::Strng;
