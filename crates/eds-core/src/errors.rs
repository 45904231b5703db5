use thiserror::Error;

use crate::strng::Strng;

/// Raised by [`crate::registry::RegistryAggregator::reconcile`]. A single
/// registry failure aborts the whole pass; there is no partial apply.
#[derive(Debug, Error)]
pub enum AggregationError {
	#[error("registry {registry} failed to list instances for {service}/{namespace} port {port}: {source}")]
	RegistryQueryFailed {
		registry: Strng,
		service: Strng,
		namespace: Strng,
		port: u16,
		#[source]
		source: anyhow::Error,
	},
}

/// Raised by [`crate::push::PushLoop::push`] when the connection write fails.
/// The core never retries; the transport layer owns retry policy.
#[derive(Debug, Error)]
pub enum PushError {
	#[error("send failed on connection {connection_id}: {source}")]
	SendFailed {
		connection_id: Strng,
		#[source]
		source: anyhow::Error,
	},
}

/// Invalid cluster-name encodings are tolerated by callers (logged at debug,
/// treated as "no assignment"), but the parser still needs a typed error to
/// log against.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ClusterNameError {
	#[error("cluster name {0:?} has too few '|'-delimited segments")]
	TooFewSegments(String),
	#[error("cluster name {0:?} has an unparseable port segment")]
	InvalidPort(String),
}
