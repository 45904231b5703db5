//! Istio's canonical cluster-name encoding: `direction|port|subset|hostname`.
//!
//! EDS responses are keyed by this string rather than by a structured type,
//! so every lookup against the index has to parse it first. The formatter is
//! the deterministic inverse, used by tests and by debug logging.

use crate::errors::ClusterNameError;
use crate::strng::{self, Strng};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClusterName {
	pub direction: Strng,
	pub port: u16,
	pub subset: Strng,
	pub hostname: Strng,
}

impl ClusterName {
	pub fn parse(s: &str) -> Result<Self, ClusterNameError> {
		let mut parts = s.splitn(4, '|');
		let direction = parts
			.next()
			.ok_or_else(|| ClusterNameError::TooFewSegments(s.to_string()))?;
		let port = parts
			.next()
			.ok_or_else(|| ClusterNameError::TooFewSegments(s.to_string()))?;
		let subset = parts
			.next()
			.ok_or_else(|| ClusterNameError::TooFewSegments(s.to_string()))?;
		let hostname = parts
			.next()
			.ok_or_else(|| ClusterNameError::TooFewSegments(s.to_string()))?;

		let port: u16 = port
			.parse()
			.map_err(|_| ClusterNameError::InvalidPort(s.to_string()))?;

		Ok(ClusterName {
			direction: strng::new(direction),
			port,
			subset: strng::new(subset),
			hostname: strng::new(hostname),
		})
	}

	pub fn format(&self) -> Strng {
		strng::format!("{}|{}|{}|{}", self.direction, self.port, self.subset, self.hostname)
	}
}
