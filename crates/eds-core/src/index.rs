//! [`EndpointIndex`]: the sharded, hostname/namespace-keyed endpoint store.
//!
//! Lock order is index lock, then shard mutex, never the reverse. The index
//! lock is only ever held for the brief window needed to create or remove a
//! shard/namespace/service entry; the shard mutex governs everything else,
//! including reads and the per-endpoint memoized materialization.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use itertools::Itertools;

use crate::model::IstioEndpoint;
use crate::strng::Strng;

/// Contents of one (serviceName, namespace) shard map, guarded by
/// [`EndpointShards`]'s mutex.
#[derive(Debug, Default)]
pub struct EndpointShardsInner {
	pub shards: HashMap<Strng, Vec<IstioEndpoint>>,
	pub service_accounts: HashSet<Strng>,
}

/// Per (serviceName, namespace) entry: a mapping clusterID -> endpoints, plus
/// the service-account set observed across all shards. Never holds an empty
/// endpoint list for any clusterID.
#[derive(Debug, Default)]
pub struct EndpointShards {
	inner: Mutex<EndpointShardsInner>,
}

impl EndpointShards {
	/// Locks the shard for read or write. Callers must not hold the index
	/// lock across this call for longer than necessary; builders take this
	/// lock alone, after having already released the index read lock.
	pub fn lock(&self) -> MutexGuard<'_, EndpointShardsInner> {
		self.inner.lock().expect("shard mutex poisoned")
	}
}

fn service_accounts_of(endpoints: &[IstioEndpoint]) -> HashSet<Strng> {
	endpoints
		.iter()
		.filter_map(|ep| ep.service_account.clone())
		.filter(|sa| !sa.is_empty())
		.collect()
}

/// The nested serviceName -> namespace -> [`EndpointShards`] store.
#[derive(Debug, Default)]
pub struct EndpointIndex {
	inner: RwLock<HashMap<Strng, HashMap<Strng, Arc<EndpointShards>>>>,
}

impl EndpointIndex {
	pub fn new() -> Self {
		Self::default()
	}

	/// Upserts one clusterID's endpoint list for (serviceName, namespace).
	///
	/// Returns `true` if the caller should trigger a full push: the shard
	/// entry was freshly created, or the service-account set changed.
	/// An empty `endpoints` removes the clusterID sub-entry (if present) but
	/// never the (service, namespace) entry, and always returns `false` --
	/// this avoids full-push churn when a pod crash-loops to zero replicas.
	pub fn upsert_shard(
		&self,
		cluster_id: impl Into<Strng>,
		service_name: impl Into<Strng>,
		namespace: impl Into<Strng>,
		endpoints: Vec<IstioEndpoint>,
	) -> bool {
		let cluster_id = cluster_id.into();
		let service_name = service_name.into();
		let namespace = namespace.into();

		if endpoints.is_empty() {
			if let Some(shard) = self.get_existing(&service_name, &namespace) {
				let mut inner = shard.lock();
				inner.shards.remove(&cluster_id);
			}
			return false;
		}

		let (shard, freshly_created) = self.get_or_create(service_name, namespace);
		let mut inner = shard.lock();

		inner.shards.insert(cluster_id, endpoints);
		let new_accounts = inner.shards.values().flat_map(|eps| service_accounts_of(eps)).collect();
		let accounts_changed = new_accounts != inner.service_accounts;
		inner.service_accounts = new_accounts;

		freshly_created || accounts_changed
	}

	/// Removes only the clusterID sub-entry; preserves the (service,
	/// namespace) entry even if it becomes empty.
	pub fn delete_shard(
		&self,
		cluster_id: impl Into<Strng>,
		service_name: impl AsRef<str>,
		namespace: impl AsRef<str>,
	) {
		let Some(shard) = self.get_existing(service_name.as_ref(), namespace.as_ref()) else {
			return;
		};
		shard.lock().shards.remove(&cluster_id.into());
	}

	/// Removes the clusterID sub-entry; if the shard map becomes empty, drops
	/// the namespace entry; if the service map becomes empty, drops the
	/// service entry too.
	pub fn delete_service(
		&self,
		cluster_id: impl Into<Strng>,
		service_name: impl AsRef<str>,
		namespace: impl AsRef<str>,
	) {
		let service_name = service_name.as_ref();
		let namespace = namespace.as_ref();
		let cluster_id = cluster_id.into();

		let mut index = self.inner.write().expect("index lock poisoned");
		let Some(namespaces) = index.get_mut(service_name) else {
			return;
		};
		let Some(shard) = namespaces.get(namespace) else {
			return;
		};

		let now_empty = {
			let mut inner = shard.lock();
			inner.shards.remove(&cluster_id);
			inner.shards.is_empty()
		};

		if now_empty {
			namespaces.remove(namespace);
			if namespaces.is_empty() {
				index.remove(service_name);
			}
		}
	}

	/// Returns a consistent read of the shard map: a clone of the `Arc`
	/// pointer. Further access to its contents is governed by the shard's
	/// own mutex, not the index lock.
	pub fn read_shards(
		&self,
		service_name: impl AsRef<str>,
		namespace: impl AsRef<str>,
	) -> Option<Arc<EndpointShards>> {
		self.get_existing(service_name.as_ref(), namespace.as_ref())
	}

	/// Lists every currently-known (serviceName, namespace) key, sorted for
	/// stable debug output. Intended for debug/introspection surfaces, not the
	/// hot build path -- it takes the index read lock for the whole
	/// enumeration rather than the brief creation/removal window other
	/// operations use.
	pub fn snapshot_keys(&self) -> Vec<(Strng, Strng)> {
		let index = self.inner.read().expect("index lock poisoned");
		index
			.iter()
			.flat_map(|(service, namespaces)| namespaces.keys().map(move |ns| (service.clone(), ns.clone())))
			.sorted()
			.collect()
	}

	fn get_existing(&self, service_name: &str, namespace: &str) -> Option<Arc<EndpointShards>> {
		let index = self.inner.read().expect("index lock poisoned");
		index.get(service_name)?.get(namespace).cloned()
	}

	fn get_or_create(&self, service_name: Strng, namespace: Strng) -> (Arc<EndpointShards>, bool) {
		// Fast path: avoid the write lock entirely when the shard already exists.
		if let Some(shard) = self.get_existing(&service_name, &namespace) {
			return (shard, false);
		}

		let mut index = self.inner.write().expect("index lock poisoned");
		let namespaces = index.entry(service_name).or_default();
		let mut created = false;
		let shard = namespaces
			.entry(namespace)
			.or_insert_with(|| {
				created = true;
				Arc::new(EndpointShards::default())
			})
			.clone();
		(shard, created)
	}
}
