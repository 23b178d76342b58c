//! Gateway-side registries of barrels and subscribed clients
//!
//! Both are plain data structures; the gateway wraps each in its own mutex
//! so id allocation and the notification fan-out that follows happen as one
//! critical section.

use crate::api::{ReplicaId, ReplicaInfo};
use chrono::Utc;
use rand::seq::IteratorRandom;
use std::collections::{BTreeMap, BTreeSet};

/// First id handed out to a barrel.
pub const FIRST_REPLICA_ID: ReplicaId = 1;

#[derive(Debug, Clone)]
struct ReplicaEntry<P> {
    info: ReplicaInfo,
    peer: P,
}

/// Live barrels keyed by id. Ids are unique among registered barrels; freed
/// ids are reused smallest first before the counter grows.
#[derive(Debug)]
pub struct ReplicaRegistry<P> {
    next_id: ReplicaId,
    free_ids: BTreeSet<ReplicaId>,
    entries: BTreeMap<ReplicaId, ReplicaEntry<P>>,
}

impl<P: Clone> Default for ReplicaRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone> ReplicaRegistry<P> {
    pub fn new() -> Self {
        Self {
            next_id: FIRST_REPLICA_ID,
            free_ids: BTreeSet::new(),
            entries: BTreeMap::new(),
        }
    }

    /// Register `address`, returning its id. An address that is already
    /// registered keeps its id and gets the new peer handle.
    pub fn register(&mut self, address: &str, peer: P) -> ReplicaId {
        if let Some(id) = self.find(address) {
            if let Some(entry) = self.entries.get_mut(&id) {
                entry.peer = peer;
            }
            return id;
        }

        let id = self.allocate_id();
        self.entries.insert(
            id,
            ReplicaEntry {
                info: ReplicaInfo {
                    id,
                    address: address.to_string(),
                    registered_at: Utc::now(),
                },
                peer,
            },
        );
        id
    }

    fn allocate_id(&mut self) -> ReplicaId {
        if let Some(id) = self.free_ids.pop_first() {
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Remove the barrel registered at `address`, freeing its id.
    pub fn deregister(&mut self, address: &str) -> Option<ReplicaId> {
        let id = self.find(address)?;
        self.remove(id).map(|_| id)
    }

    /// Remove barrel `id`, freeing the id. Returns its address.
    pub fn remove(&mut self, id: ReplicaId) -> Option<String> {
        let entry = self.entries.remove(&id)?;
        self.free_ids.insert(id);
        Some(entry.info.address)
    }

    /// Remove barrel `id` only while it is still the one at `address`.
    /// A stale id that was freed and handed to another barrel is left alone.
    pub fn remove_if(&mut self, id: ReplicaId, address: &str) -> bool {
        match self.entries.get(&id) {
            Some(entry) if entry.info.address == address => self.remove(id).is_some(),
            _ => false,
        }
    }

    pub fn find(&self, address: &str) -> Option<ReplicaId> {
        self.entries
            .values()
            .find(|entry| entry.info.address == address)
            .map(|entry| entry.info.id)
    }

    /// A uniformly random barrel: its id, address and peer handle.
    pub fn pick_random(&self) -> Option<(ReplicaId, String, P)> {
        self.entries
            .values()
            .choose(&mut rand::thread_rng())
            .map(|entry| (entry.info.id, entry.info.address.clone(), entry.peer.clone()))
    }

    /// Active barrels sorted by id.
    pub fn list(&self) -> Vec<ReplicaInfo> {
        self.entries.values().map(|entry| entry.info.clone()).collect()
    }

    pub fn peers(&self) -> Vec<(ReplicaId, P)> {
        self.entries
            .values()
            .map(|entry| (entry.info.id, entry.peer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        let ids: Vec<ReplicaId> = self.entries.keys().copied().collect();
        for id in ids {
            self.remove(id);
        }
    }
}

/// Subscribed clients keyed by callback address.
#[derive(Debug)]
pub struct ClientRegistry<P> {
    clients: BTreeMap<String, P>,
}

impl<P: Clone> Default for ClientRegistry<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Clone> ClientRegistry<P> {
    pub fn new() -> Self {
        Self {
            clients: BTreeMap::new(),
        }
    }

    /// Returns false if the client was already subscribed.
    pub fn subscribe(&mut self, address: &str, peer: P) -> bool {
        self.clients.insert(address.to_string(), peer).is_none()
    }

    /// Returns false if the client was not subscribed.
    pub fn unsubscribe(&mut self, address: &str) -> bool {
        self.clients.remove(address).is_some()
    }

    pub fn contains(&self, address: &str) -> bool {
        self.clients.contains_key(address)
    }

    pub fn peers(&self) -> Vec<(String, P)> {
        self.clients
            .iter()
            .map(|(address, peer)| (address.clone(), peer.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn clear(&mut self) {
        self.clients.clear();
    }
}
