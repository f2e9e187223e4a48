use crate::crypto::Hash;
use async_trait::async_trait;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SharedMemoryError {
    #[error("Key {key} not found in values shared by chain {peer}")]
    NotFound { peer: Hash, key: String },
    #[error("Key {key} already shared with chain {peer}")]
    DuplicateKey { peer: Hash, key: String },
    #[error("Shared memory unavailable: {0}")]
    Unavailable(String),
}

/// Value handed to another chain, indexed by its traits (owner addresses)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicElement {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    pub traits: Vec<Vec<u8>>,
}

/// Mutation of the partition shared with a single peer chain
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AtomicRequests {
    // Keys produced by the peer and consumed by this chain
    pub remove_requests: Vec<Vec<u8>>,
    // Values produced by this chain for the peer
    pub put_requests: Vec<AtomicElement>,
}

impl AtomicRequests {
    pub fn is_empty(&self) -> bool {
        self.remove_requests.is_empty() && self.put_requests.is_empty()
    }
}

/// View of the cross-chain store from one chain
#[async_trait]
pub trait SharedMemory: Send + Sync {
    /// Values the peer chain produced for us, in the order of the keys
    async fn get(&self, peer_chain: &Hash, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, SharedMemoryError>;

    /// Values the peer chain produced for us having at least one of the traits,
    /// in key order
    async fn indexed(
        &self,
        peer_chain: &Hash,
        traits: &[Vec<u8>],
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, SharedMemoryError>;

    /// Apply all requests or none of them
    async fn apply(&self, requests: &HashMap<Hash, AtomicRequests>) -> Result<(), SharedMemoryError>;
}

#[derive(Debug, Clone)]
struct Element {
    value: Vec<u8>,
    traits: Vec<Vec<u8>>,
}

// (producer chain, consumer chain)
type PartitionKey = (Hash, Hash);

/// In-memory cross-chain store shared by every chain view
#[derive(Debug, Default)]
pub struct Memory {
    partitions: RwLock<HashMap<PartitionKey, BTreeMap<Vec<u8>, Element>>>,
}

impl Memory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn view(self: &Arc<Self>, chain_id: Hash) -> ChainMemory {
        ChainMemory {
            chain_id,
            memory: Arc::clone(self),
        }
    }
}

/// [`SharedMemory`] of a single chain backed by [`Memory`]
#[derive(Debug, Clone)]
pub struct ChainMemory {
    chain_id: Hash,
    memory: Arc<Memory>,
}

impl ChainMemory {
    pub fn get_chain_id(&self) -> &Hash {
        &self.chain_id
    }
}

#[async_trait]
impl SharedMemory for ChainMemory {
    async fn get(&self, peer_chain: &Hash, keys: &[Vec<u8>]) -> Result<Vec<Vec<u8>>, SharedMemoryError> {
        let partitions = self.memory.partitions.read().await;
        let partition = partitions.get(&(peer_chain.clone(), self.chain_id.clone()));

        keys.iter()
            .map(|key| {
                partition
                    .and_then(|p| p.get(key))
                    .map(|element| element.value.clone())
                    .ok_or_else(|| SharedMemoryError::NotFound {
                        peer: peer_chain.clone(),
                        key: hex::encode(key),
                    })
            })
            .collect()
    }

    async fn indexed(
        &self,
        peer_chain: &Hash,
        traits: &[Vec<u8>],
        limit: usize,
    ) -> Result<Vec<Vec<u8>>, SharedMemoryError> {
        let partitions = self.memory.partitions.read().await;
        let Some(partition) = partitions.get(&(peer_chain.clone(), self.chain_id.clone())) else {
            return Ok(Vec::new());
        };

        let wanted: HashSet<&Vec<u8>> = traits.iter().collect();
        Ok(partition
            .values()
            .filter(|element| element.traits.iter().any(|t| wanted.contains(t)))
            .take(limit)
            .map(|element| element.value.clone())
            .collect())
    }

    async fn apply(&self, requests: &HashMap<Hash, AtomicRequests>) -> Result<(), SharedMemoryError> {
        let mut partitions = self.memory.partitions.write().await;

        // Check the whole batch before touching anything
        for (peer, request) in requests {
            let inbound = partitions.get(&(peer.clone(), self.chain_id.clone()));
            for key in &request.remove_requests {
                if !inbound.is_some_and(|p| p.contains_key(key)) {
                    return Err(SharedMemoryError::NotFound {
                        peer: peer.clone(),
                        key: hex::encode(key),
                    });
                }
            }

            let outbound = partitions.get(&(self.chain_id.clone(), peer.clone()));
            let mut seen = HashSet::new();
            for element in &request.put_requests {
                if !seen.insert(&element.key)
                    || outbound.is_some_and(|p| p.contains_key(&element.key))
                {
                    return Err(SharedMemoryError::DuplicateKey {
                        peer: peer.clone(),
                        key: hex::encode(&element.key),
                    });
                }
            }
        }

        for (peer, request) in requests {
            if request.is_empty() {
                continue;
            }

            debug!(
                "Applying {} removes and {} puts shared with chain {}",
                request.remove_requests.len(),
                request.put_requests.len(),
                peer
            );

            if let Some(inbound) = partitions.get_mut(&(peer.clone(), self.chain_id.clone())) {
                for key in &request.remove_requests {
                    trace!("remove {}", hex::encode(key));
                    inbound.remove(key);
                }
            }

            let outbound = partitions
                .entry((self.chain_id.clone(), peer.clone()))
                .or_default();
            for element in &request.put_requests {
                trace!("put {}", hex::encode(&element.key));
                outbound.insert(
                    element.key.clone(),
                    Element {
                        value: element.value.clone(),
                        traits: element.traits.clone(),
                    },
                );
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(byte: u8) -> Hash {
        Hash::new([byte; 32])
    }

    fn element(key: u8, value: u8, owner: u8) -> AtomicElement {
        AtomicElement {
            key: vec![key],
            value: vec![value],
            traits: vec![vec![owner]],
        }
    }

    fn puts(elements: Vec<AtomicElement>) -> AtomicRequests {
        AtomicRequests {
            remove_requests: Vec::new(),
            put_requests: elements,
        }
    }

    #[tokio::test]
    async fn test_put_then_get_from_peer() {
        let memory = Memory::new();
        let a = memory.view(id(1));
        let b = memory.view(id(2));

        let requests = HashMap::from([(id(2), puts(vec![element(1, 10, 7), element(2, 20, 8)]))]);
        a.apply(&requests).await.unwrap();

        assert_eq!(b.get(&id(1), &[vec![2], vec![1]]).await.unwrap(), vec![vec![20], vec![10]]);
        // Values are only visible to the consuming chain
        assert!(matches!(
            a.get(&id(2), &[vec![1]]).await,
            Err(SharedMemoryError::NotFound { .. })
        ));
        assert_eq!(b.indexed(&id(1), &[vec![8]], 10).await.unwrap(), vec![vec![20]]);
        assert_eq!(b.indexed(&id(1), &[vec![7], vec![8]], 1).await.unwrap(), vec![vec![10]]);
    }

    #[tokio::test]
    async fn test_remove_is_all_or_nothing() {
        let memory = Memory::new();
        let a = memory.view(id(1));
        let b = memory.view(id(2));
        a.apply(&HashMap::from([(id(2), puts(vec![element(1, 10, 7)]))]))
            .await
            .unwrap();

        let requests = HashMap::from([(
            id(1),
            AtomicRequests {
                remove_requests: vec![vec![1], vec![9]],
                put_requests: vec![element(5, 50, 7)],
            },
        )]);
        assert!(matches!(
            b.apply(&requests).await,
            Err(SharedMemoryError::NotFound { .. })
        ));
        // Nothing was consumed nor produced
        assert_eq!(b.get(&id(1), &[vec![1]]).await.unwrap(), vec![vec![10]]);
        assert!(a.get(&id(2), &[vec![5]]).await.is_err());

        let requests = HashMap::from([(
            id(1),
            AtomicRequests {
                remove_requests: vec![vec![1]],
                put_requests: Vec::new(),
            },
        )]);
        b.apply(&requests).await.unwrap();
        assert!(b.get(&id(1), &[vec![1]]).await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_put() {
        let memory = Memory::new();
        let a = memory.view(id(1));
        let requests = HashMap::from([(id(2), puts(vec![element(1, 10, 7), element(1, 11, 7)]))]);
        assert!(matches!(
            a.apply(&requests).await,
            Err(SharedMemoryError::DuplicateKey { .. })
        ));
    }
}
