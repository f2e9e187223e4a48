use crate::crypto::Hash;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContextError {
    #[error("Peer chain is the local chain")]
    SameChainId,
    #[error("Unknown allychain for chain {0}")]
    UnknownChain(Hash),
    #[error("Chain {chain} belongs to allychain {got}, expected {expected}")]
    MismatchedAllychain { chain: Hash, expected: Hash, got: Hash },
}

/// Identity of the local chain and of the chains it may trade with.
/// Read-only once built and shared by every verification.
#[derive(Debug, Clone)]
pub struct ChainContext {
    pub network_id: u32,
    pub chain_id: Hash,
    pub allychain_id: Hash,
    // Only peer allowed before Apricot phase 5
    pub swap_chain_id: Hash,
    pub native_asset_id: Hash,
    allychains: HashMap<Hash, Hash>,
}

impl ChainContext {
    pub fn new(
        network_id: u32,
        chain_id: Hash,
        allychain_id: Hash,
        swap_chain_id: Hash,
        native_asset_id: Hash,
    ) -> Self {
        let mut allychains = HashMap::new();
        allychains.insert(chain_id.clone(), allychain_id.clone());
        allychains.insert(swap_chain_id.clone(), allychain_id.clone());
        Self {
            network_id,
            chain_id,
            allychain_id,
            swap_chain_id,
            native_asset_id,
            allychains,
        }
    }

    // Register the allychain a chain validates in
    pub fn with_chain(mut self, chain: Hash, allychain: Hash) -> Self {
        self.allychains.insert(chain, allychain);
        self
    }

    pub fn get_allychain(&self, chain: &Hash) -> Option<&Hash> {
        self.allychains.get(chain)
    }

    // A peer must be another chain validated by the same allychain
    pub fn verify_same_allychain(&self, peer: &Hash) -> Result<(), ContextError> {
        if *peer == self.chain_id {
            return Err(ContextError::SameChainId);
        }

        let allychain = self
            .get_allychain(peer)
            .ok_or_else(|| ContextError::UnknownChain(peer.clone()))?;
        if *allychain != self.allychain_id {
            return Err(ContextError::MismatchedAllychain {
                chain: peer.clone(),
                expected: self.allychain_id.clone(),
                got: allychain.clone(),
            });
        }
        Ok(())
    }
}
