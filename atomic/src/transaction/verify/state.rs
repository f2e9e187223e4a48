use std::sync::Arc;

use crate::{
    crypto::{EthAddress, Hash},
    transaction::Transaction,
};
use async_trait::async_trait;
use primitive_types::U256;

/// Read-only view of the chain used by the semantic verification.
/// It represents the state at the block being verified: shared memory
/// as seen by this chain and the not yet accepted ancestors of the block.
#[async_trait]
pub trait AtomicVerificationState<E> {
    /// Whether the node finished bootstrapping.
    /// While bootstrapping, imports are accepted without looking at shared memory.
    async fn is_bootstrapped(&self) -> Result<bool, E>;

    /// Timestamp used to check UTXO timelocks
    async fn get_verification_timestamp(&self) -> Result<u64, E>;

    /// Values the peer chain shared with us, in the order of the keys
    async fn get_shared_utxos(
        &mut self,
        peer_chain: &Hash,
        keys: &[Vec<u8>],
    ) -> Result<Vec<Vec<u8>>, E>;

    /// Is the block accepted (finalized)
    async fn is_block_accepted(&mut self, block: &Hash) -> Result<bool, E>;

    /// Parent of a processing block, None if the parent is unknown
    async fn get_block_parent(&mut self, block: &Hash) -> Result<Option<Hash>, E>;

    /// Atomic transactions included in a processing block
    async fn get_block_atomic_txs(&mut self, block: &Hash) -> Result<Vec<Arc<Transaction>>, E>;
}

/// Account ledger mutated once a transaction is accepted.
/// The caller provides atomicity with the shared memory requests.
#[async_trait]
pub trait AtomicApplyState<E> {
    /// Native balance, in ledger units
    async fn get_balance(&mut self, address: &EthAddress) -> Result<U256, E>;

    async fn add_balance(&mut self, address: &EthAddress, amount: U256) -> Result<(), E>;

    async fn sub_balance(&mut self, address: &EthAddress, amount: U256) -> Result<(), E>;

    async fn get_balance_multi_coin(&mut self, address: &EthAddress, asset: &Hash) -> Result<U256, E>;

    async fn add_balance_multi_coin(
        &mut self,
        address: &EthAddress,
        asset: &Hash,
        amount: U256,
    ) -> Result<(), E>;

    async fn sub_balance_multi_coin(
        &mut self,
        address: &EthAddress,
        asset: &Hash,
        amount: U256,
    ) -> Result<(), E>;

    async fn get_nonce(&mut self, address: &EthAddress) -> Result<u64, E>;

    async fn set_nonce(&mut self, address: &EthAddress, nonce: u64) -> Result<(), E>;
}
