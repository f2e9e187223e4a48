mod conflict;
mod error;
mod export;
mod import;
mod state;

pub use conflict::{verify_block_atomic_txs, verify_no_conflicts};
pub use error::*;
pub use state::*;

use log::{debug, trace};
use primitive_types::U256;

use super::{Transaction, UnsignedAtomicTx};
use crate::{
    codec::Codec,
    config::AXIA_ATOMIC_TX_FEE,
    context::ChainContext,
    crypto::Hash,
    fee::{calculate_dynamic_fee, FeeError},
    flow::FlowChecker,
    upgrades::Rules,
};

// Chains a transaction may trade with: the swap chain only before
// Apricot phase 5, any other chain of our allychain after
fn verify_peer_chain<E>(
    ctx: &ChainContext,
    rules: Rules,
    peer: &Hash,
) -> Result<(), VerificationError<E>> {
    if rules.is_apricot_phase_5 {
        ctx.verify_same_allychain(peer)?;
    } else if *peer != ctx.swap_chain_id {
        return Err(VerificationError::WrongChainId(peer.clone()));
    }
    Ok(())
}

fn verify_network<E>(
    ctx: &ChainContext,
    network_id: u32,
    blockchain_id: &Hash,
) -> Result<(), VerificationError<E>> {
    if network_id != ctx.network_id {
        return Err(VerificationError::WrongNetworkId {
            expected: ctx.network_id,
            got: network_id,
        });
    }

    if *blockchain_id != ctx.chain_id {
        return Err(VerificationError::WrongBlockchainId {
            expected: ctx.chain_id.clone(),
            got: blockchain_id.clone(),
        });
    }
    Ok(())
}

impl Transaction {
    /// Fee in native base units this transaction must burn under the rules
    pub fn required_fee(&self, rules: Rules, base_fee: Option<U256>) -> Result<u64, FeeError> {
        if rules.is_apricot_phase_3 {
            let gas_used = self.gas_used(rules.is_apricot_phase_5)?;
            return calculate_dynamic_fee(gas_used, base_fee);
        }

        match self.get_unsigned() {
            UnsignedAtomicTx::Import(_) if !rules.is_apricot_phase_2 => Ok(0),
            _ => Ok(AXIA_ATOMIC_TX_FEE),
        }
    }

    /// Stateless checks, depending only on the transaction, the chain identity and the rules
    pub fn verify<E>(
        &self,
        ctx: &ChainContext,
        rules: Rules,
        codec: &Codec,
    ) -> Result<(), VerificationError<E>> {
        match self.get_unsigned() {
            UnsignedAtomicTx::Import(tx) => tx.verify(ctx, rules),
            UnsignedAtomicTx::Export(tx) => tx.verify(ctx, rules, codec),
        }
    }

    /// Full verification against the state the transaction would be included in.
    ///
    /// `parent` is the parent of the block including the transaction,
    /// `base_fee` is only required once dynamic fees are active.
    pub async fn semantic_verify<E, B: AtomicVerificationState<E>>(
        &self,
        ctx: &ChainContext,
        codec: &Codec,
        rules: Rules,
        base_fee: Option<U256>,
        parent: &Hash,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        trace!("Semantic verification of atomic tx {}", self.id());
        self.verify(ctx, rules, codec)?;

        let mut flow = FlowChecker::new(ctx.native_asset_id.clone());
        flow.produce(&ctx.native_asset_id, self.required_fee(rules, base_fee)?);
        match self.get_unsigned() {
            UnsignedAtomicTx::Import(tx) => tx.fill_flow(&mut flow),
            UnsignedAtomicTx::Export(tx) => tx.fill_flow(&mut flow),
        }
        flow.verify()?;

        let inputs = self.get_unsigned().inputs_count();
        let credentials = self.get_credentials().len();
        if inputs != credentials {
            return Err(VerificationError::MismatchedCredentials {
                inputs,
                credentials,
            });
        }

        match self.get_unsigned() {
            UnsignedAtomicTx::Import(tx) => {
                if !state.is_bootstrapped().await.map_err(VerificationError::State)? {
                    debug!("Accepting import {} without shared memory checks while bootstrapping", self.id());
                    return Ok(());
                }

                tx.verify_utxos(self, codec, state).await?;
                verify_no_conflicts(&tx.input_utxos(), parent, state).await
            }
            UnsignedAtomicTx::Export(tx) => tx.verify_signers(self),
        }
    }

    /// Apply the transaction to the account ledger
    pub async fn evm_state_transfer<E, B: AtomicApplyState<E>>(
        &self,
        ctx: &ChainContext,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        match self.get_unsigned() {
            UnsignedAtomicTx::Import(tx) => tx.evm_state_transfer(ctx, state).await,
            UnsignedAtomicTx::Export(tx) => tx.evm_state_transfer(ctx, state).await,
        }
    }
}
