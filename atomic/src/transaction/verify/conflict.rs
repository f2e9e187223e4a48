use std::sync::Arc;

use indexmap::IndexSet;
use log::{debug, trace};
use primitive_types::U256;

use super::{AtomicVerificationState, VerificationError};
use crate::{
    codec::Codec,
    context::ChainContext,
    crypto::Hash,
    transaction::Transaction,
    upgrades::Rules,
};

/// Reject `inputs` if any of them is already consumed by an atomic transaction
/// of a processing ancestor, walking from `parent` up to the last accepted block.
pub async fn verify_no_conflicts<E, B: AtomicVerificationState<E>>(
    inputs: &IndexSet<Hash>,
    parent: &Hash,
    state: &mut B,
) -> Result<(), VerificationError<E>> {
    let mut ancestor = parent.clone();
    while !state
        .is_block_accepted(&ancestor)
        .await
        .map_err(VerificationError::State)?
    {
        trace!("checking atomic inputs against processing block {}", ancestor);
        let txs = state
            .get_block_atomic_txs(&ancestor)
            .await
            .map_err(VerificationError::State)?;

        for tx in txs {
            if let Some(input) = tx.input_utxos().into_iter().find(|i| inputs.contains(i)) {
                return Err(VerificationError::ConflictingAtomicInputs(input));
            }
        }

        match state
            .get_block_parent(&ancestor)
            .await
            .map_err(VerificationError::State)?
        {
            Some(parent) => ancestor = parent,
            None => return Err(VerificationError::RejectedParent(ancestor)),
        }
    }

    Ok(())
}

/// Verify the atomic transactions of a block built on `parent`.
///
/// Each transaction is semantically verified on its own, then its inputs
/// are checked against those of the transactions before it in the block.
pub async fn verify_block_atomic_txs<E, B: AtomicVerificationState<E>>(
    txs: &[Arc<Transaction>],
    ctx: &ChainContext,
    codec: &Codec,
    rules: Rules,
    base_fee: Option<U256>,
    parent: &Hash,
    state: &mut B,
) -> Result<(), VerificationError<E>> {
    let mut inputs = IndexSet::new();
    for tx in txs {
        tx.semantic_verify(ctx, codec, rules, base_fee, parent, state)
            .await?;

        let tx_inputs = tx.input_utxos();
        if let Some(input) = tx_inputs.iter().find(|i| inputs.contains(*i)) {
            debug!("atomic tx {} spends {} twice in the same block", tx.id(), input);
            return Err(VerificationError::ConflictingAtomicInputs(input.clone()));
        }
        inputs.extend(tx_inputs);
    }

    Ok(())
}
