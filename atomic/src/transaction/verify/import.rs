use log::debug;
use primitive_types::U256;

use super::{verify_network, verify_peer_chain, AtomicApplyState, AtomicVerificationState, VerificationError};
use crate::{
    codec::Codec,
    config::X2C_RATE,
    context::ChainContext,
    flow::FlowChecker,
    fx::verify_transfer,
    transaction::{
        is_sorted_and_unique_evm_outputs, is_sorted_evm_outputs, Transaction, UnsignedImportTx,
    },
    upgrades::Rules,
    utxo::{is_sorted_and_unique_inputs, Utxo},
};

impl UnsignedImportTx {
    pub fn verify<E>(&self, ctx: &ChainContext, rules: Rules) -> Result<(), VerificationError<E>> {
        if self.imported_inputs.is_empty() {
            return Err(VerificationError::NoImportInputs);
        }

        verify_network(ctx, self.network_id, &self.blockchain_id)?;

        if rules.is_apricot_phase_3 && self.outs.is_empty() {
            return Err(VerificationError::NoEvmOutputs);
        }

        verify_peer_chain(ctx, rules, &self.source_chain)?;

        for out in &self.outs {
            out.verify().map_err(VerificationError::EvmOutput)?;
        }

        for input in &self.imported_inputs {
            input.input.verify().map_err(VerificationError::AtomicInput)?;
        }

        if !is_sorted_and_unique_inputs(&self.imported_inputs) {
            return Err(VerificationError::InputsNotSortedUnique);
        }

        if rules.is_apricot_phase_2 {
            if !is_sorted_and_unique_evm_outputs(&self.outs) {
                return Err(VerificationError::OutputsNotSortedUnique);
            }
        } else if rules.is_apricot_phase_1 && !is_sorted_evm_outputs(&self.outs) {
            return Err(VerificationError::OutputsNotSorted);
        }

        Ok(())
    }

    pub(super) fn fill_flow(&self, flow: &mut FlowChecker) {
        for out in &self.outs {
            flow.produce(&out.asset_id, out.amount);
        }
        for input in &self.imported_inputs {
            flow.consume(&input.asset_id, input.amount());
        }
    }

    // Every imported UTXO must exist in the source chain's shared memory,
    // hold the claimed asset and be spendable with the supplied credential
    pub(super) async fn verify_utxos<E, B: AtomicVerificationState<E>>(
        &self,
        tx: &Transaction,
        codec: &Codec,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        let keys: Vec<Vec<u8>> = self
            .imported_inputs
            .iter()
            .map(|input| input.input_id().as_bytes().to_vec())
            .collect();

        let values = state
            .get_shared_utxos(&self.source_chain, &keys)
            .await
            .map_err(|error| VerificationError::FetchUtxos {
                chain: self.source_chain.clone(),
                error,
            })?;
        if values.len() != keys.len() {
            return Err(VerificationError::UtxoCount {
                expected: keys.len(),
                got: values.len(),
            });
        }

        let now = state
            .get_verification_timestamp()
            .await
            .map_err(VerificationError::State)?;
        let signing_hash = tx.get_signing_hash();

        for ((input, bytes), credential) in self
            .imported_inputs
            .iter()
            .zip(&values)
            .zip(tx.get_credentials())
        {
            let utxo: Utxo = codec
                .unmarshal(bytes)
                .map_err(VerificationError::UnmarshalUtxo)?;

            if utxo.asset_id != input.asset_id {
                return Err(VerificationError::AssetIdMismatch {
                    expected: input.asset_id.clone(),
                    got: utxo.asset_id,
                });
            }

            verify_transfer(&signing_hash, &input.input, credential, &utxo.output, now)
                .map_err(VerificationError::TransferFailed)?;
        }

        Ok(())
    }

    // Credit every output, native amounts are scaled to ledger units
    pub(super) async fn evm_state_transfer<E, B: AtomicApplyState<E>>(
        &self,
        ctx: &ChainContext,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        for out in &self.outs {
            debug!(
                "crosschain src: {}, addr: {}, amount: {}, asset: {}",
                self.source_chain, out.address, out.amount, out.asset_id
            );

            if out.asset_id == ctx.native_asset_id {
                let amount = U256::from(out.amount) * U256::from(X2C_RATE);
                state
                    .add_balance(&out.address, amount)
                    .await
                    .map_err(VerificationError::State)?;
            } else {
                state
                    .add_balance_multi_coin(&out.address, &out.asset_id, U256::from(out.amount))
                    .await
                    .map_err(VerificationError::State)?;
            }
        }
        Ok(())
    }
}
