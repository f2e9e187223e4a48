use indexmap::IndexMap;
use log::debug;
use primitive_types::U256;

use super::{verify_network, verify_peer_chain, AtomicApplyState, VerificationError};
use crate::{
    codec::Codec,
    config::{PLATFORM_CHAIN_ID, X2C_RATE},
    context::ChainContext,
    crypto::{EthAddress, Hash, PublicKey},
    flow::FlowChecker,
    transaction::{is_sorted_and_unique_evm_inputs, EvmInput, Transaction, UnsignedExportTx},
    upgrades::Rules,
    utxo::is_sorted_outputs,
};

impl UnsignedExportTx {
    pub fn verify<E>(
        &self,
        ctx: &ChainContext,
        rules: Rules,
        codec: &Codec,
    ) -> Result<(), VerificationError<E>> {
        if self.exported_outputs.is_empty() {
            return Err(VerificationError::NoExportOutputs);
        }

        verify_network(ctx, self.network_id, &self.blockchain_id)?;
        verify_peer_chain(ctx, rules, &self.destination_chain)?;

        for input in &self.ins {
            input.verify().map_err(VerificationError::EvmInput)?;
        }

        for out in &self.exported_outputs {
            out.output.verify().map_err(VerificationError::AtomicOutput)?;
            if out.asset_id != ctx.native_asset_id && self.destination_chain == PLATFORM_CHAIN_ID {
                return Err(VerificationError::NonNativeToPlatformChain(out.asset_id.clone()));
            }
        }

        if !is_sorted_outputs(&self.exported_outputs, codec) {
            return Err(VerificationError::OutputsNotSorted);
        }

        if rules.is_apricot_phase_1 && !is_sorted_and_unique_evm_inputs(&self.ins) {
            return Err(VerificationError::InputsNotSortedUnique);
        }

        Ok(())
    }

    pub(super) fn fill_flow(&self, flow: &mut FlowChecker) {
        for out in &self.exported_outputs {
            flow.produce(&out.asset_id, out.amount());
        }
        for input in &self.ins {
            flow.consume(&input.asset_id, input.amount);
        }
    }

    // Each input must be signed by the account it debits
    pub(super) fn verify_signers<E>(&self, tx: &Transaction) -> Result<(), VerificationError<E>> {
        let signing_hash = tx.get_signing_hash();
        for (input, credential) in self.ins.iter().zip(tx.get_credentials()) {
            let signature = match credential.signatures() {
                [signature] => signature,
                sigs => return Err(VerificationError::ExpectedOneSignature(sigs.len())),
            };

            let signer = PublicKey::recover_from_hash(&signing_hash, signature)?.eth_address();
            if signer != input.address {
                return Err(VerificationError::PublicKeySignatureMismatch {
                    expected: input.address,
                    got: signer,
                });
            }
        }
        Ok(())
    }

    // Amount debited from the ledger, native amounts are scaled to ledger units
    fn ledger_amount(ctx: &ChainContext, input: &EvmInput) -> U256 {
        if input.asset_id == ctx.native_asset_id {
            U256::from(input.amount) * U256::from(X2C_RATE)
        } else {
            U256::from(input.amount)
        }
    }

    async fn get_ledger_balance<E, B: AtomicApplyState<E>>(
        ctx: &ChainContext,
        state: &mut B,
        address: &EthAddress,
        asset: &Hash,
    ) -> Result<U256, VerificationError<E>> {
        let balance = if *asset == ctx.native_asset_id {
            state.get_balance(address).await
        } else {
            state.get_balance_multi_coin(address, asset).await
        };
        balance.map_err(VerificationError::State)
    }

    // Every input is checked before the ledger is touched,
    // so a failing export leaves balances and nonces unchanged
    pub(super) async fn evm_state_transfer<E, B: AtomicApplyState<E>>(
        &self,
        ctx: &ChainContext,
        state: &mut B,
    ) -> Result<(), VerificationError<E>> {
        let mut debits: IndexMap<(EthAddress, Hash), U256> = IndexMap::new();
        let mut next_nonces: IndexMap<EthAddress, u64> = IndexMap::new();

        for input in &self.ins {
            let key = (input.address, input.asset_id.clone());
            let required = debits
                .get(&key)
                .copied()
                .unwrap_or_default()
                .checked_add(Self::ledger_amount(ctx, input))
                .ok_or(VerificationError::Overflow)?;

            let available =
                Self::get_ledger_balance(ctx, state, &input.address, &input.asset_id).await?;
            if available < required {
                return Err(VerificationError::InsufficientFunds {
                    address: input.address,
                    asset: input.asset_id.clone(),
                    required,
                    available,
                });
            }
            debits.insert(key, required);

            let nonce = state
                .get_nonce(&input.address)
                .await
                .map_err(VerificationError::State)?;
            if nonce != input.nonce {
                return Err(VerificationError::InvalidNonce {
                    address: input.address,
                    expected: nonce,
                    got: input.nonce,
                });
            }

            let next = input.nonce.checked_add(1).ok_or(VerificationError::Overflow)?;
            next_nonces.insert(input.address, next);
        }

        for input in &self.ins {
            debug!(
                "crosschain dest: {}, addr: {}, amount: {}, asset: {}",
                self.destination_chain, input.address, input.amount, input.asset_id
            );

            let amount = Self::ledger_amount(ctx, input);
            let result = if input.asset_id == ctx.native_asset_id {
                state.sub_balance(&input.address, amount).await
            } else {
                state
                    .sub_balance_multi_coin(&input.address, &input.asset_id, amount)
                    .await
            };
            result.map_err(VerificationError::State)?;
        }

        for (address, nonce) in next_nonces {
            state
                .set_nonce(&address, nonce)
                .await
                .map_err(VerificationError::State)?;
        }

        Ok(())
    }
}
