//! Wallet side construction of atomic transactions:
//! select what to spend, compute the fee, sort, sign and self-verify.

mod spendable;
mod state;

pub use spendable::{get_spendable_funds, get_spendable_native_with_fee, SpendableInputs};
pub use state::AccountState;

use indexmap::IndexMap;
use log::{debug, trace};
use primitive_types::U256;
use thiserror::Error;

use super::{
    sort_evm_outputs, verify::VerificationError, EvmOutput, Transaction, TransactionError,
    UnsignedAtomicTx, UnsignedExportTx, UnsignedImportTx,
};
use crate::{
    codec::{Codec, CodecError},
    config::{AXIA_ATOMIC_TX_FEE, EVM_OUTPUT_GAS},
    context::ChainContext,
    crypto::{EthAddress, Hash, PrivateKey, ShortId},
    fee::{calculate_dynamic_fee, FeeError},
    fx::{Keychain, OutputOwners, TransferOutput},
    shared_memory::{SharedMemory, SharedMemoryError},
    upgrades::Rules,
    utxo::{sort_outputs, sort_with_signers, TransferableInput, TransferableOutput, Utxo},
};

#[derive(Error, Debug)]
pub enum GenerationError<T> {
    #[error("Error in the state: {0}")]
    State(T),
    #[error("Problem retrieving atomic UTXOs: {0}")]
    AtomicUtxos(SharedMemoryError),
    #[error("Failed to decode atomic UTXO: {0}")]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Transaction(#[from] TransactionError),
    #[error(transparent)]
    Fee(#[from] FeeError),
    #[error("Insufficient funds for asset {asset}: {missing} missing")]
    InsufficientFunds { asset: Hash, missing: u64 },
    #[error("Insufficient funds to pay the fee: imported {imported}, fee {fee}")]
    InsufficientFundsForFee { imported: u64, fee: u64 },
    #[error("No EVM outputs would be produced")]
    NoEvmOutputs,
    #[error("Overflow while computing the transaction amounts")]
    Overflow,
    #[error("Built transaction is invalid: {0}")]
    Verification(VerificationError<T>),
}

/// UTXOs shared with us by `chain` and owned by any of the addresses
pub async fn get_atomic_utxos<S: SharedMemory + ?Sized>(
    shared_memory: &S,
    codec: &Codec,
    chain: &Hash,
    addresses: &[ShortId],
    limit: usize,
) -> Result<Vec<Utxo>, GenerationError<SharedMemoryError>> {
    let traits: Vec<Vec<u8>> = addresses.iter().map(|a| a.as_bytes().to_vec()).collect();
    let values = shared_memory
        .indexed(chain, &traits, limit)
        .await
        .map_err(GenerationError::AtomicUtxos)?;

    values
        .iter()
        .map(|bytes| codec.unmarshal(bytes).map_err(GenerationError::from))
        .collect()
}

/// Builds atomic transactions for the chain described by the context,
/// under the rules of the block they are expected to land in.
pub struct AtomicTxBuilder<'a> {
    ctx: &'a ChainContext,
    codec: &'a Codec,
    rules: Rules,
    // Time used to decide whether UTXOs are still timelocked
    now: u64,
}

impl<'a> AtomicTxBuilder<'a> {
    pub fn new(ctx: &'a ChainContext, codec: &'a Codec, rules: Rules, now: u64) -> Self {
        Self {
            ctx,
            codec,
            rules,
            now,
        }
    }

    fn finalize<T>(
        &self,
        unsigned: UnsignedAtomicTx,
        signers: &[Vec<PrivateKey>],
    ) -> Result<Transaction, GenerationError<T>> {
        let tx = Transaction::sign(self.codec, unsigned, signers)?;
        tx.verify::<T>(self.ctx, self.rules, self.codec)
            .map_err(GenerationError::Verification)?;

        debug!("Built atomic tx {}", tx.id());
        Ok(tx)
    }

    /// Import everything the keys can spend from the source chain to `to`
    pub async fn new_import_tx<S: SharedMemory + ?Sized>(
        &self,
        shared_memory: &S,
        source_chain: &Hash,
        to: EthAddress,
        base_fee: Option<U256>,
        keys: &[PrivateKey],
    ) -> Result<Transaction, GenerationError<SharedMemoryError>> {
        let keychain = Keychain::from_keys(keys.iter().cloned());
        let addresses: Vec<ShortId> = keychain.addresses().copied().collect();
        let utxos = get_atomic_utxos(shared_memory, self.codec, source_chain, &addresses, usize::MAX).await?;

        self.new_import_tx_with_utxos(source_chain, to, base_fee, &keychain, &utxos)
    }

    /// Import the given UTXOs the keychain can spend.
    /// Non native assets get one output each, the native asset pays the fee
    /// and what is left becomes a change output.
    pub fn new_import_tx_with_utxos<T>(
        &self,
        source_chain: &Hash,
        to: EthAddress,
        base_fee: Option<U256>,
        keychain: &Keychain,
        utxos: &[Utxo],
    ) -> Result<Transaction, GenerationError<T>> {
        let mut imported_inputs = Vec::new();
        let mut signers = Vec::new();
        let mut imported_amounts: IndexMap<Hash, u64> = IndexMap::new();

        for utxo in utxos {
            let Ok((input, keys)) = keychain.spend(&utxo.output, self.now) else {
                trace!("cannot spend UTXO {}", utxo.input_id());
                continue;
            };

            let total = imported_amounts.entry(utxo.asset_id.clone()).or_insert(0);
            *total = total.checked_add(input.amt).ok_or(GenerationError::Overflow)?;

            imported_inputs.push(TransferableInput {
                utxo_id: utxo.utxo_id.clone(),
                asset_id: utxo.asset_id.clone(),
                input,
            });
            signers.push(keys);
        }
        sort_with_signers(&mut imported_inputs, &mut signers, |i| i.utxo_id.clone());

        let native_amount = imported_amounts
            .get(&self.ctx.native_asset_id)
            .copied()
            .unwrap_or(0);

        // One output per non native asset, unique by construction
        let mut outs: Vec<EvmOutput> = imported_amounts
            .iter()
            .filter(|(asset, amount)| **asset != self.ctx.native_asset_id && **amount > 0)
            .map(|(asset, amount)| EvmOutput::new(to, *amount, asset.clone()))
            .collect();

        let (fee_without_change, fee_with_change) = if self.rules.is_apricot_phase_3 {
            if base_fee.is_none() {
                return Err(FeeError::NilBaseFee.into());
            }

            let unsigned = UnsignedAtomicTx::Import(UnsignedImportTx {
                network_id: self.ctx.network_id,
                blockchain_id: self.ctx.chain_id.clone(),
                source_chain: source_chain.clone(),
                imported_inputs: imported_inputs.clone(),
                outs: outs.clone(),
            });
            let estimate = Transaction::sign(self.codec, unsigned, &[])?;
            let gas_without_change = estimate.gas_used(self.rules.is_apricot_phase_5)?;
            let gas_with_change = gas_without_change
                .checked_add(EVM_OUTPUT_GAS)
                .ok_or(GenerationError::Overflow)?;

            (
                calculate_dynamic_fee(gas_without_change, base_fee)?,
                calculate_dynamic_fee(gas_with_change, base_fee)?,
            )
        } else if self.rules.is_apricot_phase_2 {
            (AXIA_ATOMIC_TX_FEE, AXIA_ATOMIC_TX_FEE)
        } else {
            (0, 0)
        };

        if native_amount < fee_without_change {
            return Err(GenerationError::InsufficientFundsForFee {
                imported: native_amount,
                fee: fee_without_change,
            });
        }

        if native_amount > fee_with_change {
            outs.push(EvmOutput::new(
                to,
                native_amount - fee_with_change,
                self.ctx.native_asset_id.clone(),
            ));
        }

        // Exactly enough native asset for the fee and nothing else to import
        if outs.is_empty() {
            return Err(GenerationError::NoEvmOutputs);
        }
        sort_evm_outputs(&mut outs);

        let unsigned = UnsignedAtomicTx::Import(UnsignedImportTx {
            network_id: self.ctx.network_id,
            blockchain_id: self.ctx.chain_id.clone(),
            source_chain: source_chain.clone(),
            imported_inputs,
            outs,
        });
        self.finalize(unsigned, &signers)
    }

    /// Export `amount` of `asset_id` to `to` on the destination chain,
    /// paying the fee in the native asset from the same keys
    pub fn new_export_tx<S: AccountState>(
        &self,
        state: &S,
        asset_id: &Hash,
        amount: u64,
        destination_chain: &Hash,
        to: ShortId,
        base_fee: Option<U256>,
        keys: &[PrivateKey],
    ) -> Result<Transaction, GenerationError<S::Error>> {
        let mut outs = vec![TransferableOutput {
            asset_id: asset_id.clone(),
            output: TransferOutput::new(amount, OutputOwners::new(0, 1, vec![to])),
        }];

        let (mut ins, mut signers, native_needed) = if *asset_id != self.ctx.native_asset_id {
            let (ins, signers) = get_spendable_funds(self.ctx, state, keys, asset_id, amount)?;
            (ins, signers, 0)
        } else {
            (Vec::new(), Vec::new(), amount)
        };

        let (native_ins, native_signers) = if self.rules.is_apricot_phase_3 {
            let unsigned = UnsignedAtomicTx::Export(UnsignedExportTx {
                network_id: self.ctx.network_id,
                blockchain_id: self.ctx.chain_id.clone(),
                destination_chain: destination_chain.clone(),
                ins: ins.clone(),
                exported_outputs: outs.clone(),
            });
            let estimate = Transaction::sign(self.codec, unsigned, &[])?;
            let cost = estimate.gas_used(self.rules.is_apricot_phase_5)?;

            get_spendable_native_with_fee(self.ctx, state, keys, native_needed, cost, base_fee)?
        } else {
            let needed = native_needed
                .checked_add(AXIA_ATOMIC_TX_FEE)
                .ok_or(GenerationError::Overflow)?;
            get_spendable_funds(self.ctx, state, keys, &self.ctx.native_asset_id, needed)?
        };
        ins.extend(native_ins);
        signers.extend(native_signers);

        sort_outputs(&mut outs, self.codec);
        sort_with_signers(&mut ins, &mut signers, |i| i.sort_key());

        let unsigned = UnsignedAtomicTx::Export(UnsignedExportTx {
            network_id: self.ctx.network_id,
            blockchain_id: self.ctx.chain_id.clone(),
            destination_chain: destination_chain.clone(),
            ins,
            exported_outputs: outs,
        });
        self.finalize(unsigned, &signers)
    }
}
