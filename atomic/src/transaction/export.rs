use super::EvmInput;
use crate::{
    codec::{Codec, CodecError},
    config::{ATOMIC_TX_BASE_COST, COST_PER_SIGNATURE},
    crypto::Hash,
    fee::{calc_bytes_cost, FeeError},
    serializer::{Reader, ReaderError, Serializer, Writer},
    shared_memory::{AtomicElement, AtomicRequests},
    utxo::{TransferableOutput, Utxo, UtxoId},
};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Debit accounts of this chain and hand UTXOs
/// to the destination chain through shared memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedExportTx {
    pub network_id: u32,
    pub blockchain_id: Hash,
    pub destination_chain: Hash,
    pub ins: Vec<EvmInput>,
    pub exported_outputs: Vec<TransferableOutput>,
}

impl UnsignedExportTx {
    // Each input is signed by exactly one key
    pub fn gas_used(&self, unsigned_bytes: &[u8], fixed_fee: bool) -> Result<u64, FeeError> {
        let byte_cost = calc_bytes_cost(unsigned_bytes.len())?;
        let sig_cost = (self.ins.len() as u64)
            .checked_mul(COST_PER_SIGNATURE)
            .ok_or(FeeError::GasOverflow)?;
        let mut cost = byte_cost.checked_add(sig_cost).ok_or(FeeError::GasOverflow)?;

        if fixed_fee {
            cost = cost
                .checked_add(ATOMIC_TX_BASE_COST)
                .ok_or(FeeError::GasOverflow)?;
        }
        Ok(cost)
    }

    // Amount of the asset debited but not exported, None on overflow or if more is exported
    pub fn burned(&self, asset: &Hash) -> Option<u64> {
        let mut spent = 0u64;
        for out in self.exported_outputs.iter().filter(|o| o.asset_id == *asset) {
            spent = spent.checked_add(out.amount())?;
        }

        let mut input = 0u64;
        for debit in self.ins.iter().filter(|i| i.asset_id == *asset) {
            input = input.checked_add(debit.amount)?;
        }

        input.checked_sub(spent)
    }

    // (address, nonce) pairs being spent
    pub fn input_utxos(&self) -> IndexSet<Hash> {
        self.ins.iter().map(EvmInput::input_id).collect()
    }

    // Produce one UTXO per exported output for the destination chain.
    // Each UTXO is indexed by its owners so they can find it
    pub fn atomic_ops(&self, tx_id: &Hash, codec: &Codec) -> Result<(Hash, AtomicRequests), CodecError> {
        let mut put_requests = Vec::with_capacity(self.exported_outputs.len());
        for (i, out) in self.exported_outputs.iter().enumerate() {
            let utxo = Utxo {
                utxo_id: UtxoId::new(tx_id.clone(), i as u32),
                asset_id: out.asset_id.clone(),
                output: out.output.clone(),
            };

            put_requests.push(AtomicElement {
                key: utxo.input_id().as_bytes().to_vec(),
                value: codec.marshal(&utxo)?,
                traits: utxo.output.owners.traits(),
            });
        }

        let requests = AtomicRequests {
            remove_requests: Vec::new(),
            put_requests,
        };
        Ok((self.destination_chain.clone(), requests))
    }
}

impl Serializer for UnsignedExportTx {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            network_id: reader.read_u32()?,
            blockchain_id: Hash::read(reader)?,
            destination_chain: Hash::read(reader)?,
            ins: Vec::read(reader)?,
            exported_outputs: Vec::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self.network_id);
        self.blockchain_id.write(writer);
        self.destination_chain.write(writer);
        self.ins.write(writer);
        self.exported_outputs.write(writer);
    }

    fn size(&self) -> usize {
        4 + self.blockchain_id.size()
            + self.destination_chain.size()
            + self.ins.size()
            + self.exported_outputs.size()
    }
}
