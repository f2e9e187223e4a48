use super::EvmOutput;
use crate::{
    config::ATOMIC_TX_BASE_COST,
    crypto::Hash,
    fee::{calc_bytes_cost, FeeError},
    serializer::{Reader, ReaderError, Serializer, Writer},
    shared_memory::AtomicRequests,
    utxo::TransferableInput,
};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Pull UTXOs out of the source chain's shared memory
/// and credit them to accounts of this chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedImportTx {
    pub network_id: u32,
    pub blockchain_id: Hash,
    pub source_chain: Hash,
    pub imported_inputs: Vec<TransferableInput>,
    pub outs: Vec<EvmOutput>,
}

impl UnsignedImportTx {
    pub fn gas_used(&self, unsigned_bytes: &[u8], fixed_fee: bool) -> Result<u64, FeeError> {
        let mut cost = calc_bytes_cost(unsigned_bytes.len())?;
        for input in &self.imported_inputs {
            let input_cost = input.input.cost().map_err(|_| FeeError::GasOverflow)?;
            cost = cost.checked_add(input_cost).ok_or(FeeError::GasOverflow)?;
        }

        if fixed_fee {
            cost = cost
                .checked_add(ATOMIC_TX_BASE_COST)
                .ok_or(FeeError::GasOverflow)?;
        }
        Ok(cost)
    }

    // Amount of the asset consumed but not credited, None on overflow or if more is credited
    pub fn burned(&self, asset: &Hash) -> Option<u64> {
        let mut spent = 0u64;
        for out in self.outs.iter().filter(|o| o.asset_id == *asset) {
            spent = spent.checked_add(out.amount)?;
        }

        let mut input = 0u64;
        for imported in self.imported_inputs.iter().filter(|i| i.asset_id == *asset) {
            input = input.checked_add(imported.amount())?;
        }

        input.checked_sub(spent)
    }

    // Shared memory keys of the consumed UTXOs
    pub fn input_utxos(&self) -> IndexSet<Hash> {
        self.imported_inputs.iter().map(TransferableInput::input_id).collect()
    }

    // Consume the imported UTXOs from the source chain
    pub fn atomic_ops(&self) -> (Hash, AtomicRequests) {
        let requests = AtomicRequests {
            remove_requests: self
                .imported_inputs
                .iter()
                .map(|input| input.input_id().as_bytes().to_vec())
                .collect(),
            put_requests: Vec::new(),
        };
        (self.source_chain.clone(), requests)
    }
}

impl Serializer for UnsignedImportTx {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            network_id: reader.read_u32()?,
            blockchain_id: Hash::read(reader)?,
            source_chain: Hash::read(reader)?,
            imported_inputs: Vec::read(reader)?,
            outs: Vec::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(self.network_id);
        self.blockchain_id.write(writer);
        self.source_chain.write(writer);
        self.imported_inputs.write(writer);
        self.outs.write(writer);
    }

    fn size(&self) -> usize {
        4 + self.blockchain_id.size()
            + self.source_chain.size()
            + self.imported_inputs.size()
            + self.outs.size()
    }
}
