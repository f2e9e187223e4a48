mod evm;
mod export;
mod import;

pub mod builder;
pub mod verify;


pub use evm::{
    is_sorted_and_unique_evm_inputs, is_sorted_and_unique_evm_outputs, is_sorted_evm_outputs,
    sort_evm_inputs, sort_evm_outputs, EvmError, EvmInput, EvmOutput,
};
pub use export::UnsignedExportTx;
pub use import::UnsignedImportTx;

use crate::{
    codec::{Codec, CodecError, TypeTag},
    crypto::{hash, CryptoError, Hash, PrivateKey},
    fee::FeeError,
    fx::{Credential, Secp256k1Credential},
    serializer::{Reader, ReaderError, Serializer, Writer},
    shared_memory::AtomicRequests,
};
use indexmap::IndexSet;
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum UnsignedAtomicTx {
    Import(UnsignedImportTx),
    Export(UnsignedExportTx),
}

impl UnsignedAtomicTx {
    pub fn get_network_id(&self) -> u32 {
        match self {
            UnsignedAtomicTx::Import(tx) => tx.network_id,
            UnsignedAtomicTx::Export(tx) => tx.network_id,
        }
    }

    pub fn get_blockchain_id(&self) -> &Hash {
        match self {
            UnsignedAtomicTx::Import(tx) => &tx.blockchain_id,
            UnsignedAtomicTx::Export(tx) => &tx.blockchain_id,
        }
    }

    // Source chain of an import, destination chain of an export
    pub fn get_peer_chain(&self) -> &Hash {
        match self {
            UnsignedAtomicTx::Import(tx) => &tx.source_chain,
            UnsignedAtomicTx::Export(tx) => &tx.destination_chain,
        }
    }

    pub fn inputs_count(&self) -> usize {
        match self {
            UnsignedAtomicTx::Import(tx) => tx.imported_inputs.len(),
            UnsignedAtomicTx::Export(tx) => tx.ins.len(),
        }
    }

    pub fn input_utxos(&self) -> IndexSet<Hash> {
        match self {
            UnsignedAtomicTx::Import(tx) => tx.input_utxos(),
            UnsignedAtomicTx::Export(tx) => tx.input_utxos(),
        }
    }

    pub fn burned(&self, asset: &Hash) -> Option<u64> {
        match self {
            UnsignedAtomicTx::Import(tx) => tx.burned(asset),
            UnsignedAtomicTx::Export(tx) => tx.burned(asset),
        }
    }
}

impl Serializer for UnsignedAtomicTx {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_type_tag()? {
            TypeTag::UnsignedImportTx => UnsignedImportTx::read(reader).map(UnsignedAtomicTx::Import),
            TypeTag::UnsignedExportTx => UnsignedExportTx::read(reader).map(UnsignedAtomicTx::Export),
            got => Err(ReaderError::UnexpectedType {
                expected: "unsigned atomic transaction",
                got,
            }),
        }
    }

    fn write(&self, writer: &mut Writer) {
        match self {
            UnsignedAtomicTx::Import(tx) => {
                writer.write_type_tag(TypeTag::UnsignedImportTx);
                tx.write(writer);
            }
            UnsignedAtomicTx::Export(tx) => {
                writer.write_type_tag(TypeTag::UnsignedExportTx);
                tx.write(writer);
            }
        }
    }

    fn size(&self) -> usize {
        4 + match self {
            UnsignedAtomicTx::Import(tx) => tx.size(),
            UnsignedAtomicTx::Export(tx) => tx.size(),
        }
    }
}

/// Signed atomic transaction: the unsigned transaction and one credential per input.
/// Canonical bytes and ID are computed once, when signing or decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    unsigned: UnsignedAtomicTx,
    credentials: Vec<Credential>,
    unsigned_bytes: Vec<u8>,
    signed_bytes: Vec<u8>,
    id: Hash,
}

impl Transaction {
    /// Sign SHA-256(unsigned bytes) with every key of each signer group,
    /// producing one credential per group.
    /// No signers produces a transaction without credentials, enough to estimate its gas.
    pub fn sign(
        codec: &Codec,
        unsigned: UnsignedAtomicTx,
        signers: &[Vec<PrivateKey>],
    ) -> Result<Self, TransactionError> {
        let unsigned_bytes = codec.marshal(&unsigned)?;
        let signing_hash = hash(&unsigned_bytes);

        let mut credentials = Vec::with_capacity(signers.len());
        for keys in signers {
            let sigs = keys
                .iter()
                .map(|key| key.sign_hash(&signing_hash))
                .collect::<Result<Vec<_>, _>>()?;
            credentials.push(Credential::Secp256k1(Secp256k1Credential { sigs }));
        }

        let mut tx = Self {
            unsigned,
            credentials,
            unsigned_bytes,
            signed_bytes: Vec::new(),
            id: Hash::zero(),
        };
        tx.signed_bytes = codec.marshal(&tx)?;
        tx.id = hash(&tx.signed_bytes);

        if log::log_enabled!(log::Level::Trace) {
            trace!(
                "signed atomic tx {} ({} bytes, {} credentials)",
                tx.id,
                tx.signed_bytes.len(),
                tx.credentials.len()
            );
        }
        Ok(tx)
    }

    pub fn from_bytes(codec: &Codec, bytes: &[u8]) -> Result<Self, CodecError> {
        codec.unmarshal(bytes)
    }

    // Compute the cached bytes and ID
    fn initialize(&mut self, codec: &Codec) -> Result<(), CodecError> {
        self.unsigned_bytes = codec.marshal(&self.unsigned)?;
        self.signed_bytes = codec.marshal(self)?;
        self.id = hash(&self.signed_bytes);
        Ok(())
    }

    pub fn get_unsigned(&self) -> &UnsignedAtomicTx {
        &self.unsigned
    }

    pub fn get_credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn get_unsigned_bytes(&self) -> &[u8] {
        &self.unsigned_bytes
    }

    pub fn get_signed_bytes(&self) -> &[u8] {
        &self.signed_bytes
    }

    // Hash signed by the credentials
    pub fn get_signing_hash(&self) -> Hash {
        hash(&self.unsigned_bytes)
    }

    pub fn id(&self) -> &Hash {
        &self.id
    }

    pub fn gas_used(&self, fixed_fee: bool) -> Result<u64, FeeError> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(tx) => tx.gas_used(&self.unsigned_bytes, fixed_fee),
            UnsignedAtomicTx::Export(tx) => tx.gas_used(&self.unsigned_bytes, fixed_fee),
        }
    }

    pub fn input_utxos(&self) -> IndexSet<Hash> {
        self.unsigned.input_utxos()
    }

    /// Shared memory mutation to apply together with the state transfer
    pub fn atomic_ops(&self, codec: &Codec) -> Result<(Hash, AtomicRequests), CodecError> {
        match &self.unsigned {
            UnsignedAtomicTx::Import(tx) => Ok(tx.atomic_ops()),
            UnsignedAtomicTx::Export(tx) => tx.atomic_ops(&self.id, codec),
        }
    }
}

impl Serializer for Transaction {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let mut tx = Self {
            unsigned: UnsignedAtomicTx::read(reader)?,
            credentials: Vec::read(reader)?,
            unsigned_bytes: Vec::new(),
            signed_bytes: Vec::new(),
            id: Hash::zero(),
        };
        tx.initialize(reader.codec())
            .map_err(|_| ReaderError::InvalidValue)?;
        Ok(tx)
    }

    fn write(&self, writer: &mut Writer) {
        self.unsigned.write(writer);
        self.credentials.write(writer);
    }

    fn size(&self) -> usize {
        self.unsigned.size() + self.credentials.size()
    }
}
