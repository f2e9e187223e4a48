use primitive_types::U256;
use thiserror::Error;

use crate::{
    codec::CodecError,
    context::ContextError,
    crypto::{CryptoError, EthAddress, Hash},
    fee::FeeError,
    flow::FlowError,
    fx::FxError,
    transaction::evm::EvmError,
};

#[derive(Error, Debug)]
pub enum VerificationError<T> {
    #[error("State error: {0}")]
    State(T),
    #[error("No import inputs")]
    NoImportInputs,
    #[error("No export outputs")]
    NoExportOutputs,
    #[error("Wrong network ID: expected {expected}, got {got}")]
    WrongNetworkId { expected: u32, got: u32 },
    #[error("Wrong blockchain ID: expected {expected}, got {got}")]
    WrongBlockchainId { expected: Hash, got: Hash },
    #[error("No EVM outputs")]
    NoEvmOutputs,
    #[error("Wrong chain ID {0}")]
    WrongChainId(Hash),
    #[error("Wrong chain ID: {0}")]
    InvalidPeerChain(#[from] ContextError),
    #[error("Asset {0} cannot be exported to the platform chain")]
    NonNativeToPlatformChain(Hash),
    #[error("EVM Output failed verification: {0}")]
    EvmOutput(EvmError),
    #[error("EVM Input failed verification: {0}")]
    EvmInput(EvmError),
    #[error("atomic input failed verification: {0}")]
    AtomicInput(FxError),
    #[error("atomic output failed verification: {0}")]
    AtomicOutput(FxError),
    #[error("Inputs not sorted and unique")]
    InputsNotSortedUnique,
    #[error("Outputs not sorted and unique")]
    OutputsNotSortedUnique,
    #[error("Outputs not sorted")]
    OutputsNotSorted,
    #[error(transparent)]
    Fee(#[from] FeeError),
    #[error("Flow check failed due to: {0}")]
    FlowCheck(#[from] FlowError),
    #[error("Mismatched number of inputs/credentials ({inputs} vs. {credentials})")]
    MismatchedCredentials { inputs: usize, credentials: usize },
    #[error("Failed to fetch import UTXOs from {chain} due to: {error}")]
    FetchUtxos { chain: Hash, error: T },
    #[error("Failed to unmarshal UTXO: {0}")]
    UnmarshalUtxo(CodecError),
    #[error("Expected {expected} UTXOs from shared memory, got {got}")]
    UtxoCount { expected: usize, got: usize },
    #[error("Asset ID mismatch: input claims {expected}, UTXO holds {got}")]
    AssetIdMismatch { expected: Hash, got: Hash },
    #[error("Import tx transfer failed verification: {0}")]
    TransferFailed(FxError),
    #[error("Expected one signature for EVM input credential, but found: {0}")]
    ExpectedOneSignature(usize),
    #[error("Public key recovery failed: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Public key / signature mismatch: input address {expected}, signer {got}")]
    PublicKeySignatureMismatch {
        expected: EthAddress,
        got: EthAddress,
    },
    #[error("Conflicting atomic inputs: {0} is already spent")]
    ConflictingAtomicInputs(Hash),
    #[error("Ancestor block {0} is unknown, parent was rejected")]
    RejectedParent(Hash),
    #[error("Insufficient funds of {address} for asset {asset}: required {required}, available {available}")]
    InsufficientFunds {
        address: EthAddress,
        asset: Hash,
        required: U256,
        available: U256,
    },
    #[error("Invalid nonce for {address}: expected {expected}, got {got}")]
    InvalidNonce {
        address: EthAddress,
        expected: u64,
        got: u64,
    },
    #[error("Arithmetic overflow during balance calculation")]
    Overflow,
    #[error(transparent)]
    Codec(#[from] CodecError),
}
