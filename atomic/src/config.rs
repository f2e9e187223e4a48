use crate::crypto::Hash;

pub const VERSION: &str = env!("BUILD_VERSION");

// Native asset amounts are 9 decimals on the shared UTXO side
// while the account ledger uses 18 decimals
pub const X2C_RATE: u64 = 1_000_000_000;

// ===== GAS =====
// Gas charged per byte of the unsigned transaction
pub const TX_BYTES_GAS: u64 = 1;
// Gas charged per signature required by an input
pub const COST_PER_SIGNATURE: u64 = 1_000;
// Address (20) + amount (8) + asset ID (32)
pub const EVM_OUTPUT_GAS: u64 = (20 + 8 + 32) * TX_BYTES_GAS;
// Address (20) + amount (8) + asset ID (32) + nonce (8) + one signature
pub const EVM_INPUT_GAS: u64 = (20 + 8 + 32 + 8) * TX_BYTES_GAS + COST_PER_SIGNATURE;
// Fixed cost added to every atomic transaction once fixed fees are active
pub const ATOMIC_TX_BASE_COST: u64 = 10_000;

// ===== FEES =====
// Flat fee (in native base units) before dynamic fees
pub const AXIA_ATOMIC_TX_FEE: u64 = 1_000_000;

// ===== CODEC =====
pub const CODEC_VERSION: u16 = 0;
// 256 KiB
pub const MAX_CODEC_SIZE: usize = 256 * 1024;
// Maximum number of elements in a serialized slice
pub const MAX_SLICE_LENGTH: usize = 256 * 1024;

// ===== CHAINS =====
// The platform chain only accepts the native asset
pub const PLATFORM_CHAIN_ID: Hash = Hash::zero();

const _: () = assert!(
    EVM_INPUT_GAS > EVM_OUTPUT_GAS,
    "An input must cost more gas than an output"
);
const _: () = assert!(
    MAX_SLICE_LENGTH <= u32::MAX as usize,
    "Slice length must fit in its u32 prefix"
);
