mod address;
mod error;
mod hash;
mod key;

pub use address::{EthAddress, ShortId, ADDRESS_SIZE};
pub use error::CryptoError;
pub use hash::{hash, Hash, HASH_SIZE};
pub use key::{PrivateKey, PublicKey, RecoverableSignature, SIGNATURE_SIZE};
