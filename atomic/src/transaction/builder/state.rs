use primitive_types::U256;

use crate::crypto::{EthAddress, Hash};

/// Ledger as seen by the wallet building the transaction
pub trait AccountState {
    type Error;

    /// Native balance in ledger units
    fn get_balance(&self, address: &EthAddress) -> Result<U256, Self::Error>;

    /// Balance of a non native asset
    fn get_balance_multi_coin(&self, address: &EthAddress, asset: &Hash) -> Result<U256, Self::Error>;

    /// Nonce the next transaction of the account must use
    fn get_nonce(&self, address: &EthAddress) -> Result<u64, Self::Error>;
}
