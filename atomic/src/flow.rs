use crate::crypto::Hash;
use indexmap::IndexMap;
use log::trace;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlowError {
    #[error("Overflow accumulating asset {0}")]
    Overflow(Hash),
    #[error("Insufficient funds for asset {asset}: produced {produced}, consumed {consumed}")]
    InsufficientFunds {
        asset: Hash,
        produced: u64,
        consumed: u64,
    },
    #[error("Asset {asset} does not balance: produced {produced}, consumed {consumed}")]
    Unbalanced {
        asset: Hash,
        produced: u64,
        consumed: u64,
    },
}

/// Books of a single transaction, per asset.
///
/// The native asset may be consumed beyond what is produced (the surplus
/// is burned), every other asset must close exactly.
#[derive(Debug)]
pub struct FlowChecker {
    native_asset: Hash,
    produced: IndexMap<Hash, u64>,
    consumed: IndexMap<Hash, u64>,
    // First overflow seen, reported by verify
    error: Option<FlowError>,
}

impl FlowChecker {
    pub fn new(native_asset: Hash) -> Self {
        Self {
            native_asset,
            produced: IndexMap::new(),
            consumed: IndexMap::new(),
            error: None,
        }
    }

    fn add(
        books: &mut IndexMap<Hash, u64>,
        error: &mut Option<FlowError>,
        asset: &Hash,
        amount: u64,
    ) {
        let total = books.entry(asset.clone()).or_insert(0);
        match total.checked_add(amount) {
            Some(value) => *total = value,
            None => {
                error.get_or_insert_with(|| FlowError::Overflow(asset.clone()));
            }
        }
    }

    pub fn produce(&mut self, asset: &Hash, amount: u64) {
        Self::add(&mut self.produced, &mut self.error, asset, amount);
    }

    pub fn consume(&mut self, asset: &Hash, amount: u64) {
        Self::add(&mut self.consumed, &mut self.error, asset, amount);
    }

    pub fn verify(&self) -> Result<(), FlowError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }

        let assets = self
            .produced
            .keys()
            .chain(self.consumed.keys().filter(|a| !self.produced.contains_key(*a)));
        for asset in assets {
            let produced = self.produced.get(asset).copied().unwrap_or(0);
            let consumed = self.consumed.get(asset).copied().unwrap_or(0);
            trace!("asset {}: produced {}, consumed {}", asset, produced, consumed);

            if produced > consumed {
                return Err(FlowError::InsufficientFunds {
                    asset: asset.clone(),
                    produced,
                    consumed,
                });
            }

            if produced != consumed && *asset != self.native_asset {
                return Err(FlowError::Unbalanced {
                    asset: asset.clone(),
                    produced,
                    consumed,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native() -> Hash {
        Hash::new([1; 32])
    }

    fn other() -> Hash {
        Hash::new([2; 32])
    }

    #[test]
    fn test_balanced() {
        let mut flow = FlowChecker::new(native());
        flow.produce(&native(), 5);
        flow.produce(&native(), 5);
        flow.consume(&native(), 10);
        flow.produce(&other(), 3);
        flow.consume(&other(), 3);
        assert!(flow.verify().is_ok());
    }

    #[test]
    fn test_native_surplus_is_burned() {
        let mut flow = FlowChecker::new(native());
        flow.produce(&native(), 5);
        flow.consume(&native(), 10);
        assert!(flow.verify().is_ok());
    }

    #[test]
    fn test_insufficient_funds() {
        let mut flow = FlowChecker::new(native());
        flow.produce(&native(), 11);
        flow.consume(&native(), 10);
        assert_eq!(
            flow.verify(),
            Err(FlowError::InsufficientFunds {
                asset: native(),
                produced: 11,
                consumed: 10
            })
        );
    }

    #[test]
    fn test_other_asset_must_balance() {
        let mut flow = FlowChecker::new(native());
        flow.consume(&other(), 1);
        assert!(matches!(flow.verify(), Err(FlowError::Unbalanced { .. })));
    }

    #[test]
    fn test_overflow() {
        let mut flow = FlowChecker::new(native());
        flow.consume(&native(), u64::MAX);
        flow.consume(&native(), 1);
        assert_eq!(flow.verify(), Err(FlowError::Overflow(native())));
    }
}
