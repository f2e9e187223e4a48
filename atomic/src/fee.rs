use crate::config::{TX_BYTES_GAS, X2C_RATE};
use primitive_types::U256;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeeError {
    #[error("Overflow computing the gas of {0} bytes")]
    BytesCostOverflow(usize),
    #[error("Overflow computing gas used")]
    GasOverflow,
    #[error("Base fee is required once dynamic fees are active")]
    NilBaseFee,
    #[error("Fee overflow: {0} does not fit in 64 bits")]
    FeeOverflow(U256),
}

// Gas charged for the serialized size of a transaction
pub fn calc_bytes_cost(len: usize) -> Result<u64, FeeError> {
    (len as u64)
        .checked_mul(TX_BYTES_GAS)
        .ok_or(FeeError::BytesCostOverflow(len))
}

/// Fee in native base units for `cost` gas at `base_fee` (ledger units per gas).
/// Rounded up to the next base unit.
pub fn calculate_dynamic_fee(cost: u64, base_fee: Option<U256>) -> Result<u64, FeeError> {
    let base_fee = base_fee.ok_or(FeeError::NilBaseFee)?;
    let rate = U256::from(X2C_RATE);

    let fee = U256::from(cost)
        .checked_mul(base_fee)
        .and_then(|fee| fee.checked_add(rate - 1))
        .map(|fee| fee / rate)
        .ok_or(FeeError::FeeOverflow(U256::MAX))?;

    if fee > U256::from(u64::MAX) {
        return Err(FeeError::FeeOverflow(fee));
    }
    Ok(fee.low_u64())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const GWEI: u64 = 1_000_000_000;

    #[test]
    fn test_dynamic_fee_vectors() {
        assert_eq!(calculate_dynamic_fee(1230, Some(U256::from(25 * GWEI))), Ok(30_750));
        assert_eq!(calculate_dynamic_fee(1230, Some(U256::from(1))), Ok(1));
        assert_eq!(calculate_dynamic_fee(11230, Some(U256::from(GWEI))), Ok(11_230));
        assert_eq!(calculate_dynamic_fee(0, Some(U256::from(GWEI))), Ok(0));
    }

    #[test]
    fn test_nil_base_fee() {
        assert_eq!(calculate_dynamic_fee(1, None), Err(FeeError::NilBaseFee));
    }

    #[test]
    fn test_fee_overflow() {
        let result = calculate_dynamic_fee(u64::MAX, Some(U256::from(u64::MAX) * U256::from(X2C_RATE)));
        assert!(matches!(result, Err(FeeError::FeeOverflow(_))));
        assert!(matches!(
            calculate_dynamic_fee(2, Some(U256::MAX)),
            Err(FeeError::FeeOverflow(_))
        ));
    }

    #[test]
    fn test_bytes_cost() {
        assert_eq!(calc_bytes_cost(230), Ok(230));
    }

    proptest! {
        #[test]
        fn test_fee_monotonic_in_cost(cost in 0u64..1_000_000_000, extra in 0u64..1_000_000, base_fee in 0u64..1_000_000_000_000) {
            let base_fee = Some(U256::from(base_fee));
            let low = calculate_dynamic_fee(cost, base_fee).unwrap();
            let high = calculate_dynamic_fee(cost + extra, base_fee).unwrap();
            prop_assert!(low <= high);
        }

        #[test]
        fn test_fee_monotonic_in_base_fee(cost in 0u64..1_000_000_000, base_fee in 0u64..1_000_000_000_000, extra in 0u64..1_000_000_000) {
            let low = calculate_dynamic_fee(cost, Some(U256::from(base_fee))).unwrap();
            let high = calculate_dynamic_fee(cost, Some(U256::from(base_fee + extra))).unwrap();
            prop_assert!(low <= high);
        }
    }
}
