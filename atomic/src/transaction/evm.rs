use crate::{
    crypto::{EthAddress, Hash},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvmError {
    #[error("Amount of {address} for asset {asset} is zero")]
    NoValue { address: EthAddress, asset: Hash },
}

/// Credit of an account, destination of imported value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmOutput {
    pub address: EthAddress,
    pub amount: u64,
    pub asset_id: Hash,
}

/// Debit of an account, source of exported value.
/// Bound to the account nonce so it cannot be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvmInput {
    pub address: EthAddress,
    pub amount: u64,
    pub asset_id: Hash,
    pub nonce: u64,
}

impl EvmOutput {
    pub fn new(address: EthAddress, amount: u64, asset_id: Hash) -> Self {
        Self {
            address,
            amount,
            asset_id,
        }
    }

    pub fn verify(&self) -> Result<(), EvmError> {
        if self.amount == 0 {
            return Err(EvmError::NoValue {
                address: self.address,
                asset: self.asset_id.clone(),
            });
        }
        Ok(())
    }

    fn sort_key(&self) -> (&EthAddress, &Hash) {
        (&self.address, &self.asset_id)
    }
}

impl EvmInput {
    pub fn new(address: EthAddress, amount: u64, asset_id: Hash, nonce: u64) -> Self {
        Self {
            address,
            amount,
            asset_id,
            nonce,
        }
    }

    pub fn verify(&self) -> Result<(), EvmError> {
        if self.amount == 0 {
            return Err(EvmError::NoValue {
                address: self.address,
                asset: self.asset_id.clone(),
            });
        }
        Ok(())
    }

    pub fn sort_key(&self) -> (EthAddress, Hash) {
        (self.address, self.asset_id.clone())
    }

    // 32 bytes identifying the (address, nonce) being spent:
    // nonce (8) || address length (4) || address (20)
    pub fn input_id(&self) -> Hash {
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&self.nonce.to_be_bytes());
        bytes[8..12].copy_from_slice(&(self.address.as_bytes().len() as u32).to_be_bytes());
        bytes[12..].copy_from_slice(self.address.as_bytes());
        Hash::new(bytes)
    }
}

impl Serializer for EvmOutput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            address: EthAddress::read(reader)?,
            amount: reader.read_u64()?,
            asset_id: Hash::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.address.write(writer);
        writer.write_u64(self.amount);
        self.asset_id.write(writer);
    }

    fn size(&self) -> usize {
        self.address.size() + 8 + self.asset_id.size()
    }
}

impl Serializer for EvmInput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            address: EthAddress::read(reader)?,
            amount: reader.read_u64()?,
            asset_id: Hash::read(reader)?,
            nonce: reader.read_u64()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.address.write(writer);
        writer.write_u64(self.amount);
        self.asset_id.write(writer);
        writer.write_u64(self.nonce);
    }

    fn size(&self) -> usize {
        self.address.size() + 8 + self.asset_id.size() + 8
    }
}

// Outputs are ordered by (address, asset)
pub fn is_sorted_evm_outputs(outputs: &[EvmOutput]) -> bool {
    outputs.windows(2).all(|w| w[0].sort_key() <= w[1].sort_key())
}

pub fn is_sorted_and_unique_evm_outputs(outputs: &[EvmOutput]) -> bool {
    outputs.windows(2).all(|w| w[0].sort_key() < w[1].sort_key())
}

pub fn sort_evm_outputs(outputs: &mut [EvmOutput]) {
    outputs.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}

// Inputs are ordered by (address, asset)
pub fn is_sorted_and_unique_evm_inputs(inputs: &[EvmInput]) -> bool {
    inputs.windows(2).all(|w| w[0].sort_key() < w[1].sort_key())
}

pub fn sort_evm_inputs(inputs: &mut [EvmInput]) {
    inputs.sort_by_key(EvmInput::sort_key);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::PrivateKey, utxo::sort_with_signers};
    use proptest::prelude::*;

    fn output(address: u8, asset: u8) -> EvmOutput {
        EvmOutput::new(EthAddress::new([address; 20]), 1, Hash::new([asset; 32]))
    }

    #[test]
    fn test_sort_tiers() {
        let sorted = vec![output(1, 1), output(1, 2), output(2, 0)];
        assert!(is_sorted_evm_outputs(&sorted));
        assert!(is_sorted_and_unique_evm_outputs(&sorted));

        let duplicated = vec![output(1, 1), output(1, 1)];
        assert!(is_sorted_evm_outputs(&duplicated));
        assert!(!is_sorted_and_unique_evm_outputs(&duplicated));

        let swapped = vec![output(2, 0), output(1, 1)];
        assert!(!is_sorted_evm_outputs(&swapped));
    }

    #[test]
    fn test_input_id_layout() {
        let input = EvmInput::new(EthAddress::new([0xaa; 20]), 1, Hash::zero(), 7);
        let id = input.input_id();
        let bytes = id.as_bytes();
        assert_eq!(&bytes[..8], &7u64.to_be_bytes());
        assert_eq!(&bytes[8..12], &20u32.to_be_bytes());
        assert_eq!(&bytes[12..], &[0xaa; 20]);

        let next = EvmInput::new(EthAddress::new([0xaa; 20]), 1, Hash::zero(), 8);
        assert_ne!(next.input_id(), id);
    }

    #[test]
    fn test_zero_amount() {
        let mut out = output(1, 1);
        out.amount = 0;
        assert!(matches!(out.verify(), Err(EvmError::NoValue { .. })));
    }

    fn arb_outputs() -> impl Strategy<Value = Vec<EvmOutput>> {
        prop::collection::vec((0u8..4, 0u8..4, 1u64..100), 0..12).prop_map(|items| {
            items
                .into_iter()
                .map(|(a, s, amount)| {
                    EvmOutput::new(EthAddress::new([a; 20]), amount, Hash::new([s; 32]))
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn test_sort_is_idempotent(mut outputs in arb_outputs()) {
            sort_evm_outputs(&mut outputs);
            prop_assert!(is_sorted_evm_outputs(&outputs));
            let once = outputs.clone();
            sort_evm_outputs(&mut outputs);
            prop_assert_eq!(once, outputs);
        }

        #[test]
        fn test_permutations_sort_alike(outputs in arb_outputs(), seed in any::<u64>()) {
            let mut shuffled = outputs.clone();
            // deterministic rotation + reverse as a permutation
            if !shuffled.is_empty() {
                let len = shuffled.len();
                shuffled.rotate_left((seed as usize) % len);
            }
            if seed % 2 == 0 {
                shuffled.reverse();
            }

            let mut a = outputs;
            sort_evm_outputs(&mut a);
            sort_evm_outputs(&mut shuffled);
            let keys = |v: &[EvmOutput]| v.iter().map(|o| (o.address, o.asset_id.clone())).collect::<Vec<_>>();
            prop_assert_eq!(keys(&a), keys(&shuffled));
        }

        #[test]
        fn test_input_sort_is_idempotent(mut inputs in arb_inputs()) {
            sort_evm_inputs(&mut inputs);
            let once = inputs.clone();
            sort_evm_inputs(&mut inputs);
            prop_assert_eq!(once, inputs);
        }

        #[test]
        fn test_inputs_sorted_with_signers(inputs in arb_inputs()) {
            // The amount tells which key signs the input
            let mut signers: Vec<Vec<PrivateKey>> =
                inputs.iter().map(|input| vec![signer(input.amount)]).collect();
            let mut paired = inputs.clone();
            sort_with_signers(&mut paired, &mut signers, EvmInput::sort_key);

            let mut sorted = inputs;
            sort_evm_inputs(&mut sorted);
            prop_assert_eq!(&paired, &sorted);

            for (input, keys) in paired.iter().zip(&signers) {
                prop_assert_eq!(keys[0].public_key(), signer(input.amount).public_key());
            }

            let unique = paired.windows(2).all(|w| w[0].sort_key() != w[1].sort_key());
            prop_assert_eq!(is_sorted_and_unique_evm_inputs(&paired), unique);
        }
    }

    fn signer(amount: u64) -> PrivateKey {
        PrivateKey::from_bytes(&[amount as u8; 32]).unwrap()
    }

    fn arb_inputs() -> impl Strategy<Value = Vec<EvmInput>> {
        prop::collection::vec((0u8..4, 0u8..4, 1u64..100, any::<u64>()), 0..12).prop_map(|items| {
            items
                .into_iter()
                .map(|(a, s, amount, nonce)| {
                    EvmInput::new(EthAddress::new([a; 20]), amount, Hash::new([s; 32]), nonce)
                })
                .collect()
        })
    }
}
