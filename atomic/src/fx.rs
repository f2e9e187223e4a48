use crate::{
    codec::TypeTag,
    config::COST_PER_SIGNATURE,
    crypto::{CryptoError, EthAddress, Hash, PrivateKey, PublicKey, RecoverableSignature, ShortId},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use indexmap::IndexMap;
use log::trace;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FxError {
    #[error("Input has no value")]
    NoValueInput,
    #[error("Signature indices not sorted and unique")]
    InputIndicesNotSortedUnique,
    #[error("Output has no value")]
    NoValueOutput,
    #[error("Output is unspendable: threshold {threshold} with {addresses} addresses")]
    OutputUnspendable { threshold: u32, addresses: usize },
    #[error("Output representation should be optimized: threshold is zero with addresses")]
    OutputUnoptimized,
    #[error("Addresses not sorted and unique")]
    AddrsNotSortedUnique,
    #[error("Input amount {input} does not match output amount {output}")]
    MismatchedAmounts { input: u64, output: u64 },
    #[error("Output is locked until {locktime}, current time is {now}")]
    Timelocked { locktime: u64, now: u64 },
    #[error("Input has more signers than expected")]
    TooManySigners,
    #[error("Input has fewer signers than expected")]
    TooFewSigners,
    #[error("Input has {indices} signature indices but credential has {signatures} signatures")]
    InputCredentialSignersMismatch { indices: usize, signatures: usize },
    #[error("Signature index {index} out of bounds of {addresses} addresses")]
    InputOutputIndexOutOfBounds { index: u32, addresses: usize },
    #[error("Signature {0} was not produced by the expected address")]
    WrongSig(usize),
    #[error("Unable to spend this UTXO")]
    CantSpend,
    #[error("Overflow computing input cost")]
    CostOverflow,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Spend condition: who may spend and from when
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputOwners {
    pub locktime: u64,
    pub threshold: u32,
    pub addrs: Vec<ShortId>,
}

impl OutputOwners {
    pub fn new(locktime: u64, threshold: u32, addrs: Vec<ShortId>) -> Self {
        Self {
            locktime,
            threshold,
            addrs,
        }
    }

    pub fn verify(&self) -> Result<(), FxError> {
        if self.threshold as usize > self.addrs.len() {
            return Err(FxError::OutputUnspendable {
                threshold: self.threshold,
                addresses: self.addrs.len(),
            });
        }

        if self.threshold == 0 && !self.addrs.is_empty() {
            return Err(FxError::OutputUnoptimized);
        }

        if !self.addrs.windows(2).all(|w| w[0] < w[1]) {
            return Err(FxError::AddrsNotSortedUnique);
        }

        Ok(())
    }

    // Traits indexing a UTXO in shared memory
    pub fn traits(&self) -> Vec<Vec<u8>> {
        self.addrs.iter().map(|addr| addr.as_bytes().to_vec()).collect()
    }
}

impl Serializer for OutputOwners {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            locktime: reader.read_u64()?,
            threshold: reader.read_u32()?,
            addrs: Vec::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.locktime);
        writer.write_u32(self.threshold);
        self.addrs.write(writer);
    }

    fn size(&self) -> usize {
        8 + 4 + self.addrs.size()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferOutput {
    pub amt: u64,
    pub owners: OutputOwners,
}

impl TransferOutput {
    pub fn new(amt: u64, owners: OutputOwners) -> Self {
        Self { amt, owners }
    }

    pub fn amount(&self) -> u64 {
        self.amt
    }

    pub fn verify(&self) -> Result<(), FxError> {
        if self.amt == 0 {
            return Err(FxError::NoValueOutput);
        }
        self.owners.verify()
    }
}

impl Serializer for TransferOutput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            amt: reader.read_u64()?,
            owners: OutputOwners::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.amt);
        self.owners.write(writer);
    }

    fn size(&self) -> usize {
        8 + self.owners.size()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInput {
    pub amt: u64,
    // Indices into the owners of the consumed output
    pub sig_indices: Vec<u32>,
}

impl TransferInput {
    pub fn new(amt: u64, sig_indices: Vec<u32>) -> Self {
        Self { amt, sig_indices }
    }

    pub fn amount(&self) -> u64 {
        self.amt
    }

    pub fn verify(&self) -> Result<(), FxError> {
        if self.amt == 0 {
            return Err(FxError::NoValueInput);
        }

        if !self.sig_indices.windows(2).all(|w| w[0] < w[1]) {
            return Err(FxError::InputIndicesNotSortedUnique);
        }

        Ok(())
    }

    // Gas consumed by the signatures this input requires
    pub fn cost(&self) -> Result<u64, FxError> {
        (self.sig_indices.len() as u64)
            .checked_mul(COST_PER_SIGNATURE)
            .ok_or(FxError::CostOverflow)
    }
}

impl Serializer for TransferInput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            amt: reader.read_u64()?,
            sig_indices: Vec::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(self.amt);
        self.sig_indices.write(writer);
    }

    fn size(&self) -> usize {
        8 + self.sig_indices.size()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Secp256k1Credential {
    pub sigs: Vec<RecoverableSignature>,
}

impl Secp256k1Credential {
    fn verify_spend(
        &self,
        tx_hash: &Hash,
        input: &TransferInput,
        owners: &OutputOwners,
        now: u64,
    ) -> Result<(), FxError> {
        if owners.locktime > now {
            return Err(FxError::Timelocked {
                locktime: owners.locktime,
                now,
            });
        }

        let threshold = owners.threshold as usize;
        if input.sig_indices.len() > threshold {
            return Err(FxError::TooManySigners);
        }
        if input.sig_indices.len() < threshold {
            return Err(FxError::TooFewSigners);
        }
        if input.sig_indices.len() != self.sigs.len() {
            return Err(FxError::InputCredentialSignersMismatch {
                indices: input.sig_indices.len(),
                signatures: self.sigs.len(),
            });
        }

        for (i, (index, sig)) in input.sig_indices.iter().zip(&self.sigs).enumerate() {
            let expected = owners.addrs.get(*index as usize).ok_or(
                FxError::InputOutputIndexOutOfBounds {
                    index: *index,
                    addresses: owners.addrs.len(),
                },
            )?;

            let signer = PublicKey::recover_from_hash(tx_hash, sig)?;
            if signer.address() != *expected {
                trace!("signature {} recovered {} expected {}", i, signer.address(), expected);
                return Err(FxError::WrongSig(i));
            }
        }

        Ok(())
    }
}

impl Serializer for Secp256k1Credential {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            sigs: Vec::read(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.sigs.write(writer);
    }

    fn size(&self) -> usize {
        self.sigs.size()
    }
}

/// Credential kinds a transaction may carry, one per input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Credential {
    Secp256k1(Secp256k1Credential),
}

impl Credential {
    pub fn signatures(&self) -> &[RecoverableSignature] {
        match self {
            Credential::Secp256k1(cred) => &cred.sigs,
        }
    }

    // Check the credential satisfies the spend condition of the owners
    pub fn verify_spend(
        &self,
        tx_hash: &Hash,
        input: &TransferInput,
        owners: &OutputOwners,
        now: u64,
    ) -> Result<(), FxError> {
        match self {
            Credential::Secp256k1(cred) => cred.verify_spend(tx_hash, input, owners, now),
        }
    }
}

impl Serializer for Credential {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        match reader.read_type_tag()? {
            TypeTag::Credential => Secp256k1Credential::read(reader).map(Credential::Secp256k1),
            got => Err(ReaderError::UnexpectedType {
                expected: "credential",
                got,
            }),
        }
    }

    fn write(&self, writer: &mut Writer) {
        match self {
            Credential::Secp256k1(cred) => {
                writer.write_type_tag(TypeTag::Credential);
                cred.write(writer);
            }
        }
    }

    fn size(&self) -> usize {
        4 + match self {
            Credential::Secp256k1(cred) => cred.size(),
        }
    }
}

/// Verify that `input` with `credential` may consume `output`
pub fn verify_transfer(
    tx_hash: &Hash,
    input: &TransferInput,
    credential: &Credential,
    output: &TransferOutput,
    now: u64,
) -> Result<(), FxError> {
    input.verify()?;
    output.verify()?;

    if input.amt != output.amt {
        return Err(FxError::MismatchedAmounts {
            input: input.amt,
            output: output.amt,
        });
    }

    credential.verify_spend(tx_hash, input, &output.owners, now)
}

/// Private keys indexed by both of their addresses
#[derive(Debug, Clone, Default)]
pub struct Keychain {
    keys: IndexMap<ShortId, PrivateKey>,
    eth_keys: IndexMap<EthAddress, PrivateKey>,
}

impl Keychain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_keys(keys: impl IntoIterator<Item = PrivateKey>) -> Self {
        let mut keychain = Self::new();
        for key in keys {
            keychain.add(key);
        }
        keychain
    }

    pub fn add(&mut self, key: PrivateKey) {
        let public_key = key.public_key();
        self.eth_keys.insert(public_key.eth_address(), key.clone());
        self.keys.insert(public_key.address(), key);
    }

    pub fn get(&self, address: &ShortId) -> Option<&PrivateKey> {
        self.keys.get(address)
    }

    pub fn get_eth(&self, address: &EthAddress) -> Option<&PrivateKey> {
        self.eth_keys.get(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &ShortId> {
        self.keys.keys()
    }

    pub fn keys(&self) -> impl Iterator<Item = &PrivateKey> {
        self.keys.values()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    // Signature indices and keys satisfying the owners, if we hold enough of them
    pub fn matches(&self, owners: &OutputOwners, now: u64) -> Option<(Vec<u32>, Vec<PrivateKey>)> {
        if owners.locktime > now {
            return None;
        }

        let threshold = owners.threshold as usize;
        let mut indices = Vec::with_capacity(threshold);
        let mut keys = Vec::with_capacity(threshold);
        for (i, addr) in owners.addrs.iter().enumerate() {
            if indices.len() == threshold {
                break;
            }
            if let Some(key) = self.keys.get(addr) {
                indices.push(i as u32);
                keys.push(key.clone());
            }
        }

        (indices.len() == threshold).then_some((indices, keys))
    }

    // Build the input consuming `output` and the keys that must sign it
    pub fn spend(&self, output: &TransferOutput, now: u64) -> Result<(TransferInput, Vec<PrivateKey>), FxError> {
        let (sig_indices, keys) = self.matches(&output.owners, now).ok_or(FxError::CantSpend)?;
        Ok((TransferInput::new(output.amt, sig_indices), keys))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[byte; 32]).unwrap()
    }

    fn owned_by(amt: u64, keys: &[&PrivateKey], threshold: u32) -> TransferOutput {
        let mut addrs: Vec<ShortId> = keys.iter().map(|k| k.public_key().address()).collect();
        addrs.sort();
        TransferOutput::new(amt, OutputOwners::new(0, threshold, addrs))
    }

    fn credential(tx_hash: &Hash, keys: &[PrivateKey]) -> Credential {
        Credential::Secp256k1(Secp256k1Credential {
            sigs: keys.iter().map(|k| k.sign_hash(tx_hash).unwrap()).collect(),
        })
    }

    #[test]
    fn test_output_verify() {
        let a = key(1).public_key().address();
        let b = key(2).public_key().address();
        let (low, high) = if a < b { (a, b) } else { (b, a) };

        assert_eq!(
            TransferOutput::new(0, OutputOwners::new(0, 1, vec![low])).verify(),
            Err(FxError::NoValueOutput)
        );
        assert!(matches!(
            TransferOutput::new(1, OutputOwners::new(0, 2, vec![low])).verify(),
            Err(FxError::OutputUnspendable { .. })
        ));
        assert_eq!(
            TransferOutput::new(1, OutputOwners::new(0, 0, vec![low])).verify(),
            Err(FxError::OutputUnoptimized)
        );
        assert_eq!(
            TransferOutput::new(1, OutputOwners::new(0, 1, vec![high, low])).verify(),
            Err(FxError::AddrsNotSortedUnique)
        );
        assert!(TransferOutput::new(1, OutputOwners::new(0, 0, vec![])).verify().is_ok());
        assert!(TransferOutput::new(1, OutputOwners::new(0, 1, vec![low, high])).verify().is_ok());
    }

    #[test]
    fn test_input_verify_and_cost() {
        assert_eq!(TransferInput::new(0, vec![0]).verify(), Err(FxError::NoValueInput));
        assert_eq!(
            TransferInput::new(1, vec![1, 1]).verify(),
            Err(FxError::InputIndicesNotSortedUnique)
        );
        let input = TransferInput::new(1, vec![0, 2]);
        assert!(input.verify().is_ok());
        assert_eq!(input.cost(), Ok(2 * COST_PER_SIGNATURE));
    }

    #[test]
    fn test_keychain_spend_and_verify_transfer() {
        let owner = key(1);
        let keychain = Keychain::from_keys([owner.clone()]);
        let output = owned_by(500, &[&owner], 1);
        let tx_hash = hash(b"unsigned tx");

        let (input, keys) = keychain.spend(&output, 0).unwrap();
        assert_eq!(input, TransferInput::new(500, vec![0]));
        let cred = credential(&tx_hash, &keys);
        assert!(verify_transfer(&tx_hash, &input, &cred, &output, 0).is_ok());

        // Signed by a stranger
        let cred = credential(&tx_hash, &[key(9)]);
        assert_eq!(
            verify_transfer(&tx_hash, &input, &cred, &output, 0),
            Err(FxError::WrongSig(0))
        );
    }

    #[test]
    fn test_verify_transfer_failures() {
        let owner = key(1);
        let output = owned_by(500, &[&owner], 1);
        let tx_hash = hash(b"unsigned tx");
        let cred = credential(&tx_hash, &[owner.clone()]);

        assert_eq!(
            verify_transfer(&tx_hash, &TransferInput::new(400, vec![0]), &cred, &output, 0),
            Err(FxError::MismatchedAmounts { input: 400, output: 500 })
        );
        assert_eq!(
            verify_transfer(&tx_hash, &TransferInput::new(500, vec![0, 1]), &cred, &output, 0),
            Err(FxError::TooManySigners)
        );
        assert_eq!(
            verify_transfer(&tx_hash, &TransferInput::new(500, vec![]), &cred, &output, 0),
            Err(FxError::TooFewSigners)
        );
        assert_eq!(
            verify_transfer(
                &tx_hash,
                &TransferInput::new(500, vec![0]),
                &Credential::Secp256k1(Secp256k1Credential::default()),
                &output,
                0
            ),
            Err(FxError::InputCredentialSignersMismatch { indices: 1, signatures: 0 })
        );
        assert!(matches!(
            verify_transfer(&tx_hash, &TransferInput::new(500, vec![3]), &cred, &output, 0),
            Err(FxError::InputOutputIndexOutOfBounds { index: 3, .. })
        ));

        let mut locked = output.clone();
        locked.owners.locktime = 10;
        assert_eq!(
            verify_transfer(&tx_hash, &TransferInput::new(500, vec![0]), &cred, &locked, 5),
            Err(FxError::Timelocked { locktime: 10, now: 5 })
        );
    }

    #[test]
    fn test_keychain_cannot_spend() {
        let keychain = Keychain::from_keys([key(1)]);
        let output = owned_by(5, &[&key(2)], 1);
        assert_eq!(keychain.spend(&output, 0).unwrap_err(), FxError::CantSpend);

        let two_of_two = owned_by(5, &[&key(1), &key(2)], 2);
        assert!(keychain.spend(&two_of_two, 0).is_err());
        let keychain = Keychain::from_keys([key(1), key(2)]);
        let (input, keys) = keychain.spend(&two_of_two, 0).unwrap();
        assert_eq!(input.sig_indices, vec![0, 1]);
        assert_eq!(keys.len(), 2);
    }
}
