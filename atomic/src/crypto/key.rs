use super::{hash, CryptoError, EthAddress, Hash, ShortId, ADDRESS_SIZE};
use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use k256::{
    ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
};
use ripemd::Ripemd160;
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::fmt;

// r (32) || s (32) || v (1)
pub const SIGNATURE_SIZE: usize = 65;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RecoverableSignature([u8; SIGNATURE_SIZE]);

impl RecoverableSignature {
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        RecoverableSignature(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; SIGNATURE_SIZE] =
            bytes
                .try_into()
                .map_err(|_| CryptoError::InvalidSignatureLength {
                    expected: SIGNATURE_SIZE,
                    got: bytes.len(),
                })?;
        Ok(RecoverableSignature(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for RecoverableSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecoverableSignature({})", self.to_hex())
    }
}

impl Serializer for RecoverableSignature {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let bytes = reader.read_bytes(SIGNATURE_SIZE)?;
        Self::from_slice(&bytes).map_err(|_| ReaderError::InvalidValue)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn size(&self) -> usize {
        SIGNATURE_SIZE
    }
}

impl Serialize for RecoverableSignature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for RecoverableSignature {
    fn deserialize<D: serde::Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        let bytes = hex::decode(value).map_err(SerdeError::custom)?;
        Self::from_slice(&bytes).map_err(SerdeError::custom)
    }
}

/// secp256k1 signing key
#[derive(Clone)]
pub struct PrivateKey(SigningKey);

impl PrivateKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        SigningKey::from_slice(bytes)
            .map(PrivateKey)
            .map_err(|_| CryptoError::InvalidPrivateKey)
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&self.0.to_bytes());
        bytes
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.0.verifying_key().clone())
    }

    // Sign an already hashed message
    pub fn sign_hash(&self, hash: &Hash) -> Result<RecoverableSignature, CryptoError> {
        let (signature, recovery_id) = self
            .0
            .sign_prehash_recoverable(hash.as_bytes())
            .map_err(|_| CryptoError::SigningFailed)?;

        let mut bytes = [0u8; SIGNATURE_SIZE];
        bytes[..64].copy_from_slice(&signature.to_bytes());
        bytes[64] = recovery_id.to_byte();
        Ok(RecoverableSignature(bytes))
    }

    // Sign SHA-256(message)
    pub fn sign(&self, message: &[u8]) -> Result<RecoverableSignature, CryptoError> {
        self.sign_hash(&hash(message))
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PrivateKey({})", self.public_key().address())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey(VerifyingKey);

impl PublicKey {
    // Recover the signer of an already hashed message
    pub fn recover_from_hash(
        hash: &Hash,
        signature: &RecoverableSignature,
    ) -> Result<Self, CryptoError> {
        let bytes = signature.as_bytes();
        let v = bytes[64];
        let recovery_id = RecoveryId::from_byte(v).ok_or(CryptoError::InvalidRecoveryId(v))?;
        let signature =
            Signature::from_slice(&bytes[..64]).map_err(|_| CryptoError::InvalidSignature)?;

        // Only the low-S form is accepted, otherwise the same signature
        // could be mutated into a second valid one
        if signature.normalize_s().is_some() {
            return Err(CryptoError::InvalidSignature);
        }

        VerifyingKey::recover_from_prehash(hash.as_bytes(), &signature, recovery_id)
            .map(PublicKey)
            .map_err(|_| CryptoError::RecoveryFailed)
    }

    // Recover the signer of SHA-256(message)
    pub fn recover(message: &[u8], signature: &RecoverableSignature) -> Result<Self, CryptoError> {
        Self::recover_from_hash(&hash(message), signature)
    }

    fn encoded(&self, compress: bool) -> Vec<u8> {
        k256::PublicKey::from(&self.0)
            .to_encoded_point(compress)
            .as_bytes()
            .to_vec()
    }

    pub fn to_compressed_bytes(&self) -> Vec<u8> {
        self.encoded(true)
    }

    pub fn address(&self) -> ShortId {
        let sha = Sha256::digest(self.encoded(true));
        let digest = Ripemd160::digest(sha);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest);
        ShortId::new(bytes)
    }

    pub fn eth_address(&self) -> EthAddress {
        let uncompressed = self.encoded(false);
        // skip the 0x04 SEC1 tag
        let digest = Keccak256::digest(&uncompressed[1..]);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[digest.len() - ADDRESS_SIZE..]);
        EthAddress::new(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(byte: u8) -> PrivateKey {
        PrivateKey::from_bytes(&[byte; 32]).unwrap()
    }

    #[test]
    fn test_sign_and_recover() {
        let key = key(1);
        let message = b"atomic transaction";
        let signature = key.sign(message).unwrap();
        let recovered = PublicKey::recover(message, &signature).unwrap();
        assert_eq!(recovered, key.public_key());
        assert_eq!(recovered.address(), key.public_key().address());
    }

    #[test]
    fn test_random_keys() {
        for _ in 0..16 {
            // Out of range scalars are possible but astronomically unlikely
            let Ok(key) = PrivateKey::from_bytes(&rand::random::<[u8; 32]>()) else {
                continue;
            };
            let hash = crate::crypto::hash(b"random");
            let signature = key.sign_hash(&hash).unwrap();
            let recovered = PublicKey::recover_from_hash(&hash, &signature).unwrap();
            assert_eq!(recovered.eth_address(), key.public_key().eth_address());
            assert_eq!(PrivateKey::from_bytes(&key.to_bytes()).unwrap().public_key(), recovered);
        }
    }

    #[test]
    fn test_signature_is_deterministic() {
        let key = key(2);
        assert_eq!(key.sign(b"msg").unwrap(), key.sign(b"msg").unwrap());
    }

    #[test]
    fn test_recover_other_message_gives_other_key() {
        let key = key(3);
        let signature = key.sign(b"one").unwrap();
        match PublicKey::recover(b"two", &signature) {
            Ok(public_key) => assert_ne!(public_key, key.public_key()),
            Err(e) => assert_eq!(e, CryptoError::RecoveryFailed),
        }
    }

    #[test]
    fn test_invalid_recovery_id() {
        let key = key(4);
        let mut bytes = *key.sign(b"msg").unwrap().as_bytes();
        bytes[64] = 9;
        let result = PublicKey::recover(b"msg", &RecoverableSignature::new(bytes));
        assert_eq!(result, Err(CryptoError::InvalidRecoveryId(9)));
    }

    #[test]
    fn test_zero_key_rejected() {
        assert!(PrivateKey::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_known_eth_address() {
        // Well known address of the private key 0x...01
        let mut bytes = [0u8; 32];
        bytes[31] = 1;
        let key = PrivateKey::from_bytes(&bytes).unwrap();
        assert_eq!(
            key.public_key().eth_address().to_hex(),
            "0x7e5f4552091a69125d5dfcb7b8c2659029395bdf"
        );
    }
}
