use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid signature length: expected {expected}, got {got}")]
    InvalidSignatureLength { expected: usize, got: usize },
    #[error("Invalid recovery ID {0}")]
    InvalidRecoveryId(u8),
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Public key recovery failed")]
    RecoveryFailed,
    #[error("Signing failed")]
    SigningFailed,
}
