use crate::serializer::{Reader, ReaderError, Serializer, Writer};
use serde::de::Error as SerdeError;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error, Formatter},
    str::FromStr,
};

pub const ADDRESS_SIZE: usize = 20;

/// Address used by UTXO spend conditions on the shared side:
/// RIPEMD-160(SHA-256(compressed public key))
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Default)]
pub struct ShortId([u8; ADDRESS_SIZE]);

/// Account address of the local ledger:
/// last 20 bytes of Keccak-256(uncompressed public key)
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash, Default)]
pub struct EthAddress([u8; ADDRESS_SIZE]);

impl ShortId {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        ShortId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl EthAddress {
    pub const fn new(bytes: [u8; ADDRESS_SIZE]) -> Self {
        EthAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }
}

fn parse_address(s: &str) -> Result<[u8; ADDRESS_SIZE], &'static str> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|_| "Invalid hex string")?;
    bytes.try_into().map_err(|_| "Invalid address length")
}

impl FromStr for ShortId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).map(ShortId)
    }
}

impl FromStr for EthAddress {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_address(s).map(EthAddress)
    }
}

impl Display for ShortId {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Display for EthAddress {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(f, "{}", self.to_hex())
    }
}

impl Serializer for ShortId {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bytes_20().map(ShortId)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn size(&self) -> usize {
        ADDRESS_SIZE
    }
}

impl Serializer for EthAddress {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_bytes_20().map(EthAddress)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn size(&self) -> usize {
        ADDRESS_SIZE
    }
}

impl Serialize for ShortId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for ShortId {
    fn deserialize<D: serde::Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(SerdeError::custom)
    }
}

impl Serialize for EthAddress {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'a> Deserialize<'a> for EthAddress {
    fn deserialize<D: serde::Deserializer<'a>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(SerdeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eth_address_display() {
        let address = EthAddress::new([0xab; ADDRESS_SIZE]);
        assert_eq!(address.to_string(), format!("0x{}", "ab".repeat(20)));
        assert_eq!(address.to_string().parse::<EthAddress>().unwrap(), address);
    }

    #[test]
    fn test_short_id_rejects_bad_length() {
        assert!("abcd".parse::<ShortId>().is_err());
    }
}
