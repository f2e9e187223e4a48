use crate::{
    codec::{Codec, TypeTag},
    config::MAX_SLICE_LENGTH,
    crypto::{Hash, HASH_SIZE},
};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("Invalid size")]
    InvalidSize,
    #[error("Invalid value")]
    InvalidValue,
    #[error("Unknown type ID {0}")]
    UnknownTypeId(u32),
    #[error("Unexpected type {got:?}, expected {expected}")]
    UnexpectedType { expected: &'static str, got: TypeTag },
    #[error("Slice length {0} exceeds maximum of {max}", max = MAX_SLICE_LENGTH)]
    SliceTooLong(usize),
}

pub struct Reader<'a> {
    bytes: &'a [u8],
    total: usize,
    codec: &'a Codec,
}

impl<'a> Reader<'a> {
    pub fn new(bytes: &'a [u8], codec: &'a Codec) -> Self {
        Reader {
            bytes,
            total: 0,
            codec,
        }
    }

    pub fn codec(&self) -> &'a Codec {
        self.codec
    }

    pub fn read_bytes_ref(&mut self, n: usize) -> Result<&'a [u8], ReaderError> {
        if n > self.size() {
            return Err(ReaderError::InvalidSize);
        }

        let bytes = &self.bytes[self.total..self.total + n];
        self.total += n;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<Vec<u8>, ReaderError> {
        self.read_bytes_ref(n).map(<[u8]>::to_vec)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], ReaderError> {
        let bytes = self.read_bytes_ref(N)?;
        let mut array = [0u8; N];
        array.copy_from_slice(bytes);
        Ok(array)
    }

    pub fn read_bytes_20(&mut self) -> Result<[u8; 20], ReaderError> {
        self.read_array()
    }

    pub fn read_hash(&mut self) -> Result<Hash, ReaderError> {
        self.read_array::<HASH_SIZE>().map(Hash::new)
    }

    pub fn read_u8(&mut self) -> Result<u8, ReaderError> {
        self.read_array::<1>().map(|bytes| bytes[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ReaderError> {
        self.read_array().map(u16::from_be_bytes)
    }

    pub fn read_u32(&mut self) -> Result<u32, ReaderError> {
        self.read_array().map(u32::from_be_bytes)
    }

    pub fn read_u64(&mut self) -> Result<u64, ReaderError> {
        self.read_array().map(u64::from_be_bytes)
    }

    // Length prefix of a slice, bounded by the maximum slice length
    pub fn read_slice_len(&mut self) -> Result<usize, ReaderError> {
        let len = self.read_u32()? as usize;
        if len > MAX_SLICE_LENGTH {
            return Err(ReaderError::SliceTooLong(len));
        }
        Ok(len)
    }

    // Type ID prefix of an interface value, resolved through the codec registry
    pub fn read_type_tag(&mut self) -> Result<TypeTag, ReaderError> {
        let id = self.read_u32()?;
        self.codec
            .type_tag(id)
            .ok_or(ReaderError::UnknownTypeId(id))
    }

    // Bytes left to read
    pub fn size(&self) -> usize {
        self.bytes.len() - self.total
    }
}
