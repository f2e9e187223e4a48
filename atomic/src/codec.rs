use crate::{
    config::{CODEC_VERSION, MAX_CODEC_SIZE},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use log::trace;
use thiserror::Error;

/// Interface types the codec knows how to tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    UnsignedImportTx,
    UnsignedExportTx,
    TransferInput,
    MintOutput,
    TransferOutput,
    MintOperation,
    Credential,
    Input,
    OutputOwners,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("Type {0:?} is already registered")]
    DuplicateType(TypeTag),
    #[error("Type {0:?} is not registered")]
    UnregisteredType(TypeTag),
    #[error("Unsupported codec version {0}")]
    InvalidVersion(u16),
    #[error("Payload of {size} bytes exceeds maximum of {max} bytes")]
    MaxSizeExceeded { size: usize, max: usize },
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error(transparent)]
    Reader(#[from] ReaderError),
}

/// Registry of interface types and their wire IDs.
///
/// Built once at startup and passed to everything that
/// needs to produce or decode canonical bytes.
#[derive(Debug, Clone)]
pub struct Codec {
    version: u16,
    max_size: usize,
    // index is the type ID, None for skipped slots
    types: Vec<Option<TypeTag>>,
}

impl Codec {
    // Empty registry
    pub fn new(version: u16, max_size: usize) -> Self {
        Self {
            version,
            max_size,
            types: Vec::new(),
        }
    }

    pub fn register(&mut self, tag: TypeTag) -> Result<u32, CodecError> {
        if self.type_id(tag).is_some() {
            return Err(CodecError::DuplicateType(tag));
        }

        let id = self.types.len() as u32;
        self.types.push(Some(tag));
        Ok(id)
    }

    // Reserve IDs without binding a type to them
    pub fn skip_registrations(&mut self, count: usize) {
        self.types.extend(std::iter::repeat(None).take(count));
    }

    pub fn type_id(&self, tag: TypeTag) -> Option<u32> {
        self.types
            .iter()
            .position(|t| *t == Some(tag))
            .map(|id| id as u32)
    }

    pub fn type_tag(&self, id: u32) -> Option<TypeTag> {
        self.types.get(id as usize).copied().flatten()
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    // Version prefixed canonical bytes of a value
    pub fn marshal<T: Serializer>(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let mut writer = Writer::with_capacity(self, 2 + value.size());
        writer.write_u16(self.version);
        value.write(&mut writer);

        let bytes = writer.finish().map_err(CodecError::UnregisteredType)?;
        if bytes.len() > self.max_size {
            return Err(CodecError::MaxSizeExceeded {
                size: bytes.len(),
                max: self.max_size,
            });
        }
        Ok(bytes)
    }

    pub fn unmarshal<T: Serializer>(&self, bytes: &[u8]) -> Result<T, CodecError> {
        if bytes.len() > self.max_size {
            return Err(CodecError::MaxSizeExceeded {
                size: bytes.len(),
                max: self.max_size,
            });
        }

        let mut reader = Reader::new(bytes, self);
        let version = reader.read_u16()?;
        if version != self.version {
            return Err(CodecError::InvalidVersion(version));
        }

        let value = T::read(&mut reader)?;
        if reader.size() != 0 {
            trace!("{} bytes left after decoding {} bytes", reader.size(), bytes.len());
            return Err(CodecError::TrailingBytes(reader.size()));
        }
        Ok(value)
    }
}

impl Default for Codec {
    // Registration order is part of the wire format
    fn default() -> Self {
        let mut types = vec![
            Some(TypeTag::UnsignedImportTx),
            Some(TypeTag::UnsignedExportTx),
        ];
        types.extend([None; 3]);
        types.extend(
            [
                TypeTag::TransferInput,
                TypeTag::MintOutput,
                TypeTag::TransferOutput,
                TypeTag::MintOperation,
                TypeTag::Credential,
                TypeTag::Input,
                TypeTag::OutputOwners,
            ]
            .map(Some),
        );

        Self {
            version: CODEC_VERSION,
            max_size: MAX_CODEC_SIZE,
            types,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_type_ids() {
        let codec = Codec::default();
        assert_eq!(codec.type_id(TypeTag::UnsignedImportTx), Some(0));
        assert_eq!(codec.type_id(TypeTag::UnsignedExportTx), Some(1));
        assert_eq!(codec.type_id(TypeTag::TransferInput), Some(5));
        assert_eq!(codec.type_id(TypeTag::TransferOutput), Some(7));
        assert_eq!(codec.type_id(TypeTag::Credential), Some(9));
        assert_eq!(codec.type_id(TypeTag::OutputOwners), Some(11));
        assert_eq!(codec.type_tag(3), None);
        assert_eq!(codec.type_tag(12), None);
    }

    #[test]
    fn test_register_duplicate() {
        let mut codec = Codec::new(0, MAX_CODEC_SIZE);
        assert_eq!(codec.register(TypeTag::UnsignedImportTx), Ok(0));
        codec.skip_registrations(2);
        assert_eq!(codec.register(TypeTag::Credential), Ok(3));
        assert_eq!(
            codec.register(TypeTag::Credential),
            Err(CodecError::DuplicateType(TypeTag::Credential))
        );
    }

    #[test]
    fn test_marshal_version_prefix() {
        let codec = Codec::default();
        let bytes = codec.marshal(&7u64).unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 0, 0, 0, 0, 0, 7]);
        assert_eq!(codec.unmarshal::<u64>(&bytes), Ok(7));
    }

    #[test]
    fn test_unmarshal_rejects_bad_input() {
        let codec = Codec::default();
        assert_eq!(
            codec.unmarshal::<u32>(&[0, 1, 0, 0, 0, 1]),
            Err(CodecError::InvalidVersion(1))
        );
        assert_eq!(
            codec.unmarshal::<u32>(&[0, 0, 0, 0, 0, 1, 9]),
            Err(CodecError::TrailingBytes(1))
        );
        assert_eq!(
            codec.unmarshal::<u32>(&[0, 0, 0, 0]),
            Err(CodecError::Reader(ReaderError::InvalidSize))
        );
    }

    #[test]
    fn test_unregistered_type() {
        struct Tagged;
        impl Serializer for Tagged {
            fn write(&self, writer: &mut Writer) {
                writer.write_type_tag(TypeTag::Credential);
            }
            fn read(_: &mut Reader) -> Result<Self, ReaderError> {
                Ok(Tagged)
            }
            fn size(&self) -> usize {
                4
            }
        }

        let codec = Codec::new(0, MAX_CODEC_SIZE);
        assert_eq!(
            codec.marshal(&Tagged).unwrap_err(),
            CodecError::UnregisteredType(TypeTag::Credential)
        );
    }

    #[test]
    fn test_max_size() {
        let codec = Codec::new(0, 4);
        assert_eq!(
            codec.marshal(&1u64),
            Err(CodecError::MaxSizeExceeded { size: 10, max: 4 })
        );
    }
}
