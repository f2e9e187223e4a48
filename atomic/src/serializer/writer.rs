use crate::codec::{Codec, TypeTag};

pub struct Writer<'a> {
    bytes: Vec<u8>,
    codec: &'a Codec,
    // First type written that the codec does not know about
    unregistered: Option<TypeTag>,
}

impl<'a> Writer<'a> {
    pub fn new(codec: &'a Codec) -> Self {
        Self::with_capacity(codec, 0)
    }

    pub fn with_capacity(codec: &'a Codec, capacity: usize) -> Self {
        Writer {
            bytes: Vec::with_capacity(capacity),
            codec,
            unregistered: None,
        }
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.bytes.extend_from_slice(bytes);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend(value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend(value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend(value.to_be_bytes());
    }

    pub fn write_slice_len(&mut self, len: usize) {
        self.write_u32(len as u32);
    }

    // Write the registered type ID of an interface value.
    // An unregistered type is remembered and reported by the codec
    // once the value is fully written
    pub fn write_type_tag(&mut self, tag: TypeTag) {
        match self.codec.type_id(tag) {
            Some(id) => self.write_u32(id),
            None => {
                self.unregistered.get_or_insert(tag);
                self.write_u32(u32::MAX);
            }
        }
    }

    // Consume the writer, returning the bytes or the first unregistered type
    pub fn finish(self) -> Result<Vec<u8>, TypeTag> {
        match self.unregistered {
            Some(tag) => Err(tag),
            None => Ok(self.bytes),
        }
    }
}
