mod reader;
mod writer;

pub use reader::{Reader, ReaderError};
pub use writer::Writer;

/// Deterministic big-endian linear encoding.
///
/// Fixed size values are written raw, slices are prefixed with
/// their length as a u32 and interface values are prefixed with
/// the type ID registered in the [`Codec`](crate::codec::Codec).
pub trait Serializer {
    fn write(&self, writer: &mut Writer);

    fn read(reader: &mut Reader) -> Result<Self, ReaderError>
    where
        Self: Sized;

    fn size(&self) -> usize;
}

impl Serializer for u8 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u8()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u8(*self);
    }

    fn size(&self) -> usize {
        1
    }
}

impl Serializer for u32 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u32()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u32(*self);
    }

    fn size(&self) -> usize {
        4
    }
}

impl Serializer for u64 {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        reader.read_u64()
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_u64(*self);
    }

    fn size(&self) -> usize {
        8
    }
}

impl<T: Serializer> Serializer for Vec<T> {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        let len = reader.read_slice_len()?;
        let mut values = Vec::with_capacity(len.min(reader.size()));
        for _ in 0..len {
            values.push(T::read(reader)?);
        }
        Ok(values)
    }

    fn write(&self, writer: &mut Writer) {
        writer.write_slice_len(self.len());
        for value in self {
            value.write(writer);
        }
    }

    fn size(&self) -> usize {
        4 + self.iter().map(Serializer::size).sum::<usize>()
    }
}
