use crate::{
    codec::{Codec, TypeTag},
    crypto::{Hash, PrivateKey},
    fx::{TransferInput, TransferOutput},
    serializer::{Reader, ReaderError, Serializer, Writer},
};
use serde::{Deserialize, Serialize};

/// Identity of an output: the transaction producing it and its position
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtxoId {
    pub tx_id: Hash,
    pub output_index: u32,
}

impl UtxoId {
    pub fn new(tx_id: Hash, output_index: u32) -> Self {
        Self { tx_id, output_index }
    }

    // Key of the UTXO in shared memory
    pub fn input_id(&self) -> Hash {
        self.tx_id.prefix(self.output_index as u64)
    }
}

impl Serializer for UtxoId {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            tx_id: Hash::read(reader)?,
            output_index: reader.read_u32()?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.tx_id.write(writer);
        writer.write_u32(self.output_index);
    }

    fn size(&self) -> usize {
        self.tx_id.size() + 4
    }
}

fn read_transfer_input(reader: &mut Reader) -> Result<TransferInput, ReaderError> {
    match reader.read_type_tag()? {
        TypeTag::TransferInput => TransferInput::read(reader),
        got => Err(ReaderError::UnexpectedType {
            expected: "transfer input",
            got,
        }),
    }
}

fn read_transfer_output(reader: &mut Reader) -> Result<TransferOutput, ReaderError> {
    match reader.read_type_tag()? {
        TypeTag::TransferOutput => TransferOutput::read(reader),
        got => Err(ReaderError::UnexpectedType {
            expected: "transfer output",
            got,
        }),
    }
}

/// Reference to a UTXO being consumed, with the asset it holds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableInput {
    pub utxo_id: UtxoId,
    pub asset_id: Hash,
    pub input: TransferInput,
}

impl TransferableInput {
    pub fn input_id(&self) -> Hash {
        self.utxo_id.input_id()
    }

    pub fn amount(&self) -> u64 {
        self.input.amt
    }
}

impl Serializer for TransferableInput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            utxo_id: UtxoId::read(reader)?,
            asset_id: Hash::read(reader)?,
            input: read_transfer_input(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.utxo_id.write(writer);
        self.asset_id.write(writer);
        writer.write_type_tag(TypeTag::TransferInput);
        self.input.write(writer);
    }

    fn size(&self) -> usize {
        self.utxo_id.size() + self.asset_id.size() + 4 + self.input.size()
    }
}

/// Output created on the destination chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferableOutput {
    pub asset_id: Hash,
    pub output: TransferOutput,
}

impl TransferableOutput {
    pub fn amount(&self) -> u64 {
        self.output.amt
    }

    // Canonical bytes of the tagged output, used to order outputs of the same asset
    fn output_bytes(&self, codec: &Codec) -> Option<Vec<u8>> {
        let mut writer = Writer::with_capacity(codec, 4 + self.output.size());
        writer.write_type_tag(TypeTag::TransferOutput);
        self.output.write(&mut writer);
        writer.finish().ok()
    }
}

impl Serializer for TransferableOutput {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            asset_id: Hash::read(reader)?,
            output: read_transfer_output(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.asset_id.write(writer);
        writer.write_type_tag(TypeTag::TransferOutput);
        self.output.write(writer);
    }

    fn size(&self) -> usize {
        self.asset_id.size() + 4 + self.output.size()
    }
}

/// Unspent output as stored in shared memory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub utxo_id: UtxoId,
    pub asset_id: Hash,
    pub output: TransferOutput,
}

impl Utxo {
    pub fn input_id(&self) -> Hash {
        self.utxo_id.input_id()
    }
}

impl Serializer for Utxo {
    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Self {
            utxo_id: UtxoId::read(reader)?,
            asset_id: Hash::read(reader)?,
            output: read_transfer_output(reader)?,
        })
    }

    fn write(&self, writer: &mut Writer) {
        self.utxo_id.write(writer);
        self.asset_id.write(writer);
        writer.write_type_tag(TypeTag::TransferOutput);
        self.output.write(writer);
    }

    fn size(&self) -> usize {
        self.utxo_id.size() + self.asset_id.size() + 4 + self.output.size()
    }
}

// Inputs are ordered by the UTXO they consume
pub fn is_sorted_and_unique_inputs(inputs: &[TransferableInput]) -> bool {
    inputs.windows(2).all(|w| w[0].utxo_id < w[1].utxo_id)
}

pub fn sort_inputs(inputs: &mut [TransferableInput]) {
    inputs.sort_by(|a, b| a.utxo_id.cmp(&b.utxo_id));
}

// Outputs are ordered by asset, then by their encoded output
pub fn is_sorted_outputs(outputs: &[TransferableOutput], codec: &Codec) -> bool {
    let mut keys = Vec::with_capacity(outputs.len());
    for output in outputs {
        match output.output_bytes(codec) {
            Some(bytes) => keys.push((&output.asset_id, bytes)),
            None => return false,
        }
    }
    keys.windows(2).all(|w| w[0] <= w[1])
}

pub fn sort_outputs(outputs: &mut [TransferableOutput], codec: &Codec) {
    outputs.sort_by_cached_key(|output| {
        (
            output.asset_id.clone(),
            output.output_bytes(codec).unwrap_or_default(),
        )
    });
}

// Sort items and keep each one paired with the keys that must sign it
pub fn sort_with_signers<T, K, F>(items: &mut Vec<T>, signers: &mut Vec<Vec<PrivateKey>>, key: F)
where
    K: Ord,
    F: Fn(&T) -> K,
{
    let mut paired: Vec<(T, Vec<PrivateKey>)> = items.drain(..).zip(signers.drain(..)).collect();
    paired.sort_by(|(a, _), (b, _)| key(a).cmp(&key(b)));
    for (item, keys) in paired {
        items.push(item);
        signers.push(keys);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::ShortId, fx::OutputOwners};
    use proptest::prelude::*;

    fn input(tx: u8, index: u32) -> TransferableInput {
        TransferableInput {
            utxo_id: UtxoId::new(Hash::new([tx; 32]), index),
            asset_id: Hash::zero(),
            input: TransferInput::new(1, vec![0]),
        }
    }

    fn output(asset: u8, amt: u64) -> TransferableOutput {
        TransferableOutput {
            asset_id: Hash::new([asset; 32]),
            output: TransferOutput::new(amt, OutputOwners::new(0, 1, vec![ShortId::new([1; 20])])),
        }
    }

    #[test]
    fn test_input_order() {
        let mut inputs = vec![input(2, 0), input(1, 1), input(1, 0)];
        assert!(!is_sorted_and_unique_inputs(&inputs));
        sort_inputs(&mut inputs);
        assert!(is_sorted_and_unique_inputs(&inputs));
        assert_eq!(inputs[0], input(1, 0));

        let duplicated = vec![input(1, 0), input(1, 0)];
        assert!(!is_sorted_and_unique_inputs(&duplicated));
    }

    #[test]
    fn test_output_order() {
        let codec = Codec::default();
        let mut outputs = vec![output(2, 1), output(1, 7), output(1, 3)];
        assert!(!is_sorted_outputs(&outputs, &codec));
        sort_outputs(&mut outputs, &codec);
        assert!(is_sorted_outputs(&outputs, &codec));
        assert_eq!(outputs, vec![output(1, 3), output(1, 7), output(2, 1)]);

        // Duplicates are allowed
        assert!(is_sorted_outputs(&[output(1, 3), output(1, 3)], &codec));
    }

    #[test]
    fn test_input_id() {
        let id = UtxoId::new(Hash::new([5; 32]), 3);
        assert_eq!(id.input_id(), Hash::new([5; 32]).prefix(3));
        assert_ne!(id.input_id(), UtxoId::new(Hash::new([5; 32]), 4).input_id());
    }

    #[test]
    fn test_utxo_encoding() {
        let codec = Codec::default();
        let utxo = Utxo {
            utxo_id: UtxoId::new(Hash::new([5; 32]), 3),
            asset_id: Hash::new([6; 32]),
            output: output(6, 9).output,
        };
        let bytes = codec.marshal(&utxo).unwrap();
        // version + tx id + index + asset + type id + amount + locktime + threshold + 1 address
        assert_eq!(bytes.len(), 2 + 32 + 4 + 32 + 4 + 8 + 8 + 4 + 4 + 20);
        assert_eq!(&bytes[70..74], &7u32.to_be_bytes());
        assert_eq!(codec.unmarshal::<Utxo>(&bytes).unwrap(), utxo);
    }

    #[test]
    fn test_sort_with_signers() {
        let key_a = PrivateKey::from_bytes(&[1; 32]).unwrap();
        let key_b = PrivateKey::from_bytes(&[2; 32]).unwrap();
        let mut inputs = vec![input(2, 0), input(1, 0)];
        let mut signers = vec![vec![key_a.clone()], vec![key_b.clone()]];
        sort_with_signers(&mut inputs, &mut signers, |i| i.utxo_id.clone());
        assert_eq!(inputs[0], input(1, 0));
        assert_eq!(signers[0][0].to_bytes(), key_b.to_bytes());
        assert_eq!(signers[1][0].to_bytes(), key_a.to_bytes());
    }

    fn arb_inputs() -> impl Strategy<Value = Vec<TransferableInput>> {
        prop::collection::hash_set((0u8..4, 0u32..4), 0..12)
            .prop_map(|ids| ids.into_iter().map(|(tx, index)| input(tx, index)).collect())
    }

    proptest! {
        #[test]
        fn test_input_sort_round_trip(inputs in arb_inputs()) {
            let mut sorted = inputs.clone();
            sort_inputs(&mut sorted);
            prop_assert!(is_sorted_and_unique_inputs(&sorted));

            let once = sorted.clone();
            sort_inputs(&mut sorted);
            prop_assert_eq!(&once, &sorted);

            // Sorting with signers gives the same order and keeps each key on its input
            let mut paired = inputs;
            let mut signers: Vec<Vec<PrivateKey>> = paired
                .iter()
                .map(|i| vec![PrivateKey::from_bytes(&[i.utxo_id.output_index as u8 + 1; 32]).unwrap()])
                .collect();
            sort_with_signers(&mut paired, &mut signers, |i| i.utxo_id.clone());
            prop_assert_eq!(&paired, &sorted);
            for (input, keys) in paired.iter().zip(&signers) {
                prop_assert_eq!(keys[0].to_bytes(), [input.utxo_id.output_index as u8 + 1; 32]);
            }
        }
    }
}
