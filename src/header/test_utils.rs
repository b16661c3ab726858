use rand::distributions::Uniform;
use rand::Rng;

use crate::constants::nmf::{BIT_DEPTHS, MAX_CHANNELS, MAX_SAMPLE_RATE};
use crate::header::NmfHeader;

const MAX_TEST_SAMPLES: i32 = 4096;

pub(crate) fn create_random_header<R: Rng>(engine: &mut R) -> NmfHeader {
    let channels = engine.sample(Uniform::new_inclusive(1, MAX_CHANNELS));
    let sample_rate = engine.sample(Uniform::new_inclusive(1, MAX_SAMPLE_RATE));
    let bit_depth = BIT_DEPTHS[engine.sample(Uniform::new(0, BIT_DEPTHS.len()))];
    let num_samples = engine.sample(Uniform::new_inclusive(1, MAX_TEST_SAMPLES));
    NmfHeader::new(channels, sample_rate, bit_depth, num_samples).expect("Generated an invalid header")
}

pub(crate) fn random_payload<R: Rng>(engine: &mut R, len: u64) -> Vec<u8> {
    (0..len).map(|_| engine.gen()).collect()
}

/// Raw NMF header bytes with arbitrary (possibly invalid) fields in the order
/// version, channels, sample rate, bit depth, number of samples.
pub(crate) fn nmf_header_bytes(magic: &[u8], fields: [i32; 5]) -> Vec<u8> {
    let mut result = magic.to_vec();
    for field in fields {
        result.extend_from_slice(&field.to_le_bytes());
    }
    result
}

/// An NMF stream with the given header and payload
pub(crate) fn nmf_stream(header: &NmfHeader, payload: &[u8]) -> Vec<u8> {
    let mut result = header.to_vec().expect("Unable to encode header");
    result.extend_from_slice(payload);
    result
}

/// Assembles RIFF/WAVE streams chunk by chunk, including layouts the
/// converter never writes.
#[derive(Debug, Default)]
pub(crate) struct WavBuilder {
    chunks: Vec<u8>,
}

impl WavBuilder {
    pub(crate) fn new() -> WavBuilder { WavBuilder::default() }

    pub(crate) fn pcm(channels: u16, sample_rate: u32, bits_per_sample: u16) -> WavBuilder {
        WavBuilder::new().fmt(1, channels, sample_rate, bits_per_sample, 0)
    }

    pub(crate) fn chunk(mut self, id: &[u8; 4], body: &[u8]) -> WavBuilder {
        self.chunks.extend_from_slice(id);
        self.chunks.extend_from_slice(&u32::try_from(body.len()).expect("Chunk too large").to_le_bytes());
        self.chunks.extend_from_slice(body);
        self
    }

    pub(crate) fn fmt(
        self, audio_format: u16, channels: u16, sample_rate: u32, bits_per_sample: u16, extra: usize,
    ) -> WavBuilder {
        let block_align = channels * (bits_per_sample / 8);
        let mut body = Vec::new();
        body.extend_from_slice(&audio_format.to_le_bytes());
        body.extend_from_slice(&channels.to_le_bytes());
        body.extend_from_slice(&sample_rate.to_le_bytes());
        body.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&bits_per_sample.to_le_bytes());
        body.resize(body.len() + extra, 0);
        self.chunk(b"fmt ", &body)
    }

    pub(crate) fn data(self, payload: &[u8]) -> WavBuilder { self.chunk(b"data", payload) }

    /// Appends bytes that are not part of any chunk
    pub(crate) fn trailing(mut self, bytes: &[u8]) -> WavBuilder {
        self.chunks.extend_from_slice(bytes);
        self
    }

    pub(crate) fn build(self) -> Vec<u8> {
        let riff_size = u32::try_from(self.chunks.len() + 4).expect("Stream too large");
        let mut result = b"RIFF".to_vec();
        result.extend_from_slice(&riff_size.to_le_bytes());
        result.extend_from_slice(b"WAVE");
        result.extend(self.chunks);
        result
    }
}
