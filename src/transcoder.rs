use std::io::{self, Read, Seek, SeekFrom, Write};

use derivative::Derivative;
use tracing::{debug, info, warn};

use crate::constants::wav;
use crate::copy::{copy_payload, CopyOutcome};
use crate::header::{ContainerHeader, NmfHeader, WavHeader};
use crate::interrupt::{Interrupt, Never};
use crate::{Direction, Error};

/// What to do when the source holds less payload than its header declares
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadPolicy {
    /// Accept the shorter payload. The output is finalized with sizes
    /// matching what was actually copied.
    #[default]
    Lenient,

    /// Fail the conversion with `Error::TruncatedPayload`
    Strict,
}

/// The result of a completed conversion
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConversionSummary {
    pub direction: Direction,

    /// The header read from the input
    pub source: ContainerHeader,

    /// The header written to the output
    pub destination: ContainerHeader,

    /// Payload bytes requested and copied
    pub payload: CopyOutcome,

    /// Bytes of a trailing partial frame in the WAV `data` chunk that the NMF
    /// output does not carry
    pub trailing_bytes_dropped: u64,
}

impl ConversionSummary {
    /// Whether the input ended before the declared payload was copied
    #[must_use]
    pub fn is_truncated(&self) -> bool { self.payload.is_truncated() }
}

/// Converts single streams between NMF and WAV
#[derive(Derivative)]
#[derivative(Debug(bound = ""))]
pub struct Transcoder<'a, I: Interrupt + ?Sized = Never> {
    policy: PayloadPolicy,
    #[derivative(Debug = "ignore")]
    interrupt: &'a I,
}

const NEVER: Never = Never {};

impl Transcoder<'static, Never> {
    /// Constructs a lenient transcoder that cannot be interrupted
    #[must_use]
    pub fn new() -> Self { Transcoder { policy: PayloadPolicy::default(), interrupt: &NEVER } }
}

impl Default for Transcoder<'static, Never> {
    fn default() -> Self { Transcoder::new() }
}

impl<'a, I: Interrupt + ?Sized> Transcoder<'a, I> {
    /// Constructs a transcoder whose payload copies abort once `interrupt`
    /// is set
    pub fn with_interrupt(policy: PayloadPolicy, interrupt: &'a I) -> Transcoder<'a, I> {
        Transcoder { policy, interrupt }
    }

    /// Changes the policy for short payloads
    #[must_use]
    pub fn policy(mut self, policy: PayloadPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Converts in the given direction. `input` must be positioned at the
    /// start of the source container.
    pub fn convert<R, W>(&self, direction: Direction, input: &mut R, output: &mut W) -> Result<ConversionSummary, Error>
    where
        R: Read + Seek,
        W: Write + Seek,
    {
        match direction {
            Direction::NmfToWav => self.convert_nmf_to_wav(input, output),
            Direction::WavToNmf => self.convert_wav_to_nmf(input, output),
        }
    }

    /// Reads an NMF stream and writes it as a canonical WAV stream. The
    /// RIFF and `data` sizes are patched after the payload is written, so
    /// `output` must be an empty stream positioned at its start.
    pub fn convert_nmf_to_wav<R, W>(&self, input: &mut R, output: &mut W) -> Result<ConversionSummary, Error>
    where
        R: Read,
        W: Write + Seek,
    {
        let nmf_header = NmfHeader::read_from(input)?;
        debug!("Read header: {}", nmf_header);
        let wav_header = WavHeader::from_nmf(&nmf_header)?;
        wav_header.serialize_into(output)?;

        let payload = self.copy(input, output, nmf_header.payload_size())?;
        let written = output.stream_position().map_err(Error::WriteError)?;
        let len = output.seek(SeekFrom::End(0)).map_err(Error::WriteError)?;
        if written != wav::HEADER_SIZE + payload.copied || len != written {
            return Err(Error::WriteError(io::Error::new(
                io::ErrorKind::InvalidInput,
                "WAV output must start at the beginning of an empty stream",
            )));
        }
        let total = WavHeader::patch_sizes(output)?;
        output.flush().map_err(Error::WriteError)?;

        let destination = WavHeader {
            file_size: total,
            data_size: u32::try_from(payload.copied).map_err(|_| Error::PayloadTooLarge(payload.copied))?,
            ..wav_header
        };
        let summary = ConversionSummary {
            direction: Direction::NmfToWav,
            source: ContainerHeader::Nmf(nmf_header),
            destination: ContainerHeader::Wav(destination),
            payload,
            trailing_bytes_dropped: 0,
        };
        info!("Converted {} with {} payload bytes", summary.direction, payload.copied);
        Ok(summary)
    }

    /// Reads a WAV stream and writes it as an NMF stream. Only whole frames
    /// of the `data` chunk are copied, so the output payload always matches
    /// the derived sample count.
    pub fn convert_wav_to_nmf<R, W>(&self, input: &mut R, output: &mut W) -> Result<ConversionSummary, Error>
    where
        R: Read + Seek,
        W: Write,
    {
        let wav_header = WavHeader::read_from(input)?;
        debug!("Read header: {}", wav_header);
        let nmf_header = NmfHeader::from_wav(&wav_header)?;
        nmf_header.serialize_into(output)?;

        input.seek(SeekFrom::Start(wav_header.data_position)).map_err(Error::ReadError)?;
        let payload_size = nmf_header.payload_size();
        let trailing_bytes_dropped = u64::from(wav_header.data_size) - payload_size;
        if trailing_bytes_dropped > 0 {
            warn!("Dropping {} bytes of trailing partial frame from WAV data", trailing_bytes_dropped);
        }
        let payload = self.copy(input, output, payload_size)?;
        output.flush().map_err(Error::WriteError)?;

        let summary = ConversionSummary {
            direction: Direction::WavToNmf,
            source: ContainerHeader::Wav(wav_header),
            destination: ContainerHeader::Nmf(nmf_header),
            payload,
            trailing_bytes_dropped,
        };
        info!("Converted {} with {} payload bytes", summary.direction, payload.copied);
        Ok(summary)
    }

    fn copy<R, W>(&self, input: &mut R, output: &mut W, len: u64) -> Result<CopyOutcome, Error>
    where
        R: Read + ?Sized,
        W: Write + ?Sized,
    {
        let outcome = copy_payload(input, output, len, self.interrupt)?;
        if outcome.is_truncated() {
            match self.policy {
                PayloadPolicy::Strict => {
                    return Err(Error::TruncatedPayload { expected: outcome.requested, copied: outcome.copied })
                }
                PayloadPolicy::Lenient => {
                    warn!("Payload truncated: expected {} bytes but copied {}", outcome.requested, outcome.copied);
                }
            }
        }
        debug!("Copied {} of {} payload bytes", outcome.copied, outcome.requested);
        Ok(outcome)
    }
}

/// Converts an NMF stream to WAV, accepting truncated payloads
pub fn convert_nmf_to_wav<R, W>(input: &mut R, output: &mut W) -> Result<ConversionSummary, Error>
where
    R: Read,
    W: Write + Seek,
{
    Transcoder::new().convert_nmf_to_wav(input, output)
}

/// Converts a WAV stream to NMF, accepting truncated payloads
pub fn convert_wav_to_nmf<R, W>(input: &mut R, output: &mut W) -> Result<ConversionSummary, Error>
where
    R: Read + Seek,
    W: Write,
{
    Transcoder::new().convert_wav_to_nmf(input, output)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::atomic::AtomicBool;

    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    use super::*;
    use crate::header::test_utils::{create_random_header, nmf_stream, random_payload, WavBuilder};
    use crate::Container;

    const NUM_ROUND_TRIPS: usize = 64;

    fn read_u32_at(data: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap())
    }

    fn nmf_to_wav(input: &[u8]) -> Result<(ConversionSummary, Vec<u8>), Error> {
        let mut output = Cursor::new(Vec::new());
        let summary = convert_nmf_to_wav(&mut Cursor::new(input), &mut output)?;
        Ok((summary, output.into_inner()))
    }

    fn wav_to_nmf(input: &[u8]) -> Result<(ConversionSummary, Vec<u8>), Error> {
        let mut output = Vec::new();
        let summary = convert_wav_to_nmf(&mut Cursor::new(input), &mut output)?;
        Ok((summary, output))
    }

    #[test]
    fn stereo_scenario() {
        let header = NmfHeader::new(2, 44100, 16, 10).unwrap();
        let payload: Vec<u8> = (0..40).collect();
        let (summary, wav) = nmf_to_wav(&nmf_stream(&header, &payload)).unwrap();
        assert_eq!(wav.len(), 84);
        assert_eq!(read_u32_at(&wav, 4), 76);
        assert_eq!(read_u32_at(&wav, 40), 40);
        assert_eq!(&wav[44..], &payload[..]);
        assert_eq!(summary.payload, CopyOutcome { requested: 40, copied: 40 });
        assert!(!summary.is_truncated());
    }

    #[test]
    fn round_trip_preserves_header_and_payload() {
        let mut rng = SmallRng::seed_from_u64(31337);
        for _ in 0..NUM_ROUND_TRIPS {
            let header = create_random_header(&mut rng);
            let payload = random_payload(&mut rng, header.payload_size());
            let original = nmf_stream(&header, &payload);
            let (_, wav) = nmf_to_wav(&original).unwrap();
            let frames = header.payload_size();
            assert_eq!(u64::from(read_u32_at(&wav, 4)), wav::HEADER_SIZE + frames - 8);
            assert_eq!(u64::from(read_u32_at(&wav, 40)), frames);
            let (summary, nmf) = wav_to_nmf(&wav).unwrap();
            assert_eq!(summary.destination, ContainerHeader::Nmf(header));
            assert_eq!(nmf, original);
        }
    }

    #[test]
    fn truncated_nmf_payload_is_accepted_by_default() {
        let header = NmfHeader::new(1, 8000, 8, 100).unwrap();
        let (summary, wav) = nmf_to_wav(&nmf_stream(&header, &[0x80; 60])).unwrap();
        assert!(summary.is_truncated());
        assert_eq!(summary.payload.copied, 60);
        assert_eq!(wav.len(), 44 + 60);
        assert_eq!(read_u32_at(&wav, 4), 44 + 60 - 8);
        assert_eq!(read_u32_at(&wav, 40), 60);
        match summary.destination {
            ContainerHeader::Wav(h) => assert_eq!(h.data_size, 60),
            other => panic!("Unexpected destination header {:?}", other),
        }
    }

    #[test]
    fn truncated_payload_fails_when_strict() {
        let header = NmfHeader::new(1, 8000, 8, 100).unwrap();
        let input = nmf_stream(&header, &[0x80; 60]);
        let transcoder = Transcoder::new().policy(PayloadPolicy::Strict);
        let result = transcoder.convert_nmf_to_wav(&mut Cursor::new(input), &mut Cursor::new(Vec::new()));
        match result {
            Err(Error::TruncatedPayload { expected: 100, copied: 60 }) => {}
            other => panic!("Wrong result for strict truncation: {:?}", other),
        }
    }

    #[test]
    fn trailing_input_after_payload_is_ignored() {
        let header = NmfHeader::new(1, 8000, 16, 4).unwrap();
        let mut input = nmf_stream(&header, &[1; 8]);
        input.extend_from_slice(b"garbage");
        let (_, wav) = nmf_to_wav(&input).unwrap();
        assert_eq!(wav.len(), 44 + 8);
    }

    #[test]
    fn partial_frame_is_dropped() {
        let payload: Vec<u8> = (0..41).collect();
        let wav = WavBuilder::pcm(2, 44100, 16).data(&payload).build();
        let (summary, nmf) = wav_to_nmf(&wav).unwrap();
        match summary.destination {
            ContainerHeader::Nmf(h) => assert_eq!(h.num_samples, 10),
            other => panic!("Unexpected destination header {:?}", other),
        }
        assert_eq!(summary.trailing_bytes_dropped, 1);
        assert_eq!(summary.payload.copied, 40);
        assert_eq!(nmf.len(), 24 + 40);
        assert_eq!(&nmf[24..], &payload[..40]);
    }

    #[test]
    fn wav_with_extra_chunks_converts() {
        let payload = [9u8; 12];
        let wav = WavBuilder::new()
            .chunk(b"bext", &[0; 10])
            .fmt(1, 1, 22050, 16, 0)
            .chunk(b"LIST", &[1; 30])
            .data(&payload)
            .chunk(b"id3 ", &[2; 5])
            .build();
        let (_, nmf) = wav_to_nmf(&wav).unwrap();
        let expected = nmf_stream(&NmfHeader::new(1, 22050, 16, 6).unwrap(), &payload);
        assert_eq!(nmf, expected);
    }

    #[test]
    fn truncated_wav_data() {
        let wav = WavBuilder::pcm(1, 8000, 8).chunk(b"data", &[]).build();
        let mut wav = wav;
        // Claim 16 bytes of data but supply only 4
        let len = wav.len();
        wav[len - 4..].copy_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&[5; 4]);
        let (summary, nmf) = wav_to_nmf(&wav).unwrap();
        assert!(summary.is_truncated());
        assert_eq!(nmf.len(), 24 + 4);

        let strict = Transcoder::new().policy(PayloadPolicy::Strict);
        let result = strict.convert_wav_to_nmf(&mut Cursor::new(&wav), &mut Vec::new());
        assert!(matches!(result, Err(Error::TruncatedPayload { expected: 16, copied: 4 })));
    }

    #[test]
    fn unconvertible_wav_fields() {
        let zero_channels = WavBuilder::pcm(0, 44100, 16).data(&[0; 4]).build();
        assert!(matches!(wav_to_nmf(&zero_channels), Err(Error::InvalidField { field: "channel count", .. })));

        let odd_depth = WavBuilder::pcm(2, 44100, 12).data(&[0; 6]).build();
        assert!(matches!(wav_to_nmf(&odd_depth), Err(Error::InvalidField { field: "bit depth", .. })));

        let no_rate = WavBuilder::pcm(2, 0, 16).data(&[0; 4]).build();
        assert!(matches!(wav_to_nmf(&no_rate), Err(Error::InvalidField { field: "sample rate", value: 0 })));

        let fast_rate = WavBuilder::pcm(2, 192_001, 16).data(&[0; 4]).build();
        assert!(matches!(wav_to_nmf(&fast_rate), Err(Error::InvalidField { field: "sample rate", value: 192_001 })));

        let max_rate = WavBuilder::pcm(2, 192_000, 16).data(&[0; 4]).build();
        assert_eq!(wav_to_nmf(&max_rate).unwrap().0.destination.container(), Container::Nmf);

        let less_than_a_frame = WavBuilder::pcm(2, 44100, 16).data(&[0; 3]).build();
        assert!(matches!(wav_to_nmf(&less_than_a_frame), Err(Error::InvalidField { field: "number of samples", .. })));
    }

    #[test]
    fn format_errors_write_nothing() {
        let mut output = Cursor::new(Vec::new());
        let result = convert_nmf_to_wav(&mut Cursor::new(b"RIFF0000WAVE".to_vec()), &mut output);
        assert!(result.unwrap_err().is_format_error());
        assert!(output.into_inner().is_empty());
    }

    #[test]
    fn short_magic_is_format_error() {
        let inputs: [&[u8]; 3] = [b"", b"NM", b"NMF"];
        for data in inputs {
            let result = convert_nmf_to_wav(&mut Cursor::new(data), &mut Cursor::new(Vec::new()));
            assert!(matches!(result, Err(Error::BadMagic(Container::Nmf))), "{:?}: {:?}", data, result);
        }
        let inputs: [&[u8]; 2] = [b"RI", b"RIFF\x04\0\0\0WA"];
        for data in inputs {
            let result = convert_wav_to_nmf(&mut Cursor::new(data), &mut Vec::new());
            assert!(matches!(result, Err(Error::BadMagic(Container::Wav))), "{:?}: {:?}", data, result);
        }
    }

    #[test]
    fn wav_output_must_be_empty() {
        let header = NmfHeader::new(2, 44100, 16, 10).unwrap();
        let input = nmf_stream(&header, &[3; 40]);
        let mut output = Cursor::new(vec![0xff; 100]);
        let result = convert_nmf_to_wav(&mut Cursor::new(&input), &mut output);
        assert!(matches!(result, Err(Error::WriteError(_))));

        let mut output = Cursor::new(Vec::new());
        output.set_position(10);
        let result = convert_nmf_to_wav(&mut Cursor::new(&input), &mut output);
        assert!(matches!(result, Err(Error::WriteError(_))));
    }

    #[test]
    fn interrupt_aborts_conversion() {
        let header = NmfHeader::new(1, 8000, 8, 10).unwrap();
        let interrupt = AtomicBool::new(true);
        let transcoder = Transcoder::with_interrupt(PayloadPolicy::Lenient, &interrupt);
        let result = transcoder.convert(
            Direction::NmfToWav,
            &mut Cursor::new(nmf_stream(&header, &[0; 10])),
            &mut Cursor::new(Vec::new()),
        );
        assert!(matches!(result, Err(Error::Interrupted)));
    }

    #[test]
    fn dispatch_by_direction() {
        let wav = WavBuilder::pcm(1, 16000, 32).data(&[3; 8]).trailing(b"xx").build();
        let mut output = Cursor::new(Vec::new());
        let summary = Transcoder::new().convert(Direction::WavToNmf, &mut Cursor::new(wav), &mut output).unwrap();
        assert_eq!(summary.direction, Direction::WavToNmf);
        assert_eq!(summary.source.payload_size(), 8);
        assert_eq!(output.into_inner().len(), 24 + 8);
    }
}
