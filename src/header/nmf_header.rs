use std::fmt::{self, Display, Formatter};
use std::io::{Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::constants::nmf::{BIT_DEPTHS, HEADER_SIZE, MAGIC, MAX_CHANNELS, MAX_SAMPLE_RATE, VERSION};
use crate::header::{read_tag, WavHeader};
use crate::{Container, Error};

/// The fixed header at the start of an NMF stream. The magic number is
/// implied by the type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NmfHeader {
    /// Format version. Accepted unchecked on read.
    pub version: i32,

    /// Number of interleaved channels
    pub channels: i32,

    /// Sample rate in Hz
    pub sample_rate: i32,

    /// Bits per sample
    pub bit_depth: i32,

    /// Number of sample frames in the payload
    pub num_samples: i32,
}

fn check(field: &'static str, value: i32, valid: bool) -> Result<i32, Error> {
    if valid {
        Ok(value)
    } else {
        Err(Error::InvalidField { field, value: value.into() })
    }
}

fn check_channels(value: i32) -> Result<i32, Error> {
    check("channel count", value, (1..=MAX_CHANNELS).contains(&value))
}

fn check_sample_rate(value: i32) -> Result<i32, Error> {
    check("sample rate", value, (1..=MAX_SAMPLE_RATE).contains(&value))
}

fn check_bit_depth(value: i32) -> Result<i32, Error> { check("bit depth", value, BIT_DEPTHS.contains(&value)) }

fn check_num_samples(value: i32) -> Result<i32, Error> { check("number of samples", value, value > 0) }

fn read_field<R: Read>(reader: &mut R) -> Result<i32, Error> {
    reader.read_i32::<LittleEndian>().map_err(Error::ReadError)
}

impl NmfHeader {
    /// Constructs a current-version header, validating every field
    pub fn new(channels: i32, sample_rate: i32, bit_depth: i32, num_samples: i32) -> Result<NmfHeader, Error> {
        let header = NmfHeader { version: VERSION, channels, sample_rate, bit_depth, num_samples };
        header.validate()?;
        Ok(header)
    }

    /// Reads and validates a header. Fails on the first invalid field and
    /// leaves the reader positioned at the first payload byte on success.
    pub fn read_from<R: Read>(reader: &mut R) -> Result<NmfHeader, Error> {
        read_tag(reader, MAGIC, Container::Nmf)?;
        let version = read_field(reader)?;
        let channels = check_channels(read_field(reader)?)?;
        let sample_rate = check_sample_rate(read_field(reader)?)?;
        let bit_depth = check_bit_depth(read_field(reader)?)?;
        let num_samples = check_num_samples(read_field(reader)?)?;
        Ok(NmfHeader { version, channels, sample_rate, bit_depth, num_samples })
    }

    /// Derives the header of the NMF equivalent of a WAV stream. The sample
    /// count covers whole frames only, so any trailing partial frame in the
    /// WAV data is not accounted for.
    pub fn from_wav(wav: &WavHeader) -> Result<NmfHeader, Error> {
        let channels = check_channels(wav.channels.into())?;
        let sample_rate = i32::try_from(wav.sample_rate)
            .map_err(|_| Error::InvalidField { field: "sample rate", value: wav.sample_rate.into() })
            .and_then(check_sample_rate)?;
        let bit_depth = check_bit_depth(wav.bits_per_sample.into())?;
        let mut header = NmfHeader { version: VERSION, channels, sample_rate, bit_depth, num_samples: 0 };
        let frames = u64::from(wav.data_size) / header.frame_size();
        header.num_samples = i32::try_from(frames).map_err(|_| Error::PayloadTooLarge(wav.data_size.into()))?;
        check_num_samples(header.num_samples)?;
        Ok(header)
    }

    /// Checks all range-constrained fields
    pub fn validate(&self) -> Result<(), Error> {
        check_channels(self.channels)?;
        check_sample_rate(self.sample_rate)?;
        check_bit_depth(self.bit_depth)?;
        check_num_samples(self.num_samples)?;
        Ok(())
    }

    /// Writes the serialized header. Exactly `HEADER_SIZE` bytes.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let mut body = || -> std::io::Result<()> {
            writer.write_all(MAGIC)?;
            for value in [self.version, self.channels, self.sample_rate, self.bit_depth, self.num_samples] {
                writer.write_i32::<LittleEndian>(value)?;
            }
            Ok(())
        };
        body().map_err(Error::WriteError)
    }

    /// Converts the header into bytes
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut result = Vec::with_capacity(HEADER_SIZE as usize);
        self.serialize_into(&mut result)?;
        Ok(result)
    }

    /// Bytes occupied by one sample of one channel
    #[must_use]
    pub fn bytes_per_sample(&self) -> u64 { u64::try_from(self.bit_depth / 8).unwrap_or(0) }

    /// Bytes occupied by one sample across all channels
    #[must_use]
    pub fn frame_size(&self) -> u64 { u64::try_from(self.channels).unwrap_or(0) * self.bytes_per_sample() }

    /// Length of the payload that follows the header
    #[must_use]
    pub fn payload_size(&self) -> u64 { u64::try_from(self.num_samples).unwrap_or(0) * self.frame_size() }
}

impl Display for NmfHeader {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            formatter,
            "NMF v{}: {} channel(s), {} Hz, {}-bit, {} frames",
            self.version, self.channels, self.sample_rate, self.bit_depth, self.num_samples
        )
    }
}
