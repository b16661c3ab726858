use std::fmt::{self, Display, Formatter};
use std::io::{self, Read, Seek, SeekFrom, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use tracing::debug;

use crate::constants::wav::{
    DATA_CHUNK, DATA_SIZE_OFFSET, FMT_CHUNK, FMT_CHUNK_SIZE, HEADER_SIZE, PCM_FORMAT, RIFF, RIFF_SIZE_OFFSET, WAVE,
};
use crate::header::{read_tag, NmfHeader};
use crate::{Container, Error};

/// The fields of a RIFF/WAVE stream relevant to PCM conversion
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WavHeader {
    /// Total length of the file according to the RIFF chunk size
    pub file_size: u64,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    /// As read; recomputed from the other fields on write
    pub byte_rate: u32,
    /// As read; recomputed from the other fields on write
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Length of the `data` chunk payload
    pub data_size: u32,
    /// Absolute offset of the first payload byte in the source stream
    pub data_position: u64,
}

#[derive(Default)]
struct FmtChunk {
    audio_format: u16,
    channels: u16,
    sample_rate: u32,
    byte_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
}

/// Reads a chunk ID and size, or `None` if the stream ends first
fn read_chunk_header<R: Read>(reader: &mut R) -> Result<Option<([u8; 4], u32)>, Error> {
    let mut read = || -> io::Result<([u8; 4], u32)> {
        let mut id = [0u8; 4];
        reader.read_exact(&mut id)?;
        let size = reader.read_u32::<LittleEndian>()?;
        Ok((id, size))
    };
    match read() {
        Ok(header) => Ok(Some(header)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(Error::ReadError(e)),
    }
}

fn read_fmt_chunk<R: Read + Seek>(reader: &mut R, chunk_size: u32) -> Result<FmtChunk, Error> {
    if chunk_size < FMT_CHUNK_SIZE {
        return Err(Error::MalformedFmtChunk(chunk_size));
    }
    let mut read = || -> io::Result<FmtChunk> {
        Ok(FmtChunk {
            audio_format: reader.read_u16::<LittleEndian>()?,
            channels: reader.read_u16::<LittleEndian>()?,
            sample_rate: reader.read_u32::<LittleEndian>()?,
            byte_rate: reader.read_u32::<LittleEndian>()?,
            block_align: reader.read_u16::<LittleEndian>()?,
            bits_per_sample: reader.read_u16::<LittleEndian>()?,
        })
    };
    let fmt = read().map_err(Error::ReadError)?;
    skip(reader, chunk_size - FMT_CHUNK_SIZE)?;
    Ok(fmt)
}

fn skip<R: Seek>(reader: &mut R, len: u32) -> Result<(), Error> {
    if len > 0 {
        reader.seek(SeekFrom::Current(len.into())).map_err(Error::ReadError)?;
    }
    Ok(())
}

fn to_u32(value: u64) -> Result<u32, Error> { u32::try_from(value).map_err(|_| Error::PayloadTooLarge(value)) }

impl WavHeader {
    /// Reads the RIFF header and scans chunks until the `data` chunk is
    /// found. Chunks other than `fmt ` and `data` are skipped. On success
    /// the reader is positioned at the first payload byte.
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<WavHeader, Error> {
        read_tag(reader, RIFF, Container::Wav)?;
        let riff_size = reader.read_u32::<LittleEndian>().map_err(Error::ReadError)?;
        read_tag(reader, WAVE, Container::Wav)?;

        let mut fmt = None;
        let mut data = None;
        while let Some((id, size)) = read_chunk_header(reader)? {
            match id {
                FMT_CHUNK => fmt = Some(read_fmt_chunk(reader, size)?),
                DATA_CHUNK => {
                    let position = reader.stream_position().map_err(Error::ReadError)?;
                    data = Some((size, position));
                    break;
                }
                _ => {
                    debug!("Skipping `{}` chunk of {} bytes", String::from_utf8_lossy(&id), size);
                    skip(reader, size)?;
                }
            }
        }

        match (fmt, data) {
            (Some(fmt), Some((data_size, data_position))) => Ok(WavHeader {
                file_size: u64::from(riff_size) + 8,
                audio_format: fmt.audio_format,
                channels: fmt.channels,
                sample_rate: fmt.sample_rate,
                byte_rate: fmt.byte_rate,
                block_align: fmt.block_align,
                bits_per_sample: fmt.bits_per_sample,
                data_size,
                data_position,
            }),
            _ => Err(Error::MissingChunks),
        }
    }

    /// Derives the canonical PCM header describing the payload of an NMF
    /// stream. Fails if the sizes cannot be represented in RIFF fields.
    pub fn from_nmf(nmf: &NmfHeader) -> Result<WavHeader, Error> {
        let field = |field: &'static str, value: i32| Error::InvalidField { field, value: value.into() };
        let channels = u16::try_from(nmf.channels).map_err(|_| field("channel count", nmf.channels))?;
        let sample_rate = u32::try_from(nmf.sample_rate).map_err(|_| field("sample rate", nmf.sample_rate))?;
        let bits_per_sample = u16::try_from(nmf.bit_depth).map_err(|_| field("bit depth", nmf.bit_depth))?;
        let payload_size = nmf.payload_size();
        let data_size = to_u32(payload_size)?;
        to_u32(payload_size + HEADER_SIZE - 8)?;
        let mut header = WavHeader {
            file_size: payload_size + HEADER_SIZE,
            audio_format: PCM_FORMAT,
            channels,
            sample_rate,
            byte_rate: 0,
            block_align: 0,
            bits_per_sample,
            data_size,
            data_position: HEADER_SIZE,
        };
        header.block_align = header.derived_block_align();
        header.byte_rate = header.derived_byte_rate();
        Ok(header)
    }

    fn derived_block_align(&self) -> u16 { self.channels.saturating_mul(self.bits_per_sample / 8) }

    fn derived_byte_rate(&self) -> u32 { self.sample_rate.saturating_mul(self.derived_block_align().into()) }

    /// Bytes occupied by one sample across all channels
    #[must_use]
    pub fn frame_size(&self) -> u64 { u64::from(self.derived_block_align()) }

    /// Writes the canonical 44-byte header: one 16-byte PCM `fmt ` chunk
    /// followed by the `data` chunk header. The audio format is always PCM
    /// and the byte rate and block alignment are recomputed.
    pub fn serialize_into<W: Write>(&self, writer: &mut W) -> Result<(), Error> {
        let riff_size = to_u32(u64::from(self.data_size) + HEADER_SIZE - 8)?;
        let mut body = || -> io::Result<()> {
            writer.write_all(RIFF)?;
            writer.write_u32::<LittleEndian>(riff_size)?;
            writer.write_all(WAVE)?;
            writer.write_all(&FMT_CHUNK)?;
            writer.write_u32::<LittleEndian>(FMT_CHUNK_SIZE)?;
            writer.write_u16::<LittleEndian>(PCM_FORMAT)?;
            writer.write_u16::<LittleEndian>(self.channels)?;
            writer.write_u32::<LittleEndian>(self.sample_rate)?;
            writer.write_u32::<LittleEndian>(self.derived_byte_rate())?;
            writer.write_u16::<LittleEndian>(self.derived_block_align())?;
            writer.write_u16::<LittleEndian>(self.bits_per_sample)?;
            writer.write_all(&DATA_CHUNK)?;
            writer.write_u32::<LittleEndian>(self.data_size)
        };
        body().map_err(Error::WriteError)
    }

    /// Converts the header into bytes
    pub fn to_vec(&self) -> Result<Vec<u8>, Error> {
        let mut result = Vec::with_capacity(HEADER_SIZE as usize);
        self.serialize_into(&mut result)?;
        Ok(result)
    }

    /// Rewrites the RIFF and `data` chunk sizes of a stream produced by
    /// `serialize_into` followed by its payload, using the actual stream
    /// length. Only valid for the canonical 44-byte layout. The stream is
    /// left positioned at its end and the total length is returned.
    pub fn patch_sizes<W: Write + Seek>(writer: &mut W) -> Result<u64, Error> {
        let total = writer.seek(SeekFrom::End(0)).map_err(Error::WriteError)?;
        let payload = total.checked_sub(HEADER_SIZE).ok_or_else(|| {
            Error::WriteError(io::Error::new(io::ErrorKind::InvalidInput, "stream is shorter than a WAV header"))
        })?;
        let riff_size = to_u32(total - 8)?;
        let data_size = to_u32(payload)?;
        let mut body = || -> io::Result<()> {
            writer.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
            writer.write_u32::<LittleEndian>(riff_size)?;
            writer.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
            writer.write_u32::<LittleEndian>(data_size)?;
            writer.seek(SeekFrom::End(0))?;
            Ok(())
        };
        body().map_err(Error::WriteError)?;
        Ok(total)
    }
}

impl Display for WavHeader {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            formatter,
            "WAV format {}: {} channel(s), {} Hz, {}-bit, {} data bytes at offset {}",
            self.audio_format, self.channels, self.sample_rate, self.bits_per_sample, self.data_size, self.data_position
        )
    }
}
