mod nmf_header;
mod wav_header;

#[cfg(test)]
pub(crate) mod test_utils;

use std::fmt::{self, Display, Formatter};
use std::io::{Read, Seek};

pub use nmf_header::*;
pub use wav_header::*;

use crate::{Container, Error};

/// Reads a tag and checks it against `expected`. A stream that ends before
/// the tag is complete does not match.
fn read_tag<R: Read>(reader: &mut R, expected: &[u8], container: Container) -> Result<(), Error> {
    let mut tag = Vec::with_capacity(expected.len());
    reader.by_ref().take(expected.len() as u64).read_to_end(&mut tag).map_err(Error::ReadError)?;
    if tag == expected {
        Ok(())
    } else {
        Err(Error::BadMagic(container))
    }
}

/// The parsed header of either supported container
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerHeader {
    Nmf(NmfHeader),
    Wav(WavHeader),
}

impl ContainerHeader {
    /// Reads the header of a stream known to be of type `container`
    pub fn read_from<R: Read + Seek>(container: Container, reader: &mut R) -> Result<ContainerHeader, Error> {
        match container {
            Container::Nmf => NmfHeader::read_from(reader).map(ContainerHeader::Nmf),
            Container::Wav => WavHeader::read_from(reader).map(ContainerHeader::Wav),
        }
    }

    /// Which container the header belongs to
    #[must_use]
    pub fn container(&self) -> Container {
        match self {
            ContainerHeader::Nmf(_) => Container::Nmf,
            ContainerHeader::Wav(_) => Container::Wav,
        }
    }

    /// Length of the payload described by the header
    #[must_use]
    pub fn payload_size(&self) -> u64 {
        match self {
            ContainerHeader::Nmf(h) => h.payload_size(),
            ContainerHeader::Wav(h) => h.data_size.into(),
        }
    }
}

impl Display for ContainerHeader {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ContainerHeader::Nmf(h) => h.fmt(formatter),
            ContainerHeader::Wav(h) => h.fmt(formatter),
        }
    }
}
