use std::fmt::{self, Display, Formatter};
use std::path::Path;

use crate::constants::{nmf, wav};

/// Known audio containers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Container {
    /// Raw PCM with a fixed NMF header
    Nmf,

    /// RIFF/WAVE
    Wav,
}

impl Container {
    /// The file extension used for the container, without a leading dot
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Container::Nmf => "nmf",
            Container::Wav => "wav",
        }
    }

    /// The MIME type a converted file should be served with
    #[must_use]
    pub fn content_type(self) -> &'static str {
        match self {
            Container::Nmf => "application/octet-stream",
            Container::Wav => "audio/wav",
        }
    }

    /// The container a conversion from this one produces
    #[must_use]
    pub fn counterpart(self) -> Container {
        match self {
            Container::Nmf => Container::Wav,
            Container::Wav => Container::Nmf,
        }
    }

    /// Matches a file extension case-insensitively
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Container> {
        [Container::Nmf, Container::Wav].into_iter().find(|c| c.extension().eq_ignore_ascii_case(extension))
    }

    /// Determines the container from the extension of `path`
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Container> {
        path.extension().and_then(|e| e.to_str()).and_then(Container::from_extension)
    }

    /// Identifies a container from the first bytes of a stream
    #[must_use]
    pub fn detect(prefix: &[u8]) -> Option<Container> {
        if prefix.starts_with(nmf::MAGIC) {
            Some(Container::Nmf)
        } else if prefix.len() >= 12 && prefix.starts_with(wav::RIFF) && &prefix[8..12] == wav::WAVE {
            Some(Container::Wav)
        } else {
            None
        }
    }
}

impl Display for Container {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let name = match self {
            Container::Nmf => "NMF",
            Container::Wav => "WAV",
        };
        write!(formatter, "{}", name)
    }
}

/// A conversion between the two containers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    NmfToWav,
    WavToNmf,
}

impl Direction {
    /// The conversion that produces `destination`
    #[must_use]
    pub fn producing(destination: Container) -> Direction {
        match destination {
            Container::Wav => Direction::NmfToWav,
            Container::Nmf => Direction::WavToNmf,
        }
    }

    /// The conversion that consumes `source`
    #[must_use]
    pub fn consuming(source: Container) -> Direction { Direction::producing(source.counterpart()) }

    #[must_use]
    pub fn source(self) -> Container {
        match self {
            Direction::NmfToWav => Container::Nmf,
            Direction::WavToNmf => Container::Wav,
        }
    }

    #[must_use]
    pub fn destination(self) -> Container { self.source().counterpart() }
}

impl Display for Direction {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(formatter, "{} to {}", self.source(), self.destination())
    }
}
