use std::path::PathBuf;

use tempfile::PersistError;
use thiserror::Error;

use crate::Container;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Unable to open file `{0}` due to `{1}`")]
    FileOpenError(PathBuf, std::io::Error),

    #[error("Unable to open temporary file in `{0}` due to `{1}`")]
    TempFileOpenError(PathBuf, std::io::Error),

    #[error("Error reading from stream: `{0}`")]
    ReadError(std::io::Error),

    #[error("Error writing to stream: `{0}`")]
    WriteError(std::io::Error),

    #[error("Unable to write to console: `{0}`")]
    ConsoleIoError(std::io::Error),

    #[error("Failed to persist temporary file due to `{0}`")]
    PersistError(#[from] PersistError),

    #[error("Failed to delete `{0}` due to `{1}`")]
    FileDelete(PathBuf, std::io::Error),

    #[error("Unable to create directory `{0}` due to `{1}`")]
    DirectoryCreateError(PathBuf, std::io::Error),

    #[error("Unable to determine parent directory of `{0}`")]
    NoParentError(PathBuf),

    #[error("`{0}` does not name a file")]
    NotAFilePath(PathBuf),

    #[error("Bad magic: not a valid {0} stream")]
    BadMagic(Container),

    #[error("Invalid {field}: {value}")]
    InvalidField { field: &'static str, value: i64 },

    #[error("WAV stream is missing required chunks")]
    MissingChunks,

    #[error("WAV `fmt ` chunk is too short ({0} bytes)")]
    MalformedFmtChunk(u32),

    #[error("Payload of {0} bytes cannot be represented in the destination header")]
    PayloadTooLarge(u64),

    #[error("Payload truncated: expected {expected} bytes but only {copied} were available")]
    TruncatedPayload { expected: u64, copied: u64 },

    #[error("The operation was interrupted")]
    Interrupted,

    #[error("No file was uploaded.")]
    EmptyUpload,

    #[error("Only {0} files are supported.")]
    UnsupportedExtension(String),

    #[error("Upload exceeds the maximum size of {0} bytes")]
    UploadTooLarge(u64),

    #[error("Invalid output file name `{0}`")]
    InvalidOutputName(String),

    #[error("File {0} not found.")]
    OutputNotFound(String),

    #[error("Unable to determine container type of `{0}`")]
    UnknownContainer(PathBuf),

    #[error("An output name can only be given when converting a single file")]
    OutputNameWithMultipleInputs,

    #[error("Invalid number of threads specified")]
    InvalidThreadCount,
}

impl Error {
    /// Whether the error was caused by a malformed or out-of-range header
    /// rather than by the underlying I/O.
    #[must_use]
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Error::BadMagic(_)
                | Error::InvalidField { .. }
                | Error::MissingChunks
                | Error::MalformedFmtChunk(_)
                | Error::PayloadTooLarge(_)
        )
    }
}
