use std::io::{self, Read, Write};

use crate::constants::copy::BUFFER_SIZE;
use crate::interrupt::Interrupt;
use crate::Error;

/// How much of a requested payload copy actually happened
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Bytes the caller asked for
    pub requested: u64,

    /// Bytes read from the source and written to the destination
    pub copied: u64,
}

impl CopyOutcome {
    /// Whether the source ran out before the requested length was reached
    #[must_use]
    pub fn is_truncated(&self) -> bool { self.copied < self.requested }

    /// Bytes that were requested but never copied
    #[must_use]
    pub fn shortfall(&self) -> u64 { self.requested - self.copied }
}

/// Copies up to `total` bytes from `reader` to `writer` through a fixed-size
/// buffer. A zero-length read before `total` is reached ends the copy early
/// without error; the returned outcome records how much was moved. The
/// interrupt is checked before every read.
pub fn copy_payload<R, W, I>(reader: &mut R, writer: &mut W, total: u64, interrupt: &I) -> Result<CopyOutcome, Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
    I: Interrupt + ?Sized,
{
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut remaining = total;
    while remaining > 0 {
        if interrupt.is_set() {
            return Err(Error::Interrupted);
        }
        let wanted = usize::try_from(remaining).map_or(BUFFER_SIZE, |r| r.min(BUFFER_SIZE));
        let read = match reader.read(&mut buffer[..wanted]) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::ReadError(e)),
        };
        writer.write_all(&buffer[..read]).map_err(Error::WriteError)?;
        remaining -= read as u64;
    }
    Ok(CopyOutcome { requested: total, copied: total - remaining })
}
