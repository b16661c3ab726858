use std::ffi::{OsStr, OsString};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::Error;

#[derive(Debug)]
enum FileEnum {
    Temp(NamedTempFile, PathBuf),
    Memory(Cursor<Vec<u8>>),
}

/// A converted file under construction. Nothing appears at the target path
/// until `commit()`; dropping without committing discards the data.
#[derive(Debug)]
pub struct OutputFile {
    file_enum: FileEnum,
}

fn make_sibling_temporary_file(path: &Path, distinguisher: &OsStr) -> Result<NamedTempFile, Error> {
    let parent_dir = match path.parent() {
        Some(p) if p.as_os_str().is_empty() => Path::new("."),
        Some(p) => p,
        None => return Err(Error::NoParentError(path.to_path_buf())),
    };
    let file_stem = path.file_stem().ok_or_else(|| Error::NotAFilePath(path.to_path_buf()))?;
    let file_ext = path.extension().map(|e| {
        let mut ext = OsString::from(".");
        ext.push(e);
        ext
    });
    let file_stem = {
        let mut stem = file_stem.to_os_string();
        stem.push("-");
        stem.push(distinguisher);
        stem
    };
    let mut builder = tempfile::Builder::new();
    builder.prefix(&file_stem);
    if let Some(file_ext) = file_ext.as_ref() {
        builder.suffix(file_ext);
    }
    let temp = builder.tempfile_in(parent_dir).map_err(|e| Error::TempFileOpenError(parent_dir.to_path_buf(), e))?;
    Ok(temp)
}

impl OutputFile {
    /// Creates an output held in memory that is discarded on commit
    pub fn new_in_memory() -> OutputFile { OutputFile { file_enum: FileEnum::Memory(Cursor::new(Vec::new())) } }

    /// Writes to a temporary next to `path` that replaces it on `commit()`.
    pub fn new_target(path: &Path) -> Result<OutputFile, Error> {
        let temp = make_sibling_temporary_file(path, OsStr::new("partial"))?;
        Ok(OutputFile { file_enum: FileEnum::Temp(temp, path.to_path_buf()) })
    }

    /// Writes to a temporary that replaces the specified path on `commit()` if
    /// `discard` is `false`. Otherwise the data is kept in memory and thrown
    /// away.
    pub fn new_target_or_discard(path: &Path, discard: bool) -> Result<OutputFile, Error> {
        if discard {
            Ok(Self::new_in_memory())
        } else {
            Self::new_target(path)
        }
    }

    /// The path the file will be persisted to, if any
    #[must_use]
    pub fn target(&self) -> Option<&Path> {
        match self.file_enum {
            FileEnum::Temp(_, ref path) => Some(path),
            FileEnum::Memory(_) => None,
        }
    }

    fn inner(&mut self) -> &mut dyn ReadWriteSeek {
        match self.file_enum {
            FileEnum::Temp(ref mut temp, _) => temp,
            FileEnum::Memory(ref mut cursor) => cursor,
        }
    }

    /// Deletes the underlying file.
    pub fn abort(self) -> Result<(), Error> {
        match self.file_enum {
            FileEnum::Memory(_) => {}
            FileEnum::Temp(temp, _) => {
                let temp_path = temp.path().to_path_buf();
                temp.close().map_err(|e| Error::FileDelete(temp_path, e))?;
            }
        }
        Ok(())
    }

    /// Persists the file to the intended path, replacing anything already
    /// there, and returns its length.
    pub fn commit(mut self) -> Result<u64, Error> {
        let len = self.seek(SeekFrom::End(0)).map_err(Error::WriteError)?;
        match self.file_enum {
            FileEnum::Memory(_) => {}
            FileEnum::Temp(temp, final_path) => {
                temp.as_file().sync_all().map_err(Error::WriteError)?;
                temp.persist(final_path)
                    .map_err(Error::PersistError)
                    .and_then(|f| f.sync_all().map_err(Error::WriteError))?;
            }
        }
        Ok(len)
    }
}

trait ReadWriteSeek: Read + Write + Seek {}

impl<T: Read + Write + Seek> ReadWriteSeek for T {}

impl Read for OutputFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> { self.inner().read(buf) }
}

impl Write for OutputFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> { self.inner().write(buf) }

    fn flush(&mut self) -> io::Result<()> { self.inner().flush() }
}

impl Seek for OutputFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> { self.inner().seek(pos) }
}
