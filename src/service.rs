//! The conversion service boundary: staging of uploaded data, naming and
//! storage of converted files, and their retrieval. Transport concerns such
//! as HTTP routing and multipart parsing are left to the caller.

use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::constants::service::{DOWNLOAD_PREFIX, MAX_UPLOAD_SIZE};
use crate::interrupt::{Interrupt, Never};
use crate::output_file::OutputFile;
use crate::transcoder::{PayloadPolicy, Transcoder};
use crate::{Container, Direction, Error};

/// Configuration for `ConversionService`
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Directory converted files are written to and served from
    pub output_dir: PathBuf,

    /// Largest upload that will be staged
    pub max_upload_size: u64,

    /// Path prefix of the retrieval locator returned for converted files
    pub download_prefix: String,

    /// Treatment of inputs with less payload than declared
    pub payload_policy: PayloadPolicy,
}

impl ServiceConfig {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> ServiceConfig {
        ServiceConfig {
            output_dir: output_dir.into(),
            max_upload_size: MAX_UPLOAD_SIZE,
            download_prefix: DOWNLOAD_PREFIX.to_string(),
            payload_policy: PayloadPolicy::default(),
        }
    }
}

/// An uploaded file
#[derive(Debug)]
pub struct Upload<R> {
    /// The name the file was uploaded with
    pub file_name: String,

    /// The file content
    pub reader: R,
}

impl<R: Read> Upload<R> {
    pub fn new<S: Into<String>>(file_name: S, reader: R) -> Upload<R> {
        Upload { file_name: file_name.into(), reader }
    }
}

/// The outcome of a conversion request
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub file_name: String,
    pub file_url: String,
    pub file_size: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,
}

impl ConversionResponse {
    fn failure(message: String) -> ConversionResponse {
        ConversionResponse { success: false, error_message: Some(message), ..ConversionResponse::default() }
    }
}

/// A converted file ready to be served
#[derive(Clone, Debug)]
pub struct Download {
    pub file_name: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Clone, Debug, Serialize)]
pub struct ServiceStatus {
    pub status: &'static str,
}

/// Converts uploaded files and serves the results from a single output
/// directory
#[derive(Debug)]
pub struct ConversionService {
    config: ServiceConfig,
}

/// Checks that `name` is a plain file name that cannot escape the output
/// directory
fn validate_file_name(name: &str) -> Result<&str, Error> {
    let plain = !name.is_empty()
        && !name.contains(['/', '\\'])
        && Path::new(name).file_name().map_or(false, |n| n == name)
        && name != "."
        && name != "..";
    if plain {
        Ok(name)
    } else {
        Err(Error::InvalidOutputName(name.to_string()))
    }
}

/// Chooses the name of the converted file. Without a hint, the uploaded
/// file's stem is reused; a hint lacking the destination extension has it
/// appended.
pub fn resolve_output_name(direction: Direction, upload_name: &str, hint: Option<&str>) -> Result<String, Error> {
    let extension = format!(".{}", direction.destination().extension());
    let name = match hint.filter(|h| !h.is_empty()) {
        None => {
            let stem = Path::new(upload_name).file_stem().and_then(|s| s.to_str()).unwrap_or_default();
            format!("{}{}", stem, extension)
        }
        Some(hint) if hint.ends_with(&extension) => hint.to_string(),
        Some(hint) => format!("{}{}", hint, extension),
    };
    validate_file_name(&name)?;
    Ok(name)
}

/// Copies an upload into an anonymous temporary file so it can be re-read
/// and seeked. The file is deleted when dropped.
fn stage_upload<R: Read>(reader: R, max_size: u64) -> Result<File, Error> {
    let mut staged = tempfile::tempfile().map_err(|e| Error::TempFileOpenError(std::env::temp_dir(), e))?;
    let len = io::copy(&mut reader.take(max_size.saturating_add(1)), &mut staged).map_err(Error::ReadError)?;
    if len > max_size {
        return Err(Error::UploadTooLarge(max_size));
    }
    if len == 0 {
        return Err(Error::EmptyUpload);
    }
    staged.seek(SeekFrom::Start(0)).map_err(Error::ReadError)?;
    Ok(staged)
}

impl ConversionService {
    /// Constructs the service, creating the output directory if needed
    pub fn new(config: ServiceConfig) -> Result<ConversionService, Error> {
        std::fs::create_dir_all(&config.output_dir)
            .map_err(|e| Error::DirectoryCreateError(config.output_dir.clone(), e))?;
        Ok(ConversionService { config })
    }

    #[must_use]
    pub fn config(&self) -> &ServiceConfig { &self.config }

    /// Converts an upload, storing the result in the output directory.
    /// Failures are reported in the response rather than returned.
    pub fn convert<R: Read>(
        &self, direction: Direction, upload: Upload<R>, output_name: Option<&str>,
    ) -> ConversionResponse {
        self.convert_with_interrupt(direction, upload, output_name, &Never::default())
    }

    /// Identical to `convert` except the payload copy stops with a failure
    /// once `interrupt` is set.
    pub fn convert_with_interrupt<R: Read, I: Interrupt + ?Sized>(
        &self, direction: Direction, upload: Upload<R>, output_name: Option<&str>, interrupt: &I,
    ) -> ConversionResponse {
        let upload_name = upload.file_name.clone();
        match self.try_convert(direction, upload, output_name, interrupt) {
            Ok((file_name, file_size)) => ConversionResponse {
                file_url: format!("{}/{}", self.config.download_prefix, file_name),
                file_name,
                file_size,
                success: true,
                error_message: None,
            },
            Err(e @ (Error::EmptyUpload | Error::UnsupportedExtension(_))) => {
                ConversionResponse::failure(e.to_string())
            }
            Err(e) => {
                error!("Error converting {} ({}): {}", upload_name, direction, e);
                ConversionResponse::failure(format!("Conversion failed: {}", e))
            }
        }
    }

    fn try_convert<R: Read, I: Interrupt + ?Sized>(
        &self, direction: Direction, upload: Upload<R>, output_name: Option<&str>, interrupt: &I,
    ) -> Result<(String, u64), Error> {
        let staged = stage_upload(upload.reader, self.config.max_upload_size)?;
        let source = direction.source();
        if Container::from_path(Path::new(&upload.file_name)) != Some(source) {
            return Err(Error::UnsupportedExtension(format!(".{}", source.extension())));
        }
        let file_name = resolve_output_name(direction, &upload.file_name, output_name)?;
        let output_path = self.config.output_dir.join(&file_name);
        let mut input = BufReader::new(staged);

        let mut output = OutputFile::new_target(&output_path)?;
        let result = {
            let mut writer = BufWriter::new(&mut output);
            let transcoder = Transcoder::with_interrupt(self.config.payload_policy, interrupt);
            transcoder
                .convert(direction, &mut input, &mut writer)
                .and_then(|summary| writer.flush().map(|()| summary).map_err(Error::WriteError))
        };
        drop(input);
        match result {
            Ok(_) => {
                let file_size = output.commit()?;
                info!("Converted {} to {}", upload.file_name, output_path.display());
                Ok((file_name, file_size))
            }
            Err(e) => {
                if let Err(abort_error) = output.abort() {
                    warn!("Unable to discard partial output {}: {}", output_path.display(), abort_error);
                }
                Err(e)
            }
        }
    }

    /// Retrieves a previously converted file by name
    pub fn download(&self, file_name: &str) -> Result<Download, Error> {
        let not_found = || Error::OutputNotFound(file_name.to_string());
        validate_file_name(file_name).map_err(|_| not_found())?;
        let path = self.config.output_dir.join(file_name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(not_found()),
            Err(e) => return Err(Error::FileOpenError(path, e)),
        };
        let content_type = Container::from_path(&path).map_or("application/octet-stream", Container::content_type);
        Ok(Download { file_name: file_name.to_string(), content_type, bytes })
    }

    #[must_use]
    pub fn status(&self) -> ServiceStatus { ServiceStatus { status: "API is running" } }
}
