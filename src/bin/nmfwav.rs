#![warn(clippy::pedantic)]
#![allow(clippy::uninlined_format_args)]

#[path = "../ctrlc_handling.rs"]
mod ctrlc_handling;

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write as _};
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use ctrlc_handling::CtrlCChecker;
use nmfwav::header::ContainerHeader;
use nmfwav::output_file::OutputFile;
use nmfwav::service::{resolve_output_name, ConversionResponse};
use nmfwav::{Container, ConversionSummary, Direction, Error, PayloadPolicy, Transcoder};
use parking_lot::Mutex;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use rayon::ThreadPoolBuilder;
use thiserror::Error;
use tracing::{debug, warn};

/// Bytes needed to recognise either container by its magic
const DETECTION_PREFIX_LEN: u64 = 12;

#[derive(Debug, Error)]
enum AppError {
    #[error("{0}")]
    LibraryError(#[from] Error),

    #[error("Silent exit because error was already printed")]
    SilentExit,

    #[error("Unable to register Ctrl-C handler: `{0}`")]
    CtrlCRegistration(#[from] ctrlc_handling::CtrlCRegistrationError),

    #[error("Failed to initialize thread pool: `{0}`")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Failed to serialize result: `{0}`")]
    Serialization(#[from] serde_json::Error),
}

fn main() {
    if let Err(e) = main_impl() {
        match e {
            AppError::LibraryError(e) => eprintln!("Aborted due to error: {}", e),
            AppError::SilentExit => {}
            e => eprintln!("{}", e),
        }
        std::process::exit(1);
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Target {
    Nmf,
    Wav,
}

impl From<Target> for Container {
    fn from(target: Target) -> Container {
        match target {
            Target::Nmf => Container::Nmf,
            Target::Wav => Container::Wav,
        }
    }
}

#[derive(Debug, Parser)]
#[allow(clippy::struct_excessive_bools)]
#[clap(author, version, about = "Converts audio between the NMF and WAV containers.")]
struct Cli {
    #[clap(value_enum, short, long)]
    /// The container to convert to. By default each input is converted to
    /// the other container, identified by its extension or else its magic
    /// number.
    to: Option<Target>,

    #[clap(short, long, value_name = "NAME", conflicts_with = "list")]
    /// Name of the converted file. The destination extension is appended if
    /// missing. Only valid with a single input.
    output: Option<String>,

    #[clap(short = 'O', long = "output-dir", value_name = "DIR", conflicts_with = "list")]
    /// Directory to write converted files to. Defaults to the directory of
    /// each input.
    output_dir: Option<PathBuf>,

    #[clap(short, long, action)]
    /// Print the header of each input without converting
    list: bool,

    #[clap(short = 'n', long = "dry-run", action, conflicts_with = "list")]
    /// Perform each conversion in memory without writing any output
    dry_run: bool,

    #[clap(long, action)]
    /// Fail on inputs whose payload is shorter than their header declares
    strict: bool,

    #[clap(long, action, conflicts_with = "list")]
    /// Print one JSON object per input describing the result
    json: bool,

    #[clap(short='j', long, default_value_t = num_cpus::get())]
    /// Number of threads to use for processing. Default is the number of cores
    /// on the system.
    num_threads: usize,

    #[clap(short, long, action)]
    /// Log each completed conversion
    verbose: bool,

    #[clap(long, action)]
    /// Log parsed headers and payload copies
    debug: bool,

    #[clap(required(true))]
    /// The files to convert
    input_files: Vec<PathBuf>,
}

fn init_logging(verbose: bool, debug: bool) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::fmt().with_env_filter(level).with_writer(io::stderr).init();
}

fn validate_thread_count(requested: usize) -> Result<usize, Error> {
    if requested == 0 {
        eprintln!("The number of thread specified must be greater than 0.");
        return Err(Error::InvalidThreadCount);
    }
    let num_cores = num_cpus::get();
    let rounded = std::cmp::min(requested, num_cores);
    if rounded != requested {
        eprintln!("Rounding down number of threads from {} to {}.", requested, num_cores);
    }
    Ok(rounded)
}

/// Works out which way to convert `path`. An explicit target wins, then the
/// file extension, then the magic number at the start of the stream.
fn identify_direction<R: Read + io::Seek>(
    path: &Path, input: &mut R, target: Option<Container>,
) -> Result<Direction, Error> {
    if let Some(target) = target {
        return Ok(Direction::producing(target));
    }
    if let Some(source) = Container::from_path(path) {
        return Ok(Direction::consuming(source));
    }
    let mut prefix = Vec::new();
    input.by_ref().take(DETECTION_PREFIX_LEN).read_to_end(&mut prefix).map_err(Error::ReadError)?;
    input.rewind().map_err(Error::ReadError)?;
    Container::detect(&prefix).map(Direction::consuming).ok_or_else(|| Error::UnknownContainer(path.to_path_buf()))
}

#[derive(Debug)]
struct Settings<'a> {
    target: Option<Container>,
    output_name: Option<&'a str>,
    output_dir: Option<&'a Path>,
    dry_run: bool,
    policy: PayloadPolicy,
    interrupt: &'a CtrlCChecker,
}

#[derive(Debug)]
enum Report {
    Listed(ContainerHeader),
    Converted { output_path: PathBuf, file_name: String, file_size: u64, summary: ConversionSummary },
}

fn list_file(path: &Path, target: Option<Container>) -> Result<Report, Error> {
    let input = File::open(path).map_err(|e| Error::FileOpenError(path.to_path_buf(), e))?;
    let mut input = BufReader::new(input);
    let direction = identify_direction(path, &mut input, target)?;
    let header = ContainerHeader::read_from(direction.source(), &mut input)?;
    Ok(Report::Listed(header))
}

fn convert_file(path: &Path, settings: &Settings) -> Result<Report, Error> {
    let input = File::open(path).map_err(|e| Error::FileOpenError(path.to_path_buf(), e))?;
    let mut input = BufReader::new(input);
    let direction = identify_direction(path, &mut input, settings.target)?;

    let input_name = path.file_name().and_then(OsStr::to_str).ok_or_else(|| Error::NotAFilePath(path.to_path_buf()))?;
    let file_name = resolve_output_name(direction, input_name, settings.output_name)?;
    let output_path = match settings.output_dir {
        Some(dir) => dir.join(&file_name),
        None => path.with_file_name(&file_name),
    };
    debug!("Converting {} to {} ({})", path.display(), output_path.display(), direction);

    let mut output_file = OutputFile::new_target_or_discard(&output_path, settings.dry_run)?;
    let result = {
        let mut output_file = BufWriter::new(&mut output_file);
        let transcoder = Transcoder::with_interrupt(settings.policy, settings.interrupt);
        transcoder.convert(direction, &mut input, &mut output_file)
    };
    drop(input); // Important for Windows so we can overwrite
    match result {
        Ok(summary) => {
            let file_size = output_file.commit()?;
            Ok(Report::Converted { output_path, file_name, file_size, summary })
        }
        Err(e) => {
            if let Err(abort_error) = output_file.abort() {
                warn!("Unable to discard partial output {}: {}", output_path.display(), abort_error);
            }
            Err(e)
        }
    }
}

fn print_report(path: &Path, result: &Result<Report, Error>, json: bool) -> Result<(), AppError> {
    if json {
        let response = match result {
            Ok(Report::Converted { output_path, file_name, file_size, .. }) => ConversionResponse {
                file_name: file_name.clone(),
                file_url: output_path.display().to_string(),
                file_size: *file_size,
                success: true,
                error_message: None,
            },
            Ok(Report::Listed(_)) => ConversionResponse { success: true, ..ConversionResponse::default() },
            Err(e) => ConversionResponse { error_message: Some(e.to_string()), ..ConversionResponse::default() },
        };
        println!("{}", serde_json::to_string(&response)?);
        return Ok(());
    }
    let mut stdout = io::stdout().lock();
    let do_io = |out: &mut io::StdoutLock| -> io::Result<()> {
        match result {
            Ok(Report::Listed(header)) => writeln!(out, "{}: {}", path.display(), header),
            Ok(Report::Converted { output_path, file_size, summary, .. }) => {
                writeln!(out, "Converted {} to {} ({} bytes)", path.display(), output_path.display(), file_size)?;
                writeln!(out, "\tSource: {}", summary.source)?;
                writeln!(out, "\tDestination: {}", summary.destination)?;
                if summary.is_truncated() {
                    writeln!(
                        out,
                        "\tPayload truncated: {} of {} bytes copied",
                        summary.payload.copied, summary.payload.requested
                    )?;
                }
                if summary.trailing_bytes_dropped > 0 {
                    writeln!(out, "\tDropped {} bytes of partial frame", summary.trailing_bytes_dropped)?;
                }
                Ok(())
            }
            Err(_) => Ok(()),
        }
    };
    do_io(&mut stdout).map_err(Error::ConsoleIoError)?;
    if let Err(e) = result {
        eprintln!("Failed to process {}: {}", path.display(), e);
    }
    Ok(())
}

fn main_impl() -> Result<(), AppError> {
    let interrupt_checker = CtrlCChecker::new()?;
    let cli = Cli::parse_from(wild::args_os());
    init_logging(cli.verbose, cli.debug);

    let num_threads = validate_thread_count(cli.num_threads)?;
    ThreadPoolBuilder::new().num_threads(num_threads).build_global()?;

    if cli.output.is_some() && cli.input_files.len() > 1 {
        return Err(Error::OutputNameWithMultipleInputs.into());
    }
    if let Some(ref dir) = cli.output_dir {
        if !cli.dry_run {
            std::fs::create_dir_all(dir).map_err(|e| Error::DirectoryCreateError(dir.clone(), e))?;
        }
    }
    if cli.dry_run && !cli.json {
        println!("Display-only mode is enabled so no files will actually be written.\n");
    }

    let settings = Settings {
        target: cli.to.map(Container::from),
        output_name: cli.output.as_deref(),
        output_dir: cli.output_dir.as_deref(),
        dry_run: cli.dry_run,
        policy: if cli.strict { PayloadPolicy::Strict } else { PayloadPolicy::Lenient },
        interrupt: &interrupt_checker,
    };

    // This is a BTreeMap so we report results in the supplied order
    let results = Mutex::new(BTreeMap::new());
    let inputs: Vec<_> = cli.input_files.iter().enumerate().collect();
    inputs.into_par_iter().panic_fuse().for_each(|(idx, path)| {
        let result = if cli.list { list_file(path, settings.target) } else { convert_file(path, &settings) };
        results.lock().insert(idx, (path, result));
    });

    let mut num_failed = 0;
    for (path, result) in results.into_inner().into_values() {
        print_report(path, &result, cli.json)?;
        if result.is_err() {
            num_failed += 1;
        }
    }
    if num_failed > 0 {
        if !cli.json {
            eprintln!("{} of {} files could not be processed.", num_failed, cli.input_files.len());
        }
        return Err(AppError::SilentExit);
    }
    Ok(())
}
