pub mod constants;
pub mod container;
pub mod copy;
pub mod error;
pub mod header;
pub mod interrupt;
pub mod output_file;
pub mod service;
pub mod transcoder;

pub use container::*;
pub use error::*;
pub use transcoder::{convert_nmf_to_wav, convert_wav_to_nmf, ConversionSummary, PayloadPolicy, Transcoder};
