pub mod nmf {
    pub const MAGIC: &[u8] = b"NMF1";
    pub const VERSION: i32 = 1;

    /// Magic plus five 32-bit fields
    pub const HEADER_SIZE: u64 = 24;

    pub const MAX_CHANNELS: i32 = 8;
    pub const MAX_SAMPLE_RATE: i32 = 192_000;
    pub const BIT_DEPTHS: [i32; 4] = [8, 16, 24, 32];
}

pub mod wav {
    pub const RIFF: &[u8] = b"RIFF";
    pub const WAVE: &[u8] = b"WAVE";
    pub const FMT_CHUNK: [u8; 4] = *b"fmt ";
    pub const DATA_CHUNK: [u8; 4] = *b"data";

    pub const PCM_FORMAT: u16 = 1;
    pub const FMT_CHUNK_SIZE: u32 = 16;

    /// Size of the canonical header with exactly one `fmt ` and one `data`
    /// chunk
    pub const HEADER_SIZE: u64 = 44;

    /// Offset of the RIFF chunk size field
    pub const RIFF_SIZE_OFFSET: u64 = 4;

    /// Offset of the `data` chunk size field in the canonical header
    pub const DATA_SIZE_OFFSET: u64 = 40;
}

pub mod copy {
    pub const BUFFER_SIZE: usize = 4096;
}

pub mod service {
    pub const MAX_UPLOAD_SIZE: u64 = 100 * 1024 * 1024;
    pub const DOWNLOAD_PREFIX: &str = "/api/audioconversion/download";
}
