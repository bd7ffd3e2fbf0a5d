use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use ffmpeg_pipe::pipe::DEFAULT_MAX_CONSECUTIVE_FAULTS;

/// Process-wide defaults for the command line.
pub struct ProbeConfig {
    encode_output: PathBuf,
    encode_width: u32,
    encode_height: u32,
    encode_fps: u32,
    encode_frames: u64,
    max_consecutive_faults: u32,
}

impl ProbeConfig {
    pub fn new(encode_output: &str) -> Self {
        Self {
            encode_output: PathBuf::from(encode_output),
            encode_width: 640,
            encode_height: 480,
            encode_fps: 30,
            encode_frames: 100,
            max_consecutive_faults: DEFAULT_MAX_CONSECUTIVE_FAULTS,
        }
    }

    pub fn encode_output(&self) -> &Path {
        &self.encode_output
    }

    pub fn encode_width(&self) -> u32 {
        self.encode_width
    }

    pub fn encode_height(&self) -> u32 {
        self.encode_height
    }

    pub fn encode_fps(&self) -> u32 {
        self.encode_fps
    }

    pub fn encode_frames(&self) -> u64 {
        self.encode_frames
    }

    pub fn max_consecutive_faults(&self) -> u32 {
        self.max_consecutive_faults
    }
}

pub fn config() -> &'static ProbeConfig {
    static CONFIG: LazyLock<ProbeConfig> = LazyLock::new(|| ProbeConfig::new("output.h264"));
    &CONFIG
}
