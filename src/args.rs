//! Contains [Args], the parsed command line.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use ffmpeg_pipe::encoder::Preset;
use ffmpeg_pipe::sink::DumpMode;

use crate::config::config;

#[derive(Parser, Debug)]
#[command(
    name = "frame-probe",
    version,
    about = "Decode, inspect and re-encode the video stream of a media file."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Decode the first video stream and print every picture.
    Frames(FramesArgs),
    /// Print container and stream metadata.
    Info(InfoArgs),
    /// Encode synthetic pictures into a raw H.264 file.
    Encode(EncodeArgs),
    /// Re-encode the first video stream into a smaller raw H.264 file.
    Transcode(TranscodeArgs),
}

#[derive(clap::Args, Debug)]
pub struct FramesArgs {
    pub input: PathBuf,

    /// What to print for each picture.
    #[arg(long, value_enum, default_value_t = Dump::Type)]
    pub dump: Dump,

    /// Rows printed per plane (0 prints all).
    #[arg(long, default_value_t = 0)]
    pub rows: usize,

    /// Columns printed per row (0 prints all).
    #[arg(long, default_value_t = 0)]
    pub cols: usize,

    /// Consecutive corrupt packets tolerated before giving up.
    #[arg(long, default_value_t = config().max_consecutive_faults())]
    pub max_faults: u32,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dump {
    /// RGB triples per pixel.
    Rgb,
    /// Raw Y, U and V planes.
    Yuv,
    /// Picture coding type only.
    Type,
}

impl From<Dump> for DumpMode {
    fn from(dump: Dump) -> Self {
        match dump {
            Dump::Rgb => DumpMode::Rgb,
            Dump::Yuv => DumpMode::Yuv,
            Dump::Type => DumpMode::FrameType,
        }
    }
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    pub input: PathBuf,

    /// Print JSON instead of key=value blocks.
    #[arg(long)]
    pub json: bool,
}

#[derive(clap::Args, Debug)]
pub struct EncodeArgs {
    #[arg(long, short, default_value_os_t = config().encode_output().to_path_buf())]
    pub output: PathBuf,

    #[arg(long, default_value_t = config().encode_width())]
    pub width: u32,

    #[arg(long, default_value_t = config().encode_height())]
    pub height: u32,

    #[arg(long, default_value_t = config().encode_fps())]
    pub fps: u32,

    /// Number of pictures to generate.
    #[arg(long, default_value_t = config().encode_frames())]
    pub frames: u64,
}

#[derive(clap::Args, Debug)]
pub struct TranscodeArgs {
    pub input: PathBuf,

    pub output: PathBuf,

    /// Constant rate factor (0-51, lower is better quality).
    #[arg(long, default_value_t = 28)]
    pub crf: u8,

    /// Bitrate ceiling in kbit/s.
    #[arg(long, default_value_t = 300)]
    pub bitrate_kbps: u32,

    /// x264 speed preset.
    #[arg(long, default_value = "slow")]
    pub preset: Preset,

    #[arg(long, default_value_t = config().max_consecutive_faults())]
    pub max_faults: u32,
}
