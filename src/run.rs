use std::io::{self, BufWriter, Write};

use anyhow::Context;
use ffmpeg_pipe::encoder::{Encoder, EncoderConfig};
use ffmpeg_pipe::frame::Geometry;
use ffmpeg_pipe::input::ContainerReader;
use ffmpeg_pipe::output::BitstreamWriter;
use ffmpeg_pipe::pipe::{self, PipeConfig, VideoSession};
use ffmpeg_pipe::sink::{DumpMode, PixelPrinter, Sample};
use ffmpeg_pipe::synthetic::SyntheticSource;
use ffmpeg_pipe::PipeError;

use crate::args::{Args, Command, EncodeArgs, FramesArgs, InfoArgs, TranscodeArgs};

pub fn run(args: Args) -> anyhow::Result<()> {
    ffmpeg_pipe::init().context("initializing ffmpeg")?;
    match args.command {
        Command::Frames(args) => frames(args),
        Command::Info(args) => info(args),
        Command::Encode(args) => encode(args),
        Command::Transcode(args) => transcode(args),
    }
}

/// Process exit status for a failed run.
pub fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<PipeError>() {
        Some(PipeError::Open(_)) => 3,
        Some(PipeError::NoVideoStream) => 4,
        Some(PipeError::UnsupportedCodec(_) | PipeError::CodecInit(_)) => 5,
        Some(PipeError::Io(_)) => 6,
        Some(PipeError::Config(_)) => 7,
        Some(_) => 1,
        None if err.downcast_ref::<io::Error>().is_some() => 6,
        None => 1,
    }
}

fn frames(args: FramesArgs) -> anyhow::Result<()> {
    let session = VideoSession::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let mode = DumpMode::from(args.dump);

    let mut out = BufWriter::new(io::stdout().lock());
    if mode == DumpMode::FrameType {
        write_summary(&mut out, &session)?;
    }

    let mut printer = PixelPrinter::new(out, mode).with_sample(Sample::new(args.rows, args.cols));
    let config = PipeConfig {
        target_format: mode.required_format(),
        max_consecutive_faults: args.max_faults,
    };
    let stats = session.run(config, &mut printer)?;

    let mut out = printer.into_inner();
    if mode == DumpMode::FrameType {
        writeln!(out, "\nTotal frames decoded: {}", stats.pictures)?;
    }
    out.flush()?;
    Ok(())
}

fn write_summary(out: &mut impl Write, session: &VideoSession) -> io::Result<()> {
    let input = session.input();
    let stream = session.stream();
    writeln!(out, "Video file: {}", input.path().display())?;
    writeln!(out, "Format: {}", input.format_name())?;
    match input.duration_us() {
        Some(us) => writeln!(out, "Duration: {} seconds", us / 1_000_000)?,
        None => writeln!(out, "Duration: unknown")?,
    }
    writeln!(out, "Bitrate: {} bps", input.bit_rate())?;
    writeln!(out, "Codec: {}", stream.codec_name)?;
    writeln!(out, "Resolution: {}x{}", stream.width, stream.height)?;
    log::debug!("{} streams in {}", input.streams().len(), input.path().display());
    Ok(())
}

fn info(args: InfoArgs) -> anyhow::Result<()> {
    let info = ffmpeg_pipe::probe(&args.input)
        .with_context(|| format!("probing {}", args.input.display()))?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&info)?);
    } else {
        print!("{}", info);
    }
    Ok(())
}

fn encode(args: EncodeArgs) -> anyhow::Result<()> {
    let geometry = Geometry::new(args.width, args.height);
    let mut encoder =
        Encoder::open(EncoderConfig::realtime(args.fps), geometry).context("opening encoder")?;
    let mut writer = BitstreamWriter::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    let stats = pipe::run_encode(
        SyntheticSource::new(geometry, args.frames),
        &mut encoder,
        &mut writer,
    )?;
    writer
        .finish()
        .with_context(|| format!("writing {}", args.output.display()))?;

    log::info!(
        "{} pictures, {} units, {} bytes written to {}",
        stats.pictures,
        stats.units,
        stats.bytes,
        args.output.display()
    );
    println!("Finished encoding.");
    Ok(())
}

fn transcode(args: TranscodeArgs) -> anyhow::Result<()> {
    let (crf, kbps, preset) = (args.crf, args.bitrate_kbps, args.preset);
    let (stats, bytes) = pipe::transcode(
        &args.input,
        &args.output,
        |fps| {
            EncoderConfig::archival(fps)
                .with_crf(crf)
                .with_max_bitrate_kbps(kbps)
                .with_preset(preset)
        },
        args.max_faults,
    )
    .with_context(|| format!("transcoding {}", args.input.display()))?;

    log::info!(
        "{} pictures re-encoded into {} bytes ({} corrupt packets skipped)",
        stats.pictures,
        bytes,
        stats.faults
    );
    println!("Compressed video saved as {}", args.output.display());
    Ok(())
}
