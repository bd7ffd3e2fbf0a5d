// ============================================================================
// Decode / encode loop tests
// ============================================================================

use std::collections::VecDeque;

use super::{DecodePipe, DecodeStats, PipeConfig, run_encode};
use crate::decoder::{BlockDecoder, DecoderState, Drain};
use crate::encoder::{EncodedUnit, EncoderEngine};
use crate::error::{PipeError, Result};
use crate::frame::{Geometry, Picture, PictureRef, PixelFormat};
use crate::input::ContainerReader;
use crate::output::BitstreamWriter;
use crate::packet::{Packet, PacketRef};
use crate::sink::FrameSink;
use crate::stream::tests::descriptor;
use crate::stream::{MediaType, StreamTable};
use crate::synthetic::SyntheticSource;

const VIDEO: usize = 0;
const AUDIO: usize = 1;
const CORRUPT: u8 = 0xff;
/// A queued value that makes `drain` fail once instead of yielding a picture.
const DAMAGED: u8 = 0xee;

// ------------------------------------------------------------------------
// Scripted stages
// ------------------------------------------------------------------------

enum Step {
    Packet(Packet),
    Fail,
}

/// Video packet whose payload lists the luma values of the pictures it releases.
fn video(values: &[u8]) -> Step {
    let mut data = vec![values.len() as u8];
    data.extend_from_slice(values);
    Step::Packet(Packet::new(data, VIDEO))
}

fn corrupt() -> Step {
    Step::Packet(Packet::new(vec![CORRUPT], VIDEO))
}

fn audio() -> Step {
    Step::Packet(Packet::new(vec![0xaa, 0xbb], AUDIO))
}

struct ScriptedReader {
    table: StreamTable,
    steps: VecDeque<Step>,
    current: Option<Packet>,
    eof: bool,
    closed: bool,
}

impl ScriptedReader {
    fn new(steps: Vec<Step>) -> Self {
        Self {
            table: StreamTable::new(vec![
                descriptor(VIDEO, MediaType::Video),
                descriptor(AUDIO, MediaType::Audio),
            ]),
            steps: steps.into(),
            current: None,
            eof: false,
            closed: false,
        }
    }
}

impl ContainerReader for ScriptedReader {
    fn streams(&self) -> &StreamTable {
        &self.table
    }

    fn next_packet(&mut self) -> Result<Option<PacketRef<'_>>> {
        if self.eof || self.closed {
            return Ok(None);
        }
        match self.steps.pop_front() {
            Some(Step::Packet(packet)) => {
                self.current = Some(packet);
                Ok(self.current.as_ref().map(Packet::as_packet_ref))
            }
            Some(Step::Fail) => Err(PipeError::Read("scripted failure".into())),
            None => {
                self.eof = true;
                Ok(None)
            }
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Decoder with an explicit bounded reorder window. Each packet queues the
/// pictures its payload lists; `trailing` pictures only appear after flush.
struct FifoDecoder {
    state: DecoderState,
    window: VecDeque<u8>,
    capacity: usize,
    trailing: Vec<u8>,
    current: Picture,
    fed: Vec<Vec<u8>>,
}

impl FifoDecoder {
    fn new() -> Self {
        let mut current = Picture::with_padding(4, 4, PixelFormat::Yuv420p, 12);
        current.plane_mut(1).fill(128);
        current.plane_mut(2).fill(128);
        Self {
            state: DecoderState::Open,
            window: VecDeque::new(),
            capacity: 8,
            trailing: Vec::new(),
            current,
            fed: Vec::new(),
        }
    }

    fn with_trailing(mut self, values: &[u8]) -> Self {
        self.trailing = values.to_vec();
        self
    }
}

impl BlockDecoder for FifoDecoder {
    fn state(&self) -> DecoderState {
        self.state
    }

    fn feed(&mut self, packet: &PacketRef<'_>) -> Result<()> {
        if self.state != DecoderState::Open {
            return Err(PipeError::Decode("not open".into()));
        }
        let data = packet.data();
        if data.first() == Some(&CORRUPT) {
            return Err(PipeError::Decode("corrupt slice".into()));
        }
        assert!(self.window.is_empty(), "fed while pictures were pending");
        let count = data[0] as usize;
        if self.window.len() + count > self.capacity {
            return Err(PipeError::Decode("reorder window overflow".into()));
        }
        self.window.extend(&data[1..=count]);
        self.fed.push(data.to_vec());
        Ok(())
    }

    fn drain(&mut self) -> Result<Drain<PictureRef<'_>>> {
        let Some(value) = self.window.pop_front() else {
            return Ok(match self.state {
                DecoderState::Open => Drain::NeedMoreInput,
                DecoderState::Draining | DecoderState::Closed => Drain::EndOfStream,
            });
        };
        if value == DAMAGED {
            return Err(PipeError::Decode("damaged picture".into()));
        }
        // reuse the same storage for every picture
        self.current.plane_mut(0).fill(value);
        self.current.set_pts(Some(value as i64));
        Ok(Drain::Picture(self.current.as_view()))
    }

    fn flush(&mut self) -> Result<()> {
        if self.state == DecoderState::Open {
            self.state = DecoderState::Draining;
            self.window.extend(self.trailing.drain(..));
        }
        Ok(())
    }

    fn close(&mut self) {
        self.window.clear();
        self.state = DecoderState::Closed;
    }
}

/// Accepts every packet but never produces a usable picture.
struct FailingDrainDecoder {
    state: DecoderState,
    drains: u32,
}

impl BlockDecoder for FailingDrainDecoder {
    fn state(&self) -> DecoderState {
        self.state
    }

    fn feed(&mut self, _packet: &PacketRef<'_>) -> Result<()> {
        Ok(())
    }

    fn drain(&mut self) -> Result<Drain<PictureRef<'_>>> {
        self.drains += 1;
        Err(PipeError::Decode("no output".into()))
    }

    fn flush(&mut self) -> Result<()> {
        self.state = DecoderState::Draining;
        Ok(())
    }

    fn close(&mut self) {
        self.state = DecoderState::Closed;
    }
}

#[derive(Default)]
struct RecordingSink {
    seen: Vec<(u64, PixelFormat, u8)>,
    finished: bool,
}

impl RecordingSink {
    fn values(&self) -> Vec<u8> {
        self.seen.iter().map(|(_, _, v)| *v).collect()
    }
}

impl FrameSink for RecordingSink {
    fn consume(&mut self, picture: &PictureRef<'_>, seq: u64) -> Result<()> {
        self.seen
            .push((seq, picture.format(), picture.plane(0).row(0)[0]));
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}

fn run(
    steps: Vec<Step>,
    decoder: &mut FifoDecoder,
    config: PipeConfig,
) -> (Result<DecodeStats>, ScriptedReader, RecordingSink) {
    let mut reader = ScriptedReader::new(steps);
    let mut sink = RecordingSink::default();
    let stream = reader.streams().select_first_video_stream().unwrap().index;
    let result = DecodePipe::new(config).run(&mut reader, stream, decoder, &mut sink);
    (result, reader, sink)
}

// ------------------------------------------------------------------------
// Decoder contract
// ------------------------------------------------------------------------

#[test]
fn test_reorder_latency_drain_sequence() {
    let mut decoder = FifoDecoder::new();
    let first = Packet::new(vec![0], VIDEO);
    let second = Packet::new(vec![2, b'A', b'B'], VIDEO);

    decoder.feed(&first.as_packet_ref()).unwrap();
    assert!(matches!(decoder.drain().unwrap(), Drain::NeedMoreInput));

    decoder.feed(&second.as_packet_ref()).unwrap();
    match decoder.drain().unwrap() {
        Drain::Picture(p) => assert_eq!(p.plane(0).row(0)[0], b'A'),
        other => panic!("expected picture A, got {other:?}"),
    }
    match decoder.drain().unwrap() {
        Drain::Picture(p) => assert_eq!(p.plane(0).row(0)[0], b'B'),
        other => panic!("expected picture B, got {other:?}"),
    }
    assert!(matches!(decoder.drain().unwrap(), Drain::NeedMoreInput));

    decoder.flush().unwrap();
    assert_eq!(decoder.state(), DecoderState::Draining);
    assert!(matches!(decoder.drain().unwrap(), Drain::EndOfStream));

    decoder.close();
    decoder.close();
    assert_eq!(decoder.state(), DecoderState::Closed);
}

// ------------------------------------------------------------------------
// Decode loop
// ------------------------------------------------------------------------

#[test]
fn test_two_packet_stream_reaches_sink_in_order() {
    let mut decoder = FifoDecoder::new();
    let (result, reader, sink) = run(
        vec![video(&[]), video(b"AB")],
        &mut decoder,
        PipeConfig::default(),
    );

    let stats = result.unwrap();
    assert_eq!(
        sink.seen,
        vec![
            (0, PixelFormat::Yuv420p, b'A'),
            (1, PixelFormat::Yuv420p, b'B')
        ]
    );
    assert!(sink.finished);
    assert_eq!(stats.pictures, 2);
    assert_eq!(stats.packets_fed, 2);
    assert!(reader.closed);
    assert_eq!(decoder.state(), DecoderState::Closed);
}

#[test]
fn test_other_streams_never_reach_decoder() {
    let mut decoder = FifoDecoder::new();
    let (result, _, sink) = run(
        vec![audio(), video(&[1]), audio(), audio(), video(&[2])],
        &mut decoder,
        PipeConfig::default(),
    );

    let stats = result.unwrap();
    assert_eq!(decoder.fed, vec![vec![1, 1], vec![1, 2]]);
    assert_eq!(stats.packets_read, 5);
    assert_eq!(stats.packets_ignored, 3);
    assert_eq!(sink.values(), vec![1, 2]);
}

#[test]
fn test_trailing_pictures_follow_flush() {
    let mut decoder = FifoDecoder::new().with_trailing(&[3, 4]);
    let (result, _, sink) = run(
        vec![video(&[1]), video(&[2])],
        &mut decoder,
        PipeConfig::default(),
    );

    assert_eq!(result.unwrap().pictures, 4);
    assert_eq!(sink.values(), vec![1, 2, 3, 4]);
    let seqs: Vec<u64> = sink.seen.iter().map(|(seq, _, _)| *seq).collect();
    assert_eq!(seqs, vec![0, 1, 2, 3]);
}

#[test]
fn test_corrupt_packets_are_skipped() {
    let mut decoder = FifoDecoder::new();
    let (result, _, sink) = run(
        vec![video(&[1]), corrupt(), video(&[2]), corrupt(), video(&[3])],
        &mut decoder,
        PipeConfig::default(),
    );

    let stats = result.unwrap();
    assert_eq!(stats.faults, 2);
    assert_eq!(stats.packets_fed, 3);
    assert_eq!(sink.values(), vec![1, 2, 3]);
}

#[test]
fn test_consecutive_faults_abort_the_run() {
    let mut decoder = FifoDecoder::new();
    let config = PipeConfig {
        max_consecutive_faults: 2,
        ..PipeConfig::default()
    };
    let (result, reader, sink) = run(
        vec![video(&[1]), corrupt(), corrupt(), corrupt(), video(&[2])],
        &mut decoder,
        config,
    );

    assert!(matches!(result, Err(PipeError::Decode(_))));
    assert_eq!(sink.values(), vec![1]);
    assert!(!sink.finished);
    assert!(reader.closed);
    assert_eq!(decoder.state(), DecoderState::Closed);
}

#[test]
fn test_delivered_picture_resets_fault_count() {
    let mut decoder = FifoDecoder::new();
    let config = PipeConfig {
        max_consecutive_faults: 1,
        ..PipeConfig::default()
    };
    let (result, _, sink) = run(
        vec![corrupt(), video(&[1]), corrupt(), video(&[2]), corrupt()],
        &mut decoder,
        config,
    );

    assert_eq!(result.unwrap().faults, 3);
    assert_eq!(sink.values(), vec![1, 2]);
}

#[test]
fn test_accepted_packet_without_picture_keeps_fault_count() {
    let mut decoder = FifoDecoder::new();
    let config = PipeConfig {
        max_consecutive_faults: 1,
        ..PipeConfig::default()
    };
    let (result, _, sink) = run(
        vec![corrupt(), video(&[]), corrupt(), video(&[1])],
        &mut decoder,
        config,
    );

    assert!(matches!(result, Err(PipeError::Decode(_))));
    assert!(sink.seen.is_empty());
}

#[test]
fn test_draining_continues_after_a_fault() {
    let mut decoder = FifoDecoder::new();
    let (result, _, sink) = run(
        vec![video(&[1, DAMAGED, 2]), video(&[3])],
        &mut decoder,
        PipeConfig::default(),
    );

    let stats = result.unwrap();
    assert_eq!(stats.faults, 1);
    assert_eq!(stats.packets_fed, 2);
    assert_eq!(sink.values(), vec![1, 2, 3]);
}

#[test]
fn test_drain_faults_count_toward_bound() {
    let mut decoder = FifoDecoder::new();
    let config = PipeConfig {
        max_consecutive_faults: 2,
        ..PipeConfig::default()
    };
    let steps = (0..100).map(|_| video(&[DAMAGED])).collect();
    let (result, reader, sink) = run(steps, &mut decoder, config);

    assert!(matches!(result, Err(PipeError::Decode(_))));
    assert_eq!(decoder.fed.len(), 3);
    assert!(sink.seen.is_empty());
    assert!(!sink.finished);
    assert!(reader.closed);
}

#[test]
fn test_decoder_that_never_yields_aborts() {
    let mut reader = ScriptedReader::new((0..100).map(|_| video(&[1])).collect());
    let mut decoder = FailingDrainDecoder {
        state: DecoderState::Open,
        drains: 0,
    };
    let mut sink = RecordingSink::default();
    let config = PipeConfig {
        max_consecutive_faults: 2,
        ..PipeConfig::default()
    };

    let result = DecodePipe::new(config).run(&mut reader, VIDEO, &mut decoder, &mut sink);

    assert!(matches!(result, Err(PipeError::Decode(_))));
    assert_eq!(decoder.drains, 3);
    assert_eq!(decoder.state(), DecoderState::Closed);
    assert!(sink.seen.is_empty());
}

#[test]
fn test_read_errors_are_fatal() {
    let mut decoder = FifoDecoder::new();
    let (result, reader, sink) = run(
        vec![video(&[1]), Step::Fail, video(&[2])],
        &mut decoder,
        PipeConfig::default(),
    );

    assert!(matches!(result, Err(PipeError::Read(_))));
    assert_eq!(sink.values(), vec![1]);
    assert!(reader.closed);
}

#[test]
fn test_picture_count_is_conserved() {
    let script: Vec<&[u8]> = vec![&[], &[1, 2, 3], &[], &[], &[4], &[5, 6], &[], &[7]];
    let released: usize = script.iter().map(|values| values.len()).sum();

    let mut decoder = FifoDecoder::new().with_trailing(&[8, 9]);
    let steps = script.iter().map(|values| video(values)).collect();
    let (result, _, sink) = run(steps, &mut decoder, PipeConfig::default());

    let stats = result.unwrap();
    assert_eq!(stats.pictures as usize, released + 2);
    assert_eq!(sink.seen.len(), released + 2);
    assert_eq!(sink.values(), (1..=9).collect::<Vec<u8>>());
}

#[test]
fn test_pictures_are_converted_for_the_sink() {
    let mut decoder = FifoDecoder::new();
    let config = PipeConfig {
        target_format: Some(PixelFormat::Rgb24),
        ..PipeConfig::default()
    };
    let (result, _, sink) = run(vec![video(&[16, 235])], &mut decoder, config);

    result.unwrap();
    // first byte of each converted picture is the red channel
    assert_eq!(
        sink.seen,
        vec![(0, PixelFormat::Rgb24, 0), (1, PixelFormat::Rgb24, 255)]
    );
}

#[test]
fn test_reader_end_of_stream_is_sticky() {
    let mut reader = ScriptedReader::new(vec![video(&[1])]);
    assert!(reader.next_packet().unwrap().is_some());
    for _ in 0..3 {
        assert!(reader.next_packet().unwrap().is_none());
    }
    reader.close();
    reader.close();
    assert!(reader.next_packet().unwrap().is_none());
}

// ------------------------------------------------------------------------
// Encode loop
// ------------------------------------------------------------------------

/// Emits one byte per picture (its luma value) after `lookahead` pictures.
struct LookaheadEngine {
    lookahead: usize,
    pending: VecDeque<u8>,
    closed: bool,
}

impl LookaheadEngine {
    fn new(lookahead: usize) -> Self {
        Self {
            lookahead,
            pending: VecDeque::new(),
            closed: false,
        }
    }
}

impl EncoderEngine for LookaheadEngine {
    fn encode(&mut self, picture: &PictureRef<'_>) -> Result<EncodedUnit> {
        if self.closed {
            return Err(PipeError::Encode("encoder is closed".into()));
        }
        self.pending.push_back(picture.plane(0).row(0)[0]);
        if self.pending.len() > self.lookahead {
            let value = self.pending.pop_front().unwrap_or_default();
            Ok(EncodedUnit::new(vec![value], 1, false))
        } else {
            Ok(EncodedUnit::default())
        }
    }

    fn close(&mut self) -> Result<EncodedUnit> {
        self.closed = true;
        let tail: Vec<u8> = self.pending.drain(..).collect();
        let packets = tail.len();
        Ok(EncodedUnit::new(tail, packets, false))
    }
}

#[test]
fn test_encode_flush_emits_lookahead_tail() {
    let geometry = Geometry::new(4, 4);
    let mut engine = LookaheadEngine::new(3);
    let mut writer = BitstreamWriter::new(Vec::new());

    let stats = run_encode(SyntheticSource::new(geometry, 10), &mut engine, &mut writer).unwrap();

    assert_eq!(stats.pictures, 10);
    assert_eq!(stats.bytes, 10);
    // seven single-picture units plus one flushed tail
    assert_eq!(stats.units, 8);
    assert_eq!(writer.finish().unwrap(), (0..10).collect::<Vec<u8>>());
}

#[test]
fn test_encode_output_is_deterministic() {
    let geometry = Geometry::new(4, 4);
    let encode = || {
        let mut engine = LookaheadEngine::new(2);
        let mut writer = BitstreamWriter::new(Vec::new());
        run_encode(
            SyntheticSource::new(geometry, 6).with_padding(3),
            &mut engine,
            &mut writer,
        )
        .unwrap();
        writer.finish().unwrap()
    };
    assert_eq!(encode(), encode());
}

#[test]
fn test_encode_after_close_fails() {
    let mut engine = LookaheadEngine::new(0);
    let mut writer = BitstreamWriter::new(Vec::new());
    run_encode(
        SyntheticSource::new(Geometry::new(2, 2), 1),
        &mut engine,
        &mut writer,
    )
    .unwrap();

    let err = run_encode(
        SyntheticSource::new(Geometry::new(2, 2), 1),
        &mut engine,
        &mut writer,
    )
    .unwrap_err();
    assert!(matches!(err, PipeError::Encode(_)));
}

// ------------------------------------------------------------------------
// FFmpeg round trip
// ------------------------------------------------------------------------

#[cfg(feature = "ffmpeg")]
#[test]
fn test_ffmpeg_round_trip_keeps_order() {
    use super::VideoSession;
    use crate::encoder::{Encoder, EncoderConfig};

    // not a multiple of 16, so decoded rows carry padding
    let geometry = Geometry::new(72, 40);
    let count = 12u64;
    let luma = |index: u64| 40 + 16 * index as u8;

    // archival settings use B-frames, so the decoder has to reorder
    let config = EncoderConfig::archival(25).with_crf(18);
    let mut encoder = match Encoder::open(config, geometry) {
        Ok(encoder) => encoder,
        // FFmpeg built without libx264
        Err(PipeError::Config(_)) => return,
        Err(e) => panic!("unexpected error: {e}"),
    };

    let path = std::env::temp_dir().join(format!(
        "ffmpeg-pipe-round-trip-{}.h264",
        std::process::id()
    ));
    let mut writer = BitstreamWriter::create(&path).unwrap();
    let pictures = SyntheticSource::new(geometry, count).map(|mut picture| {
        let index = picture.pts().unwrap_or_default() as u64;
        picture.plane_mut(0).fill(luma(index));
        picture
    });
    run_encode(pictures, &mut encoder, &mut writer).unwrap();
    writer.finish().unwrap();

    let session = VideoSession::open(&path).unwrap();
    assert_eq!(
        (session.stream().width, session.stream().height),
        (geometry.width, geometry.height)
    );
    let mut sink = RecordingSink::default();
    let result = session.run(PipeConfig::default(), &mut sink);
    std::fs::remove_file(&path).ok();

    let stats = result.unwrap();
    assert_eq!(stats.pictures, count);
    assert_eq!(stats.faults, 0);
    assert!(sink.finished);
    for (index, (seq, format, value)) in sink.seen.iter().enumerate() {
        assert_eq!(*seq, index as u64);
        assert_eq!(*format, PixelFormat::Yuv420p);
        let expected = luma(index as u64) as i32;
        assert!(
            (*value as i32 - expected).abs() <= 4,
            "picture {index}: luma {value}, expected about {expected}"
        );
    }
}
