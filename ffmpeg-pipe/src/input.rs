use crate::error::Result;
use crate::packet::PacketRef;
use crate::stream::StreamTable;

/// A demuxer producing compressed packets in container order.
///
/// End of stream is `Ok(None)` and is sticky: once returned, every later call
/// returns it again.
pub trait ContainerReader {
    fn streams(&self) -> &StreamTable;

    /// Reads the next packet. The returned view borrows the reader's packet
    /// storage and is invalidated by the next call.
    fn next_packet(&mut self) -> Result<Option<PacketRef<'_>>>;

    /// Releases demuxer resources. Safe to call repeatedly and after errors.
    fn close(&mut self);
}

#[cfg(feature = "ffmpeg")]
pub use av::AvInput;

#[cfg(feature = "ffmpeg")]
mod av {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};

    use super::ContainerReader;
    use crate::error::{OpenError, PipeError, Result};
    use crate::packet::PacketRef;
    use crate::stream::{AvStream, StreamTable};

    /// FFmpeg-backed container reader.
    pub struct AvInput {
        inner: Option<ffmpeg_next::format::context::Input>,
        path: PathBuf,
        format_name: String,
        duration_us: Option<i64>,
        bit_rate: i64,
        streams: HashMap<usize, AvStream>,
        table: StreamTable,
        packet: ffmpeg_next::Packet,
        eof: bool,
    }

    impl AvInput {
        pub fn open(path: impl AsRef<Path>) -> Result<Self> {
            crate::init()?;
            let path = path.as_ref();

            if let Err(e) = std::fs::File::open(path) {
                return Err(OpenError::Unreadable {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
                .into());
            }

            let input = ffmpeg_next::format::input(path).map_err(|e| {
                OpenError::UnrecognizedFormat {
                    path: path.to_path_buf(),
                    reason: e.to_string(),
                }
            })?;

            let mut streams = HashMap::new();
            let mut descriptors = Vec::new();
            for stream in input.streams() {
                let stream = AvStream::from(stream);
                descriptors.push(stream.descriptor().clone());
                streams.insert(stream.index(), stream);
            }

            let duration_us = {
                let d = input.duration();
                if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d <= 0 {
                    None
                } else {
                    Some(d)
                }
            };

            log::info!(
                "opened {} ({}), {} streams",
                path.display(),
                input.format().name(),
                descriptors.len()
            );

            Ok(Self {
                format_name: input.format().name().to_string(),
                bit_rate: input.bit_rate(),
                duration_us,
                inner: Some(input),
                path: path.to_path_buf(),
                streams,
                table: StreamTable::new(descriptors),
                packet: ffmpeg_next::Packet::empty(),
                eof: false,
            })
        }

        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Short demuxer name, e.g. "mov,mp4,m4a,3gp,3g2,mj2".
        pub fn format_name(&self) -> &str {
            &self.format_name
        }

        /// Container duration in microseconds, if known.
        pub fn duration_us(&self) -> Option<i64> {
            self.duration_us
        }

        /// Total bitrate in bps; 0 if unknown.
        pub fn bit_rate(&self) -> i64 {
            self.bit_rate
        }

        pub fn stream(&self, index: usize) -> Option<&AvStream> {
            self.streams.get(&index)
        }
    }

    impl ContainerReader for AvInput {
        fn streams(&self) -> &StreamTable {
            &self.table
        }

        fn next_packet(&mut self) -> Result<Option<PacketRef<'_>>> {
            if self.eof {
                return Ok(None);
            }
            let Some(input) = self.inner.as_mut() else {
                self.eof = true;
                return Ok(None);
            };

            // dropping the previous packet unrefs its buffer
            self.packet = ffmpeg_next::Packet::empty();
            match self.packet.read(input) {
                Ok(()) => {}
                Err(ffmpeg_next::Error::Eof) => {
                    log::debug!("end of input: {}", self.path.display());
                    self.eof = true;
                    return Ok(None);
                }
                Err(e) => return Err(PipeError::Read(e.to_string())),
            }

            let packet = &self.packet;
            Ok(Some(
                PacketRef::new(packet.data().unwrap_or_default(), packet.stream())
                    .with_timestamps(packet.pts(), packet.dts())
                    .with_key(packet.is_key()),
            ))
        }

        fn close(&mut self) {
            if self.inner.take().is_some() {
                log::debug!("closed input: {}", self.path.display());
            }
            self.packet = ffmpeg_next::Packet::empty();
            self.eof = true;
        }
    }

}
