//! Error taxonomy shared by every pipeline stage.

use std::path::PathBuf;

pub type Result<T, E = PipeError> = std::result::Result<T, E>;

/// Why a container could not be opened.
#[derive(Debug, thiserror::Error)]
pub enum OpenError {
    #[error("could not open {}: {reason}", path.display())]
    Unreadable { path: PathBuf, reason: String },
    #[error("unrecognized container format in {}: {reason}", path.display())]
    UnrecognizedFormat { path: PathBuf, reason: String },
}

#[derive(Debug, thiserror::Error)]
pub enum PipeError {
    #[error("ffmpeg initialization failed: {0}")]
    Init(String),
    #[error(transparent)]
    Open(#[from] OpenError),
    #[error("failed to read packet: {0}")]
    Read(String),
    #[error("could not find a video stream")]
    NoVideoStream,
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),
    #[error("could not open codec: {0}")]
    CodecInit(String),
    #[error("error during decoding: {0}")]
    Decode(String),
    #[error("cannot convert {from} to {to}")]
    UnsupportedConversion { from: String, to: String },
    #[error("invalid picture: {0}")]
    InvalidPicture(String),
    #[error("invalid encoder configuration: {0}")]
    Config(String),
    #[error("error during encoding: {0}")]
    Encode(String),
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipeError {
    /// Per-packet decode faults may be skipped; everything else aborts the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, PipeError::Decode(_))
    }

    pub(crate) fn unsupported_conversion(
        from: impl std::fmt::Debug,
        to: impl std::fmt::Debug,
    ) -> Self {
        PipeError::UnsupportedConversion {
            from: format!("{:?}", from),
            to: format!("{:?}", to),
        }
    }
}
