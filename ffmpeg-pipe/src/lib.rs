use std::sync::OnceLock;

#[cfg(feature = "ffmpeg")]
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod input;
pub mod metadata;
pub mod output;
pub mod packet;
pub mod pipe;
pub mod scaler;
pub mod sink;
pub mod stream;
pub mod synthetic;

pub use error::{OpenError, PipeError, Result};
#[cfg(feature = "ffmpeg")]
pub use metadata::probe;

static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// Registers FFmpeg components and quiets FFmpeg's own logging. Runs once per
/// process; later calls return the first outcome.
pub fn init() -> Result<()> {
    INIT.get_or_init(|| {
        #[cfg(feature = "ffmpeg")]
        {
            ffmpeg_next::init().map_err(|e| format!("ffmpeg_next init: {}", e))?;
            ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
            log::debug!("ffmpeg initialized");
        }
        Ok(())
    })
    .clone()
    .map_err(PipeError::Init)
}
