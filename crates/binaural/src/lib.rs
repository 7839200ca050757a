//! Binaural rendering through head-related transfer functions.
//!
//! Filters are loaded once into [ImpulseResponse]s, collected into an [Hrtf] keyed by direction, and applied to live
//! audio by a [BinauralRenderer] which follows the direction held by a [Source].  [Convolver] applies a single fixed
//! filter with the same engine.
#[macro_use]
mod logging;

#[cfg(test)]
mod close_floats;
mod config;
pub mod convolution;
mod error;
mod fft;
pub mod ffi;
mod hrtf;
mod impulse_response;
pub mod playback;
mod reader;
mod render_thread;
mod renderer;
mod source;

pub use config::{EngineConfig, DEFAULT_CROSSFADE_BLOCKS, DEFAULT_TRANSFORM_SIZE};
pub use convolution::{convolve_direct, Convolver, EngineState};
pub use error::{Error, Result};
pub use fft::{FftPlan, FftScratch};
pub use hrtf::{Direction, Hrtf};
pub use impulse_response::{ImpulseResponse, Partition};
pub use reader::{ReaderError, SignalReader, VecSignal, WavSignal};
pub use render_thread::mark_render_thread;
pub use renderer::BinauralRenderer;
pub use source::Source;
