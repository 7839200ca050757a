//! Sources of decoded audio.
//!
//! Impulse responses are read once, up front, from anything implementing [SignalReader].  Decoding itself is someone
//! else's problem: [VecSignal] wraps samples which are already in memory and [WavSignal] handles the common case of a
//! WAV file on disk.
use std::io::Read;
use std::path::Path;

/// Errors from a [SignalReader].
#[derive(Debug, thiserror::Error)]
pub enum ReaderError {
    #[error("{0}")]
    InvalidData(&'static str),

    #[error("WAV decoding failed: {0}")]
    Wav(#[from] hound::Error),
}

/// Something which produces interleaved `f32` frames.
pub trait SignalReader {
    /// Channels per frame.  Constant for the lifetime of the reader.
    fn channels(&self) -> usize;

    /// Total frames, if known in advance.  Used only to size allocations.
    fn frames(&self) -> Option<u64>;

    /// Fill `destination` with interleaved frames, returning how many frames were written.
    ///
    /// `destination.len()` must be a multiple of [SignalReader::channels].  A return of 0 means the reader is exhausted.
    fn read_frames(&mut self, destination: &mut [f32]) -> Result<usize, ReaderError>;
}

/// A reader over interleaved samples already in memory.
#[derive(Debug, Clone)]
pub struct VecSignal {
    data: Vec<f32>,
    channels: usize,
    position_in_frames: usize,
}

impl VecSignal {
    /// Wrap interleaved `data` with the given channel count.
    ///
    /// A channel count of 0 is accepted here and rejected by whatever consumes the reader, so that consumers report it
    /// in their own terms.
    pub fn new(channels: usize, data: Vec<f32>) -> Result<VecSignal, ReaderError> {
        if channels != 0 && data.len() % channels != 0 {
            return Err(ReaderError::InvalidData(
                "The passed-in data has a length which is not a multiple of the channel count",
            ));
        }

        Ok(VecSignal {
            data,
            channels,
            position_in_frames: 0,
        })
    }

    /// Interleave separate channel buffers.  Shorter channels are padded with zeros to the longest.
    pub fn from_channels<C: AsRef<[f32]>>(channels: &[C]) -> VecSignal {
        let frames = channels
            .iter()
            .map(|c| c.as_ref().len())
            .max()
            .unwrap_or(0);
        let mut data = vec![0.0f32; frames * channels.len()];
        for (ch, samples) in channels.iter().enumerate() {
            for (frame, s) in samples.as_ref().iter().enumerate() {
                data[frame * channels.len() + ch] = *s;
            }
        }

        VecSignal {
            data,
            channels: channels.len(),
            position_in_frames: 0,
        }
    }

    /// A single-channel reader.
    pub fn mono(samples: impl Into<Vec<f32>>) -> VecSignal {
        VecSignal {
            data: samples.into(),
            channels: 1,
            position_in_frames: 0,
        }
    }
}

impl SignalReader for VecSignal {
    fn channels(&self) -> usize {
        self.channels
    }

    fn frames(&self) -> Option<u64> {
        if self.channels == 0 {
            return Some(0);
        }
        Some((self.data.len() / self.channels) as u64)
    }

    fn read_frames(&mut self, destination: &mut [f32]) -> Result<usize, ReaderError> {
        if self.channels == 0 {
            return Ok(0);
        }

        let chans = self.channels;
        debug_assert_eq!(destination.len() % chans, 0);
        let wanted_frames = destination.len() / chans;
        let available_frames = self.data.len() / chans - self.position_in_frames;
        let will_do = available_frames.min(wanted_frames);

        let start = self.position_in_frames * chans;
        destination[..will_do * chans].copy_from_slice(&self.data[start..start + will_do * chans]);
        self.position_in_frames += will_do;
        Ok(will_do)
    }
}

/// A reader over a WAV stream, converting integer PCM to `f32` in `-1.0..1.0`.
pub struct WavSignal<R: Read> {
    reader: hound::WavReader<R>,
    channels: usize,
    int_scale: Option<f32>,
}

impl WavSignal<std::io::BufReader<std::fs::File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ReaderError> {
        let reader = hound::WavReader::open(path)?;
        Self::from_hound(reader)
    }
}

impl<R: Read> WavSignal<R> {
    pub fn new(source: R) -> Result<Self, ReaderError> {
        Self::from_hound(hound::WavReader::new(source)?)
    }

    fn from_hound(reader: hound::WavReader<R>) -> Result<Self, ReaderError> {
        let spec = reader.spec();
        let int_scale = match spec.sample_format {
            hound::SampleFormat::Float => None,
            hound::SampleFormat::Int => {
                if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                    return Err(ReaderError::InvalidData("unsupported integer sample width"));
                }
                Some(1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32)
            }
        };

        Ok(WavSignal {
            channels: spec.channels as usize,
            reader,
            int_scale,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.reader.spec().sample_rate
    }
}

impl<R: Read> SignalReader for WavSignal<R> {
    fn channels(&self) -> usize {
        self.channels
    }

    fn frames(&self) -> Option<u64> {
        Some(self.reader.duration() as u64)
    }

    fn read_frames(&mut self, destination: &mut [f32]) -> Result<usize, ReaderError> {
        if self.channels == 0 {
            return Ok(0);
        }

        let mut written = 0;
        match self.int_scale {
            None => {
                for (dest, sample) in destination.iter_mut().zip(self.reader.samples::<f32>()) {
                    *dest = sample?;
                    written += 1;
                }
            }
            Some(scale) => {
                for (dest, sample) in destination.iter_mut().zip(self.reader.samples::<i32>()) {
                    *dest = sample? as f32 * scale;
                    written += 1;
                }
            }
        }

        if written % self.channels != 0 {
            return Err(ReaderError::InvalidData("WAV data ends partway through a frame"));
        }
        Ok(written / self.channels)
    }
}
