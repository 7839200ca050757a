use crate::error::{Error, Result};

/// The transform size used when none is given.
///
/// At 44.1 kHz this gives 512 frames, or about 11.6 ms, of latency.
pub const DEFAULT_TRANSFORM_SIZE: usize = 1024;

/// Output blocks over which a filter change is crossfaded when none is given.
pub const DEFAULT_CROSSFADE_BLOCKS: usize = 1;

/// Parameters shared by the convolution engines.
///
/// Built with the `set_` methods and checked when an engine is constructed:
///
/// ```
/// let config = binaural::EngineConfig::default()
///     .set_transform_size(512)
///     .set_crossfade_blocks(2);
/// assert_eq!(config.hop(), 256);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    transform_size: usize,
    crossfade_blocks: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            transform_size: DEFAULT_TRANSFORM_SIZE,
            crossfade_blocks: DEFAULT_CROSSFADE_BLOCKS,
        }
    }
}

impl EngineConfig {
    /// Set the size of the spectral transform, `N`.
    ///
    /// Engines consume and produce `N / 2` frames per block.  Every impulse response the engine uses must have been
    /// built with a plan of this size.
    pub fn set_transform_size(mut self, transform_size: usize) -> Self {
        self.transform_size = transform_size;
        self
    }

    /// Set how many output blocks a change of filter is spread across.
    pub fn set_crossfade_blocks(mut self, crossfade_blocks: usize) -> Self {
        self.crossfade_blocks = crossfade_blocks;
        self
    }

    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    pub fn crossfade_blocks(&self) -> usize {
        self.crossfade_blocks
    }

    /// Frames per block.
    pub fn hop(&self) -> usize {
        self.transform_size / 2
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_transform_size(self.transform_size)?;
        if self.crossfade_blocks == 0 {
            return Err(Error::configuration(
                "crossfades must last at least one block",
            ));
        }
        Ok(())
    }
}

pub(crate) fn validate_transform_size(transform_size: usize) -> Result<()> {
    if transform_size < 2 || transform_size % 2 != 0 {
        return Err(Error::configuration(format!(
            "transform size {transform_size} must be even and at least 2"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        config.validate().unwrap();
        assert_eq!(config.transform_size(), 1024);
        assert_eq!(config.crossfade_blocks(), 1);
    }

    #[test]
    fn rejects_bad_values() {
        for size in [0, 1, 3, 1023] {
            let err = EngineConfig::default()
                .set_transform_size(size)
                .validate()
                .unwrap_err();
            assert!(err.is_configuration(), "{size}");
        }

        let err = EngineConfig::default()
            .set_crossfade_blocks(0)
            .validate()
            .unwrap_err();
        assert!(err.is_configuration());
    }
}
