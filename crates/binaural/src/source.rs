use std::sync::atomic::Ordering;

use audio_synchronization::AtomicF32Pair;

use crate::hrtf::Direction;

/// The position of one spatialized sound, relative to the listener.
///
/// Any thread may set the azimuth and elevation at any time; the render thread reads both once per block.  The pair
/// lives in one atomic word, so a reader always sees the two values from the same update and never half of one.
/// Values are stored exactly as given, with no normalization or validation.
#[derive(Debug)]
pub struct Source {
    direction: AtomicF32Pair,
}

impl Source {
    pub fn new(azimuth: f32, elevation: f32) -> Source {
        Source {
            direction: AtomicF32Pair::new(azimuth, elevation),
        }
    }

    pub fn azimuth(&self) -> f32 {
        self.direction().azimuth
    }

    pub fn elevation(&self) -> f32 {
        self.direction().elevation
    }

    pub fn set_azimuth(&self, azimuth: f32) {
        self.direction.store_first(azimuth, Ordering::Release);
    }

    pub fn set_elevation(&self, elevation: f32) {
        self.direction.store_second(elevation, Ordering::Release);
    }

    /// Set both angles in one update.
    pub fn set_direction(&self, direction: Direction) {
        self.direction
            .store(direction.azimuth, direction.elevation, Ordering::Release);
    }

    /// Both angles, read together.
    pub fn direction(&self) -> Direction {
        let (azimuth, elevation) = self.direction.load(Ordering::Acquire);
        Direction { azimuth, elevation }
    }
}

impl From<Direction> for Source {
    fn from(value: Direction) -> Self {
        Source::new(value.azimuth, value.elevation)
    }
}
