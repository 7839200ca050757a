//! Direction-indexed filter storage.
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::impulse_response::ImpulseResponse;

/// An (azimuth, elevation) pair in degrees.
///
/// Values are taken as given: nothing is wrapped into `0..360` or clamped to `-90..=90`.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Direction {
    pub azimuth: f32,
    pub elevation: f32,
}

impl Direction {
    pub const fn new(azimuth: f32, elevation: f32) -> Direction {
        Direction { azimuth, elevation }
    }

    /// Squared Euclidean distance in degree space.
    ///
    /// This is a plane metric, not a spherical one: 359 and 1 degrees of azimuth are 358 apart.  Computed in `f64` so
    /// that nearby directions compare the same way on every platform.
    pub fn distance_squared(&self, other: &Direction) -> f64 {
        let daz = self.azimuth as f64 - other.azimuth as f64;
        let del = self.elevation as f64 - other.elevation as f64;
        daz * daz + del * del
    }
}

#[derive(Debug)]
struct HrtfEntry {
    direction: Direction,
    impulse: Arc<ImpulseResponse>,
}

/// A set of filters keyed by direction.
///
/// Lookups return the filter registered for exactly the requested direction when there is one, otherwise the filter
/// whose direction is nearest by [Direction::distance_squared].  Ties go to whichever was inserted first, so a given
/// query always selects the same filter.
///
/// Every filter must share one transform size and one channel count; mismatches are rejected at insertion.  Once built,
/// share the index behind an `Arc`: lookups take `&self`, never allocate, and need no synchronization.  Dropping the
/// index releases only its own references; filters still held elsewhere live on.
#[derive(Debug, Default)]
pub struct Hrtf {
    entries: Vec<HrtfEntry>,
}

impl Hrtf {
    pub fn new() -> Hrtf {
        Default::default()
    }

    /// Register a filter under the direction it was built for.
    ///
    /// Filters built without a direction are rejected as invalid.
    pub fn insert(&mut self, impulse: Arc<ImpulseResponse>) -> Result<()> {
        let Some(direction) = impulse.direction() else {
            return Err(Error::invalid_impulse_response(
                "an HRTF filter must be built with a direction",
            ));
        };
        self.insert_at(direction, impulse)
    }

    /// Register a filter under an explicit direction, which need not match the one it was built with.
    ///
    /// Inserting a direction which is already present replaces that filter and keeps its position for tie-breaking.
    pub fn insert_at(&mut self, direction: Direction, impulse: Arc<ImpulseResponse>) -> Result<()> {
        if let Some(first) = self.entries.first() {
            let expected = &first.impulse;
            if impulse.transform_size() != expected.transform_size() {
                return Err(Error::configuration(format!(
                    "filter for {:?} uses transform size {}, but this HRTF uses {}",
                    direction,
                    impulse.transform_size(),
                    expected.transform_size()
                )));
            }
            if impulse.channels() != expected.channels() {
                return Err(Error::configuration(format!(
                    "filter for {:?} has {} channels, but this HRTF has {}",
                    direction,
                    impulse.channels(),
                    expected.channels()
                )));
            }
        }

        if let Some(existing) = self.entries.iter_mut().find(|e| e.direction == direction) {
            log::debug!("Replacing HRTF filter for {:?}", direction);
            existing.impulse = impulse;
            return Ok(());
        }

        self.entries.push(HrtfEntry { direction, impulse });
        Ok(())
    }

    /// The filter for `direction`: an exact match if registered, else the nearest.  `None` only when empty.
    pub fn lookup(&self, direction: Direction) -> Option<&Arc<ImpulseResponse>> {
        self.lookup_index(direction).map(|i| &self.entries[i].impulse)
    }

    /// Like [Hrtf::lookup], but returns the position of the selected filter in insertion order.
    ///
    /// Engines use this to tell whether a new direction selects a different filter without comparing angles.
    pub fn lookup_index(&self, direction: Direction) -> Option<usize> {
        if let Some(exact) = self.entries.iter().position(|e| e.direction == direction) {
            return Some(exact);
        }

        let mut best: Option<(usize, f64)> = None;
        for (i, entry) in self.entries.iter().enumerate() {
            let distance = entry.direction.distance_squared(&direction);
            if distance.is_nan() {
                continue;
            }
            // Strictly less, so that ties keep the earlier entry.
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((i, distance));
            }
        }

        match best {
            Some((i, _)) => Some(i),
            // Only reachable for NaN queries, which are as far from everything as they are from the first entry.
            None if !self.entries.is_empty() => Some(0),
            None => None,
        }
    }

    /// The filter at a position returned by [Hrtf::lookup_index].
    pub fn impulse_at(&self, index: usize) -> Option<&Arc<ImpulseResponse>> {
        self.entries.get(index).map(|e| &e.impulse)
    }

    /// The direction registered at a position returned by [Hrtf::lookup_index].
    pub fn direction_at(&self, index: usize) -> Option<Direction> {
        self.entries.get(index).map(|e| e.direction)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The transform size shared by every filter, or `None` if empty.
    pub fn transform_size(&self) -> Option<usize> {
        self.entries.first().map(|e| e.impulse.transform_size())
    }

    /// The channel count shared by every filter, or `None` if empty.
    pub fn channels(&self) -> Option<usize> {
        self.entries.first().map(|e| e.impulse.channels())
    }

    /// The largest partition count of any filter.  Engines size their buffers from this.
    pub fn max_partitions(&self) -> usize {
        self.entries
            .iter()
            .map(|e| e.impulse.partition_count())
            .max()
            .unwrap_or(0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Direction, &Arc<ImpulseResponse>)> {
        self.entries.iter().map(|e| (e.direction, &e.impulse))
    }
}
