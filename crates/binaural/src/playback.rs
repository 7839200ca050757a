//! Grouped control of playing sounds.
//!
//! Nothing here runs on the render thread.  A [PlaybackManager] sorts handles returned by a [Device] into categories
//! so that a whole group (music, effects, voices) can be paused, resumed, stopped or turned down at once.
use std::sync::{Arc, Mutex};

use ahash::{HashMap, HashMapExt};

use crate::error::{Error, Result};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum PlaybackStatus {
    Playing,
    Paused,
    /// Finished or stopped.  Handles in this state are dropped by [PlaybackManager::clean].
    Stopped,
}

/// Control over one sound a [Device] is playing.
///
/// Every operation returns whether it took effect; a handle whose sound already stopped returns false.
pub trait PlaybackHandle: Send + Sync {
    fn pause(&self) -> bool;
    fn resume(&self) -> bool;
    fn stop(&self) -> bool;
    fn set_volume(&self, volume: f32) -> bool;
    fn status(&self) -> PlaybackStatus;
}

/// Something which can start playing sounds.
pub trait Device: Send + Sync {
    type Sound;

    /// Start playing `sound`, or return `None` if the device cannot.
    fn play(&self, sound: Self::Sound) -> Option<Arc<dyn PlaybackHandle>>;
}

/// A group of handles sharing a volume and a paused flag.
///
/// Handles added to a paused category are paused immediately, and every handle is given the category's volume.
pub struct PlaybackCategory {
    volume: f32,
    paused: bool,
    handles: Vec<Arc<dyn PlaybackHandle>>,
}

impl Default for PlaybackCategory {
    fn default() -> Self {
        PlaybackCategory {
            volume: 1.0,
            paused: false,
            handles: vec![],
        }
    }
}

impl PlaybackCategory {
    pub fn new() -> PlaybackCategory {
        Default::default()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Handles currently tracked, including stopped ones not yet cleaned.
    pub fn handles(&self) -> &[Arc<dyn PlaybackHandle>] {
        &self.handles
    }

    pub fn add(&mut self, handle: Arc<dyn PlaybackHandle>) {
        handle.set_volume(self.volume);
        if self.paused {
            handle.pause();
        }
        self.handles.push(handle);
    }

    pub fn pause(&mut self) {
        self.paused = true;
        for h in self.handles.iter() {
            h.pause();
        }
    }

    pub fn resume(&mut self) {
        self.paused = false;
        for h in self.handles.iter() {
            h.resume();
        }
    }

    pub fn stop(&mut self) {
        for h in self.handles.drain(..) {
            h.stop();
        }
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume;
        for h in self.handles.iter() {
            h.set_volume(volume);
        }
    }

    /// Forget handles whose sounds have stopped.
    pub fn clean(&mut self) {
        self.handles
            .retain(|h| h.status() != PlaybackStatus::Stopped);
    }
}

impl std::fmt::Debug for PlaybackCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackCategory")
            .field("volume", &self.volume)
            .field("paused", &self.paused)
            .field("handles", &self.handles.len())
            .finish()
    }
}

struct ManagerState {
    categories: HashMap<u32, PlaybackCategory>,
    next_key: u32,
}

/// Categories of playing sounds on one device, addressed by key.
///
/// Operations on an unknown key return false, or `None` for queries.  [PlaybackManager::stop] removes the category,
/// so its key becomes unknown afterward.
pub struct PlaybackManager<D: Device> {
    device: Arc<D>,
    state: Mutex<ManagerState>,
}

impl<D: Device> PlaybackManager<D> {
    pub fn new(device: Arc<D>) -> Self {
        PlaybackManager {
            device,
            state: Mutex::new(ManagerState {
                categories: HashMap::new(),
                next_key: 0,
            }),
        }
    }

    pub fn device(&self) -> &Arc<D> {
        &self.device
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManagerState> {
        self.state.lock().expect("Playback manager mutex poisoned")
    }

    fn with_category<T>(&self, key: u32, f: impl FnOnce(&mut PlaybackCategory) -> T) -> Option<T> {
        let mut state = self.lock();
        state.categories.get_mut(&key).map(f)
    }

    /// Take ownership of `category`, returning the key it is now known by.
    pub fn add_category(&self, category: PlaybackCategory) -> u32 {
        let mut state = self.lock();
        // Keys wrap after 2^32 additions; skip any still in use.
        let mut key = state.next_key;
        while state.categories.contains_key(&key) {
            key = key.wrapping_add(1);
        }
        state.next_key = key.wrapping_add(1);
        state.categories.insert(key, category);
        log::debug!("Added playback category {}", key);
        key
    }

    /// Play `sound` on the device as part of category `key`.
    ///
    /// Fails with a not found error if there is no such category.  Returns `Ok(None)` if the device declined the
    /// sound, in which case nothing is added.
    ///
    /// The device is called without the manager's lock held, so it may call back into the manager.  If the category is
    /// stopped while the device is starting the sound, the new handle is stopped too and the call fails as not found.
    pub fn play(&self, sound: D::Sound, key: u32) -> Result<Option<Arc<dyn PlaybackHandle>>> {
        if !self.lock().categories.contains_key(&key) {
            return Err(Error::not_found(format!("playback category {}", key)));
        }

        let Some(handle) = self.device.play(sound) else {
            log::warn!("Device declined to play a sound for category {}", key);
            return Ok(None);
        };

        let mut state = self.lock();
        let Some(category) = state.categories.get_mut(&key) else {
            drop(state);
            handle.stop();
            return Err(Error::not_found(format!("playback category {}", key)));
        };
        category.add(handle.clone());
        Ok(Some(handle))
    }

    pub fn pause(&self, key: u32) -> bool {
        self.with_category(key, |c| c.pause()).is_some()
    }

    pub fn resume(&self, key: u32) -> bool {
        self.with_category(key, |c| c.resume()).is_some()
    }

    pub fn set_volume(&self, key: u32, volume: f32) -> bool {
        self.with_category(key, |c| c.set_volume(volume)).is_some()
    }

    pub fn volume(&self, key: u32) -> Option<f32> {
        self.with_category(key, |c| c.volume())
    }

    /// Stop every sound in category `key` and remove the category.
    pub fn stop(&self, key: u32) -> bool {
        let mut state = self.lock();
        match state.categories.remove(&key) {
            Some(mut category) => {
                category.stop();
                true
            }
            None => false,
        }
    }

    /// Drop stopped handles from every category.
    pub fn clean(&self) {
        let mut state = self.lock();
        for category in state.categories.values_mut() {
            category.clean();
        }
    }

    /// Drop stopped handles from category `key`.
    pub fn clean_category(&self, key: u32) -> bool {
        self.with_category(key, |c| c.clean()).is_some()
    }
}
