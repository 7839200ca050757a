//! C-callable surface.
//!
//! Handles are opaque pointers owned by the caller until passed to the matching `_free` function.  Every function
//! accepts null handles: operations on them do nothing, getters return NaN, and constructors return null on failure.
//! Impulse responses cross the boundary as `Arc`s, so one filter handle may be added to any number of HRTFs and freed
//! independently of them.
#![allow(non_snake_case)]
use std::ptr;
use std::sync::Arc;

use crate::error::Error;
use crate::fft::FftPlan;
use crate::hrtf::{Direction, Hrtf};
use crate::impulse_response::ImpulseResponse;
use crate::reader::VecSignal;
use crate::source::Source;

/// Status codes returned by fallible functions.
#[repr(i32)]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BinauralStatus {
    Ok = 0,
    NullPointer = -1,
    InvalidImpulseResponse = -2,
    Configuration = -3,
    NotFound = -4,
    ResourceExhausted = -5,
    Reader = -6,
}

impl From<&Error> for BinauralStatus {
    fn from(value: &Error) -> Self {
        if value.is_invalid_impulse_response() {
            BinauralStatus::InvalidImpulseResponse
        } else if value.is_configuration() {
            BinauralStatus::Configuration
        } else if value.is_not_found() {
            BinauralStatus::NotFound
        } else if value.is_resource_exhausted() {
            BinauralStatus::ResourceExhausted
        } else {
            BinauralStatus::Reader
        }
    }
}

#[no_mangle]
pub extern "C" fn HRTF_create() -> *mut Hrtf {
    Box::into_raw(Box::new(Hrtf::new()))
}

/// # Safety
///
/// `hrtf` must be null or a pointer returned by [HRTF_create] which has not been freed.
#[no_mangle]
pub unsafe extern "C" fn HRTF_free(hrtf: *mut Hrtf) {
    if !hrtf.is_null() {
        drop(unsafe { Box::from_raw(hrtf) });
    }
}

/// Add a filter to an HRTF under the direction it was created for.
///
/// The HRTF takes its own reference; the caller still owns `filter` and must free it.
///
/// # Safety
///
/// `hrtf` must be null or a live pointer from [HRTF_create], and `filter` null or a live pointer from
/// [ImpulseResponse_create].  Nothing else may be using `hrtf` during the call.
#[no_mangle]
pub unsafe extern "C" fn HRTF_addImpulseResponse(
    hrtf: *mut Hrtf,
    filter: *const ImpulseResponse,
) -> BinauralStatus {
    if hrtf.is_null() || filter.is_null() {
        return BinauralStatus::NullPointer;
    }

    let hrtf = unsafe { &mut *hrtf };
    let filter = unsafe {
        Arc::increment_strong_count(filter);
        Arc::from_raw(filter)
    };

    match hrtf.insert(filter) {
        Ok(()) => BinauralStatus::Ok,
        Err(e) => {
            log::warn!("HRTF_addImpulseResponse failed: {}", e);
            BinauralStatus::from(&e)
        }
    }
}

/// Build a filter for the given direction from `frames` interleaved frames of `channels` channels.
///
/// Returns null if `samples` is null, if the signal is empty, or if `transform_size` is not even and at least 2.
///
/// # Safety
///
/// `samples` must point to at least `frames * channels` readable floats.
#[no_mangle]
pub unsafe extern "C" fn ImpulseResponse_create(
    samples: *const f32,
    frames: usize,
    channels: usize,
    transform_size: usize,
    azimuth: f32,
    elevation: f32,
) -> *const ImpulseResponse {
    if samples.is_null() {
        return ptr::null();
    }
    let Some(len) = frames.checked_mul(channels) else {
        return ptr::null();
    };
    let samples = unsafe { std::slice::from_raw_parts(samples, len) }.to_vec();

    let built = VecSignal::new(channels, samples)
        .map_err(Error::from)
        .and_then(|mut signal| {
            let plan = FftPlan::new(transform_size)?;
            ImpulseResponse::build(&mut signal, &plan, Direction::new(azimuth, elevation))
        });

    match built {
        Ok(ir) => Arc::into_raw(ir),
        Err(e) => {
            log::warn!("ImpulseResponse_create failed: {}", e);
            ptr::null()
        }
    }
}

/// # Safety
///
/// `filter` must be null or a pointer from [ImpulseResponse_create] which has not been freed.
#[no_mangle]
pub unsafe extern "C" fn ImpulseResponse_free(filter: *const ImpulseResponse) {
    if !filter.is_null() {
        drop(unsafe { Arc::from_raw(filter) });
    }
}

#[no_mangle]
pub extern "C" fn Source_create(azimuth: f32, elevation: f32) -> *const Source {
    Arc::into_raw(Arc::new(Source::new(azimuth, elevation)))
}

/// # Safety
///
/// `source` must be null or a pointer from [Source_create] which has not been freed.
#[no_mangle]
pub unsafe extern "C" fn Source_free(source: *const Source) {
    if !source.is_null() {
        drop(unsafe { Arc::from_raw(source) });
    }
}

/// # Safety
///
/// `source` must be null or a live pointer from [Source_create].
#[no_mangle]
pub unsafe extern "C" fn Source_getAzimuth(source: *const Source) -> f32 {
    unsafe { source.as_ref() }.map_or(f32::NAN, |s| s.azimuth())
}

/// # Safety
///
/// `source` must be null or a live pointer from [Source_create].
#[no_mangle]
pub unsafe extern "C" fn Source_getElevation(source: *const Source) -> f32 {
    unsafe { source.as_ref() }.map_or(f32::NAN, |s| s.elevation())
}

/// # Safety
///
/// `source` must be null or a live pointer from [Source_create].  Other threads may use the source concurrently.
#[no_mangle]
pub unsafe extern "C" fn Source_setAzimuth(source: *const Source, azimuth: f32) {
    if let Some(s) = unsafe { source.as_ref() } {
        s.set_azimuth(azimuth);
    }
}

/// # Safety
///
/// `source` must be null or a live pointer from [Source_create].  Other threads may use the source concurrently.
#[no_mangle]
pub unsafe extern "C" fn Source_setElevation(source: *const Source, elevation: f32) {
    if let Some(s) = unsafe { source.as_ref() } {
        s.set_elevation(elevation);
    }
}
