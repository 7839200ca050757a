use std::collections::TryReserveError;

use crate::reader::ReaderError;

#[derive(Debug, derive_more::Display, derive_more::IsVariant)]
enum ErrorPayload {
    #[display(fmt = "Invalid impulse response: {}", _0)]
    InvalidImpulseResponse(&'static str),

    #[display(fmt = "Configuration error: {}", _0)]
    Configuration(String),

    #[display(fmt = "Not found: {}", _0)]
    NotFound(String),

    #[display(fmt = "Resource exhausted: {}", _0)]
    ResourceExhausted(TryReserveError),

    #[display(fmt = "Reader error: {}", _0)]
    Reader(ReaderError),
}

#[derive(Debug, thiserror::Error)]
#[error("{payload}")]
pub struct Error {
    payload: ErrorPayload,
}

macro_rules! conv {
    ($variant: ident, $from_err: path) => {
        impl From<$from_err> for Error {
            fn from(value: $from_err) -> Error {
                Error {
                    payload: ErrorPayload::$variant(value),
                }
            }
        }
    };
}

conv!(ResourceExhausted, TryReserveError);
conv!(Reader, ReaderError);

impl Error {
    pub(crate) fn invalid_impulse_response(reason: &'static str) -> Error {
        Error {
            payload: ErrorPayload::InvalidImpulseResponse(reason),
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Error {
        Error {
            payload: ErrorPayload::Configuration(message.into()),
        }
    }

    pub(crate) fn not_found(what: impl Into<String>) -> Error {
        Error {
            payload: ErrorPayload::NotFound(what.into()),
        }
    }

    /// Was the source signal of an impulse response unusable (no channels, no frames, no direction where one was
    /// required)?
    pub fn is_invalid_impulse_response(&self) -> bool {
        self.payload.is_invalid_impulse_response()
    }

    /// Did components disagree about transform size, channel count, or another construction parameter?
    pub fn is_configuration(&self) -> bool {
        self.payload.is_configuration()
    }

    /// Did a control operation reference a category or handle which does not exist?
    pub fn is_not_found(&self) -> bool {
        self.payload.is_not_found()
    }

    /// Did allocating filter storage fail?
    pub fn is_resource_exhausted(&self) -> bool {
        self.payload.is_resource_exhausted()
    }

    /// Did the decoded-audio reader fail?
    pub fn is_reader(&self) -> bool {
        self.payload.is_reader()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
