use thiserror::Error;

use crate::array::ArrayError;

/// Errors raised by the normalizer and the adapters.
///
/// All of them are caller contract violations detected before any engine work is
/// dispatched; none is transient.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error(transparent)]
    Array(#[from] ArrayError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns [`Error::InvalidArgument`] unless the condition holds.
macro_rules! ensure {
    ($cond:expr, $($arg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::InvalidArgument(format!($($arg)+)));
        }
    };
}

/// Returns [`Error::UnsupportedConfiguration`].
macro_rules! unsupported {
    ($($arg:tt)+) => {
        return Err($crate::error::Error::UnsupportedConfiguration(format!($($arg)+)))
    };
}

pub(crate) use {ensure, unsupported};
