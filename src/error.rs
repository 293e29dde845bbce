//! Error types for the Bubble protocol layer.

use crate::infrastructure::bubble::protocol::ResponseKind;
use thiserror::Error;

/// Frame-level decode failures. None of these end a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("empty notification")]
    Empty,

    #[error("{kind} frame too short: need {needed} bytes, got {actual}")]
    TooShort {
        kind: ResponseKind,
        needed: usize,
        actual: usize,
    },

    #[error("advertisement too short: need {needed} bytes, got {actual}")]
    AdvertisementTooShort { needed: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("reading interval must be 1-255 minutes, got {0}")]
    InvalidInterval(u8),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    #[error("malformed version string: {0:?}")]
    Malformed(String),
}
