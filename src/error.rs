//! Crate-wide error type.
//!
//! Every failure aborts the whole run; nothing here is retried or recovered
//! silently.  Variants carry enough context to name the violated constraint.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The framed payload needs more data chunks than one index window holds.
    #[error("Payload needs {needed} data chunks, the index space holds at most {max}")]
    CapacityExceeded { needed: usize, max: usize },

    /// A chunk rendered wider than the data field.  Unreachable with a valid
    /// layout; surfaced as an internal invariant violation.
    #[error("A {bytes}-byte chunk does not fit a {width}-digit data field")]
    ChunkTooLarge { bytes: usize, width: usize },

    /// A decimal value does not fit the requested byte width.
    #[error("Decimal value {value} does not fit in {byte_width} byte(s)")]
    ValueOverflow { value: u128, byte_width: usize },

    #[error("Invalid digit string {0:?}")]
    InvalidDigits(String),

    #[error("Not enough carrier files: need {needed}, found {available}")]
    InsufficientCarriers { needed: usize, available: usize },

    /// Reed-Solomon decoding could not repair codeword `block`.
    #[error("Uncorrectable error in frame block {block}")]
    Uncorrectable { block: usize },

    #[error("No index record found; the directory does not hold a payload")]
    NoPayloadFound,

    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Invalid format layout: {0}")]
    InvalidLayout(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
