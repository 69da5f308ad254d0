//! Format layout: the frozen constants that define how a payload is spread
//! over carrier timestamps.
//!
//! # Compatibility
//! Every value here is part of the on-disk contract.  Carriers written under
//! one layout cannot be read back under another, so the layout is treated as
//! a versioned format, never as a tuning knob.  A [`Layout`] is validated once
//! when a channel is constructed and is immutable afterwards.
//!
//! # Digit string
//! ```text
//!  0      3   4          10           17
//!  ├──────┼───┼──────────┼────────────┤
//!  │ created  │ accessed │  modified  │   carrier clocks
//!  │ ms (3)   │ 100ns (7)│  100ns (7) │
//!  ├──────────┴┬─────────┴────────────┤
//!  │ index (4) │     data (13)        │   record fields
//! ```
//! The index field is the most significant prefix of the string, so sorting
//! records as strings orders them by index first.

use serde::Serialize;

use crate::digits::byte_capacity;
use crate::error::{Error, Result};

/// Decimal digits stored per carrier.
pub const TOTAL_DIGITS: usize = 17;
/// Leading digits of each record reserved for the index field.
pub const INDEX_DIGITS: usize = 4;
/// Reed-Solomon parity bytes per codeword.
pub const PARITY_BYTES: usize = 50;
/// Separator between payload and file extension inside a frame.
pub const SEPARATOR: u8 = b'.';
/// Reed-Solomon codeword length over GF(256).
pub const RS_BLOCK_LEN: usize = 255;

/// Digits carried by the creation-time millisecond field.
pub const CREATED_DIGITS: usize = 3;
/// Digits carried by the access-time 100ns field.
pub const ACCESSED_DIGITS: usize = 7;
/// Digits carried by the modified-time 100ns field.
pub const MODIFIED_DIGITS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Layout {
    total_digits: usize,
    index_digits: usize,
    parity_bytes: usize,
}

impl Layout {
    pub const STANDARD: Layout = Layout {
        total_digits: TOTAL_DIGITS,
        index_digits: INDEX_DIGITS,
        parity_bytes: PARITY_BYTES,
    };

    /// Build and validate a layout with a non-standard index width or parity
    /// length.  The total width is fixed by the carrier clock split.
    pub fn new(index_digits: usize, parity_bytes: usize) -> Result<Self> {
        let layout = Self { total_digits: TOTAL_DIGITS, index_digits, parity_bytes };
        layout.validate()?;
        Ok(layout)
    }

    pub fn validate(&self) -> Result<()> {
        let split = CREATED_DIGITS + ACCESSED_DIGITS + MODIFIED_DIGITS;
        if self.total_digits != split {
            return Err(Error::InvalidLayout(format!(
                "total width {} does not match the carrier clock split ({split})",
                self.total_digits
            )));
        }
        if self.index_digits == 0 || self.index_digits >= self.total_digits {
            return Err(Error::InvalidLayout(format!(
                "index width {} must be in 1..{}",
                self.index_digits, self.total_digits
            )));
        }
        let capacity = self.bytes_per_carrier();
        if capacity == 0 || capacity > 8 {
            return Err(Error::InvalidLayout(format!(
                "data width {} yields {capacity} byte(s) per carrier",
                self.data_digits()
            )));
        }
        if self.parity_bytes == 0 || self.parity_bytes >= RS_BLOCK_LEN {
            return Err(Error::InvalidLayout(format!(
                "parity length {} must be in 1..{RS_BLOCK_LEN}",
                self.parity_bytes
            )));
        }
        Ok(())
    }

    pub fn total_digits(&self) -> usize { self.total_digits }
    pub fn index_digits(&self) -> usize { self.index_digits }
    pub fn parity_bytes(&self) -> usize { self.parity_bytes }

    pub fn data_digits(&self) -> usize {
        self.total_digits - self.index_digits
    }

    /// Bytes per data chunk.  Derived from one digit fewer than the data
    /// field so a full chunk always renders inside the field.
    pub fn bytes_per_carrier(&self) -> usize {
        byte_capacity(self.data_digits().saturating_sub(1))
    }

    /// Largest index a data record takes within one window; also the global
    /// cap on data chunks.
    pub fn max_window_index(&self) -> usize {
        self.index_limit() - 2
    }

    /// Index value never written by the planner.  A reset carrier reads
    /// back with this index.
    pub fn reserved_index(&self) -> usize {
        self.index_limit() - 1
    }

    /// Message bytes per Reed-Solomon codeword.
    pub fn rs_message_len(&self) -> usize {
        RS_BLOCK_LEN - self.parity_bytes
    }

    /// Largest framed stream the index space can carry.
    pub fn max_framed_bytes(&self) -> usize {
        self.max_window_index() * self.bytes_per_carrier()
    }

    /// Largest `payload || '.' || extension` message that fits after parity.
    pub fn max_message_bytes(&self) -> usize {
        let framed = self.max_framed_bytes();
        let full = framed / RS_BLOCK_LEN;
        let tail = (framed % RS_BLOCK_LEN).saturating_sub(self.parity_bytes);
        full * self.rs_message_len() + tail
    }

    /// Framed length produced for a message of `message_len` bytes.
    pub fn framed_len(&self, message_len: usize) -> usize {
        message_len + message_len.div_ceil(self.rs_message_len()) * self.parity_bytes
    }

    fn index_limit(&self) -> usize {
        10usize.pow(self.index_digits as u32)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::STANDARD
    }
}
