//! Chunk planner: framed bytes ⇄ ordered digit-string records.
//!
//! # Record stream
//! ```text
//! [0000|remaining=N] [0001|chunk 0] [0002|chunk 1] ... [9998|chunk 9997]
//! [0000|remaining=N-9998] [0001|chunk 9998] ...
//! ```
//! An index record (index field `0`) opens each window and declares how many
//! data chunks remain from that point.  Data records carry a window-local
//! counter in the index field; it is never used as an address.  Order is
//! recovered by sorting records as strings, which orders by index field
//! first because it is the most significant prefix.
//!
//! # Padding
//! The framed stream is left-padded with zero bytes to a multiple of the
//! per-carrier capacity.  [`ChunkPlanner::unplan`] strips *all* leading zero
//! bytes, so a stream that itself begins with `0x00` loses those bytes.
//! Existing carriers depend on this behaviour.

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::digits::{bytes_to_decimal, decimal_to_bytes, decimal_to_bytes_truncating, parse_decimal};
use crate::error::{Error, Result};
use crate::layout::Layout;

// ── DigitString ──────────────────────────────────────────────────────────────

/// One fixed-width record as stored in a carrier.  Ordering is plain string
/// ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DigitString(String);

impl DigitString {
    /// Validate a raw string against the layout width.
    pub fn parse(raw: &str, layout: &Layout) -> Result<Self> {
        if raw.len() != layout.total_digits() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return Err(Error::InvalidDigits(raw.to_owned()));
        }
        Ok(Self(raw.to_owned()))
    }

    fn from_fields(index: usize, data: &str, layout: &Layout) -> Result<Self> {
        let raw = format!("{index:0>width$}{data}", width = layout.index_digits());
        Self::parse(&raw, layout)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn index_field(&self, layout: &Layout) -> &str {
        &self.0[..layout.index_digits()]
    }

    pub fn data_field(&self, layout: &Layout) -> &str {
        &self.0[layout.index_digits()..]
    }
}

impl fmt::Display for DigitString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── Record classification ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    /// Window header; `remaining` data chunks follow.
    Index { remaining: usize },
    /// Data chunk at window position `index`.
    Data { index: usize },
    /// Index field holds the reserved value (reset carriers read back so).
    Reserved,
}

pub fn classify(record: &DigitString, layout: &Layout) -> Result<Record> {
    let index = parse_usize(record.index_field(layout))?;
    if index == 0 {
        let remaining = parse_usize(record.data_field(layout))?;
        Ok(Record::Index { remaining })
    } else if index == layout.reserved_index() {
        Ok(Record::Reserved)
    } else {
        Ok(Record::Data { index })
    }
}

fn parse_usize(digits: &str) -> Result<usize> {
    let value = parse_decimal(digits)?;
    usize::try_from(value).map_err(|_| Error::InvalidDigits(digits.to_owned()))
}

// ── Plan ─────────────────────────────────────────────────────────────────────

/// Records ready to be written, in write order.
#[derive(Debug, Clone)]
pub struct Plan {
    pub records: Vec<DigitString>,
    pub summary: PlanSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PlanSummary {
    pub framed_bytes:  usize,
    pub padding_bytes: usize,
    pub data_chunks:   usize,
    pub index_records: usize,
}

impl PlanSummary {
    pub fn total_records(&self) -> usize {
        self.data_chunks + self.index_records
    }
}

/// Output of [`ChunkPlanner::unplan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    /// Framed stream with padding removed.
    pub framed:       Vec<u8>,
    /// Index and data records that contributed to `framed`.
    pub records_used: usize,
}

// ── ChunkPlanner ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct ChunkPlanner {
    layout: Layout,
}

impl ChunkPlanner {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn plan(&self, framed: &[u8]) -> Result<Plan> {
        let capacity = self.layout.bytes_per_carrier();
        let padding = (capacity - framed.len() % capacity) % capacity;

        let mut padded = vec![0u8; padding];
        padded.extend_from_slice(framed);
        let chunks: Vec<&[u8]> = padded.chunks(capacity).collect();

        // Checked once against the whole stream, even though the record
        // stream itself can chain windows.
        let max = self.layout.max_window_index();
        if chunks.len() > max {
            return Err(Error::CapacityExceeded { needed: chunks.len(), max });
        }

        let records = self.emit_windows(&chunks)?;
        let summary = PlanSummary {
            framed_bytes:  framed.len(),
            padding_bytes: padding,
            data_chunks:   chunks.len(),
            index_records: records.len() - chunks.len(),
        };
        debug!(?summary, "planned records");
        Ok(Plan { records, summary })
    }

    fn emit_windows(&self, chunks: &[&[u8]]) -> Result<Vec<DigitString>> {
        let max = self.layout.max_window_index();
        let data_digits = self.layout.data_digits();
        let mut records = Vec::with_capacity(chunks.len() + chunks.len() / max + 1);
        let mut counter = 0usize;

        for (i, chunk) in chunks.iter().enumerate() {
            if i == 0 || counter > max {
                let remaining = (chunks.len() - i).to_string();
                let header = format!("{remaining:0>data_digits$}");
                records.push(DigitString::from_fields(0, &header, &self.layout)?);
                counter = 1;
            }
            let data = bytes_to_decimal(chunk, data_digits)?;
            records.push(DigitString::from_fields(counter, &data, &self.layout)?);
            counter += 1;
        }
        Ok(records)
    }

    /// Reassemble the framed stream from records in sorted order.
    ///
    /// A data field too large for one chunk is cut to its low-order bytes
    /// and left for the frame decoder to repair.
    pub fn unplan(&self, sorted: &[DigitString]) -> Result<Reassembled> {
        let capacity = self.layout.bytes_per_carrier();
        let mut found_start = false;
        let mut remaining = 0usize;
        let mut records_used = 0usize;
        let mut assembled = Vec::new();

        for record in sorted {
            match classify(record, &self.layout)? {
                Record::Index { remaining: declared } => {
                    found_start = true;
                    remaining = declared;
                    records_used += 1;
                }
                Record::Data { .. } if !found_start => continue,
                Record::Data { .. } if remaining > 0 => {
                    let field = record.data_field(&self.layout);
                    let chunk = match decimal_to_bytes(field, capacity) {
                        Err(Error::ValueOverflow { value, .. }) => {
                            debug!(%record, %value, "data field out of range, keeping low-order bytes");
                            decimal_to_bytes_truncating(field, capacity)?
                        }
                        other => other?,
                    };
                    assembled.extend_from_slice(&chunk);
                    remaining -= 1;
                    records_used += 1;
                }
                Record::Data { .. } | Record::Reserved => {
                    if found_start {
                        break;
                    }
                }
            }
        }

        if !found_start {
            return Err(Error::NoPayloadFound);
        }
        if remaining > 0 {
            debug!(missing = remaining, "record stream ended before the declared count");
        }

        let first = assembled.iter().position(|&b| b != 0).unwrap_or(assembled.len());
        assembled.drain(..first);
        Ok(Reassembled { framed: assembled, records_used })
    }
}
