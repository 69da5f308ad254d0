//! Read-only carrier scan.
//!
//! Every carrier in the directory is read and classified without touching
//! any timestamp.  The report tells whether a payload appears to be present
//! and how the directory is populated, which helps diagnose a failed
//! extract.
//!
//! | Class      | Record                                        |
//! |------------|-----------------------------------------------|
//! | `Index`    | index field `0`; data field = chunks declared |
//! | `Data`     | any other non-reserved index                  |
//! | `Sentinel` | seventeen nines (reset, never written)        |
//! | `Reserved` | reserved index with other data digits         |

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::carrier::CarrierMapper;
use crate::error::Result;
use crate::layout::Layout;
use crate::plan::{classify, DigitString, Record};
use crate::store::TimestampStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum CarrierClass {
    Index { remaining: usize },
    Data { index: usize },
    Sentinel,
    Reserved,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScannedCarrier {
    pub path:   PathBuf,
    pub record: String,
    pub class:  CarrierClass,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub total_scanned:     usize,
    pub index_records:     usize,
    pub data_records:      usize,
    pub sentinel_carriers: usize,
    pub reserved_carriers: usize,
    /// Data chunks declared by the highest-sorting index record.
    pub declared_chunks:   Option<usize>,
    pub carriers:          Vec<ScannedCarrier>,
}

impl ScanReport {
    /// An index record exists and enough data records follow it.
    pub fn payload_present(&self) -> bool {
        self.declared_chunks.is_some_and(|declared| self.data_records >= declared)
    }

    pub fn summary(&self) -> String {
        let payload = match self.declared_chunks {
            Some(declared) if self.payload_present() => format!("payload of {declared} chunk(s) present"),
            Some(declared) => format!(
                "index declares {declared} chunk(s) but only {} data record(s) found",
                self.data_records
            ),
            None => "no payload".to_string(),
        };
        format!(
            "{} carrier(s): {} index, {} data, {} sentinel, {} reserved; {payload}",
            self.total_scanned,
            self.index_records,
            self.data_records,
            self.sentinel_carriers,
            self.reserved_carriers,
        )
    }
}

pub fn scan<S: TimestampStore + ?Sized>(store: &S, layout: &Layout, dir: &Path) -> Result<ScanReport> {
    let mapper = CarrierMapper::new(*layout);
    let sentinel = "9".repeat(layout.total_digits());

    let mut carriers = Vec::new();
    for path in store.list_regular_files(dir)? {
        let record = mapper.read(store, &path)?;
        let class = classify_carrier(&record, layout, &sentinel)?;
        carriers.push(ScannedCarrier { path, record: record.as_str().to_owned(), class });
    }

    let count = |f: fn(&CarrierClass) -> bool| carriers.iter().filter(|c| f(&c.class)).count();
    let index_records = count(|c| matches!(c, CarrierClass::Index { .. }));
    let data_records = count(|c| matches!(c, CarrierClass::Data { .. }));
    let sentinel_carriers = count(|c| matches!(c, CarrierClass::Sentinel));
    let reserved_carriers = count(|c| matches!(c, CarrierClass::Reserved));

    // Index records sort ahead of all data and each one overrides the
    // count before it, so extraction ends up honouring the last.
    let declared_chunks = carriers
        .iter()
        .filter(|c| matches!(c.class, CarrierClass::Index { .. }))
        .max_by(|a, b| a.record.cmp(&b.record))
        .and_then(|c| match c.class {
            CarrierClass::Index { remaining } => Some(remaining),
            _ => None,
        });

    Ok(ScanReport {
        total_scanned: carriers.len(),
        index_records,
        data_records,
        sentinel_carriers,
        reserved_carriers,
        declared_chunks,
        carriers,
    })
}

fn classify_carrier(record: &DigitString, layout: &Layout, sentinel: &str) -> Result<CarrierClass> {
    Ok(match classify(record, layout)? {
        Record::Index { remaining } => CarrierClass::Index { remaining },
        Record::Data { index } => CarrierClass::Data { index },
        Record::Reserved if record.as_str() == sentinel => CarrierClass::Sentinel,
        Record::Reserved => CarrierClass::Reserved,
    })
}
