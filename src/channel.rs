//! High-level [`CovertChannel`] API: hide and extract.
//!
//! ```no_run
//! use rand::SeedableRng;
//! use rand_chacha::ChaCha8Rng;
//! use std::path::Path;
//! use timestamp_channel::channel::CovertChannel;
//! use timestamp_channel::store::FsStore;
//!
//! let dir = Path::new("carriers");
//! let mut rng = ChaCha8Rng::seed_from_u64(1);
//!
//! // Hide
//! let mut channel = CovertChannel::new(FsStore::new())?;
//! channel.hide(dir, b"meet at noon", "txt", &mut rng)?;
//!
//! // Extract
//! let recovered = channel.extract(dir)?;
//! assert_eq!(recovered.extension, "txt");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Hide
//! Frame → plan → list carriers → check there are enough → reset every
//! carrier → pick a random contiguous window → write records in plan order.
//! Nothing is modified until the carrier count check has passed.  Writes are
//! not atomic across files; a failure part way leaves the directory
//! undecodable.
//!
//! # Extract
//! Read every carrier → sort records as strings → reassemble → decode frame.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Serialize;
use tracing::{debug, info, instrument};

use crate::carrier::CarrierMapper;
use crate::error::{Error, Result};
use crate::frame::FrameCodec;
use crate::layout::{Layout, INDEX_DIGITS, PARITY_BYTES};
use crate::plan::{ChunkPlanner, DigitString};
use crate::recovery::{self, ScanReport};
use crate::store::TimestampStore;

// ── ChannelOptions ───────────────────────────────────────────────────────────

/// Configuration for [`CovertChannel::with_options`].
///
/// Both values are format parameters: carriers written with one set can only
/// be read back with the same set.
#[derive(Debug, Clone)]
pub struct ChannelOptions {
    pub index_digits: usize,
    pub parity_bytes: usize,
}

impl Default for ChannelOptions {
    fn default() -> Self {
        Self {
            index_digits: INDEX_DIGITS,
            parity_bytes: PARITY_BYTES,
        }
    }
}

impl ChannelOptions {
    pub fn layout(&self) -> Result<Layout> {
        Layout::new(self.index_digits, self.parity_bytes)
    }
}

// ── Reports ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct HideReport {
    pub carriers_available: usize,
    pub records_written:    usize,
    pub data_chunks:        usize,
    pub index_records:      usize,
    /// Position of the first written carrier in creation-time order.
    pub offset:             usize,
    pub framed_bytes:       usize,
    pub padding_bytes:      usize,
    pub bytes_per_carrier:  usize,
}

/// A payload read back from a directory.
#[derive(Debug, Clone)]
pub struct Recovered {
    pub payload:          Vec<u8>,
    pub extension:        String,
    pub carriers_scanned: usize,
    /// Index and data records the payload was reassembled from.
    pub records_used:     usize,
    pub framed_bytes:     usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractReport {
    pub output:           PathBuf,
    pub payload_bytes:    usize,
    pub extension:        String,
    pub carriers_scanned: usize,
    pub records_used:     usize,
    pub framed_bytes:     usize,
}

// ── CovertChannel ────────────────────────────────────────────────────────────

pub struct CovertChannel<S> {
    store:   S,
    layout:  Layout,
    frames:  FrameCodec,
    planner: ChunkPlanner,
    mapper:  CarrierMapper,
}

impl<S: TimestampStore> CovertChannel<S> {
    pub fn new(store: S) -> Result<Self> {
        Self::with_options(store, ChannelOptions::default())
    }

    pub fn with_options(store: S, opts: ChannelOptions) -> Result<Self> {
        let layout = opts.layout()?;
        Ok(Self {
            store,
            layout,
            frames:  FrameCodec::new(&layout),
            planner: ChunkPlanner::new(layout),
            mapper:  CarrierMapper::new(layout),
        })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Hide `payload` with its file `extension` in the carriers of `dir`.
    #[instrument(skip(self, payload, rng), fields(dir = %dir.display(), payload_len = payload.len()))]
    pub fn hide<R: Rng>(
        &mut self,
        dir:       &Path,
        payload:   &[u8],
        extension: &str,
        rng:       &mut R,
    ) -> Result<HideReport> {
        let framed = self.frames.encode(payload, extension.as_bytes());
        debug!(framed_len = framed.len(), "framed payload");

        let plan = self.planner.plan(&framed)?;
        let needed = plan.records.len();

        let carriers = self.store.list_regular_files(dir)?;
        if carriers.len() < needed {
            return Err(Error::InsufficientCarriers { needed, available: carriers.len() });
        }
        debug!(needed, available = carriers.len(), "carriers validated");

        for carrier in &carriers {
            self.mapper.reset(&mut self.store, carrier)?;
        }

        let offset = rng.random_range(0..=carriers.len() - needed);
        for (carrier, record) in carriers[offset..].iter().zip(&plan.records) {
            self.mapper.write(&mut self.store, carrier, record)?;
        }

        let report = HideReport {
            carriers_available: carriers.len(),
            records_written:    needed,
            data_chunks:        plan.summary.data_chunks,
            index_records:      plan.summary.index_records,
            offset,
            framed_bytes:       plan.summary.framed_bytes,
            padding_bytes:      plan.summary.padding_bytes,
            bytes_per_carrier:  self.layout.bytes_per_carrier(),
        };
        info!(records = needed, offset, "payload hidden");
        Ok(report)
    }

    /// Recover the payload and extension hidden in `dir`.
    #[instrument(skip(self), fields(dir = %dir.display()))]
    pub fn extract(&self, dir: &Path) -> Result<Recovered> {
        let carriers = self.store.list_regular_files(dir)?;
        let mut records = carriers
            .iter()
            .map(|carrier| self.mapper.read(&self.store, carrier))
            .collect::<Result<Vec<DigitString>>>()?;
        records.sort();
        debug!(carriers = records.len(), "carriers scanned");

        let reassembled = self.planner.unplan(&records)?;
        debug!(
            records_used = reassembled.records_used,
            framed_len = reassembled.framed.len(),
            "records reassembled"
        );

        let frame = self.frames.decode(&reassembled.framed)?;
        let extension = String::from_utf8(frame.extension)
            .map_err(|_| Error::MalformedFrame("extension is not valid UTF-8".into()))?;

        info!(payload_len = frame.payload.len(), %extension, "payload extracted");
        Ok(Recovered {
            payload: frame.payload,
            extension,
            carriers_scanned: records.len(),
            records_used: reassembled.records_used,
            framed_bytes: reassembled.framed.len(),
        })
    }

    /// Hide the file at `input`; its extension travels with the payload.
    pub fn hide_file<R: Rng>(&mut self, dir: &Path, input: &Path, rng: &mut R) -> Result<HideReport> {
        let payload = fs::read(input)?;
        let extension = input
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.hide(dir, &payload, &extension, rng)
    }

    /// Extract into `output` with the recovered extension appended.
    pub fn extract_to(&self, dir: &Path, output: &Path) -> Result<ExtractReport> {
        let recovered = self.extract(dir)?;
        let path = output_path(output, &recovered.extension)?;
        fs::write(&path, &recovered.payload)?;
        Ok(ExtractReport {
            output:           path,
            payload_bytes:    recovered.payload.len(),
            extension:        recovered.extension,
            carriers_scanned: recovered.carriers_scanned,
            records_used:     recovered.records_used,
            framed_bytes:     recovered.framed_bytes,
        })
    }

    /// Classify every carrier in `dir` without modifying anything.
    pub fn scan(&self, dir: &Path) -> Result<ScanReport> {
        recovery::scan(&self.store, &self.layout, dir)
    }
}

fn output_path(output: &Path, extension: &str) -> Result<PathBuf> {
    if extension.is_empty() {
        return Ok(output.to_path_buf());
    }
    if extension.contains(['/', '\\']) || extension == ".." {
        return Err(Error::MalformedFrame(format!("unsafe extension: {extension:?}")));
    }
    let mut name = OsString::from(output.as_os_str());
    name.push(".");
    name.push(extension);
    Ok(PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_path_appends_extension() {
        assert_eq!(output_path(Path::new("out/file"), "bin").unwrap(), PathBuf::from("out/file.bin"));
        assert_eq!(output_path(Path::new("out/file"), "").unwrap(), PathBuf::from("out/file"));
        assert_eq!(output_path(Path::new("a.tar"), "gz").unwrap(), PathBuf::from("a.tar.gz"));
    }

    #[test]
    fn output_path_rejects_traversal() {
        assert!(output_path(Path::new("out"), "../../etc/passwd").is_err());
        assert!(output_path(Path::new("out"), "x\\y").is_err());
    }

    #[test]
    fn default_options_are_the_standard_layout() {
        assert_eq!(ChannelOptions::default().layout().unwrap(), Layout::STANDARD);
    }
}
