//! Timestamp stores: where carrier timestamps are listed, read and written.
//!
//! The channel engine only talks to [`TimestampStore`].  Two stores ship
//! with the crate:
//!
//! - [`FsStore`]: real files through `std::fs`.  Access and modified times
//!   are settable everywhere; creation time only on Windows and macOS.
//! - [`MemoryStore`]: an in-memory directory for tests, benches and dry runs.
//!
//! # Precision contract
//! A store must keep access/modified sub-seconds to at least 100 ns and
//! creation sub-seconds to at least 1 ms.  Nothing checks this at runtime; a
//! coarser store silently corrupts the digits it is given.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Duration, Utc};

use crate::error::{Error, Result};

/// The three clocks of one carrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CarrierTimes {
    pub created:  DateTime<Utc>,
    pub accessed: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

pub trait TimestampStore {
    /// Regular files directly inside `dir`, oldest creation time first
    /// (ties broken by path).
    fn list_regular_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;

    fn get_times(&self, carrier: &Path) -> Result<CarrierTimes>;

    fn set_creation_time(&mut self, carrier: &Path, time: DateTime<Utc>) -> Result<()>;

    fn set_access_modified_times(
        &mut self,
        carrier:  &Path,
        accessed: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<()>;
}

// ── FsStore ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct FsStore;

impl FsStore {
    pub fn new() -> Self {
        Self
    }
}

impl TimestampStore for FsStore {
    fn list_regular_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let meta = fs::metadata(&path)?;
            if !meta.is_file() {
                continue;
            }
            // Platforms without a birth time still get a stable order.
            let key = meta.created().or_else(|_| meta.modified())?;
            entries.push((key, path));
        }
        entries.sort();
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }

    fn get_times(&self, carrier: &Path) -> Result<CarrierTimes> {
        let meta = fs::metadata(carrier)?;
        Ok(CarrierTimes {
            created:  meta.created()?.into(),
            accessed: meta.accessed()?.into(),
            modified: meta.modified()?.into(),
        })
    }

    fn set_creation_time(&mut self, carrier: &Path, time: DateTime<Utc>) -> Result<()> {
        set_created(carrier, time.into())
    }

    fn set_access_modified_times(
        &mut self,
        carrier:  &Path,
        accessed: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<()> {
        let times = fs::FileTimes::new()
            .set_accessed(accessed.into())
            .set_modified(modified.into());
        open_for_times(carrier)?.set_times(times)?;
        Ok(())
    }
}

#[cfg(windows)]
fn open_for_times(path: &Path) -> io::Result<File> {
    use std::os::windows::fs::OpenOptionsExt;
    const FILE_WRITE_ATTRIBUTES: u32 = 0x0100;
    fs::OpenOptions::new().access_mode(FILE_WRITE_ATTRIBUTES).open(path)
}

#[cfg(not(windows))]
fn open_for_times(path: &Path) -> io::Result<File> {
    File::open(path)
}

#[cfg(windows)]
fn set_created(path: &Path, time: SystemTime) -> Result<()> {
    use std::os::windows::fs::FileTimesExt;
    open_for_times(path)?.set_times(fs::FileTimes::new().set_created(time))?;
    Ok(())
}

#[cfg(target_os = "macos")]
fn set_created(path: &Path, time: SystemTime) -> Result<()> {
    use std::os::macos::fs::FileTimesExt;
    open_for_times(path)?.set_times(fs::FileTimes::new().set_created(time))?;
    Ok(())
}

#[cfg(not(any(windows, target_os = "macos")))]
fn set_created(path: &Path, _time: SystemTime) -> Result<()> {
    Err(Error::Unsupported(format!(
        "cannot set the creation time of {}",
        path.display()
    )))
}

// ── MemoryStore ──────────────────────────────────────────────────────────────

/// Carriers held in memory, keyed by path.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    files: BTreeMap<PathBuf, CarrierTimes>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// `count` carriers named `carrier_0000.dat`, ... inside `dir`, created
    /// about 1.24 s apart after `base`, each with distinct sub-second values on
    /// every clock.
    pub fn with_carriers(dir: &Path, count: usize, base: DateTime<Utc>) -> Self {
        let mut store = Self::new();
        for i in 0..count {
            let step = i as i64 + 1;
            let created = base + Duration::milliseconds(step * 1_237) + Duration::nanoseconds(step * 4_141);
            store.insert(
                dir.join(format!("carrier_{i:04}.dat")),
                CarrierTimes {
                    created,
                    accessed: created + Duration::seconds(3_600) + Duration::nanoseconds(step * 7_919),
                    modified: created + Duration::seconds(1_800) + Duration::nanoseconds(step * 3_571),
                },
            );
        }
        store
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, times: CarrierTimes) {
        self.files.insert(path.into(), times);
    }

    pub fn times(&self, path: &Path) -> Option<&CarrierTimes> {
        self.files.get(path)
    }

    fn entry(&mut self, path: &Path) -> Result<&mut CarrierTimes> {
        self.files.get_mut(path).ok_or_else(|| not_found(path))
    }
}

fn not_found(path: &Path) -> Error {
    Error::Io(io::Error::new(
        io::ErrorKind::NotFound,
        format!("no carrier at {}", path.display()),
    ))
}

impl TimestampStore for MemoryStore {
    fn list_regular_files(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut entries: Vec<(DateTime<Utc>, &PathBuf)> = self
            .files
            .iter()
            .filter(|(path, _)| path.parent() == Some(dir))
            .map(|(path, times)| (times.created, path))
            .collect();
        entries.sort();
        Ok(entries.into_iter().map(|(_, path)| path.clone()).collect())
    }

    fn get_times(&self, carrier: &Path) -> Result<CarrierTimes> {
        self.files.get(carrier).copied().ok_or_else(|| not_found(carrier))
    }

    fn set_creation_time(&mut self, carrier: &Path, time: DateTime<Utc>) -> Result<()> {
        self.entry(carrier)?.created = time;
        Ok(())
    }

    fn set_access_modified_times(
        &mut self,
        carrier:  &Path,
        accessed: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Result<()> {
        let times = self.entry(carrier)?;
        times.accessed = accessed;
        times.modified = modified;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 3, 14, 15, 9, 26).unwrap()
    }

    #[test]
    fn memory_store_lists_by_creation_time() {
        let dir = Path::new("/carriers");
        let mut store = MemoryStore::with_carriers(dir, 3, base());
        // Move the last carrier to the front.
        let last = dir.join("carrier_0002.dat");
        store.set_creation_time(&last, base() - Duration::days(1)).unwrap();

        let listed = store.list_regular_files(dir).unwrap();
        assert_eq!(
            listed,
            vec![last, dir.join("carrier_0000.dat"), dir.join("carrier_0001.dat")]
        );
    }

    #[test]
    fn memory_store_filters_by_directory() {
        let mut store = MemoryStore::with_carriers(Path::new("/a"), 2, base());
        store.insert(
            "/b/other.txt",
            CarrierTimes { created: base(), accessed: base(), modified: base() },
        );
        assert_eq!(store.list_regular_files(Path::new("/a")).unwrap().len(), 2);
        assert_eq!(store.list_regular_files(Path::new("/b")).unwrap().len(), 1);
        assert!(store.list_regular_files(Path::new("/c")).unwrap().is_empty());
    }

    #[test]
    fn memory_store_sets_times() {
        let dir = Path::new("/m");
        let mut store = MemoryStore::with_carriers(dir, 1, base());
        let path = dir.join("carrier_0000.dat");
        let t = base() + Duration::nanoseconds(123_456_700);
        store.set_access_modified_times(&path, t, t).unwrap();
        let times = store.get_times(&path).unwrap();
        assert_eq!(times.accessed, t);
        assert_eq!(times.modified, t);
        assert_eq!(times.created, base() + Duration::milliseconds(1_237) + Duration::nanoseconds(4_141));
    }

    #[test]
    fn memory_store_reports_missing_carriers() {
        let mut store = MemoryStore::new();
        let missing = Path::new("/nope/file");
        assert!(matches!(store.get_times(missing), Err(Error::Io(_))));
        assert!(matches!(store.set_creation_time(missing, base()), Err(Error::Io(_))));
    }
}
