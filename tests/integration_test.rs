use chrono::{DateTime, TimeZone, Timelike, Utc};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tempfile::tempdir;
use timestamp_channel::recovery::CarrierClass;
use timestamp_channel::{
    ChannelOptions, CovertChannel, Error, FsStore, Layout, MemoryStore, TimestampStore,
};

const DIR: &str = "/carriers";

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2019, 11, 5, 8, 30, 0).unwrap()
}

fn channel(carriers: usize) -> CovertChannel<MemoryStore> {
    CovertChannel::new(MemoryStore::with_carriers(Path::new(DIR), carriers, base())).unwrap()
}

fn rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

fn subsec_pattern(store: &MemoryStore, path: &Path) -> (u32, u32, u32) {
    let t = store.times(path).unwrap();
    (t.created.nanosecond(), t.accessed.nanosecond(), t.modified.nanosecond())
}

/// Data carriers in write order.
fn data_carriers(ch: &CovertChannel<MemoryStore>) -> Vec<PathBuf> {
    ch.scan(Path::new(DIR))
        .unwrap()
        .carriers
        .into_iter()
        .filter(|c| matches!(c.class, CarrierClass::Data { .. }))
        .map(|c| c.path)
        .collect()
}

#[test]
fn test_hide_extract_roundtrip() {
    let dir = Path::new(DIR);
    let payload = b"Roundtrip test data hidden in file timestamps";
    let mut ch = channel(80);

    let report = ch.hide(dir, payload, "txt", &mut rng(1)).unwrap();
    // 45 + 1 + 3 message bytes, 50 parity -> 99 framed -> 20 chunks.
    assert_eq!(report.framed_bytes, 99);
    assert_eq!(report.data_chunks, 20);
    assert_eq!(report.index_records, 1);
    assert_eq!(report.records_written, 21);

    let recovered = ch.extract(dir).unwrap();
    assert_eq!(recovered.payload, payload);
    assert_eq!(recovered.extension, "txt");
    assert_eq!(recovered.carriers_scanned, 80);
    assert_eq!(recovered.records_used, report.records_written);
}

#[test]
fn test_ten_byte_payload_in_fifty_carriers() {
    let dir = Path::new(DIR);
    let payload: Vec<u8> = (0x01..=0x0A).collect();
    let mut ch = channel(50);

    let report = ch.hide(dir, &payload, "bin", &mut rng(2)).unwrap();
    // 10 + 1 + 3 + 50 = 64 framed bytes -> 13 data chunks + 1 index record.
    assert_eq!(report.records_written, 14);

    let recovered = ch.extract(dir).unwrap();
    assert_eq!(recovered.payload, payload);
    assert_eq!(recovered.extension, "bin");
}

#[test]
fn test_leading_zero_payload_bytes_are_lost() {
    // Padding is removed by stripping every leading zero byte, so a payload
    // that starts with 0x00 comes back without it.  Kept for compatibility
    // with carriers written by earlier tools.
    let dir = Path::new(DIR);
    let payload: Vec<u8> = (0x00..=0x09).collect();
    let mut ch = channel(50);
    ch.hide(dir, &payload, "bin", &mut rng(3)).unwrap();

    let recovered = ch.extract(dir).unwrap();
    assert_eq!(recovered.payload, payload[1..]);
    assert_eq!(recovered.extension, "bin");
}

#[test]
fn test_insufficient_carriers_leaves_directory_untouched() {
    let dir = Path::new(DIR);
    let store = MemoryStore::with_carriers(dir, 10, base());
    let before = store.clone();
    let mut ch = CovertChannel::new(store).unwrap();

    let err = ch.hide(dir, b"0123456789", "bin", &mut rng(4)).unwrap_err();
    assert!(matches!(err, Error::InsufficientCarriers { needed: 14, available: 10 }));

    let after = ch.into_store();
    for path in before.list_regular_files(dir).unwrap() {
        assert_eq!(before.times(&path), after.times(&path));
    }
}

#[test]
fn test_capacity_bound_is_exact() {
    let dir = Path::new(DIR);
    // 100 + 1 + 3 message bytes -> 154 framed -> 31 chunks -> 32 records.
    let payload = vec![0x42u8; 100];

    let mut enough = channel(32);
    let report = enough.hide(dir, &payload, "txt", &mut rng(5)).unwrap();
    assert_eq!(report.offset, 0);
    assert_eq!(enough.extract(dir).unwrap().payload, payload);

    let mut short = channel(31);
    assert!(matches!(
        short.hide(dir, &payload, "txt", &mut rng(5)),
        Err(Error::InsufficientCarriers { needed: 32, available: 31 })
    ));
}

#[test]
fn test_capacity_exceeded_before_carriers_are_listed() {
    // Two index digits: at most 98 data chunks.
    let opts = ChannelOptions { index_digits: 2, ..ChannelOptions::default() };
    let store = MemoryStore::with_carriers(Path::new(DIR), 400, base());
    let mut ch = CovertChannel::with_options(store, opts).unwrap();

    // 604 message bytes -> 3 codewords -> 754 framed -> 151 chunks.
    let err = ch.hide(Path::new(DIR), &[0x07u8; 600], "bin", &mut rng(6)).unwrap_err();
    assert!(matches!(err, Error::CapacityExceeded { needed: 151, max: 98 }));

    let small = ch.hide(Path::new(DIR), b"fits easily", "md", &mut rng(6)).unwrap();
    assert_eq!(small.bytes_per_carrier, 5);
    assert_eq!(ch.extract(Path::new(DIR)).unwrap().payload, b"fits easily");
}

#[test]
fn test_invalid_options_are_rejected() {
    let opts = ChannelOptions { index_digits: 0, ..ChannelOptions::default() };
    let store = MemoryStore::new();
    assert!(matches!(CovertChannel::with_options(store, opts), Err(Error::InvalidLayout(_))));
}

#[test]
fn test_sentinel_uniformity_outside_window() {
    let dir = Path::new(DIR);
    let mut ch = channel(120);
    let report = ch.hide(dir, b"uniform baseline", "txt", &mut rng(7)).unwrap();

    let store = ch.store();
    let carriers = store.list_regular_files(dir).unwrap();
    let window = report.offset..report.offset + report.records_written;

    let outside: BTreeSet<(u32, u32, u32)> = carriers
        .iter()
        .enumerate()
        .filter(|(i, _)| !window.contains(i))
        .map(|(_, p)| subsec_pattern(store, p))
        .collect();
    assert_eq!(outside.len(), 1);
    assert_eq!(outside.into_iter().next().unwrap(), (999_999_000, 999_999_900, 999_999_900));
}

#[test]
fn test_random_placement_varies_and_always_decodes() {
    let dir = Path::new(DIR);
    let payload = b"placement must not matter";
    let mut offsets = BTreeSet::new();

    for seed in 0..24 {
        let mut ch = channel(200);
        let report = ch.hide(dir, payload, "log", &mut rng(seed)).unwrap();
        assert!(report.offset <= 200 - report.records_written);
        offsets.insert(report.offset);

        let recovered = ch.extract(dir).unwrap();
        assert_eq!(recovered.payload, payload);
        assert_eq!(recovered.extension, "log");
    }
    assert!(offsets.len() > 1, "placement offset never changed");
}

#[test]
fn test_rehide_overwrites_previous_payload() {
    let dir = Path::new(DIR);
    let mut ch = channel(150);
    ch.hide(dir, &[0x11u8; 300], "old", &mut rng(8)).unwrap();
    ch.hide(dir, b"second", "new", &mut rng(9)).unwrap();

    let recovered = ch.extract(dir).unwrap();
    assert_eq!(recovered.payload, b"second");
    assert_eq!(recovered.extension, "new");
}

#[test]
fn test_corrupted_carriers_are_repaired() {
    let dir = Path::new(DIR);
    let payload: Vec<u8> = (1..=120).collect();
    let mut ch = channel(100);
    ch.hide(dir, &payload, "dat", &mut rng(10)).unwrap();

    let data = data_carriers(&ch);
    let mut store = ch.into_store();
    // Zero the modified-time digits of three data carriers past the head of
    // the stream: at most five bytes of each chunk change.
    for path in data.iter().skip(2).take(3) {
        let t = store.get_times(path).unwrap();
        store
            .set_access_modified_times(path, t.accessed, t.modified.with_nanosecond(0).unwrap())
            .unwrap();
    }

    let ch = CovertChannel::new(store).unwrap();
    assert_eq!(ch.extract(dir).unwrap().payload, payload);
}

#[test]
fn test_out_of_range_carrier_is_repaired() {
    let dir = Path::new(DIR);
    let payload = b"one carrier damaged";
    let mut ch = channel(60);
    ch.hide(dir, payload, "txt", &mut rng(15)).unwrap();

    let fifth = ch
        .scan(dir)
        .unwrap()
        .carriers
        .into_iter()
        .find(|c| c.class == CarrierClass::Data { index: 5 })
        .unwrap()
        .path;

    let mut store = ch.into_store();
    // Access digits 5999999 keep the index digit and push the data field
    // far past 256^5.
    let t = store.get_times(&fifth).unwrap();
    store
        .set_access_modified_times(&fifth, t.accessed.with_nanosecond(599_999_900).unwrap(), t.modified)
        .unwrap();

    let ch = CovertChannel::new(store).unwrap();
    let recovered = ch.extract(dir).unwrap();
    assert_eq!(recovered.payload, payload);
    assert_eq!(recovered.extension, "txt");
}

#[test]
fn test_damaged_head_chunk_is_not_repairable() {
    // The first data chunk begins with padding.  Zeroing its low digits adds
    // another leading zero byte, which the padding strip removes, so every
    // later byte shifts and error correction cannot line the blocks up.
    let dir = Path::new(DIR);
    let payload: Vec<u8> = (1..=120).collect();
    let mut ch = channel(100);
    ch.hide(dir, &payload, "dat", &mut rng(10)).unwrap();

    let head = data_carriers(&ch).remove(0);
    let mut store = ch.into_store();
    let t = store.get_times(&head).unwrap();
    store
        .set_access_modified_times(&head, t.accessed, t.modified.with_nanosecond(0).unwrap())
        .unwrap();

    let ch = CovertChannel::new(store).unwrap();
    assert!(matches!(
        ch.extract(dir),
        Err(Error::Uncorrectable { .. }) | Err(Error::MalformedFrame(_))
    ));
}

#[test]
fn test_heavy_corruption_is_reported() {
    let dir = Path::new(DIR);
    let mut ch = channel(60);
    ch.hide(dir, b"short message", "txt", &mut rng(11)).unwrap();

    let data = data_carriers(&ch);
    let mut store = ch.into_store();
    for (i, path) in data.iter().enumerate() {
        let t = store.get_times(path).unwrap();
        let garbage = ((i as u32 * 7_654_321) % 10_000_000) * 100;
        store
            .set_access_modified_times(path, t.accessed, t.modified.with_nanosecond(garbage).unwrap())
            .unwrap();
    }

    let ch = CovertChannel::new(store).unwrap();
    assert!(matches!(
        ch.extract(dir),
        Err(Error::Uncorrectable { .. }) | Err(Error::MalformedFrame(_))
    ));
}

#[test]
fn test_untouched_directory_has_no_payload() {
    let ch = channel(60);
    assert!(matches!(ch.extract(Path::new(DIR)), Err(Error::NoPayloadFound)));

    let scan = ch.scan(Path::new(DIR)).unwrap();
    assert_eq!(scan.index_records, 0);
    assert!(!scan.payload_present());
}

#[test]
fn test_scan_after_hide() {
    let dir = Path::new(DIR);
    let mut ch = channel(90);
    let report = ch.hide(dir, b"scan me", "txt", &mut rng(12)).unwrap();

    let scan = ch.scan(dir).unwrap();
    assert_eq!(scan.total_scanned, 90);
    assert_eq!(scan.index_records, 1);
    assert_eq!(scan.data_records, report.data_chunks);
    assert_eq!(scan.sentinel_carriers, 90 - report.records_written);
    assert_eq!(scan.reserved_carriers, 0);
    assert_eq!(scan.declared_chunks, Some(report.data_chunks));
    assert!(scan.payload_present());
    assert!(scan.summary().contains("present"));

    let json = serde_json::to_value(&scan).unwrap();
    assert_eq!(json["index_records"], 1);
}

#[test]
fn test_hide_file_and_extract_to() {
    let tmp = tempdir().unwrap();
    let input = tmp.path().join("secret.tar.gz");
    let data: Vec<u8> = (0..700u32).map(|i| (i % 200) as u8 + 3).collect();
    std::fs::write(&input, &data).unwrap();

    let dir = Path::new(DIR);
    let mut ch = channel(400);
    let report = ch.hide_file(dir, &input, &mut rng(13)).unwrap();
    assert!(report.records_written <= 400);

    let extracted = ch.extract_to(dir, &tmp.path().join("recovered")).unwrap();
    assert_eq!(extracted.output, tmp.path().join("recovered.gz"));
    assert_eq!(extracted.extension, "gz");
    assert_eq!(std::fs::read(&extracted.output).unwrap(), data);
}

#[test]
fn test_standard_layout_capacity_stats() {
    let l = Layout::STANDARD;
    assert_eq!(l.bytes_per_carrier(), 5);
    assert_eq!(l.max_window_index(), 9_998);
    assert_eq!(l.max_framed_bytes(), 49_990);
}

// ── FsStore ──────────────────────────────────────────────────────────────────

#[test]
fn test_fs_store_lists_regular_files_only() {
    let tmp = tempdir().unwrap();
    for name in ["a.txt", "b.bin", "c.log"] {
        std::fs::write(tmp.path().join(name), name).unwrap();
    }
    std::fs::create_dir(tmp.path().join("nested")).unwrap();
    std::fs::write(tmp.path().join("nested").join("d.txt"), b"d").unwrap();

    let listed = FsStore::new().list_regular_files(tmp.path()).unwrap();
    let mut names: Vec<String> = listed
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, ["a.txt", "b.bin", "c.log"]);
}

#[test]
fn test_fs_store_sets_access_and_modified_times() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("carrier.dat");
    std::fs::write(&path, b"contents stay the same").unwrap();

    let accessed = base() + chrono::Duration::nanoseconds(123_456_700);
    let modified = base() + chrono::Duration::nanoseconds(765_432_100);
    FsStore::new().set_access_modified_times(&path, accessed, modified).unwrap();

    let meta = std::fs::metadata(&path).unwrap();
    assert_eq!(DateTime::<Utc>::from(meta.modified().unwrap()), modified);
    assert_eq!(DateTime::<Utc>::from(meta.accessed().unwrap()), accessed);
    assert_eq!(std::fs::read(&path).unwrap(), b"contents stay the same");
}

#[cfg(not(any(windows, target_os = "macos")))]
#[test]
fn test_fs_store_reports_unsupported_creation_time() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("carrier.dat");
    std::fs::write(&path, b"x").unwrap();
    assert!(matches!(
        FsStore::new().set_creation_time(&path, base()),
        Err(Error::Unsupported(_))
    ));
}

#[cfg(any(windows, target_os = "macos"))]
#[test]
fn test_fs_roundtrip() {
    let tmp = tempdir().unwrap();
    for i in 0..40 {
        std::fs::write(tmp.path().join(format!("file_{i:02}.txt")), format!("carrier {i}")).unwrap();
    }

    let mut ch = CovertChannel::new(FsStore::new()).unwrap();
    let payload = b"hidden on a real filesystem";
    ch.hide(tmp.path(), payload, "txt", &mut rng(14)).unwrap();

    let recovered = ch.extract(tmp.path()).unwrap();
    assert_eq!(recovered.payload, payload);
    assert_eq!(recovered.extension, "txt");
    for i in 0..40 {
        let body = std::fs::read_to_string(tmp.path().join(format!("file_{i:02}.txt"))).unwrap();
        assert_eq!(body, format!("carrier {i}"));
    }
}
