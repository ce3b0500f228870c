use chrono::{TimeZone, Utc};
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;
use vmu_archive::{product_dir, ArchiveWalker, FileStore, HrdpStore, Multistore, Storage, StorageError};
use vmu_product::fixtures::{self, ImageParams, TableParams};
use vmu_product::Product;

fn walk(dir: &std::path::Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if dir.is_dir() {
        for entry in fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(walk(&path));
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[test]
fn filestore_writes_product_sidecar_and_mirror() {
    let data = tempdir().unwrap();
    let mirror = tempdir().unwrap();
    let mut store =
        FileStore::new(data.path().to_path_buf(), Some(mirror.path().to_path_buf()), 0, false).unwrap();

    let image = fixtures::image_v2(ImageParams::default());
    let name = image.filename();
    let product = Product::Image(image.clone());
    store.store(255, &product).unwrap();

    let dir = product_dir(data.path(), &product, 255, 0, false);
    let body = fs::read(dir.join(&name)).unwrap();
    assert_eq!(body, image.data, "jpeg export is the payload unchanged");

    let xml = fs::read_to_string(dir.join(format!("{name}.xml"))).unwrap();
    assert!(xml.starts_with("<metadata mark=\"2\""));

    let mirrored = walk(mirror.path());
    let names: Vec<String> =
        mirrored.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert!(names.contains(&name), "{names:?}");
    assert!(names.contains(&format!("{name}.xml")), "{names:?}");
}

#[test]
fn filestore_raw_flag_wraps_records() {
    let data = tempdir().unwrap();
    let mut store = FileStore::new(data.path().to_path_buf(), None, 0, true).unwrap();
    let table = fixtures::table_v2(TableParams::default());
    let product = Product::Table(table.clone());
    store.store(0, &product).unwrap();

    let files = walk(data.path());
    assert_eq!(files.len(), 1);
    let body = fs::read(&files[0]).unwrap();
    // fourcc + sequence + acquisition, then payload
    assert_eq!(&body[..4], b"MMA ");
    assert_eq!(u32::from_be_bytes(body[4..8].try_into().unwrap()), 2000);
    assert_eq!(&body[16..], &table.data[..]);
}

struct FailingSink;

impl Storage for FailingSink {
    fn store(&mut self, _instance: u8, _product: &Product) -> Result<(), StorageError> {
        Err(StorageError::HttpStatus(503))
    }
}

struct CountingSink(std::sync::Arc<std::sync::atomic::AtomicUsize>);

impl Storage for CountingSink {
    fn store(&mut self, _instance: u8, _product: &Product) -> Result<(), StorageError> {
        self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn multistore_attempts_every_sink_and_keeps_last_failure() {
    let count = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
    let mut multi = Multistore::new(vec![
        Box::new(FailingSink),
        Box::new(CountingSink(count.clone())),
    ]);
    let product = Product::Table(fixtures::table_v2(TableParams::default()));

    let err = multi.store(0, &product).unwrap_err();
    assert!(matches!(err, StorageError::HttpStatus(503)));
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 1, "later sinks still ran");

    // failing sink last: its error is the reported status
    let mut multi = Multistore::new(vec![
        Box::new(CountingSink(count.clone())),
        Box::new(FailingSink),
    ]);
    assert!(multi.store(0, &product).is_err());
    assert_eq!(count.load(std::sync::atomic::Ordering::SeqCst), 2);
}

fn table_at(h: u32, m: u32, s: u32) -> Product {
    Product::Table(fixtures::table_v2(TableParams {
        acquisition: Utc.with_ymd_and_hms(2018, 7, 14, h, m, s).unwrap(),
        ..TableParams::default()
    }))
}

#[test]
fn hrdp_flushes_on_window_crossings() {
    let data = tempdir().unwrap();
    let mut store = HrdpStore::new(data.path().to_path_buf(), 2).unwrap();

    // two products inside the 10:05 window accumulate silently
    store.store(255, &table_at(10, 5, 0)).unwrap();
    store.store(255, &table_at(10, 7, 12)).unwrap();
    assert!(walk(data.path()).is_empty(), "no flush inside one window");

    // the first product of the 10:10 window drains the previous one
    store.store(255, &table_at(10, 10, 2)).unwrap();
    let files = walk(data.path());
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_name().unwrap(), "rt_05_09.dat");

    let body = fs::read(&files[0]).unwrap();
    let record = fs_record_len(&body);
    assert_eq!(body.len(), record * 2, "both accumulated products flushed");

    // shutdown drains the open window under its own name
    store.flush().unwrap();
    let files = walk(data.path());
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|f| f.file_name().unwrap() == "rt_10_14.dat"), "{files:?}");
}

/// Record length from the leading little-endian length field, which counts
/// everything after itself.
fn fs_record_len(body: &[u8]) -> usize {
    u32::from_le_bytes(body[..4].try_into().unwrap()) as usize + 4
}

#[test]
fn capture_walker_recovers_flushed_records() {
    let data = tempdir().unwrap();
    let mut store = HrdpStore::new(data.path().to_path_buf(), 2).unwrap();
    let first = fixtures::table_v2(TableParams {
        acquisition: Utc.with_ymd_and_hms(2018, 7, 14, 10, 5, 0).unwrap(),
        originator: 100,
        ..TableParams::default()
    });
    let second = fixtures::table_v2(TableParams {
        acquisition: Utc.with_ymd_and_hms(2018, 7, 14, 10, 6, 0).unwrap(),
        originator: 101,
        ..TableParams::default()
    });
    store.store(255, &Product::Table(first.clone())).unwrap();
    store.store(255, &Product::Table(second.clone())).unwrap();
    store.flush().unwrap();

    let mut walker = ArchiveWalker::open(data.path()).unwrap();
    let a = walker.next_record().unwrap().expect("first record");
    assert_eq!(a.payload_id, 2);
    assert_eq!(a.origin, 0x51);
    assert_eq!(a.generated.timestamp(), first.generated().timestamp());
    assert_eq!(a.data, first.to_bytes());

    let b = walker.next_record().unwrap().expect("second record");
    assert_eq!(b.data, second.to_bytes());
    assert!(walker.next_record().unwrap().is_none());
}

#[test]
fn capture_walker_skips_corrupt_files() {
    let data = tempdir().unwrap();
    fs::write(data.path().join("aa_garbage.dat"), b"\xFF\xFF\xFF\xFF not a record").unwrap();

    let mut store = HrdpStore::new(data.path().to_path_buf(), 2).unwrap();
    store
        .store(0, &Product::Table(fixtures::table_v2(TableParams::default())))
        .unwrap();
    store.flush().unwrap();

    let mut walker = ArchiveWalker::open(data.path()).unwrap();
    let record = walker.next_record().unwrap().expect("good record survives");
    assert_eq!(record.origin, 0x51);
    assert!(walker.next_record().unwrap().is_none());
}

#[test]
fn hrdp_record_layout() {
    let data = tempdir().unwrap();
    let mut store = HrdpStore::new(data.path().to_path_buf(), 2).unwrap();
    let table = fixtures::table_v2(TableParams {
        acquisition: Utc.with_ymd_and_hms(2018, 7, 14, 10, 5, 0).unwrap(),
        ..TableParams::default()
    });
    let product = Product::Table(table.clone());
    store.store(255, &product).unwrap();
    store.store(255, &table_at(10, 10, 0)).unwrap();

    let files = walk(data.path());
    let body = fs::read(&files[0]).unwrap();
    let bs = table.to_bytes();
    assert_eq!(u32::from_le_bytes(body[..4].try_into().unwrap()) as usize, 14 + 8 + bs.len());
    assert_eq!(body[6], 2, "payload id");
    assert_eq!(body[7], 0x51, "origin");
    let gen = u32::from_le_bytes(body[8..12].try_into().unwrap());
    assert_eq!(gen as i64, product.generated().timestamp());
    assert_eq!(&body[18..22], &0xF82E_3553u32.to_be_bytes());
    assert_eq!(u32::from_be_bytes(body[22..26].try_into().unwrap()) as usize, bs.len());
    assert_eq!(&body[26..26 + bs.len()], &bs[..]);
}
