use chrono::{TimeZone, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::time::sleep;
use vmu_archive::{HrdpStore, Storage};
use vmu_product::fixtures::{self, ImageParams, TableParams};
use vmu_product::Product;
use vmud::config::{Config, Mode, PoolConfig, StoreConfig, StoreKind};
use vmud::replay::{self, ReplayOptions};
use vmud::{Daemon, IngestMetrics};

fn archived_files(dir: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    if dir.is_dir() {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                out.extend(archived_files(&path));
            } else {
                out.push(path);
            }
        }
    }
    out.sort();
    out
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn replayed_capture_lands_in_the_archive() {
    // seed a capture tree the way the HRDP sink writes it
    let capture = tempdir().unwrap();
    let at = Utc.with_ymd_and_hms(2018, 7, 14, 10, 5, 0).unwrap();
    let table = fixtures::table_v2(TableParams { acquisition: at, ..TableParams::default() });
    let image = fixtures::image_v2(ImageParams { acquisition: at, ..ImageParams::default() });
    {
        let mut store = HrdpStore::new(capture.path().to_path_buf(), 2).unwrap();
        store.store(255, &Product::Table(table.clone())).unwrap();
        store.store(255, &Product::Image(image.clone())).unwrap();
        store.flush().unwrap();
    }

    let archive = tempdir().unwrap();
    let config = Config {
        address: "127.0.0.1:0".to_string(),
        mode: Mode::Binary,
        proxy: None,
        instances: Vec::new(),
        age: 0,
        stores: vec![StoreConfig {
            disabled: false,
            kind: StoreKind::File,
            location: archive.path().to_string_lossy().into_owned(),
            mirror: None,
            raw: false,
            interval: 0,
        }],
        pool: PoolConfig::default(),
        modules: Vec::new(),
    };
    let daemon = Daemon::start(config, Arc::new(IngestMetrics::new())).await.expect("daemon starts");

    let addr = daemon.local_addr().to_string();
    let capture_dir = capture.path().to_path_buf();
    let options = ReplayOptions { rate: 100, chunk: 64, ..ReplayOptions::default() };
    let sent = tokio::task::spawn_blocking(move || replay::run(&addr, &capture_dir, options))
        .await
        .expect("replay task")
        .expect("replay runs");
    assert_eq!(sent, 2);

    // table, image, image sidecar
    let mut files = Vec::new();
    for _ in 0..100 {
        files = archived_files(archive.path());
        if files.len() >= 3 {
            break;
        }
        sleep(Duration::from_millis(50)).await;
    }
    let names: Vec<String> = files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
    assert!(names.contains(&table.filename()), "{names:?}");
    assert!(names.contains(&image.filename()), "{names:?}");

    daemon.shutdown();
}
