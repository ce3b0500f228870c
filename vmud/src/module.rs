use chrono::{DateTime, Duration as ChronoDuration, Utc};
use log::warn;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use vmu_product::{Product, IDH_V2_LEN, SDH_V2_LEN, VMU_HEADER_LEN, VMU_PROTOCOL_2};

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("unknown module kind {0}")]
    Unknown(String),
    #[error("failed to parse module config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// An auxiliary processor run over every decoded product. Modules never
/// mutate the product and are frozen at startup.
pub trait Module: Send {
    fn process(&mut self, instance: u8, product: &Product) -> Result<(), ModuleError>;
}

/// Serial chain of modules. Every child runs for every product; the first
/// error is remembered and reported once the chain completes.
pub struct MultiModule {
    modules: Vec<Box<dyn Module>>,
}

impl MultiModule {
    pub fn new(modules: Vec<Box<dyn Module>>) -> Self {
        Self { modules }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Module for MultiModule {
    fn process(&mut self, instance: u8, product: &Product) -> Result<(), ModuleError> {
        let mut first = None;
        for module in &mut self.modules {
            if let Err(e) = module.process(instance, product) {
                if first.is_none() {
                    first = Some(e);
                } else {
                    warn!("module error: {e}");
                }
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Loader-neutral module factory: a kind plus an optional configuration
/// path.
pub fn new_module(kind: &str, config: Option<&Path>) -> Result<Box<dyn Module>, ModuleError> {
    match kind {
        "monitor" => Ok(Box::new(ActivityMonitor::create(config)?)),
        other => Err(ModuleError::Unknown(other.to_string())),
    }
}

#[derive(Debug, Deserialize)]
struct MonitorConfig {
    #[serde(default = "default_monitor_dir")]
    datadir: PathBuf,
    /// Window length in seconds.
    #[serde(default = "default_monitor_delta")]
    delta: u64,
}

fn default_monitor_dir() -> PathBuf {
    PathBuf::from("vmu-monitor")
}

fn default_monitor_delta() -> u64 {
    5
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self { datadir: default_monitor_dir(), delta: default_monitor_delta() }
    }
}

/// Activity monitor: aggregates second-generation traffic into windowed
/// count/size lines appended to a dated log file.
pub struct ActivityMonitor {
    datadir: PathBuf,
    delta: ChronoDuration,
    day: String,
    file: File,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    count: u64,
    size: u64,
}

impl ActivityMonitor {
    pub fn create(config: Option<&Path>) -> Result<Self, ModuleError> {
        let config = match config {
            Some(path) => toml::from_str(&std::fs::read_to_string(path)?)?,
            None => MonitorConfig::default(),
        };
        std::fs::create_dir_all(&config.datadir)?;
        let day = Utc::now().format("%Y%m%d").to_string();
        let file = open_log(&config.datadir, &day)?;
        Ok(Self {
            datadir: config.datadir,
            delta: ChronoDuration::seconds(config.delta as i64),
            day,
            file,
            first: None,
            last: None,
            count: 0,
            size: 0,
        })
    }

    fn rotate_if_needed(&mut self) -> Result<(), ModuleError> {
        let day = Utc::now().format("%Y%m%d").to_string();
        if day != self.day {
            self.file = open_log(&self.datadir, &day)?;
            self.day = day;
        }
        Ok(())
    }

    fn emit(&mut self, tag: &str) -> Result<(), ModuleError> {
        if let (Some(first), Some(last)) = (self.first, self.last) {
            writeln!(self.file, "{tag} | {} | {} | {} | {}", first.to_rfc3339(), last.to_rfc3339(), self.size, self.count)?;
        }
        self.size = 0;
        self.count = 0;
        self.first = self.last;
        Ok(())
    }
}

fn open_log(datadir: &Path, day: &str) -> Result<File, ModuleError> {
    let path = datadir.join(format!("{day}.log"));
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

impl Module for ActivityMonitor {
    fn process(&mut self, _instance: u8, product: &Product) -> Result<(), ModuleError> {
        if product.version() != VMU_PROTOCOL_2 {
            return Ok(());
        }
        self.rotate_if_needed()?;

        let ts = product.generated();
        self.last = Some(ts);
        if self.first.is_none() {
            self.first = Some(ts);
        }
        if let Some(first) = self.first {
            if ts - first > self.delta {
                self.emit("g")?;
            }
        }
        self.count += 1;
        self.size += (VMU_HEADER_LEN
            + match product {
                Product::Image(_) => IDH_V2_LEN,
                Product::Table(_) => SDH_V2_LEN,
            }) as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use vmu_product::fixtures::{self, TableParams};

    struct FailingModule;

    impl Module for FailingModule {
        fn process(&mut self, _instance: u8, _product: &Product) -> Result<(), ModuleError> {
            Err(ModuleError::Unknown("failing".to_string()))
        }
    }

    struct CountingModule(Arc<AtomicUsize>);

    impl Module for CountingModule {
        fn process(&mut self, _instance: u8, _product: &Product) -> Result<(), ModuleError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn chain_reports_first_error_but_runs_every_module() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut chain =
            MultiModule::new(vec![Box::new(FailingModule), Box::new(CountingModule(count.clone()))]);
        let product = Product::Table(fixtures::table_v2(TableParams::default()));
        let err = chain.process(0, &product).unwrap_err();
        assert!(matches!(err, ModuleError::Unknown(_)));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn factory_rejects_unknown_kinds() {
        assert!(matches!(new_module("csv-export", None), Err(ModuleError::Unknown(_))));
    }

    #[test]
    fn monitor_aggregates_windows() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("mon.toml");
        std::fs::write(&config, format!("datadir = {:?}\ndelta = 2\n", dir.path().join("logs"))).unwrap();
        let mut monitor = ActivityMonitor::create(Some(&config)).unwrap();

        let base = Utc.with_ymd_and_hms(2018, 7, 14, 10, 0, 0).unwrap();
        for offset in [0i64, 1, 5] {
            let table = fixtures::table_v2(TableParams {
                acquisition: base + ChronoDuration::seconds(offset),
                ..TableParams::default()
            });
            monitor.process(0, &Product::Table(table)).unwrap();
        }

        let day = Utc::now().format("%Y%m%d").to_string();
        let log = std::fs::read_to_string(dir.path().join("logs").join(format!("{day}.log"))).unwrap();
        assert!(log.starts_with("g | "), "window line emitted: {log}");
        assert!(log.trim_end().ends_with("| 144 | 2"), "two products, header bytes summed: {log}");
    }
}
