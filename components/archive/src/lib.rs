pub mod capture;
pub mod file;
pub mod hrdp;
pub mod http;
pub mod path;

use log::warn;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use vmu_product::Product;

pub use capture::{ArchiveWalker, CaptureReader, CaptureRecord};
pub use file::FileStore;
pub use hrdp::HrdpStore;
pub use http::HttpStore;
pub use path::{hrdp_dir, instance_dir, product_dir};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}: not a directory")]
    NotADirectory(PathBuf),
    #[error("corrupt capture record: {0}")]
    Corrupt(&'static str),
    #[error("invalid storage url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An archival destination for decoded products. Sinks own their handles and
/// buffers exclusively; a call either completes or fails independently of
/// the other sinks.
pub trait Storage: Send {
    fn store(&mut self, instance: u8, product: &Product) -> Result<(), StorageError>;

    /// Drains any window the sink is still accumulating. Called on shutdown.
    fn flush(&mut self) -> Result<(), StorageError> {
        Ok(())
    }
}

/// Fan-out over every enabled sink. The first failure never short-circuits
/// later sinks; the reported status is the most recent failure.
pub struct Multistore {
    sinks: Vec<Box<dyn Storage>>,
}

impl Multistore {
    pub fn new(sinks: Vec<Box<dyn Storage>>) -> Self {
        Self { sinks }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Storage for Multistore {
    fn store(&mut self, instance: u8, product: &Product) -> Result<(), StorageError> {
        let mut last = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.store(instance, product) {
                warn!("store failed for {}: {e}", product.filename());
                last = Some(e);
            }
        }
        match last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        let mut last = None;
        for sink in &mut self.sinks {
            if let Err(e) = sink.flush() {
                last = Some(e);
            }
        }
        match last {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
