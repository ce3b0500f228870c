use crate::path::hrdp_dir;
use crate::{Storage, StorageError};
use chrono::{DateTime, Timelike, Utc};
use log::debug;
use std::fs;
use std::path::PathBuf;
use vmu_framing::PREAMBLE;
use vmu_product::Product;

/// Wrapper header bytes following the record length field.
pub const HRDP_HEADER_LEN: usize = 14;
/// Sync word plus payload length.
pub const HRDP_SYNC_LEN: usize = 8;

const WINDOW_SECS: i64 = 300;

/// Capture-file sink. Products are wrapped into fixed-layout records and
/// accumulated in memory; the buffer is written out as one `rt_MM_MM.dat`
/// file whenever the generation time enters a new 5-minute window, and the
/// open window is drained by [`Storage::flush`] on shutdown.
pub struct HrdpStore {
    datadir: PathBuf,
    payload_id: u8,
    buf: Vec<u8>,
    window: Option<DateTime<Utc>>,
    instance: u8,
}

impl HrdpStore {
    pub fn new(datadir: PathBuf, payload_id: u8) -> Result<Self, StorageError> {
        fs::create_dir_all(&datadir)?;
        if !datadir.is_dir() {
            return Err(StorageError::NotADirectory(datadir));
        }
        Ok(Self { datadir, payload_id, buf: Vec::new(), window: None, instance: 0 })
    }

    fn append_record(&mut self, product: &Product, generated: DateTime<Utc>) {
        let bs = product.to_bytes();
        let total = (HRDP_HEADER_LEN + HRDP_SYNC_LEN + bs.len()) as u32;
        let now = Utc::now();

        self.buf.extend_from_slice(&total.to_le_bytes());
        self.buf.extend_from_slice(&0u16.to_le_bytes());
        self.buf.push(self.payload_id);
        self.buf.push(product.origin_id());
        self.buf.extend_from_slice(&(generated.timestamp() as u32).to_le_bytes());
        self.buf.push(0);
        self.buf.extend_from_slice(&(now.timestamp() as u32).to_le_bytes());
        self.buf.push(0);
        self.buf.extend_from_slice(&PREAMBLE.to_be_bytes());
        self.buf.extend_from_slice(&(bs.len() as u32).to_be_bytes());
        self.buf.extend_from_slice(&bs);
    }

    fn write_out(&mut self, window: DateTime<Utc>, name: String) -> Result<(), StorageError> {
        let dir = hrdp_dir(&self.datadir, window, self.instance);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(&name), &self.buf)?;
        debug!("hrdp window flushed to {name} ({} bytes)", self.buf.len());
        self.buf.clear();
        Ok(())
    }
}

fn truncate_window(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    DateTime::from_timestamp(secs - secs.rem_euclid(WINDOW_SECS), 0).expect("window in range")
}

impl Storage for HrdpStore {
    fn store(&mut self, instance: u8, product: &Product) -> Result<(), StorageError> {
        let generated = product.generated();
        let window = truncate_window(generated);
        if self.window != Some(window) {
            if self.window.is_some() && !self.buf.is_empty() {
                let minute = window.minute() as i32;
                self.write_out(window, format!("rt_{:02}_{:02}.dat", minute - 5, minute - 1))?;
            }
            self.window = Some(window);
        }
        self.instance = instance;
        self.append_record(product, generated);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StorageError> {
        if let Some(window) = self.window.take() {
            if !self.buf.is_empty() {
                let minute = window.minute();
                self.write_out(window, format!("rt_{:02}_{:02}.dat", minute, minute + 4))?;
            }
        }
        Ok(())
    }
}
