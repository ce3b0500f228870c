use crate::path::product_dir;
use crate::{Storage, StorageError};
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use vmu_product::export::encode_raw_record;
use vmu_product::{sidecar, Product};

/// Local filesystem sink. Products land in the canonical time-bucketed tree;
/// an optional mirror directory receives hard links under the alt path, and
/// every image gets an XML metadata sidecar.
pub struct FileStore {
    datadir: PathBuf,
    mirror: Option<PathBuf>,
    granularity: u32,
    raw: bool,
}

impl FileStore {
    pub fn new(datadir: PathBuf, mirror: Option<PathBuf>, granularity: u32, raw: bool) -> Result<Self, StorageError> {
        ensure_dir(&datadir)?;
        if let Some(mirror) = &mirror {
            ensure_dir(mirror)?;
        }
        Ok(Self { datadir, mirror, granularity, raw })
    }

    fn encode(&self, product: &Product) -> Result<Vec<u8>, StorageError> {
        let mut body = Vec::with_capacity(product.payload().len() + 32);
        if self.raw {
            encode_raw_record(&mut body, product)?;
        } else {
            product.export(&mut body)?;
        }
        Ok(body)
    }

    fn mirror_link(&self, instance: u8, product: &Product, source: &Path, name: &str) -> Result<(), StorageError> {
        if let Some(mirror) = &self.mirror {
            let hard = product_dir(mirror, product, instance, self.granularity, true);
            fs::create_dir_all(&hard)?;
            fs::hard_link(source, hard.join(name))?;
        }
        Ok(())
    }
}

impl Storage for FileStore {
    fn store(&mut self, instance: u8, product: &Product) -> Result<(), StorageError> {
        let body = self.encode(product)?;
        let dir = product_dir(&self.datadir, product, instance, self.granularity, false);
        fs::create_dir_all(&dir)?;
        let name = product.filename();
        let path = dir.join(&name);
        fs::write(&path, body)?;
        debug!("archived {}", path.display());
        self.mirror_link(instance, product, &path, &name)?;

        if let Product::Image(image) = product {
            let doc = sidecar::image_metadata(image);
            let xml_name = format!("{name}.xml");
            let xml_path = dir.join(&xml_name);
            fs::write(&xml_path, doc)?;
            self.mirror_link(instance, product, &xml_path, &xml_name)?;
        }
        Ok(())
    }
}

fn ensure_dir(dir: &Path) -> Result<(), StorageError> {
    fs::create_dir_all(dir)?;
    if !dir.is_dir() {
        return Err(StorageError::NotADirectory(dir.to_path_buf()));
    }
    Ok(())
}
