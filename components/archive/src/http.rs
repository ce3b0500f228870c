use crate::path::product_dir;
use crate::{Storage, StorageError};
use reqwest::blocking::Client;
use reqwest::Url;
use std::path::Path;
use std::time::Duration;
use vmu_product::Product;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Secondary archive over HTTP: the product's logical export is POSTed to
/// the time-bucketed path below the configured base URL.
pub struct HttpStore {
    base: Url,
    granularity: u32,
    client: Client,
}

impl HttpStore {
    pub fn new(location: &str, granularity: u32) -> Result<Self, StorageError> {
        let base = Url::parse(location)
            .map_err(|e| StorageError::InvalidUrl { url: location.to_string(), reason: e.to_string() })?;
        match base.scheme() {
            "http" | "https" => {}
            other => {
                return Err(StorageError::InvalidUrl {
                    url: location.to_string(),
                    reason: format!("unsupported scheme {other}"),
                })
            }
        }
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base, granularity, client })
    }
}

impl Storage for HttpStore {
    fn store(&mut self, instance: u8, product: &Product) -> Result<(), StorageError> {
        let dir = product_dir(Path::new(self.base.path()), product, instance, self.granularity, false);
        let mut url = self.base.clone();
        url.set_path(&dir.to_string_lossy());

        let mut body = Vec::with_capacity(product.payload().len());
        product.export(&mut body)?;
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()?;
        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(StorageError::HttpStatus(status.as_u16()));
        }
        Ok(())
    }
}
