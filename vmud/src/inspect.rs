use crate::listen::DaemonError;
use chrono::SecondsFormat;
use log::{info, warn};
use std::path::Path;
use vmu_archive::ArchiveWalker;
use vmu_product::{decode, Channel, Product};

/// Selection applied while scanning an archive.
#[derive(Debug, Clone, Default)]
pub struct InspectFilter {
    /// Empty admits every channel.
    pub channels: Vec<Channel>,
    /// `realtime`, `playback`, or empty for both.
    pub source: String,
}

impl InspectFilter {
    fn accept(&self, product: &Product) -> bool {
        if !self.channels.is_empty() && !self.channels.contains(&product.stream()) {
            return false;
        }
        match self.source.as_str() {
            "realtime" => product.is_realtime(),
            "playback" => !product.is_realtime(),
            _ => true,
        }
    }
}

/// Walks an HRDP archive, decodes every record with the given protocol
/// generation and hands accepted products to the callback. Undecodable
/// records are reported and skipped.
pub fn scan<F>(archive: &Path, version: u8, filter: &InspectFilter, mut f: F) -> Result<u64, DaemonError>
where
    F: FnMut(&Product),
{
    let mut walker = ArchiveWalker::open(archive)?;
    let mut seen = 0u64;
    while let Some(record) = walker.next_record()? {
        match decode(version, &record.data) {
            Ok(product) => {
                if filter.accept(&product) {
                    seen += 1;
                    f(&product);
                }
            }
            Err(e) => warn!("undecodable record (origin {:02x}): {e}", record.origin),
        }
    }
    Ok(seen)
}

/// Prints one line per archived product.
pub fn run(archive: &Path, version: u8, filter: &InspectFilter) -> Result<(), DaemonError> {
    let shown = scan(archive, version, filter, |product| {
        info!(
            "{:3} | {} | {:4} | {:5} | {:6} | {} | {:7} | {:<36} | {}",
            product.version(),
            product.generated().to_rfc3339_opts(SecondsFormat::Millis, true),
            product.stream(),
            product.is_realtime(),
            product.sequence(),
            product.origin(),
            product.payload().len(),
            product.filename(),
            product.upi().unwrap_or_else(|| "-".to_string()),
        );
    })?;
    info!("inspect.event=done products={shown}");
    Ok(())
}

/// Parses the channel keywords accepted on the command line.
pub fn parse_channels(names: &[String]) -> Result<Vec<Channel>, DaemonError> {
    names
        .iter()
        .map(|name| match name.as_str() {
            "vic1" => Ok(Channel::Video1),
            "vic2" => Ok(Channel::Video2),
            "lrsd" => Ok(Channel::Science),
            other => Err(DaemonError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("unknown channel {other}"),
            ))),
        })
        .collect()
}
