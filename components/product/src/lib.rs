pub mod decode;
pub mod export;
pub mod fixtures;
pub mod fourcc;
pub mod header;
pub mod image;
pub mod reader;
pub mod science;
pub mod sidecar;
pub mod time;

use thiserror::Error;

pub use decode::{checksum, decode, Product};
pub use header::{Channel, VmuHeader};
pub use image::{IdhV1, IdhV2, Image, ImageHeader};
pub use science::{ScienceHeader, SdhV1, SdhV2, Table};

pub const VMU_HEADER_LEN: usize = 16;
pub const IDH_V1_LEN: usize = 72;
pub const IDH_V2_LEN: usize = 76;
pub const SDH_V1_LEN: usize = 8;
pub const SDH_V2_LEN: usize = 56;
pub const UPI_LEN: usize = 32;
pub const CHECKSUM_LEN: usize = 4;

/// VMU protocol generations carried in the link prefix.
pub const VMU_PROTOCOL_1: u8 = 1;
pub const VMU_PROTOCOL_2: u8 = 2;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("packet size too short: {len} (sciences: {sciences} bytes, images: {images} bytes)")]
    TooShort { len: usize, sciences: usize, images: usize },
    #[error("truncated packet while reading {0}")]
    Truncated(&'static str),
    #[error("unknown channel {0}")]
    UnknownChannel(u8),
    #[error("unsupported vmu protocol version: {0}")]
    UnsupportedVersion(u8),
}

/// Null-trimmed UPI string, or `None` when the label is all zeroes.
pub(crate) fn trim_upi(upi: &[u8; UPI_LEN]) -> Option<String> {
    let end = upi.iter().rposition(|&b| b != 0).map(|ix| ix + 1)?;
    let start = upi.iter().position(|&b| b != 0).unwrap_or(0);
    Some(String::from_utf8_lossy(&upi[start..end]).into_owned())
}
