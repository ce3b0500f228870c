//! Synthesized wire-true products for tests and tooling across the
//! workspace. Checksums are computed so fixtures validate by default.

use crate::decode::checksum;
use crate::header::{Channel, VmuHeader};
use crate::image::{IdhV1, IdhV2, Image, ImageHeader};
use crate::science::{unit, ScienceHeader, SdhV1, SdhV2, Table};
use crate::time::since_gps_epoch;
use crate::{CHECKSUM_LEN, UPI_LEN};
use chrono::{DateTime, TimeZone, Utc};

/// Default generation instant shared by the fixtures.
pub fn default_acquisition() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 7, 14, 10, 0, 0).unwrap()
}

/// Pads a label into the 32-byte UPI field.
pub fn upi(label: &str) -> [u8; UPI_LEN] {
    let mut out = [0u8; UPI_LEN];
    let bs = label.as_bytes();
    let n = bs.len().min(UPI_LEN);
    out[..n].copy_from_slice(&bs[..n]);
    out
}

#[derive(Debug, Clone)]
pub struct ImageParams {
    pub channel: Channel,
    pub source: u8,
    pub vmu_sequence: u32,
    pub id: u8,
    pub kind: u8,
    pub originator: u32,
    pub pixels: u32,
    pub upi: String,
    pub payload: Vec<u8>,
    pub acquisition: DateTime<Utc>,
}

impl Default for ImageParams {
    fn default() -> Self {
        Self {
            channel: Channel::Video1,
            source: unit::LCP,
            vmu_sequence: 42,
            id: unit::LCP,
            kind: 7,
            originator: 1000,
            pixels: 640 | 480 << 16,
            upi: "PAYLOAD RUN".to_string(),
            payload: b"\xFF\xD8\xFF\xE0fixture-jpeg\xFF\xD9".to_vec(),
            acquisition: default_acquisition(),
        }
    }
}

pub fn image_v2(params: ImageParams) -> Image {
    let vmu = VmuHeader {
        channel: params.channel,
        source: params.source,
        sequence: params.vmu_sequence,
        coarse: params.acquisition.timestamp() as u32,
        fine: 0,
    };
    let idh = IdhV2 {
        properties: 0x21,
        sequence: 7,
        originator: params.originator,
        acquisition: since_gps_epoch(params.acquisition),
        auxiliary: since_gps_epoch(params.acquisition),
        id: params.id,
        kind: params.kind,
        pixels: params.pixels,
        region: 0,
        dropping: 0,
        scaling: 0,
        ratio: 0,
        upi: upi(&params.upi),
    };
    seal_image(Image { vmu, idh: ImageHeader::V2(idh), data: params.payload, sum: 0 })
}

pub fn image_v1(params: ImageParams) -> Image {
    let coarse = params.acquisition.timestamp() as u32;
    let vmu = VmuHeader {
        channel: params.channel,
        source: params.source,
        sequence: params.vmu_sequence,
        coarse,
        fine: 0,
    };
    let idh = IdhV1 {
        sequence: params.originator,
        coarse,
        fine: 0,
        part: 0,
        video: params.source,
        kind: params.kind,
        rate: 25.0,
        pixels: params.pixels,
        region: 0,
        line_drop: 0,
        frame_drop: 0,
        upi: upi(&params.upi),
    };
    seal_image(Image { vmu, idh: ImageHeader::V1(idh), data: params.payload, sum: 0 })
}

#[derive(Debug, Clone)]
pub struct TableParams {
    pub source: u8,
    pub vmu_sequence: u32,
    pub id: u8,
    pub originator: u32,
    pub upi: String,
    pub payload: Vec<u8>,
    pub acquisition: DateTime<Utc>,
}

impl Default for TableParams {
    fn default() -> Self {
        Self {
            source: unit::LRSD,
            vmu_sequence: 42,
            id: unit::LRSD,
            originator: 2000,
            upi: "MMA SURVEY".to_string(),
            payload: vec![0u8; 64],
            acquisition: default_acquisition(),
        }
    }
}

pub fn table_v2(params: TableParams) -> Table {
    let vmu = VmuHeader {
        channel: Channel::Science,
        source: params.source,
        sequence: params.vmu_sequence,
        coarse: params.acquisition.timestamp() as u32,
        fine: 0,
    };
    let sdh = SdhV2 {
        properties: 0,
        sequence: 7,
        originator: params.originator,
        acquisition: since_gps_epoch(params.acquisition),
        auxiliary: since_gps_epoch(params.acquisition),
        id: params.id,
        upi: upi(&params.upi),
    };
    seal_table(Table { vmu, sdh: ScienceHeader::V2(sdh), data: params.payload, sum: 0 })
}

pub fn table_v1(params: TableParams) -> Table {
    let vmu = VmuHeader {
        channel: Channel::Science,
        source: params.source,
        sequence: params.vmu_sequence,
        coarse: params.acquisition.timestamp() as u32,
        fine: 0,
    };
    let sdh = SdhV1 { sequence: params.originator };
    seal_table(Table { vmu, sdh: ScienceHeader::V1(sdh), data: params.payload, sum: 0 })
}

/// Stamps the checksum so the product validates.
pub fn seal_image(mut image: Image) -> Image {
    let bs = image.to_bytes();
    image.sum = checksum(&bs[..bs.len() - CHECKSUM_LEN]);
    image
}

/// Stamps the checksum so the product validates.
pub fn seal_table(mut table: Table) -> Table {
    let bs = table.to_bytes();
    table.sum = checksum(&bs[..bs.len() - CHECKSUM_LEN]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_validate() {
        assert!(image_v2(ImageParams::default()).valid());
        assert!(image_v1(ImageParams::default()).valid());
        assert!(table_v2(TableParams::default()).valid());
        assert!(table_v1(TableParams::default()).valid());
    }
}
