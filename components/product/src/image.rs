use crate::header::VmuHeader;
use crate::reader::ByteReader;
use crate::time::{adjust_time, gps_time, vmu_time};
use crate::{fourcc, trim_upi, DecodeError, UPI_LEN};
use chrono::{DateTime, Utc};

/// First-generation image sub-header, 72 bytes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IdhV1 {
    pub sequence: u32,
    pub coarse: u32,
    pub fine: u16,
    pub part: u8,
    pub video: u8,
    pub kind: u8,
    pub rate: f32,
    pub pixels: u32,
    pub region: u64,
    pub line_drop: u8,
    pub frame_drop: u16,
    pub upi: [u8; UPI_LEN],
}

impl IdhV1 {
    pub fn decode(bs: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bs);
        let sequence = r.read_u32("idh1.sequence")?;
        let coarse = r.read_u32("idh1.coarse")?;
        let fine = r.read_u16("idh1.fine")?;
        let part = r.read_u8("idh1.part")?;
        let video = r.read_u8("idh1.video")?;
        let kind = r.read_u8("idh1.type")?;
        let rate = r.read_f32("idh1.rate")?;
        let pixels = r.read_u32("idh1.pixels")?;
        let region = r.read_u64("idh1.region")?;
        let line_drop = r.read_u8("idh1.line_drop")?;
        let frame_drop = r.read_u16("idh1.frame_drop")?;
        r.skip(8, "idh1.pad")?;
        let upi = r.read_array("idh1.upi")?;
        Ok(Self { sequence, coarse, fine, part, video, kind, rate, pixels, region, line_drop, frame_drop, upi })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.coarse.to_le_bytes());
        buf.extend_from_slice(&self.fine.to_le_bytes());
        buf.push(self.part);
        buf.push(self.video);
        buf.push(self.kind);
        buf.extend_from_slice(&self.rate.to_le_bytes());
        buf.extend_from_slice(&self.pixels.to_le_bytes());
        buf.extend_from_slice(&self.region.to_le_bytes());
        buf.push(self.line_drop);
        buf.extend_from_slice(&self.frame_drop.to_le_bytes());
        buf.extend_from_slice(&0u64.to_le_bytes());
        buf.extend_from_slice(&self.upi);
    }

    pub fn format(&self) -> &'static str {
        match self.kind {
            1 => "jpg",
            2 => "gray",
            3 => "ycbcr",
            4 => "rgb",
            5 => "tiff",
            _ => "raw",
        }
    }

    pub fn fourcc(&self) -> u32 {
        match self.kind {
            1 => fourcc::JPEG,
            2 => fourcc::Y800,
            3 => fourcc::YUY2,
            4 => fourcc::RGB,
            _ => fourcc::RAW,
        }
    }

    pub fn x(&self) -> u16 {
        self.pixels as u16
    }

    pub fn y(&self) -> u16 {
        (self.pixels >> 16) as u16
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        vmu_time(self.coarse, self.fine)
    }
}

/// Second-generation image sub-header, 76 bytes. Durations are GPS-epoch
/// relative nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdhV2 {
    pub properties: u8,
    pub sequence: u16,
    pub originator: u32,
    pub acquisition: i64,
    pub auxiliary: i64,
    pub id: u8,
    pub kind: u8,
    pub pixels: u32,
    pub region: u64,
    pub dropping: u16,
    pub scaling: u32,
    pub ratio: u8,
    pub upi: [u8; UPI_LEN],
}

impl IdhV2 {
    pub fn decode(bs: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bs);
        Ok(Self {
            properties: r.read_u8("idh2.properties")?,
            sequence: r.read_u16("idh2.sequence")?,
            originator: r.read_u32("idh2.originator")?,
            acquisition: r.read_i64("idh2.acquisition")?,
            auxiliary: r.read_i64("idh2.auxiliary")?,
            id: r.read_u8("idh2.id")?,
            kind: r.read_u8("idh2.type")?,
            pixels: r.read_u32("idh2.pixels")?,
            region: r.read_u64("idh2.region")?,
            dropping: r.read_u16("idh2.dropping")?,
            scaling: r.read_u32("idh2.scaling")?,
            ratio: r.read_u8("idh2.ratio")?,
            upi: r.read_array("idh2.upi")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.properties);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.originator.to_le_bytes());
        buf.extend_from_slice(&self.acquisition.to_le_bytes());
        buf.extend_from_slice(&self.auxiliary.to_le_bytes());
        buf.push(self.id);
        buf.push(self.kind);
        buf.extend_from_slice(&self.pixels.to_le_bytes());
        buf.extend_from_slice(&self.region.to_le_bytes());
        buf.extend_from_slice(&self.dropping.to_le_bytes());
        buf.extend_from_slice(&self.scaling.to_le_bytes());
        buf.push(self.ratio);
        buf.extend_from_slice(&self.upi);
    }

    pub fn format(&self) -> &'static str {
        match self.kind {
            1 => "gray",
            2 => "gray16be",
            3 => "gray16le",
            4 => "yuy2",
            5 => "i420",
            6 => "rgb",
            7 => "jpg",
            8 => "png",
            9 => "h264",
            _ => "raw",
        }
    }

    pub fn fourcc(&self) -> u32 {
        match self.kind {
            1 => fourcc::Y800,
            2 => fourcc::Y16B,
            3 => fourcc::Y16L,
            4 => fourcc::YUY2,
            5 => fourcc::I420,
            6 => fourcc::RGB,
            7 => fourcc::JPEG,
            8 => fourcc::PNG,
            9 => fourcc::H264,
            _ => fourcc::RAW,
        }
    }

    pub fn x(&self) -> u16 {
        self.pixels as u16
    }

    pub fn y(&self) -> u16 {
        (self.pixels >> 16) as u16
    }

    /// Generation time: GPS epoch plus the acquisition duration.
    pub fn timestamp(&self) -> DateTime<Utc> {
        gps_time(self.acquisition)
    }

    pub fn auxiliary_time(&self) -> DateTime<Utc> {
        gps_time(self.auxiliary)
    }
}

/// Image sub-header of either generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImageHeader {
    V1(IdhV1),
    V2(IdhV2),
}

impl ImageHeader {
    pub fn format(&self) -> &'static str {
        match self {
            ImageHeader::V1(v) => v.format(),
            ImageHeader::V2(v) => v.format(),
        }
    }

    pub fn fourcc(&self) -> u32 {
        match self {
            ImageHeader::V1(v) => v.fourcc(),
            ImageHeader::V2(v) => v.fourcc(),
        }
    }

    pub fn x(&self) -> u16 {
        match self {
            ImageHeader::V1(v) => v.x(),
            ImageHeader::V2(v) => v.x(),
        }
    }

    pub fn y(&self) -> u16 {
        match self {
            ImageHeader::V1(v) => v.y(),
            ImageHeader::V2(v) => v.y(),
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            ImageHeader::V1(v) => v.timestamp(),
            ImageHeader::V2(v) => v.timestamp(),
        }
    }

    fn upi_bytes(&self) -> &[u8; UPI_LEN] {
        match self {
            ImageHeader::V1(v) => &v.upi,
            ImageHeader::V2(v) => &v.upi,
        }
    }
}

/// A decoded image product: common header, sub-header of one generation,
/// payload and trailing checksum.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub vmu: VmuHeader,
    pub idh: ImageHeader,
    pub data: Vec<u8>,
    pub sum: u32,
}

impl Image {
    pub fn format(&self) -> &'static str {
        self.idh.format()
    }

    pub fn fourcc(&self) -> u32 {
        self.idh.fourcc()
    }

    pub fn sequence(&self) -> u32 {
        match &self.idh {
            ImageHeader::V1(v) => v.sequence,
            ImageHeader::V2(v) => v.originator,
        }
    }

    pub fn origin_id(&self) -> u8 {
        match &self.idh {
            ImageHeader::V1(v) => v.video,
            ImageHeader::V2(v) => v.id,
        }
    }

    pub fn is_realtime(&self) -> bool {
        match &self.idh {
            ImageHeader::V1(v) => self.vmu.source == v.video,
            ImageHeader::V2(v) => self.vmu.source == v.id,
        }
    }

    pub fn version(&self) -> u8 {
        match &self.idh {
            ImageHeader::V1(_) => crate::VMU_PROTOCOL_1,
            ImageHeader::V2(_) => crate::VMU_PROTOCOL_2,
        }
    }

    /// Generation time from the sub-header.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.idh.timestamp()
    }

    /// Acquisition time from the common header.
    pub fn generated(&self) -> DateTime<Utc> {
        self.vmu.timestamp()
    }

    pub fn upi(&self) -> Option<String> {
        trim_upi(self.idh.upi_bytes())
    }

    pub fn filename(&self) -> String {
        let (id, seq) = match &self.idh {
            ImageHeader::V1(v) => (v.video as u32, v.sequence),
            ImageHeader::V2(v) => (v.id as u32, v.originator),
        };
        let upi = self.upi().map(|s| s.replace(' ', "-")).unwrap_or_else(|| "IMG".to_string());
        let delta = adjust_time(self.vmu.timestamp()) - self.idh.timestamp();
        let mut ext = self.format().to_string();
        if !self.valid() {
            ext.push_str(".bad");
        }
        format!(
            "{:04x}_{}_{}_{:06}_{}_{:09}.{}",
            id,
            upi,
            self.vmu.channel as u8,
            seq,
            self.timestamp().format("%Y%m%d_%H%M%S"),
            delta.num_minutes(),
            ext
        )
    }

    /// Full packet bytes: common header, sub-header, payload, checksum.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(crate::VMU_HEADER_LEN + crate::IDH_V2_LEN + self.data.len() + 4);
        self.vmu.encode_into(&mut buf);
        match &self.idh {
            ImageHeader::V1(v) => v.encode_into(&mut buf),
            ImageHeader::V2(v) => v.encode_into(&mut buf),
        }
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.sum.to_le_bytes());
        buf
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Checksum law: the unsigned byte sum over everything but the trailing
    /// four bytes must equal the stored checksum.
    pub fn valid(&self) -> bool {
        let bs = self.to_bytes();
        crate::decode::checksum(&bs[..bs.len() - crate::CHECKSUM_LEN]) == self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IDH_V1_LEN, IDH_V2_LEN};

    #[test]
    fn v1_roundtrip_is_72_bytes() {
        let h = IdhV1 {
            sequence: 12,
            coarse: 34,
            fine: 56,
            part: 1,
            video: 2,
            kind: 1,
            rate: 25.0,
            pixels: 640 | 480 << 16,
            region: 0x1122_3344_5566_7788,
            line_drop: 3,
            frame_drop: 4,
            upi: [0u8; 32],
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        assert_eq!(buf.len(), IDH_V1_LEN);
        assert_eq!(IdhV1::decode(&buf).unwrap(), h);
    }

    #[test]
    fn v2_roundtrip_is_76_bytes() {
        let mut upi = [0u8; 32];
        upi[..4].copy_from_slice(b"TEST");
        let h = IdhV2 {
            properties: 0x21,
            sequence: 9,
            originator: 1000,
            acquisition: 1_213_962_000_000_000_000,
            auxiliary: 42,
            id: 0x90,
            kind: 7,
            pixels: 640 | 480 << 16,
            region: 0,
            dropping: 0,
            scaling: 0,
            ratio: 1,
            upi,
        };
        let mut buf = Vec::new();
        h.encode_into(&mut buf);
        assert_eq!(buf.len(), IDH_V2_LEN);
        assert_eq!(IdhV2::decode(&buf).unwrap(), h);
    }

    #[test]
    fn pixels_pack_x_low_y_high() {
        let h = IdhV2 {
            properties: 0,
            sequence: 0,
            originator: 0,
            acquisition: 0,
            auxiliary: 0,
            id: 0,
            kind: 7,
            pixels: 640 | 480 << 16,
            region: 0,
            dropping: 0,
            scaling: 0,
            ratio: 0,
            upi: [0u8; 32],
        };
        assert_eq!(h.x(), 640);
        assert_eq!(h.y(), 480);
    }

    #[test]
    fn formats_cover_both_generations() {
        let mut v1 = IdhV1 {
            sequence: 0,
            coarse: 0,
            fine: 0,
            part: 0,
            video: 0,
            kind: 1,
            rate: 0.0,
            pixels: 0,
            region: 0,
            line_drop: 0,
            frame_drop: 0,
            upi: [0u8; 32],
        };
        assert_eq!(v1.format(), "jpg");
        v1.kind = 99;
        assert_eq!(v1.format(), "raw");
        assert_eq!(v1.fourcc(), crate::fourcc::RAW);
    }
}
