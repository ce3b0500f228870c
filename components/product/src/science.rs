use crate::header::VmuHeader;
use crate::reader::ByteReader;
use crate::time::{adjust_time, gps_time};
use crate::{fourcc, trim_upi, DecodeError, UPI_LEN};
use chrono::{DateTime, Utc};

/// Science payload originator units carried by the v2 sub-header id.
pub mod unit {
    pub const RUB: u8 = 0x36;
    pub const ALV1: u8 = 0x39;
    pub const ALV2: u8 = 0x40;
    pub const SMD: u8 = 0x41;
    pub const LRSD: u8 = 0x51;
    pub const LCP: u8 = 0x90;
}

/// First-generation science sub-header, 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdhV1 {
    pub sequence: u32,
}

impl SdhV1 {
    pub fn decode(bs: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bs);
        let sequence = r.read_u32("sdh1.sequence")?;
        r.skip(4, "sdh1.pad")?;
        Ok(Self { sequence })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
    }

    pub fn fourcc(&self) -> u32 {
        fourcc::MMA
    }
}

/// Second-generation science sub-header, 56 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SdhV2 {
    pub properties: u8,
    pub sequence: u16,
    pub originator: u32,
    pub acquisition: i64,
    pub auxiliary: i64,
    pub id: u8,
    pub upi: [u8; UPI_LEN],
}

impl SdhV2 {
    pub fn decode(bs: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bs);
        Ok(Self {
            properties: r.read_u8("sdh2.properties")?,
            sequence: r.read_u16("sdh2.sequence")?,
            originator: r.read_u32("sdh2.originator")?,
            acquisition: r.read_i64("sdh2.acquisition")?,
            auxiliary: r.read_i64("sdh2.auxiliary")?,
            id: r.read_u8("sdh2.id")?,
            upi: r.read_array("sdh2.upi")?,
        })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.properties);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.originator.to_le_bytes());
        buf.extend_from_slice(&self.acquisition.to_le_bytes());
        buf.extend_from_slice(&self.auxiliary.to_le_bytes());
        buf.push(self.id);
        buf.extend_from_slice(&self.upi);
    }

    /// File extension keyed by the originator unit.
    pub fn format(&self) -> &'static str {
        match self.id {
            unit::LRSD => "mma",
            unit::ALV1 | unit::ALV2 => "corr",
            unit::RUB | unit::SMD => "sync",
            unit::LCP => "svs",
            _ => "raw",
        }
    }

    pub fn fourcc(&self) -> u32 {
        match self.id {
            unit::LRSD => fourcc::MMA,
            unit::ALV1 | unit::ALV2 => fourcc::CORR,
            unit::RUB | unit::SMD => fourcc::SYNC,
            unit::LCP => fourcc::SVS,
            _ => fourcc::RAW,
        }
    }

    /// Generation time: GPS epoch plus the acquisition duration.
    pub fn timestamp(&self) -> DateTime<Utc> {
        gps_time(self.acquisition)
    }

    pub fn auxiliary_time(&self) -> DateTime<Utc> {
        gps_time(self.auxiliary)
    }
}

/// Science sub-header of either generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScienceHeader {
    V1(SdhV1),
    V2(SdhV2),
}

/// A decoded science table: common header, sub-header, payload, checksum.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub vmu: VmuHeader,
    pub sdh: ScienceHeader,
    pub data: Vec<u8>,
    pub sum: u32,
}

impl Table {
    pub fn format(&self) -> &'static str {
        match &self.sdh {
            ScienceHeader::V1(_) => "dat",
            ScienceHeader::V2(v) => v.format(),
        }
    }

    pub fn fourcc(&self) -> u32 {
        match &self.sdh {
            ScienceHeader::V1(v) => v.fourcc(),
            ScienceHeader::V2(v) => v.fourcc(),
        }
    }

    pub fn sequence(&self) -> u32 {
        match &self.sdh {
            ScienceHeader::V1(v) => v.sequence,
            ScienceHeader::V2(v) => v.originator,
        }
    }

    pub fn origin_id(&self) -> u8 {
        match &self.sdh {
            ScienceHeader::V1(_) => self.vmu.source,
            ScienceHeader::V2(v) => v.id,
        }
    }

    pub fn is_realtime(&self) -> bool {
        match &self.sdh {
            ScienceHeader::V1(_) => true,
            ScienceHeader::V2(v) => self.vmu.source == v.id,
        }
    }

    pub fn version(&self) -> u8 {
        match &self.sdh {
            ScienceHeader::V1(_) => crate::VMU_PROTOCOL_1,
            ScienceHeader::V2(_) => crate::VMU_PROTOCOL_2,
        }
    }

    /// Generation time: the sub-header's when it carries one, otherwise the
    /// common header acquisition time.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match &self.sdh {
            ScienceHeader::V1(_) => self.vmu.timestamp(),
            ScienceHeader::V2(v) => v.timestamp(),
        }
    }

    pub fn generated(&self) -> DateTime<Utc> {
        self.vmu.timestamp()
    }

    pub fn upi(&self) -> Option<String> {
        match &self.sdh {
            ScienceHeader::V1(_) => None,
            ScienceHeader::V2(v) => trim_upi(&v.upi),
        }
    }

    pub fn filename(&self) -> String {
        let (id, seq, offset) = match &self.sdh {
            ScienceHeader::V1(v) => (self.vmu.channel as u32, v.sequence, 0i64),
            ScienceHeader::V2(v) => {
                let delta = adjust_time(self.vmu.timestamp()) - v.timestamp();
                (v.id as u32, v.originator, delta.num_minutes())
            }
        };
        let upi = self.upi().map(|s| s.replace(' ', "-")).unwrap_or_else(|| "SCIENCE".to_string());
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
            offset,
            ext
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(crate::VMU_HEADER_LEN + crate::SDH_V2_LEN + self.data.len() + 4);
        self.vmu.encode_into(&mut buf);
        match &self.sdh {
            ScienceHeader::V1(v) => v.encode_into(&mut buf),
            ScienceHeader::V2(v) => v.encode_into(&mut buf),
        }
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(&self.sum.to_le_bytes());
        buf
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn valid(&self) -> bool {
        let bs = self.to_bytes();
        crate::decode::checksum(&bs[..bs.len() - crate::CHECKSUM_LEN]) == self.sum
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SDH_V1_LEN, SDH_V2_LEN};

    #[test]
    fn sdh_sizes() {
        let mut buf = Vec::new();
        SdhV1 { sequence: 9 }.encode_into(&mut buf);
        assert_eq!(buf.len(), SDH_V1_LEN);

        buf.clear();
        let v2 = SdhV2 {
            properties: 0,
            sequence: 1,
            originator: 2,
            acquisition: 3,
            auxiliary: 4,
            id: unit::LRSD,
            upi: [0u8; 32],
        };
        v2.encode_into(&mut buf);
        assert_eq!(buf.len(), SDH_V2_LEN);
        assert_eq!(SdhV2::decode(&buf).unwrap(), v2);
    }

    #[test]
    fn unit_to_fourcc() {
        let mut v2 = SdhV2 {
            properties: 0,
            sequence: 0,
            originator: 0,
            acquisition: 0,
            auxiliary: 0,
            id: unit::LRSD,
            upi: [0u8; 32],
        };
        assert_eq!(v2.fourcc(), fourcc::MMA);
        assert_eq!(v2.format(), "mma");
        v2.id = unit::ALV1;
        assert_eq!(v2.fourcc(), fourcc::CORR);
        v2.id = unit::ALV2;
        assert_eq!(v2.fourcc(), fourcc::CORR);
        v2.id = unit::SMD;
        assert_eq!(v2.fourcc(), fourcc::SYNC);
        v2.id = unit::RUB;
        assert_eq!(v2.fourcc(), fourcc::SYNC);
        v2.id = unit::LCP;
        assert_eq!(v2.fourcc(), fourcc::SVS);
        assert_eq!(v2.format(), "svs");
        v2.id = 0x01;
        assert_eq!(v2.fourcc(), fourcc::RAW);
        assert_eq!(v2.format(), "raw");
    }
}
