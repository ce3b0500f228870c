use crate::reader::ByteReader;
use crate::time::vmu_time;
use crate::DecodeError;
use chrono::{DateTime, Utc};

/// Product stream carried by the VMU common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Video1 = 1,
    Video2 = 2,
    Science = 3,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Video1 => "vic1",
            Channel::Video2 => "vic2",
            Channel::Science => "lrsd",
        }
    }

    pub fn is_video(self) -> bool {
        matches!(self, Channel::Video1 | Channel::Video2)
    }
}

impl TryFrom<u8> for Channel {
    type Error = DecodeError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Channel::Video1),
            2 => Ok(Channel::Video2),
            3 => Ok(Channel::Science),
            other => Err(DecodeError::UnknownChannel(other)),
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common header opening every VMU packet, 16 bytes little-endian with two
/// padding shorts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VmuHeader {
    pub channel: Channel,
    pub source: u8,
    pub sequence: u32,
    pub coarse: u32,
    pub fine: u16,
}

impl VmuHeader {
    pub fn decode(bs: &[u8]) -> Result<Self, DecodeError> {
        let mut r = ByteReader::new(bs);
        let channel = Channel::try_from(r.read_u8("vmu.channel")?)?;
        let source = r.read_u8("vmu.source")?;
        r.skip(2, "vmu.pad")?;
        let sequence = r.read_u32("vmu.sequence")?;
        let coarse = r.read_u32("vmu.coarse")?;
        let fine = r.read_u16("vmu.fine")?;
        r.skip(2, "vmu.pad")?;
        Ok(Self { channel, source, sequence, coarse, fine })
    }

    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.push(self.channel as u8);
        buf.push(self.source);
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.coarse.to_le_bytes());
        buf.extend_from_slice(&self.fine.to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
    }

    /// Acquisition instant of the packet on the VMU side.
    pub fn timestamp(&self) -> DateTime<Utc> {
        vmu_time(self.coarse, self.fine)
    }
}
