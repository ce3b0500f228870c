use crate::header::{Channel, VmuHeader};
use crate::image::{IdhV1, IdhV2, Image, ImageHeader};
use crate::science::{ScienceHeader, SdhV1, SdhV2, Table};
use crate::{
    DecodeError, CHECKSUM_LEN, IDH_V1_LEN, IDH_V2_LEN, SDH_V1_LEN, SDH_V2_LEN, VMU_HEADER_LEN, VMU_PROTOCOL_1,
    VMU_PROTOCOL_2,
};
use chrono::{DateTime, Utc};

/// A decoded VMU product of either family.
#[derive(Debug, Clone, PartialEq)]
pub enum Product {
    Image(Image),
    Table(Table),
}

impl Product {
    pub fn vmu(&self) -> &VmuHeader {
        match self {
            Product::Image(p) => &p.vmu,
            Product::Table(p) => &p.vmu,
        }
    }

    pub fn stream(&self) -> Channel {
        self.vmu().channel
    }

    pub fn filename(&self) -> String {
        match self {
            Product::Image(p) => p.filename(),
            Product::Table(p) => p.filename(),
        }
    }

    pub fn format(&self) -> &'static str {
        match self {
            Product::Image(p) => p.format(),
            Product::Table(p) => p.format(),
        }
    }

    pub fn fourcc(&self) -> u32 {
        match self {
            Product::Image(p) => p.fourcc(),
            Product::Table(p) => p.fourcc(),
        }
    }

    pub fn sequence(&self) -> u32 {
        match self {
            Product::Image(p) => p.sequence(),
            Product::Table(p) => p.sequence(),
        }
    }

    pub fn origin_id(&self) -> u8 {
        match self {
            Product::Image(p) => p.origin_id(),
            Product::Table(p) => p.origin_id(),
        }
    }

    /// Origin as the two-digit hex label used in archive paths.
    pub fn origin(&self) -> String {
        format!("{:02x}", self.origin_id())
    }

    pub fn is_realtime(&self) -> bool {
        match self {
            Product::Image(p) => p.is_realtime(),
            Product::Table(p) => p.is_realtime(),
        }
    }

    pub fn version(&self) -> u8 {
        match self {
            Product::Image(p) => p.version(),
            Product::Table(p) => p.version(),
        }
    }

    /// Generation time from the sub-header.
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Product::Image(p) => p.timestamp(),
            Product::Table(p) => p.timestamp(),
        }
    }

    /// Acquisition time from the common header.
    pub fn generated(&self) -> DateTime<Utc> {
        match self {
            Product::Image(p) => p.generated(),
            Product::Table(p) => p.generated(),
        }
    }

    pub fn upi(&self) -> Option<String> {
        match self {
            Product::Image(p) => p.upi(),
            Product::Table(p) => p.upi(),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Product::Image(p) => p.to_bytes(),
            Product::Table(p) => p.to_bytes(),
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Product::Image(p) => p.payload(),
            Product::Table(p) => p.payload(),
        }
    }

    pub fn sum(&self) -> u32 {
        match self {
            Product::Image(p) => p.sum,
            Product::Table(p) => p.sum,
        }
    }

    pub fn valid(&self) -> bool {
        match self {
            Product::Image(p) => p.valid(),
            Product::Table(p) => p.valid(),
        }
    }
}

/// Unsigned-byte running sum, the integrity check trailing every product.
pub fn checksum(bs: &[u8]) -> u32 {
    bs.iter().fold(0u32, |acc, &b| acc.wrapping_add(b as u32))
}

/// Decodes a reassembled packet body into a product, dispatching on the VMU
/// protocol generation announced by the link prefix.
pub fn decode(version: u8, payload: &[u8]) -> Result<Product, DecodeError> {
    match version {
        VMU_PROTOCOL_1 => decode_v1(payload),
        VMU_PROTOCOL_2 => decode_v2(payload),
        other => Err(DecodeError::UnsupportedVersion(other)),
    }
}

fn decode_v1(bs: &[u8]) -> Result<Product, DecodeError> {
    if bs.len() < VMU_HEADER_LEN {
        return Err(DecodeError::Truncated("vmu header"));
    }
    let vmu = VmuHeader::decode(&bs[..VMU_HEADER_LEN])?;
    let mut ix = VMU_HEADER_LEN;
    match vmu.channel {
        Channel::Video1 | Channel::Video2 => {
            let idh = sub_header(bs, ix, IDH_V1_LEN, "image sub-header", IdhV1::decode)?;
            ix += IDH_V1_LEN;
            let (data, sum) = split_body(bs, ix)?;
            Ok(Product::Image(Image { vmu, idh: ImageHeader::V1(idh), data, sum }))
        }
        Channel::Science => {
            let sdh = sub_header(bs, ix, SDH_V1_LEN, "science sub-header", SdhV1::decode)?;
            ix += SDH_V1_LEN;
            let (data, sum) = split_body(bs, ix)?;
            Ok(Product::Table(Table { vmu, sdh: ScienceHeader::V1(sdh), data, sum }))
        }
    }
}

fn decode_v2(bs: &[u8]) -> Result<Product, DecodeError> {
    if bs.len() <= VMU_HEADER_LEN + IDH_V2_LEN {
        return Err(DecodeError::TooShort {
            len: bs.len(),
            sciences: VMU_HEADER_LEN + SDH_V2_LEN,
            images: VMU_HEADER_LEN + IDH_V2_LEN,
        });
    }
    let vmu = VmuHeader::decode(&bs[..VMU_HEADER_LEN])?;
    let mut ix = VMU_HEADER_LEN;
    match vmu.channel {
        Channel::Video1 | Channel::Video2 => {
            let idh = sub_header(bs, ix, IDH_V2_LEN, "image sub-header", IdhV2::decode)?;
            ix += IDH_V2_LEN;
            let (data, sum) = split_body(bs, ix)?;
            Ok(Product::Image(Image { vmu, idh: ImageHeader::V2(idh), data, sum }))
        }
        Channel::Science => {
            let sdh = sub_header(bs, ix, SDH_V2_LEN, "science sub-header", SdhV2::decode)?;
            ix += SDH_V2_LEN;
            let (data, sum) = split_body(bs, ix)?;
            Ok(Product::Table(Table { vmu, sdh: ScienceHeader::V2(sdh), data, sum }))
        }
    }
}

fn sub_header<T>(
    bs: &[u8],
    ix: usize,
    len: usize,
    label: &'static str,
    parse: impl FnOnce(&[u8]) -> Result<T, DecodeError>,
) -> Result<T, DecodeError> {
    if bs.len() < ix + len {
        return Err(DecodeError::Truncated(label));
    }
    parse(&bs[ix..ix + len])
}

/// Splits the remainder after the sub-header into payload and trailing
/// little-endian checksum.
fn split_body(bs: &[u8], ix: usize) -> Result<(Vec<u8>, u32), DecodeError> {
    if bs.len() < ix + CHECKSUM_LEN {
        return Err(DecodeError::Truncated("checksum"));
    }
    let data = bs[ix..bs.len() - CHECKSUM_LEN].to_vec();
    let sum = u32::from_le_bytes(bs[bs.len() - CHECKSUM_LEN..].try_into().expect("checksum width"));
    Ok((data, sum))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_sum() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[1, 2, 3]), 6);
        assert_eq!(checksum(&[0xFF; 4]), 0x3FC);
    }

    #[test]
    fn v2_length_gate() {
        let bs = vec![0u8; VMU_HEADER_LEN + IDH_V2_LEN];
        match decode(VMU_PROTOCOL_2, &bs) {
            Err(DecodeError::TooShort { len, sciences, images }) => {
                assert_eq!(len, 92);
                assert_eq!(sciences, 72);
                assert_eq!(images, 92);
            }
            other => panic!("expected length gate, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(matches!(decode(7, &[0u8; 256]), Err(DecodeError::UnsupportedVersion(7))));
    }

    #[test]
    fn unknown_channel_is_rejected() {
        let mut bs = vec![0u8; 256];
        bs[0] = 9;
        assert!(matches!(decode(VMU_PROTOCOL_2, &bs), Err(DecodeError::UnknownChannel(9))));
    }
}
