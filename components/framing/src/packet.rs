use bytes::Bytes;

/// Sync word opening every frame on the acquisition link.
pub const PREAMBLE: u32 = 0xF82E_3553;

/// Single-shot framing, one body per frame.
pub const PROTO_V1: u8 = 0;
/// Fragmented framing, bodies carry (curr, last) fragment counters.
pub const PROTO_V2: u8 = 1;

/// Preamble plus prefix, in bytes.
pub const PACKET_PREFIX_LEN: usize = 6;

/// A raw link-layer packet, reassembled when the framing was fragmented.
///
/// `version` is the VMU protocol generation carried in the prefix nibble; it
/// selects the product decoder downstream and is not interpreted here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub protocol: u8,
    pub version: u8,
    pub instance: u8,
    pub sequence: u16,
    pub length: u32,
    pub payload: Bytes,
    pub sum: u16,
    pub curr: u16,
    pub last: u16,
}

impl Packet {
    pub fn prefix(&self) -> u16 {
        (self.protocol as u16) << 12 | (self.version as u16) << 8 | self.instance as u16
    }
}

/// Encodes a v1 packet to its wire form, preamble included. The fragmented
/// protocol has no encoder.
pub fn encode_packet(p: &Packet) -> Option<Vec<u8>> {
    if p.protocol != PROTO_V1 {
        return None;
    }
    let mut buf = Vec::with_capacity(PACKET_PREFIX_LEN + 8 + p.payload.len() + 2);
    buf.extend_from_slice(&PREAMBLE.to_be_bytes());
    buf.extend_from_slice(&p.prefix().to_be_bytes());
    buf.extend_from_slice(&p.sequence.to_be_bytes());
    buf.extend_from_slice(&p.length.to_be_bytes());
    buf.extend_from_slice(&p.payload);
    buf.extend_from_slice(&p.sum.to_be_bytes());
    Some(buf)
}

/// Allow-list over the instance byte of incoming packets. An empty filter
/// admits every instance.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    allowed: Vec<u8>,
}

impl InstanceFilter {
    pub fn new(mut allowed: Vec<u8>) -> Self {
        allowed.sort_unstable();
        allowed.dedup();
        Self { allowed }
    }

    pub fn admits(&self, instance: u8) -> bool {
        self.allowed.is_empty() || self.allowed.binary_search(&instance).is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }
}
