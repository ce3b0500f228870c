use bytes::Bytes;
use std::io::Cursor;
use vmu_framing::{encode_packet, FrameReader, FramingError, InstanceFilter, Packet, PREAMBLE, PROTO_V1, PROTO_V2};

fn read_all(wire: Vec<u8>) -> Vec<Packet> {
    let mut reader = FrameReader::new(Cursor::new(wire), InstanceFilter::default());
    let mut out = Vec::new();
    while let Some(p) = reader.next_packet().expect("framing") {
        out.push(p);
    }
    out
}

/// Builds the wire form of one fragmented packet whose payload is split into
/// `chunks`, every fragment re-prefixed as the link requires.
fn encode_fragmented(version: u8, instance: u8, sequence: u16, chunks: &[&[u8]]) -> Vec<u8> {
    let last = (chunks.len() - 1) as u16;
    let prefix = (PROTO_V2 as u16) << 12 | (version as u16) << 8 | instance as u16;
    let mut wire = Vec::new();
    for (ix, chunk) in chunks.iter().enumerate() {
        wire.extend_from_slice(&PREAMBLE.to_be_bytes());
        wire.extend_from_slice(&prefix.to_be_bytes());
        wire.extend_from_slice(&(ix as u16).to_be_bytes());
        wire.extend_from_slice(&last.to_be_bytes());
        wire.extend_from_slice(&sequence.to_be_bytes());
        wire.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
        wire.extend_from_slice(chunk);
        wire.extend_from_slice(&0u16.to_be_bytes());
    }
    wire
}

#[test]
fn v1_roundtrip_preserves_every_field() {
    let p = Packet {
        protocol: PROTO_V1,
        version: 1,
        instance: 0x42,
        sequence: 777,
        length: 5,
        payload: Bytes::from_static(b"hello"),
        sum: 0xBEEF,
        curr: 0,
        last: 0,
    };
    let wire = encode_packet(&p).expect("v1 encodes");
    let got = read_all(wire);
    assert_eq!(got, vec![p]);
}

#[test]
fn empty_v1_packet_on_ops_instance() {
    // single v1 packet, instance 255, sequence 1, empty payload, sum 0
    let p = Packet {
        protocol: PROTO_V1,
        version: 0,
        instance: 255,
        sequence: 1,
        length: 0,
        payload: Bytes::new(),
        sum: 0,
        curr: 0,
        last: 0,
    };
    let got = read_all(encode_packet(&p).expect("v1 encodes"));
    assert_eq!(got.len(), 1);
    assert_eq!(got[0].protocol, 0);
    assert_eq!(got[0].version, 0);
    assert_eq!(got[0].instance, 255);
    assert_eq!(got[0].sequence, 1);
    assert_eq!(got[0].length, 0);
    assert!(got[0].payload.is_empty());
    assert_eq!(got[0].sum, 0);
}

#[test]
fn three_fragments_reassemble_in_order() {
    let wire = encode_fragmented(2, 7, 7, &[b"AB", b"CD", b"EF"]);
    let got = read_all(wire);
    assert_eq!(got.len(), 1);
    assert_eq!(&got[0].payload[..], b"ABCDEF");
    assert_eq!(got[0].sequence, 7);
    assert_eq!(got[0].length, 6);
    assert_eq!(got[0].instance, 7);
    assert_eq!(got[0].version, 2);
}

#[test]
fn reassembly_holds_for_every_chunk_size() {
    let payload: Vec<u8> = (0u8..=63).collect();
    for size in 1..=payload.len() {
        let chunks: Vec<&[u8]> = payload.chunks(size).collect();
        let wire = encode_fragmented(2, 1, 99, &chunks);
        let got = read_all(wire);
        assert_eq!(got.len(), 1, "chunk size {size}");
        assert_eq!(&got[0].payload[..], &payload[..], "chunk size {size}");
        assert_eq!(got[0].sequence, 99);
    }
}

#[test]
fn preamble_mismatch_closes_the_connection() {
    let mut wire = 0x1234_5678u32.to_be_bytes().to_vec();
    wire.extend_from_slice(&[0u8; 32]);
    let mut reader = FrameReader::new(Cursor::new(wire), InstanceFilter::default());
    assert!(matches!(reader.next_packet(), Err(FramingError::Preamble(0x1234_5678))));
    assert!(reader.next_packet().expect("closed stream").is_none());
}

#[test]
fn fragment_prefix_mismatch_drops_the_packet() {
    // first fragment under one prefix, continuation under another
    let mut wire = encode_fragmented(2, 7, 7, &[b"AB", b"CD"]);
    // corrupt the instance byte of the second fragment's prefix and cut the
    // stream there: the packet is aborted, the stream then ends cleanly
    let second = 4 + 2 + 2 + 2 + 2 + 4 + 2 + 2; // preamble..sum of fragment one
    wire[second + 5] ^= 0xFF;
    wire.truncate(second + 6);
    let mut reader = FrameReader::new(Cursor::new(wire), InstanceFilter::default());
    assert!(reader.next_packet().expect("mismatch is non-fatal").is_none());
}
