use crate::packet::{InstanceFilter, Packet, PREAMBLE, PROTO_V1, PROTO_V2};
use bytes::{Bytes, BytesMut};
use log::debug;
use std::io::{self, Read};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("invalid preamble: expected {PREAMBLE:#010x}, got {0:#010x}")]
    Preamble(u32),
    #[error("unsupported protocol {0}")]
    UnsupportedProtocol(u8),
    #[error("fragment prefix mismatched: expected {expected:#06x}, got {got:#06x}")]
    PrefixMismatch { expected: u16, got: u16 },
    #[error("truncated packet while reading {0}")]
    Truncated(&'static str),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl FramingError {
    /// A fatal error invalidates all further framing on the connection.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FramingError::Preamble(_) | FramingError::UnsupportedProtocol(_) | FramingError::Io(_))
    }
}

/// Pull-based frame reader over an ordered byte stream.
///
/// Recognises the 4-byte preamble, dispatches single-shot (protocol 0) or
/// fragmented (protocol 1) framing, reassembles fragments in `curr` order and
/// yields packets filtered by the instance allow-list. Per-packet decode
/// errors are skipped; preamble or protocol violations end the stream.
pub struct FrameReader<R> {
    inner: R,
    filter: InstanceFilter,
    done: bool,
}

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, filter: InstanceFilter) -> Self {
        Self { inner, filter, done: false }
    }

    /// Next admitted packet, or `None` once the stream is cleanly exhausted.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, FramingError> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.read_one() {
                Ok(Some(p)) => {
                    if self.filter.admits(p.instance) {
                        return Ok(Some(p));
                    }
                }
                Ok(None) => {
                    self.done = true;
                    return Ok(None);
                }
                Err(e) if e.is_fatal() => {
                    self.done = true;
                    return Err(e);
                }
                Err(e) => {
                    debug!("skipping packet: {e}");
                }
            }
        }
    }

    fn read_one(&mut self) -> Result<Option<Packet>, FramingError> {
        let prefix = match self.read_preamble()? {
            Some(prefix) => prefix,
            None => return Ok(None),
        };
        let protocol = (prefix >> 12) as u8;
        let version = (prefix >> 8) as u8 & 0x0F;
        let instance = prefix as u8;

        let mut packet = Packet {
            protocol,
            version,
            instance,
            sequence: 0,
            length: 0,
            payload: Bytes::new(),
            sum: 0,
            curr: 0,
            last: 0,
        };
        match protocol {
            PROTO_V1 => {
                self.read_body(&mut packet)?;
            }
            PROTO_V2 => {
                self.read_fragments(prefix, &mut packet)?;
            }
            other => return Err(FramingError::UnsupportedProtocol(other)),
        }
        Ok(Some(packet))
    }

    /// Reads preamble plus prefix. `Ok(None)` means the stream ended exactly
    /// on a frame boundary.
    fn read_preamble(&mut self) -> Result<Option<u16>, FramingError> {
        let mut first = [0u8; 1];
        match self.inner.read(&mut first) {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::Interrupted => return self.read_preamble(),
            Err(e) => return Err(e.into()),
        }
        let mut rest = [0u8; 3];
        self.read_exact(&mut rest, "preamble")?;
        let preamble = u32::from_be_bytes([first[0], rest[0], rest[1], rest[2]]);
        if preamble != PREAMBLE {
            return Err(FramingError::Preamble(preamble));
        }
        Ok(Some(self.read_u16("prefix")?))
    }

    fn read_body(&mut self, p: &mut Packet) -> Result<(), FramingError> {
        p.sequence = self.read_u16("sequence")?;
        p.length = self.read_u32("length")?;
        let mut payload = vec![0u8; p.length as usize];
        self.read_exact(&mut payload, "payload")?;
        p.payload = Bytes::from(payload);
        p.sum = self.read_u16("checksum")?;
        Ok(())
    }

    fn read_fragments(&mut self, prefix: u16, p: &mut Packet) -> Result<(), FramingError> {
        let mut fragments: Vec<(u16, Bytes)> = Vec::new();
        loop {
            let curr = self.read_u16("fragment curr")?;
            let last = self.read_u16("fragment last")?;
            let mut body = p.clone();
            self.read_body(&mut body)?;
            fragments.push((curr, body.payload));
            if curr == last {
                p.sequence = body.sequence;
                p.sum = body.sum;
                p.curr = curr;
                p.last = last;
                break;
            }
            let next = match self.read_preamble()? {
                Some(next) => next,
                None => return Err(FramingError::Truncated("fragment preamble")),
            };
            if next != prefix {
                return Err(FramingError::PrefixMismatch { expected: prefix, got: next });
            }
        }
        fragments.sort_by_key(|(curr, _)| *curr);
        let total = fragments.iter().map(|(_, b)| b.len()).sum();
        let mut payload = BytesMut::with_capacity(total);
        for (_, chunk) in &fragments {
            payload.extend_from_slice(chunk);
        }
        p.payload = payload.freeze();
        p.length = p.payload.len() as u32;
        Ok(())
    }

    fn read_exact(&mut self, buf: &mut [u8], label: &'static str) -> Result<(), FramingError> {
        self.inner.read_exact(buf).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                FramingError::Truncated(label)
            } else {
                FramingError::Io(e)
            }
        })
    }

    fn read_u16(&mut self, label: &'static str) -> Result<u16, FramingError> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf, label)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_u32(&mut self, label: &'static str) -> Result<u32, FramingError> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf, label)?;
        Ok(u32::from_be_bytes(buf))
    }
}
