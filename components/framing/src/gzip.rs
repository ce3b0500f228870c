use crate::packet::{InstanceFilter, Packet};
use crate::reader::FramingError;
use bytes::Bytes;
use flate2::read::GzDecoder;
use std::io::{self, Read};

/// Reader for the alternative gzip transport: the whole stream is a single
/// RFC1952 member whose header Extra field carries `version << 8 | instance`
/// (big-endian u16) for the entire payload. Fragmentation is never combined
/// with this transport, so the decompressed bytes form one packet payload.
pub struct GzipFrameReader<R: Read> {
    inner: GzDecoder<R>,
    filter: InstanceFilter,
    done: bool,
}

impl<R: Read> GzipFrameReader<R> {
    pub fn new(inner: R, filter: InstanceFilter) -> Self {
        Self { inner: GzDecoder::new(inner), filter, done: false }
    }

    pub fn next_packet(&mut self) -> Result<Option<Packet>, FramingError> {
        if self.done {
            return Ok(None);
        }
        self.done = true;

        let mut payload = Vec::new();
        self.inner.read_to_end(&mut payload)?;
        let extra = match self.inner.header().and_then(|h| h.extra()) {
            Some(extra) if extra.len() >= 2 => u16::from_be_bytes([extra[0], extra[1]]),
            _ => {
                return Err(FramingError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "gzip stream carries no version/instance extra field",
                )))
            }
        };
        let version = (extra >> 8) as u8 & 0x0F;
        let instance = extra as u8;
        if !self.filter.admits(instance) {
            return Ok(None);
        }
        Ok(Some(Packet {
            protocol: 0,
            version,
            instance,
            sequence: 0,
            length: payload.len() as u32,
            payload: Bytes::from(payload),
            sum: 0,
            curr: 0,
            last: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{Compression, GzBuilder};
    use std::io::Write;

    fn gzip_stream(extra: u16, payload: &[u8]) -> Vec<u8> {
        let mut w = GzBuilder::new()
            .extra(extra.to_be_bytes().to_vec())
            .write(Vec::new(), Compression::default());
        w.write_all(payload).unwrap();
        w.finish().unwrap()
    }

    #[test]
    fn whole_stream_is_one_packet() {
        let wire = gzip_stream(0x02_37, b"science blob");
        let mut r = GzipFrameReader::new(&wire[..], InstanceFilter::default());
        let p = r.next_packet().unwrap().unwrap();
        assert_eq!(p.version, 2);
        assert_eq!(p.instance, 0x37);
        assert_eq!(&p.payload[..], b"science blob");
        assert!(r.next_packet().unwrap().is_none());
    }

    #[test]
    fn missing_extra_is_an_error() {
        let mut w = flate2::write::GzEncoder::new(Vec::new(), Compression::default());
        w.write_all(b"no header extra").unwrap();
        let wire = w.finish().unwrap();
        let mut r = GzipFrameReader::new(&wire[..], InstanceFilter::default());
        assert!(r.next_packet().is_err());
    }

    #[test]
    fn filtered_instance_yields_nothing() {
        let wire = gzip_stream(0x02_37, b"blob");
        let mut r = GzipFrameReader::new(&wire[..], InstanceFilter::new(vec![1]));
        assert!(r.next_packet().unwrap().is_none());
    }
}
