use crate::listen::DaemonError;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{info, warn};
use std::io::{self, Write};
use std::net::TcpStream;
use std::path::Path;
use std::time::{Duration, Instant};
use vmu_archive::ArchiveWalker;
use vmu_framing::{sum1071, PREAMBLE, PROTO_V1, PROTO_V2};

#[derive(Debug, Clone, Copy)]
pub struct ReplayOptions {
    /// Packets per second.
    pub rate: u32,
    /// Fragment size in bytes; 0 sends single-shot v1 frames.
    pub chunk: usize,
    /// VMU protocol generation announced in the prefix.
    pub version: u8,
    /// Instance byte announced in the prefix.
    pub instance: u8,
    /// Wrap the framed stream in gzip (the `binary+gzip` link mode).
    pub compressed: bool,
}

impl Default for ReplayOptions {
    fn default() -> Self {
        Self { rate: 1, chunk: 0, version: 2, instance: 255, compressed: false }
    }
}

enum ReplayStream {
    Plain(TcpStream),
    Gzip(GzEncoder<TcpStream>),
}

impl ReplayStream {
    fn write_flush(&mut self, bs: &[u8]) -> io::Result<()> {
        match self {
            ReplayStream::Plain(conn) => {
                conn.write_all(bs)?;
                conn.flush()
            }
            ReplayStream::Gzip(enc) => {
                enc.write_all(bs)?;
                enc.flush()
            }
        }
    }
}

/// Re-emits archived VMU packets over the acquisition link framing: each
/// packet is framed single-shot or split into fragments, checksummed and
/// written to the remote.
pub struct ReplayWriter {
    stream: ReplayStream,
    prefix: u16,
    chunk: usize,
    counter: u16,
}

impl ReplayWriter {
    pub fn dial(addr: &str, options: ReplayOptions) -> io::Result<Self> {
        let conn = TcpStream::connect(addr)?;
        let protocol = if options.chunk > 0 { PROTO_V2 } else { PROTO_V1 };
        let prefix = (protocol as u16) << 12 | (options.version as u16) << 8 | options.instance as u16;
        let stream = if options.compressed {
            ReplayStream::Gzip(GzEncoder::new(conn, Compression::default()))
        } else {
            ReplayStream::Plain(conn)
        };
        Ok(Self { stream, prefix, chunk: options.chunk, counter: 0 })
    }

    pub fn write_packet(&mut self, bs: &[u8]) -> io::Result<()> {
        let wire = if self.chunk == 0 {
            self.encode_single(bs)
        } else {
            self.encode_fragmented(bs)
        };
        self.counter = self.counter.wrapping_add(1);
        self.stream.write_flush(&wire)
    }

    fn encode_single(&self, bs: &[u8]) -> Vec<u8> {
        let mut wire = Vec::with_capacity(bs.len() + 16);
        wire.extend_from_slice(&PREAMBLE.to_be_bytes());
        wire.extend_from_slice(&self.prefix.to_be_bytes());
        wire.extend_from_slice(&self.counter.to_be_bytes());
        wire.extend_from_slice(&(bs.len() as u32).to_be_bytes());
        wire.extend_from_slice(bs);
        wire.extend_from_slice(&sum1071(bs).to_be_bytes());
        wire
    }

    fn encode_fragmented(&self, bs: &[u8]) -> Vec<u8> {
        let mut chunks: Vec<&[u8]> = bs.chunks(self.chunk).collect();
        if chunks.is_empty() {
            chunks.push(bs);
        }
        let last = (chunks.len() - 1) as u16;
        let mut wire = Vec::with_capacity(bs.len() + chunks.len() * 18);
        for (ix, chunk) in chunks.iter().enumerate() {
            wire.extend_from_slice(&PREAMBLE.to_be_bytes());
            wire.extend_from_slice(&self.prefix.to_be_bytes());
            wire.extend_from_slice(&(ix as u16).to_be_bytes());
            wire.extend_from_slice(&last.to_be_bytes());
            wire.extend_from_slice(&self.counter.to_be_bytes());
            wire.extend_from_slice(&(chunk.len() as u32).to_be_bytes());
            wire.extend_from_slice(chunk);
            wire.extend_from_slice(&sum1071(chunk).to_be_bytes());
        }
        wire
    }
}

/// Walks an HRDP archive and replays every record towards `addr` at the
/// configured rate. Returns the number of packets sent.
pub fn run(addr: &str, archive: &Path, options: ReplayOptions) -> Result<u64, DaemonError> {
    let mut writer = ReplayWriter::dial(addr, options)?;
    let mut walker = ArchiveWalker::open(archive)?;
    let period = Duration::from_secs(1) / options.rate.max(1);

    let started = Instant::now();
    let mut count = 0u64;
    let mut bytes = 0u64;
    while let Some(record) = walker.next_record()? {
        if let Err(e) = writer.write_packet(&record.data) {
            warn!("replay write failed: {e}");
            break;
        }
        count += 1;
        bytes += record.data.len() as u64;
        std::thread::sleep(period);
    }
    info!(
        "replay.event=done packets={count} kb={:.2} elapsed={:?}",
        bytes as f64 / 1024.0,
        started.elapsed()
    );
    Ok(count)
}
