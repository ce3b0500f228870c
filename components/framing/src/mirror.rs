use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use std::io::{self, Write};
use std::net::{SocketAddr, TcpStream};
use std::time::Duration;

const REDIAL_TIMEOUT: Duration = Duration::from_millis(250);

/// Compression applied to the mirrored stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MirrorLevel {
    /// Plain TCP, no gzip wrapping.
    #[default]
    Plain,
    NoCompression,
    Speed,
    Best,
    Default,
}

impl MirrorLevel {
    /// Maps the configuration keywords; anything unknown mirrors uncompressed.
    pub fn parse(s: &str) -> Self {
        match s {
            "no" => MirrorLevel::NoCompression,
            "speed" => MirrorLevel::Speed,
            "best" => MirrorLevel::Best,
            "default" => MirrorLevel::Default,
            _ => MirrorLevel::Plain,
        }
    }

    fn compression(self) -> Option<Compression> {
        match self {
            MirrorLevel::Plain => None,
            MirrorLevel::NoCompression => Some(Compression::none()),
            MirrorLevel::Speed => Some(Compression::fast()),
            MirrorLevel::Best => Some(Compression::best()),
            MirrorLevel::Default => Some(Compression::default()),
        }
    }
}

enum MirrorStream {
    Plain(TcpStream),
    Gzip(GzEncoder<TcpStream>),
}

impl MirrorStream {
    fn wrap(conn: TcpStream, level: MirrorLevel) -> Self {
        match level.compression() {
            Some(c) => MirrorStream::Gzip(GzEncoder::new(conn, c)),
            None => MirrorStream::Plain(conn),
        }
    }

    fn write_flush(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            MirrorStream::Plain(conn) => {
                conn.write_all(buf)?;
                conn.flush()
            }
            MirrorStream::Gzip(enc) => {
                enc.write_all(buf)?;
                // keep framing boundaries visible to the remote decoder
                enc.flush()
            }
        }
    }
}

/// Write-only duplicate of the inbound byte stream towards a second TCP
/// endpoint. The contract is fire-and-forget: callers always see success.
/// On a failed write the remote is redialed once with a short timeout and the
/// compressor rewrapped; the in-flight bytes are dropped.
pub struct MirrorWriter {
    remote: SocketAddr,
    level: MirrorLevel,
    stream: MirrorStream,
}

impl MirrorWriter {
    pub fn dial(addr: &str, level: MirrorLevel) -> io::Result<Self> {
        let conn = TcpStream::connect(addr)?;
        let remote = conn.peer_addr()?;
        Ok(Self { remote, level, stream: MirrorStream::wrap(conn, level) })
    }

    pub fn remote(&self) -> SocketAddr {
        self.remote
    }

    fn redial(&mut self) {
        match TcpStream::connect_timeout(&self.remote, REDIAL_TIMEOUT) {
            Ok(conn) => {
                debug!("mirror.event=redial_ok remote={}", self.remote);
                self.stream = MirrorStream::wrap(conn, self.level);
            }
            Err(e) => {
                warn!("mirror.event=redial_fail remote={} reason={e}", self.remote);
            }
        }
    }
}

impl Write for MirrorWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.stream.write_flush(buf) {
            warn!("mirror.event=write_fail remote={} reason={e}", self.remote);
            self.redial();
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
