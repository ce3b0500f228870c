use std::io::{Read, Result, Write};

/// Reader that duplicates everything it reads into a secondary writer.
/// Mirror failures never disturb the primary stream.
pub struct TeeReader<R, W> {
    inner: R,
    mirror: W,
}

impl<R: Read, W: Write> TeeReader<R, W> {
    pub fn new(inner: R, mirror: W) -> Self {
        Self { inner, mirror }
    }
}

impl<R: Read, W: Write> Read for TeeReader<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = self.inner.read(buf)?;
        if n > 0 {
            let _ = self.mirror.write(&buf[..n]);
        }
        Ok(n)
    }
}
