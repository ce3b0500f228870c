use crate::DecodeError;

/// Bounds-checked little-endian cursor over a packet body. Every read is
/// labeled so a truncation error names the field that was missing.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn read_u8(&mut self, label: &'static str) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>(label)?[0])
    }

    pub fn read_u16(&mut self, label: &'static str) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array(label)?))
    }

    pub fn read_u32(&mut self, label: &'static str) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array(label)?))
    }

    pub fn read_u64(&mut self, label: &'static str) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array(label)?))
    }

    pub fn read_i64(&mut self, label: &'static str) -> Result<i64, DecodeError> {
        Ok(i64::from_le_bytes(self.read_array(label)?))
    }

    pub fn read_f32(&mut self, label: &'static str) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.read_array(label)?))
    }

    pub fn skip(&mut self, n: usize, label: &'static str) -> Result<(), DecodeError> {
        if self.pos + n > self.buf.len() {
            return Err(DecodeError::Truncated(label));
        }
        self.pos += n;
        Ok(())
    }

    pub fn read_array<const N: usize>(&mut self, label: &'static str) -> Result<[u8; N], DecodeError> {
        if self.pos + N > self.buf.len() {
            return Err(DecodeError::Truncated(label));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }
}
