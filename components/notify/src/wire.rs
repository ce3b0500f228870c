use crate::{Message, NotifyError};
use std::time::Duration;
use vmu_product::Channel;

/// Binary form of a pool message as consumed by external monitors: numeric
/// fields big-endian, strings u16-length-prefixed, in wire order.
pub fn encode_message(msg: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64 + msg.origin.len() + msg.reference.len() + msg.upi.len());
    put_string(&mut buf, &msg.origin);
    buf.extend_from_slice(&msg.sequence.to_be_bytes());
    buf.extend_from_slice(&msg.instance.to_be_bytes());
    buf.push(msg.channel as u8);
    buf.push(msg.realtime as u8);
    buf.extend_from_slice(&msg.count.to_be_bytes());
    buf.extend_from_slice(&(msg.elapsed.as_nanos() as i64).to_be_bytes());
    buf.extend_from_slice(&msg.generated.to_be_bytes());
    buf.extend_from_slice(&msg.acquired.to_be_bytes());
    put_string(&mut buf, &msg.reference);
    put_string(&mut buf, &msg.upi);
    buf
}

pub fn decode_message(bs: &[u8]) -> Result<Message, NotifyError> {
    let mut r = Reader { bs, pos: 0 };
    let origin = r.string("origin")?;
    let sequence = u32::from_be_bytes(r.array("sequence")?);
    let instance = i32::from_be_bytes(r.array("instance")?);
    let channel = r.array::<1>("channel")?[0];
    let channel = Channel::try_from(channel).map_err(|_| NotifyError::UnknownChannel(channel))?;
    let realtime = r.array::<1>("realtime")?[0] != 0;
    let count = u32::from_be_bytes(r.array("count")?);
    let elapsed_ns = i64::from_be_bytes(r.array("elapsed")?);
    let generated = i64::from_be_bytes(r.array("generated")?);
    let acquired = i64::from_be_bytes(r.array("acquired")?);
    let reference = r.string("reference")?;
    let upi = r.string("upi")?;
    Ok(Message {
        origin,
        sequence,
        instance,
        channel,
        realtime,
        count,
        elapsed: Duration::from_nanos(elapsed_ns.max(0) as u64),
        generated,
        acquired,
        reference,
        upi,
    })
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u16).to_be_bytes());
    buf.extend_from_slice(s.as_bytes());
}

struct Reader<'a> {
    bs: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn array<const N: usize>(&mut self, label: &'static str) -> Result<[u8; N], NotifyError> {
        if self.pos + N > self.bs.len() {
            return Err(NotifyError::Truncated(label));
        }
        let mut out = [0u8; N];
        out.copy_from_slice(&self.bs[self.pos..self.pos + N]);
        self.pos += N;
        Ok(out)
    }

    fn string(&mut self, label: &'static str) -> Result<String, NotifyError> {
        let len = u16::from_be_bytes(self.array(label)?) as usize;
        if self.pos + len > self.bs.len() {
            return Err(NotifyError::Truncated(label));
        }
        let s = String::from_utf8_lossy(&self.bs[self.pos..self.pos + len]).into_owned();
        self.pos += len;
        Ok(s)
    }
}
