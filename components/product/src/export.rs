use crate::decode::Product;
use crate::image::{Image, ImageHeader};
use crate::science::{unit, ScienceHeader, Table};
use chrono::{DateTime, SecondsFormat, Utc};
use std::io::{self, Write};

const LRSD_CHUNK_LEN: usize = 32;
const SYNC_CHUNK_LEN: usize = 18;
const SVS_META_LEN: usize = 74;
const SVS_MAGIC: u8 = 0x90;

impl Product {
    /// Logical export: science tables render their unit-specific tabular
    /// form, everything else (images included) is the payload unchanged.
    pub fn export<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Product::Image(p) => p.export_raw(w),
            Product::Table(p) => p.export(w),
        }
    }

    /// Payload bytes unchanged.
    pub fn export_raw<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(self.payload())
    }
}

impl Image {
    pub fn export_raw<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.data)
    }
}

impl Table {
    pub fn export<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match &self.sdh {
            ScienceHeader::V1(_) => export_science_data(w, &self.data, self.timestamp()),
            ScienceHeader::V2(v) => match v.id {
                unit::LCP => export_svs_data(w, &self.data),
                unit::LRSD => export_science_data(w, &self.data, self.timestamp()),
                unit::SMD | unit::RUB => export_sync_unit(w, &self.data, self.timestamp()),
                _ => self.export_raw(w),
            },
        }
    }

    pub fn export_raw<W: Write>(&self, w: &mut W) -> io::Result<()> {
        w.write_all(&self.data)
    }
}

fn csv_err(e: csv::Error) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, e)
}

fn rfc3339(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Science chunks as rows of 32 little-endian words, prefixed by timestamp,
/// row index and chunk count.
pub fn export_science_data<W: Write>(w: &mut W, bs: &[u8], t: DateTime<Utc>) -> io::Result<()> {
    let mut c = csv::Writer::from_writer(w);
    let total = bs.len() / LRSD_CHUNK_LEN;
    let mut rest = bs;
    let mut row_ix = 1usize;
    while !rest.is_empty() {
        let mut rs = Vec::with_capacity(35);
        rs.push(rfc3339(t));
        rs.push(row_ix.to_string());
        rs.push(total.to_string());
        for _ in 0..32 {
            let (word, tail) = take::<2>(rest)?;
            rest = tail;
            rs.push(u16::from_le_bytes(word).to_string());
        }
        c.write_record(&rs).map_err(csv_err)?;
        row_ix += 1;
    }
    c.flush()
}

/// Sync-unit chunks: two status bytes and two big-endian counters per row.
pub fn export_sync_unit<W: Write>(w: &mut W, bs: &[u8], t: DateTime<Utc>) -> io::Result<()> {
    let mut c = csv::Writer::from_writer(w);
    let total = bs.len() / SYNC_CHUNK_LEN;
    let mut rest = bs;
    let mut row_ix = 1usize;
    while !rest.is_empty() {
        let mut rs = Vec::with_capacity(7);
        rs.push(rfc3339(t));
        rs.push(row_ix.to_string());
        rs.push(total.to_string());
        for _ in 0..2 {
            let (b, tail) = take::<1>(rest)?;
            rest = tail;
            rs.push(b[0].to_string());
        }
        for _ in 0..2 {
            let (v, tail) = take::<8>(rest)?;
            rest = tail;
            rs.push(i64::from_be_bytes(v).to_string());
        }
        c.write_record(&rs).map_err(csv_err)?;
        row_ix += 1;
    }
    c.flush()
}

/// SVS chunks: a labeled header row followed by one float column per probe.
/// Payloads without the SVS magic are dumped unchanged.
pub fn export_svs_data<W: Write>(w: &mut W, bs: &[u8]) -> io::Result<()> {
    if bs.first() != Some(&SVS_MAGIC) || bs.len() <= SVS_META_LEN {
        return w.write_all(bs);
    }
    let mut rest = &bs[SVS_META_LEN..];
    let (n, tail) = take::<1>(rest)?;
    rest = tail;
    let n = n[0] as usize;

    let mut c = csv::Writer::from_writer(w);
    let mut header = Vec::with_capacity(n + 1);
    header.push("t".to_string());
    for _ in 0..n {
        let (v, tail) = take::<2>(rest)?;
        rest = tail;
        header.push(format!("g2(t, {})", u16::from_le_bytes(v)));
    }
    c.write_record(&header).map_err(csv_err)?;

    let mut row_ix = 0usize;
    while !rest.is_empty() {
        let mut rs = Vec::with_capacity(n + 1);
        rs.push(row_ix.to_string());
        for _ in 0..n {
            let (v, tail) = take::<4>(rest)?;
            rest = tail;
            rs.push(f32::from_le_bytes(v).to_string());
        }
        c.write_record(&rs).map_err(csv_err)?;
        row_ix += 1;
    }
    c.flush()
}

/// Raw archive record: fourcc and sequence, the acquisition duration (v2) or
/// unix generation seconds (v1), image dimensions for bitmaps, then payload.
/// All fields big-endian.
pub fn encode_raw_record<W: Write>(w: &mut W, product: &Product) -> io::Result<()> {
    match product {
        Product::Table(p) => {
            w.write_all(&p.fourcc().to_be_bytes())?;
            w.write_all(&p.sequence().to_be_bytes())?;
            match &p.sdh {
                ScienceHeader::V2(v) => w.write_all(&v.acquisition.to_be_bytes())?,
                ScienceHeader::V1(_) => w.write_all(&p.timestamp().timestamp().to_be_bytes())?,
            }
            w.write_all(&p.data)
        }
        Product::Image(p) => {
            w.write_all(&p.fourcc().to_be_bytes())?;
            w.write_all(&p.sequence().to_be_bytes())?;
            match &p.idh {
                ImageHeader::V2(v) => w.write_all(&v.acquisition.to_be_bytes())?,
                ImageHeader::V1(_) => w.write_all(&p.timestamp().timestamp().to_be_bytes())?,
            }
            w.write_all(&p.idh.x().to_be_bytes())?;
            w.write_all(&p.idh.y().to_be_bytes())?;
            w.write_all(&p.data)
        }
    }
}

fn take<const N: usize>(bs: &[u8]) -> io::Result<([u8; N], &[u8])> {
    if bs.len() < N {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "science chunk cut short"));
    }
    let mut out = [0u8; N];
    out.copy_from_slice(&bs[..N]);
    Ok((out, &bs[N..]))
}
