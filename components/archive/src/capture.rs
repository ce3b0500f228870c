use crate::hrdp::{HRDP_HEADER_LEN, HRDP_SYNC_LEN};
use crate::StorageError;
use chrono::{DateTime, Utc};
use log::warn;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use vmu_framing::PREAMBLE;

/// Upper bound on one record, far above any real VMU packet. A larger
/// length field means the file is not a capture.
const MAX_RECORD_LEN: usize = 16 * 1024 * 1024;

/// One record recovered from an HRDP capture file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureRecord {
    pub payload_id: u8,
    pub origin: u8,
    /// Generation time stamped when the record was accumulated.
    pub generated: DateTime<Utc>,
    /// Wall-clock time of archiving.
    pub archived: DateTime<Utc>,
    /// The full VMU packet bytes.
    pub data: Vec<u8>,
}

/// Streaming reader over one capture file's concatenated records.
pub struct CaptureReader<R> {
    inner: R,
}

impl<R: Read> CaptureReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    /// Next record, or `None` once the file is exhausted.
    pub fn next_record(&mut self) -> Result<Option<CaptureRecord>, StorageError> {
        let mut length = [0u8; 4];
        match self.inner.read_exact(&mut length) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }
        let length = u32::from_le_bytes(length) as usize;
        if length < HRDP_HEADER_LEN + HRDP_SYNC_LEN || length > MAX_RECORD_LEN {
            return Err(StorageError::Corrupt("record length"));
        }
        let mut body = vec![0u8; length];
        self.inner.read_exact(&mut body).map_err(|e| {
            if e.kind() == io::ErrorKind::UnexpectedEof {
                StorageError::Corrupt("record body")
            } else {
                StorageError::Io(e)
            }
        })?;

        let payload_id = body[2];
        let origin = body[3];
        let generated = u32::from_le_bytes(body[4..8].try_into().expect("generated width"));
        let archived = u32::from_le_bytes(body[9..13].try_into().expect("archived width"));
        let sync = u32::from_be_bytes(body[14..18].try_into().expect("sync width"));
        if sync != PREAMBLE {
            return Err(StorageError::Corrupt("sync word"));
        }
        let vmu_len = u32::from_be_bytes(body[18..22].try_into().expect("length width")) as usize;
        let data = body.split_off(HRDP_HEADER_LEN + HRDP_SYNC_LEN);
        if data.len() != vmu_len {
            return Err(StorageError::Corrupt("payload length"));
        }
        Ok(Some(CaptureRecord {
            payload_id,
            origin,
            generated: DateTime::from_timestamp(generated as i64, 0).unwrap_or_default(),
            archived: DateTime::from_timestamp(archived as i64, 0).unwrap_or_default(),
            data,
        }))
    }
}

/// Walks an HRDP archive tree in path order, yielding every record of every
/// capture file. A corrupt file is reported and skipped; the walk continues
/// with the next one.
pub struct ArchiveWalker {
    files: VecDeque<PathBuf>,
    current: Option<(PathBuf, CaptureReader<BufReader<File>>)>,
}

impl ArchiveWalker {
    pub fn open(dir: &Path) -> Result<Self, StorageError> {
        if !dir.is_dir() {
            return Err(StorageError::NotADirectory(dir.to_path_buf()));
        }
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;
        files.sort();
        Ok(Self { files: files.into(), current: None })
    }

    pub fn next_record(&mut self) -> Result<Option<CaptureRecord>, StorageError> {
        loop {
            if self.current.is_none() {
                let path = match self.files.pop_front() {
                    Some(path) => path,
                    None => return Ok(None),
                };
                let file = File::open(&path)?;
                self.current = Some((path, CaptureReader::new(BufReader::new(file))));
            }
            let (path, reader) = self.current.as_mut().expect("walker has an open file");
            match reader.next_record() {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {
                    self.current = None;
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    self.current = None;
                }
            }
        }
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), StorageError> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
