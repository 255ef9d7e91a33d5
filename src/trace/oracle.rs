use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::Error;

/// One `oracleGeneral` record.
///
/// On disk a record is 24 unaligned little-endian bytes:
/// `u32 timestamp | u64 obj_id | u32 obj_size | u64 next_access_vtime`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Request {
    /// Wall-clock time of the access, in seconds.
    pub timestamp: u32,
    /// Hash of the object id.
    pub obj_id: u64,
    /// Object size in bytes.
    pub obj_size: u32,
    /// Logical time of the next access to the same object.  A stored
    /// `(i64) -1` means "never again" and reads back as `u64::MAX`.
    pub next_access_vtime: u64,
}

impl Request {
    /// On-disk record size; the fields are packed, not aligned.
    pub const RECORD_SIZE: usize = 24;
}

#[inline]
fn read_u32(raw: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([raw[at], raw[at + 1], raw[at + 2], raw[at + 3]])
}

#[inline]
fn read_u64(raw: &[u8], at: usize) -> u64 {
    u64::from_le_bytes([
        raw[at],
        raw[at + 1],
        raw[at + 2],
        raw[at + 3],
        raw[at + 4],
        raw[at + 5],
        raw[at + 6],
        raw[at + 7],
    ])
}

/// A memory-mapped `.oracleGeneral` trace file.
///
/// Records are fixed-size, so the reader supports O(1) indexed access as
/// well as forward iteration without copying the file.
pub struct OracleTrace {
    mmap: Mmap,
    num_entries: usize,
}

impl OracleTrace {
    /// Maps `path` read-only and validates its length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let file = File::open(path)?;
        // Safety: the map is read-only and private to this process; the
        // trace is treated as immutable input.
        let mmap = unsafe { Mmap::map(&file)? };
        if mmap.len() % Request::RECORD_SIZE != 0 {
            return Err(Error::MalformedTrace {
                len: mmap.len() as u64,
                record: Request::RECORD_SIZE,
            });
        }
        let num_entries = mmap.len() / Request::RECORD_SIZE;
        Ok(OracleTrace { mmap, num_entries })
    }

    /// Number of records in the trace.
    pub fn len(&self) -> usize {
        self.num_entries
    }

    pub fn is_empty(&self) -> bool {
        self.num_entries == 0
    }

    /// Record at `index`, or `None` past the end.
    pub fn get(&self, index: usize) -> Option<Request> {
        if index >= self.num_entries {
            return None;
        }
        let at = index * Request::RECORD_SIZE;
        let raw = &self.mmap[at..at + Request::RECORD_SIZE];
        Some(Request {
            timestamp: read_u32(raw, 0),
            obj_id: read_u64(raw, 4),
            obj_size: read_u32(raw, 12),
            next_access_vtime: read_u64(raw, 16),
        })
    }

    pub fn iter(&self) -> Requests<'_> {
        Requests {
            trace: self,
            index: 0,
        }
    }
}

impl<'a> IntoIterator for &'a OracleTrace {
    type Item = Request;
    type IntoIter = Requests<'a>;

    fn into_iter(self) -> Requests<'a> {
        self.iter()
    }
}

/// Iterator over the records of an [`OracleTrace`].
pub struct Requests<'a> {
    trace: &'a OracleTrace,
    index: usize,
}

impl Iterator for Requests<'_> {
    type Item = Request;

    fn next(&mut self) -> Option<Request> {
        let request = self.trace.get(self.index)?;
        self.index += 1;
        Some(request)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.trace.num_entries - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Requests<'_> {}
