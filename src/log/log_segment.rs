//! Log segment implementation.
//!
//! A segment is one data-file/index-file pair holding a contiguous run of
//! messages. The data file is a concatenation of serialized records, each
//! followed by a single separator byte; the index file holds one fixed-width
//! record per message mapping its offset to the byte position of its record.
//!
//! A segment has exactly one writer (the owning partition log's append path)
//! and any number of concurrent readers. Readers only ever touch byte ranges
//! that a previous sync made durable, through read-only private mappings, so
//! they never race with the writer.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::FileExt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use crossbeam::atomic::AtomicCell;
use memmap2::MmapOptions;
use tracing::{trace, warn};

use crate::error::{StoreError, StoreResult};
use crate::log::index_record::{decode_index, encode_index, INDEX_RECORD_LEN};
use crate::log::{
    segment_file_name, AppendOutcome, DATA_FILE_SUFFIX, INDEX_FILE_SUFFIX, MESSAGE_SEPARATOR,
};
use crate::message::Message;

/// One bounded, eventually-immutable unit of a partition's append log.
#[derive(Debug)]
pub struct LogSegment {
    /// Creation-order number within the partition, embedded in file names.
    sequence: u64,
    data_file: File,
    index_file: File,
    /// Inclusive offset range currently stored; `end < start` means empty.
    start_offset: AtomicCell<i64>,
    end_offset: AtomicCell<i64>,
    /// Byte length of the data file covered by the last sync.
    size: AtomicCell<u64>,
    full: AtomicCell<bool>,
    size_limit: u64,
}

impl LogSegment {
    /// Opens a segment's file pair, creating the files if absent.
    ///
    /// With `preexisting` set, the segment's offset range is recovered from
    /// the first and last records of the index file through a read-only
    /// mapping, without replaying the entries in between.
    pub fn create(
        dir: impl AsRef<Path>,
        name_prefix: &str,
        sequence: u64,
        size_limit: u64,
        preexisting: bool,
    ) -> StoreResult<Self> {
        let dir = PathBuf::from(dir.as_ref());
        let data_path = dir.join(segment_file_name(name_prefix, sequence, DATA_FILE_SUFFIX));
        let index_path = dir.join(segment_file_name(name_prefix, sequence, INDEX_FILE_SUFFIX));

        let data_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&data_path)
            .map_err(|e| {
                StoreError::DetailedIoError(format!(
                    "open data file: {} error: {}",
                    data_path.display(),
                    e
                ))
            })?;
        let index_file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&index_path)
            .map_err(|e| {
                StoreError::DetailedIoError(format!(
                    "open index file: {} error: {}",
                    index_path.display(),
                    e
                ))
            })?;

        let size = data_file.metadata()?.len();

        let segment = Self {
            sequence,
            data_file,
            index_file,
            start_offset: AtomicCell::new(0),
            end_offset: AtomicCell::new(-1),
            size: AtomicCell::new(size),
            full: AtomicCell::new(false),
            size_limit,
        };

        if preexisting {
            segment.recover_offset_range()?;
        }

        Ok(segment)
    }

    /// Recovers `start_offset`/`end_offset` from the index file.
    ///
    /// An index length that is not a whole number of records means the
    /// process died mid-batch; the torn tail record was never covered by a
    /// sync, so it is dropped here.
    // TODO: also truncate a torn final data record, once index entries carry
    // record lengths; today trailing unindexed bytes are only overwritten by
    // position bookkeeping, not reclaimed.
    fn recover_offset_range(&self) -> StoreResult<()> {
        let index_len = self.index_file.metadata()?.len();
        let torn = index_len % INDEX_RECORD_LEN as u64;
        if torn != 0 {
            warn!(
                "index file of segment {} has torn tail record ({} bytes), truncating",
                self.sequence, torn
            );
            self.index_file.set_len(index_len - torn)?;
        }
        let valid_len = (index_len - torn) as usize;
        if valid_len < INDEX_RECORD_LEN {
            return Ok(());
        }

        let mmap = unsafe { MmapOptions::new().len(valid_len).map(&self.index_file)? };
        let (start_offset, _) = decode_index(&mmap[..INDEX_RECORD_LEN])?;
        let (end_offset, _) = decode_index(&mmap[valid_len - INDEX_RECORD_LEN..])?;

        self.start_offset.store(start_offset);
        self.end_offset.store(end_offset);
        Ok(())
    }

    /// Appends a batch of messages starting at `batch_start_offset`.
    ///
    /// Writes each record followed by the separator byte to the data file
    /// and a matching index record, then syncs both files once. A message
    /// whose serialized record alone cannot fit in an empty segment fails
    /// the whole call with `MessageTooLarge` and writes nothing further; a
    /// message that merely does not fit in the space this segment has left
    /// seals the segment and reports the overflow point, leaving the
    /// already-written prefix durable.
    pub fn append(
        &self,
        batch_start_offset: i64,
        messages: &[Message],
    ) -> StoreResult<AppendOutcome> {
        if messages.is_empty() {
            return Ok(AppendOutcome::Appended);
        }
        if self.full.load() {
            return Ok(AppendOutcome::Overflow(0));
        }

        let base_size = self.size.load();
        let mut cursor: u64 = 0;

        for (i, message) in messages.iter().enumerate() {
            let record = serde_json::to_vec(message)
                .map_err(|e| StoreError::CorruptMessage(format!("serialize message: {}", e)))?;
            let record_len = record.len() as u64 + 1;

            if record_len > self.size_limit {
                return Err(StoreError::MessageTooLarge(format!(
                    "serialized message of {} bytes exceeds segment limit {}",
                    record.len(),
                    self.size_limit
                )));
            }

            if base_size + cursor + record_len > self.size_limit {
                self.full.store(true);
                if let Err(e) = self.commit(base_size, cursor, batch_start_offset, i as i64) {
                    self.quarantine(base_size);
                    return Err(e);
                }
                return Ok(AppendOutcome::Overflow(i));
            }

            let write = (&self.data_file)
                .write_all(&record)
                .and_then(|_| (&self.data_file).write_all(&[MESSAGE_SEPARATOR]))
                .and_then(|_| {
                    (&self.index_file).write_all(&encode_index(
                        batch_start_offset + i as i64,
                        (base_size + cursor) as i64,
                    ))
                });
            if let Err(e) = write {
                self.quarantine(base_size);
                return Err(e.into());
            }
            cursor += record_len;
        }

        if let Err(e) = self.commit(base_size, cursor, batch_start_offset, messages.len() as i64) {
            self.quarantine(base_size);
            return Err(e);
        }
        Ok(AppendOutcome::Appended)
    }

    /// Seals the segment and drops the bytes past the last synced boundary
    /// after a failed write, so the data and index files cannot drift apart.
    /// The batch portion written here is lost; it was never durable.
    fn quarantine(&self, synced_data_len: u64) {
        self.full.store(true);
        let committed_records = if self.is_empty() {
            0
        } else {
            (self.end_offset.load() - self.start_offset.load() + 1) as u64
        };
        let _ = self.data_file.set_len(synced_data_len);
        let _ = self
            .index_file
            .set_len(committed_records * INDEX_RECORD_LEN as u64);
    }

    /// Syncs both files and publishes the new size and offset range.
    ///
    /// The size counter moves only here, after the sync, so concurrent
    /// readers never clamp a read into unsynced bytes.
    fn commit(
        &self,
        base_size: u64,
        written: u64,
        batch_start_offset: i64,
        count: i64,
    ) -> StoreResult<()> {
        if written == 0 {
            return Ok(());
        }
        self.data_file.sync_all()?;
        self.index_file.sync_all()?;
        self.size.store(base_size + written);
        if base_size == 0 {
            self.start_offset.store(batch_start_offset);
        }
        self.end_offset.store(batch_start_offset + count - 1);
        Ok(())
    }

    /// Reads up to `count` records starting at `message_offset`.
    ///
    /// The byte range is delimited by two index lookups and returned as a
    /// read-only private mapping advised for sequential access, excluding
    /// the final separator byte. Requests running past this segment's end
    /// are clamped to it; a request entirely past the end yields
    /// `EndOfSegment` so the caller can advance to the next segment.
    pub fn read(&self, message_offset: i64, count: usize) -> StoreResult<Bytes> {
        if count == 0 {
            return Ok(Bytes::new());
        }
        let start = self.start_offset.load();
        let end = self.end_offset.load();

        if end < start || message_offset > end {
            return Err(StoreError::EndOfSegment(self.sequence));
        }
        if message_offset < start {
            return Err(StoreError::InvalidValue(format!(
                "offset {} precedes segment {} start {}",
                message_offset, self.sequence, start
            )));
        }

        let start_position = self.index_position(message_offset - start)?;
        let last_wanted = message_offset.saturating_add(count as i64 - 1);
        let end_position = if last_wanted < end {
            self.index_position(message_offset - start + count as i64)?
        } else {
            self.size.load() as i64
        };

        if end_position <= start_position {
            return Err(StoreError::CorruptIndex(format!(
                "segment {} positions not increasing: {} -> {}",
                self.sequence, start_position, end_position
            )));
        }

        trace!(
            "segment {} read offset={} count={} bytes={}..{}",
            self.sequence,
            message_offset,
            count,
            start_position,
            end_position
        );

        // exclude the trailing separator of the last record in the range
        let len = (end_position - start_position - 1) as usize;
        let mmap = unsafe {
            MmapOptions::new()
                .offset(start_position as u64)
                .len(len)
                .map_copy_read_only(&self.data_file)?
        };
        #[cfg(unix)]
        mmap.advise(memmap2::Advice::Sequential)?;

        Ok(Bytes::from_owner(mmap))
    }

    /// Looks up the data-file byte position of the index record at
    /// `relative_offset`, an O(1) positioned read thanks to the fixed
    /// record width.
    fn index_position(&self, relative_offset: i64) -> StoreResult<i64> {
        let mut record = [0u8; INDEX_RECORD_LEN];
        let position = relative_offset as u64 * INDEX_RECORD_LEN as u64;
        self.index_file
            .read_exact_at(&mut record, position)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::UnexpectedEof {
                    StoreError::CorruptIndex(format!(
                        "segment {} index ends before record {}",
                        self.sequence, relative_offset
                    ))
                } else {
                    StoreError::IoError(e)
                }
            })?;
        let (_, byte_position) = decode_index(&record)?;
        Ok(byte_position)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn start_offset(&self) -> i64 {
        self.start_offset.load()
    }

    pub fn end_offset(&self) -> i64 {
        self.end_offset.load()
    }

    pub fn size(&self) -> u64 {
        self.size.load()
    }

    pub fn is_full(&self) -> bool {
        self.full.load()
    }

    pub fn is_empty(&self) -> bool {
        self.end_offset.load() < self.start_offset.load()
    }

    pub(crate) fn mark_full(&self) {
        self.full.store(true);
    }
}
