// Copyright 2026 graniteq developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Partition log implementation.
//!
//! A partition log presents a single ordered, gap-free offset space over a
//! chain of segments, hiding segment rollover and offset-to-segment
//! resolution from callers. Offsets are 1-based and assigned by the log
//! itself: the first accepted message gets offset 1.
//!
//! Appends are serialized through an internal writer cursor behind a mutex;
//! the segment chain is only ever mutated under its write lock, so readers
//! always observe a complete chain snapshot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use crossbeam::atomic::AtomicCell;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, trace};

use crate::error::{StoreError, StoreResult};
use crate::log::log_segment::LogSegment;
use crate::log::{AppendOutcome, DATA_FILE_SUFFIX};
use crate::message::Message;

/// The single ordered append log of one topic partition.
#[derive(Debug)]
pub struct PartitionLog {
    /// Topic-partition identifier; every segment file name starts with it.
    name_prefix: String,
    dir: PathBuf,
    /// Segment chain in ascending sequence (equivalently offset) order.
    segments: RwLock<Vec<Arc<LogSegment>>>,
    /// Single-writer handle; all appends funnel through this lock.
    writer: Mutex<WriterCursor>,
    /// Segment most recently used by a read, to skip re-resolution on
    /// sequential consumption.
    reader_cursor: RwLock<Option<Arc<LogSegment>>>,
    /// Highest assigned message offset; 0 means no messages yet.
    last_offset: AtomicCell<i64>,
    segment_size: u64,
}

#[derive(Debug)]
struct WriterCursor {
    /// Currently writable tail segment, created lazily.
    tail: Option<Arc<LogSegment>>,
    last_sequence: u64,
}

impl PartitionLog {
    /// Opens the partition log rooted at `dir`, reconstructing its segment
    /// chain from the files already there.
    ///
    /// Scans for `<name_prefix>_<sequence>.data`, opens each match in
    /// ascending sequence order through the segment recovery path, and
    /// resumes offset assignment after the last recovered offset. No tail
    /// segment is created here; the first append either reuses the last
    /// recovered segment or rolls a new one.
    pub fn open(
        dir: impl AsRef<Path>,
        name_prefix: impl Into<String>,
        segment_size: u64,
    ) -> StoreResult<Self> {
        let dir = PathBuf::from(dir.as_ref());
        let name_prefix = name_prefix.into();

        let mut sequences = Vec::new();
        let read_dir = std::fs::read_dir(&dir).map_err(|e| {
            StoreError::DetailedIoError(format!(
                "read dir: {} error: {} while opening partition log",
                dir.display(),
                e
            ))
        })?;
        for entry in read_dir {
            let entry = entry.map_err(|e| {
                StoreError::DetailedIoError(format!(
                    "read dir: {} error: {} while opening partition log",
                    dir.display(),
                    e
                ))
            })?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().to_string();
            let Some(stem) = file_name.strip_suffix(&format!(".{}", DATA_FILE_SUFFIX)) else {
                continue;
            };
            let Some((prefix, sequence)) = stem.rsplit_once('_') else {
                continue;
            };
            if prefix != name_prefix {
                continue;
            }
            let sequence = sequence.parse::<u64>().map_err(|_| {
                StoreError::InvalidValue(format!("segment file name: {}", file_name))
            })?;
            sequences.push(sequence);
        }
        sequences.sort_unstable();

        let mut segments = Vec::with_capacity(sequences.len());
        for &sequence in &sequences {
            let segment = LogSegment::create(&dir, &name_prefix, sequence, segment_size, true)?;
            segments.push(Arc::new(segment));
        }
        // every recovered segment except the tail is sealed
        for segment in segments.iter().rev().skip(1) {
            segment.mark_full();
        }
        Self::assert_chain(&name_prefix, &segments)?;

        let last_offset = segments
            .iter()
            .rev()
            .find(|segment| !segment.is_empty())
            .map(|segment| segment.end_offset())
            .unwrap_or(0);
        let last_sequence = sequences.last().copied().unwrap_or(0);

        if !segments.is_empty() {
            info!(
                "recovered {} segment(s) for partition {}, last offset {}",
                segments.len(),
                name_prefix,
                last_offset
            );
        }

        Ok(Self {
            name_prefix,
            dir,
            segments: RwLock::new(segments),
            writer: Mutex::new(WriterCursor {
                tail: None,
                last_sequence,
            }),
            reader_cursor: RwLock::new(None),
            last_offset: AtomicCell::new(last_offset),
            segment_size,
        })
    }

    /// A corrupted recovery could in principle yield overlapping ranges,
    /// which would break offset resolution; refuse to open in that case.
    fn assert_chain(name_prefix: &str, segments: &[Arc<LogSegment>]) -> StoreResult<()> {
        for pair in segments.windows(2) {
            if pair[0].is_empty() || pair[1].is_empty() {
                continue;
            }
            if pair[0].end_offset() >= pair[1].start_offset() {
                return Err(StoreError::CorruptIndex(format!(
                    "partition {}: segments {} and {} have overlapping offset ranges",
                    name_prefix,
                    pair[0].sequence(),
                    pair[1].sequence()
                )));
            }
        }
        Ok(())
    }

    /// Appends a batch of messages, assigning them the next contiguous run
    /// of offsets.
    ///
    /// The batch goes to the tail segment; when the tail overflows, the
    /// remainder is retried against a freshly rolled segment, bounded by
    /// the number of segments the batch needs. `last_offset` advances only
    /// once the entire batch is durable.
    ///
    /// A failed append may still have persisted a prefix of the batch in
    /// earlier segments; callers must not resubmit the same messages
    /// without deduplication.
    pub fn append(&self, messages: &[Message]) -> StoreResult<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let mut writer = self.writer.lock();
        let mut written = 0usize;
        while written < messages.len() {
            let tail = self.ensure_tail(&mut writer)?;
            let batch_start_offset = self.last_offset.load() + 1 + written as i64;
            match tail.append(batch_start_offset, &messages[written..])? {
                AppendOutcome::Appended => written = messages.len(),
                AppendOutcome::Overflow(overflow_at) => {
                    written += overflow_at;
                    self.roll(&mut writer)?;
                }
            }
        }
        self.last_offset.fetch_add(messages.len() as i64);
        Ok(())
    }

    /// Reads up to `count` records starting at `message_offset`.
    ///
    /// Resolves the owning segment (cached cursor first, then binary search
    /// over the chain) and delegates to its memory-mapped reader. A range
    /// crossing a segment boundary is clamped at the boundary; the caller
    /// continues from the next offset on its next call.
    ///
    /// # Returns
    ///
    /// The raw stored bytes of at least one and at most `count` records,
    /// or `NoMessages` when nothing is available at `message_offset` yet.
    pub fn read(&self, message_offset: i64, count: usize) -> StoreResult<Bytes> {
        if count == 0 {
            return Ok(Bytes::new());
        }
        let last_offset = self.last_offset.load();
        if self.segments.read().is_empty() || last_offset == 0 {
            return Err(StoreError::NoMessages);
        }
        if message_offset < 1 {
            return Err(StoreError::InvalidValue(format!(
                "read offset: {}",
                message_offset
            )));
        }
        if message_offset > last_offset {
            return Err(StoreError::NoMessages);
        }

        trace!(
            "partition {} read offset={} count={}",
            self.name_prefix,
            message_offset,
            count
        );

        loop {
            let segment = self.resolve_segment(message_offset)?;
            match segment.read(message_offset, count) {
                // stale cursor: the offset lives in a later segment
                Err(StoreError::EndOfSegment(_)) => {
                    *self.reader_cursor.write() = None;
                }
                other => return other,
            }
        }
    }

    /// Finds the segment whose offset range contains `message_offset`.
    ///
    /// Segments are sorted and non-overlapping, so after the cached cursor
    /// misses, a binary search over the chain snapshot resolves the owner
    /// in O(log segments).
    fn resolve_segment(&self, message_offset: i64) -> StoreResult<Arc<LogSegment>> {
        if let Some(segment) = self.reader_cursor.read().as_ref() {
            if !segment.is_empty()
                && segment.start_offset() <= message_offset
                && message_offset <= segment.end_offset()
            {
                return Ok(segment.clone());
            }
        }

        let segment = {
            let segments = self.segments.read();
            let idx = segments
                .partition_point(|s| !s.is_empty() && s.end_offset() < message_offset);
            segments
                .get(idx)
                .filter(|s| !s.is_empty() && s.start_offset() <= message_offset)
                .cloned()
                .ok_or_else(|| {
                    StoreError::InvalidValue(format!(
                        "no segment found for offset {}",
                        message_offset
                    ))
                })?
        };
        *self.reader_cursor.write() = Some(segment.clone());
        Ok(segment)
    }

    /// Returns the writable tail, lazily creating it: the last recovered
    /// segment is reused while it can still take writes, otherwise a new
    /// segment is rolled.
    fn ensure_tail(&self, writer: &mut WriterCursor) -> StoreResult<Arc<LogSegment>> {
        if let Some(tail) = &writer.tail {
            if !tail.is_full() {
                return Ok(tail.clone());
            }
        } else if let Some(last) = self.segments.read().last() {
            if !last.is_full() {
                writer.tail = Some(last.clone());
                return Ok(last.clone());
            }
        }
        self.roll(writer)
    }

    /// Creates the next segment and publishes it to the chain.
    fn roll(&self, writer: &mut WriterCursor) -> StoreResult<Arc<LogSegment>> {
        let sequence = writer.last_sequence + 1;
        let segment = Arc::new(LogSegment::create(
            &self.dir,
            &self.name_prefix,
            sequence,
            self.segment_size,
            false,
        )?);
        self.segments.write().push(segment.clone());
        writer.last_sequence = sequence;
        writer.tail = Some(segment.clone());
        debug!(
            "partition {} rolled to segment {}",
            self.name_prefix, sequence
        );
        Ok(segment)
    }

    pub fn last_offset(&self) -> i64 {
        self.last_offset.load()
    }

    pub fn name_prefix(&self) -> &str {
        &self.name_prefix
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }
}
