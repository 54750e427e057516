//! Partition log storage.
//!
//! This module provides functionality for:
//! - Segmented, offset-indexed append logs, one per topic partition
//! - Memory-mapped random-offset reads
//! - Crash-safe recovery by directory scan
//! - Storage inventory aggregation across partitions

mod index_record;
mod log_manager;
mod log_segment;
mod partition_log;

// Re-exports
pub use index_record::{decode_index, encode_index, INDEX_RECORD_LEN};
pub use log_manager::{LogManager, PartitionStorage};
pub use log_segment::LogSegment;
pub use partition_log::PartitionLog;

/// Per-segment size limit, in bytes. A segment whose next write would push
/// it past this limit is sealed and a fresh one is opened.
pub const SEGMENT_SIZE_LIMIT: u64 = 1024 * 1024 * 1024;

/// Byte written after every serialized message record in a data file.
pub const MESSAGE_SEPARATOR: u8 = b',';

// File name constants
const DATA_FILE_SUFFIX: &str = "data";
const INDEX_FILE_SUFFIX: &str = "index";

/// Result of appending a batch to one segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The whole batch landed in this segment.
    Appended,
    /// The segment filled up before message `i`; nothing at index `i` or
    /// later was written and the remainder must go to a fresh segment.
    Overflow(usize),
}

/// Builds the file name of one segment file, e.g. `orders-0_3.data`.
fn segment_file_name(name_prefix: &str, sequence: u64, suffix: &str) -> String {
    format!("{}_{}.{}", name_prefix, sequence, suffix)
}
