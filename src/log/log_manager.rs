//! Log manager module.
//!
//! Central access point for all partition logs of one storage node. It
//! creates partition logs on first use (recovering whatever is already on
//! disk), routes appends and reads to the owning log, and aggregates the
//! on-disk footprint per topic partition for placement decisions.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::info;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::log::partition_log::PartitionLog;
use crate::log::DATA_FILE_SUFFIX;
use crate::message::{Message, TopicPartition};

/// Aggregate stored byte size of one topic partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionStorage {
    pub topic_partition: TopicPartition,
    pub size_bytes: u64,
}

/// Owns every partition log under one storage directory.
#[derive(Debug)]
pub struct LogManager {
    config: StoreConfig,
    /// Thread-safe map of partition logs indexed by topic partition.
    logs: DashMap<TopicPartition, Arc<PartitionLog>>,
}

impl LogManager {
    pub fn new(config: StoreConfig) -> StoreResult<Self> {
        Self::ensure_dir_exists(&config.general.data_dir)?;
        Ok(Self {
            config,
            logs: DashMap::new(),
        })
    }

    fn ensure_dir_exists(dir: &str) -> StoreResult<()> {
        if !Path::new(dir).exists() {
            info!("data dir does not exist, creating: {}", dir);
            std::fs::create_dir_all(dir).map_err(|e| {
                StoreError::DetailedIoError(format!("create data dir: {} error: {}", dir, e))
            })?;
        }
        Ok(())
    }

    /// Appends a batch of messages to the given partition, assigning the
    /// next contiguous offsets.
    pub fn append(
        &self,
        topic_partition: &TopicPartition,
        messages: &[Message],
    ) -> StoreResult<()> {
        self.partition_log(topic_partition)?.append(messages)
    }

    /// Reads up to `max_count` records from the given partition starting
    /// at `from_offset`, returning their raw stored bytes.
    pub fn read(
        &self,
        topic_partition: &TopicPartition,
        from_offset: i64,
        max_count: usize,
    ) -> StoreResult<Bytes> {
        self.partition_log(topic_partition)?
            .read(from_offset, max_count)
    }

    /// Highest assigned offset of the given partition; 0 when empty.
    pub fn last_offset(&self, topic_partition: &TopicPartition) -> StoreResult<i64> {
        Ok(self.partition_log(topic_partition)?.last_offset())
    }

    /// Walks the storage directory and aggregates data-file sizes by the
    /// topic-partition prefix encoded in the file names.
    ///
    /// Subdirectories and files without the data suffix are ignored by
    /// design; a data file whose name does not parse back into a topic
    /// partition is an error surfaced to the caller.
    pub fn inventory(&self) -> StoreResult<Vec<PartitionStorage>> {
        let data_dir = PathBuf::from(&self.config.general.data_dir);
        let mut sizes: BTreeMap<String, u64> = BTreeMap::new();

        let read_dir = std::fs::read_dir(&data_dir).map_err(|e| {
            StoreError::DetailedIoError(format!(
                "read dir: {} error: {} while taking inventory",
                data_dir.display(),
                e
            ))
        })?;
        for entry in read_dir {
            let entry = entry.map_err(|e| {
                StoreError::DetailedIoError(format!(
                    "read dir: {} error: {} while taking inventory",
                    data_dir.display(),
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
            let (prefix, _sequence) = stem.rsplit_once('_').ok_or_else(|| {
                StoreError::InvalidValue(format!("data file name: {}", file_name))
            })?;
            *sizes.entry(prefix.to_string()).or_default() += entry.metadata()?.len();
        }

        sizes
            .into_iter()
            .map(|(id, size_bytes)| {
                Ok(PartitionStorage {
                    topic_partition: TopicPartition::from_string(Cow::Owned(id))?,
                    size_bytes,
                })
            })
            .collect()
    }

    /// Returns the partition's log, opening it (and recovering its on-disk
    /// state) on first access.
    fn partition_log(&self, topic_partition: &TopicPartition) -> StoreResult<Arc<PartitionLog>> {
        if let Some(log) = self.logs.get(topic_partition) {
            return Ok(log.clone());
        }
        match self.logs.entry(topic_partition.clone()) {
            Entry::Occupied(entry) => Ok(entry.get().clone()),
            Entry::Vacant(entry) => {
                let log = Arc::new(PartitionLog::open(
                    &self.config.general.data_dir,
                    topic_partition.id(),
                    self.config.log.segment_size,
                )?);
                entry.insert(log.clone());
                Ok(log)
            }
        }
    }
}
