use std::borrow::Cow;
use std::fmt::{Display, Formatter};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A single message record as stored in a partition log.
///
/// The on-disk form is the serde_json serialization of this struct,
/// followed by a one-byte separator.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub body: Bytes,
}

impl Message {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self { body: body.into() }
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl Display for TopicPartition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

impl TopicPartition {
    pub fn new(topic: impl Into<String>, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }

    /// Stable identifier used as the file name prefix for every segment
    /// file of this partition.
    pub fn id(&self) -> String {
        format!("{}-{}", self.topic, self.partition)
    }

    pub fn from_string(str_name: Cow<str>) -> StoreResult<Self> {
        let (topic, partition) = str_name.rsplit_once('-').ok_or_else(|| {
            StoreError::InvalidValue(format!("topic partition name: {}", str_name))
        })?;

        let partition = partition
            .parse()
            .map_err(|_| StoreError::InvalidValue(format!("topic partition id: {}", partition)))?;

        Ok(Self::new(topic.to_string(), partition))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_partition_id_round_trip() {
        let tp = TopicPartition::new("orders", 3);
        assert_eq!(tp.id(), "orders-3");
        assert_eq!(TopicPartition::from_string(Cow::Owned(tp.id())).unwrap(), tp);
    }

    #[test]
    fn test_topic_with_dash_splits_on_last() {
        let tp = TopicPartition::from_string(Cow::Borrowed("user-events-12")).unwrap();
        assert_eq!(tp.topic, "user-events");
        assert_eq!(tp.partition, 12);
    }

    #[test]
    fn test_malformed_name_is_rejected() {
        assert!(TopicPartition::from_string(Cow::Borrowed("nodash")).is_err());
        assert!(TopicPartition::from_string(Cow::Borrowed("topic-x")).is_err());
    }
}
