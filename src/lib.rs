mod config;
mod error;
mod log;
mod message;
mod telemetry;

pub use config::{GeneralConfig, LogConfig, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use log::{
    decode_index, encode_index, AppendOutcome, LogManager, LogSegment, PartitionLog,
    PartitionStorage, INDEX_RECORD_LEN, MESSAGE_SEPARATOR, SEGMENT_SIZE_LIMIT,
};
pub use message::{Message, TopicPartition};
pub use telemetry::{setup_local_tracing, setup_tracing};
