use rstest::{fixture, rstest};
use tempfile::TempDir;

use graniteq::{
    GeneralConfig, LogConfig, LogManager, Message, PartitionLog, StoreConfig, StoreError,
    TopicPartition, MESSAGE_SEPARATOR, SEGMENT_SIZE_LIMIT,
};

fn msg(text: &str) -> Message {
    Message::new(text.as_bytes().to_vec())
}

/// Messages whose serialized records all have the same length, so a
/// segment size limit can be tuned to hold an exact number of records.
fn fixed_msg(i: usize) -> Message {
    Message::new(format!("{:08}", i).into_bytes())
}

fn stored(message: &Message) -> Vec<u8> {
    serde_json::to_vec(message).unwrap()
}

fn fixed_record_len() -> u64 {
    stored(&fixed_msg(0)).len() as u64 + 1
}

fn store_config(dir: &TempDir, segment_size: u64) -> StoreConfig {
    StoreConfig {
        general: GeneralConfig {
            data_dir: dir.path().to_string_lossy().to_string(),
        },
        log: LogConfig { segment_size },
    }
}

#[fixture]
fn store_dir() -> TempDir {
    tempfile::tempdir().unwrap()
}

#[rstest]
fn test_offsets_are_monotonic_and_round_trip(store_dir: TempDir) {
    let log = PartitionLog::open(store_dir.path(), "orders-0", SEGMENT_SIZE_LIMIT).unwrap();

    let batches = vec![
        vec![msg("first"), msg("second")],
        vec![msg("third")],
        vec![msg("fourth"), msg("fifth"), msg("sixth")],
    ];
    let mut expected = Vec::new();
    for batch in &batches {
        log.append(batch).unwrap();
        expected.extend(batch.iter().cloned());
        assert_eq!(log.last_offset(), expected.len() as i64);
    }

    // offsets start at 1 and every one of them reads back byte-exact
    for (i, message) in expected.iter().enumerate() {
        let bytes = log.read(1 + i as i64, 1).unwrap();
        assert_eq!(&bytes[..], &stored(message)[..]);
    }
}

#[rstest]
#[case(2, 7)]
#[case(3, 10)]
fn test_batch_splits_over_minimum_segment_count(
    store_dir: TempDir,
    #[case] records_per_segment: u64,
    #[case] total: usize,
) {
    let limit = fixed_record_len() * records_per_segment;
    let log = PartitionLog::open(store_dir.path(), "orders-0", limit).unwrap();

    let messages: Vec<Message> = (0..total).map(fixed_msg).collect();
    log.append(&messages).unwrap();

    assert_eq!(log.last_offset(), total as i64);
    let expected_segments = (total as u64).div_ceil(records_per_segment) as usize;
    assert_eq!(log.segment_count(), expected_segments);

    // nothing dropped, nothing duplicated
    for (i, message) in messages.iter().enumerate() {
        let bytes = log.read(1 + i as i64, 1).unwrap();
        assert_eq!(&bytes[..], &stored(message)[..]);
    }
}

#[rstest]
fn test_segment_resolution_over_large_history(store_dir: TempDir) {
    let limit = fixed_record_len() * 100;
    let log = PartitionLog::open(store_dir.path(), "orders-0", limit).unwrap();

    let messages: Vec<Message> = (1..=400usize).map(fixed_msg).collect();
    for batch in messages.chunks(40) {
        log.append(batch).unwrap();
    }
    assert_eq!(log.segment_count(), 4);

    // lands inside the second segment
    let bytes = log.read(150, 10).unwrap();
    let expected = messages[149..159]
        .iter()
        .map(stored)
        .collect::<Vec<_>>()
        .join(&MESSAGE_SEPARATOR);
    assert_eq!(&bytes[..], &expected[..]);

    // clamped at the log end: only record 400 comes back
    let bytes = log.read(400, 5).unwrap();
    assert_eq!(&bytes[..], &stored(&messages[399])[..]);

    // crossing a segment boundary clamps at the boundary
    let bytes = log.read(95, 10).unwrap();
    let expected = messages[94..100]
        .iter()
        .map(stored)
        .collect::<Vec<_>>()
        .join(&MESSAGE_SEPARATOR);
    assert_eq!(&bytes[..], &expected[..]);
}

#[rstest]
fn test_recovery_is_idempotent(store_dir: TempDir) {
    let limit = fixed_record_len() * 4;
    let messages: Vec<Message> = (0..11).map(fixed_msg).collect();

    let (last_offset, segment_count) = {
        let log = PartitionLog::open(store_dir.path(), "orders-0", limit).unwrap();
        log.append(&messages).unwrap();
        (log.last_offset(), log.segment_count())
    };

    let reopened = PartitionLog::open(store_dir.path(), "orders-0", limit).unwrap();
    assert_eq!(reopened.last_offset(), last_offset);
    assert_eq!(reopened.segment_count(), segment_count);
    for (i, message) in messages.iter().enumerate() {
        let bytes = reopened.read(1 + i as i64, 1).unwrap();
        assert_eq!(&bytes[..], &stored(message)[..]);
    }

    // offset assignment resumes where it left off
    reopened.append(&[msg("tail")]).unwrap();
    assert_eq!(reopened.last_offset(), last_offset + 1);
    let bytes = reopened.read(last_offset + 1, 1).unwrap();
    assert_eq!(&bytes[..], &stored(&msg("tail"))[..]);
}

#[rstest]
fn test_empty_log_reports_no_messages(store_dir: TempDir) {
    let manager = LogManager::new(store_config(&store_dir, SEGMENT_SIZE_LIMIT)).unwrap();
    let tp = TopicPartition::new("orders", 0);

    assert!(matches!(
        manager.read(&tp, 1, 10),
        Err(StoreError::NoMessages)
    ));
}

#[rstest]
fn test_read_past_log_end_reports_no_messages(store_dir: TempDir) {
    let manager = LogManager::new(store_config(&store_dir, SEGMENT_SIZE_LIMIT)).unwrap();
    let tp = TopicPartition::new("orders", 0);
    manager.append(&tp, &[msg("only")]).unwrap();

    assert!(matches!(
        manager.read(&tp, 2, 1),
        Err(StoreError::NoMessages)
    ));
}

#[rstest]
fn test_oversized_message_leaves_log_untouched(store_dir: TempDir) {
    let manager = LogManager::new(store_config(&store_dir, 64)).unwrap();
    let tp = TopicPartition::new("orders", 0);

    let huge = Message::new(vec![7u8; 256]);
    assert!(matches!(
        manager.append(&tp, &[huge]),
        Err(StoreError::MessageTooLarge(_))
    ));
    assert_eq!(manager.last_offset(&tp).unwrap(), 0);

    // the log still accepts normal traffic afterwards, starting at offset 1
    manager.append(&tp, &[msg("ok")]).unwrap();
    assert_eq!(manager.last_offset(&tp).unwrap(), 1);
    let bytes = manager.read(&tp, 1, 1).unwrap();
    assert_eq!(&bytes[..], &stored(&msg("ok"))[..]);
}

#[rstest]
fn test_oversized_message_mid_batch_does_not_advance_offsets(store_dir: TempDir) {
    let manager = LogManager::new(store_config(&store_dir, 64)).unwrap();
    let tp = TopicPartition::new("orders", 0);

    let batch = vec![msg("ok"), Message::new(vec![7u8; 256])];
    assert!(matches!(
        manager.append(&tp, &batch),
        Err(StoreError::MessageTooLarge(_))
    ));
    // a prefix of the batch may be durable, but no offset was assigned
    assert_eq!(manager.last_offset(&tp).unwrap(), 0);
}

#[rstest]
fn test_inventory_across_restarts(store_dir: TempDir) {
    let tp_a = TopicPartition::new("orders", 0);
    let tp_b = TopicPartition::new("user-events", 3);
    {
        let manager = LogManager::new(store_config(&store_dir, SEGMENT_SIZE_LIMIT)).unwrap();
        manager.append(&tp_a, &[msg("a1"), msg("a2")]).unwrap();
        manager.append(&tp_b, &[msg("b1")]).unwrap();
    }

    // a fresh manager over the same directory sees the same footprint
    let manager = LogManager::new(store_config(&store_dir, SEGMENT_SIZE_LIMIT)).unwrap();
    let inventory = manager.inventory().unwrap();
    assert_eq!(inventory.len(), 2);

    let by_id = |id: &str| {
        inventory
            .iter()
            .find(|e| e.topic_partition.id() == id)
            .unwrap()
            .size_bytes
    };
    assert_eq!(
        by_id("orders-0"),
        (stored(&msg("a1")).len() + stored(&msg("a2")).len() + 2) as u64
    );
    assert_eq!(by_id("user-events-3"), (stored(&msg("b1")).len() + 1) as u64);
}
