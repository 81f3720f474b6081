use super::*;
use crate::cluster::types::NodeAddr;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn addr(s: &str) -> NodeAddr {
    NodeAddr::new(s)
}

fn set(key: &str, value: &[u8]) -> Mutation {
    Mutation::Set {
        key: key.to_string(),
        value: value.to_vec(),
    }
}

fn del(key: &str) -> Mutation {
    Mutation::Del {
        key: key.to_string(),
    }
}

async fn open_store(dir: &Path) -> FileOplog {
    FileOplog::open(OplogConfig {
        dir: dir.to_path_buf(),
        fsync_mode: FsyncMode::Always,
    })
    .await
    .unwrap()
}

/// The single log file a node's appends land in
fn log_file_in(dir: &Path) -> PathBuf {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .find(|p| p.extension().is_some_and(|e| e == "oplog"))
        .unwrap()
}

#[tokio::test]
async fn test_append_and_read_all() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    oplog.append(&node, &set("key1", b"value1")).await.unwrap();
    oplog.append(&node, &set("key2", b"value2")).await.unwrap();
    oplog.append(&node, &del("key1")).await.unwrap();

    let entries = oplog.read_all(&node).await.unwrap();
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].mutation, set("key1", b"value1"));
    assert_eq!(entries[1].mutation, set("key2", b"value2"));
    assert_eq!(entries[2].mutation, del("key1"));
    assert!(entries[0].timestamp > 0);
}

#[tokio::test]
async fn test_read_all_missing_log_is_empty() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;

    let entries = oplog.read_all(&addr("127.0.0.1:7001")).await.unwrap();
    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_logs_are_isolated_per_node() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node1 = addr("127.0.0.1:7001");
    let node2 = addr("127.0.0.1:7002");

    oplog.append(&node1, &set("a", b"1")).await.unwrap();
    oplog.append(&node2, &set("b", b"2")).await.unwrap();
    oplog.append(&node2, &set("c", b"3")).await.unwrap();

    assert_eq!(oplog.read_all(&node1).await.unwrap().len(), 1);
    assert_eq!(oplog.read_all(&node2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_replay_collapses_to_latest_state() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    // SET, SET, DEL, SET on the same key: replay must yield the last value
    oplog.append(&node, &set("k", b"1")).await.unwrap();
    oplog.append(&node, &set("k", b"2")).await.unwrap();
    oplog.append(&node, &del("k")).await.unwrap();
    oplog.append(&node, &set("k", b"3")).await.unwrap();

    let grouped = oplog.read_grouped_by_slot(&node).await.unwrap();
    assert_eq!(grouped.len(), 1);

    let slot = crate::cluster::hash_slot::hash_slot("k");
    assert_eq!(grouped[&slot].len(), 1);
    assert_eq!(grouped[&slot]["k"], b"3".to_vec());
}

#[tokio::test]
async fn test_grouping_prunes_emptied_slots() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    oplog.append(&node, &set("gone", b"x")).await.unwrap();
    oplog.append(&node, &del("gone")).await.unwrap();

    let grouped = oplog.read_grouped_by_slot(&node).await.unwrap();
    assert!(grouped.is_empty());
}

#[tokio::test]
async fn test_grouping_keys_by_slot() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    for i in 0..20 {
        let key = format!("key:{}", i);
        oplog.append(&node, &set(&key, b"v")).await.unwrap();
    }

    let grouped = oplog.read_grouped_by_slot(&node).await.unwrap();
    let total: usize = grouped.values().map(|keys| keys.len()).sum();
    assert_eq!(total, 20);

    for (slot, keys) in &grouped {
        for key in keys.keys() {
            assert_eq!(crate::cluster::hash_slot::hash_slot(key), *slot);
        }
    }
}

#[tokio::test]
async fn test_remove_absent_log_is_ok() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;

    oplog.remove(&addr("127.0.0.1:7001")).await.unwrap();
}

#[tokio::test]
async fn test_remove_deletes_log() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    oplog.append(&node, &set("k", b"v")).await.unwrap();
    oplog.remove(&node).await.unwrap();

    assert!(oplog.read_all(&node).await.unwrap().is_empty());
    // Removing twice is still fine
    oplog.remove(&node).await.unwrap();
}

#[tokio::test]
async fn test_recreate_resets_log() {
    let dir = tempdir().unwrap();
    let oplog = open_store(dir.path()).await;
    let node = addr("127.0.0.1:7001");

    oplog.append(&node, &set("k1", b"v1")).await.unwrap();
    oplog.append(&node, &set("k2", b"v2")).await.unwrap();
    oplog.recreate(&node).await.unwrap();

    assert!(oplog.read_all(&node).await.unwrap().is_empty());

    oplog.append(&node, &set("k3", b"v3")).await.unwrap();
    let entries = oplog.read_all(&node).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].mutation, set("k3", b"v3"));
}

#[tokio::test]
async fn test_truncated_tail_is_tolerated() {
    let dir = tempdir().unwrap();
    let node = addr("127.0.0.1:7001");

    {
        let oplog = open_store(dir.path()).await;
        oplog.append(&node, &set("k1", b"v1")).await.unwrap();
        oplog.append(&node, &set("k2", b"v2")).await.unwrap();
    }

    // Simulate a crash mid-append: a length prefix with only part of the
    // header behind it
    let path = log_file_in(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&64u64.to_be_bytes());
    bytes.extend_from_slice(&[0xAB, 0xCD]);
    std::fs::write(&path, bytes).unwrap();

    let oplog = open_store(dir.path()).await;
    let entries = oplog.read_all(&node).await.unwrap();
    assert_eq!(entries.len(), 2);

    // Appends land after the torn bytes, so replay still stops at the tear
    oplog.append(&node, &set("k3", b"v3")).await.unwrap();
    assert_eq!(oplog.read_all(&node).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_corrupt_frame_rejected() {
    let dir = tempdir().unwrap();
    let node = addr("127.0.0.1:7001");

    {
        let oplog = open_store(dir.path()).await;
        oplog.append(&node, &set("k", b"value")).await.unwrap();
    }

    // Flip the last payload byte so the checksum no longer matches
    let path = log_file_in(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    std::fs::write(&path, bytes).unwrap();

    let oplog = open_store(dir.path()).await;
    let result = oplog.read_all(&node).await;
    assert!(matches!(result, Err(OplogError::Corrupt { .. })));
}

#[tokio::test]
async fn test_oversized_length_prefix_treated_as_torn() {
    let dir = tempdir().unwrap();
    let node = addr("127.0.0.1:7001");

    {
        let oplog = open_store(dir.path()).await;
        oplog.append(&node, &set("k", b"v")).await.unwrap();
    }

    let path = log_file_in(dir.path());
    let mut bytes = std::fs::read(&path).unwrap();
    bytes.extend_from_slice(&u64::MAX.to_be_bytes());
    std::fs::write(&path, bytes).unwrap();

    let oplog = open_store(dir.path()).await;
    let entries = oplog.read_all(&node).await.unwrap();
    assert_eq!(entries.len(), 1);
}

#[tokio::test]
async fn test_memory_oplog_matches_file_contract() {
    let oplog = MemoryOplog::new();
    let node = addr("127.0.0.1:7001");

    // Absent log reads empty and removes cleanly
    assert!(oplog.read_all(&node).await.unwrap().is_empty());
    oplog.remove(&node).await.unwrap();

    oplog.append(&node, &set("k", b"1")).await.unwrap();
    oplog.append(&node, &del("k")).await.unwrap();
    assert_eq!(oplog.entry_count(&node), 2);
    assert!(oplog.read_grouped_by_slot(&node).await.unwrap().is_empty());

    oplog.recreate(&node).await.unwrap();
    assert!(oplog.has_log(&node));
    assert_eq!(oplog.entry_count(&node), 0);

    oplog.remove(&node).await.unwrap();
    assert!(!oplog.has_log(&node));
}

#[tokio::test]
async fn test_memory_oplog_append_fault() {
    let oplog = MemoryOplog::new();
    let node = addr("127.0.0.1:7001");

    oplog.fail_appends_for(&node);
    let result = oplog.append(&node, &set("k", b"v")).await;
    assert!(matches!(result, Err(OplogError::Write { .. })));

    // Other nodes are unaffected
    oplog.append(&addr("127.0.0.1:7002"), &set("k", b"v")).await.unwrap();
}

#[tokio::test]
async fn test_memory_oplog_removal_fault() {
    let oplog = MemoryOplog::new();
    let node = addr("127.0.0.1:7001");

    oplog.append(&node, &set("k", b"v")).await.unwrap();
    oplog.fail_removals_for(&node);

    assert!(matches!(
        oplog.remove(&node).await,
        Err(OplogError::Removal { .. })
    ));
    assert!(matches!(
        oplog.recreate(&node).await,
        Err(OplogError::Removal { .. })
    ));

    // The log is still there, untouched
    assert_eq!(oplog.entry_count(&node), 1);
}
