//! E2E tests for the CSV storage sink
//!
//! Output is read back with the `csv` crate the way downstream tooling would.

use niadc::acquisition::channels::ChannelSet;
use niadc::acquisition::ring::{RingBuffer, Row};
use niadc::export::storage::{Storage, StorageError};

fn read_back(path: &std::path::Path) -> (Vec<String>, Vec<Vec<f64>>) {
    let mut reader = csv::Reader::from_path(path).unwrap();
    let header = reader
        .headers()
        .unwrap()
        .iter()
        .map(String::from)
        .collect();
    let rows = reader
        .records()
        .map(|r| r.unwrap().iter().map(|f| f.parse().unwrap()).collect())
        .collect();
    (header, rows)
}

#[test]
fn test_header_follows_configured_channel_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let channels: ChannelSet = "3,0,2".parse().unwrap();
    Storage::create(&path, &channels.columns()).unwrap();

    let (header, rows) = read_back(&path);
    assert_eq!(header, vec!["timestamp", "ch_3", "ch_0", "ch_2"]);
    assert!(rows.is_empty());
}

#[test]
fn test_drained_snapshots_append_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut storage = Storage::create(&path, &["timestamp".into(), "ch_0".into()]).unwrap();
    let mut ring = RingBuffer::new(1, 100).unwrap();

    for k in 0..3 {
        let ts: Vec<f64> = (0..4).map(|i| 1_700_000_000_000_000_000.0 + (k * 4 + i) as f64 * 1e6).collect();
        let values = vec![ts.iter().map(|_| k as f64 + 0.25).collect()];
        ring.push(&ts, &values).unwrap();
        storage.append_rows(&ring.drain().into_rows()).unwrap();
    }

    let (_, rows) = read_back(&path);
    assert_eq!(rows.len(), 12);
    assert_eq!(storage.rows_written(), 12);
    assert!(rows.windows(2).all(|w| w[0][0] < w[1][0]));
    assert_eq!(rows[0][0], 1_700_000_000_000_000_000.0);
    assert_eq!(rows[11][1], 2.25);
}

#[test]
fn test_empty_append_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    let mut storage = Storage::create(&path, &["timestamp".into(), "ch_0".into()]).unwrap();
    assert_eq!(storage.append_rows(&[]).unwrap(), 0);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "timestamp,ch_0\n");
}

#[test]
fn test_existing_output_never_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data.csv");
    {
        let mut first = Storage::create(&path, &["timestamp".into(), "ch_0".into()]).unwrap();
        first
            .append_rows(&[Row {
                timestamp: 1.0,
                values: vec![1.0],
            }])
            .unwrap();
    }

    match Storage::create(&path, &["timestamp".into(), "ch_0".into()]) {
        Err(StorageError::AlreadyExists(p)) => assert_eq!(p, path),
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("existing file was reopened"),
    }
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "timestamp,ch_0\n1,1\n");
}
