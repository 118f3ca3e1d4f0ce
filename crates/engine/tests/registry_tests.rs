//! Integration tests for SimBase: persistence across reopen, compaction and
//! concurrent access.

use std::sync::Arc;
use std::thread;

use simdb_core::{DocId, SimError, TableConfig};
use simdb_engine::{Manifest, SimBase, SimDbConfig, CONFIG_FILE_NAME};
use tempfile::TempDir;

fn doc(id: u32) -> DocId {
    DocId::new(id).unwrap()
}

fn ids(base: &SimBase, name: &str, id: u32) -> Vec<u32> {
    base.retrieve(name, doc(id))
        .iter()
        .map(|n| n.id.as_u32())
        .collect()
}

fn small_config() -> SimDbConfig {
    SimDbConfig {
        cron_interval_ms: 0,
        max_neighbors: 2,
        ..SimDbConfig::default()
    }
}

#[test]
fn test_open_creates_layout() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("data");

    let base = SimBase::open(&path).unwrap();
    assert!(path.join(CONFIG_FILE_NAME).exists());
    assert!(base.collections().is_empty());

    base.add("docs", doc(1), &[1.0, 0.0]).unwrap();
    base.save_all().unwrap();
    assert!(path.join("keys.idx").exists());
    assert!(path.join("docs.dmp").exists());
}

#[test]
fn test_reopen_preserves_neighbors_and_cascade() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    {
        let base = SimBase::open_with_config(path, small_config()).unwrap();
        base.add("docs", doc(1), &[0.6, 0.8]).unwrap();
        base.add("docs", doc(2), &[0.6, 0.8]).unwrap();
        base.add("docs", doc(3), &[0.0, 1.0]).unwrap();
        base.save_all().unwrap();
    }

    let base = SimBase::open(path).unwrap();
    assert_eq!(base.table_config().max_neighbors, 2);
    assert_eq!(ids(&base, "docs", 1), vec![2, 3]);
    assert_eq!(ids(&base, "docs", 3), vec![1, 2]);

    // Reverse references were rebuilt, so the delete reaches both lists
    assert!(base.delete("docs", doc(2)).unwrap());
    assert_eq!(ids(&base, "docs", 1), vec![3]);
    assert_eq!(ids(&base, "docs", 3), vec![1]);
}

#[test]
fn test_writes_after_reload_continue_admission() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    {
        let base = SimBase::open_with_config(path, small_config()).unwrap();
        base.add("docs", doc(1), &[0.6, 0.8]).unwrap();
        base.add("docs", doc(2), &[0.6, 0.8]).unwrap();
        base.add("docs", doc(3), &[0.0, 1.0]).unwrap();
        base.add("docs", doc(5), &[0.59, 0.8]).unwrap();
        base.save("docs").unwrap();
    }

    let base = SimBase::open(path).unwrap();
    let table = base.table("docs").unwrap();
    let water = table.read().admission_threshold(doc(1)).unwrap();
    assert!(water > 0.6);

    // Too weak for doc 1's restored water line
    base.add("docs", doc(4), &[0.8, 0.0]).unwrap();
    assert_eq!(ids(&base, "docs", 1), vec![2, 5]);
    assert_eq!(table.read().dimension(), Some(2));
}

#[test]
fn test_compaction_survives_save() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    let before;
    {
        let base = SimBase::open_with_config(path, small_config()).unwrap();
        for id in 1..=6u32 {
            let angle = id as f32 * 0.3;
            base.add("docs", doc(id), &[angle.cos(), angle.sin()]).unwrap();
        }
        base.delete("docs", doc(2)).unwrap();
        base.delete("docs", doc(4)).unwrap();
        before = (1..=6).map(|id| ids(&base, "docs", id)).collect::<Vec<_>>();

        base.compact("docs").unwrap();
        let table = base.table("docs").unwrap();
        assert_eq!(table.read().tombstoned(), 0);
        assert_eq!(table.read().store_slots(), 4 * 4);
        base.save_all().unwrap();
    }

    let base = SimBase::open(path).unwrap();
    let after = (1..=6).map(|id| ids(&base, "docs", id)).collect::<Vec<_>>();
    assert_eq!(after, before);
}

#[test]
fn test_manifest_lists_only_loadable_collections() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    {
        let base = SimBase::open(path).unwrap();
        base.add("kept", doc(1), &[1.0]).unwrap();
        base.save_all().unwrap();
    }
    // A collection listed in the manifest whose dump vanished
    Manifest::new(path).write_names(&["kept", "lost"]).unwrap();

    let base = SimBase::open(path).unwrap();
    assert_eq!(base.collections(), vec!["kept"]);
}

#[test]
fn test_truncated_dump_is_corrupt() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path();

    {
        let base = SimBase::open(path).unwrap();
        base.add("docs", doc(1), &[0.6, 0.8]).unwrap();
        base.add("docs", doc(2), &[0.0, 1.0]).unwrap();
        base.save_all().unwrap();
    }
    let dump = path.join("docs.dmp");
    let bytes = std::fs::read(&dump).unwrap();
    std::fs::write(&dump, &bytes[..bytes.len() - 3]).unwrap();

    let err = SimBase::open(path).unwrap_err();
    assert!(matches!(err, SimError::CorruptPersistedState(_)));
}

#[test]
fn test_concurrent_writers_on_separate_collections() {
    let base = Arc::new(SimBase::ephemeral(TableConfig::new(0.75, 5).unwrap()).unwrap());

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let base = Arc::clone(&base);
            thread::spawn(move || {
                let name = format!("col{}", t);
                for id in 0..50u32 {
                    let x = (id as f32 + 1.0) / 50.0;
                    base.add(&name, doc(id), &[x, 1.0 - x, 0.5]).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(base.collections().len(), 4);
    for t in 0..4 {
        let name = format!("col{}", t);
        let table = base.table(&name).unwrap();
        let guard = table.read();
        assert_eq!(guard.len(), 50);
        assert!(guard.neighbor_index().is_consistent());
        assert_eq!(guard.retrieve(doc(0)).len(), 5);
    }
}

#[test]
fn test_readers_during_writes() {
    let base = Arc::new(SimBase::ephemeral(TableConfig::default()).unwrap());
    base.add("docs", doc(0), &[1.0, 0.0]).unwrap();

    let writer = {
        let base = Arc::clone(&base);
        thread::spawn(move || {
            for id in 1..200u32 {
                let angle = id as f32 * 0.01;
                base.add("docs", doc(id), &[angle.cos(), angle.sin()]).unwrap();
                if id % 7 == 0 {
                    base.delete("docs", doc(id - 3)).unwrap();
                }
            }
        })
    };
    let reader = {
        let base = Arc::clone(&base);
        thread::spawn(move || {
            for _ in 0..200 {
                let list = base.retrieve("docs", doc(0));
                assert!(list.len() <= 20);
                for pair in list.windows(2) {
                    assert!(pair[0].score >= pair[1].score);
                }
            }
        })
    };
    writer.join().unwrap();
    reader.join().unwrap();

    let table = base.table("docs").unwrap();
    assert!(table.read().neighbor_index().is_consistent());
}
