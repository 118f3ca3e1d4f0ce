//! Property tests: random write/delete sequences against a SimTable
//!
//! After every step the table is checked against a plain map of live
//! vectors, and the neighbor structures are checked against each other.

use std::collections::BTreeMap;

use proptest::prelude::*;

use simdb_core::{DocId, TableConfig};
use simdb_engine::SimTable;

#[derive(Debug, Clone)]
enum Step {
    Upsert { id: u32, vector: Vec<f32> },
    Delete { id: u32 },
    Compact,
}

const ID_SPACE: u32 = 12;
const DIMENSION: usize = 3;

fn doc(id: u32) -> DocId {
    DocId::new(id).unwrap()
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        6 => (0..ID_SPACE, prop::collection::vec(-1.0f32..1.0, DIMENSION))
            .prop_map(|(id, vector)| Step::Upsert { id, vector }),
        2 => (0..ID_SPACE).prop_map(|id| Step::Delete { id }),
        1 => Just(Step::Compact),
    ]
}

fn apply(table: &mut SimTable, model: &mut BTreeMap<u32, Vec<f32>>, step: &Step) {
    match step {
        Step::Upsert { id, vector } => {
            table.insert_or_update(doc(*id), vector).unwrap();
            model.insert(*id, vector.clone());
        }
        Step::Delete { id } => {
            let existed = table.delete(doc(*id));
            assert_eq!(existed, model.remove(id).is_some());
        }
        Step::Compact => {
            let compacted = table.compact();
            for id in 0..ID_SPACE {
                assert_eq!(compacted.retrieve(doc(id)), table.retrieve(doc(id)));
            }
            assert_eq!(compacted.tombstoned(), 0);
            *table = compacted;
        }
    }
}

fn check_structure(table: &SimTable, model: &BTreeMap<u32, Vec<f32>>, max_neighbors: usize) {
    assert_eq!(table.len(), model.len());
    assert!(table.neighbor_index().is_consistent());

    for id in 0..ID_SPACE {
        let live = model.contains_key(&id);
        assert_eq!(table.contains(doc(id)), live);
        assert_eq!(table.vector(doc(id)), model.get(&id).map(Vec::as_slice));

        let list = table.retrieve(doc(id));
        if !live {
            assert!(list.is_empty(), "deleted doc {} still has neighbors", id);
            assert_eq!(table.admission_threshold(doc(id)), None);
            continue;
        }
        assert!(list.len() <= max_neighbors);
        for pair in list.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        for neighbor in &list {
            assert_ne!(neighbor.id, doc(id));
            assert!(
                model.contains_key(&neighbor.id.as_u32()),
                "doc {} lists deleted doc {}",
                id,
                neighbor.id
            );
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]

    #[test]
    fn neighbor_lists_stay_bounded_and_consistent(
        steps in prop::collection::vec(step(), 1..60),
        max_neighbors in 1usize..5,
    ) {
        let mut table = SimTable::new(TableConfig::new(0.75, max_neighbors).unwrap()).unwrap();
        let mut model = BTreeMap::new();

        for step in &steps {
            apply(&mut table, &mut model, step);
            check_structure(&table, &model, max_neighbors);
        }
    }

    #[test]
    fn thresholds_never_decrease_while_live(
        steps in prop::collection::vec(step(), 1..60),
        max_neighbors in 1usize..4,
    ) {
        let mut table = SimTable::new(TableConfig::new(0.75, max_neighbors).unwrap()).unwrap();
        let mut model = BTreeMap::new();

        for step in &steps {
            let before: Vec<Option<f32>> =
                (0..ID_SPACE).map(|id| table.admission_threshold(doc(id))).collect();
            apply(&mut table, &mut model, step);

            for id in 0..ID_SPACE {
                if let Step::Delete { id: deleted } = step {
                    if *deleted == id {
                        continue;
                    }
                }
                if let (Some(old), Some(new)) = (before[id as usize], table.admission_threshold(doc(id))) {
                    prop_assert!(new >= old, "threshold of {} fell from {} to {}", id, old, new);
                }
                if before[id as usize].is_some() {
                    prop_assert!(table.admission_threshold(doc(id)).is_some());
                }
            }
        }
    }

    #[test]
    fn codec_roundtrip_is_byte_identical(
        steps in prop::collection::vec(step(), 0..40),
        max_neighbors in 1usize..5,
    ) {
        let config = TableConfig::new(0.75, max_neighbors).unwrap();
        let mut table = SimTable::new(config).unwrap();
        let mut model = BTreeMap::new();
        for step in &steps {
            apply(&mut table, &mut model, step);
        }

        let bytes = table.serialize().unwrap();
        let restored = SimTable::deserialize(config, &bytes).unwrap();
        prop_assert_eq!(restored.serialize().unwrap(), bytes);
        for id in 0..ID_SPACE {
            prop_assert_eq!(restored.retrieve(doc(id)), table.retrieve(doc(id)));
        }
        check_structure(&restored, &model, max_neighbors);
    }
}
