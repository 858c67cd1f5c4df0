//! Merge Sort Property Tests
//!
//! Randomized, seeded runs checking properties that must hold for every
//! input:
//! - Output is ordered and is a permutation of the children's records
//! - Dedup emits each record exactly once
//! - Deletions while yielded never break ordering or duplicate records

use std::collections::{BTreeMap, BTreeSet};

use aeroquery::config::ExecConfig;
use aeroquery::executor::{
    FetchStage, IndexScan, IndexScanParams, MergeSortParams, MergeSortStage, PlanRunner,
    SortPattern,
};
use aeroquery::index::{IndexKey, KeyPattern};
use aeroquery::storage::{Collection, RecordLocation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

// =============================================================================
// Test Utilities
// =============================================================================

const SEEDS: [u64; 5] = [1, 7, 42, 1337, 90210];

/// Collection where document `id` belongs to every group in `groups[id]`.
/// Group `g` is indexed as `m{g}:1,c:1`.
fn build(groups: &[Vec<usize>], values: &[i64], num_groups: usize) -> (Collection, Vec<RecordLocation>) {
    let mut coll = Collection::new("prop");
    let mut locs = Vec::new();
    for (id, member_of) in groups.iter().enumerate() {
        let mut doc = json!({ "id": id, "c": values[id] });
        for g in member_of {
            doc[format!("m{}", g).as_str()] = json!(1);
        }
        locs.push(coll.insert(doc).unwrap());
    }
    for g in 0..num_groups {
        coll.create_index(KeyPattern::parse(&format!("m{}:1,c:1", g)).unwrap())
            .unwrap();
    }
    (coll, locs)
}

fn runner_for(num_groups: usize, sort: &str, dedup: bool, config: &ExecConfig) -> PlanRunner {
    let params = MergeSortParams::new(SortPattern::parse(sort).unwrap()).with_dedup(dedup);
    let mut merge = MergeSortStage::new(params);
    for g in 0..num_groups {
        let params = IndexScanParams::new(format!("m{}_1_c_1", g), vec![IndexKey::from_int(1)]);
        merge.add_child(Box::new(IndexScan::new(params))).unwrap();
    }
    PlanRunner::new(Box::new(FetchStage::new(Box::new(merge))), config)
}

fn ids_and_cs(docs: &[Value]) -> (Vec<u64>, Vec<i64>) {
    let ids = docs.iter().map(|d| d["id"].as_u64().unwrap()).collect();
    let cs = docs.iter().map(|d| d["c"].as_i64().unwrap()).collect();
    (ids, cs)
}

// =============================================================================
// Ordering And Completeness
// =============================================================================

/// Disjoint children: output is the sorted union of all records.
#[test]
fn test_disjoint_merge_is_sorted_permutation() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let num_groups = rng.gen_range(1..8);
        let n = rng.gen_range(0..200);
        let groups: Vec<Vec<usize>> = (0..n).map(|_| vec![rng.gen_range(0..num_groups)]).collect();
        let values: Vec<i64> = (0..n).map(|_| rng.gen_range(-50..50)).collect();
        let (coll, _) = build(&groups, &values, num_groups);

        let mut runner = runner_for(num_groups, "c:1", true, &ExecConfig::default());
        let docs = runner.collect_all(&coll).unwrap().bodies();
        let (ids, cs) = ids_and_cs(&docs);

        assert!(cs.windows(2).all(|w| w[0] <= w[1]), "seed {}", seed);
        let mut expected = values.clone();
        expected.sort();
        assert_eq!(cs, expected, "seed {}", seed);
        assert_eq!(ids.iter().collect::<BTreeSet<_>>().len(), n, "seed {}", seed);
    }
}

/// Descending pattern over descending indexes.
#[test]
fn test_descending_merge_is_sorted() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let num_groups = rng.gen_range(1..5);
        let n = rng.gen_range(1..100);
        let mut coll = Collection::new("prop");
        for _ in 0..n {
            let g = rng.gen_range(0..num_groups);
            let mut doc = json!({ "c": rng.gen_range(0..20) });
            doc[format!("m{}", g).as_str()] = json!(1);
            coll.insert(doc).unwrap();
        }
        let params = MergeSortParams::new(SortPattern::parse("c:-1").unwrap());
        let mut merge = MergeSortStage::new(params);
        for g in 0..num_groups {
            let name = coll
                .create_index(KeyPattern::parse(&format!("m{}:1,c:-1", g)).unwrap())
                .unwrap();
            merge
                .add_child(Box::new(IndexScan::new(IndexScanParams::new(
                    name,
                    vec![IndexKey::from_int(1)],
                ))))
                .unwrap();
        }
        let mut runner = PlanRunner::new(Box::new(FetchStage::new(Box::new(merge))), &ExecConfig::default());
        let docs = runner.collect_all(&coll).unwrap().bodies();
        let cs: Vec<i64> = docs.iter().map(|d| d["c"].as_i64().unwrap()).collect();

        assert_eq!(cs.len(), n, "seed {}", seed);
        assert!(cs.windows(2).all(|w| w[0] >= w[1]), "seed {}", seed);
    }
}

// =============================================================================
// Dedup
// =============================================================================

/// Overlapping children: dedup emits every record once, no dedup emits
/// one copy per membership.
#[test]
fn test_overlapping_membership() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let num_groups = rng.gen_range(2..6);
        let n = rng.gen_range(1..120);
        let groups: Vec<Vec<usize>> = (0..n)
            .map(|_| {
                let picked: BTreeSet<usize> =
                    (0..rng.gen_range(1..=num_groups)).map(|_| rng.gen_range(0..num_groups)).collect();
                picked.into_iter().collect()
            })
            .collect();
        let values: Vec<i64> = (0..n).map(|_| rng.gen_range(0..30)).collect();
        let (coll, _) = build(&groups, &values, num_groups);

        let mut deduped = runner_for(num_groups, "c:1", true, &ExecConfig::default());
        let docs = deduped.collect_all(&coll).unwrap().bodies();
        let (ids, cs) = ids_and_cs(&docs);
        assert_eq!(ids.len(), n, "seed {}", seed);
        assert_eq!(ids.iter().collect::<BTreeSet<_>>().len(), n, "seed {}", seed);
        assert!(cs.windows(2).all(|w| w[0] <= w[1]), "seed {}", seed);

        let memberships: usize = groups.iter().map(Vec::len).sum();
        let mut all = runner_for(num_groups, "c:1", false, &ExecConfig::default());
        let docs = all.collect_all(&coll).unwrap().bodies();
        let (ids, cs) = ids_and_cs(&docs);
        assert_eq!(ids.len(), memberships, "seed {}", seed);
        assert!(cs.windows(2).all(|w| w[0] <= w[1]), "seed {}", seed);

        let mut copies: BTreeMap<u64, usize> = BTreeMap::new();
        for id in ids {
            *copies.entry(id).or_default() += 1;
        }
        for (id, count) in copies {
            assert_eq!(count, groups[id as usize].len(), "seed {}", seed);
        }
    }
}

// =============================================================================
// Deletes While Yielded
// =============================================================================

/// Random deletes between results. Every surviving record is emitted,
/// output stays ordered and nothing is emitted twice.
#[test]
fn test_random_deletes_while_yielded() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let num_groups = rng.gen_range(1..6);
        let n = rng.gen_range(10..150);
        let groups: Vec<Vec<usize>> = (0..n).map(|_| vec![rng.gen_range(0..num_groups)]).collect();
        let values: Vec<i64> = (0..n).map(|_| rng.gen_range(0..40)).collect();
        let (mut coll, locs) = build(&groups, &values, num_groups);

        let config = ExecConfig {
            yield_every_works: rng.gen_range(0..4),
            ..ExecConfig::default()
        };
        let mut runner = runner_for(num_groups, "c:1", true, &config);
        let mut deleted = BTreeSet::new();
        let mut emitted = Vec::new();

        loop {
            if rng.gen_bool(0.3) {
                let victim = rng.gen_range(0..n);
                if deleted.insert(victim) {
                    runner.save_state();
                    runner.remove_document(&mut coll, locs[victim]).unwrap();
                    runner.restore_state();
                }
            }
            match runner.get_next(&coll).unwrap() {
                Some(doc) => emitted.push(doc.body),
                None => break,
            }
        }

        let (ids, cs) = ids_and_cs(&emitted);
        assert!(cs.windows(2).all(|w| w[0] <= w[1]), "seed {}", seed);
        let unique: BTreeSet<u64> = ids.iter().copied().collect();
        assert_eq!(unique.len(), ids.len(), "seed {}", seed);
        for id in 0..n {
            if !deleted.contains(&id) {
                assert!(unique.contains(&(id as u64)), "seed {} lost record {}", seed, id);
            }
        }
        assert!(runner.working_set().is_empty(), "seed {}", seed);
    }
}
