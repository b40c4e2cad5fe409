//! End-to-end update cycle tests: accumulate, merge, decay, expire.

use kala_map::core::{SpatialKey, WorldPoint};
use kala_map::{DecayConfig, MapConfig, OccupancyTree, RayVisitSet, TreeConfig, UpdateAccumulator};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn test_config(depth: u8, decay: DecayConfig) -> MapConfig {
    MapConfig {
        tree: TreeConfig {
            depth,
            ..TreeConfig::default()
        },
        decay,
    }
}

#[test]
fn full_cycle_insert_decay_expire() {
    let decay = DecayConfig {
        a_coeff: 1.0 / 25.0,
        c_coeff: 2.0,
        free_timeout: None,
    };
    let mut tree = OccupancyTree::new(test_config(6, decay)).unwrap();
    let mut update = UpdateAccumulator::new(6);

    // Cycle at t=0: a small obstacle with free space around it
    let obstacle = SpatialKey::new(40, 30, 32);
    update
        .set_bounds(SpatialKey::new(20, 20, 28), SpatialKey::new(44, 44, 36))
        .unwrap();
    update.insert_occupied(obstacle);
    for x in 30..40 {
        update.insert_free(SpatialKey::new(x, 30, 32));
    }
    update.finish();
    tree.advance_clock(0);
    tree.apply_update(&update).unwrap();

    let (node, _) = tree.search(obstacle).unwrap();
    assert!(tree.is_occupied(node));
    assert!(!tree.is_occupied(tree.search(SpatialKey::new(35, 30, 32)).unwrap().0));

    // One observation buys c_coeff + one quadratic step = 2 seconds
    tree.expire_nodes(0);
    let expiry = tree.search(obstacle).unwrap().0.expiry.unwrap();
    assert_eq!(expiry, 2);

    // Just before the deadline the obstacle survives; at the deadline it
    // goes, while untimed free space stays
    assert!(tree.search(obstacle).is_some());
    tree.expire_nodes(expiry - 1);
    assert!(tree.search(obstacle).is_some());
    tree.expire_nodes(expiry);
    assert!(tree.search(obstacle).is_none() || !tree.is_occupied(tree.search(obstacle).unwrap().0));
    assert!(tree.search(SpatialKey::new(35, 30, 32)).is_some());
}

#[test]
fn merge_equivalent_to_individual_updates() {
    let mut rng = StdRng::seed_from_u64(0x6b616c61);
    for round in 0..20 {
        let decay = DecayConfig::default();
        let mut batched = OccupancyTree::new(test_config(5, decay.clone())).unwrap();
        let mut individual = OccupancyTree::new(test_config(5, decay)).unwrap();
        let now = rng.gen_range(0..10_000);
        batched.advance_clock(now);
        individual.advance_clock(now);

        let mut update = UpdateAccumulator::new(5);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(31, 31, 31))
            .unwrap();

        let mut keys = Vec::new();
        for _ in 0..rng.gen_range(10..200) {
            let key = SpatialKey::new(
                rng.gen_range(0..32),
                rng.gen_range(0..32),
                rng.gen_range(0..32),
            );
            let occupied = rng.gen_bool(0.3);
            if occupied {
                update.insert_occupied(key);
            } else {
                update.insert_free(key);
            }
            keys.push(key);
        }
        update.finish();
        batched.apply_update(&update).unwrap();

        // The accumulator resolved duplicate observations already; replay
        // its final decision per voxel
        let mut seen = RayVisitSet::new(5);
        seen.set_bounds(SpatialKey::ZERO, SpatialKey::new(31, 31, 31))
            .unwrap();
        for key in &keys {
            if !seen.insert(*key) {
                continue;
            }
            let state = update.find(*key);
            individual
                .update_occupancy(*key, state.is_occupied())
                .unwrap();
        }

        for key in &keys {
            let (a, level_a) = batched.search(*key).unwrap();
            let (b, level_b) = individual.search(*key).unwrap();
            assert_eq!(level_a, level_b, "round {}: level mismatch at {:?}", round, key);
            assert!(
                (a.log_odds - b.log_odds).abs() < 1e-5,
                "round {}: log odds mismatch at {:?}: {} vs {}",
                round,
                key,
                a.log_odds,
                b.log_odds
            );
            assert_eq!(a.stamp, b.stamp, "round {}: stamp mismatch at {:?}", round, key);
        }
    }
}

#[test]
fn aggregates_hold_after_mixed_workload() {
    let mut rng = StdRng::seed_from_u64(7);
    let decay = DecayConfig {
        a_coeff: 0.5,
        c_coeff: 30.0,
        free_timeout: Some(600),
    };
    let mut tree = OccupancyTree::new(test_config(5, decay)).unwrap();

    for cycle in 0u32..10 {
        let now = cycle * 7;
        tree.advance_clock(now);
        let mut update = UpdateAccumulator::new(5);
        update
            .set_bounds(SpatialKey::ZERO, SpatialKey::new(31, 31, 31))
            .unwrap();
        for _ in 0..100 {
            let key = SpatialKey::new(
                rng.gen_range(0..32),
                rng.gen_range(0..32),
                rng.gen_range(0..32),
            );
            if rng.gen_bool(0.4) {
                update.insert_occupied(key);
            } else {
                update.insert_free(key);
            }
        }
        update.finish();
        tree.apply_update(&update).unwrap();
        if cycle % 3 == 2 {
            tree.expire_nodes(now);
        }
    }

    // Every stored leaf must be clamped and stamped no later than the clock
    let clock = tree.last_update_time();
    let config = tree.config().clone();
    let mut leaf_count = 0;
    for leaf in tree.leaves() {
        leaf_count += 1;
        assert!(leaf.node.log_odds >= config.clamp_min - 1e-6);
        assert!(leaf.node.log_odds <= config.clamp_max + 1e-6);
        assert!(leaf.node.stamp <= clock);
        if let Some(expiry) = leaf.node.expiry {
            assert!(expiry >= leaf.node.stamp);
        }
    }
    assert!(leaf_count > 0);

    // A sweep right after another removes nothing
    tree.expire_nodes(clock);
    assert_eq!(tree.expire_nodes(clock), 0);
}

#[test]
fn bounded_region_world_round_trip() {
    let decay = DecayConfig::default();
    let mut tree = OccupancyTree::new(test_config(16, decay)).unwrap();
    let mut update = UpdateAccumulator::new(16);

    let origin = WorldPoint::new(1.0, -2.0, 0.3);
    let (min, max) = tree.calculate_bounds(5.0, 0.5, 0.5, origin);
    update.set_bounds(min, max).unwrap();

    let hit_point = WorldPoint::new(3.0, -2.0, 0.3);
    let hit = tree.coord_to_key(hit_point).unwrap();
    assert!(update.insert_occupied(hit));
    // Outside the bounded region: silently ignored
    let far = tree.coord_to_key(WorldPoint::new(50.0, 0.0, 0.0)).unwrap();
    assert!(!update.insert_occupied(far));

    update.finish();
    tree.advance_clock(1);
    tree.apply_update(&update).unwrap();

    let leaves: Vec<_> = tree.occupied_leaves().collect();
    assert_eq!(leaves.len(), 1);
    let center = tree.key_to_coord(leaves[0].key, leaves[0].level);
    assert!((center.x - hit_point.x).abs() < tree.config().resolution);
    assert!((center.y - hit_point.y).abs() < tree.config().resolution);
    assert!((center.z - hit_point.z).abs() < tree.config().resolution);
}

#[test]
fn moving_platform_evicts_stale_map() {
    let decay = DecayConfig::default();
    let mut tree = OccupancyTree::new(test_config(16, decay)).unwrap();

    let start = WorldPoint::ZERO;
    for x in 0..20 {
        let key = tree
            .coord_to_key(WorldPoint::new(x as f32 * 0.1, 0.0, 0.0))
            .unwrap();
        tree.update_occupancy(key, true).unwrap();
    }
    let stored = tree.node_count();
    assert!(stored > 0);

    // The platform moved far away; drop everything outside its new window
    let far = WorldPoint::new(100.0, 100.0, 0.0);
    let (min, max) = tree.calculate_bounds(5.0, 2.0, 2.0, far);
    let removed = tree.expire_out_of_bounds(min, max);
    assert!(removed > 0);
    assert!(tree.is_empty());

    // Window around the original data keeps it
    let mut tree2 = OccupancyTree::new(test_config(16, DecayConfig::default())).unwrap();
    let key = tree2.coord_to_key(start).unwrap();
    tree2.update_occupancy(key, true).unwrap();
    let (min, max) = tree2.calculate_bounds(5.0, 2.0, 2.0, start);
    assert_eq!(tree2.expire_out_of_bounds(min, max), 0);
    assert!(!tree2.is_empty());
}
