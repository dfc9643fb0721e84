//! Integration tests for relation storage under compaction pressure.

use kindred_ecs::prelude::*;

// -- test relation types ----------------------------------------------------

/// Keyed by an integer so tests can store an entity's own index.
#[derive(Debug, Clone, PartialEq)]
struct Score {
    key: u32,
    points: i64,
}

impl Relation for Score {
    type Value = u32;
    fn relation_value(&self) -> u32 {
        self.key
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FriendOf(EntityId);

impl Relation for FriendOf {
    type Value = EntityId;
    fn relation_value(&self) -> EntityId {
        self.0
    }
}

fn setup_world() -> World {
    let mut world = World::new();
    world.register_relation::<Score>("score").unwrap();
    world.register_relation::<FriendOf>("friend_of").unwrap();
    world
}

fn score(key: u32) -> Score {
    Score {
        key,
        points: i64::from(key) * 10,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[test]
fn remove_middle_half_in_reverse_order() {
    let mut world = setup_world();
    let entities: Vec<EntityId> = (0..100).map(|_| world.spawn()).collect();
    for e in &entities {
        assert!(world.add_relation(*e, score(e.index())).unwrap());
    }

    for e in entities[25..75].iter().rev() {
        assert!(world.remove_relation::<Score>(*e, &e.index()).unwrap());
    }

    for (i, e) in entities.iter().enumerate() {
        let values: Vec<&Score> = world.relations::<Score>(*e).collect();
        if (25..75).contains(&i) {
            assert!(values.is_empty(), "entity {e} should have no score");
            assert!(!world.has_relation::<Score>(*e));
        } else {
            assert_eq!(values, vec![&score(e.index())], "entity {e} lost its score");
        }
    }
    assert_eq!(world.relation_store::<Score>().unwrap().len(), 50);
}

#[test]
fn removing_any_single_row_leaves_others_intact() {
    for k in 0..8 {
        let mut world = setup_world();
        let entities: Vec<EntityId> = (0..8).map(|_| world.spawn()).collect();
        for e in &entities {
            world.add_relation(*e, score(e.index())).unwrap();
        }
        let victim = entities[k];
        assert!(world.remove_relation::<Score>(victim, &victim.index()).unwrap());
        for e in entities.iter().filter(|e| **e != victim) {
            assert_eq!(
                world.get_relation::<Score>(*e, &e.index()),
                Some(&score(e.index())),
                "removing entity {victim} corrupted entity {e}"
            );
        }
    }
}

#[test]
fn fan_out_grows_and_shrinks() {
    let mut world = setup_world();
    let hub = world.spawn();
    let others: Vec<EntityId> = (0..40).map(|_| world.spawn()).collect();

    for (n, other) in others.iter().enumerate() {
        assert!(world.add_relation(hub, FriendOf(*other)).unwrap());
        assert_eq!(world.relation_count::<FriendOf>(hub), n + 1);
    }
    // Interleave another entity's rows so compaction crosses owners.
    for other in &others {
        world.add_relation(*other, FriendOf(hub)).unwrap();
    }

    for (n, other) in others.iter().enumerate().filter(|(n, _)| n % 3 != 0) {
        assert!(world.remove_relation::<FriendOf>(hub, other).unwrap(), "missing friend {n}");
    }

    let mut remaining: Vec<EntityId> = world.relations::<FriendOf>(hub).map(|f| f.0).collect();
    remaining.sort();
    let expected: Vec<EntityId> = others.iter().step_by(3).copied().collect();
    assert_eq!(remaining, expected);
    for other in &others {
        assert_eq!(world.relations::<FriendOf>(*other).collect::<Vec<_>>(), vec![&FriendOf(hub)]);
    }
}

#[test]
fn update_keeps_row_count_and_replaces_payload() {
    let mut world = setup_world();
    let e = world.spawn();
    world.add_relation(e, Score { key: 1, points: 5 }).unwrap();
    world.add_relation(e, Score { key: 2, points: 6 }).unwrap();
    assert!(!world.add_relation(e, Score { key: 1, points: 99 }).unwrap());
    assert_eq!(world.relation_count::<Score>(e), 2);
    assert_eq!(
        world.get_relation::<Score>(e, &1),
        Some(&Score { key: 1, points: 99 })
    );
}

#[test]
fn absent_remove_changes_nothing() {
    let mut world = setup_world();
    let a = world.spawn();
    let b = world.spawn();
    world.add_relation(a, score(1)).unwrap();
    let before: Vec<(EntityId, Score)> = world
        .relation_store::<Score>()
        .unwrap()
        .iter()
        .map(|(e, s)| (e, s.clone()))
        .collect();

    assert!(!world.remove_relation::<Score>(a, &2).unwrap());
    assert!(!world.remove_relation::<Score>(b, &1).unwrap());

    let after: Vec<(EntityId, Score)> = world
        .relation_store::<Score>()
        .unwrap()
        .iter()
        .map(|(e, s)| (e, s.clone()))
        .collect();
    assert_eq!(before, after);
    assert!(world.signature(b).is_empty());
}

#[test]
fn despawn_with_many_relations_repairs_survivors() {
    let mut world = setup_world();
    let doomed = world.spawn();
    let survivor = world.spawn();
    for key in 0..12 {
        world.add_relation(doomed, score(key)).unwrap();
        world.add_relation(survivor, score(key)).unwrap();
    }
    assert_eq!(world.despawn(doomed).unwrap(), 12);
    let mut keys: Vec<u32> = world.relations::<Score>(survivor).map(|s| s.key).collect();
    keys.sort_unstable();
    assert_eq!(keys, (0..12).collect::<Vec<_>>());
    assert_eq!(world.entity_count(), 1);
}
