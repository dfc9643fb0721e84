//! Kindred ECS -- one-to-many relation storage for an archetype-style ECS.
//!
//! Regular components hold one value per type per entity. A *relation*
//! lets an entity hold many instances of the same type, distinguished by a
//! value key (for example many `FriendOf(target)` on one entity), while the
//! instances themselves stay in a dense, swap-removed table.
//!
//! The building blocks, leaves first:
//!
//! - [`signature::Signature`]: 256-bit set of the relation types an entity holds.
//! - [`id_array::IdArray`]: per-entity row list, inline for 0 or 1 rows.
//! - [`relation::RelationStore`]: dense table plus entity index for one type.
//! - [`registry::RelationRegistry`]: lazily created stores keyed by type id.
//! - [`world::World`]: entity lifecycle tying the above together.
//!
//! # Quick Start
//!
//! ```
//! use kindred_ecs::prelude::*;
//!
//! #[derive(Debug, Clone, PartialEq)]
//! struct FriendOf(EntityId);
//!
//! impl Relation for FriendOf {
//!     type Value = EntityId;
//!     fn relation_value(&self) -> EntityId { self.0 }
//! }
//!
//! let mut world = World::new();
//! world.register_relation::<FriendOf>("friend_of").unwrap();
//!
//! let alice = world.spawn();
//! let bob = world.spawn();
//! let carol = world.spawn();
//!
//! assert!(world.add_relation(alice, FriendOf(bob)).unwrap());
//! assert!(world.add_relation(alice, FriendOf(carol)).unwrap());
//! assert_eq!(world.relation_count::<FriendOf>(alice), 2);
//!
//! assert!(world.remove_relation::<FriendOf>(alice, &bob).unwrap());
//! assert_eq!(world.relations::<FriendOf>(alice).collect::<Vec<_>>(), vec![&FriendOf(carol)]);
//! ```
//!
//! Nothing here is thread-safe for concurrent mutation. Confine a world to
//! one thread or guard it with a single lock.

#![forbid(unsafe_code)]

pub mod entity;
pub mod id_array;
pub mod registry;
pub mod relation;
pub mod signature;
pub mod world;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors produced by world and registry operations.
///
/// Missing relations are not errors: store operations report them with a
/// `bool`.
#[derive(Debug, thiserror::Error)]
pub enum EcsError {
    /// The entity does not exist (stale generation or never allocated).
    #[error("entity {entity:?} does not exist (stale or never allocated)")]
    StaleEntity { entity: entity::EntityId },

    /// A relation type was used before being registered.
    #[error("relation type '{name}' not registered")]
    UnknownRelation { name: String },

    /// The name is already taken by a different relation type.
    #[error("relation name '{name}' is already registered for a different type")]
    DuplicateRelationName { name: String },

    /// Every signature bit is already assigned.
    #[error("cannot register relation '{name}': all {capacity} signature bits are in use")]
    SignatureFull { name: String, capacity: usize },
}

// ---------------------------------------------------------------------------
// Prelude
// ---------------------------------------------------------------------------

/// Convenience re-exports for common usage.
pub mod prelude {
    pub use crate::entity::{EntityAllocator, EntityId};
    pub use crate::id_array::{IdArray, IdArrayHeap};
    pub use crate::registry::{ErasedRelationStore, RelationRegistry, RelationTypeId};
    pub use crate::relation::{Relation, RelationStore, RelationTable, Relations};
    pub use crate::signature::{EntitySignatures, Signature};
    pub use crate::world::{StoreConfig, World};
    pub use crate::EcsError;
}

// ---------------------------------------------------------------------------
// Integration Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::prelude::*;

    #[derive(Debug, Clone, PartialEq)]
    struct R(char);

    impl Relation for R {
        type Value = char;
        fn relation_value(&self) -> char {
            self.0
        }
    }

    fn setup_world() -> World {
        let mut world = World::new();
        world.register_relation::<R>("r").unwrap();
        world
    }

    #[test]
    fn three_entities_scenario() {
        let mut world = setup_world();
        let e1 = world.spawn();
        let e2 = world.spawn();
        let e3 = world.spawn();
        for e in [e1, e2, e3] {
            assert!(world.add_relation(e, R('A')).unwrap());
        }
        assert!(world.add_relation(e2, R('B')).unwrap());
        assert_eq!(world.relation_count::<R>(e2), 2);

        assert!(world.remove_relation::<R>(e2, &'A').unwrap());
        assert_eq!(world.relation_count::<R>(e2), 1);
        assert_eq!(world.relations::<R>(e2).collect::<Vec<_>>(), vec![&R('B')]);

        assert!(world.remove_relation::<R>(e1, &'A').unwrap());
        assert_eq!(world.relation_count::<R>(e1), 0);
        assert!(!world.has_relation::<R>(e1));
        assert!(world.add_relation(e1, R('A')).unwrap(), "fresh add, not update");
        assert!(world.has_relation::<R>(e1));

        assert_eq!(world.relations::<R>(e3).collect::<Vec<_>>(), vec![&R('A')]);
    }

    #[test]
    fn readd_is_update() {
        let mut world = setup_world();
        let e = world.spawn();
        assert!(world.add_relation(e, R('x')).unwrap());
        assert!(!world.add_relation(e, R('x')).unwrap());
        assert_eq!(world.relation_count::<R>(e), 1);
    }

    #[test]
    fn dead_entity_reads_are_empty() {
        let mut world = setup_world();
        let e = world.spawn();
        world.add_relation(e, R('q')).unwrap();
        world.despawn(e).unwrap();
        assert_eq!(world.relations::<R>(e).count(), 0);
        assert_eq!(world.relation_count::<R>(e), 0);
        assert!(world.signature(e).is_empty());
        assert!(world.get_relation::<R>(e, &'q').is_none());
    }

    #[test]
    fn error_messages_name_the_problem() {
        let err = EcsError::SignatureFull {
            name: "likes".to_owned(),
            capacity: 256,
        };
        assert_eq!(
            err.to_string(),
            "cannot register relation 'likes': all 256 signature bits are in use"
        );
    }
}
