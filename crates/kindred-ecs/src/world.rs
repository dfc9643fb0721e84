//! The [`World`] owns entity allocation, per-entity signatures, and the
//! relation registry, and is the only place that ties their lifecycles
//! together: despawning an entity clears every relation it holds before the
//! id is recycled.

use serde::{Deserialize, Serialize};

use crate::entity::{EntityAllocator, EntityId};
use crate::registry::{RelationRegistry, RelationTypeId};
use crate::relation::{Relation, RelationStore, Relations};
use crate::signature::{EntitySignatures, Signature};
use crate::EcsError;

// ---------------------------------------------------------------------------
// StoreConfig
// ---------------------------------------------------------------------------

/// Initial sizing for a world and the relation stores it creates.
///
/// ```
/// use kindred_ecs::world::StoreConfig;
///
/// let config = StoreConfig { initial_table_capacity: 1024, ..Default::default() };
/// assert_eq!(config.initial_entity_capacity, 0);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Rows reserved in each relation store's dense table.
    pub initial_table_capacity: usize,
    /// Entities reserved in each relation store's index and in the world's
    /// allocator and signature table.
    pub initial_entity_capacity: usize,
}

impl Default for StoreConfig {
    /// Defaults to no preallocation; storage grows on demand.
    fn default() -> Self {
        Self {
            initial_table_capacity: 0,
            initial_entity_capacity: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// World
// ---------------------------------------------------------------------------

/// The top-level container for entities and their relations.
///
/// Not thread-safe for concurrent mutation; confine a world to one thread
/// or guard it with a single lock.
pub struct World {
    allocator: EntityAllocator,
    signatures: EntitySignatures,
    relations: RelationRegistry,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("entity_count", &self.allocator.alive_count())
            .field("relations", &self.relations)
            .finish()
    }
}

impl World {
    /// Create an empty world with the default [`StoreConfig`].
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty world sized by `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            allocator: EntityAllocator::with_capacity(config.initial_entity_capacity),
            signatures: EntitySignatures::with_capacity(config.initial_entity_capacity),
            relations: RelationRegistry::with_config(config),
        }
    }

    /// Read-only access to the relation registry.
    pub fn registry(&self) -> &RelationRegistry {
        &self.relations
    }

    /// Register relation type `T` under `name`. See
    /// [`RelationRegistry::register`].
    pub fn register_relation<T: Relation>(&mut self, name: &str) -> Result<RelationTypeId, EcsError> {
        self.relations.register::<T>(name)
    }

    // -- entity lifecycle ---------------------------------------------------

    /// Allocate a new entity with no relations.
    pub fn spawn(&mut self) -> EntityId {
        self.allocator.allocate()
    }

    /// Destroy `entity`, removing every relation it holds.
    ///
    /// Returns the number of relation rows removed.
    pub fn despawn(&mut self, entity: EntityId) -> Result<usize, EcsError> {
        self.require_alive(entity)?;
        let mut removed = 0;
        for bit in self.signatures.get(entity) {
            match self.relations.erased_mut(RelationTypeId::new(bit)) {
                Some(store) => removed += store.remove_all(&mut self.signatures, entity),
                None => tracing::warn!(
                    entity = %entity,
                    bit,
                    "signature bit set with no relation store behind it"
                ),
            }
        }
        self.signatures.reset(entity);
        self.allocator.deallocate(entity);
        Ok(removed)
    }

    /// Whether `entity` is alive.
    pub fn is_alive(&self, entity: EntityId) -> bool {
        self.allocator.is_alive(entity)
    }

    /// Number of alive entities.
    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    fn require_alive(&self, entity: EntityId) -> Result<(), EcsError> {
        if self.allocator.is_alive(entity) {
            Ok(())
        } else {
            Err(EcsError::StaleEntity { entity })
        }
    }

    // -- relations ----------------------------------------------------------

    /// Add `relation` to `entity`.
    ///
    /// Returns `true` if a new instance was added, `false` if an instance
    /// with an equal value was overwritten.
    pub fn add_relation<T: Relation>(&mut self, entity: EntityId, relation: T) -> Result<bool, EcsError> {
        self.require_alive(entity)?;
        let store = self.relations.get_or_create::<T>()?;
        Ok(store.add(&mut self.signatures, entity, relation))
    }

    /// Remove the instance of `T` on `entity` whose value equals `value`.
    ///
    /// Returns `false` if there was no such instance.
    pub fn remove_relation<T: Relation>(
        &mut self,
        entity: EntityId,
        value: &T::Value,
    ) -> Result<bool, EcsError> {
        self.require_alive(entity)?;
        let store = self.relations.get_or_create::<T>()?;
        Ok(store.remove(&mut self.signatures, entity, value))
    }

    /// Iterate `entity`'s instances of `T`. Empty for dead entities and
    /// types that were never used.
    pub fn relations<T: Relation>(&self, entity: EntityId) -> Relations<'_, T> {
        match self.relations.store::<T>() {
            Some(store) if self.is_alive(entity) => store.get(entity),
            _ => Relations::empty(entity),
        }
    }

    /// The instance of `T` on `entity` whose value equals `value`.
    pub fn get_relation<T: Relation>(&self, entity: EntityId, value: &T::Value) -> Option<&T> {
        if !self.is_alive(entity) {
            return None;
        }
        self.relations.store::<T>()?.get_relation(entity, value)
    }

    /// Number of instances of `T` on `entity`.
    pub fn relation_count<T: Relation>(&self, entity: EntityId) -> usize {
        match self.relations.store::<T>() {
            Some(store) if self.is_alive(entity) => store.count(entity),
            _ => 0,
        }
    }

    /// Whether `entity` holds at least one instance of `T`, answered from its
    /// signature.
    pub fn has_relation<T: Relation>(&self, entity: EntityId) -> bool {
        match self.relations.lookup::<T>() {
            Some(id) => self.signature(entity).has(id.bit()),
            None => false,
        }
    }

    /// The store for `T`, if any instance was ever added.
    pub fn relation_store<T: Relation>(&self) -> Option<&RelationStore<T>> {
        self.relations.store::<T>()
    }

    // -- signatures ---------------------------------------------------------

    /// The set of relation types `entity` currently holds. Empty for dead
    /// entities.
    pub fn signature(&self, entity: EntityId) -> Signature {
        if self.is_alive(entity) {
            self.signatures.get(entity)
        } else {
            Signature::EMPTY
        }
    }

    /// Alive entities whose signature contains every bit of `required`.
    pub fn entities_with<'a>(&'a self, required: &'a Signature) -> impl Iterator<Item = EntityId> + 'a {
        self.allocator
            .iter_alive()
            .filter(move |entity| self.signatures.get(*entity).has_all(required))
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
