//! Relation components: many value-keyed instances of one type per entity.
//!
//! A regular component is single-valued per entity. A [`Relation`] relaxes
//! this: an entity may hold any number of instances of the same relation
//! type, as long as their [`Relation::relation_value`] keys are distinct.
//! Adding an instance whose key is already present overwrites it in place.
//!
//! Each relation type gets one [`RelationStore`], which keeps:
//!
//! - a dense [`RelationTable`]: one row per instance plus a parallel
//!   `owners` column mapping row -> entity, and
//! - an index from entity to an [`IdArray`] of that entity's rows.
//!
//! Removal swap-removes the row from the table and then repairs the index
//! entry of whichever entity owned the row that was moved into the hole.
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
//! let mut signatures = EntitySignatures::new();
//! let mut store = RelationStore::<FriendOf>::new(RelationTypeId::new(0));
//! let alice = EntityId::new(0, 0);
//! let bob = EntityId::new(1, 0);
//! let carol = EntityId::new(2, 0);
//!
//! assert!(store.add(&mut signatures, alice, FriendOf(bob)));
//! assert!(store.add(&mut signatures, alice, FriendOf(carol)));
//! assert!(!store.add(&mut signatures, alice, FriendOf(bob)));
//! assert_eq!(store.count(alice), 2);
//! assert!(signatures.get(alice).has(0));
//! ```

use std::collections::HashMap;
use std::fmt;
use std::iter::FusedIterator;

use crate::entity::EntityId;
use crate::id_array::{IdArray, IdArrayHeap};
use crate::registry::RelationTypeId;
use crate::signature::EntitySignatures;
use crate::world::StoreConfig;

// ---------------------------------------------------------------------------
// Relation
// ---------------------------------------------------------------------------

/// A component type an entity may hold many instances of, keyed by value.
///
/// Two instances on the same entity are "the same relation" when their
/// values compare equal; the store keeps at most one of them.
pub trait Relation: 'static {
    /// The key that distinguishes instances on one entity.
    type Value: Eq;

    /// Extract this instance's key.
    fn relation_value(&self) -> Self::Value;
}

// ---------------------------------------------------------------------------
// RelationTable
// ---------------------------------------------------------------------------

/// Dense row storage for one relation type.
///
/// `rows[i]` is owned by `owners[i]`. The table never has holes: removing a
/// row moves the last row into its place.
#[derive(Debug, Clone)]
pub struct RelationTable<C> {
    rows: Vec<C>,
    owners: Vec<EntityId>,
}

impl<C> RelationTable<C> {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Create an empty table with room for `capacity` rows.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            rows: Vec::with_capacity(capacity),
            owners: Vec::with_capacity(capacity),
        }
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Append a row owned by `owner`, returning its index.
    pub fn append_row(&mut self, owner: EntityId, row: C) -> usize {
        let index = self.rows.len();
        self.rows.push(row);
        self.owners.push(owner);
        index
    }

    /// Drop the row at `index` and move the last row into its place.
    ///
    /// Returns the owner of the moved row, or `None` if `index` was the last
    /// row and nothing moved.
    pub fn move_last_row_to(&mut self, index: usize) -> Option<EntityId> {
        let last = self.rows.len() - 1;
        self.rows.swap_remove(index);
        self.owners.swap_remove(index);
        (index < last).then(|| self.owners[index])
    }

    /// The entity owning row `index`.
    #[inline]
    pub fn owner(&self, index: usize) -> EntityId {
        self.owners[index]
    }

    /// The row at `index`.
    #[inline]
    pub fn row(&self, index: usize) -> &C {
        &self.rows[index]
    }

    /// Mutable access to the row at `index`.
    #[inline]
    pub fn row_mut(&mut self, index: usize) -> &mut C {
        &mut self.rows[index]
    }

    /// All rows in table order.
    #[inline]
    pub fn rows(&self) -> &[C] {
        &self.rows
    }

    /// All owners, parallel to [`rows`](Self::rows).
    #[inline]
    pub fn owners(&self) -> &[EntityId] {
        &self.owners
    }
}

impl<C> Default for RelationTable<C> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// RelationStore
// ---------------------------------------------------------------------------

/// Storage for every instance of one relation type `C`.
///
/// Invariants:
///
/// - No entity holds two rows whose values compare equal.
/// - The table is dense and every index entry points at live rows.
/// - An entity has an index entry iff it holds at least one row, iff its
///   signature bit for this type is set.
pub struct RelationStore<C: Relation> {
    relation_type: RelationTypeId,
    table: RelationTable<C>,
    index: HashMap<EntityId, IdArray>,
    heap: IdArrayHeap,
}

impl<C: Relation> fmt::Debug for RelationStore<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationStore")
            .field("relation", &std::any::type_name::<C>())
            .field("relation_type", &self.relation_type)
            .field("rows", &self.table.len())
            .field("entities", &self.index.len())
            .finish()
    }
}

impl<C: Relation> RelationStore<C> {
    /// Create an empty store flipping signature bit `relation_type`.
    pub fn new(relation_type: RelationTypeId) -> Self {
        Self::with_config(relation_type, &StoreConfig::default())
    }

    /// Create an empty store, pre-sizing storage from `config`.
    pub fn with_config(relation_type: RelationTypeId, config: &StoreConfig) -> Self {
        Self {
            relation_type,
            table: RelationTable::with_capacity(config.initial_table_capacity),
            index: HashMap::with_capacity(config.initial_entity_capacity),
            heap: IdArrayHeap::new(),
        }
    }

    /// The relation type (and signature bit) this store manages.
    #[inline]
    pub fn relation_type(&self) -> RelationTypeId {
        self.relation_type
    }

    /// The dense table backing this store.
    #[inline]
    pub fn table(&self) -> &RelationTable<C> {
        &self.table
    }

    /// Total number of rows across all entities.
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the store holds no rows.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Number of entities holding at least one row.
    #[inline]
    pub fn entity_count(&self) -> usize {
        self.index.len()
    }

    /// Entities holding at least one row, in no particular order.
    pub fn entities(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.index.keys().copied()
    }

    /// Number of rows held by `entity`.
    #[inline]
    pub fn count(&self, entity: EntityId) -> usize {
        self.index.get(&entity).map_or(0, IdArray::len)
    }

    fn positions(&self, entity: EntityId) -> &[u32] {
        match self.index.get(&entity) {
            Some(ids) => ids.as_slice(&self.heap),
            None => &[],
        }
    }

    /// Position within `entity`'s list of the row whose value equals `value`.
    fn find(&self, entity: EntityId, value: &C::Value) -> Option<(usize, usize)> {
        self.positions(entity)
            .iter()
            .enumerate()
            .find(|&(_, &row)| self.table.row(row as usize).relation_value() == *value)
            .map(|(i, &row)| (i, row as usize))
    }

    /// Add `component` to `entity`.
    ///
    /// If `entity` already holds a row with an equal value it is overwritten
    /// and `false` is returned. Otherwise a new row is appended, the
    /// entity's signature bit is set if this is its first row, and `true` is
    /// returned.
    ///
    /// # Panics
    ///
    /// Panics if the table would grow past `u32::MAX + 1` rows.
    pub fn add(&mut self, signatures: &mut EntitySignatures, entity: EntityId, component: C) -> bool {
        if let Some((_, row)) = self.find(entity, &component.relation_value()) {
            *self.table.row_mut(row) = component;
            return false;
        }

        let position = row_position(self.table.len());
        self.table.append_row(entity, component);
        let ids = self.index.entry(entity).or_default();
        if ids.is_empty() {
            signatures.set(entity, self.relation_type.bit());
        }
        ids.add(position, &mut self.heap);
        true
    }

    /// Remove the row of `entity` whose value equals `value`.
    ///
    /// Returns `false`, leaving everything untouched, if there is no such
    /// row. Clears the entity's signature bit when its last row goes.
    pub fn remove(
        &mut self,
        signatures: &mut EntitySignatures,
        entity: EntityId,
        value: &C::Value,
    ) -> bool {
        let Some((position, row)) = self.find(entity, value) else {
            return false;
        };

        if let Some(ids) = self.index.get_mut(&entity) {
            ids.remove_at(position, &mut self.heap);
            if ids.is_empty() {
                self.index.remove(&entity);
                signatures.clear(entity, self.relation_type.bit());
            }
        }
        self.compact(row);
        true
    }

    /// Remove every row of `entity`, returning how many were removed.
    ///
    /// This is the hook the owning world calls when an entity is destroyed.
    pub fn remove_all(&mut self, signatures: &mut EntitySignatures, entity: EntityId) -> usize {
        let removed = self.count(entity);
        if removed == 0 {
            return 0;
        }
        // Compacting may move another row of this same entity, so its list
        // has to stay current until every row is gone.
        while let Some(row) = self.pop_position(entity) {
            self.compact(row);
        }
        self.index.remove(&entity);
        signatures.clear(entity, self.relation_type.bit());
        removed
    }

    /// Detach the last position of `entity`'s list and return its row.
    fn pop_position(&mut self, entity: EntityId) -> Option<usize> {
        let ids = self.index.get_mut(&entity)?;
        let last = ids.len().checked_sub(1)?;
        let row = ids.as_slice(&self.heap)[last] as usize;
        ids.remove_at(last, &mut self.heap);
        Some(row)
    }

    /// Swap-remove `row` from the table and point the moved row's owner at
    /// its new position. `row` must already be detached from its owner.
    fn compact(&mut self, row: usize) {
        let last = self.table.len() - 1;
        let Some(moved_owner) = self.table.move_last_row_to(row) else {
            return;
        };
        let Some(ids) = self.index.get_mut(&moved_owner) else {
            debug_assert!(false, "moved row {last} has owner {moved_owner} with no index entry");
            return;
        };
        let position = ids
            .as_slice(&self.heap)
            .iter()
            .position(|&r| r as usize == last);
        match position {
            Some(position) => ids.set(position, row as u32, &mut self.heap),
            None => debug_assert!(false, "owner {moved_owner} does not list row {last}"),
        }
    }

    /// Iterate the rows held by `entity` without copying.
    pub fn get(&self, entity: EntityId) -> Relations<'_, C> {
        Relations {
            entity,
            positions: self.positions(entity).iter(),
            rows: self.table.rows(),
        }
    }

    /// The row of `entity` whose value equals `value`, if any.
    pub fn get_relation(&self, entity: EntityId, value: &C::Value) -> Option<&C> {
        self.find(entity, value).map(|(_, row)| self.table.row(row))
    }

    /// Whether `entity` holds a row whose value equals `value`.
    pub fn contains(&self, entity: EntityId, value: &C::Value) -> bool {
        self.find(entity, value).is_some()
    }

    /// Every row with its owner, in table order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &C)> + '_ {
        self.table
            .owners()
            .iter()
            .copied()
            .zip(self.table.rows())
    }
}

/// Narrow a table row to the width stored in an [`IdArray`].
fn row_position(row: usize) -> u32 {
    match u32::try_from(row) {
        Ok(position) => position,
        Err(_) => panic!("relation table row {row} does not fit in a u32 position"),
    }
}

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// Borrowed view over one entity's rows in a [`RelationStore`].
///
/// Order follows the entity's position list: insertion order, perturbed by
/// removals.
#[derive(Debug, Clone)]
pub struct Relations<'a, C> {
    entity: EntityId,
    positions: std::slice::Iter<'a, u32>,
    rows: &'a [C],
}

impl<'a, C> Relations<'a, C> {
    /// A view with no rows.
    pub fn empty(entity: EntityId) -> Self {
        let positions: &'a [u32] = &[];
        Self {
            entity,
            positions: positions.iter(),
            rows: &[],
        }
    }

    /// The entity this view belongs to.
    #[inline]
    pub fn entity(&self) -> EntityId {
        self.entity
    }
}

impl<'a, C> Iterator for Relations<'a, C> {
    type Item = &'a C;

    #[inline]
    fn next(&mut self) -> Option<&'a C> {
        self.positions.next().map(|&row| &self.rows[row as usize])
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.positions.size_hint()
    }
}

impl<C> ExactSizeIterator for Relations<'_, C> {}

impl<C> FusedIterator for Relations<'_, C> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
