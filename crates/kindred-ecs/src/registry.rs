//! Relation type registration and lazy per-type stores.
//!
//! Every relation type is registered once in a [`RelationRegistry`], which
//! assigns it a [`RelationTypeId`]. The id is both the type's signature bit
//! and the slot of its [`RelationStore`] in a plain vector, so resolving a
//! store is an index operation. Stores are created on first use and live as
//! long as the registry.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use crate::entity::EntityId;
use crate::relation::{Relation, RelationStore};
use crate::signature::{EntitySignatures, Signature};
use crate::world::StoreConfig;
use crate::EcsError;

// ---------------------------------------------------------------------------
// RelationTypeId
// ---------------------------------------------------------------------------

/// Identifier of a registered relation type; also its signature bit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationTypeId(u8);

impl RelationTypeId {
    /// Wrap a raw bit index.
    #[inline]
    pub const fn new(bit: u8) -> Self {
        Self(bit)
    }

    /// The signature bit for this type.
    #[inline]
    pub const fn bit(self) -> u8 {
        self.0
    }

    #[inline]
    fn slot(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for RelationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RelationTypeId({})", self.0)
    }
}

// ---------------------------------------------------------------------------
// RelationInfo
// ---------------------------------------------------------------------------

/// Metadata about a registered relation type.
#[derive(Debug, Clone)]
pub struct RelationInfo {
    /// Id assigned at registration.
    pub id: RelationTypeId,
    /// Human-readable name supplied by the caller.
    pub name: String,
    /// Rust `TypeId` of the relation component.
    pub type_id: TypeId,
}

// ---------------------------------------------------------------------------
// ErasedRelationStore
// ---------------------------------------------------------------------------

/// Type-erased view of a [`RelationStore`], enough to clear entities and
/// recover the concrete store.
pub trait ErasedRelationStore: Any {
    /// Remove every row of `entity`, returning how many were removed.
    fn remove_all(&mut self, signatures: &mut EntitySignatures, entity: EntityId) -> usize;

    /// Number of rows held by `entity`.
    fn count(&self, entity: EntityId) -> usize;

    /// Total number of rows.
    fn len(&self) -> usize;

    /// The concrete store, for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// The concrete store, mutably, for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Relation> ErasedRelationStore for RelationStore<C> {
    fn remove_all(&mut self, signatures: &mut EntitySignatures, entity: EntityId) -> usize {
        RelationStore::remove_all(self, signatures, entity)
    }

    fn count(&self, entity: EntityId) -> usize {
        RelationStore::count(self, entity)
    }

    fn len(&self) -> usize {
        RelationStore::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

// ---------------------------------------------------------------------------
// RelationRegistry
// ---------------------------------------------------------------------------

/// Registry mapping relation types to ids, and ids to their stores.
///
/// At most [`Signature::CAPACITY`] types can be registered.
pub struct RelationRegistry {
    /// Rust TypeId -> RelationTypeId for dedup.
    by_type: HashMap<TypeId, RelationTypeId>,
    /// Name -> RelationTypeId.
    by_name: HashMap<String, RelationTypeId>,
    /// Indexed by RelationTypeId.
    infos: Vec<RelationInfo>,
    /// Indexed by RelationTypeId; `None` until first use.
    stores: Vec<Option<Box<dyn ErasedRelationStore>>>,
    config: StoreConfig,
}

impl fmt::Debug for RelationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelationRegistry")
            .field("registered", &self.infos.len())
            .field(
                "stores",
                &self.stores.iter().filter(|s| s.is_some()).count(),
            )
            .finish()
    }
}

impl RelationRegistry {
    /// Create an empty registry whose stores use the default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create an empty registry; every store it creates is sized by `config`.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            by_type: HashMap::new(),
            by_name: HashMap::new(),
            infos: Vec::new(),
            stores: Vec::new(),
            config,
        }
    }

    /// Register relation type `T` under `name`.
    ///
    /// Registering an already registered type returns its existing id and
    /// ignores `name`.
    ///
    /// # Errors
    ///
    /// [`EcsError::DuplicateRelationName`] if `name` belongs to another type,
    /// [`EcsError::SignatureFull`] if all signature bits are taken.
    pub fn register<T: Relation>(&mut self, name: &str) -> Result<RelationTypeId, EcsError> {
        let rust_type_id = TypeId::of::<T>();
        if let Some(&existing) = self.by_type.get(&rust_type_id) {
            return Ok(existing);
        }
        if self.by_name.contains_key(name) {
            return Err(EcsError::DuplicateRelationName {
                name: name.to_owned(),
            });
        }
        let next = self.infos.len();
        if next >= Signature::CAPACITY {
            return Err(EcsError::SignatureFull {
                name: name.to_owned(),
                capacity: Signature::CAPACITY,
            });
        }

        let id = RelationTypeId(next as u8);
        self.infos.push(RelationInfo {
            id,
            name: name.to_owned(),
            type_id: rust_type_id,
        });
        self.stores.push(None);
        self.by_type.insert(rust_type_id, id);
        self.by_name.insert(name.to_owned(), id);
        tracing::debug!(relation = name, bit = id.bit(), "registered relation type");
        Ok(id)
    }

    /// Look up the id of relation type `T`.
    pub fn lookup<T: Relation>(&self) -> Option<RelationTypeId> {
        self.by_type.get(&TypeId::of::<T>()).copied()
    }

    /// Look up a relation type by its registered name.
    pub fn lookup_by_name(&self, name: &str) -> Option<RelationTypeId> {
        self.by_name.get(name).copied()
    }

    /// Metadata for a registered id.
    pub fn get_info(&self, id: RelationTypeId) -> Option<&RelationInfo> {
        self.infos.get(id.slot())
    }

    /// Number of registered relation types.
    pub fn len(&self) -> usize {
        self.infos.len()
    }

    /// Whether nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.infos.is_empty()
    }

    fn require<T: Relation>(&self) -> Result<RelationTypeId, EcsError> {
        self.lookup::<T>().ok_or_else(|| EcsError::UnknownRelation {
            name: std::any::type_name::<T>().to_owned(),
        })
    }

    /// The store for `T`, creating it on first use.
    ///
    /// # Errors
    ///
    /// [`EcsError::UnknownRelation`] if `T` was never registered.
    pub fn get_or_create<T: Relation>(&mut self) -> Result<&mut RelationStore<T>, EcsError> {
        let id = self.require::<T>()?;
        let slot = &mut self.stores[id.slot()];
        if slot.is_none() {
            tracing::debug!(
                relation = %self.infos[id.slot()].name,
                bit = id.bit(),
                "created relation store"
            );
            *slot = Some(Box::new(RelationStore::<T>::with_config(id, &self.config)));
        }
        slot.as_mut()
            .and_then(|store| store.as_any_mut().downcast_mut::<RelationStore<T>>())
            .ok_or_else(|| EcsError::UnknownRelation {
                name: std::any::type_name::<T>().to_owned(),
            })
    }

    /// The store for `T`, if it has been created.
    pub fn store<T: Relation>(&self) -> Option<&RelationStore<T>> {
        let id = self.lookup::<T>()?;
        self.stores[id.slot()]
            .as_ref()?
            .as_any()
            .downcast_ref::<RelationStore<T>>()
    }

    /// The type-erased store for `id`, if it has been created.
    pub fn erased(&self, id: RelationTypeId) -> Option<&dyn ErasedRelationStore> {
        self.stores.get(id.slot())?.as_deref()
    }

    /// Mutable type-erased store for `id`, if it has been created.
    pub fn erased_mut(&mut self, id: RelationTypeId) -> Option<&mut (dyn ErasedRelationStore + 'static)> {
        self.stores.get_mut(id.slot())?.as_deref_mut()
    }
}

impl Default for RelationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
