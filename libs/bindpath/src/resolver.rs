//! Member resolution
//!
//! Maps `(owner type, member name)` to a typed [`Slot`]. Resolution runs once per
//! pair and is memoized for the life of the resolver; the cache is additive and
//! never invalidated because schemas are fixed at compile time.
//!
//! Preference order for a step:
//! 1. an indexed accessor pair, when the step carries a key,
//! 2. a field (own, then embedded),
//! 3. an accessor pair (own, then embedded).

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::reflect::{
    AccessError, AccessorAccess, FieldAccess, Fetched, IndexedAccess, Projected, RecordSchema,
    Reflect, Schema,
};
use crate::types::TypeDescriptor;

/// Typed access point bound to one named member
pub enum Slot {
    Field(FieldSlot),
    AccessorPair(AccessorPairSlot),
    IndexedAccessorPair(IndexedAccessorPairSlot),
}

pub struct FieldSlot {
    name: &'static str,
    declared: TypeDescriptor,
    pub(crate) access: Arc<dyn FieldAccess>,
}

pub struct AccessorPairSlot {
    name: &'static str,
    declared: TypeDescriptor,
    pub(crate) access: Arc<dyn AccessorAccess>,
}

pub struct IndexedAccessorPairSlot {
    name: &'static str,
    declared: TypeDescriptor,
    pub(crate) access: Arc<dyn IndexedAccess>,
}

impl Slot {
    pub fn name(&self) -> &'static str {
        match self {
            Slot::Field(slot) => slot.name,
            Slot::AccessorPair(slot) => slot.name,
            Slot::IndexedAccessorPair(slot) => slot.name,
        }
    }

    /// Declared type, extracted when the slot was resolved
    pub fn declared(&self) -> &TypeDescriptor {
        match self {
            Slot::Field(slot) => &slot.declared,
            Slot::AccessorPair(slot) => &slot.declared,
            Slot::IndexedAccessorPair(slot) => &slot.declared,
        }
    }

    pub fn is_read_only(&self) -> bool {
        match self {
            Slot::Field(_) => false,
            Slot::AccessorPair(slot) => !slot.access.is_writable(),
            Slot::IndexedAccessorPair(slot) => !slot.access.is_writable(),
        }
    }

    pub fn is_indexed(&self) -> bool {
        matches!(self, Slot::IndexedAccessorPair(_))
    }

    /// Read the member. `key` is required by indexed accessor pairs and ignored
    /// otherwise; an absent indexed entry reads as `None`.
    pub fn get<'a>(
        &self,
        instance: &'a dyn Reflect,
        key: Option<&str>,
    ) -> Result<Option<Fetched<'a>>, AccessError> {
        match self {
            Slot::Field(slot) => Ok(Some(Fetched::Borrowed(slot.access.get(instance)?))),
            Slot::AccessorPair(slot) => Ok(Some(Fetched::Owned(slot.access.get(instance)?))),
            Slot::IndexedAccessorPair(slot) => {
                let key = key.ok_or(AccessError::MissingKey)?;
                Ok(slot.access.get(instance, key)?.map(Fetched::Owned))
            }
        }
    }

    /// Write the member. Fails with [`AccessError::ReadOnly`] when there is no setter.
    pub fn set(
        &self,
        instance: &mut dyn Reflect,
        key: Option<&str>,
        value: Option<Box<dyn Reflect>>,
    ) -> Result<(), AccessError> {
        match self {
            Slot::Field(slot) => Ok(slot.access.get_mut(instance)?.set(value)?),
            Slot::AccessorPair(slot) => slot.access.set(instance, value),
            Slot::IndexedAccessorPair(slot) => {
                let key = key.ok_or(AccessError::MissingKey)?;
                slot.access.set(instance, key, value)
            }
        }
    }

    fn through(self, base: &Arc<dyn FieldAccess>) -> Slot {
        match self {
            Slot::Field(slot) => Slot::Field(FieldSlot {
                access: Arc::new(Projected {
                    base: Arc::clone(base),
                    inner: slot.access,
                }),
                ..slot
            }),
            Slot::AccessorPair(slot) => Slot::AccessorPair(AccessorPairSlot {
                access: Arc::new(Projected {
                    base: Arc::clone(base),
                    inner: slot.access,
                }),
                ..slot
            }),
            Slot::IndexedAccessorPair(slot) => {
                Slot::IndexedAccessorPair(IndexedAccessorPairSlot {
                    access: Arc::new(Projected {
                        base: Arc::clone(base),
                        inner: slot.access,
                    }),
                    ..slot
                })
            }
        }
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Slot::Field(_) => "Field",
            Slot::AccessorPair(_) => "AccessorPair",
            Slot::IndexedAccessorPair(_) => "IndexedAccessorPair",
        };
        f.debug_struct(kind)
            .field("name", &self.name())
            .field("declared", self.declared())
            .finish()
    }
}

/// Why a member could not be resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unresolved {
    /// No member of that name on the type or its embedded values
    Unknown,
    /// The name exists only as an indexed accessor pair but the step has no key
    KeyRequired,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum MemberKind {
    Field,
    Accessor,
    Indexed,
}

/// Cached `(type, member) -> Slot` resolution
///
/// Safe for concurrent use. Population is compute-if-absent: a slot is computed
/// outside the lock, and when two threads race on the same key the first insert
/// wins and both observe the same `Arc`.
#[derive(Default)]
pub struct MemberResolver {
    schemas: RwLock<HashMap<TypeId, Arc<Schema>>>,
    slots: RwLock<HashMap<(TypeId, bool), HashMap<String, Arc<Slot>>>>,
}

impl MemberResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `member` on `owner`. `keyed` is true when the step carries an index.
    pub fn resolve(
        &self,
        owner: &TypeDescriptor,
        member: &str,
        keyed: bool,
    ) -> Result<Arc<Slot>, Unresolved> {
        let cache_key = (owner.id(), keyed);
        if let Some(hit) = self
            .slots
            .read()
            .ok()
            .and_then(|m| m.get(&cache_key).and_then(|s| s.get(member).cloned()))
        {
            return Ok(hit);
        }

        let slot = Arc::new(self.lookup(owner, member, keyed)?);
        tracing::trace!(
            owner = owner.name(),
            member,
            keyed,
            slot = ?slot,
            "resolved member slot"
        );

        if let Ok(mut m) = self.slots.write() {
            let cached = m
                .entry(cache_key)
                .or_default()
                .entry(member.to_string())
                .or_insert(slot);
            return Ok(Arc::clone(cached));
        }
        Ok(slot)
    }

    /// Number of cached slots
    pub fn cached_slots(&self) -> usize {
        self.slots
            .read()
            .map(|m| m.values().map(HashMap::len).sum())
            .unwrap_or(0)
    }

    /// Schema of a bindable type, built once per type
    pub fn schema(&self, descriptor: &TypeDescriptor) -> Option<Arc<Schema>> {
        if let Some(hit) = self
            .schemas
            .read()
            .ok()
            .and_then(|m| m.get(&descriptor.id()).cloned())
        {
            return Some(hit);
        }

        let schema = Arc::new(descriptor.schema()?);
        if let Ok(mut m) = self.schemas.write() {
            return Some(Arc::clone(m.entry(descriptor.id()).or_insert(schema)));
        }
        Some(schema)
    }

    fn lookup(&self, owner: &TypeDescriptor, member: &str, keyed: bool) -> Result<Slot, Unresolved> {
        let schema = self.schema(owner).ok_or(Unresolved::Unknown)?;
        let record = schema.as_record().ok_or(Unresolved::Unknown)?;

        if keyed {
            if let Some(slot) = self.find(record, member, MemberKind::Indexed) {
                return Ok(slot);
            }
        }
        if let Some(slot) = self.find(record, member, MemberKind::Field) {
            return Ok(slot);
        }
        if let Some(slot) = self.find(record, member, MemberKind::Accessor) {
            return Ok(slot);
        }
        if !keyed && self.find(record, member, MemberKind::Indexed).is_some() {
            return Err(Unresolved::KeyRequired);
        }
        Err(Unresolved::Unknown)
    }

    fn find(&self, record: &RecordSchema, member: &str, kind: MemberKind) -> Option<Slot> {
        let own = match kind {
            MemberKind::Field => record.field(member).map(|entry| {
                Slot::Field(FieldSlot {
                    name: entry.name,
                    declared: entry.declared.clone(),
                    access: Arc::clone(&entry.access),
                })
            }),
            MemberKind::Accessor => record.accessor(member).map(|entry| {
                Slot::AccessorPair(AccessorPairSlot {
                    name: entry.name,
                    declared: entry.declared.clone(),
                    access: Arc::clone(&entry.access),
                })
            }),
            MemberKind::Indexed => record.indexed(member).map(|entry| {
                Slot::IndexedAccessorPair(IndexedAccessorPairSlot {
                    name: entry.name,
                    declared: entry.declared.clone(),
                    access: Arc::clone(&entry.access),
                })
            }),
        };

        own.or_else(|| {
            record.bases.iter().find_map(|base| {
                let schema = self.schema(&base.declared)?;
                let slot = self.find(schema.as_record()?, member, kind)?;
                Some(slot.through(&base.access))
            })
        })
    }
}
