//! Member schemas for user types
//!
//! A record schema lists the members an expression may name, each bound to plain
//! `fn` pointers so schemas stay `Send + Sync` and cheap to build:
//!
//! ```ignore
//! Schema::record::<User>()
//!     .field("name", |u| &u.name, |u| &mut u.name)
//!     .accessor(Accessor::new("nickname", User::nickname).setter(User::set_nickname))
//!     .indexed(Indexed::new("address", User::address).setter(User::set_address))
//!     .embed(|u| &u.person, |u| &mut u.person)
//!     .build()
//! ```

use std::any::type_name;
use std::marker::PhantomData;
use std::sync::Arc;

use super::{AccessError, Bindable, Reflect, TypeMismatch, Typed};
use crate::types::TypeDescriptor;

pub enum Schema {
    Record(RecordSchema),
    Variants(VariantSchema),
}

impl Schema {
    pub fn record<T: Bindable>() -> RecordBuilder<T> {
        RecordBuilder {
            schema: RecordSchema {
                type_name: type_name::<T>(),
                fields: Vec::new(),
                accessors: Vec::new(),
                indexed: Vec::new(),
                bases: Vec::new(),
            },
            _owner: PhantomData,
        }
    }

    /// Schema of a unit enum, converted by exact variant name.
    pub fn variants<T: Bindable + PartialEq>(variants: &[(&'static str, T)]) -> Schema {
        Schema::Variants(VariantSchema {
            type_name: type_name::<T>(),
            variants: variants
                .iter()
                .map(|(name, value)| (*name, Box::new(value.clone()) as Box<dyn Reflect>))
                .collect(),
            same: same_variant::<T>,
        })
    }

    pub fn as_record(&self) -> Option<&RecordSchema> {
        match self {
            Schema::Record(record) => Some(record),
            Schema::Variants(_) => None,
        }
    }

    pub fn as_variants(&self) -> Option<&VariantSchema> {
        match self {
            Schema::Variants(variants) => Some(variants),
            Schema::Record(_) => None,
        }
    }
}

// ============================================================================
// Records
// ============================================================================

pub struct RecordSchema {
    type_name: &'static str,
    pub(crate) fields: Vec<FieldEntry>,
    pub(crate) accessors: Vec<AccessorEntry>,
    pub(crate) indexed: Vec<IndexedEntry>,
    pub(crate) bases: Vec<BaseEntry>,
}

impl RecordSchema {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Names of the members declared directly on this type
    pub fn member_names(&self) -> Vec<&'static str> {
        self.fields
            .iter()
            .map(|f| f.name)
            .chain(self.accessors.iter().map(|a| a.name))
            .chain(self.indexed.iter().map(|i| i.name))
            .collect()
    }

    pub(crate) fn field(&self, name: &str) -> Option<&FieldEntry> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub(crate) fn accessor(&self, name: &str) -> Option<&AccessorEntry> {
        self.accessors.iter().find(|a| a.name == name)
    }

    pub(crate) fn indexed(&self, name: &str) -> Option<&IndexedEntry> {
        self.indexed.iter().find(|i| i.name == name)
    }
}

pub(crate) struct FieldEntry {
    pub(crate) name: &'static str,
    pub(crate) declared: TypeDescriptor,
    pub(crate) access: Arc<dyn FieldAccess>,
}

pub(crate) struct AccessorEntry {
    pub(crate) name: &'static str,
    pub(crate) declared: TypeDescriptor,
    pub(crate) access: Arc<dyn AccessorAccess>,
}

pub(crate) struct IndexedEntry {
    pub(crate) name: &'static str,
    pub(crate) declared: TypeDescriptor,
    pub(crate) access: Arc<dyn IndexedAccess>,
}

/// Embedded ancestor whose members are visible on the outer type
pub(crate) struct BaseEntry {
    pub(crate) declared: TypeDescriptor,
    pub(crate) access: Arc<dyn FieldAccess>,
}

pub struct RecordBuilder<T> {
    schema: RecordSchema,
    _owner: PhantomData<fn() -> T>,
}

impl<T: Bindable> RecordBuilder<T> {
    /// Field-backed member
    pub fn field<V: Typed>(
        mut self,
        name: &'static str,
        get: fn(&T) -> &V,
        get_mut: fn(&mut T) -> &mut V,
    ) -> Self {
        self.schema.fields.push(FieldEntry {
            name,
            declared: V::type_descriptor(),
            access: Arc::new(FieldFns { get, get_mut }),
        });
        self
    }

    /// Accessor-pair member
    pub fn accessor<V: Typed>(mut self, accessor: Accessor<T, V>) -> Self {
        self.schema.accessors.push(AccessorEntry {
            name: accessor.name,
            declared: V::type_descriptor(),
            access: Arc::new(accessor),
        });
        self
    }

    /// Indexed accessor pair, `name[key]`
    pub fn indexed<V: Typed>(mut self, indexed: Indexed<T, V>) -> Self {
        self.schema.indexed.push(IndexedEntry {
            name: indexed.name,
            declared: V::type_descriptor(),
            access: Arc::new(indexed),
        });
        self
    }

    /// Expose the members of an embedded value as members of `T`
    pub fn embed<B: Bindable>(mut self, get: fn(&T) -> &B, get_mut: fn(&mut T) -> &mut B) -> Self {
        self.schema.bases.push(BaseEntry {
            declared: B::type_descriptor(),
            access: Arc::new(FieldFns { get, get_mut }),
        });
        self
    }

    pub fn build(self) -> Schema {
        Schema::Record(self.schema)
    }
}

// ============================================================================
// Unit enums
// ============================================================================

pub struct VariantSchema {
    type_name: &'static str,
    variants: Vec<(&'static str, Box<dyn Reflect>)>,
    same: fn(&dyn Reflect, &dyn Reflect) -> bool,
}

impl VariantSchema {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.variants.iter().map(|(name, _)| *name)
    }

    /// Fresh value of the variant with exactly this name
    pub fn value_of(&self, name: &str) -> Option<Box<dyn Reflect>> {
        self.variants
            .iter()
            .find(|(candidate, _)| *candidate == name)
            .map(|(_, value)| value.clone_value())
    }

    pub fn name_of(&self, value: &dyn Reflect) -> Option<&'static str> {
        self.variants
            .iter()
            .find(|(_, candidate)| (self.same)(&**candidate, value))
            .map(|(name, _)| *name)
    }
}

fn same_variant<T: Reflect + PartialEq>(left: &dyn Reflect, right: &dyn Reflect) -> bool {
    match (left.downcast_ref::<T>(), right.downcast_ref::<T>()) {
        (Some(left), Some(right)) => left == right,
        _ => false,
    }
}

// ============================================================================
// Type-erased access
// ============================================================================

fn owner<T: Reflect>(value: &dyn Reflect) -> Result<&T, TypeMismatch> {
    let found = value.type_name();
    value
        .downcast_ref::<T>()
        .ok_or_else(|| TypeMismatch::new::<T>(found))
}

fn owner_mut<T: Reflect>(value: &mut dyn Reflect) -> Result<&mut T, TypeMismatch> {
    let found = value.type_name();
    value
        .downcast_mut::<T>()
        .ok_or_else(|| TypeMismatch::new::<T>(found))
}

pub(crate) trait FieldAccess: Send + Sync {
    fn get<'a>(&self, owner: &'a dyn Reflect) -> Result<&'a dyn Reflect, TypeMismatch>;

    fn get_mut<'a>(&self, owner: &'a mut dyn Reflect) -> Result<&'a mut dyn Reflect, TypeMismatch>;
}

pub(crate) trait AccessorAccess: Send + Sync {
    fn get(&self, owner: &dyn Reflect) -> Result<Box<dyn Reflect>, TypeMismatch>;

    /// Mutable access to the underlying storage, `Ok(None)` when the accessor has none
    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch>;

    fn has_get_mut(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn set(&self, owner: &mut dyn Reflect, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError>;
}

pub(crate) trait IndexedAccess: Send + Sync {
    fn get(&self, owner: &dyn Reflect, key: &str) -> Result<Option<Box<dyn Reflect>>, TypeMismatch>;

    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
        key: &str,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch>;

    fn has_get_mut(&self) -> bool;

    fn is_writable(&self) -> bool;

    fn set(
        &self,
        owner: &mut dyn Reflect,
        key: &str,
        value: Option<Box<dyn Reflect>>,
    ) -> Result<(), AccessError>;
}

struct FieldFns<T, V> {
    get: fn(&T) -> &V,
    get_mut: fn(&mut T) -> &mut V,
}

impl<T: Reflect, V: Reflect> FieldAccess for FieldFns<T, V> {
    fn get<'a>(&self, owner: &'a dyn Reflect) -> Result<&'a dyn Reflect, TypeMismatch> {
        let owner = self::owner::<T>(owner)?;
        Ok((self.get)(owner) as &dyn Reflect)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Reflect) -> Result<&'a mut dyn Reflect, TypeMismatch> {
        let owner = owner_mut::<T>(owner)?;
        Ok((self.get_mut)(owner) as &mut dyn Reflect)
    }
}

/// Accessor pair: a getter returning an owned value, an optional setter and an
/// optional mutable getter used for nested writes.
pub struct Accessor<T, V> {
    name: &'static str,
    get: fn(&T) -> V,
    set: Option<fn(&mut T, V)>,
    get_mut: Option<fn(&mut T) -> &mut V>,
}

impl<T: Bindable, V: Typed> Accessor<T, V> {
    pub fn new(name: &'static str, get: fn(&T) -> V) -> Self {
        Self {
            name,
            get,
            set: None,
            get_mut: None,
        }
    }

    pub fn setter(mut self, set: fn(&mut T, V)) -> Self {
        self.set = Some(set);
        self
    }

    pub fn get_mut(mut self, get_mut: fn(&mut T) -> &mut V) -> Self {
        self.get_mut = Some(get_mut);
        self
    }
}

impl<T: Bindable, V: Typed> AccessorAccess for Accessor<T, V> {
    fn get(&self, owner: &dyn Reflect) -> Result<Box<dyn Reflect>, TypeMismatch> {
        let owner = self::owner::<T>(owner)?;
        Ok(Box::new((self.get)(owner)))
    }

    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch> {
        let Some(get_mut) = self.get_mut else {
            return Ok(None);
        };
        let owner = owner_mut::<T>(owner)?;
        Ok(Some(get_mut(owner) as &mut dyn Reflect))
    }

    fn has_get_mut(&self) -> bool {
        self.get_mut.is_some()
    }

    fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    fn set(&self, owner: &mut dyn Reflect, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError> {
        let set = self.set.ok_or(AccessError::ReadOnly)?;
        let value = V::from_reflect(value)?;
        set(owner_mut::<T>(owner)?, value);
        Ok(())
    }
}

pub type IndexedMut<T, V> = for<'a, 'k> fn(&'a mut T, &'k str) -> Option<&'a mut V>;

/// Indexed accessor pair: `get(key)` / `set(key, value)` offered as `name[key]`.
pub struct Indexed<T, V> {
    name: &'static str,
    get: fn(&T, &str) -> Option<V>,
    set: Option<fn(&mut T, &str, V)>,
    get_mut: Option<IndexedMut<T, V>>,
}

impl<T: Bindable, V: Typed> Indexed<T, V> {
    pub fn new(name: &'static str, get: fn(&T, &str) -> Option<V>) -> Self {
        Self {
            name,
            get,
            set: None,
            get_mut: None,
        }
    }

    pub fn setter(mut self, set: fn(&mut T, &str, V)) -> Self {
        self.set = Some(set);
        self
    }

    pub fn get_mut(mut self, get_mut: IndexedMut<T, V>) -> Self {
        self.get_mut = Some(get_mut);
        self
    }
}

impl<T: Bindable, V: Typed> IndexedAccess for Indexed<T, V> {
    fn get(&self, owner: &dyn Reflect, key: &str) -> Result<Option<Box<dyn Reflect>>, TypeMismatch> {
        let owner = self::owner::<T>(owner)?;
        Ok((self.get)(owner, key).map(|value| Box::new(value) as Box<dyn Reflect>))
    }

    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
        key: &str,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch> {
        let Some(get_mut) = self.get_mut else {
            return Ok(None);
        };
        let owner = owner_mut::<T>(owner)?;
        Ok(get_mut(owner, key).map(|value| value as &mut dyn Reflect))
    }

    fn has_get_mut(&self) -> bool {
        self.get_mut.is_some()
    }

    fn is_writable(&self) -> bool {
        self.set.is_some()
    }

    fn set(
        &self,
        owner: &mut dyn Reflect,
        key: &str,
        value: Option<Box<dyn Reflect>>,
    ) -> Result<(), AccessError> {
        let set = self.set.ok_or(AccessError::ReadOnly)?;
        let value = V::from_reflect(value)?;
        set(owner_mut::<T>(owner)?, key, value);
        Ok(())
    }
}

/// Member of an embedded value, reached through the embedding field
pub(crate) struct Projected<A: ?Sized> {
    pub(crate) base: Arc<dyn FieldAccess>,
    pub(crate) inner: Arc<A>,
}

impl FieldAccess for Projected<dyn FieldAccess> {
    fn get<'a>(&self, owner: &'a dyn Reflect) -> Result<&'a dyn Reflect, TypeMismatch> {
        self.inner.get(self.base.get(owner)?)
    }

    fn get_mut<'a>(&self, owner: &'a mut dyn Reflect) -> Result<&'a mut dyn Reflect, TypeMismatch> {
        self.inner.get_mut(self.base.get_mut(owner)?)
    }
}

impl AccessorAccess for Projected<dyn AccessorAccess> {
    fn get(&self, owner: &dyn Reflect) -> Result<Box<dyn Reflect>, TypeMismatch> {
        self.inner.get(self.base.get(owner)?)
    }

    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch> {
        self.inner.get_mut(self.base.get_mut(owner)?)
    }

    fn has_get_mut(&self) -> bool {
        self.inner.has_get_mut()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn set(&self, owner: &mut dyn Reflect, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError> {
        self.inner.set(self.base.get_mut(owner)?, value)
    }
}

impl IndexedAccess for Projected<dyn IndexedAccess> {
    fn get(&self, owner: &dyn Reflect, key: &str) -> Result<Option<Box<dyn Reflect>>, TypeMismatch> {
        self.inner.get(self.base.get(owner)?, key)
    }

    fn get_mut<'a>(
        &self,
        owner: &'a mut dyn Reflect,
        key: &str,
    ) -> Result<Option<&'a mut dyn Reflect>, TypeMismatch> {
        self.inner.get_mut(self.base.get_mut(owner)?, key)
    }

    fn has_get_mut(&self) -> bool {
        self.inner.has_get_mut()
    }

    fn is_writable(&self) -> bool {
        self.inner.is_writable()
    }

    fn set(
        &self,
        owner: &mut dyn Reflect,
        key: &str,
        value: Option<Box<dyn Reflect>>,
    ) -> Result<(), AccessError> {
        self.inner.set(self.base.get_mut(owner)?, key, value)
    }
}
