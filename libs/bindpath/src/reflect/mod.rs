//! Runtime introspection for bindable object graphs
//!
//! Every value an expression can reach implements [`Reflect`], an object-safe view
//! exposing its type, its structural shape and typed assignment. Scalars and the
//! standard containers are covered here; user record types and unit enums opt in by
//! implementing [`Bindable`] and describing their members once in a [`Schema`].
//!
//! ```text
//! Reflect (dyn, per value)          Typed (static, per type)
//!   descriptor()  ----------------->  type_descriptor()
//!   reflect_ref()/reflect_mut()       instantiate()
//!     Nullable | Array | List | Map   from_reflect()
//!     Record | Scalar
//! ```

mod impls;
mod schema;

use std::any::{type_name, Any};
use std::fmt;
use std::ops::Deref;

use thiserror::Error;

use crate::path::IndexKey;
use crate::types::{short_type_name, TypeDescriptor};

pub use impls::MapKey;
pub(crate) use schema::{AccessorAccess, FieldAccess, IndexedAccess, Projected};
pub use schema::{
    Accessor, Indexed, IndexedMut, RecordBuilder, RecordSchema, Schema, VariantSchema,
};

/// Dynamic view of a value in a bindable graph
pub trait Reflect: Any + Send + Sync + fmt::Debug + 'static {
    fn type_name(&self) -> &'static str;

    /// Descriptor of the concrete type of this value
    fn descriptor(&self) -> TypeDescriptor;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn into_any(self: Box<Self>) -> Box<dyn Any>;

    fn clone_value(&self) -> Box<dyn Reflect>;

    /// Replace this value. `None` is accepted only by nullable types.
    fn set(&mut self, value: Option<Box<dyn Reflect>>) -> Result<(), TypeMismatch>;

    fn reflect_ref(&self) -> ReflectRef<'_>;

    fn reflect_mut(&mut self) -> ReflectMut<'_>;

    /// Direct textual representation, `None` for null
    fn render(&self) -> Option<String>;
}

impl dyn Reflect {
    pub fn is<T: Reflect>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Reflect>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }
}

/// Static side of [`Reflect`]
pub trait Typed: Reflect + Clone {
    fn type_descriptor() -> TypeDescriptor;

    /// Zero-argument construction path, `None` when the type has none.
    fn instantiate() -> Option<Self>;

    fn from_reflect(value: Option<Box<dyn Reflect>>) -> Result<Self, TypeMismatch> {
        downcast_boxed(value)
    }
}

/// Implemented by user records and unit enums to make them navigable.
///
/// ```ignore
/// impl Bindable for Address {
///     fn schema() -> Schema {
///         Schema::record::<Self>()
///             .field("city", |a| &a.city, |a| &mut a.city)
///             .build()
///     }
///
///     fn construct() -> Option<Self> {
///         Some(Self::default())
///     }
/// }
/// ```
pub trait Bindable: Clone + fmt::Debug + Send + Sync + 'static {
    fn schema() -> Schema;

    /// Zero-argument construction path used for auto-vivification.
    fn construct() -> Option<Self> {
        None
    }
}

pub enum ReflectRef<'a> {
    Scalar,
    Record,
    Nullable(&'a dyn Nullable),
    Array(&'a dyn Sequence),
    List(&'a dyn Sequence),
    Map(&'a dyn Keyed),
}

pub enum ReflectMut<'a> {
    Scalar,
    Record,
    Nullable(&'a mut dyn Nullable),
    Array(&'a mut dyn Sequence),
    List(&'a mut dyn Sequence),
    Map(&'a mut dyn Keyed),
}

/// `Option<T>`
pub trait Nullable {
    fn is_null(&self) -> bool;

    fn value(&self) -> Option<&dyn Reflect>;

    fn value_mut(&mut self) -> Option<&mut dyn Reflect>;

    /// Current value, constructing a default one first when null.
    fn get_or_construct(&mut self) -> Result<&mut dyn Reflect, AccessError>;
}

/// Arrays and lists
pub trait Sequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect>;

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect>;

    /// Pad with default elements up to `len`. No-op when already long enough.
    fn grow(&mut self, len: usize) -> Result<(), AccessError>;

    fn append(&mut self, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError>;
}

/// Keyed maps
pub trait Keyed {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lookup(&self, key: &IndexKey) -> Result<Option<&dyn Reflect>, AccessError>;

    fn lookup_mut(&mut self, key: &IndexKey) -> Result<Option<&mut dyn Reflect>, AccessError>;

    fn lookup_or_construct(&mut self, key: &IndexKey) -> Result<&mut dyn Reflect, AccessError>;

    /// Insert or overwrite
    fn upsert(&mut self, key: &IndexKey, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("expected `{}`, found `{}`", short_type_name(.expected), short_type_name(.found))]
pub struct TypeMismatch {
    pub expected: &'static str,
    pub found: &'static str,
}

impl TypeMismatch {
    pub fn new<T: ?Sized>(found: &'static str) -> Self {
        Self {
            expected: type_name::<T>(),
            found,
        }
    }

    pub fn is_null(&self) -> bool {
        self.found == "null"
    }
}

/// Low-level access failure, located by the navigator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error(transparent)]
    Mismatch(#[from] TypeMismatch),

    #[error("`{key}` is not a valid `{}` key", short_type_name(.key_type))]
    Key { key: String, key_type: &'static str },

    #[error("`{}` has no zero-argument construction path", short_type_name(.0))]
    Unconstructible(&'static str),

    #[error("`{}` is not indexable", short_type_name(.0))]
    NotIndexable(&'static str),

    #[error("member is read-only")]
    ReadOnly,

    #[error("indexed member requires a key")]
    MissingKey,
}

impl AccessError {
    pub(crate) fn key<K>(key: &IndexKey) -> Self {
        AccessError::Key {
            key: key.to_text(),
            key_type: type_name::<K>(),
        }
    }

    pub(crate) fn unconstructible<T>() -> Self {
        AccessError::Unconstructible(type_name::<T>())
    }
}

pub(crate) fn downcast_boxed<T: Reflect>(
    value: Option<Box<dyn Reflect>>,
) -> Result<T, TypeMismatch> {
    let value = value.ok_or(TypeMismatch::new::<T>("null"))?;
    let found = value.type_name();
    value
        .into_any()
        .downcast::<T>()
        .map(|value| *value)
        .map_err(|_| TypeMismatch::new::<T>(found))
}

/// A value read from the graph
///
/// Borrows from the graph when reached through fields and containers, and owns
/// the value when it was produced by an accessor getter.
pub enum Fetched<'a> {
    Borrowed(&'a dyn Reflect),
    Owned(Box<dyn Reflect>),
}

impl<'a> Fetched<'a> {
    pub fn into_owned(self) -> Box<dyn Reflect> {
        match self {
            Fetched::Borrowed(value) => value.clone_value(),
            Fetched::Owned(value) => value,
        }
    }

    /// Cut the tie to the graph so the value outlives its owner
    pub(crate) fn detach<'b>(self) -> Fetched<'b> {
        Fetched::Owned(self.into_owned())
    }

    /// Peel `Option` layers; `None` when the value is null.
    pub fn non_null(self) -> Option<Fetched<'a>> {
        match self {
            Fetched::Borrowed(value) => match value.reflect_ref() {
                ReflectRef::Nullable(inner) => inner
                    .value()
                    .and_then(|value| Fetched::Borrowed(value).non_null()),
                _ => Some(Fetched::Borrowed(value)),
            },
            Fetched::Owned(value) => {
                let inner = match value.reflect_ref() {
                    ReflectRef::Nullable(inner) => Some(inner.value().map(|v| v.clone_value())),
                    _ => None,
                };
                match inner {
                    Some(Some(inner)) => Fetched::Owned(inner).non_null(),
                    Some(None) => None,
                    None => Some(Fetched::Owned(value)),
                }
            }
        }
    }

    pub fn downcast_ref<T: Reflect>(&self) -> Option<&T> {
        (**self).downcast_ref::<T>()
    }

    /// Clone out a concrete value
    pub fn get<T: Reflect + Clone>(&self) -> Option<T> {
        self.downcast_ref::<T>().cloned()
    }
}

impl Deref for Fetched<'_> {
    type Target = dyn Reflect;

    fn deref(&self) -> &Self::Target {
        match self {
            Fetched::Borrowed(value) => *value,
            Fetched::Owned(value) => &**value,
        }
    }
}

impl fmt::Debug for Fetched<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}
