//! Declared type information
//!
//! A [`TypeDescriptor`] is computed from a type's static [`Typed`] impl once, when a
//! slot is resolved, and carries everything the walk needs later: the runtime
//! [`TypeId`], the container shape with element/key types, and the
//! zero-argument construction path used for auto-vivification.

use std::any::{type_name, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::reflect::{Reflect, Schema, Typed};

/// Structural shape of a declared type
#[derive(Clone, Debug)]
pub enum Shape {
    /// Leaf value converted as a whole
    Scalar,
    /// User type described by a [`Schema`] (record or unit enum)
    Bindable(fn() -> Schema),
    /// `Option<T>`
    Nullable(Arc<TypeDescriptor>),
    /// `Box<[T]>`, fixed length
    Array(Arc<TypeDescriptor>),
    /// `Vec<T>`
    List(Arc<TypeDescriptor>),
    /// `HashMap<K, V>` / `BTreeMap<K, V>`
    Map {
        key: Arc<TypeDescriptor>,
        value: Arc<TypeDescriptor>,
    },
}

#[derive(Clone)]
pub struct TypeDescriptor {
    id: TypeId,
    name: &'static str,
    shape: Shape,
    construct: fn() -> Option<Box<dyn Reflect>>,
}

impl TypeDescriptor {
    pub fn new<T: Typed>(shape: Shape) -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: type_name::<T>(),
            shape,
            construct: instantiate_erased::<T>,
        }
    }

    /// Descriptor of a static type
    pub fn of<T: Typed>() -> Self {
        T::type_descriptor()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths stripped, for messages
    pub fn short_name(&self) -> String {
        short_type_name(self.name)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is<T: 'static>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self.shape, Shape::Nullable(_))
    }

    /// The type itself, or the wrapped type for `Option<T>`.
    pub fn non_null(&self) -> &TypeDescriptor {
        match &self.shape {
            Shape::Nullable(inner) => inner.non_null(),
            _ => self,
        }
    }

    /// Element type of arrays and lists
    pub fn element(&self) -> Option<&TypeDescriptor> {
        match &self.shape {
            Shape::Array(element) | Shape::List(element) => Some(element),
            _ => None,
        }
    }

    pub fn map_key(&self) -> Option<&TypeDescriptor> {
        match &self.shape {
            Shape::Map { key, .. } => Some(key),
            _ => None,
        }
    }

    pub fn map_value(&self) -> Option<&TypeDescriptor> {
        match &self.shape {
            Shape::Map { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Schema of a bindable type
    pub fn schema(&self) -> Option<Schema> {
        match self.shape {
            Shape::Bindable(schema) => Some(schema()),
            _ => None,
        }
    }

    /// Create a fresh default instance through the zero-argument construction path.
    pub fn instantiate(&self) -> Option<Box<dyn Reflect>> {
        (self.construct)()
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeDescriptor {}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("name", &self.name)
            .field("shape", &self.shape)
            .finish()
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}

fn instantiate_erased<T: Typed>() -> Option<Box<dyn Reflect>> {
    T::instantiate().map(|value| Box::new(value) as Box<dyn Reflect>)
}

/// `alloc::vec::Vec<my_crate::User>` -> `Vec<User>`
pub(crate) fn short_type_name(full: &str) -> String {
    fn last(path: &str) -> &str {
        path.rsplit("::").next().unwrap_or(path)
    }

    let mut out = String::with_capacity(full.len());
    let mut path = String::new();
    for c in full.chars() {
        if c.is_alphanumeric() || c == '_' || c == ':' {
            path.push(c);
        } else {
            out.push_str(last(&path));
            path.clear();
            out.push(c);
        }
    }
    out.push_str(last(&path));
    out
}
