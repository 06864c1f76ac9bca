//! `Reflect` for scalars, the standard containers and `Bindable` user types

use std::any::{type_name, Any};
use std::collections::{btree_map, hash_map, BTreeMap, HashMap};
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone};
use num_bigint::BigInt;
use rust_decimal::Decimal;

use super::{
    downcast_boxed, AccessError, Bindable, Keyed, Nullable, Reflect, ReflectMut, ReflectRef,
    Sequence, TypeMismatch, Typed,
};
use crate::path::IndexKey;
use crate::types::{Shape, TypeDescriptor};

macro_rules! reflect_common {
    () => {
        fn type_name(&self) -> &'static str {
            type_name::<Self>()
        }

        fn descriptor(&self) -> TypeDescriptor {
            <Self as Typed>::type_descriptor()
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }

        fn into_any(self: Box<Self>) -> Box<dyn Any> {
            self
        }

        fn clone_value(&self) -> Box<dyn Reflect> {
            Box::new(self.clone())
        }

        fn set(&mut self, value: Option<Box<dyn Reflect>>) -> Result<(), TypeMismatch> {
            *self = <Self as Typed>::from_reflect(value)?;
            Ok(())
        }
    };
}

// ============================================================================
// Scalars
// ============================================================================

macro_rules! impl_scalar {
    (@with $ty:ty, $default:expr, |$value:ident| $render:expr) => {
        impl Reflect for $ty {
            reflect_common!();

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Scalar
            }

            fn reflect_mut(&mut self) -> ReflectMut<'_> {
                ReflectMut::Scalar
            }

            fn render(&self) -> Option<String> {
                let $value = self;
                Some($render)
            }
        }

        impl Typed for $ty {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::new::<Self>(Shape::Scalar)
            }

            fn instantiate() -> Option<Self> {
                $default
            }
        }
    };
    ($($ty:ty),* $(,)?) => {
        $(impl_scalar!(@with $ty, Some(<$ty>::default()), |value| value.to_string());)*
    };
}

impl_scalar!(
    bool, char, i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, f32, f64,
    String, BigInt, Decimal,
);

impl_scalar!(@with NaiveDate, NaiveDate::from_ymd_opt(1970, 1, 1), |date| date.to_string());

impl_scalar!(
    @with NaiveDateTime,
    NaiveDate::from_ymd_opt(1970, 1, 1).and_then(|date| date.and_hms_opt(0, 0, 0)),
    |value| value.to_string()
);

impl_scalar!(@with PathBuf, Some(PathBuf::new()), |path| path.display().to_string());

impl_scalar!(
    @with DateTime<FixedOffset>,
    FixedOffset::east_opt(0).and_then(|utc| utc.timestamp_opt(0, 0).single()),
    |value| value.to_rfc3339()
);

// ============================================================================
// Option
// ============================================================================

impl<T: Typed> Reflect for Option<T> {
    reflect_common!();

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Nullable(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Nullable(self)
    }

    fn render(&self) -> Option<String> {
        self.as_ref().and_then(|value| value.render())
    }
}

impl<T: Typed> Typed for Option<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Shape::Nullable(Arc::new(T::type_descriptor())))
    }

    fn instantiate() -> Option<Self> {
        Some(None)
    }

    /// Accepts null, a bare `T` or an `Option<T>`.
    fn from_reflect(value: Option<Box<dyn Reflect>>) -> Result<Self, TypeMismatch> {
        match value {
            None => Ok(None),
            Some(value) if value.is::<Self>() => downcast_boxed(Some(value)),
            Some(value) => T::from_reflect(Some(value)).map(Some),
        }
    }
}

impl<T: Typed> Nullable for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn value(&self) -> Option<&dyn Reflect> {
        self.as_ref().map(|value| value as &dyn Reflect)
    }

    fn value_mut(&mut self) -> Option<&mut dyn Reflect> {
        self.as_mut().map(|value| value as &mut dyn Reflect)
    }

    fn get_or_construct(&mut self) -> Result<&mut dyn Reflect, AccessError> {
        let value = match self.take() {
            Some(value) => value,
            None => T::instantiate().ok_or_else(AccessError::unconstructible::<T>)?,
        };
        Ok(self.insert(value))
    }
}

// ============================================================================
// Sequences
// ============================================================================

fn render_items<'a>(items: impl Iterator<Item = &'a dyn Reflect>) -> String {
    let items: Vec<String> = items
        .map(|item| item.render().unwrap_or_else(|| "null".to_string()))
        .collect();
    format!("[{}]", items.join(", "))
}

impl<T: Typed> Reflect for Vec<T> {
    reflect_common!();

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::List(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::List(self)
    }

    fn render(&self) -> Option<String> {
        Some(render_items(self.iter().map(|item| item as &dyn Reflect)))
    }
}

impl<T: Typed> Typed for Vec<T> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Shape::List(Arc::new(T::type_descriptor())))
    }

    fn instantiate() -> Option<Self> {
        Some(Vec::new())
    }
}

impl<T: Typed> Sequence for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        <[T]>::get(self, index).map(|item| item as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        <[T]>::get_mut(self, index).map(|item| item as &mut dyn Reflect)
    }

    fn grow(&mut self, len: usize) -> Result<(), AccessError> {
        while Vec::len(self) < len {
            let filler = T::instantiate().ok_or_else(AccessError::unconstructible::<T>)?;
            Vec::push(self, filler);
        }
        Ok(())
    }

    fn append(&mut self, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError> {
        Vec::push(self, T::from_reflect(value)?);
        Ok(())
    }
}

impl<T: Typed> Reflect for Box<[T]> {
    reflect_common!();

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Array(self)
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Array(self)
    }

    fn render(&self) -> Option<String> {
        Some(render_items(self.iter().map(|item| item as &dyn Reflect)))
    }
}

impl<T: Typed> Typed for Box<[T]> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Shape::Array(Arc::new(T::type_descriptor())))
    }

    fn instantiate() -> Option<Self> {
        Some(Vec::new().into_boxed_slice())
    }
}

// Arrays never change length in place: growth builds a new allocation.
impl<T: Typed> Sequence for Box<[T]> {
    fn len(&self) -> usize {
        <[T]>::len(self)
    }

    fn element(&self, index: usize) -> Option<&dyn Reflect> {
        <[T]>::get(self, index).map(|item| item as &dyn Reflect)
    }

    fn element_mut(&mut self, index: usize) -> Option<&mut dyn Reflect> {
        <[T]>::get_mut(self, index).map(|item| item as &mut dyn Reflect)
    }

    fn grow(&mut self, len: usize) -> Result<(), AccessError> {
        let current = <[T]>::len(self);
        if len <= current {
            return Ok(());
        }
        let mut filler = Vec::with_capacity(len - current);
        for _ in current..len {
            filler.push(T::instantiate().ok_or_else(AccessError::unconstructible::<T>)?);
        }
        let mut grown = std::mem::take(self).into_vec();
        grown.extend(filler);
        *self = grown.into_boxed_slice();
        Ok(())
    }

    fn append(&mut self, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError> {
        let value = T::from_reflect(value)?;
        let mut grown = std::mem::take(self).into_vec();
        grown.push(value);
        *self = grown.into_boxed_slice();
        Ok(())
    }
}

// ============================================================================
// Maps
// ============================================================================

/// Types usable as map keys in expressions (`map['key']`, `map[3]`)
pub trait MapKey: Typed {
    fn from_index(key: &IndexKey) -> Result<Self, AccessError>;
}

impl MapKey for String {
    fn from_index(key: &IndexKey) -> Result<Self, AccessError> {
        Ok(key.to_text())
    }
}

macro_rules! impl_integer_key {
    ($($ty:ty),* $(,)?) => {$(
        impl MapKey for $ty {
            fn from_index(key: &IndexKey) -> Result<Self, AccessError> {
                match key {
                    IndexKey::Ordinal(index) => {
                        <$ty>::try_from(*index).map_err(|_| AccessError::key::<$ty>(key))
                    }
                    IndexKey::Literal(text) => {
                        text.parse::<$ty>().map_err(|_| AccessError::key::<$ty>(key))
                    }
                }
            }
        }
    )*};
}

impl_integer_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

fn render_entries<'a>(entries: impl Iterator<Item = (&'a dyn Reflect, &'a dyn Reflect)>) -> String {
    let entries: Vec<String> = entries
        .map(|(key, value)| {
            format!(
                "{}={}",
                key.render().unwrap_or_default(),
                value.render().unwrap_or_else(|| "null".to_string())
            )
        })
        .collect();
    format!("{{{}}}", entries.join(", "))
}

macro_rules! impl_map {
    ($map:ident, $entry:ident, $($bound:path),+) => {
        impl<K, V> Reflect for $map<K, V>
        where
            K: MapKey $(+ $bound)+,
            V: Typed,
        {
            reflect_common!();

            fn reflect_ref(&self) -> ReflectRef<'_> {
                ReflectRef::Map(self)
            }

            fn reflect_mut(&mut self) -> ReflectMut<'_> {
                ReflectMut::Map(self)
            }

            fn render(&self) -> Option<String> {
                Some(render_entries(
                    self.iter()
                        .map(|(key, value)| (key as &dyn Reflect, value as &dyn Reflect)),
                ))
            }
        }

        impl<K, V> Typed for $map<K, V>
        where
            K: MapKey $(+ $bound)+,
            V: Typed,
        {
            fn type_descriptor() -> TypeDescriptor {
                TypeDescriptor::new::<Self>(Shape::Map {
                    key: Arc::new(K::type_descriptor()),
                    value: Arc::new(V::type_descriptor()),
                })
            }

            fn instantiate() -> Option<Self> {
                Some($map::new())
            }
        }

        impl<K, V> Keyed for $map<K, V>
        where
            K: MapKey $(+ $bound)+,
            V: Typed,
        {
            fn len(&self) -> usize {
                $map::len(self)
            }

            fn lookup(&self, key: &IndexKey) -> Result<Option<&dyn Reflect>, AccessError> {
                let key = K::from_index(key)?;
                Ok($map::get(self, &key).map(|value| value as &dyn Reflect))
            }

            fn lookup_mut(&mut self, key: &IndexKey) -> Result<Option<&mut dyn Reflect>, AccessError> {
                let key = K::from_index(key)?;
                Ok($map::get_mut(self, &key).map(|value| value as &mut dyn Reflect))
            }

            fn lookup_or_construct(&mut self, key: &IndexKey) -> Result<&mut dyn Reflect, AccessError> {
                let key = K::from_index(key)?;
                let value = match $map::entry(self, key) {
                    $entry::Entry::Occupied(entry) => entry.into_mut(),
                    $entry::Entry::Vacant(entry) => {
                        let fresh = V::instantiate().ok_or_else(AccessError::unconstructible::<V>)?;
                        entry.insert(fresh)
                    }
                };
                Ok(value as &mut dyn Reflect)
            }

            fn upsert(&mut self, key: &IndexKey, value: Option<Box<dyn Reflect>>) -> Result<(), AccessError> {
                let key = K::from_index(key)?;
                let value = V::from_reflect(value)?;
                $map::insert(self, key, value);
                Ok(())
            }
        }
    };
}

impl_map!(HashMap, hash_map, Eq, Hash);
impl_map!(BTreeMap, btree_map, Ord);

// ============================================================================
// User types
// ============================================================================

impl<T: Bindable> Reflect for T {
    reflect_common!();

    fn reflect_ref(&self) -> ReflectRef<'_> {
        ReflectRef::Record
    }

    fn reflect_mut(&mut self) -> ReflectMut<'_> {
        ReflectMut::Record
    }

    fn render(&self) -> Option<String> {
        Some(format!("{:?}", self))
    }
}

impl<T: Bindable> Typed for T {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::new::<Self>(Shape::Bindable(T::schema))
    }

    fn instantiate() -> Option<Self> {
        <T as Bindable>::construct()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_accepts_bare_and_wrapped() {
        let mut slot: Option<i32> = None;
        slot.set(Some(Box::new(5i32))).unwrap();
        assert_eq!(slot, Some(5));
        slot.set(Some(Box::new(Some(7i32)))).unwrap();
        assert_eq!(slot, Some(7));
        slot.set(None).unwrap();
        assert_eq!(slot, None);
    }

    #[test]
    fn test_scalar_rejects_null_and_mismatch() {
        let mut value = 1i32;
        let err = value.set(None).unwrap_err();
        assert!(err.is_null());
        let err = value.set(Some(Box::new("x".to_string()))).unwrap_err();
        assert_eq!(err.found, "alloc::string::String");
        assert_eq!(value, 1);
    }

    #[test]
    fn test_array_growth_reallocates() {
        let mut items: Box<[String]> = vec!["a".to_string()].into_boxed_slice();
        Sequence::grow(&mut items, 3).unwrap();
        assert_eq!(&*items, &["a".to_string(), String::new(), String::new()]);
        Sequence::append(&mut items, Some(Box::new("d".to_string()))).unwrap();
        assert_eq!(items.len(), 4);
    }

    #[test]
    fn test_numeric_map_keys() {
        let mut scores: BTreeMap<u8, String> = BTreeMap::new();
        Keyed::upsert(&mut scores, &IndexKey::Ordinal(7), Some(Box::new("seven".to_string())))
            .unwrap();
        Keyed::upsert(&mut scores, &IndexKey::Literal("7".into()), Some(Box::new("again".to_string())))
            .unwrap();
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[&7], "again");

        let err = Keyed::lookup(&scores, &IndexKey::Ordinal(300)).unwrap_err();
        assert!(matches!(err, AccessError::Key { .. }));
    }

    #[test]
    fn test_render() {
        assert_eq!(Some(3.5f64).render(), Some("3.5".to_string()));
        assert_eq!(None::<String>.render(), None);
        assert_eq!(vec![Some(1), None].render(), Some("[1, null]".to_string()));
    }
}
