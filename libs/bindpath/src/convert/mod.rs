//! Converter registry and dispatch
//!
//! A [`Converter`] turns submitted strings into typed values and back. The
//! [`ConverterRegistry`] finds the converter for a declared type (exact type
//! first, then a capability such as "unit enum") and applies the shared policies:
//!
//! - `Option<T>` targets are converted with `T`'s converter,
//! - array and list targets convert every submitted value with the element
//!   converter and assemble the container,
//! - an empty submitted string becomes null for nullable targets when
//!   `empty_string_is_null` is set, and the converter's default value otherwise.
//!   Whitespace is a value and goes to the converter.

mod builtin;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use crate::attributes::Attributes;
use crate::error::ConvertError;
use crate::reflect::{AccessError, Reflect, ReflectMut, ReflectRef, Schema, Typed};
use crate::types::TypeDescriptor;

pub use builtin::{
    BooleanConverter, ParseConverter, PathConverter, StringConverter, Temporal,
    TemporalConverter, VariantConverter,
};

/// Bidirectional string/value conversion for one or more target types
pub trait Converter: Send + Sync {
    /// Convert a single non-empty string.
    fn convert_from_str(
        &self,
        target: &TypeDescriptor,
        value: &str,
        attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError>;

    /// Convert a multi-valued submission. Scalars reject more than one value.
    fn convert_from_strs(
        &self,
        target: &TypeDescriptor,
        values: &[&str],
        attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        match values {
            [value] => self.convert_from_str(target, value, attributes),
            _ => Err(ConvertError::state(format!(
                "`{}` accepts a single value, got {}",
                target,
                values.len()
            ))),
        }
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        attributes: &Attributes,
    ) -> Result<String, ConvertError>;

    /// Canonical zero value used for empty input, `None` when the type has none.
    fn default_value(&self, target: &TypeDescriptor) -> Option<Box<dyn Reflect>>;
}

/// Family of types served by one converter when no exact match is registered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum Capability {
    /// Unit enums declared with `Schema::variants`
    Variants,
}

impl Capability {
    fn of(target: &TypeDescriptor) -> Option<Capability> {
        match target.schema()? {
            Schema::Variants(_) => Some(Capability::Variants),
            Schema::Record(_) => None,
        }
    }
}

/// Maps target types to converters
#[derive(Clone)]
pub struct ConverterRegistry {
    by_type: HashMap<TypeId, Arc<dyn Converter>>,
    by_capability: HashMap<Capability, Arc<dyn Converter>>,
}

impl Default for ConverterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConverterRegistry {
    /// Registry with the built-in converters
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtin::register_defaults(&mut registry);
        registry
    }

    pub fn empty() -> Self {
        Self {
            by_type: HashMap::new(),
            by_capability: HashMap::new(),
        }
    }

    /// Register `converter` for `T`, replacing any previous one.
    pub fn register<T: Typed>(&mut self, converter: impl Converter + 'static) -> &mut Self {
        self.by_type.insert(TypeId::of::<T>(), Arc::new(converter));
        self
    }

    pub fn register_capability(
        &mut self,
        capability: Capability,
        converter: impl Converter + 'static,
    ) -> &mut Self {
        self.by_capability.insert(capability, Arc::new(converter));
        self
    }

    /// Converter for `target` (nullable wrappers are looked through).
    pub fn find(&self, target: &TypeDescriptor) -> Result<&dyn Converter, ConvertError> {
        let target = target.non_null();
        if let Some(converter) = self.by_type.get(&target.id()) {
            return Ok(converter.as_ref());
        }
        Capability::of(target)
            .and_then(|capability| self.by_capability.get(&capability))
            .map(|converter| converter.as_ref())
            .ok_or_else(|| ConvertError::state(format!("no converter for type `{}`", target)))
    }

    /// Convert submitted strings into a value for `target`.
    ///
    /// `Ok(None)` means null and is only produced for nullable targets, or when
    /// the converter has no zero value for empty input.
    pub fn convert(
        &self,
        target: &TypeDescriptor,
        values: &[&str],
        attributes: &Attributes,
        empty_string_is_null: bool,
    ) -> Result<Option<Box<dyn Reflect>>, ConvertError> {
        let nullable = target.is_nullable();
        let target = target.non_null();

        if let Some(element) = target.element() {
            return self
                .convert_sequence(target, element, values, attributes, empty_string_is_null)
                .map(Some);
        }

        let converter = self.find(target)?;
        match values {
            [] if nullable => Ok(None),
            [] => Ok(converter.default_value(target)),
            [value] if value.is_empty() => {
                if nullable && empty_string_is_null {
                    Ok(None)
                } else {
                    Ok(converter.default_value(target))
                }
            }
            [value] => converter.convert_from_str(target, value, attributes).map(Some),
            _ => converter.convert_from_strs(target, values, attributes).map(Some),
        }
    }

    fn convert_sequence(
        &self,
        target: &TypeDescriptor,
        element: &TypeDescriptor,
        values: &[&str],
        attributes: &Attributes,
        empty_string_is_null: bool,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        let mut container = target.instantiate().ok_or_else(|| {
            ConvertError::state(format!("`{}` has no zero-argument construction path", target))
        })?;
        let (ReflectMut::Array(items) | ReflectMut::List(items)) = container.reflect_mut() else {
            return Err(ConvertError::state(format!("`{}` is not a sequence", target)));
        };
        for value in values {
            let item = self.convert(element, &[*value], attributes, empty_string_is_null)?;
            items.append(item).map_err(|e| match e {
                AccessError::Mismatch(mismatch) if mismatch.is_null() => {
                    ConvertError::invalid(mismatch.to_string())
                }
                other => ConvertError::state(other.to_string()),
            })?;
        }
        Ok(container)
    }

    /// Stringify a value through its converter. Sequences join their elements
    /// with `,`; null yields `None`.
    pub fn stringify(
        &self,
        value: &dyn Reflect,
        attributes: &Attributes,
    ) -> Result<Option<String>, ConvertError> {
        match value.reflect_ref() {
            ReflectRef::Nullable(inner) => match inner.value() {
                Some(inner) => self.stringify(inner, attributes),
                None => Ok(None),
            },
            ReflectRef::Array(items) | ReflectRef::List(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for index in 0..items.len() {
                    if let Some(item) = items.element(index) {
                        if let Some(text) = self.stringify(item, attributes)? {
                            parts.push(text);
                        }
                    }
                }
                Ok(Some(parts.join(",")))
            }
            _ => {
                let converter = self.find(&value.descriptor())?;
                converter.convert_to_string(value, attributes).map(Some)
            }
        }
    }
}

/// Downcast a converter's input, reporting the mismatch as a state error.
pub(crate) fn typed_input<'a, T: Reflect>(value: &'a dyn Reflect) -> Result<&'a T, ConvertError> {
    value.downcast_ref::<T>().ok_or_else(|| {
        ConvertError::state(format!(
            "converter for `{}` cannot stringify `{}`",
            crate::types::short_type_name(std::any::type_name::<T>()),
            crate::types::short_type_name(value.type_name())
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::path::PathBuf;

    fn convert<T: Typed>(values: &[&str], attributes: &Attributes) -> Result<Option<T>, ConvertError> {
        let registry = ConverterRegistry::new();
        let value = registry.convert(&T::type_descriptor(), values, attributes, true)?;
        Ok(value.map(|v| *v.into_any().downcast::<T>().unwrap()))
    }

    #[test]
    fn test_boolean_tokens() {
        let none = Attributes::new();
        for (token, expected) in [("true", true), ("on", true), ("yes", true), ("false", false), ("off", false), ("no", false)] {
            assert_eq!(convert::<bool>(&[token], &none).unwrap(), Some(expected));
        }
        assert!(matches!(convert::<bool>(&["TRUE"], &none), Err(ConvertError::Invalid(_))));
        assert!(matches!(convert::<bool>(&["1"], &none), Err(ConvertError::Invalid(_))));
    }

    #[test]
    fn test_numeric_parse_failure_is_invalid() {
        let none = Attributes::new();
        assert_eq!(convert::<i64>(&["-42"], &none).unwrap(), Some(-42));
        assert!(matches!(convert::<u8>(&["256"], &none), Err(ConvertError::Invalid(_))));
        assert!(matches!(convert::<f64>(&["abc"], &none), Err(ConvertError::Invalid(_))));
    }

    #[test]
    fn test_scalar_rejects_multiple_values() {
        let err = convert::<i32>(&["1", "2"], &Attributes::new()).unwrap_err();
        assert!(matches!(err, ConvertError::State(_)));
    }

    #[test]
    fn test_string_joins_multiple_values() {
        let joined = convert::<String>(&["a", "b", "c"], &Attributes::new()).unwrap();
        assert_eq!(joined.as_deref(), Some("a,b,c"));
    }

    #[test]
    fn test_blank_policy() {
        let registry = ConverterRegistry::new();
        let none = Attributes::new();

        let value = registry
            .convert(&TypeDescriptor::of::<Option<String>>(), &[""], &none, true)
            .unwrap();
        assert!(value.is_none());

        let value = registry
            .convert(&TypeDescriptor::of::<i32>(), &[""], &none, true)
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&0));

        let value = registry
            .convert(&TypeDescriptor::of::<Option<i32>>(), &[""], &none, false)
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<i32>(), Some(&0));
    }

    #[test]
    fn test_whitespace_is_not_blank() {
        let none = Attributes::new();
        assert_eq!(convert::<char>(&[" "], &none).unwrap(), Some(' '));
        assert_eq!(convert::<String>(&["   "], &none).unwrap().as_deref(), Some("   "));
        assert!(matches!(convert::<i32>(&["  "], &none), Err(ConvertError::Invalid(_))));
    }

    #[test]
    fn test_sequence_converts_each_element() {
        let values = convert::<Vec<i32>>(&["1", "2", "3"], &Attributes::new()).unwrap();
        assert_eq!(values, Some(vec![1, 2, 3]));

        let single = convert::<Box<[String]>>(&["only"], &Attributes::new()).unwrap();
        assert_eq!(single.as_deref(), Some(&["only".to_string()][..]));
    }

    #[test]
    fn test_blank_element_without_zero_value_is_invalid() {
        let attrs = Attributes::new().with(crate::attributes::DATE_TIME_FORMAT, "%Y-%m-%d");
        let err = convert::<Vec<NaiveDate>>(&["2024-01-02", ""], &attrs).unwrap_err();
        assert!(matches!(err, ConvertError::Invalid(_)));

        let dates = convert::<Vec<Option<NaiveDate>>>(&["2024-01-02", ""], &attrs).unwrap();
        assert_eq!(dates, Some(vec![NaiveDate::from_ymd_opt(2024, 1, 2), None]));
    }

    #[test]
    fn test_date_requires_format() {
        let err = convert::<NaiveDate>(&["2024-01-02"], &Attributes::new()).unwrap_err();
        assert!(matches!(err, ConvertError::State(_)));

        let attrs = Attributes::new().with(crate::attributes::DATE_TIME_FORMAT, "%Y-%m-%d");
        let date = convert::<NaiveDate>(&["2024-01-02"], &attrs).unwrap();
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 1, 2));

        let err = convert::<NaiveDate>(&["01/02/2024"], &attrs).unwrap_err();
        assert!(matches!(err, ConvertError::Invalid(_)));
    }

    #[test]
    fn test_path_resolves_against_parent_dir() {
        let attrs = Attributes::new().with(crate::attributes::PARENT_DIR, "/srv/uploads");
        let path = convert::<PathBuf>(&["avatar.png"], &attrs).unwrap();
        assert_eq!(path, Some(PathBuf::from("/srv/uploads/avatar.png")));

        let path = convert::<PathBuf>(&["/tmp/x"], &attrs).unwrap();
        assert_eq!(path, Some(PathBuf::from("/tmp/x")));
    }

    #[test]
    fn test_unknown_type_has_no_converter() {
        let registry = ConverterRegistry::new();
        let err = registry.find(&TypeDescriptor::of::<HashMap<String, i32>>()).err();
        assert!(matches!(err, Some(ConvertError::State(message)) if message.contains("no converter")));
    }

    #[test]
    fn test_custom_converter_overrides_builtin() {
        struct Upper;
        impl Converter for Upper {
            fn convert_from_str(&self, _: &TypeDescriptor, value: &str, _: &Attributes) -> Result<Box<dyn Reflect>, ConvertError> {
                Ok(Box::new(value.to_uppercase()))
            }
            fn convert_to_string(&self, value: &dyn Reflect, _: &Attributes) -> Result<String, ConvertError> {
                typed_input::<String>(value).map(|s| s.to_lowercase())
            }
            fn default_value(&self, _: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
                None
            }
        }

        let mut registry = ConverterRegistry::new();
        registry.register::<String>(Upper);
        let value = registry
            .convert(&TypeDescriptor::of::<String>(), &["abc"], &Attributes::new(), true)
            .unwrap()
            .unwrap();
        assert_eq!(value.downcast_ref::<String>().map(String::as_str), Some("ABC"));
    }
}
