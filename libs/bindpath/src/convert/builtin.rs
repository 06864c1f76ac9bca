//! Built-in converters

use std::fmt::{Display, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::format::{DelayedFormat, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use num_bigint::BigInt;
use rust_decimal::Decimal;

use super::{typed_input, Capability, Converter, ConverterRegistry};
use crate::attributes::Attributes;
use crate::error::ConvertError;
use crate::reflect::{Reflect, Schema, Typed};
use crate::types::TypeDescriptor;

pub(super) fn register_defaults(registry: &mut ConverterRegistry) {
    registry.register::<bool>(BooleanConverter);
    registry.register::<String>(StringConverter);

    registry.register::<i8>(ParseConverter::<i8>::new("integer"));
    registry.register::<i16>(ParseConverter::<i16>::new("integer"));
    registry.register::<i32>(ParseConverter::<i32>::new("integer"));
    registry.register::<i64>(ParseConverter::<i64>::new("integer"));
    registry.register::<i128>(ParseConverter::<i128>::new("integer"));
    registry.register::<isize>(ParseConverter::<isize>::new("integer"));
    registry.register::<u8>(ParseConverter::<u8>::new("integer"));
    registry.register::<u16>(ParseConverter::<u16>::new("integer"));
    registry.register::<u32>(ParseConverter::<u32>::new("integer"));
    registry.register::<u64>(ParseConverter::<u64>::new("integer"));
    registry.register::<u128>(ParseConverter::<u128>::new("integer"));
    registry.register::<usize>(ParseConverter::<usize>::new("integer"));
    registry.register::<BigInt>(ParseConverter::<BigInt>::new("integer"));
    registry.register::<f32>(ParseConverter::<f32>::new("number"));
    registry.register::<f64>(ParseConverter::<f64>::new("number"));
    registry.register::<Decimal>(ParseConverter::<Decimal>::new("decimal"));
    registry.register::<char>(ParseConverter::<char>::new("character"));

    registry.register::<NaiveDate>(TemporalConverter::<NaiveDate>::new());
    registry.register::<NaiveDateTime>(TemporalConverter::<NaiveDateTime>::new());
    registry.register::<DateTime<FixedOffset>>(TemporalConverter::<DateTime<FixedOffset>>::new());

    registry.register::<PathBuf>(PathConverter);
    registry.register_capability(Capability::Variants, VariantConverter);
}

// ============================================================================
// Boolean
// ============================================================================

/// `true`/`on`/`yes` and `false`/`off`/`no`, case-sensitive
#[derive(Debug, Clone, Copy, Default)]
pub struct BooleanConverter;

impl Converter for BooleanConverter {
    fn convert_from_str(
        &self,
        _target: &TypeDescriptor,
        value: &str,
        _attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        let parsed = match value {
            "true" | "on" | "yes" => true,
            "false" | "off" | "no" => false,
            other => {
                return Err(ConvertError::invalid(format!(
                    "`{other}` is not a valid boolean"
                )))
            }
        };
        Ok(Box::new(parsed))
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        _attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        typed_input::<bool>(value).map(bool::to_string)
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        Some(Box::new(false))
    }
}

// ============================================================================
// FromStr family (numbers, characters)
// ============================================================================

/// Converter for any `FromStr + Display` scalar. The zero value is `T::default()`.
pub struct ParseConverter<T> {
    label: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ParseConverter<T> {
    /// `label` names the kind of value in conversion messages.
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            _marker: PhantomData,
        }
    }
}

impl<T> Converter for ParseConverter<T>
where
    T: Typed + FromStr + Display + Default,
{
    fn convert_from_str(
        &self,
        _target: &TypeDescriptor,
        value: &str,
        _attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        value
            .parse::<T>()
            .map(|parsed| Box::new(parsed) as Box<dyn Reflect>)
            .map_err(|_| ConvertError::invalid(format!("`{value}` is not a valid {}", self.label)))
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        _attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        typed_input::<T>(value).map(T::to_string)
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        Some(Box::new(T::default()))
    }
}

// ============================================================================
// String
// ============================================================================

/// Pass-through. Multi-valued submissions are joined with `,`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringConverter;

impl Converter for StringConverter {
    fn convert_from_str(
        &self,
        _target: &TypeDescriptor,
        value: &str,
        _attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        Ok(Box::new(value.to_string()))
    }

    fn convert_from_strs(
        &self,
        _target: &TypeDescriptor,
        values: &[&str],
        _attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        if values.len() > 1 {
            tracing::warn!(
                count = values.len(),
                "joining multiple submitted values into a single string"
            );
        }
        Ok(Box::new(values.join(",")))
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        _attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        typed_input::<String>(value).cloned()
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        Some(Box::new(String::new()))
    }
}

// ============================================================================
// Dates and times
// ============================================================================

/// Date-like types parsed and formatted with a `strftime` pattern
pub trait Temporal: Typed + Sized {
    fn parse_with(value: &str, format: &str) -> chrono::ParseResult<Self>;

    fn format_with<'a>(&self, format: &'a str) -> DelayedFormat<StrftimeItems<'a>>;
}

impl Temporal for NaiveDate {
    fn parse_with(value: &str, format: &str) -> chrono::ParseResult<Self> {
        NaiveDate::parse_from_str(value, format)
    }

    fn format_with<'a>(&self, format: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(format)
    }
}

impl Temporal for NaiveDateTime {
    fn parse_with(value: &str, format: &str) -> chrono::ParseResult<Self> {
        NaiveDateTime::parse_from_str(value, format)
    }

    fn format_with<'a>(&self, format: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(format)
    }
}

impl Temporal for DateTime<FixedOffset> {
    fn parse_with(value: &str, format: &str) -> chrono::ParseResult<Self> {
        DateTime::parse_from_str(value, format)
    }

    fn format_with<'a>(&self, format: &'a str) -> DelayedFormat<StrftimeItems<'a>> {
        self.format(format)
    }
}

/// Requires the `dateTimeFormat` attribute in both directions. Has no zero value.
pub struct TemporalConverter<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> TemporalConverter<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for TemporalConverter<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn required_format<'a>(target: &dyn Display, attributes: &'a Attributes) -> Result<&'a str, ConvertError> {
    attributes.date_time_format().ok_or_else(|| {
        ConvertError::state(format!(
            "converting `{target}` requires the `{}` attribute",
            crate::attributes::DATE_TIME_FORMAT
        ))
    })
}

impl<T: Temporal> Converter for TemporalConverter<T> {
    fn convert_from_str(
        &self,
        target: &TypeDescriptor,
        value: &str,
        attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        let format = required_format(target, attributes)?;
        T::parse_with(value, format)
            .map(|parsed| Box::new(parsed) as Box<dyn Reflect>)
            .map_err(|e| {
                ConvertError::invalid(format!("`{value}` does not match format `{format}`: {e}"))
            })
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        let typed = typed_input::<T>(value)?;
        let format = required_format(&value.descriptor(), attributes)?;
        let mut out = String::new();
        write!(out, "{}", typed.format_with(format))
            .map_err(|_| ConvertError::state(format!("invalid date format `{format}`")))?;
        Ok(out)
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        None
    }
}

// ============================================================================
// File paths
// ============================================================================

/// Relative paths are joined onto the optional `parentDir` attribute.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathConverter;

impl Converter for PathConverter {
    fn convert_from_str(
        &self,
        _target: &TypeDescriptor,
        value: &str,
        attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        let path = Path::new(value);
        let resolved = match attributes.parent_dir() {
            Some(parent) if path.is_relative() => Path::new(parent).join(path),
            _ => path.to_path_buf(),
        };
        Ok(Box::new(resolved))
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        _attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        typed_input::<PathBuf>(value).map(|path| path.display().to_string())
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        Some(Box::new(PathBuf::new()))
    }
}

// ============================================================================
// Unit enums
// ============================================================================

/// Matches the exact variant name declared in `Schema::variants`
#[derive(Debug, Clone, Copy, Default)]
pub struct VariantConverter;

impl Converter for VariantConverter {
    fn convert_from_str(
        &self,
        target: &TypeDescriptor,
        value: &str,
        _attributes: &Attributes,
    ) -> Result<Box<dyn Reflect>, ConvertError> {
        let schema = target
            .schema()
            .ok_or_else(|| ConvertError::state(format!("`{target}` has no variants")))?;
        let variants = schema
            .as_variants()
            .ok_or_else(|| ConvertError::state(format!("`{target}` has no variants")))?;
        variants
            .value_of(value)
            .ok_or_else(|| ConvertError::invalid(format!("`{value}` is not a variant of `{target}`")))
    }

    fn convert_to_string(
        &self,
        value: &dyn Reflect,
        _attributes: &Attributes,
    ) -> Result<String, ConvertError> {
        let descriptor = value.descriptor();
        let name = match descriptor.schema() {
            Some(Schema::Variants(variants)) => variants.name_of(value),
            _ => None,
        };
        name.map(str::to_string)
            .ok_or_else(|| ConvertError::state(format!("`{descriptor}` has no variants")))
    }

    fn default_value(&self, _target: &TypeDescriptor) -> Option<Box<dyn Reflect>> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reflect::Bindable;

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Tier {
        Gold,
        Silver,
    }

    impl Bindable for Tier {
        fn schema() -> Schema {
            Schema::variants(&[("GOLD", Tier::Gold), ("SILVER", Tier::Silver)])
        }
    }

    #[test]
    fn test_variant_by_exact_name() {
        let registry = ConverterRegistry::new();
        let target = TypeDescriptor::of::<Tier>();
        let converter = registry.find(&target).unwrap();

        let value = converter.convert_from_str(&target, "SILVER", &Attributes::new()).unwrap();
        assert_eq!(value.downcast_ref::<Tier>(), Some(&Tier::Silver));
        assert_eq!(converter.convert_to_string(&Tier::Gold, &Attributes::new()).unwrap(), "GOLD");

        let err = converter.convert_from_str(&target, "gold", &Attributes::new()).unwrap_err();
        assert!(matches!(err, ConvertError::Invalid(_)));
    }

    #[test]
    fn test_temporal_round_trip_uses_format() {
        let converter = TemporalConverter::<NaiveDateTime>::new();
        let attrs = Attributes::new().with(crate::attributes::DATE_TIME_FORMAT, "%d.%m.%Y %H:%M");
        let target = TypeDescriptor::of::<NaiveDateTime>();

        let value = converter.convert_from_str(&target, "02.01.2024 13:45", &attrs).unwrap();
        assert_eq!(converter.convert_to_string(&*value, &attrs).unwrap(), "02.01.2024 13:45");

        let err = converter.convert_to_string(&*value, &Attributes::new()).unwrap_err();
        assert!(matches!(err, ConvertError::State(_)));
    }

    #[test]
    fn test_offset_date_time() {
        let converter = TemporalConverter::<DateTime<FixedOffset>>::new();
        let attrs = Attributes::new().with(crate::attributes::DATE_TIME_FORMAT, "%Y-%m-%dT%H:%M:%S%z");
        let target = TypeDescriptor::of::<DateTime<FixedOffset>>();

        let value = converter
            .convert_from_str(&target, "2024-05-06T07:08:09+0200", &attrs)
            .unwrap();
        let parsed = value.downcast_ref::<DateTime<FixedOffset>>().unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 7200);
    }

    #[test]
    fn test_big_numbers() {
        let registry = ConverterRegistry::new();
        let target = TypeDescriptor::of::<Decimal>();
        let value = registry
            .find(&target)
            .unwrap()
            .convert_from_str(&target, "12.50", &Attributes::new())
            .unwrap();
        assert_eq!(value.downcast_ref::<Decimal>(), Some(&Decimal::new(1250, 2)));

        let target = TypeDescriptor::of::<BigInt>();
        let value = registry
            .find(&target)
            .unwrap()
            .convert_from_str(&target, "123456789012345678901234567890", &Attributes::new())
            .unwrap();
        assert_eq!(
            value.downcast_ref::<BigInt>().map(BigInt::to_string).as_deref(),
            Some("123456789012345678901234567890")
        );
    }

    #[test]
    fn test_character_requires_single_char() {
        let converter = ParseConverter::<char>::new("character");
        let target = TypeDescriptor::of::<char>();
        assert!(converter.convert_from_str(&target, "x", &Attributes::new()).is_ok());
        assert!(converter.convert_from_str(&target, "xy", &Attributes::new()).is_err());
    }
}
