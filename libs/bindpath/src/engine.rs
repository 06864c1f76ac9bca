//! Evaluator facade
//!
//! Ties parsing, member resolution, graph walking and conversion together:
//! `get_value` → parse (cached) → walk → value, and
//! `set_value` → parse (cached) → walk with auto-vivification → convert → write.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use serde::Deserialize;

use crate::attributes::Attributes;
use crate::convert::ConverterRegistry;
use crate::error::Result;
use crate::expand;
use crate::navigator::{Cursor, Navigator, Terminal};
use crate::path::{self, Expression};
use crate::reflect::{Fetched, Reflect};
use crate::resolver::MemberResolver;
use crate::types::TypeDescriptor;

/// Evaluator configuration
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct EvaluatorOptions {
    /// Blank submitted strings become null for nullable targets. When `false`
    /// they become the target converter's zero value.
    pub empty_string_is_null: bool,
    /// Capacity of the parsed-expression cache
    pub expression_cache_size: usize,
    /// Largest sequence index a write may address. Writes past the current
    /// length grow the sequence up to this index; larger indices are rejected.
    pub max_index: usize,
}

impl Default for EvaluatorOptions {
    fn default() -> Self {
        Self {
            empty_string_is_null: true,
            expression_cache_size: 1000,
            max_index: 10_000,
        }
    }
}

/// Expression evaluator
///
/// Cheap to clone; clones share the converter registry, the member-resolution
/// cache and the parsed-expression cache. Safe to use from many threads against
/// independent object graphs.
#[derive(Clone)]
pub struct Evaluator {
    options: EvaluatorOptions,
    converters: Arc<ConverterRegistry>,
    resolver: Arc<MemberResolver>,
    cache: Arc<Mutex<LruCache<String, Arc<Expression>>>>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(EvaluatorOptions::default())
    }
}

impl Evaluator {
    /// Create an evaluator with the built-in converters
    pub fn new(options: EvaluatorOptions) -> Self {
        Self::with_converters(options, ConverterRegistry::new())
    }

    /// Create an evaluator with a custom converter registry
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut converters = ConverterRegistry::new();
    /// converters.register::<Money>(MoneyConverter);
    /// let evaluator = Evaluator::with_converters(EvaluatorOptions::default(), converters);
    /// ```
    pub fn with_converters(options: EvaluatorOptions, converters: ConverterRegistry) -> Self {
        let capacity =
            NonZeroUsize::new(options.expression_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            options,
            converters: Arc::new(converters),
            resolver: Arc::new(MemberResolver::new()),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    pub fn options(&self) -> &EvaluatorOptions {
        &self.options
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }

    pub fn resolver(&self) -> &MemberResolver {
        &self.resolver
    }

    /// Parse an expression, reusing a cached parse when available.
    pub fn parse(&self, expression: &str) -> Result<Arc<Expression>> {
        {
            let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(parsed) = cache.get(expression) {
                return Ok(Arc::clone(parsed));
            }
        }

        let parsed = Arc::new(path::parse(expression)?);
        tracing::trace!(expression, steps = parsed.len(), "parsed expression");

        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        cache.put(expression.to_string(), Arc::clone(&parsed));
        Ok(parsed)
    }

    // ========================================================================
    // Read
    // ========================================================================

    /// Read the value at `expression`. Returns `None` as soon as any link on the
    /// path is null; never modifies the graph.
    pub fn get_value<'a>(
        &self,
        expression: &str,
        root: &'a dyn Reflect,
    ) -> Result<Option<Fetched<'a>>> {
        let parsed = self.parse(expression)?;
        Navigator::new(&self.resolver, self.options.max_index).read(&parsed, root)
    }

    /// Read the value at `expression` and stringify it through its converter.
    pub fn get_string(
        &self,
        expression: &str,
        root: &dyn Reflect,
        attributes: &Attributes,
    ) -> Result<Option<String>> {
        let Some(value) = self.get_value(expression, root)? else {
            return Ok(None);
        };
        self.converters
            .stringify(&*value, attributes)
            .map_err(|e| e.locate(expression, expression.to_string()))
    }

    // ========================================================================
    // Write
    // ========================================================================

    /// Convert the submitted `values` to the declared type of the member at
    /// `expression` and store the result, creating missing intermediate values.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let mut action = Action::default();
    /// evaluator.set_value("user.addresses['home'].city", &mut action, &["Denver"], &Attributes::new())?;
    /// ```
    pub fn set_value<S: AsRef<str>>(
        &self,
        expression: &str,
        root: &mut dyn Reflect,
        values: &[S],
        attributes: &Attributes,
    ) -> Result<()> {
        let parsed = self.parse(expression)?;
        let values: Vec<&str> = values.iter().map(AsRef::as_ref).collect();
        tracing::debug!(expression, values = values.len(), "binding value");

        let mut terminal = Converting {
            converters: &self.converters,
            values: &values,
            attributes,
            empty_string_is_null: self.options.empty_string_is_null,
        };
        Navigator::new(&self.resolver, self.options.max_index)
            .write(&parsed, root, &mut terminal)
    }

    /// Store an already-typed value (or null) at `expression`, creating missing
    /// intermediate values. No conversion is applied.
    pub fn set_object(
        &self,
        expression: &str,
        root: &mut dyn Reflect,
        value: Option<Box<dyn Reflect>>,
    ) -> Result<()> {
        let parsed = self.parse(expression)?;
        let mut terminal = Direct(Some(value));
        Navigator::new(&self.resolver, self.options.max_index)
            .write(&parsed, root, &mut terminal)
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// Substitute every `${expression}` in `template` with the direct textual
    /// representation of its value; null values substitute as the empty string.
    pub fn expand(&self, template: &str, root: &dyn Reflect) -> Result<String> {
        expand::expand(template, |expression| {
            Ok(self
                .get_value(expression, root)?
                .and_then(|value| value.render()))
        })
    }
}

/// Converts the submitted strings to the terminal's declared type
struct Converting<'a> {
    converters: &'a ConverterRegistry,
    values: &'a [&'a str],
    attributes: &'a Attributes,
    empty_string_is_null: bool,
}

impl Terminal for Converting<'_> {
    fn produce(
        &mut self,
        declared: &TypeDescriptor,
        at: &Cursor<'_>,
    ) -> Result<Option<Box<dyn Reflect>>> {
        self.converters
            .convert(
                declared,
                self.values,
                self.attributes,
                self.empty_string_is_null,
            )
            .map_err(|e| at.convert(e))
    }
}

/// Stores a pre-built value
struct Direct(Option<Option<Box<dyn Reflect>>>);

impl Terminal for Direct {
    fn produce(
        &mut self,
        _declared: &TypeDescriptor,
        at: &Cursor<'_>,
    ) -> Result<Option<Box<dyn Reflect>>> {
        self.0
            .take()
            .ok_or_else(|| at.state("value already consumed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_deserialize_camel_case() {
        let options: EvaluatorOptions =
            serde_json::from_str(r#"{"emptyStringIsNull": false}"#).unwrap();
        assert!(!options.empty_string_is_null);
        assert_eq!(options.expression_cache_size, 1000);
        assert_eq!(options.max_index, 10_000);

        let options: EvaluatorOptions = serde_json::from_str(r#"{"maxIndex": 8}"#).unwrap();
        assert_eq!(options.max_index, 8);
        assert!(options.empty_string_is_null);
    }

    #[test]
    fn test_parse_is_cached() {
        let evaluator = Evaluator::default();
        let first = evaluator.parse("user.name").unwrap();
        let second = evaluator.parse("user.name").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_parse_error_is_not_cached() {
        let evaluator = Evaluator::default();
        assert!(evaluator.parse("user..name").is_err());
        assert!(evaluator.parse("user..name").is_err());
    }

    #[test]
    fn test_zero_cache_size_still_works() {
        let evaluator = Evaluator::new(EvaluatorOptions {
            expression_cache_size: 0,
            ..EvaluatorOptions::default()
        });
        assert!(evaluator.parse("a.b").is_ok());
        assert!(evaluator.parse("c").is_ok());
    }
}
