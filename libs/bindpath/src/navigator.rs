//! Graph walking
//!
//! Reads follow the expression step by step and stop with `None` at the first
//! null link; they never create anything. Writes create missing structure along
//! the path: each missing value is constructed and attached to its parent before
//! the walk descends into it, so every nested write lands in the live graph.

use std::sync::Arc;

use crate::error::{ConvertError, Error, Result};
use crate::path::{Expression, IndexKey, Step};
use crate::reflect::{AccessError, Fetched, Reflect, ReflectMut, ReflectRef, Sequence};
use crate::resolver::{IndexedAccessorPairSlot, MemberResolver, Slot, Unresolved};
use crate::types::TypeDescriptor;

/// Position of the walk within an expression, used to locate errors
#[derive(Clone, Copy)]
pub(crate) struct Cursor<'e> {
    expression: &'e Expression,
    depth: usize,
}

impl<'e> Cursor<'e> {
    pub(crate) fn start(expression: &'e Expression) -> Self {
        Self {
            expression,
            depth: 0,
        }
    }

    fn step(&self) -> &'e Step {
        &self.expression.steps()[self.depth]
    }

    fn is_last(&self) -> bool {
        self.depth + 1 == self.expression.len()
    }

    fn next(&self) -> Self {
        Self {
            expression: self.expression,
            depth: self.depth + 1,
        }
    }

    /// Canonical text of the path up to and including the current step
    pub(crate) fn segment(&self) -> String {
        self.expression.prefix(self.depth + 1)
    }

    fn missing(&self, owner: &TypeDescriptor) -> Error {
        Error::MissingProperty {
            expression: self.expression.source().to_string(),
            segment: self.segment(),
            type_name: owner.short_name(),
            member: self.step().name.clone(),
        }
    }

    pub(crate) fn state(&self, message: impl Into<String>) -> Error {
        Error::ConverterState {
            expression: self.expression.source().to_string(),
            segment: self.segment(),
            message: message.into(),
        }
    }

    pub(crate) fn conversion(&self, message: impl Into<String>) -> Error {
        Error::Conversion {
            expression: self.expression.source().to_string(),
            segment: self.segment(),
            message: message.into(),
        }
    }

    pub(crate) fn convert(&self, error: ConvertError) -> Error {
        error.locate(self.expression.source(), self.segment())
    }

    /// Bad keys and nulls written into non-nullable places come from user input;
    /// everything else is structural.
    fn access(&self, error: AccessError) -> Error {
        match &error {
            AccessError::Key { .. } => self.conversion(error.to_string()),
            AccessError::Mismatch(mismatch) if mismatch.is_null() => {
                self.conversion(format!("null is not allowed here: {}", error))
            }
            AccessError::ReadOnly => {
                self.state(format!("property `{}` is read-only", self.step().name))
            }
            AccessError::MissingKey => {
                self.state(format!("indexed property `{}` requires a key", self.step().name))
            }
            _ => self.state(error.to_string()),
        }
    }
}

/// Produces the value stored at the end of a write walk
pub(crate) trait Terminal {
    fn produce(
        &mut self,
        declared: &TypeDescriptor,
        at: &Cursor<'_>,
    ) -> Result<Option<Box<dyn Reflect>>>;
}

pub(crate) struct Navigator<'r> {
    resolver: &'r MemberResolver,
    max_index: usize,
}

impl<'r> Navigator<'r> {
    pub(crate) fn new(resolver: &'r MemberResolver, max_index: usize) -> Self {
        Self {
            resolver,
            max_index,
        }
    }

    fn resolve(&self, owner: &dyn Reflect, at: &Cursor<'_>) -> Result<Arc<Slot>> {
        let descriptor = owner.descriptor();
        let step = at.step();
        self.resolver
            .resolve(&descriptor, &step.name, step.index.is_some())
            .map_err(|unresolved| match unresolved {
                Unresolved::Unknown => at.missing(&descriptor),
                Unresolved::KeyRequired => at.access(AccessError::MissingKey),
            })
    }

    // ========================================================================
    // Read
    // ========================================================================

    pub(crate) fn read<'a>(
        &self,
        expression: &Expression,
        root: &'a dyn Reflect,
    ) -> Result<Option<Fetched<'a>>> {
        let mut at = Cursor::start(expression);
        let mut current = Fetched::Borrowed(root);
        loop {
            let Some(owner) = current.non_null() else {
                return Ok(None);
            };
            let slot = self.resolve(&*owner, &at)?;
            let next = match owner {
                Fetched::Borrowed(owner) => self.read_step(&slot, owner, &at)?,
                Fetched::Owned(owner) => self
                    .read_step(&slot, &*owner, &at)?
                    .map(Fetched::detach),
            };
            let Some(next) = next else {
                return Ok(None);
            };
            if at.is_last() {
                return Ok(next.non_null());
            }
            current = next;
            at = at.next();
        }
    }

    fn read_step<'a>(
        &self,
        slot: &Slot,
        owner: &'a dyn Reflect,
        at: &Cursor<'_>,
    ) -> Result<Option<Fetched<'a>>> {
        let step = at.step();
        if slot.is_indexed() {
            let key = step.index.as_ref().map(IndexKey::to_text);
            return slot.get(owner, key.as_deref()).map_err(|e| at.access(e));
        }

        let value = slot.get(owner, None).map_err(|e| at.access(e))?;
        match (&step.index, value) {
            (Some(key), Some(container)) => read_element(container, key, at),
            (_, value) => Ok(value),
        }
    }

    // ========================================================================
    // Write
    // ========================================================================

    pub(crate) fn write(
        &self,
        expression: &Expression,
        root: &mut dyn Reflect,
        terminal: &mut dyn Terminal,
    ) -> Result<()> {
        self.write_member(root, Cursor::start(expression), terminal)
    }

    fn write_member(
        &self,
        owner: &mut dyn Reflect,
        at: Cursor<'_>,
        terminal: &mut dyn Terminal,
    ) -> Result<()> {
        let slot = self.resolve(&*owner, &at)?;
        let step = at.step();

        match slot.as_ref() {
            Slot::Field(field) => {
                let place = field
                    .access
                    .get_mut(owner)
                    .map_err(|e| at.access(e.into()))?;
                self.write_place(place, slot.declared(), at, terminal)
            }
            Slot::AccessorPair(pair) => {
                if at.is_last() && step.index.is_none() {
                    let value = terminal.produce(slot.declared(), &at)?;
                    return slot.set(owner, None, value).map_err(|e| at.access(e));
                }
                match pair.access.get_mut(owner).map_err(|e| at.access(e.into()))? {
                    Some(place) => self.write_place(place, slot.declared(), at, terminal),
                    None => Err(at.state(format!(
                        "accessor `{}` exposes no mutable access for nested writes",
                        step.name
                    ))),
                }
            }
            Slot::IndexedAccessorPair(pair) => self.write_indexed(owner, &slot, pair, at, terminal),
        }
    }

    fn write_place(
        &self,
        place: &mut dyn Reflect,
        declared: &TypeDescriptor,
        at: Cursor<'_>,
        terminal: &mut dyn Terminal,
    ) -> Result<()> {
        match &at.step().index {
            None if at.is_last() => {
                let value = terminal.produce(declared, &at)?;
                place.set(value).map_err(|e| at.access(e.into()))
            }
            None => {
                let next = self.vivify(place, &at)?;
                self.write_member(next, at.next(), terminal)
            }
            Some(key) => {
                let container = self.vivify(place, &at)?;
                self.write_element(container, key, at, terminal)
            }
        }
    }

    /// Unwrap a nullable place, constructing its value first when it is null.
    fn vivify<'p>(&self, place: &'p mut dyn Reflect, at: &Cursor<'_>) -> Result<&'p mut dyn Reflect> {
        if !matches!(place.reflect_ref(), ReflectRef::Nullable(_)) {
            return Ok(place);
        }
        let type_name = place.type_name();
        match place.reflect_mut() {
            ReflectMut::Nullable(nullable) => {
                if nullable.is_null() {
                    tracing::debug!(
                        segment = %at.segment(),
                        type_name,
                        "auto-vivifying null value"
                    );
                }
                nullable.get_or_construct().map_err(|e| at.access(e))
            }
            _ => Err(at.state("nullable value changed shape")),
        }
    }

    fn write_element(
        &self,
        container: &mut dyn Reflect,
        key: &IndexKey,
        at: Cursor<'_>,
        terminal: &mut dyn Terminal,
    ) -> Result<()> {
        let descriptor = container.descriptor();
        let type_name = container.type_name();

        match container.reflect_mut() {
            ReflectMut::Map(entries) => {
                if at.is_last() {
                    let declared = descriptor
                        .map_value()
                        .ok_or_else(|| at.state("map has no declared value type"))?;
                    let value = terminal.produce(declared, &at)?;
                    return entries.upsert(key, value).map_err(|e| at.access(e));
                }
                let entry = entries.lookup_or_construct(key).map_err(|e| at.access(e))?;
                let next = self.vivify(entry, &at)?;
                self.write_member(next, at.next(), terminal)
            }
            ReflectMut::Array(items) | ReflectMut::List(items) => {
                let index = key
                    .ordinal()
                    .ok_or_else(|| at.access(AccessError::key::<usize>(key)))?;
                let len = self.writable_len(index, &at)?;
                if at.is_last() {
                    let declared = descriptor
                        .element()
                        .ok_or_else(|| at.state("sequence has no declared element type"))?;
                    let value = terminal.produce(declared, &at)?;
                    if let Some(element) = items.element_mut(index) {
                        return element.set(value).map_err(|e| at.access(e.into()));
                    }
                    grow(items, index, &at)?;
                    return items.append(value).map_err(|e| at.access(e));
                }
                grow(items, len, &at)?;
                let element = items
                    .element_mut(index)
                    .ok_or_else(|| at.state(format!("index {} out of bounds after growth", index)))?;
                let next = self.vivify(element, &at)?;
                self.write_member(next, at.next(), terminal)
            }
            _ => Err(at.access(AccessError::NotIndexable(type_name))),
        }
    }

    /// Length a sequence needs for a write at `index`, bounded by `max_index`.
    fn writable_len(&self, index: usize, at: &Cursor<'_>) -> Result<usize> {
        index
            .checked_add(1)
            .filter(|_| index <= self.max_index)
            .ok_or_else(|| {
                at.conversion(format!(
                    "index {} exceeds the maximum writable index {}",
                    index, self.max_index
                ))
            })
    }

    fn write_indexed(
        &self,
        owner: &mut dyn Reflect,
        slot: &Slot,
        pair: &IndexedAccessorPairSlot,
        at: Cursor<'_>,
        terminal: &mut dyn Terminal,
    ) -> Result<()> {
        let step = at.step();
        let key = step
            .index
            .as_ref()
            .map(IndexKey::to_text)
            .ok_or_else(|| at.access(AccessError::MissingKey))?;

        if at.is_last() {
            let value = terminal.produce(slot.declared(), &at)?;
            return slot.set(owner, Some(key.as_str()), value).map_err(|e| at.access(e));
        }

        if !pair.access.has_get_mut() {
            return Err(at.state(format!(
                "indexed property `{}` exposes no mutable access for nested writes",
                step.name
            )));
        }

        let present = pair
            .access
            .get_mut(owner, &key)
            .map_err(|e| at.access(e.into()))?
            .is_some();
        if !present {
            let declared = slot.declared();
            let fresh = declared
                .instantiate()
                .ok_or_else(|| at.access(AccessError::Unconstructible(declared.name())))?;
            tracing::debug!(
                segment = %at.segment(),
                type_name = declared.name(),
                "auto-vivifying indexed entry"
            );
            slot.set(owner, Some(key.as_str()), Some(fresh))
                .map_err(|e| at.access(e))?;
        }

        let place = pair
            .access
            .get_mut(owner, &key)
            .map_err(|e| at.access(e.into()))?
            .ok_or_else(|| {
                at.state(format!(
                    "indexed property `{}` did not retain key `{}`",
                    step.name, key
                ))
            })?;
        let next = self.vivify(place, &at)?;
        self.write_member(next, at.next(), terminal)
    }
}

fn read_element<'a>(
    container: Fetched<'a>,
    key: &IndexKey,
    at: &Cursor<'_>,
) -> Result<Option<Fetched<'a>>> {
    let Some(container) = container.non_null() else {
        return Ok(None);
    };
    match container {
        Fetched::Borrowed(container) => Ok(element_of(container, key)
            .map_err(|e| at.access(e))?
            .map(Fetched::Borrowed)),
        Fetched::Owned(container) => Ok(element_of(&*container, key)
            .map_err(|e| at.access(e))?
            .map(|element| Fetched::Owned(element.clone_value()))),
    }
}

fn element_of<'a>(container: &'a dyn Reflect, key: &IndexKey) -> std::result::Result<Option<&'a dyn Reflect>, AccessError> {
    match container.reflect_ref() {
        ReflectRef::Array(items) | ReflectRef::List(items) => {
            let index = key.ordinal().ok_or_else(|| AccessError::key::<usize>(key))?;
            Ok(items.element(index))
        }
        ReflectRef::Map(entries) => entries.lookup(key),
        _ => Err(AccessError::NotIndexable(container.type_name())),
    }
}

fn grow(items: &mut dyn Sequence, len: usize, at: &Cursor<'_>) -> Result<()> {
    let before = items.len();
    items.grow(len).map_err(|e| at.access(e))?;
    if items.len() > before {
        tracing::debug!(
            segment = %at.segment(),
            from = before,
            to = items.len(),
            "grew sequence"
        );
    }
    Ok(())
}
