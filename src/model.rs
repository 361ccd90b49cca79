//! Entity instances and the four conversion operations.
//!
//! A [`Model`] is an instance of one registered entity type. Its fields are
//! filled and read back according to the rules held in the shared
//! [`Storage`]:
//!
//! - [`Model::parse`]: source record to entity, with type checks and validators
//! - [`Model::merge`]: trusted copy, no coercion and no checks
//! - [`Model::recover`]: loosely typed source (query strings) to typed fields
//! - [`Model::reverse`]: entity to a plain output record

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::Arc;

use crate::coerce::converty;
use crate::config::Violation;
use crate::entity::Entity;
use crate::error::ModelError;
use crate::extraction::{Extractor, FieldPath};
use crate::rule::Rule;
use crate::storage::{Attr, EntityKey, Storage};
use crate::value::{record_to_json, FieldValue, Record, TypeSpec, ValueType};

/// Per-call options of [`Model::parse_with`]
///
/// Unset options fall back to the storage defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseOptions {
    /// Skip the pass-through copy of unregistered keys
    pub ignore: Option<bool>,
    /// Accept missing values on every attribute
    pub nullable: Option<bool>,
    /// Run validators after assignment (default `true`)
    pub validate: Option<bool>,
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ignore(mut self, value: bool) -> Self {
        self.ignore = Some(value);
        self
    }

    pub fn nullable(mut self, value: bool) -> Self {
        self.nullable = Some(value);
        self
    }

    pub fn validate(mut self, value: bool) -> Self {
        self.validate = Some(value);
        self
    }
}

/// Per-call options of [`Model::merge_with`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeOptions {
    pub ignore: Option<bool>,
}

/// Per-call options of [`Model::reverse_with`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReverseOptions {
    /// Drop `""`, null and undefined values (default from storage, `true`)
    pub lightly: Option<bool>,
    /// Attribute names left out of the output
    pub exclusion: Vec<String>,
}

impl ReverseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lightly(mut self, value: bool) -> Self {
        self.lightly = Some(value);
        self
    }

    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.exclusion.push(name.into());
        self
    }
}

/// Instance of a registered entity type
#[derive(Clone)]
pub struct Model {
    storage: Arc<Storage>,
    key: EntityKey,
    fields: Record,
}

impl Model {
    /// Instance holding only the type's template fields.
    pub fn empty(storage: &Arc<Storage>, key: &EntityKey) -> Self {
        Self {
            storage: Arc::clone(storage),
            key: key.clone(),
            fields: storage.template_fields(key),
        }
    }

    /// Create an instance and parse `source` into it.
    pub fn new(
        storage: &Arc<Storage>,
        key: &EntityKey,
        source: Option<&FieldValue>,
    ) -> Result<Self, ModelError> {
        let mut model = Self::empty(storage, key);
        if let Some(source) = source {
            model.parse(source)?;
        }
        Ok(model)
    }

    /// Create an instance of a Rust marker type and parse `source` into it.
    pub fn of<T: Entity>(
        storage: &Arc<Storage>,
        source: Option<&FieldValue>,
    ) -> Result<Self, ModelError> {
        Self::new(storage, &T::key(), source)
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Name of the entity type
    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Assign a field directly, bypassing every rule.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<FieldValue> {
        self.fields.shift_remove(name)
    }

    pub fn into_fields(self) -> Record {
        self.fields
    }

    /// Instance fields as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        record_to_json(&self.fields)
    }

    fn is_same_entity(&self, source: &FieldValue) -> bool {
        source.as_model().is_some_and(|other| other.key == self.key)
    }

    fn assign(&mut self, name: &str, value: Option<FieldValue>) {
        match value {
            Some(value) => {
                self.fields.insert(name.to_string(), value);
            }
            None => {
                self.fields.shift_remove(name);
            }
        }
    }

    /// Parse `source` with default options.
    pub fn parse(&mut self, source: &FieldValue) -> Result<&mut Self, ModelError> {
        self.parse_with(source, &ParseOptions::default())
    }

    /// Resolve, transform, assign and check every registered attribute, then
    /// run validators.
    ///
    /// A source of the same entity type is copied without checks. A violation
    /// reported as an error by the logger aborts the call; fields assigned
    /// before it stay assigned.
    pub fn parse_with(
        &mut self,
        source: &FieldValue,
        options: &ParseOptions,
    ) -> Result<&mut Self, ModelError> {
        if !source.is_truthy() {
            return Ok(self);
        }
        let storage = Arc::clone(&self.storage);
        tracing::debug!(entity = self.name(), "parse");

        if !options.ignore.unwrap_or(storage.defaults().ignore) {
            self.pass_through(&storage, source);
        }

        if self.is_same_entity(source) {
            self.copy_from(&storage, source);
        } else {
            for attr in storage.attrs(&self.key) {
                self.parse_attr(&storage, attr, source, options)?;
            }
        }

        if options.validate != Some(false) {
            self.run_validators(&storage)?;
        }
        Ok(self)
    }

    fn parse_attr(
        &mut self,
        storage: &Storage,
        attr: &Attr,
        source: &FieldValue,
        options: &ParseOptions,
    ) -> Result<(), ModelError> {
        let name = attr.name();
        let rules = attr.rules();
        if rules.is_omitted() {
            return Ok(());
        }

        let origin = resolve_source(name, rules, source);
        let value = match &rules.parse {
            Some(transform) => transform(origin, source),
            None => origin.cloned(),
        };

        let value = match value {
            Some(value) if !value.is_null() => value,
            missing => {
                if !rules.is_nullable() && options.nullable != Some(true) {
                    storage.defaults().notify(&Violation {
                        entity: self.key.name(),
                        attr: name,
                        expected: rules.describe_type(),
                        value: missing.as_ref(),
                    })?;
                }
                return Ok(());
            }
        };

        let expected = shape_mismatch(rules, &value);
        tracing::trace!(entity = self.key.name(), attr = name, "assign");
        self.fields.insert(name.to_string(), value);

        if let Some(expected) = expected {
            storage.defaults().notify(&Violation {
                entity: self.key.name(),
                attr: name,
                expected,
                value: self.fields.get(name),
            })?;
        }
        Ok(())
    }

    /// Copy unregistered keys that already exist on the instance.
    fn pass_through(&mut self, storage: &Storage, source: &FieldValue) {
        let Some(own) = source.own_fields() else {
            return;
        };
        let meta = storage.get(&self.key);
        for (name, value) in own {
            let declared = meta.is_some_and(|meta| meta.has_attr(name));
            if !declared && self.fields.contains_key(name) {
                self.fields.insert(name.clone(), value.clone());
            }
        }
    }

    /// Trusted copy of every registered, non-omitted attribute the source has.
    fn copy_from(&mut self, storage: &Storage, source: &FieldValue) {
        let Some(own) = source.own_fields() else {
            return;
        };
        for attr in storage.attrs(&self.key) {
            let rules = attr.rules();
            if rules.is_omitted() {
                continue;
            }
            let Some(value) = own.get(attr.name()) else {
                continue;
            };
            let copied = match &rules.merge {
                Some(transform) => transform(Some(value), source),
                None => Some(value.clone()),
            };
            self.assign(attr.name(), copied);
        }
    }

    /// Run every attribute's validators in registry order.
    pub fn validate(&self) -> Result<(), ModelError> {
        self.run_validators(&self.storage)
    }

    fn run_validators(&self, storage: &Storage) -> Result<(), ModelError> {
        for attr in storage.attrs(&self.key) {
            for check in attr.rules().validators() {
                check(self.fields.get(attr.name()), self)?;
            }
        }
        Ok(())
    }

    /// Merge `source` with default options.
    pub fn merge(&mut self, source: &FieldValue) -> &mut Self {
        self.merge_with(source, &MergeOptions::default())
    }

    /// Copy registered attributes from an already trusted source.
    pub fn merge_with(&mut self, source: &FieldValue, options: &MergeOptions) -> &mut Self {
        if !source.is_truthy() {
            return self;
        }
        let storage = Arc::clone(&self.storage);
        tracing::debug!(entity = self.name(), "merge");

        if !options.ignore.unwrap_or(storage.defaults().ignore) {
            self.pass_through(&storage, source);
        }
        self.copy_from(&storage, source);
        self
    }

    /// Rehydrate loosely typed values into the instance's existing fields.
    ///
    /// Only fields the instance already has are considered. Each one takes the
    /// attribute's `recover` transform, else is coerced to the declared type
    /// (first of a union), else to the type of its current value.
    pub fn recover(&mut self, source: &FieldValue) -> Result<&mut Self, ModelError> {
        if !source.is_truthy() {
            return Ok(self);
        }
        let storage = Arc::clone(&self.storage);
        tracing::debug!(entity = self.name(), "recover");

        if self.is_same_entity(source) {
            self.copy_from(&storage, source);
            return Ok(self);
        }
        let Some(own) = source.own_fields() else {
            tracing::warn!(entity = self.name(), "recover source is not a record");
            return Ok(self);
        };

        let props: Vec<String> = self.fields.keys().cloned().collect();
        for prop in props {
            let Some(raw) = own.get(&prop) else {
                continue;
            };
            let rules = storage.find_attr(&self.key, &prop).map(Attr::rules);

            let value = if let Some(transform) = rules.and_then(|r| r.recover.as_ref()) {
                transform(Some(raw), source)
            } else if let Some(ty) = rules.and_then(|r| r.ty.as_ref()).and_then(TypeSpec::primary) {
                Some(coerce(&storage, raw, ty)?)
            } else {
                match self.fields.get(&prop).and_then(FieldValue::value_type) {
                    Some(current) => Some(coerce(&storage, raw, &current)?),
                    None => Some(raw.clone()),
                }
            };
            self.assign(&prop, value);
        }
        Ok(self)
    }

    /// Reverse with default options.
    pub fn reverse(&self) -> Record {
        self.reverse_with(&ReverseOptions::default())
    }

    /// Build the output record from every attribute with a `to` option.
    pub fn reverse_with(&self, options: &ReverseOptions) -> Record {
        let lightly = options.lightly.unwrap_or(self.storage.defaults().lightly);
        let mut output = Record::new();

        for attr in self.storage.attrs(&self.key) {
            let name = attr.name();
            let rules = attr.rules();
            let Some(target) = &rules.to else {
                continue;
            };
            if rules.is_omitted() || options.exclusion.iter().any(|excluded| excluded == name) {
                continue;
            }

            let current = self.fields.get(name);
            let value = match &rules.reverse {
                Some(transform) => transform(current, self),
                None => current.cloned(),
            };

            let key = target.key(name).to_string();
            match value {
                Some(value) if !(lightly && value.is_blank()) => {
                    output.insert(key, value);
                }
                None if !lightly => {
                    output.insert(key, FieldValue::Null);
                }
                _ => {}
            }
        }
        output
    }

    /// Call the custom hook `name` of every attribute with this instance.
    pub fn run_decorators(&self, name: &str) -> IndexMap<String, Option<FieldValue>> {
        self.storage
            .attrs(&self.key)
            .iter()
            .map(|attr| {
                let result = attr.rules().hooks.get(name).and_then(|hook| hook(self));
                (attr.name().to_string(), result)
            })
            .collect()
    }
}

/// First defined value among the attribute's candidate source paths.
fn resolve_source<'a>(
    name: &str,
    rules: &Rule,
    source: &'a FieldValue,
) -> Option<&'a FieldValue> {
    let candidates: Vec<FieldPath> = match &rules.from {
        Some(paths) if !paths.is_empty() => paths
            .iter()
            .map(|path| FieldPath::from_dotted(if path.is_empty() { name } else { path }))
            .collect(),
        _ => vec![FieldPath::from_dotted(name)],
    };
    source.extract_first(&candidates)
}

/// Description of what was expected when `value` breaks the attribute's
/// enumeration or type, `None` when it conforms.
fn shape_mismatch(rules: &Rule, value: &FieldValue) -> Option<String> {
    if let Some(allowed) = &rules.enumeration {
        return (!allowed.contains(value)).then(|| rules.describe_enumeration());
    }
    let spec = rules.ty.as_ref()?;
    let actual = value.value_type()?;
    (!spec.accepts(&actual)).then(|| spec.describe())
}

fn coerce(
    storage: &Arc<Storage>,
    raw: &FieldValue,
    ty: &ValueType,
) -> Result<FieldValue, ModelError> {
    match ty {
        ValueType::Entity(key) => {
            if raw.as_model().is_some_and(|model| &model.key == key) {
                return Ok(raw.clone());
            }
            Model::new(storage, key, Some(raw)).map(FieldValue::from)
        }
        other => Ok(converty(raw, other)),
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("entity", &self.key.name())
            .field("fields", &self.fields)
            .finish()
    }
}

impl Serialize for Model {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
