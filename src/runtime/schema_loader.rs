//! Schema configuration loader.
//!
//! Loads entity declarations from YAML and turns them into a frozen
//! [`Storage`]. Parents are declared before their subtypes using a
//! topological sort over `extends` (Kahn's algorithm), so composed subtypes
//! inherit rules their parent itself inherited.

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::config::PLACEHOLDERS;
use crate::decorators::{self, Decorator};
use crate::error::ModelError;
use crate::model::Model;
use crate::rule::{FieldMeta, ValidatorFn};
use crate::storage::{EntityKey, Storage};
use crate::transform_registry::TransformRegistry;
use crate::value::{FieldValue, TypeSpec, ValueType};

/// A string or a list of strings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value.clone()],
            OneOrMany::Many(values) => values.clone(),
        }
    }
}

/// Output key declaration: `to: true` or `to: key`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetDef {
    Flag(bool),
    Key(String),
}

/// Store-wide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaSettings {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub lightly: Option<bool>,
    #[serde(default)]
    pub ignore: Option<bool>,
}

/// Rules of one attribute. Function-valued options name registry entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttributeDef {
    /// Type name, or a list of names for a union
    #[serde(rename = "type", default)]
    pub ty: Option<OneOrMany>,
    #[serde(default)]
    pub from: Option<OneOrMany>,
    #[serde(default)]
    pub to: Option<TargetDef>,
    #[serde(default)]
    pub enumeration: Option<Vec<FieldValue>>,
    #[serde(default)]
    pub parse: Option<String>,
    #[serde(default)]
    pub merge: Option<String>,
    #[serde(default)]
    pub recover: Option<String>,
    #[serde(default)]
    pub reverse: Option<String>,
    #[serde(default)]
    pub dep: Option<Vec<String>>,
    #[serde(default)]
    pub nullable: Option<bool>,
    #[serde(default)]
    pub validator: Option<OneOrMany>,
    #[serde(default)]
    pub omit: Option<bool>,
    #[serde(default)]
    pub column: Option<FieldMeta>,
    #[serde(default)]
    pub form: Option<FieldMeta>,
}

/// One entity type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntityDef {
    /// Parent entity name
    #[serde(default)]
    pub extends: Option<String>,
    /// Pull the parent's rules in and order attributes by `dep`
    #[serde(default)]
    pub compose: bool,
    /// Instance template fields
    #[serde(default)]
    pub fields: IndexMap<String, FieldValue>,
    #[serde(default)]
    pub attributes: IndexMap<String, AttributeDef>,
}

/// Schema file contents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    #[serde(default)]
    pub settings: SchemaSettings,
    pub entities: IndexMap<String, EntityDef>,
}

impl SchemaConfig {
    /// Load a schema from a YAML file.
    ///
    /// # Errors
    /// Returns [`ModelError::Schema`] if the file can't be read or parsed.
    ///
    /// # Example
    /// ```ignore
    /// use modelmap::runtime::SchemaConfig;
    ///
    /// let config = SchemaConfig::load_from_file("config/schema.yaml")?;
    /// println!("Entities: {:?}", config.entity_names());
    /// ```
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ModelError::Schema(format!("Failed to read schema file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&contents)?;
        tracing::debug!(path = %path.display(), entities = config.entities.len(), "loaded schema");
        Ok(config)
    }

    /// Parse a schema from YAML text.
    pub fn from_yaml(contents: &str) -> Result<Self, ModelError> {
        serde_yaml::from_str(contents)
            .map_err(|e| ModelError::Schema(format!("Failed to parse YAML: {}", e)))
    }

    pub fn entity_names(&self) -> Vec<&String> {
        self.entities.keys().collect()
    }

    /// Declare every entity into a fresh storage and freeze it.
    pub fn build(&self, registry: &TransformRegistry) -> Result<Schema, ModelError> {
        let mut storage = Storage::new();
        let keys = self.declare_into(&mut storage, registry)?;
        Ok(Schema::new(storage.into_shared(), keys))
    }

    /// Apply settings and declare every entity into `storage`.
    ///
    /// Returns the key allocated for each entity name, in file order.
    pub fn declare_into(
        &self,
        storage: &mut Storage,
        registry: &TransformRegistry,
    ) -> Result<IndexMap<String, EntityKey>, ModelError> {
        self.apply_settings(storage)?;

        let keys: IndexMap<String, EntityKey> = self
            .entities
            .keys()
            .map(|name| (name.clone(), EntityKey::dynamic(name.as_str())))
            .collect();

        for name in compute_declaration_order(&self.entities)? {
            let def = &self.entities[name.as_str()];
            let key = &keys[name.as_str()];
            self.declare_entity(storage, registry, &keys, key, def)?;
            if def.compose {
                storage.compose(key);
            }
        }

        Ok(keys)
    }

    fn apply_settings(&self, storage: &mut Storage) -> Result<(), ModelError> {
        let settings = &self.settings;
        if let Some(message) = &settings.message {
            check_placeholders(message)?;
            storage.set_message_format(message.as_str());
        }
        let defaults = storage.defaults_mut();
        if let Some(lightly) = settings.lightly {
            defaults.lightly = lightly;
        }
        if let Some(ignore) = settings.ignore {
            defaults.ignore = ignore;
        }
        Ok(())
    }

    fn declare_entity(
        &self,
        storage: &mut Storage,
        registry: &TransformRegistry,
        keys: &IndexMap<String, EntityKey>,
        key: &EntityKey,
        def: &EntityDef,
    ) -> Result<(), ModelError> {
        let meta = storage.entity(key);
        if let Some(parent) = &def.extends {
            meta.extends(keys[parent.as_str()].clone());
        }
        for (name, value) in &def.fields {
            meta.field(name.as_str(), value.clone());
        }
        for (name, attr) in &def.attributes {
            let declared = attribute_decorators(registry, keys, key, name, attr)?;
            meta.declare(name, declared);
        }
        tracing::debug!(entity = key.name(), attrs = def.attributes.len(), "declared entity");
        Ok(())
    }
}

/// Translate one attribute definition into decorators.
fn attribute_decorators(
    registry: &TransformRegistry,
    keys: &IndexMap<String, EntityKey>,
    entity: &EntityKey,
    name: &str,
    def: &AttributeDef,
) -> Result<Vec<Decorator>, ModelError> {
    let mut out = Vec::new();

    if let Some(ty) = &def.ty {
        let types = ty
            .to_vec()
            .iter()
            .map(|type_name| resolve_type(keys, type_name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ModelError::Schema(format!("{}.{}: {}", entity, name, e.message())))?;
        let spec = match ty {
            OneOrMany::One(_) => {
                TypeSpec::Single(types.into_iter().next().unwrap_or(ValueType::Object))
            }
            OneOrMany::Many(_) => TypeSpec::Union(types),
        };
        out.push(decorators::ty(spec));
    }
    if let Some(from) = &def.from {
        out.push(decorators::from_any(from.to_vec()));
    }
    match &def.to {
        Some(TargetDef::Flag(true)) => out.push(decorators::to()),
        Some(TargetDef::Key(key)) => out.push(decorators::to_key(key.as_str())),
        Some(TargetDef::Flag(false)) | None => {}
    }
    if let Some(values) = &def.enumeration {
        out.push(decorators::enumeration(values.clone()));
    }
    if let Some(transform) = &def.parse {
        let func = registry.transform(transform)?;
        out.push(decorators::parse(move |raw, source| func(raw, source)));
    }
    if let Some(transform) = &def.merge {
        let func = registry.transform(transform)?;
        out.push(decorators::merge(move |raw, source| func(raw, source)));
    }
    if let Some(transform) = &def.recover {
        let func = registry.transform(transform)?;
        out.push(decorators::recover(move |raw, source| func(raw, source)));
    }
    if let Some(transform) = &def.reverse {
        let func = registry.reverse(transform)?;
        out.push(decorators::reverse(move |value, entity| func(value, entity)));
    }
    if let Some(deps) = &def.dep {
        out.push(decorators::dep(deps.clone()));
    }
    if let Some(nullable) = def.nullable {
        out.push(decorators::nullable_if(nullable));
    }
    if let Some(names) = &def.validator {
        let checks = names
            .to_vec()
            .iter()
            .map(|check| registry.validator(check, name))
            .collect::<Result<Vec<ValidatorFn>, _>>()?;
        out.push(decorators::validators(checks));
    }
    if let Some(omit) = def.omit {
        out.push(decorators::omit_if(omit));
    }
    if let Some(meta) = &def.column {
        out.push(decorators::column(meta.clone()));
    }
    if let Some(meta) = &def.form {
        out.push(decorators::form(meta.clone()));
    }

    Ok(out)
}

/// Built-in type name or the name of an entity in the same schema.
fn resolve_type(keys: &IndexMap<String, EntityKey>, name: &str) -> Result<ValueType, ModelError> {
    if let Some(ty) = ValueType::from_builtin(name) {
        return Ok(ty);
    }
    keys.get(name)
        .map(|key| ValueType::Entity(key.clone()))
        .ok_or_else(|| ModelError::Schema(format!("unknown type '{}'", name)))
}

/// Reject message templates using placeholders the notifier never fills.
fn check_placeholders(template: &str) -> Result<(), ModelError> {
    let pattern = Regex::new(r"\{([A-Za-z_]+)\}")
        .map_err(|e| ModelError::Schema(format!("Invalid placeholder pattern: {}", e)))?;
    for capture in pattern.captures_iter(template) {
        let placeholder = &capture[1];
        if !PLACEHOLDERS.contains(&placeholder) {
            return Err(ModelError::Schema(format!(
                "Unknown placeholder '{{{}}}' in message template",
                placeholder
            )));
        }
    }
    Ok(())
}

/// Compute declaration order using topological sort (Kahn's algorithm).
///
/// Parents come before the entities extending them; otherwise file order is
/// kept.
///
/// # Errors
/// Fails when an entity extends an undefined entity or the chain is circular.
pub fn compute_declaration_order(
    entities: &IndexMap<String, EntityDef>,
) -> Result<Vec<String>, ModelError> {
    let mut in_degree: HashMap<&str, usize> = HashMap::new();
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();

    for name in entities.keys() {
        in_degree.insert(name, 0);
        children.insert(name, Vec::new());
    }

    for (name, def) in entities {
        let Some(parent) = def.extends.as_deref() else {
            continue;
        };
        if !entities.contains_key(parent) {
            return Err(ModelError::Schema(format!(
                "Entity '{}' extends undefined entity '{}'",
                name, parent
            )));
        }
        if parent == name {
            continue;
        }
        *in_degree.entry(name.as_str()).or_default() += 1;
        children.entry(parent).or_default().push(name.as_str());
    }

    let mut queue: VecDeque<&str> = entities
        .keys()
        .map(String::as_str)
        .filter(|name| in_degree[name] == 0)
        .collect();
    let mut sorted = Vec::with_capacity(entities.len());

    while let Some(name) = queue.pop_front() {
        sorted.push(name.to_string());
        for child in &children[name] {
            if let Some(degree) = in_degree.get_mut(child) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(*child);
                }
            }
        }
    }

    if sorted.len() != entities.len() {
        let unprocessed: Vec<&String> = entities
            .keys()
            .filter(|name| !sorted.contains(*name))
            .collect();
        return Err(ModelError::Schema(format!(
            "Circular inheritance detected involving entities: {:?}",
            unprocessed
        )));
    }

    Ok(sorted)
}

/// Frozen storage built from a schema, with entity lookup by name
#[derive(Debug, Clone)]
pub struct Schema {
    storage: Arc<Storage>,
    keys: IndexMap<String, EntityKey>,
}

impl Schema {
    pub fn new(storage: Arc<Storage>, keys: IndexMap<String, EntityKey>) -> Self {
        Self { storage, keys }
    }

    pub fn storage(&self) -> &Arc<Storage> {
        &self.storage
    }

    /// Key of the entity named `name`
    pub fn key(&self, name: &str) -> Result<&EntityKey, ModelError> {
        self.keys
            .get(name)
            .ok_or_else(|| ModelError::Schema(format!("Entity '{}' is not defined", name)))
    }

    pub fn entity_names(&self) -> Vec<&String> {
        self.keys.keys().collect()
    }

    /// Empty instance of `name`
    pub fn empty(&self, name: &str) -> Result<Model, ModelError> {
        Ok(Model::empty(&self.storage, self.key(name)?))
    }

    /// Instance of `name` parsed from `source`
    pub fn model(&self, name: &str, source: Option<&FieldValue>) -> Result<Model, ModelError> {
        Model::new(&self.storage, self.key(name)?, source)
    }
}
