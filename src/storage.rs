//! Rule registry.
//!
//! [`Storage`] maps entity types to their ordered attribute rules. It is filled
//! while entity types are set up, then frozen behind an `Arc` and shared by
//! every [`Model`](crate::Model) built from it.

use indexmap::IndexMap;
use std::any::TypeId;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::config::{Defaults, Logger};
use crate::decorators::Decorator;
use crate::entity::Entity;
use crate::rule::Rule;
use crate::value::{FieldValue, Record};

static NEXT_DYNAMIC_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyId {
    Type(TypeId),
    Dynamic(u64),
}

/// Identity of an entity type
///
/// Two keys are equal only when they denote the same type: the same Rust
/// marker type, or the same [`EntityKey::dynamic`] allocation. Names are for
/// messages and never take part in lookups.
#[derive(Clone)]
pub struct EntityKey {
    id: KeyId,
    name: Arc<str>,
}

impl EntityKey {
    /// Key of a Rust marker type implementing [`Entity`].
    pub fn of<T: Entity>() -> Self {
        Self {
            id: KeyId::Type(TypeId::of::<T>()),
            name: Arc::from(T::NAME),
        }
    }

    /// Allocate a fresh identity for a type defined at runtime.
    pub fn dynamic(name: impl Into<String>) -> Self {
        Self {
            id: KeyId::Dynamic(NEXT_DYNAMIC_ID.fetch_add(1, Ordering::Relaxed)),
            name: Arc::from(name.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for EntityKey {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for EntityKey {}

impl Hash for EntityKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityKey({})", self.name)
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// One attribute and its rules
#[derive(Debug, Clone)]
pub struct Attr {
    name: String,
    rules: Rule,
}

impl Attr {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Rule::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &Rule {
        &self.rules
    }

    /// Shallow-merge `rule` into this attribute's rules. Later calls win.
    pub fn set_rule(&mut self, rule: Rule) -> &mut Self {
        self.rules.merge_from(rule);
        self
    }

    /// Apply decorators in order.
    pub fn decorate<I>(&mut self, decorators: I) -> &mut Self
    where
        I: IntoIterator<Item = Decorator>,
    {
        for decorator in decorators {
            decorator.apply(self);
        }
        self
    }
}

/// Registration entry of one entity type
#[derive(Debug, Clone)]
pub struct Meta {
    key: EntityKey,
    parent: Option<EntityKey>,
    attrs: Vec<Attr>,
    /// Instance template: fields every new instance starts with
    fields: Record,
}

impl Meta {
    pub fn new(key: EntityKey) -> Self {
        Self {
            key,
            parent: None,
            attrs: Vec::new(),
            fields: Record::new(),
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        self.key.name()
    }

    pub fn parent(&self) -> Option<&EntityKey> {
        self.parent.as_ref()
    }

    /// Record the parent type. Only [`Storage::compose`] pulls its rules in.
    pub fn extends(&mut self, parent: EntityKey) -> &mut Self {
        self.parent = Some(parent);
        self
    }

    /// Return or create the attribute named `name`.
    pub fn attr(&mut self, name: &str) -> &mut Attr {
        let index = match self.attrs.iter().position(|attr| attr.name == name) {
            Some(index) => index,
            None => {
                self.attrs.push(Attr::new(name));
                self.attrs.len() - 1
            }
        };
        &mut self.attrs[index]
    }

    /// Declare `name` with a list of decorators.
    pub fn declare<I>(&mut self, name: &str, decorators: I) -> &mut Self
    where
        I: IntoIterator<Item = Decorator>,
    {
        self.attr(name).decorate(decorators);
        self
    }

    pub fn find(&self, name: &str) -> Option<&Attr> {
        self.attrs.iter().find(|attr| attr.name == name)
    }

    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Append every attribute whose name is not registered yet.
    pub fn merge<I>(&mut self, attrs: I)
    where
        I: IntoIterator<Item = Attr>,
    {
        for attr in attrs {
            if !self.has_attr(&attr.name) {
                self.attrs.push(attr);
            }
        }
    }

    pub(crate) fn replace_attrs(&mut self, attrs: Vec<Attr>) {
        self.attrs = attrs;
    }

    /// Add a field to the instance template.
    pub fn field(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> &mut Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn fields(&self) -> &Record {
        &self.fields
    }
}

/// Registry of entity types and the defaults shared by their instances
#[derive(Debug, Default)]
pub struct Storage {
    entities: IndexMap<EntityKey, Meta>,
    defaults: Defaults,
}

impl Storage {
    /// Create an empty registry with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Return or create the entry for `key`.
    pub fn entity(&mut self, key: &EntityKey) -> &mut Meta {
        self.entities
            .entry(key.clone())
            .or_insert_with(|| Meta::new(key.clone()))
    }

    /// Register a Rust marker type: record its parent and run its declarations.
    pub fn register<T: Entity>(&mut self) -> EntityKey {
        let key = EntityKey::of::<T>();
        let meta = self.entity(&key);
        if let Some(parent) = T::parent() {
            meta.extends(parent);
        }
        T::declare(meta);
        tracing::debug!(entity = T::NAME, attrs = meta.attrs().len(), "registered entity");
        key
    }

    pub fn get(&self, key: &EntityKey) -> Option<&Meta> {
        self.entities.get(key)
    }

    /// Ordered attributes of `key`; empty for unknown types.
    pub fn attrs(&self, key: &EntityKey) -> &[Attr] {
        self.get(key).map(Meta::attrs).unwrap_or_default()
    }

    pub fn find_attr(&self, key: &EntityKey, name: &str) -> Option<&Attr> {
        self.get(key).and_then(|meta| meta.find(name))
    }

    /// Check if an entity type has an entry
    pub fn has_entity(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    /// Get all registered entity keys, in registration order
    pub fn keys(&self) -> impl Iterator<Item = &EntityKey> {
        self.entities.keys()
    }

    /// Fields a new instance of `key` starts with: the parent chain's template
    /// first, overridden by each descendant's.
    pub fn template_fields(&self, key: &EntityKey) -> Record {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(key);
        while let Some(k) = current {
            if !seen.insert(k.clone()) {
                tracing::warn!(entity = key.name(), "cyclic parent chain");
                break;
            }
            let Some(meta) = self.get(k) else { break };
            chain.push(meta);
            current = meta.parent();
        }

        let mut fields = Record::new();
        for meta in chain.into_iter().rev() {
            for (name, value) in meta.fields() {
                fields.insert(name.clone(), value.clone());
            }
        }
        fields
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut Defaults {
        &mut self.defaults
    }

    /// Replace the violation message template.
    pub fn set_message_format(&mut self, template: impl Into<String>) {
        self.defaults.message = template.into();
    }

    /// Replace the logger that receives violation messages.
    pub fn set_logger<L: Logger + 'static>(&mut self, logger: L) {
        self.defaults.logger = Arc::new(logger);
    }

    /// Freeze the registry for sharing between instances.
    pub fn into_shared(self) -> Arc<Storage> {
        Arc::new(self)
    }
}
