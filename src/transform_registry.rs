//! Named transforms and validators.
//!
//! Rules declared in Rust hold their functions directly. Rules loaded from a
//! schema file can only name them, so the loader resolves each name through a
//! [`TransformRegistry`]: the built-ins below plus whatever the application
//! registers before loading.

use std::collections::HashMap;
use std::sync::Arc;

use crate::coerce::converty;
use crate::error::ModelError;
use crate::model::Model;
use crate::rule::{ReverseFn, Transform, ValidatorFn};
use crate::value::{FieldValue, ValueType};

/// Trait for named validators
///
/// Unlike [`ValidatorFn`], a named validator also receives the attribute name
/// it is bound to, so one function can serve every attribute.
pub trait ValidateFn: Send + Sync {
    fn check(
        &self,
        attr: &str,
        value: Option<&FieldValue>,
        entity: &Model,
    ) -> Result<(), ModelError>;
}

/// Simple function-based implementation of ValidateFn
impl<F> ValidateFn for F
where
    F: Fn(&str, Option<&FieldValue>, &Model) -> Result<(), ModelError> + Send + Sync,
{
    fn check(
        &self,
        attr: &str,
        value: Option<&FieldValue>,
        entity: &Model,
    ) -> Result<(), ModelError> {
        self(attr, value, entity)
    }
}

/// Registry for storing and resolving named functions
pub struct TransformRegistry {
    transforms: HashMap<String, Transform>,
    reverses: HashMap<String, ReverseFn>,
    validators: HashMap<String, Arc<dyn ValidateFn>>,
}

impl TransformRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            transforms: HashMap::new(),
            reverses: HashMap::new(),
            validators: HashMap::new(),
        }
    }

    /// Create a registry holding the built-in functions
    ///
    /// * copy-in: `trim`, `lowercase`, `uppercase`, `string`, `number`,
    ///   `boolean`, `split`
    /// * copy-out: `join`, `string`, `number`
    /// * validators: `required`, `positive`
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        registry.register("trim", map_str(|s| s.trim().to_string()));
        registry.register("lowercase", map_str(str::to_lowercase));
        registry.register("uppercase", map_str(str::to_uppercase));
        registry.register("string", coerce_to(ValueType::String));
        registry.register("number", coerce_to(ValueType::Number));
        registry.register("boolean", coerce_to(ValueType::Boolean));
        registry.register("split", coerce_to(ValueType::Array));

        registry.register_reverse("join", |value: Option<&FieldValue>, _: &Model| {
            value.map(|v| FieldValue::String(v.to_string()))
        });
        registry.register_reverse("string", |value: Option<&FieldValue>, _: &Model| {
            value.map(|v| converty(v, &ValueType::String))
        });
        registry.register_reverse("number", |value: Option<&FieldValue>, _: &Model| {
            value.map(|v| converty(v, &ValueType::Number))
        });

        registry.register_validator(
            "required",
            |attr: &str, value: Option<&FieldValue>, entity: &Model| -> Result<(), ModelError> {
                match value {
                    Some(v) if !v.is_blank() => Ok(()),
                    _ => Err(ModelError::validation(entity.name(), attr, "is required")),
                }
            },
        );
        registry.register_validator(
            "positive",
            |attr: &str, value: Option<&FieldValue>, entity: &Model| -> Result<(), ModelError> {
                match value.and_then(FieldValue::as_f64) {
                    Some(n) if n <= 0.0 => {
                        Err(ModelError::validation(entity.name(), attr, "must be positive"))
                    }
                    _ => Ok(()),
                }
            },
        );

        registry
    }

    /// Register a copy-in transform usable as `parse`, `merge` or `recover`.
    ///
    /// # Example
    ///
    /// ```
    /// use modelmap::{FieldValue, TransformRegistry};
    ///
    /// let mut registry = TransformRegistry::new();
    /// registry.register("cents", |raw: Option<&FieldValue>, _source: &FieldValue| {
    ///     raw.and_then(FieldValue::as_f64).map(|n| FieldValue::Int((n * 100.0) as i64))
    /// });
    /// assert!(registry.has_transform("cents"));
    /// ```
    pub fn register<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.transforms.insert(name.into(), Arc::new(func));
    }

    /// Register a copy-out transform usable as `reverse`.
    pub fn register_reverse<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: Fn(Option<&FieldValue>, &Model) -> Option<FieldValue> + Send + Sync + 'static,
    {
        self.reverses.insert(name.into(), Arc::new(func));
    }

    /// Register a named validator.
    pub fn register_validator<F>(&mut self, name: impl Into<String>, func: F)
    where
        F: ValidateFn + 'static,
    {
        self.validators.insert(name.into(), Arc::new(func));
    }

    /// Look up a copy-in transform
    pub fn transform(&self, name: &str) -> Result<Transform, ModelError> {
        self.transforms
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::TransformNotFound(name.to_string()))
    }

    /// Look up a copy-out transform
    pub fn reverse(&self, name: &str) -> Result<ReverseFn, ModelError> {
        self.reverses
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::TransformNotFound(name.to_string()))
    }

    /// Look up a validator and bind it to `attr`.
    pub fn validator(&self, name: &str, attr: &str) -> Result<ValidatorFn, ModelError> {
        let check = self
            .validators
            .get(name)
            .cloned()
            .ok_or_else(|| ModelError::TransformNotFound(name.to_string()))?;
        let attr = attr.to_string();
        Ok(Arc::new(move |value: Option<&FieldValue>, entity: &Model| {
            check.check(&attr, value, entity)
        }))
    }

    /// Check if a copy-in transform is registered
    pub fn has_transform(&self, name: &str) -> bool {
        self.transforms.contains_key(name)
    }

    /// Get list of all registered names, sorted
    pub fn list_transforms(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .transforms
            .keys()
            .chain(self.reverses.keys())
            .chain(self.validators.keys())
            .cloned()
            .collect();
        names.sort();
        names.dedup();
        names
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

fn map_str<F>(func: F) -> impl Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue>
where
    F: Fn(&str) -> String,
{
    move |raw: Option<&FieldValue>, _source: &FieldValue| match raw {
        Some(FieldValue::String(s)) => Some(FieldValue::String(func(s.as_str()))),
        other => other.cloned(),
    }
}

fn coerce_to(target: ValueType) -> impl Fn(Option<&FieldValue>, &FieldValue) -> Option<FieldValue> {
    move |raw: Option<&FieldValue>, _source: &FieldValue| {
        raw.filter(|v| !v.is_null()).map(|v| converty(v, &target))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{EntityKey, Storage};

    fn entity() -> Model {
        let storage = Storage::new().into_shared();
        Model::empty(&storage, &EntityKey::dynamic("User"))
    }

    #[test]
    fn test_builtin_transforms() {
        let registry = TransformRegistry::with_builtins();
        let source = FieldValue::Null;

        let trim = registry.transform("trim").unwrap();
        assert_eq!(trim(Some(&FieldValue::from("  a ")), &source), Some(FieldValue::from("a")));
        assert_eq!(trim(Some(&FieldValue::Int(1)), &source), Some(FieldValue::Int(1)));
        assert_eq!(trim(None, &source), None);

        let number = registry.transform("number").unwrap();
        assert_eq!(number(Some(&FieldValue::from("12")), &source), Some(FieldValue::Int(12)));
        assert_eq!(number(Some(&FieldValue::Null), &source), None);

        let split = registry.transform("split").unwrap();
        assert_eq!(
            split(Some(&FieldValue::from("a,b")), &source),
            Some(FieldValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_builtin_reverse_and_validators() {
        let registry = TransformRegistry::with_builtins();
        let model = entity();

        let join = registry.reverse("join").unwrap();
        let list = FieldValue::List(vec!["a".into(), "b".into()]);
        assert_eq!(join(Some(&list), &model), Some(FieldValue::from("a,b")));

        let required = registry.validator("required", "name").unwrap();
        assert!(required(Some(&FieldValue::from("x")), &model).is_ok());
        let err = required(Some(&FieldValue::from("")), &model).unwrap_err();
        assert_eq!(err.message(), "User.name: is required");

        let positive = registry.validator("positive", "age").unwrap();
        assert!(positive(Some(&FieldValue::Int(3)), &model).is_ok());
        assert!(positive(Some(&FieldValue::Int(0)), &model).is_err());
        assert!(positive(None, &model).is_ok());
    }

    #[test]
    fn test_register_custom_transform() {
        let mut registry = TransformRegistry::new();
        registry.register("double", |raw: Option<&FieldValue>, _: &FieldValue| {
            raw.and_then(FieldValue::as_i64).map(|n| FieldValue::Int(n * 2))
        });

        let double = registry.transform("double").unwrap();
        assert_eq!(double(Some(&FieldValue::Int(4)), &FieldValue::Null), Some(FieldValue::Int(8)));
        assert!(registry.has_transform("double"));
        assert!(!registry.has_transform("trim"));
    }

    #[test]
    fn test_transform_not_found() {
        let registry = TransformRegistry::new();

        assert!(matches!(registry.transform("nonexistent"), Err(ModelError::TransformNotFound(_))));
        assert!(matches!(registry.reverse("nonexistent"), Err(ModelError::TransformNotFound(_))));
        assert!(matches!(
            registry.validator("nonexistent", "x"),
            Err(ModelError::TransformNotFound(_))
        ));
    }

    #[test]
    fn test_list_transforms() {
        let names = TransformRegistry::with_builtins().list_transforms();
        assert!(names.contains(&"trim".to_string()));
        assert!(names.contains(&"join".to_string()));
        assert!(names.contains(&"required".to_string()));
        assert_eq!(names.iter().filter(|n| *n == "string").count(), 1);
    }
}
