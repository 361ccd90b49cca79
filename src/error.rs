//! Error type shared by the rule registry, the transformation engine and the
//! schema loader.

use std::fmt;

/// Error type for model operations
///
/// Every variant carries a single human readable message. [`ModelError::name`]
/// reports the concrete kind so callers that route errors into logs can tell a
/// shape violation from a failed validator or a consumer-defined error.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// A value did not match its attribute's declared type, enumeration or
    /// nullability. Raised by the default logger.
    Violation(String),
    /// A validator rejected the value of an attribute.
    Validation {
        entity: String,
        attr: String,
        message: String,
    },
    /// A schema file or declaration could not be loaded.
    Schema(String),
    /// A named transform or validator was not registered.
    TransformNotFound(String),
    /// Consumer-defined error kind.
    Custom {
        name: String,
        message: String,
    },
}

impl ModelError {
    /// Create a consumer-defined error with its own kind name.
    pub fn custom(name: impl Into<String>, message: impl Into<String>) -> Self {
        ModelError::Custom {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a validator failure.
    pub fn validation(
        entity: impl Into<String>,
        attr: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ModelError::Validation {
            entity: entity.into(),
            attr: attr.into(),
            message: message.into(),
        }
    }

    /// Name of the concrete error kind.
    pub fn name(&self) -> &str {
        match self {
            ModelError::Violation(_) => "ModelError",
            ModelError::Validation { .. } => "ValidationError",
            ModelError::Schema(_) => "SchemaError",
            ModelError::TransformNotFound(_) => "TransformNotFound",
            ModelError::Custom { name, .. } => name,
        }
    }

    /// The message carried by this error, without the kind prefix.
    pub fn message(&self) -> String {
        match self {
            ModelError::Violation(msg) | ModelError::Schema(msg) => msg.clone(),
            ModelError::Validation {
                entity,
                attr,
                message,
            } => format!("{}.{}: {}", entity, attr, message),
            ModelError::TransformNotFound(name) => format!("Transform not found: {}", name),
            ModelError::Custom { message, .. } => message.clone(),
        }
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name(), self.message())
    }
}

impl std::error::Error for ModelError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names() {
        assert_eq!(ModelError::Violation("x".into()).name(), "ModelError");
        assert_eq!(ModelError::validation("User", "age", "bad").name(), "ValidationError");
        assert_eq!(ModelError::custom("QueryError", "bad page").name(), "QueryError");
    }

    #[test]
    fn test_error_display() {
        let err = ModelError::validation("User", "age", "must be positive");
        assert_eq!(err.to_string(), "ValidationError: User.age: must be positive");

        let err = ModelError::Violation("User.name defined as String, got: 1".into());
        assert_eq!(err.message(), "User.name defined as String, got: 1");
    }
}
