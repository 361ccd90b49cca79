//! Process-wide defaults and the violation notifier.
//!
//! Shape violations found by `parse` are rendered with a message template and
//! handed to a pluggable [`Logger`]. The default logger turns the message into a
//! [`ModelError::Violation`], which aborts the running operation; a logger that
//! returns `Ok(())` lets the operation carry on.

use std::fmt;
use std::sync::Arc;

use crate::error::ModelError;
use crate::value::FieldValue;

/// Default violation message template.
pub const DEFAULT_MESSAGE: &str = "{entity}.{attr} defined as {type}, got: {value}";

/// Placeholders recognised in message templates.
pub const PLACEHOLDERS: [&str; 4] = ["entity", "attr", "type", "value"];

/// Receiver of rendered violation messages
pub trait Logger: Send + Sync {
    /// Report a violation. Returning an error aborts the current operation.
    fn error(&self, message: &str) -> Result<(), ModelError>;
}

/// Simple function-based implementation of Logger
impl<F> Logger for F
where
    F: Fn(&str) -> Result<(), ModelError> + Send + Sync,
{
    fn error(&self, message: &str) -> Result<(), ModelError> {
        self(message)
    }
}

/// Default logger: every violation becomes a [`ModelError::Violation`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RaiseLogger;

impl Logger for RaiseLogger {
    fn error(&self, message: &str) -> Result<(), ModelError> {
        Err(ModelError::Violation(message.to_string()))
    }
}

/// Logger that records violations as `tracing` events and keeps going.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn error(&self, message: &str) -> Result<(), ModelError> {
        tracing::error!(target: "modelmap::violation", "{}", message);
        Ok(())
    }
}

/// Process-wide configuration read by the notifier and used as fallback for
/// per-call options.
#[derive(Clone)]
pub struct Defaults {
    /// Violation message template
    pub message: String,
    /// `reverse` drops `""`, null and undefined values
    pub lightly: bool,
    /// `parse`/`merge` skip the pass-through copy of unregistered keys
    pub ignore: bool,
    pub logger: Arc<dyn Logger>,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            message: DEFAULT_MESSAGE.to_string(),
            lightly: true,
            ignore: false,
            logger: Arc::new(RaiseLogger),
        }
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("message", &self.message)
            .field("lightly", &self.lightly)
            .field("ignore", &self.ignore)
            .finish_non_exhaustive()
    }
}

impl Defaults {
    /// Render `violation` with the configured template and hand it to the logger.
    pub fn notify(&self, violation: &Violation<'_>) -> Result<(), ModelError> {
        let message = violation.render(&self.message);
        tracing::debug!(entity = violation.entity, attr = violation.attr, "shape violation");
        self.logger.error(&message)
    }
}

/// A mismatch between an attribute's rule and the value being assigned.
#[derive(Debug, Clone)]
pub struct Violation<'a> {
    pub entity: &'a str,
    pub attr: &'a str,
    /// Description of what was expected
    pub expected: String,
    /// The offending value, `None` when undefined
    pub value: Option<&'a FieldValue>,
}

impl Violation<'_> {
    /// Substitute the first occurrence of each placeholder, in the order
    /// entity, attr, type, value.
    pub fn render(&self, template: &str) -> String {
        let value = self.value.map(ToString::to_string).unwrap_or_default();
        template
            .replacen("{entity}", self.entity, 1)
            .replacen("{attr}", self.attr, 1)
            .replacen("{type}", &self.expected, 1)
            .replacen("{value}", &value, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn violation(value: Option<&FieldValue>) -> Violation<'_> {
        Violation {
            entity: "User",
            attr: "age",
            expected: "Number".to_string(),
            value,
        }
    }

    #[test]
    fn test_render_default_template() {
        let value = FieldValue::from("thirty");
        assert_eq!(
            violation(Some(&value)).render(DEFAULT_MESSAGE),
            "User.age defined as Number, got: thirty"
        );
        assert_eq!(
            violation(None).render(DEFAULT_MESSAGE),
            "User.age defined as Number, got: "
        );
        assert_eq!(
            violation(Some(&FieldValue::Null)).render(DEFAULT_MESSAGE),
            "User.age defined as Number, got: null"
        );
    }

    #[test]
    fn test_render_replaces_first_occurrence_only() {
        assert_eq!(
            violation(None).render("{attr} {attr} <{type}>"),
            "age {attr} <Number>"
        );
    }

    #[test]
    fn test_default_logger_raises() {
        let defaults = Defaults::default();
        let err = defaults.notify(&violation(None)).unwrap_err();
        assert_eq!(err, ModelError::Violation("User.age defined as Number, got: ".into()));
        assert_eq!(err.name(), "ModelError");
    }

    #[test]
    fn test_closure_logger_collects() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let defaults = Defaults {
            message: "{entity}/{attr}".to_string(),
            logger: Arc::new(move |msg: &str| -> Result<(), ModelError> {
                sink.lock().unwrap().push(msg.to_string());
                Ok(())
            }),
            ..Defaults::default()
        };

        defaults.notify(&violation(None)).unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["User/age".to_string()]);
    }

    #[test]
    fn test_tracing_logger_continues() {
        assert!(TracingLogger.error("anything").is_ok());
    }
}
