//! # Validation Module
//!
//! The shared part of every validator: message templates, `%value%` and
//! `%name%` substitution, and translation. Concrete rules implement
//! [`Validator`] on top of a [`ValidatorBase`].
//!
//! Translators are injected. A validator uses its own translator when one is
//! set and otherwise the default translator it was given; there is no
//! process-wide default.

use crate::error::Result;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Message catalogue lookup
pub trait Translator: Send + Sync {
    /// Translation for a message id, if the catalogue has one
    fn translate(&self, message_id: &str) -> Option<String>;
}

/// Translator handle shared between validators
pub type SharedTranslator = Arc<dyn Translator>;

/// Map-backed translator for a single locale
#[derive(Debug, Clone, Default)]
pub struct ArrayTranslator {
    locale: String,
    messages: HashMap<String, String>,
}

impl ArrayTranslator {
    /// Empty catalogue for `locale`
    #[must_use]
    pub fn new(locale: &str) -> Self {
        Self {
            locale: locale.to_string(),
            messages: HashMap::new(),
        }
    }

    /// Add a translation
    #[must_use]
    pub fn with_message(mut self, message_id: &str, translation: &str) -> Self {
        self.messages
            .insert(message_id.to_string(), translation.to_string());
        self
    }

    /// Catalogue locale
    #[must_use]
    pub fn locale(&self) -> &str {
        &self.locale
    }
}

impl Translator for ArrayTranslator {
    fn translate(&self, message_id: &str) -> Option<String> {
        self.messages.get(message_id).cloned()
    }
}

/// Failure messages of one validation run, keyed by message id
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationMessages {
    /// Message id to rendered message
    pub messages: BTreeMap<String, String>,
    /// Message ids in the order they were raised
    pub errors: Vec<String>,
}

impl ValidationMessages {
    /// Rendered message for an id
    #[must_use]
    pub fn get(&self, message_id: &str) -> Option<&str> {
        self.messages.get(message_id).map(String::as_str)
    }

    /// Whether an id was raised
    #[must_use]
    pub fn contains(&self, message_id: &str) -> bool {
        self.messages.contains_key(message_id)
    }

    /// Check if no message was raised
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Get the number of raised messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// Convert to JSON
    ///
    /// # Errors
    ///
    /// `Error::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        crate::json::to_json(self)
    }
}

/// Messages of several named fields, for a whole-form response
#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationErrors {
    /// Field name to its messages
    pub fields: BTreeMap<String, ValidationMessages>,
}

impl ValidationErrors {
    /// Create an empty error collection
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a validator against a field value, recording its messages on failure
    pub fn check(&mut self, field: &str, validator: &mut dyn Validator, value: &str) -> bool {
        let valid = validator.is_valid(value);
        if !valid {
            let raised = validator.messages();
            let entry = self.fields.entry(field.to_string()).or_default();
            entry.messages.extend(raised.messages.clone());
            entry.errors.extend(raised.errors.iter().cloned());
        }
        valid
    }

    /// Check if there are any errors
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields with errors
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Convert to JSON response body
    ///
    /// # Errors
    ///
    /// `Error::Json` if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        crate::json::to_json(self)
    }
}

/// A validation rule
pub trait Validator {
    /// Validate a value, replacing the messages of any previous run
    fn is_valid(&mut self, value: &str) -> bool;

    /// Messages raised by the last run
    fn messages(&self) -> &ValidationMessages;
}

/// Templates, substitution and translation shared by validators
#[derive(Default)]
pub struct ValidatorBase {
    templates: HashMap<String, String>,
    variables: HashMap<String, String>,
    value: Option<String>,
    obscure_value: bool,
    messages: ValidationMessages,
    translator: Option<SharedTranslator>,
    default_translator: Option<SharedTranslator>,
}

impl fmt::Debug for ValidatorBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidatorBase")
            .field("templates", &self.templates)
            .field("variables", &self.variables)
            .field("value", &self.value)
            .field("messages", &self.messages)
            .field("has_translator", &self.translator.is_some())
            .field("has_default_translator", &self.default_translator.is_some())
            .finish()
    }
}

impl ValidatorBase {
    /// Base with message templates (`id`, `template`)
    pub fn new<'t>(templates: impl IntoIterator<Item = (&'t str, &'t str)>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|(id, template)| (id.to_string(), template.to_string()))
                .collect(),
            ..Self::default()
        }
    }

    /// Base falling back to `translator` when no local one is set
    #[must_use]
    pub fn with_default_translator(mut self, translator: Option<SharedTranslator>) -> Self {
        self.default_translator = translator;
        self
    }

    /// Replace a message template
    pub fn set_message(&mut self, message_id: &str, template: &str) {
        self.templates
            .insert(message_id.to_string(), template.to_string());
    }

    /// Message template for an id
    #[must_use]
    pub fn message_template(&self, message_id: &str) -> Option<&str> {
        self.templates.get(message_id).map(String::as_str)
    }

    /// Set a `%name%` substitution
    pub fn set_variable(&mut self, name: &str, value: impl fmt::Display) {
        self.variables.insert(name.to_string(), value.to_string());
    }

    /// Render `%value%` as asterisks
    pub fn set_obscure_value(&mut self, obscure: bool) {
        self.obscure_value = obscure;
    }

    /// Set the local translator; `None` falls back to the default
    pub fn set_translator(&mut self, translator: Option<SharedTranslator>) {
        self.translator = translator;
    }

    /// Translator in effect: the local one, else the default
    #[must_use]
    pub fn translator(&self) -> Option<&SharedTranslator> {
        self.translator.as_ref().or(self.default_translator.as_ref())
    }

    /// Replace the default translator
    pub fn set_default_translator(&mut self, translator: Option<SharedTranslator>) {
        self.default_translator = translator;
    }

    /// The default translator
    #[must_use]
    pub fn default_translator(&self) -> Option<&SharedTranslator> {
        self.default_translator.as_ref()
    }

    /// Start a run: remember the value and clear previous messages
    pub fn set_value(&mut self, value: &str) {
        self.value = Some(value.to_string());
        self.messages = ValidationMessages::default();
    }

    /// Value of the current run
    #[must_use]
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Raise a message by id
    ///
    /// An id without a template is logged and ignored.
    pub fn error(&mut self, message_id: &str) {
        let Some(message) = self.create_message(message_id) else {
            warn!(message_id = %message_id, "No message template for validation error");
            return;
        };
        self.messages.errors.push(message_id.to_string());
        self.messages
            .messages
            .insert(message_id.to_string(), message);
    }

    /// Messages of the current run
    #[must_use]
    pub const fn messages(&self) -> &ValidationMessages {
        &self.messages
    }

    /// Message ids of the current run, in order
    #[must_use]
    pub fn errors(&self) -> &[String] {
        &self.messages.errors
    }

    fn create_message(&self, message_id: &str) -> Option<String> {
        let template = self.templates.get(message_id)?;
        let mut message = self
            .translator()
            .and_then(|t| t.translate(message_id))
            .unwrap_or_else(|| template.clone());

        let value = self.value.as_deref().unwrap_or_default();
        let value = if self.obscure_value {
            "*".repeat(value.chars().count())
        } else {
            value.to_string()
        };
        message = message.replace("%value%", &value);

        for (name, substitution) in &self.variables {
            message = message.replace(&format!("%{name}%"), substitution);
        }
        Some(message)
    }
}
