//! Message templates and the placeholder renderer

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{error::ValidationError, recipient::Recipient};

/// Placeholder tokens substituted by [`MessageTemplate::render`]
pub const SUPPORTED_TOKENS: [&str; 4] = ["{name}", "{first_name}", "{last_name}", "{phone}"];

/// Named templates, one content string per locale
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateCatalog {
    /// Locale used when a start request does not name one
    #[serde(default = "default_locale")]
    pub default_locale: String,
    /// Template id → locale → content
    #[serde(default)]
    pub templates: HashMap<String, HashMap<String, String>>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self {
            default_locale: default_locale(),
            templates: HashMap::new(),
        }
    }
}

fn default_locale() -> String {
    "en".to_string()
}

impl TemplateCatalog {
    /// Resolve a template id against a locale
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the id is unknown, the locale has no
    /// content, or the content is effectively empty.
    pub fn resolve(
        &self,
        id: &str,
        locale: Option<&str>,
    ) -> Result<MessageTemplate, ValidationError> {
        let locales = self
            .templates
            .get(id)
            .ok_or_else(|| ValidationError::UnknownTemplate(id.to_string()))?;

        let locale = locale.unwrap_or(&self.default_locale);
        let content = locales
            .get(locale)
            .ok_or_else(|| ValidationError::MissingLocale {
                id: id.to_string(),
                locale: locale.to_string(),
            })?;

        if content.trim().is_empty() {
            return Err(ValidationError::EmptyTemplate(id.to_string()));
        }

        Ok(MessageTemplate {
            id: id.to_string(),
            locale: locale.to_string(),
            content: content.clone(),
        })
    }
}

/// A template resolved to a concrete locale, ready to render
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageTemplate {
    pub id: String,
    pub locale: String,
    content: String,
}

impl MessageTemplate {
    /// Substitute every supported placeholder with the recipient's fields
    ///
    /// Pure: unknown tokens are left verbatim and neither input is mutated.
    /// `{first_name}` is the first whitespace-separated word of the name,
    /// `{last_name}` is the rest.
    #[must_use]
    pub fn render(&self, recipient: &Recipient) -> String {
        let first_name = recipient
            .name
            .split_whitespace()
            .next()
            .unwrap_or_default();
        let last_name = recipient
            .name
            .split_whitespace()
            .skip(1)
            .collect::<Vec<_>>()
            .join(" ");

        self.content
            .replace("{name}", &recipient.name)
            .replace("{first_name}", first_name)
            .replace("{last_name}", &last_name)
            .replace("{phone}", &recipient.phone)
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }
}
