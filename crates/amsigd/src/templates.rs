//! Notification templates.
//!
//! The router only sees the [`TemplateEngine`] trait. The built-in
//! [`PlaceholderTemplates`] engine substitutes `{{ path }}` placeholders,
//! where `path` is a dotted walk through the webhook JSON of the alert
//! message: `{{ status }}`, `{{ commonLabels.alertname }}`,
//! `{{ alerts.0.labels.instance }}`. A leading `.` is accepted.
//!
//! Values render as follows: strings verbatim, numbers and booleans as JSON
//! text, null as nothing, mappings as sorted `k=v` pairs joined by `, `,
//! lists one element per line.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use amsig_core::AlertMessage;
use serde_json::Value;
use tracing::debug;

use crate::error::{ConfigError, TemplateError};

/// Name of the template that is always available.
pub const DEFAULT_TEMPLATE: &str = "default";

const DEFAULT_BODY: &str = "[{{ status }}] {{ groupLabels }}\n{{ commonAnnotations }}\n{{ externalURL }}";

/// Renders notification bodies and destinations from an alert message.
///
/// Implementations must be pure: rendering is called concurrently from
/// every in-flight webhook request.
pub trait TemplateEngine: Send + Sync {
    /// Renders the named template.
    fn render(&self, name: &str, message: &AlertMessage) -> Result<String, TemplateError>;

    /// Renders an inline template string.
    fn render_str(&self, text: &str, message: &AlertMessage) -> Result<String, TemplateError>;
}

/// Placeholder-substitution engine.
#[derive(Debug, Clone)]
pub struct PlaceholderTemplates {
    templates: HashMap<String, String>,
}

impl Default for PlaceholderTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(DEFAULT_TEMPLATE.to_string(), DEFAULT_BODY.to_string());
        Self { templates }
    }
}

impl PlaceholderTemplates {
    /// Engine holding only the built-in `default` template.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads template files on top of the built-in template.
    ///
    /// Each file's stem is its name (`page.tmpl` → `page`); a file named
    /// `default.*` replaces the built-in default.
    pub fn load_files(paths: &[PathBuf]) -> Result<Self, ConfigError> {
        let mut engine = Self::new();
        for path in paths {
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| !s.is_empty())
                .ok_or_else(|| ConfigError::TemplateName { path: path.clone() })?;
            let text = fs::read_to_string(path).map_err(|source| ConfigError::Template {
                path: path.clone(),
                source,
            })?;
            debug!(template = name, path = %path.display(), "Loaded template");
            engine.insert(name, text);
        }
        Ok(engine)
    }

    /// Adds or replaces a template.
    pub fn insert(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.templates.insert(name.into(), text.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl TemplateEngine for PlaceholderTemplates {
    fn render(&self, name: &str, message: &AlertMessage) -> Result<String, TemplateError> {
        let text = self
            .templates
            .get(name)
            .ok_or_else(|| TemplateError::NotFound(name.to_string()))?;
        self.render_str(text, message)
    }

    fn render_str(&self, text: &str, message: &AlertMessage) -> Result<String, TemplateError> {
        let context = serde_json::to_value(message)?;
        render_text(text, &context)
    }
}

fn render_text(text: &str, context: &Value) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    let mut offset = 0;

    while let Some((before, after_open)) = rest.split_once("{{") {
        out.push_str(before);
        let open = offset + before.len();
        let (inner, after_close) = after_open
            .split_once("}}")
            .ok_or(TemplateError::Unterminated { offset: open })?;

        let path = inner.trim();
        let path = path.strip_prefix('.').unwrap_or(path);
        if path.is_empty() {
            return Err(TemplateError::EmptyPlaceholder { offset: open });
        }

        let value = lookup(context, path).ok_or_else(|| TemplateError::MissingField {
            path: path.to_string(),
        })?;
        write_value(&mut out, value);

        offset = open + 2 + inner.len() + 2;
        rest = after_close;
    }

    out.push_str(rest);
    Ok(out)
}

fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(context, |value, segment| match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::Object(map) => {
            let mut pairs: Vec<_> = map.iter().collect();
            pairs.sort_by(|a, b| a.0.cmp(b.0));
            for (i, (key, value)) in pairs.into_iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(key);
                out.push('=');
                write_value(out, value);
            }
        }
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push('\n');
                }
                write_value(out, item);
            }
        }
    }
}
