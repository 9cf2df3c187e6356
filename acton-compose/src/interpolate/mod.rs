//! Variable and section interpolation
//!
//! The composition engine does not implement a templating grammar of its own.
//! It hands every pass to an [`Interpolator`] together with the ordered
//! binding chain.
//!
//! The default [`MustacheInterpolator`] understands the mustache grammar:
//! escaped `{{name}}` and raw `{{{name}}}` variables, `{{#section}}` blocks
//! over objects, booleans and lists (with `{{.}}` for the current item) and
//! `{{^inverted}}` sections. [`HandlebarsInterpolator`] is available for
//! templates written against Handlebars helpers instead.

use handlebars::Handlebars;
use serde_json::{Map, Value};
use std::fmt;

use crate::config::{RenderSettings, TemplateSyntax};
use crate::BoxError;

/// Variable/section substitution capability
pub trait Interpolator: Send + Sync + fmt::Debug {
    /// Interpolate `template` against `bindings`
    ///
    /// Bindings are ordered; when several define the same name the later one
    /// wins.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is malformed or, in strict mode, a
    /// referenced binding is missing.
    fn interpolate(&self, template: &str, bindings: &[Value]) -> Result<String, BoxError>;
}

impl<T: Interpolator + ?Sized> Interpolator for Box<T> {
    fn interpolate(&self, template: &str, bindings: &[Value]) -> Result<String, BoxError> {
        (**self).interpolate(template, bindings)
    }
}

/// Build the interpolator selected by `settings.syntax`
///
/// `strict_interpolation` only applies to Handlebars.
#[must_use]
pub fn from_settings(settings: &RenderSettings) -> Box<dyn Interpolator> {
    match settings.syntax {
        TemplateSyntax::Mustache => Box::new(MustacheInterpolator::new()),
        TemplateSyntax::Handlebars => Box::new(HandlebarsInterpolator::with_strict_mode(
            settings.strict_interpolation,
        )),
    }
}

/// Merge an ordered binding chain into a single object
///
/// Object bindings are merged key by key, later keys replacing earlier ones.
/// Non-object bindings carry no names and are skipped.
///
/// # Examples
///
/// ```rust
/// use acton_compose::interpolate::merge_bindings;
/// use serde_json::json;
///
/// let merged = merge_bindings(&[json!({"a": 1, "b": 1}), json!({"b": 2})]);
/// assert_eq!(merged, json!({"a": 1, "b": 2}));
/// ```
#[must_use]
pub fn merge_bindings(bindings: &[Value]) -> Value {
    let mut merged = Map::new();
    for binding in bindings {
        match binding {
            Value::Object(map) => {
                merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
            }
            Value::Null => {}
            other => tracing::trace!(kind = value_kind(other), "Skipping non-object binding"),
        }
    }
    Value::Object(merged)
}

const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Mustache interpolator
///
/// Missing names render as empty text and missing sections are skipped.
///
/// # Examples
///
/// ```rust
/// use acton_compose::interpolate::{Interpolator, MustacheInterpolator};
/// use serde_json::json;
///
/// let interpolator = MustacheInterpolator::new();
/// let html = interpolator.interpolate(
///     "{{#user}}Hello, {{name}}!{{/user}} {{^items}}empty{{/items}} {{{banner}}}",
///     &[json!({"user": {"name": "<World>"}, "items": [], "banner": "<b>sale</b>"})],
/// )?;
/// assert_eq!(html, "Hello, &lt;World&gt;! empty <b>sale</b>");
/// # Ok::<(), acton_compose::BoxError>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MustacheInterpolator;

impl MustacheInterpolator {
    /// Create a mustache interpolator
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Interpolator for MustacheInterpolator {
    fn interpolate(&self, template: &str, bindings: &[Value]) -> Result<String, BoxError> {
        let compiled = mustache::compile_str(template)?;
        let mut out = Vec::with_capacity(template.len());
        compiled.render(&mut out, &merge_bindings(bindings))?;
        Ok(String::from_utf8(out)?)
    }
}

/// Handlebars-backed interpolator
///
/// # Examples
///
/// ```rust
/// use acton_compose::interpolate::{HandlebarsInterpolator, Interpolator};
/// use serde_json::json;
///
/// let interpolator = HandlebarsInterpolator::new();
/// let html = interpolator.interpolate(
///     "Hello, {{name}}! {{{banner}}}",
///     &[json!({"name": "<World>", "banner": "<b>sale</b>"})],
/// )?;
/// assert_eq!(html, "Hello, &lt;World&gt;! <b>sale</b>");
/// # Ok::<(), acton_compose::BoxError>(())
/// ```
pub struct HandlebarsInterpolator {
    registry: Handlebars<'static>,
}

impl fmt::Debug for HandlebarsInterpolator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlebarsInterpolator")
            .field("strict_mode", &self.registry.strict_mode())
            .finish_non_exhaustive()
    }
}

impl Default for HandlebarsInterpolator {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsInterpolator {
    /// Lenient interpolator: missing names render as empty text
    #[must_use]
    pub fn new() -> Self {
        Self::with_strict_mode(false)
    }

    /// Interpolator with explicit strict mode
    #[must_use]
    pub fn with_strict_mode(strict: bool) -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(strict);
        Self { registry }
    }

    /// Interpolator around a preconfigured Handlebars registry
    ///
    /// Use this to register helpers or partials shared by every template.
    #[must_use]
    pub const fn with_registry(registry: Handlebars<'static>) -> Self {
        Self { registry }
    }
}

impl Interpolator for HandlebarsInterpolator {
    fn interpolate(&self, template: &str, bindings: &[Value]) -> Result<String, BoxError> {
        let data = merge_bindings(bindings);
        self.registry
            .render_template(template, &data)
            .map_err(BoxError::from)
    }
}
