//! Template rendering for the template formatter.
//!
//! Uses Handlebars without HTML escaping. Besides the built-ins (`eq`, `if`,
//! `each`, ...) these helpers are registered, all of them total over any
//! JSON value a policy can produce:
//! - `json value`: compact JSON
//! - `join value [sep]`: elements of an array (or a set) joined, `", "` by default
//! - `default value fallback`: `fallback` when `value` is null or missing
//! - `truncate value [max]`: at most `max` characters (100 by default), then `...`
//!
//! Strings render verbatim; every other value renders as compact JSON.

use crate::FormatError;
use handlebars::{Context, Handlebars, Helper, HelperDef, HelperResult, Output, RenderContext};
use serde_json::Value;

const TEMPLATE_NAME: &str = "item";

const DEFAULT_SEPARATOR: &str = ", ";

const DEFAULT_TRUNCATE: usize = 100;

static NULL: Value = Value::Null;

/// One compiled template with the helpers registered
pub struct TemplateRenderer {
    handlebars: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new(template: &str) -> Result<Self, FormatError> {
        let mut handlebars = Handlebars::new();

        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(handlebars::no_escape);

        handlebars.register_helper("json", Box::new(ValueHelper(json)));
        handlebars.register_helper("join", Box::new(ValueHelper(join)));
        handlebars.register_helper("default", Box::new(ValueHelper(default)));
        handlebars.register_helper("truncate", Box::new(ValueHelper(truncate)));

        handlebars
            .register_template_string(TEMPLATE_NAME, template)
            .map_err(|e| FormatError::Template {
                template: template.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self { handlebars })
    }

    pub fn render(&self, data: &Value) -> Result<String, FormatError> {
        self.handlebars
            .render(TEMPLATE_NAME, data)
            .map_err(|e| FormatError::Render(e.to_string()))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Adapts a function over the positional parameters to a handlebars helper.
/// Missing parameters read as null.
struct ValueHelper(fn(&[&Value]) -> String);

impl HelperDef for ValueHelper {
    fn call<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _r: &'reg Handlebars<'reg>,
        _ctx: &'rc Context,
        _rc: &mut RenderContext<'reg, 'rc>,
        out: &mut dyn Output,
    ) -> HelperResult {
        let params: Vec<&Value> = h.params().iter().map(|p| p.value()).collect();
        out.write(&(self.0)(&params))?;
        Ok(())
    }
}

fn param<'a>(params: &[&'a Value], index: usize) -> &'a Value {
    params.get(index).copied().unwrap_or(&NULL)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn json(params: &[&Value]) -> String {
    param(params, 0).to_string()
}

fn join(params: &[&Value]) -> String {
    let separator = match param(params, 1) {
        Value::Null => DEFAULT_SEPARATOR.to_string(),
        other => display(other),
    };
    match param(params, 0) {
        Value::Array(elements) => elements
            .iter()
            .map(display)
            .collect::<Vec<_>>()
            .join(&separator),
        Value::Null => String::new(),
        other => display(other),
    }
}

fn default(params: &[&Value]) -> String {
    match param(params, 0) {
        Value::Null => match param(params, 1) {
            Value::Null => String::new(),
            fallback => display(fallback),
        },
        value => display(value),
    }
}

fn truncate(params: &[&Value]) -> String {
    let text = match param(params, 0) {
        Value::Null => return String::new(),
        value => display(value),
    };
    let max = param(params, 1)
        .as_u64()
        .map_or(DEFAULT_TRUNCATE, |n| n as usize);

    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text,
    }
}
